mod common;

use futures::executor::block_on;

use common::{minute_rows, stub_fixture};

#[test]
fn refetch_inside_window_is_suppressed() {
    let fx = stub_fixture();
    fx.source.push(Ok(minute_rows(50, 120_000_000)));
    block_on(fx.manager.load_initial());
    assert_eq!(fx.source.calls.get(), 1);

    fx.clock.advance(5_000.0);
    assert!(!block_on(fx.manager.fetch_fresh(false)));
    assert_eq!(fx.source.calls.get(), 1);
}

#[test]
fn refetch_after_window_goes_through() {
    let fx = stub_fixture();
    fx.source.push(Ok(minute_rows(50, 120_000_000)));
    block_on(fx.manager.load_initial());

    fx.clock.advance(15_000.0);
    fx.source.push(Ok(minute_rows(50, 120_015_000)));
    assert!(block_on(fx.manager.fetch_fresh(false)));
    assert_eq!(fx.source.calls.get(), 2);
}

#[test]
fn initial_flag_bypasses_the_window() {
    let fx = stub_fixture();
    fx.source.push(Ok(minute_rows(50, 120_000_000)));
    block_on(fx.manager.load_initial());

    fx.clock.advance(1_000.0);
    fx.source.push(Ok(minute_rows(50, 120_000_000)));
    assert!(block_on(fx.manager.fetch_fresh(true)));
    assert_eq!(fx.source.calls.get(), 2);
}
