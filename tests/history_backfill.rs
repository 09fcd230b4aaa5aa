mod common;

use futures::executor::{block_on, LocalPool};
use futures::task::LocalSpawnExt;
use std::rc::Rc;

use common::{gated_fixture, minute_rows, stub_fixture};

#[test]
fn backfill_prepends_and_shifts_viewport() {
    let fx = stub_fixture();
    fx.source.push(Ok(minute_rows(100, 120_000_000)));
    block_on(fx.manager.load_initial());

    fx.state.borrow_mut().viewport.set_range(2.0, 62.0);
    let oldest = 120_000_000 - 100 * 60_000;
    fx.source.push(Ok(minute_rows(10, oldest)));
    assert!(block_on(fx.manager.fetch_older()));

    let state = fx.state.borrow();
    assert_eq!(state.candles.len(), 110);
    let range = state.viewport.range();
    assert_eq!((range.start, range.end), (12.0, 72.0));
    assert!(!state.reached_oldest);
}

#[test]
fn overlapping_backfill_rows_are_deduplicated() {
    let fx = stub_fixture();
    fx.source.push(Ok(minute_rows(100, 120_000_000)));
    block_on(fx.manager.load_initial());

    // Page overlaps the current oldest bucket by five rows.
    let oldest = 120_000_000 - 100 * 60_000;
    fx.source.push(Ok(minute_rows(15, oldest + 5 * 60_000)));
    fx.state.borrow_mut().viewport.set_range(10.0, 70.0);
    block_on(fx.manager.fetch_older());

    let state = fx.state.borrow();
    assert_eq!(state.candles.len(), 110);
    let range = state.viewport.range();
    assert_eq!((range.start, range.end), (20.0, 80.0));
}

#[test]
fn refresh_after_backfill_keeps_older_pages() {
    let fx = stub_fixture();
    fx.source.push(Ok(minute_rows(100, 120_000_000)));
    block_on(fx.manager.load_initial());

    fx.state.borrow_mut().viewport.set_range(2.0, 62.0);
    let oldest = 120_000_000 - 100 * 60_000;
    fx.source.push(Ok(minute_rows(10, oldest)));
    assert!(block_on(fx.manager.fetch_older()));
    assert_eq!(fx.state.borrow().candles.len(), 110);

    // A later refresh window only covers the newest candles; it must
    // merge into the buffer, not replace it.
    fx.clock.advance(15_000.0);
    fx.source.push(Ok(minute_rows(100, 120_000_000)));
    assert!(block_on(fx.manager.fetch_fresh(false)));

    let state = fx.state.borrow();
    assert_eq!(state.candles.len(), 110);
    let range = state.viewport.range();
    assert_eq!((range.start, range.end), (12.0, 72.0));
}

#[test]
fn backfill_is_blocked_while_refresh_is_in_flight() {
    let fx = gated_fixture();
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();

    {
        let manager = Rc::clone(&fx.manager);
        spawner
            .spawn_local(async move {
                manager.load_initial().await;
            })
            .unwrap();
    }
    pool.run_until_stalled();
    assert!(fx.source.resolve(Ok(minute_rows(100, 120_000_000))));
    pool.run_until_stalled();

    // Refresh past the rate limit, left in flight.
    fx.clock.advance(15_000.0);
    {
        let manager = Rc::clone(&fx.manager);
        spawner
            .spawn_local(async move {
                manager.fetch_fresh(false).await;
            })
            .unwrap();
    }
    pool.run_until_stalled();
    assert!(fx.state.borrow().loading);

    let calls = fx.source.calls.get();
    {
        let manager = Rc::clone(&fx.manager);
        spawner
            .spawn_local(async move {
                manager.fetch_older().await;
            })
            .unwrap();
    }
    pool.run_until_stalled();
    assert_eq!(fx.source.calls.get(), calls);
    assert!(!fx.state.borrow().loading_older);

    // Once the refresh settles the backfill goes through.
    assert!(fx.source.resolve(Ok(minute_rows(100, 120_000_000))));
    pool.run_until_stalled();
    {
        let manager = Rc::clone(&fx.manager);
        spawner
            .spawn_local(async move {
                manager.fetch_older().await;
            })
            .unwrap();
    }
    pool.run_until_stalled();
    assert_eq!(fx.source.outstanding(), 1);
}

#[test]
fn empty_backfill_marks_history_exhausted() {
    let fx = stub_fixture();
    fx.source.push(Ok(minute_rows(50, 120_000_000)));
    block_on(fx.manager.load_initial());

    fx.source.push(Ok(Vec::new()));
    block_on(fx.manager.fetch_older());
    assert!(fx.state.borrow().reached_oldest);

    // Further attempts never reach the source.
    let calls = fx.source.calls.get();
    assert!(!block_on(fx.manager.fetch_older()));
    assert_eq!(fx.source.calls.get(), calls);
}

#[test]
fn gesture_burst_triggers_single_backfill() {
    let fx = gated_fixture();
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();

    {
        let manager = Rc::clone(&fx.manager);
        spawner
            .spawn_local(async move {
                manager.load_initial().await;
            })
            .unwrap();
    }
    pool.run_until_stalled();
    assert!(fx.source.resolve(Ok(minute_rows(100, 120_000_000))));
    pool.run_until_stalled();
    assert!(fx.state.borrow().data_ready);

    // A drag hammering the left edge fires fetch_older per event; only
    // the first may reach the source while it is in flight.
    for _ in 0..50 {
        let manager = Rc::clone(&fx.manager);
        spawner
            .spawn_local(async move {
                manager.fetch_older().await;
            })
            .unwrap();
        pool.run_until_stalled();
    }
    assert_eq!(fx.source.calls.get(), 2);
    assert_eq!(fx.source.outstanding(), 1);
}
