mod common;

use futures::executor::{block_on, LocalPool};
use futures::task::LocalSpawnExt;
use std::rc::Rc;

use chart_engine_wasm::domain::market_data::{Symbol, Timeframe};
use common::{gated_fixture, minute_rows, row, stub_fixture};

#[test]
fn in_flight_response_for_old_tuning_is_discarded() {
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
    assert_eq!(fx.source.outstanding(), 1);

    // Retune while the 1m request is still in flight.
    {
        let manager = Rc::clone(&fx.manager);
        spawner
            .spawn_local(async move {
                manager.set_timeframe(Timeframe::OneHour).await;
            })
            .unwrap();
    }
    pool.run_until_stalled();
    assert_eq!(fx.source.outstanding(), 2);

    // The stale 1m page resolves first; it must not land.
    assert!(fx.source.resolve(Ok(minute_rows(300, 120_000_000))));
    pool.run_until_stalled();
    assert!(!fx.state.borrow().data_ready);
    assert!(fx.state.borrow().candles.is_empty());

    // The 1h page resolves and becomes the buffer.
    let hour_rows: Vec<_> = (0..5)
        .map(|i| row(120_000_000 - (5 - i) * 3_600_000, 50.0))
        .collect();
    assert!(fx.source.resolve(Ok(hour_rows)));
    pool.run_until_stalled();
    let state = fx.state.borrow();
    assert!(state.data_ready);
    assert_eq!(state.candles.len(), 5);
    assert_eq!(state.candles.oldest().unwrap().time.value() % 3_600_000, 0);
}

#[test]
fn returning_to_cached_tuning_skips_the_network() {
    let fx = stub_fixture();
    fx.source.push(Ok(minute_rows(100, 120_000_000)));
    block_on(fx.manager.load_initial());
    assert_eq!(fx.source.calls.get(), 1);

    let eth = Symbol::parse("ETH/USDT").unwrap();
    fx.source.push(Ok(minute_rows(80, 120_000_000)));
    block_on(fx.manager.set_symbol(eth));
    assert_eq!(fx.source.calls.get(), 2);
    assert_eq!(fx.state.borrow().candles.len(), 80);

    // Back to BTC: cache paints instantly; the refresh is rate limited.
    let btc = Symbol::parse("BTC/USDT").unwrap();
    block_on(fx.manager.set_symbol(btc));
    let state = fx.state.borrow();
    assert!(state.data_ready);
    assert_eq!(state.candles.len(), 100);
    assert_eq!(fx.source.calls.get(), 2);
}

#[test]
fn retune_to_same_tuning_is_a_no_op() {
    let fx = stub_fixture();
    fx.source.push(Ok(minute_rows(10, 120_000_000)));
    block_on(fx.manager.load_initial());
    let calls = fx.source.calls.get();
    assert!(!block_on(fx.manager.set_timeframe(Timeframe::OneMinute)));
    assert!(!block_on(
        fx.manager.set_symbol(Symbol::parse("BTC/USDT").unwrap())
    ));
    assert_eq!(fx.source.calls.get(), calls);
}

#[test]
fn retune_resets_backfill_exhaustion() {
    let fx = stub_fixture();
    fx.source.push(Ok(minute_rows(10, 120_000_000)));
    block_on(fx.manager.load_initial());
    fx.source.push(Ok(Vec::new()));
    block_on(fx.manager.fetch_older());
    assert!(fx.state.borrow().reached_oldest);

    fx.source.push(Ok(Vec::new()));
    block_on(fx.manager.set_timeframe(Timeframe::FiveMinutes));
    // Empty initial page for the new tuning re-marks exhaustion on its
    // own terms; the flag was cleared by the retune first.
    assert!(fx.state.borrow().candles.is_empty());
}
