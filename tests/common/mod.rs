//! Shared fixtures for the integration suite.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::LocalBoxFuture;

use chart_engine_wasm::application::config::EngineConfig;
use chart_engine_wasm::application::data_manager::{
    CandleRow, DataManager, HistoricalSource, HistoryRequest,
};
use chart_engine_wasm::application::state::{shared_state, SharedState};
use chart_engine_wasm::domain::errors::DataError;
use chart_engine_wasm::domain::market_data::{Symbol, Timeframe};
use chart_engine_wasm::domain::time::ManualClock;

pub fn row(time_ms: u64, close: f64) -> CandleRow {
    [
        time_ms as f64,
        close,
        close + 1.0,
        close - 1.0,
        close,
        10.0,
    ]
}

/// `count` one-minute rows ending at `end_ms` (exclusive of the next bucket).
pub fn minute_rows(count: usize, end_ms: u64) -> Vec<CandleRow> {
    (0..count)
        .map(|i| {
            let time = end_ms - (count - i) as u64 * 60_000;
            row(time, 100.0 + i as f64)
        })
        .collect()
}

/// History source fed from a queue of canned responses. Every call pops
/// the front; an empty queue yields an empty page.
pub struct StubSource {
    responses: RefCell<VecDeque<Result<Vec<CandleRow>, DataError>>>,
    pub calls: Cell<usize>,
    pub last_request: RefCell<Option<HistoryRequest>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self {
            responses: RefCell::new(VecDeque::new()),
            calls: Cell::new(0),
            last_request: RefCell::new(None),
        }
    }

    pub fn push(&self, response: Result<Vec<CandleRow>, DataError>) {
        self.responses.borrow_mut().push_back(response);
    }
}

impl HistoricalSource for StubSource {
    fn fetch(
        &self,
        request: HistoryRequest,
    ) -> LocalBoxFuture<'_, Result<Vec<CandleRow>, DataError>> {
        self.calls.set(self.calls.get() + 1);
        *self.last_request.borrow_mut() = Some(request);
        let response = self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(Vec::new()));
        Box::pin(async move { response })
    }
}

/// History source whose responses complete only when the test resolves
/// the matching sender, so requests stay in flight on demand.
pub struct GatedSource {
    senders: RefCell<Vec<oneshot::Sender<Result<Vec<CandleRow>, DataError>>>>,
    pub calls: Cell<usize>,
}

impl GatedSource {
    pub fn new() -> Self {
        Self {
            senders: RefCell::new(Vec::new()),
            calls: Cell::new(0),
        }
    }

    /// Completes the oldest outstanding request.
    pub fn resolve(&self, response: Result<Vec<CandleRow>, DataError>) -> bool {
        if self.senders.borrow().is_empty() {
            return false;
        }
        let sender = self.senders.borrow_mut().remove(0);
        sender.send(response).is_ok()
    }

    pub fn outstanding(&self) -> usize {
        self.senders.borrow().len()
    }
}

impl HistoricalSource for GatedSource {
    fn fetch(
        &self,
        _request: HistoryRequest,
    ) -> LocalBoxFuture<'_, Result<Vec<CandleRow>, DataError>> {
        self.calls.set(self.calls.get() + 1);
        let (sender, receiver) = oneshot::channel();
        self.senders.borrow_mut().push(sender);
        Box::pin(async move {
            receiver
                .await
                .unwrap_or_else(|_| Err(DataError::Network("request dropped".into())))
        })
    }
}

pub struct Fixture<S> {
    pub state: SharedState,
    pub manager: Rc<DataManager>,
    pub clock: Rc<ManualClock>,
    pub source: Rc<S>,
}

pub fn fixture_with<S: HistoricalSource + 'static>(source: S) -> Fixture<S> {
    let config = EngineConfig::default();
    let clock = Rc::new(ManualClock::new(120_000_000.0));
    let state = shared_state(800.0, &config);
    let source = Rc::new(source);
    let manager = Rc::new(DataManager::new(
        Rc::clone(&state),
        Rc::clone(&source) as Rc<dyn HistoricalSource>,
        Rc::clone(&clock) as Rc<dyn chart_engine_wasm::domain::time::Clock>,
        config,
        Symbol::parse("BTC/USDT").unwrap(),
        Timeframe::OneMinute,
    ));
    Fixture {
        state,
        manager,
        clock,
        source,
    }
}

pub fn stub_fixture() -> Fixture<StubSource> {
    fixture_with(StubSource::new())
}

pub fn gated_fixture() -> Fixture<GatedSource> {
    fixture_with(GatedSource::new())
}
