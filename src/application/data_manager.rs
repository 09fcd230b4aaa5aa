//! Candle acquisition: initial load, older-history backfill, live
//! stream merge, and the (symbol, timeframe) cache.
//!
//! Every async path snapshots the fetch epoch before awaiting and
//! validates it on resume, so responses that arrive after a retune are
//! discarded instead of corrupting the new buffer.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::domain::errors::{ApiStatus, DataError};
use crate::domain::logging::LogComponent;
use crate::domain::market_data::{
    candle_from_row, Candle, SubscriptionKey, Symbol, Timeframe,
};
use crate::domain::time::Clock;
use crate::{log_debug, log_error, log_info, log_warn_keyed};

use super::config::EngineConfig;
use super::state::SharedState;

/// Wire candle row: `[openTime, open, high, low, close, volume]`.
pub type CandleRow = [f64; 6];

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRequest {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    /// Inclusive window start, ms.
    pub from_ms: u64,
    /// Exclusive window end, ms.
    pub to_ms: u64,
}

/// Abstract history backend. The production impl speaks HTTP; tests
/// inject ready or pending futures.
pub trait HistoricalSource {
    fn fetch(&self, request: HistoryRequest)
        -> LocalBoxFuture<'_, Result<Vec<CandleRow>, DataError>>;
}

struct CacheEntry {
    candles: Vec<Candle>,
    reached_oldest: bool,
}

struct Tuning {
    symbol: Symbol,
    timeframe: Timeframe,
}

pub struct DataManager {
    state: SharedState,
    source: Rc<dyn HistoricalSource>,
    clock: Rc<dyn Clock>,
    config: EngineConfig,
    tuning: RefCell<Tuning>,
    /// Bumped on every retune; stale async resumes check against it.
    epoch: Cell<u64>,
    last_fetch_ms: Cell<f64>,
    cache: RefCell<HashMap<SubscriptionKey, CacheEntry>>,
}

impl DataManager {
    pub fn new(
        state: SharedState,
        source: Rc<dyn HistoricalSource>,
        clock: Rc<dyn Clock>,
        config: EngineConfig,
        symbol: Symbol,
        timeframe: Timeframe,
    ) -> Self {
        Self {
            state,
            source,
            clock,
            config,
            tuning: RefCell::new(Tuning { symbol, timeframe }),
            epoch: Cell::new(0),
            last_fetch_ms: Cell::new(f64::NEG_INFINITY),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn key(&self) -> SubscriptionKey {
        let tuning = self.tuning.borrow();
        SubscriptionKey::new(tuning.symbol.clone(), tuning.timeframe)
    }

    pub fn symbol(&self) -> Symbol {
        self.tuning.borrow().symbol.clone()
    }

    pub fn timeframe(&self) -> Timeframe {
        self.tuning.borrow().timeframe
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// First load for the current tuning: serve from cache when
    /// possible, otherwise fetch.
    pub async fn load_initial(&self) -> bool {
        if self.seed_from_cache() {
            // Cached paint is instant; refresh behind the rate limiter.
            self.fetch_fresh(false).await;
            true
        } else {
            self.fetch_fresh(true).await
        }
    }

    /// Full-window fetch for the current tuning.
    ///
    /// Non-initial calls are suppressed inside the minimum fetch
    /// interval. `initial` also resets the viewport to the newest data.
    pub async fn fetch_fresh(&self, initial: bool) -> bool {
        let now = self.clock.now_ms();
        if !initial && now - self.last_fetch_ms.get() < self.config.min_fetch_interval_ms {
            log_debug!(LogComponent::Data, "refetch suppressed by rate limit");
            return false;
        }
        let epoch = self.epoch.get();
        let (symbol, timeframe) = {
            let tuning = self.tuning.borrow();
            (tuning.symbol.clone(), tuning.timeframe)
        };
        let to_ms = now.max(0.0) as u64;
        let from_ms = to_ms.saturating_sub(self.config.fetch_limit as u64 * timeframe.duration_ms());
        self.last_fetch_ms.set(now);
        {
            let mut state = self.state.borrow_mut();
            state.loading = true;
            state.api_status = ApiStatus::Loading;
            state.mark_dirty();
        }
        let result = self
            .source
            .fetch(HistoryRequest {
                symbol: symbol.clone(),
                timeframe,
                from_ms,
                to_ms,
            })
            .await;
        if self.epoch.get() != epoch {
            log_info!(
                LogComponent::Data,
                "discarding stale history response for {symbol}@{timeframe}"
            );
            return false;
        }
        match result {
            Err(err) => {
                log_error!(LogComponent::Data, "history fetch failed: {err}");
                let mut state = self.state.borrow_mut();
                state.loading = false;
                state.api_status = ApiStatus::Error;
                state.error = Some(err);
                state.mark_dirty();
                false
            }
            Ok(rows) => {
                let candles = self.parse_rows(&rows, timeframe);
                let now = self.clock.now_ms();
                let mut state = self.state.borrow_mut();
                if initial {
                    state.candles.replace_all(candles);
                } else {
                    // A refresh window only covers recent candles; merging
                    // keeps backfilled older pages in the buffer.
                    for candle in candles {
                        state.candles.merge(candle);
                    }
                }
                state.loading = false;
                state.api_status = ApiStatus::Ok;
                state.error = None;
                state.data_ready = true;
                if state.candles.is_empty() {
                    // Start of listed history; nothing older exists.
                    state.reached_oldest = true;
                }
                if initial {
                    let count = state.candles.len();
                    state.viewport.reset(count);
                }
                let candles = state.candles.clone();
                state.indicators.recalculate(&candles, now);
                state.sync_panels();
                state.mark_dirty();
                drop(state);
                self.store_cache();
                log_info!(
                    LogComponent::Data,
                    "loaded {} candles for {symbol}@{timeframe}",
                    rows.len()
                );
                true
            }
        }
    }

    /// Backfills one page of older history before the current oldest
    /// candle. Guarded so only one backfill runs at a time.
    pub async fn fetch_older(&self) -> bool {
        let oldest_ms = {
            let state = self.state.borrow();
            match state.candles.oldest() {
                Some(candle) => candle.time.value(),
                None => return false,
            }
        };
        if !self.state.borrow_mut().begin_older_fetch() {
            return false;
        }
        let epoch = self.epoch.get();
        let (symbol, timeframe) = {
            let tuning = self.tuning.borrow();
            (tuning.symbol.clone(), tuning.timeframe)
        };
        let from_ms = oldest_ms.saturating_sub(self.config.fetch_limit as u64 * timeframe.duration_ms());
        let result = self
            .source
            .fetch(HistoryRequest {
                symbol,
                timeframe,
                from_ms,
                to_ms: oldest_ms,
            })
            .await;
        if self.epoch.get() != epoch {
            log_info!(LogComponent::Data, "discarding stale backfill response");
            return false;
        }
        match result {
            Err(err) => {
                log_error!(LogComponent::Data, "backfill failed: {err}");
                let mut state = self.state.borrow_mut();
                state.finish_older_fetch(false);
                state.error = Some(err);
                state.mark_dirty();
                false
            }
            Ok(rows) => {
                let candles = self.parse_rows(&rows, timeframe);
                let now = self.clock.now_ms();
                let mut state = self.state.borrow_mut();
                let inserted = state.candles.prepend_older(candles);
                state.viewport.shift_for_prepended(inserted);
                state.finish_older_fetch(inserted == 0);
                let candles = state.candles.clone();
                state.indicators.recalculate(&candles, now);
                state.mark_dirty();
                drop(state);
                self.store_cache();
                log_info!(
                    LogComponent::Data,
                    "backfilled {inserted} older candles (reached_oldest={})",
                    inserted == 0
                );
                true
            }
        }
    }

    /// Merges a live push frame into the buffer.
    ///
    /// The stream name must match the current tuning; stale or
    /// malformed frames are rejected without touching the buffer.
    /// Returns the count of freshly opened buckets.
    pub fn apply_stream_message(
        &self,
        stream: &str,
        rows: &[CandleRow],
    ) -> Result<usize, DataError> {
        let key = self.key();
        key.matches_stream(stream)?;
        let timeframe = key.timeframe;
        let now = self.clock.now_ms();
        let mut state = self.state.borrow_mut();
        let mut inserted = 0;
        let mut changed = false;
        let mut dropped = 0;
        for row in rows {
            let Some(candle) = candle_from_row(row, timeframe) else {
                dropped += 1;
                continue;
            };
            use crate::domain::market_data::MergeOutcome::*;
            match state.candles.merge(candle) {
                Inserted => {
                    inserted += 1;
                    changed = true;
                    if !state.interacting {
                        state.viewport.shift_for_new_bucket();
                    }
                }
                Updated => changed = true,
                Unchanged => {}
            }
        }
        if changed {
            let candles = state.candles.clone();
            state.indicators.recalculate(&candles, now);
            state.mark_dirty();
        }
        drop(state);
        if dropped > 0 {
            log_warn_keyed!(
                "stream.malformed_row",
                LogComponent::Stream,
                "dropped {dropped} malformed rows from {stream}"
            );
        }
        Ok(inserted)
    }

    /// Switches timeframe. Returns `false` when unchanged.
    pub async fn set_timeframe(&self, timeframe: Timeframe) -> bool {
        if self.tuning.borrow().timeframe == timeframe {
            return false;
        }
        self.begin_retune();
        self.tuning.borrow_mut().timeframe = timeframe;
        self.load_initial().await;
        true
    }

    /// Switches symbol. Returns `false` when unchanged.
    pub async fn set_symbol(&self, symbol: Symbol) -> bool {
        if self.tuning.borrow().symbol == symbol {
            return false;
        }
        self.begin_retune();
        self.tuning.borrow_mut().symbol = symbol;
        self.load_initial().await;
        true
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Snapshots the outgoing tuning into the cache, invalidates every
    /// in-flight fetch, and resets per-tuning state.
    fn begin_retune(&self) {
        self.store_cache();
        self.epoch.set(self.epoch.get() + 1);
        let mut state = self.state.borrow_mut();
        state.candles.clear();
        state.loading = false;
        state.loading_older = false;
        state.reached_oldest = false;
        state.data_ready = false;
        state.error = None;
        state.viewport.reset(0);
        state.mark_dirty();
    }

    /// Paints the cached buffer for the current tuning if present.
    fn seed_from_cache(&self) -> bool {
        let key = self.key();
        let cache = self.cache.borrow();
        let Some(entry) = cache.get(&key) else {
            return false;
        };
        if entry.candles.is_empty() {
            return false;
        }
        let now = self.clock.now_ms();
        let mut state = self.state.borrow_mut();
        state.candles.replace_all(entry.candles.clone());
        state.reached_oldest = entry.reached_oldest;
        state.data_ready = true;
        state.api_status = ApiStatus::Ok;
        let count = state.candles.len();
        state.viewport.reset(count);
        let candles = state.candles.clone();
        state.indicators.recalculate(&candles, now);
        state.sync_panels();
        state.mark_dirty();
        log_debug!(LogComponent::Data, "seeded {count} candles from cache for {key}");
        true
    }

    fn store_cache(&self) {
        let state = self.state.borrow();
        if !state.data_ready {
            return;
        }
        self.cache.borrow_mut().insert(
            self.key(),
            CacheEntry {
                candles: state.candles.to_vec(),
                reached_oldest: state.reached_oldest,
            },
        );
    }

    fn parse_rows(&self, rows: &[CandleRow], timeframe: Timeframe) -> Vec<Candle> {
        let mut dropped = 0;
        let candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| {
                let parsed = candle_from_row(row, timeframe);
                if parsed.is_none() {
                    dropped += 1;
                }
                parsed
            })
            .collect();
        if dropped > 0 {
            log_warn_keyed!(
                "data.malformed_row",
                LogComponent::Data,
                "dropped {dropped} malformed history rows"
            );
        }
        candles
    }
}
