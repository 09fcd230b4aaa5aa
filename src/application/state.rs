//! Single shared chart state.
//!
//! Everything mutable the engine tracks lives here behind one
//! `Rc<RefCell<_>>`. Mutations bump a version and set the dirty flag;
//! the render pipeline consumes the flag, nothing else does.

use std::cell::RefCell;
use std::rc::Rc;

use crate::domain::chart::{ChartKind, PanelLayout, ViewportController};
use crate::domain::errors::{ApiStatus, DataError, StreamStatus};
use crate::domain::market_data::{CandleSeries, IndicatorEngine};

use super::config::EngineConfig;

pub struct ChartState {
    pub candles: CandleSeries,
    pub viewport: ViewportController,
    pub panels: PanelLayout,
    pub indicators: IndicatorEngine,
    pub chart_kind: ChartKind,
    /// Initial or refetch load in flight.
    pub loading: bool,
    /// Older-history backfill in flight. At most one at a time.
    pub loading_older: bool,
    /// The upstream returned no rows before our oldest candle.
    pub reached_oldest: bool,
    /// First successful load landed; rendering may draw data.
    pub data_ready: bool,
    /// A pointer/touch gesture is in progress.
    pub interacting: bool,
    pub error: Option<DataError>,
    pub api_status: ApiStatus,
    pub stream_status: StreamStatus,
    dirty: bool,
    version: u64,
}

impl ChartState {
    pub fn new(width_px: f64, config: &EngineConfig) -> Self {
        Self {
            candles: CandleSeries::new(),
            viewport: ViewportController::new(width_px, config.viewport),
            panels: PanelLayout::new(),
            indicators: IndicatorEngine::new(),
            chart_kind: ChartKind::Candles,
            loading: false,
            loading_older: false,
            reached_oldest: false,
            data_ready: false,
            interacting: false,
            error: None,
            api_status: ApiStatus::Idle,
            stream_status: StreamStatus::Disconnected,
            dirty: true,
            version: 0,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.version += 1;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag after a successful draw.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Synchronous guard for older-history fetches. Returns `false`
    /// when any fetch is already running, history is exhausted, or no
    /// data has loaded yet.
    pub fn begin_older_fetch(&mut self) -> bool {
        if self.loading || self.loading_older || self.reached_oldest || !self.data_ready {
            return false;
        }
        self.loading_older = true;
        true
    }

    pub fn finish_older_fetch(&mut self, reached_oldest: bool) {
        self.loading_older = false;
        if reached_oldest {
            self.reached_oldest = true;
        }
    }

    /// Re-derives panel stack from current indicator configs.
    pub fn sync_panels(&mut self) {
        let ids = self.indicators.panel_ids();
        self.panels.sync_ids(&ids);
    }
}

pub type SharedState = Rc<RefCell<ChartState>>;

pub fn shared_state(width_px: f64, config: &EngineConfig) -> SharedState {
    Rc::new(RefCell::new(ChartState::new(width_px, config)))
}
