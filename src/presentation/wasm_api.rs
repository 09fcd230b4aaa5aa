//! JS-facing chart engine facade.
//!
//! The host page owns the canvas element and DOM event wiring; it
//! forwards raw coordinates here. Async work (loads, retunes) is
//! spawned on the local executor so every exported method stays
//! synchronous at the FFI boundary.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::application::config::EngineConfig;
use crate::application::data_manager::DataManager;
use crate::application::interaction::InteractionDispatcher;
use crate::application::render_pipeline::RenderPipeline;
use crate::application::state::{shared_state, SharedState};
use crate::application::subscription_registry::{global_registry, SubscriptionRegistry};
use crate::domain::chart::ChartKind;
use crate::domain::logging::LogComponent;
use crate::domain::market_data::{IndicatorConfig, SubscriptionKey, Symbol, Timeframe};
use crate::infrastructure::clock::BrowserClock;
use crate::infrastructure::http::RestHistorySource;
use crate::infrastructure::rendering::frame_scheduler::BrowserFrameScheduler;
use crate::infrastructure::rendering::scene::Canvas2dCompositor;
use crate::infrastructure::rendering::surface_pool::{CanvasSurfaceFactory, SurfacePool};
use crate::infrastructure::settings::{
    load_indicators, save_indicators, LocalStorageSettings, SettingsStore,
};
use crate::infrastructure::websocket::client::PushChannelClient;
use crate::{log_error, log_info};

#[wasm_bindgen]
pub struct ChartEngine {
    state: SharedState,
    manager: Rc<DataManager>,
    dispatcher: Rc<RefCell<InteractionDispatcher>>,
    pipeline: Rc<RenderPipeline>,
    compositor: Rc<Canvas2dCompositor>,
    registry: Rc<SubscriptionRegistry>,
    settings: Rc<dyn SettingsStore>,
    client: PushChannelClient,
    css_size: Cell<(f64, f64)>,
}

#[wasm_bindgen]
impl ChartEngine {
    /// Builds an engine bound to an existing canvas element.
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas_id: &str,
        width: f64,
        height: f64,
        api_base_url: &str,
        stream_url: &str,
        symbol: &str,
        interval: &str,
    ) -> Result<ChartEngine, JsValue> {
        let config = EngineConfig::default();
        let symbol = Symbol::parse(symbol).map_err(to_js)?;
        let timeframe: Timeframe = interval
            .parse()
            .map_err(|_| JsValue::from_str(&format!("unknown interval {interval:?}")))?;

        let clock = Rc::new(BrowserClock);
        let state = shared_state(width, &config);
        let source = Rc::new(RestHistorySource::new(
            api_base_url,
            config.request_timeout_ms,
        ));
        let manager = Rc::new(DataManager::new(
            Rc::clone(&state),
            source,
            clock.clone() as Rc<dyn crate::domain::time::Clock>,
            config,
            symbol,
            timeframe,
        ));

        let pool = Rc::new(SurfacePool::new(
            CanvasSurfaceFactory,
            clock.clone() as Rc<dyn crate::domain::time::Clock>,
        ));
        let compositor = Rc::new(Canvas2dCompositor::attach(canvas_id, pool)?);
        compositor.resize(width, height);

        let pipeline = Rc::new(RenderPipeline::new(
            Rc::clone(&state),
            Rc::new(BrowserFrameScheduler),
            Rc::clone(&compositor) as Rc<dyn crate::application::render_pipeline::SceneCompositor>,
        ));

        let dispatcher = Rc::new(RefCell::new(InteractionDispatcher::new(
            Rc::clone(&state),
            clock as Rc<dyn crate::domain::time::Clock>,
            config,
            height,
        )));
        {
            let dispatcher = Rc::clone(&dispatcher);
            pipeline.set_hover_source(Box::new(move || dispatcher.borrow().hover()));
        }
        {
            let manager = Rc::clone(&manager);
            dispatcher
                .borrow_mut()
                .set_history_callback(Box::new(move || {
                    let manager = Rc::clone(&manager);
                    spawn_local(async move {
                        manager.fetch_older().await;
                    });
                }));
        }

        let settings: Rc<dyn SettingsStore> = Rc::new(LocalStorageSettings);
        let restored = load_indicators(settings.as_ref());
        if !restored.is_empty() {
            let mut state_mut = state.borrow_mut();
            state_mut.indicators.restore(restored);
            state_mut.sync_panels();
        }

        Ok(ChartEngine {
            state,
            manager,
            dispatcher,
            pipeline,
            compositor,
            registry: global_registry(),
            settings,
            client: PushChannelClient::new(stream_url),
            css_size: Cell::new((width, height)),
        })
    }

    /// Loads history, opens the live stream and starts the render loop.
    pub fn init(&self) {
        let manager = Rc::clone(&self.manager);
        spawn_local(async move {
            manager.load_initial().await;
        });
        self.open_stream();
        let (width, height) = self.css_size.get();
        self.pipeline
            .refresh_structure(width as u32, height as u32);
        self.pipeline.start();
        log_info!(LogComponent::Engine, "chart engine initialized");
    }

    pub fn on_mouse_down(&self, x: f64, y: f64) {
        self.dispatcher.borrow_mut().pointer_down(x, y);
    }

    pub fn on_mouse_move(&self, x: f64, y: f64) {
        self.dispatcher.borrow_mut().pointer_move(x, y);
    }

    pub fn on_mouse_up(&self) {
        self.dispatcher.borrow_mut().pointer_up();
    }

    pub fn on_mouse_leave(&self) {
        self.dispatcher.borrow_mut().pointer_leave();
    }

    /// Returns `true` when the host must call `preventDefault()`.
    pub fn on_wheel(&self, delta_y: f64, x: f64) -> bool {
        self.dispatcher.borrow_mut().wheel(delta_y, x)
    }

    pub fn on_touch_start(&self, xs: Vec<f64>, ys: Vec<f64>) {
        self.dispatcher.borrow_mut().touch_start(&zip_points(xs, ys));
    }

    pub fn on_touch_move(&self, xs: Vec<f64>, ys: Vec<f64>) {
        self.dispatcher.borrow_mut().touch_move(&zip_points(xs, ys));
    }

    pub fn on_touch_end(&self, xs: Vec<f64>, ys: Vec<f64>) {
        self.dispatcher.borrow_mut().touch_end(&zip_points(xs, ys));
    }

    pub fn set_timeframe(&self, interval: &str) -> Result<(), JsValue> {
        let timeframe: Timeframe = interval
            .parse()
            .map_err(|_| JsValue::from_str(&format!("unknown interval {interval:?}")))?;
        let old_key = self.manager.key();
        let manager = Rc::clone(&self.manager);
        spawn_local(async move {
            manager.set_timeframe(timeframe).await;
        });
        self.retune_stream(old_key, SubscriptionKey::new(self.manager.symbol(), timeframe));
        Ok(())
    }

    pub fn set_symbol(&self, symbol: &str) -> Result<(), JsValue> {
        let symbol = Symbol::parse(symbol).map_err(to_js)?;
        let old_key = self.manager.key();
        let new_key = SubscriptionKey::new(symbol.clone(), self.manager.timeframe());
        let manager = Rc::clone(&self.manager);
        spawn_local(async move {
            manager.set_symbol(symbol).await;
        });
        self.retune_stream(old_key, new_key);
        Ok(())
    }

    pub fn set_chart_kind(&self, kind: &str) -> Result<(), JsValue> {
        let kind: ChartKind = kind
            .parse()
            .map_err(|_| JsValue::from_str(&format!("unknown chart kind {kind:?}")))?;
        let mut state = self.state.borrow_mut();
        if state.chart_kind != kind {
            state.chart_kind = kind;
            state.mark_dirty();
        }
        drop(state);
        self.refresh_structure();
        Ok(())
    }

    /// Adds or replaces an indicator from its JSON config, e.g.
    /// `{"id":"sma20","kind":"sma","period":20,"color":4291559424,"visible":true}`.
    pub fn add_indicator(&self, json: &str) -> Result<(), JsValue> {
        let config: IndicatorConfig =
            serde_json::from_str(json).map_err(|err| JsValue::from_str(&err.to_string()))?;
        if config.period == 0 {
            return Err(JsValue::from_str("indicator period must be positive"));
        }
        {
            let mut state = self.state.borrow_mut();
            state.indicators.upsert(config);
            state.sync_panels();
            state.mark_dirty();
        }
        self.after_indicator_change();
        Ok(())
    }

    pub fn remove_indicator(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.state.borrow_mut();
            let removed = state.indicators.remove(id);
            state.sync_panels();
            state.mark_dirty();
            removed
        };
        if removed {
            self.after_indicator_change();
        }
        removed
    }

    pub fn toggle_indicator(&self, id: &str) -> bool {
        let toggled = {
            let mut state = self.state.borrow_mut();
            let toggled = state.indicators.toggle_visible(id);
            state.mark_dirty();
            toggled
        };
        match toggled {
            Some(visible) => {
                self.persist_indicators();
                visible
            }
            None => false,
        }
    }

    pub fn toggle_panel(&self, id: &str) -> bool {
        let toggled = {
            let mut state = self.state.borrow_mut();
            let toggled = state.panels.toggle_collapsed(id);
            state.mark_dirty();
            toggled
        };
        if toggled.is_some() {
            self.refresh_structure();
        }
        toggled.unwrap_or(false)
    }

    pub fn resize(&self, width: f64, height: f64) {
        self.css_size.set((width, height));
        self.compositor.resize(width, height);
        self.dispatcher.borrow_mut().set_canvas_height(height);
        {
            let mut state = self.state.borrow_mut();
            state.viewport.resize(width);
            state.mark_dirty();
        }
        self.refresh_structure();
    }

    /// Retry action for the error banner.
    pub fn retry(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.error = None;
            state.mark_dirty();
        }
        let manager = Rc::clone(&self.manager);
        spawn_local(async move {
            manager.fetch_fresh(true).await;
        });
    }

    /// Tears down the stream and stops rendering. The engine must not
    /// be used afterwards.
    pub fn dispose(&self) {
        self.close_stream(self.manager.key());
        self.pipeline.stop();
        log_info!(LogComponent::Engine, "chart engine disposed");
    }
}

impl ChartEngine {
    fn open_stream(&self) {
        let key = self.manager.key();
        if self.registry.acquire(&key) {
            let handle = self.client.spawn(
                key.clone(),
                Rc::clone(&self.manager),
                Rc::clone(&self.state),
            );
            // The registry aborts the stream for whichever holder
            // releases last, not necessarily this instance.
            self.registry
                .attach_teardown(&key, Box::new(move || handle.abort()));
        }
    }

    fn close_stream(&self, key: SubscriptionKey) {
        self.registry.release(&key);
    }

    fn retune_stream(&self, old_key: SubscriptionKey, new_key: SubscriptionKey) {
        if old_key == new_key {
            return;
        }
        self.close_stream(old_key);
        if self.registry.acquire(&new_key) {
            let handle = self.client.spawn(
                new_key.clone(),
                Rc::clone(&self.manager),
                Rc::clone(&self.state),
            );
            self.registry
                .attach_teardown(&new_key, Box::new(move || handle.abort()));
        }
    }

    fn after_indicator_change(&self) {
        {
            let mut state = self.state.borrow_mut();
            let candles = state.candles.clone();
            let now = js_sys::Date::now();
            state.indicators.recalculate(&candles, now);
        }
        self.persist_indicators();
        self.refresh_structure();
    }

    fn persist_indicators(&self) {
        let configs = self.state.borrow().indicators.configs().to_vec();
        save_indicators(self.settings.as_ref(), &configs);
    }

    fn refresh_structure(&self) {
        let (width, height) = self.css_size.get();
        self.pipeline
            .refresh_structure(width as u32, height as u32);
    }
}

fn zip_points(xs: Vec<f64>, ys: Vec<f64>) -> Vec<(f64, f64)> {
    if xs.len() != ys.len() {
        log_error!(
            LogComponent::Input,
            "touch point arrays disagree: {} vs {}",
            xs.len(),
            ys.len()
        );
    }
    xs.into_iter().zip(ys).collect()
}

fn to_js(err: crate::domain::errors::DataError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
