pub mod config;
pub mod data_manager;
pub mod interaction;
pub mod render_pipeline;
pub mod state;
pub mod subscription_registry;

pub use config::EngineConfig;
pub use data_manager::{CandleRow, DataManager, HistoricalSource, HistoryRequest};
pub use interaction::InteractionDispatcher;
pub use render_pipeline::{
    FramePacer, FrameScheduler, FrameSkipped, RenderPipeline, SceneCompositor, StructuralInputs,
};
pub use state::{shared_state, ChartState, SharedState};
pub use subscription_registry::{global_registry, SubscriptionRegistry};
