pub mod frame_scheduler;
pub mod geometry;
pub mod scene;
pub mod surface_pool;

pub use frame_scheduler::{BrowserFrameScheduler, ManualScheduler};
pub use scene::Canvas2dCompositor;
pub use surface_pool::{
    CanvasSurface, CanvasSurfaceFactory, SurfaceFactory, SurfacePool, IDLE_EVICT_MS, POOL_CAP,
    SWEEP_INTERVAL_MS,
};
