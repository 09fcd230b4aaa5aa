pub mod entities;
pub mod indicator_engine;
pub mod value_objects;

pub use entities::{
    candle_from_row, Candle, CandleSeries, MergeOutcome, Ohlcv, LAST_BUCKET_EPSILON,
    UPDATE_EPSILON,
};
pub use indicator_engine::{
    IndicatorConfig, IndicatorEngine, IndicatorKind, IndicatorSeries,
};
pub use value_objects::{SubscriptionKey, Symbol, Timeframe, Timestamp};
