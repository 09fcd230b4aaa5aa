pub mod panels;
pub mod viewport;

use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};

pub use panels::{IndicatorPanel, PanelLayout, PanelRegion};
pub use viewport::{ViewportController, ViewportPolicy, VisibleRange};

/// How the price series is drawn in the main area.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, EnumString, Default,
)]
pub enum ChartKind {
    #[default]
    #[strum(serialize = "candles")]
    #[serde(rename = "candles")]
    Candles,
    #[strum(serialize = "line")]
    #[serde(rename = "line")]
    Line,
    #[strum(serialize = "area")]
    #[serde(rename = "area")]
    Area,
    #[strum(serialize = "bars")]
    #[serde(rename = "bars")]
    Bars,
}
