//! Wire shapes for the push channel.

use serde::{Deserialize, Serialize};

use crate::application::data_manager::CandleRow;
use crate::domain::market_data::SubscriptionKey;

/// Subscribe/unsubscribe control frame.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ControlFrame {
    pub op: &'static str,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub market: &'static str,
    pub interval: String,
}

impl ControlFrame {
    pub fn subscribe(key: &SubscriptionKey) -> Self {
        Self::with_op("subscribe", key)
    }

    pub fn unsubscribe(key: &SubscriptionKey) -> Self {
        Self::with_op("unsubscribe", key)
    }

    fn with_op(op: &'static str, key: &SubscriptionKey) -> Self {
        Self {
            op,
            symbol: key.symbol.normalized(),
            kind: "candles",
            market: "spot",
            interval: key.timeframe.to_string(),
        }
    }
}

/// Incoming data frame: the stream name plus one or more candle rows.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StreamEnvelope {
    pub stream: String,
    pub data: Vec<CandleRow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::{Symbol, Timeframe};

    #[test]
    fn subscribe_frame_serializes_wire_fields() {
        let key = SubscriptionKey::new(
            Symbol::parse("BTC/USDT").unwrap(),
            Timeframe::OneMinute,
        );
        let json = serde_json::to_value(ControlFrame::subscribe(&key)).unwrap();
        assert_eq!(json["op"], "subscribe");
        assert_eq!(json["symbol"], "BTCUSDT");
        assert_eq!(json["type"], "candles");
        assert_eq!(json["market"], "spot");
        assert_eq!(json["interval"], "1m");
    }

    #[test]
    fn envelope_parses_tuple_rows() {
        let envelope: StreamEnvelope = serde_json::from_str(
            r#"{"stream":"candles:1m:BTCUSDT","data":[[60000,1.0,2.0,0.5,1.5,10.0]]}"#,
        )
        .unwrap();
        assert_eq!(envelope.stream, "candles:1m:BTCUSDT");
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data[0][4], 1.5);
    }
}
