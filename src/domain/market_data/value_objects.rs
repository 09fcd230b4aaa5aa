//! Market data value objects: symbols, timeframes, timestamps and the
//! subscription identity used for push streams.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumIter, EnumString};

use crate::domain::errors::DataError;

/// Trading pair, e.g. `BTC/USDT`. Stored uppercased; `normalized()`
/// yields the concatenated form used on the wire (`BTCUSDT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display(fmt = "{}/{}", base, quote)]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    pub fn new(base: &str, quote: &str) -> Result<Self, DataError> {
        let base = base.trim().to_uppercase();
        let quote = quote.trim().to_uppercase();
        if base.is_empty() || quote.is_empty() {
            return Err(DataError::InvalidRequest(
                "symbol base and quote must be non-empty".into(),
            ));
        }
        if !base.chars().all(|c| c.is_ascii_alphanumeric())
            || !quote.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(DataError::InvalidRequest(format!(
                "symbol contains invalid characters: {base}/{quote}"
            )));
        }
        Ok(Self { base, quote })
    }

    /// Parses `"BTC/USDT"` (any case, optional whitespace).
    pub fn parse(input: &str) -> Result<Self, DataError> {
        let (base, quote) = input.split_once('/').ok_or_else(|| {
            DataError::InvalidRequest(format!("expected BASE/QUOTE, got {input:?}"))
        })?;
        Self::new(base, quote)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Wire form without the separator, e.g. `BTCUSDT`.
    pub fn normalized(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

/// Candle bucket width.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    EnumIter,
)]
pub enum Timeframe {
    #[strum(serialize = "1m")]
    #[serde(rename = "1m")]
    OneMinute,
    #[strum(serialize = "5m")]
    #[serde(rename = "5m")]
    FiveMinutes,
    #[strum(serialize = "15m")]
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[strum(serialize = "30m")]
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[strum(serialize = "1h")]
    #[serde(rename = "1h")]
    OneHour,
    #[strum(serialize = "4h")]
    #[serde(rename = "4h")]
    FourHours,
    #[strum(serialize = "1d")]
    #[serde(rename = "1d")]
    OneDay,
    #[strum(serialize = "1w")]
    #[serde(rename = "1w")]
    OneWeek,
    #[strum(serialize = "1M")]
    #[serde(rename = "1M")]
    OneMonth,
}

impl Timeframe {
    pub fn duration_ms(&self) -> u64 {
        match self {
            Timeframe::OneMinute => 60_000,
            Timeframe::FiveMinutes => 300_000,
            Timeframe::FifteenMinutes => 900_000,
            Timeframe::ThirtyMinutes => 1_800_000,
            Timeframe::OneHour => 3_600_000,
            Timeframe::FourHours => 14_400_000,
            Timeframe::OneDay => 86_400_000,
            Timeframe::OneWeek => 604_800_000,
            // Calendar months are irregular; buckets use a fixed 30 days.
            Timeframe::OneMonth => 2_592_000_000,
        }
    }
}

/// Millisecond epoch timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Snaps to the opening time of the bucket containing this instant.
    pub fn align_to(&self, timeframe: Timeframe) -> Self {
        let dur = timeframe.duration_ms();
        Self(self.0 / dur * dur)
    }
}

/// Identity of one live push stream: a (symbol, timeframe) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display(fmt = "{}@{}", "symbol.normalized()", timeframe)]
pub struct SubscriptionKey {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
}

impl SubscriptionKey {
    pub fn new(symbol: Symbol, timeframe: Timeframe) -> Self {
        Self { symbol, timeframe }
    }

    /// Wire stream name, `candles:<interval>:<SYMBOL>`.
    pub fn stream_name(&self) -> String {
        format!("candles:{}:{}", self.timeframe, self.symbol.normalized())
    }

    /// Checks an incoming stream name against this key.
    ///
    /// Returns `Ok(())` on a match, `StaleStream` for a well-formed name
    /// addressing a different symbol/timeframe, and `Malformed` for
    /// anything else. The symbol segment is optional on the wire; a
    /// two-segment name matches on interval alone.
    pub fn matches_stream(&self, stream: &str) -> Result<(), DataError> {
        let mut parts = stream.split(':');
        let prefix = parts.next().unwrap_or("");
        if prefix != "candles" {
            return Err(DataError::Malformed(format!(
                "unknown stream prefix in {stream:?}"
            )));
        }
        let interval: Timeframe = parts
            .next()
            .unwrap_or("")
            .parse()
            .map_err(|_| DataError::Malformed(format!("bad interval in {stream:?}")))?;
        let symbol = parts.next();
        if parts.next().is_some() {
            return Err(DataError::Malformed(format!(
                "too many segments in {stream:?}"
            )));
        }
        if interval != self.timeframe {
            return Err(DataError::StaleStream(stream.to_string()));
        }
        if let Some(symbol) = symbol {
            if !symbol.eq_ignore_ascii_case(&self.symbol.normalized()) {
                return Err(DataError::StaleStream(stream.to_string()));
            }
        }
        Ok(())
    }
}
