//! REST history backend.
//!
//! `GET {base}/api/v1/klines?symbol=BTCUSDT&interval=1m&from=..&to=..&duration=..`
//! returning a JSON array of `[openTime, open, high, low, close, volume]`
//! rows. Requests race a timeout so a hung gateway cannot wedge the
//! loading flags forever.

use futures::future::{self, Either, LocalBoxFuture};
use gloo_net::http::Request;
use gloo_timers::future::TimeoutFuture;

use crate::application::data_manager::{CandleRow, HistoricalSource, HistoryRequest};
use crate::domain::errors::DataError;
use crate::domain::logging::LogComponent;
use crate::log_debug;

pub struct RestHistorySource {
    base_url: String,
    timeout_ms: u32,
}

impl RestHistorySource {
    pub fn new(base_url: &str, timeout_ms: u32) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_ms,
        }
    }

    fn url_for(&self, request: &HistoryRequest) -> String {
        format!(
            "{}/api/v1/klines?symbol={}&interval={}&from={}&to={}&duration={}",
            self.base_url,
            request.symbol.normalized(),
            request.timeframe,
            request.from_ms,
            request.to_ms,
            request.timeframe.duration_ms()
        )
    }
}

impl HistoricalSource for RestHistorySource {
    fn fetch(
        &self,
        request: HistoryRequest,
    ) -> LocalBoxFuture<'_, Result<Vec<CandleRow>, DataError>> {
        Box::pin(async move {
            let url = self.url_for(&request);
            log_debug!(LogComponent::Data, "GET {url}");
            let send = async {
                let response = Request::get(&url)
                    .send()
                    .await
                    .map_err(|err| DataError::Network(err.to_string()))?;
                if !response.ok() {
                    return Err(DataError::Network(format!(
                        "http {} from {url}",
                        response.status()
                    )));
                }
                let mut rows: Vec<CandleRow> = response
                    .json()
                    .await
                    .map_err(|err| DataError::Malformed(err.to_string()))?;
                rows.sort_by(|a, b| a[0].total_cmp(&b[0]));
                Ok(rows)
            };
            futures::pin_mut!(send);
            let timeout = TimeoutFuture::new(self.timeout_ms);
            match future::select(send, timeout).await {
                Either::Left((result, _)) => result,
                Either::Right(_) => Err(DataError::Network(format!(
                    "timeout after {}ms",
                    self.timeout_ms
                ))),
            }
        })
    }
}
