//! Push channel client with reconnect.
//!
//! One task per open stream. Drops are retried with a doubling backoff
//! (1s up to 32s) that resets after a successful connect. The task ends
//! when its [`StreamHandle`] is aborted, which happens when the last
//! registry holder releases the subscription.

use std::cell::Cell;
use std::rc::Rc;

use futures::{SinkExt, StreamExt};
use gloo_net::websocket::{futures::WebSocket, Message};
use gloo_timers::future::TimeoutFuture;
use wasm_bindgen_futures::spawn_local;

use crate::application::data_manager::DataManager;
use crate::application::state::SharedState;
use crate::domain::errors::{DataError, StreamStatus};
use crate::domain::logging::LogComponent;
use crate::domain::market_data::SubscriptionKey;
use crate::{log_error, log_info, log_warn_keyed};

use super::dto::{ControlFrame, StreamEnvelope};

const INITIAL_BACKOFF_MS: u32 = 1_000;
const MAX_BACKOFF_MS: u32 = 32_000;

/// Cancels the owning stream task when aborted.
#[derive(Clone)]
pub struct StreamHandle {
    stop: Rc<Cell<bool>>,
}

impl StreamHandle {
    pub fn abort(&self) {
        self.stop.set(true);
    }
}

pub struct PushChannelClient {
    url: String,
}

impl PushChannelClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    /// Opens the stream for `key` and keeps it alive until aborted.
    pub fn spawn(
        &self,
        key: SubscriptionKey,
        manager: Rc<DataManager>,
        state: SharedState,
    ) -> StreamHandle {
        let stop = Rc::new(Cell::new(false));
        let handle = StreamHandle {
            stop: Rc::clone(&stop),
        };
        let url = self.url.clone();
        spawn_local(async move {
            run_stream(url, key, manager, state, stop).await;
        });
        handle
    }
}

async fn run_stream(
    url: String,
    key: SubscriptionKey,
    manager: Rc<DataManager>,
    state: SharedState,
    stop: Rc<Cell<bool>>,
) {
    let mut backoff = INITIAL_BACKOFF_MS;
    let mut first_attempt = true;
    while !stop.get() {
        set_status(
            &state,
            if first_attempt {
                StreamStatus::Connecting
            } else {
                StreamStatus::Reconnecting
            },
        );
        first_attempt = false;
        match WebSocket::open(&url) {
            Ok(socket) => {
                log_info!(LogComponent::Stream, "connected, tuning to {key}");
                let (mut sink, mut source) = socket.split();
                let subscribe = match serde_json::to_string(&ControlFrame::subscribe(&key)) {
                    Ok(frame) => frame,
                    Err(err) => {
                        log_error!(LogComponent::Stream, "subscribe encode failed: {err}");
                        return;
                    }
                };
                if sink.send(Message::Text(subscribe)).await.is_err() {
                    log_error!(LogComponent::Stream, "subscribe send failed for {key}");
                } else {
                    set_status(&state, StreamStatus::Live);
                    backoff = INITIAL_BACKOFF_MS;
                    while let Some(message) = source.next().await {
                        if stop.get() {
                            let frame = serde_json::to_string(&ControlFrame::unsubscribe(&key))
                                .unwrap_or_default();
                            let _ = sink.send(Message::Text(frame)).await;
                            set_status(&state, StreamStatus::Disconnected);
                            return;
                        }
                        match message {
                            Ok(Message::Text(text)) => handle_frame(&manager, &text),
                            Ok(Message::Bytes(_)) => {}
                            Err(err) => {
                                log_warn_keyed!(
                                    "stream.read_error",
                                    LogComponent::Stream,
                                    "stream read failed: {err:?}"
                                );
                                break;
                            }
                        }
                    }
                }
            }
            Err(err) => {
                log_warn_keyed!(
                    "stream.connect_error",
                    LogComponent::Stream,
                    "connect failed: {err:?}"
                );
            }
        }
        if stop.get() {
            break;
        }
        log_info!(LogComponent::Stream, "reconnecting in {backoff}ms");
        set_status(&state, StreamStatus::Reconnecting);
        TimeoutFuture::new(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF_MS);
    }
    set_status(&state, StreamStatus::Disconnected);
}

fn handle_frame(manager: &DataManager, text: &str) {
    let envelope: StreamEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            log_warn_keyed!(
                "stream.malformed_frame",
                LogComponent::Stream,
                "unparseable frame: {err}"
            );
            return;
        }
    };
    match manager.apply_stream_message(&envelope.stream, &envelope.data) {
        Ok(_) => {}
        Err(DataError::StaleStream(stream)) => {
            log_warn_keyed!(
                "stream.stale",
                LogComponent::Stream,
                "discarded frame for stale stream {stream}"
            );
        }
        Err(err) => {
            log_warn_keyed!(
                "stream.rejected",
                LogComponent::Stream,
                "discarded frame: {err}"
            );
        }
    }
}

fn set_status(state: &SharedState, status: StreamStatus) {
    let mut state = state.borrow_mut();
    if state.stream_status != status {
        state.stream_status = status;
        state.mark_dirty();
    }
}
