pub mod client;
pub mod dto;

pub use client::{PushChannelClient, StreamHandle};
pub use dto::{ControlFrame, StreamEnvelope};
