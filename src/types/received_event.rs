//! Envelope handed to the downstream pipeline by [crate::output::ChannelOutput].

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Payload;

/// A forwarded payload tagged with the receiver it came from.
#[derive(Debug, Clone, Serialize)]
pub struct ReceivedEvent {
  /// Display name of the originating receiver.
  pub origin: String,
  pub payload: Payload,
  pub received_at: DateTime<Utc>,
}

impl ReceivedEvent {
  pub fn new(origin: impl Into<String>, payload: Payload) -> Self {
    Self {
      origin: origin.into(),
      payload,
      received_at: Utc::now(),
    }
  }
}
