//! Output contract: where each received payload goes next.
//!
//! The executor calls [OutputContract::forward] once per payload, in emission
//! order, and does not wait for downstream processing. [ChannelOutput] is the
//! standard implementation: a bounded channel whose consumer side is a stream
//! the event-source pipeline reads. It never waits for room; a full channel
//! rejects the payload and the cycle moves on.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::ForwardError;
use crate::types::{Payload, ReceivedEvent};

/// Hand-off point to the downstream pipeline.
#[async_trait]
pub trait OutputContract: Send + Sync {
  /// Takes ownership of one payload. Returns once the payload is handed off, not once it is processed.
  async fn forward(&self, payload: Payload) -> Result<(), ForwardError>;
}

#[async_trait]
impl<T: OutputContract + ?Sized> OutputContract for Arc<T> {
  async fn forward(&self, payload: Payload) -> Result<(), ForwardError> {
    (**self).forward(payload).await
  }
}

/// Forwards payloads into a bounded channel, tagged with the receiver name.
#[derive(Debug, Clone)]
pub struct ChannelOutput {
  origin: Arc<str>,
  tx: mpsc::Sender<ReceivedEvent>,
}

impl ChannelOutput {
  /// Creates the output and the stream the downstream pipeline consumes.
  pub fn new(origin: impl AsRef<str>, capacity: usize) -> (Self, ReceiverStream<ReceivedEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Self::from_sender(origin, tx), ReceiverStream::new(rx))
  }

  /// Wraps an existing sender, e.g. one shared by several receivers.
  pub fn from_sender(origin: impl AsRef<str>, tx: mpsc::Sender<ReceivedEvent>) -> Self {
    Self {
      origin: Arc::from(origin.as_ref()),
      tx,
    }
  }

  /// Same channel, different origin tag.
  pub fn for_origin(&self, origin: impl AsRef<str>) -> Self {
    Self::from_sender(origin, self.tx.clone())
  }

  pub fn origin(&self) -> &str {
    &self.origin
  }
}

#[async_trait]
impl OutputContract for ChannelOutput {
  async fn forward(&self, payload: Payload) -> Result<(), ForwardError> {
    self
      .tx
      .try_send(ReceivedEvent::new(self.origin.as_ref(), payload))
      .map_err(|e| match e {
        TrySendError::Full(_) => ForwardError::Full,
        TrySendError::Closed(_) => ForwardError::Closed,
      })
  }
}
