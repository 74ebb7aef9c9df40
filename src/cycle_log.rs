//! Injected logging capability.
//!
//! A [ReceiverLog] is built once per receiver and handed to the components it owns.
//! Each poll cycle derives a [CycleLog] from it, so every event carries the
//! receiver name, the cycle id and the script reference without any global logger.

use std::fmt;
use std::sync::Arc;

/// Receiver-scoped log sink.
#[derive(Clone)]
pub struct ReceiverLog {
  receiver: Arc<str>,
  script: Arc<str>,
}

impl ReceiverLog {
  pub fn new(receiver: impl AsRef<str>, script: impl AsRef<str>) -> Self {
    Self {
      receiver: Arc::from(receiver.as_ref()),
      script: Arc::from(script.as_ref()),
    }
  }

  pub fn receiver(&self) -> &str {
    &self.receiver
  }

  pub fn script(&self) -> &str {
    &self.script
  }

  /// Derives the sink for one poll cycle.
  pub fn for_cycle(&self, cycle_id: u64) -> CycleLog {
    CycleLog {
      receiver: Arc::clone(&self.receiver),
      script: Arc::clone(&self.script),
      cycle_id,
    }
  }

  pub fn warn(&self, message: impl fmt::Display) {
    tracing::warn!(receiver = %self.receiver, "{}", message);
  }
}

impl fmt::Debug for ReceiverLog {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ReceiverLog")
      .field("receiver", &self.receiver)
      .finish()
  }
}

/// Cycle-scoped, write-only log sink. This is the `log` binding decoders receive.
#[derive(Clone)]
pub struct CycleLog {
  receiver: Arc<str>,
  script: Arc<str>,
  cycle_id: u64,
}

impl CycleLog {
  pub fn receiver(&self) -> &str {
    &self.receiver
  }

  pub fn script(&self) -> &str {
    &self.script
  }

  pub fn cycle_id(&self) -> u64 {
    self.cycle_id
  }

  pub fn trace(&self, message: impl fmt::Display) {
    tracing::trace!(receiver = %self.receiver, cycle = self.cycle_id, script = %self.script, "{}", message);
  }

  pub fn debug(&self, message: impl fmt::Display) {
    tracing::debug!(receiver = %self.receiver, cycle = self.cycle_id, script = %self.script, "{}", message);
  }

  pub fn info(&self, message: impl fmt::Display) {
    tracing::info!(receiver = %self.receiver, cycle = self.cycle_id, script = %self.script, "{}", message);
  }

  pub fn warn(&self, message: impl fmt::Display) {
    tracing::warn!(receiver = %self.receiver, cycle = self.cycle_id, script = %self.script, "{}", message);
  }

  pub fn error(&self, message: impl fmt::Display) {
    tracing::error!(receiver = %self.receiver, cycle = self.cycle_id, script = %self.script, "{}", message);
  }
}

impl fmt::Debug for CycleLog {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CycleLog")
      .field("receiver", &self.receiver)
      .field("cycle_id", &self.cycle_id)
      .finish()
  }
}
