//! Lifecycle state of a receiver.

use std::fmt;

use serde::Serialize;

/// `Stopped → Starting → Running → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverState {
  #[default]
  Stopped,
  Starting,
  Running,
  Stopping,
}

impl ReceiverState {
  /// True while the polling task may still fire cycles.
  pub fn is_active(self) -> bool {
    matches!(self, ReceiverState::Starting | ReceiverState::Running)
  }
}

impl fmt::Display for ReceiverState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReceiverState::Stopped => write!(f, "stopped"),
      ReceiverState::Starting => write!(f, "starting"),
      ReceiverState::Running => write!(f, "running"),
      ReceiverState::Stopping => write!(f, "stopping"),
    }
  }
}
