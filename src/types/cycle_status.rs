//! Outcome status of one poll cycle.

use std::fmt;

use serde::Serialize;

/// Outcome status of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
  /// Decode completed and every produced payload was forwarded.
  Success,
  /// Decode completed but at least one forward was rejected.
  PartialSuccess,
  /// Decode (fetch or script) failed.
  Failed,
}

impl fmt::Display for CycleStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CycleStatus::Success => write!(f, "success"),
      CycleStatus::PartialSuccess => write!(f, "partial_success"),
      CycleStatus::Failed => write!(f, "failed"),
    }
  }
}
