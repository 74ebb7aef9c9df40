//! Result of one poll cycle.

use chrono::{DateTime, Utc};

use super::CycleStatus;
use crate::error::DecodeError;

/// Summary of one poll cycle. Never persisted; returned by the executor and logged.
#[derive(Debug, Clone)]
pub struct CycleResult {
  /// Per-receiver sequence number, starting at 1.
  pub cycle_id: u64,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub status: CycleStatus,
  /// Payloads the decode step placed into `outputs`.
  pub produced: usize,
  /// Payloads the output contract accepted.
  pub forwarded: usize,
  /// Payloads the output contract rejected.
  pub forward_failures: usize,
  /// Decode failure, if any.
  pub error: Option<DecodeError>,
}

impl CycleResult {
  pub fn is_success(&self) -> bool {
    self.status == CycleStatus::Success
  }

  /// Payloads produced but neither forwarded nor rejected (dropped by policy).
  pub fn discarded(&self) -> usize {
    self
      .produced
      .saturating_sub(self.forwarded + self.forward_failures)
  }
}
