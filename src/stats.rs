//! Per-receiver counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::DecodeError;
use crate::types::{CycleResult, CycleStatus};

/// Lock-free counters updated by the polling task and read by anyone holding the receiver.
#[derive(Debug, Default)]
pub struct ReceiverStats {
  cycles: AtomicU64,
  succeeded: AtomicU64,
  partially_succeeded: AtomicU64,
  failed: AtomicU64,
  fetch_errors: AtomicU64,
  script_errors: AtomicU64,
  overruns: AtomicU64,
  payloads_forwarded: AtomicU64,
  forward_errors: AtomicU64,
  payloads_discarded: AtomicU64,
}

/// Point-in-time copy of [ReceiverStats].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
  pub cycles: u64,
  pub succeeded: u64,
  pub partially_succeeded: u64,
  pub failed: u64,
  pub fetch_errors: u64,
  pub script_errors: u64,
  /// Cycles that ran longer than the polling interval (their missed ticks were skipped).
  pub overruns: u64,
  pub payloads_forwarded: u64,
  pub forward_errors: u64,
  pub payloads_discarded: u64,
}

impl ReceiverStats {
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn record_cycle_started(&self) {
    self.cycles.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_decode_failure(&self, err: &DecodeError) {
    if err.is_fetch() {
      self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    } else {
      self.script_errors.fetch_add(1, Ordering::Relaxed);
    }
  }

  pub(crate) fn record_overrun(&self) {
    self.overruns.fetch_add(1, Ordering::Relaxed);
  }

  /// Folds a finished cycle into the counters.
  pub(crate) fn record_cycle(&self, result: &CycleResult) {
    let counter = match result.status {
      CycleStatus::Success => &self.succeeded,
      CycleStatus::PartialSuccess => &self.partially_succeeded,
      CycleStatus::Failed => &self.failed,
    };
    counter.fetch_add(1, Ordering::Relaxed);
    self
      .payloads_forwarded
      .fetch_add(result.forwarded as u64, Ordering::Relaxed);
    self
      .forward_errors
      .fetch_add(result.forward_failures as u64, Ordering::Relaxed);
    self
      .payloads_discarded
      .fetch_add(result.discarded() as u64, Ordering::Relaxed);
  }

  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      cycles: self.cycles.load(Ordering::Relaxed),
      succeeded: self.succeeded.load(Ordering::Relaxed),
      partially_succeeded: self.partially_succeeded.load(Ordering::Relaxed),
      failed: self.failed.load(Ordering::Relaxed),
      fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
      script_errors: self.script_errors.load(Ordering::Relaxed),
      overruns: self.overruns.load(Ordering::Relaxed),
      payloads_forwarded: self.payloads_forwarded.load(Ordering::Relaxed),
      forward_errors: self.forward_errors.load(Ordering::Relaxed),
      payloads_discarded: self.payloads_discarded.load(Ordering::Relaxed),
    }
  }
}
