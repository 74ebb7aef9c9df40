//! Poll cycle executor: one fetch/decode/forward pass with failure isolation.
//!
//! [PollCycleExecutor::run_once] never returns an error and never panics on a
//! misbehaving decoder. Every failure becomes part of the returned
//! [CycleResult], so the scheduler can keep firing.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tracing::instrument;

use crate::binding::BindingContext;
use crate::cycle_log::{CycleLog, ReceiverLog};
use crate::decoder::Decoder;
use crate::error::DecodeError;
use crate::output::OutputContract;
use crate::source::PayloadSourceClient;
use crate::stats::ReceiverStats;
use crate::types::{CycleResult, CycleStatus, PartialOutputPolicy, Payload};

/// Runs poll cycles for one receiver. Owned by that receiver's polling task.
pub struct PollCycleExecutor {
  source: Arc<dyn PayloadSourceClient>,
  decoder: Arc<dyn Decoder>,
  output: Arc<dyn OutputContract>,
  log: ReceiverLog,
  stats: Arc<ReceiverStats>,
  timeout: Option<Duration>,
  policy: PartialOutputPolicy,
  last_cycle: u64,
}

impl PollCycleExecutor {
  pub fn new(
    source: Arc<dyn PayloadSourceClient>,
    decoder: Arc<dyn Decoder>,
    output: Arc<dyn OutputContract>,
    log: ReceiverLog,
    stats: Arc<ReceiverStats>,
  ) -> Self {
    Self {
      source,
      decoder,
      output,
      log,
      stats,
      timeout: None,
      policy: PartialOutputPolicy::default(),
      last_cycle: 0,
    }
  }

  /// Bounds the decode step of every cycle.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn with_policy(mut self, policy: PartialOutputPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn log(&self) -> &ReceiverLog {
    &self.log
  }

  /// Runs one cycle: fresh bindings, decode, then forward each produced payload in order.
  #[instrument(level = "trace", skip(self), fields(receiver = %self.log.receiver()))]
  pub async fn run_once(&mut self) -> CycleResult {
    self.last_cycle += 1;
    let cycle_id = self.last_cycle;
    let started_at = Utc::now();
    let log = self.log.for_cycle(cycle_id);
    self.stats.record_cycle_started();

    let mut ctx = BindingContext::build(Arc::clone(&self.source), log.clone());
    log.debug(format!(
      "About to execute '{}' ({} decoder)",
      log.script(),
      self.decoder.kind()
    ));
    let decoded = self.decode(&mut ctx).await;
    let outputs = ctx.into_outputs();
    let produced = outputs.len();

    if let Err(e) = &decoded {
      self.stats.record_decode_failure(e);
      let message = format!(
        "cycle failed at {} after producing {} payload(s): {}",
        started_at.to_rfc3339(),
        produced,
        e
      );
      // Fetch failures are transient and retried on the next tick.
      if e.is_fetch() {
        log.warn(message);
      } else {
        log.error(message);
      }
    }

    let should_forward = decoded.is_ok() || self.policy == PartialOutputPolicy::Forward;
    let (forwarded, forward_failures) = if should_forward {
      self.forward_all(outputs, &log).await
    } else {
      if produced > 0 {
        log.warn(format!("discarding {} payload(s) from failed cycle", produced));
      }
      (0, 0)
    };

    let status = match (&decoded, forward_failures) {
      (Err(_), _) => CycleStatus::Failed,
      (Ok(()), 0) => CycleStatus::Success,
      (Ok(()), _) => CycleStatus::PartialSuccess,
    };
    let result = CycleResult {
      cycle_id,
      started_at,
      finished_at: Utc::now(),
      status,
      produced,
      forwarded,
      forward_failures,
      error: decoded.err(),
    };
    self.stats.record_cycle(&result);
    log.trace(format!(
      "cycle {}: produced={} forwarded={} rejected={}",
      status, produced, forwarded, forward_failures
    ));
    result
  }

  /// Decode step with the timeout and panic boundary applied.
  async fn decode(&self, ctx: &mut BindingContext) -> Result<(), DecodeError> {
    let guarded = AssertUnwindSafe(self.decoder.decode(ctx)).catch_unwind();
    let outcome = match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, guarded).await {
        Ok(outcome) => outcome,
        Err(_) => return Err(DecodeError::TimedOut(limit.as_millis() as u64)),
      },
      None => guarded.await,
    };
    outcome.unwrap_or_else(|panic| Err(DecodeError::Script(panic_message(panic))))
  }

  /// Forwards one payload at a time. A rejection is logged and the rest still go out.
  async fn forward_all(&self, outputs: Vec<Payload>, log: &CycleLog) -> (usize, usize) {
    let mut forwarded = 0;
    let mut failures = 0;
    for (index, payload) in outputs.into_iter().enumerate() {
      match self.output.forward(payload).await {
        Ok(()) => forwarded += 1,
        Err(e) => {
          failures += 1;
          log.warn(format!("forward of payload #{} rejected: {}", index, e));
        }
      }
    }
    (forwarded, failures)
  }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
  let detail = panic
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| panic.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "unknown panic".to_string());
  format!("decoder panicked: {}", detail)
}
