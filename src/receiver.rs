//! Polling receiver: lifecycle state machine plus the fixed-interval scheduler.
//!
//! `start()` validates configuration, connects the payload source and spawns one
//! polling task. The task owns the [PollCycleExecutor] and awaits each cycle
//! inline, so cycles never overlap; ticks missed while a cycle overruns are
//! skipped. `stop()` signals the task, lets an in-flight cycle finish within the
//! grace period and aborts it otherwise.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::cycle_log::ReceiverLog;
use crate::decoder::Decoder;
use crate::error::{ConfigurationError, StartError};
use crate::executor::PollCycleExecutor;
use crate::output::OutputContract;
use crate::source::{PayloadSourceClient, RestSourceClient};
use crate::stats::{ReceiverStats, StatsSnapshot};
use crate::types::{CycleStatus, ReceiverConfig, ReceiverState, ValidatedConfig};

type ConnectFn<S> = dyn Fn(&ValidatedConfig) -> Result<S, ConfigurationError> + Send + Sync;

struct PollingTask {
  shutdown: watch::Sender<bool>,
  handle: JoinHandle<()>,
  grace: Duration,
}

/// One receiver: one schedule against one payload source.
pub struct PollingReceiver<S: PayloadSourceClient + 'static> {
  config: ReceiverConfig,
  connect: Box<ConnectFn<S>>,
  decoder: Arc<dyn Decoder>,
  output: Arc<dyn OutputContract>,
  stats: Arc<ReceiverStats>,
  state: watch::Sender<ReceiverState>,
  task: Option<PollingTask>,
}

impl PollingReceiver<RestSourceClient> {
  /// Receiver polling a REST endpoint.
  pub fn rest(
    config: ReceiverConfig,
    decoder: Arc<dyn Decoder>,
    output: Arc<dyn OutputContract>,
  ) -> Self {
    Self::new(config, RestSourceClient::connect, decoder, output)
  }
}

impl<S: PayloadSourceClient + 'static> PollingReceiver<S> {
  /// `connect` builds a fresh source client on every `start()`; the client is never shared.
  pub fn new<F>(
    config: ReceiverConfig,
    connect: F,
    decoder: Arc<dyn Decoder>,
    output: Arc<dyn OutputContract>,
  ) -> Self
  where
    F: Fn(&ValidatedConfig) -> Result<S, ConfigurationError> + Send + Sync + 'static,
  {
    let (state, _) = watch::channel(ReceiverState::Stopped);
    Self {
      config,
      connect: Box::new(connect),
      decoder,
      output,
      stats: Arc::new(ReceiverStats::new()),
      state,
      task: None,
    }
  }

  /// Display name.
  pub fn name(&self) -> &str {
    &self.config.name
  }

  pub fn config(&self) -> &ReceiverConfig {
    &self.config
  }

  pub fn state(&self) -> ReceiverState {
    *self.state.borrow()
  }

  /// Observe lifecycle transitions.
  pub fn subscribe_state(&self) -> watch::Receiver<ReceiverState> {
    self.state.subscribe()
  }

  pub fn stats(&self) -> StatsSnapshot {
    self.stats.snapshot()
  }

  fn set_state(&self, next: ReceiverState) {
    let prev = self.state.send_replace(next);
    if prev != next {
      debug!(receiver = %self.config.name, from = %prev, to = %next, "receiver state changed");
    }
  }

  /// Starts polling. On error the receiver stays Stopped. Starting a running receiver is a no-op.
  #[instrument(level = "trace", skip(self), fields(receiver = %self.config.name))]
  pub async fn start(&mut self) -> Result<(), StartError> {
    if self.task.is_some() {
      warn!(receiver = %self.config.name, "start called on a running receiver; ignoring");
      return Ok(());
    }
    self.set_state(ReceiverState::Starting);

    let prepared = self
      .config
      .validate()
      .and_then(|validated| (self.connect)(&validated).map(|source| (validated, source)));
    let (validated, source) = match prepared {
      Ok(ok) => ok,
      Err(e) => {
        self.set_state(ReceiverState::Stopped);
        tracing::error!(receiver = %self.config.name, error = %e, "receiver failed to start");
        return Err(e.into());
      }
    };

    let log = ReceiverLog::new(&validated.name, &validated.script);
    let executor = PollCycleExecutor::new(
      Arc::new(source),
      Arc::clone(&self.decoder),
      Arc::clone(&self.output),
      log,
      Arc::clone(&self.stats),
    )
    .with_timeout(validated.timeout)
    .with_policy(validated.partial_output);

    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(poll_loop(
      executor,
      validated.interval,
      shutdown_rx,
      Arc::clone(&self.stats),
    ));
    self.task = Some(PollingTask {
      shutdown,
      handle,
      grace: validated.stop_grace,
    });
    self.set_state(ReceiverState::Running);
    info!(
      receiver = %validated.name,
      endpoint = %validated.endpoint,
      interval_ms = validated.interval.as_millis() as u64,
      decoder = self.decoder.kind(),
      "receiver started"
    );
    Ok(())
  }

  /// Stops polling. No cycle begins after this returns. Stopping a stopped receiver is a no-op.
  #[instrument(level = "trace", skip(self), fields(receiver = %self.config.name))]
  pub async fn stop(&mut self) {
    let Some(task) = self.task.take() else {
      debug!(receiver = %self.config.name, "stop called on a stopped receiver; ignoring");
      return;
    };
    self.set_state(ReceiverState::Stopping);
    let _ = task.shutdown.send(true);

    let mut handle = task.handle;
    match time::timeout(task.grace, &mut handle).await {
      Ok(Ok(())) => {}
      Ok(Err(e)) => warn!(receiver = %self.config.name, error = %e, "polling task ended abnormally"),
      Err(_) => {
        warn!(
          receiver = %self.config.name,
          grace_ms = task.grace.as_millis() as u64,
          "in-flight cycle exceeded stop grace period; aborting"
        );
        handle.abort();
        let _ = handle.await;
      }
    }
    self.set_state(ReceiverState::Stopped);
    info!(receiver = %self.config.name, "receiver stopped");
  }
}

impl<S: PayloadSourceClient + 'static> Drop for PollingReceiver<S> {
  fn drop(&mut self) {
    if let Some(task) = self.task.take() {
      let _ = task.shutdown.send(true);
      task.handle.abort();
    }
  }
}

/// Fires one cycle per tick until shutdown. The first tick is one interval after start.
#[instrument(level = "trace", skip_all, fields(receiver = %executor.log().receiver()))]
async fn poll_loop(
  mut executor: PollCycleExecutor,
  interval: Duration,
  mut shutdown: watch::Receiver<bool>,
  stats: Arc<ReceiverStats>,
) {
  let first_tick = Instant::now() + interval;
  let mut ticker = time::interval_at(first_tick, interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    tokio::select! {
      biased;
      changed = shutdown.changed() => {
        if changed.is_err() || *shutdown.borrow() {
          break;
        }
      }
      _ = ticker.tick() => {
        if *shutdown.borrow() {
          break;
        }
        let began = Instant::now();
        let result = executor.run_once().await;
        if result.status != CycleStatus::Success {
          debug!(
            receiver = %executor.log().receiver(),
            cycle = result.cycle_id,
            status = %result.status,
            "cycle did not fully succeed"
          );
        }
        let elapsed = began.elapsed();
        if elapsed > interval {
          stats.record_overrun();
          executor.log().warn(format!(
            "cycle {} took {} ms, longer than the {} ms interval; skipping missed ticks",
            result.cycle_id,
            elapsed.as_millis(),
            interval.as_millis()
          ));
          // The tick that came due mid-cycle is stale; wait for the next boundary instead.
          ticker.reset_at(next_aligned_tick(first_tick, interval, Instant::now()));
        }
      }
    }
  }
  debug!(receiver = %executor.log().receiver(), "polling loop exited");
}

/// First tick boundary strictly after `now` on the schedule `first, first + period, ..`.
pub(crate) fn next_aligned_tick(first: Instant, period: Duration, now: Instant) -> Instant {
  if now < first {
    return first;
  }
  let since = now.duration_since(first).as_nanos();
  let rem = since % period.as_nanos().max(1);
  now + period - Duration::from_nanos(rem as u64)
}
