//! Per-cycle binding context handed to decoders.
//!
//! A [BindingContext] is the capability set a decode/poll script sees: the
//! `source` it may fetch from, the `outputs` it appends to and the `log` it
//! writes to. One is built per cycle and consumed when the cycle ends.

use std::sync::Arc;

use bytes::Bytes;

use crate::cycle_log::CycleLog;
use crate::source::PayloadSourceClient;
use crate::types::{Metadata, Payload};

/// Binding name of the source capability.
pub const VAR_SOURCE: &str = "source";
/// Binding name of the output collection.
pub const VAR_OUTPUTS: &str = "outputs";
/// Binding name of the log sink.
pub const VAR_LOG: &str = "log";

/// Ordered, append-only collection of payloads produced during one cycle.
#[derive(Debug, Default)]
pub struct OutputCollection {
  entries: Vec<Payload>,
}

impl OutputCollection {
  pub fn push(&mut self, payload: Payload) {
    self.entries.push(payload);
  }

  pub fn push_bytes(&mut self, data: impl Into<Bytes>) {
    self.entries.push(Payload::new(data));
  }

  pub fn push_with_metadata(&mut self, data: impl Into<Bytes>, metadata: Metadata) {
    self.entries.push(Payload::with_metadata(data, metadata));
  }

  pub fn extend(&mut self, payloads: impl IntoIterator<Item = Payload>) {
    self.entries.extend(payloads);
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Payload> {
    self.entries.iter()
  }
}

/// The named bindings of one poll cycle.
pub struct BindingContext {
  /// Fetch capability. Shared with the receiver, read-only for the decoder.
  pub source: Arc<dyn PayloadSourceClient>,
  /// Starts empty; whatever is here when the decoder returns gets forwarded.
  pub outputs: OutputCollection,
  pub log: CycleLog,
}

impl BindingContext {
  /// Builds a fresh context. Nothing carries over from any earlier context.
  pub fn build(source: Arc<dyn PayloadSourceClient>, log: CycleLog) -> Self {
    Self {
      source,
      outputs: OutputCollection::default(),
      log,
    }
  }

  /// Names of the bindings this context exposes, in a fixed order.
  pub fn variable_names() -> [&'static str; 3] {
    [VAR_SOURCE, VAR_OUTPUTS, VAR_LOG]
  }

  /// Ends the context, yielding the produced payloads in emission order.
  pub fn into_outputs(self) -> Vec<Payload> {
    self.outputs.entries
  }
}
