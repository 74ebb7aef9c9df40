//! # streamweave-receivers
//!
//! Polling inbound receivers for a device-event ingestion pipeline.
//!
//! ## Architecture
//!
//! Each receiver runs one pipeline, once per tick:
//!
//! scheduler tick → [executor::PollCycleExecutor] builds a fresh
//! [binding::BindingContext] → a [decoder::Decoder] fetches from the
//! [source::PayloadSourceClient] and fills `outputs` → each payload goes,
//! in order, through the [output::OutputContract] to the downstream pipeline.
//!
//! [receiver::PollingReceiver] owns the lifecycle (`Stopped → Starting →
//! Running → Stopping → Stopped`) and guarantees cycles never overlap.
//! Failures stay inside the cycle that produced them.

pub mod binding;
pub mod config_io;
pub mod cycle_log;
pub mod decoder;
pub mod document;
pub mod error;
pub mod executor;
pub mod output;
pub mod receiver;
pub mod source;
pub mod stats;
#[cfg(test)]
mod test_support;
pub mod types;

pub use binding::{BindingContext, OutputCollection};
pub use decoder::{Decoder, FetchMode, FnDecoder, PassthroughDecoder, ScriptDecoder};
pub use error::{ConfigurationError, DecodeError, FetchError, ForwardError, StartError};
pub use executor::PollCycleExecutor;
pub use output::{ChannelOutput, OutputContract};
pub use receiver::PollingReceiver;
pub use source::{PayloadSourceClient, RestSourceClient};
pub use stats::StatsSnapshot;
pub use types::{CycleResult, CycleStatus, Payload, ReceivedEvent, ReceiverConfig, ReceiverState};
