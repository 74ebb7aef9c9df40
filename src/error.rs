//! Error taxonomy for receivers.
//!
//! Only [StartError] (wrapping [ConfigurationError]) ever reaches a caller of the
//! lifecycle API. Everything else is absorbed at the cycle boundary and shows up
//! in a [crate::types::CycleResult] and the receiver log.

use thiserror::Error;

/// Invalid or missing receiver configuration. Fatal to `start()`, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
  #[error("receiver name is empty")]
  MissingName,

  #[error("polling interval is missing")]
  MissingInterval,

  #[error("polling interval must be > 0 (got {0} ms)")]
  NonPositiveInterval(i64),

  #[error("cycle timeout must be > 0")]
  NonPositiveTimeout,

  #[error("malformed endpoint url '{url}': {reason}")]
  MalformedEndpoint { url: String, reason: String },

  #[error("script reference is empty")]
  MissingScript,

  #[error("password given without a username")]
  OrphanPassword,

  #[error("source client could not be built: {0}")]
  Client(String),

  #[error("unable to read configuration: {0}")]
  Io(String),

  #[error("unable to parse configuration: {0}")]
  Parse(String),
}

/// A single fetch against the external source failed. Retried naturally on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  #[error("source returned status {status}")]
  Status { status: u16 },

  #[error("transport error: {0}")]
  Transport(String),

  #[error("fetch timed out")]
  TimedOut,

  #[error("invalid request path '{0}'")]
  InvalidPath(String),
}

/// The decode/poll step of a cycle failed (the script execution error family).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error("script failed: {0}")]
  Script(String),

  #[error("script '{script}' exited with {code:?}")]
  ScriptExit { script: String, code: Option<i32> },

  #[error("script '{script}' produced invalid output on line {line}: {reason}")]
  InvalidOutput {
    script: String,
    line: usize,
    reason: String,
  },

  #[error("unable to spawn script '{script}': {reason}")]
  Spawn { script: String, reason: String },

  #[error("cycle exceeded its {0} ms budget")]
  TimedOut(u64),
}

impl DecodeError {
  /// True when the failure came from the payload source rather than the decoder itself.
  pub fn is_fetch(&self) -> bool {
    matches!(self, DecodeError::Fetch(_))
  }
}

/// The output contract rejected a payload. Logged; the cycle moves on to the next payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
  #[error("downstream pipeline is closed")]
  Closed,

  #[error("downstream pipeline is full")]
  Full,

  #[error("downstream rejected payload: {0}")]
  Rejected(String),
}

/// `start()` failed; the receiver stays Stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
  #[error(transparent)]
  Configuration(#[from] ConfigurationError),
}

/// Encoding or decoding a persisted entity document failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
  #[error("document field '{0}' is missing")]
  MissingField(&'static str),

  #[error("document field '{field}' is invalid: {reason}")]
  InvalidField { field: &'static str, reason: String },

  #[error("unsupported document version {0}")]
  UnsupportedVersion(u64),
}
