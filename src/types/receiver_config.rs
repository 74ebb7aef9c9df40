//! Per-receiver configuration and its validated form.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::PartialOutputPolicy;
use crate::error::ConfigurationError;

/// Grace period `stop()` grants an in-flight cycle when none is configured.
pub const DEFAULT_STOP_GRACE_MS: u64 = 5_000;

/// Raw receiver configuration as it appears in a config file.
///
/// `interval_ms` is signed and optional so that missing and non-positive values
/// survive deserialization and are rejected by [ReceiverConfig::validate] at `start()`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverConfig {
  /// Display name used in logs and forwarded events.
  pub name: String,
  #[serde(default)]
  pub interval_ms: Option<i64>,
  pub endpoint_url: String,
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub password: Option<String>,
  /// Reference to the decode/poll script (a path for script decoders).
  pub script: String,
  /// Upper bound for one cycle's decode step. Unbounded when absent.
  #[serde(default)]
  pub timeout_ms: Option<u64>,
  #[serde(default)]
  pub stop_grace_ms: Option<u64>,
  #[serde(default)]
  pub partial_output: PartialOutputPolicy,
}

impl ReceiverConfig {
  pub fn new(
    name: impl Into<String>,
    endpoint_url: impl Into<String>,
    interval_ms: i64,
    script: impl Into<String>,
  ) -> Self {
    Self {
      name: name.into(),
      interval_ms: Some(interval_ms),
      endpoint_url: endpoint_url.into(),
      username: None,
      password: None,
      script: script.into(),
      timeout_ms: None,
      stop_grace_ms: None,
      partial_output: PartialOutputPolicy::default(),
    }
  }

  pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
    self.username = Some(username.into());
    self.password = Some(password.into());
    self
  }

  pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
    self.timeout_ms = Some(timeout_ms);
    self
  }

  pub fn with_partial_output(mut self, policy: PartialOutputPolicy) -> Self {
    self.partial_output = policy;
    self
  }

  /// Checks every field and produces the typed configuration a running receiver uses.
  #[instrument(level = "trace", skip(self), fields(receiver = %self.name))]
  pub fn validate(&self) -> Result<ValidatedConfig, ConfigurationError> {
    if self.name.trim().is_empty() {
      return Err(ConfigurationError::MissingName);
    }
    let interval_ms = self.interval_ms.ok_or(ConfigurationError::MissingInterval)?;
    if interval_ms <= 0 {
      return Err(ConfigurationError::NonPositiveInterval(interval_ms));
    }
    if self.timeout_ms == Some(0) {
      return Err(ConfigurationError::NonPositiveTimeout);
    }
    let endpoint = parse_endpoint(&self.endpoint_url)?;
    if self.script.trim().is_empty() {
      return Err(ConfigurationError::MissingScript);
    }
    let credentials = match (&self.username, &self.password) {
      (Some(u), p) if !u.is_empty() => Some(Credentials {
        username: u.clone(),
        password: p.clone(),
      }),
      (_, Some(_)) => return Err(ConfigurationError::OrphanPassword),
      _ => None,
    };

    Ok(ValidatedConfig {
      name: self.name.clone(),
      interval: Duration::from_millis(interval_ms as u64),
      endpoint,
      credentials,
      script: self.script.clone(),
      timeout: self.timeout_ms.map(Duration::from_millis),
      stop_grace: Duration::from_millis(self.stop_grace_ms.unwrap_or(DEFAULT_STOP_GRACE_MS)),
      partial_output: self.partial_output,
    })
  }
}

impl fmt::Debug for ReceiverConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ReceiverConfig")
      .field("name", &self.name)
      .field("interval_ms", &self.interval_ms)
      .field("endpoint_url", &self.endpoint_url)
      .field("username", &self.username)
      .field("password", &self.password.as_ref().map(|_| "<redacted>"))
      .field("script", &self.script)
      .field("timeout_ms", &self.timeout_ms)
      .field("stop_grace_ms", &self.stop_grace_ms)
      .field("partial_output", &self.partial_output)
      .finish()
  }
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigurationError> {
  let malformed = |reason: String| ConfigurationError::MalformedEndpoint {
    url: raw.to_string(),
    reason,
  };
  let url = Url::parse(raw.trim()).map_err(|e| malformed(e.to_string()))?;
  match url.scheme() {
    "http" | "https" => {}
    other => return Err(malformed(format!("unsupported scheme '{}'", other))),
  }
  if url.host_str().is_none() {
    return Err(malformed("missing host".to_string()));
  }
  Ok(url)
}

/// Basic-auth credentials. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
  pub username: String,
  pub password: Option<String>,
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .field("password", &self.password.as_ref().map(|_| "<redacted>"))
      .finish()
  }
}

/// Configuration after [ReceiverConfig::validate]: every field is usable as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConfig {
  pub name: String,
  /// Strictly positive.
  pub interval: Duration,
  pub endpoint: Url,
  pub credentials: Option<Credentials>,
  pub script: String,
  pub timeout: Option<Duration>,
  pub stop_grace: Duration,
  pub partial_output: PartialOutputPolicy,
}
