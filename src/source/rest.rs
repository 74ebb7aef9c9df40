//! REST payload source: GETs a configured endpoint with optional basic auth.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use tracing::instrument;

use super::PayloadSourceClient;
use crate::error::{ConfigurationError, FetchError};
use crate::types::{Credentials, Payload, ValidatedConfig};

/// Metadata key carrying the HTTP status of the response a payload came from.
pub const META_STATUS: &str = "status";
/// Metadata key carrying the response content type, when the server sent one.
pub const META_CONTENT_TYPE: &str = "content-type";
/// Metadata key carrying the URL that was fetched.
pub const META_URL: &str = "url";

/// Polls a REST endpoint. Each successful, non-empty response becomes one payload.
#[derive(Debug, Clone)]
pub struct RestSourceClient {
  client: Client,
  endpoint: Url,
  credentials: Option<Credentials>,
}

impl RestSourceClient {
  /// Builds the HTTP client for one receiver. The cycle timeout, when set, also bounds each request.
  #[instrument(level = "trace", skip(config), fields(receiver = %config.name))]
  pub fn connect(config: &ValidatedConfig) -> Result<Self, ConfigurationError> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.timeout {
      builder = builder.timeout(timeout);
    }
    let client = builder
      .build()
      .map_err(|e| ConfigurationError::Client(e.to_string()))?;
    Ok(Self {
      client,
      endpoint: config.endpoint.clone(),
      credentials: config.credentials.clone(),
    })
  }

  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }

  /// GETs `path` resolved against the endpoint (standard URL join rules).
  #[instrument(level = "trace", skip(self))]
  pub async fn get(&self, path: &str) -> Result<Vec<Payload>, FetchError> {
    let url = self
      .endpoint
      .join(path)
      .map_err(|_| FetchError::InvalidPath(path.to_string()))?;
    self.request(url).await
  }

  async fn request(&self, url: Url) -> Result<Vec<Payload>, FetchError> {
    let mut req = self.client.get(url.clone());
    if let Some(creds) = &self.credentials {
      req = req.basic_auth(&creds.username, creds.password.as_ref());
    }
    let resp = req.send().await.map_err(transport_error)?;
    let status = resp.status();
    if !status.is_success() {
      tracing::debug!(url = %url, status = status.as_u16(), "source returned non-success status");
      return Err(FetchError::Status {
        status: status.as_u16(),
      });
    }
    if status == StatusCode::NO_CONTENT {
      return Ok(vec![]);
    }
    let content_type = resp
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(str::to_string);
    let body = resp.bytes().await.map_err(transport_error)?;
    if body.is_empty() {
      return Ok(vec![]);
    }
    let mut payload = Payload::new(body)
      .meta(META_STATUS, status.as_u16().to_string())
      .meta(META_URL, url.as_str());
    if let Some(ct) = content_type {
      payload = payload.meta(META_CONTENT_TYPE, ct);
    }
    Ok(vec![payload])
  }
}

#[async_trait]
impl PayloadSourceClient for RestSourceClient {
  async fn fetch(&self) -> Result<Vec<Payload>, FetchError> {
    self.request(self.endpoint.clone()).await
  }

  async fn fetch_path(&self, path: &str) -> Result<Vec<Payload>, FetchError> {
    self.get(path).await
  }
}

fn transport_error(e: reqwest::Error) -> FetchError {
  if e.is_timeout() {
    FetchError::TimedOut
  } else {
    FetchError::Transport(e.to_string())
  }
}
