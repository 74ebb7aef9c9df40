//! Fakes shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{FetchError, ForwardError};
use crate::output::OutputContract;
use crate::source::PayloadSourceClient;
use crate::types::Payload;

/// Returns the same payloads on every fetch.
pub(crate) struct StaticSource {
  payloads: Vec<Payload>,
  fetches: AtomicUsize,
}

impl StaticSource {
  pub(crate) fn new(payloads: Vec<Payload>) -> Self {
    Self {
      payloads,
      fetches: AtomicUsize::new(0),
    }
  }

  pub(crate) fn fetches(&self) -> usize {
    self.fetches.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl PayloadSourceClient for StaticSource {
  async fn fetch(&self) -> Result<Vec<Payload>, FetchError> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    Ok(self.payloads.clone())
  }
}

/// Fails every fetch with the same error.
pub(crate) struct FailingSource {
  error: FetchError,
}

impl FailingSource {
  pub(crate) fn new(error: FetchError) -> Self {
    Self { error }
  }
}

#[async_trait]
impl PayloadSourceClient for FailingSource {
  async fn fetch(&self) -> Result<Vec<Payload>, FetchError> {
    Err(self.error.clone())
  }
}

/// Serves payloads per relative path; unknown paths answer 404. Records every path asked for.
#[derive(Default)]
pub(crate) struct PathSource {
  routes: HashMap<String, Vec<Payload>>,
  requested: Mutex<Vec<String>>,
}

impl PathSource {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn route(mut self, path: &str, payloads: Vec<Payload>) -> Self {
    self.routes.insert(path.to_string(), payloads);
    self
  }

  pub(crate) fn requested(&self) -> Vec<String> {
    self.requested.lock().map(|r| r.clone()).unwrap_or_default()
  }
}

#[async_trait]
impl PayloadSourceClient for PathSource {
  async fn fetch(&self) -> Result<Vec<Payload>, FetchError> {
    self.fetch_path("").await
  }

  async fn fetch_path(&self, path: &str) -> Result<Vec<Payload>, FetchError> {
    if let Ok(mut r) = self.requested.lock() {
      r.push(path.to_string());
    }
    self
      .routes
      .get(path)
      .cloned()
      .ok_or(FetchError::Status { status: 404 })
  }
}

/// Records forwarded payloads; rejects the ones whose data matches `reject`.
#[derive(Default)]
pub(crate) struct RecordingOutput {
  forwarded: Mutex<Vec<Payload>>,
  reject: Mutex<VecDeque<Vec<u8>>>,
}

impl RecordingOutput {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Rejects the next payload whose bytes equal `data`.
  pub(crate) fn reject_once(&self, data: &[u8]) {
    if let Ok(mut r) = self.reject.lock() {
      r.push_back(data.to_vec());
    }
  }

  pub(crate) fn forwarded(&self) -> Vec<Payload> {
    self.forwarded.lock().map(|f| f.clone()).unwrap_or_default()
  }
}

#[async_trait]
impl OutputContract for RecordingOutput {
  async fn forward(&self, payload: Payload) -> Result<(), ForwardError> {
    let mut reject = self.reject.lock().map_err(|e| ForwardError::Rejected(e.to_string()))?;
    if let Some(pos) = reject.iter().position(|d| d.as_slice() == payload.data.as_ref()) {
      reject.remove(pos);
      return Err(ForwardError::Rejected("test rejection".to_string()));
    }
    drop(reject);
    self
      .forwarded
      .lock()
      .map_err(|e| ForwardError::Rejected(e.to_string()))?
      .push(payload);
    Ok(())
  }
}
