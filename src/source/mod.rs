//! Payload source clients: the leaf that talks to the outside world.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::Payload;

mod rest;

pub use rest::RestSourceClient;

/// One fetch against an external system.
///
/// Implementations hold connection and credential state set at construction and
/// are otherwise stateless between calls. Expected conditions (an empty result,
/// a 4xx) come back as `Ok(vec![])` or a typed [FetchError], never a panic.
/// A client instance belongs to exactly one receiver.
#[async_trait]
pub trait PayloadSourceClient: Send + Sync {
  async fn fetch(&self) -> Result<Vec<Payload>, FetchError>;

  /// Fetches `path` relative to the source's base location. Sources without one reject every path.
  async fn fetch_path(&self, path: &str) -> Result<Vec<Payload>, FetchError> {
    Err(FetchError::InvalidPath(path.to_string()))
  }
}
