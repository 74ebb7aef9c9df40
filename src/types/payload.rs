//! Raw inbound payload plus optional metadata.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::Metadata;

/// One unit of inbound device data. Opaque bytes; decoding happens downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
  pub data: Bytes,
  pub metadata: Option<Metadata>,
}

impl Payload {
  pub fn new(data: impl Into<Bytes>) -> Self {
    Self {
      data: data.into(),
      metadata: None,
    }
  }

  pub fn with_metadata(data: impl Into<Bytes>, metadata: Metadata) -> Self {
    Self {
      data: data.into(),
      metadata: Some(metadata),
    }
  }

  /// Adds one metadata entry, creating the mapping on first use. Later values win.
  pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self
      .metadata
      .get_or_insert_with(Metadata::new)
      .insert(key.into(), value.into());
    self
  }

  /// Looks up a metadata value.
  pub fn metadata_value(&self, key: &str) -> Option<&str> {
    self
      .metadata
      .as_ref()
      .and_then(|m| m.get(key))
      .map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}
