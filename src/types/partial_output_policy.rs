//! What to do with payloads a failed cycle already produced.

use serde::{Deserialize, Serialize};

/// Applied when the decode step fails after appending some payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialOutputPolicy {
  /// Forward whatever was produced before the failure.
  #[default]
  Forward,
  /// Drop everything the failed cycle produced.
  Discard,
}
