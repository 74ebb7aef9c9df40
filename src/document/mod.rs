//! Explicit document schemas for entities the wider pipeline persists.
//!
//! Receivers never call into persistence; these codecs describe the boundary
//! as fixed, versioned key mappings with symmetric encode/decode.

use serde_json::{Map, Value};

use crate::error::DocumentError;

mod device_specification;

pub use device_specification::{
  ContainerPolicy, DeviceElementSchema, DeviceSlot, DeviceSpecification, DeviceSpecificationCodec,
  DeviceUnit,
};

/// A stored document: string keys to JSON values.
pub type Document = Map<String, Value>;

/// Key holding the schema version of a document.
pub const PROP_VERSION: &str = "_v";

/// Symmetric mapping between an entity and its stored document.
pub trait DocumentCodec {
  type Entity;

  /// Schema version written by [DocumentCodec::to_document].
  const VERSION: u64;

  fn to_document(entity: &Self::Entity) -> Document;

  fn from_document(document: &Document) -> Result<Self::Entity, DocumentError>;
}

/// Rejects documents written by a newer schema. A missing version reads as the current one.
pub(crate) fn check_version(document: &Document, supported: u64) -> Result<(), DocumentError> {
  match document.get(PROP_VERSION) {
    None | Some(Value::Null) => Ok(()),
    Some(v) => match v.as_u64() {
      Some(n) if n <= supported => Ok(()),
      Some(n) => Err(DocumentError::UnsupportedVersion(n)),
      None => Err(DocumentError::InvalidField {
        field: PROP_VERSION,
        reason: "not an unsigned integer".to_string(),
      }),
    },
  }
}

/// Reads a required string field.
pub(crate) fn required_str<'a>(
  document: &'a Document,
  field: &'static str,
) -> Result<&'a str, DocumentError> {
  match document.get(field) {
    None | Some(Value::Null) => Err(DocumentError::MissingField(field)),
    Some(Value::String(s)) => Ok(s),
    Some(_) => Err(DocumentError::InvalidField {
      field,
      reason: "expected a string".to_string(),
    }),
  }
}

/// Reads an optional string field; null and absent are the same.
pub(crate) fn optional_str<'a>(
  document: &'a Document,
  field: &'static str,
) -> Result<Option<&'a str>, DocumentError> {
  match document.get(field) {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) => Ok(Some(s)),
    Some(_) => Err(DocumentError::InvalidField {
      field,
      reason: "expected a string".to_string(),
    }),
  }
}
