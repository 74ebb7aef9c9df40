//! Device specification and its stored document form.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{Document, DocumentCodec, PROP_VERSION, check_version, optional_str, required_str};
use crate::error::DocumentError;

pub const PROP_ID: &str = "id";
pub const PROP_TOKEN: &str = "tk";
pub const PROP_NAME: &str = "nm";
pub const PROP_ASSET_REFERENCE: &str = "ar";
pub const PROP_CONTAINER_POLICY: &str = "cp";
pub const PROP_DEVICE_ELEMENT_SCHEMA: &str = "es";
pub const PROP_METADATA: &str = "md";
pub const PROP_CREATED_DATE: &str = "cd";
pub const PROP_UPDATED_DATE: &str = "ud";

/// Whether devices of a specification can contain nested devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerPolicy {
  Standalone,
  Composite,
}

impl fmt::Display for ContainerPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ContainerPolicy::Standalone => write!(f, "Standalone"),
      ContainerPolicy::Composite => write!(f, "Composite"),
    }
  }
}

impl FromStr for ContainerPolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "Standalone" => Ok(ContainerPolicy::Standalone),
      "Composite" => Ok(ContainerPolicy::Composite),
      other => Err(format!("unknown container policy '{}'", other)),
    }
  }
}

/// A named slot a nested device can occupy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSlot {
  pub name: String,
  pub path: String,
}

/// A grouping of slots and nested units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUnit {
  pub name: String,
  pub path: String,
  #[serde(default)]
  pub device_slots: Vec<DeviceSlot>,
  #[serde(default)]
  pub device_units: Vec<DeviceUnit>,
}

/// Layout of a composite device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceElementSchema {
  #[serde(default)]
  pub device_slots: Vec<DeviceSlot>,
  #[serde(default)]
  pub device_units: Vec<DeviceUnit>,
}

/// Describes a class of device. Keyed by a stable `id` and a human-assigned `token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpecification {
  pub id: Uuid,
  pub token: String,
  pub name: String,
  /// Opaque asset reference; resolved elsewhere.
  pub asset_reference: Option<String>,
  pub container_policy: Option<ContainerPolicy>,
  pub element_schema: Option<DeviceElementSchema>,
  pub metadata: HashMap<String, String>,
  pub created_date: Option<DateTime<Utc>>,
  pub updated_date: Option<DateTime<Utc>>,
}

impl DeviceSpecification {
  pub fn new(token: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: Uuid::new_v4(),
      token: token.into(),
      name: name.into(),
      asset_reference: None,
      container_policy: None,
      element_schema: None,
      metadata: HashMap::new(),
      created_date: None,
      updated_date: None,
    }
  }
}

/// Document codec for [DeviceSpecification].
pub struct DeviceSpecificationCodec;

impl DocumentCodec for DeviceSpecificationCodec {
  type Entity = DeviceSpecification;

  const VERSION: u64 = 1;

  fn to_document(spec: &DeviceSpecification) -> Document {
    let mut doc = Document::new();
    doc.insert(PROP_VERSION.to_string(), Value::from(Self::VERSION));
    doc.insert(PROP_ID.to_string(), Value::String(spec.id.to_string()));
    doc.insert(PROP_TOKEN.to_string(), Value::String(spec.token.clone()));
    doc.insert(PROP_NAME.to_string(), Value::String(spec.name.clone()));
    if let Some(ar) = &spec.asset_reference {
      doc.insert(PROP_ASSET_REFERENCE.to_string(), Value::String(ar.clone()));
    }
    if let Some(cp) = spec.container_policy {
      doc.insert(PROP_CONTAINER_POLICY.to_string(), Value::String(cp.to_string()));
    }
    if !spec.metadata.is_empty() {
      let md = spec
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
      doc.insert(PROP_METADATA.to_string(), Value::Object(md));
    }
    if let Some(d) = spec.created_date {
      doc.insert(PROP_CREATED_DATE.to_string(), Value::String(d.to_rfc3339()));
    }
    if let Some(d) = spec.updated_date {
      doc.insert(PROP_UPDATED_DATE.to_string(), Value::String(d.to_rfc3339()));
    }
    // Element schema is stored as its JSON bytes.
    if let Some(schema) = &spec.element_schema {
      match serde_json::to_vec(schema) {
        Ok(bytes) => {
          doc.insert(
            PROP_DEVICE_ELEMENT_SCHEMA.to_string(),
            Value::String(STANDARD.encode(bytes)),
          );
        }
        Err(e) => tracing::error!(token = %spec.token, error = %e, "unable to marshal device element schema"),
      }
    }
    doc
  }

  fn from_document(doc: &Document) -> Result<DeviceSpecification, DocumentError> {
    check_version(doc, Self::VERSION)?;
    let id = Uuid::parse_str(required_str(doc, PROP_ID)?).map_err(|e| DocumentError::InvalidField {
      field: PROP_ID,
      reason: e.to_string(),
    })?;
    let token = required_str(doc, PROP_TOKEN)?.to_string();
    let name = optional_str(doc, PROP_NAME)?.unwrap_or_default().to_string();
    let asset_reference = optional_str(doc, PROP_ASSET_REFERENCE)?.map(str::to_string);
    let container_policy = optional_str(doc, PROP_CONTAINER_POLICY)?
      .map(|s| {
        s.parse::<ContainerPolicy>()
          .map_err(|reason| DocumentError::InvalidField {
            field: PROP_CONTAINER_POLICY,
            reason,
          })
      })
      .transpose()?;
    let metadata = decode_metadata(doc)?;
    let created_date = decode_date(doc, PROP_CREATED_DATE)?;
    let updated_date = decode_date(doc, PROP_UPDATED_DATE)?;
    let element_schema = optional_str(doc, PROP_DEVICE_ELEMENT_SCHEMA)?
      .and_then(|encoded| decode_schema(&token, encoded));

    Ok(DeviceSpecification {
      id,
      token,
      name,
      asset_reference,
      container_policy,
      element_schema,
      metadata,
      created_date,
      updated_date,
    })
  }
}

/// An unreadable schema is logged and read as absent rather than failing the whole entity.
fn decode_schema(token: &str, encoded: &str) -> Option<DeviceElementSchema> {
  let bytes = match STANDARD.decode(encoded) {
    Ok(b) => b,
    Err(e) => {
      tracing::error!(token = %token, error = %e, "unable to unmarshal device element schema");
      return None;
    }
  };
  match serde_json::from_slice(&bytes) {
    Ok(schema) => Some(schema),
    Err(e) => {
      tracing::error!(token = %token, error = %e, "unable to unmarshal device element schema");
      None
    }
  }
}

fn decode_metadata(doc: &Document) -> Result<HashMap<String, String>, DocumentError> {
  match doc.get(PROP_METADATA) {
    None | Some(Value::Null) => Ok(HashMap::new()),
    Some(Value::Object(map)) => map
      .iter()
      .map(|(k, v)| match v {
        Value::String(s) => Ok((k.clone(), s.clone())),
        _ => Err(DocumentError::InvalidField {
          field: PROP_METADATA,
          reason: format!("value for '{}' is not a string", k),
        }),
      })
      .collect(),
    Some(_) => Err(DocumentError::InvalidField {
      field: PROP_METADATA,
      reason: "expected an object".to_string(),
    }),
  }
}

fn decode_date(doc: &Document, field: &'static str) -> Result<Option<DateTime<Utc>>, DocumentError> {
  optional_str(doc, field)?
    .map(|s| {
      DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DocumentError::InvalidField {
          field,
          reason: e.to_string(),
        })
    })
    .transpose()
}
