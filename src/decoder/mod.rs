//! Pluggable decode/poll logic run once per cycle against a [BindingContext].
//!
//! Two families: native decoders compiled into the binary ([PassthroughDecoder],
//! [FnDecoder]) and externally loaded scripts ([ScriptDecoder]).

use async_trait::async_trait;

use crate::binding::BindingContext;
use crate::error::DecodeError;

mod fn_decoder;
mod passthrough;
mod script;
#[cfg(test)]
mod script_test;

pub use fn_decoder::FnDecoder;
pub use passthrough::PassthroughDecoder;
pub use script::{FetchMode, ScriptDecoder};

/// Decode/poll step of a cycle.
///
/// Reads from `ctx.source`, appends to `ctx.outputs`, writes to `ctx.log`.
/// Anything already appended when an error is returned is subject to the
/// receiver's [crate::types::PartialOutputPolicy].
#[async_trait]
pub trait Decoder: Send + Sync {
  async fn decode(&self, ctx: &mut BindingContext) -> Result<(), DecodeError>;

  /// Short label for logs.
  fn kind(&self) -> &'static str;
}
