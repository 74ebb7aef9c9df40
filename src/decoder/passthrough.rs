//! Native decoder that forwards fetched payloads untouched.

use async_trait::async_trait;

use super::Decoder;
use crate::binding::BindingContext;
use crate::error::DecodeError;

/// Fetches once and appends every payload as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDecoder;

#[async_trait]
impl Decoder for PassthroughDecoder {
  async fn decode(&self, ctx: &mut BindingContext) -> Result<(), DecodeError> {
    let fetched = ctx.source.fetch().await?;
    ctx.log.trace(format!("passthrough fetched {} payload(s)", fetched.len()));
    ctx.outputs.extend(fetched);
    Ok(())
  }

  fn kind(&self) -> &'static str {
    "passthrough"
  }
}
