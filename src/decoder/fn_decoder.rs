//! Native decoder backed by an async closure.

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::Decoder;
use crate::binding::BindingContext;
use crate::error::DecodeError;

type DecodeFn =
  dyn for<'a> Fn(&'a mut BindingContext) -> BoxFuture<'a, Result<(), DecodeError>> + Send + Sync;

/// Wraps `|ctx| Box::pin(async move { .. })` as a [Decoder].
pub struct FnDecoder {
  f: Box<DecodeFn>,
}

impl FnDecoder {
  pub fn new<F>(f: F) -> Self
  where
    F: for<'a> Fn(&'a mut BindingContext) -> BoxFuture<'a, Result<(), DecodeError>>
      + Send
      + Sync
      + 'static,
  {
    Self { f: Box::new(f) }
  }
}

#[async_trait]
impl Decoder for FnDecoder {
  async fn decode(&self, ctx: &mut BindingContext) -> Result<(), DecodeError> {
    (self.f)(ctx).await
  }

  fn kind(&self) -> &'static str {
    "native"
  }
}
