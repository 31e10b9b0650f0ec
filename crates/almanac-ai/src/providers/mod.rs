//! Model provider implementations

pub mod google;

use crate::{Completion, Context, Error, Model, ReplyStream, Result};
use async_trait::async_trait;

/// Trait for generative model providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Stream a reply as a sequence of text fragments
    async fn stream(&self, model: &Model, context: &Context) -> Result<ReplyStream>;

    /// Retrieve a complete reply in one call
    async fn generate(&self, model: &Model, context: &Context) -> Result<Completion>;
}

/// Get an API key from a provided value or the given environment variables
pub fn get_api_key(provided: Option<&str>, env_vars: &[&str]) -> Result<String> {
    if let Some(key) = provided {
        return Ok(key.to_string());
    }

    env_vars
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .ok_or(Error::MissingCredential)
}
