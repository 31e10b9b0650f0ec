//! Model invocation with an explicit primary-then-fallback chain.
//!
//! One turn maps to at most two model calls:
//!
//! ```text
//! Idle -> Calling(primary) -> Success
//!                          -> Failed(unavailable) -> Calling(fallback) -> Success
//!                                                                      -> FinalFailure
//!                          -> Failed(other)       -> FinalFailure
//! ```
//!
//! A third model is never tried. Which identifiers make up the chain is
//! configuration, not code.

use crate::{error::Error, events::ChatEvent};
use almanac_ai::{
    Completion, Context, Model, ReplyStream,
    providers::google::{API_KEY_ENV_VARS, GoogleProvider},
    stream::{ReplyBuilder, ReplyEvent},
};
use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Compiled patterns for errors that mean "this model cannot serve the
/// call", beyond what the typed classification already catches. These show
/// up as plain strings when the failure surfaces mid-stream.
static UNAVAILABLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)model.{0,40}not.?found",
        r"(?i)requested entity was not found",
        r"(?i)not found for api version",
        r"(?i)not supported for generateContent",
        r"\bNOT_FOUND\b",
        r"\b404\b",
        r"(?i)model.{0,40}(unavailable|deprecated|discontinued)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Check if an error should trigger the fallback model
pub fn is_model_unavailable(error: &almanac_ai::Error) -> bool {
    if error.is_model_unavailable() {
        return true;
    }
    let msg = error.to_string();
    UNAVAILABLE_PATTERNS.iter().any(|re| re.is_match(&msg))
}

/// The ordered models to try for a turn: a primary and at most one fallback.
#[derive(Debug, Clone)]
pub struct ModelChain {
    pub primary: Model,
    pub fallback: Option<Model>,
}

impl ModelChain {
    /// Create a chain with a fallback
    pub fn new(primary: Model, fallback: Model) -> Self {
        Self {
            primary,
            fallback: Some(fallback),
        }
    }

    /// Create a chain with no fallback
    pub fn single(primary: Model) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }
}

/// How the reply is retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Incremental fragments over SSE
    Streaming,
    /// One complete response
    Complete,
}

/// Seam between the invoker and the HTTP provider, so turn processing can
/// be exercised without a network.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Stream a reply as text fragments
    async fn stream(&self, model: &Model, context: &Context) -> almanac_ai::Result<ReplyStream>;

    /// Retrieve a complete reply
    async fn generate(&self, model: &Model, context: &Context) -> almanac_ai::Result<Completion>;
}

/// Production client backed by the Google provider.
///
/// The credential is resolved at construction; a client built without one
/// fails every call with `MissingCredential` before any network I/O.
pub struct ProviderClient {
    credential: Option<String>,
}

impl ProviderClient {
    /// Create with an explicit credential (or explicitly none)
    pub fn new(credential: Option<String>) -> Self {
        Self { credential }
    }

    /// Create from the provider's environment variables
    pub fn from_env() -> Self {
        let credential = API_KEY_ENV_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok());
        Self { credential }
    }

    /// Whether a credential is configured
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    fn provider(&self) -> almanac_ai::Result<GoogleProvider> {
        let key = self
            .credential
            .as_deref()
            .ok_or(almanac_ai::Error::MissingCredential)?;
        Ok(GoogleProvider::new(key))
    }
}

#[async_trait]
impl ModelClient for ProviderClient {
    async fn stream(&self, model: &Model, context: &Context) -> almanac_ai::Result<ReplyStream> {
        self.provider()?.stream_reply(model, context).await
    }

    async fn generate(&self, model: &Model, context: &Context) -> almanac_ai::Result<Completion> {
        self.provider()?.generate_reply(model, context).await
    }
}

/// Drives the chain for one turn, forwarding progress events.
pub struct Invoker {
    chain: ModelChain,
    delivery: Delivery,
    timeout: Duration,
}

impl Invoker {
    /// Create a new invoker
    pub fn new(chain: ModelChain, delivery: Delivery, timeout: Duration) -> Self {
        Self {
            chain,
            delivery,
            timeout,
        }
    }

    /// Run the chain: primary first, then at most one fallback attempt.
    ///
    /// Errors that are not classified as model-unavailable fail the turn
    /// immediately. Timeout and cancellation are final as well.
    pub async fn invoke(
        &self,
        client: &dyn ModelClient,
        context: &Context,
        events: &broadcast::Sender<ChatEvent>,
        cancel: &CancellationToken,
    ) -> crate::error::Result<Completion> {
        let primary = &self.chain.primary;

        match self.attempt(client, primary, context, events, cancel).await {
            Ok(completion) => Ok(completion),
            Err(e) if is_model_unavailable(&e) => {
                let Some(fallback) = &self.chain.fallback else {
                    return Err(e.into());
                };
                tracing::warn!(
                    model = %primary.id,
                    error = %e,
                    "primary model unavailable, trying fallback"
                );
                let _ = events.send(ChatEvent::FallbackStart {
                    from: primary.id.clone(),
                    to: fallback.id.clone(),
                });
                self.attempt(client, fallback, context, events, cancel)
                    .await
                    .map_err(|source| Error::Exhausted {
                        tried: vec![primary.id.clone(), fallback.id.clone()],
                        source,
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One call against one model, bounded by the configured timeout.
    async fn attempt(
        &self,
        client: &dyn ModelClient,
        model: &Model,
        context: &Context,
        events: &broadcast::Sender<ChatEvent>,
        cancel: &CancellationToken,
    ) -> almanac_ai::Result<Completion> {
        let _ = events.send(ChatEvent::ReplyStart {
            model: model.id.clone(),
        });

        let call = async {
            match self.delivery {
                Delivery::Complete => client.generate(model, context).await,
                Delivery::Streaming => {
                    let mut stream = client.stream(model, context).await?;
                    let mut builder = ReplyBuilder::new();

                    while let Some(event) = stream.next().await {
                        if let ReplyEvent::Error { message } = &event {
                            return Err(almanac_ai::Error::api("stream_error", message.clone()));
                        }
                        builder.process_event(&event);
                        if matches!(event, ReplyEvent::TextDelta { .. }) {
                            let _ = events.send(ChatEvent::ReplyUpdate {
                                text: builder.partial_text().to_string(),
                            });
                        }
                        if event.is_terminal() {
                            break;
                        }
                    }

                    Ok(builder.build())
                }
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(almanac_ai::Error::Aborted),
            result = tokio::time::timeout(self.timeout, call) => match result {
                Ok(inner) => inner,
                Err(_) => Err(almanac_ai::Error::Timeout {
                    seconds: self.timeout.as_secs(),
                }),
            },
        }
    }
}
