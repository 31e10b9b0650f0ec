//! Chat orchestration: one session, one in-flight turn at a time.

use crate::{
    assembler,
    error::Result,
    events::ChatEvent,
    handle::ChatHandle,
    invoker::{Delivery, Invoker, ModelChain, ModelClient},
    session::{Attachment, Session},
};
use almanac_ai::Turn;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Chat configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// System instruction sent with every request
    pub system_instruction: String,
    /// Models to try, in order
    pub chain: ModelChain,
    /// Streaming or one-shot retrieval
    pub delivery: Delivery,
    /// Per-attempt deadline
    pub request_timeout: Duration,
}

impl ChatConfig {
    /// Default per-attempt deadline
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
}

/// Drives a single conversation.
///
/// Owns the [`Session`] and the event channel. Taking `&mut self` for
/// [`Chat::send`] makes a second concurrent submission unrepresentable;
/// back-pressure is the UI's job (disable submit, don't queue).
pub struct Chat {
    config: ChatConfig,
    session: Session,
    client: Arc<dyn ModelClient>,
    event_tx: broadcast::Sender<ChatEvent>,
    handle: ChatHandle,
}

impl Chat {
    /// Create a new chat over an empty session
    pub fn new(config: ChatConfig, client: Arc<dyn ModelClient>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            session: Session::new(),
            client,
            event_tx,
            handle: ChatHandle::new(),
        }
    }

    /// Subscribe to chat events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    /// The session state
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The chat configuration
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Get a cloneable handle for cancelling from outside
    pub fn handle(&self) -> ChatHandle {
        self.handle.clone()
    }

    /// Cancel the in-flight call, if any
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Seed the transcript with an assistant turn (the opening greeting)
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.session.push(Turn::assistant(text));
    }

    /// Install an attachment, replacing any existing one
    pub fn attach(&mut self, attachment: Attachment) {
        self.session.set_attachment(attachment);
    }

    /// Remove the current attachment. Returns whether one was present.
    pub fn detach(&mut self) -> bool {
        self.session.clear_attachment()
    }

    /// Reset the session
    pub fn clear(&mut self) {
        self.session.clear();
    }

    /// Process one user turn: append it, assemble the payload, run the
    /// model chain, and append the assistant reply on success.
    ///
    /// On any failure the transcript gains no assistant turn; the session
    /// stays valid and the user may retry on the next turn.
    pub async fn send(&mut self, input: &str) -> Result<()> {
        *self.handle.cancel.lock() = CancellationToken::new();
        self.handle.is_running.store(true, Ordering::Release);
        let _ = self.event_tx.send(ChatEvent::TurnStart);

        self.session.push(Turn::user(input));
        let payload = assembler::build_payload(&self.config.system_instruction, &self.session);

        let invoker = Invoker::new(
            self.config.chain.clone(),
            self.config.delivery,
            self.config.request_timeout,
        );
        let cancel = self.handle.cancel_token();

        let result = invoker
            .invoke(self.client.as_ref(), &payload, &self.event_tx, &cancel)
            .await;

        let outcome = match result {
            Ok(completion) => {
                self.session.push(completion.turn.clone());
                self.session.record_usage(&completion.usage);
                let _ = self.event_tx.send(ChatEvent::ReplyEnd {
                    turn: completion.turn,
                    usage: completion.usage,
                });
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "turn failed");
                let _ = self.event_tx.send(ChatEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        };

        self.handle.is_running.store(false, Ordering::Release);
        self.handle.idle_notify.notify_waiters();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::ProviderClient;
    use almanac_ai::{
        Completion, Context, Model, ReplyStream, Role, StopReason, Usage,
        models::resolve_model,
        stream::ReplyEvent,
    };
    use async_trait::async_trait;

    struct FixedClient {
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl ModelClient for FixedClient {
        async fn stream(
            &self,
            model: &Model,
            _context: &Context,
        ) -> almanac_ai::Result<ReplyStream> {
            match self.reply {
                Some(text) => Ok(Box::pin(futures::stream::iter(vec![
                    ReplyEvent::Start,
                    ReplyEvent::TextDelta { delta: text.into() },
                    ReplyEvent::Done {
                        completion: Completion {
                            turn: Turn::assistant(text),
                            usage: Usage { input: 9, output: 4 },
                            stop_reason: StopReason::Stop,
                        },
                    },
                ]))),
                None => Err(almanac_ai::Error::ModelNotFound(model.id.clone())),
            }
        }

        async fn generate(
            &self,
            model: &Model,
            _context: &Context,
        ) -> almanac_ai::Result<Completion> {
            match self.reply {
                Some(text) => Ok(Completion {
                    turn: Turn::assistant(text),
                    usage: Usage { input: 9, output: 4 },
                    stop_reason: StopReason::Stop,
                }),
                None => Err(almanac_ai::Error::ModelNotFound(model.id.clone())),
            }
        }
    }

    fn config() -> ChatConfig {
        ChatConfig {
            system_instruction: "You are a scheduling assistant.".into(),
            chain: ModelChain::single(resolve_model("gemini-1.5-flash")),
            delivery: Delivery::Streaming,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_send_appends_user_then_assistant() {
        let mut chat = Chat::new(
            config(),
            Arc::new(FixedClient {
                reply: Some("no conflicts"),
            }),
        );
        chat.push_assistant("Hi! Paste your schedule.");

        chat.send("Mon 10:00 meeting").await.unwrap();

        let roles: Vec<Role> = chat.session().turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(chat.session().turns()[2].text(), "no conflicts");
        assert_eq!(chat.session().total_usage(), &Usage { input: 9, output: 4 });
    }

    #[tokio::test]
    async fn test_failed_turn_commits_no_assistant_turn() {
        let mut chat = Chat::new(config(), Arc::new(FixedClient { reply: None }));

        let err = chat.send("Mon 10:00 meeting").await.unwrap_err();
        assert!(!err.is_missing_credential());

        let roles: Vec<Role> = chat.session().turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User]);
        assert_eq!(chat.session().total_usage(), &Usage::default());
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let mut chat = Chat::new(config(), Arc::new(ProviderClient::new(None)));

        let err = chat.send("Mon 10:00 meeting").await.unwrap_err();
        assert!(err.is_missing_credential());

        // User turn recorded, no assistant turn
        let roles: Vec<Role> = chat.session().turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User]);
    }

    #[tokio::test]
    async fn test_session_stays_usable_after_failure() {
        let mut chat = Chat::new(config(), Arc::new(FixedClient { reply: None }));
        chat.send("first").await.unwrap_err();

        assert_eq!(chat.session().turns().len(), 1);
        chat.send("second").await.unwrap_err();
        assert_eq!(chat.session().turns().len(), 2);
        assert_eq!(chat.session().latest_user_turn().unwrap().text(), "second");
    }

    #[tokio::test]
    async fn test_error_event_on_failure() {
        let mut chat = Chat::new(config(), Arc::new(FixedClient { reply: None }));
        let mut rx = chat.subscribe();

        chat.send("check this").await.unwrap_err();

        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            if let ChatEvent::Error { .. } = event {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_events_on_success() {
        let mut chat = Chat::new(
            config(),
            Arc::new(FixedClient {
                reply: Some("done"),
            }),
        );
        let mut rx = chat.subscribe();

        chat.send("check this").await.unwrap();

        let mut saw_turn_start = false;
        let mut saw_reply_end = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ChatEvent::TurnStart => saw_turn_start = true,
                ChatEvent::ReplyEnd { ref turn, .. } => {
                    saw_reply_end = true;
                    assert_eq!(turn.text(), "done");
                }
                _ => {}
            }
        }
        assert!(saw_turn_start);
        assert!(saw_reply_end);
    }

    #[tokio::test]
    async fn test_idle_after_send() {
        let mut chat = Chat::new(
            config(),
            Arc::new(FixedClient {
                reply: Some("ok"),
            }),
        );
        let handle = chat.handle();

        chat.send("hello").await.unwrap();
        assert!(!handle.is_running());
        handle.wait_for_idle().await;
    }
}
