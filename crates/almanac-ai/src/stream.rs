//! Streaming event types and the fragment accumulator

use crate::types::{Completion, StopReason, Turn, Usage};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while a reply streams in.
///
/// A reply stream is lazy, finite, and non-restartable: `Start`, zero or
/// more `TextDelta`s, then exactly one `Done` or `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyEvent {
    /// The call was accepted and fragments will follow
    Start,
    /// A text fragment arrived
    TextDelta { delta: String },
    /// Reply completed successfully
    Done { completion: Completion },
    /// Error occurred; no further events follow
    Error { message: String },
}

impl ReplyEvent {
    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReplyEvent::Done { .. } | ReplyEvent::Error { .. })
    }
}

/// A stream of reply events
pub type ReplyStream = Pin<Box<dyn Stream<Item = ReplyEvent> + Send>>;

/// Folds streamed fragments into an accumulating reply.
///
/// The partial text is observable after every fragment; the final text
/// equals the concatenation of all deltas in arrival order.
#[derive(Debug, Default)]
pub struct ReplyBuilder {
    text: String,
    usage: Usage,
    stop_reason: Option<StopReason>,
}

impl ReplyBuilder {
    /// Create a new reply builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a streaming event and update the accumulated state
    pub fn process_event(&mut self, event: &ReplyEvent) {
        match event {
            ReplyEvent::TextDelta { delta } => {
                self.text.push_str(delta);
            }
            ReplyEvent::Done { completion } => {
                // The provider's final text is authoritative
                self.text = completion.turn.text();
                self.usage = completion.usage.clone();
                self.stop_reason = Some(completion.stop_reason);
            }
            ReplyEvent::Start | ReplyEvent::Error { .. } => {}
        }
    }

    /// The text accumulated so far
    pub fn partial_text(&self) -> &str {
        &self.text
    }

    /// Build the final completion from the accumulated state
    pub fn build(self) -> Completion {
        Completion {
            turn: Turn::assistant(self.text),
            usage: self.usage,
            stop_reason: self.stop_reason.unwrap_or(StopReason::Stop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_observable_after_each_fragment() {
        let mut builder = ReplyBuilder::new();
        builder.process_event(&ReplyEvent::Start);
        assert_eq!(builder.partial_text(), "");

        let fragments = ["Mon ", "10:00", " meeting"];
        let expected = ["Mon ", "Mon 10:00", "Mon 10:00 meeting"];
        for (fragment, partial) in fragments.iter().zip(expected) {
            builder.process_event(&ReplyEvent::TextDelta {
                delta: (*fragment).to_string(),
            });
            assert_eq!(builder.partial_text(), partial);
        }

        let completion = builder.build();
        assert_eq!(completion.turn.text(), "Mon 10:00 meeting");
        assert_eq!(completion.stop_reason, StopReason::Stop);
    }

    #[test]
    fn test_done_event_is_authoritative() {
        let mut builder = ReplyBuilder::new();
        builder.process_event(&ReplyEvent::TextDelta {
            delta: "partial".into(),
        });
        builder.process_event(&ReplyEvent::Done {
            completion: Completion {
                turn: Turn::assistant("partial text"),
                usage: Usage {
                    input: 12,
                    output: 3,
                },
                stop_reason: StopReason::Length,
            },
        });

        let completion = builder.build();
        assert_eq!(completion.turn.text(), "partial text");
        assert_eq!(completion.usage.input, 12);
        assert_eq!(completion.stop_reason, StopReason::Length);
    }

    #[test]
    fn test_error_event_leaves_partial_intact() {
        let mut builder = ReplyBuilder::new();
        builder.process_event(&ReplyEvent::TextDelta { delta: "Mon".into() });
        builder.process_event(&ReplyEvent::Error {
            message: "boom".into(),
        });
        assert_eq!(builder.partial_text(), "Mon");
    }

    #[test]
    fn test_terminal_events() {
        assert!(
            ReplyEvent::Error {
                message: "x".into()
            }
            .is_terminal()
        );
        assert!(!ReplyEvent::Start.is_terminal());
        assert!(
            !ReplyEvent::TextDelta { delta: "x".into() }.is_terminal()
        );
    }
}
