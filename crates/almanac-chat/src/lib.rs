//! almanac-chat: the conversation engine
//!
//! Owns the per-session state (transcript and attachment), assembles the
//! request payload for each user turn, and drives the model invoker with
//! its primary-then-fallback chain.

pub mod assembler;
pub mod chat;
pub mod error;
pub mod events;
pub mod handle;
pub mod invoker;
pub mod session;

pub use chat::{Chat, ChatConfig};
pub use error::{Error, Result};
pub use events::ChatEvent;
pub use handle::ChatHandle;
pub use invoker::{Delivery, Invoker, ModelChain, ModelClient, ProviderClient};
pub use session::{Attachment, Session};
