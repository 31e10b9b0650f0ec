//! almanac-ai: client layer for the Google Generative Language API
//!
//! This crate provides the types, streaming model, and HTTP client used to
//! send a conversation (text and at most one inline image) to Gemini and
//! receive the reply either as a stream of text fragments or in one piece.

pub mod error;
pub mod models;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::{ReplyBuilder, ReplyEvent, ReplyStream};
pub use types::*;
