//! Chat widgets

pub mod input_box;
pub mod markdown;
pub mod message_list;
pub mod spinner;

pub use input_box::InputBox;
pub use message_list::{ChatMessage, MessageList};
pub use spinner::Spinner;
