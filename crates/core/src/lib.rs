//! # Open Swarm Core
//!
//! Domain types and error definitions shared by the Open Swarm context and
//! configuration crates. This crate has no framework dependencies: it only
//! describes conversations and the errors that cross crate boundaries.

pub mod error;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Conversation, ConversationId, FunctionCall, Message, MessageToolCall, Role};
