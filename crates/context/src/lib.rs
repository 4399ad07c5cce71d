//! Context window management for Open Swarm conversations.
//!
//! Before every model call the orchestration layer hands the live history to
//! this crate and gets back a snapshot that fits the configured token and
//! message budgets:
//! - system messages are always kept and moved to the front
//! - tool calls and their results are kept or dropped as one unit
//! - the newest messages win
//!
//! Truncation never fails. Malformed input and tokenizer errors degrade to a
//! smaller (possibly empty) history and a log line.

mod error;
mod token;
mod truncate;

use openswarm_core::{Conversation, Message};

pub use error::ContextError;
pub use token::{HeuristicCounter, TokenCounter, estimate_tokens, message_tokens, messages_tokens};
pub use truncate::{
    ContextLimits, DEFAULT_LOOKBACK, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_TOKENS, MODE_ENV_VAR,
    TruncationMode, TruncationOptions, Truncator, truncate, truncate_value,
};

/// Truncation as a method on [`Conversation`].
pub trait ConversationExt {
    /// A budget-fitting snapshot of the conversation's messages.
    fn truncated(
        &self,
        counter: &dyn TokenCounter,
        model: &str,
        limits: ContextLimits,
        mode: TruncationMode,
    ) -> Vec<Message>;
}

impl ConversationExt for Conversation {
    fn truncated(
        &self,
        counter: &dyn TokenCounter,
        model: &str,
        limits: ContextLimits,
        mode: TruncationMode,
    ) -> Vec<Message> {
        Truncator::new(counter, model, limits)
            .with_mode(mode)
            .truncate(&self.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_truncation_leaves_conversation_intact() {
        let mut conv = Conversation::new();
        conv.push(Message::system("rules"));
        for i in 0..10 {
            conv.push(Message::user(format!("turn {i}")));
        }

        let window = conv.truncated(
            &HeuristicCounter,
            "gpt-4o",
            ContextLimits::new(1000, 4),
            TruncationMode::Pairs,
        );
        assert_eq!(window.len(), 4);
        assert_eq!(window[0], Message::system("rules"));
        assert_eq!(window[3], Message::user("turn 9"));
        assert_eq!(conv.len(), 11);
    }
}
