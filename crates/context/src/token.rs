//! Token estimation utilities.
//!
//! The truncator is generic over a [`TokenCounter`]. Production callers plug
//! in a BPE tokenizer; [`HeuristicCounter`] is the built-in fallback and uses
//! a character heuristic of ~4 bytes per token, rounded up. It is monotonic in
//! text length, which is all the truncator relies on. Tests are written
//! against this heuristic, not against exact BPE output.

use crate::error::ContextError;
use openswarm_core::Message;
use tracing::warn;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Counts tokens for a piece of message text under a given model.
///
/// Must be pure and cheap: it runs once per message on every turn. Any
/// `Fn(&str, &str) -> Result<usize, ContextError>` closure is a counter.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize, ContextError>;
}

impl<F> TokenCounter for F
where
    F: Fn(&str, &str) -> Result<usize, ContextError> + Send + Sync,
{
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize, ContextError> {
        self(text, model)
    }
}

/// Character-based counter used when no tokenizer is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count_tokens(&self, text: &str, _model: &str) -> Result<usize, ContextError> {
        Ok(estimate_tokens(text))
    }
}

/// Token cost of one message.
///
/// Charges the counter for [`Message::token_text`]. If the counter fails, the
/// message is costed with [`estimate_tokens`] instead so a tokenizer quirk
/// never aborts a turn.
pub fn message_tokens(counter: &dyn TokenCounter, message: &Message, model: &str) -> usize {
    let text = message.token_text();
    match counter.count_tokens(&text, model) {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!("Token counting failed for {} message, using estimate: {e}", message.role);
            estimate_tokens(&text)
        }
    }
}

/// Total token cost of a slice of messages, saturating at `usize::MAX`.
pub fn messages_tokens(counter: &dyn TokenCounter, messages: &[Message], model: &str) -> usize {
    messages
        .iter()
        .map(|m| message_tokens(counter, m, model))
        .fold(0, usize::saturating_add)
}
