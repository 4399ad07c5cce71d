//! Budget-driven history truncation.
//!
//! Produces the most recent subsequence of a conversation that fits both a
//! token budget and a message-count budget.
//!
//! # Rules
//!
//! | Message | Treatment |
//! |---------|-----------|
//! | `system` | Hoisted to the front, cost reserved up front, never trimmed |
//! | `tool` | Kept only together with its issuing assistant and all sibling results |
//! | `assistant` with tool calls | Same unit as above, reached from the other side |
//! | anything else | Kept newest-first while it fits |
//!
//! In [`TruncationMode::Simple`] the pairing rules are skipped.
//!
//! The walk goes from newest to oldest and stops at the first message or unit
//! that does not fit, unless [`TruncationOptions::continue_past_overflow`] is
//! set. Kept messages are emitted in their original order.

use std::collections::HashSet;
use std::str::FromStr;

use openswarm_core::{Message, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ContextError;
use crate::token::{TokenCounter, message_tokens};

/// Environment variable that selects the truncation mode.
pub const MODE_ENV_VAR: &str = "SWARM_TRUNCATION_MODE";

/// How far back (in non-system messages) a tool result looks for its caller.
pub const DEFAULT_LOOKBACK: usize = 10;

/// Token budget used when configuration does not set one.
pub const DEFAULT_MAX_TOKENS: usize = 8000;

/// Message budget used when configuration does not set one.
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// Truncation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationMode {
    /// Keep the most recent messages that fit. Tool pairs may be split.
    Simple,
    /// Keep tool calls and their results as atomic units.
    #[default]
    Pairs,
}

impl TruncationMode {
    /// Read the mode from `SWARM_TRUNCATION_MODE`, defaulting to `Pairs`.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(MODE_ENV_VAR).ok().as_deref())
    }

    fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::parse::<Self>) {
            Some(Ok(mode)) => mode,
            Some(Err(e)) => {
                warn!("Ignoring {MODE_ENV_VAR}: {e}");
                Self::default()
            }
            None => Self::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Pairs => "pairs",
        }
    }
}

impl FromStr for TruncationMode {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "pairs" | "sophisticated" => Ok(Self::Pairs),
            _ => Err(ContextError::UnknownMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for TruncationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token and message ceilings. Both must hold for the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLimits {
    pub max_tokens: usize,
    pub max_messages: usize,
}

impl ContextLimits {
    pub fn new(max_tokens: usize, max_messages: usize) -> Self {
        Self {
            max_tokens,
            max_messages,
        }
    }
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS, DEFAULT_MAX_MESSAGES)
    }
}

/// Tuning knobs that do not change the output contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncationOptions {
    /// Bound on the backward search from a tool result to its caller.
    pub lookback: usize,
    /// Skip a message or unit that does not fit instead of stopping.
    pub continue_past_overflow: bool,
}

impl Default for TruncationOptions {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            continue_past_overflow: false,
        }
    }
}

/// Truncate `history` to fit `max_tokens` and `max_messages`.
///
/// Never fails: degenerate budgets produce an empty history.
pub fn truncate(
    history: &[Message],
    counter: &dyn TokenCounter,
    model: &str,
    max_tokens: usize,
    max_messages: usize,
    mode: TruncationMode,
) -> Vec<Message> {
    Truncator::new(counter, model, ContextLimits::new(max_tokens, max_messages))
        .with_mode(mode)
        .truncate(history)
}

/// Fail-soft entry point for histories that arrive as raw JSON.
///
/// Anything that is not an array of well-formed messages yields an empty
/// history and a warning.
pub fn truncate_value(
    history: &serde_json::Value,
    counter: &dyn TokenCounter,
    model: &str,
    max_tokens: usize,
    max_messages: usize,
    mode: TruncationMode,
) -> Vec<Message> {
    match decode_history(history) {
        Some(messages) => truncate(&messages, counter, model, max_tokens, max_messages, mode),
        None => Vec::new(),
    }
}

fn decode_history(value: &serde_json::Value) -> Option<Vec<Message>> {
    let Some(items) = value.as_array() else {
        warn!("Message history is not a JSON array, discarding it");
        return None;
    };

    let mut messages = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if !item.is_object() {
            warn!("History entry {index} is not a JSON object, discarding history");
            return None;
        }
        match Message::deserialize(item) {
            Ok(message) => messages.push(message),
            Err(e) => {
                warn!("History entry {index} is malformed ({e}), discarding history");
                return None;
            }
        }
    }
    Some(messages)
}

/// Reusable truncation settings bound to a counter and model.
pub struct Truncator<'a> {
    counter: &'a dyn TokenCounter,
    model: &'a str,
    limits: ContextLimits,
    mode: TruncationMode,
    options: TruncationOptions,
}

impl<'a> Truncator<'a> {
    pub fn new(counter: &'a dyn TokenCounter, model: &'a str, limits: ContextLimits) -> Self {
        Self {
            counter,
            model,
            limits,
            mode: TruncationMode::default(),
            options: TruncationOptions::default(),
        }
    }

    pub fn with_mode(mut self, mode: TruncationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_options(mut self, options: TruncationOptions) -> Self {
        self.options = options;
        self
    }

    /// Produce a truncated copy of `history`. The input is not modified.
    pub fn truncate(&self, history: &[Message]) -> Vec<Message> {
        if history.is_empty() {
            return Vec::new();
        }

        let (system, rest): (Vec<&Message>, Vec<&Message>) =
            history.iter().partition(|m| m.role == Role::System);

        let system_tokens: usize = system
            .iter()
            .map(|m| message_tokens(self.counter, m, self.model))
            .fold(0, usize::saturating_add);
        if system_tokens > self.limits.max_tokens || system.len() > self.limits.max_messages {
            warn!(
                "System messages ({} messages, {} tokens) exceed context budget ({} messages, {} tokens); returning empty history",
                system.len(),
                system_tokens,
                self.limits.max_messages,
                self.limits.max_tokens
            );
            return Vec::new();
        }

        let mut walk = Walk {
            messages: &rest,
            costs: vec![None; rest.len()],
            decided: vec![false; rest.len()],
            kept: vec![false; rest.len()],
            budget: Budget {
                tokens: self.limits.max_tokens - system_tokens,
                messages: self.limits.max_messages - system.len(),
            },
        };
        match self.mode {
            TruncationMode::Simple => self.walk_simple(&mut walk),
            TruncationMode::Pairs => self.walk_pairs(&mut walk),
        }

        let mut out: Vec<Message> = system.into_iter().cloned().collect();
        out.extend(
            rest.iter()
                .zip(&walk.kept)
                .filter(|(_, keep)| **keep)
                .map(|(m, _)| (*m).clone()),
        );

        debug!(
            "Truncated history from {} to {} messages (mode={}, model={})",
            history.len(),
            out.len(),
            self.mode,
            self.model
        );
        out
    }

    fn walk_simple(&self, walk: &mut Walk<'_>) {
        for i in (0..walk.messages.len()).rev() {
            if walk.budget.messages == 0 {
                break;
            }
            let cost = walk.cost(i, self);
            if walk.budget.fits(cost, 1) {
                walk.keep(&[i], cost);
            } else if !self.options.continue_past_overflow {
                break;
            }
        }
    }

    fn walk_pairs(&self, walk: &mut Walk<'_>) {
        let mut i = walk.messages.len();
        while i > 0 {
            i -= 1;
            if walk.decided[i] {
                continue;
            }
            if walk.budget.messages == 0 {
                break;
            }

            let message = walk.messages[i];
            let anchor = match message.role {
                Role::Tool => match self.find_caller(walk, i) {
                    Some(j) => j,
                    None => {
                        debug!(
                            "Dropping tool result {:?} with no matching assistant call",
                            message.tool_call_id
                        );
                        walk.decided[i] = true;
                        continue;
                    }
                },
                Role::Assistant if message.has_tool_calls() => i,
                _ => {
                    let cost = walk.cost(i, self);
                    if walk.budget.fits(cost, 1) {
                        walk.keep(&[i], cost);
                    } else if self.options.continue_past_overflow {
                        walk.decided[i] = true;
                    } else {
                        break;
                    }
                    continue;
                }
            };

            let unit = tool_unit(walk, anchor);
            if !unit.complete {
                debug!(
                    "Dropping assistant tool call with {} unanswered call(s)",
                    unit.missing
                );
                walk.discard(&unit.members);
                continue;
            }

            let cost = unit
                .members
                .iter()
                .map(|&k| walk.cost(k, self))
                .fold(0, usize::saturating_add);
            if walk.budget.fits(cost, unit.members.len()) {
                walk.keep(&unit.members, cost);
            } else if self.options.continue_past_overflow {
                walk.discard(&unit.members);
            } else {
                break;
            }
        }
    }

    /// Find the assistant that issued the call answered by the tool result at `i`.
    fn find_caller(&self, walk: &Walk<'_>, i: usize) -> Option<usize> {
        let call_id = walk.messages[i].tool_call_id.as_deref()?;
        let floor = i.saturating_sub(self.options.lookback);
        (floor..i)
            .rev()
            .find(|&j| !walk.decided[j] && walk.messages[j].issued_call(call_id))
    }
}

/// An assistant tool-call message plus every result answering it.
struct ToolUnit {
    /// Indices in ascending order, assistant first.
    members: Vec<usize>,
    complete: bool,
    missing: usize,
}

fn tool_unit(walk: &Walk<'_>, assistant: usize) -> ToolUnit {
    let calls: HashSet<&str> = walk.messages[assistant]
        .tool_calls
        .iter()
        .map(|c| c.id.as_str())
        .collect();

    let mut members = vec![assistant];
    let mut answered = HashSet::new();
    for k in assistant + 1..walk.messages.len() {
        let candidate = walk.messages[k];
        if candidate.role != Role::Tool || walk.kept[k] {
            continue;
        }
        if let Some(id) = candidate.tool_call_id.as_deref().filter(|id| calls.contains(id)) {
            members.push(k);
            answered.insert(id);
        }
    }

    let missing = calls.len() - answered.len();
    ToolUnit {
        members,
        complete: missing == 0,
        missing,
    }
}

#[derive(Debug, Clone, Copy)]
struct Budget {
    tokens: usize,
    messages: usize,
}

impl Budget {
    fn fits(&self, tokens: usize, messages: usize) -> bool {
        tokens <= self.tokens && messages <= self.messages
    }
}

/// Per-call scratch state for one backward walk.
struct Walk<'m> {
    messages: &'m [&'m Message],
    costs: Vec<Option<usize>>,
    decided: Vec<bool>,
    kept: Vec<bool>,
    budget: Budget,
}

impl Walk<'_> {
    fn cost(&mut self, i: usize, truncator: &Truncator<'_>) -> usize {
        if let Some(cost) = self.costs[i] {
            return cost;
        }
        let cost = message_tokens(truncator.counter, self.messages[i], truncator.model);
        self.costs[i] = Some(cost);
        cost
    }

    fn keep(&mut self, indices: &[usize], cost: usize) {
        for &k in indices {
            self.decided[k] = true;
            self.kept[k] = true;
        }
        self.budget.tokens -= cost;
        self.budget.messages -= indices.len();
    }

    fn discard(&mut self, indices: &[usize]) {
        for &k in indices {
            self.decided[k] = true;
        }
    }
}
