//! Token budget gate for the Q&A chat.
//!
//! Counts the tokens of the whole conversation plus the pending user message,
//! adds a fixed safety buffer, and sorts the total into one of three zones:
//!
//! | Zone | Condition | Effect |
//! |------|-----------|--------|
//! | ok | `used <= warn_threshold` | send |
//! | warn | `warn_threshold < used < max_tokens` | send, show a warning |
//! | blocked | `used >= max_tokens` | reject; history is left untouched |
//!
//! The gate never truncates or summarizes history on its own.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::models::ConversationMessage;

/// Counts tokens the way the target chat model does.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// BPE counter backed by `tiktoken-rs`.
pub struct TiktokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenCounter {
    /// Load a named encoding (`cl100k_base` matches GPT-4 era models).
    pub fn for_encoding(name: &str) -> Result<Self> {
        let bpe = match name {
            "cl100k_base" => tiktoken_rs::cl100k_base()?,
            "o200k_base" => tiktoken_rs::o200k_base()?,
            "p50k_base" => tiktoken_rs::p50k_base()?,
            "r50k_base" => tiktoken_rs::r50k_base()?,
            other => bail!(
                "Unknown token encoding: '{}'. Must be cl100k_base, o200k_base, p50k_base, or r50k_base.",
                other
            ),
        };
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetLimits {
    pub max_tokens: usize,
    pub warn_threshold: usize,
    pub buffer_tokens: usize,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            warn_threshold: 5734,
            buffer_tokens: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDecision {
    Ok { used: usize },
    Warn { used: usize, max: usize },
    Blocked { used: usize, max: usize },
}

impl BudgetDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, BudgetDecision::Blocked { .. })
    }

    pub fn used(&self) -> usize {
        match *self {
            BudgetDecision::Ok { used }
            | BudgetDecision::Warn { used, .. }
            | BudgetDecision::Blocked { used, .. } => used,
        }
    }
}

pub struct TokenBudget {
    counter: Arc<dyn TokenCounter>,
    limits: BudgetLimits,
}

impl TokenBudget {
    pub fn new(counter: Arc<dyn TokenCounter>, limits: BudgetLimits) -> Self {
        Self { counter, limits }
    }

    pub fn limits(&self) -> BudgetLimits {
        self.limits
    }

    /// Tokens the next request would occupy, buffer included.
    pub fn used(&self, history: &[ConversationMessage], pending: &str) -> usize {
        let history_tokens: usize = history
            .iter()
            .map(|m| self.counter.count(&m.content))
            .sum();
        history_tokens + self.counter.count(pending) + self.limits.buffer_tokens
    }

    pub fn check(&self, history: &[ConversationMessage], pending: &str) -> BudgetDecision {
        let used = self.used(history, pending);
        let max = self.limits.max_tokens;
        if used >= max {
            BudgetDecision::Blocked { used, max }
        } else if used > self.limits.warn_threshold {
            BudgetDecision::Warn { used, max }
        } else {
            BudgetDecision::Ok { used }
        }
    }
}
