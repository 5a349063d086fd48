//! Retrieval-augmented answering over a [`ChunkIndex`].
//!
//! Retrieves the top-k chunks for a question, joins their text best-first
//! into the prompt context, and returns the trimmed completion. There is no
//! retry here; completion failures propagate to the caller.

use std::sync::Arc;

use crate::config::{LlmConfig, RetrievalConfig};
use crate::index::ChunkIndex;
use crate::llm::{Completer, CompletionError, CompletionOptions};
use crate::models::ConversationMessage;
use crate::prompts::{build_answer_prompt, build_conversational_prompt};

pub const CONTEXT_SEPARATOR: &str = "\n";

#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    #[error("answer generation failed: {0}")]
    Completion(#[from] CompletionError),
}

pub struct Answerer {
    completer: Arc<dyn Completer>,
    options: CompletionOptions,
    k: usize,
}

impl Answerer {
    pub fn new(completer: Arc<dyn Completer>, options: CompletionOptions, k: usize) -> Self {
        Self {
            completer,
            options,
            k,
        }
    }

    pub fn from_config(
        completer: Arc<dyn Completer>,
        llm: &LlmConfig,
        retrieval: &RetrievalConfig,
    ) -> Self {
        Self::new(
            completer,
            CompletionOptions {
                temperature: llm.temperature,
                max_output_tokens: llm.answer_max_tokens,
            },
            retrieval.k,
        )
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub async fn answer(&self, question: &str, index: &dyn ChunkIndex) -> Result<String, AnswerError> {
        let context = self.retrieve_context(question, index).await?;
        self.complete(&build_answer_prompt(&context, question)).await
    }

    /// Like [`answer`](Self::answer), with prior turns rendered into the prompt.
    pub async fn answer_with_history(
        &self,
        question: &str,
        history: &[ConversationMessage],
        index: &dyn ChunkIndex,
    ) -> Result<String, AnswerError> {
        let context = self.retrieve_context(question, index).await?;
        self.complete(&build_conversational_prompt(history, &context, question))
            .await
    }

    async fn retrieve_context(
        &self,
        question: &str,
        index: &dyn ChunkIndex,
    ) -> Result<String, AnswerError> {
        let hits = index
            .search(question, self.k)
            .await
            .map_err(AnswerError::Retrieval)?;
        tracing::debug!(k = self.k, retrieved = hits.len(), "Retrieved context");
        Ok(hits
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR))
    }

    async fn complete(&self, prompt: &str) -> Result<String, AnswerError> {
        let text = self.completer.complete(prompt, &self.options).await?;
        Ok(text.trim().to_string())
    }
}
