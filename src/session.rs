//! Per-session orchestration: batch ingest and analysis, gated chat.
//!
//! A [`ReviewSession`] owns everything that lives for one user session:
//! the chunk index for the last upload batch, the analyses of that batch,
//! and the chat history. Nothing is persisted; dropping the session
//! discards it.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::AnalysisPipeline;
use crate::answer::{AnswerError, Answerer};
use crate::chunk::{chunk_documents, ChunkParams};
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::extract::{extract_text, FileKind};
use crate::index::{ChunkIndex, InMemoryIndex};
use crate::llm::Completer;
use crate::models::{AnalysisResult, ConversationMessage, Document};
use crate::tokens::{BudgetDecision, TokenBudget, TokenCounter};

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Analyzed(AnalysisResult),
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentAnalysis {
    pub source: String,
    pub outcome: AnalysisOutcome,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub documents: usize,
    pub skipped: Vec<String>,
    pub total_chunks: usize,
    pub analyses: Vec<DocumentAnalysis>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    /// `warning` carries the budget decision when usage crossed the warn threshold.
    Answered {
        answer: String,
        warning: Option<BudgetDecision>,
    },
    /// The question was refused; history is unchanged.
    Blocked { used: usize, max: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no documents have been processed yet; upload contracts first")]
    NoDocuments,

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

pub struct ReviewSession {
    params: ChunkParams,
    pipeline: AnalysisPipeline,
    answerer: Answerer,
    budget: TokenBudget,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    embedding_batch_size: usize,
    conversational: bool,
    index: Option<Box<dyn ChunkIndex>>,
    analyses: Vec<DocumentAnalysis>,
    history: Vec<ConversationMessage>,
}

impl ReviewSession {
    pub fn new(
        config: &Config,
        completer: Arc<dyn Completer>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        counter: Arc<dyn TokenCounter>,
    ) -> Result<Self> {
        Ok(Self {
            params: config.chunking.params()?,
            pipeline: AnalysisPipeline::from_config(Arc::clone(&completer), &config.llm),
            answerer: Answerer::from_config(completer, &config.llm, &config.retrieval),
            budget: TokenBudget::new(counter, config.tokens.limits()),
            embedder,
            embedding_batch_size: config.embedding.batch_size,
            conversational: config.retrieval.conversational,
            index: None,
            analyses: Vec::new(),
            history: Vec::new(),
        })
    }

    /// Extract, chunk, index, and analyze a batch of uploads.
    ///
    /// Uploads with an unsupported extension or no extractable text are
    /// skipped. If nothing is left the previous index and analyses are kept.
    /// A failed analysis is recorded against its document and the batch
    /// continues. Chat history is not touched.
    pub async fn ingest(&mut self, uploads: Vec<Upload>) -> Result<BatchReport> {
        let (documents, mut report) = self.build_index(uploads).await?;
        if documents.is_empty() {
            return Ok(report);
        }

        let mut analyses = Vec::with_capacity(documents.len());
        for doc in &documents {
            let outcome = match self.pipeline.analyze(&doc.text).await {
                Ok(result) => AnalysisOutcome::Analyzed(result),
                Err(e) => {
                    tracing::warn!(source = %doc.source, error = %e, "Analysis failed");
                    AnalysisOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            analyses.push(DocumentAnalysis {
                source: doc.source.clone(),
                outcome,
                analyzed_at: Utc::now(),
            });
        }
        self.analyses = analyses.clone();
        report.analyses = analyses;

        Ok(report)
    }

    /// Like [`ingest`](Self::ingest) but only builds the chunk index, for
    /// callers that just want Q&A. Previous analyses are cleared when a new
    /// index replaces the old one.
    pub async fn index_only(&mut self, uploads: Vec<Upload>) -> Result<BatchReport> {
        let (documents, report) = self.build_index(uploads).await?;
        if !documents.is_empty() {
            self.analyses.clear();
        }
        Ok(report)
    }

    async fn build_index(&mut self, uploads: Vec<Upload>) -> Result<(Vec<Document>, BatchReport)> {
        let mut documents = Vec::new();
        let mut skipped = Vec::new();

        for upload in uploads {
            let Some(kind) = FileKind::from_name(&upload.name) else {
                tracing::warn!(source = %upload.name, "Unsupported file type, skipping");
                skipped.push(upload.name);
                continue;
            };
            let text = extract_text(&upload.bytes, kind);
            if text.trim().is_empty() {
                tracing::warn!(source = %upload.name, "No extractable text, skipping");
                skipped.push(upload.name);
                continue;
            }
            documents.push(Document::new(upload.name, text));
        }

        if documents.is_empty() {
            let report = BatchReport {
                documents: 0,
                skipped,
                total_chunks: 0,
                analyses: Vec::new(),
            };
            return Ok((documents, report));
        }

        let chunks = chunk_documents(&documents, &self.params);
        let total_chunks = chunks.len();
        let index =
            InMemoryIndex::build(chunks, self.embedder.clone(), self.embedding_batch_size).await?;
        self.index = Some(Box::new(index));

        tracing::info!(
            documents = documents.len(),
            total_chunks,
            "Processed {} documents into {} chunks",
            documents.len(),
            total_chunks
        );

        let report = BatchReport {
            documents: documents.len(),
            skipped,
            total_chunks,
            analyses: Vec::new(),
        };
        Ok((documents, report))
    }

    /// Answer a chat question, gated by the token budget.
    ///
    /// History is extended only after a successful answer, so a failed
    /// call leaves it as it was.
    pub async fn ask(&mut self, question: &str) -> Result<ChatOutcome, SessionError> {
        let index = self.index.as_deref().ok_or(SessionError::NoDocuments)?;

        let decision = self.budget.check(&self.history, question);
        match decision {
            BudgetDecision::Blocked { used, max } => {
                tracing::warn!(used, max, "Token limit exceeded, question refused");
                return Ok(ChatOutcome::Blocked { used, max });
            }
            BudgetDecision::Warn { used, max } => {
                tracing::warn!(used, max, "High token usage");
            }
            BudgetDecision::Ok { .. } => {}
        }

        let answer = if self.conversational {
            self.answerer
                .answer_with_history(question, &self.history, index)
                .await
        } else {
            self.answerer.answer(question, index).await
        }?;

        self.history.push(ConversationMessage::user(question));
        self.history.push(ConversationMessage::assistant(answer.clone()));

        Ok(ChatOutcome::Answered {
            answer,
            warning: matches!(decision, BudgetDecision::Warn { .. }).then_some(decision),
        })
    }

    /// Start a new chat. The index and analyses survive.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn summarize_history(&self) -> Result<String, SessionError> {
        Err(SessionError::NotImplemented("conversation summarization"))
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    pub fn analyses(&self) -> &[DocumentAnalysis] {
        &self.analyses
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Tokens the next question would use under the current history.
    pub fn token_usage(&self, pending: &str) -> usize {
        self.budget.used(&self.history, pending)
    }
}
