//! # Contract Review
//!
//! A contract-review assistant: ingests uploaded contracts, extracts a
//! structured, risk-scored analysis through a single LLM call per document,
//! indexes document chunks, and answers follow-up questions with
//! retrieval-augmented generation under a conversation token budget.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ Uploads  │──▶│ Extract  │──▶│  Chunk   │──▶│  Index   │
//! │ pdf/docx │   │   text   │   │ windows  │   │ vec/kw   │
//! └──────────┘   └────┬─────┘   └──────────┘   └────┬─────┘
//!                     │                             │
//!                     ▼                             ▼
//!              ┌─────────────┐              ┌─────────────┐
//!              │  Analysis   │              │  Answerer   │◀── token budget
//!              │  pipeline   │              │    (RAG)    │
//!              └─────────────┘              └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GROQ_API_KEY=...
//! creview chunk msa.pdf sow.docx
//! creview analyze msa.pdf --json
//! creview ask "What is the liability cap?" msa.pdf
//! creview chat msa.pdf sow.docx
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF / DOCX text extraction |
//! | [`chunk`] | Recursive separator chunking with overlap |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory chunk index |
//! | [`llm`] | Completion client (OpenAI-compatible) |
//! | [`prompts`] | Prompt templates |
//! | [`analysis`] | Response sanitizing, repair, parsing, risk scoring |
//! | [`answer`] | Retrieval-augmented answering |
//! | [`tokens`] | Conversation token budget |
//! | [`session`] | Per-session orchestration |

pub mod analysis;
pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod session;
pub mod tokens;
