//! # Contract Review CLI (`creview`)
//!
//! ## Usage
//!
//! ```bash
//! creview --config ./config/creview.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `creview chunk <files..>` | Extract and chunk contracts, print chunk counts |
//! | `creview analyze <files..>` | Risk-score each contract with the LLM |
//! | `creview ask "<question>" <files..>` | One-shot question over the contracts |
//! | `creview chat <files..>` | Interactive Q&A with a token budget |
//!
//! Logs go to stderr (`RUST_LOG` overrides the default `info` level);
//! results go to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use contract_review::chunk::chunk_document;
use contract_review::config::{self, Config};
use contract_review::embedding::create_provider;
use contract_review::extract::{extract_text, FileKind};
use contract_review::llm::create_completer;
use contract_review::models::{AnalysisResult, Document, RiskLevel};
use contract_review::session::{
    AnalysisOutcome, BatchReport, ChatOutcome, ReviewSession, Upload,
};
use contract_review::tokens::{BudgetDecision, TiktokenCounter};

/// Contract review assistant: risk analysis and Q&A over PDF / DOCX contracts.
#[derive(Parser)]
#[command(name = "creview", version)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/creview.toml")]
    config: PathBuf,

    /// Override `[chunking].chunk_size` (characters).
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Override `[chunking].chunk_overlap` (characters).
    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and chunk contracts without calling any model.
    Chunk {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Analyze each contract and print its risk summary.
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print the full analysis records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer one question from the contracts.
    Ask {
        question: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Interactive chat over the contracts.
    ///
    /// `/reset` starts a new chat, `/summarize` summarizes the conversation,
    /// `/quit` exits.
    Chat {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = resolve_config(&cli)?;

    match cli.command {
        Commands::Chunk { files } => run_chunk(&cfg, &files)?,
        Commands::Analyze { files, json } => {
            let mut session = build_session(&cfg)?;
            let report = session.ingest(read_uploads(&files)?).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report.analyses)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Ask { question, files } => {
            let mut session = build_session(&cfg)?;
            ingest_for_chat(&mut session, &files).await?;
            match session.ask(&question).await? {
                ChatOutcome::Answered { answer, .. } => println!("{}", answer),
                ChatOutcome::Blocked { used, max } => {
                    anyhow::bail!("Token limit exceeded ({}/{})", used, max)
                }
            }
        }
        Commands::Chat { files } => {
            let mut session = build_session(&cfg)?;
            ingest_for_chat(&mut session, &files).await?;
            run_chat(&mut session).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::debug!(path = %cli.config.display(), "No config file, using defaults");
        Config::default()
    };

    if let Some(size) = cli.chunk_size {
        cfg.chunking.chunk_size = size;
    }
    if let Some(overlap) = cli.chunk_overlap {
        cfg.chunking.chunk_overlap = overlap;
    }
    config::validate(&cfg)?;
    Ok(cfg)
}

fn build_session(cfg: &Config) -> Result<ReviewSession> {
    let completer = create_completer(&cfg.llm)?;
    let embedder = create_provider(&cfg.embedding)?;
    let counter = Arc::new(TiktokenCounter::for_encoding(&cfg.tokens.encoding)?);
    ReviewSession::new(cfg, completer, embedder, counter)
}

fn read_uploads(files: &[PathBuf]) -> Result<Vec<Upload>> {
    files
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Upload::new(display_name(path), bytes))
        })
        .collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run_chunk(cfg: &Config, files: &[PathBuf]) -> Result<()> {
    let params = cfg.chunking.params()?;
    let mut documents = 0usize;
    let mut total_chunks = 0usize;

    for upload in read_uploads(files)? {
        let text = FileKind::from_name(&upload.name)
            .map(|kind| extract_text(&upload.bytes, kind))
            .unwrap_or_default();
        if text.trim().is_empty() {
            eprintln!("skipped: {} (no extractable text)", upload.name);
            continue;
        }

        let chunks = chunk_document(&Document::new(upload.name.clone(), text), &params);
        println!("{}: {} chunks", upload.name, chunks.len());
        documents += 1;
        total_chunks += chunks.len();
    }

    println!(
        "Processed {} documents into {} chunks",
        documents, total_chunks
    );
    Ok(())
}

async fn ingest_for_chat(session: &mut ReviewSession, files: &[PathBuf]) -> Result<()> {
    let report = session.index_only(read_uploads(files)?).await?;
    for name in &report.skipped {
        eprintln!("skipped: {} (no extractable text)", name);
    }
    if report.documents == 0 {
        anyhow::bail!("No text could be extracted from the given files");
    }
    eprintln!(
        "Processed {} documents into {} chunks",
        report.documents, report.total_chunks
    );
    Ok(())
}

fn print_report(report: &BatchReport) {
    for name in &report.skipped {
        eprintln!("skipped: {} (no extractable text)", name);
    }

    for analysis in &report.analyses {
        println!("== {} ==", analysis.source);
        match &analysis.outcome {
            AnalysisOutcome::Analyzed(result) => print_analysis(result),
            AnalysisOutcome::Failed { error } => println!("Analysis failed: {}", error),
        }
        println!();
    }

    println!(
        "Processed {} documents into {} chunks",
        report.documents, report.total_chunks
    );
}

fn print_analysis(result: &AnalysisResult) {
    match result.overall_risk_score {
        Some(score) => println!(
            "Overall risk: {:.1} ({})",
            score,
            RiskLevel::from_score(score).label()
        ),
        None => println!("Overall risk: n/a"),
    }
    println!("Summary: {}", result.summary);

    if !result.flags.is_empty() {
        println!("Flags:");
        for flag in &result.flags {
            println!("  - {}", flag);
        }
    }

    if !result.clauses.is_empty() {
        println!("Clauses:");
        for clause in &result.clauses {
            let score = clause
                .risk_score
                .map(|s| format!("{}", s))
                .unwrap_or_else(|| "-".to_string());
            let ambiguous = if clause.is_ambiguous { " (ambiguous)" } else { "" };
            println!("  - {} [{}]{}: {}", clause.clause_name, score, ambiguous, clause.risk_explanation);
        }
    }
}

async fn run_chat(session: &mut ReviewSession) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stderr = tokio::io::stderr();

    loop {
        stderr.write_all(b"> ").await?;
        stderr.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                eprintln!("Started a new chat.");
            }
            "/summarize" => match session.summarize_history() {
                Ok(summary) => println!("{}", summary),
                Err(e) => eprintln!("{}", e),
            },
            question => match session.ask(question).await {
                Ok(ChatOutcome::Answered { answer, warning }) => {
                    if let Some(BudgetDecision::Warn { used, max }) = warning {
                        eprintln!(
                            "High token usage ({}/{}). Consider /summarize or /reset.",
                            used, max
                        );
                    }
                    println!("{}", answer);
                }
                Ok(ChatOutcome::Blocked { used, max }) => {
                    eprintln!(
                        "Token limit exceeded ({}/{}). Type /reset to start a new chat.",
                        used, max
                    );
                }
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }

    Ok(())
}
