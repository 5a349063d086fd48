//! Contract analysis pipeline.
//!
//! Turns one free-form model completion into a validated [`AnalysisResult`]:
//!
//! ```text
//! prompt ─▶ complete ─▶ strip fences ─▶ empty? ─▶ repair if truncated ─▶ parse ─▶ score
//!                                          │                              │
//!                                          ▼                              ▼
//!                                   degraded result               degraded result
//! ```
//!
//! Empty and unparseable completions are reported as degraded results with a
//! diagnostic flag so a batch of documents keeps going. Only a failure of the
//! completion call itself is returned as an error. A reply that ends in `}`
//! but still fails to parse gets one repair attempt before it is given up.

pub mod repair;
pub mod sanitize;
pub mod scoring;

use std::borrow::Cow;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::llm::{Completer, CompletionError, CompletionOptions};
use crate::models::AnalysisResult;
use crate::prompts::build_analysis_prompt;

pub use repair::repair_truncated;
pub use sanitize::strip_code_fences;
pub use scoring::{clause_weight, weighted_risk_score, CLAUSE_WEIGHTS, DEFAULT_WEIGHT};

pub const EMPTY_RESPONSE_SUMMARY: &str = "Unable to analyze contract - empty response from model.";
pub const EMPTY_RESPONSE_FLAG: &str = "Empty response from LLM";
pub const PARSE_FAILURE_SUMMARY: &str =
    "Error: Could not parse LLM response. The model may not have returned valid JSON.";
pub const PARSE_FAILURE_FLAG: &str = "JSON parse error - check if model supports structured output";

/// Characters of raw output included in parse-failure logs.
const LOG_PREVIEW_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AnalysisError {
    #[error("contract analysis failed: {0}")]
    Completion(#[from] CompletionError),
}

/// Stateless analysis runner; safe to share across documents.
pub struct AnalysisPipeline {
    completer: Arc<dyn Completer>,
    options: CompletionOptions,
}

impl AnalysisPipeline {
    pub fn new(completer: Arc<dyn Completer>, options: CompletionOptions) -> Self {
        Self { completer, options }
    }

    pub fn from_config(completer: Arc<dyn Completer>, config: &LlmConfig) -> Self {
        Self::new(
            completer,
            CompletionOptions {
                temperature: config.temperature,
                max_output_tokens: config.analysis_max_tokens,
            },
        )
    }

    pub async fn analyze(&self, contract_text: &str) -> Result<AnalysisResult, AnalysisError> {
        let prompt = build_analysis_prompt(contract_text);
        let raw = self.completer.complete(&prompt, &self.options).await?;
        Ok(interpret_response(&raw))
    }
}

/// Sanitize, repair, parse, and score a raw analysis completion.
pub fn interpret_response(raw: &str) -> AnalysisResult {
    let sanitized = strip_code_fences(raw);

    if sanitized.is_empty() {
        tracing::warn!("Model returned an empty analysis response");
        return AnalysisResult::degraded(EMPTY_RESPONSE_SUMMARY, EMPTY_RESPONSE_FLAG);
    }

    let truncated = !sanitized.ends_with('}');
    let candidate: Cow<'_, str> = if truncated {
        repair_logged(sanitized).map_or(Cow::Borrowed(sanitized), Cow::Owned)
    } else {
        Cow::Borrowed(sanitized)
    };

    let parsed = serde_json::from_str::<AnalysisResult>(&candidate).or_else(|e| {
        if truncated {
            return Err(e);
        }
        // A reply cut right after a clause still ends in '}'.
        match repair_logged(sanitized) {
            Some(repaired) => serde_json::from_str(&repaired).map_err(|_| e),
            None => Err(e),
        }
    });

    let mut result = match parsed {
        Ok(result) => result,
        Err(e) => {
            let preview: String = sanitized.chars().take(LOG_PREVIEW_CHARS).collect();
            tracing::warn!(error = %e, raw = %preview, "Could not parse analysis response");
            return AnalysisResult::degraded(PARSE_FAILURE_SUMMARY, PARSE_FAILURE_FLAG);
        }
    };

    result.overall_risk_score = weighted_risk_score(&result.clauses);
    result
}

fn repair_logged(text: &str) -> Option<String> {
    let repaired = repair_truncated(text)?;
    tracing::info!(
        original_len = text.len(),
        repaired_len = repaired.len(),
        "Repaired truncated analysis response"
    );
    Some(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedCompleter {
        reply: Result<String, u16>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedCompleter {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Completer for CannedCompleter {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn complete(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(CompletionError::Status {
                    status: *status,
                    body: "quota exceeded".to_string(),
                }),
            }
        }
    }

    fn pipeline(completer: Arc<CannedCompleter>) -> AnalysisPipeline {
        AnalysisPipeline::from_config(completer, &LlmConfig::default())
    }

    #[tokio::test]
    async fn test_empty_response() {
        let result = pipeline(CannedCompleter::replying("")).analyze("text").await.unwrap();
        assert_eq!(result.summary, EMPTY_RESPONSE_SUMMARY);
        assert!(result.clauses.is_empty());
        assert_eq!(result.flags.len(), 1);
        assert!(result.flags[0].contains("Empty response"));
        assert_eq!(result.overall_risk_score, None);
    }

    #[tokio::test]
    async fn test_whitespace_and_empty_fence_count_as_empty() {
        for raw in ["   \n", "```json\n```"] {
            let result = pipeline(CannedCompleter::replying(raw)).analyze("t").await.unwrap();
            assert_eq!(result.flags, vec![EMPTY_RESPONSE_FLAG.to_string()]);
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_reported_not_raised() {
        let result = pipeline(CannedCompleter::replying("not json at all"))
            .analyze("text")
            .await
            .unwrap();
        assert_eq!(result.summary, PARSE_FAILURE_SUMMARY);
        assert!(result.clauses.is_empty());
        assert_eq!(result.flags.len(), 1);
        assert!(result.flags[0].contains("JSON parse error"));
        assert_eq!(result.overall_risk_score, None);
    }

    #[tokio::test]
    async fn test_prompt_contains_contract() {
        let completer = CannedCompleter::replying("{}");
        let pipeline = pipeline(completer.clone());
        pipeline.analyze("Party A pays Party B.").await.unwrap();
        let prompts = completer.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Party A pays Party B."));
    }

    #[tokio::test]
    async fn test_completion_failure_propagates() {
        let err = pipeline(CannedCompleter::failing(429))
            .analyze("text")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Completion(CompletionError::Status { status: 429, .. })
        ));
    }

    #[test]
    fn test_fenced_response_scored() {
        let raw = "```json\n{\"summary\": \"Consulting MSA\", \"clauses\": [\
            {\"clause_name\": \"Liability Cap\", \"risk_score\": 8},\
            {\"clause_name\": \"Force Majeure\", \"risk_score\": 2}],\
            \"flags\": [\"Uncapped liability\"], \"overall_risk_score\": null}\n```";
        let result = interpret_response(raw);
        assert_eq!(result.summary, "Consulting MSA");
        assert_eq!(result.clauses.len(), 2);
        assert_eq!(result.flags, vec!["Uncapped liability".to_string()]);
        assert_eq!(result.overall_risk_score, Some(6.5));
    }

    #[test]
    fn test_model_score_is_overwritten() {
        let raw = r#"{"summary": "s", "clauses": [{"clause_name": "Confidentiality", "risk_score": 4}], "flags": [], "overall_risk_score": 9.9}"#;
        assert_eq!(interpret_response(raw).overall_risk_score, Some(4.0));

        let unscored = r#"{"summary": "s", "clauses": [], "flags": [], "overall_risk_score": 9.9}"#;
        assert_eq!(interpret_response(unscored).overall_risk_score, None);
    }

    #[test]
    fn test_truncated_response_recovered() {
        let raw = "```json\n{\n  \"summary\": \"Services agreement\",\n  \"clauses\": [\n    {\"clause_name\": \"Indemnity\", \"risk_score\": 9},\n    {\"clause_name\": \"Amendments\", \"risk_score\": 3},\n    {\"clause_name\": \"Termin";
        let result = interpret_response(raw);
        assert_eq!(result.summary, "Services agreement");
        assert_eq!(result.clauses.len(), 2);
        assert!(result.flags.is_empty());
        // (9*3 + 3*1) / 4 = 7.5
        assert_eq!(result.overall_risk_score, Some(7.5));
    }

    #[test]
    fn test_cut_after_clause_brace_recovered() {
        let raw = r#"{"summary": "s", "clauses": [{"clause_name": "Liability", "risk_score": 8}, {"clause_name": "Force Majeure", "risk_score": 2}"#;
        let result = interpret_response(raw);
        assert_eq!(result.clauses.len(), 2);
        assert!(result.flags.is_empty());
        assert_eq!(result.overall_risk_score, Some(6.5));
    }

    #[test]
    fn test_null_text_fields_keep_analysis() {
        let raw = r#"{"summary": "NDA", "clauses": [{"clause_name": "Liability", "clause_text": "capped", "risk_score": 8, "risk_explanation": "low cap", "is_ambiguous": false, "ambiguity_details": null}], "flags": null, "overall_risk_score": null}"#;
        let result = interpret_response(raw);
        assert_eq!(result.summary, "NDA");
        assert_eq!(result.clauses.len(), 1);
        assert_eq!(result.clauses[0].ambiguity_details, "");
        assert!(result.flags.is_empty());
        assert_eq!(result.overall_risk_score, Some(8.0));
    }

    #[test]
    fn test_unrepairable_truncation_is_parse_failure() {
        let result = interpret_response("{\"summary\": \"The agreement betw");
        assert_eq!(result.flags, vec![PARSE_FAILURE_FLAG.to_string()]);
    }

    #[test]
    fn test_non_object_json_is_parse_failure() {
        let result = interpret_response("[1, 2, 3]");
        assert_eq!(result.flags, vec![PARSE_FAILURE_FLAG.to_string()]);
    }
}
