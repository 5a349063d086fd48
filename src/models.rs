//! Core data models used throughout Contract Review.
//!
//! These types represent the documents, chunks, analysis records, and chat
//! messages that flow through the ingestion, analysis, and Q&A pipelines.

use serde::{Deserialize, Deserializer, Serialize};

/// Extracted contract text plus the name it was uploaded under.
///
/// Immutable once built; the chunker and analysis pipeline only borrow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// A contiguous slice of a [`Document`]'s text.
///
/// `start` and `end` are byte offsets into the parent text, so consecutive
/// chunks can be checked for overlap and coverage. `length` is in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub source: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub length: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// A single contract clause as scored by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    #[serde(default, deserialize_with = "null_as_default")]
    pub clause_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clause_text: String,
    /// 1–10 when scored. Non-numeric model output is read as unscored.
    #[serde(default, deserialize_with = "lenient_score")]
    pub risk_score: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub risk_explanation: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_ambiguous: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ambiguity_details: String,
}

/// Structured analysis of one contract.
///
/// `overall_risk_score` is always recomputed from the clauses after parsing;
/// whatever the model wrote there is discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clauses: Vec<Clause>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub overall_risk_score: Option<f64>,
}

impl AnalysisResult {
    /// A degraded result carrying a single diagnostic flag.
    pub fn degraded(summary: &str, flag: &str) -> Self {
        Self {
            summary: summary.to_string(),
            clauses: Vec::new(),
            flags: vec![flag.to_string()],
            overall_risk_score: None,
        }
    }
}

/// Traffic-light band for an overall risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 7.0 {
            RiskLevel::High
        } else if score >= 4.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of the Q&A chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_defaults_when_fields_missing() {
        let clause: Clause = serde_json::from_str(r#"{"clause_name": "Payment Terms"}"#).unwrap();
        assert_eq!(clause.clause_name, "Payment Terms");
        assert_eq!(clause.risk_score, None);
        assert!(!clause.is_ambiguous);
    }

    #[test]
    fn test_non_numeric_score_is_unscored() {
        let clause: Clause =
            serde_json::from_str(r#"{"clause_name": "X", "risk_score": "high"}"#).unwrap();
        assert_eq!(clause.risk_score, None);
    }

    #[test]
    fn test_string_ambiguity_flag() {
        let clause: Clause =
            serde_json::from_str(r#"{"clause_name": "X", "is_ambiguous": "True"}"#).unwrap();
        assert!(clause.is_ambiguous);
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        let clause: Clause = serde_json::from_str(
            r#"{"clause_name": "Indemnity", "clause_text": null, "risk_score": 7,
                "risk_explanation": null, "is_ambiguous": null, "ambiguity_details": null}"#,
        )
        .unwrap();
        assert_eq!(clause.clause_name, "Indemnity");
        assert_eq!(clause.clause_text, "");
        assert_eq!(clause.ambiguity_details, "");
        assert_eq!(clause.risk_score, Some(7.0));

        let result: AnalysisResult =
            serde_json::from_str(r#"{"summary": null, "clauses": null, "flags": null}"#).unwrap();
        assert_eq!(result.summary, "");
        assert!(result.clauses.is_empty());
        assert!(result.flags.is_empty());
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_score(7.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(6.9), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(4.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(3.9), RiskLevel::Low);
    }
}
