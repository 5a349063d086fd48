//! Weighted overall risk score.
//!
//! Each scored clause is weighted by the first rule in [`CLAUSE_WEIGHTS`]
//! whose key is a case-insensitive substring of the clause name; clauses
//! matching no rule get [`DEFAULT_WEIGHT`]. The overall score is the
//! weighted mean of all clauses with `risk_score > 0`, rounded to one
//! decimal place.

use crate::models::Clause;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightRule {
    pub key: &'static str,
    pub weight: f64,
}

/// Ordered by priority: the first matching key wins.
pub const CLAUSE_WEIGHTS: &[WeightRule] = &[
    WeightRule { key: "liability", weight: 3.0 },
    WeightRule { key: "indemnity", weight: 3.0 },
    WeightRule { key: "intellectual property", weight: 3.0 },
    WeightRule { key: "termination", weight: 2.5 },
    WeightRule { key: "fees and payment terms", weight: 2.5 },
    WeightRule { key: "scope of services", weight: 2.0 },
    WeightRule { key: "confidentiality", weight: 1.5 },
    WeightRule { key: "amendments", weight: 1.0 },
    WeightRule { key: "force majeure", weight: 1.0 },
];

pub const DEFAULT_WEIGHT: f64 = 1.5;

pub fn clause_weight(clause_name: &str) -> f64 {
    let name = clause_name.to_lowercase();
    CLAUSE_WEIGHTS
        .iter()
        .find(|rule| name.contains(rule.key))
        .map(|rule| rule.weight)
        .unwrap_or(DEFAULT_WEIGHT)
}

/// `None` when no clause carries a positive score.
pub fn weighted_risk_score(clauses: &[Clause]) -> Option<f64> {
    let (numerator, denominator) = clauses
        .iter()
        .filter_map(|c| match c.risk_score {
            Some(score) if score > 0.0 => Some((score, clause_weight(&c.clause_name))),
            _ => None,
        })
        .fold((0.0, 0.0), |(num, den), (score, weight)| {
            (num + score * weight, den + weight)
        });

    if denominator > 0.0 {
        Some(round_one_decimal(numerator / denominator))
    } else {
        None
    }
}

/// Rounds the exact binary value: `6.45` (stored just above) becomes `6.5`,
/// while the exact tie `7.25` goes to even, `7.2`.
fn round_one_decimal(value: f64) -> f64 {
    format!("{:.1}", value).parse().unwrap_or(value)
}
