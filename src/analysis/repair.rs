//! Recovery of analysis JSON cut off by the model's output limit.
//!
//! Rather than searching for brace patterns, [`repair_truncated`] scans the
//! text once as JSON, tracking string/escape state and nesting depth. It
//! remembers where the last complete top-level member ended and, inside the
//! `clauses` array, where the last complete clause object ended. The text is
//! cut at the furthest safe point, the clauses array is closed if it was
//! still open, and any of `flags` / `overall_risk_score` that never arrived
//! are appended with empty values.
//!
//! ```text
//! {"summary":"…","clauses":[{…},{…},{"clause_na        ← truncated
//! {"summary":"…","clauses":[{…},{…}],"flags":[],"overall_risk_score":null}
//! ```

/// Keys filled in when the model stopped before writing them.
const TRAILING_DEFAULTS: &[(&str, &str)] = &[("flags", "[]"), ("overall_risk_score", "null")];

const CLAUSES_KEY: &str = "clauses";

/// Rebuild a parseable analysis object from a truncated reply.
///
/// Returns `None` when nothing complete can be salvaged (no opening brace,
/// or the cut-off happened before the first member finished). Trailing text
/// after a complete object is dropped.
pub fn repair_truncated(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut string_start = 0usize;
    let mut expect_key = false;
    let mut current_key: Option<&str> = None;
    let mut completed: Vec<&str> = Vec::new();
    let mut last_member_end: Option<usize> = None;
    let mut clauses_open: Option<usize> = None;
    let mut last_clause_end: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
                if depth == 1 && expect_key {
                    current_key = Some(&text[string_start + 1..i]);
                    expect_key = false;
                }
            }
            continue;
        }

        match b {
            b'"' => {
                in_string = true;
                string_start = i;
            }
            b'{' | b'[' => {
                depth += 1;
                if depth == 1 {
                    expect_key = true;
                } else if depth == 2 && b == b'[' && current_key == Some(CLAUSES_KEY) {
                    clauses_open = Some(i);
                    last_clause_end = None;
                }
            }
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                match depth {
                    0 => return Some(text[start..=i].to_string()),
                    1 => {
                        if let Some(key) = current_key.take() {
                            completed.push(key);
                        }
                        clauses_open = None;
                        last_member_end = Some(i + 1);
                    }
                    2 if clauses_open.is_some() => last_clause_end = Some(i + 1),
                    _ => {}
                }
            }
            b',' if depth == 1 => {
                if let Some(key) = current_key.take() {
                    completed.push(key);
                }
                last_member_end = Some(i);
                expect_key = true;
            }
            _ => {}
        }
    }

    let mut repaired = match (clauses_open, last_clause_end) {
        (Some(_), Some(end)) => {
            completed.push(CLAUSES_KEY);
            format!("{}]", &text[start..end])
        }
        (Some(open), None) => {
            completed.push(CLAUSES_KEY);
            format!("{}]", &text[start..=open])
        }
        (None, _) => text[start..last_member_end?].to_string(),
    };

    for (key, value) in TRAILING_DEFAULTS {
        if !completed.contains(key) {
            repaired.push_str(&format!(",\"{}\":{}", key, value));
        }
    }
    repaired.push('}');
    Some(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap_or_else(|e| panic!("invalid JSON {:?}: {}", s, e))
    }

    #[test]
    fn test_cut_inside_third_clause_keeps_two() {
        let text = r#"{"summary": "MSA", "clauses": [{"clause_name": "Liability", "risk_score": 8}, {"clause_name": "Term", "risk_score": 3}, {"clause_name": "Indem"#;
        let repaired = repair_truncated(text).unwrap();
        let v = parse(&repaired);
        assert_eq!(v["summary"], "MSA");
        assert_eq!(v["clauses"].as_array().unwrap().len(), 2);
        assert_eq!(v["flags"], serde_json::json!([]));
        assert!(v["overall_risk_score"].is_null());
    }

    #[test]
    fn test_cut_inside_flags_appends_exact_fragment() {
        let text = r#"{"summary":"s","clauses":[{"clause_name":"A"}],"flags":["High risk in"#;
        assert_eq!(
            repair_truncated(text).unwrap(),
            r#"{"summary":"s","clauses":[{"clause_name":"A"}],"flags":[],"overall_risk_score":null}"#
        );
    }

    #[test]
    fn test_complete_flags_not_duplicated() {
        let text = r#"{"summary":"s","clauses":[],"flags":["x"],"overall_risk_score": nu"#;
        let v = parse(&repair_truncated(text).unwrap());
        assert_eq!(v["flags"], serde_json::json!(["x"]));
        assert!(v["overall_risk_score"].is_null());
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let text = r#"{"summary":"uses {curly} and [square] \"quoted\"","clauses":[{"clause_name":"}]","risk_score":2},{"clause_text":"ab"#;
        let v = parse(&repair_truncated(text).unwrap());
        assert_eq!(v["summary"], "uses {curly} and [square] \"quoted\"");
        assert_eq!(v["clauses"][0]["clause_name"], "}]");
        assert_eq!(v["clauses"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_nested_values_inside_clause() {
        let text = "{\n  \"summary\": \"s\",\n  \"clauses\": [\n    {\"clause_name\": \"A\", \"tags\": [\"x\", {\"y\": 1}]},\n    {\"clause_name\": \"B\", \"tags\": [";
        let v = parse(&repair_truncated(text).unwrap());
        assert_eq!(v["clauses"].as_array().unwrap().len(), 1);
        assert_eq!(v["clauses"][0]["clause_name"], "A");
    }

    #[test]
    fn test_cut_before_first_clause_gives_empty_clauses() {
        let text = r#"{"summary":"s","clauses":[{"clause_"#;
        let v = parse(&repair_truncated(text).unwrap());
        assert_eq!(v["summary"], "s");
        assert_eq!(v["clauses"], serde_json::json!([]));
    }

    #[test]
    fn test_trailing_prose_after_object() {
        let text = "{\"summary\":\"s\",\"clauses\":[]}\nHope this helps!";
        assert_eq!(
            repair_truncated(text).unwrap(),
            "{\"summary\":\"s\",\"clauses\":[]}"
        );
    }

    #[test]
    fn test_nothing_salvageable() {
        assert_eq!(repair_truncated("not json at all"), None);
        assert_eq!(repair_truncated(r#"{"summary": "the contract sta"#), None);
    }
}
