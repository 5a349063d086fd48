//! Markdown fence stripping for model output.

const FENCE: &str = "```";

/// Remove a surrounding Markdown code fence, with or without a language tag.
///
/// Text before the opening fence and after the closing fence is dropped.
/// An opening fence with no closing fence (a truncated reply) keeps
/// everything after the tag. Unfenced input is only trimmed, so applying
/// this twice gives the same result as applying it once.
pub fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some(open) = text.find(FENCE) else {
        return text;
    };

    let after = &text[open + FENCE.len()..];
    let tag_len = after
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(after.len());
    let body = &after[tag_len..];

    let body = match body.rfind(FENCE) {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_tagged_fence() {
        let raw = "```json\n{\"summary\": \"x\"}\n```";
        assert_eq!(strip_code_fences(raw), "{\"summary\": \"x\"}");
    }

    #[test]
    fn test_untagged_fence() {
        let raw = "```\n{\"summary\": \"x\"}\n```\n";
        assert_eq!(strip_code_fences(raw), "{\"summary\": \"x\"}");
    }

    #[test]
    fn test_prose_around_fence() {
        let raw = "Here is the analysis:\n```json\n{\"a\": 1}\n```\nLet me know!";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_tag_glued_to_body() {
        assert_eq!(strip_code_fences("```json{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn test_unclosed_fence_keeps_body() {
        let raw = "```json\n{\"summary\": \"x\", \"clauses\": [";
        assert_eq!(strip_code_fences(raw), "{\"summary\": \"x\", \"clauses\": [");
    }

    #[test]
    fn test_unfenced_is_noop() {
        let json = "{\"summary\": \"x\", \"clauses\": []}";
        assert_eq!(strip_code_fences(json), json);
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "```json\n{\"a\": 1}\n```",
            "{\"a\": 1}",
            "  {\"a\": 1}\n",
            "```\n```",
            "",
        ] {
            let once = strip_code_fences(raw);
            assert_eq!(strip_code_fences(once), once, "input: {:?}", raw);
        }
    }

    #[test]
    fn test_empty_fence_is_empty() {
        assert_eq!(strip_code_fences("```json\n```"), "");
    }
}
