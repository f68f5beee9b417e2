//! Structured output extraction: finds the JSON object embedded in model prose.
//!
//! Strategies run in a fixed priority order and the first success wins:
//! 1. `tagged_fence`: interior of the first ```` ```json ```` fence.
//! 2. `any_fence`: every fenced block in order, language tag stripped.
//! 3. `brace_scan`: balanced-brace scan starting at a `{` in the raw text.
//!
//! Each failed strategy leaves a `StrategyFailure` behind for diagnostics. When
//! all three fail the payload is degraded (no JSON object, raw text kept); that
//! is a soft failure, not an error.
//!
//! Only JSON objects are accepted. A fence holding valid JSON of another shape
//! (array, number, string) counts as a failure for that candidate.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Upper bound on top-level `{` positions the brace scan will try.
const MAX_BRACE_CANDIDATES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    TaggedFence,
    AnyFence,
    BraceScan,
}

impl ExtractionMethod {
    pub const PRIORITY: [ExtractionMethod; 3] = [
        ExtractionMethod::TaggedFence,
        ExtractionMethod::AnyFence,
        ExtractionMethod::BraceScan,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionMethod::TaggedFence => "tagged_fence",
            ExtractionMethod::AnyFence => "any_fence",
            ExtractionMethod::BraceScan => "brace_scan",
        }
    }

    fn attempt(self, text: &str) -> Result<Value, String> {
        match self {
            ExtractionMethod::TaggedFence => tagged_fence(text),
            ExtractionMethod::AnyFence => any_fence(text),
            ExtractionMethod::BraceScan => brace_scan(text),
        }
    }
}

/// Why one strategy did not produce an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyFailure {
    pub method: ExtractionMethod,
    pub reason: String,
}

/// Result of extraction. `json_object` and `extraction_method` are both set on
/// success and both `None` on a soft failure; `raw_text` is always kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedPayload {
    pub json_object: Option<Value>,
    pub raw_text: String,
    pub extraction_method: Option<ExtractionMethod>,
    pub failures: Vec<StrategyFailure>,
}

impl ParsedPayload {
    pub fn is_degraded(&self) -> bool {
        self.json_object.is_none()
    }
}

/// Runs every strategy in priority order over `text`.
///
/// Deterministic: the same text always yields the same object and method.
pub fn extract_payload(text: &str) -> ParsedPayload {
    let mut failures = Vec::new();

    for method in ExtractionMethod::PRIORITY {
        match method.attempt(text) {
            Ok(json) => {
                info!(method = method.as_str(), "Extracted JSON object from model output");
                return ParsedPayload {
                    json_object: Some(json),
                    raw_text: text.to_string(),
                    extraction_method: Some(method),
                    failures,
                };
            }
            Err(reason) => {
                debug!(method = method.as_str(), %reason, "Extraction strategy failed");
                failures.push(StrategyFailure { method, reason });
            }
        }
    }

    warn!(
        text_len = text.len(),
        "No valid JSON object could be extracted, returning raw response"
    );
    ParsedPayload {
        json_object: None,
        raw_text: text.to_string(),
        extraction_method: None,
        failures,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Strategies
// ────────────────────────────────────────────────────────────────────────────

/// Interior of the first ```` ```json ```` fence, up to the next fence or the
/// end of the text when the fence was never closed.
fn tagged_fence(text: &str) -> Result<Value, String> {
    let start = text
        .find(JSON_FENCE)
        .ok_or_else(|| "no ```json fence".to_string())?;
    let rest = &text[start + JSON_FENCE.len()..];
    let body = match rest.find(FENCE) {
        Some(end) => &rest[..end],
        None => rest,
    };
    parse_object(body.trim())
}

/// Odd-numbered segments between fence markers, tried in order.
fn any_fence(text: &str) -> Result<Value, String> {
    let blocks: Vec<&str> = text.split(FENCE).skip(1).step_by(2).collect();
    if blocks.is_empty() {
        return Err("no fenced blocks".to_string());
    }

    let mut last_reason = String::new();
    for block in &blocks {
        match parse_object(strip_language_tag(block.trim())) {
            Ok(json) => return Ok(json),
            Err(reason) => last_reason = reason,
        }
    }
    Err(format!(
        "none of {} fenced block(s) parsed (last: {last_reason})",
        blocks.len()
    ))
}

/// Tries `{` positions in order as the start of a top-level object.
///
/// A `{` inside the span of an earlier candidate is never tried. A balanced
/// candidate that fails to parse moves the scan past its closing `}`. An
/// unbalanced one ends the scan, since every later `{` is nested inside it and
/// would only yield a fragment of a truncated object.
fn brace_scan(text: &str) -> Result<Value, String> {
    let mut first_reason: Option<String> = None;
    let mut resume_at = 0;
    let mut tried = 0;

    for (start, _) in text.match_indices('{') {
        if start < resume_at {
            continue;
        }
        if tried == MAX_BRACE_CANDIDATES {
            break;
        }
        tried += 1;

        let candidate = &text[start..];
        let Some(end) = matching_brace(candidate) else {
            let reason = format!("unbalanced braces from offset {start}");
            return Err(first_reason.unwrap_or(reason));
        };
        match parse_object(&candidate[..=end]) {
            Ok(json) => return Ok(json),
            Err(reason) => {
                first_reason.get_or_insert(reason);
                resume_at = start + end + 1;
            }
        }
    }

    Err(first_reason.unwrap_or_else(|| "no '{' in text".to_string()))
}

/// Byte index of the `}` that closes the `{` at index 0.
///
/// String-literal aware: braces inside `"..."` (with backslash escapes) do not
/// count toward the depth. A plain depth counter would be thrown off by a value
/// such as `"name": "nook {small}"`.
fn matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Drops a leading language tag line (`json`, `JSON`, `jsonc`, ...) from a
/// fenced block, or a bare `json` prefix on the same line as the content.
fn strip_language_tag(block: &str) -> &str {
    let (first_line, rest) = block.split_once('\n').unwrap_or((block, ""));
    let tag = first_line.trim();
    if !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '.'))
    {
        return rest.trim();
    }
    block.strip_prefix("json").map(str::trim).unwrap_or(block)
}

fn parse_object(candidate: &str) -> Result<Value, String> {
    if candidate.is_empty() {
        return Err("empty candidate".to_string());
    }
    match serde_json::from_str::<Value>(candidate) {
        Ok(json @ Value::Object(_)) => Ok(json),
        Ok(_) => Err("parsed JSON is not an object".to_string()),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::accumulator::StreamAccumulator;
    use serde_json::json;

    // ── tagged fence ────────────────────────────────────────────────────────

    #[test]
    fn test_streamed_fragments_extract_via_tagged_fence() {
        let mut acc = StreamAccumulator::start();
        acc.feed("Here:\n```json\n{\"a\":1");
        acc.feed("}\n```\nDone.");

        let payload = extract_payload(&acc.finish());
        assert_eq!(payload.json_object, Some(json!({"a": 1})));
        assert_eq!(payload.extraction_method, Some(ExtractionMethod::TaggedFence));
        assert!(!payload.is_degraded());
        assert!(payload.failures.is_empty());
    }

    #[test]
    fn test_tagged_fence_wins_over_raw_braces() {
        let text = "Notes {not json} and {\"decoy\": true}\n```json\n{\"chosen\": 1}\n```";
        let payload = extract_payload(text);
        assert_eq!(payload.json_object, Some(json!({"chosen": 1})));
        assert_eq!(payload.extraction_method, Some(ExtractionMethod::TaggedFence));
    }

    #[test]
    fn test_unclosed_tagged_fence_reads_to_end() {
        let payload = extract_payload("```json\n{\"a\": [1, 2]}\n");
        assert_eq!(payload.json_object, Some(json!({"a": [1, 2]})));
        assert_eq!(payload.extraction_method, Some(ExtractionMethod::TaggedFence));
    }

    // ── fallbacks ───────────────────────────────────────────────────────────

    #[test]
    fn test_malformed_tagged_fence_falls_back_to_later_fence() {
        let text = "```json\n{\"a\": \n```\nretry:\n```\n{\"a\": 2}\n```";
        let payload = extract_payload(text);
        assert_eq!(payload.json_object, Some(json!({"a": 2})));
        assert_eq!(payload.extraction_method, Some(ExtractionMethod::AnyFence));
        assert_eq!(payload.failures.len(), 1);
        assert_eq!(payload.failures[0].method, ExtractionMethod::TaggedFence);
    }

    #[test]
    fn test_malformed_fence_falls_back_to_raw_object() {
        let text = "```json\n{broken}\n```\nFinal answer: {\"split\": {\"name\": \"root\"}}";
        let payload = extract_payload(text);
        assert_eq!(payload.json_object, Some(json!({"split": {"name": "root"}})));
        assert_eq!(payload.extraction_method, Some(ExtractionMethod::BraceScan));
        assert_eq!(payload.failures.len(), 2);
    }

    #[test]
    fn test_any_fence_strips_language_tags() {
        let payload = extract_payload("```JSON\n{\"k\": \"v\"}\n```");
        assert_eq!(payload.json_object, Some(json!({"k": "v"})));
        assert_eq!(payload.extraction_method, Some(ExtractionMethod::AnyFence));

        let payload = extract_payload("```javascript\n{\"k\": 2}\n```");
        assert_eq!(payload.json_object, Some(json!({"k": 2})));
    }

    #[test]
    fn test_any_fence_skips_non_object_blocks() {
        let text = "```\n[1, 2, 3]\n```\nthen\n```\n{\"ok\": true}\n```";
        let payload = extract_payload(text);
        assert_eq!(payload.json_object, Some(json!({"ok": true})));
        assert_eq!(payload.extraction_method, Some(ExtractionMethod::AnyFence));
    }

    // ── brace scan ──────────────────────────────────────────────────────────

    #[test]
    fn test_brace_scan_extracts_top_level_object() {
        let text = r#"It is {"split":{"name":"root","area":1,"angle":0,"final":true,"children":[]}} done"#;
        let payload = extract_payload(text);
        assert_eq!(
            payload.json_object,
            Some(json!({"split": {"name": "root", "area": 1, "angle": 0, "final": true, "children": []}}))
        );
        assert_eq!(payload.extraction_method, Some(ExtractionMethod::BraceScan));
    }

    #[test]
    fn test_brace_scan_ignores_braces_inside_strings() {
        let text = r#"Plan: {"name": "nook {small", "note": "say \"}\" twice"} trailing }"#;
        let payload = extract_payload(text);
        assert_eq!(
            payload.json_object,
            Some(json!({"name": "nook {small", "note": "say \"}\" twice"}))
        );
    }

    #[test]
    fn test_matching_brace_handles_nesting() {
        assert_eq!(matching_brace("{a{b}c}xyz"), Some(6));
        assert_eq!(matching_brace("{\"}\"}"), Some(4));
        assert_eq!(matching_brace("{{}"), None);
    }

    #[test]
    fn test_truncated_text_degrades() {
        let payload = extract_payload("Thinking... {\"split\": {\"name\": \"root\", ");
        assert!(payload.is_degraded());
        assert_eq!(payload.extraction_method, None);
        assert_eq!(payload.failures.len(), 3);
    }

    #[test]
    fn test_truncated_tree_does_not_yield_inner_child() {
        let text = "Thinking...\n{\"split\": {\"name\": \"root\", \"angle\": 0, \"children\": [\
            {\"name\": \"kitchen\", \"area\": 30, \"final\": true}, \
            {\"name\": \"dining\", \"area\": 70, \"fin";
        let payload = extract_payload(text);
        assert!(payload.is_degraded());
        assert_eq!(payload.json_object, None);
        assert!(payload.failures[2].reason.starts_with("unbalanced braces"));
    }

    #[test]
    fn test_brace_scan_skips_objects_nested_in_invalid_candidate() {
        let text = r#"Draft {sketch: {"a": 1}} final {"b": 2}"#;
        let payload = extract_payload(text);
        assert_eq!(payload.json_object, Some(json!({"b": 2})));
        assert_eq!(payload.extraction_method, Some(ExtractionMethod::BraceScan));
    }

    #[test]
    fn test_streamed_text_cut_after_first_child_degrades() {
        let mut acc = StreamAccumulator::start();
        acc.feed("{\"split\": {\"name\": \"root\", \"children\": [");
        acc.feed("{\"name\": \"bath\", \"area\": 5, \"final\": true}, ");
        acc.feed("{\"name\": \"bed");

        let payload = extract_payload(&acc.finish());
        assert!(payload.is_degraded());
    }

    // ── soft failure & determinism ──────────────────────────────────────────

    #[test]
    fn test_empty_text_is_soft_failure() {
        let payload = extract_payload("");
        assert!(payload.is_degraded());
        assert_eq!(payload.raw_text, "");
        assert_eq!(payload.extraction_method, None);
    }

    #[test]
    fn test_prose_only_keeps_raw_text_and_reasons() {
        let payload = extract_payload("I could not produce a plan.");
        assert!(payload.is_degraded());
        assert_eq!(payload.raw_text, "I could not produce a plan.");
        let methods: Vec<_> = payload.failures.iter().map(|f| f.method).collect();
        assert_eq!(methods, ExtractionMethod::PRIORITY);
        assert_eq!(payload.failures[2].reason, "no '{' in text");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let text = "prefix\n```\njson\n{\"b\": [1, {\"c\": null}]}\n```\n";
        let first = extract_payload(text);
        let second = extract_payload(text);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.json_object).unwrap(),
            serde_json::to_string(&second.json_object).unwrap()
        );
    }

    #[test]
    fn test_method_serializes_snake_case() {
        let json = serde_json::to_value(ExtractionMethod::TaggedFence).unwrap();
        assert_eq!(json, "tagged_fence");
    }
}
