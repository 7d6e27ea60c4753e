//! Structured-output repair pipeline.
//!
//! # Responsibilities
//! - Recover a parseable JSON value from near-valid text produced by
//!   small/local models (truncation, stray characters, missing commas,
//!   unescaped quotes, HTML entities, markdown fencing)
//! - Surface enough diagnostics on failure to debug offline, without
//!   re-calling the backend
//!
//! # Data Flow
//! ```text
//! raw text
//!     → tier 1: extraction + light sanitization → parse? return
//!     → tier 2: aggressive repair               → parse? return
//!     → GenError::ParseFailure (both parser errors attached)
//! ```
//!
//! # Design Decisions
//! - Escalating tiers, first successful parse wins; tier 2 is lossier
//!   than tier 1 and only runs when tier 1 could not produce valid JSON
//! - Best-effort recovery, not a grammar-aware repairer
//! - Tier 2 drops empty-string and null fields outright; this is
//!   intentional lossy behavior inherited from the pipeline's origin —
//!   consumers expecting present-but-empty fields must not rely on tier 2

pub mod passes;

use crate::error::GenError;
use serde_json::Value;
use tracing::debug;

/// String values longer than this are truncated by the aggressive tier.
const MAX_STRING_VALUE_LEN: usize = 2000;

/// Length of the raw-text prefix carried in parse-failure diagnostics.
const DIAGNOSTIC_PREFIX_LEN: usize = 200;

/// Parse `raw` as JSON, repairing it if needed.
///
/// Already-valid JSON passes through tier 1 unchanged, with one
/// exception: literal HTML entities inside string values (`&amp;`,
/// `&quot;`, ...) are decoded even when the input would have parsed
/// as-is. Models that HTML-escape their output are common enough that
/// the decode runs unconditionally.
pub fn parse_with_repair(raw: &str) -> Result<Value, GenError> {
    let light = light_repair(raw);
    let light_err = match serde_json::from_str(&light) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    debug!(error = %light_err, "light repair tier failed to parse, escalating");

    let aggressive = aggressive_repair(raw);
    match serde_json::from_str::<Value>(&aggressive) {
        Ok(value) => Ok(prune_empty_fields(value)),
        Err(aggressive_err) => Err(GenError::ParseFailure {
            response_len: raw.len(),
            raw_prefix: raw.chars().take(DIAGNOSTIC_PREFIX_LEN).collect(),
            light_error: light_err.to_string(),
            aggressive_error: aggressive_err.to_string(),
        }),
    }
}

/// Strict parse with only a code-fence strip; the default path for
/// backends that reliably emit valid JSON.
pub fn parse_fenced(raw: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(passes::strip_code_fence(raw))
}

/// Tier 1: extraction plus light, non-destructive sanitization.
///
/// Entity decoding rewrites literal `&...;` sequences even in input
/// that already parses, so tier 1 is not strictly the identity on
/// valid JSON containing them.
pub fn light_repair(raw: &str) -> String {
    let text = passes::strip_code_fence(raw);
    let text = passes::slice_to_braces(text);
    let text = passes::decode_html_entities(text);
    let text = passes::fix_string_interiors(&text);
    let text = passes::sanitize_control_chars(&text);
    passes::insert_missing_commas(&text)
}

/// Tier 2: everything tier 1 does, then lossy structural repair.
pub fn aggressive_repair(raw: &str) -> String {
    let text = light_repair(raw);
    let text = passes::close_unterminated_string(&text);
    let text = passes::truncate_long_strings(&text, MAX_STRING_VALUE_LEN);
    let text = passes::collapse_repeated_commas(&text);
    let text = passes::strip_trailing_commas(&text);
    passes::enforce_object_envelope(&text)
}

/// Drop object members whose value is `null` or an empty string,
/// recursively. Applied only to tier-2 output.
fn prune_empty_fields(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !matches!(v, Value::Null) && v.as_str() != Some(""))
                .map(|(k, v)| (k, prune_empty_fields(v)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(prune_empty_fields).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_json_passes_through_unchanged() {
        let raw = r#"{"title": "São Tomé", "tags": ["a", "b"], "n": 3}"#;
        let direct: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(parse_with_repair(raw).unwrap(), direct);
    }

    #[test]
    fn test_fenced_json_recovered() {
        let raw = "```json\n{\"translation\": \"Olá\"}\n```";
        assert_eq!(
            parse_with_repair(raw).unwrap(),
            json!({"translation": "Olá"})
        );
    }

    #[test]
    fn test_unterminated_string_with_accents() {
        let raw = r#"{ "bio": "Olá mundo"#;
        let value = parse_with_repair(raw).unwrap();
        let bio = value["bio"].as_str().unwrap();
        assert!(!bio.is_empty());
        assert!(bio.contains("Olá"), "accents must survive repair: {bio}");
    }

    #[test]
    fn test_chatter_around_object_is_sliced_off() {
        let raw = "Here is the JSON you asked for:\n{\"a\": 1}\nLet me know!";
        assert_eq!(parse_with_repair(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_missing_comma_and_trailing_comma() {
        let raw = r#"{"a": "1""b": "2",}"#;
        assert_eq!(parse_with_repair(raw).unwrap(), json!({"a": "1", "b": "2"}));
    }

    #[test]
    fn test_html_entities_decoded() {
        // Valid JSON as-is; the decode still rewrites the entities.
        let raw = r#"{"title": "Tom &amp; Jerry &#39;22"}"#;
        assert_eq!(
            parse_with_repair(raw).unwrap(),
            json!({"title": "Tom & Jerry '22"})
        );
    }

    #[test]
    fn test_aggressive_tier_drops_null_and_empty_fields() {
        // Broken enough that tier 1 fails and tier 2 runs.
        let raw = r#"{"keep": "x", "empty": "", "gone": null, "tail": "y"#;
        let value = parse_with_repair(raw).unwrap();
        assert_eq!(value["keep"], "x");
        assert!(value.get("empty").is_none());
        assert!(value.get("gone").is_none());
    }

    #[test]
    fn test_both_tiers_failing_reports_diagnostics() {
        let raw = "no braces at all, not even close";
        let err = parse_with_repair(raw).unwrap_err();
        match err {
            GenError::ParseFailure {
                response_len,
                raw_prefix,
                light_error,
                aggressive_error,
            } => {
                assert_eq!(response_len, raw.len());
                assert!(raw_prefix.starts_with("no braces"));
                assert!(!light_error.is_empty());
                assert!(!aggressive_error.is_empty());
            }
            other => panic!("expected ParseFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_control_characters_replaced_not_stripped() {
        let raw = "{\"a\": \"b\u{02}c\"}";
        assert_eq!(parse_with_repair(raw).unwrap(), json!({"a": "b c"}));
    }
}
