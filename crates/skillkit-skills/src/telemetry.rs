//! Telemetry log filtering.
//!
//! The assistant's telemetry collector writes a mix of formats to its
//! outfile: a single JSON array, JSONL, or concatenated pretty-printed
//! objects. This module parses all three, keeps only the interesting
//! events, strips timing noise, and re-parses JSON values that were
//! stringified on the way in.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::config;
use crate::error::{Result, SkillError};

/// Event keys worth keeping in a filtered log.
const INTERESTING_KEYS: &[&str] = &[
    "gemini_cli.user_prompt",
    "gemini_cli.api_response",
    "gen_ai.client.inference.operation.details",
    "gemini_cli.tool_call",
    "gemini_cli.config",
    "gemini_cli.model_routing",
];

/// Per-item attributes that carry no signal for a human reader.
const NOISE_KEYS: &[&str] = &["hrTime", "hrTimeObserved", "resource"];

/// Counts reported after a filter run.
#[derive(Debug, Clone, Copy)]
pub struct FilterReport {
    pub total: usize,
    pub kept: usize,
    pub output: bool,
}

/// Filter the configured telemetry outfile into `output` (or `out.log`
/// next to the telemetry file when `output` is `None`).
pub fn filter_log(output: Option<&Path>) -> Result<(PathBuf, FilterReport)> {
    let root = config::project_root();
    let settings = config::load_settings(&root)?.ok_or_else(|| {
        SkillError::Config("telemetry outfile not configured in settings.json".into())
    })?;
    let telemetry_file = config::telemetry_outfile(&root, &settings)?;

    if !telemetry_file.exists() {
        return Err(SkillError::Config(format!(
            "telemetry file not found at {}",
            telemetry_file.display()
        )));
    }

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => telemetry_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("out.log"),
    };

    info!(
        input = %telemetry_file.display(),
        output = %output_path.display(),
        "filtering telemetry log"
    );

    let content = std::fs::read_to_string(&telemetry_file)?;
    let items = parse_log_content(&content);
    let total = items.len();

    let kept: Vec<Value> = items
        .into_iter()
        .filter(is_interesting)
        .map(|mut item| {
            if let Value::Object(map) = &mut item {
                for key in NOISE_KEYS {
                    map.remove(*key);
                }
            }
            unstringify(item)
        })
        .collect();

    let rendered = kept
        .iter()
        .map(|item| serde_json::to_string_pretty(item))
        .collect::<std::result::Result<Vec<_>, _>>()?
        .join("\n");
    std::fs::write(&output_path, rendered)?;

    let report = FilterReport {
        total,
        kept: kept.len(),
        output: true,
    };
    debug!(total = report.total, kept = report.kept, "telemetry filtered");
    Ok((output_path, report))
}

/// Parse telemetry content in any of the three observed formats.
pub fn parse_log_content(content: &str) -> Vec<Value> {
    let content = content.trim();
    if content.is_empty() {
        return Vec::new();
    }

    // A single JSON array.
    if content.starts_with('[') && content.ends_with(']') {
        if let Ok(Value::Array(items)) = serde_json::from_str(content) {
            return items;
        }
    }

    // JSONL, one object per line. All lines must parse.
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let jsonl: Vec<Value> = lines
        .iter()
        .map_while(|line| serde_json::from_str(line).ok())
        .collect();
    if jsonl.len() == lines.len() {
        return jsonl;
    }

    // Concatenated objects, possibly pretty-printed. Brace matching has to
    // ignore braces inside string literals.
    scan_concatenated_objects(content)
}

fn scan_concatenated_objects(content: &str) -> Vec<Value> {
    let bytes = content.as_bytes();
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Ok(value) = serde_json::from_str(&content[start..=i]) {
                            items.push(value);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    items
}

/// True when the item mentions any of the curated event keys, at any depth.
pub fn is_interesting(item: &Value) -> bool {
    match item {
        Value::Array(items) => items.iter().any(is_interesting),
        Value::Object(map) => {
            if let Some(Value::String(key)) = map.get("key") {
                if INTERESTING_KEYS.contains(&key.as_str()) {
                    return true;
                }
            }
            if INTERESTING_KEYS.iter().any(|k| map.contains_key(*k)) {
                return true;
            }
            map.values().any(|v| match v {
                Value::String(s) => INTERESTING_KEYS.contains(&s.as_str()),
                Value::Object(_) | Value::Array(_) => is_interesting(v),
                _ => false,
            })
        }
        _ => false,
    }
}

/// Recursively re-parse string values that contain embedded JSON.
pub fn unstringify(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
                || (trimmed.starts_with('[') && trimmed.ends_with(']'));
            if looks_like_json {
                match serde_json::from_str::<Value>(&s) {
                    Ok(parsed) => unstringify(parsed),
                    Err(_) => Value::String(s),
                }
            } else {
                Value::String(s)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(unstringify).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter().map(|(k, v)| (k, unstringify(v))).collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_json_array() {
        let items = parse_log_content(r#"[{"a": 1}, {"b": 2}]"#);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn parses_jsonl() {
        let items = parse_log_content("{\"a\": 1}\n{\"b\": 2}\n{\"c\": 3}");
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn parses_concatenated_pretty_objects() {
        let content = "{\n  \"a\": 1\n}\n{\n  \"b\": \"has } brace\"\n}";
        let items = parse_log_content(content);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["b"], "has } brace");
    }

    #[test]
    fn empty_content_yields_nothing() {
        assert!(parse_log_content("").is_empty());
        assert!(parse_log_content("   \n  ").is_empty());
    }

    #[test]
    fn interesting_detects_key_attribute() {
        let item = json!({
            "attributes": [{ "key": "gemini_cli.tool_call", "value": "ls" }]
        });
        assert!(is_interesting(&item));
    }

    #[test]
    fn interesting_detects_direct_and_string_values() {
        assert!(is_interesting(&json!({ "gemini_cli.user_prompt": "hi" })));
        assert!(is_interesting(&json!({ "name": "gemini_cli.config" })));
        assert!(!is_interesting(&json!({ "name": "heartbeat", "n": 1 })));
    }

    #[test]
    fn unstringify_parses_nested_json_strings() {
        let value = json!({
            "payload": "{\"inner\": \"[1, 2, 3]\"}",
            "plain": "not json",
        });
        let result = unstringify(value);
        assert_eq!(result["payload"]["inner"], json!([1, 2, 3]));
        assert_eq!(result["plain"], "not json");
    }

    #[test]
    fn unstringify_keeps_invalid_json_strings() {
        let value = json!("{not valid json}");
        assert_eq!(unstringify(value), json!("{not valid json}"));
    }
}
