// ABOUTME: ((VAR)) token resolution against ordered variable documents.
// ABOUTME: Later documents win; blank values are skipped.

use regex::Regex;
use serde_yaml::Value;
use std::sync::OnceLock;

use crate::error::{ConfigError, Result};

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(\(([^)]+)\)\)").expect("valid token pattern"))
}

/// Whether the text contains at least one `((VAR))` token.
pub fn has_tokens(text: &str) -> bool {
    text.contains("((") && text.contains("))")
}

/// Look up `key` at the top level of one variable document.
pub fn variable_value(content: &str, key: &str) -> Result<Option<Value>> {
    let doc: Value = serde_yaml::from_str(content)?;
    match doc {
        Value::Mapping(map) => Ok(map.get(Value::String(key.to_string())).cloned()),
        _ => Ok(None),
    }
}

/// Replace every `((VAR))` token in `text` with its value from the variable
/// documents. Documents are searched from last to first so the most specific
/// document wins; blank values do not count as a resolution. Tokens no
/// document can resolve are left in place for the caller to judge.
pub fn substitute(text: &str, variable_ymls: &[String]) -> Result<String> {
    if !has_tokens(text) || variable_ymls.is_empty() {
        return Ok(text.to_string());
    }

    let mut out = text.to_string();
    for capture in token_pattern().captures_iter(text) {
        let token = &capture[1];
        for doc in variable_ymls.iter().rev() {
            if let Some(value) = variable_value(doc, token)? {
                let rendered = render_scalar(&value);
                if !rendered.is_empty() {
                    out = out.replace(&format!("(({token}))"), &rendered);
                    break;
                }
            }
        }
    }
    Ok(out)
}

/// Render a scalar YAML value the way it was written.
fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Resolve a value that must be fully resolvable, failing when no variable
/// document is present to consult.
pub fn substitute_required(text: &str, variable_ymls: &[String]) -> Result<String> {
    if has_tokens(text) && variable_ymls.is_empty() {
        let token = token_pattern()
            .captures(text)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| text.to_string());
        return Err(ConfigError::UnresolvedVariable { token });
    }
    substitute(text, variable_ymls)
}
