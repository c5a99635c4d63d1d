use crate::error::ConfigError;
use serde_json::Value;
use std::collections::HashMap;

/// Replaces `${NAME}` placeholders in every string of a JSON tree.
///
/// Substitution happens after parsing, so values never need JSON escaping.
pub fn substitute_tree(
    value: &mut Value,
    vars: &HashMap<String, String>,
) -> Result<(), ConfigError> {
    match value {
        Value::String(text) => {
            if text.contains("${") {
                *text = substitute(text, vars)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_tree(item, vars)?;
            }
        }
        Value::Object(fields) => {
            for field in fields.values_mut() {
                substitute_tree(field, vars)?;
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn substitute(text: &str, vars: &HashMap<String, String>) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| ConfigError::UnterminatedPlaceholder(text.to_string()))?;

        let name = after[..end].trim();
        let value = vars
            .get(name)
            .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
