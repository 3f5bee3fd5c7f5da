// crates/hopchain-core/src/redact.rs
//
// Masking of credential-like fields in model responses before they are
// written into a hop. A key is sensitive when its lowercased name contains
// one of SENSITIVE_KEY_FRAGMENTS; its value is replaced wholesale.

use serde_json::Value;

/// Replacement written over sensitive values.
pub const REDACTED: &str = "[REDACTED]";

/// Substrings that mark an object key as sensitive (matched lowercased).
pub const SENSITIVE_KEY_FRAGMENTS: [&str; 5] = ["api_key", "apikey", "token", "secret", "password"];

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEY_FRAGMENTS.iter().any(|fragment| key.contains(fragment))
}

/// Redact sensitive keys at every depth. Returns how many values were replaced.
pub fn redact_value(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let mut replaced = 0;
            for (key, item) in map.iter_mut() {
                if is_sensitive(key) {
                    *item = Value::String(REDACTED.to_string());
                    replaced += 1;
                } else {
                    replaced += redact_value(item);
                }
            }
            replaced
        }
        Value::Array(items) => items.iter_mut().map(redact_value).sum(),
        _ => 0,
    }
}

/// Redact a response body.
///
/// Text that parses as a JSON object or array has its sensitive keys masked
/// and is re-serialized (pretty-printed) only when something was replaced.
/// Any other text is returned unchanged.
pub fn redact_response(text: &str) -> String {
    let mut value = match serde_json::from_str::<Value>(text) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => v,
        _ => return text.to_string(),
    };
    if redact_value(&mut value) == 0 {
        return text.to_string();
    }
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_keys_are_masked() {
        let mut value = json!({
            "result": "ok",
            "auth": {"API_KEY": "sk-123", "refreshToken": "abc"},
            "items": [{"password": "hunter2", "name": "x"}],
        });
        assert_eq!(redact_value(&mut value), 3);
        assert_eq!(value["auth"]["API_KEY"], REDACTED);
        assert_eq!(value["auth"]["refreshToken"], REDACTED);
        assert_eq!(value["items"][0]["password"], REDACTED);
        assert_eq!(value["items"][0]["name"], "x");
        assert_eq!(value["result"], "ok");
    }

    #[test]
    fn test_sensitive_object_is_replaced_whole() {
        let mut value = json!({"secrets": {"a": 1}});
        assert_eq!(redact_value(&mut value), 1);
        assert_eq!(value, json!({"secrets": REDACTED}));
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(redact_response("my password is hunter2"), "my password is hunter2");
        assert_eq!(redact_response("42"), "42");
    }

    #[test]
    fn test_clean_json_keeps_its_formatting() {
        let text = r#"{"answer":   "yes"}"#;
        assert_eq!(redact_response(text), text);
    }

    #[test]
    fn test_json_response_is_redacted() {
        let redacted = redact_response(r#"{"answer": "yes", "secret": "s3"}"#);
        let value: Value = serde_json::from_str(&redacted).unwrap();
        assert_eq!(value["secret"], REDACTED);
        assert_eq!(value["answer"], "yes");
    }
}
