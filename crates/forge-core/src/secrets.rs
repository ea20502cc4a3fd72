//! Secrets hydration: substitutes `{{NAME}}` template tokens found anywhere
//! in a configuration tree with values from a flat secrets map.
//!
//! Pure and deterministic — never mutates its inputs, never reaches outside
//! the JSON values it's given.

use serde_json::Value;

/// Walks `variables`, replacing every `{{NAME}}`-shaped string (or
/// substring) with the matching entry from `secrets`. Tokens naming an
/// absent secret are left untouched.
pub fn hydrate(variables: &Value, secrets: &Value) -> Value {
    match variables {
        Value::String(s) => Value::String(substitute(s, secrets)),
        Value::Array(items) => Value::Array(items.iter().map(|v| hydrate(v, secrets)).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), hydrate(v, secrets))).collect())
        }
        other => other.clone(),
    }
}

fn substitute(template: &str, secrets: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let Some(end) = rest[start..].find("}}") else {
            out.push_str(rest);
            return out;
        };
        let end = start + end;

        out.push_str(&rest[..start]);
        let name = rest[start + 2..end].trim();

        match secrets.get(name).and_then(Value::as_str) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..end + 2]),
        }

        rest = &rest[end + 2..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_known_token() {
        let vars = json!({"url": "https://{{HOST}}/api"});
        let secrets = json!({"HOST": "example.com"});
        assert_eq!(hydrate(&vars, &secrets), json!({"url": "https://example.com/api"}));
    }

    #[test]
    fn leaves_unknown_token_untouched() {
        let vars = json!({"url": "https://{{MISSING}}/api"});
        let secrets = json!({"HOST": "example.com"});
        assert_eq!(hydrate(&vars, &secrets), json!({"url": "https://{{MISSING}}/api"}));
    }

    #[test]
    fn recurses_through_nested_structures() {
        let vars = json!({"nested": {"list": ["{{A}}", "plain", {"k": "{{B}}"}]}});
        let secrets = json!({"A": "1", "B": "2"});
        assert_eq!(
            hydrate(&vars, &secrets),
            json!({"nested": {"list": ["1", "plain", {"k": "2"}]}})
        );
    }

    #[test]
    fn non_string_scalars_pass_through_unchanged() {
        let vars = json!({"count": 5, "enabled": true, "note": null});
        assert_eq!(hydrate(&vars, &json!({})), vars);
    }
}
