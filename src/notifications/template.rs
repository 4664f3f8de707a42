//! `{{name}}` substitution over JSON body templates.

use serde_json::Value;
use std::collections::BTreeMap;

use super::senders::SenderError;

/// Replaces every `{{name}}` for the known variables. Other text, including unknown
/// placeholders, is left as is.
pub fn replace_placeholders(text: &str, variables: &BTreeMap<&'static str, String>) -> String {
    let mut rendered = text.to_string();
    for (name, value) in variables {
        let placeholder = format!("{{{{{name}}}}}");
        if rendered.contains(&placeholder) {
            rendered = rendered.replace(&placeholder, value);
        }
    }
    rendered
}

/// Rewrites every string leaf of `value`; keys and non-string scalars pass through.
pub fn render_value(value: Value, variables: &BTreeMap<&'static str, String>) -> Value {
    match value {
        Value::String(s) => Value::String(replace_placeholders(&s, variables)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| render_value(item, variables))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, render_value(item, variables)))
                .collect(),
        ),
        scalar => scalar,
    }
}

/// Parses a raw body template and renders it.
pub fn render_template(raw: &str, variables: &BTreeMap<&'static str, String>) -> Result<Value, SenderError> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|e| SenderError::MalformedTemplate(e.to_string()))?;
    Ok(render_value(parsed, variables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("status", "down".to_string()),
            ("monitor_name", "api".to_string()),
            ("status_code", "502".to_string()),
        ])
    }

    #[test]
    fn test_static_content_is_unchanged() {
        let rendered = render_value(json!({ "msg": "static" }), &vars());
        assert_eq!(rendered, json!({ "msg": "static" }));
    }

    #[test]
    fn test_nested_leaves_are_rendered() {
        let template = json!({
            "msg": "{{status}}",
            "embed": { "title": "{{monitor_name}} is {{status}}", "fields": ["{{status_code}}", 3, true] },
            "count": 1,
            "none": null
        });
        let rendered = render_value(template, &vars());
        assert_eq!(
            rendered,
            json!({
                "msg": "down",
                "embed": { "title": "api is down", "fields": ["502", 3, true] },
                "count": 1,
                "none": null
            })
        );
    }

    #[test]
    fn test_unknown_placeholders_survive() {
        assert_eq!(replace_placeholders("{{nope}} {{status}}", &vars()), "{{nope}} down");
    }

    #[test]
    fn test_malformed_template_is_reported() {
        assert!(matches!(
            render_template("{ not json", &vars()),
            Err(SenderError::MalformedTemplate(_))
        ));
    }
}
