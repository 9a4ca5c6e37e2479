use regex::Regex;
use serde_json::Value;

use crate::context::Context;

/// Replace `{{identifier}}` placeholders with context values.
///
/// Dotted paths (`{{user.name}}`) are allowed. String values substitute
/// as-is, other values as compact JSON. Unresolved placeholders are left
/// as literal text so authors can write braces that are not placeholders.
pub fn interpolate(template: &str, context: &Context) -> String {
    let re = Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}").unwrap();

    re.replace_all(template, |caps: &regex::Captures<'_>| {
        match context.resolve_path(&caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(pairs: &[(&str, Value)]) -> Context {
        Context::from_map(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn test_string_substitution() {
        let c = ctx(&[("topic", json!("Rust async"))]);
        assert_eq!(
            interpolate("Summarize {{topic}} briefly.", &c),
            "Summarize Rust async briefly."
        );
    }

    #[test]
    fn test_non_string_values_render_as_json() {
        let c = ctx(&[("count", json!(3)), ("user", json!({"name": "Ada"}))]);
        assert_eq!(interpolate("n={{count}}", &c), "n=3");
        assert_eq!(interpolate("u={{user}}", &c), r#"u={"name":"Ada"}"#);
    }

    #[test]
    fn test_dotted_path() {
        let c = ctx(&[("user", json!({"name": "Ada"}))]);
        assert_eq!(interpolate("Hello {{user.name}}", &c), "Hello Ada");
    }

    #[test]
    fn test_unresolved_placeholder_stays_literal() {
        let c = Context::new();
        assert_eq!(interpolate("Hello {{missing}}", &c), "Hello {{missing}}");
    }

    #[test]
    fn test_whitespace_inside_braces() {
        let c = ctx(&[("name", json!("world"))]);
        assert_eq!(interpolate("hi {{ name }}", &c), "hi world");
    }

    #[test]
    fn test_multiple_placeholders() {
        let c = ctx(&[("a", json!("1")), ("b", json!("2"))]);
        assert_eq!(interpolate("{{a}}-{{b}}-{{a}}", &c), "1-2-1");
    }
}
