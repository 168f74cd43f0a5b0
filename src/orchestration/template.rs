//! Prompt template rendering for chain steps.
//!
//! Supported placeholders are `{input}`, `{previous_output}` and `{context}`.
//! `{{` and `}}` produce literal braces. Any other `{name}` is left as written.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Values substituted into a prompt template
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    /// The chain's original input
    pub input: &'a str,
    /// Output carried over from the previous step
    pub previous_output: &'a str,
    /// Current shared context
    pub context: &'a BTreeMap<String, serde_json::Value>,
}

/// Render `template` with the given values.
pub fn render_template(template: &str, vars: TemplateVars<'_>) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &Captures<'_>| {
            let whole = &caps[0];
            match whole {
                "{{" => "{".to_string(),
                "}}" => "}".to_string(),
                _ => match caps.get(1).map(|m| m.as_str()) {
                    Some("input") => vars.input.to_string(),
                    Some("previous_output") => vars.previous_output.to_string(),
                    Some("context") => serde_json::to_string(vars.context).unwrap_or_default(),
                    _ => whole.to_string(),
                },
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars<'a>(context: &'a BTreeMap<String, serde_json::Value>) -> TemplateVars<'a> {
        TemplateVars {
            input: "hello",
            previous_output: "draft",
            context,
        }
    }

    #[test]
    fn test_substitutes_known_placeholders() {
        let mut context = BTreeMap::new();
        context.insert("tone".to_string(), json!("formal"));
        let out = render_template("in={input} prev={previous_output} ctx={context}", vars(&context));
        assert_eq!(out, r#"in=hello prev=draft ctx={"tone":"formal"}"#);
    }

    #[test]
    fn test_escapes_and_unknown_placeholders() {
        let context = BTreeMap::new();
        let out = render_template("{{literal}} {unknown} {input}", vars(&context));
        assert_eq!(out, "{literal} {unknown} hello");
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        let context = BTreeMap::new();
        assert_eq!(render_template("plain text", vars(&context)), "plain text");
    }
}
