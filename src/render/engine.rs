//! Logic-less template rendering.
//!
//! Templates are written in the mustache dialect base16 template repositories
//! use. They are translated to handlebars, which shares the interpolation
//! syntax, and rendered with HTML escaping disabled. Unresolved names render
//! as empty strings.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use handlebars::Handlebars;
use regex_lite::Regex;

use crate::error::{BuilderError, Result};

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"\{\{(\{)?\s*([#^/&!>]?)\s*([^{}]*?)\s*(\})?\}\}").expect("valid regex")
    })
}

/// A name usable as a mustache section or variable: no spaces, no helper arguments.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

struct Section<'a> {
    name: &'a str,
    /// Set when the opening tag was rewritten; holds the closing tag to emit.
    close: Option<&'static str>,
}

/// Rewrite mustache-only constructs into their handlebars equivalents.
///
/// `{{#name}}` / `{{^name}}` sections become `{{#if name}}` / `{{#unless name}}`
/// so that a section is driven by the truthiness of a scalar variable, and
/// `{{&name}}` becomes a triple-stash. Handlebars blocks with arguments such as
/// `{{#if a}}` pass through untouched.
pub fn translate_mustache(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<Section<'_>> = Vec::new();
    let mut last = 0;

    for caps in tag_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        last = whole.end();

        let triple = caps.get(1).is_some();
        let sigil = caps.get(2).map_or("", |m| m.as_str());
        let name = caps.get(3).map_or("", |m| m.as_str());
        let raw = whole.as_str();

        match sigil {
            "#" | "^" if !triple && is_plain_name(name) => {
                let (open, close) = if sigil == "#" {
                    ("if", "{{/if}}")
                } else {
                    ("unless", "{{/unless}}")
                };
                out.push_str(&format!("{{{{#{open} {name}}}}}"));
                stack.push(Section {
                    name,
                    close: Some(close),
                });
            }
            "#" => {
                let helper = name.split_whitespace().next().unwrap_or_default();
                stack.push(Section {
                    name: helper,
                    close: None,
                });
                out.push_str(raw);
            }
            "/" => {
                let translated = match stack.last() {
                    Some(Section {
                        name: open,
                        close: Some(close),
                    }) if *open == name => Some(*close),
                    _ => None,
                };
                if stack.last().is_some_and(|s| s.name == name) {
                    stack.pop();
                }
                out.push_str(translated.unwrap_or(raw));
            }
            "&" if !triple && is_plain_name(name) => {
                out.push_str(&format!("{{{{{{{name}}}}}}}"));
            }
            _ => out.push_str(raw),
        }
    }

    out.push_str(&text[last..]);
    out
}

/// Every variable a template reads, by interpolation or as a section condition.
pub fn referenced_names(text: &str) -> BTreeSet<String> {
    tag_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let sigil = caps.get(2).map_or("", |m| m.as_str());
            let name = caps.get(3).map_or("", |m| m.as_str());
            let reads = matches!(sigil, "" | "&" | "#" | "^");
            (reads && is_plain_name(name) && !matches!(name, "." | "this" | "else"))
                .then(|| name.to_string())
        })
        .collect()
}

/// Names the template reads that the variables do not define.
pub fn unresolved_names(text: &str, variables: &BTreeMap<String, String>) -> Vec<String> {
    referenced_names(text)
        .into_iter()
        .filter(|name| !variables.contains_key(name))
        .collect()
}

/// A set of compiled templates sharing one handlebars registry.
pub struct Engine {
    registry: Handlebars<'static>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        // Generated files are config, not HTML.
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(false);
        Self { registry }
    }

    /// Compile `text` under `name`, replacing any template already registered there.
    pub fn register(&mut self, name: &str, text: &str) -> Result<()> {
        self.registry
            .register_template_string(name, translate_mustache(text))
            .map_err(|e| BuilderError::TemplateParse {
                file: name.to_string(),
                source: Box::new(e),
            })
    }

    pub fn render(&self, name: &str, variables: &BTreeMap<String, String>) -> Result<String> {
        self.registry
            .render(name, variables)
            .map_err(|e| BuilderError::TemplateRender {
                file: name.to_string(),
                source: Box::new(e),
            })
    }
}

/// Render a one-off template string against `variables`.
pub fn render_str(text: &str, variables: &BTreeMap<String, String>) -> Result<String> {
    let mut engine = Engine::new();
    engine.register("__inline__", text)?;
    engine.render("__inline__", variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[rstest]
    #[case("{{#dark}}x{{/dark}}", "{{#if dark}}x{{/if}}")]
    #[case("{{^dark}}x{{/dark}}", "{{#unless dark}}x{{/unless}}")]
    #[case("{{# dark }}x{{/ dark }}", "{{#if dark}}x{{/if}}")]
    #[case("{{&name}}", "{{{name}}}")]
    #[case("{{#if dark}}x{{/if}}", "{{#if dark}}x{{/if}}")]
    #[case(
        "{{#a}}{{#if b}}{{c}}{{/if}}{{/a}}",
        "{{#if a}}{{#if b}}{{c}}{{/if}}{{/if}}"
    )]
    #[case("plain text", "plain text")]
    fn translates_mustache_sections(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(translate_mustache(input), expected);
    }

    #[test]
    fn substitutes_hyphenated_names() {
        let out = render_str(
            "background: #{{base00-hex}}; r={{base00-hex-r}}",
            &vars(&[("base00-hex", "1d1f21"), ("base00-hex-r", "1d")]),
        )
        .unwrap();
        assert_eq!(out, "background: #1d1f21; r=1d");
    }

    #[test]
    fn missing_names_render_empty() {
        let out = render_str("[{{base16-hex}}]", &vars(&[])).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn does_not_html_escape() {
        let out = render_str(
            "{{scheme-author}}",
            &vars(&[("scheme-author", "Chris <chris@example.com> & co")]),
        )
        .unwrap();
        assert_eq!(out, "Chris <chris@example.com> & co");
    }

    #[test]
    fn triple_stash_and_ampersand_are_raw() {
        let variables = vars(&[("v", "a&b")]);
        assert_eq!(render_str("{{{v}}}|{{&v}}", &variables).unwrap(), "a&b|a&b");
    }

    #[rstest]
    #[case(&[("dark", "yes")], "on")]
    #[case(&[("dark", "")], "off")]
    #[case(&[], "off")]
    fn sections_follow_truthiness(#[case] pairs: &[(&str, &str)], #[case] expected: &str) {
        let out = render_str("{{#dark}}on{{/dark}}{{^dark}}off{{/dark}}", &vars(pairs)).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn section_bodies_see_outer_variables() {
        let out = render_str(
            "{{#dark}}bg={{base00-hex}}{{/dark}}",
            &vars(&[("dark", "true"), ("base00-hex", "1d1f21")]),
        )
        .unwrap();
        assert_eq!(out, "bg=1d1f21");
    }

    #[test]
    fn comments_are_dropped() {
        let out = render_str("a{{! ignored }}b", &vars(&[])).unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn unclosed_section_is_a_parse_error() {
        let err = render_str("{{#dark}}never closed", &vars(&[])).unwrap_err();
        assert!(matches!(err, BuilderError::TemplateParse { .. }));
    }

    #[test]
    fn reports_unresolved_names_once() {
        let variables = vars(&[("base00-hex", "1d1f21")]);
        let missing = unresolved_names(
            "{{base00-hex}} {{base16-hex}} {{base16-hex}} {{#dark}}{{/dark}} {{! note }}",
            &variables,
        );
        assert_eq!(missing, ["base16-hex", "dark"]);
    }
}
