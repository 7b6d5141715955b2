//! Prompt template rendering
//!
//! Provides `{{variable}}` substitution for system prompts and opening messages:
//! - Whitespace inside the braces is ignored (`{{ name }}`)
//! - Escape mechanism (`\{{name}}` renders as the literal `{{name}}`)
//! - Missing variables are kept as-is

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};

/// Matches `{{name}}`, optionally preceded by a backslash escape
static TEMPLATE_VAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\\)?\{\{\s*([a-zA-Z_][a-zA-Z0-9_.\-]*)\s*\}\}")
        .expect("template regex is valid")
});

/// Variables available while rendering a prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptVariables {
    values: HashMap<String, String>,
}

impl PromptVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, String>> for PromptVariables {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

/// Render a template string
///
/// # Examples
///
/// ```
/// use promptrun_core::template::{render, PromptVariables};
///
/// let vars = PromptVariables::new().with("name", "Ada");
/// assert_eq!(render("Hello {{name}}", &vars), "Hello Ada");
/// assert_eq!(render(r"Literal \{{name}}", &vars), "Literal {{name}}");
/// ```
pub fn render(template: &str, variables: &PromptVariables) -> String {
    TEMPLATE_VAR_REGEX
        .replace_all(template, |caps: &Captures| {
            let name = &caps[2];

            if caps.get(1).is_some() {
                return format!("{{{{{}}}}}", name);
            }

            match variables.get(name) {
                Some(value) => value.to_string(),
                None => {
                    tracing::debug!("Prompt variable not found, keeping as-is: {{{{{}}}}}", name);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Names of all unescaped variables referenced by a template, sorted
pub fn referenced_variables(template: &str) -> Vec<String> {
    TEMPLATE_VAR_REGEX
        .captures_iter(template)
        .filter(|caps| caps.get(1).is_none())
        .map(|caps| caps[2].to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Referenced variables that have no value
pub fn missing_variables(template: &str, variables: &PromptVariables) -> Vec<String> {
    referenced_variables(template)
        .into_iter()
        .filter(|name| variables.get(name).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_variables() -> PromptVariables {
        PromptVariables::new()
            .with("customer", "Ada")
            .with("product", "Widget Pro")
            .with("order.id", "A-17")
    }

    #[test]
    fn test_render_simple_variable() {
        let vars = test_variables();
        assert_eq!(render("Hi {{customer}}!", &vars), "Hi Ada!");
    }

    #[test]
    fn test_render_multiple_variables() {
        let vars = test_variables();
        assert_eq!(
            render("{{customer}} bought {{product}}", &vars),
            "Ada bought Widget Pro"
        );
    }

    #[test]
    fn test_render_whitespace_inside_braces() {
        let vars = test_variables();
        assert_eq!(render("{{ customer }}", &vars), "Ada");
    }

    #[test]
    fn test_render_dotted_name() {
        let vars = test_variables();
        assert_eq!(render("Order {{order.id}}", &vars), "Order A-17");
    }

    #[test]
    fn test_render_escaped_variable() {
        let vars = test_variables();
        assert_eq!(render(r"Use \{{customer}} here", &vars), "Use {{customer}} here");
    }

    #[test]
    fn test_render_mixed_escaped_and_real() {
        let vars = test_variables();
        assert_eq!(
            render(r"{{customer}} sees \{{product}}", &vars),
            "Ada sees {{product}}"
        );
    }

    #[test]
    fn test_render_unknown_variable_kept() {
        let vars = test_variables();
        assert_eq!(render("Dear {{ unknown }}", &vars), "Dear {{ unknown }}");
    }

    #[test]
    fn test_render_no_variables() {
        let vars = PromptVariables::new();
        assert_eq!(render("plain text >>> with arrows", &vars), "plain text >>> with arrows");
        assert_eq!(render("", &vars), "");
    }

    #[test]
    fn test_render_single_braces_untouched() {
        let vars = test_variables();
        assert_eq!(render("{\"json\": {customer}}", &vars), "{\"json\": {customer}}");
    }

    #[test]
    fn test_referenced_and_missing_variables() {
        let template = r"{{customer}} {{product}} {{customer}} {{tier}} \{{escaped}}";
        assert_eq!(
            referenced_variables(template),
            vec!["customer".to_string(), "product".to_string(), "tier".to_string()]
        );
        assert_eq!(
            missing_variables(template, &test_variables()),
            vec!["tier".to_string()]
        );
    }

    #[test]
    fn test_from_hash_map() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), "1".to_string());
        let vars = PromptVariables::from(map);
        assert_eq!(render("{{a}}", &vars), "1");
        assert!(!vars.is_empty());
    }
}
