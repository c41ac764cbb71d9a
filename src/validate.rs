//! Response Validator
//!
//! Structural checks on raw generator output before it reaches the sandbox.
//! Validation never fails outward: any problem substitutes a deterministic
//! fallback artifact derived from the prompt, and the reason is recorded on
//! the [`ValidatedResponse`].

use regex::Regex;

use crate::artifact::ComponentArtifact;
use crate::error::ValidationError;

lazy_static::lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"```(?:json|jsx|javascript|js)?[ \t]*\r?\n?").unwrap();
}

/// Words that name a component when they appear in the prompt.
const COMPONENT_WORDS: &[&str] = &[
    "button",
    "navigation",
    "nav",
    "card",
    "form",
    "modal",
    "header",
    "footer",
    "sidebar",
    "menu",
    "list",
    "table",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedResponse {
    pub artifact: ComponentArtifact,
    /// Why the fallback artifact was substituted, if it was.
    pub fallback: Option<ValidationError>,
}

impl ValidatedResponse {
    pub fn used_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Validate raw generator output for `prompt`.
pub fn validate_response(raw: &str, prompt: &str) -> ValidatedResponse {
    let cleaned = strip_fences(raw);
    let parsed = parse_response(&cleaned).and_then(|artifact| {
        check_code(&artifact.code)?;
        Ok(artifact)
    });
    match parsed {
        Ok(artifact) => {
            tracing::debug!(
                code_len = artifact.code.len(),
                stylesheet_len = artifact.stylesheet.len(),
                "Generator response accepted"
            );
            ValidatedResponse {
                artifact,
                fallback: None,
            }
        }
        Err(reason) => {
            tracing::warn!(
                reason = %reason,
                preview = %preview(&cleaned, 200),
                "Generator response rejected, substituting fallback"
            );
            fallback_response(prompt, reason)
        }
    }
}

pub fn fallback_response(prompt: &str, reason: ValidationError) -> ValidatedResponse {
    ValidatedResponse {
        artifact: fallback_artifact(prompt),
        fallback: Some(reason),
    }
}

pub fn strip_fences(raw: &str) -> String {
    CODE_FENCE.replace_all(raw.trim(), "").trim().to_string()
}

/// Parse `{code, stylesheet}` (or the `{jsx, css}` spelling). Falls back to
/// the outermost `{...}` slice when the model wrapped the JSON in prose.
pub fn parse_response(text: &str) -> Result<ComponentArtifact, ValidationError> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(error) => match outermost_object(text) {
            Some(slice) => serde_json::from_str(slice).map_err(|_| ValidationError::NotJson(error.to_string()))?,
            None => return Err(ValidationError::NotJson(error.to_string())),
        },
    };

    let serde_json::Value::Object(map) = value else {
        return Err(ValidationError::NotJson("expected a JSON object".to_string()));
    };

    let code = map
        .get("code")
        .or_else(|| map.get("jsx"))
        .ok_or(ValidationError::MissingCode)?
        .as_str()
        .ok_or(ValidationError::CodeNotString)?;
    if code.trim().is_empty() {
        return Err(ValidationError::EmptyCode);
    }

    let stylesheet = map
        .get("stylesheet")
        .or_else(|| map.get("css"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    Ok(ComponentArtifact::new(code, stylesheet))
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        text.get(start..=end)
    } else {
        None
    }
}

/// The code must declare something and produce a value.
pub fn check_code(code: &str) -> Result<(), ValidationError> {
    if code.trim().is_empty() {
        return Err(ValidationError::EmptyCode);
    }
    let has_declaration = ["const ", "let ", "var ", "function ", "=>"]
        .iter()
        .any(|marker| code.contains(marker));
    if !has_declaration {
        return Err(ValidationError::NoDeclaration);
    }
    if !(code.contains("return ") || code.contains("=>")) {
        return Err(ValidationError::NoReturn);
    }
    Ok(())
}

/// Pick a component name from the prompt's vocabulary.
pub fn extract_component_name(prompt: &str) -> String {
    let lower = prompt.to_lowercase();
    let word_match = lower
        .split(|c: char| !c.is_alphanumeric())
        .find(|word| COMPONENT_WORDS.contains(word));
    if let Some(word) = word_match {
        return capitalize(word);
    }
    if lower.contains("menu") {
        return "Navigation".to_string();
    }
    if lower.contains("list") {
        return "List".to_string();
    }
    if lower.contains("table") {
        return "Table".to_string();
    }
    "Component".to_string()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Deterministic stand-in component: echoes the prompt and toggles on click.
pub fn fallback_artifact(prompt: &str) -> ComponentArtifact {
    let name = extract_component_name(prompt);
    let description = format!("Component created from: {}", prompt.trim());
    // JSON string literals are valid JavaScript string literals.
    let description = serde_json::to_string(&description).unwrap_or_else(|_| "\"\"".to_string());
    let title = serde_json::to_string(&name).unwrap_or_else(|_| "\"\"".to_string());

    let code = format!(
        r#"const {name} = ({{ title = {title}, description = {description} }}) => {{
  const [isActive, setIsActive] = useState(false);
  return React.createElement(
    "div",
    {{ className: "preview-fallback" + (isActive ? " is-active" : "") }},
    React.createElement("h2", {{ className: "preview-fallback-title" }}, title),
    React.createElement("p", {{ className: "preview-fallback-description" }}, description),
    React.createElement(
      "button",
      {{ type: "button", onClick: () => setIsActive(!isActive) }},
      isActive ? "✓ Active" : "Click to Activate"
    ),
    isActive && React.createElement("div", {{ className: "preview-fallback-status" }}, "Component is now active!")
  );
}};"#
    );
    ComponentArtifact::new(code, FALLBACK_STYLESHEET)
}

const FALLBACK_STYLESHEET: &str = ".preview-fallback { max-width: 28rem; margin: 0 auto; padding: 1.5rem; border-radius: 0.5rem; background: #4f46e5; color: #fff; }
.preview-fallback button { margin-top: 1rem; padding: 0.5rem 1rem; border-radius: 0.5rem; }";

fn preview(text: &str, chars: usize) -> String {
    let mut out: String = text.chars().take(chars).collect();
    if text.chars().count() > chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_json_is_accepted() {
        let raw = r#"{"code": "const Foo = () => elem('div', {}, 'hi');"}"#;
        let result = validate_response(raw, "anything");
        assert!(!result.used_fallback());
        assert_eq!(result.artifact.code, "const Foo = () => elem('div', {}, 'hi');");
        assert_eq!(result.artifact.stylesheet, "");
    }

    #[test]
    fn test_not_json_falls_back_to_prompt_name() {
        let result = validate_response("not json", "build a card");
        assert!(matches!(result.fallback, Some(ValidationError::NotJson(_))));
        assert!(result.artifact.code.starts_with("const Card = "));
    }

    #[test]
    fn test_fenced_legacy_keys() {
        let raw = "```json\n{\"jsx\": \"const A = () => h('p', null)\", \"css\": \"p{}\"}\n```";
        let result = validate_response(raw, "");
        assert!(!result.used_fallback());
        assert_eq!(result.artifact.stylesheet, "p{}");
    }

    #[test]
    fn test_json_wrapped_in_prose() {
        let raw = "Here is your component:\n{\"code\": \"const A = () => h('p', null)\"}\nEnjoy!";
        let result = validate_response(raw, "");
        assert!(!result.used_fallback());
        assert_eq!(result.artifact.code, "const A = () => h('p', null)");
    }

    #[test]
    fn test_non_string_stylesheet_is_empty() {
        let artifact = parse_response(r#"{"code": "const A = () => 1", "stylesheet": 5}"#).unwrap();
        assert_eq!(artifact.stylesheet, "");
    }

    #[test]
    fn test_structural_failures() {
        assert_eq!(parse_response("{}"), Err(ValidationError::MissingCode));
        assert_eq!(parse_response(r#"{"code": 1}"#), Err(ValidationError::CodeNotString));
        assert_eq!(parse_response(r#"{"code": "  "}"#), Err(ValidationError::EmptyCode));
        assert!(matches!(parse_response("[1, 2]"), Err(ValidationError::NotJson(_))));
        assert_eq!(check_code("hello()"), Err(ValidationError::NoDeclaration));
        assert_eq!(check_code("const a = 1;"), Err(ValidationError::NoReturn));
        assert_eq!(check_code("function A() { return 1; }"), Ok(()));
    }

    #[test]
    fn test_component_name_vocabulary() {
        assert_eq!(extract_component_name("Build a Card, please"), "Card");
        assert_eq!(extract_component_name("modal with a form"), "Modal");
        assert_eq!(extract_component_name("a dropdown menu"), "Menu");
        assert_eq!(extract_component_name("some menus"), "Navigation");
        assert_eq!(extract_component_name("todolist"), "List");
        assert_eq!(extract_component_name("timetables"), "Table");
        assert_eq!(extract_component_name("something else"), "Component");
    }

    #[test]
    fn test_fallback_quotes_prompt() {
        let artifact = fallback_artifact("say \"hi\" `now` ${x}");
        assert!(artifact.code.contains(r#"\"hi\""#));
        assert!(check_code(&artifact.code).is_ok());
        assert!(!artifact.code.is_empty());
    }
}
