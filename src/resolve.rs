//! Component Resolver
//!
//! Finds the one declaration in a synthesized module that is a renderable
//! component. A cheap textual scan proposes candidates in source order; each
//! candidate is then probed against the live scope. The first candidate that
//! passes wins. Probes run on the module's own interpreter, so all of them
//! together stay inside the synthesis budget.

use std::rc::Rc;

use regex::Regex;
use serde::Serialize;

use crate::element::create_element;
use crate::error::PipelineError;
use crate::hooks::{HookStore, RenderContext};
use crate::interp::Interrupt;
use crate::synthesize::{synthesis_error, SynthesizedModule};
use crate::value::{PropertyMap, Value};

lazy_static::lazy_static! {
    static ref BINDING_DECL: Regex =
        Regex::new(r"\b(?:const|let|var)\s+([A-Z][A-Za-z0-9_$]*)\s*=\s*").unwrap();
    static ref FUNCTION_DECL: Regex =
        Regex::new(r"\bfunction\s+([A-Z][A-Za-z0-9_$]*)\s*\(").unwrap();
    static ref SIMPLE_ARROW: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*\s*=>").unwrap();
    static ref FUNCTION_EXPR: Regex = Regex::new(r"^function\b").unwrap();
}

/// Names probed when the scan finds nothing.
pub const FALLBACK_NAMES: &[&str] = &[
    "TestComponent",
    "Component",
    "StatefulComponent",
    "Button",
    "Card",
    "Modal",
    "Form",
    "List",
    "Counter",
    "App",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CandidateKind {
    /// `function Name(...)`
    Function,
    /// `const Name = (...) => ...` or `const Name = arg => ...`
    Arrow,
    /// `const Name = function ...`
    Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDeclaration {
    pub name: String,
    pub kind: CandidateKind,
    /// Byte offset of the declaration in the sanitized source.
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct ResolvedComponent {
    pub name: String,
    pub component: Value,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATIC SCAN
// ═══════════════════════════════════════════════════════════════════════════════

/// Capitalized function-like declarations, in source order, first occurrence
/// of each name only.
pub fn scan_candidates(source: &str) -> Vec<CandidateDeclaration> {
    let mut found = Vec::new();

    for caps in BINDING_DECL.captures_iter(source) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let rest = &source[whole.end()..];
        let kind = if FUNCTION_EXPR.is_match(rest) {
            CandidateKind::Expression
        } else if SIMPLE_ARROW.is_match(rest) || is_parenthesized_arrow(rest) {
            CandidateKind::Arrow
        } else {
            continue;
        };
        found.push(CandidateDeclaration {
            name: name.as_str().to_string(),
            kind,
            offset: whole.start(),
        });
    }

    for caps in FUNCTION_DECL.captures_iter(source) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        found.push(CandidateDeclaration {
            name: name.as_str().to_string(),
            kind: CandidateKind::Function,
            offset: whole.start(),
        });
    }

    found.sort_by_key(|c| c.offset);
    let mut seen = std::collections::HashSet::new();
    found.retain(|c| seen.insert(c.name.clone()));
    found
}

/// `( ... ) =>` where the parameter list may itself contain parentheses.
fn is_parenthesized_arrow(text: &str) -> bool {
    if !text.starts_with('(') {
        return false;
    }
    match matching_paren(text) {
        Some(close) => text[close + 1..].trim_start().starts_with("=>"),
        None => false,
    }
}

/// Index of the `)` closing the `(` at index 0, skipping string literals.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROBING
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentResolver;

impl ComponentResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, module: &mut SynthesizedModule) -> Result<ResolvedComponent, PipelineError> {
        let candidates = scan_candidates(module.source());
        let names: Vec<String> = if candidates.is_empty() {
            tracing::debug!("No capitalized declarations found, probing fallback names");
            FALLBACK_NAMES.iter().map(|n| n.to_string()).collect()
        } else {
            candidates.into_iter().map(|c| c.name).collect()
        };

        for name in names {
            if let Some(component) = self.probe(module, &name)? {
                tracing::debug!(component = %name, steps = module.interpreter().steps(), "Component resolved");
                return Ok(ResolvedComponent { name, component });
            }
        }

        Err(PipelineError::Resolution("No valid component found".to_string()))
    }

    /// `Ok(None)` rejects the candidate; `Err` aborts resolution.
    fn probe(&self, module: &mut SynthesizedModule, name: &str) -> Result<Option<Value>, PipelineError> {
        let Some(value) = module.scope().declared(name) else {
            return Ok(None);
        };
        if !matches!(value, Value::Function(_)) {
            tracing::debug!(candidate = name, kind = value.type_of(), "Candidate is not a function");
            return Ok(None);
        }

        let props = Value::object(PropertyMap::new());
        match create_element(&value, &props, Vec::new()) {
            Some(element) if element.is_component(&value) => {}
            _ => return Ok(None),
        }

        let store = HookStore::shared();
        let interp = module.interpreter();
        let context = RenderContext::begin(&store, Rc::from(format!("probe:{}", name)), name);
        let previous = interp.enter_render(context);
        let result = interp.call(&value, vec![props]);
        interp.leave_render(previous);

        match result {
            Ok(Value::Element(_)) => Ok(Some(value)),
            Ok(other) => {
                tracing::debug!(candidate = name, returned = other.type_of(), "Candidate did not return an element");
                Ok(None)
            }
            Err(interrupt @ Interrupt::Budget(_)) => Err(synthesis_error(interrupt).into()),
            Err(interrupt) => {
                tracing::debug!(candidate = name, error = %interrupt.message(), "Candidate threw while probing");
                Ok(None)
            }
        }
    }
}
