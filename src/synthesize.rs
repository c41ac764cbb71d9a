//! Component Synthesizer
//!
//! Parses sanitized code, lowers it into the restricted IR and executes it
//! once, top to bottom, inside a fresh [`ExecutionScope`]. The resulting scope
//! holds the program's declarations for the resolver to probe. The
//! interpreter that ran the program stays with the module, so probing spends
//! what is left of the same step and time budget.

use crate::config::ExecutionLimits;
use crate::error::SynthesisError;
use crate::interp::{Interpreter, Interrupt};
use crate::lower::parse_program;
use crate::scope::ExecutionScope;

/// An executed program and the scope its declarations live in.
pub struct SynthesizedModule {
    scope: ExecutionScope,
    interp: Interpreter,
    source: String,
}

impl SynthesizedModule {
    pub fn scope(&self) -> &ExecutionScope {
        &self.scope
    }

    /// The sanitized source this module was built from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interp
    }

    pub fn into_scope(self) -> ExecutionScope {
        self.scope
    }
}

impl std::fmt::Debug for SynthesizedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizedModule")
            .field("source_len", &self.source.len())
            .field("steps", &self.interp.steps())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentSynthesizer {
    limits: ExecutionLimits,
}

impl ComponentSynthesizer {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    pub fn synthesize(&self, sanitized: &str) -> Result<SynthesizedModule, SynthesisError> {
        let program = parse_program(sanitized, &self.limits)?;
        tracing::debug!(statements = program.body.len(), "Program lowered");

        let scope = ExecutionScope::new();
        let mut interp = Interpreter::new(self.limits);
        interp
            .run_program(&program, scope.module())
            .map_err(synthesis_error)?;
        tracing::debug!(steps = interp.steps(), "Program executed");

        Ok(SynthesizedModule {
            scope,
            interp,
            source: sanitized.to_string(),
        })
    }
}

pub(crate) fn synthesis_error(interrupt: Interrupt) -> SynthesisError {
    match interrupt {
        Interrupt::Budget(reason) => SynthesisError::Budget(reason),
        other => SynthesisError::Runtime(other.message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::time::Duration;

    fn synthesizer() -> ComponentSynthesizer {
        ComponentSynthesizer::new(ExecutionLimits::default())
    }

    #[test]
    fn test_declarations_land_in_module_scope() {
        let module = synthesizer()
            .synthesize("const Greeting = () => elem('p', null, 'hi');\nconst answer = 6 * 7;")
            .unwrap();
        assert!(matches!(module.scope().declared("Greeting"), Some(Value::Function(_))));
        assert!(matches!(module.scope().declared("answer"), Some(Value::Number(n)) if n == 42.0));
        assert!(module.scope().declared("useState").is_none());
    }

    #[test]
    fn test_syntax_error() {
        let err = synthesizer().synthesize("const A = () => {").unwrap_err();
        assert!(matches!(err, SynthesisError::Parse { .. }));
    }

    #[test]
    fn test_jsx_markup_is_rejected() {
        let err = synthesizer()
            .synthesize("const A = () => <div>hi</div>;")
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Parse { .. }));
    }

    #[test]
    fn test_unsupported_construct_names_line() {
        let err = synthesizer()
            .synthesize("const a = 1;\nclass Widget {}")
            .unwrap_err();
        match err {
            SynthesisError::Unsupported { line, .. } => assert_eq!(line, 2),
            other => panic!("expected unsupported construct, got {:?}", other),
        }
    }

    #[test]
    fn test_top_level_throw_is_runtime_error() {
        let err = synthesizer()
            .synthesize("throw new Error('boom');")
            .unwrap_err();
        assert_eq!(err, SynthesisError::Runtime("Error: boom".to_string()));
    }

    #[test]
    fn test_host_globals_are_absent() {
        for code in ["fetch('/x');", "window.location = 1;", "setTimeout(() => 1, 0);"] {
            let err = synthesizer().synthesize(code).unwrap_err();
            match err {
                SynthesisError::Runtime(message) => {
                    assert!(message.starts_with("ReferenceError"), "{}", message)
                }
                other => panic!("expected ReferenceError for {:?}, got {:?}", code, other),
            }
        }
    }

    #[test]
    fn test_infinite_loop_hits_budget() {
        let limits = ExecutionLimits {
            budget: Duration::from_millis(50),
            ..ExecutionLimits::default()
        };
        let err = ComponentSynthesizer::new(limits)
            .synthesize("while (true) {}")
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Budget(_)));
    }

    #[test]
    fn test_module_keeps_spent_budget() {
        let mut module = synthesizer()
            .synthesize("let total = 0;\nfor (let i = 0; i < 100; i++) { total += i; }")
            .unwrap();
        assert!(module.interpreter().steps() > 300);
    }
}
