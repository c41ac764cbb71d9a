//! Sandbox containment: what generated code can reach, and how runaway code
//! is stopped.

#[cfg(test)]
mod tests {
    use crate::artifact::ComponentArtifact;
    use crate::config::{ExecutionLimits, PreviewConfig};
    use crate::error::{PipelineError, PipelineErrorKind, SynthesisError};
    use crate::guard::ComponentHandle;
    use crate::pipeline::{PipelineStage, PreviewPipeline};
    use crate::synthesize::{ComponentSynthesizer, SynthesizedModule};
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn synthesis_error(source: &str) -> SynthesisError {
        match ComponentSynthesizer::default().synthesize(source) {
            Err(e) => e,
            Ok(_) => panic!("expected {:?} to be rejected", source),
        }
    }

    fn declared_string(module: &SynthesizedModule, name: &str) -> String {
        match module.scope().declared(name) {
            Some(Value::Str(s)) => s.to_string(),
            other => panic!("{} is not a string: {:?}", name, other),
        }
    }

    fn prepare_with(config: PreviewConfig, code: &str) -> ComponentHandle {
        PreviewPipeline::new(config)
            .prepare(&ComponentArtifact::from_code(code))
            .unwrap_or_else(|f| panic!("pipeline rejected artifact: {}", f))
    }

    fn render_error(code: &str) -> String {
        let mut handle = prepare_with(PreviewConfig::default(), code);
        let failure = handle.render().unwrap_err();
        assert!(handle.is_failed());
        failure.message
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // REACHABILITY
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_host_globals_are_not_defined() {
        for name in [
            "fetch", "window", "document", "globalThis", "eval", "require", "process", "setTimeout",
            "localStorage", "XMLHttpRequest", "Function", "Date",
        ] {
            let source = format!("const leak = {};", name);
            assert_eq!(
                synthesis_error(&source),
                SynthesisError::Runtime(format!("ReferenceError: {} is not defined", name)),
            );
        }
    }

    #[test]
    fn test_typeof_sees_no_host_globals() {
        let module = ComponentSynthesizer::default()
            .synthesize("const kinds = [typeof window, typeof fetch, typeof require].join(',');")
            .unwrap();
        assert_eq!(declared_string(&module, "kinds"), "undefined,undefined,undefined");
    }

    #[test]
    fn test_no_prototype_escape() {
        let module = ComponentSynthesizer::default()
            .synthesize(
                "const reached = [[].constructor, ({}).constructor, (() => 1).constructor, 'x'.constructor, ({}).__proto__];\nconst escaped = reached.filter(p => p !== undefined).length;",
            )
            .unwrap();
        assert!(matches!(module.scope().declared("escaped"), Some(Value::Number(n)) if n == 0.0));
    }

    #[test]
    fn test_each_artifact_gets_a_fresh_scope() {
        let first = ComponentSynthesizer::default()
            .synthesize("Math.leaked = 1;\nconst A = 1;")
            .unwrap();
        assert!(first.scope().declared("A").is_some());

        let second = ComponentSynthesizer::default()
            .synthesize("const seen = typeof Math.leaked;\nconst hasA = typeof A;")
            .unwrap();
        assert_eq!(declared_string(&second, "seen"), "undefined");
        assert_eq!(declared_string(&second, "hasA"), "undefined");
    }

    #[test]
    fn test_script_elements_are_render_errors() {
        assert_eq!(
            render_error("const Sneaky = () => elem('div', null, elem('script', null, 'alert(1)'));"),
            "Error: <script> elements are not allowed in previews"
        );
        assert_eq!(
            render_error("const Framed = () => elem('IFRAME', { src: 'https://example.com' });"),
            "Error: <iframe> elements are not allowed in previews"
        );
    }

    #[test]
    fn test_script_urls_are_dropped() {
        let mut handle = prepare_with(
            PreviewConfig::default(),
            "const Link = () => elem('a', { href: ' JavaScript:alert(1)', title: 't' }, 'go');",
        );
        handle.render().unwrap();
        assert_eq!(handle.to_html(), "<a title=\"t\">go</a>");
    }

    #[test]
    fn test_raw_html_props_are_not_attributes() {
        let mut handle = prepare_with(
            PreviewConfig::default(),
            "const Raw = () => elem('div', { dangerouslySetInnerHTML: { __html: '<img src=x onerror=alert(1)>' } }, 'safe');",
        );
        handle.render().unwrap();
        assert_eq!(handle.to_html(), "<div>safe</div>");
    }

    #[test]
    fn test_stylesheet_cannot_close_style_element() {
        let mut handle = PreviewPipeline::default()
            .prepare(&ComponentArtifact::new(
                "const A = () => elem('p', null, 'x');",
                "p { color: red; }</style><script>alert(1)</script>",
            ))
            .unwrap();
        handle.render().unwrap();
        let html = handle.to_html();
        assert!(!html.contains("</style><script>"), "{}", html);
        assert!(html.ends_with("</style><p>x</p>"), "{}", html);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // BUDGETS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_infinite_loop_during_synthesis() {
        let err = synthesis_error("let n = 0;\nwhile (true) { n++; }");
        assert!(matches!(err, SynthesisError::Budget(_)), "{:?}", err);
    }

    #[test]
    fn test_infinite_loop_surfaces_as_pipeline_error() {
        let failure = PreviewPipeline::default()
            .prepare(&ComponentArtifact::from_code("for (;;) {}\nconst A = () => elem('p', null);"))
            .unwrap_err();
        assert!(matches!(
            failure.error,
            PipelineError::Synthesis(SynthesisError::Budget(_))
        ));
        assert_eq!(failure.diagnostics.error_kind, Some(PipelineErrorKind::Synthesis));
        assert_eq!(failure.diagnostics.stage, Some(PipelineStage::Synthesis));
    }

    #[test]
    fn test_unbounded_recursion() {
        // Depending on frame sizes either the call depth or the stack limit
        // stops this first.
        let err = synthesis_error("const down = n => down(n + 1);\ndown(0);");
        assert!(matches!(err, SynthesisError::Budget(_)), "{:?}", err);

        let limits = ExecutionLimits {
            max_call_depth: 20,
            ..ExecutionLimits::default()
        };
        let err = ComponentSynthesizer::new(limits)
            .synthesize("const down = n => down(n + 1);\ndown(0);")
            .unwrap_err();
        assert_eq!(err, SynthesisError::Budget("call depth exceeds 20".to_string()));
    }

    #[test]
    fn test_recursion_through_nested_expressions_is_contained() {
        let err = synthesis_error(
            "const down = n => [[[[[[[[{ next: -(-(+(down(n + 1)))) }]]]]]]]];\ndown(0);",
        );
        assert!(matches!(err, SynthesisError::Budget(_)), "{:?}", err);
    }

    #[test]
    fn test_recursive_component_is_contained() {
        let failure = PreviewPipeline::default()
            .prepare(&ComponentArtifact::from_code(
                "const Loop = props => elem('div', null, Loop(props), [[[Loop(props)]]]);",
            ))
            .unwrap_err();
        assert!(matches!(
            failure.error,
            PipelineError::Synthesis(SynthesisError::Budget(_))
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // NESTING
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_deeply_nested_literal_is_rejected() {
        let source = format!("const x = {}1{};", "[".repeat(3000), "]".repeat(3000));
        let err = synthesis_error(&source);
        assert_eq!(err, SynthesisError::Budget("nesting deeper than 128 levels at line 1".to_string()));
    }

    #[test]
    fn test_long_expression_chain_is_rejected() {
        let chain = vec!["1"; 2000].join("+");
        let code = format!("const Big = () => elem('div', null, {});", chain);
        let failure = PreviewPipeline::default()
            .prepare(&ComponentArtifact::from_code(code))
            .unwrap_err();
        assert!(matches!(
            failure.error,
            PipelineError::Synthesis(SynthesisError::Budget(ref m)) if m.starts_with("nesting deeper than")
        ));
        assert_eq!(failure.diagnostics.stage, Some(PipelineStage::Synthesis));
    }

    #[test]
    fn test_nesting_limit_is_configurable() {
        let config = PreviewConfig {
            max_nesting_depth: 4,
            ..PreviewConfig::default()
        };
        let failure = PreviewPipeline::new(config)
            .prepare(&ComponentArtifact::from_code(
                "const A = () => elem('a', null, elem('b', null, elem('i', null, elem('u', null, 'x'))));",
            ))
            .unwrap_err();
        assert!(matches!(failure.error, PipelineError::Synthesis(SynthesisError::Budget(_))));
        let mut handle = prepare_with(
            PreviewConfig::default(),
            "const A = () => elem('a', null, elem('b', null, elem('i', null, elem('u', null, 'x'))));",
        );
        handle.render().unwrap();
        assert_eq!(handle.to_html(), "<a><b><i><u>x</u></i></b></a>");
    }

    #[test]
    fn test_deeply_nested_data_is_released() {
        let limits = ExecutionLimits {
            budget: Duration::from_secs(10),
            ..ExecutionLimits::default()
        };
        let module = ComponentSynthesizer::new(limits)
            .synthesize(
                "let v = [];\nlet o = {};\nfor (let i = 0; i < 50000; i++) { v = [v]; o = { inner: o }; }\nconst f = () => v;",
            )
            .unwrap();
        assert!(matches!(module.scope().declared("v"), Some(Value::Array(_))));
        drop(module);
    }

    #[test]
    fn test_self_referencing_array() {
        let module = ComponentSynthesizer::default()
            .synthesize("const a = [1];\na.push(a);\nconst text = String(a);")
            .unwrap();
        assert_eq!(declared_string(&module, "text"), "1,");

        let err = synthesis_error("const a = [1];\na.push(a);\nconst flat = a.flat(Infinity);");
        assert!(matches!(err, SynthesisError::Budget(_)), "{:?}", err);
    }

    #[test]
    fn test_deep_element_tree_is_a_render_error() {
        let config = PreviewConfig {
            synthesis_budget_ms: 10_000,
            ..PreviewConfig::default()
        };
        let mut handle = prepare_with(
            config,
            "let tree = 'leaf';\nfor (let i = 0; i < 20000; i++) { tree = elem('div', null, tree); }\nconst Deep = () => tree;",
        );
        let failure = handle.render().unwrap_err();
        assert!(failure.message.starts_with("Execution budget exceeded"), "{}", failure.message);
        assert!(handle.is_failed());
    }

    #[test]
    fn test_candidates_share_the_synthesis_budget() {
        // Every candidate alone is far below the step cap.
        let mut code = String::new();
        for i in 0..40 {
            code.push_str(&format!(
                "const Busy{} = () => {{ let n = 0; for (let i = 0; i < 200; i++) {{ n += i; }} return null; }};\n",
                i
            ));
        }
        code.push_str("const Shown = () => elem('p', null, 'ok');");

        let config = PreviewConfig {
            max_steps: 20_000,
            ..PreviewConfig::default()
        };
        let failure = PreviewPipeline::new(config)
            .prepare(&ComponentArtifact::from_code(code.clone()))
            .unwrap_err();
        assert!(matches!(
            failure.error,
            PipelineError::Synthesis(SynthesisError::Budget(ref m)) if m.contains("evaluation steps")
        ));
        assert_eq!(failure.diagnostics.stage, Some(PipelineStage::Synthesis));

        let mut handle = prepare_with(PreviewConfig::default(), &code);
        assert_eq!(handle.name(), "Shown");
        handle.render().unwrap();
        assert_eq!(handle.to_html(), "<p>ok</p>");
    }

    #[test]
    fn test_collection_growth_is_capped() {
        let err = synthesis_error("const items = [];\nwhile (true) items.push(1);");
        assert!(matches!(err, SynthesisError::Budget(_)), "{:?}", err);
    }

    #[test]
    fn test_string_growth_is_capped() {
        let err = synthesis_error("let s = 'x';\nwhile (true) s += s;");
        assert!(matches!(err, SynthesisError::Budget(ref m) if m.contains("string")), "{:?}", err);
        let err = synthesis_error("const big = 'x'.repeat(1e9);");
        assert!(matches!(err, SynthesisError::Budget(_)), "{:?}", err);
    }

    #[test]
    fn test_render_loop_is_stopped() {
        let mut handle = prepare_with(
            PreviewConfig::default(),
            "const Spin = () => {\n  const [n, setN] = useState(0);\n  useEffect(() => { setN(n + 1); });\n  return elem('p', null, n);\n};",
        );
        let failure = handle.render().unwrap_err();
        assert_eq!(
            failure.message,
            "Too many re-renders. The number of renders is limited to prevent an infinite loop."
        );
        assert!(handle.is_failed());
    }

    #[test]
    fn test_render_budget_is_enforced() {
        let config = PreviewConfig {
            render_budget_ms: 20,
            ..PreviewConfig::default()
        };
        let mut handle = prepare_with(
            config,
            "const Slow = () => {\n  const [go, setGo] = useState(false);\n  useEffect(() => { setGo(true); }, []);\n  if (go) { while (true) {} }\n  return elem('p', null);\n};",
        );
        let failure = handle.render().unwrap_err();
        assert!(
            failure.message.starts_with("Execution budget exceeded"),
            "{}",
            failure.message
        );
        assert_eq!(failure.component_stack, vec!["Slow".to_string()]);
    }
}
