//! End-to-end component tests: artifact in, rendered tree and interactions out.

#[cfg(test)]
mod tests {
    use crate::artifact::ComponentArtifact;
    use crate::error::{PipelineError, SynthesisError};
    use crate::guard::{ComponentHandle, EventPayload};
    use crate::pipeline::{PreviewPipeline, RenderOutcome};
    use crate::render::RenderTree;
    use crate::validate::{fallback_artifact, validate_response};
    use pretty_assertions::assert_eq;

    fn prepare(code: &str) -> ComponentHandle {
        PreviewPipeline::default()
            .prepare(&ComponentArtifact::from_code(code))
            .unwrap_or_else(|f| panic!("pipeline rejected artifact: {}", f))
    }

    fn rendered(code: &str) -> ComponentHandle {
        let mut handle = prepare(code);
        if let Err(failure) = handle.render() {
            panic!("render failed: {}", failure);
        }
        handle
    }

    fn tree(handle: &ComponentHandle) -> &RenderTree {
        handle.tree().expect("component has a rendered tree")
    }

    fn click(handle: &mut ComponentHandle, tag: &str) {
        let id = tree(handle).find_by_tag(tag).expect("element to click").id;
        assert_eq!(handle.dispatch(id, "click", EventPayload::default()), Ok(true));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // PIPELINE
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_single_arrow_component_renders() {
        let handle = rendered("const Foo = () => elem('div', {}, 'hi');");
        assert_eq!(handle.name(), "Foo");
        assert_eq!(handle.to_html(), "<div>hi</div>");
    }

    #[test]
    fn test_module_syntax_is_sanitized_before_synthesis() {
        let handle = rendered(
            "import React, { useState } from 'react';\n// Greeting card\nexport default function Greeting({ name = 'world' }) {\n  return React.createElement('h1', null, 'Hello, ', name);\n}",
        );
        assert_eq!(handle.name(), "Greeting");
        assert_eq!(handle.to_html(), "<h1>Hello, world</h1>");
    }

    #[test]
    fn test_no_capitalized_declaration_is_resolution_error() {
        let failure = PreviewPipeline::default()
            .prepare(&ComponentArtifact::from_code("const helper = () => elem('p', null);\nhelper();"))
            .unwrap_err();
        assert_eq!(failure.error, PipelineError::Resolution("No valid component found".to_string()));
    }

    #[test]
    fn test_invalid_syntax_is_synthesis_error_and_fallback_loads() {
        let pipeline = PreviewPipeline::default();
        let outcome = pipeline.load(&ComponentArtifact::from_code("const Broken = () => {"));
        match &outcome {
            RenderOutcome::Error { message, diagnostics } => {
                assert!(message.starts_with("Synthesis error: Syntax error"), "{}", message);
                assert_eq!(diagnostics.sanitized_length, "const Broken = () => {".len());
            }
            other => panic!("expected error outcome, got {}", other.label()),
        }

        let fallback = fallback_artifact("a broken button");
        assert!(!fallback.code.is_empty());
        let outcome = pipeline.load(&fallback);
        let handle = outcome.handle().expect("fallback loads");
        assert_eq!(handle.name(), "Button");
        assert!(!handle.is_failed());
    }

    #[test]
    fn test_second_candidate_selected_when_first_invalid() {
        let handle = rendered(
            "const Helper = () => 42;\nconst Panel = () => elem('section', null, 'panel');",
        );
        assert_eq!(handle.name(), "Panel");
        assert_eq!(handle.to_html(), "<section>panel</section>");
    }

    #[test]
    fn test_validated_response_flows_into_pipeline() {
        let response = validate_response(
            "```json\n{\"code\": \"const Foo = () => elem('div', {}, 'hi');\", \"stylesheet\": \".x { color: red; }\"}\n```",
            "anything",
        );
        assert!(!response.used_fallback());
        let outcome = PreviewPipeline::default().load(&response.artifact);
        assert_eq!(
            outcome.handle().unwrap().to_html(),
            "<style>.x { color: red; }</style><div>hi</div>"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // RENDERING
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_nested_components_props_and_children() {
        let handle = rendered(
            "const Card = () => elem('div', null, elem(Badge, { label: 'New' }, '!'));\nconst Badge = ({ label, children }) => elem('span', { className: 'badge' }, label, children);",
        );
        assert_eq!(handle.to_html(), "<div><span class=\"badge\">New!</span></div>");
    }

    #[test]
    fn test_keyed_list() {
        let handle = rendered(
            "const List = () => {\n  const items = ['a', 'b', 'c'];\n  return elem('ul', null, items.map(item => elem('li', { key: item }, item.toUpperCase())));\n};",
        );
        assert_eq!(handle.to_html(), "<ul><li>A</li><li>B</li><li>C</li></ul>");
    }

    #[test]
    fn test_fragment_and_skipped_children() {
        let handle = rendered(
            "const Pair = () => React.createElement(React.Fragment, null, elem('b', null, 'x'), null, false, undefined, 'y', 0);",
        );
        assert_eq!(handle.to_html(), "<b>x</b>y0");
    }

    #[test]
    fn test_attributes_and_styles() {
        let handle = rendered(
            "const Field = () => elem('label', { htmlFor: 'x', style: { backgroundColor: 'red', padding: 4 }, disabled: true, hidden: false, 'aria-label': 'L' }, 'L');",
        );
        assert_eq!(
            handle.to_html(),
            "<label aria-label=\"L\" disabled for=\"x\" style=\"background-color: red; padding: 4px\">L</label>"
        );
    }

    #[test]
    fn test_text_is_escaped() {
        let handle = rendered("const Code = () => elem('pre', { title: '\"q\"' }, '<b>&</b>');");
        assert_eq!(handle.to_html(), "<pre title=\"&quot;q&quot;\">&lt;b&gt;&amp;&lt;/b&gt;</pre>");
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // STATE & EVENTS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_click_increments_counter() {
        let mut handle = rendered(
            "const Counter = () => {\n  const [count, setCount] = useState(0);\n  return elem('button', { onClick: () => setCount(c => c + 1) }, 'Clicked ', count, ' times');\n};",
        );
        assert_eq!(tree(&handle).text(), "Clicked 0 times");
        assert!(handle.to_html().contains("data-preview-id=\"1\""));

        click(&mut handle, "button");
        click(&mut handle, "button");
        assert_eq!(tree(&handle).text(), "Clicked 2 times");
        assert_eq!(handle.render_count(), 3);
    }

    #[test]
    fn test_change_event_carries_payload() {
        let mut handle = rendered(
            "const Form = () => {\n  const [name, setName] = useState('');\n  return elem('div', null,\n    elem('input', { value: name, onChange: e => setName(e.target.value) }),\n    elem('p', null, 'Hello ', name || 'stranger'));\n};",
        );
        assert_eq!(tree(&handle).find_by_tag("p").unwrap().text(), "Hello stranger");

        let input = tree(&handle).find_by_tag("input").unwrap().id;
        assert_eq!(handle.dispatch(input, "change", EventPayload::value("Ada")), Ok(true));
        let tree = tree(&handle);
        assert_eq!(tree.find_by_tag("p").unwrap().text(), "Hello Ada");
        assert_eq!(tree.find_by_tag("input").unwrap().attribute("value"), Some("Ada"));
    }

    #[test]
    fn test_dispatch_without_handler() {
        let mut handle = rendered("const Static = () => elem('p', null, 'still');");
        let id = tree(&handle).find_by_tag("p").unwrap().id;
        assert_eq!(handle.dispatch(id, "click", EventPayload::default()), Ok(false));
        assert_eq!(handle.dispatch(99, "click", EventPayload::default()), Ok(false));
    }

    #[test]
    fn test_equal_state_does_not_rerender() {
        let mut handle = rendered(
            "const Same = () => {\n  const [v, setV] = useState('x');\n  return elem('button', { onClick: () => setV('x') }, v);\n};",
        );
        click(&mut handle, "button");
        assert_eq!(handle.render_count(), 1);
    }

    #[test]
    fn test_effect_updates_state_after_commit() {
        let handle = rendered(
            "const Clock = () => {\n  const [ready, setReady] = useState(false);\n  useEffect(() => { setReady(true); }, []);\n  return elem('span', null, ready ? 'ready' : 'waiting');\n};",
        );
        assert_eq!(tree(&handle).text(), "ready");
        assert_eq!(handle.render_count(), 2);
    }

    #[test]
    fn test_effect_cleanup_runs_before_next_effect() {
        let mut handle = rendered(
            "const log = [];\nconst Tracker = () => {\n  const [n, setN] = useState(0);\n  useEffect(() => {\n    log.push('run' + n);\n    return () => { log.push('cleanup' + n); };\n  }, [n]);\n  return elem('button', { onClick: () => setN(n + 1) }, log.join(' '));\n};",
        );
        assert_eq!(tree(&handle).text(), "");
        click(&mut handle, "button");
        assert_eq!(tree(&handle).text(), "run0");
        click(&mut handle, "button");
        assert_eq!(tree(&handle).text(), "run0 cleanup0 run1");
    }

    #[test]
    fn test_memo_and_ref() {
        let mut handle = rendered(
            "const Stats = () => {\n  const renders = useRef(0);\n  renders.current += 1;\n  const [items, setItems] = useState([3, 1, 2]);\n  const sorted = useMemo(() => [...items].sort(), [items]);\n  return elem('p', { onClick: () => setItems([...items, 0]) }, sorted.join(','), ' / ', renders.current);\n};",
        );
        assert_eq!(tree(&handle).text(), "1,2,3 / 1");
        click(&mut handle, "p");
        assert_eq!(tree(&handle).text(), "0,1,2,3 / 2");
    }

    #[test]
    fn test_fallback_component_toggles() {
        let artifact = fallback_artifact("build a card");
        let outcome = PreviewPipeline::default().load(&artifact);
        let RenderOutcome::Loaded(mut handle) = outcome else {
            panic!("fallback did not load");
        };
        assert_eq!(handle.name(), "Card");
        assert_eq!(tree(&handle).find_by_tag("h2").unwrap().text(), "Card");
        assert_eq!(
            tree(&handle).find_by_tag("p").unwrap().text(),
            "Component created from: build a card"
        );
        assert_eq!(tree(&handle).find_by_tag("button").unwrap().text(), "Click to Activate");

        click(&mut handle, "button");
        let text = tree(&handle).text();
        assert!(text.contains("✓ Active"), "{}", text);
        assert!(text.contains("Component is now active!"), "{}", text);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // RENDER GUARD
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_render_failure_sticks_until_reset() {
        let mut handle = rendered(
            "const Bomb = () => {\n  const [armed, setArmed] = useState(false);\n  if (armed) throw new Error('exploded');\n  return elem('button', { onClick: () => setArmed(true) }, 'arm');\n};",
        );
        let id = tree(&handle).find_by_tag("button").unwrap().id;
        let failure = handle.dispatch(id, "click", EventPayload::default()).unwrap_err();
        assert_eq!(failure.message, "Error: exploded");
        assert_eq!(failure.component_stack, vec!["Bomb".to_string()]);
        assert!(handle.is_failed());
        assert!(handle.tree().is_none());
        assert_eq!(handle.render().unwrap_err(), failure);

        let html = handle.to_html();
        assert!(html.contains("Component Error"));
        assert!(html.contains("Error: exploded"));
        assert!(html.contains("in Bomb"));

        let tree = handle.reset().unwrap();
        assert_eq!(tree.text(), "arm");
        assert!(!handle.is_failed());
    }

    #[test]
    fn test_handler_error_does_not_fail_guard() {
        let mut handle = rendered(
            "const Grumpy = () => elem('button', { onClick: () => { throw new Error('nope'); } }, 'x');",
        );
        let id = tree(&handle).find_by_tag("button").unwrap().id;
        let failure = handle.dispatch(id, "click", EventPayload::default()).unwrap_err();
        assert_eq!(failure.message, "Error: nope");
        assert!(!handle.is_failed());
        assert!(handle.render().is_ok());
    }

    #[test]
    fn test_nested_failure_reports_component_stack() {
        let mut handle = prepare(
            "const Page = () => elem('main', null, elem(Section, null));\nconst Section = () => elem('div', null, elem(Leaf, null));\nconst Leaf = () => null.value;",
        );
        let failure = handle.render().unwrap_err();
        assert_eq!(failure.message, "TypeError: Cannot read properties of null (reading 'value')");
        assert_eq!(
            failure.component_stack,
            vec!["Leaf".to_string(), "Section".to_string(), "Page".to_string()]
        );
        assert_eq!(failure.to_string(), "TypeError: Cannot read properties of null (reading 'value')\n    in Leaf\n    in Section\n    in Page");
    }

    #[test]
    fn test_hook_count_change_is_render_error() {
        let mut handle = rendered(
            "const Flaky = () => {\n  const [on, setOn] = useState(false);\n  if (on) { useState(1); }\n  return elem('button', { onClick: () => setOn(true) }, 'go');\n};",
        );
        let id = tree(&handle).find_by_tag("button").unwrap().id;
        let failure = handle.dispatch(id, "click", EventPayload::default()).unwrap_err();
        assert_eq!(failure.message, "Error: Rendered more hooks than during the previous render.");
    }

    #[test]
    fn test_hooks_outside_render_are_rejected() {
        let failure = PreviewPipeline::default()
            .prepare(&ComponentArtifact::from_code("const [x] = useState(0);\nconst A = () => elem('p', null, x);"))
            .unwrap_err();
        match failure.error {
            PipelineError::Synthesis(SynthesisError::Runtime(message)) => {
                assert!(message.starts_with("Error: Invalid hook call"), "{}", message)
            }
            other => panic!("expected runtime synthesis error, got {:?}", other),
        }
    }
}
