//! Render Guard
//!
//! Wraps a resolved component and owns everything needed to render it: the
//! execution scope it was synthesized in, its hook store, and the last
//! rendered tree. Failures raised while rendering (including child components,
//! effects and update loops) are caught here and exposed as a
//! [`RenderFailure`]; the guard then stays failed until [`ComponentHandle::reset`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::{ExecutionLimits, PreviewConfig};
use crate::element::{ElementDescriptor, ElementType};
use crate::hooks::{self, HookStore};
use crate::interp::{Interpreter, Interrupt};
use crate::render::{escape_text, NodeId, RenderFault, RenderTree, Renderer};
use crate::scope::ExecutionScope;
use crate::value::{NativeKind, PropertyMap, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFailure {
    pub message: String,
    /// Innermost component first.
    pub component_stack: Vec<String>,
}

impl RenderFailure {
    fn from_fault(fault: RenderFault) -> Self {
        Self {
            message: fault.interrupt.message(),
            component_stack: fault.component_stack,
        }
    }

    fn at_root(interrupt: Interrupt, component: &str) -> Self {
        Self {
            message: interrupt.message(),
            component_stack: vec![component.to_string()],
        }
    }
}

impl std::fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        for component in &self.component_stack {
            write!(f, "\n    in {}", component)?;
        }
        Ok(())
    }
}

/// Event data supplied by the host when dispatching an interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventPayload {
    pub value: Option<String>,
    pub checked: Option<bool>,
}

impl EventPayload {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            checked: None,
        }
    }

    pub fn checked(checked: bool) -> Self {
        Self {
            value: None,
            checked: Some(checked),
        }
    }
}

pub struct ComponentHandle {
    name: String,
    component: Value,
    stylesheet: String,
    store: Rc<RefCell<HookStore>>,
    limits: ExecutionLimits,
    max_passes: usize,
    tree: Option<RenderTree>,
    handlers: HashMap<(NodeId, String), Value>,
    failure: Option<RenderFailure>,
    renders: usize,
    // Dropped last: the component's closures live in this scope.
    _scope: ExecutionScope,
}

impl ComponentHandle {
    pub fn new(
        name: String,
        component: Value,
        scope: ExecutionScope,
        stylesheet: String,
        config: &PreviewConfig,
    ) -> Self {
        Self {
            name,
            component,
            stylesheet,
            store: HookStore::shared(),
            limits: config.render_limits(),
            max_passes: config.max_render_passes.max(1),
            tree: None,
            handlers: HashMap::new(),
            failure: None,
            renders: 0,
            _scope: scope,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }

    pub fn tree(&self) -> Option<&RenderTree> {
        self.tree.as_ref()
    }

    pub fn failure(&self) -> Option<&RenderFailure> {
        self.failure.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Number of completed render passes since creation.
    pub fn render_count(&self) -> usize {
        self.renders
    }

    /// Render (or re-render) the component. A failed guard returns its
    /// recorded failure without rendering.
    pub fn render(&mut self) -> Result<&RenderTree, RenderFailure> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        if let Err(failure) = self.render_until_stable() {
            return Err(self.record_failure(failure));
        }
        match &self.tree {
            Some(tree) => Ok(tree),
            None => Err(RenderFailure::at_root(
                Interrupt::Budget("render produced no tree".to_string()),
                &self.name,
            )),
        }
    }

    /// Clear a recorded failure and all component state, then render afresh.
    pub fn reset(&mut self) -> Result<&RenderTree, RenderFailure> {
        let mut interp = Interpreter::new(self.limits);
        if let Err(interrupt) = hooks::unmount_all(&mut interp, &self.store) {
            tracing::warn!(component = %self.name, error = %interrupt.message(), "Cleanup failed during reset");
        }
        self.store = HookStore::shared();
        self.tree = None;
        self.handlers.clear();
        self.failure = None;
        tracing::debug!(component = %self.name, "Render guard reset");
        self.render()
    }

    /// Invoke the handler registered for `event` on `node`, then re-render if
    /// it scheduled an update.
    ///
    /// Returns `Ok(false)` when no handler is registered. An exception thrown
    /// by the handler itself is returned without failing the guard; a failure
    /// during the follow-up render fails it.
    pub fn dispatch(&mut self, node: NodeId, event: &str, payload: EventPayload) -> Result<bool, RenderFailure> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let event = event.to_ascii_lowercase();
        let Some(handler) = self.handlers.get(&(node, event.clone())).cloned() else {
            tracing::debug!(node, event = %event, "No handler registered");
            return Ok(false);
        };

        let mut interp = Interpreter::new(self.limits);
        self.store.borrow_mut().clear_dirty();
        if let Err(interrupt) = interp.call(&handler, vec![event_object(&event, &payload)]) {
            let failure = RenderFailure {
                message: interrupt.message(),
                component_stack: vec![self.name.clone()],
            };
            tracing::warn!(component = %self.name, node, event = %event, error = %failure.message, "Event handler threw");
            return Err(failure);
        }

        if self.store.borrow().is_dirty() {
            if let Err(failure) = self.render_until_stable() {
                return Err(self.record_failure(failure));
            }
        }
        Ok(true)
    }

    /// HTML for the current state: the rendered tree, or the error panel when
    /// the guard has failed.
    pub fn to_html(&self) -> String {
        if let Some(failure) = &self.failure {
            let stack = failure
                .component_stack
                .iter()
                .map(|c| format!("in {}", c))
                .collect::<Vec<_>>()
                .join("\n");
            return format!(
                "<div class=\"preview-error\" role=\"alert\"><strong>Component Error</strong><pre>{}</pre><pre>{}</pre></div>",
                escape_text(&failure.message),
                escape_text(&stack)
            );
        }
        match &self.tree {
            Some(tree) => tree.to_html(&self.stylesheet),
            None => String::new(),
        }
    }

    fn record_failure(&mut self, failure: RenderFailure) -> RenderFailure {
        tracing::warn!(
            component = %self.name,
            error = %failure.message,
            stack = ?failure.component_stack,
            "Render failed"
        );
        self.tree = None;
        self.handlers.clear();
        self.failure = Some(failure.clone());
        failure
    }

    fn render_until_stable(&mut self) -> Result<(), RenderFailure> {
        let root = Value::Element(Rc::new(ElementDescriptor {
            element_type: ElementType::Component(self.component.clone()),
            props: PropertyMap::new(),
            key: None,
        }));

        for pass in 0..self.max_passes {
            let mut interp = Interpreter::new(self.limits);
            self.store.borrow_mut().clear_dirty();

            let output = Renderer::new(&mut interp, &self.store)
                .render_root(&root)
                .map_err(RenderFailure::from_fault)?;
            hooks::unmount_unseen(&mut interp, &self.store, &output.seen)
                .map_err(|i| RenderFailure::at_root(i, &self.name))?;
            self.tree = Some(output.tree);
            self.handlers = output.handlers;
            self.renders += 1;

            hooks::flush_effects(&mut interp, &self.store)
                .map_err(|i| RenderFailure::at_root(i, &self.name))?;

            if !self.store.borrow().is_dirty() {
                tracing::debug!(component = %self.name, pass, steps = interp.steps(), "Render committed");
                return Ok(());
            }
        }

        Err(RenderFailure {
            message: "Too many re-renders. The number of renders is limited to prevent an infinite loop."
                .to_string(),
            component_stack: vec![self.name.clone()],
        })
    }
}

impl std::fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("name", &self.name)
            .field("renders", &self.renders)
            .field("failure", &self.failure)
            .finish()
    }
}

fn event_object(event: &str, payload: &EventPayload) -> Value {
    let mut target = PropertyMap::new();
    target.insert(
        "value",
        Value::str(payload.value.as_deref().unwrap_or("")),
    );
    target.insert("checked", Value::Bool(payload.checked.unwrap_or(false)));
    let target = Value::object(target);

    let mut map = PropertyMap::new();
    map.insert("type", Value::str(event));
    map.insert("target", target.clone());
    map.insert("currentTarget", target);
    map.insert("preventDefault", Value::native("preventDefault", NativeKind::Noop));
    map.insert("stopPropagation", Value::native("stopPropagation", NativeKind::Noop));
    Value::object(map)
}
