//! Render tree expansion and HTML serialization.
//!
//! Expands element descriptors into a [`RenderTree`] by invoking component
//! functions with a per-instance hook context. Instances are identified by
//! their position (or `key`) in the tree, so state survives re-renders as long
//! as the structure does.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use serde::Serialize;

use crate::element::{ElementDescriptor, ElementType};
use crate::hooks::{HookStore, RenderContext};
use crate::interp::{Interpreter, Interrupt};
use crate::value::{number_to_string, PropertyMap, Value};

pub type NodeId = u32;

lazy_static::lazy_static! {
    static ref TAG_NAME: regex::Regex = regex::Regex::new(r"^[a-zA-Z][a-zA-Z0-9-]*$").unwrap();

    /// Elements that could execute code or escape the preview frame.
    static ref BLOCKED_TAGS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("script");
        s.insert("iframe");
        s.insert("object");
        s.insert("embed");
        s.insert("frame");
        s.insert("frameset");
        s.insert("base");
        s.insert("meta");
        s.insert("link");
        s
    };

    static ref VOID_TAGS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for tag in ["area", "br", "col", "hr", "img", "input", "source", "track", "wbr"] {
            s.insert(tag);
        }
        s
    };

    /// Numeric style properties that take no `px` suffix.
    static ref UNITLESS_STYLES: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for prop in [
            "opacity", "zIndex", "fontWeight", "lineHeight", "flex", "flexGrow", "flexShrink",
            "order", "zoom", "gridRow", "gridColumn", "columnCount", "fillOpacity",
            "strokeOpacity", "tabSize", "aspectRatio",
        ] {
            s.insert(prop);
        }
        s
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    /// Boolean attribute present without a value (`disabled`).
    Flag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub id: NodeId,
    pub tag: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Event names with a registered handler (`click`, `change`, ...).
    pub events: Vec<String>,
    pub children: Vec<RenderNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RenderNode {
    Element(ElementNode),
    Text { text: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderTree {
    pub nodes: Vec<RenderNode>,
}

impl RenderTree {
    /// Depth-first list of elements.
    pub fn elements(&self) -> Vec<&ElementNode> {
        fn walk<'t>(nodes: &'t [RenderNode], out: &mut Vec<&'t ElementNode>) {
            for node in nodes {
                if let RenderNode::Element(element) = node {
                    out.push(element);
                    walk(&element.children, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }

    pub fn find(&self, id: NodeId) -> Option<&ElementNode> {
        self.elements().into_iter().find(|e| e.id == id)
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<&ElementNode> {
        self.elements().into_iter().find(|e| e.tag == tag)
    }

    /// Concatenated text content.
    pub fn text(&self) -> String {
        fn walk(nodes: &[RenderNode], out: &mut String) {
            for node in nodes {
                match node {
                    RenderNode::Text { text } => out.push_str(text),
                    RenderNode::Element(element) => walk(&element.children, out),
                }
            }
        }
        let mut out = String::new();
        walk(&self.nodes, &mut out);
        out
    }

    pub fn to_html(&self, stylesheet: &str) -> String {
        let mut out = String::new();
        if !stylesheet.trim().is_empty() {
            out.push_str("<style>");
            out.push_str(&stylesheet.replace("</", "<\\/"));
            out.push_str("</style>");
        }
        for node in &self.nodes {
            write_node(node, &mut out);
        }
        out
    }
}

impl ElementNode {
    pub fn text(&self) -> String {
        RenderTree {
            nodes: self.children.clone(),
        }
        .text()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self.attributes.get(name)? {
            AttributeValue::Text(value) => Some(value),
            AttributeValue::Flag => Some(""),
        }
    }
}

fn write_node(node: &RenderNode, out: &mut String) {
    match node {
        RenderNode::Text { text } => out.push_str(&escape_text(text)),
        RenderNode::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                if let AttributeValue::Text(value) = value {
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
            }
            if !element.events.is_empty() {
                out.push_str(&format!(" data-preview-id=\"{}\"", element.id));
            }
            out.push('>');
            if VOID_TAGS.contains(element.tag.as_str()) {
                return;
            }
            for child in &element.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attribute(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDERER
// ═══════════════════════════════════════════════════════════════════════════════

/// A render failure with the component stack at the point it was raised.
#[derive(Debug, Clone)]
pub struct RenderFault {
    pub interrupt: Interrupt,
    /// Innermost component first.
    pub component_stack: Vec<String>,
}

pub struct RenderOutput {
    pub tree: RenderTree,
    pub handlers: HashMap<(NodeId, String), Value>,
    pub seen: HashSet<Rc<str>>,
}

pub struct Renderer<'a> {
    interp: &'a mut Interpreter,
    store: &'a Rc<RefCell<HookStore>>,
    seen: HashSet<Rc<str>>,
    handlers: HashMap<(NodeId, String), Value>,
    next_id: NodeId,
    stack: Vec<String>,
}

impl<'a> Renderer<'a> {
    pub fn new(interp: &'a mut Interpreter, store: &'a Rc<RefCell<HookStore>>) -> Self {
        Self {
            interp,
            store,
            seen: HashSet::new(),
            handlers: HashMap::new(),
            next_id: 1,
            stack: Vec::new(),
        }
    }

    pub fn render_root(mut self, root: &Value) -> Result<RenderOutput, RenderFault> {
        let mut nodes = Vec::new();
        self.render_value(root, "0", &mut nodes)?;
        Ok(RenderOutput {
            tree: RenderTree { nodes },
            handlers: self.handlers,
            seen: self.seen,
        })
    }

    fn fault(&self, interrupt: Interrupt) -> RenderFault {
        RenderFault {
            interrupt,
            component_stack: self.stack.iter().rev().cloned().collect(),
        }
    }

    fn fail(&self, name: &str, message: String) -> RenderFault {
        self.fault(self.interp.throw(name, message))
    }

    fn render_value(&mut self, value: &Value, path: &str, out: &mut Vec<RenderNode>) -> Result<(), RenderFault> {
        self.interp.tick().map_err(|i| self.fault(i))?;
        match value {
            Value::Undefined | Value::Null | Value::Bool(_) => Ok(()),
            Value::Number(n) => {
                out.push(RenderNode::Text {
                    text: number_to_string(*n),
                });
                Ok(())
            }
            Value::Str(s) => {
                out.push(RenderNode::Text { text: s.to_string() });
                Ok(())
            }
            Value::Array(_) => self.render_children(value, path, out),
            Value::Element(desc) => self.render_element(desc, path, out),
            // Functions are not renderable; they are skipped silently.
            Value::Function(_) | Value::Native(_) => Ok(()),
            Value::Object(map) => {
                let keys: Vec<String> = map.borrow().keys().map(|k| k.to_string()).collect();
                Err(self.fail(
                    "Error",
                    format!(
                        "Objects are not valid as a React child (found: object with keys {{{}}})",
                        keys.join(", ")
                    ),
                ))
            }
        }
    }

    fn render_children(&mut self, children: &Value, path: &str, out: &mut Vec<RenderNode>) -> Result<(), RenderFault> {
        match children {
            Value::Array(items) => {
                let items = items.borrow().clone();
                for (i, child) in items.iter().enumerate() {
                    let segment = match child {
                        Value::Element(desc) => match &desc.key {
                            Some(key) => format!("${}", key),
                            None => i.to_string(),
                        },
                        _ => i.to_string(),
                    };
                    self.render_value(child, &format!("{}.{}", path, segment), out)?;
                }
                Ok(())
            }
            other => {
                let segment = match other {
                    Value::Element(desc) => desc
                        .key
                        .as_ref()
                        .map(|key| format!("${}", key))
                        .unwrap_or_else(|| "0".to_string()),
                    _ => "0".to_string(),
                };
                self.render_value(other, &format!("{}.{}", path, segment), out)
            }
        }
    }

    fn render_element(&mut self, desc: &ElementDescriptor, path: &str, out: &mut Vec<RenderNode>) -> Result<(), RenderFault> {
        match &desc.element_type {
            ElementType::Fragment => self.render_children(&desc.children(), path, out),
            ElementType::Intrinsic(tag) => self.render_intrinsic(tag, desc, path, out),
            ElementType::Component(component) => self.render_component(component, desc, path, out),
        }
    }

    fn render_component(
        &mut self,
        component: &Value,
        desc: &ElementDescriptor,
        path: &str,
        out: &mut Vec<RenderNode>,
    ) -> Result<(), RenderFault> {
        let name = desc.type_name();
        let instance: Rc<str> = Rc::from(format!("{}:{}", path, name));
        self.stack.push(name.clone());

        let context = RenderContext::begin(self.store, Rc::clone(&instance), &name);
        let previous = self.interp.enter_render(context);
        let result = self
            .interp
            .call(component, vec![Value::object(desc.props.clone())]);
        let context = self.interp.leave_render(previous);

        let output = result.map_err(|i| self.fault(i))?;
        if let Some(context) = context {
            context.finish().map_err(|message| self.fail("Error", message))?;
        }
        self.seen.insert(Rc::clone(&instance));

        self.render_value(&output, &instance, out)?;
        self.stack.pop();
        Ok(())
    }

    fn render_intrinsic(
        &mut self,
        tag: &str,
        desc: &ElementDescriptor,
        path: &str,
        out: &mut Vec<RenderNode>,
    ) -> Result<(), RenderFault> {
        if !TAG_NAME.is_match(tag) {
            return Err(self.fail("Error", format!("Invalid element name <{}>", tag)));
        }
        let tag = tag.to_ascii_lowercase();
        if BLOCKED_TAGS.contains(tag.as_str()) {
            return Err(self.fail(
                "Error",
                format!("<{}> elements are not allowed in previews", tag),
            ));
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut attributes = BTreeMap::new();
        let mut events = Vec::new();
        for (name, value) in desc.props.iter() {
            let name: &str = name;
            match name {
                "children" | "key" | "ref" | "dangerouslySetInnerHTML" => continue,
                _ => {}
            }
            if let Some(event) = event_name(name) {
                if value.is_callable() {
                    self.handlers.insert((id, event.clone()), value.clone());
                    events.push(event);
                }
                continue;
            }
            if name == "style" {
                if let Value::Object(style) = value {
                    let css = style_to_css(&style.borrow());
                    if !css.is_empty() {
                        attributes.insert("style".to_string(), AttributeValue::Text(css));
                    }
                    continue;
                }
            }
            let attribute = attribute_name(name);
            if let Some(value) = attribute_value(value) {
                if is_unsafe_url(&attribute, &value) {
                    tracing::warn!(attribute = %attribute, "Dropping script URL from preview element");
                    continue;
                }
                attributes.insert(attribute, value);
            }
        }

        let mut children = Vec::new();
        if !VOID_TAGS.contains(tag.as_str()) {
            self.render_children(&desc.children(), &format!("{}<{}>", path, tag), &mut children)?;
        }

        out.push(RenderNode::Element(ElementNode {
            id,
            tag,
            attributes,
            events,
            children,
        }));
        Ok(())
    }
}

/// `onClick` → `click`.
fn event_name(prop: &str) -> Option<String> {
    let rest = prop.strip_prefix("on")?;
    if rest.chars().next()?.is_ascii_uppercase() {
        Some(rest.to_ascii_lowercase())
    } else {
        None
    }
}

fn attribute_name(prop: &str) -> String {
    match prop {
        "className" => "class".to_string(),
        "htmlFor" => "for".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

fn attribute_value(value: &Value) -> Option<AttributeValue> {
    match value {
        Value::Str(s) => Some(AttributeValue::Text(s.to_string())),
        Value::Number(n) => Some(AttributeValue::Text(number_to_string(*n))),
        Value::Bool(true) => Some(AttributeValue::Flag),
        _ => None,
    }
}

fn is_unsafe_url(attribute: &str, value: &AttributeValue) -> bool {
    let AttributeValue::Text(text) = value else {
        return false;
    };
    matches!(attribute, "href" | "src" | "action" | "formaction")
        && text
            .trim_start()
            .to_ascii_lowercase()
            .starts_with("javascript:")
}

/// `{ backgroundColor: "red", padding: 4 }` → `background-color: red; padding: 4px`.
pub fn style_to_css(style: &PropertyMap) -> String {
    let mut declarations = Vec::new();
    for (prop, value) in style.iter() {
        let value = match value {
            Value::Str(s) => s.to_string(),
            Value::Number(n) if *n != 0.0 && !UNITLESS_STYLES.contains(&**prop) => {
                format!("{}px", number_to_string(*n))
            }
            Value::Number(n) => number_to_string(*n),
            _ => continue,
        };
        let name = if prop.starts_with("--") {
            prop.to_string()
        } else {
            let mut name = String::with_capacity(prop.len() + 4);
            for c in prop.chars() {
                if c.is_ascii_uppercase() {
                    name.push('-');
                    name.push(c.to_ascii_lowercase());
                } else {
                    name.push(c);
                }
            }
            name
        };
        declarations.push(format!("{}: {}", name, value));
    }
    declarations.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_to_css() {
        let mut style = PropertyMap::new();
        style.insert("backgroundColor", Value::str("red"));
        style.insert("padding", Value::Number(4.0));
        style.insert("opacity", Value::Number(0.5));
        style.insert("margin", Value::Number(0.0));
        style.insert("color", Value::Null);
        assert_eq!(
            style_to_css(&style),
            "background-color: red; padding: 4px; opacity: 0.5; margin: 0"
        );
    }

    #[test]
    fn test_event_and_attribute_names() {
        assert_eq!(event_name("onClick").as_deref(), Some("click"));
        assert_eq!(event_name("onMouseEnter").as_deref(), Some("mouseenter"));
        assert_eq!(event_name("once"), None);
        assert_eq!(attribute_name("className"), "class");
        assert_eq!(attribute_name("htmlFor"), "for");
        assert_eq!(attribute_name("tabIndex"), "tabindex");
    }

    #[test]
    fn test_html_escaping() {
        let tree = RenderTree {
            nodes: vec![RenderNode::Element(ElementNode {
                id: 1,
                tag: "p".to_string(),
                attributes: BTreeMap::from([(
                    "title".to_string(),
                    AttributeValue::Text("a \"b\"".to_string()),
                )]),
                events: vec![],
                children: vec![RenderNode::Text {
                    text: "<b>&</b>".to_string(),
                }],
            })],
        };
        assert_eq!(
            tree.to_html(""),
            "<p title=\"a &quot;b&quot;\">&lt;b&gt;&amp;&lt;/b&gt;</p>"
        );
    }

    #[test]
    fn test_stylesheet_cannot_close_style_block() {
        let html = RenderTree::default().to_html("p { color: red }</style><script>");
        assert!(html.starts_with("<style>"));
        assert_eq!(html.matches("</style>").count(), 1);
    }

    #[test]
    fn test_script_urls_detected() {
        assert!(is_unsafe_url("href", &AttributeValue::Text(" JavaScript:alert(1)".into())));
        assert!(!is_unsafe_url("href", &AttributeValue::Text("https://example.com".into())));
        assert!(!is_unsafe_url("title", &AttributeValue::Text("javascript:".into())));
    }
}
