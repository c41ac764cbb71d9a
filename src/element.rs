//! Element descriptors produced by `createElement`.

use std::rc::Rc;

use crate::value::{PropertyMap, Value};

#[derive(Clone)]
pub enum ElementType {
    /// Host element such as `div` or `button`.
    Intrinsic(Rc<str>),
    /// User component function.
    Component(Value),
    Fragment,
}

/// Immutable description of one element: what to render, with which props.
///
/// `props.children` follows the usual convention: absent for no children,
/// the child itself for one, an array for several.
pub struct ElementDescriptor {
    pub element_type: ElementType,
    pub props: PropertyMap,
    pub key: Option<Rc<str>>,
}

impl ElementDescriptor {
    pub fn type_name(&self) -> String {
        match &self.element_type {
            ElementType::Intrinsic(tag) => tag.to_string(),
            ElementType::Component(component) => component
                .function_name()
                .unwrap_or_else(|| "Anonymous".to_string()),
            ElementType::Fragment => "Fragment".to_string(),
        }
    }

    /// True when this element renders the given component value.
    pub fn is_component(&self, component: &Value) -> bool {
        match &self.element_type {
            ElementType::Component(inner) => crate::value::strict_equals(inner, component),
            _ => false,
        }
    }

    pub fn children(&self) -> Value {
        self.props.get("children").cloned().unwrap_or(Value::Undefined)
    }
}

/// Build a descriptor from `createElement(type, props, ...children)` arguments.
///
/// Returns `None` when `element_type` is not a string tag, component function
/// or `Fragment`.
pub fn create_element(element_type: &Value, props: &Value, children: Vec<Value>) -> Option<ElementDescriptor> {
    let element_type = match element_type {
        Value::Str(tag) if !tag.is_empty() => ElementType::Intrinsic(Rc::clone(tag)),
        Value::Function(_) => ElementType::Component(element_type.clone()),
        Value::Native(native) if matches!(native.kind, crate::value::NativeKind::Fragment) => {
            ElementType::Fragment
        }
        _ => return None,
    };

    let mut map = match props {
        Value::Object(object) => object.borrow().clone(),
        _ => PropertyMap::new(),
    };

    let key = match map.remove("key") {
        Some(Value::Str(key)) => Some(key),
        Some(Value::Number(n)) => Some(Rc::from(crate::value::number_to_string(n))),
        _ => None,
    };

    match children.len() {
        0 => {}
        1 => {
            if let Some(child) = children.into_iter().next() {
                map.insert("children", child);
            }
        }
        _ => map.insert("children", Value::array(children)),
    }

    Some(ElementDescriptor {
        element_type,
        props: map,
        key,
    })
}
