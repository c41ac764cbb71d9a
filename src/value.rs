//! Runtime values for the preview interpreter.
//!
//! Values follow JavaScript semantics closely enough for generated component
//! code: primitives compare by value, arrays/objects/functions by identity,
//! and the conversions below mirror the language's `ToNumber`, `ToString`
//! and truthiness rules.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::ast::FunctionDef;
use crate::element::{ElementDescriptor, ElementType};
use crate::hooks::HookStore;
use crate::scope::Env;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

const MAX_JOIN_DEPTH: usize = 64;
const MAX_JOIN_LEN: usize = 1 << 20;
pub type ObjectRef = Rc<RefCell<PropertyMap>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Rc<Closure>),
    Native(Rc<NativeFunction>),
    Element(Rc<ElementDescriptor>),
}

// ═══════════════════════════════════════════════════════════════════════════════
// OBJECTS & FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Insertion-ordered property storage.
#[derive(Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(Rc<str>, Value)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| &**k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| &**k == key)
    }

    pub fn insert(&mut self, key: impl Into<Rc<str>>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| &**k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Rc<str>> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_values(self) -> impl Iterator<Item = Value> {
        self.entries.into_iter().map(|(_, v)| v)
    }
}

impl FromIterator<(Rc<str>, Value)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (Rc<str>, Value)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// A user-defined function closed over its defining environment.
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub env: Env,
}

/// A host function visible to sandboxed code.
pub struct NativeFunction {
    pub name: Rc<str>,
    pub kind: NativeKind,
    /// Receiver for bound methods such as `items.map`.
    pub receiver: Option<Value>,
}

pub enum NativeKind {
    Primitive(Primitive),
    SetState(StateSetter),
    /// Method on the receiver, dispatched by name.
    Method,
    /// Free-standing intrinsic (`Math.max`, `JSON.stringify`, ...), dispatched by name.
    Intrinsic,
    /// Marker type for `React.Fragment`; not callable.
    Fragment,
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    CreateElement,
    UseState,
    UseEffect,
    UseMemo,
    UseCallback,
    UseRef,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::CreateElement => "createElement",
            Primitive::UseState => "useState",
            Primitive::UseEffect => "useEffect",
            Primitive::UseMemo => "useMemo",
            Primitive::UseCallback => "useCallback",
            Primitive::UseRef => "useRef",
        }
    }

    pub fn is_hook(self) -> bool {
        !matches!(self, Primitive::CreateElement)
    }
}

/// Setter returned by `useState`; holds the store weakly so state values that
/// capture their own setter do not keep the store alive.
pub struct StateSetter {
    pub store: Weak<RefCell<HookStore>>,
    pub instance: Rc<str>,
    pub slot: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTRUCTORS & ACCESSORS
// ═══════════════════════════════════════════════════════════════════════════════

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn string(s: String) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(map: PropertyMap) -> Value {
        Value::Object(Rc::new(RefCell::new(map)))
    }

    pub fn native(name: &str, kind: NativeKind) -> Value {
        Value::Native(Rc::new(NativeFunction {
            name: Rc::from(name),
            kind,
            receiver: None,
        }))
    }

    pub fn method(name: &str, receiver: Value) -> Value {
        Value::Native(Rc::new(NativeFunction {
            name: Rc::from(name),
            kind: NativeKind::Method,
            receiver: Some(receiver),
        }))
    }

    pub fn intrinsic(name: &str) -> Value {
        Value::native(name, NativeKind::Intrinsic)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        match self {
            Value::Function(_) => true,
            Value::Native(native) => !matches!(native.kind, NativeKind::Fragment),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Element(_) => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Array(items) => {
                let items = items.borrow();
                match items.len() {
                    0 => 0.0,
                    1 => items[0].to_number(),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    /// `ToString`. Arrays join recursively; cyclic arrays render as empty.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Array(_) => {
                let mut out = String::new();
                self.join_into(&mut out, &mut Vec::new());
                out
            }
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::Str(s) => s.to_string(),
            Value::Object(_) | Value::Element(_) => "[object Object]".to_string(),
            Value::Function(closure) => format!("function {}() {{ ... }}", closure.def.display_name()),
            Value::Native(native) => format!("function {}() {{ [native code] }}", native.name),
        }
    }

    /// Array-to-string conversion. An array already being joined converts to
    /// the empty string, and output stops growing past `MAX_JOIN_LEN`.
    fn join_into(&self, out: &mut String, open: &mut Vec<*const RefCell<Vec<Value>>>) {
        let Value::Array(items) = self else {
            out.push_str(&self.to_js_string());
            return;
        };
        let ptr = Rc::as_ptr(items);
        if open.len() >= MAX_JOIN_DEPTH || open.contains(&ptr) {
            return;
        }
        let Ok(items) = items.try_borrow() else {
            return;
        };
        open.push(ptr);
        for (i, item) in items.iter().enumerate() {
            if out.len() > MAX_JOIN_LEN {
                break;
            }
            if i > 0 {
                out.push(',');
            }
            if !item.is_nullish() {
                item.join_into(out, open);
            }
        }
        open.pop();
    }

    /// Function name used in diagnostics and component stacks.
    pub fn function_name(&self) -> Option<String> {
        match self {
            Value::Function(closure) => Some(closure.def.display_name().to_string()),
            Value::Native(native) => Some(native.name.to_string()),
            _ => None,
        }
    }
}

/// Drops values without recursing into them. Arrays nested thousands deep,
/// or closures chained through their environments, are taken apart on a
/// worklist instead of the stack.
pub fn release(values: impl IntoIterator<Item = Value>) {
    let mut pending: Vec<Value> = values.into_iter().collect();
    while let Some(value) = pending.pop() {
        match value {
            Value::Array(items) => {
                if let Ok(items) = Rc::try_unwrap(items) {
                    pending.extend(items.into_inner());
                }
            }
            Value::Object(map) => {
                if let Ok(map) = Rc::try_unwrap(map) {
                    pending.extend(map.into_inner().into_values());
                }
            }
            Value::Element(desc) => {
                if let Ok(desc) = Rc::try_unwrap(desc) {
                    if let ElementType::Component(component) = desc.element_type {
                        pending.push(component);
                    }
                    pending.extend(desc.props.into_values());
                }
            }
            Value::Function(closure) => {
                if let Ok(closure) = Rc::try_unwrap(closure) {
                    if let Ok(frame) = Rc::try_unwrap(closure.env) {
                        pending.extend(frame.take_values());
                    }
                }
            }
            _ => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EQUALITY
// ═══════════════════════════════════════════════════════════════════════════════

/// `===`
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        _ => same_reference(a, b),
    }
}

/// `==`
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Number(_), Value::Str(_))
        | (Value::Str(_), Value::Number(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_)) => {
            if matches!((a, b), (Value::Bool(_), Value::Bool(_))) {
                return strict_equals(a, b);
            }
            a.to_number() == b.to_number()
        }
        _ => strict_equals(a, b),
    }
}

/// `Object.is`, used for hook dependency and state comparisons.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            (x.is_nan() && y.is_nan()) || (x == y && x.is_sign_negative() == y.is_sign_negative())
        }
        _ => strict_equals(a, b),
    }
}

fn same_reference(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Native(x), Value::Native(y)) => {
            Rc::ptr_eq(x, y)
                || (x.name == y.name
                    && x.receiver.is_none()
                    && y.receiver.is_none()
                    && matches!(
                        (&x.kind, &y.kind),
                        (NativeKind::Intrinsic, NativeKind::Intrinsic) | (NativeKind::Fragment, NativeKind::Fragment)
                    ))
        }
        (Value::Element(x), Value::Element(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NUMBER CONVERSIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map(|v| v as f64).unwrap_or(f64::NAN);
    }
    let numeric = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !numeric {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// `ToInt32`, for bitwise operators.
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() as i64 & 0xFFFF_FFFF) as u32 as i32
}

pub fn to_uint32(n: f64) -> u32 {
    to_int32(n) as u32
}

/// Array index for a property key, if it is one.
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse::<usize>().ok()
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Array(items) => match items.try_borrow() {
                Ok(items) => write!(f, "Array({})", items.len()),
                Err(_) => write!(f, "Array(<borrowed>)"),
            },
            Value::Object(map) => match map.try_borrow() {
                Ok(map) => {
                    let keys: Vec<&str> = map.keys().map(|k| &**k).collect();
                    write!(f, "Object{{{}}}", keys.join(", "))
                }
                Err(_) => write!(f, "Object(<borrowed>)"),
            },
            Value::Function(closure) => write!(f, "Function({})", closure.def.display_name()),
            Value::Native(native) => write!(f, "Native({})", native.name),
            Value::Element(desc) => write!(f, "Element({})", desc.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(2.5), "2.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
    }

    #[test]
    fn test_equality_rules() {
        assert!(loose_equals(&Value::Null, &Value::Undefined));
        assert!(!strict_equals(&Value::Null, &Value::Undefined));
        assert!(loose_equals(&Value::str("1"), &Value::Number(1.0)));
        assert!(!strict_equals(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(same_value(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));

        let a = Value::array(vec![]);
        assert!(strict_equals(&a, &a.clone()));
        assert!(!strict_equals(&a, &Value::array(vec![])));
    }

    #[test]
    fn test_truthiness_and_typeof() {
        assert!(!Value::str("").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::intrinsic("Math.max").type_of(), "function");
    }

    #[test]
    fn test_property_map_keeps_insertion_order() {
        let mut map = PropertyMap::new();
        map.insert("b", Value::Number(1.0));
        map.insert("a", Value::Number(2.0));
        map.insert("b", Value::Number(3.0));
        let keys: Vec<&str> = map.keys().map(|k| &**k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(map.get("b").map(|v| v.to_number()), Some(3.0));
    }
}
