//! Execution scopes for sandboxed component code.
//!
//! Every artifact gets a fresh [`ExecutionScope`]: a root frame holding only
//! the whitelisted rendering primitives and pure intrinsics, and a module
//! frame holding the program's own declarations. Nothing from the host
//! process is reachable from either frame.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::value::{release, NativeKind, Primitive, PropertyMap, Value};

lazy_static::lazy_static! {
    /// Names bound in the root frame of every execution scope.
    pub static ref PREVIEW_GLOBALS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        // Rendering primitives
        s.insert("React");
        s.insert("createElement");
        s.insert("elem");
        s.insert("h");
        s.insert("Fragment");
        s.insert("useState");
        s.insert("useEffect");
        s.insert("useMemo");
        s.insert("useCallback");
        s.insert("useRef");

        // Pure intrinsics
        s.insert("Math");
        s.insert("JSON");
        s.insert("String");
        s.insert("Number");
        s.insert("Boolean");
        s.insert("Array");
        s.insert("Object");
        s.insert("parseInt");
        s.insert("parseFloat");
        s.insert("isNaN");
        s.insert("isFinite");
        s.insert("Error");
        s.insert("TypeError");
        s.insert("RangeError");
        s.insert("undefined");
        s.insert("NaN");
        s.insert("Infinity");

        // Log-only
        s.insert("console");
        s
    };
}

const MATH_FUNCTIONS: &[&str] = &[
    "max", "min", "floor", "ceil", "round", "abs", "sqrt", "pow", "trunc", "sign", "random",
];

pub type Env = Rc<Frame>;

#[derive(Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    Undeclared,
    Constant,
}

/// One lexical frame. Function and module frames also receive `var` bindings.
pub struct Frame {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Env>,
    function_scope: bool,
}

impl Frame {
    pub fn root() -> Env {
        Rc::new(Frame {
            vars: RefCell::new(HashMap::new()),
            parent: None,
            function_scope: true,
        })
    }

    pub fn block(parent: &Env) -> Env {
        Rc::new(Frame {
            vars: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
            function_scope: false,
        })
    }

    pub fn function(parent: &Env) -> Env {
        Rc::new(Frame {
            vars: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
            function_scope: true,
        })
    }

    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.vars
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// Declare a `var` in the nearest function (or module) frame.
    pub fn declare_var(self: &Rc<Self>, name: &str, value: Value) {
        let mut frame = Rc::clone(self);
        while !frame.function_scope {
            match &frame.parent {
                Some(parent) => frame = Rc::clone(parent),
                None => break,
            }
        }
        frame.declare(name, value, true);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.vars.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Binding declared directly in this frame, ignoring parents.
    pub fn own(&self, name: &str) -> Option<Value> {
        self.vars.borrow().get(name).map(|b| b.value.clone())
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<(), AssignError> {
        let mut vars = self.vars.borrow_mut();
        if let Some(binding) = vars.get_mut(name) {
            if !binding.mutable {
                return Err(AssignError::Constant);
            }
            let previous = std::mem::replace(&mut binding.value, value);
            drop(vars);
            release([previous]);
            return Ok(());
        }
        drop(vars);
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(AssignError::Undeclared),
        }
    }

    /// Empties the frame, handing back what its bindings held.
    pub(crate) fn take_values(&self) -> Vec<Value> {
        self.vars.borrow_mut().drain().map(|(_, b)| b.value).collect()
    }

    fn clear(&self) {
        release(self.take_values());
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        release(self.vars.get_mut().drain().map(|(_, b)| b.value));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXECUTION SCOPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Isolated namespace for one artifact. Never reused across artifacts.
pub struct ExecutionScope {
    root: Env,
    module: Env,
}

impl ExecutionScope {
    pub fn new() -> Self {
        let root = Frame::root();
        install_globals(&root);
        let module = Frame::function(&root);
        Self { root, module }
    }

    pub fn module(&self) -> &Env {
        &self.module
    }

    /// A name the program itself declared at top level. Primitives are never
    /// returned here, so `useState` cannot be mistaken for a component.
    pub fn declared(&self, name: &str) -> Option<Value> {
        self.module.own(name)
    }
}

impl Default for ExecutionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ExecutionScope {
    // Closures hold their environment, and top-level environments hold the
    // closures; clearing the frames releases those cycles.
    fn drop(&mut self) {
        self.module.clear();
        self.root.clear();
    }
}

fn primitive(name: &str, primitive: Primitive) -> Value {
    Value::native(name, NativeKind::Primitive(primitive))
}

fn namespace(prefix: &str, members: &[&str]) -> PropertyMap {
    let mut map = PropertyMap::new();
    for member in members {
        map.insert(*member, Value::intrinsic(&format!("{}.{}", prefix, member)));
    }
    map
}

fn install_globals(root: &Env) {
    let create_element = primitive("createElement", Primitive::CreateElement);
    let fragment = Value::native("Fragment", NativeKind::Fragment);
    let hooks = [
        ("useState", Primitive::UseState),
        ("useEffect", Primitive::UseEffect),
        ("useMemo", Primitive::UseMemo),
        ("useCallback", Primitive::UseCallback),
        ("useRef", Primitive::UseRef),
    ];

    let mut react = PropertyMap::new();
    react.insert("createElement", create_element.clone());
    react.insert("Fragment", fragment.clone());
    for (name, hook) in hooks {
        let value = primitive(name, hook);
        react.insert(name, value.clone());
        root.declare(name, value, false);
    }
    root.declare("React", Value::object(react), false);
    root.declare("createElement", create_element.clone(), false);
    root.declare("elem", create_element.clone(), false);
    root.declare("h", create_element, false);
    root.declare("Fragment", fragment, false);

    let mut math = namespace("Math", MATH_FUNCTIONS);
    math.insert("PI", Value::Number(std::f64::consts::PI));
    math.insert("E", Value::Number(std::f64::consts::E));
    root.declare("Math", Value::object(math), false);

    root.declare("JSON", Value::object(namespace("JSON", &["stringify", "parse"])), false);
    root.declare("Array", Value::object(namespace("Array", &["isArray", "from", "of"])), false);
    root.declare(
        "Object",
        Value::object(namespace("Object", &["keys", "values", "entries", "assign", "freeze"])),
        false,
    );
    root.declare(
        "console",
        Value::object(namespace("console", &["log", "info", "warn", "error", "debug"])),
        false,
    );

    for name in [
        "String", "Number", "Boolean", "parseInt", "parseFloat", "isNaN", "isFinite", "Error",
        "TypeError", "RangeError",
    ] {
        root.declare(name, Value::intrinsic(name), false);
    }

    root.declare("undefined", Value::Undefined, false);
    root.declare("NaN", Value::Number(f64::NAN), false);
    root.declare("Infinity", Value::Number(f64::INFINITY), false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_frame_matches_global_whitelist() {
        let scope = ExecutionScope::new();
        for name in PREVIEW_GLOBALS.iter() {
            assert!(scope.module().lookup(name).is_some(), "missing global {}", name);
        }
        assert!(scope.module().lookup("fetch").is_none());
        assert!(scope.module().lookup("window").is_none());
        assert!(scope.module().lookup("localStorage").is_none());
    }

    #[test]
    fn test_declared_ignores_primitives() {
        let scope = ExecutionScope::new();
        assert!(scope.declared("useState").is_none());
        scope.module().declare("Card", Value::Null, false);
        assert!(scope.declared("Card").is_some());
    }

    #[test]
    fn test_var_hoists_to_function_frame() {
        let scope = ExecutionScope::new();
        let block = Frame::block(scope.module());
        block.declare_var("count", Value::Number(1.0));
        assert!(scope.declared("count").is_some());
    }

    #[test]
    fn test_const_assignment_rejected() {
        let frame = Frame::root();
        frame.declare("x", Value::Number(1.0), false);
        assert_eq!(frame.assign("x", Value::Null), Err(AssignError::Constant));
        assert_eq!(frame.assign("y", Value::Null), Err(AssignError::Undeclared));
    }
}
