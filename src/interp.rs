//! Tree-walking interpreter for the restricted component IR.
//!
//! The interpreter has no ambient authority: every name resolves through the
//! [`crate::scope`] frames, and the only host functions reachable are the
//! primitives and intrinsics installed there. Each run is bounded by
//! [`ExecutionLimits`]; exceeding any limit raises [`Interrupt::Budget`], which
//! user code cannot catch.

use std::rc::Rc;
use std::time::Instant;

use crate::ast::{
    AssignOp, BinaryOp, DeclKind, Expr, FunctionBody, Item, Key, Literal, LogicalOp, Pattern,
    Program, Property, Stmt, Target, UnaryOp,
};
use crate::builtins;
use crate::config::ExecutionLimits;
use crate::element;
use crate::hooks::{self, RenderContext};
use crate::scope::{AssignError, Env, Frame};
use crate::value::{
    array_index, loose_equals, number_to_string, strict_equals, to_int32, to_uint32, Closure,
    NativeKind, Primitive, PropertyMap, Value,
};

/// Abrupt completion of an evaluation.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// A value thrown by user code or by a failed language operation.
    Throw(Value),
    /// An execution limit was hit.
    Budget(String),
    /// An optional chain hit `null`/`undefined`; caught at the chain boundary.
    ShortCircuit,
}

impl Interrupt {
    pub fn message(&self) -> String {
        match self {
            Interrupt::Throw(value) => thrown_message(value),
            Interrupt::Budget(reason) => format!("Execution budget exceeded: {}", reason),
            Interrupt::ShortCircuit => "Optional chain escaped its expression".to_string(),
        }
    }
}

pub type Eval<T> = Result<T, Interrupt>;

enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

#[derive(Clone, Copy)]
enum BindMode {
    Declare(DeclKind),
    Param,
}

/// Evaluated assignment target.
enum Place {
    Binding(String),
    Property(Value, String),
}

pub struct Interpreter {
    limits: ExecutionLimits,
    deadline: Instant,
    steps: u64,
    depth: usize,
    /// Stack address when the interpreter was created; native stack use is
    /// measured from here.
    stack_base: usize,
    rng_state: u64,
    render: Option<RenderContext>,
}

#[inline(never)]
fn stack_address() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

impl Interpreter {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self {
            limits,
            deadline: Instant::now() + limits.budget,
            steps: 0,
            depth: 0,
            stack_base: stack_address(),
            rng_state: 0x9E37_79B9_7F4A_7C15,
            render: None,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BUDGET
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn tick(&mut self) -> Eval<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(Interrupt::Budget(format!(
                "more than {} evaluation steps",
                self.limits.max_steps
            )));
        }
        if stack_address().abs_diff(self.stack_base) > self.limits.max_stack_bytes {
            return Err(Interrupt::Budget(format!(
                "nesting uses more than {} KiB of stack",
                self.limits.max_stack_bytes / 1024
            )));
        }
        if self.steps % 1024 == 0 && Instant::now() > self.deadline {
            return Err(Interrupt::Budget(format!(
                "exceeded {} ms",
                self.limits.budget.as_millis()
            )));
        }
        Ok(())
    }

    pub(crate) fn check_collection(&self, len: usize) -> Eval<()> {
        if len > self.limits.max_collection_len {
            return Err(Interrupt::Budget(format!(
                "collection of {} items exceeds limit of {}",
                len, self.limits.max_collection_len
            )));
        }
        Ok(())
    }

    pub(crate) fn check_string(&self, len: usize) -> Eval<()> {
        if len > self.limits.max_string_len {
            return Err(Interrupt::Budget(format!(
                "string of {} bytes exceeds limit of {}",
                len, self.limits.max_string_len
            )));
        }
        Ok(())
    }

    pub(crate) fn throw(&self, name: &str, message: impl Into<String>) -> Interrupt {
        Interrupt::Throw(error_value(name, &message.into()))
    }

    /// Deterministic xorshift sequence backing `Math.random`.
    pub(crate) fn next_random(&mut self) -> f64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RENDER CONTEXT
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn enter_render(&mut self, context: RenderContext) -> Option<RenderContext> {
        self.render.replace(context)
    }

    pub(crate) fn leave_render(&mut self, previous: Option<RenderContext>) -> Option<RenderContext> {
        std::mem::replace(&mut self.render, previous)
    }

    pub(crate) fn render_context(&mut self) -> Option<&mut RenderContext> {
        self.render.as_mut()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn run_program(&mut self, program: &Program, env: &Env) -> Eval<()> {
        self.exec_statements(&program.body, env)?;
        Ok(())
    }

    fn exec_statements(&mut self, stmts: &[Stmt], env: &Env) -> Eval<Completion> {
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    let closure = Value::Function(Rc::new(Closure {
                        def: Rc::clone(def),
                        env: Rc::clone(env),
                    }));
                    env.declare(name, closure, true);
                }
            }
        }
        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> Eval<Completion> {
        self.tick()?;
        match stmt {
            Stmt::Declare { kind, declarations } => {
                for declarator in declarations {
                    let value = match &declarator.init {
                        Some(init) => self.eval(init, env)?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(&declarator.pattern, value, env, BindMode::Declare(*kind))?;
                }
                Ok(Completion::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Completion::Normal),
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Completion::Normal)
            }
            Stmt::Return(argument) => {
                let value = match argument {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.is_truthy() {
                    self.exec_stmt(consequent, env)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, env)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::Block(stmts) => {
                let frame = Frame::block(env);
                self.exec_statements(stmts, &frame)
            }
            Stmt::ForOf {
                kind,
                pattern,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, env)?;
                let items = self.iterate(&iterable)?;
                for item in items {
                    self.tick()?;
                    let frame = Frame::block(env);
                    self.bind_pattern(pattern, item, &frame, BindMode::Declare(*kind))?;
                    match self.exec_stmt(body, &frame)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let frame = Frame::block(env);
                if let Some(init) = init {
                    self.exec_stmt(init, &frame)?;
                }
                loop {
                    self.tick()?;
                    if let Some(test) = test {
                        if !self.eval(test, &frame)?.is_truthy() {
                            break;
                        }
                    }
                    match self.exec_stmt(body, &frame)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &frame)?;
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::While { test, body } => {
                loop {
                    self.tick()?;
                    if !self.eval(test, env)?.is_truthy() {
                        break;
                    }
                    match self.exec_stmt(body, env)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::Break => Ok(Completion::Break),
            Stmt::Continue => Ok(Completion::Continue),
            Stmt::Throw(expr) => {
                let value = self.eval(expr, env)?;
                Err(Interrupt::Throw(value))
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let frame = Frame::block(env);
                let mut result = self.exec_statements(block, &frame);
                let caught = match (&result, handler) {
                    (Err(Interrupt::Throw(thrown)), Some(handler)) => Some((thrown.clone(), handler)),
                    _ => None,
                };
                if let Some((thrown, handler)) = caught {
                    let frame = Frame::block(env);
                    result = match param {
                        Some(param) => self
                            .bind_pattern(param, thrown, &frame, BindMode::Declare(DeclKind::Let))
                            .and_then(|_| self.exec_statements(handler, &frame)),
                        None => self.exec_statements(handler, &frame),
                    };
                }
                if let Some(finalizer) = finalizer {
                    // Budget interrupts skip `finally` so cleanup code cannot extend a run.
                    if matches!(result, Err(Interrupt::Budget(_))) {
                        return result;
                    }
                    let frame = Frame::block(env);
                    match self.exec_statements(finalizer, &frame)? {
                        Completion::Normal => {}
                        other => return Ok(other),
                    }
                }
                result
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PATTERNS
    // ═══════════════════════════════════════════════════════════════════════════

    fn bind_pattern(&mut self, pattern: &Pattern, value: Value, env: &Env, mode: BindMode) -> Eval<()> {
        match pattern {
            Pattern::Ident(name) => {
                match mode {
                    BindMode::Declare(DeclKind::Var) => env.declare_var(name, value),
                    BindMode::Declare(kind) => env.declare(name, value, kind.is_mutable()),
                    BindMode::Param => env.declare(name, value, true),
                }
                Ok(())
            }
            Pattern::Default { target, value: default } => {
                let value = match value {
                    Value::Undefined => self.eval(default, env)?,
                    other => other,
                };
                self.bind_pattern(target, value, env, mode)
            }
            Pattern::Object { properties, rest } => {
                if value.is_nullish() {
                    return Err(self.throw(
                        "TypeError",
                        format!("Cannot destructure '{}' as it is {}.", value.to_js_string(), value.to_js_string()),
                    ));
                }
                let mut used = Vec::with_capacity(properties.len());
                for (key, target) in properties {
                    let name = self.key_string(key, env)?;
                    let property = self.get_property(&value, &name)?;
                    self.bind_pattern(target, property, env, mode)?;
                    used.push(name);
                }
                if let Some(rest_name) = rest {
                    let mut remaining = PropertyMap::new();
                    if let Value::Object(object) = &value {
                        for (k, v) in object.borrow().iter() {
                            if !used.iter().any(|u| u.as_str() == &**k) {
                                remaining.insert(Rc::clone(k), v.clone());
                            }
                        }
                    }
                    self.bind_pattern(&Pattern::Ident(rest_name.clone()), Value::object(remaining), env, mode)?;
                }
                Ok(())
            }
            Pattern::Array { elements, rest } => {
                let items = self.iterate(&value)?;
                for (i, element) in elements.iter().enumerate() {
                    if let Some(target) = element {
                        let item = items.get(i).cloned().unwrap_or(Value::Undefined);
                        self.bind_pattern(target, item, env, mode)?;
                    }
                }
                if let Some(rest) = rest {
                    let remaining: Vec<Value> = items.into_iter().skip(elements.len()).collect();
                    self.bind_pattern(rest, Value::array(remaining), env, mode)?;
                }
                Ok(())
            }
        }
    }

    /// Snapshot of the values produced by iterating `value`.
    pub(crate) fn iterate(&self, value: &Value) -> Eval<Vec<Value>> {
        match value {
            Value::Array(items) => Ok(items.borrow().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
            other => Err(self.throw(
                "TypeError",
                format!("{} is not iterable", other.to_js_string()),
            )),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPRESSIONS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn eval(&mut self, expr: &Expr, env: &Env) -> Eval<Value> {
        self.tick()?;
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::Str(Rc::clone(s)),
            }),
            Expr::Template { quasis, exprs } => {
                let mut out = quasis.first().cloned().unwrap_or_default();
                for (i, expr) in exprs.iter().enumerate() {
                    out.push_str(&self.eval(expr, env)?.to_js_string());
                    if let Some(quasi) = quasis.get(i + 1) {
                        out.push_str(quasi);
                    }
                    self.check_string(out.len())?;
                }
                Ok(Value::string(out))
            }
            Expr::Ident(name) => env
                .lookup(name)
                .ok_or_else(|| self.throw("ReferenceError", format!("{} is not defined", name))),
            Expr::Array(items) => {
                let values = self.eval_items(items, env)?;
                Ok(Value::array(values))
            }
            Expr::Object(properties) => {
                let mut map = PropertyMap::new();
                for property in properties {
                    match property {
                        Property::Entry(key, value) => {
                            let name = self.key_string(key, env)?;
                            let value = self.eval(value, env)?;
                            map.insert(name, value);
                        }
                        Property::Spread(expr) => {
                            let source = self.eval(expr, env)?;
                            spread_into(&mut map, &source);
                        }
                    }
                    self.check_collection(map.len())?;
                }
                Ok(Value::object(map))
            }
            Expr::Function(def) => Ok(Value::Function(Rc::new(Closure {
                def: Rc::clone(def),
                env: Rc::clone(env),
            }))),
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                let function = self.eval(callee, env)?;
                if *optional && function.is_nullish() {
                    return Err(Interrupt::ShortCircuit);
                }
                if !function.is_callable() {
                    return Err(self.throw("TypeError", format!("{} is not a function", describe(callee))));
                }
                let args = self.eval_items(args, env)?;
                self.call(&function, args)
            }
            Expr::New { callee, args } => {
                let constructor = env.lookup(callee);
                let args = self.eval_items(args, env)?;
                match constructor {
                    Some(Value::Native(native))
                        if matches!(native.kind, NativeKind::Intrinsic)
                            && matches!(&*native.name, "Error" | "TypeError" | "RangeError") =>
                    {
                        let message = args.first().map(|v| v.to_js_string()).unwrap_or_default();
                        Ok(error_value(&native.name, &message))
                    }
                    _ => Err(self.throw("TypeError", format!("{} is not a constructor", callee))),
                }
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let object = self.eval(object, env)?;
                if *optional && object.is_nullish() {
                    return Err(Interrupt::ShortCircuit);
                }
                let name = self.key_string(property, env)?;
                self.get_property(&object, &name)
            }
            Expr::Chain(inner) => match self.eval(inner, env) {
                Err(Interrupt::ShortCircuit) => Ok(Value::Undefined),
                other => other,
            },
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.is_truthy() {
                    self.eval(consequent, env)
                } else {
                    self.eval(alternate, env)
                }
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, env)?;
                let take_left = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Coalesce => !left.is_nullish(),
                };
                if take_left {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                self.binary(*op, &left, &right)
            }
            Expr::Unary { op, argument } => {
                if let (UnaryOp::Typeof, Expr::Ident(name)) = (op, argument.as_ref()) {
                    let value = env.lookup(name).unwrap_or(Value::Undefined);
                    return Ok(Value::str(value.type_of()));
                }
                let value = self.eval(argument, env)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::BitNot => Value::Number(!to_int32(value.to_number()) as f64),
                    UnaryOp::Typeof => Value::str(value.type_of()),
                    UnaryOp::Void => Value::Undefined,
                })
            }
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let place = self.resolve_place(target, env)?;
                let old = self.read_place(&place, env)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.write_place(place, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Assign { op, target, value } => {
                let place = self.resolve_place(target, env)?;
                let result = match op {
                    AssignOp::Assign => self.eval(value, env)?,
                    AssignOp::Arith(op) => {
                        let current = self.read_place(&place, env)?;
                        let rhs = self.eval(value, env)?;
                        self.binary(*op, &current, &rhs)?
                    }
                    AssignOp::Logical(op) => {
                        let current = self.read_place(&place, env)?;
                        let keep = match op {
                            LogicalOp::And => !current.is_truthy(),
                            LogicalOp::Or => current.is_truthy(),
                            LogicalOp::Coalesce => !current.is_nullish(),
                        };
                        if keep {
                            return Ok(current);
                        }
                        self.eval(value, env)?
                    }
                };
                self.write_place(place, result.clone(), env)?;
                Ok(result)
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, env)?;
                }
                Ok(last)
            }
        }
    }

    fn eval_items(&mut self, items: &[Item], env: &Env) -> Eval<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Item::Expr(expr) => values.push(self.eval(expr, env)?),
                Item::Spread(expr) => {
                    let source = self.eval(expr, env)?;
                    values.extend(self.iterate(&source)?);
                }
                Item::Hole => values.push(Value::Undefined),
            }
            self.check_collection(values.len())?;
        }
        Ok(values)
    }

    fn key_string(&mut self, key: &Key, env: &Env) -> Eval<String> {
        match key {
            Key::Static(name) => Ok(name.to_string()),
            Key::Computed(expr) => Ok(self.eval(expr, env)?.to_js_string()),
        }
    }

    fn resolve_place(&mut self, target: &Target, env: &Env) -> Eval<Place> {
        match target {
            Target::Ident(name) => Ok(Place::Binding(name.clone())),
            Target::Member { object, property } => {
                let object = self.eval(object, env)?;
                let key = self.key_string(property, env)?;
                Ok(Place::Property(object, key))
            }
        }
    }

    fn read_place(&mut self, place: &Place, env: &Env) -> Eval<Value> {
        match place {
            Place::Binding(name) => env
                .lookup(name)
                .ok_or_else(|| self.throw("ReferenceError", format!("{} is not defined", name))),
            Place::Property(object, key) => self.get_property(object, key),
        }
    }

    fn write_place(&mut self, place: Place, value: Value, env: &Env) -> Eval<()> {
        match place {
            Place::Binding(name) => env.assign(&name, value).map_err(|e| match e {
                AssignError::Undeclared => self.throw("ReferenceError", format!("{} is not defined", name)),
                AssignError::Constant => self.throw("TypeError", "Assignment to constant variable."),
            }),
            Place::Property(object, key) => self.set_property(&object, &key, value),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PROPERTIES
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn get_property(&self, object: &Value, key: &str) -> Eval<Value> {
        match object {
            Value::Undefined | Value::Null => Err(self.throw(
                "TypeError",
                format!(
                    "Cannot read properties of {} (reading '{}')",
                    object.to_js_string(),
                    key
                ),
            )),
            Value::Array(items) => {
                if key == "length" {
                    return Ok(Value::Number(items.borrow().len() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(items.borrow().get(index).cloned().unwrap_or(Value::Undefined));
                }
                Ok(builtins::bound_method(builtins::ARRAY_METHODS, key, object))
            }
            Value::Str(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map(|c| Value::string(c.to_string()))
                        .unwrap_or(Value::Undefined));
                }
                Ok(builtins::bound_method(builtins::STRING_METHODS, key, object))
            }
            Value::Number(_) => Ok(builtins::bound_method(builtins::NUMBER_METHODS, key, object)),
            Value::Bool(_) => Ok(builtins::bound_method(&["toString"], key, object)),
            Value::Object(map) => {
                if let Some(value) = map.borrow().get(key) {
                    return Ok(value.clone());
                }
                Ok(builtins::bound_method(builtins::OBJECT_METHODS, key, object))
            }
            Value::Element(desc) => Ok(match key {
                "props" => Value::object(desc.props.clone()),
                "key" => desc.key.clone().map(Value::Str).unwrap_or(Value::Null),
                "type" => match &desc.element_type {
                    element::ElementType::Intrinsic(tag) => Value::Str(Rc::clone(tag)),
                    element::ElementType::Component(component) => component.clone(),
                    element::ElementType::Fragment => Value::native("Fragment", NativeKind::Fragment),
                },
                _ => Value::Undefined,
            }),
            Value::Function(closure) => Ok(match key {
                "name" => Value::str(closure.def.display_name()),
                "length" => Value::Number(closure.def.params.len() as f64),
                _ => Value::Undefined,
            }),
            Value::Native(native) => Ok(match key {
                "name" => Value::Str(Rc::clone(&native.name)),
                _ => Value::Undefined,
            }),
        }
    }

    pub(crate) fn set_property(&self, object: &Value, key: &str, value: Value) -> Eval<()> {
        match object {
            Value::Undefined | Value::Null => Err(self.throw(
                "TypeError",
                format!(
                    "Cannot set properties of {} (setting '{}')",
                    object.to_js_string(),
                    key
                ),
            )),
            Value::Array(items) => {
                if key == "length" {
                    let len = value.to_number();
                    if len < 0.0 || len.fract() != 0.0 {
                        return Err(self.throw("RangeError", "Invalid array length"));
                    }
                    let len = len as usize;
                    self.check_collection(len)?;
                    items.borrow_mut().resize(len, Value::Undefined);
                } else if let Some(index) = array_index(key) {
                    self.check_collection(index + 1)?;
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
                Ok(())
            }
            Value::Object(map) => {
                let mut map = map.borrow_mut();
                map.insert(key, value);
                self.check_collection(map.len())
            }
            _ => Ok(()),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OPERATORS
    // ═══════════════════════════════════════════════════════════════════════════

    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> Eval<Value> {
        let num = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
        Ok(match op {
            BinaryOp::Add => {
                if is_string_like(left) || is_string_like(right) {
                    let mut out = left.to_js_string();
                    out.push_str(&right.to_js_string());
                    self.check_string(out.len())?;
                    Value::string(out)
                } else {
                    num(|a, b| a + b)
                }
            }
            BinaryOp::Sub => num(|a, b| a - b),
            BinaryOp::Mul => num(|a, b| a * b),
            BinaryOp::Div => num(|a, b| a / b),
            BinaryOp::Rem => num(|a, b| a % b),
            BinaryOp::Exp => num(f64::powf),
            BinaryOp::Eq => Value::Bool(loose_equals(left, right)),
            BinaryOp::NotEq => Value::Bool(!loose_equals(left, right)),
            BinaryOp::StrictEq => Value::Bool(strict_equals(left, right)),
            BinaryOp::StrictNotEq => Value::Bool(!strict_equals(left, right)),
            BinaryOp::Lt => Value::Bool(compare(left, right, |o| o.is_lt())),
            BinaryOp::LtEq => Value::Bool(compare(left, right, |o| o.is_le())),
            BinaryOp::Gt => Value::Bool(compare(left, right, |o| o.is_gt())),
            BinaryOp::GtEq => Value::Bool(compare(left, right, |o| o.is_ge())),
            BinaryOp::In => {
                let key = left.to_js_string();
                match right {
                    Value::Object(map) => Value::Bool(map.borrow().contains_key(&key)),
                    Value::Array(items) => Value::Bool(
                        key == "length" || array_index(&key).is_some_and(|i| i < items.borrow().len()),
                    ),
                    other => {
                        return Err(self.throw(
                            "TypeError",
                            format!(
                                "Cannot use 'in' operator to search for '{}' in {}",
                                key,
                                other.to_js_string()
                            ),
                        ))
                    }
                }
            }
            BinaryOp::BitAnd => int_op(left, right, |a, b| a & b),
            BinaryOp::BitOr => int_op(left, right, |a, b| a | b),
            BinaryOp::BitXor => int_op(left, right, |a, b| a ^ b),
            BinaryOp::Shl => int_op(left, right, |a, b| a.wrapping_shl(b as u32 & 31)),
            BinaryOp::Shr => int_op(left, right, |a, b| a >> (b as u32 & 31)),
            BinaryOp::UShr => {
                let a = to_uint32(left.to_number());
                let b = to_uint32(right.to_number()) & 31;
                Value::Number((a >> b) as f64)
            }
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CALLS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn call(&mut self, function: &Value, args: Vec<Value>) -> Eval<Value> {
        self.tick()?;
        if self.depth >= self.limits.max_call_depth {
            return Err(Interrupt::Budget(format!(
                "call depth exceeds {}",
                self.limits.max_call_depth
            )));
        }
        self.depth += 1;
        let result = self.dispatch(function, args);
        self.depth -= 1;
        result
    }

    fn dispatch(&mut self, function: &Value, args: Vec<Value>) -> Eval<Value> {
        match function {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Native(native) => match &native.kind {
                NativeKind::Primitive(primitive) => self.call_primitive(*primitive, args),
                NativeKind::SetState(setter) => hooks::set_state(self, setter, args),
                NativeKind::Method => {
                    let receiver = native.receiver.clone().unwrap_or(Value::Undefined);
                    builtins::call_method(self, &native.name, &receiver, args)
                }
                NativeKind::Intrinsic => builtins::call_intrinsic(self, &native.name, args),
                NativeKind::Fragment => Err(self.throw("TypeError", "Fragment is not a function")),
                NativeKind::Noop => Ok(Value::Undefined),
            },
            other => Err(self.throw(
                "TypeError",
                format!("{} is not a function", other.to_js_string()),
            )),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Eval<Value> {
        let frame = Frame::function(&closure.env);
        let mut args = args.into_iter();
        for param in &closure.def.params {
            let arg = args.next().unwrap_or(Value::Undefined);
            self.bind_pattern(param, arg, &frame, BindMode::Param)?;
        }
        match &closure.def.body {
            FunctionBody::Expr(expr) => self.eval(expr, &frame),
            FunctionBody::Block(stmts) => match self.exec_statements(stmts, &frame)? {
                Completion::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    fn call_primitive(&mut self, primitive: Primitive, args: Vec<Value>) -> Eval<Value> {
        match primitive {
            Primitive::CreateElement => {
                let mut args = args.into_iter();
                let element_type = args.next().unwrap_or(Value::Undefined);
                let props = args.next().unwrap_or(Value::Null);
                let children: Vec<Value> = args.collect();
                match element::create_element(&element_type, &props, children) {
                    Some(desc) => Ok(Value::Element(Rc::new(desc))),
                    None => Err(self.throw(
                        "TypeError",
                        format!(
                            "Element type is invalid: expected a string or a component function but got: {}",
                            element_type.type_of()
                        ),
                    )),
                }
            }
            Primitive::UseState => hooks::use_state(self, args),
            Primitive::UseEffect => hooks::use_effect(self, args),
            Primitive::UseMemo => hooks::use_memo(self, args),
            Primitive::UseCallback => hooks::use_callback(self, args),
            Primitive::UseRef => hooks::use_ref(self, args),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Error object as produced by `new Error(message)`.
pub fn error_value(name: &str, message: &str) -> Value {
    let mut map = PropertyMap::new();
    map.insert("name", Value::str(name));
    map.insert("message", Value::str(message));
    Value::object(map)
}

fn thrown_message(value: &Value) -> String {
    if let Value::Object(map) = value {
        let map = map.borrow();
        if let Some(message) = map.get("message") {
            let message = message.to_js_string();
            return match map.get("name") {
                Some(name) => format!("{}: {}", name.to_js_string(), message),
                None => message,
            };
        }
    }
    value.to_js_string()
}

fn spread_into(map: &mut PropertyMap, source: &Value) {
    match source {
        Value::Object(object) => {
            for (k, v) in object.borrow().iter() {
                map.insert(Rc::clone(k), v.clone());
            }
        }
        Value::Array(items) => {
            for (i, v) in items.borrow().iter().enumerate() {
                map.insert(i.to_string(), v.clone());
            }
        }
        Value::Str(s) => {
            for (i, c) in s.chars().enumerate() {
                map.insert(i.to_string(), Value::string(c.to_string()));
            }
        }
        _ => {}
    }
}

fn is_string_like(value: &Value) -> bool {
    !matches!(
        value,
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_)
    )
}

fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return test(a.cmp(b));
    }
    match left.to_number().partial_cmp(&right.to_number()) {
        Some(ordering) => test(ordering),
        None => false,
    }
}

fn int_op(left: &Value, right: &Value, f: fn(i32, i32) -> i32) -> Value {
    Value::Number(f(to_int32(left.to_number()), to_int32(right.to_number())) as f64)
}

/// Source-like rendering of a callee for error messages.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object,
            property: Key::Static(name),
            ..
        } => format!("{}.{}", describe(object), name),
        Expr::Member { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        Expr::Chain(inner) => describe(inner),
        Expr::Literal(Literal::Str(s)) => format!("\"{}\"", s),
        Expr::Literal(Literal::Number(n)) => number_to_string(*n),
        _ => "expression".to_string(),
    }
}
