//! Pure intrinsics and built-in methods available to sandboxed code.
//!
//! Everything here is deterministic and side-effect free apart from the
//! receiver mutations the language defines (`push`, `sort`, ...). `console.*`
//! is forwarded to `tracing` and never reaches stdout.

use std::rc::Rc;

use crate::interp::{error_value, Eval, Interpreter};
use crate::value::{number_to_string, same_value, strict_equals, PropertyMap, Value};

pub const ARRAY_METHODS: &[&str] = &[
    "map", "filter", "forEach", "find", "findIndex", "some", "every", "reduce", "includes",
    "indexOf", "join", "slice", "concat", "push", "pop", "shift", "unshift", "reverse", "sort",
    "flat", "flatMap", "fill", "at", "toString",
];

pub const STRING_METHODS: &[&str] = &[
    "trim", "trimStart", "trimEnd", "toUpperCase", "toLowerCase", "includes", "startsWith",
    "endsWith", "indexOf", "slice", "substring", "split", "replace", "replaceAll", "charAt",
    "repeat", "padStart", "padEnd", "at", "concat", "toString",
];

pub const NUMBER_METHODS: &[&str] = &["toFixed", "toString", "toLocaleString"];

pub const OBJECT_METHODS: &[&str] = &["hasOwnProperty"];

/// Maximum nesting accepted by `JSON.stringify` before assuming a cycle.
const JSON_DEPTH_LIMIT: usize = 64;

pub fn bound_method(methods: &[&str], key: &str, receiver: &Value) -> Value {
    if methods.contains(&key) {
        Value::method(key, receiver.clone())
    } else {
        Value::Undefined
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// Resolve a relative index (`slice`, `at`) against a length.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// METHODS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn call_method(interp: &mut Interpreter, name: &str, receiver: &Value, args: Vec<Value>) -> Eval<Value> {
    match receiver {
        Value::Array(_) => array_method(interp, name, receiver, args),
        Value::Str(s) => string_method(interp, name, s, args),
        Value::Number(n) => number_method(interp, name, *n, args),
        Value::Bool(b) => Ok(Value::string(b.to_string())),
        Value::Object(map) if name == "hasOwnProperty" => {
            let key = arg(&args, 0).to_js_string();
            Ok(Value::Bool(map.borrow().contains_key(&key)))
        }
        _ => Err(interp.throw("TypeError", format!("{} is not a function", name))),
    }
}

fn array_method(interp: &mut Interpreter, name: &str, receiver: &Value, args: Vec<Value>) -> Eval<Value> {
    let Value::Array(array) = receiver else {
        return Ok(Value::Undefined);
    };
    let items = array.borrow().clone();
    let callback = arg(&args, 0);
    let needs_callback = matches!(
        name,
        "map" | "filter" | "forEach" | "find" | "findIndex" | "some" | "every" | "reduce" | "flatMap"
    );
    if needs_callback && !callback.is_callable() {
        return Err(interp.throw(
            "TypeError",
            format!("{} is not a function", callback.to_js_string()),
        ));
    }
    let visit = |interp: &mut Interpreter, i: usize, item: &Value| {
        interp.call(
            &callback,
            vec![item.clone(), Value::Number(i as f64), receiver.clone()],
        )
    };

    match name {
        "map" => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(visit(interp, i, item)?);
            }
            Ok(Value::array(out))
        }
        "filter" => {
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if visit(interp, i, item)?.is_truthy() {
                    out.push(item.clone());
                }
            }
            Ok(Value::array(out))
        }
        "forEach" => {
            for (i, item) in items.iter().enumerate() {
                visit(interp, i, item)?;
            }
            Ok(Value::Undefined)
        }
        "find" | "findIndex" => {
            for (i, item) in items.iter().enumerate() {
                if visit(interp, i, item)?.is_truthy() {
                    return Ok(if name == "find" {
                        item.clone()
                    } else {
                        Value::Number(i as f64)
                    });
                }
            }
            Ok(if name == "find" {
                Value::Undefined
            } else {
                Value::Number(-1.0)
            })
        }
        "some" => {
            for (i, item) in items.iter().enumerate() {
                if visit(interp, i, item)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "every" => {
            for (i, item) in items.iter().enumerate() {
                if !visit(interp, i, item)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        "reduce" => {
            let mut iter = items.iter().enumerate();
            let mut acc = if args.len() > 1 {
                arg(&args, 1)
            } else {
                match iter.next() {
                    Some((_, first)) => first.clone(),
                    None => {
                        return Err(interp.throw("TypeError", "Reduce of empty array with no initial value"))
                    }
                }
            };
            for (i, item) in iter {
                acc = interp.call(
                    &callback,
                    vec![acc, item.clone(), Value::Number(i as f64), receiver.clone()],
                )?;
            }
            Ok(acc)
        }
        "includes" => {
            let needle = arg(&args, 0);
            Ok(Value::Bool(
                items
                    .iter()
                    .any(|v| strict_equals(v, &needle) || same_value(v, &needle)),
            ))
        }
        "indexOf" => {
            let needle = arg(&args, 0);
            let index = items.iter().position(|v| strict_equals(v, &needle));
            Ok(Value::Number(index.map(|i| i as f64).unwrap_or(-1.0)))
        }
        "join" | "toString" => {
            let separator = match args.first() {
                Some(Value::Undefined) | None => ",".to_string(),
                Some(sep) => sep.to_js_string(),
            };
            let separator = if name == "toString" { ",".to_string() } else { separator };
            let joined = items
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                .collect::<Vec<_>>()
                .join(&separator);
            interp.check_string(joined.len())?;
            Ok(Value::string(joined))
        }
        "slice" => {
            let len = items.len();
            let start = relative_index(&arg(&args, 0), len, 0);
            let end = relative_index(&arg(&args, 1), len, len);
            Ok(Value::array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            }))
        }
        "concat" => {
            let mut out = items;
            for value in args {
                match value {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    other => out.push(other),
                }
                interp.check_collection(out.len())?;
            }
            Ok(Value::array(out))
        }
        "push" | "unshift" => {
            let mut array = array.borrow_mut();
            interp.check_collection(array.len() + args.len())?;
            if name == "push" {
                array.extend(args);
            } else {
                for (i, value) in args.into_iter().enumerate() {
                    array.insert(i, value);
                }
            }
            Ok(Value::Number(array.len() as f64))
        }
        "pop" => Ok(array.borrow_mut().pop().unwrap_or(Value::Undefined)),
        "shift" => {
            let mut array = array.borrow_mut();
            if array.is_empty() {
                Ok(Value::Undefined)
            } else {
                Ok(array.remove(0))
            }
        }
        "reverse" => {
            array.borrow_mut().reverse();
            Ok(receiver.clone())
        }
        "sort" => {
            let comparator = if callback.is_callable() {
                Some(callback.clone())
            } else {
                None
            };
            let sorted = merge_sort(interp, items, comparator.as_ref())?;
            *array.borrow_mut() = sorted;
            Ok(receiver.clone())
        }
        "flat" => {
            let depth = match args.first() {
                Some(Value::Undefined) | None => 1.0,
                Some(d) => d.to_number(),
            };
            let mut out = Vec::new();
            flatten_into(interp, &mut out, &items, depth)?;
            Ok(Value::array(out))
        }
        "flatMap" => {
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                match visit(interp, i, item)? {
                    Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                    other => out.push(other),
                }
                interp.check_collection(out.len())?;
            }
            Ok(Value::array(out))
        }
        "fill" => {
            let value = arg(&args, 0);
            for slot in array.borrow_mut().iter_mut() {
                *slot = value.clone();
            }
            Ok(receiver.clone())
        }
        "at" => {
            let n = arg(&args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { items.len() as f64 + n } else { n };
            if index < 0.0 {
                return Ok(Value::Undefined);
            }
            Ok(items.get(index as usize).cloned().unwrap_or(Value::Undefined))
        }
        _ => Err(interp.throw("TypeError", format!("items.{} is not a function", name))),
    }
}

fn flatten_into(interp: &mut Interpreter, out: &mut Vec<Value>, items: &[Value], depth: f64) -> Eval<()> {
    interp.tick()?;
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => {
                let inner = inner.borrow().clone();
                flatten_into(interp, out, &inner, depth - 1.0)?;
            }
            other => {
                out.push(other.clone());
                interp.check_collection(out.len())?;
            }
        }
    }
    Ok(())
}

/// Stable merge sort; comparator calls count against the budget.
fn merge_sort(interp: &mut Interpreter, items: Vec<Value>, comparator: Option<&Value>) -> Eval<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(interp, left, comparator)?;
    let right = merge_sort(interp, right, comparator)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        let take_right = match comparator {
            Some(cmp) => interp.call(cmp, vec![a.clone(), b.clone()])?.to_number() > 0.0,
            None => {
                interp.tick()?;
                sort_key(a) > sort_key(b)
            }
        };
        let next = if take_right { right.next() } else { left.next() };
        if let Some(next) = next {
            out.push(next);
        }
    }
    out.extend(left);
    out.extend(right);
    Ok(out)
}

fn sort_key(value: &Value) -> String {
    value.to_js_string()
}

fn string_method(interp: &mut Interpreter, name: &str, s: &Rc<str>, args: Vec<Value>) -> Eval<Value> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let text = |arg: Value| match arg {
        Value::Undefined => "undefined".to_string(),
        other => other.to_js_string(),
    };

    let result = match name {
        "trim" => Value::str(s.trim()),
        "trimStart" => Value::str(s.trim_start()),
        "trimEnd" => Value::str(s.trim_end()),
        "toUpperCase" => Value::string(s.to_uppercase()),
        "toLowerCase" => Value::string(s.to_lowercase()),
        "toString" => Value::Str(Rc::clone(s)),
        "includes" => Value::Bool(s.contains(text(arg(&args, 0)).as_str())),
        "startsWith" => Value::Bool(s.starts_with(text(arg(&args, 0)).as_str())),
        "endsWith" => Value::Bool(s.ends_with(text(arg(&args, 0)).as_str())),
        "indexOf" => {
            let needle = text(arg(&args, 0));
            Value::Number(match s.find(needle.as_str()) {
                Some(byte) => s[..byte].chars().count() as f64,
                None => -1.0,
            })
        }
        "slice" => {
            let start = relative_index(&arg(&args, 0), len, 0);
            let end = relative_index(&arg(&args, 1), len, len);
            Value::string(if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            })
        }
        "substring" => {
            let clamp = |v: Value, default: usize| match v {
                Value::Undefined => default,
                other => {
                    let n = other.to_number();
                    if n.is_nan() || n < 0.0 {
                        0
                    } else {
                        (n as usize).min(len)
                    }
                }
            };
            let a = clamp(arg(&args, 0), 0);
            let b = clamp(arg(&args, 1), len);
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Value::string(chars[start..end].iter().collect())
        }
        "split" => {
            let parts: Vec<Value> = match arg(&args, 0) {
                Value::Undefined => vec![Value::Str(Rc::clone(s))],
                separator => {
                    let separator = separator.to_js_string();
                    if separator.is_empty() {
                        chars.iter().map(|c| Value::string(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str()).map(Value::str).collect()
                    }
                }
            };
            let parts = match arg(&args, 1) {
                Value::Undefined => parts,
                limit => parts.into_iter().take(limit.to_number().max(0.0) as usize).collect(),
            };
            interp.check_collection(parts.len())?;
            Value::array(parts)
        }
        "replace" | "replaceAll" => {
            let pattern = text(arg(&args, 0));
            let replacement = arg(&args, 1);
            let mut out = String::with_capacity(s.len());
            let mut rest: &str = s;
            loop {
                let Some(at) = rest.find(pattern.as_str()) else {
                    break;
                };
                out.push_str(&rest[..at]);
                let piece = if replacement.is_callable() {
                    interp
                        .call(&replacement, vec![Value::str(&pattern)])?
                        .to_js_string()
                } else {
                    replacement.to_js_string()
                };
                out.push_str(&piece);
                interp.check_string(out.len())?;
                rest = &rest[at + pattern.len()..];
                if name == "replace" || pattern.is_empty() {
                    break;
                }
            }
            out.push_str(rest);
            Value::string(out)
        }
        "charAt" => {
            let index = arg(&args, 0).to_number();
            let index = if index.is_nan() { 0.0 } else { index };
            Value::string(
                if index >= 0.0 {
                    chars.get(index as usize).map(|c| c.to_string())
                } else {
                    None
                }
                .unwrap_or_default(),
            )
        }
        "at" => {
            let n = arg(&args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            if index < 0.0 {
                Value::Undefined
            } else {
                chars
                    .get(index as usize)
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or(Value::Undefined)
            }
        }
        "repeat" => {
            let count = arg(&args, 0).to_number();
            if count < 0.0 || count.is_infinite() {
                return Err(interp.throw("RangeError", format!("Invalid count value: {}", number_to_string(count))));
            }
            let count = if count.is_nan() { 0 } else { count as usize };
            interp.check_string(s.len().saturating_mul(count))?;
            Value::string(s.repeat(count))
        }
        "padStart" | "padEnd" => {
            let target = arg(&args, 0).to_number();
            let target = if target.is_nan() { 0 } else { target.max(0.0) as usize };
            interp.check_string(target)?;
            let fill = match arg(&args, 1) {
                Value::Undefined => " ".to_string(),
                other => other.to_js_string(),
            };
            if target <= len || fill.is_empty() {
                Value::Str(Rc::clone(s))
            } else {
                let padding: String = fill.chars().cycle().take(target - len).collect();
                Value::string(if name == "padStart" {
                    format!("{}{}", padding, s)
                } else {
                    format!("{}{}", s, padding)
                })
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for value in args {
                out.push_str(&value.to_js_string());
            }
            interp.check_string(out.len())?;
            Value::string(out)
        }
        _ => return Err(interp.throw("TypeError", format!("text.{} is not a function", name))),
    };
    Ok(result)
}

fn number_method(interp: &mut Interpreter, name: &str, n: f64, args: Vec<Value>) -> Eval<Value> {
    match name {
        "toFixed" => {
            let digits = arg(&args, 0).to_number();
            let digits = if digits.is_nan() { 0.0 } else { digits };
            if !(0.0..=100.0).contains(&digits) {
                return Err(interp.throw("RangeError", "toFixed() digits argument must be between 0 and 100"));
            }
            if !n.is_finite() {
                return Ok(Value::string(number_to_string(n)));
            }
            Ok(Value::string(format!("{:.*}", digits as usize, n)))
        }
        "toString" => {
            let radix = match arg(&args, 0) {
                Value::Undefined => 10,
                other => other.to_number() as u32,
            };
            if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
                return Ok(Value::string(number_to_string(n)));
            }
            if !(2..=36).contains(&radix) {
                return Err(interp.throw("RangeError", "toString() radix must be between 2 and 36"));
            }
            Ok(Value::string(integer_to_radix(n as i64, radix)))
        }
        "toLocaleString" => Ok(Value::string(locale_string(n))),
        _ => Err(interp.throw("TypeError", format!("value.{} is not a function", name))),
    }
}

fn integer_to_radix(n: i64, radix: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let negative = n < 0;
    let mut value = n.unsigned_abs();
    let mut digits = Vec::new();
    while value > 0 {
        let digit = (value % radix as u64) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        value /= radix as u64;
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

/// `en-US` grouping with at most three fraction digits.
fn locale_string(n: f64) -> String {
    if !n.is_finite() {
        return number_to_string(n);
    }
    let rounded = format!("{:.3}", n.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if n < 0.0 { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac_part)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INTRINSICS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn call_intrinsic(interp: &mut Interpreter, name: &str, args: Vec<Value>) -> Eval<Value> {
    let number = |i: usize| arg(&args, i).to_number();
    let result = match name {
        "Math.max" => Value::Number(args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, |acc, n| {
            if acc.is_nan() || n.is_nan() {
                f64::NAN
            } else {
                acc.max(n)
            }
        })),
        "Math.min" => Value::Number(args.iter().map(Value::to_number).fold(f64::INFINITY, |acc, n| {
            if acc.is_nan() || n.is_nan() {
                f64::NAN
            } else {
                acc.min(n)
            }
        })),
        "Math.floor" => Value::Number(number(0).floor()),
        "Math.ceil" => Value::Number(number(0).ceil()),
        "Math.round" => Value::Number((number(0) + 0.5).floor()),
        "Math.abs" => Value::Number(number(0).abs()),
        "Math.sqrt" => Value::Number(number(0).sqrt()),
        "Math.pow" => Value::Number(number(0).powf(number(1))),
        "Math.trunc" => Value::Number(number(0).trunc()),
        "Math.sign" => {
            let n = number(0);
            Value::Number(if n.is_nan() || n == 0.0 { n } else { n.signum() })
        }
        "Math.random" => Value::Number(interp.next_random()),

        "JSON.stringify" => {
            let indent = match arg(&args, 2) {
                Value::Number(n) if n > 0.0 => true,
                Value::Str(s) if !s.is_empty() => true,
                _ => false,
            };
            match to_json(interp, &arg(&args, 0), 0)? {
                Some(json) => {
                    let text = if indent {
                        serde_json::to_string_pretty(&json)
                    } else {
                        serde_json::to_string(&json)
                    }
                    .map_err(|e| interp.throw("TypeError", e.to_string()))?;
                    interp.check_string(text.len())?;
                    Value::string(text)
                }
                None => Value::Undefined,
            }
        }
        "JSON.parse" => {
            let text = arg(&args, 0).to_js_string();
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| interp.throw("SyntaxError", format!("JSON.parse: {}", e)))?;
            from_json(&json)
        }

        "String" => match args.first() {
            Some(value) => Value::string(value.to_js_string()),
            None => Value::str(""),
        },
        "Number" => Value::Number(args.first().map(Value::to_number).unwrap_or(0.0)),
        "Boolean" => Value::Bool(arg(&args, 0).is_truthy()),
        "parseInt" => Value::Number(parse_int(&arg(&args, 0).to_js_string(), &arg(&args, 1))),
        "parseFloat" => Value::Number(parse_float(&arg(&args, 0).to_js_string())),
        "isNaN" => Value::Bool(number(0).is_nan()),
        "isFinite" => Value::Bool(number(0).is_finite()),
        "Error" | "TypeError" | "RangeError" => {
            let message = match arg(&args, 0) {
                Value::Undefined => String::new(),
                other => other.to_js_string(),
            };
            error_value(name, &message)
        }

        "Array.isArray" => Value::Bool(matches!(arg(&args, 0), Value::Array(_))),
        "Array.of" => Value::array(args.clone()),
        "Array.from" => {
            let source = arg(&args, 0);
            let items = match &source {
                Value::Object(map) => {
                    let len = map.borrow().get("length").map(Value::to_number).unwrap_or(0.0);
                    let len = if len.is_nan() { 0 } else { len.max(0.0) as usize };
                    interp.check_collection(len)?;
                    vec![Value::Undefined; len]
                }
                other => interp.iterate(other)?,
            };
            let map_fn = arg(&args, 1);
            if map_fn.is_callable() {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(interp.call(&map_fn, vec![item, Value::Number(i as f64)])?);
                }
                Value::array(out)
            } else {
                Value::array(items)
            }
        }

        "Object.keys" | "Object.values" | "Object.entries" => {
            let entries = own_entries(&arg(&args, 0));
            Value::array(
                entries
                    .into_iter()
                    .map(|(k, v)| match name {
                        "Object.keys" => Value::Str(k),
                        "Object.values" => v,
                        _ => Value::array(vec![Value::Str(k), v]),
                    })
                    .collect(),
            )
        }
        "Object.assign" => {
            let target = arg(&args, 0);
            let Value::Object(map) = &target else {
                return Err(interp.throw("TypeError", "Object.assign target must be an object"));
            };
            for source in args.iter().skip(1) {
                for (k, v) in own_entries(source) {
                    map.borrow_mut().insert(k, v);
                }
                interp.check_collection(map.borrow().len())?;
            }
            target
        }
        "Object.freeze" => arg(&args, 0),

        _ if name.starts_with("console.") => {
            let message = args
                .iter()
                .map(|v| match v {
                    Value::Str(s) => s.to_string(),
                    other => to_json(interp, other, 0)
                        .ok()
                        .flatten()
                        .map(|json| json.to_string())
                        .unwrap_or_else(|| other.to_js_string()),
                })
                .collect::<Vec<_>>()
                .join(" ");
            let method = name.trim_start_matches("console.");
            tracing::debug!(target: "preview::console", method, "{}", message);
            Value::Undefined
        }

        _ => return Err(interp.throw("TypeError", format!("{} is not a function", name))),
    };
    Ok(result)
}

fn own_entries(value: &Value) -> Vec<(Rc<str>, Value)> {
    match value {
        Value::Object(map) => map
            .borrow()
            .iter()
            .map(|(k, v)| (Rc::clone(k), v.clone()))
            .collect(),
        Value::Array(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (Rc::from(i.to_string()), v.clone()))
            .collect(),
        Value::Str(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (Rc::from(i.to_string()), Value::string(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_int(text: &str, radix: &Value) -> f64 {
    let text = text.trim_start();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let mut radix = match radix {
        Value::Undefined => 10,
        other => other.to_number() as u32,
    };
    let mut digits = text;
    if radix == 0 || radix == 16 {
        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            digits = hex;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value: f64 = 0.0;
    let mut seen = false;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => {
                value = value * radix as f64 + d as f64;
                seen = true;
            }
            None => break,
        }
    }
    if !seen {
        return f64::NAN;
    }
    if negative {
        -value
    } else {
        value
    }
}

fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    if text.starts_with("Infinity") || text.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    if text.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    // Longest prefix that parses as a float.
    let candidate: String = text
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        .collect();
    (1..=candidate.len())
        .rev()
        .find_map(|end| candidate[..end].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON
// ═══════════════════════════════════════════════════════════════════════════════

/// Convert to JSON; `None` for values `JSON.stringify` skips.
pub fn to_json(interp: &Interpreter, value: &Value, depth: usize) -> Eval<Option<serde_json::Value>> {
    if depth > JSON_DEPTH_LIMIT {
        return Err(interp.throw("TypeError", "Converting circular structure to JSON"));
    }
    Ok(Some(match value {
        Value::Undefined | Value::Function(_) | Value::Native(_) => return Ok(None),
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => json_number(*n),
        Value::Str(s) => serde_json::Value::String(s.to_string()),
        Value::Array(items) => {
            let items = items.borrow().clone();
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                out.push(to_json(interp, item, depth + 1)?.unwrap_or(serde_json::Value::Null));
            }
            serde_json::Value::Array(out)
        }
        Value::Object(map) => {
            let entries: Vec<(Rc<str>, Value)> = map
                .borrow()
                .iter()
                .map(|(k, v)| (Rc::clone(k), v.clone()))
                .collect();
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                if let Some(json) = to_json(interp, &v, depth + 1)? {
                    out.insert(k.to_string(), json);
                }
            }
            serde_json::Value::Object(out)
        }
        Value::Element(desc) => {
            let mut out = serde_json::Map::new();
            out.insert("type".to_string(), serde_json::Value::String(desc.type_name()));
            if let Some(key) = &desc.key {
                out.insert("key".to_string(), serde_json::Value::String(key.to_string()));
            }
            serde_json::Value::Object(out)
        }
    }))
}

fn json_number(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::str(s),
        serde_json::Value::Array(items) => Value::array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::object(
            map.iter()
                .map(|(k, v)| (Rc::from(k.as_str()), from_json(v)))
                .collect::<PropertyMap>(),
        ),
    }
}
