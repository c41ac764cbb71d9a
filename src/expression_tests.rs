//! Interpreter semantics: expressions, statements and intrinsics as seen by
//! sandboxed code.

#[cfg(test)]
mod tests {
    use crate::error::SynthesisError;
    use crate::synthesize::ComponentSynthesizer;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    /// Run `source` and return `JSON.stringify(result)`.
    fn result_json(source: &str) -> String {
        let program = format!("{}\nconst __json = JSON.stringify(result);", source);
        let module = ComponentSynthesizer::default()
            .synthesize(&program)
            .unwrap_or_else(|e| panic!("synthesis failed for {:?}: {}", source, e));
        match module.scope().declared("__json") {
            Some(Value::Str(s)) => s.to_string(),
            other => panic!("result not serializable: {:?}", other),
        }
    }

    fn runtime_error(source: &str) -> String {
        match ComponentSynthesizer::default().synthesize(source) {
            Err(SynthesisError::Runtime(message)) => message,
            other => panic!("expected runtime error for {:?}, got {:?}", source, other.map(|_| ())),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // OPERATORS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_arithmetic_and_concatenation() {
        assert_eq!(
            result_json("const result = [1 + 2 * 3, '4' + 2, 7 % 3, 2 ** 10, 10 / 4, -'3'];"),
            r#"[7,"42",1,1024,2.5,-3]"#
        );
    }

    #[test]
    fn test_equality() {
        assert_eq!(
            result_json("const result = [1 == '1', 1 === '1', null == undefined, null === undefined, NaN === NaN, 0 == false];"),
            "[true,false,true,false,false,true]"
        );
    }

    #[test]
    fn test_typeof() {
        assert_eq!(
            result_json("const result = [typeof 1, typeof 'a', typeof undefined, typeof null, typeof (() => 1), typeof missing, typeof {}];"),
            r#"["number","string","undefined","object","function","undefined","object"]"#
        );
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(
            result_json("const result = [0 || 'a', 'b' && 'c', null ?? 'd', 0 ?? 'e', !'' , 1 > 2 ? 'x' : 'y'];"),
            r#"["a","c","d",0,true,"y"]"#
        );
    }

    #[test]
    fn test_logical_and_compound_assignment() {
        assert_eq!(
            result_json("let x = null; x ??= 5; let y = 1; y ||= 7; let z = 1; z &&= 9; let s = 'a'; s += 'b'; let n = 10; n -= 3; n *= 2; const result = [x, y, z, s, n];"),
            r#"[5,1,9,"ab",14]"#
        );
    }

    #[test]
    fn test_update_on_members() {
        assert_eq!(
            result_json("const o = { n: 1 }; o.n++; ++o.n; const items = [5]; items[0]--; const result = [o.n, items[0]];"),
            "[3,4]"
        );
    }

    #[test]
    fn test_in_operator() {
        assert_eq!(
            result_json("const result = ['a' in { a: 1 }, 'b' in { a: 1 }, 0 in [9], 'length' in []];"),
            "[true,false,true,true]"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // BINDINGS & FUNCTIONS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_destructuring_defaults_and_rest() {
        assert_eq!(
            result_json("const { a = 5, b, ...rest } = { b: 2, c: 3, d: 4 };\nconst [x, , z = 9] = [1, 2];\nconst [head, ...tail] = 'abc';\nconst result = [a, b, rest, x, z, head, tail];"),
            r#"[5,2,{"c":3,"d":4},1,9,"a",["b","c"]]"#
        );
    }

    #[test]
    fn test_closures_keep_their_environment() {
        assert_eq!(
            result_json("function makeCounter() { let c = 0; return () => ++c; }\nconst next = makeCounter();\nnext(); next();\nconst result = [next(), makeCounter()()];"),
            "[3,1]"
        );
    }

    #[test]
    fn test_function_declarations_are_hoisted() {
        assert_eq!(result_json("const result = twice(4);\nfunction twice(n) { return n * 2; }"), "8");
    }

    #[test]
    fn test_block_scoping() {
        assert_eq!(
            result_json("let s = 'outer'; { let s = 'inner'; }\nif (true) { var v = 1; }\nconst result = [s, v];"),
            r#"["outer",1]"#
        );
    }

    #[test]
    fn test_default_parameters_and_function_names() {
        assert_eq!(
            result_json("const greet = (name = 'you', punct = '!') => 'hi ' + name + punct;\nconst result = [greet(), greet('Ada', '?'), greet.name, greet.length];"),
            r#"["hi you!","hi Ada?","greet",2]"#
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CONTROL FLOW
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_loops() {
        assert_eq!(
            result_json("let acc = '';\nfor (let i = 0; i < 5; i++) { if (i === 1) continue; if (i === 4) break; acc += i; }\nconst pairs = [];\nfor (const [k, v] of Object.entries({ a: 1, b: 2 })) pairs.push(k + v);\nlet n = 0; while (n < 3) n++;\nconst result = [acc, pairs, n];"),
            r#"["023",["a1","b2"],3]"#
        );
    }

    #[test]
    fn test_try_catch_finally() {
        assert_eq!(
            result_json("const log = [];\ntry { null.x; } catch (e) { log.push(e.name); log.push(e.message); } finally { log.push('done'); }\ntry { throw new RangeError('bad'); } catch ({ message }) { log.push(message); }\nconst result = log;"),
            r#"["TypeError","Cannot read properties of null (reading 'x')","done","bad"]"#
        );
    }

    #[test]
    fn test_optional_chaining() {
        assert_eq!(
            result_json("const o = { a: { b: 1 }, f: null };\nconst result = [o?.a?.b, o.x?.y, o.f?.(), o.a.b || 'z'];"),
            "[1,null,null,1]"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // INTRINSICS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_array_methods() {
        assert_eq!(
            result_json("const nums = [1, 2, 3, 4];\nconst result = [\n  nums.filter(n => n % 2 === 0).map(n => n * 10),\n  nums.reduce((a, b) => a + b, 0),\n  nums.find(n => n > 2),\n  nums.findIndex(n => n > 9),\n  nums.some(n => n > 3),\n  nums.every(n => n > 0),\n  nums.includes(3),\n  nums.slice(1, -1),\n  nums.join('-'),\n  [[1], [2, [3]]].flat(),\n  [3, 1, 2].sort((a, b) => b - a),\n  [10, 9, 1].sort(),\n  nums.at(-1),\n];"),
            r#"[[20,40],10,3,-1,true,true,true,[2,3],"1-2-3-4",[1,2,[3]],[3,2,1],[1,10,9],4]"#
        );
    }

    #[test]
    fn test_array_mutation() {
        assert_eq!(
            result_json("const a = [2];\nconst len = a.push(3, 4);\na.unshift(1);\nconst last = a.pop();\nconst first = a.shift();\nconst result = [a, len, last, first, a.length];"),
            "[[2,3],3,4,1,2]"
        );
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(
            result_json("const result = ['  Hi  '.trim().toUpperCase(), 'a-b-c'.split('-'), 'abc'.slice(-2), 'x'.padStart(3, '0'), 'aXbX'.replaceAll('X', '.'), 'hello'.charAt(1), 'ab'.repeat(2), 'Title'.startsWith('Ti')];"),
            r#"["HI",["a","b","c"],"bc","00x","a.b.","e","abab",true]"#
        );
    }

    #[test]
    fn test_template_literals() {
        assert_eq!(
            result_json("const n = 3;\nconst result = `n=${n}, half=${n / 2}, ok=${n > 2}`;"),
            r#""n=3, half=1.5, ok=true""#
        );
    }

    #[test]
    fn test_object_helpers_keep_insertion_order() {
        assert_eq!(
            result_json("const base = { b: 1, a: 2 };\nconst merged = Object.assign({}, base, { c: 3 });\nconst result = [Object.keys({ ...base, c: 3 }), Object.values(base), merged, Array.isArray([]), ({ k: 1 }).hasOwnProperty('k')];"),
            r#"[["b","a","c"],[1,2],{"b":1,"a":2,"c":3},true,true]"#
        );
    }

    #[test]
    fn test_math_and_numbers() {
        assert_eq!(
            result_json("const result = [Math.max(1, 5, 3), Math.min(), Math.floor(2.7), Math.round(2.5), Math.abs(-4), (1234.5).toFixed(1), (255).toString(16), parseInt('42px'), Number('7'), isNaN('abc')];"),
            r#"[5,null,2,3,4,"1234.5","ff",42,7,true]"#
        );
    }

    #[test]
    fn test_json_round_trip() {
        assert_eq!(
            result_json(r#"const parsed = JSON.parse('{"x":[1,2],"y":{"z":null}}');
const result = [parsed.x.length, parsed.y.z, JSON.stringify({ skip: undefined, fn: () => 1, keep: 1 })];"#),
            r#"[2,null,"{\"keep\":1}"]"#
        );
    }

    #[test]
    fn test_math_random_is_deterministic() {
        let source = "const result = [Math.random(), Math.random()];";
        let first = result_json(source);
        assert_eq!(result_json(source), first);
        let values: Vec<f64> = serde_json::from_str(&first).unwrap();
        assert!(values.iter().all(|v| (0.0..1.0).contains(v)));
        assert_ne!(values[0], values[1]);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ERRORS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_reference_error() {
        assert_eq!(
            runtime_error("const result = missing + 1;"),
            "ReferenceError: missing is not defined"
        );
    }

    #[test]
    fn test_const_reassignment() {
        assert_eq!(
            runtime_error("const a = 1;\na = 2;"),
            "TypeError: Assignment to constant variable."
        );
    }

    #[test]
    fn test_calling_non_function() {
        assert_eq!(
            runtime_error("const o = {};\no.run();"),
            "TypeError: o.run is not a function"
        );
    }

    #[test]
    fn test_thrown_primitive() {
        assert_eq!(runtime_error("throw 'plain';"), "plain");
    }

    #[test]
    fn test_new_on_non_constructor() {
        assert_eq!(
            runtime_error("const x = new Map();"),
            "TypeError: Map is not a constructor"
        );
    }
}
