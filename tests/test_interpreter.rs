//! End-to-end tests for the interpreter running against a host window.

use micro_sandbox::runner::ds::error::JErrorType;
use micro_sandbox::runner::ds::value::JsValue;
use micro_sandbox::HostWindow;

fn eval(code: &str) -> JsValue {
    HostWindow::new()
        .eval(code)
        .unwrap_or_else(|e| panic!("`{}` failed: {}", code, e))
}

fn eval_err(code: &str) -> JErrorType {
    HostWindow::new()
        .eval(code)
        .expect_err("script should fail")
}

fn num(n: f64) -> JsValue {
    JsValue::Number(n)
}

fn string(s: &str) -> JsValue {
    JsValue::String(s.to_string())
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_precedence() {
    assert_eq!(eval("1 + 2 * 3"), num(7.0));
    assert_eq!(eval("(1 + 2) * 3"), num(9.0));
    assert_eq!(eval("10 - 4 - 3"), num(3.0));
    assert_eq!(eval("1 < 2 && 2 < 3"), JsValue::Boolean(true));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("'a' + 1 + 2"), string("a12"));
    assert_eq!(eval("1 + 2 + 'a'"), string("3a"));
}

#[test]
fn test_equality() {
    assert_eq!(eval("1 == '1'"), JsValue::Boolean(true));
    assert_eq!(eval("1 === '1'"), JsValue::Boolean(false));
    assert_eq!(eval("null == undefined"), JsValue::Boolean(true));
}

#[test]
fn test_typeof() {
    assert_eq!(eval("typeof 1"), string("number"));
    assert_eq!(eval("typeof 'x'"), string("string"));
    assert_eq!(eval("typeof function () {}"), string("function"));
    assert_eq!(eval("typeof notDeclaredAnywhere"), string("undefined"));
}

#[test]
fn test_compound_assignment() {
    assert_eq!(eval("var x = 5; x += 3; x *= 2; x"), num(16.0));
}

// ============================================================================
// Functions and scope
// ============================================================================

#[test]
fn test_closure_counter() {
    let code = "
        function counter() {
            var n = 0;
            return function () { n = n + 1; return n; };
        }
        var next = counter();
        next();
        next();
        next()
    ";
    assert_eq!(eval(code), num(3.0));
}

#[test]
fn test_function_hoisting() {
    assert_eq!(eval("var r = twice(4); function twice(x) { return x * 2; } r"), num(8.0));
}

#[test]
fn test_arrow_functions() {
    assert_eq!(eval("var add = (a, b) => a + b; add(2, 3)"), num(5.0));
    assert_eq!(eval("[1, 2, 3].map(x => x * 10).join(',')"), string("10,20,30"));
}

#[test]
fn test_top_level_var_becomes_global() {
    let host = HostWindow::new();
    host.eval("var answer = 42; function greet() { return 'hi'; }").unwrap();
    assert_eq!(host.get_global("answer"), num(42.0));
    assert!(host.get_global("greet").is_callable());
    assert_eq!(host.eval("window.answer").unwrap(), num(42.0));
}

#[test]
fn test_let_stays_in_script_scope() {
    let host = HostWindow::new();
    host.eval("let hidden = 1;").unwrap();
    assert!(!host.has_global("hidden"));
}

#[test]
fn test_loops() {
    assert_eq!(
        eval("var s = 0; for (var i = 0; i < 10; i++) { if (i === 5) { break; } s += i; } s"),
        num(10.0)
    );
    assert_eq!(eval("var n = 0; while (n < 4) { n++; } n"), num(4.0));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_reference_error() {
    assert!(matches!(eval_err("missing + 1"), JErrorType::ReferenceError(_)));
}

#[test]
fn test_syntax_error() {
    assert!(matches!(eval_err("var = ;"), JErrorType::SyntaxError(_)));
}

#[test]
fn test_try_catch_keeps_thrown_value() {
    assert_eq!(
        eval("var v; try { throw { code: 7 }; } catch (e) { v = e.code; } v"),
        num(7.0)
    );
    assert_eq!(
        eval("var name; try { missing(); } catch (e) { name = e.name; } name"),
        string("ReferenceError")
    );
}

#[test]
fn test_finally_runs() {
    assert_eq!(
        eval("var log = []; try { log.push(1); } finally { log.push(2); } log.join('')"),
        string("12")
    );
}

#[test]
fn test_uncaught_throw() {
    assert!(matches!(eval_err("throw 'boom'"), JErrorType::Thrown(_)));
}

// ============================================================================
// Built-ins
// ============================================================================

#[test]
fn test_string_methods() {
    assert_eq!(eval("'Hello'.toUpperCase()"), string("HELLO"));
    assert_eq!(eval("'a,b,c'.split(',').length"), num(3.0));
    assert_eq!(eval("'  pad '.trim()"), string("pad"));
    assert_eq!(eval("'sandbox'.slice(0, 4)"), string("sand"));
}

#[test]
fn test_array_methods() {
    assert_eq!(eval("var a = [3, 1]; a.push(4); a.length"), num(3.0));
    assert_eq!(eval("[1, 2, 3, 4].filter(function (x) { return x % 2 === 0; }).join('-')"), string("2-4"));
    assert_eq!(eval("[1, 2].concat([3]).indexOf(3)"), num(2.0));
}

#[test]
fn test_json_round_trip() {
    assert_eq!(eval("JSON.parse(JSON.stringify({ a: [1, 2] })).a[1]"), num(2.0));
}

#[test]
fn test_object_helpers() {
    assert_eq!(eval("Object.keys({ x: 1, y: 2 }).join()"), string("x,y"));
    assert_eq!(eval("Object.assign({}, { z: 3 }).z"), num(3.0));
    assert_eq!(eval("({ k: 1 }).hasOwnProperty('k')"), JsValue::Boolean(true));
}

#[test]
fn test_function_call_apply_bind() {
    assert_eq!(eval("function f(a) { return this.base + a; } f.call({ base: 1 }, 2)"), num(3.0));
    assert_eq!(eval("function g(a, b) { return a * b; } g.apply(null, [3, 4])"), num(12.0));
    assert_eq!(eval("function h(a) { return this.v + a; } h.bind({ v: 10 })(5)"), num(15.0));
}

#[test]
fn test_global_functions() {
    assert_eq!(eval("parseInt('42px')"), num(42.0));
    assert_eq!(eval("isNaN(parseFloat('x'))"), JsValue::Boolean(true));
    assert_eq!(eval("encodeURIComponent('a b')"), string("a%20b"));
}
