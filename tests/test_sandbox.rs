//! Isolation, delta tracking and teardown of module sandboxes.

mod support;

use micro_sandbox::runner::ds::error::JErrorType;
use micro_sandbox::runner::ds::value::JsValue;
use micro_sandbox::{AddedPropertyPolicy, DependencyBag, HostWindow, Sandbox, SandboxError, SandboxProps};

fn num(n: f64) -> JsValue {
    JsValue::Number(n)
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn test_writes_do_not_reach_the_host() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    sandbox
        .run("var local = 1; window.viaWindow = 2; self.viaSelf = 3; implicit = 4;")
        .unwrap();
    for key in ["local", "viaWindow", "viaSelf", "implicit"] {
        assert!(!host.has_global(key), "{} leaked to the host", key);
    }
    assert_eq!(
        sandbox.run("local + viaWindow + viaSelf + implicit").unwrap(),
        num(10.0)
    );
}

#[test]
fn test_two_sandboxes_do_not_see_each_other() {
    let host = HostWindow::new();
    let first = Sandbox::new(&host, SandboxProps::new("first"));
    let second = Sandbox::new(&host, SandboxProps::new("second"));
    first.run("var shared = 'first';").unwrap();
    second.run("var shared = 'second';").unwrap();
    assert_eq!(first.run("shared").unwrap(), JsValue::from("first"));
    assert_eq!(second.run("shared").unwrap(), JsValue::from("second"));
    assert!(!host.has_global("shared"));
}

#[test]
fn test_host_globals_are_readable() {
    let host = HostWindow::new();
    host.set_global("config", JsValue::from("prod"));
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    assert_eq!(sandbox.run("config").unwrap(), JsValue::from("prod"));
    assert_eq!(sandbox.run("window.config").unwrap(), JsValue::from("prod"));
}

#[test]
fn test_window_aliases_are_the_virtual_global() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    assert_eq!(
        sandbox
            .run("window === self && self === top && top === globalThis && this === window")
            .unwrap(),
        JsValue::Boolean(true)
    );
    assert_eq!(
        sandbox.run("window === window.window").unwrap(),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_host_functions_run_against_the_host_window() {
    let host = HostWindow::new();
    host.eval("function whoAmI() { return this === window; }").unwrap();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    assert_eq!(sandbox.run("whoAmI()").unwrap(), JsValue::Boolean(true));
    assert_eq!(sandbox.run("whoAmI === whoAmI").unwrap(), JsValue::Boolean(true));
}

#[test]
fn test_bound_host_function_keeps_own_properties() {
    let host = HostWindow::new();
    host.eval("function helper() { return 1; } helper.version = '2.0';")
        .unwrap();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    assert_eq!(sandbox.run("helper.version").unwrap(), JsValue::from("2.0"));
}

#[test]
fn test_constructors_are_not_rebound() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    assert_eq!(
        sandbox.run("Array.isArray([1]) && Array === window.Array").unwrap(),
        JsValue::Boolean(true)
    );
    host.eval("function Widget(n) { this.n = n; }").unwrap();
    assert_eq!(sandbox.run("new Widget(3).n").unwrap(), num(3.0));
}

#[test]
fn test_has_own_property_sees_local_and_host() {
    let host = HostWindow::new();
    host.set_global("hostOnly", num(1.0));
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    sandbox.run("var mine = 1;").unwrap();
    assert_eq!(
        sandbox
            .run("[hasOwnProperty('mine'), hasOwnProperty('hostOnly'), hasOwnProperty('nope')].join()")
            .unwrap(),
        JsValue::from("true,true,false")
    );
}

#[test]
fn test_injections_are_visible() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    let mut deps = DependencyBag::new();
    deps.insert("lib".to_string(), num(5.0));
    sandbox.create_context(Some(deps)).unwrap();
    assert_eq!(sandbox.run("lib * 2").unwrap(), num(10.0));
    assert_eq!(sandbox.run("typeof lib").unwrap(), JsValue::from("number"));
    assert!(!host.has_global("lib"));
}

// ============================================================================
// Delta tracking
// ============================================================================

#[test]
fn test_added_properties_in_write_order() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    sandbox.run("window.b = 1; window.a = 2; window.b = 3;").unwrap();
    let added = sandbox.added_properties();
    assert_eq!(added.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    assert_eq!(added.get("b"), Some(&num(3.0)));
    assert!(sandbox.original_values().is_empty());
}

#[test]
fn test_overwritten_host_value_is_recorded_once() {
    let host = HostWindow::new();
    host.set_global("title", JsValue::from("host"));
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    sandbox.run("window.title = 'one'; window.title = 'two';").unwrap();
    let original = sandbox.original_values();
    assert_eq!(original.get("title"), Some(&JsValue::from("host")));
    assert!(!sandbox.added_properties().contains_key("title"));
    assert_eq!(host.get_global("title"), JsValue::from("host"));
}

#[test]
fn test_single_mode_writes_through_and_restores() {
    let host = HostWindow::new();
    host.set_global("title", JsValue::from("host"));
    let sandbox = Sandbox::new(&host, SandboxProps::new("app").multi_mode(false));
    sandbox.run("window.title = 'module'; window.fresh = 1;").unwrap();
    assert_eq!(host.get_global("title"), JsValue::from("module"));
    assert_eq!(host.get_global("fresh"), num(1.0));

    sandbox.clear();
    assert_eq!(host.get_global("title"), JsValue::from("host"));
    assert!(host.has_global("fresh"), "added globals are retained by default");
    assert!(sandbox.original_values().is_empty());
}

#[test]
fn test_remove_policy_deletes_added_globals() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(
        &host,
        SandboxProps::new("app")
            .multi_mode(false)
            .added_policy(AddedPropertyPolicy::Remove),
    );
    sandbox.run("window.fresh = 1;").unwrap();
    assert!(host.has_global("fresh"));
    sandbox.clear();
    assert!(!host.has_global("fresh"));
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn test_clear_cancels_timers() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app").multi_mode(false));
    sandbox
        .run("setTimeout(function () { window.fired = true; }, 100); setInterval(function () { window.ticks = 1; }, 10);")
        .unwrap();
    assert_eq!(host.pending_timers(), 2);

    sandbox.clear();
    assert_eq!(host.pending_timers(), 0);
    host.advance(1000);
    assert!(!host.has_global("fired"));
    assert!(!host.has_global("ticks"));
}

#[test]
fn test_timers_fire_before_teardown() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    sandbox
        .run("var hits = 0; setTimeout(function (n) { hits = hits + n; }, 50, 2);")
        .unwrap();
    host.advance(49);
    assert_eq!(sandbox.run("hits").unwrap(), num(0.0));
    host.advance(1);
    assert_eq!(sandbox.run("hits").unwrap(), num(2.0));
}

#[test]
fn test_oversized_timer_delay_fires_after_one_millisecond() {
    let host = HostWindow::new();
    host.advance(1);
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    assert_eq!(
        sandbox
            .run("var fired = false; setTimeout(function () { fired = true; }, 1e20); 1")
            .unwrap(),
        num(1.0)
    );
    assert_eq!(host.pending_timers(), 1);
    host.advance(1);
    assert_eq!(sandbox.run("fired").unwrap(), JsValue::Boolean(true));
    assert_eq!(host.pending_timers(), 0);
}

#[test]
fn test_clear_removes_listeners() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    sandbox
        .run("var seen = 0; addEventListener('resize', function () { seen++; });")
        .unwrap();
    assert_eq!(host.listener_count("resize"), 1);
    host.dispatch_event("resize", JsValue::Undefined);
    assert_eq!(sandbox.run("seen").unwrap(), num(1.0));

    sandbox.clear();
    assert_eq!(host.listener_count("resize"), 0);
    assert_eq!(host.dispatch_event("resize", JsValue::Undefined), 0);
}

#[test]
fn test_remove_event_listener_unregisters() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    sandbox
        .run("function onScroll() {} addEventListener('scroll', onScroll); removeEventListener('scroll', onScroll);")
        .unwrap();
    assert_eq!(host.listener_count("scroll"), 0);
}

#[test]
fn test_clear_then_run_starts_a_fresh_context() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    sandbox.run("var kept = 1;").unwrap();
    let old = sandbox.context().unwrap();
    sandbox.clear();
    assert!(old.is_disposed());
    assert!(sandbox.context().is_none());
    assert_eq!(sandbox.run("typeof kept").unwrap(), JsValue::from("undefined"));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_execution_error_names_the_module() {
    let host = HostWindow::new();
    let broken = Sandbox::new(&host, SandboxProps::new("broken"));
    let healthy = Sandbox::new(&host, SandboxProps::new("healthy"));
    healthy.run("var ok = 1;").unwrap();

    let err = broken.run("doesNotExist()").unwrap_err();
    match &err {
        SandboxError::Execution { module, source } => {
            assert_eq!(module, "broken");
            assert!(matches!(source, JErrorType::ReferenceError(_)));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("broken"));
    assert_eq!(healthy.run("ok").unwrap(), num(1.0));
}

#[test]
fn test_syntax_error_is_an_execution_error() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    let err = sandbox.run("var = ;").unwrap_err();
    assert!(matches!(err.script_error(), Some(JErrorType::SyntaxError(_))));
}

#[test]
fn test_runaway_recursion_is_a_range_error() {
    let host = HostWindow::new();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    let err = sandbox
        .run("function g(n) { return g(n + 1); } g(0)")
        .unwrap_err();
    assert_eq!(
        err.script_error(),
        Some(&JErrorType::RangeError(
            "Maximum call stack size exceeded".to_string()
        ))
    );
    assert_eq!(
        sandbox
            .run("var caught; try { g(0); } catch (e) { caught = e.name; } caught")
            .unwrap(),
        JsValue::from("RangeError")
    );
    assert_eq!(
        sandbox
            .run("function depth(n) { return n === 0 ? 0 : 1 + depth(n - 1); } depth(20)")
            .unwrap(),
        num(20.0)
    );
}

#[test]
fn test_disabled_host_makes_run_a_no_op() {
    let host = HostWindow::new();
    host.set_interception_supported(false);
    let sandbox = Sandbox::new(&host, SandboxProps::new("app"));
    assert!(sandbox.is_disabled());
    assert_eq!(sandbox.run("window.leak = 1; 5").unwrap(), JsValue::Undefined);
    assert!(!host.has_global("leak"));
    assert_eq!(sandbox.runs(), 0);
    assert_eq!(
        sandbox.create_context(None).unwrap_err(),
        SandboxError::HostPrimitiveUnavailable
    );
    sandbox.clear();
}

#[test]
fn test_container_gets_module_class() {
    let host = HostWindow::new();
    let document = host.document();
    let container = document.create_element("div");
    document.append_child(document.body(), container).unwrap();
    let _sandbox = Sandbox::new(&host, SandboxProps::new("shop").container(container));
    assert!(document.class_list(container).contains(&"shop".to_string()));
}

#[test]
fn test_dropped_sandboxes_leave_the_registry() {
    let host = HostWindow::new();
    drop(Sandbox::new(&host, SandboxProps::new("one")));
    drop(Sandbox::new(&host, SandboxProps::new("two")));
    let three = Sandbox::new(&host, SandboxProps::new("three"));
    assert_eq!(host.registered_sandboxes(), 1);
    assert!(host.sandbox("one", "").is_none());
    assert_eq!(host.sandbox("three", "").map(|s| s.id()), Some(three.id()));
}
