//! Insertions module code makes into `document.head` and `document.body`.

mod support;

use std::rc::Rc;

use micro_sandbox::dom::css::PrefixScoper;
use micro_sandbox::dom::element::node_of;
use micro_sandbox::dom::node::{NodeId, DOCUMENT_NODE};
use micro_sandbox::dom::virtual_document::{MutationTarget, VirtualDocument};
use micro_sandbox::runner::ds::value::JsValue;
use micro_sandbox::{HostWindow, Sandbox, SandboxProps};

use support::{host_with, MemoryFetch};

/// A host body with a `<div>` container for a module named `app`.
fn module_host(fetch: &Rc<MemoryFetch>) -> (Rc<HostWindow>, NodeId, Rc<Sandbox>) {
    let host = host_with(fetch);
    let document = host.document();
    let container = document.create_element("div");
    document.append_child(document.body(), container).unwrap();
    let sandbox = Sandbox::new(&host, SandboxProps::new("app").container(container));
    (host, container, sandbox)
}

fn node(sandbox: &Sandbox, expression: &str) -> NodeId {
    let value = sandbox.run(expression).unwrap();
    node_of(&value).unwrap_or_else(|| panic!("`{}` is not a node", expression))
}

// ============================================================================
// Styles
// ============================================================================

#[test]
fn test_inline_style_goes_to_the_container_scoped() {
    let fetch = MemoryFetch::new();
    let (host, container, sandbox) = module_host(&fetch);
    host.set_css_scoper(Rc::new(PrefixScoper));
    sandbox
        .run("var s = document.createElement('style'); s.textContent = '.a { color: red }'; document.head.appendChild(s);")
        .unwrap();
    let style = node(&sandbox, "s");
    let document = host.document();
    assert_eq!(document.parent(style), Some(container));
    assert_eq!(document.text_content(style), ".app .a { color: red }");
    assert_eq!(
        document.get_attribute(style, "data-module").as_deref(),
        Some("sandbox-app")
    );
    let vdoc = VirtualDocument::obtain(&host, "app", "", None, true);
    assert_eq!(vdoc.mutation_target(style), Some(MutationTarget::Head));
    assert!(document.children(document.head()).is_empty());
}

#[test]
fn test_unscoped_style_is_left_alone() {
    let fetch = MemoryFetch::new();
    let host = host_with(&fetch);
    host.set_css_scoper(Rc::new(PrefixScoper));
    let sandbox = Sandbox::new(&host, SandboxProps::new("plain").scoped_css(false));
    sandbox
        .run("var s = document.createElement('style'); s.textContent = '.a{}'; document.body.appendChild(s);")
        .unwrap();
    let style = node(&sandbox, "s");
    let document = host.document();
    assert_eq!(document.text_content(style), ".a{}");
    assert_eq!(document.parent(style), Some(document.body()));
}

#[test]
fn test_style_reference_node_only_inside_container() {
    let fetch = MemoryFetch::new();
    let (host, container, sandbox) = module_host(&fetch);
    sandbox
        .run(
            "var first = document.createElement('style');
             document.head.appendChild(first);
             var second = document.createElement('style');
             document.head.insertBefore(second, first);
             var stray = document.createElement('div');
             var third = document.createElement('style');
             document.head.insertBefore(third, stray);",
        )
        .unwrap();
    let (first, second, third) = (
        node(&sandbox, "first"),
        node(&sandbox, "second"),
        node(&sandbox, "third"),
    );
    assert_eq!(host.document().children(container), vec![second, first, third]);
}

#[tokio::test]
async fn test_stylesheet_link_becomes_style() {
    let fetch = MemoryFetch::new();
    fetch.route("/theme.css", ".btn{color:red}");
    let (host, container, sandbox) = module_host(&fetch);
    host.set_css_scoper(Rc::new(PrefixScoper));
    sandbox
        .run(
            "var loaded = null;
             var link = document.createElement('link');
             link.rel = 'stylesheet';
             link.href = '/theme.css';
             link.onload = function (e) { loaded = e.type; };
             document.head.appendChild(link);",
        )
        .unwrap();
    let link = node(&sandbox, "link");
    let document = host.document();
    let vdoc = VirtualDocument::obtain(&host, "app", "", None, true);
    let style = vdoc.converted_style(link).expect("link converted");

    assert_eq!(document.tag_name(style).as_deref(), Some("STYLE"));
    assert_eq!(document.parent(style), Some(container));
    assert_eq!(document.parent(link), None);
    assert_eq!(
        document.get_attribute(style, "data-sandbox-href").as_deref(),
        Some("/theme.css")
    );
    assert_eq!(sandbox.run("loaded").unwrap(), JsValue::Null);

    host.settle().await;
    assert_eq!(document.text_content(style), ".app .btn {color:red}");
    assert_eq!(sandbox.run("loaded").unwrap(), JsValue::from("load"));
    assert_eq!(fetch.calls("/theme.css"), 1);
}

#[tokio::test]
async fn test_missing_stylesheet_fires_error() {
    let fetch = MemoryFetch::new();
    let (host, _container, sandbox) = module_host(&fetch);
    sandbox
        .run(
            "var outcome = 'pending';
             var link = document.createElement('link');
             link.rel = 'stylesheet';
             link.href = '/missing.css';
             link.addEventListener('error', function (e) { outcome = e.type; });
             document.head.appendChild(link);",
        )
        .unwrap();
    host.settle().await;
    assert_eq!(sandbox.run("outcome").unwrap(), JsValue::from("error"));
}

// ============================================================================
// Scripts
// ============================================================================

#[test]
fn test_inline_script_runs_in_the_sandbox() {
    let fetch = MemoryFetch::new();
    let (host, _container, sandbox) = module_host(&fetch);
    let result = sandbox
        .run(
            "var s = document.createElement('script');
             s.textContent = 'var fromScript = 7;';
             document.body.appendChild(s);
             fromScript",
        )
        .unwrap();
    assert_eq!(result, JsValue::Number(7.0));
    assert!(!host.has_global("fromScript"));
    let document = host.document();
    assert!(document
        .get_elements_by_tag_name(DOCUMENT_NODE, "script")
        .is_empty());
}

#[test]
fn test_inline_script_error_reaches_the_caller() {
    let fetch = MemoryFetch::new();
    let (_host, _container, sandbox) = module_host(&fetch);
    let caught = sandbox
        .run(
            "var caught = null;
             var s = document.createElement('script');
             s.textContent = 'notDefined()';
             try { document.head.appendChild(s); } catch (e) { caught = e.name; }
             caught",
        )
        .unwrap();
    assert_eq!(caught, JsValue::from("ReferenceError"));
}

#[tokio::test]
async fn test_external_script_is_fetched_and_run() {
    let fetch = MemoryFetch::new();
    fetch.route("/widget.js", "var widgetReady = true;");
    let (host, _container, sandbox) = module_host(&fetch);
    sandbox
        .run(
            "var status = 'waiting';
             var s = document.createElement('script');
             s.src = '/widget.js';
             s.onload = function () { status = 'loaded'; };
             document.body.appendChild(s);",
        )
        .unwrap();
    assert_eq!(sandbox.run("status").unwrap(), JsValue::from("waiting"));

    host.settle().await;
    assert_eq!(sandbox.run("widgetReady").unwrap(), JsValue::Boolean(true));
    assert_eq!(sandbox.run("status").unwrap(), JsValue::from("loaded"));
    assert!(!host.has_global("widgetReady"));
}

#[tokio::test]
async fn test_external_script_failure_fires_error() {
    let fetch = MemoryFetch::new();
    let (host, _container, sandbox) = module_host(&fetch);
    sandbox
        .run(
            "var status = 'waiting';
             var s = document.createElement('script');
             s.src = '/nowhere.js';
             s.onerror = function () { status = 'failed'; };
             document.head.appendChild(s);",
        )
        .unwrap();
    host.settle().await;
    assert_eq!(sandbox.run("status").unwrap(), JsValue::from("failed"));
}

#[test]
fn test_script_without_sandbox_is_inserted_directly() {
    let fetch = MemoryFetch::new();
    let host = host_with(&fetch);
    let vdoc = VirtualDocument::obtain(&host, "orphan", "", None, true);
    let document = host.document();

    let script = document.create_element("script");
    document.set_attribute(script, "src", "/orphan.js");
    let result = vdoc.insert(MutationTarget::Head, script, None);
    assert!(result.is_ok());
    assert_eq!(document.parent(script), Some(document.head()));

    let inline = document.create_element("script");
    vdoc.insert(MutationTarget::Body, inline, None).unwrap();
    assert_eq!(document.parent(inline), Some(document.body()));
    assert_eq!(fetch.total_calls(), 0);
}

// ============================================================================
// Other nodes and the document view
// ============================================================================

#[test]
fn test_body_nodes_go_to_the_virtual_body() {
    let fetch = MemoryFetch::new();
    let (host, container, sandbox) = module_host(&fetch);
    sandbox
        .run("var d = document.createElement('div'); document.body.appendChild(d); var m = document.createElement('meta'); document.head.appendChild(m);")
        .unwrap();
    let document = host.document();
    let div = node(&sandbox, "d");
    let meta = node(&sandbox, "m");
    let virtual_body = document.parent(div).unwrap();
    assert_eq!(
        document.tag_name(virtual_body).as_deref(),
        Some("BODY-ELEMENT-APP-")
    );
    assert_eq!(document.parent(virtual_body), Some(document.body()));
    assert_eq!(document.parent(meta), Some(container));
}

#[test]
fn test_container_keys_split_between_stand_in_and_host() {
    let fetch = MemoryFetch::new();
    let (host, _container, sandbox) = module_host(&fetch);
    assert_eq!(
        sandbox.run("document.body.tagName").unwrap(),
        JsValue::from("BODY-ELEMENT-APP-")
    );
    sandbox.run("document.body.id = 'main';").unwrap();
    let document = host.document();
    assert_eq!(
        document.get_attribute(document.body(), "id").as_deref(),
        Some("main")
    );
    assert_eq!(
        sandbox
            .run("document.body.appendChild(document.createElement('p')); document.body.children.length")
            .unwrap(),
        JsValue::Number(1.0)
    );
}

#[test]
fn test_queries_return_the_virtual_head_and_body() {
    let fetch = MemoryFetch::new();
    let (_host, _container, sandbox) = module_host(&fetch);
    assert_eq!(
        sandbox
            .run("document.querySelector('body') === document.body && document.getElementsByTagName('head')[0] === document.head")
            .unwrap(),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_other_document_keys_mirror_the_host() {
    let fetch = MemoryFetch::new();
    let (host, _container, sandbox) = module_host(&fetch);
    let document = host.document();
    let banner = document.create_element("div");
    document.set_attribute(banner, "id", "banner");
    document.append_child(document.body(), banner).unwrap();
    assert_eq!(
        sandbox.run("document.getElementById('banner').id").unwrap(),
        JsValue::from("banner")
    );
    sandbox.run("document.custom = 1;").unwrap();
    assert_eq!(
        host.eval("document.custom").unwrap(),
        JsValue::Number(1.0)
    );
}
