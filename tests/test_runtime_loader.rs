//! Loading shared runtimes and threading their globals through.

mod support;

use micro_sandbox::dom::node::DOCUMENT_NODE;
use micro_sandbox::runner::ds::error::JErrorType;
use micro_sandbox::runner::ds::value::JsValue;
use micro_sandbox::runtime::AssetState;
use micro_sandbox::{
    DependencyBag, Runtime, RuntimeDescriptor, RuntimeLoader, Sandbox, SandboxError, SandboxProps,
};

use support::{host_with, MemoryFetch};

fn num(n: f64) -> JsValue {
    JsValue::Number(n)
}

fn a_and_b() -> Vec<RuntimeDescriptor> {
    vec![
        RuntimeDescriptor::new("a", "/a.js"),
        RuntimeDescriptor::new("b", "/b.js"),
    ]
}

fn routes_for_a_and_b(fetch: &MemoryFetch) {
    fetch
        .route("/a.js", "var foo = 1;")
        .route("/b.js", "var bar = foo + 1;");
}

// ============================================================================
// Parsing runtime settings
// ============================================================================

#[tokio::test]
async fn test_no_runtime_means_no_fetch() {
    let fetch = MemoryFetch::new();
    let host = host_with(&fetch);
    let loader = RuntimeLoader::new(&host);
    assert_eq!(loader.parse_runtime(&Runtime::None).await.unwrap(), None);
    let from_false: Runtime = serde_json::from_str("false").unwrap();
    assert_eq!(loader.parse_runtime(&from_false).await.unwrap(), None);
    assert_eq!(fetch.total_calls(), 0);
}

#[tokio::test]
async fn test_descriptors_accumulate_in_order() {
    let fetch = MemoryFetch::new();
    routes_for_a_and_b(&fetch);
    let host = host_with(&fetch);
    let loader = RuntimeLoader::new(&host);

    let deps = loader
        .parse_runtime(&Runtime::Descriptors(a_and_b()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(deps.keys().collect::<Vec<_>>(), vec!["foo", "bar"]);
    assert_eq!(deps.get("foo"), Some(&num(1.0)));
    assert_eq!(deps.get("bar"), Some(&num(2.0)));
    assert!(!host.has_global("foo"));
    assert!(!host.has_global("bar"));
}

#[tokio::test]
async fn test_manifest_is_fetched_then_loaded() {
    let fetch = MemoryFetch::new();
    routes_for_a_and_b(&fetch);
    fetch.route(
        "/runtime.json",
        r#"[{"id":"a","url":"/a.js"},{"id":"b","url":["/b.js"]}]"#,
    );
    let host = host_with(&fetch);
    let loader = RuntimeLoader::new(&host);

    let deps = loader
        .parse_runtime(&Runtime::from("/runtime.json"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(deps.get("bar"), Some(&num(2.0)));
    assert_eq!(fetch.calls("/runtime.json"), 1);
}

#[tokio::test]
async fn test_malformed_manifest() {
    let fetch = MemoryFetch::new();
    fetch.route("/runtime.json", r#"{"id":"not-a-list"}"#);
    let host = host_with(&fetch);
    let loader = RuntimeLoader::new(&host);
    let err = loader
        .parse_runtime(&Runtime::from("/runtime.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::MalformedDescriptor(_)));
}

#[tokio::test]
async fn test_missing_manifest() {
    let fetch = MemoryFetch::new();
    let host = host_with(&fetch);
    let loader = RuntimeLoader::new(&host);
    let err = loader.fetch_runtime_json("/nope.json").await.unwrap_err();
    assert!(matches!(err, SandboxError::AssetFetch(_)));
}

// ============================================================================
// Load-once cache
// ============================================================================

#[tokio::test]
async fn test_concurrent_loads_share_one_fetch() {
    let fetch = MemoryFetch::new();
    fetch.route("/lib.js", "var lib = { version: 3 };");
    let host = host_with(&fetch);
    let loader = RuntimeLoader::new(&host);
    let descriptor = RuntimeDescriptor::new("lib", "/lib.js");
    let none = DependencyBag::new();

    let (first, second) = futures::join!(
        loader.cache_deps(&descriptor, &none),
        loader.cache_deps(&descriptor, &none)
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(fetch.calls("/lib.js"), 1);
    assert_eq!(first.get("lib"), second.get("lib"));
    assert_eq!(loader.state("lib"), AssetState::Loaded);
}

#[tokio::test]
async fn test_loaded_runtime_is_served_from_cache() {
    let fetch = MemoryFetch::new();
    routes_for_a_and_b(&fetch);
    let host = host_with(&fetch);
    let loader = RuntimeLoader::new(&host);

    assert_eq!(loader.state("a"), AssetState::Init);
    let first = loader.parse_immediately(&a_and_b()).await.unwrap();
    let second = loader.parse_immediately(&a_and_b()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(fetch.calls("/a.js"), 1);
    assert_eq!(fetch.calls("/b.js"), 1);
    assert_eq!(loader.cached_deps("b").unwrap().get("bar"), Some(&num(2.0)));
}

#[tokio::test]
async fn test_loaders_do_not_share_caches() {
    let fetch = MemoryFetch::new();
    routes_for_a_and_b(&fetch);
    let host = host_with(&fetch);
    RuntimeLoader::new(&host)
        .parse_immediately(&a_and_b()[..1])
        .await
        .unwrap();
    RuntimeLoader::new(&host)
        .parse_immediately(&a_and_b()[..1])
        .await
        .unwrap();
    assert_eq!(fetch.calls("/a.js"), 2);
}

// ============================================================================
// Failures and notifications
// ============================================================================

#[tokio::test]
async fn test_load_error_is_terminal_and_broadcast() {
    let fetch = MemoryFetch::new();
    let host = host_with(&fetch);
    host.eval("var states = []; addEventListener('broken', function (e) { states.push(e.type + ':' + e.detail.state); });")
        .unwrap();
    let loader = RuntimeLoader::new(&host);
    let descriptor = RuntimeDescriptor::new("broken", "/broken.js");

    let err = loader
        .cache_deps(&descriptor, &DependencyBag::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::AssetFetch(_)));
    assert_eq!(loader.state("broken"), AssetState::LoadError);

    let again = loader
        .cache_deps(&descriptor, &DependencyBag::new())
        .await
        .unwrap_err();
    assert_eq!(again, SandboxError::RuntimeUnavailable("broken".to_string()));
    assert_eq!(fetch.calls("/broken.js"), 1);
    assert_eq!(
        host.eval("states.join()").unwrap(),
        JsValue::from("broken:LOAD_ERROR")
    );
}

#[tokio::test]
async fn test_successful_load_is_broadcast() {
    let fetch = MemoryFetch::new();
    routes_for_a_and_b(&fetch);
    let host = host_with(&fetch);
    host.eval("var seen = null; addEventListener('a', function (e) { seen = e.detail.state; });")
        .unwrap();
    let loader = RuntimeLoader::new(&host);
    loader.parse_immediately(&a_and_b()[..1]).await.unwrap();
    assert_eq!(host.get_global("seen"), JsValue::from("LOADED"));
}

#[tokio::test]
async fn test_script_error_stops_the_chain() {
    let fetch = MemoryFetch::new();
    fetch
        .route("/bad.js", "nope();")
        .route("/after.js", "var after = 1;");
    let host = host_with(&fetch);
    let loader = RuntimeLoader::new(&host);
    let err = loader
        .parse_immediately(&[
            RuntimeDescriptor::new("bad", "/bad.js"),
            RuntimeDescriptor::new("after", "/after.js"),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err.script_error(), Some(JErrorType::ReferenceError(_))));
    assert_eq!(fetch.calls("/after.js"), 0);
    assert_eq!(loader.state("bad"), AssetState::LoadError);
}

// ============================================================================
// Assets and injection
// ============================================================================

#[tokio::test]
async fn test_css_urls_become_links_in_the_host_head() {
    let fetch = MemoryFetch::new();
    fetch.route("/ui.js", "var ui = 'ready';");
    let host = host_with(&fetch);
    let loader = RuntimeLoader::new(&host);
    let descriptor = RuntimeDescriptor::with_urls("ui", ["/ui.css", "/ui.js"]);
    let deps = loader.parse_immediately(&[descriptor]).await.unwrap();
    assert_eq!(deps.get("ui"), Some(&JsValue::from("ready")));

    let document = host.document();
    let links = document.get_elements_by_tag_name(DOCUMENT_NODE, "link");
    assert_eq!(links.len(), 1);
    assert_eq!(document.parent(links[0]), Some(document.head()));
    assert_eq!(
        document.get_attribute(links[0], "data-runtime").as_deref(),
        Some("runtime-ui")
    );
    assert_eq!(
        document.get_attribute(links[0], "href").as_deref(),
        Some("/ui.css")
    );
    assert_eq!(fetch.calls("/ui.css"), 0);
}

#[tokio::test]
async fn test_module_sees_runtime_globals() {
    let fetch = MemoryFetch::new();
    routes_for_a_and_b(&fetch);
    let host = host_with(&fetch);
    let loader = RuntimeLoader::new(&host);
    let deps = loader
        .parse_runtime(&Runtime::Descriptors(a_and_b()))
        .await
        .unwrap();

    let module = Sandbox::new(&host, SandboxProps::new("module"));
    module.create_context(deps).unwrap();
    assert_eq!(module.run("foo + bar").unwrap(), num(3.0));
    assert!(module.added_properties().is_empty());
}
