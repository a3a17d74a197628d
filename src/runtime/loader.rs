//! Fetches, runs and caches runtime bundles.
//!
//! Each runtime id is loaded at most once per loader. While a load is in
//! flight its shared future sits in the cache and every other caller for
//! the same id awaits that future instead of fetching again.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use futures::future::{join_all, LocalBoxFuture, Shared};
use futures::FutureExt;
use log::{debug, error, warn};

use crate::error::SandboxError;
use crate::fetch::{Fetch, FetchResponse};
use crate::host::HostWindow;
use crate::runner::ds::object::object_from_entries;
use crate::runner::ds::value::JsValue;
use crate::sandbox::{DependencyBag, Sandbox, SandboxProps};

use super::assets::{append_css, parse_url_assets};
use super::descriptor::{Runtime, RuntimeDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Init,
    Loading,
    LoadError,
    Loaded,
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetState::Init => "INIT",
            AssetState::Loading => "LOADING",
            AssetState::LoadError => "LOAD_ERROR",
            AssetState::Loaded => "LOADED",
        };
        write!(f, "{}", name)
    }
}

type LoadResult = Result<DependencyBag, SandboxError>;
type SharedLoad = Shared<LocalBoxFuture<'static, LoadResult>>;

enum CacheEntry {
    Loading(SharedLoad),
    Loaded(DependencyBag),
    LoadError,
}

impl CacheEntry {
    fn state(&self) -> AssetState {
        match self {
            CacheEntry::Loading(_) => AssetState::Loading,
            CacheEntry::Loaded(_) => AssetState::Loaded,
            CacheEntry::LoadError => AssetState::LoadError,
        }
    }
}

type RuntimeCache = Rc<RefCell<HashMap<String, CacheEntry>>>;

/// Runs bundle sources in order in a throwaway multi-mode sandbox named
/// `runtime-<id>` and returns the globals they introduced. `deps` are
/// visible to the code as globals.
pub fn execute(
    host: &Rc<HostWindow>,
    id: &str,
    codes: &[String],
    deps: &DependencyBag,
) -> LoadResult {
    let sandbox = Sandbox::new(host, SandboxProps::new(format!("runtime-{}", id)));
    sandbox.create_context(Some(deps.clone()))?;
    for code in codes {
        if let Err(e) = sandbox.run(code) {
            sandbox.clear();
            return Err(e);
        }
    }
    let added = sandbox.added_properties();
    sandbox.clear();
    Ok(added)
}

/// Tells listeners on the host window how the load of `id` ended.
fn broadcast(host: &HostWindow, id: &str, state: AssetState) {
    let event = object_from_entries([
        ("type", JsValue::from(id)),
        (
            "detail",
            object_from_entries([("state", JsValue::String(state.to_string()))]),
        ),
    ]);
    host.dispatch_event(id, event);
}

pub struct RuntimeLoader {
    host: Rc<HostWindow>,
    fetch: Rc<dyn Fetch>,
    cache: RuntimeCache,
}

impl RuntimeLoader {
    /// A loader using the host's fetch function.
    pub fn new(host: &Rc<HostWindow>) -> Self {
        RuntimeLoader::with_fetch(host, host.fetch())
    }

    pub fn with_fetch(host: &Rc<HostWindow>, fetch: Rc<dyn Fetch>) -> Self {
        RuntimeLoader {
            host: host.clone(),
            fetch,
            cache: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn state(&self, id: &str) -> AssetState {
        self.cache
            .borrow()
            .get(id)
            .map_or(AssetState::Init, CacheEntry::state)
    }

    /// The dependency bag of a loaded runtime.
    pub fn cached_deps(&self, id: &str) -> Option<DependencyBag> {
        match self.cache.borrow().get(id) {
            Some(CacheEntry::Loaded(bag)) => Some(bag.clone()),
            _ => None,
        }
    }

    /// Loads whatever a module's `runtime` setting names. `Runtime::None`
    /// resolves to `None` without touching the network.
    pub async fn parse_runtime(&self, runtime: &Runtime) -> Result<Option<DependencyBag>, SandboxError> {
        match runtime {
            Runtime::None => Ok(None),
            Runtime::Manifest(url) => {
                let descriptors = self.fetch_runtime_json(url).await?;
                self.parse_immediately(&descriptors).await.map(Some)
            }
            Runtime::Descriptors(descriptors) => self.parse_immediately(descriptors).await.map(Some),
        }
    }

    /// Loads descriptors one after another. Each one sees the globals of
    /// all previous ones.
    pub async fn parse_immediately(&self, descriptors: &[RuntimeDescriptor]) -> LoadResult {
        let mut accumulated = DependencyBag::new();
        for descriptor in descriptors {
            let deps = self.cache_deps(descriptor, &accumulated).await?;
            accumulated.extend(deps);
        }
        Ok(accumulated)
    }

    /// Fetches a JSON manifest listing runtime descriptors.
    pub async fn fetch_runtime_json(&self, url: &str) -> Result<Vec<RuntimeDescriptor>, SandboxError> {
        if !url.contains(".json") {
            warn!("[runtime] runtime url should be a json file: {}", url);
        }
        let response = self.fetch.fetch(url).await?;
        response
            .json::<Vec<RuntimeDescriptor>>()
            .map_err(|e| SandboxError::MalformedDescriptor(e.to_string()))
    }

    /// Loads one runtime, or hands back the result of the load already done
    /// or in flight for its id.
    pub async fn cache_deps(&self, descriptor: &RuntimeDescriptor, injections: &DependencyBag) -> LoadResult {
        let id = descriptor.id.clone();
        let in_flight = {
            let cache = self.cache.borrow();
            match cache.get(&id) {
                Some(CacheEntry::Loaded(bag)) => {
                    debug!("[runtime] {} served from cache", id);
                    return Ok(bag.clone());
                }
                Some(CacheEntry::LoadError) => return Err(SandboxError::RuntimeUnavailable(id)),
                Some(CacheEntry::Loading(load)) => Some(load.clone()),
                None => None,
            }
        };
        if let Some(load) = in_flight {
            debug!("[runtime] {} is loading, waiting for it", id);
            return load.await;
        }

        let load = self.load(descriptor, injections.clone()).boxed_local().shared();
        self.cache
            .borrow_mut()
            .insert(id, CacheEntry::Loading(load.clone()));
        load.await
    }

    fn load(
        &self,
        descriptor: &RuntimeDescriptor,
        injections: DependencyBag,
    ) -> impl std::future::Future<Output = LoadResult> + 'static {
        let host = self.host.clone();
        let fetch = self.fetch.clone();
        let cache = self.cache.clone();
        let id = descriptor.id.clone();
        let (css, js) = parse_url_assets(&descriptor.urls());
        async move {
            let mark = format!("runtime-{}", id);
            for url in &css {
                append_css(&host, &mark, url);
            }

            let responses = join_all(js.iter().map(|url| fetch.fetch(url))).await;
            let result = responses
                .into_iter()
                .map(|response| response.map(FetchResponse::into_text))
                .collect::<Result<Vec<_>, _>>()
                .map_err(SandboxError::from)
                .and_then(|codes| execute(&host, &id, &codes, &injections));

            match &result {
                Ok(deps) => {
                    cache
                        .borrow_mut()
                        .insert(id.clone(), CacheEntry::Loaded(deps.clone()));
                    debug!("[runtime] {} loaded, {} globals", id, deps.len());
                    broadcast(&host, &id, AssetState::Loaded);
                }
                Err(e) => {
                    cache.borrow_mut().insert(id.clone(), CacheEntry::LoadError);
                    broadcast(&host, &id, AssetState::LoadError);
                    error!("[runtime] {} fetch or execute js assets error: {}", id, e);
                }
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(AssetState::LoadError.to_string(), "LOAD_ERROR");
        assert_eq!(AssetState::Loaded.to_string(), "LOADED");
    }

    #[test]
    fn execute_collects_added_globals_without_touching_the_host() {
        let host = HostWindow::new();
        let mut deps = DependencyBag::new();
        deps.insert("base".to_string(), JsValue::Number(40.0));
        let added = execute(
            &host,
            "calc",
            &["var answer = base + 1;".to_string(), "answer = answer + 1;".to_string()],
            &deps,
        )
        .unwrap();
        assert_eq!(added.get("answer"), Some(&JsValue::Number(42.0)));
        assert!(!added.contains_key("base"));
        assert!(!host.has_global("answer"));
    }

    #[test]
    fn execute_reports_the_failing_script() {
        let host = HostWindow::new();
        let err = execute(&host, "flaky", &["missing()".to_string()], &DependencyBag::new())
            .unwrap_err();
        match &err {
            SandboxError::Execution { module, .. } => assert_eq!(module, "runtime-flaky"),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(host.sandbox("runtime-flaky", "").is_none());
        assert!(matches!(
            err.script_error(),
            Some(crate::runner::ds::error::JErrorType::ReferenceError(_))
        ));
    }
}
