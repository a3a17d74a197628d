//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use micro_sandbox::fetch::{Fetch, FetchError, FetchFuture, FetchResponse};
use micro_sandbox::HostWindow;

/// Serves fixed bodies by URL and counts requests. Every response is
/// delivered after one yield so concurrent callers really overlap.
#[derive(Default)]
pub struct MemoryFetch {
    routes: RefCell<HashMap<String, String>>,
    calls: RefCell<HashMap<String, usize>>,
}

impl MemoryFetch {
    pub fn new() -> Rc<MemoryFetch> {
        Rc::new(MemoryFetch::default())
    }

    pub fn route(&self, url: &str, body: &str) -> &Self {
        self.routes
            .borrow_mut()
            .insert(url.to_string(), body.to_string());
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.borrow().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().values().sum()
    }
}

impl Fetch for MemoryFetch {
    fn fetch(&self, url: &str) -> FetchFuture {
        *self.calls.borrow_mut().entry(url.to_string()).or_default() += 1;
        let body = self.routes.borrow().get(url).cloned();
        let url = url.to_string();
        async move {
            tokio::task::yield_now().await;
            match body {
                Some(body) => Ok(FetchResponse::new(url, 200, body)),
                None => Err(FetchError::Status { url, status: 404 }),
            }
        }
        .boxed_local()
    }
}

/// A host whose network is `fetch`.
pub fn host_with(fetch: &Rc<MemoryFetch>) -> Rc<HostWindow> {
    HostWindow::with_fetch(fetch.clone())
}
