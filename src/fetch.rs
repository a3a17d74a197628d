//! Injectable fetch function.
//!
//! Everything that touches the network (runtime manifests, runtime bundles,
//! stylesheets and external scripts inserted by module code) goes through a
//! [`Fetch`] so tests and the CLI can substitute their own source.

use std::path::{Component, Path, PathBuf};

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use log::debug;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("invalid url `{url}`: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("request to `{0}` blocked: origin is not allowed")]
    Blocked(String),
    #[error("request to `{url}` failed: {message}")]
    Request { url: String, message: String },
    #[error("request to `{url}` returned status {status}")]
    Status { url: String, status: u16 },
    #[error("could not read `{path}`: {message}")]
    Io { path: String, message: String },
    #[error("body of `{url}` is not valid json: {message}")]
    Decode { url: String, message: String },
}

/// A completed response. The body is read eagerly.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    url: String,
    status: u16,
    body: String,
}

impl FetchResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        FetchResponse {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn into_text(self) -> String {
        self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| FetchError::Decode {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }
}

pub type FetchFuture = LocalBoxFuture<'static, Result<FetchResponse, FetchError>>;

pub trait Fetch {
    fn fetch(&self, url: &str) -> FetchFuture;
}

#[derive(Debug, Clone, Default)]
pub struct FetchConfig {
    /// Relative URLs are resolved against this.
    pub base_url: Option<Url>,
    /// Origins (`scheme://host[:port]`) requests may go to. Empty allows all.
    pub allowed_origins: Vec<String>,
}

impl FetchConfig {
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins
            .push(origin.into().trim_end_matches('/').to_string());
        self
    }

    pub fn resolve(&self, url: &str) -> Result<Url, FetchError> {
        let invalid = |e: url::ParseError| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        };
        match Url::parse(url) {
            Ok(parsed) => Ok(parsed),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base.join(url).map_err(invalid),
                None => Err(invalid(url::ParseError::RelativeUrlWithoutBase)),
            },
            Err(e) => Err(invalid(e)),
        }
    }

    pub fn is_origin_allowed(&self, url: &Url) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        let origin = url.origin().ascii_serialization();
        self.allowed_origins.iter().any(|o| *o == origin)
    }
}

/// Fetches over HTTP(S). Non-2xx responses are errors.
pub struct HttpFetch {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetch {
    pub fn new(config: FetchConfig) -> Self {
        HttpFetch {
            client: reqwest::Client::new(),
            config,
        }
    }
}

impl Default for HttpFetch {
    fn default() -> Self {
        HttpFetch::new(FetchConfig::default())
    }
}

impl Fetch for HttpFetch {
    fn fetch(&self, url: &str) -> FetchFuture {
        let resolved = match self.config.resolve(url) {
            Ok(resolved) => resolved,
            Err(e) => return futures::future::ready(Err(e)).boxed_local(),
        };
        if !self.config.is_origin_allowed(&resolved) {
            return futures::future::ready(Err(FetchError::Blocked(resolved.to_string())))
                .boxed_local();
        }
        let client = self.client.clone();
        async move {
            let url = resolved.to_string();
            debug!("fetching {}", url);
            let request_error = |e: reqwest::Error| FetchError::Request {
                url: url.clone(),
                message: e.to_string(),
            };
            let response = client
                .get(resolved)
                .send()
                .await
                .map_err(request_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url,
                    status: status.as_u16(),
                });
            }
            let body = response.text().await.map_err(request_error)?;
            Ok(FetchResponse::new(url, status.as_u16(), body))
        }
        .boxed_local()
    }
}

/// Serves URL paths from a local directory. Query strings and fragments are
/// ignored; paths may not leave the root.
pub struct DirFetch {
    root: PathBuf,
}

impl DirFetch {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirFetch { root: root.into() }
    }

    fn path_for(&self, url: &str) -> Result<PathBuf, FetchError> {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url
                .split(|c: char| c == '?' || c == '#')
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(FetchError::Blocked(url.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl Fetch for DirFetch {
    fn fetch(&self, url: &str) -> FetchFuture {
        let url = url.to_string();
        let path = self.path_for(&url);
        async move {
            let path = path?;
            debug!("reading {} for {}", path.display(), url);
            let body = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| FetchError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            Ok(FetchResponse::new(url, 200, body))
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_urls_need_a_base() {
        let config = FetchConfig::default();
        assert!(matches!(
            config.resolve("/a.js"),
            Err(FetchError::InvalidUrl { .. })
        ));
        let config = config.with_base_url(Url::parse("https://cdn.example.com/app/").unwrap());
        assert_eq!(
            config.resolve("a.js").unwrap().as_str(),
            "https://cdn.example.com/app/a.js"
        );
        assert_eq!(
            config.resolve("/b.js").unwrap().as_str(),
            "https://cdn.example.com/b.js"
        );
    }

    #[test]
    fn origin_allow_list() {
        let config = FetchConfig::default().allow_origin("https://cdn.example.com/");
        assert!(config.is_origin_allowed(&Url::parse("https://cdn.example.com/x.js").unwrap()));
        assert!(!config.is_origin_allowed(&Url::parse("https://evil.example.com/x.js").unwrap()));
        assert!(FetchConfig::default()
            .is_origin_allowed(&Url::parse("http://anything.test/").unwrap()));
    }

    #[tokio::test]
    async fn blocked_origin_never_sends() {
        let fetch = HttpFetch::new(FetchConfig::default().allow_origin("https://cdn.example.com"));
        let err = fetch.fetch("https://other.example.com/a.js").await.unwrap_err();
        assert!(matches!(err, FetchError::Blocked(_)));
    }

    #[tokio::test]
    async fn dir_fetch_reads_files_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "var foo = 1;").unwrap();
        let fetch = DirFetch::new(dir.path());

        let response = fetch.fetch("/a.js?v=2").await.unwrap();
        assert_eq!(response.text(), "var foo = 1;");
        let response = fetch.fetch("http://localhost/a.js#x").await.unwrap();
        assert_eq!(response.status(), 200);

        assert!(matches!(
            fetch.fetch("/missing.js").await,
            Err(FetchError::Io { .. })
        ));
        assert!(matches!(
            fetch.fetch("../secret.txt").await,
            Err(FetchError::Blocked(_))
        ));
    }

    #[test]
    fn json_decoding_reports_the_url() {
        let response = FetchResponse::new("/r.json", 200, "not json");
        let err = response.json::<Vec<String>>().unwrap_err();
        assert!(matches!(err, FetchError::Decode { url, .. } if url == "/r.json"));
    }
}
