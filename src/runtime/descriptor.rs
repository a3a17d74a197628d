//! Runtime descriptors as they appear in manifests and module config.

use serde::{de, Deserialize, Deserializer, Serialize};

/// One URL or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlList {
    One(String),
    Many(Vec<String>),
}

impl Default for UrlList {
    fn default() -> Self {
        UrlList::Many(vec![])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeDescriptor {
    pub id: String,
    #[serde(default)]
    pub url: UrlList,
}

impl RuntimeDescriptor {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        RuntimeDescriptor {
            id: id.into(),
            url: UrlList::One(url.into()),
        }
    }

    pub fn with_urls<I, S>(id: impl Into<String>, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RuntimeDescriptor {
            id: id.into(),
            url: UrlList::Many(urls.into_iter().map(Into::into).collect()),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        match &self.url {
            UrlList::One(url) => vec![url.clone()],
            UrlList::Many(urls) => urls.clone(),
        }
    }
}

/// A module's `runtime` setting.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Runtime {
    /// Absent or `false`: nothing to load.
    #[default]
    None,
    /// URL of a JSON manifest listing descriptors.
    Manifest(String),
    Descriptors(Vec<RuntimeDescriptor>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuntimeRepr {
    Flag(bool),
    Manifest(String),
    Descriptors(Vec<RuntimeDescriptor>),
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<RuntimeRepr>::deserialize(deserializer)? {
            None | Some(RuntimeRepr::Flag(false)) => Runtime::None,
            Some(RuntimeRepr::Flag(true)) => {
                return Err(de::Error::custom(
                    "runtime must be false, a manifest URL or a list of descriptors",
                ))
            }
            Some(RuntimeRepr::Manifest(url)) => Runtime::Manifest(url),
            Some(RuntimeRepr::Descriptors(list)) => Runtime::Descriptors(list),
        })
    }
}

impl From<&str> for Runtime {
    fn from(url: &str) -> Self {
        Runtime::Manifest(url.to_string())
    }
}

impl From<Vec<RuntimeDescriptor>> for Runtime {
    fn from(list: Vec<RuntimeDescriptor>) -> Self {
        Runtime::Descriptors(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_true_is_rejected() {
        assert_eq!(serde_json::from_str::<Runtime>("false").unwrap(), Runtime::None);
        assert_eq!(serde_json::from_str::<Runtime>("null").unwrap(), Runtime::None);
        let err = serde_json::from_str::<Runtime>("true").unwrap_err();
        assert!(err.to_string().contains("runtime must be false"));
    }

    #[test]
    fn url_may_be_one_or_many() {
        let list: Vec<RuntimeDescriptor> = serde_json::from_str(
            r#"[{"id":"a","url":"/a.js"},{"id":"b","url":["/b.css","/b.js"]},{"id":"c"}]"#,
        )
        .unwrap();
        assert_eq!(list[0].urls(), vec!["/a.js"]);
        assert_eq!(list[1].urls(), vec!["/b.css", "/b.js"]);
        assert!(list[2].urls().is_empty());
    }

    #[test]
    fn runtime_setting_shapes() {
        let parse = |s: &str| serde_json::from_str::<Runtime>(s).unwrap();
        assert_eq!(parse("false"), Runtime::None);
        assert_eq!(parse("null"), Runtime::None);
        assert_eq!(parse(r#""/runtime.json""#), Runtime::from("/runtime.json"));
        assert_eq!(
            parse(r#"[{"id":"a","url":"/a.js"}]"#),
            Runtime::Descriptors(vec![RuntimeDescriptor::new("a", "/a.js")])
        );
    }
}
