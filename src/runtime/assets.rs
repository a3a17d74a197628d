//! Splitting runtime URLs into stylesheets and scripts.

use log::{debug, warn};

use crate::dom::node::NodeId;
use crate::host::HostWindow;

/// Whether `url` names a stylesheet. Query strings and fragments do not
/// count.
pub fn is_css_url(url: &str) -> bool {
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".css")
}

/// Partitions URLs into `(css, js)`, keeping their order.
pub fn parse_url_assets(urls: &[String]) -> (Vec<String>, Vec<String>) {
    urls.iter().cloned().partition(|url| is_css_url(url))
}

/// Adds `<link rel="stylesheet" data-runtime="{mark}">` for `url` to the
/// host head unless one is already there. Returns the link.
pub fn append_css(host: &HostWindow, mark: &str, url: &str) -> NodeId {
    let document = host.document();
    let existing = document
        .get_elements_by_tag_name(document.head(), "link")
        .into_iter()
        .find(|link| {
            document.get_attribute(*link, "data-runtime").as_deref() == Some(mark)
                && document.get_attribute(*link, "href").as_deref() == Some(url)
        });
    if let Some(link) = existing {
        return link;
    }
    let link = document.create_element("link");
    document.set_attribute(link, "rel", "stylesheet");
    document.set_attribute(link, "href", url);
    document.set_attribute(link, "data-runtime", mark);
    match document.append_child(document.head(), link) {
        Ok(()) => debug!("appended stylesheet {} for {}", url, mark),
        Err(e) => warn!("could not append stylesheet {} for {}: {}", url, mark, e),
    }
    link
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn css_detection_ignores_query_and_fragment() {
        assert!(is_css_url("/a.css"));
        assert!(is_css_url("https://cdn.test/a.CSS?v=1"));
        assert!(is_css_url("/a.css#theme"));
        assert!(!is_css_url("/a.css.js"));
        assert!(!is_css_url("/a.js?f=b.css"));
    }

    #[test]
    fn partition_keeps_order() {
        let (css, js) = parse_url_assets(&strings(&["/1.js", "/a.css", "/2.js", "/b.css?x"]));
        assert_eq!(css, strings(&["/a.css", "/b.css?x"]));
        assert_eq!(js, strings(&["/1.js", "/2.js"]));
    }

    #[test]
    fn stylesheet_is_appended_once() {
        let host = HostWindow::new();
        let first = append_css(&host, "runtime-a", "/a.css");
        let second = append_css(&host, "runtime-a", "/a.css");
        assert_eq!(first, second);
        let document = host.document();
        assert_eq!(document.children(document.head()), vec![first]);
        assert_eq!(
            document.get_attribute(first, "rel").as_deref(),
            Some("stylesheet")
        );
    }
}
