//! Style scoping hook.
//!
//! The rewrite rules themselves belong to the embedder. The interceptor only
//! decides when a style element needs scoping and hands it over.

use super::node::{Document, NodeId};

pub trait CssScoper {
    /// Rewrites the text of `style` so its rules only apply inside
    /// `container`. `module_name` identifies the module the style came from.
    fn scope(&self, document: &Document, container: NodeId, style: NodeId, module_name: &str);
}

impl<F> CssScoper for F
where
    F: Fn(&Document, NodeId, NodeId, &str),
{
    fn scope(&self, document: &Document, container: NodeId, style: NodeId, module_name: &str) {
        self(document, container, style, module_name)
    }
}

/// Leaves styles untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScoper;

impl CssScoper for NoopScoper {
    fn scope(&self, _: &Document, _: NodeId, _: NodeId, _: &str) {}
}

/// Prefixes every selector of a style element with the container's class.
///
/// A small scoper for embedders that have no rewriting of their own. It
/// does not descend into `@media` blocks.
pub struct PrefixScoper;

impl CssScoper for PrefixScoper {
    fn scope(&self, document: &Document, container: NodeId, style: NodeId, _module_name: &str) {
        let prefix = match document.class_list(container).first() {
            Some(class) => format!(".{}", class),
            None => return,
        };
        let text = document.text_content(style);
        document.set_text_content(style, &prefix_rules(&text, &prefix));
    }
}

fn prefix_rules(css: &str, prefix: &str) -> String {
    let mut out = String::new();
    let mut rest = css;
    while let Some(open) = rest.find('{') {
        let (selectors, tail) = rest.split_at(open);
        let close = tail.find('}').map(|i| i + 1).unwrap_or(tail.len());
        let selectors = selectors.trim();
        if !out.is_empty() {
            out.push(' ');
        }
        if selectors.starts_with('@') {
            out.push_str(selectors);
        } else {
            let scoped: Vec<String> = selectors
                .split(',')
                .map(|s| format!("{} {}", prefix, s.trim()))
                .collect();
            out.push_str(&scoped.join(", "));
        }
        out.push(' ');
        out.push_str(&tail[..close]);
        rest = &tail[close..];
    }
    out.push_str(rest.trim());
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_each_selector() {
        assert_eq!(
            prefix_rules(".a, div { color: red }\n p{margin:0}", ".app"),
            ".app .a, .app div { color: red } .app p {margin:0}"
        );
    }

    #[test]
    fn closures_are_scopers() {
        let doc = Document::new();
        let style = doc.create_element("style");
        let scoper = |d: &Document, _: NodeId, s: NodeId, name: &str| {
            d.set_text_content(s, &format!("/* {} */", name));
        };
        scoper.scope(&doc, doc.body(), style, "app");
        assert_eq!(doc.text_content(style), "/* app */");
    }
}
