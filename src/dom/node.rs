//! Arena document.
//!
//! Nodes live in a vector owned by the [`Document`] and are addressed by
//! [`NodeId`]. Scripts see nodes through exotic objects (see
//! [`super::element`]); [`Document::wrap`] hands out exactly one object per
//! node so identity comparisons behave.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::JsObject;
use crate::runner::ds::value::JsValue;

use super::element::ElementResolver;
use super::selector::{parse_selector_list, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

pub const DOCUMENT_NODE: NodeId = NodeId(0);
pub const HTML_NODE: NodeId = NodeId(1);
pub const HEAD_NODE: NodeId = NodeId(2);
pub const BODY_NODE: NodeId = NodeId(3);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element(String),
    Text(String),
}

struct NodeData {
    kind: NodeKind,
    attributes: IndexMap<String, String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    expando: IndexMap<String, JsValue>,
    listeners: IndexMap<String, Vec<JsValue>>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        NodeData {
            kind,
            attributes: IndexMap::new(),
            children: vec![],
            parent: None,
            expando: IndexMap::new(),
            listeners: IndexMap::new(),
        }
    }
}

pub struct Document {
    me: Weak<Document>,
    nodes: RefCell<Vec<NodeData>>,
    wrappers: RefCell<HashMap<NodeId, JsValue>>,
}

impl Document {
    /// A document with `<html><head></head><body></body></html>`.
    pub fn new() -> Rc<Document> {
        let document = Rc::new_cyclic(|me| Document {
            me: me.clone(),
            nodes: RefCell::new(vec![NodeData::new(NodeKind::Document)]),
            wrappers: RefCell::new(HashMap::new()),
        });
        let html = document.create_element("html");
        let head = document.create_element("head");
        let body = document.create_element("body");
        let _ = document.append_child(DOCUMENT_NODE, html);
        let _ = document.append_child(html, head);
        let _ = document.append_child(html, body);
        document
    }

    pub fn head(&self) -> NodeId {
        HEAD_NODE
    }

    pub fn body(&self) -> NodeId {
        BODY_NODE
    }

    fn push(&self, data: NodeData) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(data);
        NodeId(nodes.len() - 1)
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.push(NodeData::new(NodeKind::Element(tag.to_uppercase())))
    }

    pub fn create_text_node(&self, text: &str) -> NodeId {
        self.push(NodeData::new(NodeKind::Text(text.to_string())))
    }

    pub fn exists(&self, id: NodeId) -> bool {
        id.0 < self.nodes.borrow().len()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.borrow().get(id.0).map(|n| n.kind.clone())
    }

    /// Upper-case tag name of an element.
    pub fn tag_name(&self, id: NodeId) -> Option<String> {
        match self.kind(id)? {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.tag_name(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.borrow().get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .borrow()
            .get(id.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .into_iter()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    /// Inclusive: a node contains itself.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<(), JErrorType> {
        if !self.exists(parent) || !self.exists(child) {
            return Err(JErrorType::TypeError("The node does not exist".to_string()));
        }
        if matches!(self.kind(parent), Some(NodeKind::Text(_))) {
            return Err(JErrorType::TypeError(
                "This node type does not support this method".to_string(),
            ));
        }
        if child == DOCUMENT_NODE || self.contains(child, parent) {
            return Err(JErrorType::TypeError(
                "The new child element contains the parent".to_string(),
            ));
        }
        Ok(())
    }

    fn detach(&self, child: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[child.0].parent.take() {
            nodes[parent.0].children.retain(|c| *c != child);
        }
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), JErrorType> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` before `reference`, or at the end when `reference` is
    /// `None`. The child is moved if it already has a parent.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), JErrorType> {
        self.check_insertable(parent, child)?;
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(JErrorType::TypeError(
                    "The node before which the new node is to be inserted is not a child of this node"
                        .to_string(),
                ));
            }
            if reference == child {
                return Ok(());
            }
        }
        self.detach(child);
        let mut nodes = self.nodes.borrow_mut();
        let index = reference
            .and_then(|r| nodes[parent.0].children.iter().position(|c| *c == r))
            .unwrap_or(nodes[parent.0].children.len());
        nodes[parent.0].children.insert(index, child);
        nodes[child.0].parent = Some(parent);
        Ok(())
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), JErrorType> {
        if self.parent(child) != Some(parent) {
            return Err(JErrorType::TypeError(
                "The node to be removed is not a child of this node".to_string(),
            ));
        }
        self.detach(child);
        Ok(())
    }

    pub fn remove(&self, node: NodeId) {
        if self.exists(node) {
            self.detach(node);
        }
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.nodes
            .borrow()
            .get(id.0)
            .and_then(|n| n.attributes.get(&name.to_lowercase()).cloned())
    }

    /// Ignored for non-elements.
    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) {
        if !self.is_element(id) {
            return;
        }
        self.nodes.borrow_mut()[id.0]
            .attributes
            .insert(name.to_lowercase(), value.to_string());
    }

    pub fn remove_attribute(&self, id: NodeId, name: &str) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(id.0) {
            node.attributes.shift_remove(&name.to_lowercase());
        }
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get_attribute(id, name).is_some()
    }

    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        self.nodes
            .borrow()
            .get(id.0)
            .map(|n| {
                n.attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn class_list(&self, id: NodeId) -> Vec<String> {
        self.get_attribute(id, "class")
            .map(|c| c.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn add_class(&self, id: NodeId, class: &str) {
        let mut classes = self.class_list(id);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
            self.set_attribute(id, "class", &classes.join(" "));
        }
    }

    pub fn remove_class(&self, id: NodeId, class: &str) {
        let classes = self.class_list(id);
        if classes.iter().any(|c| c == class) {
            let rest: Vec<_> = classes.into_iter().filter(|c| c != class).collect();
            self.set_attribute(id, "class", &rest.join(" "));
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => text,
            Some(_) => self
                .children(id)
                .into_iter()
                .map(|c| self.text_content(c))
                .collect(),
            None => String::new(),
        }
    }

    /// Replaces all children with a single text node.
    pub fn set_text_content(&self, id: NodeId, text: &str) {
        if let Some(NodeKind::Text(_)) = self.kind(id) {
            self.nodes.borrow_mut()[id.0].kind = NodeKind::Text(text.to_string());
            return;
        }
        for child in self.children(id) {
            self.detach(child);
        }
        if !text.is_empty() {
            let node = self.create_text_node(text);
            let _ = self.append_child(id, node);
        }
    }

    pub fn expando(&self, id: NodeId, key: &str) -> Option<JsValue> {
        self.nodes
            .borrow()
            .get(id.0)
            .and_then(|n| n.expando.get(key).cloned())
    }

    pub fn set_expando(&self, id: NodeId, key: &str, value: JsValue) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(id.0) {
            node.expando.insert(key.to_string(), value);
        }
    }

    pub fn expando_keys(&self, id: NodeId) -> Vec<String> {
        self.nodes
            .borrow()
            .get(id.0)
            .map(|n| n.expando.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn add_listener(&self, id: NodeId, event_type: &str, listener: JsValue) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(id.0) {
            let listeners = node.listeners.entry(event_type.to_string()).or_default();
            if !listeners.iter().any(|l| l.strict_equals(&listener)) {
                listeners.push(listener);
            }
        }
    }

    pub fn remove_listener(&self, id: NodeId, event_type: &str, listener: &JsValue) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(id.0) {
            if let Some(listeners) = node.listeners.get_mut(event_type) {
                listeners.retain(|l| !l.strict_equals(listener));
            }
        }
    }

    pub fn listeners(&self, id: NodeId, event_type: &str) -> Vec<JsValue> {
        self.nodes
            .borrow()
            .get(id.0)
            .and_then(|n| n.listeners.get(event_type).cloned())
            .unwrap_or_default()
    }

    /// Descendants of `root` in document order, `root` excluded.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack: Vec<NodeId> = self.children(root).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).into_iter().rev());
        }
        out
    }

    pub fn get_elements_by_tag_name(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_uppercase();
        self.descendants(root)
            .into_iter()
            .filter(|id| match self.tag_name(*id) {
                Some(t) => tag == "*" || t == tag,
                None => false,
            })
            .collect()
    }

    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.descendants(DOCUMENT_NODE)
            .into_iter()
            .find(|id| self.get_attribute(*id, "id").as_deref() == Some(element_id))
    }

    /// First element in the whole document with this tag.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.get_elements_by_tag_name(DOCUMENT_NODE, tag)
            .into_iter()
            .next()
    }

    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>, JErrorType> {
        let selectors = parse_selector_list(selector)?;
        Ok(self
            .descendants(root)
            .into_iter()
            .filter(|id| selectors.iter().any(|s| self.matches(*id, s)))
            .collect())
    }

    pub fn query_selector(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>, JErrorType> {
        Ok(self.query_selector_all(root, selector)?.into_iter().next())
    }

    fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        let tag = match self.tag_name(id) {
            Some(tag) => tag,
            None => return false,
        };
        let classes = self.class_list(id);
        let attribute = |name: &str| self.get_attribute(id, name);
        let (last, ancestors) = match selector.compounds.split_last() {
            Some(split) => split,
            None => return false,
        };
        if !last.matches(&tag, &classes, &attribute) {
            return false;
        }
        // Descendant combinators, matched greedily from the right.
        let mut current = self.parent(id);
        for compound in ancestors.iter().rev() {
            loop {
                let candidate = match current {
                    Some(c) => c,
                    None => return false,
                };
                current = self.parent(candidate);
                if let Some(tag) = self.tag_name(candidate) {
                    let classes = self.class_list(candidate);
                    let attribute = |name: &str| self.get_attribute(candidate, name);
                    if compound.matches(&tag, &classes, &attribute) {
                        break;
                    }
                }
            }
        }
        true
    }

    /// Markup of a node, for diagnostics and `outerHTML`.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => out.push_str(&text),
            Some(NodeKind::Element(tag)) => {
                let tag = tag.to_lowercase();
                let _ = write!(out, "<{}", tag);
                for (name, value) in self.attributes(id) {
                    let _ = write!(out, " {}=\"{}\"", name, value.replace('"', "&quot;"));
                }
                out.push('>');
                for child in self.children(id) {
                    self.write_html(child, out);
                }
                let _ = write!(out, "</{}>", tag);
            }
            Some(NodeKind::Document) => {
                for child in self.children(id) {
                    self.write_html(child, out);
                }
            }
            None => {}
        }
    }

    /// The script object for a node. Always the same object for the same node.
    pub fn wrap(&self, id: NodeId) -> JsValue {
        if let Some(value) = self.wrappers.borrow().get(&id) {
            return value.clone();
        }
        let resolver = Rc::new(ElementResolver::new(self.me.clone(), id));
        let value = JsValue::from_object(JsObject::new_exotic(resolver));
        self.wrappers.borrow_mut().insert(id, value.clone());
        value
    }

    pub fn wrap_option(&self, id: Option<NodeId>) -> JsValue {
        match id {
            Some(id) => self.wrap(id),
            None => JsValue::Null,
        }
    }

    /// The document node's script object.
    pub fn document_object(&self) -> JsValue {
        self.wrap(DOCUMENT_NODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skeleton_has_head_and_body() {
        let doc = Document::new();
        assert_eq!(doc.tag_name(doc.head()).as_deref(), Some("HEAD"));
        assert_eq!(doc.tag_name(doc.body()).as_deref(), Some("BODY"));
        assert_eq!(doc.parent(doc.body()), Some(HTML_NODE));
        assert_eq!(
            doc.outer_html(HTML_NODE),
            "<html><head></head><body></body></html>"
        );
    }

    #[test]
    fn insert_before_moves_and_orders() {
        let doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("span");
        doc.append_child(BODY_NODE, a).unwrap();
        doc.insert_before(BODY_NODE, b, Some(a)).unwrap();
        assert_eq!(doc.children(BODY_NODE), vec![b, a]);

        doc.append_child(HEAD_NODE, b).unwrap();
        assert_eq!(doc.children(BODY_NODE), vec![a]);
        assert_eq!(doc.parent(b), Some(HEAD_NODE));
    }

    #[test]
    fn insertion_errors() {
        let doc = Document::new();
        let a = doc.create_element("div");
        let stray = doc.create_element("p");
        assert!(doc.insert_before(BODY_NODE, a, Some(stray)).is_err());
        assert!(doc.append_child(BODY_NODE, HTML_NODE).is_err());
        assert!(doc.remove_child(BODY_NODE, stray).is_err());
    }

    #[test]
    fn selectors() {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "class", "app main");
        doc.set_attribute(div, "id", "root");
        let link = doc.create_element("link");
        doc.set_attribute(link, "data-runtime", "runtime-a");
        doc.append_child(BODY_NODE, div).unwrap();
        doc.append_child(div, link).unwrap();

        assert_eq!(doc.query_selector(DOCUMENT_NODE, "#root").unwrap(), Some(div));
        assert_eq!(doc.query_selector(DOCUMENT_NODE, "div.app.main").unwrap(), Some(div));
        assert_eq!(
            doc.query_selector(DOCUMENT_NODE, "body .app link").unwrap(),
            Some(link)
        );
        assert_eq!(
            doc.query_selector(DOCUMENT_NODE, r#"link[data-runtime="runtime-a"]"#)
                .unwrap(),
            Some(link)
        );
        assert_eq!(doc.query_selector(DOCUMENT_NODE, "head link").unwrap(), None);
        assert_eq!(
            doc.query_selector_all(DOCUMENT_NODE, "head, body").unwrap(),
            vec![HEAD_NODE, BODY_NODE]
        );
        assert_eq!(doc.get_element_by_id("root"), Some(div));
    }

    #[test]
    fn text_content_round_trip() {
        let doc = Document::new();
        let style = doc.create_element("style");
        doc.set_text_content(style, ".a { color: red }");
        assert_eq!(doc.text_content(style), ".a { color: red }");
        assert_eq!(doc.children(style).len(), 1);
    }

    #[test]
    fn wrap_is_stable() {
        let doc = Document::new();
        assert!(doc.wrap(BODY_NODE).strict_equals(&doc.wrap(BODY_NODE)));
        assert!(!doc.wrap(BODY_NODE).strict_equals(&doc.wrap(HEAD_NODE)));
    }
}
