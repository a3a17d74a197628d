//! Script-facing view of arena nodes.
//!
//! Each node is exposed as an exotic object whose resolver reads the arena
//! on every access, so a node mutated through one path is seen the same way
//! through every other.

use std::any::Any;
use std::rc::{Rc, Weak};

use log::warn;

use crate::runner::ds::error::{JErrorType, JsResult};
use crate::runner::ds::object::{get_value_property, new_array_value, object_from_entries, ObjectKind};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_function;
use crate::runner::plugin::resolver::PropertyResolver;
use crate::runner::plugin::types::native_closure;

use super::node::{Document, NodeId, NodeKind, DOCUMENT_NODE, HTML_NODE};
use super::virtual_document::ContainerResolver;

const GEOMETRY_KEYS: &[&str] = &[
    "offsetWidth",
    "offsetHeight",
    "offsetLeft",
    "offsetTop",
    "scrollTop",
    "scrollLeft",
    "scrollWidth",
    "scrollHeight",
    "clientTop",
    "clientLeft",
    "clientWidth",
    "clientHeight",
];

/// Attribute-backed string properties.
const REFLECTED: &[(&str, &str)] = &[
    ("id", "id"),
    ("className", "class"),
    ("src", "src"),
    ("href", "href"),
    ("rel", "rel"),
    ("type", "type"),
    ("name", "name"),
];

pub(crate) fn upgrade(document: &Weak<Document>) -> JsResult<Rc<Document>> {
    document
        .upgrade()
        .ok_or_else(|| JErrorType::TypeError("The document has been discarded".to_string()).into())
}

/// The arena node behind a script value, if it is one.
pub fn node_of(value: &JsValue) -> Option<NodeId> {
    let resolver = match value {
        JsValue::Object(o) => match &o.borrow().kind {
            ObjectKind::Exotic(r) => r.clone(),
            _ => return None,
        },
        _ => return None,
    };
    if let Some(element) = resolver.as_any().downcast_ref::<ElementResolver>() {
        return Some(element.id);
    }
    if let Some(container) = resolver.as_any().downcast_ref::<ContainerResolver>() {
        return container.element_id();
    }
    None
}

pub(crate) fn node_arg(args: &[JsValue], index: usize) -> JsResult<NodeId> {
    args.get(index).and_then(node_of).ok_or_else(|| {
        JErrorType::TypeError(format!("parameter {} is not of type 'Node'", index + 1)).into()
    })
}

/// Optional reference node: `null`/`undefined` mean "at the end".
pub(crate) fn reference_arg(args: &[JsValue], index: usize) -> JsResult<Option<NodeId>> {
    match args.get(index) {
        None | Some(JsValue::Undefined) | Some(JsValue::Null) => Ok(None),
        Some(_) => node_arg(args, index).map(Some),
    }
}

fn string_arg(args: &[JsValue], index: usize) -> String {
    args.get(index).map(JsValue::to_display).unwrap_or_default()
}

fn nodes_to_array(document: &Document, ids: Vec<NodeId>) -> JsValue {
    new_array_value(ids.into_iter().map(|id| document.wrap(id)).collect())
}

fn camel_to_kebab(key: &str) -> String {
    let mut out = String::new();
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn kebab_to_camel(key: &str) -> String {
    let mut out = String::new();
    let mut upper = false;
    for c in key.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Dispatches a synthesized event on a node. An `on<type>` handler takes
/// precedence over listeners added with `addEventListener`.
pub fn fire_event(document: &Document, id: NodeId, event_type: &str) {
    let target = document.wrap(id);
    let event = object_from_entries([
        ("type", JsValue::from(event_type)),
        ("target", target.clone()),
        ("srcElement", target.clone()),
    ]);
    let handler = document
        .expando(id, &format!("on{}", event_type))
        .filter(JsValue::is_callable);
    let callbacks = match handler {
        Some(handler) => vec![handler],
        None => document.listeners(id, event_type),
    };
    for callback in callbacks {
        if let Err(e) = call_function(&callback, target.clone(), vec![event.clone()]) {
            warn!(
                "{} handler on <{}> failed: {}",
                event_type,
                document.tag_name(id).unwrap_or_default().to_lowercase(),
                e.into_error()
            );
        }
    }
}

pub struct ElementResolver {
    document: Weak<Document>,
    id: NodeId,
}

impl ElementResolver {
    pub fn new(document: Weak<Document>, id: NodeId) -> Self {
        ElementResolver { document, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    fn method<F>(&self, name: &str, f: F) -> JsValue
    where
        F: Fn(&Document, NodeId, Vec<JsValue>) -> JsResult<JsValue> + 'static,
    {
        let document = self.document.clone();
        let id = self.id;
        native_closure(name, move |_this, args| {
            let doc = upgrade(&document)?;
            f(&doc, id, args)
        })
    }

    fn class_list(&self) -> JsValue {
        object_from_entries([
            (
                "add",
                self.method("add", |doc, id, args| {
                    for class in &args {
                        doc.add_class(id, &class.to_display());
                    }
                    Ok(JsValue::Undefined)
                }),
            ),
            (
                "remove",
                self.method("remove", |doc, id, args| {
                    for class in &args {
                        doc.remove_class(id, &class.to_display());
                    }
                    Ok(JsValue::Undefined)
                }),
            ),
            (
                "contains",
                self.method("contains", |doc, id, args| {
                    let class = string_arg(&args, 0);
                    Ok(JsValue::Boolean(doc.class_list(id).contains(&class)))
                }),
            ),
            (
                "toggle",
                self.method("toggle", |doc, id, args| {
                    let class = string_arg(&args, 0);
                    if doc.class_list(id).contains(&class) {
                        doc.remove_class(id, &class);
                        Ok(JsValue::Boolean(false))
                    } else {
                        doc.add_class(id, &class);
                        Ok(JsValue::Boolean(true))
                    }
                }),
            ),
        ])
    }

    fn document_property(&self, doc: &Document, key: &str) -> Option<JsValue> {
        let value = match key {
            "head" => doc.wrap(doc.head()),
            "body" => doc.wrap(doc.body()),
            "documentElement" => doc.wrap(HTML_NODE),
            "createElement" => self.method("createElement", |doc, _, args| {
                Ok(doc.wrap(doc.create_element(&string_arg(&args, 0))))
            }),
            "createTextNode" => self.method("createTextNode", |doc, _, args| {
                Ok(doc.wrap(doc.create_text_node(&string_arg(&args, 0))))
            }),
            "getElementById" => self.method("getElementById", |doc, _, args| {
                Ok(doc.wrap_option(doc.get_element_by_id(&string_arg(&args, 0))))
            }),
            _ => return None,
        };
        Some(value)
    }

    fn node_property(&self, doc: &Document, key: &str) -> Option<JsValue> {
        let id = self.id;
        let kind = doc.kind(id)?;
        let children = || doc.children(id);
        let element_children = || doc.element_children(id);
        let sibling = |offset: isize, elements_only: bool| {
            let parent = doc.parent(id)?;
            let siblings = if elements_only {
                doc.element_children(parent)
            } else {
                doc.children(parent)
            };
            let index = siblings.iter().position(|c| *c == id)? as isize + offset;
            if index < 0 {
                return None;
            }
            siblings.get(index as usize).copied()
        };
        let value = match key {
            "tagName" | "nodeName" => match &kind {
                NodeKind::Element(tag) => JsValue::from(tag.as_str()),
                NodeKind::Text(_) => JsValue::from("#text"),
                NodeKind::Document => JsValue::from("#document"),
            },
            "nodeType" => JsValue::Number(match &kind {
                NodeKind::Element(_) => 1.0,
                NodeKind::Text(_) => 3.0,
                NodeKind::Document => 9.0,
            }),
            "ownerDocument" => doc.document_object(),
            "parentNode" => doc.wrap_option(doc.parent(id)),
            "parentElement" => doc.wrap_option(doc.parent(id).filter(|p| doc.is_element(*p))),
            "childNodes" => nodes_to_array(doc, children()),
            "children" => nodes_to_array(doc, element_children()),
            "firstChild" => doc.wrap_option(children().first().copied()),
            "lastChild" => doc.wrap_option(children().last().copied()),
            "firstElementChild" => doc.wrap_option(element_children().first().copied()),
            "lastElementChild" => doc.wrap_option(element_children().last().copied()),
            "previousSibling" => doc.wrap_option(sibling(-1, false)),
            "nextSibling" => doc.wrap_option(sibling(1, false)),
            "previousElementSibling" => doc.wrap_option(sibling(-1, true)),
            "nextElementSibling" => doc.wrap_option(sibling(1, true)),
            "text" | "textContent" | "innerText" | "outerText" => {
                JsValue::String(doc.text_content(id))
            }
            "innerHTML" => JsValue::String(doc.inner_html(id)),
            "outerHTML" => JsValue::String(doc.outer_html(id)),
            "classList" => self.class_list(),
            "dataset" => JsValue::from_object(crate::runner::ds::object::JsObject::new_exotic(
                Rc::new(DatasetResolver {
                    document: self.document.clone(),
                    id,
                }),
            )),
            "appendChild" => self.method("appendChild", |doc, id, args| {
                let child = node_arg(&args, 0)?;
                doc.append_child(id, child)?;
                Ok(args[0].clone())
            }),
            "insertBefore" => self.method("insertBefore", |doc, id, args| {
                let child = node_arg(&args, 0)?;
                let reference = reference_arg(&args, 1)?;
                doc.insert_before(id, child, reference)?;
                Ok(args[0].clone())
            }),
            "removeChild" => self.method("removeChild", |doc, id, args| {
                let child = node_arg(&args, 0)?;
                doc.remove_child(id, child)?;
                Ok(args[0].clone())
            }),
            "remove" => self.method("remove", |doc, id, _| {
                doc.remove(id);
                Ok(JsValue::Undefined)
            }),
            "contains" => self.method("contains", |doc, id, args| {
                Ok(JsValue::Boolean(match args.first().and_then(node_of) {
                    Some(other) => doc.contains(id, other),
                    None => false,
                }))
            }),
            "getAttribute" => self.method("getAttribute", |doc, id, args| {
                Ok(match doc.get_attribute(id, &string_arg(&args, 0)) {
                    Some(v) => JsValue::String(v),
                    None => JsValue::Null,
                })
            }),
            "setAttribute" => self.method("setAttribute", |doc, id, args| {
                doc.set_attribute(id, &string_arg(&args, 0), &string_arg(&args, 1));
                Ok(JsValue::Undefined)
            }),
            "removeAttribute" => self.method("removeAttribute", |doc, id, args| {
                doc.remove_attribute(id, &string_arg(&args, 0));
                Ok(JsValue::Undefined)
            }),
            "hasAttribute" => self.method("hasAttribute", |doc, id, args| {
                Ok(JsValue::Boolean(doc.has_attribute(id, &string_arg(&args, 0))))
            }),
            "querySelector" => self.method("querySelector", |doc, id, args| {
                Ok(doc.wrap_option(doc.query_selector(id, &string_arg(&args, 0))?))
            }),
            "querySelectorAll" => self.method("querySelectorAll", |doc, id, args| {
                Ok(nodes_to_array(doc, doc.query_selector_all(id, &string_arg(&args, 0))?))
            }),
            "getElementsByTagName" => self.method("getElementsByTagName", |doc, id, args| {
                Ok(nodes_to_array(
                    doc,
                    doc.get_elements_by_tag_name(id, &string_arg(&args, 0)),
                ))
            }),
            "addEventListener" => self.method("addEventListener", |doc, id, args| {
                if let Some(listener) = args.get(1).filter(|l| l.is_callable()) {
                    doc.add_listener(id, &string_arg(&args, 0), listener.clone());
                }
                Ok(JsValue::Undefined)
            }),
            "removeEventListener" => self.method("removeEventListener", |doc, id, args| {
                if let Some(listener) = args.get(1) {
                    doc.remove_listener(id, &string_arg(&args, 0), listener);
                }
                Ok(JsValue::Undefined)
            }),
            "dispatchEvent" => self.method("dispatchEvent", |doc, id, args| {
                let event = args.first().cloned().unwrap_or(JsValue::Undefined);
                let event_type = get_value_property(&event, "type")?.to_display();
                let target = doc.wrap(id);
                let mut callbacks = doc.listeners(id, &event_type);
                if let Some(handler) = doc
                    .expando(id, &format!("on{}", event_type))
                    .filter(JsValue::is_callable)
                {
                    callbacks.push(handler);
                }
                for callback in callbacks {
                    call_function(&callback, target.clone(), vec![event.clone()])?;
                }
                Ok(JsValue::Boolean(true))
            }),
            _ => {
                if let Some((_, attribute)) = REFLECTED.iter().find(|(k, _)| *k == key) {
                    return Some(JsValue::String(
                        doc.get_attribute(id, attribute).unwrap_or_default(),
                    ));
                }
                if GEOMETRY_KEYS.contains(&key) {
                    return Some(JsValue::Number(0.0));
                }
                return None;
            }
        };
        Some(value)
    }
}

impl PropertyResolver for ElementResolver {
    fn get(&self, key: &str) -> JsResult<JsValue> {
        let doc = upgrade(&self.document)?;
        // Script-assigned properties shadow the built-in surface.
        if let Some(value) = doc.expando(self.id, key) {
            return Ok(value);
        }
        if self.id == DOCUMENT_NODE {
            if let Some(value) = self.document_property(&doc, key) {
                return Ok(value);
            }
        }
        Ok(self.node_property(&doc, key).unwrap_or(JsValue::Undefined))
    }

    fn set(&self, key: &str, value: JsValue) -> JsResult<()> {
        let doc = upgrade(&self.document)?;
        if let Some((_, attribute)) = REFLECTED.iter().find(|(k, _)| *k == key) {
            doc.set_attribute(self.id, attribute, &value.to_display());
            return Ok(());
        }
        match key {
            "text" | "textContent" | "innerText" | "innerHTML" => {
                doc.set_text_content(self.id, &value.to_display());
            }
            _ => doc.set_expando(self.id, key, value),
        }
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        match upgrade(&self.document) {
            Ok(doc) => {
                doc.expando(self.id, key).is_some()
                    || (self.id == DOCUMENT_NODE && self.document_property(&doc, key).is_some())
                    || self.node_property(&doc, key).is_some()
            }
            Err(_) => false,
        }
    }

    fn keys(&self) -> Vec<String> {
        match upgrade(&self.document) {
            Ok(doc) => doc.expando_keys(self.id),
            Err(_) => vec![],
        }
    }

    fn name(&self) -> &str {
        "element"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `element.dataset`, reading and writing `data-*` attributes.
struct DatasetResolver {
    document: Weak<Document>,
    id: NodeId,
}

impl PropertyResolver for DatasetResolver {
    fn get(&self, key: &str) -> JsResult<JsValue> {
        let doc = upgrade(&self.document)?;
        Ok(doc
            .get_attribute(self.id, &format!("data-{}", camel_to_kebab(key)))
            .map(JsValue::String)
            .unwrap_or(JsValue::Undefined))
    }

    fn set(&self, key: &str, value: JsValue) -> JsResult<()> {
        let doc = upgrade(&self.document)?;
        doc.set_attribute(
            self.id,
            &format!("data-{}", camel_to_kebab(key)),
            &value.to_display(),
        );
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        self.keys().iter().any(|k| k == key)
    }

    fn keys(&self) -> Vec<String> {
        match upgrade(&self.document) {
            Ok(doc) => doc
                .attributes(self.id)
                .into_iter()
                .filter_map(|(name, _)| name.strip_prefix("data-").map(kebab_to_camel))
                .collect(),
            Err(_) => vec![],
        }
    }

    fn name(&self) -> &str {
        "dataset"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
