//! Per-module view of the host document.
//!
//! Module code gets a document whose `head` and `body` are stand-in
//! containers. Inserting `<style>`, `<link>` and `<script>` elements into
//! them is intercepted: styles land in the module's own container (scoped
//! when asked to), scripts run in the module's sandbox instead of being
//! inserted. Everything else mirrors the host document.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use log::{debug, warn};

use crate::error::SandboxError;
use crate::host::{name_key, HostWindow};
use crate::runner::ds::error::{Exception, JErrorType, JsResult};
use crate::runner::ds::object::{get_property, has_own_property, new_array_value, own_keys, set_property, JsObject};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::resolver::PropertyResolver;
use crate::runner::plugin::types::native_closure;

use super::element::{fire_event, node_arg, reference_arg};
use super::node::{Document, NodeId, DOCUMENT_NODE};

lazy_static! {
    /// Keys a stand-in container answers itself instead of mirroring the
    /// host head/body.
    static ref CONTAINER_OWN_KEYS: HashSet<&'static str> = [
        "innerText",
        "outerText",
        "innerHTML",
        "outerHTML",
        "textContent",
        "removeChild",
        "remove",
        "children",
        "childNodes",
        "firstElementChild",
        "lastElementChild",
        "previousElementSibling",
        "nextElementSibling",
        "parentNode",
        "parentElement",
        "firstChild",
        "lastChild",
        "previousSibling",
        "nextSibling",
        "offsetWidth",
        "offsetHeight",
        "offsetLeft",
        "offsetTop",
        "offsetParent",
        "scrollTop",
        "scrollLeft",
        "scrollWidth",
        "scrollHeight",
        "clientTop",
        "clientLeft",
        "clientWidth",
        "clientHeight",
        "__sn",
        "tagName",
    ]
    .into_iter()
    .collect();
}

/// Which host element an insertion was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationTarget {
    Head,
    Body,
}

impl MutationTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationTarget::Head => "head",
            MutationTarget::Body => "body",
        }
    }

    fn host_node(&self, document: &Document) -> NodeId {
        match self {
            MutationTarget::Head => document.head(),
            MutationTarget::Body => document.body(),
        }
    }
}

pub struct VirtualDocument {
    host: Weak<HostWindow>,
    name: String,
    key: String,
    container: NodeId,
    scoped_css: bool,
    head: RefCell<Option<NodeId>>,
    body: RefCell<Option<NodeId>>,
    head_object: JsValue,
    body_object: JsValue,
    document_object: JsValue,
    mutation_targets: RefCell<HashMap<NodeId, MutationTarget>>,
    converted: RefCell<HashMap<NodeId, NodeId>>,
}

fn host_of(host: &Weak<HostWindow>) -> JsResult<Rc<HostWindow>> {
    host.upgrade()
        .ok_or_else(|| JErrorType::TypeError("The window has been discarded".to_string()).into())
}

fn vdoc_of(vdoc: &Weak<VirtualDocument>) -> JsResult<Rc<VirtualDocument>> {
    vdoc.upgrade().ok_or_else(|| {
        JErrorType::TypeError("The module document has been discarded".to_string()).into()
    })
}

impl VirtualDocument {
    /// The virtual document for a module instance, created on first use.
    ///
    /// `container` is the module's private container and defaults to the host
    /// body. Later calls for the same name and key return the cached document
    /// and ignore the other arguments.
    pub fn obtain(
        host: &Rc<HostWindow>,
        name: &str,
        key: &str,
        container: Option<NodeId>,
        scoped_css: bool,
    ) -> Rc<VirtualDocument> {
        let cache_key = name_key(name, key);
        if let Some(existing) = host.virtual_document(&cache_key) {
            return existing;
        }
        let document = Rc::new_cyclic(|me: &Weak<VirtualDocument>| {
            let exotic = |resolver: Rc<dyn PropertyResolver>| {
                JsValue::from_object(JsObject::new_exotic(resolver))
            };
            VirtualDocument {
                host: Rc::downgrade(host),
                name: name.to_string(),
                key: key.to_string(),
                container: container.unwrap_or_else(|| host.document().body()),
                scoped_css,
                head: RefCell::new(None),
                body: RefCell::new(None),
                head_object: exotic(Rc::new(ContainerResolver {
                    vdoc: me.clone(),
                    target: MutationTarget::Head,
                })),
                body_object: exotic(Rc::new(ContainerResolver {
                    vdoc: me.clone(),
                    target: MutationTarget::Body,
                })),
                document_object: exotic(Rc::new(VirtualDocumentResolver { vdoc: me.clone() })),
                mutation_targets: RefCell::new(HashMap::new()),
                converted: RefCell::new(HashMap::new()),
            }
        });
        debug!("created virtual document for module `{}` ({})", name, key);
        host.cache_virtual_document(&cache_key, document.clone());
        document
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The module's private container.
    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn document_object(&self) -> JsValue {
        self.document_object.clone()
    }

    pub fn head_object(&self) -> JsValue {
        self.head_object.clone()
    }

    pub fn body_object(&self) -> JsValue {
        self.body_object.clone()
    }

    fn container_object(&self, target: MutationTarget) -> JsValue {
        match target {
            MutationTarget::Head => self.head_object(),
            MutationTarget::Body => self.body_object(),
        }
    }

    /// Tag of the stand-in element for `target`.
    pub fn container_tag(&self, target: MutationTarget) -> String {
        format!(
            "{}-element-{}-{}",
            target.as_str(),
            self.name.to_lowercase(),
            self.key
        )
    }

    /// The stand-in element for `target`, created on first use. An element
    /// with the same tag already in the host document is reused.
    pub fn container_element(&self, target: MutationTarget) -> JsResult<NodeId> {
        let slot = match target {
            MutationTarget::Head => &self.head,
            MutationTarget::Body => &self.body,
        };
        if let Some(id) = *slot.borrow() {
            return Ok(id);
        }
        let host = host_of(&self.host)?;
        let document = host.document();
        let tag = self.container_tag(target);
        let id = match document.find_by_tag(&tag) {
            Some(existing) => existing,
            None => {
                let id = document.create_element(&tag);
                document.add_class(id, &self.name);
                if target == MutationTarget::Body {
                    document.append_child(document.body(), id)?;
                }
                id
            }
        };
        *slot.borrow_mut() = Some(id);
        Ok(id)
    }

    /// Head or body an intercepted `<link>`/`<style>` was inserted into.
    pub fn mutation_target(&self, node: NodeId) -> Option<MutationTarget> {
        self.mutation_targets.borrow().get(&node).copied()
    }

    /// The `<style>` a stylesheet `<link>` was converted into.
    pub fn converted_style(&self, link: NodeId) -> Option<NodeId> {
        self.converted.borrow().get(&link).copied()
    }

    fn module_mark(&self) -> String {
        format!("sandbox-{}", self.name)
    }

    /// `appendChild`/`insertBefore` on a stand-in head or body.
    pub fn insert(
        &self,
        target: MutationTarget,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> JsResult<JsValue> {
        let host = host_of(&self.host)?;
        let document = host.document().clone();
        document.set_attribute(child, "data-module", &self.module_mark());

        match document.tag_name(child).as_deref() {
            Some("LINK") | Some("STYLE") => self.insert_style(&host, &document, target, child, reference),
            Some("SCRIPT") => self.insert_script(&host, &document, target, child, reference),
            _ => {
                let parent = match target {
                    MutationTarget::Body => self.container_element(MutationTarget::Body)?,
                    MutationTarget::Head => self.container,
                };
                let reference = reference.filter(|r| document.parent(*r) == Some(parent));
                document.insert_before(parent, child, reference)?;
                Ok(document.wrap(child))
            }
        }
    }

    fn insert_style(
        &self,
        host: &Rc<HostWindow>,
        document: &Rc<Document>,
        target: MutationTarget,
        element: NodeId,
        reference: Option<NodeId>,
    ) -> JsResult<JsValue> {
        self.mutation_targets.borrow_mut().insert(element, target);
        let mut inserted = element;
        if self.scoped_css {
            let href = document.get_attribute(element, "href").unwrap_or_default();
            let is_stylesheet_link = document.tag_name(element).as_deref() == Some("LINK")
                && document.get_attribute(element, "rel").as_deref() == Some("stylesheet")
                && !href.is_empty();
            if is_stylesheet_link {
                inserted = self.convert_link_to_style(host, document, element, &href);
                self.converted.borrow_mut().insert(element, inserted);
            } else {
                host.css_scoper()
                    .scope(document, self.container, element, &self.name);
            }
        }
        let reference = reference.filter(|r| document.parent(*r) == Some(self.container));
        document.insert_before(self.container, inserted, reference)?;
        Ok(document.wrap(inserted))
    }

    /// Swaps a stylesheet link for a `<style>` filled from the fetched sheet.
    /// `load`/`error` fire on the link once the fetch settles.
    fn convert_link_to_style(
        &self,
        host: &Rc<HostWindow>,
        document: &Rc<Document>,
        link: NodeId,
        href: &str,
    ) -> NodeId {
        let style = document.create_element("style");
        document.set_attribute(style, "data-sandbox-href", href);
        document.set_attribute(style, "data-module", &self.module_mark());

        let response = host.fetch().fetch(href);
        let weak_host = Rc::downgrade(host);
        let container = self.container;
        let name = self.name.clone();
        let href = href.to_string();
        host.spawn(async move {
            let result = response.await;
            let host = match weak_host.upgrade() {
                Some(host) => host,
                None => return,
            };
            let document = host.document();
            match result {
                Ok(response) => {
                    let text = document.create_text_node(response.text());
                    if let Err(e) = document.append_child(style, text) {
                        warn!("module `{}` could not fill stylesheet {}: {}", name, href, e);
                    }
                    host.css_scoper().scope(document, container, style, &name);
                    fire_event(document, link, "load");
                }
                Err(e) => {
                    warn!("module `{}` failed to load stylesheet {}: {}", name, href, e);
                    fire_event(document, link, "error");
                }
            }
        });
        style
    }

    fn insert_script(
        &self,
        host: &Rc<HostWindow>,
        document: &Rc<Document>,
        target: MutationTarget,
        script: NodeId,
        reference: Option<NodeId>,
    ) -> JsResult<JsValue> {
        let sandbox = match host.sandbox(&self.name, &self.key) {
            Some(sandbox) => sandbox,
            None => {
                debug!(
                    "no sandbox registered for module `{}`, inserting script into host {}",
                    self.name,
                    target.as_str()
                );
                let parent = target.host_node(document);
                let reference = reference.filter(|r| document.parent(*r) == Some(parent));
                document.insert_before(parent, script, reference)?;
                return Ok(document.wrap(script));
            }
        };

        let src = document.get_attribute(script, "src").unwrap_or_default();
        if src.is_empty() {
            let code = document.text_content(script);
            return match sandbox.run(&code) {
                Ok(_) => Ok(JsValue::Undefined),
                Err(SandboxError::Execution { source, .. }) => Err(Exception::Error(source)),
                Err(other) => Err(JErrorType::TypeError(other.to_string()).into()),
            };
        }

        let response = host.fetch().fetch(&src);
        let weak_host = Rc::downgrade(host);
        let weak_sandbox = Rc::downgrade(&sandbox);
        let name = self.name.clone();
        host.spawn(async move {
            let result = response.await;
            let (host, sandbox) = match (weak_host.upgrade(), weak_sandbox.upgrade()) {
                (Some(host), Some(sandbox)) => (host, sandbox),
                _ => return,
            };
            let outcome = match result {
                Ok(response) => sandbox.run(response.text()).map(|_| ()),
                Err(e) => Err(SandboxError::from(e)),
            };
            match outcome {
                Ok(()) => fire_event(host.document(), script, "load"),
                Err(e) => {
                    warn!("module `{}` failed to load script {}: {}", name, src, e);
                    fire_event(host.document(), script, "error");
                }
            }
        });
        Ok(JsValue::Undefined)
    }

    /// Replaces host head/body nodes in query results with the stand-ins.
    fn substitute(&self, document: &Document, id: NodeId) -> JsValue {
        if id == document.head() {
            self.head_object()
        } else if id == document.body() {
            self.body_object()
        } else {
            document.wrap(id)
        }
    }
}

/// The stand-in `head` or `body` of a virtual document.
pub struct ContainerResolver {
    vdoc: Weak<VirtualDocument>,
    target: MutationTarget,
}

impl ContainerResolver {
    /// The stand-in element backing this container.
    pub fn element_id(&self) -> Option<NodeId> {
        self.vdoc.upgrade()?.container_element(self.target).ok()
    }

    /// Where a key is answered: the stand-in element itself or the real
    /// host head/body.
    fn delegate(&self, key: &str) -> JsResult<JsValue> {
        let vdoc = vdoc_of(&self.vdoc)?;
        let host = host_of(&vdoc.host)?;
        let document = host.document();
        let node = if CONTAINER_OWN_KEYS.contains(key) {
            vdoc.container_element(self.target)?
        } else {
            self.target.host_node(document)
        };
        Ok(document.wrap(node))
    }

    fn insertion(&self, name: &str, with_reference: bool) -> JsValue {
        let vdoc = self.vdoc.clone();
        let target = self.target;
        native_closure(name, move |_this, args| {
            let vdoc = vdoc_of(&vdoc)?;
            let child = node_arg(&args, 0)?;
            let reference = if with_reference {
                reference_arg(&args, 1)?
            } else {
                None
            };
            vdoc.insert(target, child, reference)
        })
    }
}

impl PropertyResolver for ContainerResolver {
    fn get(&self, key: &str) -> JsResult<JsValue> {
        match key {
            "appendChild" => Ok(self.insertion("appendChild", false)),
            "insertBefore" => Ok(self.insertion("insertBefore", true)),
            _ => match self.delegate(key)? {
                JsValue::Object(o) => get_property(&o, key),
                _ => Ok(JsValue::Undefined),
            },
        }
    }

    fn set(&self, key: &str, value: JsValue) -> JsResult<()> {
        match self.delegate(key)? {
            JsValue::Object(o) => set_property(&o, key, value),
            _ => Ok(()),
        }
    }

    fn has(&self, key: &str) -> bool {
        if key == "appendChild" || key == "insertBefore" {
            return true;
        }
        match self.delegate(key) {
            Ok(JsValue::Object(o)) => has_own_property(&o, key),
            _ => false,
        }
    }

    fn keys(&self) -> Vec<String> {
        match self.delegate("") {
            Ok(JsValue::Object(o)) => own_keys(&o),
            _ => vec![],
        }
    }

    fn name(&self) -> &str {
        self.target.as_str()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The document object module code sees.
struct VirtualDocumentResolver {
    vdoc: Weak<VirtualDocument>,
}

impl VirtualDocumentResolver {
    fn query(&self, name: &str) -> JsValue {
        let vdoc = self.vdoc.clone();
        let kind = name.to_string();
        native_closure(name, move |_this, args| {
            let vdoc = vdoc_of(&vdoc)?;
            let host = host_of(&vdoc.host)?;
            let document = host.document();
            let selector = args.first().map(JsValue::to_display).unwrap_or_default();
            let found = match kind.as_str() {
                "querySelector" => {
                    return Ok(match document.query_selector(DOCUMENT_NODE, &selector)? {
                        Some(id) => vdoc.substitute(document, id),
                        None => JsValue::Null,
                    });
                }
                "querySelectorAll" => document.query_selector_all(DOCUMENT_NODE, &selector)?,
                _ => document.get_elements_by_tag_name(DOCUMENT_NODE, &selector),
            };
            Ok(new_array_value(
                found
                    .into_iter()
                    .map(|id| vdoc.substitute(document, id))
                    .collect(),
            ))
        })
    }

    fn host_document(&self) -> JsResult<JsValue> {
        let vdoc = vdoc_of(&self.vdoc)?;
        Ok(host_of(&vdoc.host)?.document().document_object())
    }
}

impl PropertyResolver for VirtualDocumentResolver {
    fn get(&self, key: &str) -> JsResult<JsValue> {
        match key {
            "head" => Ok(vdoc_of(&self.vdoc)?.container_object(MutationTarget::Head)),
            "body" => Ok(vdoc_of(&self.vdoc)?.container_object(MutationTarget::Body)),
            "querySelector" | "querySelectorAll" | "getElementsByTagName" => Ok(self.query(key)),
            _ => match self.host_document()? {
                JsValue::Object(o) => get_property(&o, key),
                _ => Ok(JsValue::Undefined),
            },
        }
    }

    fn set(&self, key: &str, value: JsValue) -> JsResult<()> {
        match self.host_document()? {
            JsValue::Object(o) => set_property(&o, key, value),
            _ => Ok(()),
        }
    }

    fn has(&self, key: &str) -> bool {
        matches!(
            key,
            "head" | "body" | "querySelector" | "querySelectorAll" | "getElementsByTagName"
        ) || matches!(self.host_document(), Ok(JsValue::Object(o)) if has_own_property(&o, key))
    }

    fn keys(&self) -> Vec<String> {
        match self.host_document() {
            Ok(JsValue::Object(o)) => own_keys(&o),
            _ => vec![],
        }
    }

    fn name(&self) -> &str {
        "document"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obtain_is_cached_per_name_and_key() {
        let host = HostWindow::new();
        let a = VirtualDocument::obtain(&host, "App", "1", None, true);
        let again = VirtualDocument::obtain(&host, "App", "1", None, false);
        let other = VirtualDocument::obtain(&host, "App", "2", None, true);
        assert!(Rc::ptr_eq(&a, &again));
        assert!(!Rc::ptr_eq(&a, &other));
    }

    #[test]
    fn body_container_is_created_once_in_host_body() {
        let host = HostWindow::new();
        let vdoc = VirtualDocument::obtain(&host, "App", "k", None, true);
        let body = vdoc.container_element(MutationTarget::Body).unwrap();
        let document = host.document();
        assert_eq!(
            document.tag_name(body).as_deref(),
            Some("BODY-ELEMENT-APP-K")
        );
        assert_eq!(document.parent(body), Some(document.body()));
        assert_eq!(document.class_list(body), vec!["App".to_string()]);
        assert_eq!(vdoc.container_element(MutationTarget::Body).unwrap(), body);

        let head = vdoc.container_element(MutationTarget::Head).unwrap();
        assert_eq!(document.parent(head), None);
    }

    #[test]
    fn existing_container_tag_is_reused() {
        let host = HostWindow::new();
        let document = host.document();
        let existing = document.create_element("head-element-app-k");
        document.append_child(document.body(), existing).unwrap();
        let vdoc = VirtualDocument::obtain(&host, "App", "k", None, true);
        assert_eq!(vdoc.container_element(MutationTarget::Head).unwrap(), existing);
    }
}
