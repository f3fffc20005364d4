//! In-process document used by the CLI and the test suites.
//!
//! Elements are plain records (tag, `data-id`, boolean attributes, named
//! regions). Defining a tag upgrades every rendered element with that tag:
//! the component is constructed and attached with the bound services.
//! Component callbacks always run with the document lock released.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::HostError;
use crate::host::{
    is_valid_custom_element_name, Component, ComponentContext, ComponentServices, DomEvent,
    ElementClass, ElementDom, ElementHost,
};
use crate::sections::SectionRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

/// Markup for one element to render.
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    tag: String,
    identifier: Option<String>,
    attributes: Vec<String>,
    regions: Vec<(String, Vec<String>)>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// `data-id` of the element.
    pub fn with_id(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(name.into());
        self
    }

    /// A child node `region` (by `data-id`) containing `children`.
    pub fn with_region<I, S>(mut self, region: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions.push((
            region.into(),
            children.into_iter().map(Into::into).collect(),
        ));
        self
    }
}

#[derive(Debug, Default)]
struct ElementState {
    attributes: BTreeSet<String>,
    controls: BTreeMap<(String, String), String>,
    focused: Option<String>,
    sections: BTreeMap<String, String>,
    renders: usize,
}

/// One rendered element. Implements [`ElementDom`] for its component.
pub struct MemoryElement {
    tag: String,
    identifier: Option<String>,
    regions: BTreeMap<String, BTreeSet<String>>,
    state: Mutex<ElementState>,
}

impl fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryElement")
            .field("tag", &self.tag)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

impl MemoryElement {
    fn from_spec(spec: ElementSpec) -> Self {
        let regions = spec
            .regions
            .into_iter()
            .map(|(region, children)| (region, children.into_iter().collect()))
            .collect();
        Self {
            tag: spec.tag,
            identifier: spec.identifier,
            regions,
            state: Mutex::new(ElementState {
                attributes: spec.attributes.into_iter().collect(),
                ..ElementState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ElementState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn attributes(&self) -> Vec<String> {
        self.state().attributes.iter().cloned().collect()
    }

    pub fn control_attribute(&self, control: &str, name: &str) -> Option<String> {
        self.state()
            .controls
            .get(&(control.to_string(), name.to_string()))
            .cloned()
    }

    pub fn focused(&self) -> Option<String> {
        self.state().focused.clone()
    }

    pub fn section(&self, section: &str) -> Option<String> {
        self.state().sections.get(section).cloned()
    }

    pub fn render_count(&self) -> usize {
        self.state().renders
    }
}

impl SectionRenderer for MemoryElement {
    fn render_section(&self, section: &str, html: &str) {
        let mut state = self.state();
        state.sections.insert(section.to_string(), html.to_string());
        state.renders += 1;
    }
}

impl ElementDom for MemoryElement {
    fn has_attribute(&self, name: &str) -> bool {
        self.state().attributes.contains(name)
    }

    fn toggle_attribute(&self, name: &str, on: bool) {
        let mut state = self.state();
        if on {
            state.attributes.insert(name.to_string());
        } else {
            state.attributes.remove(name);
        }
    }

    fn set_control_attribute(&self, control: &str, name: &str, value: &str) {
        self.state()
            .controls
            .insert((control.to_string(), name.to_string()), value.to_string());
    }

    fn focus(&self, region: &str) {
        self.state().focused = Some(region.to_string());
    }

    fn contains(&self, region: &str, target: &str) -> bool {
        region == target
            || self
                .regions
                .get(region)
                .is_some_and(|children| children.contains(target))
    }
}

struct Node {
    id: NodeId,
    element: Arc<MemoryElement>,
    /// Set once the element has been upgraded. Taken out while a callback runs.
    component: Option<Box<dyn Component>>,
    upgraded: bool,
}

#[derive(Default)]
struct DocState {
    nodes: Vec<Node>,
    definitions: BTreeMap<String, ElementClass>,
    next_id: u64,
}

#[derive(Default)]
pub struct MemoryDocument {
    state: Mutex<DocState>,
    services: Mutex<ComponentServices>,
}

impl fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryDocument")
            .field("nodes", &state.nodes.len())
            .field("defined", &state.definitions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document rendering one bare element per tag.
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let doc = Self::new();
        for tag in tags {
            doc.insert(tag);
        }
        doc
    }

    fn state(&self) -> MutexGuard<'_, DocState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn services(&self) -> ComponentServices {
        self.services
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn insert(&self, tag: impl Into<String>) -> NodeId {
        self.insert_element(ElementSpec::new(tag))
    }

    /// Render an element; it is upgraded immediately when its tag is defined.
    pub fn insert_element(&self, spec: ElementSpec) -> NodeId {
        let element = Arc::new(MemoryElement::from_spec(spec));
        let (id, class) = {
            let mut state = self.state();
            let id = NodeId(state.next_id);
            state.next_id += 1;
            let class = state.definitions.get(element.tag()).cloned();
            state.nodes.push(Node {
                id,
                element: Arc::clone(&element),
                component: None,
                upgraded: false,
            });
            (id, class)
        };
        if let Some(class) = class {
            match self.construct(&class, &element) {
                Ok(component) => self.settle(id, component),
                Err(err) => {
                    tracing::warn!(tag = element.tag(), error = %err, "element upgrade failed")
                }
            }
        }
        id
    }

    /// Remove an element, detaching its component.
    pub fn remove(&self, id: NodeId) -> bool {
        let node = {
            let mut state = self.state();
            let Some(idx) = state.nodes.iter().position(|n| n.id == id) else {
                return false;
            };
            state.nodes.remove(idx)
        };
        if let Some(mut component) = node.component {
            component.on_detach();
        }
        true
    }

    /// Full page transition: every element is detached and dropped, the
    /// document's definitions are forgotten, and `tags` are rendered fresh.
    pub fn navigate<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.navigate_to(tags.into_iter().map(ElementSpec::new));
    }

    pub fn navigate_to<I>(&self, specs: I)
    where
        I: IntoIterator<Item = ElementSpec>,
    {
        let old = {
            let mut state = self.state();
            state.definitions.clear();
            std::mem::take(&mut state.nodes)
        };
        tracing::debug!(detached = old.len(), "page transition");
        for node in old {
            if let Some(mut component) = node.component {
                component.on_detach();
            }
        }
        for spec in specs {
            self.insert_element(spec);
        }
    }

    /// Deliver `event` to one element's component.
    pub fn dispatch(&self, id: NodeId, event: &DomEvent) -> bool {
        let Some(mut component) = self.take_component(id) else {
            return false;
        };
        component.on_event(event);
        self.settle(id, component);
        true
    }

    /// Deliver `event` to every upgraded component, in document order.
    pub fn broadcast(&self, event: &DomEvent) -> usize {
        let ids: Vec<NodeId> = self
            .state()
            .nodes
            .iter()
            .filter(|n| n.component.is_some())
            .map(|n| n.id)
            .collect();
        ids.into_iter().filter(|id| self.dispatch(*id, event)).count()
    }

    pub fn element(&self, id: NodeId) -> Option<Arc<MemoryElement>> {
        self.state()
            .nodes
            .iter()
            .find(|n| n.id == id)
            .map(|n| Arc::clone(&n.element))
    }

    /// First element whose `data-id` is `identifier`.
    pub fn find(&self, identifier: &str) -> Option<Arc<MemoryElement>> {
        self.state()
            .nodes
            .iter()
            .find(|n| n.element.identifier() == Some(identifier))
            .map(|n| Arc::clone(&n.element))
    }

    pub fn node_ids(&self, tag: &str) -> Vec<NodeId> {
        self.state()
            .nodes
            .iter()
            .filter(|n| n.element.tag() == tag)
            .map(|n| n.id)
            .collect()
    }

    pub fn is_defined_tag(&self, tag: &str) -> bool {
        self.state().definitions.contains_key(tag)
    }

    pub fn defined_tags(&self) -> Vec<String> {
        self.state().definitions.keys().cloned().collect()
    }

    pub fn upgraded_count(&self, tag: &str) -> usize {
        self.state()
            .nodes
            .iter()
            .filter(|n| n.upgraded && n.element.tag() == tag)
            .count()
    }

    fn construct(
        &self,
        class: &ElementClass,
        element: &Arc<MemoryElement>,
    ) -> anyhow::Result<Box<dyn Component>> {
        let mut component = class.construct()?;
        self.attach(component.as_mut(), element)?;
        Ok(component)
    }

    fn attach(
        &self,
        component: &mut dyn Component,
        element: &Arc<MemoryElement>,
    ) -> anyhow::Result<()> {
        let ctx = ComponentContext {
            tag: element.tag().to_string(),
            identifier: element.identifier().map(str::to_string),
            services: self.services(),
            dom: Arc::clone(element) as Arc<dyn ElementDom>,
        };
        component.on_attach(&ctx)
    }

    /// Store an attached component; detach it if its node vanished meanwhile.
    fn settle(&self, id: NodeId, component: Box<dyn Component>) {
        let orphan = {
            let mut state = self.state();
            match state.nodes.iter_mut().find(|n| n.id == id) {
                Some(node) => {
                    node.component = Some(component);
                    node.upgraded = true;
                    None
                }
                None => Some(component),
            }
        };
        if let Some(mut component) = orphan {
            component.on_detach();
        }
    }

    fn take_component(&self, id: NodeId) -> Option<Box<dyn Component>> {
        self.state()
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .and_then(|n| n.component.take())
    }
}

impl ElementHost for MemoryDocument {
    fn bind_services(&self, services: &ComponentServices) {
        *self
            .services
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = services.clone();
    }

    fn contains_tag(&self, tag: &str) -> bool {
        self.state().nodes.iter().any(|n| n.element.tag() == tag)
    }

    fn is_defined(&self, tag: &str) -> bool {
        self.is_defined_tag(tag)
    }

    fn defined_class(&self, tag: &str) -> Option<ElementClass> {
        self.state().definitions.get(tag).cloned()
    }

    /// Register `class` and upgrade the rendered elements.
    ///
    /// Every component is constructed before any is attached, so a failing
    /// constructor leaves the document untouched. An `on_attach` failure
    /// rolls the definition back and detaches the siblings already
    /// attached; side effects those attaches had on shared services (a
    /// server-open drawer claiming the active slot) are not reverted.
    fn define(&self, tag: &str, class: ElementClass) -> Result<(), HostError> {
        if !is_valid_custom_element_name(tag) {
            return Err(HostError::InvalidName(tag.to_string()));
        }
        let pending: Vec<(NodeId, Arc<MemoryElement>)> = {
            let mut state = self.state();
            if state.definitions.contains_key(tag) {
                return Err(HostError::AlreadyDefined(tag.to_string()));
            }
            state.definitions.insert(tag.to_string(), class.clone());
            state
                .nodes
                .iter()
                .filter(|n| n.element.tag() == tag && !n.upgraded)
                .map(|n| (n.id, Arc::clone(&n.element)))
                .collect()
        };

        let mut built = Vec::with_capacity(pending.len());
        for (id, element) in pending {
            match class.construct() {
                Ok(component) => built.push((id, element, component)),
                Err(err) => {
                    self.state().definitions.remove(tag);
                    return Err(HostError::Construction(format!("{err:#}")));
                }
            }
        }

        let mut attached: Vec<(NodeId, Box<dyn Component>)> = Vec::with_capacity(built.len());
        for (id, element, mut component) in built {
            if let Err(err) = self.attach(component.as_mut(), &element) {
                self.state().definitions.remove(tag);
                for (_, mut component) in attached {
                    component.on_detach();
                }
                return Err(HostError::Construction(format!("{err:#}")));
            }
            attached.push((id, component));
        }
        for (id, component) in attached {
            self.settle(id, component);
        }
        Ok(())
    }
}
