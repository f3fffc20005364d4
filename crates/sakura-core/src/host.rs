use std::fmt;
use std::sync::Arc;

use sakura_events::EventBus;

use crate::drawer::DrawerCoordinator;
use crate::error::HostError;
use crate::sections::SectionRenderer;

/// Shared services every attached component can reach.
#[derive(Debug, Clone, Default)]
pub struct ComponentServices {
    pub bus: EventBus,
    pub drawers: DrawerCoordinator,
}

/// DOM access scoped to one upgraded element.
pub trait ElementDom: SectionRenderer + Send + Sync {
    fn has_attribute(&self, name: &str) -> bool;
    fn toggle_attribute(&self, name: &str, on: bool);
    /// Set an attribute on a related control located by its `data-id`
    /// (for example the button that opens a drawer).
    fn set_control_attribute(&self, control: &str, name: &str, value: &str);
    fn focus(&self, region: &str);
    /// Whether the node `target` sits inside the node `region`.
    fn contains(&self, region: &str, target: &str) -> bool;
}

/// User interaction routed to upgraded components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomEvent {
    /// Click whose target is identified by its `data-id`.
    Click { target: String },
    KeyDown { key: String },
}

impl DomEvent {
    pub fn click(target: impl Into<String>) -> Self {
        DomEvent::Click {
            target: target.into(),
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        DomEvent::KeyDown { key: key.into() }
    }
}

/// Everything a component receives when the document attaches it.
pub struct ComponentContext {
    pub tag: String,
    /// Value of the element's `data-id` attribute.
    pub identifier: Option<String>,
    pub services: ComponentServices,
    pub dom: Arc<dyn ElementDom>,
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("tag", &self.tag)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

impl ComponentContext {
    pub fn bus(&self) -> &EventBus {
        &self.services.bus
    }

    pub fn drawers(&self) -> &DrawerCoordinator {
        &self.services.drawers
    }

    pub fn identifier_or_tag(&self) -> &str {
        self.identifier.as_deref().unwrap_or(&self.tag)
    }
}

/// Two-phase lifecycle driven by the document adapter.
pub trait Component: Send {
    /// Called once the element is upgraded and inserted.
    fn on_attach(&mut self, ctx: &ComponentContext) -> anyhow::Result<()>;

    /// Called when the element leaves the document. Must drop every subscription.
    fn on_detach(&mut self) {}

    fn on_event(&mut self, _event: &DomEvent) {}
}

type ComponentFactory = dyn Fn() -> anyhow::Result<Box<dyn Component>> + Send + Sync;

/// Constructor registered for a tag. The document calls it once per element.
#[derive(Clone)]
pub struct ElementClass {
    name: Arc<str>,
    factory: Arc<ComponentFactory>,
}

impl fmt::Debug for ElementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementClass").field(&self.name).finish()
    }
}

impl ElementClass {
    pub fn new<F>(name: &str, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn Component>> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            factory: Arc::new(factory),
        }
    }

    pub fn of<C>(name: &str) -> Self
    where
        C: Component + Default + 'static,
    {
        Self::new(name, || Ok(Box::new(C::default()) as Box<dyn Component>))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn construct(&self) -> anyhow::Result<Box<dyn Component>> {
        (self.factory)()
    }

    pub fn same_class(&self, other: &ElementClass) -> bool {
        Arc::ptr_eq(&self.factory, &other.factory)
    }
}

/// The document's custom-element mechanism.
pub trait ElementHost: Send + Sync {
    /// Hand the host the services it passes to components on attach.
    fn bind_services(&self, _services: &ComponentServices) {}

    /// Whether at least one element with `tag` is rendered.
    fn contains_tag(&self, tag: &str) -> bool;

    /// Whether the document already has a constructor for `tag`.
    fn is_defined(&self, tag: &str) -> bool;

    /// The constructor registered for `tag`, when the host can report it.
    fn defined_class(&self, _tag: &str) -> Option<ElementClass> {
        None
    }

    fn define(&self, tag: &str, class: ElementClass) -> Result<(), HostError>;
}

/// Custom element names: lowercase ASCII start, at least one hyphen,
/// only lowercase alphanumerics, `-`, `.` and `_`.
pub fn is_valid_custom_element_name(tag: &str) -> bool {
    let mut chars = tag.chars();
    let starts_lower = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    starts_lower
        && tag.contains('-')
        && tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Inert;

    impl Component for Inert {
        fn on_attach(&mut self, _ctx: &ComponentContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn custom_element_names() {
        assert!(is_valid_custom_element_name("cmp-cart-drawer"));
        assert!(is_valid_custom_element_name("x-1.2_b"));
        assert!(!is_valid_custom_element_name("cart"));
        assert!(!is_valid_custom_element_name("Cmp-cart"));
        assert!(!is_valid_custom_element_name("1-cart"));
        assert!(!is_valid_custom_element_name(""));
    }

    #[test]
    fn class_identity_follows_the_factory() {
        let a = ElementClass::of::<Inert>("inert");
        let b = a.clone();
        let c = ElementClass::of::<Inert>("inert");
        assert!(a.same_class(&b));
        assert!(!a.same_class(&c));
        assert_eq!(a.name(), "inert");
        assert!(a.construct().is_ok());
    }
}
