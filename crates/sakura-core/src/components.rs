//! Drawer-based theme components.

mod cart_drawer;
mod drawer_element;
mod view;

use crate::host::ElementClass;

pub use cart_drawer::CartDrawer;
pub use drawer_element::{DrawerElement, DrawerKind};
pub use view::{DomDrawerView, ERROR_ATTRIBUTE, OPEN_ATTRIBUTE};

/// Component names the manifest may reference.
pub const COMPONENT_NAMES: &[&str] = &[
    "cart-drawer",
    "filter",
    "search-drawer",
    "localization",
    "drawer",
];

/// Element class for a built-in component name.
pub fn element_class(name: &str) -> Option<ElementClass> {
    let class = match name {
        "cart-drawer" => ElementClass::of::<CartDrawer>(name),
        "filter" => DrawerKind::Filter.class(),
        "search-drawer" => DrawerKind::Search.class(),
        "localization" => DrawerKind::Localization.class(),
        "drawer" => DrawerKind::Generic.class(),
        _ => return None,
    };
    Some(class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_name() {
        for name in COMPONENT_NAMES {
            let class = element_class(name).expect("known component");
            assert!(class.construct().is_ok());
        }
        assert!(element_class("cursor").is_none());
    }
}
