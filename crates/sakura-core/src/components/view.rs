use std::sync::Arc;

use crate::drawer::DrawerView;
use crate::host::ElementDom;

/// Boolean attribute marking an open drawer.
pub const OPEN_ATTRIBUTE: &str = "data-open";
/// Boolean attribute that reveals a component's error slot.
pub const ERROR_ATTRIBUTE: &str = "data-error";

/// [`DrawerView`] over an element's DOM, following the theme's `data-id`
/// convention: `{id}-menu`, `{id}-open-button`, `{id}-close-button`.
pub struct DomDrawerView {
    identifier: String,
    dom: Arc<dyn ElementDom>,
}

impl DomDrawerView {
    pub fn new(identifier: impl Into<String>, dom: Arc<dyn ElementDom>) -> Self {
        Self {
            identifier: identifier.into(),
            dom,
        }
    }

    pub fn menu_id(&self) -> String {
        format!("{}-menu", self.identifier)
    }

    pub fn open_button_id(&self) -> String {
        format!("{}-open-button", self.identifier)
    }

    pub fn close_button_id(&self) -> String {
        format!("{}-close-button", self.identifier)
    }
}

impl DrawerView for DomDrawerView {
    fn is_server_rendered_open(&self) -> bool {
        self.dom.has_attribute(OPEN_ATTRIBUTE)
    }

    fn set_open_marker(&self, open: bool) {
        self.dom.toggle_attribute(OPEN_ATTRIBUTE, open);
    }

    fn set_expanded(&self, expanded: bool) {
        let value = if expanded { "true" } else { "false" };
        self.dom
            .set_control_attribute(&self.open_button_id(), "aria-expanded", value);
    }

    fn focus_menu(&self) {
        self.dom.focus(&self.menu_id());
    }

    fn menu_contains(&self, target: &str) -> bool {
        self.dom.contains(&self.menu_id(), target)
    }
}
