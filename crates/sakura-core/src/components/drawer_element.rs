use std::sync::Arc;

use crate::components::view::DomDrawerView;
use crate::drawer::Drawer;
use crate::host::{Component, ComponentContext, DomEvent, ElementClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawerKind {
    Filter,
    /// The open button toggles instead of only opening.
    Search,
    Localization,
    #[default]
    Generic,
}

impl DrawerKind {
    pub fn name(self) -> &'static str {
        match self {
            DrawerKind::Filter => "filter",
            DrawerKind::Search => "search-drawer",
            DrawerKind::Localization => "localization",
            DrawerKind::Generic => "drawer",
        }
    }

    pub fn class(self) -> ElementClass {
        ElementClass::new(self.name(), move || {
            Ok(Box::new(DrawerElement::new(self)) as Box<dyn Component>)
        })
    }
}

/// Wiring shared by every drawer: open/close buttons, outside clicks,
/// Escape. Cart drawers add bus subscriptions on top (see `CartDrawer`).
pub(crate) struct DrawerControls {
    pub(crate) drawer: Drawer,
    open_button: String,
    close_button: String,
}

impl DrawerControls {
    pub(crate) fn mount(ctx: &ComponentContext) -> Self {
        let identifier = ctx.identifier_or_tag().to_string();
        let view = DomDrawerView::new(identifier.clone(), Arc::clone(&ctx.dom));
        let open_button = view.open_button_id();
        let close_button = view.close_button_id();
        let drawer = Drawer::mount(identifier, Arc::new(view), ctx.drawers());
        Self {
            drawer,
            open_button,
            close_button,
        }
    }

    pub(crate) fn handle(&self, event: &DomEvent, toggle_on_open: bool) {
        match event {
            DomEvent::Click { target } if *target == self.open_button => {
                if toggle_on_open {
                    self.drawer.toggle();
                } else {
                    self.drawer.open();
                }
            }
            DomEvent::Click { target } if *target == self.close_button => self.drawer.close(),
            DomEvent::Click { target } => {
                self.drawer.on_outside_click(target);
            }
            DomEvent::KeyDown { key } => {
                self.drawer.on_keydown(key);
            }
        }
    }
}

/// Filter panel, search drawer, localization selector or a plain drawer.
#[derive(Default)]
pub struct DrawerElement {
    kind: DrawerKind,
    controls: Option<DrawerControls>,
}

impl DrawerElement {
    pub fn new(kind: DrawerKind) -> Self {
        Self {
            kind,
            controls: None,
        }
    }

    pub fn drawer(&self) -> Option<&Drawer> {
        self.controls.as_ref().map(|c| &c.drawer)
    }
}

impl Component for DrawerElement {
    fn on_attach(&mut self, ctx: &ComponentContext) -> anyhow::Result<()> {
        let controls = DrawerControls::mount(ctx);
        tracing::debug!(
            kind = self.kind.name(),
            drawer = controls.drawer.identifier(),
            open = controls.drawer.is_open(),
            "drawer attached"
        );
        self.controls = Some(controls);
        Ok(())
    }

    fn on_detach(&mut self) {
        if let Some(controls) = self.controls.take() {
            controls.drawer.unmount();
        }
    }

    fn on_event(&mut self, event: &DomEvent) {
        if let Some(controls) = &self.controls {
            controls.handle(event, self.kind == DrawerKind::Search);
        }
    }
}
