//! Single-active-drawer coordination.
//!
//! Every slide-in panel (cart drawer, filter panel, search drawer,
//! localization selector) is a [`Drawer`]. Drawers sharing one
//! [`DrawerCoordinator`] are mutually exclusive: opening one closes
//! whichever drawer is currently active before taking its place.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;

pub const ESCAPE_KEY: &str = "Escape";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawerState {
    Closed,
    Open,
}

impl DrawerState {
    pub fn is_open(self) -> bool {
        matches!(self, DrawerState::Open)
    }
}

/// DOM side of one drawer: the attributes and focus the state machine drives.
pub trait DrawerView: Send + Sync {
    /// Whether the server rendered the drawer with its open marker.
    fn is_server_rendered_open(&self) -> bool;
    fn set_open_marker(&self, open: bool);
    /// Mirror the state on the open button (`aria-expanded`).
    fn set_expanded(&self, expanded: bool);
    fn focus_menu(&self);
    /// Whether the click target lies inside the drawer's menu region.
    fn menu_contains(&self, target: &str) -> bool;
}

struct Local {
    state: DrawerState,
    listening: bool,
}

struct DrawerInner {
    identifier: String,
    view: Arc<dyn DrawerView>,
    local: Mutex<Local>,
    coordinator: DrawerCoordinator,
}

impl DrawerInner {
    fn local(&self) -> MutexGuard<'_, Local> {
        self.local.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared pointer to the active drawer. Clones share the same slot.
#[derive(Clone, Default)]
pub struct DrawerCoordinator {
    active: Arc<Mutex<Option<Weak<DrawerInner>>>>,
}

impl fmt::Debug for DrawerCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawerCoordinator")
            .field("active", &self.active_identifier())
            .finish()
    }
}

impl DrawerCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Weak<DrawerInner>>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Currently active drawer, if it is still alive.
    pub fn active(&self) -> Option<Drawer> {
        self.slot()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Drawer { inner })
    }

    pub fn active_identifier(&self) -> Option<String> {
        self.active().map(|d| d.identifier().to_string())
    }

    /// Close the active drawer, if any.
    pub fn close_all(&self) {
        if let Some(drawer) = self.active() {
            drawer.close();
        }
    }

    /// Route a document-level key press to the active drawer.
    pub fn handle_keydown(&self, key: &str) -> bool {
        self.active().is_some_and(|drawer| drawer.on_keydown(key))
    }

    fn is_active(&self, inner: &Arc<DrawerInner>) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|weak| Weak::ptr_eq(weak, &Arc::downgrade(inner)))
    }

    /// Active drawer other than `inner`, if one exists.
    fn other_than(&self, inner: &Arc<DrawerInner>) -> Option<Drawer> {
        self.active()
            .filter(|drawer| !Arc::ptr_eq(&drawer.inner, inner))
    }

    fn set_active(&self, inner: &Arc<DrawerInner>) {
        *self.slot() = Some(Arc::downgrade(inner));
    }

    fn clear_if(&self, inner: &Arc<DrawerInner>) {
        let mut slot = self.slot();
        let matches = slot
            .as_ref()
            .is_some_and(|weak| Weak::ptr_eq(weak, &Arc::downgrade(inner)));
        let dangling = slot.as_ref().is_some_and(|weak| weak.strong_count() == 0);
        if matches || dangling {
            *slot = None;
        }
    }
}

/// Handle to one drawer instance. Clones refer to the same drawer.
#[derive(Clone)]
pub struct Drawer {
    inner: Arc<DrawerInner>,
}

impl fmt::Debug for Drawer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drawer")
            .field("identifier", &self.inner.identifier)
            .field("state", &self.state())
            .finish()
    }
}

impl Drawer {
    /// Attach a drawer to `coordinator`. A drawer rendered open by the
    /// server starts open and claims the active slot, without taking focus.
    pub fn mount(
        identifier: impl Into<String>,
        view: Arc<dyn DrawerView>,
        coordinator: &DrawerCoordinator,
    ) -> Self {
        let drawer = Self {
            inner: Arc::new(DrawerInner {
                identifier: identifier.into(),
                view,
                local: Mutex::new(Local {
                    state: DrawerState::Closed,
                    listening: false,
                }),
                coordinator: coordinator.clone(),
            }),
        };
        if drawer.inner.view.is_server_rendered_open() {
            drawer.transition_open(false);
        }
        drawer
    }

    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    pub fn state(&self) -> DrawerState {
        self.inner.local().state
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    pub fn is_active(&self) -> bool {
        self.inner.coordinator.is_active(&self.inner)
    }

    /// Whether the drawer currently listens for Escape.
    pub fn is_listening(&self) -> bool {
        self.inner.local().listening
    }

    pub fn same_drawer(&self, other: &Drawer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn toggle_open(&self, open: bool) {
        if open {
            self.open();
        } else {
            self.close();
        }
    }

    /// Flip the current state (search drawer open-button behaviour).
    pub fn toggle(&self) {
        self.toggle_open(!self.is_open());
    }

    pub fn open(&self) {
        self.transition_open(true);
    }

    fn transition_open(&self, focus: bool) {
        // Close every other drawer before claiming the slot; a close callback
        // may itself open another drawer, so keep going until the slot is free.
        while let Some(other) = self.inner.coordinator.other_than(&self.inner) {
            tracing::debug!(
                closing = %other.identifier(),
                opening = %self.identifier(),
                "closing active drawer"
            );
            other.close();
        }
        self.inner.coordinator.set_active(&self.inner);
        {
            let mut local = self.inner.local();
            local.state = DrawerState::Open;
            local.listening = true;
        }
        if focus {
            self.inner.view.focus_menu();
        }
        self.inner.view.set_open_marker(true);
        self.inner.view.set_expanded(true);
    }

    pub fn close(&self) {
        self.inner.coordinator.clear_if(&self.inner);
        {
            let mut local = self.inner.local();
            local.state = DrawerState::Closed;
            local.listening = false;
        }
        self.inner.view.set_open_marker(false);
        self.inner.view.set_expanded(false);
    }

    /// Close when open and the click landed outside the menu region.
    pub fn on_outside_click(&self, target: &str) -> bool {
        if self.is_open() && !self.inner.view.menu_contains(target) {
            self.close();
            return true;
        }
        false
    }

    /// Escape only closes the drawer that is currently active.
    pub fn on_keydown(&self, key: &str) -> bool {
        if key != ESCAPE_KEY || !self.is_listening() || !self.is_active() {
            return false;
        }
        self.close();
        true
    }

    /// Detach listeners without a state transition.
    pub fn unmount(&self) {
        self.inner.local().listening = false;
        self.inner.coordinator.clear_if(&self.inner);
    }
}
