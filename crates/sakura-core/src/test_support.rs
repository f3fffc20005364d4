//! Test doubles shared by unit and integration tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::drawer::DrawerView;
use crate::elements::ElementProvider;
use crate::host::{Component, ComponentContext, ElementClass};
use crate::plugins::Plugin;

/// Drawer view that records what the state machine asked of it.
#[derive(Debug, Default)]
pub struct RecordingView {
    server_open: AtomicBool,
    open_marker: AtomicBool,
    expanded: Mutex<Option<bool>>,
    focus_calls: AtomicUsize,
    menu: Mutex<BTreeSet<String>>,
}

impl RecordingView {
    pub fn set_server_open(&self, open: bool) {
        self.server_open.store(open, Ordering::SeqCst);
        self.open_marker.store(open, Ordering::SeqCst);
    }

    pub fn add_menu_node(&self, id: &str) {
        self.menu.lock().unwrap().insert(id.to_string());
    }

    pub fn open_marker(&self) -> bool {
        self.open_marker.load(Ordering::SeqCst)
    }

    pub fn expanded(&self) -> Option<bool> {
        *self.expanded.lock().unwrap()
    }

    pub fn focus_count(&self) -> usize {
        self.focus_calls.load(Ordering::SeqCst)
    }
}

impl DrawerView for RecordingView {
    fn is_server_rendered_open(&self) -> bool {
        self.server_open.load(Ordering::SeqCst)
    }

    fn set_open_marker(&self, open: bool) {
        self.open_marker.store(open, Ordering::SeqCst);
    }

    fn set_expanded(&self, expanded: bool) {
        *self.expanded.lock().unwrap() = Some(expanded);
    }

    fn focus_menu(&self) {
        self.focus_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn menu_contains(&self, target: &str) -> bool {
        self.menu.lock().unwrap().contains(target)
    }
}

#[derive(Debug, Default)]
struct Inert;

impl Component for Inert {
    fn on_attach(&mut self, _ctx: &ComponentContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Component class with no behaviour.
pub fn inert_class() -> ElementClass {
    ElementClass::of::<Inert>("inert")
}

/// Class whose constructor always fails.
pub fn throwing_class(message: &'static str) -> ElementClass {
    ElementClass::new("throwing", move || Err(anyhow::anyhow!(message)))
}

/// Lazy provider whose loader always rejects.
pub fn failing_element(message: &'static str) -> ElementProvider {
    ElementProvider::lazy(move || async move { Err(anyhow::anyhow!(message)) })
}

/// Plugin that counts lifecycle calls and fails on request.
#[derive(Debug)]
pub struct ScriptedPlugin {
    name: String,
    installs: AtomicUsize,
    uninstalls: AtomicUsize,
    fail_install: AtomicBool,
    fail_uninstall: AtomicBool,
    journal: Option<Arc<Mutex<Vec<String>>>>,
}

impl ScriptedPlugin {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, None))
    }

    /// Plugin that appends `install:<name>` / `uninstall:<name>` to `journal`.
    pub fn journaled(name: &str, journal: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self::build(name, Some(Arc::clone(journal))))
    }

    fn build(name: &str, journal: Option<Arc<Mutex<Vec<String>>>>) -> Self {
        Self {
            name: name.to_string(),
            installs: AtomicUsize::new(0),
            uninstalls: AtomicUsize::new(0),
            fail_install: AtomicBool::new(false),
            fail_uninstall: AtomicBool::new(false),
            journal,
        }
    }

    pub fn fail_install(self: Arc<Self>) -> Arc<Self> {
        self.fail_install.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_uninstall(self: Arc<Self>) -> Arc<Self> {
        self.fail_uninstall.store(true, Ordering::SeqCst);
        self
    }

    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn uninstalls(&self) -> usize {
        self.uninstalls.load(Ordering::SeqCst)
    }

    fn note(&self, what: &str) {
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(format!("{what}:{}", self.name));
        }
    }
}

#[async_trait]
impl Plugin for ScriptedPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "0.0.0-test"
    }

    async fn install(&self) -> anyhow::Result<()> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        self.note("install");
        if self.fail_install.load(Ordering::SeqCst) {
            anyhow::bail!("{} refused to install", self.name);
        }
        Ok(())
    }

    async fn uninstall(&self) -> anyhow::Result<()> {
        self.uninstalls.fetch_add(1, Ordering::SeqCst);
        self.note("uninstall");
        if self.fail_uninstall.load(Ordering::SeqCst) {
            anyhow::bail!("{} refused to uninstall", self.name);
        }
        Ok(())
    }
}
