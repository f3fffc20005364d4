//! Application root: owns the bus, both registries and the drawer slot.

use std::fmt;
use std::sync::Arc;

use sakura_events::EventBus;
use serde::Serialize;

use crate::config::SakuraManifest;
use crate::drawer::DrawerCoordinator;
use crate::elements::{ElementDefinition, ElementRegistry};
use crate::host::{ComponentServices, ElementHost};
use crate::plugins::{PluginProvider, PluginRegistry};
use crate::report::{DefineReport, EntrySummary, InstallReport, ResetReport};

pub struct SakuraOptions {
    pub host: Arc<dyn ElementHost>,
    pub debug: bool,
    /// Share an existing bus instead of creating one.
    pub bus: Option<EventBus>,
    pub drawers: Option<DrawerCoordinator>,
}

impl SakuraOptions {
    pub fn new(host: Arc<dyn ElementHost>) -> Self {
        Self {
            host,
            debug: false,
            bus: None,
            drawers: None,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_drawers(mut self, drawers: DrawerCoordinator) -> Self {
        self.drawers = Some(drawers);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootReport {
    pub elements: DefineReport,
    pub plugins: InstallReport,
}

impl BootReport {
    pub fn is_clean(&self) -> bool {
        self.elements.is_clean() && self.plugins.failed.is_empty()
    }
}

/// Point-in-time view of everything the root owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub elements: Vec<EntrySummary>,
    pub plugins: Vec<EntrySummary>,
    pub topics: Vec<String>,
    pub active_drawer: Option<String>,
}

pub struct Sakura {
    services: ComponentServices,
    elements: ElementRegistry,
    plugins: PluginRegistry,
    debug: bool,
}

impl fmt::Debug for Sakura {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sakura")
            .field("debug", &self.debug)
            .field("elements", &self.elements)
            .field("plugins", &self.plugins)
            .finish()
    }
}

impl Sakura {
    pub fn new(options: SakuraOptions) -> Self {
        let SakuraOptions {
            host,
            debug,
            bus,
            drawers,
        } = options;
        let services = ComponentServices {
            bus: bus.unwrap_or_else(|| EventBus::with_debug(debug)),
            drawers: drawers.unwrap_or_default(),
        };
        host.bind_services(&services);
        Self {
            services,
            elements: ElementRegistry::new(host),
            plugins: PluginRegistry::new(),
            debug,
        }
    }

    /// Root for `host` configured by `manifest` (debug flag only; the
    /// definitions are passed to [`Self::init`]).
    pub fn from_manifest(host: Arc<dyn ElementHost>, manifest: &SakuraManifest) -> Self {
        Self::new(SakuraOptions::new(host).with_debug(manifest.debug))
    }

    pub fn bus(&self) -> &EventBus {
        &self.services.bus
    }

    pub fn drawers(&self) -> &DrawerCoordinator {
        &self.services.drawers
    }

    pub fn services(&self) -> &ComponentServices {
        &self.services
    }

    pub fn elements(&self) -> &ElementRegistry {
        &self.elements
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Define every element, then install every plugin. Never fails; look at
    /// the report for units that did not make it.
    pub async fn init<E, P>(&self, elements: E, plugins: P) -> BootReport
    where
        E: IntoIterator<Item = ElementDefinition>,
        P: IntoIterator<Item = PluginProvider>,
    {
        let report = BootReport {
            elements: self.define(elements).await,
            plugins: self.install(plugins).await,
        };
        tracing::info!(
            defined = report.elements.defined.len(),
            skipped = report.elements.skipped.len(),
            failed = report.elements.failed.len(),
            plugins = report.plugins.installed.len(),
            plugin_failures = report.plugins.failed.len(),
            "sakura initialised"
        );
        report
    }

    pub async fn define<E>(&self, elements: E) -> DefineReport
    where
        E: IntoIterator<Item = ElementDefinition>,
    {
        self.elements.define_all(elements).await
    }

    pub async fn install<P>(&self, plugins: P) -> InstallReport
    where
        P: IntoIterator<Item = PluginProvider>,
    {
        self.plugins.install_all(plugins).await
    }

    /// Re-run every declared definition against the new document.
    pub async fn page_transition(&self) -> DefineReport {
        self.elements.clear();
        let report = self.elements.redefine().await;
        tracing::info!(
            defined = report.defined.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "page transition"
        );
        report
    }

    pub fn handle_keydown(&self, key: &str) -> bool {
        self.services.drawers.handle_keydown(key)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            elements: self.elements.summaries(),
            plugins: self.plugins.summaries(),
            topics: self.services.bus.topics(),
            active_drawer: self.services.drawers.active_identifier(),
        }
    }

    pub async fn teardown(&self) -> ResetReport {
        let report = self.plugins.reset().await;
        self.elements.purge();
        self.services.bus.clear();
        self.services.drawers.close_all();
        tracing::info!(
            uninstalled = report.uninstalled.len(),
            failed = report.failed.len(),
            "sakura torn down"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ElementProvider;
    use crate::memory::MemoryDocument;
    use crate::test_support::{inert_class, ScriptedPlugin};

    #[tokio::test]
    async fn init_defines_then_installs() {
        let doc = Arc::new(MemoryDocument::with_tags(["a-widget"]));
        let app = Sakura::new(SakuraOptions::new(doc.clone()));
        let plugin = ScriptedPlugin::new("analytics");
        let report = app
            .init(
                [ElementDefinition::new("a-widget", ElementProvider::eager(inert_class()))],
                [PluginProvider::Instance(plugin.clone())],
            )
            .await;
        assert!(report.is_clean());
        assert_eq!(report.elements.defined, vec!["a-widget"]);
        assert_eq!(report.plugins.installed, vec!["analytics"]);
        assert!(doc.is_defined_tag("a-widget"));
    }

    #[tokio::test]
    async fn injected_bus_is_shared() {
        let bus = EventBus::new();
        let doc = Arc::new(MemoryDocument::new());
        let app = Sakura::new(SakuraOptions::new(doc).with_bus(bus.clone()).with_debug(true));
        let h = sakura_events::sync_handler(|_| Ok(()));
        app.bus().subscribe("cart:add-item", h.clone());
        assert!(bus.is_subscribed("cart:add-item", &h));
        assert!(app.is_debug());
    }

    #[tokio::test]
    async fn teardown_empties_everything() {
        let doc = Arc::new(MemoryDocument::with_tags(["a-widget"]));
        let app = Sakura::new(SakuraOptions::new(doc));
        app.init(
            [ElementDefinition::new("a-widget", ElementProvider::eager(inert_class()))],
            [PluginProvider::Instance(ScriptedPlugin::new("analytics"))],
        )
        .await;
        app.bus()
            .subscribe("filter:change", sakura_events::sync_handler(|_| Ok(())));

        let report = app.teardown().await;
        assert_eq!(report.uninstalled, vec!["analytics"]);
        let snapshot = app.snapshot();
        assert!(snapshot.elements.is_empty());
        assert!(snapshot.plugins.is_empty());
        assert!(snapshot.topics.is_empty());
        assert!(app.elements().declared_tags().is_empty());
    }
}
