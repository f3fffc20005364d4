//! Optional behaviour units installed outside the element lifecycle.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::elements::RegistryEntry;
use crate::error::PluginError;
use crate::provider::Lazy;
use crate::report::{EntrySummary, InstallReport, ResetReport, UnitIssue};
use crate::slots::Slots;

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Registry key. Expected to be unique across installed plugins.
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    async fn install(&self) -> anyhow::Result<()>;
    async fn uninstall(&self) -> anyhow::Result<()>;
}

pub type PluginConstructor = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync>;

/// The accepted plugin shapes.
#[derive(Clone)]
pub enum PluginProvider {
    Instance(Arc<dyn Plugin>),
    Constructor(PluginConstructor),
    /// Loads a constructor, which is then instantiated.
    Lazy(Lazy<PluginConstructor>),
}

impl fmt::Debug for PluginProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginProvider::Instance(p) => f
                .debug_tuple("Instance")
                .field(&format_args!("{}@{}", p.name(), p.version()))
                .finish(),
            PluginProvider::Constructor(_) => f.write_str("Constructor(..)"),
            PluginProvider::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl PluginProvider {
    pub fn instance<P: Plugin + 'static>(plugin: P) -> Self {
        PluginProvider::Instance(Arc::new(plugin))
    }

    pub fn constructor<F>(ctor: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        PluginProvider::Constructor(Arc::new(ctor))
    }

    /// Constructor for a `Default` plugin type.
    pub fn of<P: Plugin + Default + 'static>() -> Self {
        Self::constructor(|| Ok(Arc::new(P::default()) as Arc<dyn Plugin>))
    }

    pub fn lazy<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<PluginConstructor>> + Send + 'static,
    {
        PluginProvider::Lazy(Lazy::new(loader))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PluginProvider::Instance(_) => "instance",
            PluginProvider::Constructor(_) => "constructor",
            PluginProvider::Lazy(_) => "lazy",
        }
    }

    async fn resolve(&self) -> anyhow::Result<Arc<dyn Plugin>> {
        match self {
            PluginProvider::Instance(plugin) => Ok(Arc::clone(plugin)),
            PluginProvider::Constructor(ctor) => ctor(),
            PluginProvider::Lazy(loader) => {
                let ctor = loader.load().await?;
                ctor()
            }
        }
    }
}

pub struct PluginRegistry {
    entries: Mutex<Slots<RegistryEntry<PluginProvider>>>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("entries", &self.summaries())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Slots::default()),
        }
    }

    fn entries_mut(&self) -> MutexGuard<'_, Slots<RegistryEntry<PluginProvider>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve, then install. A failure is recorded under a generated id
    /// (the plugin name may be unknown) and returned, never escalated.
    pub async fn install(&self, provider: PluginProvider) -> Result<String, PluginError> {
        match self.try_install(&provider).await {
            Ok(name) => Ok(name),
            Err(err) => {
                let key = Uuid::new_v4().to_string();
                tracing::warn!(entry = %key, error = %err, "failed to install plugin");
                self.entries_mut().insert(
                    key,
                    RegistryEntry {
                        active: false,
                        provider,
                        error: Some(err.to_string()),
                    },
                );
                Err(err)
            }
        }
    }

    async fn try_install(&self, provider: &PluginProvider) -> Result<String, PluginError> {
        let instance = provider
            .resolve()
            .await
            .map_err(|source| PluginError::Resolution {
                kind: provider.kind(),
                source,
            })?;
        let name = instance.name().to_string();

        if let Some(previous) = self.active_instance(&name) {
            if Arc::ptr_eq(&previous, &instance) {
                tracing::debug!(plugin = %name, "plugin already installed");
                return Ok(name);
            }
            self.replace_occupant(&name, previous).await;
        }

        instance
            .install()
            .await
            .map_err(|source| PluginError::Install {
                name: name.clone(),
                source,
            })?;
        self.entries_mut().insert(
            name.clone(),
            RegistryEntry {
                active: true,
                provider: PluginProvider::Instance(instance.clone()),
                error: None,
            },
        );
        tracing::info!(plugin = %name, version = instance.version(), "plugin installed");
        Ok(name)
    }

    /// Uninstall the active occupant of `name` so a newcomer can take the slot.
    async fn replace_occupant(&self, name: &str, previous: Arc<dyn Plugin>) {
        tracing::warn!(plugin = name, "replacing installed plugin with the same name");
        let error = match previous.uninstall().await {
            Ok(()) => "replaced".to_string(),
            Err(err) => {
                tracing::warn!(plugin = name, error = %err, "previous plugin failed to uninstall");
                format!("replaced; uninstall failed: {err}")
            }
        };
        if let Some(entry) = self.entries_mut().get_mut(name) {
            entry.active = false;
            entry.error = Some(error);
        }
    }

    fn active_instance(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        match self.entries_mut().get(name) {
            Some(RegistryEntry {
                active: true,
                provider: PluginProvider::Instance(plugin),
                ..
            }) => Some(Arc::clone(plugin)),
            _ => None,
        }
    }

    /// Install every provider in order, sequentially.
    pub async fn install_all<I>(&self, providers: I) -> InstallReport
    where
        I: IntoIterator<Item = PluginProvider>,
    {
        let mut report = InstallReport::default();
        for provider in providers {
            let kind = provider.kind();
            match self.install(provider).await {
                Ok(name) => report.installed.push(name),
                Err(err) => report.failed.push(UnitIssue::new(kind, err)),
            }
        }
        report
    }

    /// Uninstall an active plugin and drop its entry. Returns `Ok(false)`
    /// when nothing active is registered under `name`.
    pub async fn uninstall(&self, name: &str) -> Result<bool, PluginError> {
        let Some(plugin) = self.active_instance(name) else {
            return Ok(false);
        };
        match plugin.uninstall().await {
            Ok(()) => {
                self.entries_mut().remove(name);
                tracing::info!(plugin = name, "plugin uninstalled");
                Ok(true)
            }
            Err(source) => {
                let err = PluginError::Uninstall {
                    name: name.to_string(),
                    source,
                };
                tracing::warn!(plugin = name, error = %err, "failed to uninstall plugin");
                if let Some(entry) = self.entries_mut().get_mut(name) {
                    entry.active = false;
                    entry.error = Some(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Uninstall every active plugin, each in isolation, then empty the registry.
    pub async fn reset(&self) -> ResetReport {
        let active: Vec<(String, Arc<dyn Plugin>)> = self
            .entries_mut()
            .iter()
            .filter_map(|(name, entry)| match (&entry.provider, entry.active) {
                (PluginProvider::Instance(plugin), true) => {
                    Some((name.to_string(), Arc::clone(plugin)))
                }
                _ => None,
            })
            .collect();

        let mut report = ResetReport::default();
        for (name, plugin) in active {
            match plugin.uninstall().await {
                Ok(()) => report.uninstalled.push(name),
                Err(err) => {
                    tracing::warn!(plugin = %name, error = %err, "failed to uninstall plugin during reset");
                    report.failed.push(UnitIssue::new(name, err));
                }
            }
        }
        self.entries_mut().clear();
        report
    }

    /// Re-run `install` for every stored provider, active or not, in order.
    pub async fn reinstall(&self) -> InstallReport {
        let providers: Vec<PluginProvider> = {
            let mut entries = self.entries_mut();
            let providers = entries.iter().map(|(_, e)| e.provider.clone()).collect();
            entries.clear();
            providers
        };
        tracing::debug!(count = providers.len(), "reinstalling plugins");
        self.install_all(providers).await
    }

    pub fn get(&self, name: &str) -> Option<PluginProvider> {
        self.entries_mut().get(name).map(|e| e.provider.clone())
    }

    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.active_instance(name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.entries_mut().get(name).is_some_and(|e| e.active)
    }

    pub fn entries(&self) -> Vec<(String, RegistryEntry<PluginProvider>)> {
        self.entries_mut()
            .iter()
            .map(|(k, e)| (k.to_string(), e.clone()))
            .collect()
    }

    pub fn summaries(&self) -> Vec<EntrySummary> {
        self.entries_mut()
            .iter()
            .map(|(key, entry)| EntrySummary {
                key: key.to_string(),
                active: entry.active,
                kind: entry.provider.kind(),
                error: entry.error.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries_mut().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedPlugin;

    #[tokio::test]
    async fn instance_is_installed_under_its_name() {
        let reg = PluginRegistry::new();
        let plugin = ScriptedPlugin::new("analytics");
        let name = reg
            .install(PluginProvider::Instance(plugin.clone()))
            .await
            .unwrap();
        assert_eq!(name, "analytics");
        assert!(reg.is_active("analytics"));
        assert_eq!(plugin.installs(), 1);
    }

    #[tokio::test]
    async fn constructor_and_lazy_shapes_resolve() {
        let reg = PluginRegistry::new();
        reg.install(PluginProvider::constructor(|| {
            Ok(ScriptedPlugin::new("ctor") as Arc<dyn Plugin>)
        }))
        .await
        .unwrap();
        reg.install(PluginProvider::lazy(|| async {
            let ctor: PluginConstructor =
                Arc::new(|| Ok(ScriptedPlugin::new("deferred") as Arc<dyn Plugin>));
            Ok(ctor)
        }))
        .await
        .unwrap();
        assert!(reg.is_active("ctor"));
        assert!(reg.is_active("deferred"));
        assert_eq!(reg.get("deferred").unwrap().kind(), "instance");
    }

    #[tokio::test]
    async fn failed_install_is_kept_under_generated_id() {
        let reg = PluginRegistry::new();
        let broken = ScriptedPlugin::new("broken").fail_install();
        let err = reg
            .install(PluginProvider::Instance(broken))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Install { .. }));
        assert!(reg.get("broken").is_none());

        let entries = reg.entries();
        assert_eq!(entries.len(), 1);
        let (key, entry) = &entries[0];
        assert!(Uuid::parse_str(key).is_ok());
        assert!(!entry.active);
        assert_eq!(entry.provider.kind(), "instance");
    }

    #[tokio::test]
    async fn rejected_loader_is_a_resolution_error() {
        let reg = PluginRegistry::new();
        let err = reg
            .install(PluginProvider::lazy(|| async {
                Err(anyhow::anyhow!("chunk 404"))
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Resolution { kind: "lazy", .. }));
    }

    #[tokio::test]
    async fn uninstall_removes_active_entry_only() {
        let reg = PluginRegistry::new();
        let plugin = ScriptedPlugin::new("analytics");
        reg.install(PluginProvider::Instance(plugin.clone()))
            .await
            .unwrap();

        assert!(!reg.uninstall("missing").await.unwrap());
        assert!(reg.uninstall("analytics").await.unwrap());
        assert_eq!(plugin.uninstalls(), 1);
        assert!(reg.is_empty());
        assert!(!reg.uninstall("analytics").await.unwrap());
    }

    #[tokio::test]
    async fn failing_uninstall_marks_entry_inactive() {
        let reg = PluginRegistry::new();
        let plugin = ScriptedPlugin::new("sticky").fail_uninstall();
        reg.install(PluginProvider::Instance(plugin)).await.unwrap();
        assert!(reg.uninstall("sticky").await.is_err());
        let entry = reg.entries().remove(0).1;
        assert!(!entry.active);
        assert!(entry.error.is_some());
    }

    #[tokio::test]
    async fn same_instance_twice_installs_once() {
        let reg = PluginRegistry::new();
        let plugin = ScriptedPlugin::new("analytics");
        let provider = PluginProvider::Instance(plugin.clone());
        reg.install(provider.clone()).await.unwrap();
        reg.install(provider).await.unwrap();
        assert_eq!(plugin.installs(), 1);
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn reinstall_replays_everything_in_order() {
        let reg = PluginRegistry::new();
        let first = ScriptedPlugin::new("first");
        let second = ScriptedPlugin::new("second");
        reg.install(PluginProvider::Instance(first.clone()))
            .await
            .unwrap();
        reg.install(PluginProvider::Instance(second.clone()))
            .await
            .unwrap();

        let report = reg.reinstall().await;
        assert_eq!(report.installed, vec!["first", "second"]);
        assert_eq!(first.installs(), 2);
        assert_eq!(second.installs(), 2);
    }
}
