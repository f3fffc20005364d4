//! Tag name to component registry.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::RegistryError;
use crate::host::{ElementClass, ElementHost};
use crate::provider::Lazy;
use crate::report::{DefineReport, EntrySummary, UnitIssue};
use crate::slots::Slots;

/// Where a tag's constructor comes from.
#[derive(Clone, Debug)]
pub enum ElementProvider {
    Eager(ElementClass),
    Lazy(Lazy<ElementClass>),
}

impl ElementProvider {
    pub fn eager(class: ElementClass) -> Self {
        ElementProvider::Eager(class)
    }

    pub fn lazy<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ElementClass>> + Send + 'static,
    {
        ElementProvider::Lazy(Lazy::new(loader))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ElementProvider::Eager(_) => "eager",
            ElementProvider::Lazy(_) => "lazy",
        }
    }

    async fn resolve(&self) -> anyhow::Result<ElementClass> {
        match self {
            ElementProvider::Eager(class) => Ok(class.clone()),
            ElementProvider::Lazy(loader) => loader.load().await,
        }
    }
}

/// Declarative `(tag, provider)` pair handed to the application root.
#[derive(Clone, Debug)]
pub struct ElementDefinition {
    pub tag: String,
    pub provider: ElementProvider,
}

impl ElementDefinition {
    pub fn new(tag: impl Into<String>, provider: ElementProvider) -> Self {
        Self {
            tag: tag.into(),
            provider,
        }
    }
}

/// Registration status for one key. Inactive entries are kept for
/// diagnostics and retried by the next batch replay.
#[derive(Clone, Debug)]
pub struct RegistryEntry<P> {
    pub active: bool,
    pub provider: P,
    pub error: Option<String>,
}

#[derive(Default)]
struct ElementState {
    /// Every tag ever declared, in first-declaration order. Survives `clear`.
    declared: Slots<ElementProvider>,
    /// Class this registry handed to the host for each tag. Survives `clear`.
    classes: BTreeMap<String, ElementClass>,
    entries: Slots<RegistryEntry<ElementProvider>>,
}

pub struct ElementRegistry {
    host: Arc<dyn ElementHost>,
    state: Mutex<ElementState>,
}

impl fmt::Debug for ElementRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRegistry")
            .field("entries", &self.summaries())
            .finish_non_exhaustive()
    }
}

impl ElementRegistry {
    pub fn new(host: Arc<dyn ElementHost>) -> Self {
        Self {
            host,
            state: Mutex::new(ElementState::default()),
        }
    }

    pub fn host(&self) -> &Arc<dyn ElementHost> {
        &self.host
    }

    fn state(&self) -> MutexGuard<'_, ElementState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Define one tag. Failures are recorded as inactive entries and logged;
    /// the error is returned for callers that care, never escalated.
    pub async fn define(&self, tag: &str, provider: ElementProvider) -> Result<(), RegistryError> {
        let result = self.try_define(tag, provider).await;
        match &result {
            Ok(()) => tracing::debug!(tag, "element defined"),
            Err(err) if err.is_skip() => {
                tracing::warn!(tag, reason = %err, "skipping element definition")
            }
            Err(err) => tracing::error!(tag, error = %err, "failed to define element"),
        }
        result
    }

    async fn try_define(&self, tag: &str, provider: ElementProvider) -> Result<(), RegistryError> {
        if self.is_active(tag) {
            return Err(RegistryError::AlreadyActive(tag.to_string()));
        }
        if !self.host.contains_tag(tag) {
            let err = RegistryError::NotInDocument(tag.to_string());
            self.declare(tag, &provider);
            self.record(tag, provider, Some(&err));
            return Err(err);
        }
        self.declare(tag, &provider);
        if self.host.is_defined(tag) {
            if self.owns_host_definition(tag) {
                tracing::debug!(tag, "document still holds our definition");
                self.record(tag, provider, None);
                return Ok(());
            }
            let err = RegistryError::DefinedByHost(tag.to_string());
            self.record(tag, provider, Some(&err));
            return Err(err);
        }

        let class = match provider.resolve().await {
            Ok(class) => class,
            Err(source) => {
                let err = RegistryError::Resolution {
                    tag: tag.to_string(),
                    source,
                };
                self.record(tag, provider, Some(&err));
                return Err(err);
            }
        };

        // Another define for this tag may have finished while we were loading.
        if self.is_active(tag) {
            return Err(RegistryError::AlreadyActive(tag.to_string()));
        }

        if let Err(source) = self.host.define(tag, class.clone()) {
            let err = RegistryError::Host {
                tag: tag.to_string(),
                source,
            };
            self.record(tag, provider, Some(&err));
            return Err(err);
        }
        self.state().classes.insert(tag.to_string(), class);
        self.record(tag, provider, None);
        Ok(())
    }

    /// Whether the host's definition of `tag` is the class this registry
    /// defined earlier. Hosts that cannot report their class are trusted.
    fn owns_host_definition(&self, tag: &str) -> bool {
        let Some(ours) = self.state().classes.get(tag).cloned() else {
            return false;
        };
        self.host
            .defined_class(tag)
            .is_none_or(|theirs| theirs.same_class(&ours))
    }

    fn declare(&self, tag: &str, provider: &ElementProvider) {
        self.state().declared.insert(tag, provider.clone());
    }

    fn record(&self, tag: &str, provider: ElementProvider, error: Option<&RegistryError>) {
        self.state().entries.insert(
            tag,
            RegistryEntry {
                active: error.is_none(),
                provider,
                error: error.map(ToString::to_string),
            },
        );
    }

    /// Define every entry in order. One failing tag never stops the rest.
    pub async fn define_all<I>(&self, definitions: I) -> DefineReport
    where
        I: IntoIterator<Item = ElementDefinition>,
    {
        let mut report = DefineReport::default();
        for ElementDefinition { tag, provider } in definitions {
            match self.define(&tag, provider).await {
                Ok(()) => report.defined.push(tag),
                Err(err) if err.is_skip() => report.skipped.push(UnitIssue::new(tag, err)),
                Err(err) => report.failed.push(UnitIssue::new(tag, err)),
            }
        }
        report
    }

    /// Replay every declared definition in declaration order, e.g. after a
    /// page transition swapped the document.
    pub async fn redefine(&self) -> DefineReport {
        let declared: Vec<ElementDefinition> = self
            .state()
            .declared
            .iter()
            .map(|(tag, provider)| ElementDefinition::new(tag, provider.clone()))
            .collect();
        tracing::debug!(count = declared.len(), "redefining elements");
        self.define_all(declared).await
    }

    pub fn get(&self, tag: &str) -> Option<ElementProvider> {
        self.state().entries.get(tag).map(|e| e.provider.clone())
    }

    pub fn entry(&self, tag: &str) -> Option<RegistryEntry<ElementProvider>> {
        self.state().entries.get(tag).cloned()
    }

    pub fn is_active(&self, tag: &str) -> bool {
        self.state().entries.get(tag).is_some_and(|e| e.active)
    }

    pub fn entries(&self) -> Vec<(String, RegistryEntry<ElementProvider>)> {
        self.state()
            .entries
            .iter()
            .map(|(tag, entry)| (tag.to_string(), entry.clone()))
            .collect()
    }

    pub fn summaries(&self) -> Vec<EntrySummary> {
        self.state()
            .entries
            .iter()
            .map(|(tag, entry)| EntrySummary {
                key: tag.to_string(),
                active: entry.active,
                kind: entry.provider.kind(),
                error: entry.error.clone(),
            })
            .collect()
    }

    pub fn declared_tags(&self) -> Vec<String> {
        self.state()
            .declared
            .iter()
            .map(|(tag, _)| tag.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget registration status. The document's own definitions are not
    /// undone, and the declaration list is kept for [`Self::redefine`].
    pub fn clear(&self) {
        self.state().entries.clear();
    }

    /// Forget everything, declarations included.
    pub fn purge(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.declared.clear();
        state.classes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocument;
    use crate::test_support::{failing_element, inert_class};

    fn registry(tags: &[&str]) -> (ElementRegistry, Arc<MemoryDocument>) {
        let doc = Arc::new(MemoryDocument::with_tags(tags.iter().copied()));
        (ElementRegistry::new(doc.clone()), doc)
    }

    #[tokio::test]
    async fn defines_rendered_tag() {
        let (reg, doc) = registry(&["a-widget"]);
        reg.define("a-widget", ElementProvider::eager(inert_class()))
            .await
            .unwrap();
        assert!(reg.is_active("a-widget"));
        assert!(doc.is_defined_tag("a-widget"));
        assert_eq!(reg.get("a-widget").map(|p| p.kind()), Some("eager"));
    }

    #[tokio::test]
    async fn missing_tag_is_skipped_and_kept_inactive() {
        let (reg, doc) = registry(&[]);
        let err = reg
            .define("a-widget", ElementProvider::eager(inert_class()))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotInDocument(_)));
        assert!(err.is_skip());
        let entry = reg.entry("a-widget").expect("entry retained");
        assert!(!entry.active);
        assert!(!doc.is_defined_tag("a-widget"));
    }

    #[tokio::test]
    async fn second_define_of_active_tag_is_rejected_without_touching_entry() {
        let (reg, _) = registry(&["a-widget"]);
        reg.define("a-widget", ElementProvider::eager(inert_class()))
            .await
            .unwrap();
        let err = reg
            .define("a-widget", failing_element("should not load"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyActive(_)));
        let entry = reg.entry("a-widget").unwrap();
        assert!(entry.active);
        assert_eq!(entry.provider.kind(), "eager");
    }

    #[tokio::test]
    async fn lazy_provider_is_resolved_before_definition() {
        let (reg, doc) = registry(&["b-widget"]);
        let provider = ElementProvider::lazy(|| async { Ok(inert_class()) });
        reg.define("b-widget", provider).await.unwrap();
        assert!(doc.is_defined_tag("b-widget"));
        assert_eq!(reg.get("b-widget").unwrap().kind(), "lazy");
    }

    #[tokio::test]
    async fn host_definition_counts_as_skip() {
        let (reg, doc) = registry(&["a-widget"]);
        doc.define("a-widget", inert_class()).unwrap();
        let err = reg
            .define("a-widget", ElementProvider::eager(inert_class()))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DefinedByHost(_)));
        assert!(!reg.is_active("a-widget"));
    }

    #[tokio::test]
    async fn redefine_adopts_definitions_the_document_kept() {
        let (reg, doc) = registry(&["x-a", "x-b"]);
        reg.define_all(["x-a", "x-b"].map(|tag| {
            ElementDefinition::new(tag, ElementProvider::eager(inert_class()))
        }))
        .await;

        reg.clear();
        let report = reg.redefine().await;

        assert_eq!(report.defined, vec!["x-a", "x-b"]);
        assert!(report.skipped.is_empty());
        for tag in ["x-a", "x-b"] {
            assert!(reg.is_active(tag));
            assert_eq!(doc.upgraded_count(tag), 1);
        }
    }

    #[tokio::test]
    async fn active_tag_survives_its_element_leaving_the_page() {
        let (reg, doc) = registry(&["x-a"]);
        reg.define("x-a", ElementProvider::eager(inert_class()))
            .await
            .unwrap();
        let id = doc.node_ids("x-a")[0];
        assert!(doc.remove(id));

        let err = reg
            .define("x-a", ElementProvider::eager(inert_class()))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyActive(_)));
        assert!(reg.is_active("x-a"));
        assert!(reg.entry("x-a").unwrap().error.is_none());

        doc.insert("x-a");
        assert_eq!(doc.upgraded_count("x-a"), 1);
        let err = reg
            .define("x-a", ElementProvider::eager(inert_class()))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyActive(_)));
        assert!(reg.is_active("x-a"));
    }

    #[tokio::test]
    async fn invalid_name_is_a_host_failure() {
        let (reg, _) = registry(&["widget"]);
        let err = reg
            .define("widget", ElementProvider::eager(inert_class()))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Host { .. }));
        assert!(!err.is_skip());
    }

    #[tokio::test]
    async fn clear_forgets_status_and_purge_forgets_declarations() {
        let (reg, _) = registry(&["a-widget"]);
        reg.define("a-widget", ElementProvider::eager(inert_class()))
            .await
            .unwrap();
        reg.clear();
        assert!(reg.get("a-widget").is_none());
        assert_eq!(reg.declared_tags(), vec!["a-widget".to_string()]);
        reg.purge();
        assert!(reg.declared_tags().is_empty());
        assert!(reg.is_empty());
    }
}
