//! TOML boot manifest.
//!
//! ```toml
//! debug = true
//!
//! [log]
//! prefix = "✿ sakura ✿"
//!
//! [kawaii]
//! art = "cinnamoroll"
//! greeting = "Hello from Sakura!"
//!
//! [[document.nodes]]
//! tag = "cmp-cart-drawer"
//! id = "cart-drawer"
//!
//! [[elements]]
//! tag = "cmp-cart-drawer"
//! component = "cart-drawer"
//! lazy = true
//! ```

use std::path::Path;
use std::sync::Arc;

use jsonschema::{validator_for, Validator};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::components::{element_class, OPEN_ATTRIBUTE};
use crate::elements::{ElementDefinition, ElementProvider};
use crate::error::ConfigError;
use crate::greeting::{Art, GreetingPlugin, GREETING_PLUGIN};
use crate::host::{Component, ComponentContext, ElementClass};
use crate::memory::ElementSpec;
use crate::plugins::{Plugin, PluginConstructor, PluginProvider};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct LogConfig {
    /// Text written before every log line.
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub colors: Option<bool>,
    #[serde(default)]
    pub timestamps: Option<bool>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct KawaiiConfig {
    #[serde(default)]
    pub art: Art,
    #[serde(default)]
    pub greeting: Option<String>,
}

/// One rendered element of the in-memory document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct NodeConfig {
    pub tag: String,
    /// `data-id` attribute.
    #[serde(default)]
    pub id: Option<String>,
    /// Server-rendered with the open marker.
    #[serde(default)]
    pub open: bool,
    /// `data-id`s nested in the `{id}-menu` region.
    #[serde(default)]
    pub menu: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct DocumentConfig {
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ElementConfig {
    pub tag: String,
    /// Built-in component name; omitted means an element without behaviour.
    #[serde(default)]
    pub component: Option<String>,
    /// Resolve the component on first definition instead of at boot.
    #[serde(default)]
    pub lazy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct PluginConfig {
    pub name: String,
    #[serde(default)]
    pub lazy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct SakuraManifest {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub kawaii: Option<KawaiiConfig>,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub elements: Vec<ElementConfig>,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

static MANIFEST_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    let schema_value = manifest_schema_json();
    validator_for(&schema_value).expect("valid schema")
});

/// JSON schema of [`SakuraManifest`].
///
/// # Panics
///
/// Panics if schema generation fails; this indicates a programming error.
pub fn manifest_schema_json() -> serde_json::Value {
    let schema = schemars::schema_for!(SakuraManifest);
    serde_json::to_value(&schema).expect("schema json")
}

pub fn parse_manifest(content: &str) -> Result<SakuraManifest, ConfigError> {
    let raw: toml::Value = toml::from_str(content)?;
    let json_value = serde_json::to_value(&raw)?;
    let validation_errors: Vec<_> = MANIFEST_SCHEMA
        .iter_errors(&json_value)
        .map(|e| e.to_string())
        .collect();
    if !validation_errors.is_empty() {
        return Err(ConfigError::Invalid(validation_errors.join(", ")));
    }
    Ok(toml::from_str(content)?)
}

pub fn load_manifest(path: impl AsRef<Path>) -> Result<SakuraManifest, ConfigError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let manifest = parse_manifest(&content)?;
    tracing::debug!(
        path = %path.as_ref().display(),
        elements = manifest.elements.len(),
        plugins = manifest.plugins.len(),
        "manifest loaded"
    );
    Ok(manifest)
}

#[derive(Default)]
struct Plain;

impl Component for Plain {
    fn on_attach(&mut self, _ctx: &ComponentContext) -> anyhow::Result<()> {
        Ok(())
    }
}

fn resolve_component(name: Option<&str>) -> anyhow::Result<ElementClass> {
    match name {
        None => Ok(ElementClass::of::<Plain>("plain")),
        Some(name) => {
            element_class(name).ok_or_else(|| anyhow::anyhow!("unknown component `{name}`"))
        }
    }
}

fn resolve_plugin(name: &str, kawaii: Option<&KawaiiConfig>) -> anyhow::Result<Arc<dyn Plugin>> {
    match name {
        GREETING_PLUGIN => {
            let cfg = kawaii.cloned().unwrap_or_default();
            Ok(Arc::new(GreetingPlugin::new(cfg.art, cfg.greeting)))
        }
        other => Err(anyhow::anyhow!("unknown plugin `{other}`")),
    }
}

impl SakuraManifest {
    /// Rendered nodes for an in-memory document.
    pub fn document_specs(&self) -> Vec<ElementSpec> {
        self.document
            .nodes
            .iter()
            .map(|node| {
                let mut spec = ElementSpec::new(&node.tag);
                if let Some(id) = &node.id {
                    spec = spec
                        .with_id(id)
                        .with_region(format!("{id}-menu"), node.menu.iter().cloned());
                }
                if node.open {
                    spec = spec.with_attribute(OPEN_ATTRIBUTE);
                }
                spec
            })
            .collect()
    }

    /// Element definitions in manifest order. Unknown component names are
    /// not rejected here; they fail (in isolation) when the tag is defined.
    pub fn element_definitions(&self) -> Vec<ElementDefinition> {
        self.elements
            .iter()
            .map(|cfg| {
                let component = cfg.component.clone();
                let provider = if cfg.lazy {
                    ElementProvider::lazy(move || {
                        let component = component.clone();
                        async move { resolve_component(component.as_deref()) }
                    })
                } else {
                    match resolve_component(component.as_deref()) {
                        Ok(class) => ElementProvider::eager(class),
                        Err(err) => {
                            let message = err.to_string();
                            ElementProvider::eager(ElementClass::new("unknown", move || {
                                Err(anyhow::anyhow!(message.clone()))
                            }))
                        }
                    }
                };
                ElementDefinition::new(&cfg.tag, provider)
            })
            .collect()
    }

    /// Plugin providers in install order. A `[kawaii]` section installs the
    /// greeting first unless `[[plugins]]` already lists it.
    pub fn plugin_providers(&self) -> Vec<PluginProvider> {
        let mut providers = Vec::new();
        let listed = self.plugins.iter().any(|p| p.name == GREETING_PLUGIN);
        if let (Some(kawaii), false) = (&self.kawaii, listed) {
            providers.push(PluginProvider::instance(GreetingPlugin::new(
                kawaii.art,
                kawaii.greeting.clone(),
            )));
        }
        for cfg in &self.plugins {
            let name = cfg.name.clone();
            let kawaii = self.kawaii.clone();
            let provider = if cfg.lazy {
                PluginProvider::lazy(move || {
                    let name = name.clone();
                    let kawaii = kawaii.clone();
                    async move {
                        let ctor: PluginConstructor =
                            Arc::new(move || resolve_plugin(&name, kawaii.as_ref()));
                        Ok(ctor)
                    }
                })
            } else {
                PluginProvider::constructor(move || resolve_plugin(&name, kawaii.as_ref()))
            };
            providers.push(provider);
        }
        providers
    }
}
