//! Registration and coordination core of the Sakura storefront runtime.
//!
//! [`Sakura`] owns one [`EventBus`], one [`ElementRegistry`], one
//! [`PluginRegistry`] and one [`DrawerCoordinator`]. Nothing is global:
//! every instance is constructed by the caller and passed by reference.

mod app;
pub mod components;
mod config;
mod drawer;
mod elements;
mod error;
mod greeting;
mod host;
pub mod memory;
mod plugins;
mod provider;
mod report;
mod sections;
mod slots;
#[cfg(any(test, feature = "test_support"))]
pub mod test_support;

pub use app::{BootReport, Sakura, SakuraOptions, Snapshot};
pub use config::{
    load_manifest, manifest_schema_json, parse_manifest, DocumentConfig, ElementConfig,
    KawaiiConfig, LogConfig, NodeConfig, PluginConfig, SakuraManifest,
};
pub use drawer::{Drawer, DrawerCoordinator, DrawerState, DrawerView, ESCAPE_KEY};
pub use elements::{ElementDefinition, ElementProvider, ElementRegistry, RegistryEntry};
pub use error::{ConfigError, HostError, PluginError, RegistryError, StorefrontError};
pub use greeting::{Art, GreetingPlugin, GREETING_PLUGIN};
pub use host::{
    is_valid_custom_element_name, Component, ComponentContext, ComponentServices, DomEvent,
    ElementClass, ElementDom, ElementHost,
};
pub use memory::{ElementSpec, MemoryDocument, MemoryElement, NodeId};
pub use plugins::{Plugin, PluginConstructor, PluginProvider, PluginRegistry};
pub use provider::{lazy, Lazy, LoadFuture};
pub use report::{DefineReport, EntrySummary, InstallReport, ResetReport, UnitIssue};
pub use sections::{
    render_sections, sections_from_payload, CartResponse, SectionRenderer, CART_DRAWER_SECTION,
};

pub use sakura_events::{Event, EventBus, Handler, PublishReport, Subscriptions};
