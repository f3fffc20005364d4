use thiserror::Error;

/// Failures while defining one element tag.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("element `{0}` not found in document")]
    NotInDocument(String),
    #[error("element `{0}` is already defined")]
    AlreadyActive(String),
    #[error("element `{0}` is already defined by the document")]
    DefinedByHost(String),
    #[error("failed to resolve provider for `{tag}`: {source}")]
    Resolution {
        tag: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("document rejected `{tag}`: {source}")]
    Host {
        tag: String,
        #[source]
        source: HostError,
    },
}

impl RegistryError {
    /// Skips are expected on pages that do not render every tag; they are
    /// reported as warnings, not failures.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            RegistryError::NotInDocument(_)
                | RegistryError::AlreadyActive(_)
                | RegistryError::DefinedByHost(_)
        )
    }
}

/// Errors raised by an [`crate::ElementHost`] implementation.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid custom element name `{0}`")]
    InvalidName(String),
    #[error("`{0}` has already been defined")]
    AlreadyDefined(String),
    #[error("constructor failed: {0}")]
    Construction(String),
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("failed to resolve plugin provider ({kind}): {source}")]
    Resolution {
        kind: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("plugin `{name}` failed to install: {source}")]
    Install {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("plugin `{name}` failed to uninstall: {source}")]
    Uninstall {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors surfaced while reading storefront responses.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// The backend answered with an error envelope; the message is meant for the shopper.
    #[error("{0}")]
    Application(String),
    #[error("malformed storefront payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("manifest failed validation: {0}")]
    Invalid(String),
}
