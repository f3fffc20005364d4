use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::plugins::Plugin;

pub const GREETING_PLUGIN: &str = "kawaii";

/// Startup banner art.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Art {
    #[default]
    Pompompurin,
    HelloKitty,
    Keroppi,
    Cinnamoroll,
    Doraemon,
    Yuuka,
}

impl Art {
    pub const ALL: [Art; 6] = [
        Art::Pompompurin,
        Art::HelloKitty,
        Art::Keroppi,
        Art::Cinnamoroll,
        Art::Doraemon,
        Art::Yuuka,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Art::Pompompurin => "pompompurin",
            Art::HelloKitty => "hello_kitty",
            Art::Keroppi => "keroppi",
            Art::Cinnamoroll => "cinnamoroll",
            Art::Doraemon => "doraemon",
            Art::Yuuka => "yuuka",
        }
    }

    pub fn banner(self) -> &'static str {
        match self {
            Art::Pompompurin => "ʕ •ᴥ•ʔ",
            Art::HelloKitty => "(=^･ω･^=)",
            Art::Keroppi => "(•ө•)",
            Art::Cinnamoroll => "(っ◔◡◔)っ",
            Art::Doraemon => "(◕‿◕)",
            Art::Yuuka => "(￣ー￣)",
        }
    }
}

/// Logs the banner and greeting when installed.
#[derive(Debug, Default)]
pub struct GreetingPlugin {
    art: Art,
    greeting: Option<String>,
    shown: AtomicUsize,
}

impl GreetingPlugin {
    pub fn new(art: Art, greeting: Option<String>) -> Self {
        Self {
            art,
            greeting,
            shown: AtomicUsize::new(0),
        }
    }

    pub fn art(&self) -> Art {
        self.art
    }

    pub fn times_shown(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }

    pub fn message(&self) -> String {
        match &self.greeting {
            Some(greeting) => format!("{} {greeting}", self.art.banner()),
            None => self.art.banner().to_string(),
        }
    }
}

#[async_trait]
impl Plugin for GreetingPlugin {
    fn name(&self) -> &str {
        GREETING_PLUGIN
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn install(&self) -> anyhow::Result<()> {
        self.shown.fetch_add(1, Ordering::SeqCst);
        tracing::info!(art = self.art.name(), "{}", self.message());
        Ok(())
    }

    async fn uninstall(&self) -> anyhow::Result<()> {
        tracing::debug!(art = self.art.name(), "greeting removed");
        Ok(())
    }
}
