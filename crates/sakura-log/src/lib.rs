use std::fmt;
use std::fmt::Write as _;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tfmt, EnvFilter, Registry};

pub const DEFAULT_PREFIX: &str = "✿ sakura ✿";

const MAGENTA: &str = "\x1b[35m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub prefix: String,
    pub colors: bool,
    pub timestamps: bool,
    /// Directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
    /// Default to `debug` instead of `info` when no filter is given.
    pub debug: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            colors: true,
            timestamps: true,
            filter: None,
            debug: false,
        }
    }
}

impl LogOptions {
    pub fn default_directive(&self) -> &str {
        match (&self.filter, self.debug) {
            (Some(filter), _) => filter,
            (None, true) => "debug",
            (None, false) => "info",
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

/// Event format that writes a fixed prefix before the wrapped format.
#[derive(Debug, Clone)]
pub struct Prefixed<F> {
    prefix: String,
    inner: F,
}

impl<F> Prefixed<F> {
    pub fn new(prefix: impl Into<String>, inner: F) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }
}

impl<S, N, F> FormatEvent<S, N> for Prefixed<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        if !self.prefix.is_empty() {
            if writer.has_ansi_escapes() {
                write!(writer, "{MAGENTA}{}{RESET} ", self.prefix)?;
            } else {
                write!(writer, "{} ", self.prefix)?;
            }
        }
        self.inner.format_event(ctx, writer, event)
    }
}

/// Install the global subscriber writing to stderr.
///
/// Returns `false` when one is already set.
pub fn init(options: &LogOptions) -> bool {
    let filter = options.env_filter();
    let base = tfmt::format().with_target(false).with_ansi(options.colors);
    if options.timestamps {
        install(Prefixed::new(&options.prefix, base), options.colors, filter)
    } else {
        install(
            Prefixed::new(&options.prefix, base.without_time()),
            options.colors,
            filter,
        )
    }
}

fn install<F>(format: F, ansi: bool, filter: EnvFilter) -> bool
where
    F: FormatEvent<Registry, tfmt::format::DefaultFields> + Send + Sync + 'static,
{
    let layer = tfmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .event_format(format)
        .with_filter(filter);
    tracing_subscriber::registry().with(layer).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture(prefix: &str, ansi: bool, f: impl FnOnce()) -> String {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let format = Prefixed::new(
            prefix,
            tfmt::format().with_target(false).with_ansi(ansi).without_time(),
        );
        let subscriber = tfmt()
            .with_ansi(ansi)
            .event_format(format)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        buffer.text()
    }

    #[test]
    fn lines_start_with_prefix() {
        let out = capture(DEFAULT_PREFIX, false, || {
            tracing::info!(tag = "cmp-cart", "element defined");
        });
        assert!(out.starts_with("✿ sakura ✿ "), "{out}");
        assert!(out.contains("element defined"));
        assert!(out.contains("tag=\"cmp-cart\""));
    }

    #[test]
    fn colours_wrap_only_the_prefix() {
        let out = capture("[theme]", true, || tracing::warn!("skipped"));
        assert!(out.starts_with("\x1b[35m[theme]\x1b[0m "), "{out:?}");
    }

    #[test]
    fn empty_prefix_writes_nothing_extra() {
        let out = capture("", false, || tracing::info!("plain"));
        assert!(!out.contains(DEFAULT_PREFIX));
        assert!(out.contains("plain"));
    }

    #[test]
    fn default_directive_follows_options() {
        let mut options = LogOptions::default();
        assert_eq!(options.default_directive(), "info");
        options.debug = true;
        assert_eq!(options.default_directive(), "debug");
        options.filter = Some("sakura_core=trace".into());
        assert_eq!(options.default_directive(), "sakura_core=trace");
    }
}
