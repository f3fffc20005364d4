use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sakura_core::{
    load_manifest, manifest_schema_json, BootReport, MemoryDocument, PublishReport, Sakura,
    SakuraManifest, Snapshot,
};
use sakura_log::LogOptions;
use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Parser)]
#[command(name = "sakura", version, about = "Sakura storefront runtime utilities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot a manifest against an in-memory page and print the resulting state (JSON)
    Boot(BootArgs),
    /// Boot a manifest, publish one event and print the dispatch report (JSON)
    Publish(PublishArgs),
    /// Validate a manifest without booting it
    Check(ManifestArgs),
    /// Print the manifest JSON schema
    Schema,
    /// List known event topics
    Topics(TopicsArgs),
}

#[derive(Args, Clone)]
struct ManifestArgs {
    /// Path to a sakura.toml manifest
    #[arg(long, short = 'm')]
    manifest: PathBuf,
}

#[derive(Args, Clone)]
struct BootArgs {
    #[command(flatten)]
    manifest: ManifestArgs,
    /// Exit non-zero when any element or plugin failed
    #[arg(long)]
    strict: bool,
    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Clone)]
struct PublishArgs {
    #[command(flatten)]
    manifest: ManifestArgs,
    /// Topic to publish, e.g. `cart:add-item`
    #[arg(long)]
    topic: String,
    /// JSON payload attached to the event
    #[arg(long)]
    payload: Option<String>,
    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Clone)]
struct TopicsArgs {
    /// Only list topics of this domain (`cart`, `product`, ...)
    #[arg(long)]
    domain: Option<String>,
}

#[derive(Serialize)]
struct BootOutput<'a> {
    boot: &'a BootReport,
    snapshot: Snapshot,
}

#[derive(Serialize)]
struct PublishOutput<'a> {
    boot: &'a BootReport,
    publish: &'a PublishReport,
    snapshot: Snapshot,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Boot(args) => cmd_boot(&args).await,
        Commands::Publish(args) => cmd_publish(&args).await,
        Commands::Check(args) => cmd_check(&args),
        Commands::Schema => cmd_schema(),
        Commands::Topics(args) => {
            cmd_topics(&args);
            Ok(())
        }
    };
    if let Err(e) = result {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn read_manifest(path: &Path) -> Result<SakuraManifest> {
    load_manifest(path).with_context(|| format!("loading manifest {}", path.display()))
}

fn log_options(manifest: &SakuraManifest) -> LogOptions {
    let defaults = LogOptions::default();
    LogOptions {
        prefix: manifest.log.prefix.clone().unwrap_or(defaults.prefix),
        colors: manifest.log.colors.unwrap_or(defaults.colors),
        timestamps: manifest.log.timestamps.unwrap_or(defaults.timestamps),
        filter: manifest.log.filter.clone(),
        debug: manifest.debug,
    }
}

/// Load the manifest, build its page and run `init` against it.
async fn boot(path: &Path) -> Result<(Sakura, BootReport)> {
    let manifest = read_manifest(path)?;
    sakura_log::init(&log_options(&manifest));

    let document = Arc::new(MemoryDocument::new());
    document.navigate_to(manifest.document_specs());
    let app = Sakura::from_manifest(document, &manifest);
    let report = app
        .init(manifest.element_definitions(), manifest.plugin_providers())
        .await;
    Ok((app, report))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

async fn cmd_boot(args: &BootArgs) -> Result<()> {
    let (app, report) = boot(&args.manifest.manifest).await?;
    let output = BootOutput {
        boot: &report,
        snapshot: app.snapshot(),
    };
    print_json(&output, args.pretty)?;
    app.teardown().await;
    if args.strict && !report.is_clean() {
        bail!(
            "boot finished with {} element and {} plugin failure(s)",
            report.elements.failed.len(),
            report.plugins.failed.len()
        );
    }
    Ok(())
}

async fn cmd_publish(args: &PublishArgs) -> Result<()> {
    let payload = args
        .payload
        .as_deref()
        .map(serde_json::from_str::<JsonValue>)
        .transpose()
        .context("--payload is not valid JSON")?;
    if !sakura_topics::is_known(&args.topic) {
        tracing::warn!(topic = %args.topic, "publishing an unknown topic");
    }

    let (app, report) = boot(&args.manifest.manifest).await?;
    let published = app.bus().publish(&args.topic, payload).await;
    let output = PublishOutput {
        boot: &report,
        publish: &published,
        snapshot: app.snapshot(),
    };
    print_json(&output, args.pretty)?;
    app.teardown().await;
    Ok(())
}

fn cmd_check(args: &ManifestArgs) -> Result<()> {
    let manifest = read_manifest(&args.manifest)?;
    println!(
        "ok: {} node(s), {} element(s), {} plugin(s)",
        manifest.document.nodes.len(),
        manifest.elements.len(),
        manifest.plugin_providers().len()
    );
    Ok(())
}

fn cmd_schema() -> Result<()> {
    print_json(&manifest_schema_json(), true)
}

fn cmd_topics(args: &TopicsArgs) {
    let topics = match args.domain.as_deref() {
        Some(domain) => sakura_topics::topics_in(domain),
        None => sakura_topics::ALL_TOPICS,
    };
    for topic in topics {
        println!("{topic}");
    }
}
