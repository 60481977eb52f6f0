use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use safari_core::dataset::DatasetSink;
use safari_engine::{AgentDeps, JsonlDatasetSink};
use safari_llm::ModelRegistry;
use safari_server::{HttpCaptureService, ServerConfig};
use safari_settings::SafariSettings;
use safari_telemetry::TelemetryConfig;

#[derive(Debug, Parser)]
#[command(name = "safari", about = "Vision Safari agent server")]
struct Cli {
    /// Settings file (defaults to ~/.safari/settings.json).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    host: Option<String>,
}

fn load(cli: &Cli) -> anyhow::Result<SafariSettings> {
    let mut settings = match &cli.config {
        Some(path) => safari_settings::load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => safari_settings::load_settings().context("loading settings")?,
    };
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(host) = &cli.host {
        settings.server.host = host.clone();
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;

    safari_telemetry::init_telemetry(TelemetryConfig::from_levels(
        &settings.logging.level,
        settings
            .logging
            .modules
            .iter()
            .map(|(m, l)| (m.as_str(), l.as_str())),
        settings.logging.json,
    ));

    tracing::info!("starting safari server");

    let models = ModelRegistry::from_settings(&settings.models);
    if models.is_empty() {
        tracing::warn!("no reasoning models configured; missions will fail until one is added");
    }
    if models.get(&settings.agent.default_model).is_none() {
        tracing::warn!(model = %settings.agent.default_model, "default model is not registered");
    }

    let dataset: Option<Arc<dyn DatasetSink>> = if settings.dataset.enabled {
        let dir = safari_settings::resolve_path(&settings.dataset.dir);
        tracing::info!(path = %dir.display(), "dataset recording enabled");
        Some(Arc::new(JsonlDatasetSink::new(dir)))
    } else {
        None
    };

    let deps = Arc::new(AgentDeps {
        models: Arc::new(models),
        capture: Arc::new(HttpCaptureService::new(&settings.capture)),
        dataset,
        settings: settings.agent.clone(),
    });

    let handle = safari_server::start(
        ServerConfig::from(&settings.server),
        deps,
        settings.world.clone(),
        settings.autoplay.clone(),
    )
    .await
    .with_context(|| format!("binding {}:{}", settings.server.host, settings.server.port))?;

    tracing::info!(port = handle.port, "safari server ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
