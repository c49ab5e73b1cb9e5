use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use interview_coach::{
    create_router, http::SessionDefaults, AppState, CaptureManager, Config, FileDeviceProvider,
    HttpAnalysisService, HttpClassifier, HttpReasoningService, JsonFileStore, RecordingSink,
    SessionServices,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "interview-coach", version, about = "Timed mock interviews with live feedback")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/interview-coach")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// List capture devices and exit
    Devices,
}

fn capture_manager(cfg: &Config) -> Result<Arc<CaptureManager>> {
    let media_dir = cfg.media_dir()?;
    let provider = FileDeviceProvider::new(media_dir, cfg.headless());
    Ok(Arc::new(CaptureManager::new(
        Arc::new(provider),
        cfg.interview.frame_buffer,
    )))
}

fn build_services(cfg: &Config) -> Result<SessionServices> {
    let timeout = cfg.services.request_timeout();
    let api_key = cfg.services.api_key.clone();

    let reasoning = HttpReasoningService::new(&cfg.services.reasoning_url, api_key.clone(), timeout)
        .context("Failed to create reasoning client")?;
    let analysis = HttpAnalysisService::new(&cfg.services.analysis_url, api_key, timeout)
        .context("Failed to create analysis client")?;
    let classifier = HttpClassifier::new(cfg.services.classifier_url.clone(), timeout)
        .context("Failed to create affect classifier client")?;

    Ok(SessionServices {
        capture: capture_manager(cfg)?,
        recorder: Arc::new(RecordingSink::new(cfg.recorder())),
        reasoning: Arc::new(reasoning),
        analysis: Arc::new(analysis),
        classifier: Arc::new(classifier),
        store: Some(Arc::new(JsonFileStore::new(cfg.output_dir()?))),
    })
}

async fn list_devices(cfg: &Config) -> Result<()> {
    let devices = capture_manager(cfg)?.list_devices().await?;
    if devices.is_empty() {
        println!("No capture devices found");
    }
    for device in devices {
        println!("{:?}\t{}\t{}", device.kind, device.id, device.label);
    }
    Ok(())
}

async fn serve(cfg: Config) -> Result<()> {
    let services = build_services(&cfg)?;
    let defaults = SessionDefaults {
        duration: cfg.interview.duration(),
        affect_interval: cfg.interview.affect_interval(),
        retention: cfg.interview.retention(),
    };
    let nats_url = cfg
        .transcription
        .enabled
        .then(|| cfg.transcription.nats_url.clone());
    if nats_url.is_none() {
        info!("Live transcription disabled");
    }

    let state = AppState::new(services, defaults, nats_url);
    let app = create_router(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("interview_coach=info,tower_http=info,warn")),
        )
        .init();

    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg).await,
        Command::Devices => list_devices(&cfg).await,
    }
}
