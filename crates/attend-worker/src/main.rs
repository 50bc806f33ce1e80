//! Attendance engine binary.
//!
//! Runs one session (for the date given as the first argument, or today)
//! until it hits its deadline or the process receives Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use attend_media::{Annotator, FrameSourceFactory};
use attend_ml_client::MlClient;
use attend_worker::{
    Collaborators, EngineConfig, FirestorePresenceWriter, IdentityRegistry, NoopPresenceWriter,
    PresenceWriter, Recognition, SessionController,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting attend-worker");

    if let Err(e) = run().await {
        error!("Engine error: {:#}", e);
        std::process::exit(1);
    }

    info!("Engine shutdown complete");
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["attend=info", "hyper=warn", "reqwest=warn"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<()> {
    let config = EngineConfig::from_env();
    info!("Engine config: {:?}", config);

    if let Some(port) = std::env::var("METRICS_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
    {
        attend_worker::metrics::init_metrics(port)?;
        info!(port, "Prometheus exporter listening");
    }

    let registry = match &config.roster_path {
        Some(path) => IdentityRegistry::from_json_file(path).context("Failed to load roster")?,
        None => {
            warn!("ROSTER_PATH not set; no identity can be confirmed");
            IdentityRegistry::default()
        }
    };

    let recognition = match MlClient::from_env() {
        Ok(client) => {
            if let Err(e) = client.health().await {
                warn!(error = %e, "Recognition service health check failed");
            }
            let client = Arc::new(client);
            Some(Recognition {
                detector: client.clone(),
                embedder: client,
            })
        }
        Err(e) => {
            warn!(error = %e, "Recognition service not configured; detection unavailable");
            None
        }
    };

    let writer: Arc<dyn PresenceWriter> =
        match FirestorePresenceWriter::from_env(config.class_label.clone()).await {
            Ok(writer) => Arc::new(writer),
            Err(e) => {
                warn!(error = %e, "Firestore not available; presence writes disabled");
                Arc::new(NoopPresenceWriter)
            }
        };

    let annotator = match &config.preview_font_path {
        Some(path) => Annotator::new().with_font_file(path).unwrap_or_else(|e| {
            warn!(error = %e, "Preview font not loaded; using built-in glyphs");
            Annotator::new()
        }),
        None => Annotator::new(),
    };

    let controller = SessionController::new(
        config.clone(),
        Arc::new(registry),
        Collaborators {
            frames: camera_factory(&config),
            recognition,
            writer,
            annotator,
        },
    )?;

    let date = std::env::args().nth(1);
    let outcome = controller.start(date.as_deref());
    if !outcome.ok {
        anyhow::bail!(
            "Session not started: {}",
            outcome.reason.unwrap_or_default()
        );
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            controller.stop();
            controller.wait_until_idle().await;
        }
        _ = controller.wait_until_idle() => {}
    }

    let status = controller.status();
    info!(
        confirmed = ?status.confirmed,
        frames = status.frame_count,
        "Session finished"
    );
    if let Some(err) = status.error {
        warn!(error = %err, "Session ended with an error");
    }
    Ok(())
}

#[cfg(feature = "opencv")]
fn camera_factory(config: &EngineConfig) -> Arc<dyn FrameSourceFactory> {
    Arc::new(attend_media::OpenCvCameraFactory(config.camera.clone()))
}

#[cfg(not(feature = "opencv"))]
fn camera_factory(config: &EngineConfig) -> Arc<dyn FrameSourceFactory> {
    Arc::new(config.camera.clone())
}
