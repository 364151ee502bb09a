use anyhow::{Context, Result};
use clap::Parser;
use robochess::config::{Cli, Settings};
use robochess::lifecycle::{ControllerOptions, LifecycleController, StatusMailbox};
use robochess::{control, transport, vision};
use std::sync::Arc;
use stockfish_oracle::StockfishOracle;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::resolve(&cli).context("failed to load settings")?;
    info!("[SETTINGS] {:?}", settings);

    let addr = settings.control_addr();
    let (source, sink) = transport::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to control server at {addr}"))?;
    let frames = vision::open_stream(&settings.vision.frames)
        .await
        .with_context(|| format!("failed to open frame stream '{}'", settings.vision.frames))?;
    let oracle =
        StockfishOracle::new(settings.engine.path.clone()).with_grace(settings.engine.grace());

    let mailbox = Arc::new(StatusMailbox::new());
    let control = tokio::spawn(control::run_control_channel(source, Arc::clone(&mailbox)));

    let controller = LifecycleController::new(
        ControllerOptions::from_settings(&settings),
        mailbox,
        Box::new(sink),
        Box::new(frames),
        Box::new(oracle),
    );
    controller.run().await.context("lifecycle stopped")?;

    control
        .await
        .context("control task panicked")?
        .context("control channel failed")?;
    info!("[LIFECYCLE] Shut down");
    Ok(())
}
