use std::sync::Arc;

use anyhow::Result;
use ecowitt_gateway::bus::{self, MqttBus};
use ecowitt_gateway::config::{MqttSettings, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    eprintln!("[ecowitt-gateway] booting...");

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env();
    let mqtt = MqttSettings::from_env();
    tracing::info!("publishing deltas under {}{}", mqtt.topic_prefix, bus::SOURCE_ID);

    let (client, eventloop) = bus::connect(&mqtt).await?;
    tokio::spawn(bus::drive(eventloop));

    let server = ecowitt_gateway::start(
        settings,
        Arc::new(MqttBus::new(client, mqtt.topic_prefix)),
    )
    .await?;

    shutdown_signal().await;
    server.stop().await?;
    tracing::info!("ecowitt-gateway shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigint = signal(SignalKind::interrupt()).expect("listen SIGINT");
    let mut sigterm = signal(SignalKind::terminate()).expect("listen SIGTERM");
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("shutdown signal received");
}
