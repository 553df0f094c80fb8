//! MQTT bridge for Home Assistant device discovery.
//!
//! Connects to an MQTT broker, asks the sensor gateway to announce its node
//! inventory, and republishes each announced device as a rendered discovery
//! document.

use anyhow::Result;
use clap::Parser;

use mqtt_bridge_discovery::{Args, Bridge, Settings, TemplateStore, announcer, health};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments and layer them over env and defaults
    let args = Args::parse();
    let settings = Settings::resolve(&args).map_err(|e| anyhow::anyhow!("{}", e))?;

    mqtt_bridge_discovery::init_tracing(&settings).map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!(
        broker = %settings.broker,
        port = settings.port,
        gateway = %settings.gateway_id,
        "Starting discovery bridge"
    );

    // Load the template store before touching the network
    let store =
        TemplateStore::open(&settings.firmware_dir).map_err(|e| anyhow::anyhow!("{}", e))?;
    tracing::info!(
        templates = store.len(),
        dir = %settings.firmware_dir.display(),
        "Loaded firmware templates"
    );

    let mut bridge = Bridge::new(&settings, store);

    // The health endpoint serves before the broker connection succeeds
    let health_listen = settings.health_listen;
    let health_task = tokio::spawn(async move {
        if let Err(e) = health::serve(health_listen).await {
            tracing::error!(error = %e, "Health endpoint failed");
        }
    });

    // Announcement schedule: once at startup, then every interval if one is
    // configured. Runs concurrently with message servicing; the only shared
    // object is the clonable client.
    let announce_client = bridge.client();
    let discovery_topic = settings.discovery_topic.expand(&settings.gateway_id);
    let interval = settings.advertise_interval;
    let announce_task = tokio::spawn(async move {
        announcer::run_schedule(interval, || {
            announcer::announce(&announce_client, &discovery_topic)
        })
        .await;
    });

    // Run until Ctrl+C or a fatal connection error
    let result = tokio::select! {
        result = bridge.run() => result.map_err(|e| anyhow::anyhow!("{}", e)),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
            Ok(())
        }
    };

    announce_task.abort();
    health_task.abort();
    bridge.shutdown().await;

    tracing::info!("Goodbye!");

    result
}
