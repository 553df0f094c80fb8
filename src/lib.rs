//! MQTT bridge turning gateway node inventories into Home Assistant
//! discovery messages.
//!
//! The bridge subscribes to the gateway's node-inventory topic, renders one
//! advertisement per announced device from a firmware-keyed template store,
//! and publishes each advertisement on the discovery topic. On startup (and
//! optionally on a repeating interval) it asks the gateway to re-announce
//! its nodes. A liveness endpoint runs alongside.
//!
//! # Topics
//!
//! ```text
//! gateway/{id}/nodes/get   discovery request (publish, empty payload)
//! gateway/{id}/nodes       node inventory (subscribe)
//! homeassistant/devices    advertisements (publish, one per device)
//! ```
//!
//! The `{}` slot in the first two patterns is substituted with the
//! configured gateway identifier.

pub mod announcer;
pub mod bridge;
pub mod config;
pub mod devices;
pub mod error;
pub mod health;
pub mod templates;

// Re-export commonly used types at the crate root
pub use bridge::Bridge;
pub use config::{Args, LogFormat, Settings, TopicPattern};
pub use devices::{DeviceRecord, firmware_key, parse_device_list};
pub use error::{BridgeError, Result};
pub use templates::TemplateStore;

/// Initialize tracing from the resolved settings.
///
/// `RUST_LOG` takes precedence; otherwise the level is `debug` when the
/// debug toggle is set and `info` when it is not.
pub fn init_tracing(settings: &Settings) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_level = if settings.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match settings.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    }
    .map_err(|e| BridgeError::config(format!("Failed to initialize tracing: {}", e)))
}
