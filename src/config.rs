//! Bridge configuration.
//!
//! Settings are layered in increasing precedence: built-in defaults,
//! environment variables, command-line flags. Each field is overridden
//! independently; an absent override at any layer leaves the prior layer's
//! value intact.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{BridgeError, Result};

const DEFAULT_BROKER: &str = "mqtt.example.com";
const DEFAULT_PORT: u16 = 1883;
const DEFAULT_DISCOVERY_TOPIC: &str = "gateway/{}/nodes/get";
const DEFAULT_NODES_TOPIC: &str = "gateway/{}/nodes";
const DEFAULT_ADVERTISEMENT_TOPIC: &str = "homeassistant/devices";
const DEFAULT_GATEWAY_ID: &str = "usb-dongle";
const DEFAULT_FIRMWARE_DIR: &str = "firmware";
const DEFAULT_HEALTH_LISTEN: &str = "0.0.0.0:5000";

/// Command-line arguments.
///
/// Every flag is optional; an unset flag leaves the environment or default
/// value intact.
#[derive(Parser, Debug, Clone, Default)]
#[command(about = "MQTT bridge: gateway node inventory to Home Assistant discovery")]
pub struct Args {
    /// MQTT broker address.
    #[arg(long)]
    pub broker: Option<String>,

    /// MQTT broker port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Topic pattern for discovery requests (one `{}` slot for the gateway id).
    #[arg(long)]
    pub discovery_topic: Option<String>,

    /// Topic pattern for the node inventory (one `{}` slot for the gateway id).
    #[arg(long)]
    pub nodes_topic: Option<String>,

    /// Topic for rendered device advertisements.
    #[arg(long)]
    pub advertisement_topic: Option<String>,

    /// Gateway identifier substituted into the topic patterns.
    #[arg(long)]
    pub gateway_id: Option<String>,

    /// Advertisement interval in seconds. Unset means announce once at startup.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Directory of firmware templates (`<firmware>.yaml`).
    #[arg(long)]
    pub firmware_dir: Option<PathBuf>,

    /// Listen address for the health endpoint.
    #[arg(long)]
    pub health_listen: Option<SocketAddr>,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Topic pattern with a single `{}` slot for the gateway identifier.
///
/// Validated once at settings resolution so publishes never re-check it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern(String);

impl TopicPattern {
    /// Validate a pattern. It must contain exactly one `{}` slot.
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        match pattern.matches("{}").count() {
            1 => Ok(Self(pattern)),
            n => Err(BridgeError::config(format!(
                "topic pattern '{}' must contain exactly one '{{}}' slot, found {}",
                pattern, n
            ))),
        }
    }

    /// Substitute the gateway identifier into the slot.
    pub fn expand(&self, gateway_id: &str) -> String {
        self.0.replacen("{}", gateway_id, 1)
    }

    /// The raw pattern.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolved bridge settings. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Settings {
    /// MQTT broker address.
    pub broker: String,
    /// MQTT broker port.
    pub port: u16,
    /// Topic pattern for discovery requests.
    pub discovery_topic: TopicPattern,
    /// Topic pattern for the node inventory.
    pub nodes_topic: TopicPattern,
    /// Topic for rendered device advertisements.
    pub advertisement_topic: String,
    /// Gateway identifier.
    pub gateway_id: String,
    /// Announce repeatedly at this interval; `None` means once at startup.
    pub advertise_interval: Option<Duration>,
    /// Directory of firmware templates.
    pub firmware_dir: PathBuf,
    /// Listen address for the health endpoint.
    pub health_listen: SocketAddr,
    /// Debug logging toggle.
    pub debug: bool,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Settings {
    /// Resolve settings from defaults, the process environment, and CLI args.
    pub fn resolve(args: &Args) -> Result<Self> {
        Self::resolve_with(args, |key| std::env::var(key).ok())
    }

    fn resolve_with(args: &Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let broker = args
            .broker
            .clone()
            .or_else(|| env("MQTT_BROKER"))
            .unwrap_or_else(|| DEFAULT_BROKER.to_string());

        let port = match args.port {
            Some(port) => port,
            None => match env("MQTT_PORT") {
                Some(raw) => raw.parse().map_err(|_| {
                    BridgeError::config(format!("MQTT_PORT must be a port number, got '{}'", raw))
                })?,
                None => DEFAULT_PORT,
            },
        };

        let discovery_topic = TopicPattern::new(
            args.discovery_topic
                .clone()
                .or_else(|| env("MQTT_TOPIC_DISCOVERY"))
                .unwrap_or_else(|| DEFAULT_DISCOVERY_TOPIC.to_string()),
        )?;

        let nodes_topic = TopicPattern::new(
            args.nodes_topic
                .clone()
                .or_else(|| env("MQTT_TOPIC_NODES"))
                .unwrap_or_else(|| DEFAULT_NODES_TOPIC.to_string()),
        )?;

        let advertisement_topic = args
            .advertisement_topic
            .clone()
            .or_else(|| env("MQTT_TOPIC_ADVERTISEMENT"))
            .unwrap_or_else(|| DEFAULT_ADVERTISEMENT_TOPIC.to_string());

        let gateway_id = args
            .gateway_id
            .clone()
            .or_else(|| env("GATEWAY_ID"))
            .unwrap_or_else(|| DEFAULT_GATEWAY_ID.to_string());

        let interval_secs = match args.interval {
            Some(secs) => Some(secs),
            None => env("ADVERTISE_INTERVAL")
                .map(|raw| {
                    raw.parse::<u64>().map_err(|_| {
                        BridgeError::config(format!(
                            "ADVERTISE_INTERVAL must be a number of seconds, got '{}'",
                            raw
                        ))
                    })
                })
                .transpose()?,
        };

        if interval_secs == Some(0) {
            return Err(BridgeError::config(
                "advertise interval must be at least 1 second",
            ));
        }

        let firmware_dir = args
            .firmware_dir
            .clone()
            .or_else(|| env("FIRMWARE_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FIRMWARE_DIR));

        let health_listen = match args.health_listen {
            Some(addr) => addr,
            None => {
                let raw = env("HEALTH_LISTEN").unwrap_or_else(|| DEFAULT_HEALTH_LISTEN.to_string());
                raw.parse().map_err(|_| {
                    BridgeError::config(format!(
                        "HEALTH_LISTEN must be a socket address, got '{}'",
                        raw
                    ))
                })?
            }
        };

        Ok(Self {
            broker,
            port,
            discovery_topic,
            nodes_topic,
            advertisement_topic,
            gateway_id,
            advertise_interval: interval_secs.map(Duration::from_secs),
            firmware_dir,
            health_listen,
            debug: args.debug,
            log_format: args.log_format,
        })
    }
}
