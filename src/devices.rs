//! Device-list parsing and firmware-key derivation.
//!
//! The gateway announces its node inventory as a JSON array of
//! `{id, alias}` objects, for example:
//!
//! ```text
//! [{"id": "72335554ea02", "alias": "led-pwm:terasa:0"},
//!  {"id": "eaf0e05f9dfa", "alias": "climate-monitor:0"}]
//! ```
//!
//! The alias encodes the firmware name as its first colon-delimited
//! segment; the firmware name selects the advertisement template.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// One device announced by the gateway, ready for template rendering.
///
/// Created fresh per inbound message and not mutated after derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    /// Opaque device identifier.
    pub id: String,
    /// Colon-delimited alias, e.g. `led-pwm:terasa:0`.
    pub alias: String,
    /// Firmware key derived from the alias.
    pub firmware: String,
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    id: String,
    alias: String,
}

/// Derive the firmware key: the first colon-delimited segment of the alias.
///
/// An alias without a colon yields the whole alias.
pub fn firmware_key(alias: &str) -> &str {
    alias.split_once(':').map(|(key, _)| key).unwrap_or(alias)
}

/// Parse a device-list payload into render-ready records.
///
/// The payload must be a JSON array of objects each carrying `id` and
/// `alias`. Anything else fails the whole message with
/// [`BridgeError::Payload`]; per-device template problems are handled
/// later and never reported from here. Output preserves input order.
pub fn parse_device_list(payload: &[u8]) -> Result<Vec<DeviceRecord>> {
    let value: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| BridgeError::payload(format!("not valid JSON: {}", e)))?;

    let serde_json::Value::Array(items) = value else {
        return Err(BridgeError::payload("expected a JSON array of devices"));
    };

    let mut devices = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let raw: RawDevice = serde_json::from_value(item)
            .map_err(|e| BridgeError::payload(format!("device at index {}: {}", index, e)))?;

        if raw.alias.is_empty() {
            return Err(BridgeError::payload(format!(
                "device at index {} has an empty alias",
                index
            )));
        }

        let firmware = firmware_key(&raw.alias).to_string();
        devices.push(DeviceRecord {
            id: raw.id,
            alias: raw.alias,
            firmware,
        });
    }

    Ok(devices)
}
