//! Firmware template store.
//!
//! Templates live in a directory, one `<firmware>.yaml` file per firmware,
//! and are rendered with a `device` context carrying `id`, `alias`, and
//! `firmware`. The store is loaded once at startup and immutable for the
//! process lifetime.

use std::error::Error as _;
use std::path::Path;

use tera::Tera;

use crate::devices::DeviceRecord;
use crate::error::{BridgeError, Result};

/// Store of firmware advertisement templates.
pub struct TemplateStore {
    tera: Tera,
}

impl TemplateStore {
    /// Load all `*.yaml` templates from the firmware directory.
    ///
    /// A missing directory or a template with syntax errors fails startup.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        if !dir.is_dir() {
            return Err(BridgeError::config(format!(
                "firmware directory '{}' does not exist",
                dir.display()
            )));
        }

        let glob = format!("{}/*.yaml", dir.display());
        let tera = Tera::new(&glob).map_err(|e| {
            BridgeError::config(format!(
                "failed to load templates from '{}': {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Self { tera })
    }

    /// Number of templates in the store.
    pub fn len(&self) -> usize {
        self.tera.get_template_names().count()
    }

    /// Whether the store holds no templates.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the advertisement for one device.
    ///
    /// Returns [`BridgeError::TemplateNotFound`] when the store has no
    /// `<firmware>.yaml` template and [`BridgeError::Render`] when the
    /// template exists but rendering fails. Both are per-device conditions;
    /// the caller skips the device and continues its batch.
    pub fn resolve(&self, device: &DeviceRecord) -> Result<String> {
        let name = format!("{}.yaml", device.firmware);

        if !self.tera.get_template_names().any(|n| n == name) {
            return Err(BridgeError::TemplateNotFound {
                firmware: device.firmware.clone(),
            });
        }

        let mut context = tera::Context::new();
        context.insert("device", device);

        self.tera.render(&name, &context).map_err(|e| {
            // Tera wraps the interesting cause one level down.
            let message = e
                .source()
                .map(|cause| format!("{}: {}", e, cause))
                .unwrap_or_else(|| e.to_string());
            BridgeError::Render {
                firmware: device.firmware.clone(),
                message,
            }
        })
    }
}
