//! MQTT connection lifecycle and the device-list pipeline.
//!
//! The bridge owns one MQTT client and its event loop. On every broker
//! acknowledgment (initial connect and each reconnect) it subscribes to the
//! node-inventory topic, so the subscription is never silently dropped. A
//! device-list message is processed to completion before the next one is
//! taken; the announcement schedule and the health endpoint run as separate
//! tasks and share nothing with the pipeline but the clonable client.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};

use crate::config::Settings;
use crate::devices;
use crate::error::{BridgeError, Result};
use crate::templates::TemplateStore;

const CLIENT_ID: &str = "mqtt-bridge-discovery";
const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// The bridge controller. Lifecycle: open (new) -> running (run) -> closed
/// (shutdown).
pub struct Bridge {
    client: AsyncClient,
    eventloop: EventLoop,
    store: TemplateStore,
    nodes_topic: String,
    advertisement_topic: String,
}

impl Bridge {
    /// Create the MQTT client. Does not touch the network until [`run`].
    ///
    /// [`run`]: Bridge::run
    pub fn new(settings: &Settings, store: TemplateStore) -> Self {
        let mut options = MqttOptions::new(CLIENT_ID, &settings.broker, settings.port);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, eventloop) = AsyncClient::new(options, 16);

        Self {
            client,
            eventloop,
            store,
            nodes_topic: settings.nodes_topic.expand(&settings.gateway_id),
            advertisement_topic: settings.advertisement_topic.clone(),
        }
    }

    /// Handle to the shared publish capability. Clones are safe for
    /// concurrent callers, so the announcement schedule publishes through
    /// one while the pipeline publishes through the original.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Drive the event loop until the task is cancelled.
    ///
    /// A connection error before the first broker acknowledgment is fatal;
    /// the bridge must not silently run disconnected. Later errors are
    /// logged and the loop reconnects after a short delay.
    pub async fn run(&mut self) -> Result<()> {
        let mut connected_once = false;

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!(topic = %self.nodes_topic, "Connected to MQTT broker");
                    connected_once = true;

                    if let Err(e) = self
                        .client
                        .subscribe(self.nodes_topic.as_str(), QoS::AtMostOnce)
                        .await
                    {
                        tracing::error!(
                            topic = %self.nodes_topic,
                            error = %e,
                            "Failed to subscribe to nodes topic"
                        );
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic == self.nodes_topic {
                        self.handle_node_list(&publish.payload).await;
                    }
                }
                Ok(_) => {}
                Err(e) if !connected_once => {
                    return Err(BridgeError::Connection(e.to_string()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "MQTT connection lost, reconnecting");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    /// Process one device-list message to completion.
    async fn handle_node_list(&self, payload: &[u8]) {
        let advertisements = match render_batch(&self.store, payload) {
            Ok(advertisements) => advertisements,
            Err(e) => {
                tracing::error!(error = %e, "Discarding device-list message");
                return;
            }
        };

        let total = advertisements.len();
        let mut published = 0usize;

        for (device_id, advertisement) in advertisements {
            match self
                .client
                .publish(
                    self.advertisement_topic.as_str(),
                    QoS::AtMostOnce,
                    false,
                    advertisement,
                )
                .await
            {
                Ok(()) => published += 1,
                Err(e) => {
                    tracing::error!(
                        device = %device_id,
                        topic = %self.advertisement_topic,
                        error = %e,
                        "Failed to publish advertisement"
                    );
                }
            }
        }

        tracing::info!(rendered = total, published, "Processed device list");
    }

    /// Close the broker connection.
    pub async fn shutdown(&self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::warn!(error = %e, "Error disconnecting from MQTT broker");
        }
    }
}

/// Parse a device-list payload and render one advertisement per device that
/// has a matching template, in input order.
///
/// A malformed payload fails the whole batch. A device whose template is
/// missing or fails to render is logged and skipped; its siblings are
/// unaffected.
pub fn render_batch(store: &TemplateStore, payload: &[u8]) -> Result<Vec<(String, String)>> {
    let devices = devices::parse_device_list(payload)?;

    tracing::debug!(count = devices.len(), "Received device list");

    let mut rendered = Vec::with_capacity(devices.len());
    for device in &devices {
        match store.resolve(device) {
            Ok(advertisement) => rendered.push((device.id.clone(), advertisement)),
            Err(e) => {
                tracing::warn!(
                    device = %device.id,
                    firmware = %device.firmware,
                    "Skipping device: {}",
                    e
                );
            }
        }
    }

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn store_with(templates: &[(&str, &str)]) -> (TempDir, TemplateStore) {
        let dir = TempDir::new().unwrap();
        for (name, content) in templates {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let store = TemplateStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_render_batch_skips_device_without_template() {
        let (_dir, store) = store_with(&[
            ("led-pwm.yaml", "id: {{ device.id }}"),
            ("climate-monitor.yaml", "id: {{ device.id }}"),
        ]);

        // device 2 has no template; 1 and 3 must still render
        let payload = br#"[
            {"id": "dev1", "alias": "led-pwm:terasa:0"},
            {"id": "dev2", "alias": "doorbell:bell:0"},
            {"id": "dev3", "alias": "climate-monitor:0"}
        ]"#;

        let rendered = render_batch(&store, payload).unwrap();

        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0], ("dev1".to_string(), "id: dev1".to_string()));
        assert_eq!(rendered[1], ("dev3".to_string(), "id: dev3".to_string()));
    }

    #[test]
    fn test_render_batch_skips_device_with_render_failure() {
        let (_dir, store) = store_with(&[
            ("led-pwm.yaml", "id: {{ device.id }}"),
            ("doorbell.yaml", "room: {{ device.room }}"),
        ]);

        let payload = br#"[
            {"id": "dev1", "alias": "doorbell:bell:0"},
            {"id": "dev2", "alias": "led-pwm:terasa:0"}
        ]"#;

        let rendered = render_batch(&store, payload).unwrap();

        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].0, "dev2");
    }

    #[test]
    fn test_render_batch_rejects_malformed_payload() {
        let (_dir, store) = store_with(&[("led-pwm.yaml", "id: {{ device.id }}")]);

        assert!(matches!(
            render_batch(&store, br#"{"id": "dev1", "alias": "led-pwm:0"}"#),
            Err(BridgeError::Payload(_))
        ));
        assert!(matches!(
            render_batch(&store, br#"[{"id": "dev1"}]"#),
            Err(BridgeError::Payload(_))
        ));
    }

    #[test]
    fn test_render_batch_recovers_after_malformed_payload() {
        let (_dir, store) = store_with(&[("led-pwm.yaml", "id: {{ device.id }}")]);

        assert!(render_batch(&store, b"not json").is_err());

        // the store is untouched; the next valid message renders normally
        let rendered = render_batch(&store, br#"[{"id": "dev1", "alias": "led-pwm:terasa:0"}]"#)
            .unwrap();
        assert_eq!(rendered.len(), 1);
    }

    #[test]
    fn test_render_batch_preserves_order() {
        let (_dir, store) = store_with(&[("led-pwm.yaml", "id: {{ device.id }}")]);

        let payload = br#"[
            {"id": "b", "alias": "led-pwm:1"},
            {"id": "a", "alias": "led-pwm:2"},
            {"id": "c", "alias": "led-pwm:3"}
        ]"#;

        let rendered = render_batch(&store, payload).unwrap();
        let ids: Vec<&str> = rendered.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }
}
