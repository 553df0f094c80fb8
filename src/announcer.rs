//! Discovery-request scheduling.
//!
//! The bridge asks the gateway to re-announce its node inventory by
//! publishing an empty payload to the discovery topic. Without a configured
//! interval this happens exactly once at startup; with one it repeats for
//! the process lifetime, concurrently with inbound-message servicing.

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, QoS};
use tokio::time::{self, MissedTickBehavior};

/// Drive the announcement schedule.
///
/// Announces once immediately. With an interval the schedule then repeats
/// every `interval`; without one this returns after the initial
/// announcement. A tick that fires late is simply late, never queued or
/// doubled.
pub async fn run_schedule<F, Fut>(interval: Option<Duration>, mut announce: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    announce().await;

    let Some(period) = interval else {
        return;
    };

    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately and is covered by the
    // announcement above
    ticker.tick().await;

    loop {
        ticker.tick().await;
        announce().await;
    }
}

/// Publish one discovery request. The payload is empty; the topic itself is
/// the request.
pub async fn announce(client: &AsyncClient, topic: &str) {
    tracing::debug!(topic, "Requesting node re-discovery");

    if let Err(e) = client.publish(topic, QoS::AtMostOnce, false, "").await {
        tracing::error!(topic, error = %e, "Failed to publish discovery request");
    }
}
