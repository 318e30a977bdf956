//! ==============================================================================
//! simulator.rs - simulated sensor node
//! ==============================================================================
//!
//! purpose:
//!     stands in for the embedded device: every few seconds it makes up a
//!     plausible temperature/humidity/light sample and POSTs it to the hub's
//!     ingest endpoint, exactly like a real node would.
//!
//! relationships:
//!     - spawned by: main.rs (when [simulator] enabled = true)
//!     - talks to: api.rs (POST /api/sensor-data) over plain http
//!
//! ==============================================================================

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::config::SimulatorConfig;
use crate::stats::round_to_tenth;

/// Request body a device sends to the hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevicePayload {
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub light: i64,
}

/// makes up one sample in the ranges a living-room node would report
pub fn random_payload(device_id: &str) -> DevicePayload {
    let mut rng = rand::rng();
    DevicePayload {
        device_id: device_id.to_string(),
        temperature: round_to_tenth(rng.random_range(15.0..40.0)),
        humidity: round_to_tenth(rng.random_range(20.0..90.0)),
        light: rng.random_range(100..=1000),
    }
}

/// Posts samples forever. A failed post is logged and the loop carries on.
pub async fn run(config: SimulatorConfig) {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Simulator could not build http client");
            return;
        }
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_seconds.max(1)));
    tracing::info!(
        device_id = %config.device_id,
        target = %config.target_url,
        "Simulated device started"
    );

    loop {
        ticker.tick().await;
        let payload = random_payload(&config.device_id);

        match client.post(&config.target_url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(
                    temperature = payload.temperature,
                    humidity = payload.humidity,
                    light = payload.light,
                    "Simulated reading posted"
                );
            }
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "Hub rejected simulated reading");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to post simulated reading");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_payload_stays_in_range() {
        for _ in 0..200 {
            let p = random_payload("sim-1");
            assert_eq!(p.device_id, "sim-1");
            assert!((15.0..=40.0).contains(&p.temperature));
            assert!((20.0..=90.0).contains(&p.humidity));
            assert!((100..=1000).contains(&p.light));
        }
    }

    #[test]
    fn payload_matches_ingest_shape() {
        let json = serde_json::to_value(random_payload("sim-1")).unwrap();
        assert!(json["temperature"].is_f64());
        assert!(json["light"].is_i64());
        assert_eq!(json["device_id"], "sim-1");
    }
}
