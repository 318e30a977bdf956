//! ==============================================================================
//! feed.rs - external reading source
//! ==============================================================================
//!
//! purpose:
//!     the aggregator can merge readings from a remote provider with its own
//!     window. this module defines that collaborator and an http client for it.
//!
//! relationships:
//!     - used by: store.rs (list_recent / snapshot merge-with-fallback)
//!     - used by: main.rs (builds HttpFeed from [feed] config)
//!
//! provider quirks:
//!     providers name the sample time either `timestamp` or `created_at`,
//!     and may return a bare array or an object wrapping it in `data`.
//!     both are normalized here so the aggregator only sees ExternalReading.
//!
//! ==============================================================================

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{ExternalReading, NumericInput};
use crate::error::DashboardError;

/// Something that can hand over readings recorded elsewhere.
///
/// Implementations must bound their own latency; errors come back as
/// `DashboardError::Network`.
#[async_trait]
pub trait ExternalSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<ExternalReading>, DashboardError>;
}

/// No external provider configured: always an empty, successful fetch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeed;

#[async_trait]
impl ExternalSource for NoFeed {
    async fn fetch(&self) -> Result<Vec<ExternalReading>, DashboardError> {
        Ok(Vec::new())
    }
}

// ==============================================================================
// http provider
// ==============================================================================

pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DashboardError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::Config(format!("Failed to build feed client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ExternalSource for HttpFeed {
    async fn fetch(&self) -> Result<Vec<ExternalReading>, DashboardError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_feed(&body)
    }
}

// ==============================================================================
// wire format
// ==============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedPayload {
    Bare(Vec<RawExternalReading>),
    Wrapped { data: Vec<RawExternalReading> },
}

#[derive(Debug, Deserialize)]
struct RawExternalReading {
    id: serde_json::Value,
    #[serde(default)]
    device_id: Option<String>,
    temperature: NumericInput,
    humidity: NumericInput,
    light: NumericInput,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

/// Decodes a provider response body into normalized readings.
pub fn parse_feed(body: &str) -> Result<Vec<ExternalReading>, DashboardError> {
    let payload: FeedPayload = serde_json::from_str(body)
        .map_err(|e| DashboardError::Network(format!("Malformed feed payload: {}", e)))?;
    let raw = match payload {
        FeedPayload::Bare(items) => items,
        FeedPayload::Wrapped { data } => data,
    };
    raw.into_iter().map(normalize).collect()
}

fn normalize(raw: RawExternalReading) -> Result<ExternalReading, DashboardError> {
    let id = match raw.id {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    let stamp = raw
        .timestamp
        .or(raw.created_at)
        .ok_or_else(|| DashboardError::Network(format!("Feed reading {} has no timestamp", id)))?;
    let timestamp = DateTime::parse_from_rfc3339(stamp.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            DashboardError::Network(format!("Feed reading {} has bad timestamp {:?}: {}", id, stamp, e))
        })?;

    let numeric = |e: DashboardError| DashboardError::Network(format!("Feed reading {}: {}", id, e));
    Ok(ExternalReading {
        temperature: raw.temperature.to_f64("temperature").map_err(numeric)?,
        humidity: raw.humidity.to_f64("humidity").map_err(numeric)?,
        light: raw.light.to_i64("light").map_err(numeric)?,
        device_id: raw.device_id,
        timestamp,
        id,
    })
}
