//! ==============================================================================
//! store.rs - reading window and aggregator
//! ==============================================================================
//!
//! purpose:
//!     owns the bounded in-memory window of readings and the threshold
//!     configuration, and answers every query the dashboard makes.
//!
//! concurrency:
//!     store and thresholds sit behind ONE rwlock so that append+evict,
//!     threshold overwrite and the read used for listings/stats are each
//!     atomic. the external fetch happens before the lock is taken and never
//!     writes to aggregator state.
//!
//! ```text
//!     ┌──────────────┐   ingest    ┌─────────────────────────────┐
//!     │ http handler │ ──────────▶ │ RwLock<Inner>               │
//!     └──────────────┘             │  ├─ ReadingStore (fifo cap) │
//!                                  │  ├─ Thresholds              │
//!     ┌──────────────┐   fetch     │  └─ last_id                 │
//!     │ ExternalSrc  │ ─ ─ ─ ─ ─ ▶ └─────────────────────────────┘
//!     └──────────────┘  (outside lock, errors fall back to local)
//! ```
//!
//! ==============================================================================

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::domain::{
    DashboardSnapshot, IngestRequest, Reading, ReadingId, RecentReadings, StatusReport, Thresholds,
    ThresholdsUpdate,
};
use crate::error::DashboardError;
use crate::feed::ExternalSource;
use crate::stats;

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_LIMIT: usize = 50;
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

// ==============================================================================
// reading store
// ==============================================================================

/// Arrival-ordered readings, dropping the oldest once `capacity` is exceeded.
#[derive(Clone, Debug)]
pub struct ReadingStore {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl ReadingStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, reading: Reading) {
        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// oldest arrival first
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }
}

// ==============================================================================
// aggregator
// ==============================================================================

#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    pub capacity: usize,
    pub default_limit: usize,
    pub stats_window: Duration,
    pub thresholds: Thresholds,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_limit: DEFAULT_LIMIT,
            stats_window: Duration::hours(DEFAULT_WINDOW_HOURS),
            thresholds: Thresholds::default(),
        }
    }
}

struct Inner {
    store: ReadingStore,
    thresholds: Thresholds,
    last_id: u64,
}

pub struct Aggregator {
    inner: RwLock<Inner>,
    default_limit: usize,
    stats_window: Duration,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(AggregatorSettings::default())
    }
}

impl Aggregator {
    pub fn new(settings: AggregatorSettings) -> Self {
        Self {
            inner: RwLock::new(Inner {
                store: ReadingStore::new(settings.capacity),
                thresholds: settings.thresholds,
                last_id: 0,
            }),
            default_limit: settings.default_limit.max(1),
            stats_window: settings.stats_window,
        }
    }

    /// Validates a device sample, flags it against the current thresholds
    /// and appends it to the window.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<Reading, DashboardError> {
        self.ingest_at(request, Utc::now()).await
    }

    pub async fn ingest_at(
        &self,
        request: &IngestRequest,
        now: DateTime<Utc>,
    ) -> Result<Reading, DashboardError> {
        // parse before locking; a rejected sample never touches the store
        let sample = request.parse()?;

        let mut inner = self.inner.write().await;
        let millis = now.timestamp_millis().max(0) as u64;
        let id = millis.max(inner.last_id + 1);
        inner.last_id = id;

        let reading = Reading {
            id: ReadingId::Local(id),
            alert: inner
                .thresholds
                .is_alert(sample.temperature, sample.humidity, sample.light),
            device_id: sample.device_id,
            temperature: sample.temperature,
            humidity: sample.humidity,
            light: sample.light,
            timestamp: now,
        };
        inner.store.push(reading.clone());
        Ok(reading)
    }

    pub async fn thresholds(&self) -> Thresholds {
        self.inner.read().await.thresholds
    }

    /// Applies a partial update; all-or-nothing on validation failure.
    pub async fn update_thresholds(
        &self,
        update: &ThresholdsUpdate,
    ) -> Result<Thresholds, DashboardError> {
        let mut inner = self.inner.write().await;
        let mut next = inner.thresholds;
        next.apply(update)?;
        inner.thresholds = next;
        Ok(next)
    }

    /// Most recent `limit` readings by arrival, newest first, merged with the
    /// external source when it answers.
    pub async fn list_recent(
        &self,
        limit: Option<usize>,
        source: &dyn ExternalSource,
    ) -> RecentReadings {
        let limit = limit.filter(|l| *l > 0).unwrap_or(self.default_limit);
        let (combined, _) = self.merged(source).await;
        let total = combined.len();
        let readings = combined
            .into_iter()
            .skip(total.saturating_sub(limit))
            .rev()
            .collect();
        RecentReadings { readings, total }
    }

    pub async fn snapshot(&self, source: &dyn ExternalSource) -> DashboardSnapshot {
        self.snapshot_at(source, Utc::now()).await
    }

    pub async fn snapshot_at(
        &self,
        source: &dyn ExternalSource,
        now: DateTime<Utc>,
    ) -> DashboardSnapshot {
        let (combined, thresholds) = self.merged(source).await;
        DashboardSnapshot {
            stats_24h: stats::rolling_stats(&combined, now, self.stats_window),
            latest: combined.last().cloned(),
            thresholds,
        }
    }

    pub async fn status(&self) -> StatusReport {
        StatusReport {
            status: "online",
            timestamp: Utc::now(),
            total_readings: self.len().await,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.store.is_empty()
    }

    /// Local window followed by the external readings, in arrival order.
    ///
    /// A failed fetch is logged and treated as "no external readings".
    async fn merged(&self, source: &dyn ExternalSource) -> (Vec<Reading>, Thresholds) {
        let external = match source.fetch().await {
            Ok(readings) => readings,
            Err(e) => {
                tracing::warn!(error = %e, "External feed unavailable, serving local readings only");
                Vec::new()
            }
        };

        let inner = self.inner.read().await;
        let thresholds = inner.thresholds;
        let mut combined: Vec<Reading> = Vec::with_capacity(inner.store.len() + external.len());
        combined.extend(inner.store.iter().cloned());
        drop(inner);

        combined.extend(external.into_iter().map(|r| r.into_reading(&thresholds)));
        (combined, thresholds)
    }
}

/// Parses the `limit` query value; anything that is not a whole positive
/// integer (`"2.5"`, `"5abc"`, `"0"`) means "use the default".
pub fn parse_limit(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n as usize)
}
