//! ==============================================================================
//! stats.rs - rolling statistics for the dashboard
//! ==============================================================================
//!
//! purpose:
//!     summarizes the readings of the last N hours (24 by default): count,
//!     alert count and rounded averages.
//!
//! relationships:
//!     - used by: store.rs (snapshot)
//!     - used by: simulator.rs (round_to_tenth for generated samples)
//!
//! ==============================================================================

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Reading, Stats24h};

/// Computes the stats over readings whose timestamp lies within `window`
/// of `now` (inclusive at exactly `window`). Empty windows give zeroes.
pub fn rolling_stats<'a, I>(readings: I, now: DateTime<Utc>, window: Duration) -> Stats24h
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut count = 0usize;
    let mut alerts = 0usize;
    let mut mean_temperature = 0.0;
    let mut mean_humidity = 0.0;
    let mut mean_light = 0.0;

    for r in readings
        .into_iter()
        .filter(|r| now.signed_duration_since(r.timestamp) <= window)
    {
        count += 1;
        if r.alert {
            alerts += 1;
        }
        // running means stay finite where a plain sum of large values would not
        let n = count as f64;
        mean_temperature = running_mean(mean_temperature, r.temperature, n);
        mean_humidity = running_mean(mean_humidity, r.humidity, n);
        mean_light = running_mean(mean_light, r.light as f64, n);
    }

    if count == 0 {
        return Stats24h::default();
    }

    Stats24h {
        total_readings: count,
        alerts,
        avg_temperature: round_to_tenth(mean_temperature),
        avg_humidity: round_to_tenth(mean_humidity),
        avg_light: mean_light.round() as i64,
    }
}

/// mean of the first `n` values given the mean of the first `n - 1`
fn running_mean(mean: f64, x: f64, n: f64) -> f64 {
    mean + (x / n - mean / n)
}

pub fn round_to_tenth(v: f64) -> f64 {
    let scaled = v * 10.0;
    if !scaled.is_finite() {
        // too large to carry a fractional digit anyway
        return v;
    }
    scaled.round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReadingId;
    use chrono::TimeZone;

    fn reading(temperature: f64, humidity: f64, light: i64, at: DateTime<Utc>, alert: bool) -> Reading {
        Reading {
            id: ReadingId::Local(at.timestamp_millis() as u64),
            device_id: "test".into(),
            temperature,
            humidity,
            light,
            timestamp: at,
            alert,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_window_is_all_zero() {
        let stats = rolling_stats(std::iter::empty::<&Reading>(), now(), Duration::hours(24));
        assert_eq!(stats, Stats24h::default());
        assert_eq!(stats.avg_temperature, 0.0);
        assert!(!stats.avg_humidity.is_nan());
    }

    #[test]
    fn averages_are_rounded() {
        let readings = vec![
            reading(21.0, 50.0, 600, now(), false),
            reading(22.0, 51.0, 601, now(), false),
            reading(22.0, 51.0, 601, now(), true),
        ];
        let stats = rolling_stats(&readings, now(), Duration::hours(24));
        assert_eq!(stats.total_readings, 3);
        assert_eq!(stats.alerts, 1);
        assert_eq!(stats.avg_temperature, 21.7);
        assert_eq!(stats.avg_humidity, 50.7);
        assert_eq!(stats.avg_light, 601);
    }

    #[test]
    fn huge_values_keep_finite_averages() {
        let readings = vec![
            reading(1e308, 1e308, 600, now(), true),
            reading(1e308, 1e308, 600, now(), true),
        ];
        let stats = rolling_stats(&readings, now(), Duration::hours(24));
        assert_eq!(stats.avg_temperature, 1e308);
        assert_eq!(stats.avg_humidity, 1e308);

        let opposite = vec![
            reading(1e308, 50.0, 600, now(), true),
            reading(-1e308, 50.0, 600, now(), false),
        ];
        let stats = rolling_stats(&opposite, now(), Duration::hours(24));
        assert_eq!(stats.avg_temperature, 0.0);
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json["avg_temperature"].is_f64());
    }

    #[test]
    fn window_edge_is_inclusive() {
        let readings = vec![
            reading(10.0, 50.0, 600, now() - Duration::hours(24), false),
            reading(40.0, 50.0, 600, now() - Duration::hours(24) - Duration::seconds(1), true),
        ];
        let stats = rolling_stats(&readings, now(), Duration::hours(24));
        assert_eq!(stats.total_readings, 1);
        assert_eq!(stats.alerts, 0);
        assert_eq!(stats.avg_temperature, 10.0);
    }
}
