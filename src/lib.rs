//! Telemetry hub for a small sensor dashboard.
//!
//! Devices post temperature/humidity/light readings; the dashboard reads the
//! latest reading, threshold-derived alerts and rolling 24h statistics, and
//! can adjust the alert thresholds. All state lives in memory.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod feed;
pub mod simulator;
pub mod stats;
pub mod store;
