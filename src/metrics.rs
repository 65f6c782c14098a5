// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for inventory-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding daemon is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `inventory_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `kind`: entity kind (`netbox`, `interface`, ...)
//! - `outcome` on rounds and type changes: `committed`, or the error label
//!   (`ambiguous`, `missing_root`, `unresolved`, `cycle`, `wrong_kind`, `storage`)
//! - `outcome` on entities: `created`, `updated` or `unchanged`

use metrics::{counter, histogram};
use std::time::Duration;

/// Record a finished round
pub fn record_round(outcome: &str) {
    counter!(
        "inventory_sync_rounds_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record round duration, including cleanup and commit
pub fn record_round_latency(duration: Duration) {
    histogram!("inventory_sync_round_seconds").record(duration.as_secs_f64());
}

/// Record one shadow committed to the store
pub fn record_entity(kind: &str, outcome: &str) {
    counter!(
        "inventory_sync_entities_total",
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a data-quality correction
pub fn record_correction(kind: &str) {
    counter!(
        "inventory_sync_corrections_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record rows removed by cleanup
pub fn record_deleted(kind: &str, count: u64) {
    if count == 0 {
        return;
    }
    counter!(
        "inventory_sync_deleted_total",
        "kind" => kind.to_string()
    )
    .increment(count);
}

/// Record a lifecycle event handed to the sink
pub fn record_event(kind: &str) {
    counter!(
        "inventory_sync_events_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a netbox type change
pub fn record_type_change(outcome: &str) {
    counter!(
        "inventory_sync_type_changes_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Timer guard that records round latency on drop
pub struct RoundTimer {
    start: std::time::Instant,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for RoundTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        record_round_latency(self.start.elapsed());
    }
}
