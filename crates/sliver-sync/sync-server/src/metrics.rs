//! Prometheus metrics for reconciliation passes.
//!
//! ## Counters
//! - `sliver_sync_records_updated_total{pass}`: records persisted by a pass
//! - `sliver_sync_records_skipped_total{pass,reason}`: feed lines or records
//!   that were not applied
//! - `sliver_sync_pass_failures_total{pass}`: passes aborted before completion
//! - `sliver_sync_unit_failures_total{family}`: monitoring (slice, family)
//!   units skipped
//!
//! ## Histograms
//! - `sliver_sync_pass_duration_seconds{pass}`: wall-clock time of a pass

#![allow(clippy::cast_precision_loss)]

use std::time::Duration;

use metrics::{
    counter,
    histogram,
};
use sliver_sync_core::AddressFamily;

pub const PASS_ADDRESSES: &str = "addresses";
pub const PASS_STATUS: &str = "status";

pub fn record_updated(pass: &'static str, count: usize) {
    counter!("sliver_sync_records_updated_total", "pass" => pass).increment(count as u64);
}

pub fn record_skipped(pass: &'static str, reason: &'static str) {
    counter!("sliver_sync_records_skipped_total", "pass" => pass, "reason" => reason).increment(1);
}

pub fn record_pass_failure(pass: &'static str) {
    counter!("sliver_sync_pass_failures_total", "pass" => pass).increment(1);
}

pub fn record_unit_failure(family: AddressFamily) {
    counter!("sliver_sync_unit_failures_total", "family" => family.as_str()).increment(1);
}

pub fn record_pass_duration(pass: &'static str, elapsed: Duration) {
    histogram!("sliver_sync_pass_duration_seconds", "pass" => pass).record(elapsed.as_secs_f64());
}
