//! # Settlement Metrics
//!
//! Prometheus counters for the settlement core.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! hub-settlement = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `settlement_refs_enqueued_total` - State commitments enqueued
//! - `settlement_heights_swept_total` - Queue heights swept
//! - `settlement_packets_settled_total` - Packets settled (by outcome)
//! - `settlement_reverts_total` - Rollapp reverts applied
//! - `settlement_fraud_evidence_total` - Fraud evidence handled (by verdict)
//! - `settlement_steps_aborted_total` - Steps rolled back (by operation)

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    /// State commitments enqueued
    pub static ref REFS_ENQUEUED: IntCounter = register_int_counter!(
        "settlement_refs_enqueued_total",
        "Total number of state commitments enqueued"
    )
    .expect("Failed to create REFS_ENQUEUED metric");

    /// Queue heights swept
    pub static ref HEIGHTS_SWEPT: IntCounter = register_int_counter!(
        "settlement_heights_swept_total",
        "Total number of queue heights swept"
    )
    .expect("Failed to create HEIGHTS_SWEPT metric");

    /// Packets settled, labeled by outcome
    pub static ref PACKETS_SETTLED: IntCounterVec = register_int_counter_vec!(
        "settlement_packets_settled_total",
        "Total number of delayed packets settled",
        &["outcome"]
    )
    .expect("Failed to create PACKETS_SETTLED metric");

    /// Rollapp reverts applied
    pub static ref REVERTS: IntCounter = register_int_counter!(
        "settlement_reverts_total",
        "Total number of rollapp reverts applied"
    )
    .expect("Failed to create REVERTS metric");

    /// Fraud evidence handled, labeled by verdict
    pub static ref FRAUD_EVIDENCE: IntCounterVec = register_int_counter_vec!(
        "settlement_fraud_evidence_total",
        "Total number of fraud evidence submissions handled",
        &["verdict"]
    )
    .expect("Failed to create FRAUD_EVIDENCE metric");

    /// Steps rolled back, labeled by operation
    pub static ref STEPS_ABORTED: IntCounterVec = register_int_counter_vec!(
        "settlement_steps_aborted_total",
        "Total number of settlement steps rolled back",
        &["operation"]
    )
    .expect("Failed to create STEPS_ABORTED metric");
}

#[cfg(feature = "metrics")]
pub fn record_refs_enqueued(count: u64) {
    REFS_ENQUEUED.inc_by(count);
}

#[cfg(feature = "metrics")]
pub fn record_height_swept() {
    HEIGHTS_SWEPT.inc();
}

#[cfg(feature = "metrics")]
pub fn record_packets_settled(outcome: &str, count: u64) {
    PACKETS_SETTLED.with_label_values(&[outcome]).inc_by(count);
}

#[cfg(feature = "metrics")]
pub fn record_revert() {
    REVERTS.inc();
}

#[cfg(feature = "metrics")]
pub fn record_fraud_evidence(verdict: &str) {
    FRAUD_EVIDENCE.with_label_values(&[verdict]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_step_aborted(operation: &str) {
    STEPS_ABORTED.with_label_values(&[operation]).inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_refs_enqueued(_count: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_height_swept() {}

#[cfg(not(feature = "metrics"))]
pub fn record_packets_settled(_outcome: &str, _count: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_revert() {}

#[cfg(not(feature = "metrics"))]
pub fn record_fraud_evidence(_verdict: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_step_aborted(_operation: &str) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_run_with_or_without_feature() {
        record_refs_enqueued(2);
        record_height_swept();
        record_packets_settled("FINALIZED", 3);
        record_revert();
        record_fraud_evidence("rejected");
        record_step_aborted("submit_state_update");
    }
}
