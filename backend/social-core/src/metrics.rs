use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Users moved to DISABLED by the forced-disable rules, by trigger category.
    pub static ref USER_FORCE_DISABLED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "social_user_force_disabled_total",
        "Users force-disabled segmented by trigger category",
        &["trigger"]
    )
    .expect("failed to register social_user_force_disabled_total");

    /// Multi-item transactions the store cancelled, by manager operation.
    pub static ref TRANSACTION_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "social_transaction_failures_total",
        "Cancelled store transactions segmented by operation",
        &["operation"]
    )
    .expect("failed to register social_transaction_failures_total");

    /// Change-stream records processed by the sync dispatcher, by outcome.
    pub static ref STREAM_RECORDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "social_stream_records_total",
        "Change-stream records segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register social_stream_records_total");
}

pub fn record_transaction_failure(operation: &str) {
    TRANSACTION_FAILURES_TOTAL
        .with_label_values(&[operation])
        .inc();
}
