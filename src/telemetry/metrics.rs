//! Metric definitions

use metrics::{counter, describe_counter, describe_histogram};

pub const MEMBERSHIP_OPERATIONS_TOTAL: &str = "acl_membership_operations_total";
pub const PROPAGATION_RESOURCES_TOTAL: &str = "acl_propagation_resources_total";
pub const PROPAGATION_DURATION_SECONDS: &str = "acl_propagation_duration_seconds";

/// Register metric descriptions and emit initial zero values so exporters
/// list every metric from startup.
pub fn describe_metrics() {
    describe_counter!(
        MEMBERSHIP_OPERATIONS_TOTAL,
        "Membership mutations by operation and result"
    );
    describe_counter!(
        PROPAGATION_RESOURCES_TOTAL,
        "Dependent resources visited during propagation, by result"
    );
    describe_histogram!(
        PROPAGATION_DURATION_SECONDS,
        "Time to propagate one workspace change to all dependents"
    );

    for result in ["updated", "unchanged", "failed"] {
        counter!(PROPAGATION_RESOURCES_TOTAL, "result" => result).absolute(0);
    }
}

/// Label for an operation outcome
pub fn result_label<T, E>(result: &std::result::Result<T, E>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}
