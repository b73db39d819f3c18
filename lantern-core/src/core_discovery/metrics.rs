/*
    Metrics - discovery engine counters and gauges

    Pool health (admissions, removals, sizes), probe outcomes, trust gate
    drops and hub report delivery. Exported through whatever `metrics`
    recorder the host process installs; without one these are no-ops.
*/

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    describe_counter!(
        "lantern_pool_admissions_total",
        "Total number of entries admitted to a proxy pool, labeled by pool"
    );

    describe_counter!(
        "lantern_pool_removals_total",
        "Total number of entries removed from a proxy pool, labeled by pool and reason"
    );

    describe_gauge!("lantern_pool_size", "Current number of members in a proxy pool, labeled by pool");

    describe_counter!(
        "lantern_probes_total",
        "Total number of liveness probes, labeled by result (success, failure)"
    );

    describe_counter!(
        "lantern_candidates_rejected_total",
        "Total number of announced candidates that failed classification"
    );

    describe_counter!(
        "lantern_typed_messages_total",
        "Total number of typed messages received, labeled by outcome"
    );

    describe_counter!(
        "lantern_certificates_stored_total",
        "Total number of peer certificates handed to the keystore, labeled by result"
    );

    describe_counter!(
        "lantern_reports_total",
        "Total number of info reports sent to the hub, labeled by result (sent, failed)"
    );

    describe_counter!(
        "lantern_report_schedules_total",
        "Total number of report scheduling requests, labeled by result (scheduled, debounced)"
    );
}

pub fn pool_admitted(pool: &'static str, size: usize) {
    counter!("lantern_pool_admissions_total", "pool" => pool).increment(1);
    gauge!("lantern_pool_size", "pool" => pool).set(size as f64);
}

pub fn pool_removed(pool: &'static str, reason: &'static str, size: usize) {
    counter!("lantern_pool_removals_total", "pool" => pool, "reason" => reason).increment(1);
    gauge!("lantern_pool_size", "pool" => pool).set(size as f64);
}

pub fn probe_succeeded() {
    counter!("lantern_probes_total", "result" => "success").increment(1);
}

pub fn probe_failed() {
    counter!("lantern_probes_total", "result" => "failure").increment(1);
}

pub fn candidate_rejected() {
    counter!("lantern_candidates_rejected_total").increment(1);
}

pub fn typed_message(outcome: &'static str) {
    counter!("lantern_typed_messages_total", "outcome" => outcome).increment(1);
}

pub fn certificate_stored(ok: bool) {
    let result = if ok { "stored" } else { "failed" };
    counter!("lantern_certificates_stored_total", "result" => result).increment(1);
}

pub fn report_sent(ok: bool) {
    let result = if ok { "sent" } else { "failed" };
    counter!("lantern_reports_total", "result" => result).increment(1);
}

pub fn report_schedule(scheduled: bool) {
    let result = if scheduled { "scheduled" } else { "debounced" };
    counter!("lantern_report_schedules_total", "result" => result).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder() {
        init_metrics();
        pool_admitted("general", 1);
        pool_removed("general", "probe_failed", 0);
        probe_succeeded();
        probe_failed();
        candidate_rejected();
        typed_message("untrusted");
        certificate_stored(true);
        report_sent(false);
        report_schedule(true);
    }
}
