//! Thin periodic wrapper over the orchestrator.

use std::time::Duration;

use crate::orchestrator::Orchestrator;

/// Run cycles forever on a fixed period. The first cycle starts
/// immediately; if a cycle overruns the period, the next one starts as
/// soon as it finishes.
pub async fn run_on_interval(orchestrator: &Orchestrator, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let report = orchestrator.run_cycle().await;
        tracing::info!(
            cycle_id = %report.bundle.cycle_id,
            status = ?report.bundle.status,
            calibrated = report.calibration_completed(),
            "scheduled cycle finished"
        );
    }
}
