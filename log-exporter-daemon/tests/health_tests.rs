//! Health report tests.
//!
//! Tests status-change detection and the per-file report shape.

use log_exporter_core::pipeline::HealthStatus;
use log_exporter_daemon::health::{DaemonHealth, FileHealth, log_transition};

fn file(path: &str, status: HealthStatus) -> FileHealth {
    FileHealth {
        path: path.to_owned(),
        status,
    }
}

#[test]
fn test_first_status_is_a_transition() {
    // Given: No status has been observed yet
    let current = HealthStatus::Healthy;

    // When: Logging the first observation
    let changed = log_transition(None, &current);

    // Then: It counts as a change
    assert!(changed);
}

#[test]
fn test_same_status_is_not_a_transition() {
    // Given: The previous tick was already degraded for the same reason
    let previous = HealthStatus::Degraded("1 file(s) skipped at startup".to_owned());
    let current = previous.clone();

    // When: Logging the new observation
    let changed = log_transition(Some(&previous), &current);

    // Then: Nothing is reported
    assert!(!changed);
}

#[test]
fn test_changed_reason_is_a_transition() {
    // Given: Degraded before, degraded for another reason now
    let previous = HealthStatus::Degraded("not running: /var/log/a.log".to_owned());
    let current = HealthStatus::Degraded("not running: /var/log/b.log".to_owned());

    // When/Then: The reason change is reported
    assert!(log_transition(Some(&previous), &current));

    // And: Recovery is reported too
    assert!(log_transition(Some(&current), &HealthStatus::Healthy));
}

#[test]
fn test_failing_files_lists_unhealthy_and_degraded() {
    // Given: A report with one file in each state
    let report = DaemonHealth {
        status: HealthStatus::Degraded("not running: /var/log/b.log".to_owned()),
        uptime_secs: 10,
        skipped_files: 0,
        files: vec![
            file("/var/log/a.log", HealthStatus::Healthy),
            file(
                "/var/log/b.log",
                HealthStatus::Degraded("not running yet".to_owned()),
            ),
            file("/var/log/c.log", HealthStatus::Unhealthy("stopped".to_owned())),
        ],
    };

    // When: Listing failing files
    let failing = report.failing_files();

    // Then: Only the healthy file is left out, in configuration order
    assert_eq!(failing, vec!["/var/log/b.log", "/var/log/c.log"]);
}
