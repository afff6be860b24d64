//! Error log metrics regression tests

use super::helpers::*;
use crewguard_errors::{ErrorLog, FailureContext};
use serial_test::serial;
use std::io;

#[test]
#[serial]
fn error_log_metrics_exist() {
    init_recorder();

    let log = ErrorLog::new();
    log.record(
        &io::Error::from(io::ErrorKind::ConnectionRefused),
        FailureContext::new("metrics"),
    );

    assert_counter_exists("errors_recorded_total");
    assert_metric_has_label("errors_recorded_total", "severity", "high");
}
