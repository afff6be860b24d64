//! Health monitor metrics regression tests

use super::helpers::*;
use crewguard_healthcheck::{HealthCheck, HealthMonitor};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn healthcheck_metrics_exist() {
    init_recorder();

    let monitor = HealthMonitor::builder().build().unwrap();
    monitor
        .register(
            HealthCheck::new("metrics_check", || async { false })
                .with_recovery(|| async { Ok::<_, std::io::Error>(()) }),
        )
        .unwrap();
    monitor.run_once().await;

    assert_gauge_exists("healthcheck_status");
    assert_metric_has_label("healthcheck_status", "check", "metrics_check");

    assert_counter_exists("healthcheck_recoveries_total");
    assert_metric_has_label("healthcheck_recoveries_total", "outcome", "success");
}
