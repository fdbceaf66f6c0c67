use std::sync::OnceLock;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Bucketed to the sandbox wall clock; the top bucket catches runs that were
/// killed at the wall rather than finishing.
const GRADING_SECONDS_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 12.0];
const SANDBOX_WAIT_BUCKETS: &[f64] = &[0.005, 0.05, 0.25, 1.0, 5.0, 15.0];

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        tracing::debug!("prometheus recorder disabled");
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("grading_duration_seconds".to_string()),
            GRADING_SECONDS_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full("sandbox_wait_seconds".to_string()),
            SANDBOX_WAIT_BUCKETS,
        )?
        .install_recorder()?;
    let _ = RECORDER.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    RECORDER.get().map(|handle| handle.render())
}
