use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};

use crate::core::error::{DataSphereError, Result};

lazy_static! {
    /// Sandbox executions by outcome (`ok`, `error`, `reset`)
    pub static ref SANDBOX_EXECUTIONS: IntCounterVec = register_int_counter_vec!(
        "datasphere_sandbox_executions_total",
        "SQL sandbox executions by outcome",
        &["outcome"]
    )
    .expect("sandbox execution counter can be registered");

    /// `{action, data}` API calls by action and HTTP status
    pub static ref API_ACTIONS: IntCounterVec = register_int_counter_vec!(
        "datasphere_api_actions_total",
        "API actions by action name and response status",
        &["action", "status"]
    )
    .expect("api action counter can be registered");

    /// Account operations by kind and mode (`remote` or `local`)
    pub static ref ACCOUNT_EVENTS: IntCounterVec = register_int_counter_vec!(
        "datasphere_account_events_total",
        "Signups and logins by storage mode",
        &["event", "mode"]
    )
    .expect("account event counter can be registered");

    /// Number of live per-session sandboxes
    pub static ref LIVE_SANDBOXES: IntGauge = register_int_gauge!(
        "datasphere_live_sandboxes",
        "In-memory sandbox databases currently held"
    )
    .expect("live sandbox gauge can be registered");
}

/// Record one sandbox outcome
pub fn record_sandbox(outcome: &str) {
    SANDBOX_EXECUTIONS.with_label_values(&[outcome]).inc();
}

/// Record one API action and the status it produced
pub fn record_api_action(action: &str, status: u16) {
    API_ACTIONS
        .with_label_values(&[action, &status.to_string()])
        .inc();
}

/// Record a signup or login and whether it went through the store or the local fallback
pub fn record_account_event(event: &str, mode: &str) {
    ACCOUNT_EVENTS.with_label_values(&[event, mode]).inc();
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| DataSphereError::SerializationError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| DataSphereError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_metrics() {
        record_sandbox("ok");
        record_api_action("login", 401);
        let text = render().unwrap();
        assert!(text.contains("datasphere_sandbox_executions_total"));
        assert!(text.contains("datasphere_api_actions_total"));
    }
}
