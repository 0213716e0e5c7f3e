//! Prometheus metrics collection for sentineld.
//!
//! Tracks moderation throughput (messages scanned, flags issued),
//! escalation events, appeal transitions, persistence outcomes and
//! scheduler health.

use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Guild messages run through the classification oracle.
pub static MESSAGES_SCANNED: OnceLock<IntCounter> = OnceLock::new();

/// Messages flagged by the blocklist.
pub static FLAGS_ISSUED: OnceLock<IntCounter> = OnceLock::new();

/// Timed restrictions applied by the escalation engine.
pub static TIMEOUTS_APPLIED: OnceLock<IntCounter> = OnceLock::new();

/// Lockdown workflows initiated.
pub static LOCKDOWNS_INITIATED: OnceLock<IntCounter> = OnceLock::new();

/// XP points awarded by the leveling system.
pub static XP_AWARDED: OnceLock<IntCounter> = OnceLock::new();

/// Persistence attempts by kind and outcome.
pub static SAVES: OnceLock<IntCounterVec> = OnceLock::new();

/// Appeal state-machine transitions by resulting status.
pub static APPEAL_TRANSITIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Moderator commands rejected, by command and error code.
pub static COMMANDS_REJECTED: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// 1 while a connector is attached to the bridge.
pub static CONNECTOR_ATTACHED: OnceLock<IntGauge> = OnceLock::new();

/// Last observed scheduler drift, seconds.
pub static EVENT_LOOP_LAG: OnceLock<Gauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(
        MESSAGES_SCANNED,
        IntCounter::new("sentinel_messages_scanned_total", "Messages classified")
    );
    register!(
        FLAGS_ISSUED,
        IntCounter::new("sentinel_flags_issued_total", "Messages flagged")
    );
    register!(
        TIMEOUTS_APPLIED,
        IntCounter::new("sentinel_timeouts_applied_total", "Timed restrictions applied")
    );
    register!(
        LOCKDOWNS_INITIATED,
        IntCounter::new("sentinel_lockdowns_initiated_total", "Lockdown workflows initiated")
    );
    register!(
        XP_AWARDED,
        IntCounter::new("sentinel_xp_awarded_total", "XP points awarded")
    );
    register!(
        SAVES,
        IntCounterVec::new(
            Opts::new("sentinel_saves_total", "Persistence attempts"),
            &["kind", "outcome"]
        )
    );
    register!(
        APPEAL_TRANSITIONS,
        IntCounterVec::new(
            Opts::new("sentinel_appeal_transitions_total", "Appeal transitions"),
            &["status"]
        )
    );
    register!(
        COMMANDS_REJECTED,
        IntCounterVec::new(
            Opts::new("sentinel_commands_rejected_total", "Moderator commands rejected"),
            &["command", "error"]
        )
    );
    register!(
        CONNECTOR_ATTACHED,
        IntGauge::new("sentinel_connector_attached", "Connector attachment state")
    );
    register!(
        EVENT_LOOP_LAG,
        Gauge::new("sentinel_event_loop_lag_seconds", "Observed scheduler drift")
    );
}

/// Gather all metrics in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

#[inline]
pub fn record_message_scanned() {
    if let Some(c) = MESSAGES_SCANNED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_flag_issued() {
    if let Some(c) = FLAGS_ISSUED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_timeout_applied() {
    if let Some(c) = TIMEOUTS_APPLIED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_lockdown_initiated() {
    if let Some(c) = LOCKDOWNS_INITIATED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_xp_awarded(amount: u64) {
    if let Some(c) = XP_AWARDED.get() {
        c.inc_by(amount);
    }
}

#[inline]
pub fn record_save(kind: &str, outcome: &str) {
    if let Some(c) = SAVES.get() {
        c.with_label_values(&[kind, outcome]).inc();
    }
}

#[inline]
pub fn record_appeal_transition(status: &str) {
    if let Some(c) = APPEAL_TRANSITIONS.get() {
        c.with_label_values(&[status]).inc();
    }
}

#[inline]
pub fn record_command_rejected(command: &str, error: &str) {
    if let Some(c) = COMMANDS_REJECTED.get() {
        c.with_label_values(&[command, error]).inc();
    }
}

#[inline]
pub fn set_connector_attached(attached: bool) {
    if let Some(g) = CONNECTOR_ATTACHED.get() {
        g.set(i64::from(attached));
    }
}

#[inline]
pub fn set_event_loop_lag(seconds: f64) {
    if let Some(g) = EVENT_LOOP_LAG.get() {
        g.set(seconds);
    }
}
