//! Process supervision: scheduler-lag canary and resource health loop.
//!
//! The lag monitor samples scheduler responsiveness on a short cadence and
//! logs when observed drift exceeds a small threshold - a canary for
//! overload or blocking work on the event loop. The health loop samples
//! RAM/CPU/disk via sysinfo, classifies the process state and alerts the
//! configured guild's log channel with a cooldown.

use crate::platform::log_to_channel;
use crate::state::Warden;
use sentinel_proto::Severity;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Disks, System};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const LAG_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);
const LAG_THRESHOLD: Duration = Duration::from_millis(100);

/// Minimum seconds between repeated health alerts.
const ALERT_COOLDOWN: Duration = Duration::from_secs(180);

const RAM_WARN_PERCENT: f32 = 85.0;
const RAM_ERROR_PERCENT: f32 = 97.0;
const CPU_WARN_PERCENT: f32 = 90.0;
const CPU_ERROR_PERCENT: f32 = 99.0;
const DISK_WARN_BYTES: u64 = 1024 * 1024 * 1024; // 1 GB
const DISK_ERROR_BYTES: u64 = 100 * 1024 * 1024; // 100 MB

/// Overall process health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Ok,
    Attention,
    Error,
}

/// One resource sample with the conditions that degraded it.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub state: HealthState,
    pub conditions: Vec<String>,
}

/// Classify raw resource readings.
pub fn classify(
    ram_percent: Option<f32>,
    cpu_percent: Option<f32>,
    disk_free: Option<u64>,
) -> HealthReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Some(ram) = ram_percent {
        if ram >= RAM_ERROR_PERCENT {
            errors.push(format!("ram {ram:.0}%"));
        } else if ram >= RAM_WARN_PERCENT {
            warnings.push(format!("ram {ram:.0}%"));
        }
    }
    if let Some(cpu) = cpu_percent {
        if cpu >= CPU_ERROR_PERCENT {
            errors.push(format!("cpu {cpu:.0}%"));
        } else if cpu >= CPU_WARN_PERCENT {
            warnings.push(format!("cpu {cpu:.0}%"));
        }
    }
    if let Some(free) = disk_free {
        if free < DISK_ERROR_BYTES {
            errors.push(format!("disk {} MB left", free / (1024 * 1024)));
        } else if free < DISK_WARN_BYTES {
            warnings.push(format!("disk {} MB left", free / (1024 * 1024)));
        }
    }

    if !errors.is_empty() {
        HealthReport {
            state: HealthState::Error,
            conditions: errors,
        }
    } else if !warnings.is_empty() {
        HealthReport {
            state: HealthState::Attention,
            conditions: warnings,
        }
    } else {
        HealthReport {
            state: HealthState::Ok,
            conditions: Vec::new(),
        }
    }
}

fn sample(system: &mut System, disks: &mut Disks) -> HealthReport {
    system.refresh_memory();
    system.refresh_cpu_usage();
    disks.refresh_list();

    let total = system.total_memory();
    let ram_percent = if total > 0 {
        Some((system.used_memory() as f32 / total as f32) * 100.0)
    } else {
        None
    };
    let cpu_percent = Some(system.global_cpu_info().cpu_usage());
    let disk_free = disks
        .list()
        .iter()
        .map(|disk| disk.available_space())
        .max();

    classify(ram_percent, cpu_percent, disk_free)
}

/// Spawn the scheduler-lag canary.
pub fn spawn_lag_monitor(token: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = interval(LAG_SAMPLE_INTERVAL);
        ticker.tick().await;
        let mut last = Instant::now();
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }
            let now = Instant::now();
            let drift = now.duration_since(last).saturating_sub(LAG_SAMPLE_INTERVAL);
            last = now;
            crate::metrics::set_event_loop_lag(drift.as_secs_f64());
            if drift > LAG_THRESHOLD {
                warn!(drift_ms = drift.as_millis() as u64, "event loop lag detected");
            }
        }
    });
}

/// Spawn the resource health loop.
pub fn spawn_health_monitor(warden: Arc<Warden>, token: CancellationToken) {
    if !warden.config.watchdog.enabled {
        return;
    }
    let check_interval = Duration::from_secs(warden.config.watchdog.check_interval_secs.max(1));
    tokio::spawn(async move {
        let mut system = System::new();
        let mut disks = Disks::new_with_refreshed_list();
        let mut ticker = interval(check_interval);
        let mut last_alert: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let report = sample(&mut system, &mut disks);
            match report.state {
                HealthState::Ok => {
                    last_alert = None;
                }
                state => {
                    let due = last_alert
                        .is_none_or(|at| at.elapsed() >= ALERT_COOLDOWN);
                    if !due {
                        continue;
                    }
                    last_alert = Some(Instant::now());

                    let conditions = report.conditions.join(", ");
                    warn!(?state, %conditions, "watchdog detected degraded health");
                    if let Some(guild) = warden.config.watchdog.alert_guild {
                        let severity = if state == HealthState::Error {
                            Severity::Error
                        } else {
                            Severity::Warn
                        };
                        log_to_channel(
                            &warden.chat,
                            guild,
                            format!("🩺 Watchdog: {state:?} ({conditions})"),
                            severity,
                            "watchdog",
                        );
                    }
                }
            }
        }
    });
    info!("health monitor started");
}
