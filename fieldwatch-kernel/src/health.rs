use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;

use crate::registry::NodeRegistry;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub nodes_tracked: u32,
    pub memory_usage_mb: f32,
    pub telemetry_passes: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_telemetry_pass: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    telemetry_passes: Arc<AtomicU64>,
    last_pass: Arc<Mutex<Option<OffsetDateTime>>>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            telemetry_passes: Arc::new(AtomicU64::new(0)),
            last_pass: Arc::new(Mutex::new(None)),
        }
    }

    /// Appelé par le driver de télémétrie à la fin de chaque passe
    pub fn record_telemetry_pass(&self) {
        self.telemetry_passes.fetch_add(1, Ordering::Relaxed);
        *self.last_pass.lock() = Some(OffsetDateTime::now_utc());
    }

    pub fn get_health(&self, registry: &NodeRegistry) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            nodes_tracked: registry.len() as u32,
            memory_usage_mb: get_memory_usage_mb(),
            telemetry_passes: self.telemetry_passes.load(Ordering::Relaxed),
            last_telemetry_pass: *self.last_pass.lock(),
        }
    }
}

/// RSS du process via /proc (Linux), 0.0 ailleurs
fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = kb {
                return kb as f32 / 1024.0;
            }
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_tracker() {
        let health = HealthTracker::new().get_health(&NodeRegistry::new());
        assert_eq!(health.nodes_tracked, 0);
        assert_eq!(health.telemetry_passes, 0);
        assert!(health.last_telemetry_pass.is_none());
        assert!(health.memory_usage_mb >= 0.0);
    }

    #[test]
    fn test_record_pass_is_shared_between_clones() {
        let tracker = HealthTracker::new();
        let clone = tracker.clone();
        clone.record_telemetry_pass();
        clone.record_telemetry_pass();

        let health = tracker.get_health(&NodeRegistry::new());
        assert_eq!(health.telemetry_passes, 2);
        assert!(health.last_telemetry_pass.is_some());
    }
}
