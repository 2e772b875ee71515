//! Process memory probing for pipeline backpressure
//!
//! The pipeline samples resident set size between batches and compares it to
//! its configured budget. On hosts without a manual collector there is
//! nothing to trigger on a GC hint, so that is a logged no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Resident-memory probe for the current process
pub struct MemoryProbe {
    sys: Mutex<System>,
    pid: Pid,
    gc_hint_logged: AtomicBool,
}

impl MemoryProbe {
    /// Probe bound to the current process
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
            pid: Pid::from_u32(std::process::id()),
            gc_hint_logged: AtomicBool::new(false),
        }
    }

    /// Current resident set size in megabytes; 0 when the probe fails
    pub fn rss_mb(&self) -> u64 {
        let Ok(mut sys) = self.sys.lock() else {
            return 0;
        };
        sys.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        sys.process(self.pid)
            .map(|p| p.memory() / (1024 * 1024))
            .unwrap_or(0)
    }

    /// Share of the budget currently used, in [0, ..]
    pub fn pressure(&self, limit_mb: u64) -> f64 {
        if limit_mb == 0 {
            return 0.0;
        }
        self.rss_mb() as f64 / limit_mb as f64
    }

    /// Best-effort collection request. Rust has no manual collector, so this
    /// only records that the threshold was crossed.
    pub fn request_gc_hint(&self) {
        if !self.gc_hint_logged.swap(true, Ordering::Relaxed) {
            tracing::debug!("GC hint requested; no-op on this host");
        }
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Total system memory in megabytes
pub fn system_memory_mb() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory() / (1024 * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_reports_nonzero_rss() {
        let probe = MemoryProbe::new();
        assert!(probe.rss_mb() > 0);
    }

    #[test]
    fn pressure_scales_with_limit() {
        let probe = MemoryProbe::new();
        let at_small = probe.pressure(1);
        let at_huge = probe.pressure(1_000_000);
        assert!(at_small > at_huge);
        assert_eq!(probe.pressure(0), 0.0);
    }
}
