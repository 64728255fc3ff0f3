use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};

/// Point-in-time process resource usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceSample {
    pub memory_mb: f64,
    pub cpu_percent: f64,
}

/// Source of memory/cpu readings for snapshot assembly.
///
/// A probe failure never fails the snapshot: the sampler logs it and falls
/// back to zeroed resource fields.
pub trait ResourceProbe: Send + Sync {
    fn sample(&self) -> Result<ResourceSample>;
}

/// Default probe reading the process's own `/proc` entries.
pub struct ProcProbe {
    // (wall clock, cumulative utime+stime in clock ticks) from the last sample.
    last_cpu: Mutex<Option<(Instant, u64)>>,
}

impl ProcProbe {
    pub fn new() -> Self {
        Self {
            last_cpu: Mutex::new(None),
        }
    }
}

impl Default for ProcProbe {
    fn default() -> Self {
        Self::new()
    }
}

const PAGE_SIZE_BYTES: f64 = 4096.0;
const CLOCK_TICKS_PER_SEC: f64 = 100.0;

impl ResourceProbe for ProcProbe {
    fn sample(&self) -> Result<ResourceSample> {
        let statm = std::fs::read_to_string("/proc/self/statm")
            .context("failed to read /proc/self/statm")?;
        let resident_pages: f64 = statm
            .split_whitespace()
            .nth(1)
            .and_then(|v| v.parse().ok())
            .context("malformed statm")?;
        let memory_mb = resident_pages * PAGE_SIZE_BYTES / (1024.0 * 1024.0);

        let stat =
            std::fs::read_to_string("/proc/self/stat").context("failed to read /proc/self/stat")?;
        // Fields 14/15 (1-based) are utime/stime; the comm field may contain
        // spaces, so index from the closing paren.
        let after_comm = stat
            .rsplit_once(')')
            .map(|(_, rest)| rest)
            .context("malformed stat")?;
        let fields: Vec<&str> = after_comm.split_whitespace().collect();
        let utime: u64 = fields.get(11).and_then(|v| v.parse().ok()).unwrap_or(0);
        let stime: u64 = fields.get(12).and_then(|v| v.parse().ok()).unwrap_or(0);
        let total_ticks = utime + stime;

        let now = Instant::now();
        let cpu_percent = {
            let mut last = self.last_cpu.lock().expect("probe lock poisoned");
            let percent = match *last {
                Some((prev_at, prev_ticks)) => {
                    let elapsed = now.duration_since(prev_at).as_secs_f64();
                    if elapsed > 0.0 {
                        let used = (total_ticks.saturating_sub(prev_ticks)) as f64
                            / CLOCK_TICKS_PER_SEC;
                        (used / elapsed * 100.0).min(100.0)
                    } else {
                        0.0
                    }
                }
                None => 0.0,
            };
            *last = Some((now, total_ticks));
            percent
        };

        Ok(ResourceSample {
            memory_mb,
            cpu_percent,
        })
    }
}

/// Fixed-value probe for deterministic tests.
pub struct StaticProbe(pub ResourceSample);

impl ResourceProbe for StaticProbe {
    fn sample(&self) -> Result<ResourceSample> {
        Ok(self.0)
    }
}
