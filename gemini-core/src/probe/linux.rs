//! Linux thread probe backed by `/proc/self/task`.

use procfs::process::Process;
use tracing::{debug, warn};

use super::{ThreadCpuReading, ThreadProbe};
use crate::error::MonitorError;

/// Reads per-task CPU ticks through `procfs` and the calling thread's CPU
/// clock through `clock_gettime`.
#[derive(Debug)]
pub struct ProcfsThreadProbe {
    supported: bool,
    nanos_per_tick: u64,
}

impl ProcfsThreadProbe {
    /// Probes `/proc` once; on failure every later call short-circuits.
    pub fn new() -> Self {
        match Self::try_new() {
            Ok(probe) => probe,
            Err(e) => {
                warn!("Per-thread CPU time unavailable, CPU readings will be zero: {e}");
                Self {
                    supported: false,
                    nanos_per_tick: 0,
                }
            }
        }
    }

    /// Like [`ProcfsThreadProbe::new`] but reports why `/proc` is unusable.
    pub fn try_new() -> Result<Self, MonitorError> {
        // SAFETY: sysconf has no preconditions.
        let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if ticks <= 0 {
            return Err(MonitorError::Unsupported("clock tick rate"));
        }
        Process::myself()
            .and_then(|process| process.stat())
            .map_err(|e| MonitorError::Probe(e.to_string()))?;

        debug!(ticks_per_second = ticks, "Per-thread CPU time available");
        Ok(Self {
            supported: true,
            nanos_per_tick: 1_000_000_000 / ticks as u64,
        })
    }

    fn read_threads(&self) -> procfs::ProcResult<Vec<ThreadCpuReading>> {
        let process = Process::myself()?;
        let mut readings = Vec::new();
        for task in process.tasks()?.flatten() {
            // Threads can exit between listing and reading.
            let Ok(stat) = task.stat() else {
                continue;
            };
            readings.push(ThreadCpuReading {
                thread_id: task.tid as u64,
                name: stat.comm,
                cpu_nanos: (stat.utime + stat.stime) * self.nanos_per_tick,
            });
        }
        Ok(readings)
    }
}

impl Default for ProcfsThreadProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadProbe for ProcfsThreadProbe {
    fn supports_cpu_time(&self) -> bool {
        self.supported
    }

    fn current_thread_id(&self) -> u64 {
        // SAFETY: gettid takes no arguments and cannot fail.
        unsafe { libc::syscall(libc::SYS_gettid) as u64 }
    }

    fn current_thread_cpu_nanos(&self) -> u64 {
        if !self.supported {
            return 0;
        }
        // SAFETY: an all-zero timespec is a valid value.
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        // SAFETY: `ts` is a valid, writable timespec.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts) };
        if rc != 0 {
            return 0;
        }
        (ts.tv_sec as u64) * 1_000_000_000 + ts.tv_nsec as u64
    }

    fn threads(&self) -> Vec<ThreadCpuReading> {
        if !self.supported {
            return Vec::new();
        }
        self.read_threads().unwrap_or_else(|e| {
            debug!("Thread enumeration failed: {e}");
            Vec::new()
        })
    }

    fn stack_trace(&self, thread_id: u64) -> Option<String> {
        // procfs has no task-level accessor for `stack` or `wchan`.
        let base = format!("/proc/self/task/{thread_id}");
        if let Ok(stack) = std::fs::read_to_string(format!("{base}/stack")) {
            if !stack.trim().is_empty() {
                return Some(stack);
            }
        }
        let process = Process::myself().ok()?;
        let stat = process.task_from_tid(thread_id as i32).ok()?.stat().ok()?;
        let wchan = std::fs::read_to_string(format!("{base}/wchan")).unwrap_or_default();
        Some(format!(
            "state: {}\nwchan: {}\nutime: {} stime: {}",
            stat.state,
            if wchan.is_empty() { "-" } else { wchan.trim() },
            stat.utime,
            stat.stime
        ))
    }
}
