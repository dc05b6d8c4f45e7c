//! ## gemini-core::probe
//! **Thread CPU-time and system memory probes**
//!
//! The monitor never talks to the operating system directly. It reads
//! per-thread CPU time through a [`ThreadProbe`] and memory figures through a
//! [`SystemProbe`], so tests and the simulator can substitute scripted
//! implementations.

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
pub use linux::ProcfsThreadProbe;

use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

/// Cumulative CPU time of one live thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadCpuReading {
    pub thread_id: u64,
    pub name: String,
    pub cpu_nanos: u64,
}

/// Process readings attached to a health snapshot when it closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SystemReadings {
    pub free_memory: u64,
    pub total_memory: u64,
    pub thread_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryReading {
    pub free: u64,
    pub total: u64,
}

/// Per-thread CPU introspection.
pub trait ThreadProbe: Send + Sync {
    /// Whether CPU readings are real. When false every CPU call yields zero.
    fn supports_cpu_time(&self) -> bool;

    /// Identifier of the calling thread, comparable with [`ThreadCpuReading::thread_id`].
    fn current_thread_id(&self) -> u64;

    /// Cumulative CPU time of the calling thread.
    fn current_thread_cpu_nanos(&self) -> u64;

    /// Every live thread of the process.
    fn threads(&self) -> Vec<ThreadCpuReading>;

    /// Human-readable stack or wait-state text for a thread, if obtainable.
    fn stack_trace(&self, thread_id: u64) -> Option<String>;
}

/// Memory introspection.
pub trait SystemProbe: Send + Sync {
    fn memory(&self) -> MemoryReading;
}

static NEXT_LOCAL_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static LOCAL_THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// Process-local thread number, assigned on first use. Used where the OS
/// thread id is unavailable.
pub fn local_thread_id() -> u64 {
    LOCAL_THREAD_ID.with(|id| {
        if id.get() == 0 {
            id.set(NEXT_LOCAL_THREAD_ID.fetch_add(1, Ordering::Relaxed));
        }
        id.get()
    })
}

/// Returns the best available probe for this platform.
pub fn platform_thread_probe() -> Box<dyn ThreadProbe> {
    #[cfg(target_os = "linux")]
    {
        Box::new(ProcfsThreadProbe::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(UnsupportedThreadProbe)
    }
}

/// Probe for platforms without per-thread CPU accounting.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedThreadProbe;

impl ThreadProbe for UnsupportedThreadProbe {
    fn supports_cpu_time(&self) -> bool {
        false
    }

    fn current_thread_id(&self) -> u64 {
        local_thread_id()
    }

    fn current_thread_cpu_nanos(&self) -> u64 {
        0
    }

    fn threads(&self) -> Vec<ThreadCpuReading> {
        Vec::new()
    }

    fn stack_trace(&self, _thread_id: u64) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
struct ScriptedThread {
    name: String,
    cpu_nanos: u64,
    stack: Option<String>,
}

/// In-memory probe whose threads and CPU counters are set by hand.
#[derive(Debug, Default)]
pub struct StaticThreadProbe {
    threads: RwLock<BTreeMap<u64, ScriptedThread>>,
}

impl StaticThreadProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a thread.
    pub fn set_thread(&self, thread_id: u64, name: impl Into<String>, cpu_nanos: u64) {
        let mut threads = self.threads.write();
        let stack = threads.get(&thread_id).and_then(|t| t.stack.clone());
        threads.insert(
            thread_id,
            ScriptedThread {
                name: name.into(),
                cpu_nanos,
                stack,
            },
        );
    }

    /// Adds CPU time to a known thread.
    pub fn advance_cpu(&self, thread_id: u64, nanos: u64) {
        if let Some(thread) = self.threads.write().get_mut(&thread_id) {
            thread.cpu_nanos += nanos;
        }
    }

    pub fn set_stack(&self, thread_id: u64, stack: impl Into<String>) {
        if let Some(thread) = self.threads.write().get_mut(&thread_id) {
            thread.stack = Some(stack.into());
        }
    }

    pub fn remove_thread(&self, thread_id: u64) {
        self.threads.write().remove(&thread_id);
    }
}

impl ThreadProbe for StaticThreadProbe {
    fn supports_cpu_time(&self) -> bool {
        true
    }

    fn current_thread_id(&self) -> u64 {
        local_thread_id()
    }

    fn current_thread_cpu_nanos(&self) -> u64 {
        self.threads
            .read()
            .get(&local_thread_id())
            .map_or(0, |t| t.cpu_nanos)
    }

    fn threads(&self) -> Vec<ThreadCpuReading> {
        self.threads
            .read()
            .iter()
            .map(|(id, t)| ThreadCpuReading {
                thread_id: *id,
                name: t.name.clone(),
                cpu_nanos: t.cpu_nanos,
            })
            .collect()
    }

    fn stack_trace(&self, thread_id: u64) -> Option<String> {
        self.threads
            .read()
            .get(&thread_id)
            .and_then(|t| t.stack.clone())
    }
}

/// Memory figures from `sysinfo`.
pub struct SysinfoProbe {
    system: Mutex<sysinfo::System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new()),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for SysinfoProbe {
    fn memory(&self) -> MemoryReading {
        let mut system = self.system.lock();
        system.refresh_memory();
        MemoryReading {
            free: system.available_memory(),
            total: system.total_memory(),
        }
    }
}

/// Fixed memory figures, settable at runtime.
#[derive(Debug, Default)]
pub struct StaticSystemProbe {
    reading: RwLock<MemoryReading>,
}

impl StaticSystemProbe {
    pub fn new(free: u64, total: u64) -> Self {
        Self {
            reading: RwLock::new(MemoryReading { free, total }),
        }
    }

    pub fn set(&self, free: u64, total: u64) {
        *self.reading.write() = MemoryReading { free, total };
    }
}

impl SystemProbe for StaticSystemProbe {
    fn memory(&self) -> MemoryReading {
        *self.reading.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_thread_id_is_stable_per_thread() {
        let here = local_thread_id();
        assert_eq!(here, local_thread_id());
        let there = std::thread::spawn(local_thread_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_static_probe_scripting() {
        let probe = StaticThreadProbe::new();
        probe.set_thread(3, "pool-1", 1_000);
        probe.advance_cpu(3, 500);
        probe.set_stack(3, "at spin()");
        probe.set_thread(3, "pool-1", 2_000);

        let threads = probe.threads();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].cpu_nanos, 2_000);
        assert_eq!(probe.stack_trace(3).as_deref(), Some("at spin()"));

        probe.remove_thread(3);
        assert!(probe.threads().is_empty());
        assert_eq!(probe.stack_trace(3), None);
    }

    #[test]
    fn test_unsupported_probe_reports_nothing() {
        let probe = UnsupportedThreadProbe;
        assert!(!probe.supports_cpu_time());
        assert_eq!(probe.current_thread_cpu_nanos(), 0);
        assert!(probe.threads().is_empty());
    }

    #[test]
    fn test_static_system_probe() {
        let probe = StaticSystemProbe::new(10, 100);
        probe.set(20, 100);
        assert_eq!(probe.memory(), MemoryReading { free: 20, total: 100 });
    }
}
