//! Resource Probes
//!
//! Reads CPU and memory usage through `sysinfo`. CPU figures need two
//! refreshes separated by a window, so every probe must be primed once
//! before its first measurement.

use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::Duration;

use sysinfo::{get_current_pid, Pid, ProcessRefreshKind, System};

use crate::error::ProbeError;

use super::record::Usage;

/// A source of resource usage readings.
pub trait UsageProbe {
    /// Takes the throwaway baseline reading.
    fn prime(&mut self) -> Result<(), ProbeError>;

    /// Blocks for `window` and returns usage measured over it.
    fn measure(&mut self, window: Duration) -> Result<Usage, ProbeError>;
}

/// Measures the current process together with every process it spawned.
///
/// Command units do their work in child processes, so the whole tree
/// rooted at the runner is summed. Threads are not counted twice.
pub struct ProcessProbe {
    system: System,
    pid: Pid,
}

impl ProcessProbe {
    pub fn new() -> Result<Self, ProbeError> {
        let pid = get_current_pid().map_err(|e| ProbeError::Pid(e.to_string()))?;

        let mut system = System::new();
        system.refresh_memory();

        Ok(Self { system, pid })
    }

    fn refresh(&mut self) -> Result<(), ProbeError> {
        let refresh_kind = ProcessRefreshKind::new().with_cpu().with_memory();
        self.system.refresh_processes_specifics(refresh_kind);

        if self.system.process(self.pid).is_some() {
            Ok(())
        } else {
            Err(ProbeError::ProcessGone(self.pid.as_u32()))
        }
    }

    /// Sums CPU and resident memory over the process tree.
    fn tree_usage(&self) -> (f64, u64) {
        let links = self
            .system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| (*pid, process.parent()));

        descendants(self.pid, links)
            .into_iter()
            .filter_map(|pid| self.system.process(pid))
            .fold((0.0, 0), |(cpu, memory), process| {
                (cpu + f64::from(process.cpu_usage()), memory + process.memory())
            })
    }
}

/// Returns `root` followed by every process below it.
fn descendants(root: Pid, links: impl Iterator<Item = (Pid, Option<Pid>)>) -> Vec<Pid> {
    let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for (pid, parent) in links {
        if let Some(parent) = parent {
            children.entry(parent).or_default().push(pid);
        }
    }

    let mut tree = Vec::new();
    let mut seen = HashSet::new();
    let mut pending = vec![root];

    while let Some(pid) = pending.pop() {
        if !seen.insert(pid) {
            continue;
        }
        tree.push(pid);
        if let Some(kids) = children.get(&pid) {
            pending.extend(kids.iter().copied());
        }
    }

    tree
}

impl UsageProbe for ProcessProbe {
    fn prime(&mut self) -> Result<(), ProbeError> {
        self.refresh()
    }

    fn measure(&mut self, window: Duration) -> Result<Usage, ProbeError> {
        thread::sleep(window);
        self.refresh()?;

        let (cpu_percent, memory) = self.tree_usage();

        Ok(Usage {
            cpu_percent,
            memory_percent: percent_of(memory, self.system.total_memory()),
        })
    }
}

/// Measures the whole host: global CPU and used memory.
pub struct SystemProbe {
    system: System,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageProbe for SystemProbe {
    fn prime(&mut self) -> Result<(), ProbeError> {
        self.system.refresh_cpu();
        Ok(())
    }

    fn measure(&mut self, window: Duration) -> Result<Usage, ProbeError> {
        thread::sleep(window);
        self.system.refresh_cpu();
        self.system.refresh_memory();

        Ok(Usage {
            cpu_percent: f64::from(self.system.global_cpu_info().cpu_usage()),
            memory_percent: percent_of(self.system.used_memory(), self.system.total_memory()),
        })
    }
}

fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
