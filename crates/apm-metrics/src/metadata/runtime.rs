// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Live process and host statistics, read on every flush.

use std::sync::Mutex;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System, MemoryRefreshKind};
use tracing::debug;

/// Host-wide facts reported in the host block.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HostStats {
    pub load1: f64,
    pub total_ram: u64,
    pub free_ram: u64,
    pub process_ram: u64,
}

/// Facts about this process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub threads: Option<i32>,
    pub resident_bytes: u64,
    pub virtual_bytes: u64,
    pub peak_resident_bytes: Option<u64>,
    pub data_bytes: Option<u64>,
}

pub struct RuntimeStatsReader {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl std::fmt::Debug for RuntimeStatsReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeStatsReader")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl Default for RuntimeStatsReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeStatsReader {
    #[must_use]
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| debug!("Could not determine current pid: {e}"))
            .ok();
        Self {
            system: Mutex::new(System::new_with_specifics(RefreshKind::new())),
            pid,
        }
    }

    /// Refreshes memory, load and the current process, then reads both blocks.
    /// `None` host stats means the platform is not supported.
    pub fn read(&self) -> (Option<HostStats>, RuntimeStats) {
        let mut system = self
            .system
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        system.refresh_memory_specifics(MemoryRefreshKind::new().with_ram());

        let (resident_bytes, virtual_bytes) = match self.pid {
            Some(pid) => {
                system.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    true,
                    ProcessRefreshKind::new().with_memory(),
                );
                system
                    .process(pid)
                    .map_or((0, 0), |p| (p.memory(), p.virtual_memory()))
            }
            None => (0, 0),
        };

        let host = sysinfo::IS_SUPPORTED_SYSTEM.then(|| HostStats {
            load1: System::load_average().one,
            total_ram: system.total_memory(),
            free_ram: system.free_memory(),
            process_ram: resident_bytes,
        });

        let status = read_proc_status();
        let runtime = RuntimeStats {
            threads: status.threads.or_else(thread_count_from_tasks),
            resident_bytes,
            virtual_bytes,
            peak_resident_bytes: status.peak_resident_bytes,
            data_bytes: status.data_bytes,
        };
        (host, runtime)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ProcStatus {
    threads: Option<i32>,
    peak_resident_bytes: Option<u64>,
    data_bytes: Option<u64>,
}

#[cfg(target_os = "linux")]
fn read_proc_status() -> ProcStatus {
    std::fs::read_to_string("/proc/self/status")
        .map(|content| parse_proc_status(&content))
        .unwrap_or_else(|e| {
            debug!("Could not read /proc/self/status: {e}");
            ProcStatus::default()
        })
}

#[cfg(not(target_os = "linux"))]
fn read_proc_status() -> ProcStatus {
    ProcStatus::default()
}

/// Thread count from the number of entries in `/proc/self/task`.
#[cfg(target_os = "linux")]
fn thread_count_from_tasks() -> Option<i32> {
    let entries = std::fs::read_dir("/proc/self/task").ok()?;
    i32::try_from(entries.count()).ok()
}

#[cfg(not(target_os = "linux"))]
fn thread_count_from_tasks() -> Option<i32> {
    None
}

// Lines look like `VmHWM:	   10240 kB` or `Threads:	7`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_proc_status(content: &str) -> ProcStatus {
    let mut status = ProcStatus::default();
    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let value = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok());
        match key {
            "Threads" => status.threads = value.and_then(|v| i32::try_from(v).ok()),
            "VmHWM" => status.peak_resident_bytes = value.map(|kb| kb.saturating_mul(1024)),
            "VmData" => status.data_bytes = value.map(|kb| kb.saturating_mul(1024)),
            _ => {}
        }
    }
    status
}
