// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System resource introspection for scheduler defaults.

use std::path::Path;

const GB: f64 = 1e9;

/// Snapshot of the host resources the scheduler may hand out by default:
/// every core, 90% of physical memory, 80% of the free disk space under
/// the given directory.
#[derive(Debug, Clone, Copy)]
pub struct SystemResources {
    pub cpu: u32,
    pub mem_gb: f64,
    pub spc_gb: f64,
}

/// Probe the host.  Failures fall back to a single-core, 1 GB view so a
/// scheduler can still be constructed; callers wanting hard limits pass
/// them explicitly.
pub fn probe(dir: impl AsRef<Path>) -> SystemResources {
    let sys = sysinfo::System::new_all();
    let cpu = sys.cpus().len().max(1) as u32;
    let mem_gb = match sys.total_memory() {
        0 => 1.0,
        bytes => 0.9 * bytes as f64 / GB,
    };
    let spc_gb = match nix::sys::statvfs::statvfs(dir.as_ref()) {
        Ok(stat) => 0.8 * stat.blocks_available() as f64 * stat.fragment_size() as f64 / GB,
        Err(err) => {
            tracing::warn!(error = %err, "could not probe free disk space, assuming 1 GB");
            1.0
        }
    };
    SystemResources { cpu, mem_gb, spc_gb }
}

#[cfg(test)]
#[path = "sysres_tests.rs"]
mod tests;
