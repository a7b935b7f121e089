// src/utils/system.rs: System functions

use sysinfo::System;
use tracing::info;

/// Points out when a run is leaving most of the machine idle, since every
/// external tool accepts a thread-count flag.
pub fn thread_advisory(threads: usize) {
    let physical_cores = System::physical_core_count().unwrap_or(1);
    if threads == 1 && threads <= physical_cores / 4 {
        info!("Only using {} of {} available threads...", threads, physical_cores);
    }
}
