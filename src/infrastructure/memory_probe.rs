//! Process memory readings.

use crate::domain::{MemoryProbe, MemorySnapshot};

const PROC_STATUS: &str = "/proc/self/status";

/// Reads memory usage from `/proc/self/status`.
///
/// Mapping: `RssAnon` → heap used, `VmData` → heap total, `RssFile` →
/// external, `VmRSS` → rss. Platforms without procfs report zeros.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcMemoryProbe;

impl MemoryProbe for ProcMemoryProbe {
    fn snapshot(&self) -> MemorySnapshot {
        match std::fs::read_to_string(PROC_STATUS) {
            Ok(status) => parse_status(&status),
            Err(_) => MemorySnapshot::default(),
        }
    }
}

/// Parses the `kB` fields of a `/proc/<pid>/status` document.
fn parse_status(status: &str) -> MemorySnapshot {
    let mut snapshot = MemorySnapshot::default();

    for line in status.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Some(kb) = value
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
        else {
            continue;
        };
        let bytes = kb * 1024;

        match key {
            "RssAnon" => snapshot.heap_used_bytes = bytes,
            "VmData" => snapshot.heap_total_bytes = bytes,
            "RssFile" => snapshot.external_bytes = bytes,
            "VmRSS" => snapshot.rss_bytes = bytes,
            _ => {}
        }
    }

    snapshot
}
