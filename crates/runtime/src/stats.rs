//! Resource usage samples and rate derivation.
//!
//! The engine's stats endpoint reports cumulative counters sampled at two
//! points in time (the current tick and the immediately preceding one), so a
//! single response is enough to derive instantaneous percentages. Samples are
//! transient: computed, reported, and discarded per polling tick.

use bollard::models::{ContainerCpuStats, ContainerStatsResponse};
use serde::Serialize;

/// Cumulative CPU counters at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSample {
    /// Total CPU time consumed by the container, in nanoseconds.
    pub cpu_total: u64,
    /// Total CPU time consumed by the host, in nanoseconds.
    pub system_cpu: Option<u64>,
    /// Number of CPUs available to the container, when reported.
    pub online_cpus: Option<u32>,
    /// Number of per-CPU usage entries, used as an online-CPU fallback.
    pub percpu_entries: usize,
}

impl StatsSample {
    fn from_cpu_stats(cpu: Option<&ContainerCpuStats>) -> Self {
        let Some(cpu) = cpu else {
            return Self::default();
        };
        let usage = cpu.cpu_usage.as_ref();
        Self {
            cpu_total: usage.and_then(|u| u.total_usage).unwrap_or(0),
            system_cpu: cpu.system_cpu_usage,
            online_cpus: cpu.online_cpus,
            percpu_entries: usage
                .and_then(|u| u.percpu_usage.as_ref().map(Vec::len))
                .unwrap_or(0),
        }
    }
}

/// One stats response: the current and previous CPU samples plus memory
/// counters for the current tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub cur: StatsSample,
    pub prev: StatsSample,
    /// Memory usage including page cache, in bytes.
    pub memory_usage: u64,
    /// Page cache bytes, excluded from the reported figure.
    pub memory_cache: u64,
    /// Memory limit, when one is set.
    pub memory_limit: Option<u64>,
}

impl StatsSnapshot {
    /// Builds a snapshot from an engine stats response.
    pub fn from_response(response: &ContainerStatsResponse) -> Self {
        let memory = response.memory_stats.as_ref();
        let counters = memory.and_then(|m| m.stats.as_ref());

        // cgroup v1 reports "cache"; cgroup v2 reports the page cache as
        // inactive_file instead.
        let cache = counters
            .and_then(|c| c.get("cache"))
            .or_else(|| counters.and_then(|c| c.get("total_inactive_file")))
            .or_else(|| counters.and_then(|c| c.get("inactive_file")))
            .copied()
            .unwrap_or(0);

        Self {
            cur: StatsSample::from_cpu_stats(response.cpu_stats.as_ref()),
            prev: StatsSample::from_cpu_stats(response.precpu_stats.as_ref()),
            memory_usage: memory.and_then(|m| m.usage).unwrap_or(0),
            memory_cache: cache,
            memory_limit: memory.and_then(|m| m.limit),
        }
    }
}

/// Derived instantaneous usage for one container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContainerUsage {
    /// CPU usage as a percentage of one core; can exceed 100 on multi-core.
    pub cpu_percent: f64,
    /// Memory usage in bytes, excluding page cache.
    pub memory_bytes: u64,
    /// Memory limit in bytes, when one is set.
    pub memory_limit: Option<u64>,
}

/// Derives instantaneous usage from a snapshot's two samples.
///
/// CPU percentage is `cpu_delta / system_delta * online_cpus * 100`, clamped
/// to zero when either delta is non-positive (counter reset or missing
/// baseline). When the engine does not report `online_cpus`, the per-CPU
/// entry count of the previous sample is used, then 1.
pub fn derive_usage(snapshot: &StatsSnapshot) -> ContainerUsage {
    let cur = &snapshot.cur;
    let prev = &snapshot.prev;

    let cpu_delta = cur.cpu_total.saturating_sub(prev.cpu_total);
    let system_delta = match (cur.system_cpu, prev.system_cpu) {
        (Some(cur_sys), Some(prev_sys)) => cur_sys.saturating_sub(prev_sys),
        _ => 0,
    };

    let cpu_percent = if cpu_delta > 0 && system_delta > 0 {
        let online = cur
            .online_cpus
            .or(prev.online_cpus)
            .map(u64::from)
            .unwrap_or_else(|| prev.percpu_entries.max(1) as u64);
        cpu_delta as f64 / system_delta as f64 * online as f64 * 100.0
    } else {
        0.0
    };

    ContainerUsage {
        cpu_percent,
        memory_bytes: snapshot.memory_usage.saturating_sub(snapshot.memory_cache),
        memory_limit: snapshot.memory_limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(
        cur_cpu: u64,
        prev_cpu: u64,
        cur_sys: u64,
        prev_sys: u64,
        online: Option<u32>,
    ) -> StatsSnapshot {
        StatsSnapshot {
            cur: StatsSample {
                cpu_total: cur_cpu,
                system_cpu: Some(cur_sys),
                online_cpus: online,
                percpu_entries: 0,
            },
            prev: StatsSample {
                cpu_total: prev_cpu,
                system_cpu: Some(prev_sys),
                online_cpus: online,
                percpu_entries: 0,
            },
            memory_usage: 0,
            memory_cache: 0,
            memory_limit: None,
        }
    }

    #[test]
    fn cpu_percent_scales_by_online_cpus() {
        let usage = derive_usage(&snapshot(200, 100, 1200, 1000, Some(4)));
        assert_eq!(usage.cpu_percent, 200.0);
    }

    #[test]
    fn cpu_percent_zero_on_flat_system_counter() {
        let usage = derive_usage(&snapshot(200, 100, 1000, 1000, Some(4)));
        assert_eq!(usage.cpu_percent, 0.0);
    }

    #[test]
    fn cpu_percent_zero_on_counter_reset() {
        let usage = derive_usage(&snapshot(50, 100, 1200, 1000, Some(4)));
        assert_eq!(usage.cpu_percent, 0.0);
    }

    #[test]
    fn cpu_percent_zero_without_baseline() {
        let mut snap = snapshot(200, 0, 1200, 0, Some(4));
        snap.prev.system_cpu = None;
        let usage = derive_usage(&snap);
        assert_eq!(usage.cpu_percent, 0.0);
    }

    #[test]
    fn online_cpus_falls_back_to_percpu_entries() {
        let mut snap = snapshot(200, 100, 1200, 1000, None);
        snap.prev.percpu_entries = 2;
        let usage = derive_usage(&snap);
        assert_eq!(usage.cpu_percent, 100.0);
    }

    #[test]
    fn online_cpus_falls_back_to_one() {
        let usage = derive_usage(&snapshot(200, 100, 1200, 1000, None));
        assert_eq!(usage.cpu_percent, 50.0);
    }

    #[test]
    fn memory_excludes_page_cache() {
        let snap = StatsSnapshot {
            memory_usage: 1024,
            memory_cache: 256,
            memory_limit: Some(4096),
            ..Default::default()
        };
        let usage = derive_usage(&snap);
        assert_eq!(usage.memory_bytes, 768);
        assert_eq!(usage.memory_limit, Some(4096));
    }

    #[test]
    fn memory_saturates_when_cache_exceeds_usage() {
        let snap = StatsSnapshot {
            memory_usage: 100,
            memory_cache: 200,
            ..Default::default()
        };
        assert_eq!(derive_usage(&snap).memory_bytes, 0);
    }

    #[test]
    fn snapshot_from_empty_response_is_zeroed() {
        let snap = StatsSnapshot::from_response(&ContainerStatsResponse::default());
        assert_eq!(derive_usage(&snap).cpu_percent, 0.0);
        assert_eq!(derive_usage(&snap).memory_bytes, 0);
    }
}
