//! Resource utilization derived from cumulative counters.
//!
//! The engine reports CPU time as ever-growing counters for the container
//! and for the whole host. Utilization is the ratio of the two deltas
//! between consecutive readings. Nothing here performs I/O.

use serde::{Deserialize, Serialize};

const MIB: f64 = 1024.0 * 1024.0;

/// One reading of the cumulative CPU counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSample {
    /// CPU time consumed by the container.
    pub container_cpu: u64,
    /// CPU time consumed by the whole host.
    pub system_cpu: u64,
}

/// A single stats sample as returned by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStats {
    /// Counters at the time of the sample.
    pub current: CounterSample,
    /// Counters at the engine's preceding reading.
    pub previous: CounterSample,
    /// Memory in use, in bytes.
    pub memory_used: u64,
    /// Memory limit, in bytes.
    pub memory_limit: u64,
}

/// Point-in-time utilization of one container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// CPU utilization in `[0, 100]`.
    pub cpu_percent: f64,
    /// Memory utilization in `[0, 100]`.
    pub memory_percent: f64,
    /// Memory in use, in bytes.
    pub memory_used_bytes: u64,
    /// Memory limit, in bytes.
    pub memory_limit_bytes: u64,
    /// Memory in use, in MiB, two decimals.
    pub memory_used_mib: f64,
    /// Memory limit, in MiB, two decimals.
    pub memory_limit_mib: f64,
}

impl MetricsSnapshot {
    /// Derives a snapshot from one raw sample.
    #[must_use]
    pub fn from_raw(raw: &RawStats) -> Self {
        Self {
            cpu_percent: cpu_percent(raw.current, raw.previous),
            memory_percent: memory_percent(raw.memory_used, raw.memory_limit),
            memory_used_bytes: raw.memory_used,
            memory_limit_bytes: raw.memory_limit,
            memory_used_mib: to_mib(raw.memory_used),
            memory_limit_mib: to_mib(raw.memory_limit),
        }
    }
}

/// CPU utilization between two readings. Zero when the host delta is not
/// positive.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn cpu_percent(current: CounterSample, previous: CounterSample) -> f64 {
    let cpu_delta = current.container_cpu as f64 - previous.container_cpu as f64;
    let system_delta = current.system_cpu as f64 - previous.system_cpu as f64;
    if system_delta <= 0.0 {
        return 0.0;
    }
    bounded_percent(cpu_delta / system_delta * 100.0)
}

/// Memory utilization. Zero when the limit is not positive.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn memory_percent(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    bounded_percent(used as f64 / limit as f64 * 100.0)
}

/// Clamps into `[0, 100]`; non-finite values become zero.
fn bounded_percent(value: f64) -> f64 {
    if value.is_finite() {
        round2(value.clamp(0.0, 100.0))
    } else {
        0.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_mib(bytes: u64) -> f64 {
    round2(bytes as f64 / MIB)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(container_cpu: u64, system_cpu: u64) -> CounterSample {
        CounterSample {
            container_cpu,
            system_cpu,
        }
    }

    #[test]
    fn cpu_percent_is_ratio_of_deltas() {
        let pct = cpu_percent(sample(1_500, 20_000), sample(1_000, 10_000));
        assert!((pct - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cpu_percent_zero_when_system_delta_not_positive() {
        assert!(cpu_percent(sample(2_000, 10_000), sample(1_000, 10_000)).abs() < f64::EPSILON);
        assert!(cpu_percent(sample(2_000, 5_000), sample(1_000, 10_000)).abs() < f64::EPSILON);
    }

    #[test]
    fn cpu_percent_counter_reset_clamps_to_zero() {
        let pct = cpu_percent(sample(100, 20_000), sample(5_000, 10_000));
        assert!(pct.abs() < f64::EPSILON);
    }

    #[test]
    fn cpu_percent_never_exceeds_hundred() {
        let pct = cpu_percent(sample(50_000, 20_000), sample(0, 10_000));
        assert!((pct - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn memory_percent_zero_limit_is_zero() {
        assert!(memory_percent(1024, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn memory_percent_rounds_to_two_decimals() {
        let pct = memory_percent(1, 3);
        assert!((pct - 33.33).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_reports_mib_and_bytes() {
        let raw = RawStats {
            current: sample(0, 0),
            previous: sample(0, 0),
            memory_used: 64 * 1024 * 1024,
            memory_limit: 256 * 1024 * 1024,
        };
        let snap = MetricsSnapshot::from_raw(&raw);
        assert_eq!(snap.memory_used_bytes, 64 * 1024 * 1024);
        assert!((snap.memory_used_mib - 64.0).abs() < f64::EPSILON);
        assert!((snap.memory_limit_mib - 256.0).abs() < f64::EPSILON);
        assert!((snap.memory_percent - 25.0).abs() < f64::EPSILON);
        assert!(snap.cpu_percent.abs() < f64::EPSILON);
    }

    #[test]
    fn extreme_counters_stay_in_range() {
        let pct = cpu_percent(sample(u64::MAX, u64::MAX), sample(0, u64::MAX - 1));
        assert!((0.0..=100.0).contains(&pct));
        let mem = memory_percent(u64::MAX, 1);
        assert!((0.0..=100.0).contains(&mem));
    }
}
