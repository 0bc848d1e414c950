// PerfSleuth - core/aggregate.rs
//
// Descriptive statistics over repeated runs of the same configuration.
// Core layer: pure reduction, no I/O.
//
// Runs are grouped by a key built from the configuration parameters that
// distinguish one test setup from another. Groups keep first-seen order so
// the output is reproducible for a given input order.

use crate::core::model::{Configuration, Metrics, PerfResult, TestType};
use crate::util::constants::{AGGREGATION_KEYS, DEFAULT_GROUP_KEY};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// =============================================================================
// Statistics
// =============================================================================

/// Summary statistics for one metric across a group's runs.
///
/// Every field except `count` is `None` for an empty sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub count: usize,
    pub mean: Option<f64>,
    /// Population standard deviation.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

/// Compute count, mean, population std-dev, min, max and the 50th/95th/99th
/// percentiles of `values`.
pub fn compute_stats(values: &[f64]) -> Stats {
    if values.is_empty() {
        return Stats::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    Stats {
        count: sorted.len(),
        mean: Some(mean),
        std: Some(variance.sqrt()),
        min: sorted.first().copied(),
        max: sorted.last().copied(),
        p50: Some(percentile(&sorted, 50.0)),
        p95: Some(percentile(&sorted, 95.0)),
        p99: Some(percentile(&sorted, 99.0)),
    }
}

/// Linear interpolation between the closest ranks. `sorted` must be
/// non-empty and ascending.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

// =============================================================================
// Grouping
// =============================================================================

/// Grouping key: the distinguishing parameters present in `config`, sorted,
/// as `k=v` joined by `|`. `default` when none are present.
pub fn group_key(config: &Configuration) -> String {
    let mut keys: Vec<&str> = AGGREGATION_KEYS.to_vec();
    keys.sort_unstable();

    let parts: Vec<String> = keys
        .into_iter()
        .filter_map(|k| config.get(k).map(|v| format!("{k}={v}")))
        .collect();

    if parts.is_empty() {
        DEFAULT_GROUP_KEY.to_string()
    } else {
        parts.join("|")
    }
}

/// All runs sharing one grouping key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigGroup {
    pub config_key: String,

    /// Configuration of the first run seen in this group.
    pub configuration: Configuration,

    pub test_count: usize,

    /// Per-metric statistics keyed by metric name.
    pub metrics: BTreeMap<&'static str, Stats>,
}

impl ConfigGroup {
    pub fn mean(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).and_then(|s| s.mean)
    }
}

/// Reads one metric from a record; `None` when the tool did not report it.
type MetricReader = fn(&Metrics) -> Option<f64>;

fn producer_throughput_mb(m: &Metrics) -> Option<f64> {
    match m {
        Metrics::Producer(p) => Some(p.throughput_mb),
        Metrics::Consumer(_) => None,
    }
}

fn producer_throughput_rps(m: &Metrics) -> Option<f64> {
    match m {
        Metrics::Producer(p) => Some(p.throughput_rps),
        Metrics::Consumer(_) => None,
    }
}

fn producer_avg_latency(m: &Metrics) -> Option<f64> {
    match m {
        Metrics::Producer(p) => Some(p.avg_latency_ms),
        Metrics::Consumer(_) => None,
    }
}

fn producer_p99(m: &Metrics) -> Option<f64> {
    match m {
        Metrics::Producer(p) => p.p99_ms.map(|v| v as f64),
        Metrics::Consumer(_) => None,
    }
}

fn consumer_throughput_mb(m: &Metrics) -> Option<f64> {
    match m {
        Metrics::Consumer(c) => Some(c.throughput_mb_sec),
        Metrics::Producer(_) => None,
    }
}

fn consumer_throughput_msg(m: &Metrics) -> Option<f64> {
    match m {
        Metrics::Consumer(c) => Some(c.throughput_msg_sec),
        Metrics::Producer(_) => None,
    }
}

fn consumer_rebalance_time(m: &Metrics) -> Option<f64> {
    match m {
        Metrics::Consumer(c) => Some(c.rebalance_time_ms),
        Metrics::Producer(_) => None,
    }
}

const PRODUCER_METRICS: &[(&str, MetricReader)] = &[
    ("throughput_mb", producer_throughput_mb),
    ("throughput_rps", producer_throughput_rps),
    ("avg_latency_ms", producer_avg_latency),
    ("p99_ms", producer_p99),
];

const CONSUMER_METRICS: &[(&str, MetricReader)] = &[
    ("throughput_mb_sec", consumer_throughput_mb),
    ("throughput_msg_sec", consumer_throughput_msg),
    ("rebalance_time_ms", consumer_rebalance_time),
];

fn tracked_metrics(test_type: TestType) -> &'static [(&'static str, MetricReader)] {
    match test_type {
        TestType::Producer => PRODUCER_METRICS,
        TestType::Consumer => CONSUMER_METRICS,
    }
}

/// Group the usable results of `test_type` and compute per-group statistics.
pub fn aggregate_groups(test_type: TestType, results: &[PerfResult]) -> Vec<ConfigGroup> {
    let mut order: Vec<(String, Vec<&PerfResult>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for r in results
        .iter()
        .filter(|r| r.test_type == test_type && r.is_usable())
    {
        let key = group_key(&r.configuration);
        match index.get(&key) {
            Some(&idx) => order[idx].1.push(r),
            None => {
                index.insert(key.clone(), order.len());
                order.push((key, vec![r]));
            }
        }
    }

    order
        .into_iter()
        .map(|(config_key, members)| {
            let metrics = tracked_metrics(test_type)
                .iter()
                .map(|(name, read)| {
                    let values: Vec<f64> = members
                        .iter()
                        .filter_map(|r| r.metrics.as_ref().and_then(*read))
                        .collect();
                    (*name, compute_stats(&values))
                })
                .collect();

            ConfigGroup {
                config_key,
                configuration: members[0].configuration.clone(),
                test_count: members.len(),
                metrics,
            }
        })
        .collect()
}

// =============================================================================
// Summary
// =============================================================================

/// Config keys of the best groups. `None` when no group qualifies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BestGroups {
    pub producer_highest_throughput: Option<String>,
    pub producer_lowest_latency: Option<String>,
    pub consumer_highest_throughput: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationSummary {
    pub total_results: usize,
    pub producer_results: usize,
    pub consumer_results: usize,
    pub unique_producer_configs: usize,
    pub unique_consumer_configs: usize,
    pub aggregated_at: DateTime<Utc>,
    pub best_configurations: BestGroups,
    pub producer_groups: Vec<ConfigGroup>,
    pub consumer_groups: Vec<ConfigGroup>,
}

/// First group with the extreme mean of `metric`; `prefer` returns true when
/// the candidate strictly beats the current best.
fn best_group(groups: &[ConfigGroup], metric: &str, prefer: fn(f64, f64) -> bool) -> Option<String> {
    let mut best: Option<(&ConfigGroup, f64)> = None;
    for g in groups {
        let Some(mean) = g.mean(metric) else { continue };
        match best {
            Some((_, current)) if !prefer(mean, current) => {}
            _ => best = Some((g, mean)),
        }
    }
    best.map(|(g, _)| g.config_key.clone())
}

/// Group every usable result by configuration and summarise both test types.
pub fn aggregate(results: &[PerfResult]) -> AggregationSummary {
    let producer_groups = aggregate_groups(TestType::Producer, results);
    let consumer_groups = aggregate_groups(TestType::Consumer, results);

    let count = |t: TestType| results.iter().filter(|r| r.test_type == t).count();

    let best_configurations = BestGroups {
        producer_highest_throughput: best_group(&producer_groups, "throughput_mb", |a, b| a > b),
        producer_lowest_latency: best_group(&producer_groups, "avg_latency_ms", |a, b| a < b),
        consumer_highest_throughput: best_group(&consumer_groups, "throughput_mb_sec", |a, b| {
            a > b
        }),
    };

    tracing::info!(
        producer_groups = producer_groups.len(),
        consumer_groups = consumer_groups.len(),
        "Aggregation complete"
    );

    AggregationSummary {
        total_results: results.len(),
        producer_results: count(TestType::Producer),
        consumer_results: count(TestType::Consumer),
        unique_producer_configs: producer_groups.len(),
        unique_consumer_configs: consumer_groups.len(),
        aggregated_at: Utc::now(),
        best_configurations,
        producer_groups,
        consumer_groups,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ProducerMetrics;
    use std::path::PathBuf;

    fn run(config: &[(&str, &str)], mb: f64, avg: f64, p99: Option<u64>) -> PerfResult {
        PerfResult {
            test_type: TestType::Producer,
            configuration: config
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            metrics: Some(Metrics::Producer(ProducerMetrics {
                records_sent: 100,
                throughput_rps: mb * 1000.0,
                throughput_mb: mb,
                avg_latency_ms: avg,
                max_latency_ms: avg,
                p50_ms: None,
                p95_ms: None,
                p99_ms: p99,
                p999_ms: None,
            })),
            source_path: PathBuf::from("producer_run.log"),
            parsed_at: Utc::now(),
            failure: None,
        }
    }

    #[test]
    fn test_stats_basic() {
        let s = compute_stats(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, Some(2.5));
        assert_eq!(s.min, Some(1.0));
        assert_eq!(s.max, Some(4.0));
        assert_eq!(s.p50, Some(2.5));
        // Population variance: (2.25 + 0.25 + 0.25 + 2.25) / 4 = 1.25
        assert!((s.std.unwrap() - 1.25_f64.sqrt()).abs() < 1e-12);
        // rank 0.95 * 3 = 2.85 -> 3 + 0.85 * (4 - 3)
        assert!((s.p95.unwrap() - 3.85).abs() < 1e-12);
    }

    #[test]
    fn test_stats_empty_and_single() {
        let empty = compute_stats(&[]);
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_none() && empty.p99.is_none());

        let single = compute_stats(&[7.0]);
        assert_eq!(single.std, Some(0.0));
        assert_eq!(single.p99, Some(7.0));
    }

    #[test]
    fn test_group_key_sorted_and_filtered() {
        let config: Configuration = [
            ("scenario", "baseline"),
            ("linger_ms", "5"),
            ("acks", "all"),
            ("host", "broker-1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(group_key(&config), "acks=all|linger_ms=5");
        assert_eq!(group_key(&Configuration::new()), "default");
    }

    #[test]
    fn test_groups_keep_first_seen_order() {
        let results = vec![
            run(&[("acks", "1")], 10.0, 5.0, Some(9)),
            run(&[("acks", "all")], 8.0, 9.0, None),
            run(&[("acks", "1"), ("test_run", "2")], 12.0, 7.0, Some(11)),
        ];
        let groups = aggregate_groups(TestType::Producer, &results);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].config_key, "acks=1");
        assert_eq!(groups[0].test_count, 2);
        assert_eq!(groups[0].mean("throughput_mb"), Some(11.0));
        assert_eq!(groups[1].config_key, "acks=all");
        assert_eq!(groups[1].metrics["p99_ms"].count, 0);
    }

    #[test]
    fn test_summary_best_groups() {
        let mut broken = run(&[("acks", "0")], 0.0, 0.0, None);
        broken.metrics = None;
        let results = vec![
            run(&[("acks", "1")], 10.0, 5.0, None),
            run(&[("acks", "all")], 10.0, 3.0, None),
            broken,
        ];
        let summary = aggregate(&results);
        assert_eq!(summary.total_results, 3);
        assert_eq!(summary.producer_results, 3);
        assert_eq!(summary.unique_producer_configs, 2);
        assert_eq!(summary.unique_consumer_configs, 0);
        // Equal means: first group wins.
        assert_eq!(
            summary.best_configurations.producer_highest_throughput.as_deref(),
            Some("acks=1")
        );
        assert_eq!(
            summary.best_configurations.producer_lowest_latency.as_deref(),
            Some("acks=all")
        );
        assert!(summary.best_configurations.consumer_highest_throughput.is_none());
    }
}
