// PerfSleuth - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no platform
// dependencies.
//
// These types are the shared vocabulary across all layers and the persisted
// JSON contract consumed by external reporting tools.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::util::constants;

// =============================================================================
// Test type
// =============================================================================

/// Which benchmark tool produced a log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Producer,
    Consumer,
}

impl TestType {
    /// Returns all variants in report order.
    pub fn all() -> &'static [TestType] {
        &[TestType::Producer, TestType::Consumer]
    }

    /// Lowercase label, identical to the serialised form.
    pub fn label(&self) -> &'static str {
        match self {
            TestType::Producer => "producer",
            TestType::Consumer => "consumer",
        }
    }

    /// Classify a file by name. `producer` is checked before `consumer`;
    /// matching is case-insensitive.
    pub fn classify(file_name: &str) -> Option<TestType> {
        let lower = file_name.to_lowercase();
        if lower.contains("producer") {
            Some(TestType::Producer)
        } else if lower.contains("consumer") {
            Some(TestType::Consumer)
        } else {
            None
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Test parameters for one run, keyed by normalised parameter name.
///
/// Open-ended: different scenarios expose different parameters.
pub type Configuration = BTreeMap<String, String>;

/// Normalise a configuration key: trimmed, lowercased, with `.` and `-`
/// mapped to `_` so `batch.size`, `Batch-Size` and `batch_size` collide.
pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '.' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

// =============================================================================
// Metrics
// =============================================================================

/// Final cumulative summary printed by the producer benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerMetrics {
    pub records_sent: u64,
    pub throughput_rps: f64,
    pub throughput_mb: f64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    /// Percentiles are only printed on the final summary line.
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub p999_ms: Option<u64>,
}

/// The single data row printed by the consumer benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerMetrics {
    pub start_time: String,
    pub end_time: String,
    pub data_consumed_mb: f64,
    pub throughput_mb_sec: f64,
    pub num_messages: u64,
    pub throughput_msg_sec: f64,
    pub rebalance_time_ms: f64,
    pub fetch_time_ms: f64,
    pub fetch_mb_sec: f64,
    pub fetch_msg_sec: f64,
}

/// Test-type-specific metrics. Serialised without a tag so the persisted
/// shape is the bare field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metrics {
    Producer(ProducerMetrics),
    Consumer(ConsumerMetrics),
}

impl Metrics {
    pub fn test_type(&self) -> TestType {
        match self {
            Metrics::Producer(_) => TestType::Producer,
            Metrics::Consumer(_) => TestType::Consumer,
        }
    }

    /// Throughput in MB/sec, the basis of the throughput score.
    pub fn throughput_mb(&self) -> f64 {
        match self {
            Metrics::Producer(m) => m.throughput_mb,
            Metrics::Consumer(m) => m.throughput_mb_sec,
        }
    }

    /// Latency in ms, the basis of the latency score. Consumers report no
    /// per-record latency; group rebalance time is the closest equivalent.
    pub fn latency_ms(&self) -> f64 {
        match self {
            Metrics::Producer(m) => m.avg_latency_ms,
            Metrics::Consumer(m) => m.rebalance_time_ms,
        }
    }

    /// p99 latency in ms, if the tool reported it.
    pub fn tail_latency_ms(&self) -> Option<f64> {
        match self {
            Metrics::Producer(m) => m.p99_ms.map(|v| v as f64),
            Metrics::Consumer(_) => None,
        }
    }
}

/// Why a recognised log file produced no metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricsFailure {
    /// The content never matched the tool's output line shape.
    NoMatchFound,

    /// A line matched but one of its numbers did not parse.
    MalformedNumericField { field: String, raw: String },

    /// Percentiles were not non-decreasing (only in strict mode).
    PercentileOrder { detail: String },
}

impl fmt::Display for MetricsFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchFound => f.write_str("no benchmark output line found"),
            Self::MalformedNumericField { field, raw } => {
                write!(f, "field '{field}' has unparseable value '{raw}'")
            }
            Self::PercentileOrder { detail } => {
                write!(f, "percentiles out of order: {detail}")
            }
        }
    }
}

// =============================================================================
// Result
// =============================================================================

/// One benchmark log file, extracted.
///
/// Created once per source file and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfResult {
    pub test_type: TestType,

    pub configuration: Configuration,

    /// `None` when the file matched no output line; such results are kept
    /// for diagnostics but never scored.
    pub metrics: Option<Metrics>,

    #[serde(rename = "filepath")]
    pub source_path: PathBuf,

    #[serde(rename = "parse_time")]
    pub parsed_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<MetricsFailure>,
}

impl PerfResult {
    /// True when the result belongs in a scoring population.
    pub fn is_usable(&self) -> bool {
        self.metrics.is_some()
    }

    pub fn scenario(&self) -> Option<&str> {
        self.configuration.get("scenario").map(String::as_str)
    }

    /// True when the run required acknowledgement from all in-sync replicas.
    pub fn is_durable(&self) -> bool {
        self.configuration
            .get("acks")
            .is_some_and(|v| constants::DURABLE_ACKS_VALUES.contains(&v.to_lowercase().as_str()))
    }

    /// Short human-readable label, e.g. `baseline [acks=1, batch_size=16384]`.
    pub fn label(&self) -> String {
        let params: Vec<String> = self
            .configuration
            .iter()
            .filter(|(k, _)| k.as_str() != "scenario")
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!(
            "{} [{}]",
            self.scenario().unwrap_or("unknown"),
            params.join(", ")
        )
    }
}

// =============================================================================
// Scoring vocabulary
// =============================================================================

/// Named composite score profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileName {
    MaxThroughput,
    Balanced,
    LowLatency,
    Durability,
}

impl ProfileName {
    pub fn all() -> &'static [ProfileName] {
        &[
            ProfileName::MaxThroughput,
            ProfileName::Balanced,
            ProfileName::LowLatency,
            ProfileName::Durability,
        ]
    }

    /// Config-file section name, identical to the serialised form.
    pub fn key(&self) -> &'static str {
        match self {
            ProfileName::MaxThroughput => "max_throughput",
            ProfileName::Balanced => "balanced",
            ProfileName::LowLatency => "low_latency",
            ProfileName::Durability => "durability",
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A result plus the scores computed against one population.
///
/// Derived data: recomputed whenever the population changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    #[serde(flatten)]
    pub result: PerfResult,

    pub throughput_score: f64,

    pub latency_score: f64,

    /// `None` when p99/avg is undefined (zero average or no p99).
    pub consistency_score: Option<f64>,

    /// Durability is only present for records in the durable subpopulation.
    pub composite_scores: BTreeMap<ProfileName, f64>,
}

impl ScoredResult {
    pub fn composite(&self, profile: ProfileName) -> Option<f64> {
        self.composite_scores.get(&profile).copied()
    }
}

/// What a recommendation was selected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    HighestThroughput,
    LowestLatency,
    Composite(ProfileName),
}

/// One selected record together with the score that justified it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub criterion: Criterion,

    /// For the raw-metric picks this is the record's throughput or latency
    /// score; for profile picks it is the composite score.
    pub score: f64,

    pub record: ScoredResult,
}

/// All selections for one test type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationSet {
    pub test_type: TestType,

    /// Number of usable records the scores were normalised over.
    pub population: usize,

    pub max_throughput: f64,
    pub max_latency: f64,
    pub min_latency: f64,

    pub best_throughput: Option<Recommendation>,
    pub best_latency: Option<Recommendation>,
    pub balanced: Option<Recommendation>,
    pub low_latency_pick: Option<Recommendation>,
    pub max_throughput_pick: Option<Recommendation>,

    /// Absent when no record ran with `acks=all`.
    pub durability_pick: Option<Recommendation>,

    /// Every scored record in input order.
    pub scored: Vec<ScoredResult>,
}

// =============================================================================
// Batch summary
// =============================================================================

/// Summary statistics for a completed extraction batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    /// Log files handed to the extractor.
    pub total_files: usize,

    /// Files that produced a result (with or without metrics).
    pub results: usize,

    /// Results with usable metrics.
    pub usable: usize,

    /// Files dropped because their name named no test type.
    pub unclassified: usize,

    /// Files that could not be read.
    pub unreadable: usize,

    pub producer_results: usize,
    pub consumer_results: usize,

    /// Wall-clock extraction duration.
    #[serde(skip)]
    pub duration: std::time::Duration,
}
