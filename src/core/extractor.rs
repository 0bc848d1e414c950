// PerfSleuth - core/extractor.rs
//
// Turns the text output of one benchmark run into a structured result.
// Core layer: accepts file content as a string, never touches the filesystem.
// Pure function of (file name, content), so any number of files may be
// extracted concurrently without coordination.

use crate::core::model::{
    normalize_key, Configuration, ConsumerMetrics, Metrics, MetricsFailure, PerfResult,
    ProducerMetrics, TestType,
};
use crate::util::constants;
use crate::util::error::ExtractError;
use chrono::Utc;
use regex::{Captures, Regex};
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// Options for extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractConfig {
    /// Reject producer summaries whose percentiles are not non-decreasing.
    /// Off by default: the tool's output is taken as printed.
    pub strict_percentiles: bool,
}

// =============================================================================
// Patterns
// =============================================================================

/// Producer progress/summary line. Percentiles only appear on the final
/// cumulative summary.
///
/// Example:
///   1000000 records sent, 14637.645096 records/sec (28.59 MB/sec),
///   3182.27 ms avg latency, 3613.00 ms max latency,
///   3289 ms 50th, 3467 ms 95th, 3568 ms 99th, 3603 ms 99.9th.
fn producer_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?P<records_sent>\d+)\s+records sent,\s+",
            r"(?P<throughput_rps>[\d.]+)\s+records/sec\s+\((?P<throughput_mb>[\d.]+)\s+MB/sec\),\s+",
            r"(?P<avg_latency_ms>[\d.]+)\s+ms avg latency,\s+",
            r"(?P<max_latency_ms>[\d.]+)\s+ms max latency",
            r"(?:,\s+(?P<p50_ms>\d+)\s+ms 50th)?",
            r"(?:,\s+(?P<p95_ms>\d+)\s+ms 95th)?",
            r"(?:,\s+(?P<p99_ms>\d+)\s+ms 99th)?",
            r"(?:,\s+(?P<p999_ms>\d+)\s+ms 99\.9th)?",
        ))
        .expect("producer pattern: invalid regex")
    })
}

/// Consumer data row: ten comma-separated fields.
///
/// Example:
///   2024-08-28 12:00:45:269, 2024-08-28 12:01:53:199, 1953.1250, 28.7520,
///   1000000, 14721.0364, 3330, 64600, 30.2341, 15479.8762
fn consumer_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?P<start_time>\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}:\d{3}),\s*",
            r"(?P<end_time>\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}:\d{3}),\s*",
            r"(?P<data_consumed_mb>[\d.]+),\s*(?P<throughput_mb_sec>[\d.]+),\s*",
            r"(?P<num_messages>\d+),\s*(?P<throughput_msg_sec>[\d.]+),\s*",
            r"(?P<rebalance_time_ms>[\d.]+),\s*(?P<fetch_time_ms>[\d.]+),\s*",
            r"(?P<fetch_mb_sec>[\d.]+),\s*(?P<fetch_msg_sec>[\d.]+)",
        ))
        .expect("consumer pattern: invalid regex")
    })
}

/// Title comment written by the harness, e.g.
/// `# Producer Performance Test - baseline`.
fn title_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:Producer|Consumer) (?:Performance )?Test\s*-\s*(?P<scenario>.+)$")
            .expect("title pattern: invalid regex")
    })
}

/// Labelled single-value header comments and the configuration key each sets.
const HEADER_LABELS: &[(&str, &str)] = &[
    ("Record Size:", "record_size"),
    ("Num Records:", "num_records"),
    ("Test Run:", "test_run"),
    ("Host:", "host"),
    ("Date:", "date"),
];

// =============================================================================
// Extraction
// =============================================================================

/// Extract one log file with default options.
///
/// See `extract_with`.
pub fn extract(file_path: &Path, raw_text: &str) -> Result<PerfResult, ExtractError> {
    extract_with(file_path, raw_text, &ExtractConfig::default())
}

/// Extract one log file.
///
/// Returns `ExtractError::Classification` when the file name names neither
/// test type; such files produce no result at all. A recognised file whose
/// content does not match (or whose numbers do not parse) still produces a
/// result, with `metrics: None` and the reason in `failure`.
pub fn extract_with(
    file_path: &Path,
    raw_text: &str,
    config: &ExtractConfig,
) -> Result<PerfResult, ExtractError> {
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    let test_type =
        TestType::classify(&file_name).ok_or_else(|| ExtractError::Classification {
            path: file_path.to_path_buf(),
        })?;

    tracing::debug!(file = %file_path.display(), %test_type, "Extraction started");

    let mut configuration = configuration_from_filename(file_path);
    apply_header_overrides(&mut configuration, raw_text);

    let outcome = match test_type {
        TestType::Producer => extract_producer_metrics(raw_text, config),
        TestType::Consumer => extract_consumer_metrics(raw_text),
    };

    let (metrics, failure) = match outcome {
        Ok(m) => (Some(m), None),
        Err(failure) => {
            tracing::warn!(
                file = %file_path.display(),
                %test_type,
                reason = %failure,
                "No usable metrics; result kept for diagnostics"
            );
            (None, Some(failure))
        }
    };

    tracing::debug!(
        file = %file_path.display(),
        config_keys = configuration.len(),
        has_metrics = metrics.is_some(),
        "Extraction complete"
    );

    Ok(PerfResult {
        test_type,
        configuration,
        metrics,
        source_path: file_path.to_path_buf(),
        parsed_at: Utc::now(),
        failure,
    })
}

// =============================================================================
// Configuration
// =============================================================================

/// First pass: positional tokens of the file stem.
///
/// `producer_baseline_acks_1_batch_16384.log` yields
/// `scenario=baseline, acks=1, batch=16384`. An odd trailing token is ignored.
pub fn configuration_from_filename(file_path: &Path) -> Configuration {
    let mut config = Configuration::new();
    let stem = match file_path.file_stem() {
        Some(s) => s.to_string_lossy(),
        None => return config,
    };

    let tokens: Vec<&str> = stem.split(constants::FILENAME_TOKEN_DELIMITER).collect();

    if let Some(scenario) = tokens.get(1).filter(|s| !s.is_empty()) {
        config.insert("scenario".to_string(), (*scenario).to_string());
    }

    if tokens.len() > 2 {
        for pair in tokens[2..].chunks_exact(2) {
            let key = normalize_key(pair[0]);
            if !key.is_empty() {
                config.insert(key, pair[1].to_string());
            }
        }
    }

    config
}

/// Second pass: header comments. Overwrites keys from the file name and adds
/// new ones. Lines are applied in file order.
pub fn apply_header_overrides(config: &mut Configuration, raw_text: &str) {
    for line in raw_text.lines() {
        let Some(body) = line
            .trim_start()
            .strip_prefix(constants::HEADER_COMMENT_MARKER)
        else {
            continue;
        };
        let body = body.trim();

        if let Some(idx) = body.find(constants::CONFIGURATION_LABEL) {
            let pairs = &body[idx + constants::CONFIGURATION_LABEL.len()..];
            for segment in pairs.split(',') {
                if let Some((key, value)) = segment.split_once('=') {
                    let key = normalize_key(key);
                    if !key.is_empty() {
                        config.insert(key, value.trim().to_string());
                    }
                }
            }
            continue;
        }

        if let Some(caps) = title_pattern().captures(body) {
            config.insert("scenario".to_string(), caps["scenario"].trim().to_string());
            continue;
        }

        for (label, key) in HEADER_LABELS {
            if let Some(value) = body.strip_prefix(label) {
                let value = value.trim();
                if !value.is_empty() {
                    config.insert((*key).to_string(), value.to_string());
                }
                break;
            }
        }
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Producer: the LAST matching line is the run's cumulative result; earlier
/// matches are progress ticks.
fn extract_producer_metrics(
    raw_text: &str,
    config: &ExtractConfig,
) -> Result<Metrics, MetricsFailure> {
    let caps = producer_pattern()
        .captures_iter(raw_text)
        .last()
        .ok_or(MetricsFailure::NoMatchFound)?;

    let metrics = ProducerMetrics {
        records_sent: required(&caps, "records_sent")?,
        throughput_rps: required(&caps, "throughput_rps")?,
        throughput_mb: required(&caps, "throughput_mb")?,
        avg_latency_ms: required(&caps, "avg_latency_ms")?,
        max_latency_ms: required(&caps, "max_latency_ms")?,
        p50_ms: optional(&caps, "p50_ms")?,
        p95_ms: optional(&caps, "p95_ms")?,
        p99_ms: optional(&caps, "p99_ms")?,
        p999_ms: optional(&caps, "p999_ms")?,
    };

    if config.strict_percentiles {
        check_percentile_order(&metrics)?;
    }

    Ok(Metrics::Producer(metrics))
}

/// Consumer: the first data row after the column header wins.
fn extract_consumer_metrics(raw_text: &str) -> Result<Metrics, MetricsFailure> {
    for line in raw_text.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with(constants::HEADER_COMMENT_MARKER)
            || line.starts_with(constants::CONSUMER_HEADER_PREFIX)
        {
            continue;
        }

        if let Some(caps) = consumer_pattern().captures(line) {
            return Ok(Metrics::Consumer(ConsumerMetrics {
                start_time: caps["start_time"].to_string(),
                end_time: caps["end_time"].to_string(),
                data_consumed_mb: required(&caps, "data_consumed_mb")?,
                throughput_mb_sec: required(&caps, "throughput_mb_sec")?,
                num_messages: required(&caps, "num_messages")?,
                throughput_msg_sec: required(&caps, "throughput_msg_sec")?,
                rebalance_time_ms: required(&caps, "rebalance_time_ms")?,
                fetch_time_ms: required(&caps, "fetch_time_ms")?,
                fetch_mb_sec: required(&caps, "fetch_mb_sec")?,
                fetch_msg_sec: required(&caps, "fetch_msg_sec")?,
            }));
        }
    }

    Err(MetricsFailure::NoMatchFound)
}

/// Parse a mandatory capture group. Any failure invalidates the whole match.
fn required<T: FromStr>(caps: &Captures<'_>, field: &str) -> Result<T, MetricsFailure> {
    let raw = caps.name(field).map(|m| m.as_str()).unwrap_or_default();
    raw.parse().map_err(|_| MetricsFailure::MalformedNumericField {
        field: field.to_string(),
        raw: raw.to_string(),
    })
}

/// Parse an optional capture group; absent is fine, present-but-bad is not.
fn optional<T: FromStr>(caps: &Captures<'_>, field: &str) -> Result<Option<T>, MetricsFailure> {
    match caps.name(field) {
        Some(_) => required(caps, field).map(Some),
        None => Ok(None),
    }
}

fn check_percentile_order(m: &ProducerMetrics) -> Result<(), MetricsFailure> {
    let present: Vec<(&str, u64)> = [
        ("p50", m.p50_ms),
        ("p95", m.p95_ms),
        ("p99", m.p99_ms),
        ("p99.9", m.p999_ms),
    ]
    .into_iter()
    .filter_map(|(name, v)| v.map(|v| (name, v)))
    .collect();

    for pair in present.windows(2) {
        let (lo_name, lo) = pair[0];
        let (hi_name, hi) = pair[1];
        if lo > hi {
            return Err(MetricsFailure::PercentileOrder {
                detail: format!("{lo_name} ({lo} ms) > {hi_name} ({hi} ms)"),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
