// PerfSleuth - core/export.rs
//
// JSON and CSV export of results, scores, recommendations and aggregates.
// Core layer: writes to any Write trait object; the app layer owns file
// creation.

use crate::core::aggregate::{AggregationSummary, ConfigGroup};
use crate::core::model::{PerfResult, ProfileName, RecommendationSet, ScoredResult, TestType};
use crate::core::recommend::Recommendations;
use crate::util::constants::{
    INDIVIDUAL_NAME_SEPARATOR, RESULTS_FILE_EXTENSION, RESULTS_FILE_PREFIX,
};
use crate::util::error::{ExportError, RecommendError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

// =============================================================================
// File naming
// =============================================================================

/// `parsed_results_YYYYmmdd_HHMMSS.json`
pub fn results_file_name(at: DateTime<Utc>) -> String {
    format!("{RESULTS_FILE_PREFIX}_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Per-result file name: the directories between `root` and the source log,
/// then the log's stem, joined with `__`, plus `.json`.
///
/// `run1/producer_a.log` under `root` becomes `run1__producer_a.json`. A log
/// outside `root` is named by its stem alone.
pub fn individual_file_name(result: &PerfResult, root: &Path) -> String {
    let path = &result.source_path;

    let mut parts: Vec<String> = path
        .strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .map(|dirs| {
            dirs.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();

    parts.push(
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "result".to_string()),
    );

    format!(
        "{}.{RESULTS_FILE_EXTENSION}",
        parts.join(INDIVIDUAL_NAME_SEPARATOR)
    )
}

// =============================================================================
// JSON
// =============================================================================

fn write_json<W: Write, T: Serialize + ?Sized>(
    value: &T,
    writer: W,
    export_path: &Path,
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, value).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })
}

/// Export results as a JSON array in the persisted result shape.
pub fn export_results_json<W: Write>(
    results: &[PerfResult],
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    write_json(results, writer, export_path)?;
    Ok(results.len())
}

/// Export a single result as a JSON object.
pub fn export_result_json<W: Write>(
    result: &PerfResult,
    writer: W,
    export_path: &Path,
) -> Result<(), ExportError> {
    write_json(result, writer, export_path)
}

#[derive(Serialize)]
#[serde(untagged)]
enum Outcome<'a> {
    Ranked(&'a RecommendationSet),
    Unavailable { error: String },
}

impl<'a> From<&'a Result<RecommendationSet, RecommendError>> for Outcome<'a> {
    fn from(outcome: &'a Result<RecommendationSet, RecommendError>) -> Self {
        match outcome {
            Ok(set) => Outcome::Ranked(set),
            Err(e) => Outcome::Unavailable {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Serialize)]
struct RecommendationReport<'a> {
    generated_at: DateTime<Utc>,
    producer: Outcome<'a>,
    consumer: Outcome<'a>,
}

/// Export both recommendation outcomes. A test type with no usable results
/// is written as `{"error": "..."}`.
pub fn export_recommendations_json<W: Write>(
    recommendations: &Recommendations,
    writer: W,
    export_path: &Path,
) -> Result<(), ExportError> {
    let report = RecommendationReport {
        generated_at: Utc::now(),
        producer: (&recommendations.producer).into(),
        consumer: (&recommendations.consumer).into(),
    };
    write_json(&report, writer, export_path)
}

pub fn export_aggregation_json<W: Write>(
    summary: &AggregationSummary,
    writer: W,
    export_path: &Path,
) -> Result<(), ExportError> {
    write_json(summary, writer, export_path)
}

// =============================================================================
// CSV
// =============================================================================

fn fmt_score(score: Option<f64>) -> String {
    score.map(|s| format!("{s:.4}")).unwrap_or_default()
}

/// Export scored records, one row per record, in population order.
///
/// Writes: test_type, label, filepath, throughput, latency, the three
/// sub-scores and one column per composite profile.
pub fn export_scores_csv<W: Write>(
    scored: &[ScoredResult],
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let csv_err = |e: csv::Error| ExportError::Csv {
        path: export_path.to_path_buf(),
        source: e,
    };

    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec![
        "test_type",
        "label",
        "filepath",
        "throughput_mb",
        "latency_ms",
        "throughput_score",
        "latency_score",
        "consistency_score",
    ];
    header.extend(ProfileName::all().iter().map(ProfileName::key));
    csv_writer.write_record(&header).map_err(csv_err)?;

    let mut count = 0;
    for record in scored {
        let r = &record.result;
        let (throughput, latency) = r
            .metrics
            .as_ref()
            .map(|m| (m.throughput_mb().to_string(), m.latency_ms().to_string()))
            .unwrap_or_default();

        let mut row = vec![
            r.test_type.label().to_string(),
            r.label(),
            r.source_path.display().to_string(),
            throughput,
            latency,
            fmt_score(Some(record.throughput_score)),
            fmt_score(Some(record.latency_score)),
            fmt_score(record.consistency_score),
        ];
        row.extend(
            ProfileName::all()
                .iter()
                .map(|p| fmt_score(record.composite(*p))),
        );

        csv_writer.write_record(&row).map_err(csv_err)?;
        count += 1;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    Ok(count)
}

fn group_row(test_type: TestType, group: &ConfigGroup) -> Vec<String> {
    let config = |key: &str| group.configuration.get(key).cloned().unwrap_or_default();
    let compression = group
        .configuration
        .get("compression_type")
        .or_else(|| group.configuration.get("compression"))
        .cloned()
        .unwrap_or_default();

    let (throughput, latency) = match test_type {
        TestType::Producer => ("throughput_mb", Some("avg_latency_ms")),
        TestType::Consumer => ("throughput_mb_sec", None),
    };
    let throughput = group.metrics.get(throughput);
    let latency = latency.and_then(|m| group.metrics.get(m));

    vec![
        test_type.label().to_string(),
        group.config_key.clone(),
        config("acks"),
        config("batch_size"),
        config("linger_ms"),
        compression,
        config("record_size"),
        config("fetch_min_bytes"),
        config("max_poll_records"),
        group.test_count.to_string(),
        fmt_score(throughput.and_then(|s| s.mean)),
        fmt_score(throughput.and_then(|s| s.std)),
        fmt_score(latency.and_then(|s| s.mean)),
        fmt_score(latency.and_then(|s| s.std)),
    ]
}

/// Export one row per configuration group, producer groups first.
///
/// Writes the grouping key, the distinguishing parameters, the run count and
/// the mean and standard deviation of throughput and (producer only) average
/// latency.
pub fn export_aggregation_csv<W: Write>(
    summary: &AggregationSummary,
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let csv_err = |e: csv::Error| ExportError::Csv {
        path: export_path.to_path_buf(),
        source: e,
    };

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record([
            "test_type",
            "config_key",
            "acks",
            "batch_size",
            "linger_ms",
            "compression",
            "record_size",
            "fetch_min_bytes",
            "max_poll_records",
            "test_count",
            "throughput_mb_mean",
            "throughput_mb_std",
            "latency_ms_mean",
            "latency_ms_std",
        ])
        .map_err(csv_err)?;

    let rows = summary
        .producer_groups
        .iter()
        .map(|g| group_row(TestType::Producer, g))
        .chain(
            summary
                .consumer_groups
                .iter()
                .map(|g| group_row(TestType::Consumer, g)),
        );

    let mut count = 0;
    for row in rows {
        csv_writer.write_record(&row).map_err(csv_err)?;
        count += 1;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    Ok(count)
}
