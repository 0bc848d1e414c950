// PerfSleuth - app/pipeline.rs
//
// Batch lifecycle: discovery, parallel extraction, then population-wide
// recommendation and aggregation.
//
// Architecture:
//   - Stage 1 maps every discovered file through read + extract on a rayon
//     pool. Workers share nothing mutable; results are collected in
//     discovery order, which is the join barrier.
//   - Stage 2 runs once, single-threaded, over the complete population.
//   - A shared cancel flag is checked before each file. A cancelled batch
//     fails as a whole so a partial population never reaches Stage 2.
//   - All per-file errors are non-fatal; the batch continues to the next file.

use crate::core::aggregate::{self, AggregationSummary};
use crate::core::discovery::{self, DiscoveredFile, DiscoveryConfig};
use crate::core::extractor::{self, ExtractConfig};
use crate::core::model::{BatchSummary, PerfResult, TestType};
use crate::core::recommend::{self, Recommendations, ScoringConfig};
use crate::app::reload;
use crate::platform::config::AppConfig;
use crate::platform::fs;
use crate::util::error::{PerfSleuthError, PipelineError};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

// =============================================================================
// Configuration
// =============================================================================

/// Everything one batch run needs.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub discovery: DiscoveryConfig,
    pub extract: ExtractConfig,
    /// 0 means rayon's global pool (one worker per core).
    pub worker_threads: usize,
    pub scoring: ScoringConfig,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            discovery: DiscoveryConfig {
                max_depth: config.max_depth,
                max_files: config.max_files,
                include_patterns: config.include_patterns.clone(),
                exclude_patterns: config.exclude_patterns.clone(),
                large_file_threshold: config.large_file_threshold,
            },
            extract: ExtractConfig {
                strict_percentiles: config.strict_percentiles,
            },
            worker_threads: config.worker_threads,
            scoring: config.scoring.clone(),
        }
    }
}

// =============================================================================
// Stage 1: extraction
// =============================================================================

/// Result of a completed extraction batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// One result per classified, readable file, in discovery order.
    pub results: Vec<PerfResult>,
    /// Human-readable descriptions of skipped files.
    pub warnings: Vec<String>,
    pub summary: BatchSummary,
}

/// What happened to a single file.
enum FileOutcome {
    Extracted(PerfResult),
    Unclassified(String),
    Unreadable(String),
}

fn process_file(file: &DiscoveredFile, config: &ExtractConfig) -> FileOutcome {
    let content = match fs::read_file_content(&file.path, file.is_large) {
        Ok(c) => c,
        Err(e) => {
            let msg = format!("Cannot read '{}': {e}", file.path.display());
            tracing::warn!(warning = %msg, "File read failed");
            return FileOutcome::Unreadable(msg);
        }
    };

    match extractor::extract_with(&file.path, &content, config) {
        Ok(result) => FileOutcome::Extracted(result),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unclassified file");
            FileOutcome::Unclassified(e.to_string())
        }
    }
}

/// Extract every file in parallel, preserving input order.
///
/// `worker_threads == 0` uses rayon's global pool; any other value builds a
/// dedicated pool of that size for this batch.
pub fn run_extraction(
    files: &[DiscoveredFile],
    config: &ExtractConfig,
    worker_threads: usize,
    cancel: &AtomicBool,
) -> Result<BatchOutcome, PipelineError> {
    let start = Instant::now();
    let total_files = files.len();

    tracing::info!(total_files, worker_threads, "Extraction starting");

    let map_all = || -> Option<Vec<FileOutcome>> {
        files
            .par_iter()
            .map(|file| {
                if cancel.load(Ordering::SeqCst) {
                    return None;
                }
                Some(process_file(file, config))
            })
            .collect()
    };

    let outcomes = if worker_threads == 0 {
        map_all()
    } else {
        rayon::ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .build()
            .map_err(|source| PipelineError::ThreadPool {
                threads: worker_threads,
                source,
            })?
            .install(map_all)
    };

    // A flag raised after the last file still discards the batch.
    let outcomes = match outcomes {
        Some(o) if !cancel.load(Ordering::SeqCst) => o,
        _ => {
            tracing::info!(total_files, "Extraction cancelled");
            return Err(PipelineError::Cancelled { total_files });
        }
    };

    let mut batch = BatchOutcome {
        summary: BatchSummary {
            total_files,
            ..Default::default()
        },
        ..Default::default()
    };

    for outcome in outcomes {
        match outcome {
            FileOutcome::Extracted(result) => {
                batch.summary.results += 1;
                if result.is_usable() {
                    batch.summary.usable += 1;
                }
                match result.test_type {
                    TestType::Producer => batch.summary.producer_results += 1,
                    TestType::Consumer => batch.summary.consumer_results += 1,
                }
                batch.results.push(result);
            }
            FileOutcome::Unclassified(msg) => {
                batch.summary.unclassified += 1;
                batch.warnings.push(msg);
            }
            FileOutcome::Unreadable(msg) => {
                batch.summary.unreadable += 1;
                batch.warnings.push(msg);
            }
        }
    }

    batch.summary.duration = start.elapsed();

    tracing::info!(
        files = total_files,
        results = batch.summary.results,
        usable = batch.summary.usable,
        skipped = batch.summary.unclassified + batch.summary.unreadable,
        elapsed_ms = batch.summary.duration.as_millis() as u64,
        "Extraction complete"
    );

    Ok(batch)
}

// =============================================================================
// Full run
// =============================================================================

/// Everything a batch run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Directory the batch was read from.
    pub root: PathBuf,
    pub batch: BatchOutcome,
    pub recommendations: Recommendations,
    pub aggregation: AggregationSummary,
}

/// Stage 2: rank and aggregate a complete population.
fn rank(root: &Path, batch: BatchOutcome, scoring: &ScoringConfig) -> PipelineReport {
    let recommendations = recommend::recommend_with(&batch.results, scoring);
    let aggregation = aggregate::aggregate(&batch.results);

    PipelineReport {
        root: root.to_path_buf(),
        batch,
        recommendations,
        aggregation,
    }
}

/// Discover, extract, then rank and aggregate the logs under `root`.
///
/// Discovery warnings are merged into `batch.warnings`. Fails on an invalid
/// root, a thread pool error or cancellation; a test type with no usable
/// results is reported inside `recommendations`, not as an error.
pub fn run(
    root: &Path,
    config: &PipelineConfig,
    cancel: &AtomicBool,
) -> Result<PipelineReport, PerfSleuthError> {
    let discovered = discovery::discover_files(root, &config.discovery)?;

    let mut batch = run_extraction(
        &discovered.files,
        &config.extract,
        config.worker_threads,
        cancel,
    )?;

    let mut warnings = discovered.warnings;
    warnings.append(&mut batch.warnings);
    batch.warnings = warnings;

    Ok(rank(root, batch, &config.scoring))
}

/// Rank and aggregate results previously written to `dir` instead of
/// extracting logs.
///
/// `summary.total_files` counts result files read; files that fail to parse
/// count as unreadable.
pub fn run_persisted(dir: &Path, config: &PipelineConfig) -> Result<PipelineReport, PerfSleuthError> {
    let start = Instant::now();
    let loaded = reload::load_results(dir)?;

    let count = |t: TestType| loaded.results.iter().filter(|r| r.test_type == t).count();
    let summary = BatchSummary {
        total_files: loaded.files_loaded + loaded.warnings.len(),
        results: loaded.results.len(),
        usable: loaded.results.iter().filter(|r| r.is_usable()).count(),
        unclassified: 0,
        unreadable: loaded.warnings.len(),
        producer_results: count(TestType::Producer),
        consumer_results: count(TestType::Consumer),
        duration: start.elapsed(),
    };

    let batch = BatchOutcome {
        results: loaded.results,
        warnings: loaded.warnings,
        summary,
    };

    Ok(rank(dir, batch, &config.scoring))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCER: &str = "\
# Producer Performance Test - baseline
1000 records sent, 100.0 records/sec (0.10 MB/sec), 5.0 ms avg latency, 9.0 ms max latency, 4 ms 50th, 8 ms 95th, 9 ms 99th, 9 ms 99.9th.
";

    fn write_files(dir: &Path, names: &[(&str, &str)]) -> Vec<DiscoveredFile> {
        names
            .iter()
            .map(|(name, content)| {
                let path = dir.join(name);
                std::fs::write(&path, content).unwrap();
                DiscoveredFile {
                    path,
                    size: content.len() as u64,
                    is_large: false,
                }
            })
            .collect()
    }

    #[test]
    fn test_extraction_preserves_order_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = write_files(
            dir.path(),
            &[
                ("producer_b_acks_1.log", PRODUCER),
                ("broker.log", "nothing"),
                ("producer_a_acks_all.log", PRODUCER),
                ("consumer_c.log", "no data"),
            ],
        );
        files.push(DiscoveredFile {
            path: dir.path().join("producer_gone.log"),
            size: 0,
            is_large: false,
        });

        let cancel = AtomicBool::new(false);
        let batch = run_extraction(&files, &ExtractConfig::default(), 2, &cancel).unwrap();

        let names: Vec<_> = batch
            .results
            .iter()
            .map(|r| r.source_path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            ["producer_b_acks_1.log", "producer_a_acks_all.log", "consumer_c.log"]
        );
        assert_eq!(batch.summary.total_files, 5);
        assert_eq!(batch.summary.results, 3);
        assert_eq!(batch.summary.usable, 2);
        assert_eq!(batch.summary.unclassified, 1);
        assert_eq!(batch.summary.unreadable, 1);
        assert_eq!(batch.summary.producer_results, 2);
        assert_eq!(batch.summary.consumer_results, 1);
        assert_eq!(batch.warnings.len(), 2);
    }

    #[test]
    fn test_cancelled_batch_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_files(dir.path(), &[("producer_a.log", PRODUCER)]);
        let cancel = AtomicBool::new(true);
        let result = run_extraction(&files, &ExtractConfig::default(), 0, &cancel);
        assert!(matches!(
            result,
            Err(PipelineError::Cancelled { total_files: 1 })
        ));
    }

    #[test]
    fn test_empty_file_list() {
        let cancel = AtomicBool::new(false);
        let batch = run_extraction(&[], &ExtractConfig::default(), 0, &cancel).unwrap();
        assert!(batch.results.is_empty());
        assert_eq!(batch.summary.total_files, 0);
    }

    #[test]
    fn test_config_conversion() {
        let mut app = AppConfig::default();
        app.strict_percentiles = true;
        app.worker_threads = 3;
        app.max_files = 7;
        let config = PipelineConfig::from(&app);
        assert!(config.extract.strict_percentiles);
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.discovery.max_files, 7);
    }
}
