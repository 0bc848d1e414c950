// PerfSleuth - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// Config validation (platform::config) checks user values against these.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "PerfSleuth";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "PerfSleuth";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Discovery limits
// =============================================================================

/// Maximum directory recursion depth during discovery.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Minimum sensible value for the max-files limit.
pub const MIN_MAX_FILES: usize = 1;

/// Maximum number of log files to discover in a single batch.
pub const DEFAULT_MAX_FILES: usize = 5_000;

/// Hard upper bound on max files (prevents configuration mistakes).
pub const ABSOLUTE_MAX_FILES: usize = 100_000;

/// Hard upper bound on max depth (prevents runaway traversal).
pub const ABSOLUTE_MAX_DEPTH: usize = 50;

/// Default include glob patterns for benchmark log discovery.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &["*.log"];

/// Default exclude glob patterns for benchmark log discovery.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &["*.gz", "*.zip", "*.bak", "*.tmp", ".git"];

// =============================================================================
// Extraction
// =============================================================================

/// File size in bytes above which the file is memory-mapped instead of read.
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 64 * 1024 * 1024; // 64 MB

/// Lower bound for a configurable large-file threshold.
pub const MIN_LARGE_FILE_THRESHOLD: u64 = 1024 * 1024; // 1 MB

/// Comment marker that introduces header lines written by the test harness.
pub const HEADER_COMMENT_MARKER: char = '#';

/// Label on the header line that carries `key=value` configuration pairs.
pub const CONFIGURATION_LABEL: &str = "Configuration:";

/// First column name of the consumer tool's CSV header row.
pub const CONSUMER_HEADER_PREFIX: &str = "start.time";

/// Delimiter between filename tokens.
pub const FILENAME_TOKEN_DELIMITER: char = '_';

/// Retry limits for transient I/O errors when reading log files.
pub const MAX_READ_RETRIES: u32 = 3;
pub const READ_RETRY_DELAYS_MS: [u64; 3] = [50, 100, 200];

// =============================================================================
// Pipeline
// =============================================================================

/// Default number of extraction worker threads. 0 means rayon's default
/// (one per available CPU core).
pub const DEFAULT_WORKER_THREADS: usize = 0;

/// Maximum user-configurable worker thread count.
pub const MAX_WORKER_THREADS: usize = 256;

// =============================================================================
// Scoring
// =============================================================================

/// Upper bound of every normalised sub-score.
pub const MAX_SCORE: f64 = 100.0;

/// Points deducted from the consistency score per unit of p99/avg ratio above 1.
pub const CONSISTENCY_PENALTY_PER_RATIO: f64 = 20.0;

/// Allowed deviation of a weight triple's sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// `acks` values that request acknowledgement from all in-sync replicas.
pub const DURABLE_ACKS_VALUES: &[&str] = &["all", "-1"];

/// Configuration keys that identify a distinct test configuration when
/// grouping repeated runs for aggregation.
pub const AGGREGATION_KEYS: &[&str] = &[
    "acks",
    "batch_size",
    "compression",
    "compression_type",
    "fetch_min_bytes",
    "linger_ms",
    "max_poll_records",
    "num_consumers",
    "num_producers",
    "record_size",
];

/// Group key used when a configuration carries none of `AGGREGATION_KEYS`.
pub const DEFAULT_GROUP_KEY: &str = "default";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Configuration and output
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default output directory for parsed and scored results.
pub const DEFAULT_OUTPUT_DIR: &str = "results/parsed_data";

/// Prefix of the timestamped combined results file.
pub const RESULTS_FILE_PREFIX: &str = "parsed_results";

/// File name for the recommendation report.
pub const RECOMMENDATIONS_FILE_NAME: &str = "recommendations.json";

/// File name for the aggregation summary.
pub const AGGREGATION_FILE_NAME: &str = "aggregated_results.json";

/// File name for the scored-records CSV.
pub const SCORES_CSV_FILE_NAME: &str = "scores.csv";

/// File name for the per-group aggregation CSV.
pub const AGGREGATION_CSV_FILE_NAME: &str = "aggregated_results.csv";

/// Extension of every persisted result file.
pub const RESULTS_FILE_EXTENSION: &str = "json";

/// Joins the directory components of a log's path below the log root when
/// naming its per-result file.
pub const INDIVIDUAL_NAME_SEPARATOR: &str = "__";
