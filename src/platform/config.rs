// PerfSleuth - platform/config.rs
//
// Platform-specific config directory resolution and config.toml loading with
// startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::model::ProfileName;
use crate::core::recommend::{ScoreWeights, ScoringConfig};
use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for PerfSleuth configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/perfsleuth/ or %APPDATA%\PerfSleuth\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    /// Runs before logging is initialised; the caller logs the chosen path.
    pub fn resolve() -> Self {
        let config_dir = ProjectDirs::from("", "", constants::APP_ID)
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self { config_dir }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub discovery: DiscoverySection,
    pub extraction: ExtractionSection,
    pub pipeline: PipelineSection,
    pub scoring: ScoringSection,
    pub logging: LoggingSection,
}

/// `[discovery]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    pub max_depth: Option<usize>,
    pub max_files: Option<usize>,
    pub include_patterns: Option<Vec<String>>,
    pub exclude_patterns: Option<Vec<String>>,
}

/// `[extraction]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    /// Reject producer summaries whose percentiles decrease.
    pub strict_percentiles: Option<bool>,
    /// Files at or above this size are memory-mapped.
    pub large_file_threshold_bytes: Option<u64>,
}

/// `[pipeline]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Number of extraction worker threads (0 = auto).
    pub worker_threads: Option<usize>,
}

/// `[scoring.<profile>]` tables.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    pub max_throughput: Option<WeightsSection>,
    pub balanced: Option<WeightsSection>,
    pub low_latency: Option<WeightsSection>,
    pub durability: Option<WeightsSection>,
}

impl ScoringSection {
    fn get(&self, profile: ProfileName) -> Option<&WeightsSection> {
        match profile {
            ProfileName::MaxThroughput => self.max_throughput.as_ref(),
            ProfileName::Balanced => self.balanced.as_ref(),
            ProfileName::LowLatency => self.low_latency.as_ref(),
            ProfileName::Durability => self.durability.as_ref(),
        }
    }
}

/// One weight triple. Omitted weights keep the profile's default.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct WeightsSection {
    pub throughput: Option<f64>,
    pub latency: Option<f64>,
    pub consistency: Option<f64>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Discovery --
    pub max_depth: usize,
    pub max_files: usize,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,

    // -- Extraction --
    pub strict_percentiles: bool,
    pub large_file_threshold: u64,

    // -- Pipeline --
    /// 0 means one worker per core.
    pub worker_threads: usize,

    // -- Scoring --
    pub scoring: ScoringConfig,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_depth: constants::DEFAULT_MAX_DEPTH,
            max_files: constants::DEFAULT_MAX_FILES,
            include_patterns: constants::DEFAULT_INCLUDE_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            exclude_patterns: constants::DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            strict_percentiles: false,
            large_file_threshold: constants::DEFAULT_LARGE_FILE_THRESHOLD,
            worker_threads: constants::DEFAULT_WORKER_THREADS,
            scoring: ScoringConfig::default(),
            log_level: None,
        }
    }
}

/// Outcome of `load_config`.
///
/// Loading runs before logging is initialised, so nothing here is logged;
/// the caller reports `from_file` and `warnings` once tracing is up.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: AppConfig,
    /// Non-fatal problems; each affected value fell back to its default.
    pub warnings: Vec<ConfigError>,
    /// False when no config file existed and defaults were used.
    pub from_file: bool,
}

/// Load and validate the config file at `config_path`.
///
/// Collects every non-fatal problem found (out-of-range values, invalid
/// weight triples). A missing file is not an error: defaults, no warnings.
/// An unreadable or unparseable file is fatal.
pub fn load_config(config_path: &Path) -> Result<LoadedConfig, ConfigError> {
    let content = match std::fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LoadedConfig {
                config: AppConfig::default(),
                warnings: Vec::new(),
                from_file: false,
            });
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: config_path.to_path_buf(),
                source: e,
            })
        }
    };

    let raw: RawConfig = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
        path: config_path.to_path_buf(),
        source: e,
    })?;

    let (config, warnings) = validate(raw);

    Ok(LoadedConfig {
        config,
        warnings,
        from_file: true,
    })
}

/// Validate each field against named constants, accumulating all problems.
pub fn validate(raw: RawConfig) -> (AppConfig, Vec<ConfigError>) {
    let mut config = AppConfig::default();
    let mut warnings: Vec<ConfigError> = Vec::new();

    // -- Discovery: max_depth --
    if let Some(depth) = raw.discovery.max_depth {
        if (1..=constants::ABSOLUTE_MAX_DEPTH).contains(&depth) {
            config.max_depth = depth;
        } else {
            warnings.push(ConfigError::ValueOutOfRange {
                field: "discovery.max_depth".to_string(),
                value: depth.to_string(),
                expected: format!("1-{}", constants::ABSOLUTE_MAX_DEPTH),
            });
        }
    }

    // -- Discovery: max_files --
    if let Some(files) = raw.discovery.max_files {
        if (constants::MIN_MAX_FILES..=constants::ABSOLUTE_MAX_FILES).contains(&files) {
            config.max_files = files;
        } else {
            warnings.push(ConfigError::ValueOutOfRange {
                field: "discovery.max_files".to_string(),
                value: files.to_string(),
                expected: format!(
                    "{}-{}",
                    constants::MIN_MAX_FILES,
                    constants::ABSOLUTE_MAX_FILES
                ),
            });
        }
    }

    // -- Discovery: patterns --
    if let Some(patterns) = raw.discovery.include_patterns {
        config.include_patterns = patterns;
    }
    if let Some(patterns) = raw.discovery.exclude_patterns {
        config.exclude_patterns = patterns;
    }

    // -- Extraction --
    if let Some(strict) = raw.extraction.strict_percentiles {
        config.strict_percentiles = strict;
    }
    if let Some(threshold) = raw.extraction.large_file_threshold_bytes {
        if threshold >= constants::MIN_LARGE_FILE_THRESHOLD {
            config.large_file_threshold = threshold;
        } else {
            warnings.push(ConfigError::ValueOutOfRange {
                field: "extraction.large_file_threshold_bytes".to_string(),
                value: threshold.to_string(),
                expected: format!(">= {}", constants::MIN_LARGE_FILE_THRESHOLD),
            });
        }
    }

    // -- Pipeline: worker_threads --
    if let Some(threads) = raw.pipeline.worker_threads {
        if threads <= constants::MAX_WORKER_THREADS {
            config.worker_threads = threads;
        } else {
            warnings.push(ConfigError::ValueOutOfRange {
                field: "pipeline.worker_threads".to_string(),
                value: threads.to_string(),
                expected: format!("0-{}", constants::MAX_WORKER_THREADS),
            });
        }
    }

    // -- Scoring: one weight triple per profile --
    for profile in ProfileName::all() {
        let Some(section) = raw.scoring.get(*profile) else {
            continue;
        };
        let defaults = config.scoring.weights(*profile);
        let weights = ScoreWeights::new(
            section.throughput.unwrap_or(defaults.throughput),
            section.latency.unwrap_or(defaults.latency),
            section.consistency.unwrap_or(defaults.consistency),
        );
        if weights.is_valid() {
            config.scoring.set_weights(*profile, weights);
        } else {
            warnings.push(ConfigError::InvalidWeights {
                profile: profile.key().to_string(),
                sum: weights.sum(),
            });
        }
    }

    // -- Logging: level --
    if let Some(level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level);
        } else {
            warnings.push(ConfigError::ValueOutOfRange {
                field: "logging.level".to_string(),
                value: level,
                expected: "error, warn, info, debug, trace".to_string(),
            });
        }
    }

    (config, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn load_str(toml_text: &str) -> (AppConfig, Vec<ConfigError>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(constants::CONFIG_FILE_NAME);
        fs::write(&path, toml_text).unwrap();
        let loaded = load_config(&path).unwrap();
        assert!(loaded.from_file);
        (loaded.config, loaded.warnings)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(&dir.path().join("absent.toml")).unwrap();
        assert!(!loaded.from_file);
        assert!(loaded.warnings.is_empty());
        let config = loaded.config;
        assert_eq!(config.max_files, constants::DEFAULT_MAX_FILES);
        assert_eq!(config.scoring, ScoringConfig::default());
        assert!(!config.strict_percentiles);
    }

    #[test]
    fn test_valid_values_applied() {
        let (config, warnings) = load_str(
            r#"
            [discovery]
            max_depth = 3
            include_patterns = ["*.log", "*.txt"]

            [extraction]
            strict_percentiles = true

            [pipeline]
            worker_threads = 4

            [scoring.balanced]
            throughput = 0.5
            latency = 0.3
            consistency = 0.2

            [logging]
            level = "debug"
            "#,
        );
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.include_patterns, vec!["*.log", "*.txt"]);
        assert!(config.strict_percentiles);
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.scoring.balanced, ScoreWeights::new(0.5, 0.3, 0.2));
        assert_eq!(config.scoring.low_latency, ScoringConfig::default().low_latency);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_out_of_range_values_fall_back_with_warnings() {
        let (config, warnings) = load_str(
            r#"
            [discovery]
            max_depth = 0
            max_files = 999999999

            [pipeline]
            worker_threads = 100000

            [logging]
            level = "chatty"
            "#,
        );
        assert_eq!(warnings.len(), 4);
        assert!(warnings
            .iter()
            .all(|w| matches!(w, ConfigError::ValueOutOfRange { .. })));
        assert_eq!(config.max_depth, constants::DEFAULT_MAX_DEPTH);
        assert_eq!(config.max_files, constants::DEFAULT_MAX_FILES);
        assert_eq!(config.worker_threads, constants::DEFAULT_WORKER_THREADS);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let (config, warnings) = load_str(
            r#"
            [scoring.max_throughput]
            throughput = 0.9
            "#,
        );
        assert_eq!(warnings.len(), 1);
        match &warnings[0] {
            ConfigError::InvalidWeights { profile, sum } => {
                assert_eq!(profile, "max_throughput");
                assert!((sum - 1.2).abs() < 1e-9);
            }
            other => panic!("unexpected warning: {other:?}"),
        }
        assert_eq!(config.scoring.max_throughput, ScoringConfig::default().max_throughput);
    }

    #[test]
    fn test_unparseable_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(constants::CONFIG_FILE_NAME);
        fs::write(&path, "[discovery\nmax_depth = ").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::TomlParse { .. })
        ));
    }
}
