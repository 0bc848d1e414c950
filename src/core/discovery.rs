// PerfSleuth - core/discovery.rs
//
// Recursive directory traversal and benchmark log discovery.
//
// Uses `walkdir` for traversal as an OS abstraction. Reads only file
// metadata (size), never file contents; reading belongs to the app layer
// (app::pipeline).
//
//   - Per-entry I/O errors are non-fatal and collected as warnings.
//   - max_files and max_depth are clamped to named-constant upper bounds.
//   - Exclude patterns short-circuit directory descent via filter_entry so
//     excluded subtrees (e.g. .git/) are never traversed at all.
//   - The returned list is sorted by path so every batch over the same
//     directory sees the same input order.

use crate::util::constants;
use crate::util::error::DiscoveryError;
use std::path::{Path, PathBuf};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a discovery operation.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum directory recursion depth.
    pub max_depth: usize,

    /// Maximum number of matching files to return.
    pub max_files: usize,

    /// Glob patterns (filename-only) that a file MUST match to be included.
    /// An empty list means "include everything that is not excluded".
    pub include_patterns: Vec<String>,

    /// Glob patterns matched against filenames AND directory component names.
    /// Matching files are skipped; matching directories are not descended into.
    pub exclude_patterns: Vec<String>,

    /// File size (bytes) at or above which the `is_large` flag is set.
    pub large_file_threshold: u64,
}

impl Default for DiscoveryConfig {
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
            large_file_threshold: constants::DEFAULT_LARGE_FILE_THRESHOLD,
        }
    }
}

/// A log file found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size: u64,
    /// Read through a memory map instead of into a buffer.
    pub is_large: bool,
}

/// Files accepted by discovery plus the non-fatal problems met on the way.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOutcome {
    pub files: Vec<DiscoveredFile>,
    pub warnings: Vec<String>,
    /// Matching files found before the max-files limit was applied.
    pub total_found: usize,
}

// =============================================================================
// Discovery
// =============================================================================

/// Discover log files under `root`, applying include/exclude glob patterns.
///
/// # Non-fatal errors
/// Files/directories that cannot be accessed are recorded as human-readable
/// strings in `warnings` and do NOT cause the function to return `Err`.
///
/// # Fatal errors
/// Returns `Err` only if the root path is invalid (`RootNotFound`,
/// `NotADirectory`, `PermissionDenied`).
pub fn discover_files(
    root: &Path,
    config: &DiscoveryConfig,
) -> Result<DiscoveryOutcome, DiscoveryError> {
    // `fs::metadata()` rather than `Path::is_dir()`: the latter maps
    // PermissionDenied to `false`.
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(DiscoveryError::NotADirectory {
                path: root.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DiscoveryError::PermissionDenied {
                path: root.to_path_buf(),
                source: e,
            })
        }
        Err(_) => {
            return Err(DiscoveryError::RootNotFound {
                path: root.to_path_buf(),
            })
        }
    }

    let max_files = config.max_files.min(constants::ABSOLUTE_MAX_FILES);
    let max_depth = config.max_depth.min(constants::ABSOLUTE_MAX_DEPTH);

    tracing::debug!(
        root = %root.display(),
        max_depth,
        max_files,
        include = ?config.include_patterns,
        exclude = ?config.exclude_patterns,
        "Discovery starting"
    );

    let include_pats = compile_patterns(&config.include_patterns, "include");
    let exclude_pats = compile_patterns(&config.exclude_patterns, "exclude");

    let mut files: Vec<DiscoveredFile> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    let walker = walkdir::WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            // Wildcard patterns (e.g. "*.bak") are only tested against filenames.
            if e.file_type().is_dir() && e.depth() > 0 {
                let name = e.file_name().to_str().unwrap_or("");
                return !is_excluded_component(name, &exclude_pats);
            }
            true
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                let path_str = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                let msg = format!("Cannot access '{path_str}': {e}");
                tracing::debug!(warning = %msg, "Discovery warning");
                warnings.push(msg);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();

        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => {
                warnings.push(format!("Skipping '{}': non-UTF-8 filename", path.display()));
                continue;
            }
        };

        if is_excluded_filename(file_name, &exclude_pats) {
            tracing::trace!(file = file_name, "Excluded by pattern");
            continue;
        }

        if !is_included(file_name, &include_pats) {
            tracing::trace!(file = file_name, "Not matched by include patterns");
            continue;
        }

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                let msg = format!("Cannot read metadata for '{}': {e}", path.display());
                tracing::debug!(warning = %msg, "Discovery warning");
                warnings.push(msg);
                continue;
            }
        };

        files.push(DiscoveredFile {
            path: path.to_path_buf(),
            size,
            is_large: size >= config.large_file_threshold,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    let total_found = files.len();

    if total_found > max_files {
        files.truncate(max_files);

        warnings.push(format!(
            "{total_found} log files were found but the limit is {max_files}. \
             Only the first {max_files} in path order will be processed. \
             Raise [discovery] max_files if you need more."
        ));

        tracing::warn!(
            total_found,
            limit = max_files,
            "File list truncated to max_files"
        );
    }

    tracing::debug!(
        total_found,
        files_loaded = files.len(),
        warnings = warnings.len(),
        "Discovery complete"
    );

    Ok(DiscoveryOutcome {
        files,
        warnings,
        total_found,
    })
}

// =============================================================================
// Glob helpers
// =============================================================================

/// Compile a list of glob pattern strings into `glob::Pattern` objects.
/// Patterns that fail to compile are logged as warnings and skipped.
fn compile_patterns(patterns: &[String], kind: &str) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                tracing::warn!(pattern = p, kind, error = %e, "Invalid glob pattern, skipping");
                None
            }
        })
        .collect()
}

/// Returns true if `dir_name` matches any exclude pattern that contains no
/// wildcard characters (e.g. ".git").
fn is_excluded_component(dir_name: &str, exclude_pats: &[glob::Pattern]) -> bool {
    exclude_pats.iter().any(|p| {
        let s = p.as_str();
        !s.contains('*') && !s.contains('?') && !s.contains('[') && p.matches(dir_name)
    })
}

/// Returns true if `file_name` matches any exclude pattern (wildcard or literal).
fn is_excluded_filename(file_name: &str, exclude_pats: &[glob::Pattern]) -> bool {
    exclude_pats.iter().any(|p| p.matches(file_name))
}

/// Returns true if `file_name` matches at least one include pattern.
/// An empty include list means "include all".
fn is_included(file_name: &str, include_pats: &[glob::Pattern]) -> bool {
    if include_pats.is_empty() {
        return true;
    }
    include_pats.iter().any(|p| p.matches(file_name))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_temp_tree() -> TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        fs::write(root.join("producer_baseline_acks_1.log"), "# header\n")
            .expect("write producer log");
        fs::write(root.join("consumer_fetch_fetch_min_bytes_1.log"), "# header\n")
            .expect("write consumer log");
        fs::write(root.join("readme.txt"), "Just a readme\n").expect("write readme.txt");

        // Excluded by filename pattern
        fs::write(root.join("producer_old.log.gz"), "binary").expect("write .gz");

        let sub = root.join("run2");
        fs::create_dir(&sub).expect("mkdir run2");
        fs::write(sub.join("producer_baseline_acks_all.log"), "# header\n")
            .expect("write nested log");

        // Excluded directory
        let git = root.join(".git");
        fs::create_dir(&git).expect("mkdir .git");
        fs::write(git.join("producer_hidden.log"), "should be excluded\n")
            .expect("write hidden log");

        dir
    }

    fn names(outcome: &DiscoveryOutcome) -> Vec<String> {
        outcome
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_discovers_log_files() {
        let dir = make_temp_tree();
        let outcome = discover_files(dir.path(), &DiscoveryConfig::default()).unwrap();
        let paths = names(&outcome);

        assert_eq!(paths.len(), 3, "got {paths:?}");
        assert!(paths.contains(&"producer_baseline_acks_1.log".to_string()));
        assert!(paths.contains(&"producer_baseline_acks_all.log".to_string()));
        assert!(!paths.contains(&"readme.txt".to_string()));
        assert!(!paths.contains(&"producer_old.log.gz".to_string()));
        assert!(
            !paths.contains(&"producer_hidden.log".to_string()),
            ".git should be excluded"
        );
        assert!(outcome.warnings.is_empty(), "unexpected warnings: {:?}", outcome.warnings);
    }

    #[test]
    fn test_results_sorted_by_path() {
        let dir = make_temp_tree();
        let outcome = discover_files(dir.path(), &DiscoveryConfig::default()).unwrap();
        let mut sorted = outcome.files.clone();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(outcome.files, sorted);
    }

    #[test]
    fn test_max_depth_1_excludes_subdirs() {
        let dir = make_temp_tree();
        let config = DiscoveryConfig {
            max_depth: 1,
            ..Default::default()
        };
        let outcome = discover_files(dir.path(), &config).unwrap();
        assert!(!names(&outcome).contains(&"producer_baseline_acks_all.log".to_string()));
    }

    #[test]
    fn test_max_files_truncates_gracefully() {
        let dir = make_temp_tree();
        let config = DiscoveryConfig {
            max_files: 2,
            ..Default::default()
        };
        let outcome = discover_files(dir.path(), &config).unwrap();
        assert_eq!(outcome.files.len(), 2);
        assert_eq!(outcome.total_found, 3);
        let warning_text = outcome.warnings.join(" ");
        assert!(
            warning_text.contains('3') && warning_text.contains('2'),
            "warning should mention total and limit, got: {warning_text}"
        );
    }

    #[test]
    fn test_root_not_found() {
        let result = discover_files(
            Path::new("/nonexistent/path/perfsleuth"),
            &DiscoveryConfig::default(),
        );
        assert!(matches!(result, Err(DiscoveryError::RootNotFound { .. })));
    }

    #[test]
    fn test_root_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("producer_x.log");
        fs::write(&file, "content").unwrap();
        let result = discover_files(&file, &DiscoveryConfig::default());
        assert!(matches!(result, Err(DiscoveryError::NotADirectory { .. })));
    }

    #[test]
    fn test_is_large_flag() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("producer_tiny.log"), "x").unwrap();

        let small = discover_files(dir.path(), &DiscoveryConfig::default()).unwrap();
        assert!(!small.files[0].is_large);
        assert_eq!(small.files[0].size, 1);

        let config = DiscoveryConfig {
            large_file_threshold: 0,
            ..Default::default()
        };
        let large = discover_files(dir.path(), &config).unwrap();
        assert!(large.files[0].is_large);
    }
}
