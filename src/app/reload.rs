// PerfSleuth - app/reload.rs
//
// Reads previously written result files back into memory so several batches
// can be ranked and aggregated together.
//
// Every `*.json` file directly inside the directory is read in name order.
// A file holds either a JSON array of results or a single result object.
// Files that fail to parse are skipped with a warning; the report files this
// crate writes alongside results are skipped silently.

use crate::core::model::PerfResult;
use crate::platform::fs;
use crate::util::constants::{AGGREGATION_FILE_NAME, RECOMMENDATIONS_FILE_NAME, RESULTS_FILE_EXTENSION};
use crate::util::error::DiscoveryError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a result file may contain.
#[derive(Deserialize)]
#[serde(untagged)]
enum Persisted {
    Many(Vec<PerfResult>),
    One(Box<PerfResult>),
}

impl Persisted {
    fn into_vec(self) -> Vec<PerfResult> {
        match self {
            Persisted::Many(results) => results,
            Persisted::One(result) => vec![*result],
        }
    }
}

/// Results read back from a directory.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// Every result, in file name order then in-file order.
    pub results: Vec<PerfResult>,
    /// Result files that were parsed.
    pub files_loaded: usize,
    /// One message per skipped file.
    pub warnings: Vec<String>,
}

fn result_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(RESULTS_FILE_EXTENSION))
        })
        .filter(|p| {
            p.file_name().is_some_and(|n| {
                n != RECOMMENDATIONS_FILE_NAME && n != AGGREGATION_FILE_NAME
            })
        })
        .collect();
    files.sort();
    files
}

/// Load every result file directly inside `dir`.
///
/// Fails only when `dir` is missing or not a directory. A directory with no
/// result files yields an empty outcome.
pub fn load_results(dir: &Path) -> Result<LoadOutcome, DiscoveryError> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(DiscoveryError::NotADirectory {
                path: dir.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DiscoveryError::PermissionDenied {
                path: dir.to_path_buf(),
                source: e,
            })
        }
        Err(_) => {
            return Err(DiscoveryError::RootNotFound {
                path: dir.to_path_buf(),
            })
        }
    }

    let files = result_files(dir);
    let mut outcome = LoadOutcome::default();

    if files.is_empty() {
        tracing::warn!(dir = %dir.display(), "No result files found");
        return Ok(outcome);
    }

    for path in files {
        let content = match fs::read_file_content(&path, false) {
            Ok(c) => c,
            Err(e) => {
                outcome
                    .warnings
                    .push(format!("Cannot read '{}': {e}", path.display()));
                continue;
            }
        };

        match serde_json::from_str::<Persisted>(&content) {
            Ok(persisted) => {
                let mut results = persisted.into_vec();
                tracing::debug!(
                    file = %path.display(),
                    results = results.len(),
                    "Loaded result file"
                );
                outcome.results.append(&mut results);
                outcome.files_loaded += 1;
            }
            Err(e) => {
                let msg = format!("'{}' is not a result file: {e}", path.display());
                tracing::warn!(warning = %msg, "Skipping file");
                outcome.warnings.push(msg);
            }
        }
    }

    tracing::info!(
        dir = %dir.display(),
        files = outcome.files_loaded,
        results = outcome.results.len(),
        skipped = outcome.warnings.len(),
        "Result files loaded"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extractor::extract;
    use std::fs as stdfs;

    const PRODUCER: &str = "\
1000 records sent, 100.0 records/sec (0.10 MB/sec), 5.0 ms avg latency, 9.0 ms max latency, 4 ms 50th, 8 ms 95th, 9 ms 99th, 9 ms 99.9th.
";

    fn result(name: &str) -> PerfResult {
        extract(Path::new(name), PRODUCER).unwrap()
    }

    #[test]
    fn test_reads_arrays_and_single_objects_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let batch = vec![result("producer_a_acks_1.log"), result("producer_b_acks_all.log")];
        stdfs::write(
            dir.path().join("b_batch.json"),
            serde_json::to_string(&batch).unwrap(),
        )
        .unwrap();
        stdfs::write(
            dir.path().join("a_single.json"),
            serde_json::to_string(&result("producer_c_acks_0.log")).unwrap(),
        )
        .unwrap();

        let outcome = load_results(dir.path()).unwrap();
        assert_eq!(outcome.files_loaded, 2);
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);

        let acks: Vec<_> = outcome
            .results
            .iter()
            .map(|r| r.configuration["acks"].as_str())
            .collect();
        assert_eq!(acks, ["0", "1", "all"]);
        assert!(outcome.results.iter().all(PerfResult::is_usable));
    }

    #[test]
    fn test_skips_reports_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        stdfs::write(
            dir.path().join("run.json"),
            serde_json::to_string(&vec![result("producer_a.log")]).unwrap(),
        )
        .unwrap();
        stdfs::write(dir.path().join(RECOMMENDATIONS_FILE_NAME), "{\"producer\": {}}").unwrap();
        stdfs::write(dir.path().join(AGGREGATION_FILE_NAME), "{}").unwrap();
        stdfs::write(dir.path().join("notes.json"), "{\"hello\": 1}").unwrap();
        stdfs::write(dir.path().join("readme.txt"), "not json").unwrap();

        let outcome = load_results(dir.path()).unwrap();
        assert_eq!(outcome.files_loaded, 1);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("notes.json"));
    }

    #[test]
    fn test_empty_and_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = load_results(dir.path()).unwrap();
        assert!(outcome.results.is_empty());

        assert!(matches!(
            load_results(&dir.path().join("absent")),
            Err(DiscoveryError::RootNotFound { .. })
        ));
    }
}
