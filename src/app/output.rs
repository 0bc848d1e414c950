// PerfSleuth - app/output.rs
//
// Writes a finished pipeline report to the output directory.
// Owns file creation; serialisation lives in core::export.

use crate::app::pipeline::PipelineReport;
use crate::core::export;
use crate::core::model::{ScoredResult, TestType};
use crate::platform::fs;
use crate::util::constants;
use crate::util::error::{ExportError, PerfSleuthError};
use chrono::Utc;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Which optional outputs to write.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Also write one JSON file per result.
    pub individual: bool,
    /// Also write a CSV of scored records.
    pub csv: bool,
    /// Also write a CSV with one row per configuration group.
    pub aggregation_csv: bool,
    /// Name of the combined results file; timestamped when `None`.
    pub results_file_name: Option<String>,
}

fn open(path: &Path) -> Result<impl Write, ExportError> {
    fs::create_output_file(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `name`, or `name` with `_2`, `_3`, ... before the extension when an
/// earlier result already took it.
fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name.as_str(), ""));
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}.{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn finish<W: Write>(mut writer: W, path: &Path) -> Result<(), ExportError> {
    writer.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the combined results, recommendations and aggregation files, plus
/// whichever optional outputs `options` asks for.
///
/// Returns every path written, in write order.
pub fn write_outputs(
    report: &PipelineReport,
    out_dir: &Path,
    options: &OutputOptions,
) -> Result<Vec<PathBuf>, PerfSleuthError> {
    let mut written = Vec::new();
    let results = &report.batch.results;

    let results_name = options
        .results_file_name
        .clone()
        .unwrap_or_else(|| export::results_file_name(Utc::now()));
    let path = out_dir.join(results_name);
    let mut w = open(&path)?;
    export::export_results_json(results, &mut w, &path)?;
    finish(w, &path)?;
    written.push(path);

    if options.individual {
        let mut taken = HashSet::new();
        for result in results {
            let name = export::individual_file_name(result, &report.root);
            let path = out_dir.join(unique_name(name, &mut taken));
            let mut w = open(&path)?;
            export::export_result_json(result, &mut w, &path)?;
            finish(w, &path)?;
            written.push(path);
        }
    }

    let path = out_dir.join(constants::RECOMMENDATIONS_FILE_NAME);
    let mut w = open(&path)?;
    export::export_recommendations_json(&report.recommendations, &mut w, &path)?;
    finish(w, &path)?;
    written.push(path);

    let path = out_dir.join(constants::AGGREGATION_FILE_NAME);
    let mut w = open(&path)?;
    export::export_aggregation_json(&report.aggregation, &mut w, &path)?;
    finish(w, &path)?;
    written.push(path);

    if options.aggregation_csv {
        let path = out_dir.join(constants::AGGREGATION_CSV_FILE_NAME);
        let mut w = open(&path)?;
        export::export_aggregation_csv(&report.aggregation, &mut w, &path)?;
        finish(w, &path)?;
        written.push(path);
    }

    if options.csv {
        let scored: Vec<ScoredResult> = TestType::all()
            .iter()
            .filter_map(|t| report.recommendations.get(*t).as_ref().ok())
            .flat_map(|set| set.scored.iter().cloned())
            .collect();
        let path = out_dir.join(constants::SCORES_CSV_FILE_NAME);
        let mut w = open(&path)?;
        export::export_scores_csv(&scored, &mut w, &path)?;
        finish(w, &path)?;
        written.push(path);
    }

    tracing::info!(
        out_dir = %out_dir.display(),
        files = written.len(),
        "Outputs written"
    );

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name_suffixes_repeats() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("run.json".to_string(), &mut taken), "run.json");
        assert_eq!(unique_name("run.json".to_string(), &mut taken), "run_2.json");
        assert_eq!(unique_name("run.json".to_string(), &mut taken), "run_3.json");
        assert_eq!(unique_name("other.json".to_string(), &mut taken), "other.json");
    }
}
