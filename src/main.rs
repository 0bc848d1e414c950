// PerfSleuth - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. Configuration loading and logging initialisation
// 3. Running the batch pipeline over a log directory
// 4. Writing outputs and printing a summary

use perfsleuth::app::output::{self, OutputOptions};
use perfsleuth::app::pipeline::{self, PipelineConfig, PipelineReport};
use perfsleuth::core::model::{Recommendation, RecommendationSet, TestType};
use perfsleuth::platform::config::{self, PlatformPaths};
use perfsleuth::util;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

/// PerfSleuth - Producer/consumer benchmark log analyser.
///
/// Point PerfSleuth at a directory of benchmark logs to extract structured
/// results, score every run against its peers and recommend configurations
/// for throughput, latency, durability and balance. With `--from-json` the
/// directory holds result files from earlier runs instead, which are ranked
/// and aggregated together.
#[derive(Parser, Debug)]
#[command(name = "perfsleuth", version, about)]
struct Cli {
    /// Directory containing benchmark log files (or result JSON files with
    /// --from-json).
    log_dir: PathBuf,

    /// Read previously written result JSON files instead of log files.
    #[arg(long = "from-json")]
    from_json: bool,

    /// Output directory for results.
    #[arg(short = 'o', long = "output-dir", default_value = util::constants::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Config file (defaults to the platform config directory).
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Also write one JSON file per parsed log.
    #[arg(long)]
    individual: bool,

    /// Also write a CSV of scored results.
    #[arg(long)]
    csv: bool,

    /// Also write a CSV with one row per configuration group.
    #[arg(long = "aggregate-csv")]
    aggregate_csv: bool,

    /// Name of the combined results file (timestamped by default).
    #[arg(long = "output-file")]
    output_file: Option<String>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PlatformPaths::resolve().config_file());

    // Config is loaded before tracing exists; problems are logged after init.
    let loaded = match config::load_config(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            util::logging::init(cli.debug, None);
            tracing::error!(error = %e, "Configuration rejected");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    util::logging::init(cli.debug, loaded.config.log_level.as_deref());

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        "PerfSleuth starting"
    );

    if loaded.from_file {
        tracing::info!(path = %config_path.display(), "Loaded config.toml");
    } else {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
    }

    for warning in &loaded.warnings {
        tracing::warn!(warning = %warning, "Config value ignored");
    }

    let pipeline_config = PipelineConfig::from(&loaded.config);

    let outcome = if cli.from_json {
        pipeline::run_persisted(&cli.log_dir, &pipeline_config)
    } else {
        let cancel = AtomicBool::new(false);
        pipeline::run(&cli.log_dir, &pipeline_config, &cancel)
    };

    let report = match outcome {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "Batch failed");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    for warning in &report.batch.warnings {
        tracing::warn!(warning = %warning, "Skipped");
    }

    let options = OutputOptions {
        individual: cli.individual,
        csv: cli.csv,
        aggregation_csv: cli.aggregate_csv,
        results_file_name: cli.output_file.clone(),
    };

    let written = match output::write_outputs(&report, &cli.output_dir, &options) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e, "Writing outputs failed");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    print_summary(&report, &written);

    if report.batch.results.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_pick(title: &str, pick: &Option<Recommendation>) {
    match pick {
        Some(p) => println!(
            "  {title:<18} {} (score {:.2})",
            p.record.result.label(),
            p.score
        ),
        None => println!("  {title:<18} n/a"),
    }
}

fn print_set(set: &RecommendationSet) {
    print_pick("Best throughput:", &set.best_throughput);
    print_pick("Best latency:", &set.best_latency);
    print_pick("Balanced:", &set.balanced);
    print_pick("Low latency:", &set.low_latency_pick);
    print_pick("Max throughput:", &set.max_throughput_pick);
    print_pick("Durability:", &set.durability_pick);
}

fn print_summary(report: &PipelineReport, written: &[PathBuf]) {
    let s = &report.batch.summary;
    println!(
        "{} v{}",
        util::constants::APP_NAME,
        util::constants::APP_VERSION
    );
    println!(
        "Files: {}  Results: {} ({} producer, {} consumer)  Usable: {}  Skipped: {}",
        s.total_files,
        s.results,
        s.producer_results,
        s.consumer_results,
        s.usable,
        s.unclassified + s.unreadable,
    );

    for test_type in TestType::all() {
        println!();
        println!("{} recommendations:", test_type.label());
        match report.recommendations.get(*test_type) {
            Ok(set) => print_set(set),
            Err(e) => println!("  {e}"),
        }
    }

    println!();
    for path in written {
        println!("Wrote {}", path.display());
    }
}
