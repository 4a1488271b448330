mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use covgate::verdict::{BuildStatus, CommentSettings};
use covgate::CoverageCheckSettings;

/// covgate: merge coverage reports and gate builds on coverage changes.
#[derive(Parser)]
#[command(name = "covgate", version, about)]
struct Cli {
    /// Log debug output (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge reports, compare with the baseline and print the verdict.
    Check(CheckArgs),

    /// Print the per-line coverage string of each file.
    Encode {
        /// Cobertura or JaCoCo XML reports.
        #[arg(required = true)]
        reports: Vec<PathBuf>,

        /// A file touched by the change (repeatable).
        #[arg(long = "changed-file")]
        changed_files: Vec<String>,

        /// Include files outside the change.
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args)]
struct CheckArgs {
    /// Cobertura or JaCoCo XML reports.
    #[arg(required = true)]
    reports: Vec<PathBuf>,

    /// A file touched by the change (repeatable).
    #[arg(long = "changed-file")]
    changed_files: Vec<String>,

    /// File listing changed files, one per line.
    #[arg(long)]
    changed_files_from: Option<PathBuf>,

    /// Skip reports that fail to parse instead of aborting.
    #[arg(long)]
    skip_malformed: bool,

    /// JSON file holding baseline coverage by commit.
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Commit whose coverage is the baseline.
    #[arg(long)]
    parent_commit: Option<String>,

    /// Branch being merged, named in the comparison message.
    #[arg(long)]
    branch: Option<String>,

    /// JSON file with coverage check settings.
    #[arg(long, conflicts_with = "check_coverage")]
    settings: Option<PathBuf>,

    /// Fail the build when coverage drops too far below the floor.
    #[arg(long)]
    check_coverage: bool,

    /// Largest allowed drop in line coverage (negative percentage points).
    #[arg(long, default_value_t = -10.0, allow_negative_numbers = true)]
    max_decrease: f64,

    /// Line coverage floor in percent.
    #[arg(long, default_value_t = 0.0)]
    min_coverage: f64,

    /// Terminal status of the build (success, unstable, failure, aborted).
    #[arg(long, default_value = "success")]
    build_status: String,

    /// Report a green build even when there is nothing else to say.
    #[arg(long)]
    comment_on_success: bool,

    /// Link to the build console when the build fails.
    #[arg(long, requires = "build_url")]
    console_link_on_failure: bool,

    /// URL of the build, used for console links.
    #[arg(long)]
    build_url: Option<String>,

    /// Print machine-readable JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check(args) => run_check(args),
        Commands::Encode {
            reports,
            changed_files,
            all,
        } => {
            print!("{}", cli::cmd_encode(&reports, &changed_files, all)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_check(args: CheckArgs) -> Result<ExitCode> {
    let settings = match &args.settings {
        Some(path) => Some(cli::load_settings(path)?),
        None if args.check_coverage => Some(CoverageCheckSettings::new(
            args.max_decrease,
            args.min_coverage,
        )),
        None => None,
    };

    let build_status = match args.build_status.parse::<BuildStatus>() {
        Ok(status) => status,
        Err(never) => match never {},
    };

    let opts = cli::CheckOptions {
        reports: args.reports,
        changed_files: args.changed_files,
        changed_files_from: args.changed_files_from,
        skip_malformed: args.skip_malformed,
        baseline: args.baseline,
        parent_commit: args.parent_commit,
        branch: args.branch,
        settings,
        build_status,
        comments: CommentSettings {
            comment_on_success: args.comment_on_success,
            console_link_on_failure: args.console_link_on_failure,
            build_url: args.build_url,
        },
        json: args.json,
    };

    let output = cli::cmd_check(&opts)?;
    print!("{}", output.text);

    Ok(if output.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
