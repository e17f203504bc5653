use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use seq_retriever::app::App;
use seq_retriever::config::{ConfigLoader, RunRequest, SampleRequest};
use seq_retriever::domain::{JobId, PseudonymPair, SequencingYear};
use seq_retriever::error::RetrieveError;
use seq_retriever::job::ProgressSink;
use seq_retriever::notify::CompletionBus;
use seq_retriever::output::{
    ConsoleProgress, JsonOutput, OutputMode, print_batch_summary, print_locate_summary,
};
use seq_retriever::store::{DEFAULT_RETRIEVED_ROOT, DEFAULT_RUNS_ROOT, RetrievalStore};

#[derive(Parser)]
#[command(name = "seq-retrieve")]
#[command(about = "Retrieve sequencing runs and samples with pseudonyms replaced by real identifiers")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Root of the run archive (`<root>/20YY/<sequencer>/...`).
    #[arg(long, global = true)]
    runs_root: Option<Utf8PathBuf>,

    /// Folder retrieved copies are written to.
    #[arg(long, global = true)]
    retrieved_root: Option<Utf8PathBuf>,

    #[arg(long, global = true)]
    job_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Retrieve a whole sequencing run")]
    Run(RunArgs),
    #[command(about = "Retrieve a single sample folder")]
    Sample(SampleArgs),
    #[command(about = "Find the archived sample folder for a pseudonym")]
    Locate(LocateArgs),
    #[command(about = "Retrieve every run and sample listed in a job manifest")]
    Batch(BatchArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Run folder; located from the first pair's pseudonym when omitted.
    run_path: Option<Utf8PathBuf>,

    /// PSEUDONYM=REAL_ID, repeatable, applied in order.
    #[arg(long = "pair", required = true)]
    pairs: Vec<String>,

    /// Two-digit year or predictive number, used to locate the run.
    #[arg(long)]
    year: Option<String>,
}

#[derive(Args)]
struct SampleArgs {
    /// Sample folder; located from the pseudonym when omitted.
    sample_path: Option<Utf8PathBuf>,

    #[arg(long)]
    pair: String,

    #[arg(long)]
    year: Option<String>,
}

#[derive(Args)]
struct LocateArgs {
    pseudonym: String,

    /// Two-digit year or a predictive number ending in `-YY`.
    #[arg(long)]
    year: String,
}

#[derive(Args)]
struct BatchArgs {
    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<RetrieveError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &RetrieveError) -> u8 {
    match error {
        RetrieveError::DestinationExists(_)
        | RetrieveError::SourceNotFound(_)
        | RetrieveError::RunNotFound { .. }
        | RetrieveError::MissingConfig => 2,
        RetrieveError::CopyFailed { .. } | RetrieveError::RenameFailed { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let job_id = match cli.job_id.as_deref() {
        Some(value) => value.parse::<JobId>()?,
        None => JobId::generate(),
    };

    match cli.command {
        Commands::Batch(args) => {
            let resolved = ConfigLoader::resolve(args.config.as_deref())?;
            let store = build_store(
                cli.runs_root.or(resolved.runs_root.clone()),
                cli.retrieved_root.or(resolved.retrieved_root.clone()),
            );
            let app = App::new(store, CompletionBus::new());
            let sink = progress_sink(output_mode);
            // Runs and samples are separate jobs, each with its own completion.
            let both = !resolved.runs.is_empty() && !resolved.samples.is_empty();
            if !resolved.runs.is_empty() {
                let id = if both { suffixed(&job_id, "runs")? } else { job_id.clone() };
                let result = app.retrieve_runs(&resolved.runs, &id, sink)?;
                emit_batch(&result, output_mode)?;
            }
            if !resolved.samples.is_empty() {
                let id = if both { suffixed(&job_id, "samples")? } else { job_id.clone() };
                let result = app.retrieve_samples(&resolved.samples, &id, sink)?;
                emit_batch(&result, output_mode)?;
            }
            Ok(())
        }
        Commands::Run(args) => {
            let app = App::new(
                build_store(cli.runs_root, cli.retrieved_root),
                CompletionBus::new(),
            );
            let pairs = args
                .pairs
                .iter()
                .map(|value| value.parse::<PseudonymPair>())
                .collect::<Result<Vec<_>, _>>()?;
            let run_path = match args.run_path {
                Some(path) => path,
                None => {
                    let first = pairs
                        .first()
                        .ok_or_else(|| miette::Report::msg("at least one --pair is required"))?;
                    let year = resolve_year(args.year.as_deref(), &first.real_id)?;
                    let sample = app.store().locate_sample(&first.pseudonym, year)?;
                    RetrievalStore::run_root_of(&sample)?
                }
            };
            let sink = progress_sink(output_mode);
            let result = app.retrieve_runs(&[RunRequest { run_path, pairs }], &job_id, sink)?;
            emit_batch(&result, output_mode)
        }
        Commands::Sample(args) => {
            let app = App::new(
                build_store(cli.runs_root, cli.retrieved_root),
                CompletionBus::new(),
            );
            let pair = args.pair.parse::<PseudonymPair>()?;
            let path = match args.sample_path {
                Some(path) => path,
                None => {
                    let year = resolve_year(args.year.as_deref(), &pair.real_id)?;
                    app.store().locate_sample(&pair.pseudonym, year)?
                }
            };
            let sink = progress_sink(output_mode);
            let result = app.retrieve_samples(&[SampleRequest { path, pair }], &job_id, sink)?;
            emit_batch(&result, output_mode)
        }
        Commands::Locate(args) => {
            let app = App::new(
                build_store(cli.runs_root, cli.retrieved_root),
                CompletionBus::new(),
            );
            let year = args.year.parse::<SequencingYear>()?;
            let result = app.locate(&args.pseudonym, year, progress_sink(output_mode))?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_locate(&result).into_diagnostic(),
                OutputMode::Interactive => {
                    print_locate_summary(&result);
                    Ok(())
                }
            }
        }
    }
}

fn build_store(runs_root: Option<Utf8PathBuf>, retrieved_root: Option<Utf8PathBuf>) -> RetrievalStore {
    RetrievalStore::new(
        runs_root.unwrap_or_else(|| DEFAULT_RUNS_ROOT.into()),
        retrieved_root.unwrap_or_else(|| DEFAULT_RETRIEVED_ROOT.into()),
    )
}

/// The archive year comes from `--year` or, failing that, from the trailing
/// `-YY` of the real id (a predictive number).
fn resolve_year(year: Option<&str>, real_id: &str) -> Result<SequencingYear, RetrieveError> {
    year.unwrap_or(real_id).parse()
}

fn suffixed(job_id: &JobId, suffix: &str) -> Result<JobId, RetrieveError> {
    format!("{job_id}-{suffix}").parse()
}

fn progress_sink(output_mode: OutputMode) -> &'static dyn ProgressSink {
    match output_mode {
        OutputMode::Interactive => &ConsoleProgress,
        OutputMode::NonInteractive => &JsonOutput,
    }
}

fn emit_batch(
    result: &seq_retriever::app::BatchResult,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_batch(result).into_diagnostic(),
        OutputMode::Interactive => {
            print_batch_summary(result);
            Ok(())
        }
    }
}
