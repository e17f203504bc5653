use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info};

use crate::copier::copy_tree;
use crate::domain::{JobId, RenameJob, RetrievalMode, validate_token_set};
use crate::error::RetrieveError;
use crate::notify::{CompletionNotifier, finished_message};
use crate::renamer::rename_tree;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Forwards progress to the `tracing` subscriber; used by background workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub mode: RetrievalMode,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub files_copied: usize,
    pub fastq_aggregated: usize,
    pub fastq_overwritten: usize,
    pub renamed: usize,
    pub contents_rewritten: usize,
    pub content_skipped: Vec<PathBuf>,
    pub finished_at: String,
}

/// Checks a job can start: a usable, unambiguous pair set, an existing source
/// and a free destination.
///
/// A full run may carry no pairs at all; it is copied and aggregated but no
/// name changes. A sample needs its pair.
pub fn admit(job: &RenameJob) -> Result<(), RetrieveError> {
    if job.pairs.is_empty() && !job.mode.is_full_run() {
        return Err(RetrieveError::InvalidPair(
            "a sample retrieval needs its pseudonym pair".to_string(),
        ));
    }
    validate_token_set(&job.pairs)?;
    if !job.source.is_dir() {
        return Err(RetrieveError::SourceNotFound(job.source.clone()));
    }
    if job.destination.symlink_metadata().is_ok() {
        return Err(RetrieveError::DestinationExists(job.destination.clone()));
    }
    Ok(())
}

/// Copies and renames one job without signalling completion.
pub fn process(job: &RenameJob, sink: &dyn ProgressSink) -> Result<JobReport, RetrieveError> {
    admit(job)?;

    sink.event(ProgressEvent {
        message: format!("phase=Copy; {} -> {}", job.source.display(), job.destination.display()),
        elapsed: None,
    });
    let start = Instant::now();
    let copy = copy_tree(&job.source, &job.destination, job.mode)?;
    sink.event(ProgressEvent {
        message: format!("phase=Copy; {} files copied", copy.files_copied),
        elapsed: Some(start.elapsed()),
    });

    sink.event(ProgressEvent {
        message: format!("phase=Rename; applying {} pair(s)", job.pairs.len()),
        elapsed: None,
    });
    let start = Instant::now();
    let rename = rename_tree(&job.destination, &job.pairs, job.mode, &job.job_id)?;
    sink.event(ProgressEvent {
        message: format!("phase=Rename; {} names replaced", rename.renamed),
        elapsed: Some(start.elapsed()),
    });

    Ok(JobReport {
        job_id: job.job_id.to_string(),
        mode: job.mode,
        source: job.source.clone(),
        destination: rename.root,
        files_copied: copy.files_copied,
        fastq_aggregated: copy.fastq_aggregated,
        fastq_overwritten: copy.fastq_overwritten,
        renamed: rename.renamed,
        contents_rewritten: rename.contents_rewritten,
        content_skipped: rename.content_skipped,
        finished_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Signals the outcome of a job on its completion channel: the finished
/// message on success, a silent close on failure.
pub fn finish<T, N: CompletionNotifier + ?Sized>(
    job_id: &JobId,
    result: Result<T, RetrieveError>,
    notifier: &N,
) -> Result<T, RetrieveError> {
    match &result {
        Ok(_) => {
            info!(job_id = %job_id, "job finished");
            notifier.publish(job_id, &finished_message(job_id));
        }
        Err(err) => {
            error!(job_id = %job_id, error = %err, "job failed");
            notifier.close(job_id);
        }
    }
    result
}

pub fn execute<N: CompletionNotifier + ?Sized>(
    job: &RenameJob,
    notifier: &N,
    sink: &dyn ProgressSink,
) -> Result<JobReport, RetrieveError> {
    finish(&job.job_id, process(job, sink), notifier)
}

/// Fire-and-forget entry point for the job layer.
///
/// Pair lists are zipped and the job admitted before spawning, so malformed
/// requests are rejected synchronously. A rejected job still closes its
/// completion channel. Everything else runs on a worker thread whose only
/// outward signal is the completion channel.
pub fn run_copy_job<N>(
    source: impl Into<PathBuf>,
    destination: impl Into<PathBuf>,
    pseudonym_tokens: &[String],
    real_id_tokens: &[String],
    mode: RetrievalMode,
    job_id: JobId,
    notifier: N,
) -> Result<JoinHandle<Result<JobReport, RetrieveError>>, RetrieveError>
where
    N: CompletionNotifier + 'static,
{
    let admitted = RenameJob::from_lists(
        source,
        destination,
        pseudonym_tokens,
        real_id_tokens,
        mode,
        job_id.clone(),
    )
    .and_then(|job| admit(&job).map(|()| job));
    let job = match admitted {
        Ok(job) => job,
        Err(err) => return finish(&job_id, Err(err), &notifier),
    };
    thread::Builder::new()
        .name(format!("copy-{}", job.job_id))
        .spawn(move || execute(&job, &notifier, &LogProgress))
        .map_err(|err| RetrieveError::Filesystem(format!("spawn worker: {err}")))
}
