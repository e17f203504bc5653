use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::warn;

use crate::config::{RunRequest, SampleRequest};
use crate::domain::{JobId, RenameJob, RetrievalMode, SequencingYear};
use crate::error::RetrieveError;
use crate::job::{self, JobReport, ProgressEvent, ProgressSink};
use crate::notify::CompletionNotifier;
use crate::store::RetrievalStore;

#[derive(Debug, Clone, Serialize)]
pub struct LocateResult {
    pub pseudonym: String,
    pub sample_path: String,
    pub run_path: String,
    pub run_samples: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub job_id: String,
    pub items: Vec<JobReport>,
}

#[derive(Clone)]
pub struct App<N: CompletionNotifier> {
    store: RetrievalStore,
    notifier: N,
}

impl<N: CompletionNotifier> App<N> {
    pub fn new(store: RetrievalStore, notifier: N) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &RetrievalStore {
        &self.store
    }

    pub fn locate(
        &self,
        pseudonym: &str,
        year: SequencingYear,
        sink: &dyn ProgressSink,
    ) -> Result<LocateResult, RetrieveError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; searching 20{year} for {pseudonym}"),
            elapsed: None,
        });
        let sample_path = self.store.locate_sample(pseudonym, year)?;
        let run_path = RetrievalStore::run_root_of(&sample_path)?;
        let run_samples = RetrievalStore::list_run_samples(&run_path)?;
        Ok(LocateResult {
            pseudonym: pseudonym.to_string(),
            sample_path: sample_path.to_string(),
            run_path: run_path.to_string(),
            run_samples,
        })
    }

    /// Retrieves whole runs one after another under a single job id; the
    /// finished message goes out once, after the last run.
    pub fn retrieve_runs(
        &self,
        requests: &[RunRequest],
        job_id: &JobId,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, RetrieveError> {
        let result = self.run_batch(job_id, sink, requests, |request| {
            self.run_job(request, job_id)
        });
        job::finish(job_id, result, &self.notifier)
    }

    /// Retrieves single samples one after another under a single job id.
    pub fn retrieve_samples(
        &self,
        requests: &[SampleRequest],
        job_id: &JobId,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, RetrieveError> {
        let result = self.run_batch(job_id, sink, requests, |request| {
            self.sample_job(request, job_id)
        });
        job::finish(job_id, result, &self.notifier)
    }

    fn run_batch<T>(
        &self,
        job_id: &JobId,
        sink: &dyn ProgressSink,
        requests: &[T],
        build: impl Fn(&T) -> Result<RenameJob, RetrieveError>,
    ) -> Result<BatchResult, RetrieveError> {
        self.store.ensure_retrieved_root()?;
        let mut items = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            let job = build(request)?;
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Prepare; item {}/{} {}",
                    index + 1,
                    requests.len(),
                    job.source.display()
                ),
                elapsed: None,
            });
            items.push(job::process(&job, sink)?);
        }
        Ok(BatchResult {
            job_id: job_id.to_string(),
            items,
        })
    }

    fn run_job(&self, request: &RunRequest, job_id: &JobId) -> Result<RenameJob, RetrieveError> {
        let destination = self.store.run_destination(&request.run_path)?;
        if self.store.is_retrieved(&destination) {
            return Err(RetrieveError::DestinationExists(destination.into()));
        }
        if let Ok(samples) = RetrievalStore::list_run_samples(&request.run_path) {
            let unmapped = samples
                .iter()
                .filter(|name| !request.pairs.iter().any(|pair| &pair.pseudonym == *name))
                .collect::<Vec<_>>();
            if !unmapped.is_empty() {
                warn!(
                    run = %request.run_path,
                    samples = ?unmapped,
                    "run samples without a real id stay pseudonymized"
                );
            }
        }
        Ok(RenameJob {
            source: request.run_path.clone().into(),
            destination: destination.into(),
            pairs: request.pairs.clone(),
            mode: RetrievalMode::FullRun,
            job_id: job_id.clone(),
        })
    }

    fn sample_job(
        &self,
        request: &SampleRequest,
        job_id: &JobId,
    ) -> Result<RenameJob, RetrieveError> {
        let destination = self.store.sample_destination(&request.path)?;
        let renamed: Utf8PathBuf = self.store.real_id_destination(&request.pair.real_id);
        for candidate in [&destination, &renamed] {
            if self.store.is_retrieved(candidate) {
                return Err(RetrieveError::DestinationExists(candidate.clone().into()));
            }
        }
        Ok(RenameJob {
            source: request.path.clone().into(),
            destination: destination.into(),
            pairs: vec![request.pair.clone()],
            mode: RetrievalMode::Sample,
            job_id: job_id.clone(),
        })
    }
}
