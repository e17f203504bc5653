use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::copier::SAMPLES_DIR;
use crate::domain::SequencingYear;
use crate::error::RetrieveError;

pub const DEFAULT_RUNS_ROOT: &str = "/RUNS";
pub const DEFAULT_RETRIEVED_ROOT: &str = "/RETRIEVED";

/// Sequencer folders under a year directory and where their runs live.
const SEQUENCER_LAYOUTS: &[(&str, &[&str])] = &[
    ("MiSEQ", &["MiSEQ", "complete-runs"]),
    ("NextSeq", &["NextSeq"]),
];

/// Layout of the run archive and of the retrieval area.
///
/// Runs are archived as `<runs_root>/20YY/<sequencer>/.../<run>/Samples/<pseudonym>`;
/// retrieved copies land directly under `<retrieved_root>`.
#[derive(Debug, Clone)]
pub struct RetrievalStore {
    runs_root: Utf8PathBuf,
    retrieved_root: Utf8PathBuf,
}

impl Default for RetrievalStore {
    fn default() -> Self {
        Self::new(DEFAULT_RUNS_ROOT.into(), DEFAULT_RETRIEVED_ROOT.into())
    }
}

impl RetrievalStore {
    pub fn new(runs_root: Utf8PathBuf, retrieved_root: Utf8PathBuf) -> Self {
        Self {
            runs_root,
            retrieved_root,
        }
    }

    pub fn runs_root(&self) -> &Utf8Path {
        &self.runs_root
    }

    pub fn retrieved_root(&self) -> &Utf8Path {
        &self.retrieved_root
    }

    pub fn run_destination(&self, run_path: &Utf8Path) -> Result<Utf8PathBuf, RetrieveError> {
        let name = run_path
            .file_name()
            .ok_or_else(|| RetrieveError::SourceNotFound(run_path.as_std_path().to_path_buf()))?;
        Ok(self.retrieved_root.join(name))
    }

    pub fn sample_destination(&self, sample_path: &Utf8Path) -> Result<Utf8PathBuf, RetrieveError> {
        let name = sample_path
            .file_name()
            .ok_or_else(|| RetrieveError::SourceNotFound(sample_path.as_std_path().to_path_buf()))?;
        Ok(self.retrieved_root.join(name))
    }

    /// Where a sample ends up once its folder name has been de-pseudonymized.
    pub fn real_id_destination(&self, real_id: &str) -> Utf8PathBuf {
        self.retrieved_root.join(real_id)
    }

    pub fn is_retrieved(&self, path: &Utf8Path) -> bool {
        path.as_std_path().symlink_metadata().is_ok()
    }

    pub fn ensure_retrieved_root(&self) -> Result<(), RetrieveError> {
        fs::create_dir_all(self.retrieved_root.as_std_path())
            .map_err(|err| RetrieveError::Filesystem(err.to_string()))
    }

    /// Finds the archived sample folder named exactly `pseudonym`.
    pub fn locate_sample(
        &self,
        pseudonym: &str,
        year: SequencingYear,
    ) -> Result<Utf8PathBuf, RetrieveError> {
        let not_found = || RetrieveError::RunNotFound {
            pseudonym: pseudonym.to_string(),
            year: year.two_digit(),
        };
        let year_dir = self.runs_root.join(year.folder_name());
        if !year_dir.as_std_path().is_dir() {
            debug!(path = %year_dir, "year folder absent");
            return Err(not_found());
        }

        for sequencer in list_names(&year_dir)? {
            let Some((_, layout)) = SEQUENCER_LAYOUTS
                .iter()
                .find(|(name, _)| *name == sequencer)
            else {
                continue;
            };
            let run_type_dir = layout
                .iter()
                .fold(year_dir.clone(), |dir, part| dir.join(part));
            if !run_type_dir.as_std_path().is_dir() {
                continue;
            }
            for run in list_names(&run_type_dir)? {
                let samples = run_type_dir.join(&run).join(SAMPLES_DIR);
                if !samples.as_std_path().is_dir() {
                    continue;
                }
                if list_names(&samples)?.iter().any(|name| name == pseudonym) {
                    return Ok(samples.join(pseudonym));
                }
            }
        }
        Err(not_found())
    }

    /// The run folder a sample belongs to: the parent of its `Samples` folder.
    pub fn run_root_of(sample_path: &Utf8Path) -> Result<Utf8PathBuf, RetrieveError> {
        let samples = sample_path
            .parent()
            .filter(|parent| parent.file_name() == Some(SAMPLES_DIR))
            .ok_or_else(|| RetrieveError::NotInRun(sample_path.as_std_path().to_path_buf()))?;
        samples
            .parent()
            .map(Utf8Path::to_path_buf)
            .ok_or_else(|| RetrieveError::NotInRun(sample_path.as_std_path().to_path_buf()))
    }

    /// Sample folder names (pseudonyms) of a run, sorted.
    pub fn list_run_samples(run_path: &Utf8Path) -> Result<Vec<String>, RetrieveError> {
        let samples = run_path.join(SAMPLES_DIR);
        if !samples.as_std_path().is_dir() {
            return Err(RetrieveError::SourceNotFound(samples.into()));
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(samples.as_std_path())
            .map_err(|err| RetrieveError::Filesystem(err.to_string()))?
        {
            let entry = entry.map_err(|err| RetrieveError::Filesystem(err.to_string()))?;
            if entry.path().is_dir() {
                if let Ok(name) = entry.file_name().into_string() {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn list_names(dir: &Utf8Path) -> Result<Vec<String>, RetrieveError> {
    let mut names = fs::read_dir(dir.as_std_path())
        .map_err(|err| RetrieveError::Filesystem(format!("list {dir}: {err}")))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect::<Vec<_>>();
    names.sort();
    Ok(names)
}
