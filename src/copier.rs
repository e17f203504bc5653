//! Copies a run or sample folder into its retrieval destination.
//!
//! The copy is staged in a hidden sibling of the destination and moved into
//! place only once every file has been written, so a failed copy never leaves
//! a half-populated destination behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::RetrievalMode;
use crate::error::RetrieveError;
use crate::fs_util::sorted_entries;

pub const FASTQ_DIR: &str = "FASTQ";
pub const SAMPLES_DIR: &str = "Samples";

#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyReport {
    pub files_copied: usize,
    pub fastq_aggregated: usize,
    pub fastq_overwritten: usize,
}

pub fn copy_tree(
    source: &Path,
    destination: &Path,
    mode: RetrievalMode,
) -> Result<CopyReport, RetrieveError> {
    if !source.is_dir() {
        return Err(RetrieveError::SourceNotFound(source.to_path_buf()));
    }
    if destination.symlink_metadata().is_ok() {
        return Err(RetrieveError::DestinationExists(destination.to_path_buf()));
    }

    let parent = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|err| copy_failed(parent, err))?;
    let staging = tempfile::Builder::new()
        .prefix(".seq-retrieve-copy")
        .tempdir_in(parent)
        .map_err(|err| copy_failed(parent, err))?;

    info!(
        source = %source.display(),
        destination = %destination.display(),
        %mode,
        "copying tree"
    );
    let mut report = CopyReport::default();
    copy_recursive(source, staging.path(), mode.is_full_run(), &mut report)?;
    if mode.is_full_run() {
        aggregate_fastq(source, staging.path(), &mut report)?;
    }
    let permissions = fs::metadata(source)
        .map_err(|err| copy_failed(source, err))?
        .permissions();
    fs::set_permissions(staging.path(), permissions)
        .map_err(|err| copy_failed(staging.path(), err))?;

    // From here on the staging dir is ours to clean up.
    let staged = staging.keep();
    if let Err(err) = fs::rename(&staged, destination) {
        let _ = fs::remove_dir_all(&staged);
        return Err(copy_failed(destination, err));
    }
    debug!(files = report.files_copied, "copy finished");
    Ok(report)
}

/// Recursive copy of `source` into the existing directory `target`, skipping
/// every `FASTQ` directory below the root when `exclude_fastq` is set.
fn copy_recursive(
    source: &Path,
    target: &Path,
    exclude_fastq: bool,
    report: &mut CopyReport,
) -> Result<(), RetrieveError> {
    let walker = WalkDir::new(source)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(exclude_fastq
                && entry.depth() > 0
                && entry.file_type().is_dir()
                && entry.file_name() == FASTQ_DIR)
        });

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| source.to_path_buf());
            copy_failed(&path, io::Error::from(err))
        })?;
        let relative = entry.path().strip_prefix(source).map_err(|_| {
            RetrieveError::Filesystem(format!(
                "{} escaped source {}",
                entry.path().display(),
                source.display()
            ))
        })?;
        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|err| copy_failed(&dest, err))?;
        } else {
            fs::copy(entry.path(), &dest).map_err(|err| copy_failed(entry.path(), err))?;
            report.files_copied += 1;
        }
    }
    Ok(())
}

/// Flattens `Samples/*/FASTQ/*` into a single `FASTQ` folder at the run level.
///
/// Samples are visited in name order; a file name seen in an earlier sample is
/// overwritten by the later one.
fn aggregate_fastq(
    source: &Path,
    target: &Path,
    report: &mut CopyReport,
) -> Result<(), RetrieveError> {
    let dest_fastq = target.join(FASTQ_DIR);
    fs::create_dir_all(&dest_fastq).map_err(|err| copy_failed(&dest_fastq, err))?;

    let samples = source.join(SAMPLES_DIR);
    if !samples.is_dir() {
        info!(path = %samples.display(), "run has no Samples folder; nothing to aggregate");
        return Ok(());
    }

    for sample in sorted_entries(&samples).map_err(|err| copy_failed(&samples, err))? {
        let fastq = sample.join(FASTQ_DIR);
        if !fastq.is_dir() {
            continue;
        }
        for file in sorted_entries(&fastq).map_err(|err| copy_failed(&fastq, err))? {
            let metadata = fs::metadata(&file).map_err(|err| copy_failed(&file, err))?;
            if metadata.is_dir() {
                continue;
            }
            let Some(name) = file.file_name() else {
                continue;
            };
            let dest = dest_fastq.join(name);
            if dest.exists() {
                warn!(
                    file = %name.to_string_lossy(),
                    sample = %sample.display(),
                    "aggregated FASTQ name collision; later sample overwrites"
                );
                report.fastq_overwritten += 1;
            }
            fs::copy(&file, &dest).map_err(|err| copy_failed(&file, err))?;
            report.fastq_aggregated += 1;
        }
    }
    Ok(())
}

fn copy_failed(path: &Path, source: io::Error) -> RetrieveError {
    RetrieveError::CopyFailed {
        path: PathBuf::from(path),
        source,
    }
}
