//! Replaces pseudonym tokens with real identifiers inside a copied tree.
//!
//! Pairs are applied one at a time, each pair walking every root completely
//! before the next one starts. A node is renamed when it is first visited and
//! its children are listed from the renamed path, so no directory is ever
//! iterated under a name that has just gone away.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::copier::{FASTQ_DIR, SAMPLES_DIR};
use crate::domain::{JobId, PseudonymPair, RetrievalMode};
use crate::error::RetrieveError;
use crate::fs_util::{TokenReplacer, rewrite_file_content, sorted_entries};

pub const STAT_INFO_MARKER: &str = "_StatInfo";

/// Run-level files whose text embeds sample identifiers.
pub fn structured_files(destination: &Path) -> [PathBuf; 2] {
    [
        destination.join("Alignment").join("AdapterCounts.txt"),
        destination.join("SampleSheet.csv"),
    ]
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RenameReport {
    /// Root path after renaming; differs from the input in sample mode when
    /// the sample folder itself carried the pseudonym.
    pub root: PathBuf,
    pub visited: usize,
    pub renamed: usize,
    pub contents_rewritten: usize,
    pub content_skipped: Vec<PathBuf>,
}

pub fn rename_tree(
    destination: &Path,
    pairs: &[PseudonymPair],
    mode: RetrievalMode,
    job_id: &JobId,
) -> Result<RenameReport, RetrieveError> {
    let replacers = pairs
        .iter()
        .map(TokenReplacer::new)
        .collect::<Result<Vec<_>, _>>()?;
    let mut renamer = TreeRenamer::new(job_id);
    renamer.report.root = destination.to_path_buf();

    match mode {
        RetrievalMode::FullRun => {
            for file in structured_files(destination) {
                renamer.rewrite_structured(&file, &replacers)?;
            }
            let roots = [destination.join(SAMPLES_DIR), destination.join(FASTQ_DIR)];
            for (pair, replacer) in pairs.iter().zip(&replacers) {
                for root in &roots {
                    renamer.rename_recursive(root, pair, replacer)?;
                }
            }
        }
        RetrievalMode::Sample => {
            let mut root = destination.to_path_buf();
            for (pair, replacer) in pairs.iter().zip(&replacers) {
                root = renamer.rename_recursive(&root, pair, replacer)?;
            }
            renamer.report.root = root;
        }
    }

    info!(
        job_id = %job_id,
        renamed = renamer.report.renamed,
        rewritten = renamer.report.contents_rewritten,
        "rename pass finished"
    );
    Ok(renamer.report)
}

struct TreeRenamer<'a> {
    job_id: &'a JobId,
    last_path: Option<PathBuf>,
    report: RenameReport,
}

impl<'a> TreeRenamer<'a> {
    fn new(job_id: &'a JobId) -> Self {
        Self {
            job_id,
            last_path: None,
            report: RenameReport::default(),
        }
    }

    fn rewrite_structured(
        &mut self,
        file: &Path,
        replacers: &[TokenReplacer],
    ) -> Result<(), RetrieveError> {
        if !file.is_file() {
            info!(job_id = %self.job_id, path = %file.display(), "content rewrite skipped; file absent");
            self.report.content_skipped.push(file.to_path_buf());
            return Ok(());
        }
        let changed =
            rewrite_file_content(file, replacers).map_err(|err| self.fail(file, err.to_string()))?;
        if changed {
            self.report.contents_rewritten += 1;
        }
        self.last_path = Some(file.to_path_buf());
        Ok(())
    }

    /// Depth-first walk from `root`, returning the root's post-rename path.
    fn rename_recursive(
        &mut self,
        root: &Path,
        pair: &PseudonymPair,
        replacer: &TokenReplacer,
    ) -> Result<PathBuf, RetrieveError> {
        let Ok(meta) = root.symlink_metadata() else {
            debug!(job_id = %self.job_id, path = %root.display(), "rename root absent; skipping");
            return Ok(root.to_path_buf());
        };
        if !meta.is_dir() {
            return self.visit_file(root, pair, replacer);
        }

        let renamed_root = self.rename_node(root, pair)?;
        let mut stack = vec![renamed_root.clone()];
        while let Some(dir) = stack.pop() {
            let children = sorted_entries(&dir).map_err(|err| self.fail(&dir, err.to_string()))?;
            let mut subdirs = Vec::new();
            for child in children {
                let is_dir = child
                    .symlink_metadata()
                    .map_err(|err| self.fail(&child, err.to_string()))?
                    .is_dir();
                if is_dir {
                    subdirs.push(self.rename_node(&child, pair)?);
                } else {
                    self.visit_file(&child, pair, replacer)?;
                }
            }
            stack.extend(subdirs.into_iter().rev());
        }
        Ok(renamed_root)
    }

    fn visit_file(
        &mut self,
        path: &Path,
        pair: &PseudonymPair,
        replacer: &TokenReplacer,
    ) -> Result<PathBuf, RetrieveError> {
        let is_stat_info = path
            .file_name()
            .map(|name| name.to_string_lossy().contains(STAT_INFO_MARKER))
            .unwrap_or(false);
        if is_stat_info {
            let changed = rewrite_file_content(path, std::slice::from_ref(replacer))
                .map_err(|err| self.fail(path, err.to_string()))?;
            if changed {
                self.report.contents_rewritten += 1;
            }
        }
        self.rename_node(path, pair)
    }

    /// Substitutes the pseudonym in the final path component only.
    fn rename_node(&mut self, path: &Path, pair: &PseudonymPair) -> Result<PathBuf, RetrieveError> {
        self.report.visited += 1;
        let Some(os_name) = path.file_name() else {
            self.last_path = Some(path.to_path_buf());
            return Ok(path.to_path_buf());
        };
        let Some(name) = os_name.to_str() else {
            if os_name.to_string_lossy().contains(&pair.pseudonym) {
                return Err(self.fail(path, "file name is not valid UTF-8".to_string()));
            }
            self.last_path = Some(path.to_path_buf());
            return Ok(path.to_path_buf());
        };
        if !name.contains(&pair.pseudonym) {
            self.last_path = Some(path.to_path_buf());
            return Ok(path.to_path_buf());
        }

        let target = path.with_file_name(name.replace(&pair.pseudonym, &pair.real_id));
        if target.symlink_metadata().is_ok() {
            return Err(self.fail(path, format!("target {} already exists", target.display())));
        }
        fs::rename(path, &target).map_err(|err| self.fail(path, err.to_string()))?;
        debug!(from = %path.display(), to = %target.display(), "renamed");
        self.report.renamed += 1;
        self.last_path = Some(target.clone());
        Ok(target)
    }

    fn fail(&self, path: &Path, reason: String) -> RetrieveError {
        error!(
            job_id = %self.job_id,
            path = %path.display(),
            last_path = ?self.last_path,
            %reason,
            "rename pass aborted"
        );
        RetrieveError::RenameFailed {
            job_id: self.job_id.to_string(),
            last_path: self.last_path.clone(),
            path: path.to_path_buf(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn job() -> JobId {
        "job-1".parse().unwrap()
    }

    #[test]
    fn sample_root_is_renamed() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("PSEUDO_A");
        fs::create_dir_all(root.join("nested_PSEUDO_A")).unwrap();
        fs::write(root.join("nested_PSEUDO_A").join("PSEUDO_A.bam"), b"x").unwrap();

        let report = rename_tree(
            &root,
            &[PseudonymPair::new("PSEUDO_A", "REAL_1")],
            RetrievalMode::Sample,
            &job(),
        )
        .unwrap();

        assert_eq!(report.root, temp.path().join("REAL_1"));
        assert!(temp.path().join("REAL_1/nested_REAL_1/REAL_1.bam").is_file());
        assert_eq!(report.renamed, 3);
        assert_eq!(report.visited, 3);
    }

    #[test]
    fn every_occurrence_in_a_name_is_replaced() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("sample");
        fs::create_dir_all(root.join("PSEUDO_A-PSEUDO_A")).unwrap();

        rename_tree(
            &root,
            &[PseudonymPair::new("PSEUDO_A", "REAL_1")],
            RetrievalMode::Sample,
            &job(),
        )
        .unwrap();

        assert!(root.join("REAL_1-REAL_1").is_dir());
    }

    #[test]
    fn collision_is_refused() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("sample");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("PSEUDO_A.txt"), b"pseudo").unwrap();
        fs::write(root.join("REAL_1.txt"), b"real").unwrap();

        let err = rename_tree(
            &root,
            &[PseudonymPair::new("PSEUDO_A", "REAL_1")],
            RetrievalMode::Sample,
            &job(),
        )
        .unwrap_err();

        assert_matches!(err, RetrieveError::RenameFailed { ref job_id, .. } if job_id == "job-1");
        assert_eq!(fs::read(root.join("REAL_1.txt")).unwrap(), b"real");
    }
}
