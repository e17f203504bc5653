use std::fs;
use std::path::{Path, PathBuf};

use assert_matches::assert_matches;

use seq_retriever::copier::copy_tree;
use seq_retriever::domain::{JobId, PseudonymPair, RetrievalMode};
use seq_retriever::error::RetrieveError;
use seq_retriever::renamer::rename_tree;

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn all_names(root: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            names.push(path.file_name().unwrap().to_string_lossy().to_string());
            if path.is_dir() {
                stack.push(path);
            }
        }
    }
    names
}

fn pairs() -> Vec<PseudonymPair> {
    vec![
        PseudonymPair::new("PSEUDO_A", "REAL_1"),
        PseudonymPair::new("PSEUDO_B", "REAL_2"),
    ]
}

fn job_id() -> JobId {
    "job-rename".parse().unwrap()
}

/// Builds a pseudonymized run and copies it in full-run mode.
fn copied_run(temp: &Path) -> PathBuf {
    let run = temp.join("run1");
    write(&run.join("Samples/PSEUDO_A/FASTQ/r1.fastq"), b"reads of A");
    write(&run.join("Samples/PSEUDO_B/FASTQ/r1.fastq"), b"reads of B");
    write(&run.join("Samples/PSEUDO_A/FASTQ/PSEUDO_A_S1_R1.fastq"), b"A");
    write(&run.join("Samples/PSEUDO_B/FASTQ/PSEUDO_B_S2_R1.fastq"), b"B");
    write(
        &run.join("Samples/PSEUDO_A/PSEUDO_A_StatInfo.txt"),
        b"Sample: PSEUDO_A\nReads: 10\n",
    );
    write(
        &run.join("Samples/PSEUDO_B/Variants/PSEUDO_B.vcf"),
        b"##sample=PSEUDO_B\n",
    );
    write(
        &run.join("Alignment/AdapterCounts.txt"),
        b"Sample\tCount\nPSEUDO_A\t10\nPSEUDO_B\t12\n",
    );
    write(
        &run.join("SampleSheet.csv"),
        b"[Data]\nSample_ID,Sample_Name\nPSEUDO_A,PSEUDO_A\nPSEUDO_B,PSEUDO_B\n",
    );
    let dest = temp.join("retrieved").join("run1");
    copy_tree(&run, &dest, RetrievalMode::FullRun).unwrap();
    dest
}

#[test]
fn full_run_scenario() {
    let temp = tempfile::tempdir().unwrap();
    let dest = copied_run(temp.path());

    let report = rename_tree(&dest, &pairs(), RetrievalMode::FullRun, &job_id()).unwrap();

    assert_eq!(report.root, dest);
    assert!(report.content_skipped.is_empty());
    assert_eq!(fs::read(dest.join("FASTQ/r1.fastq")).unwrap(), b"reads of B");
    assert!(dest.join("FASTQ/REAL_1_S1_R1.fastq").is_file());
    assert!(dest.join("FASTQ/REAL_2_S2_R1.fastq").is_file());
    assert!(dest.join("Samples/REAL_1").is_dir());
    assert!(!dest.join("Samples/REAL_1/FASTQ").exists());
    assert!(dest.join("Samples/REAL_2/Variants/REAL_2.vcf").is_file());
    // Only StatInfo files have their content rewritten below Samples.
    assert_eq!(
        fs::read(dest.join("Samples/REAL_2/Variants/REAL_2.vcf")).unwrap(),
        b"##sample=PSEUDO_B\n"
    );

    for name in all_names(&dest) {
        assert!(!name.contains("PSEUDO_A"), "{name}");
        assert!(!name.contains("PSEUDO_B"), "{name}");
    }
}

#[test]
fn structured_files_keep_line_count() {
    let temp = tempfile::tempdir().unwrap();
    let dest = copied_run(temp.path());
    let sheet = dest.join("SampleSheet.csv");
    let counts = dest.join("Alignment/AdapterCounts.txt");
    let lines_before = [
        fs::read_to_string(&sheet).unwrap().lines().count(),
        fs::read_to_string(&counts).unwrap().lines().count(),
    ];

    rename_tree(&dest, &pairs(), RetrievalMode::FullRun, &job_id()).unwrap();

    let sheet_text = fs::read_to_string(&sheet).unwrap();
    let counts_text = fs::read_to_string(&counts).unwrap();
    assert_eq!(
        sheet_text,
        "[Data]\nSample_ID,Sample_Name\nREAL_1,REAL_1\nREAL_2,REAL_2\n"
    );
    assert_eq!(counts_text, "Sample\tCount\nREAL_1\t10\nREAL_2\t12\n");
    assert_eq!(
        [sheet_text.lines().count(), counts_text.lines().count()],
        lines_before
    );
}

#[test]
fn stat_info_content_and_name_are_replaced() {
    let temp = tempfile::tempdir().unwrap();
    let dest = copied_run(temp.path());

    rename_tree(&dest, &pairs(), RetrievalMode::FullRun, &job_id()).unwrap();

    let stat = dest.join("Samples/REAL_1/REAL_1_StatInfo.txt");
    assert!(stat.is_file());
    let content = fs::read_to_string(stat).unwrap();
    assert_eq!(content, "Sample: REAL_1\nReads: 10\n");
}

#[test]
fn missing_structured_files_are_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("run");
    write(&dest.join("Samples/PSEUDO_A/x.txt"), b"x");

    let report = rename_tree(&dest, &pairs(), RetrievalMode::FullRun, &job_id()).unwrap();

    assert_eq!(report.content_skipped.len(), 2);
    assert!(dest.join("Samples/REAL_1/x.txt").is_file());
}

#[test]
fn second_pass_is_a_no_op() {
    let temp = tempfile::tempdir().unwrap();
    let dest = copied_run(temp.path());
    rename_tree(&dest, &pairs(), RetrievalMode::FullRun, &job_id()).unwrap();
    let mut before = all_names(&dest);
    before.sort();

    let report = rename_tree(&dest, &pairs(), RetrievalMode::FullRun, &job_id()).unwrap();

    let mut after = all_names(&dest);
    after.sort();
    assert_eq!(report.renamed, 0);
    assert_eq!(report.contents_rewritten, 0);
    assert_eq!(before, after);
}

#[test]
fn failure_keeps_earlier_renames() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("PSEUDO_A");
    write(&root.join("a_PSEUDO_A.txt"), b"a");
    write(&root.join("b_PSEUDO_A.txt"), b"b");
    write(&root.join("c_PSEUDO_A.txt"), b"c");
    write(&root.join("c_REAL_1.txt"), b"already there");

    let err = rename_tree(
        &root,
        &[PseudonymPair::new("PSEUDO_A", "REAL_1")],
        RetrievalMode::Sample,
        &job_id(),
    )
    .unwrap_err();

    let renamed_root = temp.path().join("REAL_1");
    assert_matches!(
        err,
        RetrieveError::RenameFailed { ref job_id, ref last_path, ref path, .. }
            if job_id == "job-rename"
                && last_path.as_deref() == Some(renamed_root.join("b_REAL_1.txt").as_path())
                && path == &renamed_root.join("c_PSEUDO_A.txt")
    );
    assert!(renamed_root.join("a_REAL_1.txt").is_file());
    assert!(renamed_root.join("b_REAL_1.txt").is_file());
    assert!(renamed_root.join("c_PSEUDO_A.txt").is_file());
    assert_eq!(
        fs::read(renamed_root.join("c_REAL_1.txt")).unwrap(),
        b"already there"
    );
}

#[cfg(unix)]
#[test]
fn permission_error_mid_pass_reports_last_path() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("PSEUDO_A");
    write(&root.join("a_PSEUDO_A.txt"), b"a");
    write(&root.join("b_PSEUDO_A.txt"), b"b");
    write(&root.join("locked/c_PSEUDO_A.txt"), b"c");
    let locked = root.join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

    // Privileged users ignore directory modes; nothing to observe then.
    if fs::write(locked.join("write-check"), b"").is_ok() {
        fs::remove_file(locked.join("write-check")).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = rename_tree(
        &root,
        &[PseudonymPair::new("PSEUDO_A", "REAL_1")],
        RetrievalMode::Sample,
        &job_id(),
    );

    let renamed_root = temp.path().join("REAL_1");
    fs::set_permissions(renamed_root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

    assert_matches!(
        result,
        Err(RetrieveError::RenameFailed { ref last_path, ref path, .. })
            if last_path.as_deref() == Some(renamed_root.join("locked").as_path())
                && path == &renamed_root.join("locked/c_PSEUDO_A.txt")
    );
    assert!(renamed_root.join("a_REAL_1.txt").is_file());
    assert!(renamed_root.join("b_REAL_1.txt").is_file());
    assert!(renamed_root.join("locked/c_PSEUDO_A.txt").is_file());
}
