use std::io::{self, Write};

use serde::Serialize;

use crate::app::{BatchResult, LocateResult};
use crate::job::{ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_batch(result: &BatchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_locate(result: &LocateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable progress lines on stderr.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("  {} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("  {}", event.message),
        }
    }
}

pub fn print_batch_summary(result: &BatchResult) {
    println!("job {}: {} item(s) retrieved", result.job_id, result.items.len());
    for item in &result.items {
        println!(
            "  {} {} -> {}",
            item.mode,
            item.source.display(),
            item.destination.display()
        );
        println!(
            "     files: {}, renamed: {}, rewritten: {}",
            item.files_copied, item.renamed, item.contents_rewritten
        );
        if item.fastq_overwritten > 0 {
            println!(
                "     warning: {} aggregated FASTQ file(s) overwritten by a later sample",
                item.fastq_overwritten
            );
        }
        for skipped in &item.content_skipped {
            println!("     skipped (absent): {}", skipped.display());
        }
    }
}

pub fn print_locate_summary(result: &LocateResult) {
    println!("sample: {}", result.sample_path);
    println!("run:    {}", result.run_path);
    println!("run samples ({}):", result.run_samples.len());
    for sample in &result.run_samples {
        println!("  {sample}");
    }
}
