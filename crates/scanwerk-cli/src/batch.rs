// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch driver: fans input files out over blocking workers, each with its own
// pipeline, and reports per-file outcomes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use scanwerk_core::config::RunConfig;
use scanwerk_core::error::ScanwerkError;
use scanwerk_document::{BatchEntry, OcrPipeline};
use tracing::{info, warn};

/// Where the PDF for `input` is written.
pub fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let file_name = input.with_extension("pdf");
    match (output_dir, file_name.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => file_name,
    }
}

/// Pair every input with its output path.
///
/// Inputs that would share an output (`scan.png` and `scan.tiff`) keep their
/// source extension instead: `scan.png.pdf`, `scan.tiff.pdf`. A name that is
/// still taken gets a numeric suffix.
pub fn plan_outputs(inputs: &[PathBuf], output_dir: Option<&Path>) -> Vec<(PathBuf, PathBuf)> {
    let defaults: Vec<PathBuf> = inputs
        .iter()
        .map(|input| output_path(input, output_dir))
        .collect();
    let mut claims: HashMap<&Path, HashSet<&Path>> = HashMap::new();
    for (input, output) in inputs.iter().zip(&defaults) {
        claims.entry(output).or_default().insert(input);
    }
    let mut taken: HashSet<PathBuf> = defaults
        .iter()
        .filter(|output| claims[output.as_path()].len() < 2)
        .cloned()
        .collect();

    inputs
        .iter()
        .zip(&defaults)
        .map(|(input, output)| {
            if claims[output.as_path()].len() < 2 {
                return (input.clone(), output.clone());
            }
            let source_name = input.file_name().unwrap_or_default().to_string_lossy();
            let mut renamed = output.with_file_name(format!("{source_name}.pdf"));
            let mut suffix = 2;
            while taken.contains(&renamed) {
                renamed = output.with_file_name(format!("{source_name}-{suffix}.pdf"));
                suffix += 1;
            }
            taken.insert(renamed.clone());
            warn!(
                input = %input.display(),
                output = %renamed.display(),
                "Output name shared with another input; renamed"
            );
            (input.clone(), renamed)
        })
        .collect()
}

type Job = (usize, PathBuf, PathBuf);

/// Split `jobs` into at most `workers` round-robin groups, keeping each job's
/// position so results can be put back in input order.
fn distribute(jobs: Vec<(PathBuf, PathBuf)>, workers: usize) -> Vec<Vec<Job>> {
    let workers = workers.clamp(1, jobs.len().max(1));
    let mut groups: Vec<Vec<Job>> = vec![Vec::new(); workers];
    for (position, (input, output)) in jobs.into_iter().enumerate() {
        groups[position % workers].push((position, input, output));
    }
    groups.retain(|group| !group.is_empty());
    groups
}

/// Mark every job of a group as failed with the same cause.
fn fail_group(group: Vec<Job>, cause: &str) -> Vec<(usize, BatchEntry)> {
    group
        .into_iter()
        .map(|(position, input, output)| {
            let entry = BatchEntry {
                input,
                output,
                result: Err(ScanwerkError::WorkerFailed(cause.to_string())),
            };
            (position, entry)
        })
        .collect()
}

/// Process every job, `workers` files at a time. Entries come back in input
/// order; a worker that cannot start or panics fails only its own files.
pub async fn run(
    config: RunConfig,
    jobs: Vec<(PathBuf, PathBuf)>,
    workers: usize,
) -> Vec<BatchEntry> {
    let total = jobs.len();
    let groups = distribute(jobs, workers);
    info!(files = total, workers = groups.len(), "Batch started");

    let mut handles = Vec::with_capacity(groups.len());
    for group in groups {
        let config = config.clone();
        let claimed = group.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let pipeline = match OcrPipeline::new(config) {
                Ok(pipeline) => pipeline,
                Err(err) => {
                    warn!(error = %err, "Worker pipeline failed to start");
                    return fail_group(group, &format!("could not start: {err}"));
                }
            };
            let (positions, jobs): (Vec<usize>, Vec<(PathBuf, PathBuf)>) = group
                .into_iter()
                .map(|(position, input, output)| (position, (input, output)))
                .unzip();
            positions
                .into_iter()
                .zip(pipeline.process_batch(&jobs))
                .collect::<Vec<_>>()
        });
        handles.push((handle, claimed));
    }

    let mut results = Vec::with_capacity(total);
    for (handle, claimed) in handles {
        match handle.await {
            Ok(entries) => results.extend(entries),
            Err(err) => {
                warn!(error = %err, files = claimed.len(), "Batch worker aborted");
                results.extend(fail_group(claimed, &err.to_string()));
            }
        }
    }
    results.sort_by_key(|(position, _)| *position);
    results.into_iter().map(|(_, entry)| entry).collect()
}

/// Print one line per file. Returns the number of failures.
pub fn print_summary(entries: &[BatchEntry]) -> usize {
    let mut failures = 0;
    for entry in entries {
        match &entry.result {
            Ok(report) => println!(
                "ok    {} -> {} ({} pages, {} fragments)",
                report.input.display(),
                report.output.display(),
                report.pages,
                report.fragments
            ),
            Err(err) => {
                failures += 1;
                println!("FAIL  {}: {err}", entry.input.display());
            }
        }
    }
    println!("{} of {} files converted", entries.len() - failures, entries.len());
    failures
}
