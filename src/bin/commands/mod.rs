use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self as stdio, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;

use cifcurate::align::MuscleAligner;
use cifcurate::io::{self, read_cif_structure, ResidueCodeTable, RewriteSummary};
use cifcurate::Structure;

pub mod chains;
pub mod entities;
pub mod residues;

/// Directories shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct DirArgs {
    /// Directory containing the input .cif depositions.
    #[arg(short, long, value_name = "DIR")]
    pub source_dir: PathBuf,
    /// Directory receiving the curated files and reports.
    #[arg(short, long, value_name = "DIR")]
    pub target_dir: PathBuf,
}

/// External-aligner options shared by the alignment-driven subcommands.
#[derive(Args, Debug, Clone)]
pub struct AlignerArgs {
    /// External multiple-sequence aligner executable.
    #[arg(long, value_name = "PROGRAM", default_value = "muscle")]
    pub aligner: PathBuf,
    /// Seconds to wait for one aligner invocation before failing.
    #[arg(long, value_name = "SECONDS", default_value_t = 120)]
    pub aligner_timeout: u64,
}

impl AlignerArgs {
    /// Builds the aligner with its cache directory under the target.
    pub fn build(&self, target_dir: &Path) -> MuscleAligner {
        MuscleAligner::new(target_dir.join("alignments"))
            .with_program(&self.aligner)
            .with_timeout(Duration::from_secs(self.aligner_timeout))
    }
}

/// The depositions that survived parsing, with their source paths kept
/// parallel for the rewrite pass.
pub struct LoadedBatch {
    pub paths: Vec<PathBuf>,
    pub structures: Vec<Structure>,
}

/// Lists the `.cif` files of the source directory, sorted for a stable
/// processing order.
pub fn list_cif_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read source directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to list source directory {}", dir.display()))?;
        let path = entry.path();
        let is_cif = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("cif"));
        if is_cif {
            files.push(path);
        }
    }
    files.sort();
    if files.is_empty() {
        bail!("No .cif files found in {}", dir.display());
    }
    Ok(files)
}

/// Path-derived structure identifier: the file name.
pub fn structure_id_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parses every file, skipping (and reporting) the unparsable ones so a bad
/// deposition never aborts the batch.
pub fn load_structures(files: &[PathBuf]) -> Result<LoadedBatch> {
    let table = ResidueCodeTable::new_default();
    let bar = progress_bar(files.len() as u64);
    let mut batch = LoadedBatch {
        paths: Vec::new(),
        structures: Vec::new(),
    };
    for path in files {
        bar.set_message(structure_id_of(path));
        match read_structure_file(path, &table) {
            Ok(structure) => {
                batch.paths.push(path.clone());
                batch.structures.push(structure);
            }
            Err(err) => log::warn!("skipping unreadable deposition: {err}"),
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    if batch.structures.is_empty() {
        bail!("None of the {} input file(s) could be parsed", files.len());
    }
    log::info!(
        "loaded {} of {} deposition(s)",
        batch.structures.len(),
        files.len()
    );
    Ok(batch)
}

fn read_structure_file(path: &Path, table: &ResidueCodeTable) -> Result<Structure, io::Error> {
    let file = File::open(path).map_err(|e| io::Error::from_io(e, Some(path.to_path_buf())))?;
    read_cif_structure(BufReader::new(file), &structure_id_of(path), table)
        .map_err(|e| e.with_path(path.to_path_buf()))
}

pub fn ensure_target_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create target directory {}", dir.display()))
}

/// Reads a one-identifier-per-line list file.
pub fn read_id_list(path: &Path) -> Result<BTreeSet<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read identifier list {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Progress bar on stderr, silenced when stderr is not a terminal.
pub fn progress_bar(len: u64) -> ProgressBar {
    if stdio::stderr().is_terminal() {
        let bar = ProgressBar::new(len);
        let style = ProgressStyle::with_template("{bar:40.green} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    } else {
        ProgressBar::hidden()
    }
}

/// Wraps long-running operations with a spinner rendered to stderr.
pub fn run_with_spinner<T, F>(message: &str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.to_string());

    let result = work();

    match &result {
        Ok(_) => spinner.finish_with_message(format!("{} ✓", message)),
        Err(_) => spinner.abandon_with_message(format!("{} ✗", message)),
    }

    result
}

/// Surfaces per-file rewrite outcomes; any failure fails the run after
/// every job has been attempted.
pub fn report_rewrite_results(
    results: &[(PathBuf, Result<RewriteSummary, io::Error>)],
) -> Result<()> {
    let mut failures = 0;
    for (source, result) in results {
        match result {
            Ok(summary) => {
                debug_assert_eq!(summary.lines_in, summary.lines_out);
                log::debug!(
                    "rewrote {} ({} coordinate records)",
                    source.display(),
                    summary.records_rewritten
                );
            }
            Err(err) => {
                failures += 1;
                log::error!("failed to rewrite {}: {err}", source.display());
            }
        }
    }
    if failures > 0 {
        bail!("{failures} file(s) failed to rewrite; their outputs were discarded");
    }
    Ok(())
}
