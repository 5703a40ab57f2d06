use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use cifcurate::io::report::{self, ChainRecordRow, CHAIN_RECORD_FILE};
use cifcurate::io::{rewrite_files, RewriteEdits, RewriteJob};
use cifcurate::ops::assign::{self, AssignConfig};
use cifcurate::ops::standard::{self, StandardSequences, MIN_MATCH_LEN};
use cifcurate::ops::workflow::{StandardSource, Workflow};

use super::{
    ensure_target_dir, list_cif_files, load_structures, read_id_list, report_rewrite_results,
    run_with_spinner, structure_id_of, AlignerArgs, DirArgs,
};

/// Canonical set file name written by `--save-standards`.
const STANDARDS_FILE: &str = "StandardSequences.json";

#[derive(Args, Debug)]
pub struct ChainsArgs {
    #[command(flatten)]
    pub dirs: DirArgs,
    #[command(flatten)]
    pub aligner: AlignerArgs,
    /// Take the canonical sequences verbatim from this structure (by file
    /// name) instead of building a consensus.
    #[arg(long, value_name = "STRUCTURE", conflicts_with = "standard_json")]
    pub reference: Option<String>,
    /// Load a previously saved canonical set instead of building one.
    #[arg(long, value_name = "FILE")]
    pub standard_json: Option<PathBuf>,
    /// Save the canonical set to the target directory for later runs.
    #[arg(long)]
    pub save_standards: bool,
    /// File listing chain ids to ignore during matching, one per line.
    #[arg(long, value_name = "FILE")]
    pub ignore_file: Option<PathBuf>,
    /// Chains with at most this many known residues stay out of matching.
    #[arg(long, value_name = "RESIDUES", default_value_t = MIN_MATCH_LEN)]
    pub min_length: usize,
}

pub fn run(args: &ChainsArgs) -> Result<()> {
    ensure_target_dir(&args.dirs.target_dir)?;
    let files = list_cif_files(&args.dirs.source_dir)?;
    let batch = load_structures(&files)?;

    let ignore: BTreeSet<String> = match &args.ignore_file {
        Some(path) => read_id_list(path)?,
        None => BTreeSet::new(),
    };

    let source = if args.reference.is_some() {
        StandardSource::Reference
    } else {
        StandardSource::Consensus
    };
    let mut workflow = Workflow::new(source);

    let standards = build_standards(args, &batch.structures, &ignore)?;
    workflow.standards_ready(&standards)?;
    log::info!("canonical set frozen with {} chain slot(s)", standards.len());

    if args.save_standards {
        let path = args.dirs.target_dir.join(STANDARDS_FILE);
        standards.save_json(&path)?;
        log::info!("saved canonical set to {}", path.display());
    }

    let aligner = args.aligner.build(&args.dirs.target_dir);
    let config = AssignConfig {
        ignore,
        min_len: args.min_length,
        ..AssignConfig::default()
    };
    let assignments = run_with_spinner("Scoring and matching chains", || {
        Ok(assign::resolve_batch(
            &batch.structures,
            &standards,
            &aligner,
            &config,
        )?)
    })?;

    // Chain assignment leaves nothing unconfirmed; the gate is trivially
    // passed and output may be written.
    workflow.finalize(0)?;

    let jobs: Vec<RewriteJob> = batch
        .paths
        .iter()
        .zip(&batch.structures)
        .map(|(path, structure)| RewriteJob {
            source: path.clone(),
            dest: args.dirs.target_dir.join(structure_id_of(path)),
            edits: RewriteEdits {
                chain_map: assignments[structure.id()].chain_map(),
                ..RewriteEdits::default()
            },
        })
        .collect();
    let results = rewrite_files(&jobs);
    report_rewrite_results(&results)?;

    let mut rows = Vec::new();
    for structure in &batch.structures {
        for (old_chain, new_chain, score) in assignments[structure.id()].iter() {
            rows.push(ChainRecordRow {
                structure: structure.id().to_string(),
                old_chain: old_chain.to_string(),
                new_chain: new_chain.to_string(),
                score,
            });
        }
    }
    let record_path = args.dirs.target_dir.join(CHAIN_RECORD_FILE);
    report::append_chain_records(&record_path, &rows)?;

    println!("Structure : Original Chain ID : New Chain ID : Similarity Score");
    for row in &rows {
        println!(
            "{} : {} : {} : {:.3}",
            row.structure, row.old_chain, row.new_chain, row.score
        );
    }
    println!(
        "Standardized {} structure(s); record appended to {}",
        batch.structures.len(),
        record_path.display()
    );
    Ok(())
}

fn build_standards(
    args: &ChainsArgs,
    structures: &[cifcurate::Structure],
    ignore: &BTreeSet<String>,
) -> Result<StandardSequences> {
    if let Some(path) = &args.standard_json {
        let standards = StandardSequences::load_json(path)?;
        log::info!("loaded canonical set from {}", path.display());
        return Ok(standards);
    }
    if let Some(name) = &args.reference {
        let reference = structures
            .iter()
            .find(|s| s.id() == name)
            .with_context(|| format!("Reference structure '{name}' is not among the inputs"))?;
        return Ok(StandardSequences::from_reference(
            reference,
            args.min_length,
        ));
    }
    let candidates: Vec<String> = standard::union_chain_ids(structures, args.min_length)
        .into_iter()
        .filter(|id| !ignore.contains(id))
        .collect();
    Ok(StandardSequences::from_consensus(
        structures,
        &candidates,
        args.min_length,
    ))
}
