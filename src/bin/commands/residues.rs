use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use cifcurate::io::report::{self, ResidueMapRow, RESIDUE_MAP_FILE};
use cifcurate::io::{rewrite_files, RewriteEdits, RewriteJob};
use cifcurate::ops::renumber::{self, RenumberConfig, GAP_COLUMN_THRESHOLD};

use super::{
    ensure_target_dir, list_cif_files, load_structures, read_id_list, report_rewrite_results,
    run_with_spinner, structure_id_of, AlignerArgs, DirArgs,
};

#[derive(Args, Debug)]
pub struct ResiduesArgs {
    #[command(flatten)]
    pub dirs: DirArgs,
    #[command(flatten)]
    pub aligner: AlignerArgs,
    /// Gap percentage at which an alignment column stops advancing the
    /// residue counter and takes a letter suffix instead.
    #[arg(long, value_name = "PERCENT", default_value_t = GAP_COLUMN_THRESHOLD)]
    pub gap_threshold: f64,
    /// File listing chain ids to exclude from renumbering, one per line.
    #[arg(long, value_name = "FILE")]
    pub ignore_file: Option<PathBuf>,
}

pub fn run(args: &ResiduesArgs) -> Result<()> {
    ensure_target_dir(&args.dirs.target_dir)?;
    let files = list_cif_files(&args.dirs.source_dir)?;
    let batch = load_structures(&files)?;

    let ignore = match &args.ignore_file {
        Some(path) => read_id_list(path)?,
        None => BTreeSet::new(),
    };
    let mut chain_ids = BTreeSet::new();
    for structure in &batch.structures {
        for id in structure.chain_ids() {
            if !ignore.contains(&id) {
                chain_ids.insert(id);
            }
        }
    }
    let chain_ids: Vec<String> = chain_ids.into_iter().collect();
    log::info!("standardizing numbering across {} chain slot(s)", chain_ids.len());

    let aligner = args.aligner.build(&args.dirs.target_dir);
    let config = RenumberConfig {
        gap_threshold: args.gap_threshold,
    };
    let templates = run_with_spinner("Aligning chains and deriving numbering", || {
        Ok(renumber::build_templates(
            &batch.structures,
            &chain_ids,
            &aligner,
            &config,
        )?)
    })?;

    let jobs: Vec<RewriteJob> = batch
        .paths
        .iter()
        .zip(&batch.structures)
        .map(|(path, structure)| RewriteJob {
            source: path.clone(),
            dest: args.dirs.target_dir.join(structure_id_of(path)),
            edits: RewriteEdits {
                residue_map: templates[structure.id()].residue_map(),
                ..RewriteEdits::default()
            },
        })
        .collect();
    let results = rewrite_files(&jobs);
    report_rewrite_results(&results)?;

    let mut rows = Vec::new();
    for structure in &batch.structures {
        for (chain_id, old, new) in templates[structure.id()].iter() {
            rows.push(ResidueMapRow {
                old_id: format!("{chain_id}_{old}"),
                new_id: new.to_string(),
                file: structure.id().to_string(),
            });
        }
    }
    let map_path = args.dirs.target_dir.join(RESIDUE_MAP_FILE);
    report::write_residue_map(&map_path, &rows)?;

    println!(
        "Renumbered {} structure(s); residue map written to {}",
        batch.structures.len(),
        map_path.display()
    );
    Ok(())
}
