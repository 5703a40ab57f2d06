use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use cifcurate::io::report::{self, EntityMapRow};
use cifcurate::io::{rewrite_files, RewriteEdits, RewriteJob, DEFAULT_CONCAT_STRIDE};
use cifcurate::ops::concat::{problem_count, ConcatenationState};
use cifcurate::ops::entity::EntityConversionSet;
use cifcurate::ops::Error;
use cifcurate::Structure;

use super::{
    ensure_target_dir, list_cif_files, load_structures, report_rewrite_results, structure_id_of,
    DirArgs,
};

/// Entity report file name written by `--entity-report`.
const ENTITY_REPORT_FILE: &str = "Entity_File_Map.csv";

#[derive(Args, Debug)]
pub struct EntitiesArgs {
    #[command(flatten)]
    pub dirs: DirArgs,
    /// Entity-to-chain conversion file, `ENTITY:chain1,chain2,...` per line.
    #[arg(long, value_name = "FILE")]
    pub conversion_file: PathBuf,
    /// Accept every proposed concatenation without interactive review.
    #[arg(long)]
    pub accept_all: bool,
    /// Residue-number stride separating concatenated chains.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CONCAT_STRIDE)]
    pub stride: i32,
    /// Also write the Entity:File:Chains report.
    #[arg(long)]
    pub entity_report: bool,
}

pub fn run(args: &EntitiesArgs) -> Result<()> {
    ensure_target_dir(&args.dirs.target_dir)?;
    let files = list_cif_files(&args.dirs.source_dir)?;
    let batch = load_structures(&files)?;

    let mut conversions = EntityConversionSet::from_structures(&batch.structures);
    log::info!("found {} distinct entit(ies)", conversions.len());
    conversions.load_conversion_file(&args.conversion_file)?;

    let incomplete: Vec<_> = conversions.incomplete().collect();
    if !incomplete.is_empty() {
        eprintln!("Unassigned conversions (expected:entity:assigned):");
        for conversion in &incomplete {
            eprintln!(
                "{}:{}:{}",
                conversion.expected,
                conversion.name,
                conversion.destinations().join(",")
            );
        }
        return Err(Error::Incomplete {
            count: incomplete.len(),
        }
        .into());
    }

    let mut chain_maps: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut concat_states: BTreeMap<String, ConcatenationState> = BTreeMap::new();
    for structure in &batch.structures {
        let chain_map = conversions.chain_map_for(structure)?;
        let order = entity_source_order(structure);
        let state = ConcatenationState::from_chain_map(&chain_map, &order);
        chain_maps.insert(structure.id().to_string(), chain_map);
        concat_states.insert(structure.id().to_string(), state);
    }

    let unconfirmed = problem_count(concat_states.values());
    if unconfirmed > 0 {
        if args.accept_all {
            for state in concat_states.values_mut() {
                state.accept_all();
            }
            log::info!("accepted {unconfirmed} proposed concatenation(s)");
        } else {
            eprintln!("Proposed concatenations awaiting review (file:chain:destination:order):");
            for (structure_id, state) in &concat_states {
                let chain_map = &chain_maps[structure_id];
                for chain in state.incomplete_chains() {
                    eprintln!(
                        "{}:{}:{}:{}",
                        structure_id,
                        chain,
                        chain_map.get(chain).map(String::as_str).unwrap_or("?"),
                        state.order_of(chain)
                    );
                }
            }
            eprintln!("Re-run with --accept-all once the plan is correct.");
            return Err(Error::Incomplete { count: unconfirmed }.into());
        }
    }

    let jobs: Vec<RewriteJob> = batch
        .paths
        .iter()
        .zip(&batch.structures)
        .map(|(path, structure)| {
            let state = &concat_states[structure.id()];
            RewriteJob {
                source: path.clone(),
                dest: args.dirs.target_dir.join(structure_id_of(path)),
                edits: RewriteEdits {
                    chain_map: chain_maps[structure.id()].clone(),
                    concat_orders: state.orders().clone(),
                    concat_stride: args.stride,
                    ..RewriteEdits::default()
                },
            }
        })
        .collect();
    let results = rewrite_files(&jobs);
    report_rewrite_results(&results)?;

    if args.entity_report {
        let mut rows = Vec::new();
        for structure in &batch.structures {
            for entity in structure.iter_entities() {
                rows.push(EntityMapRow {
                    entity: entity.description.clone(),
                    file: structure.id().to_string(),
                    chain_count: entity.chain_count(),
                });
            }
        }
        let path = args.dirs.target_dir.join(ENTITY_REPORT_FILE);
        report::write_entity_map(&path, &rows)?;
        log::info!("wrote entity report to {}", path.display());
    }

    println!(
        "Converted {} structure(s) into {}",
        batch.structures.len(),
        args.dirs.target_dir.display()
    );
    Ok(())
}

/// Source chains in the order the conversion walked them: entities in file
/// order, each entity's chains in first-seen order.
fn entity_source_order(structure: &Structure) -> Vec<String> {
    structure
        .iter_entities()
        .flat_map(|entity| entity.chain_ids().iter().cloned())
        .collect()
}
