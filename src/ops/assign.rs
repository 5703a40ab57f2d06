//! Chain-identifier assignment: scores every local chain against every
//! canonical chain slot by pairwise alignment identity, then solves a
//! capacity-1 hospital/residents stable matching so each slot takes at most
//! one local chain per structure.
//!
//! Resolution is stateless across structures; only the canonical set and the
//! ignore list are shared, read-only.

use crate::align::{self, score_identity, Aligner, Alignment};
use crate::model::structure::Structure;
use crate::ops::error::Error;
use crate::ops::standard::{StandardSequences, MIN_MATCH_LEN};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Identity at or above which a local chain already carrying the canonical
/// id is accepted outright, skipping the remaining pairwise alignments for
/// that slot.
pub const SHORT_CIRCUIT_IDENTITY: f64 = 0.85;

const PAIR_REFERENCE: &str = "ref";
const PAIR_QUERY: &str = "qry";

#[derive(Debug, Clone)]
pub struct AssignConfig {
    /// Chain ids excluded from matching, on both the canonical and the
    /// local side.
    pub ignore: BTreeSet<String>,
    pub short_circuit_identity: f64,
    pub min_len: usize,
}

impl Default for AssignConfig {
    fn default() -> Self {
        Self {
            ignore: BTreeSet::new(),
            short_circuit_identity: SHORT_CIRCUIT_IDENTITY,
            min_len: MIN_MATCH_LEN,
        }
    }
}

/// One structure's resolved chain mapping: old id to destination id, with
/// the identity score that justified each assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainReassignment {
    mapping: BTreeMap<String, String>,
    scores: BTreeMap<String, f64>,
}

impl ChainReassignment {
    pub fn assign(&mut self, old_chain: impl Into<String>, new_chain: impl Into<String>, score: f64) {
        let old_chain = old_chain.into();
        self.mapping.insert(old_chain.clone(), new_chain.into());
        self.scores.insert(old_chain, score);
    }

    pub fn destination(&self, old_chain: &str) -> Option<&str> {
        self.mapping.get(old_chain).map(String::as_str)
    }

    pub fn score(&self, old_chain: &str) -> Option<f64> {
        self.scores.get(old_chain).copied()
    }

    pub fn contains_source(&self, chain_id: &str) -> bool {
        self.mapping.contains_key(chain_id)
    }

    pub fn contains_destination(&self, chain_id: &str) -> bool {
        self.mapping.values().any(|dest| dest == chain_id)
    }

    pub fn destinations(&self) -> BTreeSet<&str> {
        self.mapping.values().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.mapping.iter().map(|(old, new)| {
            (
                old.as_str(),
                new.as_str(),
                self.scores.get(old).copied().unwrap_or(0.0),
            )
        })
    }

    /// The old-to-new map alone, as the rewriter consumes it.
    pub fn chain_map(&self) -> BTreeMap<String, String> {
        self.mapping.clone()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Resolves one structure against the canonical set. The result maps each
/// matched local chain to its slot; locals that no slot wanted are absent
/// and keep their identifier unless [`resolve_unused_collisions`] has to
/// intervene.
pub fn resolve_structure(
    structure: &Structure,
    standards: &StandardSequences,
    aligner: &dyn Aligner,
    config: &AssignConfig,
) -> Result<ChainReassignment, Error> {
    if standards.is_empty() {
        return Err(Error::EmptyStandardSet);
    }

    let locals: BTreeMap<String, String> = structure
        .iter_chains()
        .filter(|c| c.is_matchable(config.min_len) && !config.ignore.contains(&c.id))
        .map(|c| (c.id.clone(), c.matching_sequence()))
        .collect();

    let matrix = score_matrix(structure.id(), &locals, standards, aligner, config)?;

    let slot_prefs: BTreeMap<String, Vec<String>> = matrix
        .iter()
        .map(|(slot, row)| (slot.clone(), preference_order(row)))
        .collect();
    let transposed = transpose(&matrix);
    let local_prefs: BTreeMap<String, Vec<String>> = transposed
        .iter()
        .map(|(local, row)| (local.clone(), preference_order(row)))
        .collect();

    let matched = stable_match(&slot_prefs, &local_prefs);

    let mut reassignment = ChainReassignment::default();
    for (local, slot) in matched {
        let score = matrix
            .get(&slot)
            .and_then(|row| row.get(&local))
            .copied()
            .unwrap_or(0.0);
        reassignment.assign(local, slot, score);
    }
    Ok(reassignment)
}

/// Gives every leftover local chain a collision-free destination.
///
/// A chain that no slot claimed keeps its identifier, unless that identifier
/// was handed to another chain as a destination. Such conflicts take the
/// first id from `candidates` that is distinct from every used destination
/// and from every still-unused identifier; running out is an error the
/// caller must surface for manual resolution.
pub fn resolve_unused_collisions(
    pool: &[String],
    candidates: &[String],
    reassignment: &mut ChainReassignment,
    structure_id: &str,
) -> Result<(), Error> {
    let unused: Vec<&String> = pool
        .iter()
        .filter(|id| !reassignment.contains_source(id))
        .collect();

    for chain_id in &unused {
        if !reassignment.contains_destination(chain_id) {
            continue;
        }
        let replacement = candidates
            .iter()
            .find(|candidate| {
                !reassignment.contains_source(candidate.as_str())
                    && !reassignment.contains_destination(candidate.as_str())
                    && !unused
                        .iter()
                        .any(|u| u.as_str() != chain_id.as_str() && u.as_str() == candidate.as_str())
            })
            .cloned();
        match replacement {
            Some(new_id) => {
                log::warn!(
                    "structure '{structure_id}': chain '{chain_id}' lost its identifier to a \
                     reassignment, moving it to '{new_id}'"
                );
                reassignment.assign(chain_id.as_str(), new_id, 0.0);
            }
            None => {
                return Err(Error::NoFreeIdentifier {
                    structure: structure_id.to_string(),
                    chain_id: chain_id.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Applies a user-chosen destination for one leftover chain, validating it
/// against every existing source and destination identifier. Identifiers
/// are truncated to the two characters the format allows.
pub fn assign_destination(
    reassignment: &mut ChainReassignment,
    pool: &[String],
    old_chain: &str,
    new_id: &str,
) -> Result<(), Error> {
    let trimmed: String = new_id.chars().take(2).collect();
    if trimmed.is_empty() {
        return Err(Error::invalid_identifier(new_id, "empty identifier"));
    }
    if reassignment.contains_destination(&trimmed) {
        return Err(Error::invalid_identifier(
            &trimmed,
            "already used as a destination",
        ));
    }
    let still_unused = pool
        .iter()
        .any(|id| id == &trimmed && id != old_chain && !reassignment.contains_source(id));
    if still_unused {
        return Err(Error::invalid_identifier(
            &trimmed,
            "an unassigned chain keeps this identifier",
        ));
    }
    reassignment.assign(old_chain, trimmed, 0.0);
    Ok(())
}

/// Resolves every structure in turn, collision handling included.
pub fn resolve_batch(
    structures: &[Structure],
    standards: &StandardSequences,
    aligner: &dyn Aligner,
    config: &AssignConfig,
) -> Result<BTreeMap<String, ChainReassignment>, Error> {
    let candidates: Vec<String> = standards.ids().map(str::to_string).collect();
    let mut results = BTreeMap::new();
    for structure in structures {
        log::info!("assigning chains for '{}'", structure.id());
        let mut reassignment = resolve_structure(structure, standards, aligner, config)?;
        let pool: Vec<String> = structure
            .matchable_chain_ids(config.min_len)
            .into_iter()
            .filter(|id| !config.ignore.contains(id))
            .collect();
        resolve_unused_collisions(&pool, &candidates, &mut reassignment, structure.id())?;
        results.insert(structure.id().to_string(), reassignment);
    }
    Ok(results)
}

fn score_matrix(
    structure_id: &str,
    locals: &BTreeMap<String, String>,
    standards: &StandardSequences,
    aligner: &dyn Aligner,
    config: &AssignConfig,
) -> Result<BTreeMap<String, BTreeMap<String, f64>>, Error> {
    let mut matrix = BTreeMap::new();

    for (slot_id, slot_seq) in standards.iter() {
        if config.ignore.contains(slot_id) {
            continue;
        }
        let mut row = BTreeMap::new();

        // A local chain already filed under the canonical id usually is the
        // right one; accept it outright when the identity clears the bar.
        if let Some(local_seq) = locals.get(slot_id) {
            let score = pairwise(aligner, structure_id, slot_id, slot_seq, local_seq)?;
            if score >= config.short_circuit_identity {
                for local_id in locals.keys() {
                    let value = if local_id == slot_id { score } else { 0.0 };
                    row.insert(local_id.clone(), value);
                }
                matrix.insert(slot_id.to_string(), row);
                continue;
            }
        }

        for (local_id, local_seq) in locals {
            let score = pairwise(aligner, structure_id, slot_id, slot_seq, local_seq)?;
            row.insert(local_id.clone(), score);
        }
        matrix.insert(slot_id.to_string(), row);
    }
    Ok(matrix)
}

fn pairwise(
    aligner: &dyn Aligner,
    structure_id: &str,
    slot_id: &str,
    slot_seq: &str,
    local_seq: &str,
) -> Result<f64, Error> {
    let context = || format!("scoring a chain of '{structure_id}' against slot '{slot_id}'");
    let rows = vec![
        (PAIR_REFERENCE.to_string(), slot_seq.to_string()),
        (PAIR_QUERY.to_string(), local_seq.to_string()),
    ];
    let alignment = aligner
        .align(&rows)
        .map_err(|e| Error::alignment(context(), e))?;
    let reference = aligned_row(&alignment, PAIR_REFERENCE).map_err(|e| Error::alignment(context(), e))?;
    let query = aligned_row(&alignment, PAIR_QUERY).map_err(|e| Error::alignment(context(), e))?;
    Ok(score_identity(reference, query))
}

fn aligned_row<'a>(alignment: &'a Alignment, id: &str) -> Result<&'a str, align::Error> {
    alignment
        .get(id)
        .ok_or_else(|| align::Error::shape(format!("aligner dropped row '{id}'")))
}

/// Ranks the ids of one score row: descending score, ties by ascending id.
fn preference_order(row: &BTreeMap<String, f64>) -> Vec<String> {
    let mut ids: Vec<&String> = row.keys().collect();
    ids.sort_by(|a, b| {
        row[*b]
            .partial_cmp(&row[*a])
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(b))
    });
    ids.into_iter().cloned().collect()
}

fn transpose(
    matrix: &BTreeMap<String, BTreeMap<String, f64>>,
) -> BTreeMap<String, BTreeMap<String, f64>> {
    let mut transposed: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for (slot, row) in matrix {
        for (local, &score) in row {
            transposed
                .entry(local.clone())
                .or_default()
                .insert(slot.clone(), score);
        }
    }
    transposed
}

/// Deferred-acceptance stable matching with capacity 1 per slot. Locals
/// propose down their preference lists; a slot holds its best proposal and
/// bumps the previous holder back into the free queue.
fn stable_match(
    slot_prefs: &BTreeMap<String, Vec<String>>,
    local_prefs: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, String> {
    let ranks: BTreeMap<&str, BTreeMap<&str, usize>> = slot_prefs
        .iter()
        .map(|(slot, prefs)| {
            let by_local = prefs
                .iter()
                .enumerate()
                .map(|(rank, local)| (local.as_str(), rank))
                .collect();
            (slot.as_str(), by_local)
        })
        .collect();

    let mut next_choice: BTreeMap<&str, usize> =
        local_prefs.keys().map(|local| (local.as_str(), 0)).collect();
    let mut held: BTreeMap<&str, &str> = BTreeMap::new();
    let mut free: VecDeque<&str> = local_prefs.keys().map(String::as_str).collect();

    while let Some(local) = free.pop_front() {
        let prefs = &local_prefs[local];
        loop {
            let choice = next_choice.get_mut(local).expect("queued local is known");
            if *choice >= prefs.len() {
                break;
            }
            let slot = prefs[*choice].as_str();
            *choice += 1;

            let Some(slot_ranks) = ranks.get(slot) else {
                continue;
            };
            let Some(&proposer_rank) = slot_ranks.get(local) else {
                continue;
            };
            match held.get(slot) {
                None => {
                    held.insert(slot, local);
                    break;
                }
                Some(&holder) => {
                    if proposer_rank < slot_ranks[holder] {
                        held.insert(slot, local);
                        free.push_back(holder);
                        break;
                    }
                }
            }
        }
    }

    held.into_iter()
        .map(|(slot, local)| (local.to_string(), slot.to_string()))
        .collect()
}
