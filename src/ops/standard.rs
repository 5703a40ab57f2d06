//! Canonical ("standard") sequence construction.
//!
//! Every logical chain slot gets exactly one reference sequence, either
//! copied verbatim from a user-designated reference structure or voted from
//! all inputs by consensus. The set is frozen before matching begins.

use crate::model::structure::Structure;
use crate::ops::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Chains whose matching sequence is at or below this length stay out of the
/// matching pool; they are too short to align reliably.
pub const MIN_MATCH_LEN: usize = 4;

/// The canonical sequence per chain slot, keyed by chain identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StandardSequences {
    sequences: BTreeMap<String, String>,
}

impl StandardSequences {
    /// Reference-structure mode: the designated structure's matchable chains
    /// become the canonical set, verbatim.
    pub fn from_reference(reference: &Structure, min_len: usize) -> Self {
        let mut sequences = BTreeMap::new();
        for chain in reference.iter_chains() {
            if chain.is_matchable(min_len) {
                sequences.insert(chain.id.clone(), chain.matching_sequence());
            }
        }
        Self { sequences }
    }

    /// Consensus mode: every candidate chain id gets the sequence with the
    /// highest containment-adjusted occurrence count across all structures.
    pub fn from_consensus(structures: &[Structure], chain_ids: &[String], min_len: usize) -> Self {
        let mut sequences = BTreeMap::new();
        for chain_id in chain_ids {
            let candidates: Vec<String> = structures
                .iter()
                .filter_map(|s| s.chain(chain_id))
                .filter(|c| c.is_matchable(min_len))
                .map(|c| c.matching_sequence())
                .collect();
            if let Some(winner) = consensus_sequence(&candidates) {
                log::debug!("consensus for chain slot '{chain_id}': {winner}");
                sequences.insert(chain_id.clone(), winner);
            }
        }
        Self { sequences }
    }

    pub fn insert(&mut self, chain_id: impl Into<String>, sequence: impl Into<String>) {
        self.sequences.insert(chain_id.into(), sequence.into());
    }

    pub fn remove(&mut self, chain_id: &str) -> Option<String> {
        self.sequences.remove(chain_id)
    }

    pub fn get(&self, chain_id: &str) -> Option<&str> {
        self.sequences.get(chain_id).map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sequences.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sequences
            .iter()
            .map(|(id, seq)| (id.as_str(), seq.as_str()))
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Loads a previously generated set from JSON.
    pub fn load_json(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::io("open", path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::StandardJson {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Saves the set as JSON so later runs can skip the build phase.
    pub fn save_json(&self, path: &Path) -> Result<(), Error> {
        let file = File::create(path).map_err(|e| Error::io("create", path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|source| {
            Error::StandardJson {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

/// The sorted union of matchable chain ids across all structures: the
/// candidate slots for consensus building.
pub fn union_chain_ids(structures: &[Structure], min_len: usize) -> Vec<String> {
    let mut ids = BTreeSet::new();
    for structure in structures {
        for id in structure.matchable_chain_ids(min_len) {
            ids.insert(id);
        }
    }
    ids.into_iter().collect()
}

/// Picks the consensus sequence from one chain slot's candidates.
///
/// Each distinct sequence scores its exact occurrence count, then every
/// sequence that is a literal substring of a longer one donates its raw
/// count to that longer sequence. Candidates are ranked in the stable order
/// "descending length, then lexicographic"; the first with the top score
/// wins. The containment bonus is deliberately non-transitive: donations use
/// raw counts, never previously boosted scores.
pub fn consensus_sequence(candidates: &[String]) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for sequence in candidates {
        *counts.entry(sequence.as_str()).or_insert(0) += 1;
    }

    let mut unique: Vec<&str> = counts.keys().copied().collect();
    unique.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut scores: HashMap<&str, usize> = counts.clone();
    for i in 0..unique.len() {
        for j in (i + 1)..unique.len() {
            if unique[i].contains(unique[j]) {
                *scores.get_mut(unique[i]).expect("scored above") += counts[unique[j]];
            }
        }
    }

    let top = unique.iter().map(|seq| scores[seq]).max()?;
    unique
        .iter()
        .find(|seq| scores[**seq] == top)
        .map(|seq| seq.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::chain::Chain;
    use crate::model::ids::ResidueId;

    fn structure(id: &str, chains: &[(&str, &str)]) -> Structure {
        let mut structure = Structure::new(id);
        for (chain_id, codes) in chains {
            let mut chain = Chain::new(chain_id);
            for (i, code) in codes.chars().enumerate() {
                chain.push_residue(code, ResidueId::new(i as i32 + 1));
            }
            structure.add_chain(chain);
        }
        structure
    }

    fn seqs(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn consensus_counts_exact_occurrences() {
        // Two structures deposit the same sequence under one slot: score 2,
        // no containment needed.
        let winner = consensus_sequence(&seqs(&["MKVLE", "MKVLE"])).unwrap();

        assert_eq!(winner, "MKVLE");
    }

    #[test]
    fn consensus_prefers_majority() {
        let winner = consensus_sequence(&seqs(&["MKVLE", "MKWLE", "MKWLE"])).unwrap();

        assert_eq!(winner, "MKWLE");
    }

    #[test]
    fn contained_sequences_donate_their_counts() {
        // "KVL" appears twice and is contained in "MKVLE", so the longer
        // sequence scores 1 + 2 and wins.
        let winner = consensus_sequence(&seqs(&["MKVLE", "KVL", "KVL"])).unwrap();

        assert_eq!(winner, "MKVLE");
    }

    #[test]
    fn containment_donates_raw_counts_not_boosted_scores() {
        // "VL" (x1) boosts "KVL" to 3, but "MKVLE" receives only the raw
        // counts 2 + 1 = 3 plus its own 1; it still wins with 4.
        let winner = consensus_sequence(&seqs(&["MKVLE", "KVL", "KVL", "VL"])).unwrap();

        assert_eq!(winner, "MKVLE");
    }

    #[test]
    fn ties_resolve_to_first_in_stable_order() {
        // Equal scores, equal lengths: lexicographically smaller wins.
        let winner = consensus_sequence(&seqs(&["MKZLE", "MKALE"])).unwrap();

        assert_eq!(winner, "MKALE");
    }

    #[test]
    fn consensus_of_no_candidates_is_none() {
        assert!(consensus_sequence(&[]).is_none());
    }

    #[test]
    fn from_reference_copies_matchable_chains_verbatim() {
        let reference = structure("ref.cif", &[("A", "MKVLE"), ("B", "MKV")]);

        let standards = StandardSequences::from_reference(&reference, MIN_MATCH_LEN);

        assert_eq!(standards.get("A"), Some("MKVLE"));
        // Chain B is below the matchable threshold.
        assert!(standards.get("B").is_none());
    }

    #[test]
    fn from_consensus_builds_one_entry_per_slot() {
        let structures = vec![
            structure("a.cif", &[("A", "MKVLE"), ("B", "GGGGG")]),
            structure("b.cif", &[("A", "MKVLE"), ("B", "GGGGG")]),
        ];
        let ids = union_chain_ids(&structures, MIN_MATCH_LEN);

        let standards = StandardSequences::from_consensus(&structures, &ids, MIN_MATCH_LEN);

        assert_eq!(standards.len(), 2);
        assert_eq!(standards.get("A"), Some("MKVLE"));
        assert_eq!(standards.get("B"), Some("GGGGG"));
    }

    #[test]
    fn union_chain_ids_is_sorted_and_deduplicated() {
        let structures = vec![
            structure("a.cif", &[("B", "MKVLE"), ("A", "MKVLE")]),
            structure("b.cif", &[("A", "MKVLE")]),
        ];

        assert_eq!(union_chain_ids(&structures, MIN_MATCH_LEN), vec!["A", "B"]);
    }

    #[test]
    fn json_round_trip_preserves_the_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("standards.json");
        let mut standards = StandardSequences::default();
        standards.insert("A", "MKVLE");
        standards.insert("B", "GGGGG");

        standards.save_json(&path).unwrap();
        let loaded = StandardSequences::load_json(&path).unwrap();

        assert_eq!(loaded, standards);
    }
}
