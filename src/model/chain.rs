use super::ids::ResidueId;
use std::fmt;

/// The residue-name code for a residue that could not be translated.
pub const UNKNOWN_CODE: char = 'X';

/// One polymer chain of a structure, reduced to what curation needs: the
/// per-residue one-letter codes and the parallel author residue identities.
///
/// Two sequence views are derived from the same residue list and stay
/// reconcilable by index: [`Chain::full_sequence`] keeps every residue
/// (including untranslatable `'X'` entries) and lines up position-for-position
/// with [`Chain::residue_ids`]; [`Chain::matching_sequence`] drops the `'X'`
/// entries and is the view compared across structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub id: String,
    codes: Vec<char>,
    residues: Vec<ResidueId>,
}

impl Chain {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            codes: Vec::new(),
            residues: Vec::new(),
        }
    }

    pub fn push_residue(&mut self, code: char, residue: ResidueId) {
        self.codes.push(code);
        self.residues.push(residue);
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn codes(&self) -> &[char] {
        &self.codes
    }

    pub fn residue_ids(&self) -> &[ResidueId] {
        &self.residues
    }

    /// Every residue code in deposition order, unknowns included.
    pub fn full_sequence(&self) -> String {
        self.codes.iter().collect()
    }

    /// The sequence used for cross-structure comparison: unknowns stripped.
    pub fn matching_sequence(&self) -> String {
        self.codes
            .iter()
            .filter(|&&c| c != UNKNOWN_CODE)
            .collect()
    }

    /// Whether this chain is long enough to align reliably. Chains at or
    /// below `min_len` known residues stay out of the matching pool but are
    /// still renumbered.
    pub fn is_matchable(&self, min_len: usize) -> bool {
        self.codes.iter().filter(|&&c| c != UNKNOWN_CODE).count() > min_len
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chain {{ id: \"{}\", residues: {} }}",
            self.id,
            self.residue_count()
        )
    }
}
