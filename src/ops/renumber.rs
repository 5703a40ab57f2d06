//! Residue-number standardization.
//!
//! For each chain slot, every structure's sequence under that slot goes
//! through one multiple alignment; the per-column gap profile then yields a
//! numbering shared by all of them. Columns where most structures have a
//! residue advance a running counter; columns dominated by gaps keep the
//! previous number and take a cycling letter suffix instead, so sporadic
//! insertions never shift the numbering of everything behind them.

use crate::align::{Aligner, GAP};
use crate::model::ids::{ChainKey, NewResidueId, ResidueId};
use crate::model::structure::Structure;
use crate::ops::error::Error;
use std::collections::BTreeMap;

/// Columns with at least this percentage of gaps are treated as
/// no-consensus columns and get letter-suffixed numbers.
pub const GAP_COLUMN_THRESHOLD: f64 = 30.0;

/// Suffix cycle for consecutive no-consensus columns, restarted after every
/// consensus column.
pub const GAP_LETTERS: [char; 52] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j',
    'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

#[derive(Debug, Clone)]
pub struct RenumberConfig {
    /// Gap percentage at which a column stops advancing the counter.
    pub gap_threshold: f64,
}

impl Default for RenumberConfig {
    fn default() -> Self {
        Self {
            gap_threshold: GAP_COLUMN_THRESHOLD,
        }
    }
}

/// One structure's renumbering map: `(chain id, old residue id)` to the
/// standardized residue id. Built once per batch, consumed by the rewriter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionTemplate {
    entries: BTreeMap<(String, ResidueId), NewResidueId>,
}

impl ConversionTemplate {
    pub fn insert(&mut self, chain_id: impl Into<String>, old: ResidueId, new: NewResidueId) {
        self.entries.insert((chain_id.into(), old), new);
    }

    pub fn get(&self, chain_id: &str, old: ResidueId) -> Option<NewResidueId> {
        self.entries.get(&(chain_id.to_string(), old)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ResidueId, NewResidueId)> {
        self.entries
            .iter()
            .map(|((chain, old), new)| (chain.as_str(), *old, *new))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The map in the shape the rewriter takes.
    pub fn residue_map(&self) -> BTreeMap<(String, ResidueId), NewResidueId> {
        self.entries.clone()
    }
}

/// Derives the shared column numbering from a gap profile.
///
/// The counter advances at every column under the threshold. A column at or
/// above it repeats the previous counter value with a letter suffix; the
/// suffix cycles A..Z then a..z through a run of such columns and restarts
/// after the next consensus column. A run before the first consensus column
/// suffixes 0.
pub fn column_numbering(gap_percentages: &[f64], threshold: f64) -> Vec<NewResidueId> {
    let mut numbering = Vec::with_capacity(gap_percentages.len());
    let mut counter = 0;
    let mut run = 0usize;
    for &gap_pct in gap_percentages {
        if gap_pct < threshold {
            counter += 1;
            numbering.push(NewResidueId::new(counter));
            run = 0;
        } else {
            numbering.push(NewResidueId::with_suffix(
                counter,
                GAP_LETTERS[run % GAP_LETTERS.len()],
            ));
            run += 1;
        }
    }
    numbering
}

/// Builds every structure's [`ConversionTemplate`] for the given chain
/// slots.
///
/// Each slot is aligned once across all structures that carry it, keyed by
/// structure id; walking a structure's aligned row maps its non-gap columns,
/// in order, onto that chain's original residue identities. Every residue of
/// every covered chain ends up with exactly one entry.
pub fn build_templates(
    structures: &[Structure],
    chain_ids: &[String],
    aligner: &dyn Aligner,
    config: &RenumberConfig,
) -> Result<BTreeMap<String, ConversionTemplate>, Error> {
    let mut templates: BTreeMap<String, ConversionTemplate> = structures
        .iter()
        .map(|s| (s.id().to_string(), ConversionTemplate::default()))
        .collect();

    let pool: BTreeMap<ChainKey, String> = structures
        .iter()
        .flat_map(|s| {
            s.iter_chains()
                .map(|c| (ChainKey::new(s.id(), c.id.as_str()), c.full_sequence()))
        })
        .collect();

    for chain_id in chain_ids {
        let rows: Vec<(String, String)> = structures
            .iter()
            .filter_map(|s| {
                pool.get(&ChainKey::new(s.id(), chain_id.as_str()))
                    .map(|sequence| (s.id().to_string(), sequence.clone()))
            })
            .collect();
        if rows.is_empty() {
            continue;
        }
        log::info!(
            "aligning {} sequences for chain slot '{chain_id}'",
            rows.len()
        );

        let alignment = aligner
            .align_keyed(chain_id, &rows)
            .map_err(|e| Error::alignment(format!("renumbering chain slot '{chain_id}'"), e))?;
        let numbering = column_numbering(&alignment.gap_percentages(), config.gap_threshold);

        for structure in structures {
            let Some(chain) = structure.chain(chain_id) else {
                continue;
            };
            let Some(aligned_row) = alignment.get(structure.id()) else {
                continue;
            };
            let template = templates
                .get_mut(structure.id())
                .expect("every structure was seeded above");
            let residues = chain.residue_ids();

            let mut next_residue = 0usize;
            for (column, symbol) in aligned_row.chars().enumerate() {
                if symbol == GAP {
                    continue;
                }
                if next_residue >= residues.len() {
                    return Err(Error::TemplateMismatch {
                        structure: structure.id().to_string(),
                        chain_id: chain_id.clone(),
                        aligned: next_residue + 1,
                        expected: residues.len(),
                    });
                }
                template.insert(chain_id.clone(), residues[next_residue], numbering[column]);
                next_residue += 1;
            }
            if next_residue != residues.len() {
                return Err(Error::TemplateMismatch {
                    structure: structure.id().to_string(),
                    chain_id: chain_id.clone(),
                    aligned: next_residue,
                    expected: residues.len(),
                });
            }
        }
    }
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::{self, Alignment};
    use crate::model::chain::Chain;

    /// Test aligner that right-pads rows with gaps instead of shelling out.
    struct PadAligner;

    impl Aligner for PadAligner {
        fn align(&self, sequences: &[(String, String)]) -> Result<Alignment, align::Error> {
            let width = sequences
                .iter()
                .map(|(_, s)| s.chars().count())
                .max()
                .unwrap_or(0);
            let rows = sequences
                .iter()
                .map(|(id, s)| {
                    let mut padded = s.clone();
                    while padded.chars().count() < width {
                        padded.push('-');
                    }
                    (id.clone(), padded)
                })
                .collect();
            Alignment::new(rows)
        }
    }

    fn structure(id: &str, chains: &[(&str, &str, &[i32])]) -> Structure {
        let mut structure = Structure::new(id);
        for (chain_id, codes, numbers) in chains {
            let mut chain = Chain::new(chain_id);
            for (code, number) in codes.chars().zip(numbers.iter()) {
                chain.push_residue(code, ResidueId::new(*number));
            }
            structure.add_chain(chain);
        }
        structure
    }

    #[test]
    fn consensus_columns_count_monotonically() {
        let numbering = column_numbering(&[0.0, 10.0, 29.9], 30.0);

        assert_eq!(
            numbering,
            vec![
                NewResidueId::new(1),
                NewResidueId::new(2),
                NewResidueId::new(3),
            ]
        );
    }

    #[test]
    fn high_gap_columns_take_letter_suffixes() {
        let numbering = column_numbering(&[0.0, 60.0, 60.0, 0.0], 30.0);

        assert_eq!(
            numbering,
            vec![
                NewResidueId::new(1),
                NewResidueId::with_suffix(1, 'A'),
                NewResidueId::with_suffix(1, 'B'),
                NewResidueId::new(2),
            ]
        );
    }

    #[test]
    fn letter_cycle_restarts_after_each_consensus_column() {
        let numbering = column_numbering(&[0.0, 60.0, 0.0, 60.0], 30.0);

        assert_eq!(numbering[1], NewResidueId::with_suffix(1, 'A'));
        assert_eq!(numbering[3], NewResidueId::with_suffix(2, 'A'));
    }

    #[test]
    fn run_before_first_consensus_column_suffixes_zero() {
        let numbering = column_numbering(&[60.0, 0.0], 30.0);

        assert_eq!(numbering[0], NewResidueId::with_suffix(0, 'A'));
        assert_eq!(numbering[1], NewResidueId::new(1));
    }

    #[test]
    fn letter_cycle_wraps_past_fifty_two_columns() {
        let gaps = vec![60.0; 54];
        let numbering = column_numbering(&gaps, 30.0);

        assert_eq!(numbering[51], NewResidueId::with_suffix(0, 'z'));
        assert_eq!(numbering[52], NewResidueId::with_suffix(0, 'A'));
    }

    #[test]
    fn threshold_boundary_is_exclusive() {
        let numbering = column_numbering(&[30.0], 30.0);

        assert_eq!(numbering[0], NewResidueId::with_suffix(0, 'A'));
    }

    #[test]
    fn template_maps_every_residue_exactly_once() {
        let structures = vec![
            structure("a.cif", &[("A", "MKV", &[5, 6, 9])]),
            structure("b.cif", &[("A", "MKV", &[1, 2, 3])]),
        ];

        let templates = build_templates(
            &structures,
            &["A".to_string()],
            &PadAligner,
            &RenumberConfig::default(),
        )
        .unwrap();

        let a = &templates["a.cif"];
        assert_eq!(a.len(), 3);
        assert_eq!(a.get("A", ResidueId::new(5)), Some(NewResidueId::new(1)));
        assert_eq!(a.get("A", ResidueId::new(9)), Some(NewResidueId::new(3)));
        let b = &templates["b.cif"];
        assert_eq!(b.get("A", ResidueId::new(3)), Some(NewResidueId::new(3)));
    }

    #[test]
    fn gap_positions_are_skipped_for_absent_residues() {
        // "b.cif" is one residue short; the pad aligner gives it a trailing
        // gap. That column is 50% gaps, over the threshold, so the residue
        // only "a.cif" has lands on a letter-suffixed number.
        let structures = vec![
            structure("a.cif", &[("A", "MKVL", &[1, 2, 3, 4])]),
            structure("b.cif", &[("A", "MKV", &[1, 2, 3])]),
        ];

        let templates = build_templates(
            &structures,
            &["A".to_string()],
            &PadAligner,
            &RenumberConfig::default(),
        )
        .unwrap();

        assert_eq!(templates["b.cif"].len(), 3);
        assert_eq!(
            templates["a.cif"].get("A", ResidueId::new(4)),
            Some(NewResidueId::with_suffix(3, 'A'))
        );
    }

    #[test]
    fn insertion_codes_key_distinct_residues() {
        let mut chain = Chain::new("A");
        chain.push_residue('M', ResidueId::new(1));
        chain.push_residue('K', ResidueId::with_icode(1, 'A'));
        let mut s = Structure::new("a.cif");
        s.add_chain(chain);

        let templates = build_templates(
            &[s],
            &["A".to_string()],
            &PadAligner,
            &RenumberConfig::default(),
        )
        .unwrap();

        let template = &templates["a.cif"];
        assert_eq!(template.len(), 2);
        assert_eq!(
            template.get("A", ResidueId::with_icode(1, 'A')),
            Some(NewResidueId::new(2))
        );
    }

    #[test]
    fn templates_are_deterministic() {
        let structures = vec![
            structure("a.cif", &[("A", "MKVL", &[1, 2, 3, 4])]),
            structure("b.cif", &[("A", "MVL", &[7, 8, 9])]),
        ];
        let ids = vec!["A".to_string()];

        let first =
            build_templates(&structures, &ids, &PadAligner, &RenumberConfig::default()).unwrap();
        let second =
            build_templates(&structures, &ids, &PadAligner, &RenumberConfig::default()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn integer_numbers_never_decrease_along_a_chain() {
        let structures = vec![
            structure("a.cif", &[("A", "MKVLE", &[10, 11, 12, 13, 14])]),
            structure("b.cif", &[("A", "MKV", &[1, 2, 3])]),
        ];

        let templates = build_templates(
            &structures,
            &["A".to_string()],
            &PadAligner,
            &RenumberConfig::default(),
        )
        .unwrap();

        let chain_a: Vec<NewResidueId> = (10..=14)
            .map(|n| templates["a.cif"].get("A", ResidueId::new(n)).unwrap())
            .collect();
        for pair in chain_a.windows(2) {
            assert!(pair[0].number <= pair[1].number);
        }
    }

    #[test]
    fn mismatched_alignment_is_a_template_error() {
        struct TruncatingAligner;
        impl Aligner for TruncatingAligner {
            fn align(&self, sequences: &[(String, String)]) -> Result<Alignment, align::Error> {
                let rows = sequences
                    .iter()
                    .map(|(id, _)| (id.clone(), "M".to_string()))
                    .collect();
                Alignment::new(rows)
            }
        }

        let structures = vec![structure("a.cif", &[("A", "MKV", &[1, 2, 3])])];
        let err = build_templates(
            &structures,
            &["A".to_string()],
            &TruncatingAligner,
            &RenumberConfig::default(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::TemplateMismatch { .. }));
    }
}
