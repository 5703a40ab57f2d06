//! Boundary to the external sequence aligner.
//!
//! Alignment itself is delegated to an out-of-process tool; this module owns
//! the exchange format, the blocking invocation with its timeout and cache,
//! and the derived statistics the curation steps consume (identity scores,
//! per-column gap percentages).

mod error;
mod fasta;
mod muscle;
mod score;

pub use error::Error;
pub use fasta::{parse_records, write_records};
pub use muscle::MuscleAligner;
pub use score::score_identity;

/// The gap character used by the aligner.
pub const GAP: char = '-';

/// The alignment service seam. Implementations must preserve every input id
/// and return rows of one shared width, padded with [`GAP`].
pub trait Aligner {
    fn align(&self, sequences: &[(String, String)]) -> Result<Alignment, Error>;

    /// Like [`Aligner::align`], but with a caller-chosen cache key.
    /// Implementations without a cache may ignore the key.
    fn align_keyed(&self, _key: &str, sequences: &[(String, String)]) -> Result<Alignment, Error> {
        self.align(sequences)
    }
}

/// An id-keyed set of equal-length aligned sequences, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    rows: Vec<(String, String)>,
}

impl Alignment {
    /// Validates that all rows share one width and ids are unique.
    pub fn new(rows: Vec<(String, String)>) -> Result<Self, Error> {
        if let Some((first_id, first_seq)) = rows.first() {
            let width = first_seq.chars().count();
            for (id, sequence) in &rows {
                let len = sequence.chars().count();
                if len != width {
                    return Err(Error::shape(format!(
                        "'{id}' has {len} columns where '{first_id}' has {width}"
                    )));
                }
            }
            for (i, (id, _)) in rows.iter().enumerate() {
                if rows[..i].iter().any(|(other, _)| other == id) {
                    return Err(Error::shape(format!("duplicate sequence id '{id}'")));
                }
            }
        }
        Ok(Self { rows })
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(row_id, _)| row_id == id)
            .map(|(_, sequence)| sequence.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rows
            .iter()
            .map(|(id, sequence)| (id.as_str(), sequence.as_str()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns shared by every row.
    pub fn width(&self) -> usize {
        self.rows
            .first()
            .map(|(_, sequence)| sequence.chars().count())
            .unwrap_or(0)
    }

    /// Percentage of rows carrying a gap, per column. Drives the decision of
    /// where standardized numbering continues versus branches into
    /// letter-suffixed columns.
    pub fn gap_percentages(&self) -> Vec<f64> {
        let width = self.width();
        if self.rows.is_empty() {
            return Vec::new();
        }
        let mut gap_counts = vec![0usize; width];
        for (_, sequence) in &self.rows {
            for (column, symbol) in sequence.chars().enumerate() {
                if symbol == GAP {
                    gap_counts[column] += 1;
                }
            }
        }
        let total = self.rows.len() as f64;
        gap_counts
            .into_iter()
            .map(|count| count as f64 / total * 100.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alignment() -> Alignment {
        Alignment::new(vec![
            ("a".to_string(), "MK-V".to_string()),
            ("b".to_string(), "MKLV".to_string()),
            ("c".to_string(), "MK-V".to_string()),
            ("d".to_string(), "MKLV".to_string()),
        ])
        .unwrap()
    }

    #[test]
    fn alignment_rejects_ragged_rows() {
        let err = Alignment::new(vec![
            ("a".to_string(), "MKV".to_string()),
            ("b".to_string(), "MK".to_string()),
        ])
        .unwrap_err();

        assert!(matches!(err, Error::Shape { .. }));
    }

    #[test]
    fn alignment_rejects_duplicate_ids() {
        let err = Alignment::new(vec![
            ("a".to_string(), "MKV".to_string()),
            ("a".to_string(), "MKV".to_string()),
        ])
        .unwrap_err();

        assert!(matches!(err, Error::Shape { .. }));
    }

    #[test]
    fn get_returns_rows_by_id() {
        let alignment = alignment();

        assert_eq!(alignment.get("b"), Some("MKLV"));
        assert_eq!(alignment.get("z"), None);
    }

    #[test]
    fn width_reports_shared_column_count() {
        assert_eq!(alignment().width(), 4);
        assert_eq!(Alignment::default().width(), 0);
    }

    #[test]
    fn gap_percentages_count_per_column() {
        let percentages = alignment().gap_percentages();

        assert_eq!(percentages, vec![0.0, 0.0, 50.0, 0.0]);
    }

    #[test]
    fn gap_percentages_of_empty_alignment_are_empty() {
        assert!(Alignment::default().gap_percentages().is_empty());
    }
}
