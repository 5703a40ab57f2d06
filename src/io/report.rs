//! Colon-delimited report files produced alongside the rewritten
//! depositions: the chain-reassignment record, the residue-renumbering map,
//! and the entity-to-files listing.

use crate::io::error::Error;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

/// File name of the append-mode chain reassignment record.
pub const CHAIN_RECORD_FILE: &str = "ChainStandardizationRecord.txt";

/// File name of the residue renumbering map.
pub const RESIDUE_MAP_FILE: &str = "OldResID_NewResID_Map.csv";

/// One chain reassignment: `structure:old:new:score`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRecordRow {
    pub structure: String,
    pub old_chain: String,
    pub new_chain: String,
    pub score: f64,
}

/// One renumbered residue: `old:new:file`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidueMapRow {
    pub old_id: String,
    pub new_id: String,
    pub file: String,
}

/// One entity observation: `entity:file:chains`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMapRow {
    pub entity: String,
    pub file: String,
    pub chain_count: usize,
}

/// Appends chain reassignments to the record file, creating it on first use.
/// Append mode lets successive curation runs share one audit trail.
pub fn append_chain_records<'a>(
    path: &Path,
    rows: impl IntoIterator<Item = &'a ChainRecordRow>,
) -> Result<(), Error> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        writeln!(
            writer,
            "{}:{}:{}:{}",
            row.structure, row.old_chain, row.new_chain, row.score
        )
        .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    }
    writer
        .flush()
        .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))
}

/// Writes the residue renumbering map with its `OldResID:NewResId:File`
/// header, replacing any previous map.
pub fn write_residue_map<'a>(
    path: &Path,
    rows: impl IntoIterator<Item = &'a ResidueMapRow>,
) -> Result<(), Error> {
    let file = std::fs::File::create(path)
        .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "OldResID:NewResId:File")
        .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    for row in rows {
        writeln!(writer, "{}:{}:{}", row.old_id, row.new_id, row.file)
            .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    }
    writer
        .flush()
        .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))
}

/// Writes the entity-to-files listing with its `Entity:File:Chains` header.
pub fn write_entity_map<'a>(
    path: &Path,
    rows: impl IntoIterator<Item = &'a EntityMapRow>,
) -> Result<(), Error> {
    let file = std::fs::File::create(path)
        .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "Entity:File:Chains")
        .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    for row in rows {
        writeln!(writer, "{}:{}:{}", row.entity, row.file, row.chain_count)
            .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    }
    writer
        .flush()
        .map_err(|e| Error::from_io(e, Some(path.to_path_buf())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_records_append_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CHAIN_RECORD_FILE);

        let first = vec![ChainRecordRow {
            structure: "1abc.cif".to_string(),
            old_chain: "X".to_string(),
            new_chain: "A".to_string(),
            score: 1.0,
        }];
        let second = vec![ChainRecordRow {
            structure: "2def.cif".to_string(),
            old_chain: "B".to_string(),
            new_chain: "B".to_string(),
            score: 0.25,
        }];

        append_chain_records(&path, &first).unwrap();
        append_chain_records(&path, &second).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1abc.cif:X:A:1\n2def.cif:B:B:0.25\n");
    }

    #[test]
    fn residue_map_starts_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESIDUE_MAP_FILE);

        let rows = vec![ResidueMapRow {
            old_id: "A_10".to_string(),
            new_id: "12".to_string(),
            file: "1abc.cif".to_string(),
        }];
        write_residue_map(&path, &rows).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "OldResID:NewResId:File\nA_10:12:1abc.cif\n");
    }

    #[test]
    fn entity_map_lists_one_row_per_observation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.csv");

        let rows = vec![
            EntityMapRow {
                entity: "INSULIN".to_string(),
                file: "1abc.cif".to_string(),
                chain_count: 2,
            },
            EntityMapRow {
                entity: "INSULIN".to_string(),
                file: "2def.cif".to_string(),
                chain_count: 1,
            },
        ];
        write_entity_map(&path, &rows).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Entity:File:Chains\nINSULIN:1abc.cif:2\nINSULIN:2def.cif:1\n"
        );
    }
}
