//! Entity-to-chain conversion planning.
//!
//! Every distinct entity description across the batch gets one
//! [`EntityConversion`] holding the destination chain ids the curator
//! assigns to it. A conversion is complete once it has at least as many
//! destinations as the largest chain count that entity shows in any single
//! structure; the batch cannot proceed to rewriting until all conversions
//! are complete.

use crate::model::structure::Structure;
use crate::ops::error::Error;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One entity's planned conversion: its description, the most chains it
/// occupies in any one structure, and the destination ids assigned so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityConversion {
    pub name: String,
    pub expected: usize,
    destinations: Vec<String>,
}

impl EntityConversion {
    pub fn new(name: impl Into<String>, expected: usize) -> Self {
        Self {
            name: name.into(),
            expected,
            destinations: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.destinations.len() >= self.expected
    }

    /// Adds a destination id, ignoring repeats.
    pub fn add_destination(&mut self, chain_id: &str) {
        if !self.destinations.iter().any(|c| c == chain_id) {
            self.destinations.push(chain_id.to_string());
        }
    }

    pub fn remove_destination(&mut self, chain_id: &str) {
        self.destinations.retain(|c| c != chain_id);
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }
}

/// The batch-wide conversion plan, one entry per distinct entity
/// description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityConversionSet {
    conversions: BTreeMap<String, EntityConversion>,
}

impl EntityConversionSet {
    /// Scans every structure and seeds one conversion per entity, with the
    /// expected count set to the maximum chains that entity occupies in any
    /// single structure.
    pub fn from_structures(structures: &[Structure]) -> Self {
        let mut conversions: BTreeMap<String, EntityConversion> = BTreeMap::new();
        for structure in structures {
            for entity in structure.iter_entities() {
                let conversion = conversions
                    .entry(entity.description.clone())
                    .or_insert_with(|| EntityConversion::new(&entity.description, 0));
                conversion.expected = conversion.expected.max(entity.chain_count());
            }
        }
        Self { conversions }
    }

    pub fn get(&self, name: &str) -> Option<&EntityConversion> {
        self.conversions.get(&name.to_uppercase())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut EntityConversion> {
        self.conversions.get_mut(&name.to_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityConversion> {
        self.conversions.values()
    }

    /// Conversions whose destination list is still short.
    pub fn incomplete(&self) -> impl Iterator<Item = &EntityConversion> {
        self.conversions.values().filter(|c| !c.is_complete())
    }

    pub fn is_complete(&self) -> bool {
        self.conversions.values().all(|c| c.is_complete())
    }

    pub fn len(&self) -> usize {
        self.conversions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }

    /// Case-insensitive substring search over entity names.
    pub fn search(&self, term: &str) -> Vec<&EntityConversion> {
        let term = term.to_uppercase();
        self.conversions
            .values()
            .filter(|c| c.name.contains(&term))
            .collect()
    }

    /// Loads `NAME:chain1,chain2,...` lines, appending destinations to the
    /// matching conversions. Unknown entity names are an error; the file is
    /// the curator's statement about this batch, so a stray name means a
    /// typo or the wrong file.
    pub fn load_conversion_file(&mut self, path: &Path) -> Result<(), Error> {
        let file = File::open(path).map_err(|e| Error::io("open", path, e))?;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line_number = index + 1;
            let line = line.map_err(|e| Error::io("read", path, e))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (name, chains) = trimmed.split_once(':').ok_or_else(|| {
                Error::conversion_file(path, line_number, "expected 'ENTITY:chain1,chain2,...'")
            })?;
            let conversion = self.get_mut(name.trim()).ok_or_else(|| {
                Error::conversion_file(
                    path,
                    line_number,
                    format!("unknown entity '{}'", name.trim()),
                )
            })?;
            for chain_id in chains.split(',') {
                let chain_id = chain_id.trim();
                if !chain_id.is_empty() {
                    conversion.add_destination(chain_id);
                }
            }
        }
        Ok(())
    }

    /// Builds one structure's old-to-new chain map by walking its entities
    /// in file order and pairing each entity's chains with that entity's
    /// destination list, position by position.
    pub fn chain_map_for(&self, structure: &Structure) -> Result<BTreeMap<String, String>, Error> {
        let mut map = BTreeMap::new();
        for entity in structure.iter_entities() {
            let Some(conversion) = self.get(&entity.description) else {
                continue;
            };
            if conversion.destinations.len() < entity.chain_count() {
                return Err(Error::MissingDestinations {
                    entity: entity.description.clone(),
                    needed: entity.chain_count(),
                    assigned: conversion.destinations.len(),
                });
            }
            for (old_chain, new_chain) in
                entity.chain_ids().iter().zip(&conversion.destinations)
            {
                map.insert(old_chain.clone(), new_chain.clone());
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::chain::Chain;
    use crate::model::ids::ResidueId;

    fn structure(id: &str, entities: &[(&str, &[&str])]) -> Structure {
        let mut structure = Structure::new(id);
        for (description, chains) in entities {
            for chain_id in *chains {
                let mut chain = Chain::new(chain_id);
                chain.push_residue('M', ResidueId::new(1));
                structure.add_chain(chain);
                structure.record_entity_chain(description, chain_id);
            }
        }
        structure
    }

    #[test]
    fn from_structures_takes_max_occurrence_per_entity() {
        let structures = vec![
            structure("a.cif", &[("INSULIN", &["A", "B"])]),
            structure("b.cif", &[("INSULIN", &["A"]), ("RECEPTOR", &["R"])]),
        ];

        let set = EntityConversionSet::from_structures(&structures);

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("INSULIN").unwrap().expected, 2);
        assert_eq!(set.get("RECEPTOR").unwrap().expected, 1);
    }

    #[test]
    fn completeness_requires_enough_destinations() {
        let mut conversion = EntityConversion::new("INSULIN", 2);
        assert!(!conversion.is_complete());

        conversion.add_destination("A");
        assert!(!conversion.is_complete());

        conversion.add_destination("B");
        assert!(conversion.is_complete());
    }

    #[test]
    fn add_destination_ignores_repeats() {
        let mut conversion = EntityConversion::new("INSULIN", 2);
        conversion.add_destination("A");
        conversion.add_destination("A");

        assert_eq!(conversion.destinations(), &["A".to_string()]);
        assert!(!conversion.is_complete());
    }

    #[test]
    fn conversion_file_populates_destinations() {
        let structures = vec![structure("a.cif", &[("INSULIN", &["X", "Y"])])];
        let mut set = EntityConversionSet::from_structures(&structures);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversions.txt");
        std::fs::write(&path, "# comment\nINSULIN:A,B\n").unwrap();

        set.load_conversion_file(&path).unwrap();

        assert!(set.is_complete());
        assert_eq!(
            set.get("INSULIN").unwrap().destinations(),
            &["A".to_string(), "B".to_string()]
        );
    }

    #[test]
    fn conversion_file_rejects_unknown_entities() {
        let mut set = EntityConversionSet::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversions.txt");
        std::fs::write(&path, "GHOST:A\n").unwrap();

        let err = set.load_conversion_file(&path).unwrap_err();

        assert!(matches!(err, Error::ConversionFile { line_number: 1, .. }));
    }

    #[test]
    fn conversion_file_rejects_missing_separator() {
        let structures = vec![structure("a.cif", &[("INSULIN", &["X"])])];
        let mut set = EntityConversionSet::from_structures(&structures);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversions.txt");
        std::fs::write(&path, "INSULIN A,B\n").unwrap();

        assert!(set.load_conversion_file(&path).is_err());
    }

    #[test]
    fn chain_map_pairs_chains_with_destinations_in_order() {
        let s = structure("a.cif", &[("INSULIN", &["X", "Y"])]);
        let mut set = EntityConversionSet::from_structures(&[s.clone()]);
        let conversion = set.get_mut("INSULIN").unwrap();
        conversion.add_destination("A");
        conversion.add_destination("B");

        let map = set.chain_map_for(&s).unwrap();

        assert_eq!(map["X"], "A");
        assert_eq!(map["Y"], "B");
    }

    #[test]
    fn chain_map_fails_while_destinations_are_short() {
        let s = structure("a.cif", &[("INSULIN", &["X", "Y"])]);
        let mut set = EntityConversionSet::from_structures(&[s.clone()]);
        set.get_mut("INSULIN").unwrap().add_destination("A");

        let err = set.chain_map_for(&s).unwrap_err();

        assert!(matches!(err, Error::MissingDestinations { .. }));
    }

    #[test]
    fn search_matches_case_insensitive_substrings() {
        let structures = vec![structure(
            "a.cif",
            &[("INSULIN RECEPTOR", &["A"]), ("LYSOZYME", &["B"])],
        )];
        let set = EntityConversionSet::from_structures(&structures);

        let hits = set.search("receptor");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "INSULIN RECEPTOR");
    }
}
