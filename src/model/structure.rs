use super::chain::Chain;
use super::entity::Entity;
use std::fmt;

/// One parsed deposition: its identifier, chains in file order, and the
/// entity table. Immutable once the reader has produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Structure {
    id: String,
    chains: Vec<Chain>,
    entities: Vec<Entity>,
}

impl Structure {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            chains: Vec::new(),
            entities: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn add_chain(&mut self, chain: Chain) {
        debug_assert!(
            self.chain(&chain.id).is_none(),
            "Attempted to add a duplicate chain ID '{}' to structure '{}'",
            chain.id,
            self.id
        );
        self.chains.push(chain);
    }

    pub fn chain(&self, id: &str) -> Option<&Chain> {
        self.chains.iter().find(|c| c.id == id)
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn iter_chains(&self) -> std::slice::Iter<'_, Chain> {
        self.chains.iter()
    }

    /// Chain identifiers in file order.
    pub fn chain_ids(&self) -> Vec<String> {
        self.chains.iter().map(|c| c.id.clone()).collect()
    }

    /// Chain identifiers long enough to take part in matching.
    pub fn matchable_chain_ids(&self, min_len: usize) -> Vec<String> {
        self.chains
            .iter()
            .filter(|c| c.is_matchable(min_len))
            .map(|c| c.id.clone())
            .collect()
    }

    /// Files a chain under an entity description, creating the entity on
    /// first sight. Entities keep the order in which they were recorded.
    pub fn record_entity_chain(&mut self, description: &str, chain_id: &str) {
        let description = description.to_uppercase();
        if let Some(entity) = self
            .entities
            .iter_mut()
            .find(|e| e.description == description)
        {
            entity.add_chain_id(chain_id);
        } else {
            let mut entity = Entity::new(&description);
            entity.add_chain_id(chain_id);
            self.entities.push(entity);
        }
    }

    pub fn entity(&self, description: &str) -> Option<&Entity> {
        let description = description.to_uppercase();
        self.entities.iter().find(|e| e.description == description)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn iter_entities(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Structure {{ id: \"{}\", chains: {}, entities: {} }}",
            self.id,
            self.chain_count(),
            self.entity_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::ResidueId;

    fn chain_from(id: &str, codes: &str) -> Chain {
        let mut chain = Chain::new(id);
        for (i, code) in codes.chars().enumerate() {
            chain.push_residue(code, ResidueId::new(i as i32 + 1));
        }
        chain
    }

    #[test]
    fn structure_new_creates_empty_structure() {
        let structure = Structure::new("1abc.cif");

        assert_eq!(structure.id(), "1abc.cif");
        assert!(structure.is_empty());
        assert_eq!(structure.entity_count(), 0);
    }

    #[test]
    fn add_chain_and_lookup() {
        let mut structure = Structure::new("1abc.cif");
        structure.add_chain(chain_from("A", "MKV"));

        assert_eq!(structure.chain_count(), 1);
        assert!(structure.chain("A").is_some());
        assert!(structure.chain("B").is_none());
    }

    #[test]
    fn chain_ids_keep_file_order() {
        let mut structure = Structure::new("1abc.cif");
        structure.add_chain(chain_from("B", "MKV"));
        structure.add_chain(chain_from("A", "MKV"));

        assert_eq!(structure.chain_ids(), vec!["B", "A"]);
    }

    #[test]
    fn matchable_chain_ids_filters_short_chains() {
        let mut structure = Structure::new("1abc.cif");
        structure.add_chain(chain_from("A", "MKVLE"));
        structure.add_chain(chain_from("B", "MKV"));

        assert_eq!(structure.matchable_chain_ids(4), vec!["A"]);
    }

    #[test]
    fn record_entity_chain_groups_by_uppercased_description() {
        let mut structure = Structure::new("1abc.cif");
        structure.record_entity_chain("Insulin", "A");
        structure.record_entity_chain("INSULIN", "B");
        structure.record_entity_chain("receptor", "C");

        assert_eq!(structure.entity_count(), 2);
        let insulin = structure.entity("insulin").unwrap();
        assert_eq!(insulin.chain_ids(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn structure_display_reports_counts() {
        let mut structure = Structure::new("1abc.cif");
        structure.add_chain(chain_from("A", "MKV"));
        structure.record_entity_chain("INSULIN", "A");

        assert_eq!(
            structure.to_string(),
            "Structure { id: \"1abc.cif\", chains: 1, entities: 1 }"
        );
    }
}
