use std::fmt;

/// A named biological molecule within one structure and the chains that
/// realize it. Descriptions are stored uppercased so the same molecule named
/// with different casing across depositions collates to one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub description: String,
    chain_ids: Vec<String>,
}

impl Entity {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_uppercase(),
            chain_ids: Vec::new(),
        }
    }

    /// Records a chain as belonging to this entity, preserving first-seen
    /// order and ignoring repeats.
    pub fn add_chain_id(&mut self, chain_id: &str) {
        if !self.chain_ids.iter().any(|c| c == chain_id) {
            self.chain_ids.push(chain_id.to_string());
        }
    }

    pub fn chain_ids(&self) -> &[String] {
        &self.chain_ids
    }

    pub fn chain_count(&self) -> usize {
        self.chain_ids.len()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity {{ description: \"{}\", chains: {} }}",
            self.description,
            self.chain_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_new_uppercases_description() {
        let entity = Entity::new("insulin");

        assert_eq!(entity.description, "INSULIN");
        assert_eq!(entity.chain_count(), 0);
    }

    #[test]
    fn add_chain_id_preserves_order_and_dedupes() {
        let mut entity = Entity::new("HEMOGLOBIN");
        entity.add_chain_id("B");
        entity.add_chain_id("A");
        entity.add_chain_id("B");

        assert_eq!(entity.chain_ids(), &["B".to_string(), "A".to_string()]);
    }

    #[test]
    fn entity_display_reports_chain_count() {
        let mut entity = Entity::new("LYSOZYME");
        entity.add_chain_id("A");

        assert_eq!(
            entity.to_string(),
            "Entity { description: \"LYSOZYME\", chains: 1 }"
        );
    }
}
