//! Concatenation bookkeeping.
//!
//! When two or more source chains of one structure map to the same
//! destination id, they will be concatenated into one output chain. Each
//! contributor gets a 1-based order, and every affected chain stays
//! "incomplete" until the curator confirms the plan; the rewrite pass is
//! gated on zero incomplete entries batch-wide. At rewrite time each slot's
//! residues shift by `(order - 1) * stride` so concatenated chains never
//! collide in residue-number space.

use std::collections::BTreeMap;

/// Per-structure concatenation state derived from a chain map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcatenationState {
    orders: BTreeMap<String, u32>,
    complete: BTreeMap<String, bool>,
}

impl ConcatenationState {
    /// Detects destination collisions in `chain_map`. `source_order` fixes
    /// the first-seen ordering of the map's keys (a plain map cannot carry
    /// it); sources missing from the map are ignored.
    ///
    /// Chains involved in a concatenation start incomplete; everything else
    /// is complete immediately.
    pub fn from_chain_map(chain_map: &BTreeMap<String, String>, source_order: &[String]) -> Self {
        let mut destination_uses: BTreeMap<&str, u32> = BTreeMap::new();
        for source in source_order {
            if let Some(dest) = chain_map.get(source) {
                *destination_uses.entry(dest.as_str()).or_insert(0) += 1;
            }
        }

        let mut orders = BTreeMap::new();
        let mut complete = BTreeMap::new();
        let mut assigned: BTreeMap<&str, u32> = BTreeMap::new();
        for source in source_order {
            let Some(dest) = chain_map.get(source) else {
                continue;
            };
            if destination_uses[dest.as_str()] > 1 {
                let order = assigned.entry(dest.as_str()).or_insert(0);
                *order += 1;
                orders.insert(source.clone(), *order);
                complete.insert(source.clone(), false);
            } else {
                complete.insert(source.clone(), true);
            }
        }
        Self { orders, complete }
    }

    /// 1-based concatenation order, or 0 for a chain with no conflict.
    pub fn order_of(&self, chain_id: &str) -> u32 {
        self.orders.get(chain_id).copied().unwrap_or(0)
    }

    pub fn is_concatenated(&self, chain_id: &str) -> bool {
        self.orders.contains_key(chain_id)
    }

    pub fn orders(&self) -> &BTreeMap<String, u32> {
        &self.orders
    }

    pub fn incomplete_count(&self) -> usize {
        self.complete.values().filter(|done| !**done).count()
    }

    pub fn incomplete_chains(&self) -> impl Iterator<Item = &str> {
        self.complete
            .iter()
            .filter(|(_, done)| !**done)
            .map(|(chain, _)| chain.as_str())
    }

    /// Confirms one chain's planned concatenation.
    pub fn accept(&mut self, chain_id: &str) {
        if let Some(done) = self.complete.get_mut(chain_id) {
            *done = true;
        }
    }

    /// Confirms every planned concatenation at once.
    pub fn accept_all(&mut self) {
        for done in self.complete.values_mut() {
            *done = true;
        }
    }

    /// Moves `chain_id` to `new_order` within its destination. The sibling
    /// currently holding `new_order` takes the vacated order instead, so the
    /// orders of one destination always stay a permutation of `1..=N`.
    pub fn set_order(
        &mut self,
        chain_id: &str,
        new_order: u32,
        chain_map: &BTreeMap<String, String>,
    ) {
        let Some(&current) = self.orders.get(chain_id) else {
            return;
        };
        let Some(dest) = chain_map.get(chain_id) else {
            return;
        };
        let sibling = self
            .orders
            .iter()
            .find(|(other, &order)| {
                other.as_str() != chain_id
                    && order == new_order
                    && chain_map.get(other.as_str()) == Some(dest)
            })
            .map(|(other, _)| other.clone());
        if let Some(sibling) = sibling {
            self.orders.insert(sibling, current);
            self.orders.insert(chain_id.to_string(), new_order);
        }
    }

    /// Residue-number offset for this chain at rewrite time.
    pub fn residue_offset(&self, chain_id: &str, stride: i32) -> i32 {
        match self.orders.get(chain_id) {
            Some(&order) => (order as i32 - 1) * stride,
            None => 0,
        }
    }
}

/// Batch-wide count of unconfirmed concatenations: the finalize gate.
pub fn problem_count<'a>(states: impl IntoIterator<Item = &'a ConcatenationState>) -> usize {
    states.into_iter().map(|s| s.incomplete_count()).sum()
}
