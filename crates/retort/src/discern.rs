//! Reactant ordering as constrained multiset assignment: which candidate
//! fills which template slot, found by depth-first search with backtracking

use molgraph::{Molecule, substructure};

use crate::schema::ReactionSchema;

/// Per template slot, per candidate: how many distinct functional-group
/// sites of that slot's template the candidate carries
#[derive(Clone, Debug)]
pub struct FunctionalGroupInventory {
    counts: Vec<Vec<usize>>,
}

impl FunctionalGroupInventory {
    #[must_use]
    pub fn compile(schema: &ReactionSchema, candidates: &[Molecule]) -> Self {
        let counts = schema
            .reactants()
            .iter()
            .map(|template| {
                candidates
                    .iter()
                    .map(|candidate| substructure::count_distinct_matches(candidate, template))
                    .collect()
            })
            .collect();
        Self { counts }
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.counts.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn count(&self, slot: usize, candidate: usize) -> usize {
        self.counts[slot][candidate]
    }
}

/// Lazy enumeration of valid slot assignments in depth-first order. An
/// exhausted iterator that never yielded is the "no solution" answer; there
/// is no sentinel value to confuse with a real assignment.
#[derive(Clone, Debug)]
pub struct ReactantOrderings {
    inventory: FunctionalGroupInventory,
    allow_resampling: bool,
    /// Candidate chosen for each filled slot so far
    chosen: Vec<usize>,
    used: Vec<bool>,
    /// Next candidate to try at the current depth
    cursor: usize,
    exhausted: bool,
}

impl ReactantOrderings {
    #[must_use]
    pub fn new(inventory: FunctionalGroupInventory, allow_resampling: bool) -> Self {
        let candidates = inventory.candidate_count();
        let slots = inventory.slot_count();
        // Cheap pre-checks ahead of the search: an empty pool can never
        // fill a slot, and without resampling there must be at least one
        // candidate per slot
        let exhausted = candidates == 0 || (!allow_resampling && candidates < slots);
        Self {
            inventory,
            allow_resampling,
            chosen: Vec::with_capacity(slots),
            used: vec![false; candidates],
            cursor: 0,
            exhausted,
        }
    }

    fn admissible(&self, slot: usize, candidate: usize) -> bool {
        self.inventory.count(slot, candidate) >= 1
            && (self.allow_resampling || !self.used[candidate])
    }

    /// Undo the deepest choice and aim the cursor just past it. Returns
    /// false once there is nothing left to undo.
    fn backtrack(&mut self) -> bool {
        let Some(candidate) = self.chosen.pop() else {
            return false;
        };
        self.used[candidate] = false;
        self.cursor = candidate + 1;
        true
    }
}

impl Iterator for ReactantOrderings {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        loop {
            let depth = self.chosen.len();
            if depth == self.inventory.slot_count() {
                let solution = self.chosen.clone();
                if !self.backtrack() {
                    self.exhausted = true;
                }
                return Some(solution);
            }

            let found = (self.cursor..self.inventory.candidate_count())
                .find(|&candidate| self.admissible(depth, candidate));
            match found {
                Some(candidate) => {
                    if !self.allow_resampling {
                        self.used[candidate] = true;
                    }
                    self.chosen.push(candidate);
                    self.cursor = 0;
                }
                None => {
                    if !self.backtrack() {
                        self.exhausted = true;
                        return None;
                    }
                }
            }
        }
    }
}

impl ReactionSchema {
    /// Lazily enumerate every candidate ordering compatible with this
    /// schema's reactant templates. Without resampling each candidate fills
    /// at most one slot.
    #[must_use]
    pub fn reactant_orderings(
        &self,
        candidates: &[Molecule],
        allow_resampling: bool,
    ) -> ReactantOrderings {
        ReactantOrderings::new(
            FunctionalGroupInventory::compile(self, candidates),
            allow_resampling,
        )
    }

    /// The first compatible ordering, or `None` when the candidates cannot
    /// satisfy the templates at all
    #[must_use]
    pub fn first_reactant_ordering(
        &self,
        candidates: &[Molecule],
        allow_resampling: bool,
    ) -> Option<Vec<usize>> {
        self.reactant_orderings(candidates, allow_resampling).next()
    }

    /// Whether any ordering of the candidates fits the templates
    #[must_use]
    pub fn has_compatible_ordering(&self, candidates: &[Molecule]) -> bool {
        self.first_reactant_ordering(candidates, false).is_some()
    }
}

#[cfg(test)]
mod tests {
    use molgraph::Molecule;

    use super::*;

    const ESTERIFICATION: &str =
        "[*:1][C:2](=[O:3])[OH:4].[*:5][OH:6]>>[*:1][C:2](=[O:3])[O:6][*:5]";

    fn mol(smiles: &str) -> Molecule {
        Molecule::from_smiles(smiles).unwrap()
    }

    fn schema() -> ReactionSchema {
        ReactionSchema::from_smarts(ESTERIFICATION).unwrap()
    }

    #[test]
    fn orders_candidates_onto_slots() {
        let schema = schema();
        // Passed alcohol-first; the solver must flip them
        let candidates = vec![mol("OCCO"), mol("CC(=O)O")];
        let orderings: Vec<_> = schema.reactant_orderings(&candidates, false).collect();
        assert!(orderings.contains(&vec![1, 0]));
        // The diol can never fill the acid slot
        assert!(orderings.iter().all(|o| o[0] == 1));
    }

    #[test]
    fn no_solution_is_an_empty_iterator() {
        let schema = schema();
        let candidates = vec![mol("CC"), mol("CC(=O)O")];
        assert_eq!(schema.first_reactant_ordering(&candidates, false), None);
        assert!(!schema.has_compatible_ordering(&candidates));
    }

    #[test]
    fn empty_pool_short_circuits() {
        let schema = schema();
        assert_eq!(schema.first_reactant_ordering(&[], false), None);
    }

    #[test]
    fn undersized_pool_short_circuits_without_resampling() {
        let schema = schema();
        let candidates = vec![mol("CC(=O)O")];
        assert_eq!(schema.first_reactant_ordering(&candidates, false), None);
    }

    #[test]
    fn resampling_lets_one_candidate_fill_every_slot() {
        let schema = schema();
        // Glycolic acid has both a carboxyl and a free hydroxyl
        let candidates = vec![mol("OCC(=O)O")];
        assert_eq!(schema.first_reactant_ordering(&candidates, false), None);
        assert_eq!(
            schema.first_reactant_ordering(&candidates, true),
            Some(vec![0, 0])
        );
    }

    #[test]
    fn without_resampling_assignments_are_injective() {
        let schema = schema();
        let candidates = vec![mol("OCC(=O)O"), mol("OCC(=O)O")];
        for ordering in schema.reactant_orderings(&candidates, false) {
            assert_ne!(ordering[0], ordering[1]);
        }
    }

    #[test]
    fn enumeration_is_exhaustive_and_depth_first() {
        let schema = schema();
        // Both candidates satisfy both slots
        let candidates = vec![mol("OCC(=O)O"), mol("OCC(=O)O")];
        let orderings: Vec<_> = schema.reactant_orderings(&candidates, false).collect();
        assert_eq!(orderings, vec![vec![0, 1], vec![1, 0]]);
    }

    #[test]
    fn inventory_counts_distinct_sites() {
        let schema = schema();
        let inventory =
            FunctionalGroupInventory::compile(&schema, &[mol("OC(=O)CCC(=O)O"), mol("OCCO")]);
        // Succinic acid: two carboxyls for slot 0
        assert_eq!(inventory.count(0, 0), 2);
        // Ethylene glycol: two hydroxyls for slot 1
        assert_eq!(inventory.count(1, 1), 2);
        // The diol has no carboxyl
        assert_eq!(inventory.count(0, 1), 0);
    }
}
