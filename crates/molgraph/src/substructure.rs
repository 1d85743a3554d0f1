//! Backtracking (VF2-style) substructure search of patterns against molecules

use ahash::HashSet;

use crate::{Atom, AtomId, Bond, BondOrder, Molecule, Pattern, PatternAtom, PatternBond};

/// One embedding of a pattern in a molecule: `mapping[i]` is the molecule
/// atom matched by the pattern's `i`-th atom (in insertion order)
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Match {
    pub mapping: Vec<AtomId>,
}

impl Match {
    /// The set of molecule atoms covered by this match
    #[must_use]
    pub fn matched_atoms(&self) -> HashSet<AtomId> {
        self.mapping.iter().copied().collect()
    }
}

#[must_use]
pub fn find_matches(molecule: &Molecule, pattern: &Pattern) -> Vec<Match> {
    search(molecule, pattern, false)
}

#[must_use]
pub fn first_match(molecule: &Molecule, pattern: &Pattern) -> Option<Match> {
    search(molecule, pattern, true).into_iter().next()
}

/// Number of matches with distinct matched-atom *sets*: two embeddings that
/// permute the same atoms (e.g. the two orientations of a symmetric group)
/// count once. This is the multiplicity the reactant-order solver consumes.
#[must_use]
pub fn count_distinct_matches(molecule: &Molecule, pattern: &Pattern) -> usize {
    let mut seen: HashSet<Vec<AtomId>> = HashSet::default();
    for found in find_matches(molecule, pattern) {
        let mut atoms = found.mapping;
        atoms.sort_unstable();
        seen.insert(atoms);
    }
    seen.len()
}

fn search(molecule: &Molecule, pattern: &Pattern, early_exit: bool) -> Vec<Match> {
    let pattern_atoms: Vec<_> = pattern.atoms().collect();
    if pattern_atoms.is_empty() || pattern_atoms.len() > molecule.atom_count() {
        return Vec::new();
    }

    let mut state = State {
        molecule,
        pattern,
        pattern_atoms,
        mapping: Vec::new(),
        used: HashSet::default(),
        matches: Vec::new(),
        early_exit,
    };
    state.mapping = vec![None; state.pattern_atoms.len()];
    state.recurse(0);
    state.matches
}

struct State<'s> {
    molecule: &'s Molecule,
    pattern: &'s Pattern,
    pattern_atoms: Vec<AtomId>,
    /// pattern position -> molecule atom
    mapping: Vec<Option<AtomId>>,
    used: HashSet<AtomId>,
    matches: Vec<Match>,
    early_exit: bool,
}

impl State<'_> {
    fn recurse(&mut self, depth: usize) {
        if self.early_exit && !self.matches.is_empty() {
            return;
        }
        if depth == self.pattern_atoms.len() {
            // SAFETY: every position is filled once depth reaches the end
            let mapping = self.mapping.iter().map(|m| m.unwrap()).collect();
            self.matches.push(Match { mapping });
            return;
        }

        let candidates = self.candidates_for(depth);
        for candidate in candidates {
            if self.used.contains(&candidate) {
                continue;
            }
            if !self.feasible(depth, candidate) {
                continue;
            }
            self.mapping[depth] = Some(candidate);
            self.used.insert(candidate);
            self.recurse(depth + 1);
            self.mapping[depth] = None;
            self.used.remove(&candidate);
        }
    }

    /// Anchor the candidate set to an already-mapped neighbor when one
    /// exists; otherwise (first atom of a component) consider every atom
    fn candidates_for(&self, depth: usize) -> Vec<AtomId> {
        let p = self.pattern_atoms[depth];
        let anchor = self.pattern.neighbors(p).find_map(|nb| {
            let position = self.position_of(nb);
            (position < depth).then(|| self.mapping[position])?
        });
        match anchor {
            Some(mapped) => self.molecule.neighbors(mapped).collect(),
            None => self.molecule.atoms().collect(),
        }
    }

    fn feasible(&self, depth: usize, candidate: AtomId) -> bool {
        let p = self.pattern_atoms[depth];
        if !atom_matches(self.pattern.atom(p), self.molecule.atom(candidate)) {
            return false;
        }

        // Every pattern bond back into the mapped region must exist in the
        // molecule with a compatible order
        for bond in self.pattern.bonds_of(p) {
            let other = self.pattern.other_end(bond, p);
            let position = self.position_of(other);
            let Some(Some(image)) = (position < depth).then(|| self.mapping[position]) else {
                continue;
            };
            let Some(mol_bond) = self.molecule.bond_between(candidate, image) else {
                return false;
            };
            if !bond_matches(self.pattern.bond(bond), self.molecule.bond(mol_bond)) {
                return false;
            }
        }
        true
    }

    /// Pattern atoms are matched in insertion order, so an id's index *is*
    /// its search position
    fn position_of(&self, id: AtomId) -> usize {
        id.index()
    }
}

#[must_use]
pub fn atom_matches(query: &PatternAtom, atom: &Atom) -> bool {
    if let Some(element) = query.element {
        if atom.atomic_num != element {
            return false;
        }
    }
    if let Some(aromatic) = query.aromatic {
        if atom.aromatic != aromatic {
            return false;
        }
    }
    if let Some(charge) = query.charge {
        if atom.formal_charge != charge {
            return false;
        }
    }
    if let Some(hydrogens) = query.hydrogens {
        if atom.total_hs() != hydrogens {
            return false;
        }
    }
    true
}

#[must_use]
pub fn bond_matches(query: &PatternBond, bond: &Bond) -> bool {
    match query.order {
        None => matches!(bond.order, BondOrder::Single | BondOrder::Aromatic),
        Some(order) => bond.order == order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Molecule, Pattern};

    fn mol(smiles: &str) -> Molecule {
        Molecule::from_smiles(smiles).unwrap_or_else(|e| panic!("bad SMILES {smiles:?}: {e}"))
    }

    fn pat(smarts: &str) -> Pattern {
        Pattern::from_smarts(smarts).unwrap_or_else(|e| panic!("bad pattern {smarts:?}: {e}"))
    }

    #[test]
    fn hydroxyl_in_ethanol() {
        let ethanol = mol("CCO");
        let hydroxyl = pat("[OH]");
        assert_eq!(find_matches(&ethanol, &hydroxyl).len(), 1);
        assert!(first_match(&ethanol, &hydroxyl).is_some());
    }

    #[test]
    fn no_match() {
        let ethane = mol("CC");
        let hydroxyl = pat("[OH]");
        assert!(find_matches(&ethane, &hydroxyl).is_empty());
        assert_eq!(count_distinct_matches(&ethane, &hydroxyl), 0);
    }

    #[test]
    fn distinct_match_counting() {
        // Succinic acid carries two carboxyls; each is one distinct site
        let diacid = mol("OC(=O)CCC(=O)O");
        let carboxyl = pat("[C](=[O])[OH]");
        assert_eq!(count_distinct_matches(&diacid, &carboxyl), 2);

        // Ethylene glycol: two hydroxyls
        let diol = mol("OCCO");
        assert_eq!(count_distinct_matches(&diol, &pat("[OH]")), 2);
    }

    #[test]
    fn wildcard_matches_any_heavy_neighbor() {
        let ethanol = mol("CCO");
        let capped_hydroxyl = pat("[*][OH]");
        assert_eq!(count_distinct_matches(&ethanol, &capped_hydroxyl), 1);
    }

    #[test]
    fn charge_constraints() {
        let hydroxide = mol("[OH-]");
        assert_eq!(count_distinct_matches(&hydroxide, &pat("[O-]")), 1);
        assert_eq!(count_distinct_matches(&hydroxide, &pat("[O+]")), 0);
    }

    #[test]
    fn bond_order_constraints() {
        let acrolein = mol("C=CC=O");
        assert_eq!(count_distinct_matches(&acrolein, &pat("[C]=[O]")), 1);
        let unspecified = pat("[C][C]");
        // The query-default bond matches the C-C single bond but not C=C
        assert_eq!(count_distinct_matches(&acrolein, &unspecified), 1);
    }

    #[test]
    fn aromatic_constraints() {
        let phenol = mol("c1ccccc1O");
        assert_eq!(count_distinct_matches(&phenol, &pat("[c][OH]")), 1);
        assert_eq!(count_distinct_matches(&phenol, &pat("[C][OH]")), 0);
        // Atomic-number queries span both
        assert_eq!(count_distinct_matches(&phenol, &pat("[#6][OH]")), 1);
    }

    #[test]
    fn symmetric_pattern_counts_once_per_site() {
        let butane = mol("CCCC");
        // The C-C pattern embeds twice (forwards/backwards) on each of the
        // three bonds, but each bond is a single distinct site
        assert_eq!(count_distinct_matches(&butane, &pat("[C]-[C]")), 3);
    }

    #[test]
    fn disconnected_pattern() {
        let mixture = mol("CO.N");
        assert_eq!(count_distinct_matches(&mixture, &pat("[OH].[NH3]")), 1);
    }
}
