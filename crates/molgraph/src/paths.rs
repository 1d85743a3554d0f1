//! Graph traversal helpers: shortest bond paths, bonded-pair lookup, and
//! splitting molecules along bonds

use std::collections::VecDeque;

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use itertools::Itertools;

use crate::errors::{MolGraphError, Result};
use crate::{AtomId, BondId, Mol, Molecule};

/// The bonds along one shortest path from `from` to `to` (BFS), or `None`
/// when the two atoms live in different fragments. `from == to` is the
/// empty path.
#[must_use]
pub fn shortest_bond_path<A, B>(mol: &Mol<A, B>, from: AtomId, to: AtomId) -> Option<Vec<BondId>> {
    if from == to {
        return Some(Vec::new());
    }

    let mut predecessor: HashMap<AtomId, (AtomId, BondId)> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    let mut seen = HashSet::from_iter([from]);

    while let Some(at) = queue.pop_front() {
        for bond in mol.bonds_of(at) {
            let neighbor = mol.other_end(bond, at);
            if seen.contains(&neighbor) {
                continue;
            }
            seen.insert(neighbor);
            predecessor.insert(neighbor, (at, bond));
            if neighbor == to {
                let mut path = Vec::new();
                let mut current = to;
                while current != from {
                    // SAFETY: `predecessor` is recorded for every atom BFS reaches
                    let &(previous, bond) = predecessor.get(&current).unwrap();
                    path.push(bond);
                    current = previous;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(neighbor);
        }
    }
    None
}

/// All bonds directly connecting any pair of the given atoms, keyed by bond
/// with the endpoint pair as the value
#[must_use]
pub fn bonds_between<A, B>(mol: &Mol<A, B>, atoms: &[AtomId]) -> HashMap<BondId, (AtomId, AtomId)> {
    let mut found = HashMap::new();
    for pair in atoms.iter().copied().combinations(2) {
        let (a, b) = (pair[0], pair[1]);
        if let Some(bond) = mol.bond_between(a, b) {
            found.insert(bond, (a, b));
        }
    }
    found
}

/// Split a molecule into its connected components, preserving atom order
/// within each component
#[must_use]
pub fn connected_components(mol: &Molecule) -> Vec<Molecule> {
    // SAFETY: an empty cut set can never contain duplicates
    cut_bonds(mol, &[]).unwrap()
}

/// Sever the listed bonds and return the resulting fragments as separate
/// molecules. Listing a bond twice is an error; a repeated cut would
/// silently misreport fragment counts, so callers deduplicate first.
pub fn cut_bonds(mol: &Molecule, bonds: &[BondId]) -> Result<Vec<Molecule>> {
    let mut severed: HashSet<BondId> = HashSet::new();
    for &bond in bonds {
        if !severed.insert(bond) {
            return Err(MolGraphError::DuplicateCutBond { bond: bond.index() });
        }
    }

    // Label each atom with a component, discovered in atom order
    let mut component: HashMap<AtomId, usize> = HashMap::new();
    let mut count = 0;
    for root in mol.atoms() {
        if component.contains_key(&root) {
            continue;
        }
        let label = count;
        count += 1;
        let mut queue = VecDeque::from([root]);
        component.insert(root, label);
        while let Some(at) = queue.pop_front() {
            for bond in mol.bonds_of(at) {
                if severed.contains(&bond) {
                    continue;
                }
                let neighbor = mol.other_end(bond, at);
                if !component.contains_key(&neighbor) {
                    component.insert(neighbor, label);
                    queue.push_back(neighbor);
                }
            }
        }
    }

    let mut fragments = vec![Molecule::new(); count];
    let mut relocated: HashMap<AtomId, AtomId> = HashMap::new();
    for at in mol.atoms() {
        let label = component[&at];
        relocated.insert(at, fragments[label].add_atom(mol.atom(at).clone()));
    }
    for bond in mol.bonds() {
        if severed.contains(&bond) {
            continue;
        }
        let (a, b) = mol.bond_endpoints(bond);
        let label = component[&a];
        fragments[label].add_bond(relocated[&a], relocated[&b], *mol.bond(bond));
    }
    Ok(fragments)
}
