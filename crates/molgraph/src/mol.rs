use std::fmt::{self, Display, Formatter};

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

/// Opaque handle to an atom of one particular [`Mol`]. Handles are only ever
/// forged by `Mol` itself and stay valid for its whole lifetime, since no
/// API removes atoms or bonds in place.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct AtomId(NodeIndex);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct BondId(EdgeIndex);

impl AtomId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl BondId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl Display for AtomId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

impl Display for BondId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// An undirected labelled graph of atoms and bonds, generic over what an
/// "atom" and a "bond" actually carry, so that concrete molecules and query
/// patterns share all of the structural machinery
#[derive(Clone, Debug, Default)]
pub struct Mol<A, B> {
    graph: UnGraph<A, B>,
}

impl<A, B> Mol<A, B> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: UnGraph::default(),
        }
    }

    pub fn add_atom(&mut self, atom: A) -> AtomId {
        AtomId(self.graph.add_node(atom))
    }

    pub fn add_bond(&mut self, a: AtomId, b: AtomId, bond: B) -> BondId {
        BondId(self.graph.add_edge(a.0, b.0, bond))
    }

    #[must_use]
    pub fn atom(&self, id: AtomId) -> &A {
        &self.graph[id.0]
    }

    pub fn atom_mut(&mut self, id: AtomId) -> &mut A {
        &mut self.graph[id.0]
    }

    #[must_use]
    pub fn bond(&self, id: BondId) -> &B {
        &self.graph[id.0]
    }

    pub fn bond_mut(&mut self, id: BondId) -> &mut B {
        &mut self.graph[id.0]
    }

    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Atoms in insertion order
    pub fn atoms(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.graph.node_indices().map(AtomId)
    }

    pub fn bonds(&self) -> impl Iterator<Item = BondId> + '_ {
        self.graph.edge_indices().map(BondId)
    }

    pub fn neighbors(&self, id: AtomId) -> impl Iterator<Item = AtomId> + '_ {
        self.graph.neighbors(id.0).map(AtomId)
    }

    pub fn bonds_of(&self, id: AtomId) -> impl Iterator<Item = BondId> + '_ {
        self.graph.edges(id.0).map(|e| BondId(e.id()))
    }

    #[must_use]
    pub fn bond_between(&self, a: AtomId, b: AtomId) -> Option<BondId> {
        self.graph.find_edge(a.0, b.0).map(BondId)
    }

    #[must_use]
    pub fn bond_endpoints(&self, id: BondId) -> (AtomId, AtomId) {
        // SAFETY: `BondId`s are only forged by `add_bond` and nothing ever
        // removes an edge, so the endpoints always exist
        let (a, b) = self.graph.edge_endpoints(id.0).unwrap();
        (AtomId(a), AtomId(b))
    }

    /// The atom on the other end of `bond` from `atom`
    #[must_use]
    pub fn other_end(&self, bond: BondId, atom: AtomId) -> AtomId {
        let (a, b) = self.bond_endpoints(bond);
        if a == atom { b } else { a }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Atom, Bond, BondOrder, Molecule};

    #[test]
    fn construction_and_access() {
        let mut mol = Molecule::new();
        let c = mol.add_atom(Atom::new(6));
        let o = mol.add_atom(Atom::new(8));
        let bond = mol.add_bond(c, o, Bond::new(BondOrder::Double));

        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 1);
        assert_eq!(mol.atom(c).atomic_num, 6);
        assert_eq!(mol.bond(bond).order, BondOrder::Double);
        assert_eq!(mol.bond_between(c, o), Some(bond));
        assert_eq!(mol.other_end(bond, c), o);
        assert_eq!(mol.neighbors(c).collect::<Vec<_>>(), vec![o]);
    }

    #[test]
    fn atom_order_is_insertion_order() {
        let mut mol = Molecule::new();
        let ids: Vec<_> = (0..5).map(|_| mol.add_atom(Atom::new(6))).collect();
        assert_eq!(mol.atoms().collect::<Vec<_>>(), ids);
    }
}
