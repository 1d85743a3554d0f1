//! Assembly of parsed SMILES/pattern syntax into graphs. Ring-closure
//! bookkeeping lives here, shared by both text flavors.

use ahash::HashMap;

use super::ast::{AtomTok, BondTok, Branched, Chain, ElementTok, SmilesAst};
use crate::errors::{MolGraphError, Result};
use crate::{Atom, AtomId, Bond, BondOrder, Mol, Molecule, Pattern, PatternAtom, PatternBond, element};

pub(super) fn molecule(ast: &SmilesAst) -> Result<Molecule> {
    let builder = Builder {
        mk_atom: |tok: &AtomTok| {
            let (atomic_num, aromatic) = match tok.element {
                ElementTok::Wildcard => (element::WILDCARD, false),
                ElementTok::Symbol {
                    atomic_num,
                    aromatic,
                } => (atomic_num, aromatic == Some(true)),
            };
            Atom {
                atomic_num,
                formal_charge: tok.charge.unwrap_or(0),
                explicit_hs: tok.hydrogens.unwrap_or(0),
                // Bracket atoms are fully specified; sanitization must not
                // invent hydrogens for them
                no_implicit_hs: tok.bracket,
                aromatic,
                map_num: tok.map_num,
                ..Atom::default()
            }
        },
        mk_bond: |tok: Option<BondTok>, a: &Atom, b: &Atom| {
            let order = match tok {
                Some(tok) => order_of(tok),
                None if a.aromatic && b.aromatic => BondOrder::Aromatic,
                None => BondOrder::Single,
            };
            Bond::new(order)
        },
    };
    builder.build(ast)
}

pub(super) fn pattern(ast: &SmilesAst) -> Result<Pattern> {
    let builder = Builder {
        mk_atom: |tok: &AtomTok| {
            let (atomic_element, aromatic) = match tok.element {
                ElementTok::Wildcard => (None, None),
                ElementTok::Symbol {
                    atomic_num,
                    aromatic,
                } => (Some(atomic_num), aromatic),
            };
            PatternAtom {
                element: atomic_element,
                aromatic,
                charge: tok.charge,
                hydrogens: tok.hydrogens,
                map_num: tok.map_num,
            }
        },
        mk_bond: |tok: Option<BondTok>, a: &PatternAtom, b: &PatternAtom| {
            let order = match tok {
                Some(tok) => Some(order_of(tok)),
                None if a.aromatic == Some(true) && b.aromatic == Some(true) => {
                    Some(BondOrder::Aromatic)
                }
                None => None,
            };
            PatternBond { order }
        },
    };
    builder.build(ast)
}

const fn order_of(tok: BondTok) -> BondOrder {
    match tok {
        BondTok::Single => BondOrder::Single,
        BondTok::Double => BondOrder::Double,
        BondTok::Triple => BondOrder::Triple,
        BondTok::Aromatic => BondOrder::Aromatic,
    }
}

struct Builder<FA, FB> {
    mk_atom: FA,
    mk_bond: FB,
}

type OpenRings = HashMap<u16, (AtomId, Option<BondTok>)>;

impl<A, B, FA, FB> Builder<FA, FB>
where
    FA: Fn(&AtomTok) -> A,
    FB: Fn(Option<BondTok>, &A, &A) -> B,
{
    fn build(&self, ast: &SmilesAst) -> Result<Mol<A, B>> {
        let mut mol = Mol::new();
        let mut rings = OpenRings::default();
        for chain in &ast.chains {
            self.chain(&mut mol, &mut rings, chain, None)?;
        }
        if let Some(&digit) = rings.keys().next() {
            return Err(MolGraphError::UnclosedRing { digit });
        }
        Ok(mol)
    }

    fn chain(
        &self,
        mol: &mut Mol<A, B>,
        rings: &mut OpenRings,
        chain: &Chain,
        attach: Option<(AtomId, Option<BondTok>)>,
    ) -> Result<()> {
        let mut prev = self.branched(mol, rings, &chain.first, attach)?;
        for link in &chain.tail {
            prev = self.branched(mol, rings, &link.atom, Some((prev, link.bond)))?;
        }
        Ok(())
    }

    fn branched(
        &self,
        mol: &mut Mol<A, B>,
        rings: &mut OpenRings,
        branched: &Branched,
        attach: Option<(AtomId, Option<BondTok>)>,
    ) -> Result<AtomId> {
        let id = mol.add_atom((self.mk_atom)(&branched.atom));
        if let Some((parent, bond)) = attach {
            self.connect(mol, parent, id, bond);
        }
        for ring in &branched.rings {
            match rings.remove(&ring.number) {
                // The digit was already open, so close the ring. Either side
                // may carry the bond symbol; the closing side wins a tie.
                Some((other, opening_bond)) => {
                    self.connect(mol, other, id, ring.bond.or(opening_bond));
                }
                None => {
                    rings.insert(ring.number, (id, ring.bond));
                }
            }
        }
        for branch in &branched.branches {
            self.chain(mol, rings, &branch.chain, Some((id, branch.bond)))?;
        }
        Ok(id)
    }

    fn connect(&self, mol: &mut Mol<A, B>, a: AtomId, b: AtomId, tok: Option<BondTok>) {
        let bond = (self.mk_bond)(tok, mol.atom(a), mol.atom(b));
        mol.add_bond(a, b, bond);
    }
}
