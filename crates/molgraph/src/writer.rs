//! SMILES-style text emission for molecules and patterns

use std::fmt::Write;

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};

use crate::{Atom, AtomId, Bond, BondId, BondOrder, Mol, Molecule, Pattern, PatternAtom, PatternBond, element};

pub(crate) fn write_molecule(mol: &Molecule) -> String {
    write(mol)
}

pub(crate) fn write_pattern(pat: &Pattern) -> String {
    write(pat)
}

pub(crate) trait SmilesAtom {
    fn token(&self) -> String;
    fn aromatic(&self) -> bool;
}

pub(crate) trait SmilesBond {
    /// The character to emit for this bond, or `None` when it can be left
    /// implicit between the given endpoints
    fn symbol(&self, a_aromatic: bool, b_aromatic: bool) -> Option<char>;
}

impl SmilesAtom for Atom {
    fn token(&self) -> String {
        let organic = element::by_number(self.atomic_num).is_some_and(|e| e.organic_subset);
        let plain = self.formal_charge == 0 && self.map_num == 0 && !self.no_implicit_hs;
        let symbol = case_symbol(self.symbol(), self.aromatic);

        if plain && (organic || self.atomic_num == element::WILDCARD) {
            return symbol;
        }

        let mut token = format!("[{symbol}");
        push_hydrogens(&mut token, self.total_hs());
        push_charge(&mut token, self.formal_charge);
        push_map(&mut token, self.map_num);
        token.push(']');
        token
    }

    fn aromatic(&self) -> bool {
        self.aromatic
    }
}

impl SmilesAtom for PatternAtom {
    fn token(&self) -> String {
        let plain = self.charge.is_none() && self.hydrogens.is_none() && self.map_num == 0;
        let symbol = match self.element {
            None => "*".to_owned(),
            Some(n) => case_symbol(element::symbol_of(n), self.aromatic == Some(true)),
        };
        let organic = self
            .element
            .and_then(element::by_number)
            .is_some_and(|e| e.organic_subset);

        if plain && (organic || self.is_wildcard()) {
            return symbol;
        }

        let mut token = format!("[{symbol}");
        if let Some(hydrogens) = self.hydrogens {
            push_hydrogens(&mut token, hydrogens);
        }
        if let Some(charge) = self.charge {
            push_charge(&mut token, charge);
        }
        push_map(&mut token, self.map_num);
        token.push(']');
        token
    }

    fn aromatic(&self) -> bool {
        self.aromatic == Some(true)
    }
}

fn case_symbol(symbol: &str, aromatic: bool) -> String {
    if aromatic {
        symbol.to_ascii_lowercase()
    } else {
        symbol.to_owned()
    }
}

fn push_hydrogens(token: &mut String, count: u8) {
    match count {
        0 => {}
        1 => token.push('H'),
        n => {
            // SAFETY: writing into a String cannot fail
            write!(token, "H{n}").unwrap();
        }
    }
}

fn push_charge(token: &mut String, charge: i8) {
    match charge {
        0 => {}
        1 => token.push('+'),
        -1 => token.push('-'),
        n if n > 0 => write!(token, "+{n}").unwrap(),
        n => write!(token, "{n}").unwrap(),
    }
}

fn push_map(token: &mut String, map_num: u32) {
    if map_num != 0 {
        write!(token, ":{map_num}").unwrap();
    }
}

impl SmilesBond for Bond {
    fn symbol(&self, a_aromatic: bool, b_aromatic: bool) -> Option<char> {
        let both_aromatic = a_aromatic && b_aromatic;
        match self.order {
            // A single bond between two aromatic atoms (e.g. biphenyl) must
            // be spelled out, or reparsing would see an aromatic bond
            BondOrder::Single if both_aromatic => Some('-'),
            BondOrder::Single => None,
            BondOrder::Double => Some('='),
            BondOrder::Triple => Some('#'),
            BondOrder::Aromatic if both_aromatic => None,
            BondOrder::Aromatic => Some(':'),
        }
    }
}

impl SmilesBond for PatternBond {
    fn symbol(&self, a_aromatic: bool, b_aromatic: bool) -> Option<char> {
        let both_aromatic = a_aromatic && b_aromatic;
        match self.order {
            None => None,
            // Unlike concrete molecules, an unadorned query bond means
            // "single or aromatic", so a strict single must be explicit
            Some(BondOrder::Single) => Some('-'),
            Some(BondOrder::Double) => Some('='),
            Some(BondOrder::Triple) => Some('#'),
            Some(BondOrder::Aromatic) if both_aromatic => None,
            Some(BondOrder::Aromatic) => Some(':'),
        }
    }
}

fn write<A: SmilesAtom, B: SmilesBond>(mol: &Mol<A, B>) -> String {
    let mut emitter = Emitter {
        mol,
        visited: HashSet::new(),
        used_bonds: HashSet::new(),
        tree: HashMap::new(),
        ring_digits: HashMap::new(),
        next_digit: 1,
        out: String::new(),
    };

    let roots: Vec<_> = mol.atoms().collect();
    let mut first = true;
    for root in roots {
        if emitter.visited.contains(&root) {
            continue;
        }
        if !first {
            emitter.out.push('.');
        }
        first = false;
        emitter.survey(root, None);
        emitter.emit(root);
    }
    emitter.out
}

struct Emitter<'m, A, B> {
    mol: &'m Mol<A, B>,
    visited: HashSet<AtomId>,
    used_bonds: HashSet<BondId>,
    /// Spanning-tree children, in discovery order
    tree: HashMap<AtomId, Vec<(BondId, AtomId)>>,
    /// Ring-closure digits to print after each atom's token
    ring_digits: HashMap<AtomId, Vec<(u16, BondId)>>,
    next_digit: u16,
    out: String,
}

impl<A: SmilesAtom, B: SmilesBond> Emitter<'_, A, B> {
    /// First pass: classify every bond as a tree edge or a ring closure
    fn survey(&mut self, at: AtomId, parent: Option<BondId>) {
        self.visited.insert(at);
        let bonds: Vec<_> = self.mol.bonds_of(at).collect();
        for bond in bonds {
            if Some(bond) == parent || self.used_bonds.contains(&bond) {
                continue;
            }
            self.used_bonds.insert(bond);
            let neighbor = self.mol.other_end(bond, at);
            if self.visited.contains(&neighbor) {
                let digit = self.next_digit;
                self.next_digit += 1;
                self.ring_digits.entry(at).or_default().push((digit, bond));
                self.ring_digits
                    .entry(neighbor)
                    .or_default()
                    .push((digit, bond));
            } else {
                self.tree.entry(at).or_default().push((bond, neighbor));
                self.survey(neighbor, Some(bond));
            }
        }
    }

    fn emit(&mut self, at: AtomId) {
        self.out.push_str(&self.mol.atom(at).token());

        if let Some(digits) = self.ring_digits.get(&at).cloned() {
            for (digit, bond) in digits {
                self.push_bond_symbol(bond);
                if digit < 10 {
                    // SAFETY: writing into a String cannot fail
                    write!(self.out, "{digit}").unwrap();
                } else {
                    write!(self.out, "%{digit:02}").unwrap();
                }
            }
        }

        let children = self.tree.get(&at).cloned().unwrap_or_default();
        let last = children.len().saturating_sub(1);
        for (i, (bond, child)) in children.into_iter().enumerate() {
            if i < last {
                self.out.push('(');
                self.push_bond_symbol(bond);
                self.emit(child);
                self.out.push(')');
            } else {
                self.push_bond_symbol(bond);
                self.emit(child);
            }
        }
    }

    fn push_bond_symbol(&mut self, bond: BondId) {
        let (a, b) = self.mol.bond_endpoints(bond);
        let symbol = self
            .mol
            .bond(bond)
            .symbol(self.mol.atom(a).aromatic(), self.mol.atom(b).aromatic());
        if let Some(symbol) = symbol {
            self.out.push(symbol);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Molecule, Pattern};

    fn round_trip_smiles(text: &str) -> Molecule {
        let mol = Molecule::from_smiles(text).unwrap();
        let rewritten = mol.to_smiles();
        let reparsed = Molecule::from_smiles(&rewritten)
            .unwrap_or_else(|e| panic!("rewritten SMILES {rewritten:?} failed to parse: {e}"));
        assert_eq!(reparsed.atom_count(), mol.atom_count(), "for {rewritten:?}");
        assert_eq!(reparsed.bond_count(), mol.bond_count(), "for {rewritten:?}");
        reparsed
    }

    #[test]
    fn molecules_survive_rewriting() {
        for text in [
            "CCO",
            "CC(C)C",
            "C1CCCCC1",
            "c1ccccc1",
            "c1ccccc1-c1ccccc1",
            "OC(=O)CCC(=O)O",
            "[NH4+].[Cl-]",
            "C=CC#N",
            "[CH3:1][OH:2]",
        ] {
            round_trip_smiles(text);
        }
    }

    #[test]
    fn bracket_details_survive() {
        let mol = round_trip_smiles("[CH3:7][O-]");
        let methyl = mol.atoms().next().unwrap();
        assert_eq!(mol.atom(methyl).map_num, 7);
        let oxygen = mol.atoms().nth(1).unwrap();
        assert_eq!(mol.atom(oxygen).formal_charge, -1);
    }

    #[test]
    fn patterns_survive_rewriting() {
        for text in [
            "[*:1][C:2](=[O:3])[OH:4]",
            "[*:1][OH:2]",
            "[C:1]-[C:2]",
            "[#6:1][#8]",
        ] {
            let pat = Pattern::from_smarts(text).unwrap();
            let rewritten = pat.to_smarts();
            let reparsed = Pattern::from_smarts(&rewritten)
                .unwrap_or_else(|e| panic!("rewritten pattern {rewritten:?} failed: {e}"));
            assert_eq!(reparsed.atom_count(), pat.atom_count());
            assert_eq!(reparsed.bond_count(), pat.bond_count());
        }
    }

    #[test]
    fn explicit_single_between_rings() {
        let biphenyl = Molecule::from_smiles("c1ccccc1-c1ccccc1").unwrap();
        let rewritten = biphenyl.to_smiles();
        assert!(rewritten.contains('-'), "got {rewritten:?}");
    }
}
