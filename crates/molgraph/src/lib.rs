//! A molecular-graph substrate scoped to reaction orchestration: parsing,
//! substructure search, bond surgery, and persistence, not a modeling engine

pub mod charge;
pub mod element;
pub mod errors;
mod mol;
pub mod parsers;
pub mod paths;
pub mod sanitize;
pub mod sdf;
pub mod substructure;
mod writer;

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use errors::{MolGraphError, Result};
pub use mol::{AtomId, BondId, Mol};
pub use sanitize::SanitizeLevel;

/// A concrete molecule: every atom is a definite element
pub type Molecule = Mol<Atom, Bond>;

/// A query molecule: atoms and bonds are constraints, not facts
pub type Pattern = Mol<PatternAtom, PatternBond>;

#[derive(Clone, PartialEq, Debug, Default)]
pub struct Atom {
    pub atomic_num: u8,
    pub formal_charge: i8,
    /// Hydrogens fixed by the input text (bracket atoms carry no implicit Hs)
    pub explicit_hs: u8,
    /// Hydrogens filled in by sanitization to satisfy the element's valence
    pub implicit_hs: u8,
    /// When set, `implicit_hs` stays zero and `explicit_hs` is authoritative
    pub no_implicit_hs: bool,
    pub aromatic: bool,
    /// Atom-map number; 0 means unmapped
    pub map_num: u32,
    /// Index of the reactant this atom came from in the last reaction
    pub source_reactant: Option<usize>,
    /// Set on product atoms that matched a wildcard (attachment-point)
    /// template atom during a reaction
    pub former_attachment: bool,
    pub partial_charge: Option<f64>,
    /// Free-form per-atom annotations, persisted through SDF round-trips
    pub metadata: BTreeMap<String, String>,
}

impl Atom {
    #[must_use]
    pub fn new(atomic_num: u8) -> Self {
        Self {
            atomic_num,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn total_hs(&self) -> u8 {
        self.explicit_hs + self.implicit_hs
    }

    #[must_use]
    pub fn symbol(&self) -> &'static str {
        element::symbol_of(self.atomic_num)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Bond {
    pub order: BondOrder,
    /// How this bond relates to the reaction that produced its molecule, if any
    pub change: Option<BondChange>,
}

impl Bond {
    #[must_use]
    pub const fn new(order: BondOrder) -> Self {
        Self {
            order,
            change: None,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Display)]
pub enum BondOrder {
    #[default]
    #[display("single")]
    Single,
    #[display("double")]
    Double,
    #[display("triple")]
    Triple,
    #[display("aromatic")]
    Aromatic,
}

impl BondOrder {
    /// Whole-unit contribution of this bond to an atom's valence. Aromatic
    /// bonds count one each; the shared π electron is accounted for
    /// separately during sanitization (the Daylight aromatic-valence model).
    #[must_use]
    pub const fn valence_units(self) -> u8 {
        match self {
            Self::Single | Self::Aromatic => 1,
            Self::Double => 2,
            Self::Triple => 3,
        }
    }
}

/// Provenance classification of a product bond relative to its reaction:
/// `Formed` bonds span atoms from different reactant templates, `Modified`
/// bonds connect atoms that came from the same one
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Serialize, Deserialize)]
pub enum BondChange {
    #[display("formed")]
    Formed,
    #[display("modified")]
    Modified,
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PatternAtom {
    /// `None` is the wildcard `*`, which matches any atom
    pub element: Option<u8>,
    pub aromatic: Option<bool>,
    pub charge: Option<i8>,
    /// Constrains the total hydrogen count of the matched atom
    pub hydrogens: Option<u8>,
    pub map_num: u32,
}

impl PatternAtom {
    #[must_use]
    pub fn wildcard() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        self.element.is_none()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct PatternBond {
    /// `None` matches a single or aromatic bond (the query default)
    pub order: Option<BondOrder>,
}

impl Molecule {
    /// Parse SMILES text and sanitize the result
    pub fn from_smiles(smiles: &str) -> Result<Self> {
        let mut mol = parsers::parse_smiles(smiles)?;
        sanitize::sanitize(&mut mol, SanitizeLevel::Full)?;
        Ok(mol)
    }

    #[must_use]
    pub fn to_smiles(&self) -> String {
        writer::write_molecule(self)
    }

    /// Atoms other than (explicit) hydrogens
    #[must_use]
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms()
            .filter(|&id| self.atom(id).atomic_num > 1)
            .count()
    }

    /// Split a possibly disconnected molecule into its connected components
    #[must_use]
    pub fn split_fragments(&self) -> Vec<Self> {
        paths::connected_components(self)
    }

    /// Strip every annotation left behind by a reaction: map numbers, source
    /// reactant indices, attachment-point flags, and bond-change marks.
    /// Fragments must be cleared before re-entering a reaction, or stale map
    /// numbers would contaminate the next round of provenance bookkeeping.
    pub fn clear_reaction_annotations(&mut self) {
        for id in self.atoms().collect::<Vec<_>>() {
            let atom = self.atom_mut(id);
            atom.map_num = 0;
            atom.source_reactant = None;
            atom.former_attachment = false;
        }
        for id in self.bonds().collect::<Vec<_>>() {
            self.bond_mut(id).change = None;
        }
    }

    pub fn clear_map_nums(&mut self) {
        for id in self.atoms().collect::<Vec<_>>() {
            self.atom_mut(id).map_num = 0;
        }
    }
}

impl Pattern {
    /// Parse a single pattern (one template of a reaction, or a standalone
    /// substructure query) from SMARTS-style text
    pub fn from_smarts(smarts: &str) -> Result<Self> {
        parsers::parse_pattern(smarts)
    }

    #[must_use]
    pub fn to_smarts(&self) -> String {
        writer::write_pattern(self)
    }
}

pub trait Massive {
    fn monoisotopic_mass(&self) -> Decimal;
    fn average_mass(&self) -> Decimal;
}

impl Massive for Molecule {
    fn monoisotopic_mass(&self) -> Decimal {
        self.mass_by(|e| e.monoisotopic_mass)
    }

    fn average_mass(&self) -> Decimal {
        self.mass_by(|e| e.average_mass)
    }
}

impl Molecule {
    fn mass_by(&self, mass: impl Fn(&element::Element) -> Decimal) -> Decimal {
        // SAFETY: parsing only ever produces atoms present in the element
        // table, and hydrogen is certainly present
        let hydrogen = mass(element::by_number(1).unwrap());
        self.atoms()
            .map(|id| {
                let atom = self.atom(id);
                let element = element::by_number(atom.atomic_num).unwrap();
                mass(element) + hydrogen * Decimal::from(atom.total_hs())
            })
            .sum()
    }
}

impl Display for Bond {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.order)?;
        if let Some(change) = self.change {
            write!(f, " ({change})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn heavy_atoms_and_hydrogens() {
        let ethanol = Molecule::from_smiles("CCO").unwrap();
        assert_eq!(ethanol.heavy_atom_count(), 3);
        let hs: u8 = ethanol.atoms().map(|id| ethanol.atom(id).total_hs()).sum();
        assert_eq!(hs, 6);
    }

    #[test]
    fn average_mass_of_water() {
        let water = Molecule::from_smiles("O").unwrap();
        assert_eq!(water.average_mass(), dec!(15.999) + dec!(2) * dec!(1.008));
    }

    #[test]
    fn clearing_reaction_annotations() {
        let mut mol = Molecule::from_smiles("[CH3:1][OH:2]").unwrap();
        let first = mol.atoms().next().unwrap();
        mol.atom_mut(first).source_reactant = Some(0);
        mol.clear_reaction_annotations();
        assert!(mol.atoms().all(|id| {
            let atom = mol.atom(id);
            atom.map_num == 0 && atom.source_reactant.is_none() && !atom.former_attachment
        }));
    }

    #[test]
    fn fragment_splitting() {
        let salt = Molecule::from_smiles("CCO.[Na]").unwrap();
        let fragments = salt.split_fragments();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].heavy_atom_count(), 3);
        assert_eq!(fragments[1].heavy_atom_count(), 1);
    }
}
