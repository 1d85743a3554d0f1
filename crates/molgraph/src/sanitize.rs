//! Valence bookkeeping: implicit-hydrogen assignment and validity checks

use crate::errors::{MolGraphError, Result};
use crate::{AtomId, Molecule, element};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum SanitizeLevel {
    /// Recompute implicit hydrogens, then reject valence violations
    #[default]
    Full,
    /// Leave the molecule exactly as built
    Skip,
}

pub fn sanitize(mol: &mut Molecule, level: SanitizeLevel) -> Result<()> {
    match level {
        SanitizeLevel::Skip => Ok(()),
        SanitizeLevel::Full => {
            recompute_implicit_hs(mol);
            check_valences(mol)
        }
    }
}

/// Fill each atom's implicit hydrogens up to the smallest allowed valence.
/// Bracket-specified atoms are left alone, and atoms without a valence model
/// (wildcards, exotic elements) get none.
pub fn recompute_implicit_hs(mol: &mut Molecule) {
    let atoms: Vec<_> = mol.atoms().collect();
    for id in atoms {
        let bonded = bonded_valence(mol, id);
        let atom = mol.atom_mut(id);
        if atom.no_implicit_hs {
            atom.implicit_hs = 0;
            continue;
        }
        let allowed = allowed_valences(atom.atomic_num, atom.formal_charge);
        let occupied = bonded + atom.explicit_hs;
        atom.implicit_hs = allowed
            .iter()
            .find(|&&valence| valence >= occupied)
            .map_or(0, |&valence| valence - occupied);
    }
}

fn check_valences(mol: &Molecule) -> Result<()> {
    for id in mol.atoms() {
        let atom = mol.atom(id);
        let element = element::by_number(atom.atomic_num);
        if element.is_none_or(|e| e.valences.is_empty()) {
            continue;
        }
        let allowed = allowed_valences(atom.atomic_num, atom.formal_charge);
        let total = bonded_valence(mol, id) + atom.total_hs();
        // Undershooting is tolerated (radical centers); overshooting is not
        if allowed.iter().max().is_some_and(|&max| total > max) {
            return Err(MolGraphError::Valence {
                index: id.index(),
                symbol: atom.symbol().to_owned(),
                valence: total,
                allowed,
            });
        }
    }
    Ok(())
}

/// Sum of bond contributions at an atom, counting the delocalized π
/// electron of an aromatic system as one extra unit
fn bonded_valence(mol: &Molecule, id: AtomId) -> u8 {
    let mut total = 0;
    let mut any_aromatic = false;
    for bond in mol.bonds_of(id) {
        let order = mol.bond(bond).order;
        total += order.valence_units();
        any_aromatic |= order == crate::BondOrder::Aromatic;
    }
    total + u8::from(any_aromatic)
}

/// The element's allowed valences, shifted by formal charge: protonation
/// raises what N/O-group elements can carry, while charge of either sign
/// costs carbon a bond
fn allowed_valences(atomic_num: u8, formal_charge: i8) -> Vec<u8> {
    let Some(element) = element::by_number(atomic_num) else {
        return Vec::new();
    };
    let shift = |valence: u8| -> u8 {
        let valence = i16::from(valence);
        let charge = i16::from(formal_charge);
        let shifted = match atomic_num {
            6 => valence - charge.abs(),
            7 | 8 | 15 | 16 => valence + charge,
            _ => valence,
        };
        u8::try_from(shifted).unwrap_or(0)
    };
    element.valences.iter().map(|&v| shift(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse_smiles;

    fn sanitized(smiles: &str) -> Molecule {
        let mut mol = parse_smiles(smiles).unwrap();
        sanitize(&mut mol, SanitizeLevel::Full).unwrap();
        mol
    }

    fn hydrogens(mol: &Molecule) -> Vec<u8> {
        mol.atoms().map(|id| mol.atom(id).total_hs()).collect()
    }

    #[test]
    fn implicit_hydrogens_for_organic_atoms() {
        assert_eq!(hydrogens(&sanitized("CCO")), vec![3, 2, 1]);
        assert_eq!(hydrogens(&sanitized("C=O")), vec![2, 0]);
        assert_eq!(hydrogens(&sanitized("C#N")), vec![1, 0]);
    }

    #[test]
    fn aromatic_rings() {
        // Benzene: one hydrogen per carbon
        assert_eq!(hydrogens(&sanitized("c1ccccc1")), vec![1; 6]);
        // Pyridine: the nitrogen carries none
        let pyridine = sanitized("n1ccccc1");
        assert_eq!(hydrogens(&pyridine)[0], 0);
    }

    #[test]
    fn charged_atoms() {
        let hydroxide = sanitized("[OH-]");
        assert_eq!(hydrogens(&hydroxide), vec![1]);
        let ammonium = sanitized("[NH4+]");
        assert_eq!(hydrogens(&ammonium), vec![4]);
    }

    #[test]
    fn bracket_atoms_keep_their_hydrogens() {
        let mol = sanitized("[CH2]O");
        assert_eq!(hydrogens(&mol)[0], 2);
    }

    #[test]
    fn hypervalent_sulfur_uses_higher_valences() {
        // Sulfate-style S(=O)(=O) center: valence 6 is allowed
        let sulfone = sanitized("CS(=O)(=O)C");
        assert_eq!(hydrogens(&sulfone)[1], 0);
    }

    #[test]
    fn valence_violations_are_rejected() {
        let mut pentavalent_carbon = parse_smiles("[CH3]").unwrap();
        let carbon = pentavalent_carbon.atoms().next().unwrap();
        for _ in 0..2 {
            let extra = pentavalent_carbon.add_atom(crate::Atom::new(8));
            pentavalent_carbon.add_bond(
                carbon,
                extra,
                crate::Bond::new(crate::BondOrder::Double),
            );
        }
        assert!(matches!(
            sanitize(&mut pentavalent_carbon, SanitizeLevel::Full),
            Err(MolGraphError::Valence { .. })
        ));
        // Skipping sanitization tolerates anything
        assert!(sanitize(&mut pentavalent_carbon, SanitizeLevel::Skip).is_ok());
    }

    #[test]
    fn wildcards_have_no_valence_model() {
        let mut mol = parse_smiles("*C").unwrap();
        assert!(sanitize(&mut mol, SanitizeLevel::Full).is_ok());
        assert_eq!(hydrogens(&mol), vec![0, 3]);
    }
}
