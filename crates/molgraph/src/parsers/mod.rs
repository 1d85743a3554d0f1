//! SMILES and pattern (SMARTS-subset) text parsing

mod ast;
mod build;

use nom::Err;
use nom::combinator::all_consuming;

use crate::errors::{MolGraphError, Result};
use crate::{Molecule, Pattern};

pub fn parse_smiles(text: &str) -> Result<Molecule> {
    let ast = run_parser("SMILES", text)?;
    build::molecule(&ast)
}

pub fn parse_pattern(text: &str) -> Result<Pattern> {
    let ast = run_parser("pattern", text)?;
    build::pattern(&ast)
}

fn run_parser(kind: &'static str, text: &str) -> Result<ast::SmilesAst> {
    match all_consuming(ast::smiles)(text) {
        Ok((_, parsed)) => Ok(parsed),
        Err(Err::Error(e) | Err::Failure(e)) => {
            let offset = text.len() - e.input.len();
            Err(MolGraphError::parse(
                kind,
                text,
                format!("unexpected input at offset {offset}"),
            ))
        }
        // `complete` parsers never return `Incomplete`
        Err(Err::Incomplete(_)) => Err(MolGraphError::parse(kind, text, "incomplete input")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BondOrder;

    #[test]
    fn linear_and_branched_molecules() {
        let propanol = parse_smiles("CCCO").unwrap();
        assert_eq!(propanol.atom_count(), 4);
        assert_eq!(propanol.bond_count(), 3);

        let isobutane = parse_smiles("CC(C)C").unwrap();
        assert_eq!(isobutane.atom_count(), 4);
        assert_eq!(isobutane.bond_count(), 3);
    }

    #[test]
    fn rings() {
        let cyclohexane = parse_smiles("C1CCCCC1").unwrap();
        assert_eq!(cyclohexane.atom_count(), 6);
        assert_eq!(cyclohexane.bond_count(), 6);

        let benzene = parse_smiles("c1ccccc1").unwrap();
        assert!(benzene.bonds().all(|b| benzene.bond(b).order == BondOrder::Aromatic));
    }

    #[test]
    fn bond_orders() {
        let mol = parse_smiles("C=C").unwrap();
        let bond = mol.bonds().next().unwrap();
        assert_eq!(mol.bond(bond).order, BondOrder::Double);

        let mol = parse_smiles("C#N").unwrap();
        let bond = mol.bonds().next().unwrap();
        assert_eq!(mol.bond(bond).order, BondOrder::Triple);
    }

    #[test]
    fn bracket_atoms() {
        let hydroxide = parse_smiles("[OH-]").unwrap();
        let atom = hydroxide.atom(hydroxide.atoms().next().unwrap());
        assert_eq!(atom.atomic_num, 8);
        assert_eq!(atom.formal_charge, -1);
        assert_eq!(atom.explicit_hs, 1);
        assert!(atom.no_implicit_hs);

        let ammonium = parse_smiles("[NH4+]").unwrap();
        let atom = ammonium.atom(ammonium.atoms().next().unwrap());
        assert_eq!(atom.formal_charge, 1);
        assert_eq!(atom.explicit_hs, 4);
    }

    #[test]
    fn map_numbers() {
        let mol = parse_smiles("[CH3:1][OH:2]").unwrap();
        let maps: Vec<_> = mol.atoms().map(|id| mol.atom(id).map_num).collect();
        assert_eq!(maps, vec![1, 2]);
    }

    #[test]
    fn dot_separated_fragments() {
        let mol = parse_smiles("CC.O").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 1);
    }

    #[test]
    fn patterns() {
        let pat = parse_pattern("[*:1][C:2](=[O:3])[OH:4]").unwrap();
        assert_eq!(pat.atom_count(), 4);
        let first = pat.atom(pat.atoms().next().unwrap());
        assert!(first.is_wildcard());
        assert_eq!(first.map_num, 1);

        let carbonyl_oxygen = pat
            .atoms()
            .find(|&id| pat.atom(id).map_num == 3)
            .unwrap();
        let carbon = pat.atoms().find(|&id| pat.atom(id).map_num == 2).unwrap();
        let bond = pat.bond_between(carbon, carbonyl_oxygen).unwrap();
        assert_eq!(pat.bond(bond).order, Some(BondOrder::Double));

        let hydroxyl = pat.atoms().find(|&id| pat.atom(id).map_num == 4).unwrap();
        assert_eq!(pat.atom(hydroxyl).hydrogens, Some(1));
    }

    #[test]
    fn atomic_number_queries() {
        let pat = parse_pattern("[#6][#8]").unwrap();
        let atoms: Vec<_> = pat.atoms().map(|id| pat.atom(id).element).collect();
        assert_eq!(atoms, vec![Some(6), Some(8)]);
        // aromaticity is unconstrained for atomic-number queries
        assert!(pat.atoms().all(|id| pat.atom(id).aromatic.is_none()));
    }

    #[test]
    fn wildcard_spellings() {
        for text in ["[*:1]C", "[R:1]C", "[R1:1]C", "[#0:1]C"] {
            let pat = parse_pattern(text).unwrap();
            let first = pat.atom(pat.atoms().next().unwrap());
            assert!(first.is_wildcard(), "{text} should parse as a wildcard");
            assert_eq!(first.map_num, 1);
        }
    }

    #[test]
    fn parse_failures() {
        assert!(parse_smiles("").is_err());
        assert!(parse_smiles("C(").is_err());
        assert!(parse_smiles("C1CC").is_err());
        assert!(parse_smiles("[Xx]").is_err());
        assert!(parse_smiles("C$C").is_err());
    }

    #[test]
    fn ring_closure_with_explicit_bond() {
        let mol = parse_smiles("C=1CCCCC=1").unwrap();
        assert_eq!(mol.bond_count(), 6);
        let doubles = mol
            .bonds()
            .filter(|&b| mol.bond(b).order == BondOrder::Double)
            .count();
        assert_eq!(doubles, 1);
    }
}
