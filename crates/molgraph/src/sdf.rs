//! SDF / V2000 molfile persistence, including the per-atom metadata and
//! partial-charge round-trip (packaged into data fields as JSON)

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::errors::{MolGraphError, Result};
use crate::sanitize::{self, SanitizeLevel};
use crate::{Atom, AtomId, Bond, BondOrder, Molecule, Pattern, PatternAtom, PatternBond, element};

/// Data field holding the JSON-packaged per-atom metadata
pub const ATOM_METADATA_FIELD: &str = "atom_metadata";
/// Data field holding JSON-packaged partial charges
pub const PARTIAL_CHARGES_FIELD: &str = "atom_partial_charges";

const FORMAT: &str = "SDF";

type PackagedMetadata = BTreeMap<String, BTreeMap<String, String>>;
type PackagedCharges = BTreeMap<String, f64>;

// === Writing ========================================================================================================

pub fn write_sdf(mols: &[Molecule]) -> String {
    let mut out = String::new();
    for mol in mols {
        out.push_str(&write_molblock(mol));

        let metadata: PackagedMetadata = mol
            .atoms()
            .enumerate()
            .filter(|(_, id)| !mol.atom(*id).metadata.is_empty())
            .map(|(i, id)| (i.to_string(), mol.atom(id).metadata.clone()))
            .collect();
        if !metadata.is_empty() {
            // SAFETY: string-keyed maps of strings always serialize
            push_data_item(&mut out, ATOM_METADATA_FIELD, &serde_json::to_string(&metadata).unwrap());
        }

        let charges: PackagedCharges = mol
            .atoms()
            .enumerate()
            .filter_map(|(i, id)| Some((i.to_string(), mol.atom(id).partial_charge?)))
            .collect();
        if !charges.is_empty() {
            push_data_item(&mut out, PARTIAL_CHARGES_FIELD, &serde_json::to_string(&charges).unwrap());
        }

        out.push_str("$$$$\n");
    }
    out
}

fn push_data_item(out: &mut String, field: &str, value: &str) {
    // SAFETY: writing into a String cannot fail
    writeln!(out, "> <{field}>\n{value}\n").unwrap();
}

#[must_use]
pub fn write_molblock(mol: &Molecule) -> String {
    let atoms: Vec<_> = mol.atoms().collect();
    let mut out = header(mol.atom_count(), mol.bond_count());

    for &id in &atoms {
        let atom = mol.atom(id);
        push_atom_line(&mut out, atom.symbol(), atom.map_num);
    }
    push_bond_lines(&mut out, mol, &atoms, |bond: &Bond| match bond.order {
        BondOrder::Single => 1,
        BondOrder::Double => 2,
        BondOrder::Triple => 3,
        BondOrder::Aromatic => 4,
    });
    push_charge_lines(
        &mut out,
        atoms
            .iter()
            .map(|&id| mol.atom(id).formal_charge)
            .enumerate()
            .filter(|&(_, charge)| charge != 0),
    );
    out.push_str("M  END\n");
    out
}

/// Molfile rendition of a query template. `wilds_to_r` spells wildcard atoms
/// as `R` (the R-group convention reaction-file consumers expect) instead
/// of `*`; both spellings are understood on import.
#[must_use]
pub fn write_pattern_molblock(pat: &Pattern, wilds_to_r: bool) -> String {
    let atoms: Vec<_> = pat.atoms().collect();
    let mut out = header(pat.atom_count(), pat.bond_count());

    for &id in &atoms {
        let atom = pat.atom(id);
        let symbol = match atom.element {
            None if wilds_to_r => "R",
            None => "*",
            Some(n) => element::symbol_of(n),
        };
        push_atom_line(&mut out, symbol, atom.map_num);
    }
    push_bond_lines(&mut out, pat, &atoms, |bond: &PatternBond| match bond.order {
        Some(BondOrder::Single) => 1,
        Some(BondOrder::Double) => 2,
        Some(BondOrder::Triple) => 3,
        Some(BondOrder::Aromatic) => 4,
        // Query "any" bond
        None => 8,
    });
    push_charge_lines(
        &mut out,
        atoms
            .iter()
            .map(|&id| pat.atom(id).charge.unwrap_or(0))
            .enumerate()
            .filter(|&(_, charge)| charge != 0),
    );
    out.push_str("M  END\n");
    out
}

fn header(atom_count: usize, bond_count: usize) -> String {
    let mut out = String::from("\n  molgraph\n\n");
    // SAFETY: writing into a String cannot fail
    writeln!(out, "{atom_count:>3}{bond_count:>3}  0  0  0  0  0  0  0  0999 V2000").unwrap();
    out
}

fn push_atom_line(out: &mut String, symbol: &str, map_num: u32) {
    writeln!(
        out,
        "{:>10.4}{:>10.4}{:>10.4} {:<3} 0  0  0  0  0  0  0  0  0{:>3}  0  0",
        0.0, 0.0, 0.0, symbol, map_num
    )
    .unwrap();
}

fn push_bond_lines<A, B>(
    out: &mut String,
    mol: &crate::Mol<A, B>,
    atoms: &[AtomId],
    code: impl Fn(&B) -> u8,
) {
    let position: BTreeMap<_, _> = atoms.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    for bond in mol.bonds() {
        let (a, b) = mol.bond_endpoints(bond);
        writeln!(
            out,
            "{:>3}{:>3}{:>3}  0",
            position[&a] + 1,
            position[&b] + 1,
            code(mol.bond(bond))
        )
        .unwrap();
    }
}

fn push_charge_lines(out: &mut String, charged: impl Iterator<Item = (usize, i8)>) {
    let charged: Vec<_> = charged.collect();
    for chunk in charged.chunks(8) {
        let mut line = format!("M  CHG{:>3}", chunk.len());
        for &(index, charge) in chunk {
            // SAFETY: writing into a String cannot fail
            write!(line, "{:>4}{:>4}", index + 1, charge).unwrap();
        }
        out.push_str(&line);
        out.push('\n');
    }
}

// === Reading ========================================================================================================

pub fn read_sdf(text: &str) -> Result<Vec<Molecule>> {
    let mut molecules = Vec::new();
    for record in split_records(text) {
        let end = record
            .iter()
            .position(|line| line.trim_end() == "M  END")
            .ok_or_else(|| MolGraphError::file_format(FORMAT, 0, "record without M  END"))?;

        let mut mol = parse_molblock(&record[..=end])?;
        let data = parse_data_items(&record[end + 1..]);

        if let Some(value) = data.get(ATOM_METADATA_FIELD) {
            let packaged: PackagedMetadata = serde_json::from_str(value)
                .map_err(|e| MolGraphError::file_format(FORMAT, end + 1, e))?;
            let atoms: Vec<_> = mol.atoms().collect();
            for (index, metadata) in packaged {
                let id = lookup_atom(&atoms, &index)?;
                mol.atom_mut(id).metadata = metadata;
            }
        }
        if let Some(value) = data.get(PARTIAL_CHARGES_FIELD) {
            let packaged: PackagedCharges = serde_json::from_str(value)
                .map_err(|e| MolGraphError::file_format(FORMAT, end + 1, e))?;
            let atoms: Vec<_> = mol.atoms().collect();
            for (index, charge) in packaged {
                let id = lookup_atom(&atoms, &index)?;
                mol.atom_mut(id).partial_charge = Some(charge);
            }
        }

        sanitize::sanitize(&mut mol, SanitizeLevel::Full)?;
        molecules.push(mol);
    }
    Ok(molecules)
}

fn lookup_atom(atoms: &[AtomId], index: &str) -> Result<AtomId> {
    index
        .parse::<usize>()
        .ok()
        .and_then(|i| atoms.get(i).copied())
        .ok_or_else(|| {
            MolGraphError::file_format(FORMAT, 0, format!("data field names atom {index:?}"))
        })
}

fn split_records(text: &str) -> Vec<Vec<&str>> {
    let mut records = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim_end() == "$$$$" {
            if !current.iter().all(|l| l.trim().is_empty()) {
                records.push(current);
            }
            current = Vec::new();
        } else {
            current.push(line);
        }
    }
    // A trailing record without the $$$$ terminator is tolerated
    if !current.iter().all(|l| l.trim().is_empty()) {
        records.push(current);
    }
    records
}

fn parse_data_items(lines: &[&str]) -> BTreeMap<String, String> {
    let mut items = BTreeMap::new();
    let mut field: Option<String> = None;
    let mut value = String::new();
    for line in lines {
        if let Some(rest) = line.trim_start().strip_prefix('>') {
            if let Some(name) = field.take() {
                items.insert(name, value.trim().to_owned());
                value = String::new();
            }
            let name = rest
                .trim()
                .strip_prefix('<')
                .and_then(|n| n.strip_suffix('>'))
                .unwrap_or(rest.trim());
            field = Some(name.to_owned());
        } else if field.is_some() {
            value.push_str(line);
            value.push('\n');
        }
    }
    if let Some(name) = field {
        items.insert(name, value.trim().to_owned());
    }
    items
}

struct RawBlock {
    atom_lines: Vec<String>,
    bond_lines: Vec<String>,
    charges: Vec<(usize, i8)>,
}

fn parse_raw_block(lines: &[&str]) -> Result<RawBlock> {
    if lines.len() < 4 {
        return Err(MolGraphError::file_format(FORMAT, 0, "molblock too short"));
    }
    let counts = lines[3];
    if counts.len() < 6 {
        return Err(MolGraphError::file_format(FORMAT, 4, "counts line too short"));
    }
    let atom_count: usize = counts[0..3]
        .trim()
        .parse()
        .map_err(|_| MolGraphError::file_format(FORMAT, 4, "invalid atom count"))?;
    let bond_count: usize = counts[3..6]
        .trim()
        .parse()
        .map_err(|_| MolGraphError::file_format(FORMAT, 4, "invalid bond count"))?;

    let atom_start = 4;
    let bond_start = atom_start + atom_count;
    if lines.len() < bond_start + bond_count {
        return Err(MolGraphError::file_format(FORMAT, lines.len(), "molblock truncated"));
    }

    let mut charges = Vec::new();
    for (i, line) in lines[bond_start + bond_count..].iter().enumerate() {
        if line.starts_with("M  CHG") {
            let tokens: Vec<_> = line.split_whitespace().collect();
            for pair in tokens.get(3..).unwrap_or(&[]).chunks(2) {
                let [index, charge] = pair else {
                    return Err(MolGraphError::file_format(
                        FORMAT,
                        bond_start + bond_count + i + 1,
                        "odd M  CHG entry",
                    ));
                };
                let index: usize = index.parse().map_err(|_| {
                    MolGraphError::file_format(FORMAT, 0, "bad charge atom index")
                })?;
                let charge: i8 = charge
                    .parse()
                    .map_err(|_| MolGraphError::file_format(FORMAT, 0, "bad charge value"))?;
                charges.push((index - 1, charge));
            }
        }
    }

    Ok(RawBlock {
        atom_lines: lines[atom_start..bond_start]
            .iter()
            .map(|&l| l.to_owned())
            .collect(),
        bond_lines: lines[bond_start..bond_start + bond_count]
            .iter()
            .map(|&l| l.to_owned())
            .collect(),
        charges,
    })
}

struct AtomFields {
    symbol: String,
    map_num: u32,
}

fn parse_atom_line(line: &str, number: usize) -> Result<AtomFields> {
    let tokens: Vec<_> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(MolGraphError::file_format(FORMAT, number, "atom line too short"));
    }
    let map_num = tokens.get(13).and_then(|t| t.parse().ok()).unwrap_or(0);
    Ok(AtomFields {
        symbol: tokens[3].to_owned(),
        map_num,
    })
}

fn parse_bond_line(line: &str, number: usize) -> Result<(usize, usize, u8)> {
    let tokens: Vec<_> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(MolGraphError::file_format(FORMAT, number, "bond line too short"));
    }
    let parse = |t: &str| {
        t.parse::<usize>()
            .map_err(|_| MolGraphError::file_format(FORMAT, number, "bad bond field"))
    };
    Ok((parse(tokens[0])? - 1, parse(tokens[1])? - 1, parse(tokens[2])? as u8))
}

/// Parse a V2000 molblock into an (unsanitized) molecule
pub fn parse_molblock(lines: &[&str]) -> Result<Molecule> {
    let raw = parse_raw_block(lines)?;
    let mut mol = Molecule::new();
    let mut ids = Vec::new();

    for (i, line) in raw.atom_lines.iter().enumerate() {
        let fields = parse_atom_line(line, 5 + i)?;
        let atomic_num = if is_wildcard_symbol(&fields.symbol) {
            element::WILDCARD
        } else {
            element::by_symbol(&fields.symbol)?.atomic_num
        };
        let mut atom = Atom::new(atomic_num);
        atom.map_num = fields.map_num;
        ids.push(mol.add_atom(atom));
    }

    for (i, line) in raw.bond_lines.iter().enumerate() {
        let (a, b, code) = parse_bond_line(line, 5 + raw.atom_lines.len() + i)?;
        let order = match code {
            1 => BondOrder::Single,
            2 => BondOrder::Double,
            3 => BondOrder::Triple,
            4 => BondOrder::Aromatic,
            other => {
                return Err(MolGraphError::file_format(
                    FORMAT,
                    5 + raw.atom_lines.len() + i,
                    format!("unsupported bond type {other}"),
                ));
            }
        };
        let (a, b) = bond_atoms(&ids, a, b)?;
        mol.add_bond(a, b, Bond::new(order));
    }

    for (index, charge) in raw.charges {
        let id = *ids
            .get(index)
            .ok_or_else(|| MolGraphError::file_format(FORMAT, 0, "charge names missing atom"))?;
        mol.atom_mut(id).formal_charge = charge;
    }

    // Aromatic flags are carried by bond type 4 in molfiles
    let aromatic: Vec<_> = mol
        .atoms()
        .filter(|&id| {
            mol.bonds_of(id)
                .any(|b| mol.bond(b).order == BondOrder::Aromatic)
        })
        .collect();
    for id in aromatic {
        mol.atom_mut(id).aromatic = true;
    }

    Ok(mol)
}

/// Parse a V2000 molblock as a query template
pub fn parse_pattern_molblock(lines: &[&str]) -> Result<Pattern> {
    let raw = parse_raw_block(lines)?;
    let mut pat = Pattern::new();
    let mut ids = Vec::new();

    for (i, line) in raw.atom_lines.iter().enumerate() {
        let fields = parse_atom_line(line, 5 + i)?;
        let atom = if is_wildcard_symbol(&fields.symbol) {
            PatternAtom {
                map_num: fields.map_num,
                ..PatternAtom::wildcard()
            }
        } else {
            PatternAtom {
                element: Some(element::by_symbol(&fields.symbol)?.atomic_num),
                aromatic: Some(false),
                charge: None,
                hydrogens: None,
                map_num: fields.map_num,
            }
        };
        ids.push(pat.add_atom(atom));
    }

    for (i, line) in raw.bond_lines.iter().enumerate() {
        let (a, b, code) = parse_bond_line(line, 5 + raw.atom_lines.len() + i)?;
        let order = match code {
            1 => Some(BondOrder::Single),
            2 => Some(BondOrder::Double),
            3 => Some(BondOrder::Triple),
            4 => Some(BondOrder::Aromatic),
            8 => None,
            other => {
                return Err(MolGraphError::file_format(
                    FORMAT,
                    5 + raw.atom_lines.len() + i,
                    format!("unsupported bond type {other}"),
                ));
            }
        };
        let (a, b) = bond_atoms(&ids, a, b)?;
        pat.add_bond(a, b, PatternBond { order });
    }

    for (index, charge) in raw.charges {
        let id = *ids
            .get(index)
            .ok_or_else(|| MolGraphError::file_format(FORMAT, 0, "charge names missing atom"))?;
        pat.atom_mut(id).charge = Some(charge);
    }

    let aromatic: Vec<_> = pat
        .atoms()
        .filter(|&id| {
            pat.bonds_of(id)
                .any(|b| pat.bond(b).order == Some(BondOrder::Aromatic))
        })
        .collect();
    for id in aromatic {
        if pat.atom(id).element.is_some() {
            pat.atom_mut(id).aromatic = Some(true);
        }
    }

    Ok(pat)
}

fn bond_atoms(ids: &[AtomId], a: usize, b: usize) -> Result<(AtomId, AtomId)> {
    match (ids.get(a), ids.get(b)) {
        (Some(&a), Some(&b)) => Ok((a, b)),
        _ => Err(MolGraphError::file_format(FORMAT, 0, "bond names missing atom")),
    }
}

fn is_wildcard_symbol(symbol: &str) -> bool {
    symbol == "*" || symbol.starts_with('R')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Molecule, Pattern};

    #[test]
    fn molblock_round_trip() {
        let mol = Molecule::from_smiles("[CH3:1][C:2](=[O:3])[O-]").unwrap();
        let block = write_molblock(&mol);
        let lines: Vec<_> = block.lines().collect();
        let reparsed = parse_molblock(&lines).unwrap();

        assert_eq!(reparsed.atom_count(), mol.atom_count());
        assert_eq!(reparsed.bond_count(), mol.bond_count());
        let maps: Vec<_> = reparsed.atoms().map(|id| reparsed.atom(id).map_num).collect();
        assert_eq!(maps, vec![1, 2, 3, 0]);
        let charges: Vec<_> = reparsed
            .atoms()
            .map(|id| reparsed.atom(id).formal_charge)
            .collect();
        assert_eq!(charges, vec![0, 0, 0, -1]);
    }

    #[test]
    fn pattern_molblock_round_trip_with_r_groups() {
        let pat = Pattern::from_smarts("[*:1][C:2](=[O:3])[OH:4]").unwrap();
        let block = write_pattern_molblock(&pat, true);
        assert!(block.contains(" R "), "wildcards should be exported as R");

        let lines: Vec<_> = block.lines().collect();
        let reparsed = parse_pattern_molblock(&lines).unwrap();
        assert_eq!(reparsed.atom_count(), 4);
        assert_eq!(reparsed.bond_count(), 3);
        let first = reparsed.atom(reparsed.atoms().next().unwrap());
        assert!(first.is_wildcard());
        assert_eq!(first.map_num, 1);
    }

    #[test]
    fn sdf_metadata_round_trip() {
        let mut mol = Molecule::from_smiles("CCO").unwrap();
        let first = mol.atoms().next().unwrap();
        let atom = mol.atom_mut(first);
        atom.metadata.insert("residue_name".into(), "ETH".into());
        atom.metadata.insert("substructure_id".into(), "0".into());
        let last = mol.atoms().last().unwrap();
        mol.atom_mut(last).partial_charge = Some(-0.39);

        let text = write_sdf(std::slice::from_ref(&mol));
        let recovered = read_sdf(&text).unwrap();
        assert_eq!(recovered.len(), 1);
        let recovered = &recovered[0];

        let first = recovered.atoms().next().unwrap();
        assert_eq!(
            recovered.atom(first).metadata.get("residue_name").map(String::as_str),
            Some("ETH")
        );
        let last = recovered.atoms().last().unwrap();
        assert_eq!(recovered.atom(last).partial_charge, Some(-0.39));
    }

    #[test]
    fn multi_molecule_container() {
        let mols = vec![
            Molecule::from_smiles("CCO").unwrap(),
            Molecule::from_smiles("OC(=O)C").unwrap(),
        ];
        let text = write_sdf(&mols);
        let recovered = read_sdf(&text).unwrap();
        assert_eq!(recovered.len(), 2);
        assert_eq!(recovered[0].atom_count(), 3);
        assert_eq!(recovered[1].atom_count(), 4);
    }

    #[test]
    fn molecules_without_annotations_produce_no_data_fields() {
        let mol = Molecule::from_smiles("CC").unwrap();
        let text = write_sdf(std::slice::from_ref(&mol));
        assert!(!text.contains(ATOM_METADATA_FIELD));
        assert!(!text.contains(PARTIAL_CHARGES_FIELD));
    }

    #[test]
    fn foreign_files_parse_too() {
        // Methanol as another program might write it, with a stray data field
        let text = indoc::indoc! {"
            methanol
              -OEChem-

              2  1  0  0  0  0  0  0  0  0999 V2000
                0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
                1.4000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
              1  2  1  0
            M  END
            > <origin>
            somewhere else

            $$$$
        "};
        let mols = read_sdf(text).unwrap();
        assert_eq!(mols.len(), 1);
        assert_eq!(mols[0].atom_count(), 2);
        let hs: Vec<_> = mols[0].atoms().map(|id| mols[0].atom(id).total_hs()).collect();
        assert_eq!(hs, vec![3, 1]);
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(read_sdf("garbage\nwithout\nstructure\n").is_err());
        assert!(parse_molblock(&["", "", ""]).is_err());
    }

    #[test]
    fn implicit_hydrogens_are_restored_on_load() {
        let mol = Molecule::from_smiles("CCO").unwrap();
        let text = write_sdf(std::slice::from_ref(&mol));
        let recovered = &read_sdf(&text).unwrap()[0];
        let hs: Vec<_> = recovered
            .atoms()
            .map(|id| recovered.atom(id).total_hs())
            .collect();
        assert_eq!(hs, vec![3, 2, 1]);
    }
}
