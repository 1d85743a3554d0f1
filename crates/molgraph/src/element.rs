//! A fixed table of the elements this crate can reason about

use std::str::FromStr;

use ahash::HashMap;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use crate::errors::{MolGraphError, Result};

/// Atomic number 0 is reserved for the wildcard pseudo-atom (`*` in SMILES
/// and pattern text) which stands in for an unspecified attachment.
pub const WILDCARD: u8 = 0;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Element {
    pub symbol: &'static str,
    pub atomic_num: u8,
    /// Allowed total valences, lowest first. Empty means "no valence model"
    /// (the wildcard and anything exotic enough to be missing from the table).
    pub valences: &'static [u8],
    /// Whether this element may be written bare (outside brackets) in SMILES
    pub organic_subset: bool,
    pub monoisotopic_mass: Decimal,
    pub average_mass: Decimal,
}

// (symbol, atomic number, valences, organic subset, monoisotopic, average)
type Record = (&'static str, u8, &'static [u8], bool, &'static str, &'static str);

const RECORDS: &[Record] = &[
    ("*", 0, &[], false, "0", "0"),
    ("H", 1, &[1], false, "1.00782503207", "1.008"),
    ("B", 5, &[3], true, "11.00930536", "10.811"),
    ("C", 6, &[4], true, "12", "12.011"),
    ("N", 7, &[3], true, "14.0030740048", "14.007"),
    ("O", 8, &[2], true, "15.99491461956", "15.999"),
    ("F", 9, &[1], true, "18.99840322", "18.998403163"),
    ("Na", 11, &[1], false, "22.9897692809", "22.98976928"),
    ("Mg", 12, &[2], false, "23.9850417", "24.305"),
    ("Si", 14, &[4], false, "27.9769265325", "28.085"),
    ("P", 15, &[3, 5], true, "30.97376163", "30.973761998"),
    ("S", 16, &[2, 4, 6], true, "31.972071", "32.06"),
    ("Cl", 17, &[1], true, "34.96885268", "35.45"),
    ("K", 19, &[1], false, "38.96370668", "39.0983"),
    ("Ca", 20, &[2], false, "39.96259098", "40.078"),
    ("Fe", 26, &[2, 3], false, "55.9349375", "55.845"),
    ("Br", 35, &[1], true, "78.9183371", "79.904"),
    ("I", 53, &[1], true, "126.904473", "126.90447"),
];

static ELEMENTS: Lazy<Vec<Element>> = Lazy::new(|| {
    RECORDS
        .iter()
        .map(|&(symbol, atomic_num, valences, organic_subset, mono, avg)| Element {
            symbol,
            atomic_num,
            valences,
            organic_subset,
            // SAFETY: `RECORDS` holds only literal decimal strings
            monoisotopic_mass: Decimal::from_str(mono).unwrap(),
            average_mass: Decimal::from_str(avg).unwrap(),
        })
        .collect()
});

static BY_NUMBER: Lazy<HashMap<u8, &'static Element>> =
    Lazy::new(|| ELEMENTS.iter().map(|e| (e.atomic_num, e)).collect());

static BY_SYMBOL: Lazy<HashMap<&'static str, &'static Element>> =
    Lazy::new(|| ELEMENTS.iter().map(|e| (e.symbol, e)).collect());

#[must_use]
pub fn by_number(atomic_num: u8) -> Option<&'static Element> {
    BY_NUMBER.get(&atomic_num).copied()
}

pub fn by_symbol(symbol: &str) -> Result<&'static Element> {
    BY_SYMBOL
        .get(symbol)
        .copied()
        .ok_or_else(|| MolGraphError::element_lookup(symbol))
}

/// Elements which may appear as lowercase (aromatic) atoms in SMILES
pub fn by_aromatic_symbol(symbol: &str) -> Result<&'static Element> {
    match symbol {
        "b" | "c" | "n" | "o" | "p" | "s" => by_symbol(&symbol.to_ascii_uppercase()),
        _ => Err(MolGraphError::element_lookup(symbol)),
    }
}

#[must_use]
pub fn symbol_of(atomic_num: u8) -> &'static str {
    by_number(atomic_num).map_or("?", |e| e.symbol)
}
