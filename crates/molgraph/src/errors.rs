use miette::Diagnostic;
use thiserror::Error;

pub type Result<T, E = MolGraphError> = std::result::Result<T, E>;

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum MolGraphError {
    #[error("failed to parse {kind} {text:?}: {reason}")]
    Parse {
        kind: &'static str,
        text: String,
        reason: String,
    },

    #[error("the element symbol {symbol:?} is not present in the element table")]
    ElementLookup { symbol: String },

    #[error("ring-closure digit {digit} was opened but never closed")]
    UnclosedRing { digit: u16 },

    #[error("atom {index} ({symbol}) has valence {valence}, but only {allowed:?} are allowed")]
    Valence {
        index: usize,
        symbol: String,
        valence: u8,
        allowed: Vec<u8>,
    },

    #[error("bond {bond} appears more than once in the set of bonds to cut")]
    DuplicateCutBond { bond: usize },

    #[error("malformed {format} input at line {line}: {reason}")]
    FileFormat {
        format: &'static str,
        line: usize,
        reason: String,
    },

    #[error("the charge method {name:?} is not registered")]
    ChargeMethodLookup { name: String },

    #[error("atom {index} is missing the {key:?} metadata needed for residue charge lookup")]
    MissingChargeMetadata { index: usize, key: &'static str },

    #[error("no charge entry for residue {residue:?}, substructure {substructure:?}")]
    ChargeLookup {
        residue: String,
        substructure: String,
    },
}

impl MolGraphError {
    pub(crate) fn parse(kind: &'static str, text: impl AsRef<str>, reason: impl ToString) -> Self {
        let text = text.as_ref().to_owned();
        let reason = reason.to_string();

        Self::Parse { kind, text, reason }
    }

    pub(crate) fn element_lookup(symbol: &str) -> Self {
        let symbol = symbol.to_owned();

        Self::ElementLookup { symbol }
    }

    pub(crate) fn file_format(format: &'static str, line: usize, reason: impl ToString) -> Self {
        let reason = reason.to_string();

        Self::FileFormat {
            format,
            line,
            reason,
        }
    }
}
