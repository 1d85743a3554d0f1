//! Concrete query services. The set is closed: new services are added to
//! [`KnownService`], not discovered at runtime.

use derive_more::Display;
use serde_json::Value;
use url::Url;

use crate::errors::{Result, TransportError};
use crate::{PropertyQuery, QueryService, Transport};

/// PUG-style compound property tables: JSON responses with one properties
/// row per matched compound
pub struct CompoundTableService<T> {
    base: Url,
    transport: T,
}

/// Friendly aliases accepted alongside the official property-table column
/// names
const COMPOUND_ALIASES: &[(&str, &str)] = &[
    ("mw", "MolecularWeight"),
    ("molecular_weight", "MolecularWeight"),
    ("formula", "MolecularFormula"),
    ("smiles", "CanonicalSMILES"),
    ("canonical_smiles", "CanonicalSMILES"),
    ("isomeric_smiles", "IsomericSMILES"),
    ("inchi", "InChI"),
    ("inchikey", "InChIKey"),
    ("iupac_name", "IUPACName"),
    ("xlogp", "XLogP"),
    ("charge", "Charge"),
];

const COMPOUND_BASE: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug/";

impl<T: Transport> CompoundTableService<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        // SAFETY: the base URL is a literal and always parses
        Self::with_base(Url::parse(COMPOUND_BASE).unwrap(), transport)
    }

    #[must_use]
    pub const fn with_base(base: Url, transport: T) -> Self {
        Self { base, transport }
    }

    fn canonical_property(property: &str) -> &str {
        COMPOUND_ALIASES
            .iter()
            .find(|(alias, _)| *alias == property)
            .map_or(property, |&(_, official)| official)
    }
}

impl<T: Transport> QueryService for CompoundTableService<T> {
    fn service_name(&self) -> &'static str {
        "compound property table"
    }

    fn available_properties(&self) -> Vec<&'static str> {
        let mut properties: Vec<_> = COMPOUND_ALIASES.iter().map(|&(alias, _)| alias).collect();
        properties.extend(COMPOUND_ALIASES.iter().map(|&(_, official)| official));
        properties.sort_unstable();
        properties.dedup();
        properties
    }

    fn fetch(&self, query: &PropertyQuery) -> Result<Option<Value>> {
        let official = Self::canonical_property(query.property);
        let mut url = self
            .base
            .join(&format!(
                "compound/{}/property/{official}/JSON",
                query.namespace
            ))
            .map_err(|e| TransportError::new(format!("bad query URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair(query.namespace, query.representation);

        let body = self.transport.get_text(&url)?;
        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| TransportError::new(format!("unparseable response: {e}")))?;

        let rows = parsed
            .get("PropertyTable")
            .and_then(|t| t.get("Properties"))
            .and_then(Value::as_array);
        let values: Vec<Value> = rows
            .map(|rows| {
                rows.iter()
                    // Rows occasionally omit the requested column; skip them
                    .filter_map(|row| row.get(official).cloned())
                    .collect()
            })
            .unwrap_or_default();

        Ok((!values.is_empty()).then_some(Value::Array(values)))
    }
}

/// Resolver-style structure service: plain-text responses, one value per
/// line, with the namespace naming the resolver to consult
pub struct StructureResolverService<T> {
    base: Url,
    transport: T,
}

const RESOLVER_PROPERTIES: &[&str] = &[
    "smiles",
    "stdinchi",
    "stdinchikey",
    "iupac_name",
    "names",
    "cas",
    "formula",
    "mw",
    "h_bond_donor_count",
    "h_bond_acceptor_count",
    "rotor_count",
    "ring_count",
];

const RESOLVER_BASE: &str = "https://cactus.nci.nih.gov/chemical/structure/";

impl<T: Transport> StructureResolverService<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        // SAFETY: the base URL is a literal and always parses
        Self::with_base(Url::parse(RESOLVER_BASE).unwrap(), transport)
    }

    #[must_use]
    pub const fn with_base(base: Url, transport: T) -> Self {
        Self { base, transport }
    }
}

impl<T: Transport> QueryService for StructureResolverService<T> {
    fn service_name(&self) -> &'static str {
        "structure resolver"
    }

    fn available_properties(&self) -> Vec<&'static str> {
        RESOLVER_PROPERTIES.to_vec()
    }

    fn fetch(&self, query: &PropertyQuery) -> Result<Option<Value>> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::new("resolver base URL cannot take a path"))?
            .push(query.representation)
            .push(query.property);
        url.query_pairs_mut().append_pair("resolver", query.namespace);

        let body = self.transport.get_text(&url)?;
        let values: Vec<Value> = body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Value::String(line.to_owned()))
            .collect();

        Ok((!values.is_empty()).then_some(Value::Array(values)))
    }
}

/// The closed registry of query services, in default fallback order
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
pub enum KnownService {
    #[display("compound property table")]
    CompoundTable,
    #[display("structure resolver")]
    StructureResolver,
}

impl KnownService {
    pub const ALL: [Self; 2] = [Self::CompoundTable, Self::StructureResolver];

    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.to_string() == name)
    }

    /// Materialize this registry entry over a transport
    #[must_use]
    pub fn with_transport<T: Transport + 'static>(self, transport: T) -> Box<dyn QueryService> {
        match self {
            Self::CompoundTable => Box::new(CompoundTableService::new(transport)),
            Self::StructureResolver => Box::new(StructureResolverService::new(transport)),
        }
    }
}
