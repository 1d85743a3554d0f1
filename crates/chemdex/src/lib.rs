//! Chemical-database property lookup: a closed set of query services with
//! per-service property validation and an ordered multi-service fallback.
//! HTTP transport is an injected collaborator, never implemented here.

pub mod errors;
mod services;

use serde_json::Value;
use tracing::{error, info};
use url::Url;

pub use errors::{QueryError, Result, TransportError};
pub use services::{CompoundTableService, KnownService, StructureResolverService};

/// Carries requests over the wire. Implementations are supplied by callers
/// (an HTTP client in production, canned responses in tests).
pub trait Transport {
    fn get_text(&self, url: &Url) -> Result<String, TransportError>;
}

/// One property request: what to fetch, for which molecule, and how the
/// molecule is identified
#[derive(Copy, Clone, Debug)]
pub struct PropertyQuery<'q> {
    pub property: &'q str,
    pub representation: &'q str,
    /// Identifier type of `representation` (e.g. `smiles`, `name`, `inchi`)
    pub namespace: &'q str,
}

impl<'q> PropertyQuery<'q> {
    #[must_use]
    pub const fn new(property: &'q str, representation: &'q str) -> Self {
        Self {
            property,
            representation,
            namespace: "smiles",
        }
    }

    #[must_use]
    pub const fn with_namespace(mut self, namespace: &'q str) -> Self {
        self.namespace = namespace;
        self
    }
}

#[derive(Copy, Clone, Debug)]
pub struct QueryPolicy {
    /// Collapse multi-valued responses to their first entry
    pub keep_first_only: bool,
    /// Accept a missing value instead of failing with a null-response error
    pub allow_null: bool,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            keep_first_only: true,
            allow_null: false,
        }
    }
}

/// A chemical-database query capability. The shared `get_property` wrapper
/// handles validation and response policy; implementations only fetch.
pub trait QueryService {
    fn service_name(&self) -> &'static str;

    fn available_properties(&self) -> Vec<&'static str>;

    /// Raw fetch: `None` means the service answered but had no value
    fn fetch(&self, query: &PropertyQuery) -> Result<Option<Value>>;

    /// Pre-check that a property is queryable before any wire traffic
    fn validate_property(&self, property: &str) -> Result<()> {
        let available = self.available_properties();
        if available.iter().any(|&known| known == property) {
            Ok(())
        } else {
            let err =
                QueryError::unsupported_property(property, self.service_name(), &available);
            error!("cannot query {property:?} from {}", self.service_name());
            Err(err)
        }
    }

    fn get_property(&self, query: &PropertyQuery, policy: QueryPolicy) -> Result<Option<Value>> {
        info!(
            "sent query request for property {:?} to {}",
            query.property,
            self.service_name()
        );
        self.validate_property(query.property)?;

        let value = match self.fetch(query)? {
            // An empty list is no answer at all
            Some(Value::Array(values)) if values.is_empty() => None,
            Some(Value::Array(mut values)) if policy.keep_first_only => {
                Some(values.swap_remove(0))
            }
            other => other,
        };

        match value {
            Some(value) => {
                info!(
                    "successfully received property {:?} from {}",
                    query.property,
                    self.service_name()
                );
                Ok(Some(value))
            }
            None if policy.allow_null => Ok(None),
            None => {
                let err = QueryError::null_response(query.property, self.service_name());
                error!("{err}");
                Err(err)
            }
        }
    }
}

/// Try each service in order and return the first success. Unsupported
/// properties, null responses, and transport failures all mean "try the
/// next service"; only exhausting the whole list is fatal (or yields `None`
/// under `fail_quietly`).
pub fn lookup_property(
    services: &[&dyn QueryService],
    query: &PropertyQuery,
    policy: QueryPolicy,
    fail_quietly: bool,
) -> Result<Option<Value>> {
    if services.is_empty() {
        return Err(QueryError::NoServices);
    }

    let total = services.len();
    for (attempt, service) in services.iter().enumerate() {
        info!(
            "attempting chemical property query to service {}/{total} ({:?})",
            attempt + 1,
            service.service_name()
        );
        match service.get_property(query, policy) {
            Ok(value) => return Ok(value),
            Err(QueryError::Transport(e)) => {
                error!("query to {} failed in transit: {e}", service.service_name());
            }
            Err(QueryError::UnsupportedProperty { .. } | QueryError::NullResponse { .. }) => {
                // Already logged at the service level; keep trying
            }
            Err(fatal) => return Err(fatal),
        }
    }

    if fail_quietly {
        error!("no service could fulfil the query; returning nothing");
        Ok(None)
    } else {
        Err(QueryError::exhausted(query.property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transport that always answers with the same canned payload
    #[derive(Clone)]
    struct Canned(Result<&'static str, TransportError>);

    impl Transport for Canned {
        fn get_text(&self, _url: &Url) -> Result<String, TransportError> {
            self.0.clone().map(str::to_owned)
        }
    }

    fn down() -> Canned {
        Canned(Err(TransportError::new("connection refused")))
    }

    const MW_RESPONSE: &str =
        r#"{"PropertyTable":{"Properties":[{"CID":702,"MolecularWeight":"46.07"}]}}"#;

    #[test]
    fn fallback_returns_the_first_success() {
        let broken = CompoundTableService::new(down());
        let working = CompoundTableService::new(Canned(Ok(MW_RESPONSE)));
        let services: [&dyn QueryService; 2] = [&broken, &working];

        let value = lookup_property(
            &services,
            &PropertyQuery::new("mw", "CCO"),
            QueryPolicy::default(),
            false,
        )
        .unwrap();
        assert_eq!(value, Some(Value::String("46.07".into())));
    }

    #[test]
    fn unsupported_properties_skip_to_the_next_service() {
        // The resolver has no "xlogp"; the compound table does
        let resolver = StructureResolverService::new(Canned(Ok("unused")));
        let compound = CompoundTableService::new(Canned(Ok(
            r#"{"PropertyTable":{"Properties":[{"CID":1,"XLogP":-0.1}]}}"#,
        )));
        let services: [&dyn QueryService; 2] = [&resolver, &compound];

        let value = lookup_property(
            &services,
            &PropertyQuery::new("xlogp", "CCO"),
            QueryPolicy::default(),
            false,
        )
        .unwrap();
        assert_eq!(value, Some(serde_json::json!(-0.1)));
    }

    #[test]
    fn exhaustion_is_fatal_unless_quiet() {
        let a = CompoundTableService::new(down());
        let b = CompoundTableService::new(down());
        let services: [&dyn QueryService; 2] = [&a, &b];
        let query = PropertyQuery::new("mw", "CCO");

        assert!(matches!(
            lookup_property(&services, &query, QueryPolicy::default(), false),
            Err(QueryError::Exhausted { .. })
        ));
        assert_eq!(
            lookup_property(&services, &query, QueryPolicy::default(), true).unwrap(),
            None
        );
    }

    #[test]
    fn empty_service_list_is_an_error() {
        assert!(matches!(
            lookup_property(&[], &PropertyQuery::new("mw", "CCO"), QueryPolicy::default(), true),
            Err(QueryError::NoServices)
        ));
    }

    #[test]
    fn null_responses_respect_the_policy() {
        let empty = CompoundTableService::new(Canned(Ok(
            r#"{"PropertyTable":{"Properties":[]}}"#,
        )));
        let query = PropertyQuery::new("mw", "CCO");

        assert!(matches!(
            empty.get_property(&query, QueryPolicy::default()),
            Err(QueryError::NullResponse { .. })
        ));

        let lenient = QueryPolicy {
            allow_null: true,
            ..QueryPolicy::default()
        };
        assert_eq!(empty.get_property(&query, lenient).unwrap(), None);
    }

    #[test]
    fn unsupported_property_is_checked_before_any_traffic() {
        // A down transport would fail the call if fetch ran; validation fires first
        let service = CompoundTableService::new(down());
        assert!(matches!(
            service.get_property(&PropertyQuery::new("nonsense", "CCO"), QueryPolicy::default()),
            Err(QueryError::UnsupportedProperty { .. })
        ));
    }
}
