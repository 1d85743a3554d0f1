use miette::Diagnostic;
use thiserror::Error;

pub type Result<T, E = QueryError> = std::result::Result<T, E>;

/// A failure while talking to whatever carries requests over the wire. The
/// transport itself is an external collaborator injected behind a trait.
#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
#[error("transport failure: {reason}")]
pub struct TransportError {
    pub reason: String,
}

impl TransportError {
    #[must_use]
    pub fn new(reason: impl ToString) -> Self {
        let reason = reason.to_string();

        Self { reason }
    }
}

#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum QueryError {
    #[error("cannot query property {property:?} from {service}; available: {available}")]
    UnsupportedProperty {
        property: String,
        service: &'static str,
        available: String,
    },

    #[error("{service} returned no value for {property:?}, which the caller disallowed")]
    NullResponse {
        property: String,
        service: &'static str,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),

    #[error("at least one query service must be provided")]
    NoServices,

    #[error("no service could fulfil the query for property {property:?}")]
    Exhausted { property: String },
}

impl QueryError {
    pub(crate) fn unsupported_property(
        property: &str,
        service: &'static str,
        available: &[&str],
    ) -> Self {
        let property = property.to_owned();
        let mut options: Vec<_> = available.to_vec();
        options.sort_unstable();
        let available = options.join(", ");

        Self::UnsupportedProperty {
            property,
            service,
            available,
        }
    }

    pub(crate) fn null_response(property: &str, service: &'static str) -> Self {
        let property = property.to_owned();

        Self::NullResponse { property, service }
    }

    pub(crate) fn exhausted(property: &str) -> Self {
        let property = property.to_owned();

        Self::Exhausted { property }
    }
}
