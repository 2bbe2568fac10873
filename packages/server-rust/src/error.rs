//! Error types for service resolution and resolution-parameter conflicts.

use switchyard_core::{FacetError, ServiceId};

/// Failure while resolving a request or deriving a service's resolution values.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("request payload spans {} namespaces: {}", namespaces.len(), namespaces.join(", "))]
    AmbiguousNamespace { namespaces: Vec<String> },
    #[error("header {name} has {count} values where one was expected")]
    MultipleHeaderValues { name: String, count: usize },
    #[error("routing URI pattern {pattern:?} cannot be compiled")]
    InvalidUriPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("cannot derive resolution values for service {service}: {source}")]
    Wsdl {
        service: ServiceId,
        #[source]
        source: anyhow::Error,
    },
}

impl From<FacetError> for ResolutionError {
    fn from(err: FacetError) -> Self {
        match err {
            FacetError::MultipleHeaderValues { name, count } => {
                Self::MultipleHeaderValues { name, count }
            }
        }
    }
}

/// Failure while recording a service's resolution parameters.
#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    #[error(
        "resolution parameters (uri={uri:?}, soapaction={soap_action:?}, urn={urn:?}) \
         are already used by service {existing}"
    )]
    Duplicate {
        uri: String,
        soap_action: String,
        urn: String,
        existing: ServiceId,
    },
    #[error("service {name:?} has no identity yet; its resolution parameters cannot be recorded")]
    Unsaved { name: String },
    #[error("resolution parameter store failed: {0}")]
    Store(#[from] anyhow::Error),
}
