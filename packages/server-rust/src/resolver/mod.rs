//! Service resolution strategies.
//!
//! Every strategy implements [`ServiceResolver`]. The service cache chains
//! them: each stage receives the current candidate set and either narrows it,
//! rejects the request outright, or declares itself not applicable.
//!
//! 1. **Service id** (`service_id`): id embedded in the original request URL
//! 2. **URI** (`uri`): routing URI with wildcard precedence and a negative cache
//! 3. **SOAP action** (`soap_action`): `SOAPAction` header vs. WSDL operations
//! 4. **URN** (`urn`): payload namespace vs. WSDL operations
//! 5. **Operation signature** (`operation`): payload element names vs. WSDL
//!    operations, used for the strict check once a single service remains
//!
//! Strategies 3-5 share the generic [`ValueCacheResolver`] engine.

pub mod operation;
pub mod service_id;
pub mod soap_action;
pub mod uri;
pub mod urn;
pub mod value_cache;
pub mod wsdl_operation;

use std::collections::HashMap;
use std::sync::Arc;

use switchyard_core::{Message, PublishedService, ServiceId};

use crate::error::ResolutionError;

pub use operation::{OperationSignatureExtractor, SoapOperationResolver};
pub use service_id::ServiceIdResolver;
pub use soap_action::{SoapActionExtractor, SoapActionResolver};
pub use uri::{UriPattern, UriPatternKind, UriResolver};
pub use urn::{UrnExtractor, UrnResolver};
pub use value_cache::{ValueCacheResolver, ValueExtractor};
pub use wsdl_operation::{operation_values, OperationValue};

/// Working set of services a request could still match, keyed by id.
pub type ServiceSet = HashMap<ServiceId, Arc<PublishedService>>;

/// Builds a [`ServiceSet`] from services.
pub fn service_set<I>(services: I) -> ServiceSet
where
    I: IntoIterator<Item = Arc<PublishedService>>,
{
    services.into_iter().map(|s| (s.id, s)).collect()
}

// ---------------------------------------------------------------------------
// ResolveResult / Cost
// ---------------------------------------------------------------------------

/// Outcome of one resolution stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveResult {
    /// The request matches these candidates (never empty).
    Matched(ServiceSet),
    /// The request matches none of the candidates; the chain stops.
    NoMatch,
    /// This strategy has nothing to say about the request; candidates are unchanged.
    NotApplicable,
}

impl ResolveResult {
    /// `Matched` for a non-empty set, `NoMatch` otherwise.
    #[must_use]
    pub fn from_matches(matches: ServiceSet) -> Self {
        if matches.is_empty() {
            Self::NoMatch
        } else {
            Self::Matched(matches)
        }
    }

    /// The matched set, if any.
    #[must_use]
    pub fn matches(&self) -> Option<&ServiceSet> {
        match self {
            Self::Matched(set) => Some(set),
            Self::NoMatch | Self::NotApplicable => None,
        }
    }
}

/// Relative cost of running a strategy, used to order the chain cheapest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cost {
    Fast,
    Slow,
}

// ---------------------------------------------------------------------------
// ServiceResolver trait
// ---------------------------------------------------------------------------

/// A service resolution strategy.
///
/// Strategies keep per-service derived state that must follow the published
/// services: the owner calls the notification methods on every create, update
/// and delete. Resolution itself is synchronous and only takes the strategy's
/// own lock.
///
/// Used as `Arc<dyn ServiceResolver>`.
pub trait ServiceResolver: Send + Sync {
    /// Short name used in logs and audit events.
    fn name(&self) -> &'static str;

    /// A service was published.
    ///
    /// # Errors
    ///
    /// Returns an error if the service's resolution values cannot be derived.
    /// The strategy's state stays consistent, with the service contributing
    /// no values.
    fn service_created(&self, service: &Arc<PublishedService>) -> Result<(), ResolutionError>;

    /// A published service changed.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceResolver::service_created`].
    fn service_updated(&self, service: &Arc<PublishedService>) -> Result<(), ResolutionError>;

    /// A published service was removed. Drops every entry referencing it.
    fn service_deleted(&self, service: &PublishedService);

    /// Narrows `candidates` to the services this request can address.
    ///
    /// # Errors
    ///
    /// Returns an error when the request itself is ambiguous or malformed in a
    /// way that must not be silently resolved.
    fn resolve(
        &self,
        message: &Message,
        candidates: &ServiceSet,
    ) -> Result<ResolveResult, ResolutionError>;

    /// Whether this strategy only applies to SOAP services.
    fn is_soap(&self) -> bool;

    /// Whether resolving reads the message body, so it must be buffered first.
    fn uses_message_content(&self) -> bool;

    fn cost(&self) -> Cost;
}

/// Entries of `matches` that are also candidates, taken from `candidates`.
pub(crate) fn intersect(
    matches: &HashMap<ServiceId, Arc<PublishedService>>,
    candidates: &ServiceSet,
) -> ServiceSet {
    if matches.len() <= candidates.len() {
        matches
            .keys()
            .filter_map(|id| candidates.get_key_value(id))
            .map(|(id, svc)| (*id, Arc::clone(svc)))
            .collect()
    } else {
        candidates
            .iter()
            .filter(|(id, _)| matches.contains_key(id))
            .map(|(id, svc)| (*id, Arc::clone(svc)))
            .collect()
    }
}
