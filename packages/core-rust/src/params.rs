//! Resolution-parameter tuples recorded for global uniqueness checks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::service::ServiceId;

/// The addressing tuple `(uri, soap_action, urn)` a service answers to, tagged
/// with the owning service.
///
/// Absent components are always stored as the empty string, so an operation
/// without a SOAP action and a non-SOAP service compare equal on that field.
///
/// Derived equality includes `service_id` and is used when diffing a
/// service's own before/after set. Cross-service duplicate detection goes
/// through [`ResolutionParameters::address`] and ignores the owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionParameters {
    pub service_id: ServiceId,
    pub uri: String,
    pub soap_action: String,
    pub urn: String,
}

/// Owner-independent view of a tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolutionAddress<'a> {
    pub uri: &'a str,
    pub soap_action: &'a str,
    pub urn: &'a str,
}

impl ResolutionParameters {
    #[must_use]
    pub fn new(
        service_id: ServiceId,
        uri: impl Into<String>,
        soap_action: Option<String>,
        urn: Option<String>,
    ) -> Self {
        Self {
            service_id,
            uri: uri.into(),
            soap_action: soap_action.unwrap_or_default(),
            urn: urn.unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn address(&self) -> ResolutionAddress<'_> {
        ResolutionAddress {
            uri: &self.uri,
            soap_action: &self.soap_action,
            urn: &self.urn,
        }
    }

    /// True when `other` belongs to a different service but has the same address.
    #[must_use]
    pub fn conflicts_with(&self, other: &Self) -> bool {
        self.service_id != other.service_id && self.address() == other.address()
    }
}

impl fmt::Display for ResolutionAddress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uri={:?} soapaction={:?} urn={:?}",
            self.uri, self.soap_action, self.urn
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_components_normalize_to_empty() {
        let p = ResolutionParameters::new(ServiceId::generate(), "/a", None, None);
        assert_eq!(p.soap_action, "");
        assert_eq!(p.urn, "");
    }

    #[test]
    fn conflict_ignores_owner_but_requires_different_owner() {
        let a = ServiceId::generate();
        let b = ServiceId::generate();
        let pa = ResolutionParameters::new(a, "/x", Some("urn:op".into()), Some("urn:ns".into()));
        let pb = ResolutionParameters::new(b, "/x", Some("urn:op".into()), Some("urn:ns".into()));
        assert_ne!(pa, pb);
        assert!(pa.conflicts_with(&pb));
        assert!(!pa.conflicts_with(&pa.clone()));
    }

    #[test]
    fn any_differing_component_avoids_conflict() {
        let a = ResolutionParameters::new(ServiceId::generate(), "/x", Some("s".into()), Some("n".into()));
        let other = ServiceId::generate();
        for p in [
            ResolutionParameters::new(other, "/y", Some("s".into()), Some("n".into())),
            ResolutionParameters::new(other, "/x", Some("t".into()), Some("n".into())),
            ResolutionParameters::new(other, "/x", Some("s".into()), Some("m".into())),
        ] {
            assert!(!a.conflicts_with(&p));
        }
    }
}
