//! Published services as seen by the resolution engine.
//!
//! The administrative layer owns and mutates these; the engine only reads
//! them and caches values derived from them.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wsdl::Wsdl;

// ---------------------------------------------------------------------------
// ServiceId
// ---------------------------------------------------------------------------

/// Immutable identity of a published service.
///
/// The nil UUID marks a service that has not been persisted yet and whose
/// identity will change once it is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(Uuid);

impl ServiceId {
    /// Identity of a pending, not-yet-persisted service.
    pub const UNSAVED: Self = Self(Uuid::nil());

    /// Allocates a fresh random identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    #[must_use]
    pub fn is_unsaved(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ServiceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// WsdlSource
// ---------------------------------------------------------------------------

/// Outcome of parsing a service's WSDL document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WsdlSource {
    Parsed(Arc<Wsdl>),
    /// The document exists but could not be parsed.
    Unparsable { reason: String },
}

// ---------------------------------------------------------------------------
// PublishedService
// ---------------------------------------------------------------------------

/// An administratively registered service exposed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedService {
    pub id: ServiceId,
    pub name: String,
    /// Custom routing URI. Empty means the service has no custom URI.
    #[serde(default)]
    pub routing_uri: String,
    #[serde(default)]
    pub soap: bool,
    /// Lax services skip the strict SOAP operation check once resolved.
    #[serde(default)]
    pub lax_resolution: bool,
    #[serde(default)]
    pub wsdl: Option<WsdlSource>,
}

impl PublishedService {
    /// A non-SOAP service with no custom URI.
    #[must_use]
    pub fn new(id: ServiceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            routing_uri: String::new(),
            soap: false,
            lax_resolution: false,
            wsdl: None,
        }
    }

    /// A SOAP service backed by an already parsed WSDL.
    #[must_use]
    pub fn soap(id: ServiceId, name: impl Into<String>, wsdl: Wsdl) -> Self {
        Self {
            soap: true,
            wsdl: Some(WsdlSource::Parsed(Arc::new(wsdl))),
            ..Self::new(id, name)
        }
    }

    #[must_use]
    pub fn with_routing_uri(mut self, uri: impl Into<String>) -> Self {
        self.routing_uri = uri.into();
        self
    }

    #[must_use]
    pub fn is_soap(&self) -> bool {
        self.soap
    }

    #[must_use]
    pub fn routing_uri(&self) -> &str {
        &self.routing_uri
    }

    /// Returns the parsed WSDL of a SOAP service.
    ///
    /// # Errors
    ///
    /// Fails if the service is not SOAP, has no WSDL, or its WSDL could not be
    /// parsed.
    pub fn parsed_wsdl(&self) -> anyhow::Result<Arc<Wsdl>> {
        if !self.soap {
            bail!("service {} is not a SOAP service", self.display_name());
        }
        match &self.wsdl {
            Some(WsdlSource::Parsed(wsdl)) => Ok(Arc::clone(wsdl)),
            Some(WsdlSource::Unparsable { reason }) => Err(anyhow!(
                "WSDL of service {} could not be parsed: {reason}",
                self.display_name()
            )),
            None => bail!("service {} has no WSDL", self.display_name()),
        }
    }

    /// `name [id]`, for log and audit output.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} [{}]", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsaved_identity_is_nil() {
        assert!(ServiceId::UNSAVED.is_unsaved());
        assert!(!ServiceId::generate().is_unsaved());
    }

    #[test]
    fn service_id_round_trips_through_display() {
        let id = ServiceId::generate();
        assert_eq!(id.to_string().parse::<ServiceId>().unwrap(), id);
        assert!("not-a-uuid".parse::<ServiceId>().is_err());
    }

    #[test]
    fn parsed_wsdl_requires_soap() {
        let svc = PublishedService::new(ServiceId::generate(), "plain");
        assert!(svc.parsed_wsdl().is_err());
    }

    #[test]
    fn parsed_wsdl_reports_unparsable_document() {
        let mut svc = PublishedService::soap(ServiceId::generate(), "bad", Wsdl::default());
        svc.wsdl = Some(WsdlSource::Unparsable {
            reason: "unexpected EOF".to_string(),
        });
        let err = svc.parsed_wsdl().unwrap_err();
        assert!(err.to_string().contains("unexpected EOF"));
    }

    #[test]
    fn parsed_wsdl_returns_shared_document() {
        let svc = PublishedService::soap(ServiceId::generate(), "ok", Wsdl::default());
        assert!(svc.parsed_wsdl().is_ok());
    }

    #[test]
    fn deserializes_catalog_entry_with_defaults() {
        let json = r#"{ "id": "6f1c1f3e-2f5b-4d7e-9a55-6b1f5d0c9e21", "name": "svc" }"#;
        let svc: PublishedService = serde_json::from_str(json).unwrap();
        assert_eq!(svc.routing_uri(), "");
        assert!(!svc.is_soap());
        assert!(svc.wsdl.is_none());
    }
}
