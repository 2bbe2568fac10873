//! Request abstraction consumed by resolvers.
//!
//! A [`Message`] exposes optional facets. A missing facet tells a resolver
//! that it has nothing to say about the request.

use crate::qname::QName;

/// Errors raised while reading a request facet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FacetError {
    #[error("header {name} has {count} values where one was expected")]
    MultipleHeaderValues { name: String, count: usize },
}

// ---------------------------------------------------------------------------
// HttpFacet
// ---------------------------------------------------------------------------

/// HTTP view of a request: request URI plus headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpFacet {
    request_uri: String,
    headers: Vec<(String, String)>,
}

impl HttpFacet {
    #[must_use]
    pub fn new(request_uri: impl Into<String>) -> Self {
        Self {
            request_uri: request_uri.into(),
            headers: Vec::new(),
        }
    }

    /// Appends a header. Repeating a name adds a second value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    /// Looks up a header expected to occur at most once. Names compare
    /// case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`FacetError::MultipleHeaderValues`] when the header repeats.
    pub fn header(&self, name: &str) -> Result<Option<&str>, FacetError> {
        let mut values = self
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str());
        let first = values.next();
        let extra = values.count();
        if extra > 0 {
            return Err(FacetError::MultipleHeaderValues {
                name: name.to_string(),
                count: extra + 1,
            });
        }
        Ok(first)
    }
}

// ---------------------------------------------------------------------------
// SoapFacet
// ---------------------------------------------------------------------------

/// SOAP view of a request: the top-level elements of the envelope body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoapFacet {
    payload: Vec<QName>,
}

impl SoapFacet {
    #[must_use]
    pub fn new(payload: Vec<QName>) -> Self {
        Self { payload }
    }

    /// Top-level payload element names in document order.
    #[must_use]
    pub fn payload_element_names(&self) -> &[QName] {
        &self.payload
    }

    /// Distinct non-empty namespaces of the payload elements, first occurrence first.
    #[must_use]
    pub fn payload_namespace_uris(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for name in &self.payload {
            let ns = name.namespace.as_str();
            if !ns.is_empty() && !out.contains(&ns) {
                out.push(ns);
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// An inbound request as presented to the resolution chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    http: Option<HttpFacet>,
    soap: Option<SoapFacet>,
}

impl Message {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_http(mut self, http: HttpFacet) -> Self {
        self.http = Some(http);
        self
    }

    #[must_use]
    pub fn with_soap(mut self, soap: SoapFacet) -> Self {
        self.soap = Some(soap);
        self
    }

    #[must_use]
    pub fn http(&self) -> Option<&HttpFacet> {
        self.http.as_ref()
    }

    #[must_use]
    pub fn soap(&self) -> Option<&SoapFacet> {
        self.soap.as_ref()
    }
}
