use serde::{Deserialize, Serialize};

/// Configuration for the service resolution engine.
///
/// Controls request-URI normalisation, the service-id header convention, and
/// the bounds of the URI negative cache.
/// Deserializes from `snake_case` keys; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Request paths starting with this prefix address the gateway's default
    /// endpoint and normalise to the empty routing URI.
    pub reserved_uri_prefix: String,
    /// Header carrying the URL the client originally requested, consulted by
    /// the service-id resolver.
    pub original_url_header: String,
    /// Path marker that precedes an embedded service id in the original URL.
    pub service_id_path_marker: String,
    /// Maximum number of URIs remembered as unresolvable. Once full, further
    /// failures are not recorded until the next registration event clears it.
    pub negative_cache_capacity: usize,
    /// When a single SOAP service survives the chain, require the request to
    /// match one of its WSDL operations (unless the service is lax).
    pub strict_operation_check: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            reserved_uri_prefix: "/ssg".to_string(),
            original_url_header: "L7-Original-URL".to_string(),
            service_id_path_marker: "/service/".to_string(),
            negative_cache_capacity: 10_000,
            strict_operation_check: true,
        }
    }
}
