//! Resolution by a service id embedded in the original request URL.
//!
//! Front-end proxies rewrite request paths but forward the URL the client
//! asked for in a header. When that URL contains `<marker><uuid>` the request
//! names its service directly.

use std::sync::Arc;

use switchyard_core::{Message, PublishedService, ServiceId};

use super::{Cost, ResolveResult, ServiceResolver, ServiceSet};
use crate::error::ResolutionError;
use crate::service::config::ResolverConfig;

/// Stateless resolver reading the service id from the original-URL header.
#[derive(Debug, Clone)]
pub struct ServiceIdResolver {
    header: String,
    marker: String,
}

impl ServiceIdResolver {
    #[must_use]
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            header: config.original_url_header.clone(),
            marker: config.service_id_path_marker.clone(),
        }
    }

    /// The id following the marker in `url`, up to the next `/`, `?` or `#`.
    fn embedded_id(&self, url: &str) -> Option<ServiceId> {
        if self.marker.is_empty() {
            return None;
        }
        let start = url.find(&self.marker)? + self.marker.len();
        let rest = &url[start..];
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        rest[..end].parse().ok()
    }
}

impl ServiceResolver for ServiceIdResolver {
    fn name(&self) -> &'static str {
        "service_id"
    }

    fn service_created(&self, _service: &Arc<PublishedService>) -> Result<(), ResolutionError> {
        Ok(())
    }

    fn service_updated(&self, _service: &Arc<PublishedService>) -> Result<(), ResolutionError> {
        Ok(())
    }

    fn service_deleted(&self, _service: &PublishedService) {}

    fn resolve(
        &self,
        message: &Message,
        candidates: &ServiceSet,
    ) -> Result<ResolveResult, ResolutionError> {
        let Some(http) = message.http() else {
            return Ok(ResolveResult::NotApplicable);
        };
        let Some(url) = http.header(&self.header)? else {
            return Ok(ResolveResult::NotApplicable);
        };
        let Some(id) = self.embedded_id(url) else {
            return Ok(ResolveResult::NotApplicable);
        };
        tracing::debug!(%id, "request names its service in the original URL");
        Ok(match candidates.get_key_value(&id) {
            Some((id, service)) => {
                ResolveResult::Matched(ServiceSet::from([(*id, Arc::clone(service))]))
            }
            None => ResolveResult::NoMatch,
        })
    }

    fn is_soap(&self) -> bool {
        false
    }

    fn uses_message_content(&self) -> bool {
        false
    }

    fn cost(&self) -> Cost {
        Cost::Fast
    }
}
