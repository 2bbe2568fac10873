//! Live service table and the resolution chain.
//!
//! [`ServiceCache`] owns one instance of every resolver. Registration changes
//! fan out to all of them; requests run through the applicable ones,
//! cheapest first, narrowing the candidate set until one service is left.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use switchyard_core::{Message, PublishedService, ServiceId};

use super::config::ResolverConfig;
use crate::audit::{AuditEvent, AuditSink};
use crate::error::ResolutionError;
use crate::resolver::{
    OperationSignatureExtractor, ResolveResult, ServiceIdResolver, ServiceResolver, ServiceSet,
    SoapActionExtractor, SoapActionResolver, SoapOperationResolver, UriResolver, UrnExtractor,
    UrnResolver,
};

/// Routing URI that matches every request path.
pub const CATCH_ALL_URI: &str = "/*";

// ---------------------------------------------------------------------------
// PreParseHook
// ---------------------------------------------------------------------------

/// Consulted once per request, just before the first resolver that reads the
/// message body. Lets the caller buffer the body or refuse to.
pub trait PreParseHook {
    /// Returning `false` abandons resolution.
    fn before_parse(&self, message: &Message) -> bool;
}

impl<F> PreParseHook for F
where
    F: Fn(&Message) -> bool,
{
    fn before_parse(&self, message: &Message) -> bool {
        self(message)
    }
}

/// Per-request resolution state.
struct Pass<'a> {
    message: &'a Message,
    hook: Option<&'a dyn PreParseHook>,
    parsed: bool,
}

impl Pass<'_> {
    /// Runs the hook the first time a content-reading resolver is reached.
    fn may_read_content(&mut self) -> bool {
        if self.parsed {
            return true;
        }
        self.parsed = true;
        match self.hook {
            Some(hook) => hook.before_parse(self.message),
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceCache
// ---------------------------------------------------------------------------

/// The gateway's published services and the resolvers indexing them.
pub struct ServiceCache {
    config: ResolverConfig,
    services: ArcSwap<ServiceSet>,
    /// Serialises registration changes; readers never take it.
    writer: Mutex<()>,
    uri: Arc<UriResolver>,
    operations: Arc<SoapOperationResolver>,
    /// Resolvers consulted per request, cheapest first.
    chain: Vec<Arc<dyn ServiceResolver>>,
    /// Every resolver, including those only used for the strict check.
    resolvers: Vec<Arc<dyn ServiceResolver>>,
    audit: Arc<dyn AuditSink>,
}

impl ServiceCache {
    #[must_use]
    pub fn new(config: ResolverConfig, audit: Arc<dyn AuditSink>) -> Self {
        let uri = Arc::new(UriResolver::new(&config));
        let operations = Arc::new(SoapOperationResolver::new(
            OperationSignatureExtractor,
            Arc::clone(&audit),
        ));
        let mut chain: Vec<Arc<dyn ServiceResolver>> = vec![
            Arc::new(ServiceIdResolver::new(&config)),
            Arc::clone(&uri) as Arc<dyn ServiceResolver>,
            Arc::new(SoapActionResolver::new(SoapActionExtractor, Arc::clone(&audit))),
            Arc::new(UrnResolver::new(UrnExtractor, Arc::clone(&audit))),
        ];
        chain.sort_by_key(|r| r.cost());

        let mut resolvers = chain.clone();
        resolvers.push(Arc::clone(&operations) as Arc<dyn ServiceResolver>);

        Self {
            config,
            services: ArcSwap::from_pointee(ServiceSet::new()),
            writer: Mutex::new(()),
            uri,
            operations,
            chain,
            resolvers,
            audit,
        }
    }

    // -- registration --

    /// Publishes a new or changed service and notifies every resolver.
    ///
    /// A resolver that cannot derive values for the service is audited and
    /// skipped; the service stays registered with the others. Services
    /// without a persisted identity are ignored.
    pub fn cache(&self, service: PublishedService) -> Option<Arc<PublishedService>> {
        if service.id.is_unsaved() {
            tracing::warn!(service = %service.name, "not caching a service without identity");
            return None;
        }
        let service = Arc::new(service);
        let _guard = self.writer.lock();
        let current = self.services.load_full();
        let existed = current.contains_key(&service.id);

        for resolver in &self.resolvers {
            let notified = if existed {
                resolver.service_updated(&service)
            } else {
                resolver.service_created(&service)
            };
            if let Err(err) = notified {
                self.audit_notification_error(resolver.name(), service.id, &err);
            }
        }

        let mut next = ServiceSet::clone(&current);
        next.insert(service.id, Arc::clone(&service));
        self.services.store(Arc::new(next));
        tracing::info!(service = %service.display_name(), updated = existed, "service cached");
        Some(service)
    }

    /// Unpublishes a service. Returns it if it was cached.
    pub fn remove(&self, id: ServiceId) -> Option<Arc<PublishedService>> {
        let _guard = self.writer.lock();
        let current = self.services.load_full();
        let service = Arc::clone(current.get(&id)?);
        for resolver in &self.resolvers {
            resolver.service_deleted(&service);
        }
        let mut next = ServiceSet::clone(&current);
        next.remove(&id);
        self.services.store(Arc::new(next));
        tracing::info!(service = %service.display_name(), "service removed");
        Some(service)
    }

    fn audit_notification_error(&self, resolver: &'static str, service: ServiceId, err: &ResolutionError) {
        let event = match err {
            ResolutionError::Wsdl { source, .. } => AuditEvent::WsdlError {
                service,
                reason: format!("{source:#}"),
            },
            other => AuditEvent::NotificationFailed {
                resolver,
                service,
                reason: other.to_string(),
            },
        };
        self.audit.record(event);
    }

    // -- resolution --

    /// Resolves a request against every published service.
    ///
    /// Returns `None` when no service, or more than one, matches.
    ///
    /// # Errors
    ///
    /// Propagates requests that are ambiguous by construction, such as a
    /// payload spanning several namespaces or a repeated `SOAPAction` header.
    pub fn resolve(
        &self,
        message: &Message,
        hook: Option<&dyn PreParseHook>,
    ) -> Result<Option<Arc<PublishedService>>, ResolutionError> {
        let candidates = ServiceSet::clone(&self.services.load());
        self.run_chain(message, hook, candidates)
    }

    /// Resolves a request that is already known to target service `id`: the
    /// chain only confirms or rejects it.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceCache::resolve`].
    pub fn resolve_pinned(
        &self,
        message: &Message,
        id: ServiceId,
        hook: Option<&dyn PreParseHook>,
    ) -> Result<Option<Arc<PublishedService>>, ResolutionError> {
        let candidates = self
            .services
            .load()
            .get_key_value(&id)
            .map(|(id, svc)| ServiceSet::from([(*id, Arc::clone(svc))]))
            .unwrap_or_default();
        self.run_chain(message, hook, candidates)
    }

    fn run_chain(
        &self,
        message: &Message,
        hook: Option<&dyn PreParseHook>,
        mut candidates: ServiceSet,
    ) -> Result<Option<Arc<PublishedService>>, ResolutionError> {
        if candidates.is_empty() {
            self.audit.record(AuditEvent::NoServices);
            return Ok(None);
        }
        let mut pass = Pass {
            message,
            hook,
            parsed: false,
        };

        for resolver in &self.chain {
            if resolver.uses_message_content() && !pass.may_read_content() {
                tracing::debug!(resolver = resolver.name(), "pre-parse hook refused resolution");
                return Ok(None);
            }
            match self.audited(resolver.resolve(message, &candidates))? {
                ResolveResult::NotApplicable => {}
                ResolveResult::Matched(matched) if !matched.is_empty() => {
                    candidates = matched;
                    if candidates.len() == 1 {
                        self.audit.record(AuditEvent::ResolvedEarly {
                            resolver: resolver.name(),
                        });
                        break;
                    }
                }
                ResolveResult::Matched(_) | ResolveResult::NoMatch => {
                    self.audit.record(AuditEvent::FailedEarly {
                        resolver: resolver.name(),
                    });
                    return Ok(None);
                }
            }
        }

        if candidates.len() > 1 {
            self.audit.record(AuditEvent::MultipleMatches {
                count: candidates.len(),
            });
            return Ok(None);
        }
        let Some(service) = candidates.into_values().next() else {
            return Ok(None);
        };
        if !self.operation_check(&mut pass, &service)? {
            return Ok(None);
        }
        self.audit.record(AuditEvent::Resolved { service: service.id });
        Ok(Some(service))
    }

    /// A strict SOAP service only accepts requests for one of its operations.
    fn operation_check(
        &self,
        pass: &mut Pass<'_>,
        service: &Arc<PublishedService>,
    ) -> Result<bool, ResolutionError> {
        if !self.config.strict_operation_check || !service.is_soap() || service.lax_resolution {
            return Ok(true);
        }
        if pass.message.soap().is_none() {
            self.audit.record(AuditEvent::NotSoap { service: service.id });
            return Ok(false);
        }
        if !pass.may_read_content() {
            return Ok(false);
        }
        let single = ServiceSet::from([(service.id, Arc::clone(service))]);
        match self.audited(self.operations.resolve(pass.message, &single))? {
            ResolveResult::Matched(_) | ResolveResult::NotApplicable => Ok(true),
            ResolveResult::NoMatch => {
                self.audit.record(AuditEvent::OperationMismatch { service: service.id });
                Ok(false)
            }
        }
    }

    fn audited(
        &self,
        result: Result<ResolveResult, ResolutionError>,
    ) -> Result<ResolveResult, ResolutionError> {
        if let Err(ResolutionError::AmbiguousNamespace { namespaces }) = &result {
            self.audit.record(AuditEvent::AmbiguousNamespace {
                namespaces: namespaces.clone(),
            });
        }
        result
    }

    // -- lookups --

    /// Every service the URI rules alone map `uri` to, ordered by name.
    #[must_use]
    pub fn services_by_uri(&self, uri: &str) -> Vec<Arc<PublishedService>> {
        let snapshot = self.services.load();
        let mut found: Vec<_> = self.uri.matching(uri, &snapshot).into_values().collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        found
    }

    /// Whether some service accepts every request path.
    #[must_use]
    pub fn has_catch_all(&self) -> bool {
        self.services
            .load()
            .values()
            .any(|s| s.routing_uri() == CATCH_ALL_URI)
    }

    #[must_use]
    pub fn get(&self, id: ServiceId) -> Option<Arc<PublishedService>> {
        self.services.load().get(&id).cloned()
    }

    /// Current table; later registrations do not affect the returned snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ServiceSet> {
        self.services.load_full()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.load().is_empty()
    }

    /// Whether any resolver still holds state for `id`.
    #[must_use]
    pub fn references(&self, id: ServiceId) -> bool {
        self.uri.references(id) || self.operations.references(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
