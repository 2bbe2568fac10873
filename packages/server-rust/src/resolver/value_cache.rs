//! Generic single-value-per-request resolution engine.
//!
//! A [`ValueExtractor`] turns a service into zero or more resolution values
//! and a request into at most one. [`ValueCacheResolver`] memoizes the
//! per-service values and keeps a reverse `value -> services` index so that a
//! request is resolved with one map lookup followed by an intersection with
//! the candidate set.
//!
//! # Locking
//!
//! Both maps live under one `RwLock`. Notifications check the memo under the
//! read lock and derive values (possibly expensive WSDL introspection) with no
//! lock held; they then take the write lock, re-read the memo, and apply the
//! `by_service`/`by_value` changes in one critical section. Two threads that
//! miss on the same service both derive its values; derivation is
//! deterministic, so whichever result lands is correct. This race is
//! accepted in exchange for never holding the write lock across derivation.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use switchyard_core::{Message, PublishedService, ServiceId};

use super::{intersect, Cost, ResolveResult, ServiceResolver, ServiceSet};
use crate::audit::{AuditEvent, AuditSink};
use crate::error::ResolutionError;

// ---------------------------------------------------------------------------
// ValueExtractor trait
// ---------------------------------------------------------------------------

/// Supplies the values a [`ValueCacheResolver`] compares.
pub trait ValueExtractor: Send + Sync + 'static {
    type Value: Clone + Eq + Hash + Debug + Send + Sync;

    fn name(&self) -> &'static str;

    /// All values a service answers to. Duplicates are tolerated.
    ///
    /// # Errors
    ///
    /// Returns an error if the service's configuration cannot be interpreted.
    fn service_values(&self, service: &PublishedService)
        -> Result<Vec<Self::Value>, ResolutionError>;

    /// The single value carried by a request, or `None` when the request
    /// does not have the facet this extractor reads.
    ///
    /// # Errors
    ///
    /// Returns an error when the request carries conflicting values.
    fn request_value(&self, message: &Message) -> Result<Option<Self::Value>, ResolutionError>;

    fn is_soap(&self) -> bool;

    fn uses_message_content(&self) -> bool;

    fn cost(&self) -> Cost;
}

// ---------------------------------------------------------------------------
// ValueMaps
// ---------------------------------------------------------------------------

struct ValueMaps<V> {
    /// Memoized values per service. Always mirrors `by_value`.
    by_service: HashMap<ServiceId, Vec<V>>,
    by_value: HashMap<V, HashMap<ServiceId, Arc<PublishedService>>>,
}

impl<V: Clone + Eq + Hash> ValueMaps<V> {
    fn new() -> Self {
        Self {
            by_service: HashMap::new(),
            by_value: HashMap::new(),
        }
    }

    fn unindex(&mut self, id: ServiceId) {
        let Some(values) = self.by_service.remove(&id) else {
            return;
        };
        for value in &values {
            if let Some(services) = self.by_value.get_mut(value) {
                services.remove(&id);
                if services.is_empty() {
                    self.by_value.remove(value);
                }
            }
        }
    }

    fn index(&mut self, service: &Arc<PublishedService>, values: Vec<V>) {
        for value in &values {
            self.by_value
                .entry(value.clone())
                .or_default()
                .insert(service.id, Arc::clone(service));
        }
        self.by_service.insert(service.id, values);
    }
}

// ---------------------------------------------------------------------------
// ValueCacheResolver
// ---------------------------------------------------------------------------

/// Resolver that matches one request value against cached service values.
pub struct ValueCacheResolver<E: ValueExtractor> {
    extractor: E,
    maps: RwLock<ValueMaps<E::Value>>,
    audit: Arc<dyn AuditSink>,
    misses: AtomicU64,
}

impl<E: ValueExtractor> ValueCacheResolver<E> {
    #[must_use]
    pub fn new(extractor: E, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            extractor,
            maps: RwLock::new(ValueMaps::new()),
            audit,
            misses: AtomicU64::new(0),
        }
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Number of times service values had to be derived rather than read from the memo.
    pub fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Memoized values for a service, if any.
    pub fn cached_values(&self, id: ServiceId) -> Option<Vec<E::Value>> {
        self.maps.read().by_service.get(&id).cloned()
    }

    /// Whether either map still mentions the service.
    pub fn references(&self, id: ServiceId) -> bool {
        let maps = self.maps.read();
        maps.by_service.contains_key(&id)
            || maps.by_value.values().any(|services| services.contains_key(&id))
    }

    fn derive(&self, service: &PublishedService) -> Result<Vec<E::Value>, ResolutionError> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.audit.record(AuditEvent::CacheMiss {
            resolver: self.extractor.name(),
            service: service.id,
        });
        let mut values = self.extractor.service_values(service)?;
        let mut seen = HashSet::with_capacity(values.len());
        values.retain(|v| seen.insert(v.clone()));
        tracing::debug!(
            resolver = self.extractor.name(),
            service = %service.id,
            count = values.len(),
            "derived resolution values"
        );
        Ok(values)
    }

    /// Derives values for a service that has no identity yet. Nothing is
    /// cached or indexed: the identity will change once the service is saved.
    fn check_unsaved(&self, service: &PublishedService) -> Result<(), ResolutionError> {
        self.extractor.service_values(service).map(|_| ())
    }
}

impl<E: ValueExtractor> ServiceResolver for ValueCacheResolver<E> {
    fn name(&self) -> &'static str {
        self.extractor.name()
    }

    fn service_created(&self, service: &Arc<PublishedService>) -> Result<(), ResolutionError> {
        if service.id.is_unsaved() {
            return self.check_unsaved(service);
        }

        let cached = self.maps.read().by_service.get(&service.id).cloned();
        let values = match cached {
            Some(values) => values,
            None => match self.derive(service) {
                Ok(values) => values,
                Err(err) => {
                    self.maps.write().unindex(service.id);
                    return Err(err);
                }
            },
        };

        let mut maps = self.maps.write();
        // Re-read: another writer may have filled the memo between the locks.
        let values = maps.by_service.get(&service.id).cloned().unwrap_or(values);
        maps.unindex(service.id);
        maps.index(service, values);
        Ok(())
    }

    fn service_updated(&self, service: &Arc<PublishedService>) -> Result<(), ResolutionError> {
        if service.id.is_unsaved() {
            return self.check_unsaved(service);
        }

        // The memo is stale by definition; derive before locking.
        let derived = self.derive(service);
        let mut maps = self.maps.write();
        maps.unindex(service.id);
        maps.index(service, derived?);
        Ok(())
    }

    fn service_deleted(&self, service: &PublishedService) {
        self.maps.write().unindex(service.id);
    }

    fn resolve(
        &self,
        message: &Message,
        candidates: &ServiceSet,
    ) -> Result<ResolveResult, ResolutionError> {
        let Some(value) = self.extractor.request_value(message)? else {
            return Ok(ResolveResult::NotApplicable);
        };
        let maps = self.maps.read();
        Ok(match maps.by_value.get(&value) {
            Some(services) => ResolveResult::from_matches(intersect(services, candidates)),
            None => ResolveResult::NoMatch,
        })
    }

    fn is_soap(&self) -> bool {
        self.extractor.is_soap()
    }

    fn uses_message_content(&self) -> bool {
        self.extractor.uses_message_content()
    }

    fn cost(&self) -> Cost {
        self.extractor.cost()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use switchyard_core::HttpFacet;

    use super::*;
    use crate::audit::testing::RecordingSink;
    use crate::resolver::service_set;

    /// Values are the comma-separated parts of the service name; a request's
    /// value is its `X-Tag` header. A service named `broken` fails derivation.
    struct TagExtractor;

    impl ValueExtractor for TagExtractor {
        type Value = String;

        fn name(&self) -> &'static str {
            "tag"
        }

        fn service_values(&self, service: &PublishedService) -> Result<Vec<String>, ResolutionError> {
            if service.name == "broken" {
                return Err(ResolutionError::Wsdl {
                    service: service.id,
                    source: anyhow!("cannot read tags"),
                });
            }
            Ok(service.name.split(',').map(str::to_string).collect())
        }

        fn request_value(&self, message: &Message) -> Result<Option<String>, ResolutionError> {
            let Some(http) = message.http() else {
                return Ok(None);
            };
            Ok(http.header("X-Tag")?.map(str::to_string))
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

    fn resolver() -> ValueCacheResolver<TagExtractor> {
        ValueCacheResolver::new(TagExtractor, Arc::new(RecordingSink::default()))
    }

    fn svc(tags: &str) -> Arc<PublishedService> {
        Arc::new(PublishedService::new(ServiceId::generate(), tags))
    }

    fn tagged(tag: &str) -> Message {
        Message::new().with_http(HttpFacet::new("/").with_header("X-Tag", tag))
    }

    #[test]
    fn resolve_intersects_with_candidates() {
        let r = resolver();
        let a = svc("red,blue");
        let b = svc("blue");
        let c = svc("green");
        for s in [&a, &b, &c] {
            r.service_created(s).unwrap();
        }

        let all = service_set([Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)]);
        let blue = r.resolve(&tagged("blue"), &all).unwrap();
        assert_eq!(blue.matches().map(ServiceSet::len), Some(2));

        let only_b = service_set([Arc::clone(&b), Arc::clone(&c)]);
        let narrowed = r.resolve(&tagged("red"), &only_b).unwrap();
        assert_eq!(narrowed, ResolveResult::NoMatch);
    }

    #[test]
    fn missing_facet_is_not_applicable() {
        let r = resolver();
        let a = svc("red");
        r.service_created(&a).unwrap();
        let set = service_set([a]);
        assert_eq!(
            r.resolve(&Message::new(), &set).unwrap(),
            ResolveResult::NotApplicable
        );
        let no_header = Message::new().with_http(HttpFacet::new("/"));
        assert_eq!(r.resolve(&no_header, &set).unwrap(), ResolveResult::NotApplicable);
    }

    #[test]
    fn unknown_value_is_no_match() {
        let r = resolver();
        let a = svc("red");
        r.service_created(&a).unwrap();
        assert_eq!(
            r.resolve(&tagged("purple"), &service_set([a])).unwrap(),
            ResolveResult::NoMatch
        );
    }

    #[test]
    fn repeated_header_propagates_error() {
        let r = resolver();
        let msg = Message::new().with_http(
            HttpFacet::new("/")
                .with_header("X-Tag", "a")
                .with_header("X-Tag", "b"),
        );
        let err = r.resolve(&msg, &ServiceSet::new()).unwrap_err();
        assert!(matches!(err, ResolutionError::MultipleHeaderValues { count: 2, .. }));
    }

    #[test]
    fn created_values_are_memoized_and_deduplicated() {
        let r = resolver();
        let a = svc("red,red,blue");
        r.service_created(&a).unwrap();
        r.service_created(&a).unwrap();
        assert_eq!(r.cache_misses(), 1);
        assert_eq!(
            r.cached_values(a.id),
            Some(vec!["red".to_string(), "blue".to_string()])
        );
    }

    #[test]
    fn update_rederives_and_drops_stale_values() {
        let r = resolver();
        let a = svc("red");
        r.service_created(&a).unwrap();

        let renamed = Arc::new(PublishedService {
            name: "green".to_string(),
            ..(*a).clone()
        });
        r.service_updated(&renamed).unwrap();
        assert_eq!(r.cache_misses(), 2);

        let set = service_set([Arc::clone(&renamed)]);
        assert_eq!(r.resolve(&tagged("red"), &set).unwrap(), ResolveResult::NoMatch);
        assert!(r.resolve(&tagged("green"), &set).unwrap().matches().is_some());
    }

    #[test]
    fn delete_removes_every_reference() {
        let r = resolver();
        let a = svc("red,blue");
        let b = svc("blue");
        r.service_created(&a).unwrap();
        r.service_created(&b).unwrap();

        r.service_deleted(&a);
        assert!(!r.references(a.id));
        assert!(r.references(b.id));
    }

    #[test]
    fn failed_update_leaves_service_with_no_values() {
        let r = resolver();
        let a = svc("red");
        r.service_created(&a).unwrap();

        let broken = Arc::new(PublishedService {
            name: "broken".to_string(),
            ..(*a).clone()
        });
        assert!(r.service_updated(&broken).is_err());
        assert!(!r.references(a.id));
        assert_eq!(
            r.resolve(&tagged("red"), &service_set([broken])).unwrap(),
            ResolveResult::NoMatch
        );
    }

    #[test]
    fn failed_create_is_not_cached() {
        let r = resolver();
        let broken = svc("broken");
        assert!(r.service_created(&broken).is_err());
        assert!(!r.references(broken.id));
    }

    #[test]
    fn unsaved_service_is_never_cached() {
        let r = resolver();
        let pending = Arc::new(PublishedService::new(ServiceId::UNSAVED, "red"));
        r.service_created(&pending).unwrap();
        r.service_updated(&pending).unwrap();
        assert!(!r.references(ServiceId::UNSAVED));
        assert_eq!(r.cache_misses(), 0);
    }

    #[test]
    fn cache_miss_is_audited() {
        let sink = Arc::new(RecordingSink::default());
        let r = ValueCacheResolver::new(TagExtractor, sink.clone());
        let a = svc("red");
        r.service_created(&a).unwrap();
        assert_eq!(
            sink.events(),
            vec![AuditEvent::CacheMiss {
                resolver: "tag",
                service: a.id,
            }]
        );
    }

    #[test]
    fn concurrent_readers_see_consistent_maps() {
        let r = resolver();
        let stable = svc("red");
        r.service_created(&stable).unwrap();
        let churn: Vec<_> = (0..50).map(|_| svc("red,blue")).collect();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for s in &churn {
                    r.service_created(s).unwrap();
                    r.service_deleted(s);
                }
            });
            for _ in 0..4 {
                scope.spawn(|| {
                    let set = service_set([Arc::clone(&stable)]);
                    for _ in 0..200 {
                        let out = r.resolve(&tagged("red"), &set).unwrap();
                        assert_eq!(out.matches().map(ServiceSet::len), Some(1));
                    }
                });
            }
        });

        for s in &churn {
            assert!(!r.references(s.id));
        }
    }
}
