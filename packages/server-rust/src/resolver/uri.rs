//! Resolution by request URI.
//!
//! Routing URIs are exact (`/orders`), path wildcards (`/orders*`), or
//! extension wildcards (`*.xml`, `/feeds/*.rss`). A request URI is resolved
//! by, in order:
//!
//! 1. the negative cache of URIs already known to match nothing;
//! 2. an exact lookup;
//! 3. a scan of every wildcard pattern. Path wildcards beat extension
//!    wildcards, then the longest pattern wins.
//!
//! A URI that no registered pattern matches is remembered as unresolvable.
//! Any registration event clears that memory, since a new or changed service
//! can only make such a URI resolvable.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use switchyard_core::{Message, PublishedService, ServiceId};

use super::{intersect, Cost, ResolveResult, ServiceResolver, ServiceSet};
use crate::error::ResolutionError;
use crate::service::config::ResolverConfig;

// ---------------------------------------------------------------------------
// UriPattern
// ---------------------------------------------------------------------------

/// Classification of a routing URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UriPatternKind {
    /// No `*`.
    Exact,
    /// Ends with `*`.
    PathWildcard,
    /// Contains `*`, but not at the end.
    ExtensionWildcard,
}

/// A routing URI classified and, for wildcards, compiled once.
///
/// Equality and hashing use the raw string only, so a map keyed by
/// `UriPattern` can be queried with a `&str`.
#[derive(Debug, Clone)]
pub struct UriPattern {
    raw: String,
    kind: UriPatternKind,
    regex: Option<Regex>,
}

impl UriPattern {
    /// Classifies and compiles a routing URI.
    ///
    /// # Errors
    ///
    /// Returns the regex error if a wildcard pattern cannot be compiled.
    pub fn new(raw: impl Into<String>) -> Result<Self, regex::Error> {
        let raw = raw.into();
        let kind = if !raw.contains('*') {
            UriPatternKind::Exact
        } else if raw.ends_with('*') {
            UriPatternKind::PathWildcard
        } else {
            UriPatternKind::ExtensionWildcard
        };
        let regex = match kind {
            UriPatternKind::Exact => None,
            UriPatternKind::PathWildcard | UriPatternKind::ExtensionWildcard => {
                Some(wildcard_regex(&raw)?)
            }
        };
        Ok(Self { raw, kind, regex })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn kind(&self) -> UriPatternKind {
        self.kind
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.kind != UriPatternKind::Exact
    }

    #[must_use]
    pub fn matches(&self, uri: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(uri),
            None => self.raw == uri,
        }
    }
}

/// `*` becomes `.*`; everything else matches literally. The whole URI must match.
fn wildcard_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$"))
}

impl PartialEq for UriPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for UriPattern {}

impl Hash for UriPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.as_str().hash(state);
    }
}

impl Borrow<str> for UriPattern {
    fn borrow(&self) -> &str {
        &self.raw
    }
}

// ---------------------------------------------------------------------------
// UriMaps
// ---------------------------------------------------------------------------

#[derive(Default)]
struct UriMaps {
    by_service: HashMap<ServiceId, UriPattern>,
    by_pattern: HashMap<UriPattern, HashMap<ServiceId, Arc<PublishedService>>>,
    /// URIs no registered pattern matches.
    unresolvable: HashSet<String>,
    /// Bumped on every registration event; guards negative-cache inserts made
    /// after re-acquiring the lock.
    generation: u64,
}

impl UriMaps {
    fn unindex(&mut self, id: ServiceId) {
        let Some(pattern) = self.by_service.remove(&id) else {
            return;
        };
        if let Some(services) = self.by_pattern.get_mut(pattern.as_str()) {
            services.remove(&id);
            if services.is_empty() {
                self.by_pattern.remove(pattern.as_str());
            }
        }
    }

    fn index(&mut self, service: &Arc<PublishedService>, pattern: UriPattern) {
        self.by_pattern
            .entry(pattern.clone())
            .or_default()
            .insert(service.id, Arc::clone(service));
        self.by_service.insert(service.id, pattern);
    }

    fn invalidate(&mut self) {
        self.unresolvable.clear();
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Outcome of matching one URI against the maps.
enum UriMatch {
    Matched(ServiceSet),
    /// Some pattern matches, but none of its services are candidates.
    OutsideCandidates,
    /// No registered pattern matches at all.
    Unresolvable,
}

// ---------------------------------------------------------------------------
// UriResolver
// ---------------------------------------------------------------------------

/// Resolver matching the request URI against each service's routing URI.
pub struct UriResolver {
    reserved_prefix: String,
    negative_capacity: usize,
    maps: RwLock<UriMaps>,
    pattern_scans: AtomicU64,
}

impl UriResolver {
    #[must_use]
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            reserved_prefix: config.reserved_uri_prefix.clone(),
            negative_capacity: config.negative_cache_capacity,
            maps: RwLock::new(UriMaps::default()),
            pattern_scans: AtomicU64::new(0),
        }
    }

    /// Maps the gateway's root and reserved paths to the empty routing URI.
    fn normalize<'a>(&self, uri: &'a str) -> &'a str {
        let reserved = !self.reserved_prefix.is_empty() && uri.starts_with(&self.reserved_prefix);
        if uri == "/" || reserved {
            ""
        } else {
            uri
        }
    }

    /// Services the URI rules alone map `uri` to, restricted to `candidates`.
    /// Bypasses normalisation and the negative cache.
    pub fn matching(&self, uri: &str, candidates: &ServiceSet) -> ServiceSet {
        let maps = self.maps.read();
        match self.match_uri(&maps, uri, candidates) {
            UriMatch::Matched(set) => set,
            UriMatch::OutsideCandidates | UriMatch::Unresolvable => ServiceSet::new(),
        }
    }

    /// Number of wildcard scans performed so far.
    pub fn pattern_scans(&self) -> u64 {
        self.pattern_scans.load(Ordering::Relaxed)
    }

    pub fn negative_cache_len(&self) -> usize {
        self.maps.read().unresolvable.len()
    }

    /// Whether either map still mentions the service.
    pub fn references(&self, id: ServiceId) -> bool {
        let maps = self.maps.read();
        maps.by_service.contains_key(&id)
            || maps.by_pattern.values().any(|services| services.contains_key(&id))
    }

    fn match_uri(&self, maps: &UriMaps, uri: &str, candidates: &ServiceSet) -> UriMatch {
        let exact = maps.by_pattern.get(uri);
        if let Some(services) = exact {
            let matched = intersect(services, candidates);
            if !matched.is_empty() {
                return UriMatch::Matched(matched);
            }
        }

        self.pattern_scans.fetch_add(1, Ordering::Relaxed);
        let mut any_pattern = exact.is_some();
        let mut hits: Vec<(&UriPattern, ServiceSet)> = Vec::new();
        for (pattern, services) in &maps.by_pattern {
            if !pattern.is_wildcard() || !pattern.matches(uri) {
                continue;
            }
            any_pattern = true;
            let matched = intersect(services, candidates);
            if !matched.is_empty() {
                hits.push((pattern, matched));
            }
        }

        if hits.is_empty() {
            return if any_pattern {
                UriMatch::OutsideCandidates
            } else {
                UriMatch::Unresolvable
            };
        }

        if hits.iter().any(|(p, _)| p.kind() == UriPatternKind::PathWildcard) {
            hits.retain(|(p, _)| p.kind() == UriPatternKind::PathWildcard);
        }
        let longest = hits.iter().map(|(p, _)| p.as_str().len()).max().unwrap_or(0);
        let mut out = ServiceSet::new();
        for (_, matched) in hits.into_iter().filter(|(p, _)| p.as_str().len() == longest) {
            out.extend(matched);
        }
        UriMatch::Matched(out)
    }

    fn register(&self, service: &Arc<PublishedService>) -> Result<(), ResolutionError> {
        let compiled = UriPattern::new(service.routing_uri());
        let mut maps = self.maps.write();
        maps.unindex(service.id);
        maps.invalidate();
        if service.id.is_unsaved() {
            return Ok(());
        }
        let pattern = compiled.map_err(|source| ResolutionError::InvalidUriPattern {
            pattern: service.routing_uri().to_string(),
            source,
        })?;
        maps.index(service, pattern);
        Ok(())
    }
}

impl ServiceResolver for UriResolver {
    fn name(&self) -> &'static str {
        "uri"
    }

    fn service_created(&self, service: &Arc<PublishedService>) -> Result<(), ResolutionError> {
        self.register(service)
    }

    fn service_updated(&self, service: &Arc<PublishedService>) -> Result<(), ResolutionError> {
        self.register(service)
    }

    fn service_deleted(&self, service: &PublishedService) {
        let mut maps = self.maps.write();
        maps.unindex(service.id);
        maps.invalidate();
    }

    fn resolve(
        &self,
        message: &Message,
        candidates: &ServiceSet,
    ) -> Result<ResolveResult, ResolutionError> {
        let Some(http) = message.http() else {
            return Ok(ResolveResult::NotApplicable);
        };
        let uri = self.normalize(http.request_uri());

        let generation = {
            let maps = self.maps.read();
            if maps.unresolvable.contains(uri) {
                return Ok(ResolveResult::NoMatch);
            }
            match self.match_uri(&maps, uri, candidates) {
                UriMatch::Matched(set) => return Ok(ResolveResult::Matched(set)),
                UriMatch::OutsideCandidates => return Ok(ResolveResult::NoMatch),
                UriMatch::Unresolvable => maps.generation,
            }
        };

        // Only record the miss if no registration happened since the scan.
        let mut maps = self.maps.write();
        if maps.generation == generation && maps.unresolvable.len() < self.negative_capacity {
            tracing::debug!(uri, "recording unresolvable URI");
            maps.unresolvable.insert(uri.to_string());
        }
        Ok(ResolveResult::NoMatch)
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

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use switchyard_core::HttpFacet;

    use super::*;
    use crate::resolver::service_set;

    fn resolver() -> UriResolver {
        UriResolver::new(&ResolverConfig::default())
    }

    fn svc(uri: &str) -> Arc<PublishedService> {
        Arc::new(PublishedService::new(ServiceId::generate(), uri).with_routing_uri(uri))
    }

    fn request(uri: &str) -> Message {
        Message::new().with_http(HttpFacet::new(uri))
    }

    fn resolved(r: &UriResolver, uri: &str, candidates: &ServiceSet) -> Vec<ServiceId> {
        match r.resolve(&request(uri), candidates).unwrap() {
            ResolveResult::Matched(set) => {
                let mut ids: Vec<_> = set.into_keys().collect();
                ids.sort();
                ids
            }
            ResolveResult::NoMatch => Vec::new(),
            ResolveResult::NotApplicable => panic!("uri resolver must apply to HTTP requests"),
        }
    }

    fn registered(r: &UriResolver, services: &[&Arc<PublishedService>]) -> ServiceSet {
        for s in services {
            r.service_created(s).unwrap();
        }
        service_set(services.iter().map(|s| Arc::clone(*s)))
    }

    #[test]
    fn classifies_patterns() {
        assert_eq!(UriPattern::new("/a").unwrap().kind(), UriPatternKind::Exact);
        assert_eq!(UriPattern::new("/a*").unwrap().kind(), UriPatternKind::PathWildcard);
        assert_eq!(UriPattern::new("*.xml").unwrap().kind(), UriPatternKind::ExtensionWildcard);
        assert_eq!(UriPattern::new("/a/*/b*").unwrap().kind(), UriPatternKind::PathWildcard);
    }

    #[test]
    fn wildcard_escapes_metacharacters() {
        let p = UriPattern::new("/a.b?c$(d)*").unwrap();
        assert!(p.matches("/a.b?c$(d)/anything"));
        assert!(!p.matches("/aXb?c$(d)/anything"));
    }

    #[test]
    fn exact_match_returns_all_services_with_that_uri() {
        let r = resolver();
        let a = svc("/orders");
        let b = svc("/orders");
        let c = svc("/invoices");
        let all = registered(&r, &[&a, &b, &c]);

        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(resolved(&r, "/orders", &all), expected);

        let only_b = service_set([Arc::clone(&b), Arc::clone(&c)]);
        assert_eq!(resolved(&r, "/orders", &only_b), vec![b.id]);
    }

    #[test]
    fn exact_match_beats_wildcards() {
        let r = resolver();
        let exact = svc("/foo/bar");
        let wild = svc("/foo*");
        let all = registered(&r, &[&exact, &wild]);
        assert_eq!(resolved(&r, "/foo/bar", &all), vec![exact.id]);
        assert_eq!(resolved(&r, "/foo/baz", &all), vec![wild.id]);
    }

    #[test]
    fn longest_path_wildcard_wins() {
        let r = resolver();
        let a = svc("/foo*");
        let b = svc("/foo/bar*");
        let all = registered(&r, &[&a, &b]);
        assert_eq!(resolved(&r, "/foo/bar/baz", &all), vec![b.id]);
        assert_eq!(resolved(&r, "/foo/other", &all), vec![a.id]);
    }

    #[test]
    fn path_wildcard_beats_longer_extension_wildcard() {
        let r = resolver();
        let a = svc("/foo*");
        let b = svc("/foo/report/*.xml");
        let all = registered(&r, &[&a, &b]);
        assert_eq!(resolved(&r, "/foo/report/q3.xml", &all), vec![a.id]);

        let r = resolver();
        let a = svc("/foo*");
        let b = svc("*.xml");
        let all = registered(&r, &[&a, &b]);
        assert_eq!(resolved(&r, "/foo/report.xml", &all), vec![a.id]);
        assert_eq!(resolved(&r, "/bar/report.xml", &all), vec![b.id]);
    }

    #[test]
    fn wildcard_outside_candidates_falls_through() {
        let r = resolver();
        let a = svc("/foo/bar*");
        let b = svc("/foo*");
        registered(&r, &[&a, &b]);
        let only_b = service_set([Arc::clone(&b)]);
        assert_eq!(resolved(&r, "/foo/bar/x", &only_b), vec![b.id]);
    }

    #[test]
    fn root_and_reserved_prefix_resolve_to_default_uri() {
        let r = resolver();
        let default = svc("");
        let named = svc("/named");
        let all = registered(&r, &[&default, &named]);
        assert_eq!(resolved(&r, "/", &all), vec![default.id]);
        assert_eq!(resolved(&r, "/ssg/soap", &all), vec![default.id]);
        assert_eq!(resolved(&r, "/named", &all), vec![named.id]);
    }

    #[test]
    fn non_http_request_is_not_applicable() {
        let r = resolver();
        assert_eq!(
            r.resolve(&Message::new(), &ServiceSet::new()).unwrap(),
            ResolveResult::NotApplicable
        );
    }

    #[test]
    fn negative_cache_skips_second_scan() {
        let r = resolver();
        let a = svc("/foo*");
        let all = registered(&r, &[&a]);

        assert!(resolved(&r, "/nothing", &all).is_empty());
        let scans = r.pattern_scans();
        assert_eq!(r.negative_cache_len(), 1);

        assert!(resolved(&r, "/nothing", &all).is_empty());
        assert_eq!(r.pattern_scans(), scans);
    }

    #[test]
    fn registration_clears_negative_cache() {
        let r = resolver();
        let a = svc("/foo");
        let mut all = registered(&r, &[&a]);
        assert!(resolved(&r, "/later", &all).is_empty());
        assert_eq!(r.negative_cache_len(), 1);

        let later = svc("/later");
        r.service_created(&later).unwrap();
        all.insert(later.id, Arc::clone(&later));
        assert_eq!(r.negative_cache_len(), 0);
        assert_eq!(resolved(&r, "/later", &all), vec![later.id]);
    }

    #[test]
    fn miss_outside_candidates_is_not_negatively_cached() {
        let r = resolver();
        let a = svc("/foo");
        let b = svc("/bar");
        registered(&r, &[&a, &b]);
        let only_b = service_set([Arc::clone(&b)]);
        assert!(resolved(&r, "/foo", &only_b).is_empty());
        assert_eq!(r.negative_cache_len(), 0);
        assert_eq!(resolved(&r, "/foo", &service_set([Arc::clone(&a)])), vec![a.id]);
    }

    #[test]
    fn negative_cache_respects_capacity() {
        let config = ResolverConfig {
            negative_cache_capacity: 2,
            ..ResolverConfig::default()
        };
        let r = UriResolver::new(&config);
        for uri in ["/a", "/b", "/c"] {
            assert!(resolved(&r, uri, &ServiceSet::new()).is_empty());
        }
        assert_eq!(r.negative_cache_len(), 2);
    }

    #[test]
    fn update_moves_service_to_new_uri() {
        let r = resolver();
        let a = svc("/old");
        let all = registered(&r, &[&a]);
        let moved = Arc::new((*a).clone().with_routing_uri("/new"));
        r.service_updated(&moved).unwrap();
        assert!(resolved(&r, "/old", &all).is_empty());
        assert_eq!(resolved(&r, "/new", &all), vec![a.id]);
    }

    #[test]
    fn delete_leaves_no_references() {
        let r = resolver();
        let a = svc("/foo*");
        let b = svc("/foo*");
        registered(&r, &[&a, &b]);
        r.service_deleted(&a);
        assert!(!r.references(a.id));
        assert!(r.references(b.id));
        r.service_deleted(&b);
        assert!(!r.references(b.id));
    }

    #[test]
    fn matching_bypasses_negative_cache() {
        let r = resolver();
        let a = svc("/foo*");
        let all = registered(&r, &[&a]);
        assert_eq!(r.matching("/foo/x", &all).len(), 1);
        assert!(r.matching("/bar", &all).is_empty());
        assert_eq!(r.negative_cache_len(), 0);
    }

    proptest! {
        #[test]
        fn exact_pattern_matches_only_itself(uri in "/[a-z./?$]{0,12}", other in "/[a-z./?$]{0,12}") {
            let p = UriPattern::new(uri.clone()).unwrap();
            prop_assert!(p.matches(&uri));
            prop_assert_eq!(p.matches(&other), uri == other);
        }

        #[test]
        fn path_wildcard_matches_any_suffix(prefix in "/[a-z.]{0,8}", suffix in "[a-z./]{0,8}") {
            let p = UriPattern::new(format!("{prefix}*")).unwrap();
            let with_suffix = format!("{prefix}{suffix}");
            prop_assert!(p.matches(&with_suffix));
        }
    }
}
