//! Observability port for resolution events.
//!
//! Resolvers, the service cache and the conflict manager report noteworthy
//! events through an [`AuditSink`]. Only the occurrence of an event is part of
//! the contract; formatting belongs to the sink.

use std::sync::Arc;

use switchyard_core::ServiceId;

/// A resolution-engine event worth logging or auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// A resolver had to derive a service's values because they were not cached.
    CacheMiss {
        resolver: &'static str,
        service: ServiceId,
    },
    /// A service's WSDL could not be turned into resolution values.
    WsdlError { service: ServiceId, reason: String },
    /// A resolver rejected a registration for a reason other than its WSDL.
    NotificationFailed {
        resolver: &'static str,
        service: ServiceId,
        reason: String,
    },
    /// A request payload carried more than one namespace.
    AmbiguousNamespace { namespaces: Vec<String> },
    /// Publishing a service would duplicate another service's address.
    Conflict {
        service: ServiceId,
        existing: ServiceId,
        address: String,
    },
    /// The candidate set is empty before any resolver ran.
    NoServices,
    /// A resolver narrowed the candidates to a single service.
    ResolvedEarly { resolver: &'static str },
    /// A resolver eliminated every candidate.
    FailedEarly { resolver: &'static str },
    /// The chain finished with more than one candidate.
    MultipleMatches { count: usize },
    /// The resolved strict SOAP service does not declare the requested operation.
    OperationMismatch { service: ServiceId },
    /// The resolved strict SOAP service received a non-SOAP request.
    NotSoap { service: ServiceId },
    /// A request resolved to a service.
    Resolved { service: ServiceId },
}

/// Receives [`AuditEvent`]s.
///
/// Used as `Arc<dyn AuditSink>`.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink: writes every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match event {
            AuditEvent::CacheMiss { resolver, service } => {
                tracing::debug!(resolver, %service, "resolution value cache miss");
            }
            AuditEvent::WsdlError { service, reason } => {
                tracing::warn!(%service, %reason, "service WSDL unusable for resolution");
            }
            AuditEvent::NotificationFailed {
                resolver,
                service,
                reason,
            } => {
                tracing::warn!(resolver, %service, %reason, "resolver rejected service");
            }
            AuditEvent::AmbiguousNamespace { namespaces } => {
                tracing::info!(?namespaces, "request payload namespace is ambiguous");
            }
            AuditEvent::Conflict {
                service,
                existing,
                address,
            } => {
                tracing::warn!(%service, %existing, %address, "resolution parameter conflict");
            }
            AuditEvent::NoServices => tracing::info!("no services to resolve against"),
            AuditEvent::ResolvedEarly { resolver } => {
                tracing::debug!(resolver, "service resolved early");
            }
            AuditEvent::FailedEarly { resolver } => {
                tracing::info!(resolver, "service resolution failed early");
            }
            AuditEvent::MultipleMatches { count } => {
                tracing::info!(count, "request matches more than one service");
            }
            AuditEvent::OperationMismatch { service } => {
                tracing::info!(%service, "request does not match any operation of resolved service");
            }
            AuditEvent::NotSoap { service } => {
                tracing::info!(%service, "resolved SOAP service received a non-SOAP request");
            }
            AuditEvent::Resolved { service } => tracing::debug!(%service, "service resolved"),
        }
    }
}

/// Shared handle to the default sink.
#[must_use]
pub fn tracing_sink() -> Arc<dyn AuditSink> {
    Arc::new(TracingAuditSink)
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::{AuditEvent, AuditSink};

    /// Sink that keeps every event for later assertions.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl RecordingSink {
        pub(crate) fn events(&self) -> Vec<AuditEvent> {
            self.events.lock().clone()
        }
    }

    impl AuditSink for RecordingSink {
        fn record(&self, event: AuditEvent) {
            self.events.lock().push(event);
        }
    }
}
