//! `Switchyard` Server: the service resolution engine, with resolver strategies, the
//! live service cache, and publish-time conflict detection.

pub mod audit;
pub mod conflict;
pub mod error;
pub mod resolver;
pub mod service;

pub use audit::{tracing_sink, AuditEvent, AuditSink, TracingAuditSink};
pub use conflict::{InMemoryParameterStore, ResolutionManager, ResolutionParameterStore};
pub use error::{ConflictError, ResolutionError};
pub use resolver::{Cost, ResolveResult, ServiceResolver, ServiceSet};
pub use service::{PreParseHook, ResolverConfig, ServiceCache};
