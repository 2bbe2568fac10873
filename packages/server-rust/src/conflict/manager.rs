//! Computes, validates and records each service's resolution parameters.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use switchyard_core::{PublishedService, ResolutionAddress, ResolutionParameters, ServiceId};

use super::store::ResolutionParameterStore;
use crate::audit::{AuditEvent, AuditSink};
use crate::error::{ConflictError, ResolutionError};
use crate::resolver::{operation_values, OperationValue, SoapActionExtractor, UrnExtractor};

/// Keeps the recorded parameter rows of every service unique across services.
pub struct ResolutionManager {
    store: Arc<dyn ResolutionParameterStore>,
    audit: Arc<dyn AuditSink>,
}

impl ResolutionManager {
    #[must_use]
    pub fn new(store: Arc<dyn ResolutionParameterStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Every `(uri, soap_action, urn)` combination the service answers to.
    ///
    /// The service's routing URI is combined with each distinct SOAP action
    /// and each distinct URN of its WSDL operations. A component with no
    /// values contributes the empty string, so every service yields at least
    /// one tuple. An unusable WSDL is audited and treated as declaring nothing.
    #[must_use]
    pub fn parameters_for(&self, service: &PublishedService) -> BTreeSet<ResolutionParameters> {
        let actions = self.distinct_values(&SoapActionExtractor, service);
        let urns = self.distinct_values(&UrnExtractor, service);
        let mut params = BTreeSet::new();
        for action in &actions {
            for urn in &urns {
                params.insert(ResolutionParameters::new(
                    service.id,
                    service.routing_uri(),
                    Some(action.clone()),
                    Some(urn.clone()),
                ));
            }
        }
        params
    }

    fn distinct_values<T>(&self, extractor: &T, service: &PublishedService) -> BTreeSet<String>
    where
        T: OperationValue<Value = String>,
    {
        let mut values: BTreeSet<String> = match operation_values(extractor, service) {
            Ok(values) => values.into_iter().collect(),
            Err(err) => {
                let reason = match err {
                    ResolutionError::Wsdl { source, .. } => format!("{source:#}"),
                    other => other.to_string(),
                };
                self.audit.record(AuditEvent::WsdlError {
                    service: service.id,
                    reason,
                });
                BTreeSet::new()
            }
        };
        if values.is_empty() {
            values.insert(String::new());
        }
        values
    }

    /// Verifies that publishing `service` would not duplicate another
    /// service's parameters. Writes nothing.
    ///
    /// # Errors
    ///
    /// [`ConflictError::Duplicate`] on the first clash, or
    /// [`ConflictError::Store`] if the store cannot be read.
    pub async fn check(&self, service: &PublishedService) -> Result<(), ConflictError> {
        let params = self.parameters_for(service);
        self.ensure_unique(service.id, &params).await
    }

    /// Records the parameters of a created or updated service.
    ///
    /// Returns `false` when the recorded rows already match, in which case
    /// the store is not written. Otherwise every row is validated before the
    /// first write, then only the rows that differ are deleted or inserted.
    ///
    /// # Errors
    ///
    /// [`ConflictError::Unsaved`] for a service without identity,
    /// [`ConflictError::Duplicate`] if another service already owns one of the
    /// tuples, [`ConflictError::Store`] on storage failure.
    pub async fn record(&self, service: &PublishedService) -> Result<bool, ConflictError> {
        if service.id.is_unsaved() {
            return Err(ConflictError::Unsaved {
                name: service.name.clone(),
            });
        }
        let fresh: HashSet<ResolutionParameters> = self.parameters_for(service).into_iter().collect();
        let recorded: HashSet<ResolutionParameters> = self
            .store
            .load_for_service(service.id)
            .await?
            .into_iter()
            .collect();
        if fresh == recorded {
            tracing::debug!(service = %service.display_name(), "resolution parameters unchanged");
            return Ok(false);
        }

        let ordered: BTreeSet<ResolutionParameters> = fresh.iter().cloned().collect();
        self.ensure_unique(service.id, &ordered).await?;

        for stale in recorded.difference(&fresh) {
            self.store.delete(stale).await?;
        }
        for added in fresh.difference(&recorded) {
            self.store.insert(added).await?;
        }
        tracing::info!(
            service = %service.display_name(),
            rows = fresh.len(),
            "resolution parameters recorded"
        );
        Ok(true)
    }

    /// Drops every row of a deleted service.
    ///
    /// # Errors
    ///
    /// [`ConflictError::Store`] on storage failure.
    pub async fn delete(&self, id: ServiceId) -> Result<(), ConflictError> {
        self.store.delete_all_for_service(id).await?;
        tracing::info!(%id, "resolution parameters deleted");
        Ok(())
    }

    async fn ensure_unique(
        &self,
        id: ServiceId,
        params: &BTreeSet<ResolutionParameters>,
    ) -> Result<(), ConflictError> {
        let all = self.store.load_all().await?;
        let taken: HashMap<ResolutionAddress<'_>, ServiceId> = all
            .iter()
            .filter(|row| row.service_id != id)
            .map(|row| (row.address(), row.service_id))
            .collect();

        for p in params {
            if let Some(&existing) = taken.get(&p.address()) {
                self.audit.record(AuditEvent::Conflict {
                    service: id,
                    existing,
                    address: p.address().to_string(),
                });
                return Err(ConflictError::Duplicate {
                    uri: p.uri.clone(),
                    soap_action: p.soap_action.clone(),
                    urn: p.urn.clone(),
                    existing,
                });
            }
        }
        Ok(())
    }
}
