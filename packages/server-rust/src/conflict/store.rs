//! Persistence port for recorded resolution parameters.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use switchyard_core::{ResolutionParameters, ServiceId};

/// Storage of resolution-parameter rows.
///
/// All calls run inside the caller's unit of work; the manager performs every
/// read it needs before its first write.
///
/// Used as `Arc<dyn ResolutionParameterStore>`.
#[async_trait]
pub trait ResolutionParameterStore: Send + Sync {
    /// Rows currently recorded for one service.
    async fn load_for_service(&self, id: ServiceId) -> anyhow::Result<Vec<ResolutionParameters>>;

    /// Rows of every service.
    async fn load_all(&self) -> anyhow::Result<Vec<ResolutionParameters>>;

    async fn insert(&self, params: &ResolutionParameters) -> anyhow::Result<()>;

    async fn delete(&self, params: &ResolutionParameters) -> anyhow::Result<()>;

    async fn delete_all_for_service(&self, id: ServiceId) -> anyhow::Result<()>;
}

/// In-memory store backed by [`DashMap`], keyed by owning service.
///
/// Counts every write so callers can verify that unchanged registrations do
/// not touch storage.
#[derive(Default)]
pub struct InMemoryParameterStore {
    rows: DashMap<ServiceId, HashSet<ResolutionParameters>>,
    writes: AtomicU64,
}

impl InMemoryParameterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of insert and delete calls so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Total rows across all services.
    pub fn len(&self) -> usize {
        self.rows.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResolutionParameterStore for InMemoryParameterStore {
    async fn load_for_service(&self, id: ServiceId) -> anyhow::Result<Vec<ResolutionParameters>> {
        Ok(self
            .rows
            .get(&id)
            .map(|rows| rows.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn load_all(&self) -> anyhow::Result<Vec<ResolutionParameters>> {
        Ok(self
            .rows
            .iter()
            .flat_map(|entry| entry.value().iter().cloned().collect::<Vec<_>>())
            .collect())
    }

    async fn insert(&self, params: &ResolutionParameters) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.rows
            .entry(params.service_id)
            .or_default()
            .insert(params.clone());
        Ok(())
    }

    async fn delete(&self, params: &ResolutionParameters) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.rows.remove_if_mut(&params.service_id, |_, rows| {
            rows.remove(params);
            rows.is_empty()
        });
        Ok(())
    }

    async fn delete_all_for_service(&self, id: ServiceId) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.rows.remove(&id);
        Ok(())
    }
}
