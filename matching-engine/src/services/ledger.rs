//! Ledger query collaborator.

use crate::models::{LedgerEntry, Partner};
use async_trait::async_trait;
use reconcile_core::error::AppError;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Read access to the financial ledger. The engine composes its
/// matching predicates in memory on top of the pool returned here, so
/// an implementation may be backed by a relational store or by a plain
/// map.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Journal lines of the company that are candidates for matching,
    /// minus the excluded ids. Implementations should already restrict
    /// to posted, unreconciled lines on reconcilable accounts; the
    /// engine re-checks the posted/reconciled flags defensively.
    async fn unreconciled_entries(
        &self,
        company_id: Uuid,
        excluded_ids: &HashSet<Uuid>,
    ) -> Result<Vec<LedgerEntry>, AppError>;

    async fn partner(&self, partner_id: Uuid) -> Result<Option<Partner>, AppError>;
}

/// Map-backed ledger store for tests and embedding.
#[derive(Default)]
pub struct InMemoryLedger {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, LedgerEntry>,
    partners: HashMap<Uuid, Partner>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_entry(&self, entry: LedgerEntry) {
        self.inner.write().await.entries.insert(entry.entry_id, entry);
    }

    pub async fn insert_partner(&self, partner: Partner) {
        self.inner
            .write()
            .await
            .partners
            .insert(partner.partner_id, partner);
    }

    pub async fn mark_reconciled(&self, entry_id: Uuid) {
        if let Some(entry) = self.inner.write().await.entries.get_mut(&entry_id) {
            entry.reconciled = true;
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn unreconciled_entries(
        &self,
        company_id: Uuid,
        excluded_ids: &HashSet<Uuid>,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .values()
            .filter(|e| {
                e.company_id == company_id
                    && e.posted
                    && !e.reconciled
                    && !excluded_ids.contains(&e.entry_id)
            })
            .cloned()
            .collect())
    }

    async fn partner(&self, partner_id: Uuid) -> Result<Option<Partner>, AppError> {
        Ok(self.inner.read().await.partners.get(&partner_id).cloned())
    }
}
