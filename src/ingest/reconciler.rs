//! Web ingestion reconciler
//!
//! Decides per (entity, URL) whether an extracted document creates the
//! first version, adds a new version, or only refreshes transport metadata.
//! Prior versions are never overwritten.

use crate::extract::ExtractedDocument;
use crate::storage::{NewDocumentVersion, PersistenceGateway, StorageError, StorageResult};
use chrono::Utc;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use url::Url;

/// Result of reconciling one extracted document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// First version of a source
    Created,
    /// Content changed; a new version was added
    Updated,
    /// Same fingerprint as the latest version; only metadata refreshed
    Unchanged,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persists extracted documents through a [`PersistenceGateway`]
pub struct Reconciler<G> {
    gateway: Arc<Mutex<G>>,
}

impl<G> Clone for Reconciler<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<G: PersistenceGateway> Reconciler<G> {
    pub fn new(gateway: Arc<Mutex<G>>) -> Self {
        Self { gateway }
    }

    /// Shared handle to the underlying gateway
    pub fn gateway(&self) -> &Arc<Mutex<G>> {
        &self.gateway
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, G>> {
        self.gateway
            .lock()
            .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
    }

    /// Reconciles one successfully fetched document against stored state
    ///
    /// The version, its contacts and the source pointer are written in one
    /// gateway call. A uniqueness conflict on (source, fingerprint) means
    /// the version already exists and is reported as
    /// [`ReconcileOutcome::Unchanged`].
    pub fn reconcile(
        &self,
        entity_id: i64,
        url: &Url,
        doc: &ExtractedDocument,
        status: Option<u16>,
    ) -> StorageResult<ReconcileOutcome> {
        let now = Utc::now();
        let mut gateway = self.lock()?;

        let existing = gateway.find_source(entity_id, url.as_str())?;
        let previous = existing.as_ref().and_then(|s| s.last_fingerprint.clone());

        if previous.as_deref() == Some(doc.fingerprint.as_str()) {
            if let Some(source) = &existing {
                gateway.update_source_meta(source.id, status, now)?;
            }
            debug!("Unchanged: {}", url);
            return Ok(ReconcileOutcome::Unchanged);
        }

        let source_id = match &existing {
            Some(source) => source.id,
            None => gateway.upsert_source(entity_id, url.as_str())?,
        };

        let metadata = doc.metadata_json().to_string();
        let version = NewDocumentVersion {
            fingerprint: &doc.fingerprint,
            kind: doc.kind.to_db_string(),
            title: doc.title.as_deref(),
            content: &doc.text,
            metadata: &metadata,
        };

        let stored = match gateway.store_document_version(
            source_id,
            &version,
            &doc.contacts,
            now,
            status,
        ) {
            Ok(stored) => stored,
            Err(e) if e.is_constraint_violation() => {
                debug!("Version of {} already stored: {}", url, e);
                gateway.update_source_fingerprint(source_id, &doc.fingerprint, now, status)?;
                return Ok(ReconcileOutcome::Unchanged);
            }
            Err(e) => return Err(e),
        };

        if !stored.created {
            debug!("Unchanged (existing fingerprint): {}", url);
            return Ok(ReconcileOutcome::Unchanged);
        }
        if !doc.contacts.is_empty() {
            debug!("Stored {} contact facts for {}", doc.contacts.len(), url);
        }

        let outcome = if previous.is_some() {
            ReconcileOutcome::Updated
        } else {
            ReconcileOutcome::Created
        };
        info!("{} [{}] {}", outcome, doc.kind.to_db_string(), url);
        Ok(outcome)
    }

    /// Records a failed fetch against the source without creating a version
    pub fn record_failure(
        &self,
        entity_id: i64,
        url: &Url,
        status: Option<u16>,
        error: &str,
    ) -> StorageResult<()> {
        let mut gateway = self.lock()?;
        let source_id = gateway.upsert_source(entity_id, url.as_str())?;
        gateway.record_fetch_failure(source_id, status, error, Utc::now())?;
        warn!("Fetch failed for {}: {}", url, error);
        Ok(())
    }
}
