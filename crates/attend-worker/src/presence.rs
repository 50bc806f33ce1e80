//! Presence commits to the attendance store.

use async_trait::async_trait;
use attend_firestore::{FirestoreClient, PresenceRepository};
use attend_models::{IdentityId, PresenceRecord, SessionDate};
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// Writes confirmed presence.
#[async_trait]
pub trait PresenceWriter: Send + Sync {
    /// Mark `id` present for `date`. Must be safe to repeat.
    async fn commit(&self, date: &SessionDate, id: &IdentityId, name: &str) -> EngineResult<()>;

    /// Whether commits reach a real store.
    fn is_available(&self) -> bool {
        true
    }
}

/// Firestore-backed writer.
pub struct FirestorePresenceWriter {
    repo: PresenceRepository,
    class_label: Option<String>,
}

impl FirestorePresenceWriter {
    pub fn new(client: FirestoreClient, class_label: Option<String>) -> Self {
        Self {
            repo: PresenceRepository::new(client),
            class_label,
        }
    }

    /// Connect using the Firestore environment configuration.
    pub async fn from_env(class_label: Option<String>) -> EngineResult<Self> {
        let client = FirestoreClient::from_env().await?;
        Ok(Self::new(client, class_label))
    }
}

#[async_trait]
impl PresenceWriter for FirestorePresenceWriter {
    async fn commit(&self, date: &SessionDate, id: &IdentityId, name: &str) -> EngineResult<()> {
        let record = PresenceRecord::camera(*date, id.clone(), name)
            .with_class_label(self.class_label.clone());
        self.repo
            .commit(&record)
            .await
            .map_err(|e| EngineError::write_failure(format!("{} on {}: {}", id, date, e)))
    }
}

/// Writer used when no store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPresenceWriter;

#[async_trait]
impl PresenceWriter for NoopPresenceWriter {
    async fn commit(&self, date: &SessionDate, id: &IdentityId, _name: &str) -> EngineResult<()> {
        warn!(date = %date, roll_no = %id, "Presence store not available, skipping write");
        Ok(())
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_writer_accepts_and_reports_unavailable() {
        let writer = NoopPresenceWriter;
        let date = SessionDate::parse("2026-02-20").unwrap();
        writer
            .commit(&date, &IdentityId::from("24CS071"), "HARI VIGNESH")
            .await
            .unwrap();
        assert!(!writer.is_available());
    }
}
