//! Attendance presence repository.
//!
//! Layout:
//! - `attendance/{date}`: per-day summary (`date`, `classLabel`, `markedAt`)
//! - `attendance/{date}/records/{rollNo}`: one record per identity
//!
//! Every write is field-masked, so fields owned by other writers (manual
//! edits, on-duty markers) survive a camera commit.

use std::collections::HashMap;

use attend_models::{IdentityId, PresenceRecord, SessionDate};
use tracing::{debug, info};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, ToFirestoreValue, Value, Write};

/// Top-level attendance collection.
pub const ATTENDANCE_COLLECTION: &str = "attendance";

/// Per-day subcollection holding identity records.
pub const RECORDS_SUBCOLLECTION: &str = "records";

/// Collection path holding the records for `date`.
pub fn records_path(date: &SessionDate) -> String {
    format!(
        "{}/{}/{}",
        ATTENDANCE_COLLECTION,
        date.as_key(),
        RECORDS_SUBCOLLECTION
    )
}

/// Firestore document ids cannot be empty or contain a path separator.
fn validate_doc_id(id: &str) -> FirestoreResult<()> {
    if id.trim().is_empty() || id.contains('/') || id == "." || id == ".." {
        return Err(FirestoreError::request_failed(format!(
            "Invalid document id '{}'",
            id
        )));
    }
    Ok(())
}

fn record_fields(record: &PresenceRecord) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("rollNo".to_string(), record.roll_no.as_str().to_firestore_value());
    fields.insert("name".to_string(), record.name.to_firestore_value());
    fields.insert("status".to_string(), record.status.as_str().to_firestore_value());
    fields.insert("source".to_string(), record.source.as_str().to_firestore_value());
    fields
}

fn summary_fields(record: &PresenceRecord) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("date".to_string(), record.date.as_key().to_firestore_value());
    if let Some(label) = &record.class_label {
        fields.insert("classLabel".to_string(), label.to_firestore_value());
    }
    fields
}

/// Build the two masked upserts for one presence commit.
///
/// `documents_root` is `projects/{p}/databases/{d}/documents`.
pub fn presence_writes(documents_root: &str, record: &PresenceRecord) -> FirestoreResult<Vec<Write>> {
    validate_doc_id(record.roll_no.as_str())?;

    let record_name = format!(
        "{}/{}/{}",
        documents_root,
        records_path(&record.date),
        record.roll_no
    );
    let summary_name = format!(
        "{}/{}/{}",
        documents_root,
        ATTENDANCE_COLLECTION,
        record.date.as_key()
    );

    Ok(vec![
        Write::merge(record_name, record_fields(record)).with_server_timestamp("updatedAt"),
        Write::merge(summary_name, summary_fields(record)).with_server_timestamp("markedAt"),
    ])
}

/// Repository for attendance presence documents.
#[derive(Clone)]
pub struct PresenceRepository {
    client: FirestoreClient,
}

impl PresenceRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Mark `record` present, creating or merging the day's documents in one
    /// atomic commit. Transient failures are retried by the client policy.
    pub async fn commit(&self, record: &PresenceRecord) -> FirestoreResult<()> {
        let writes = presence_writes(&self.client.config().documents_root(), record)?;

        let response = self
            .client
            .with_retry("commit_presence", || self.client.commit(writes.clone()))
            .await?;

        debug!(commit_time = ?response.commit_time, "Presence commit acknowledged");
        info!(
            date = %record.date,
            roll_no = %record.roll_no,
            "Marked present"
        );
        Ok(())
    }

    /// Fetch the stored record for `(date, id)`.
    pub async fn get(&self, date: &SessionDate, id: &IdentityId) -> FirestoreResult<Option<Document>> {
        validate_doc_id(id.as_str())?;
        self.client.get_document(&records_path(date), id.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldTransform, ServerValue};

    const ROOT: &str = "projects/demo/databases/(default)/documents";

    fn record() -> PresenceRecord {
        PresenceRecord::camera(
            SessionDate::parse("2026-02-20").unwrap(),
            IdentityId::from("24CS071"),
            "HARI VIGNESH",
        )
    }

    #[test]
    fn test_records_path() {
        let date = SessionDate::parse("2026-02-20").unwrap();
        assert_eq!(records_path(&date), "attendance/2026-02-20/records");
    }

    #[test]
    fn test_presence_writes_targets_record_and_summary() {
        let writes = presence_writes(ROOT, &record()).unwrap();
        assert_eq!(writes.len(), 2);
        assert_eq!(
            writes[0].update.name.as_deref(),
            Some("projects/demo/databases/(default)/documents/attendance/2026-02-20/records/24CS071")
        );
        assert_eq!(
            writes[1].update.name.as_deref(),
            Some("projects/demo/databases/(default)/documents/attendance/2026-02-20")
        );
    }

    #[test]
    fn test_record_write_masks_only_camera_fields() {
        let writes = presence_writes(ROOT, &record()).unwrap();
        let mask = writes[0].update_mask.as_ref().unwrap();
        assert_eq!(
            mask.field_paths,
            vec!["name", "rollNo", "source", "status"]
        );
        assert!(!mask.field_paths.iter().any(|f| f == "odType"));

        assert_eq!(
            writes[0].update.field::<String>("status").as_deref(),
            Some("present")
        );
        assert_eq!(
            writes[0].update.field::<String>("source").as_deref(),
            Some("camera")
        );
    }

    #[test]
    fn test_summary_write_includes_class_label_when_set() {
        let without = presence_writes(ROOT, &record()).unwrap();
        let mask = without[1].update_mask.as_ref().unwrap();
        assert_eq!(mask.field_paths, vec!["date"]);

        let labelled = record().with_class_label(Some("CSE-A".to_string()));
        let with = presence_writes(ROOT, &labelled).unwrap();
        assert_eq!(
            with[1].update.field::<String>("classLabel").as_deref(),
            Some("CSE-A")
        );
        assert_eq!(
            with[1].update.field::<String>("date").as_deref(),
            Some("2026-02-20")
        );
    }

    #[test]
    fn test_timestamps_are_set_by_the_server() {
        let writes = presence_writes(ROOT, &record()).unwrap();
        assert_eq!(
            writes[0].update_transforms,
            vec![FieldTransform {
                field_path: "updatedAt".to_string(),
                set_to_server_value: ServerValue::RequestTime,
            }]
        );
        assert_eq!(writes[1].update_transforms[0].field_path, "markedAt");
        assert!(writes[0].update.field::<String>("updatedAt").is_none());

        let json = serde_json::to_value(&writes[0]).unwrap();
        assert_eq!(
            json["updateTransforms"],
            serde_json::json!([{"fieldPath": "updatedAt", "setToServerValue": "REQUEST_TIME"}])
        );
    }

    #[test]
    fn test_invalid_roll_numbers_rejected() {
        let mut bad = record();
        bad.roll_no = IdentityId::from("24/CS");
        assert!(presence_writes(ROOT, &bad).is_err());

        bad.roll_no = IdentityId::from("  ");
        assert!(presence_writes(ROOT, &bad).is_err());
    }
}
