//! Firestore integration tests.

use attend_firestore::{FirestoreClient, FromFirestoreValue, PresenceRepository};
use attend_models::{IdentityId, PresenceRecord, SessionDate};

/// Test Firestore connection.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_firestore_connection() {
    dotenvy::dotenv().ok();

    let client = FirestoreClient::from_env()
        .await
        .expect("Failed to create Firestore client");

    // Missing documents come back as None rather than an error
    let result = client.get_document("_health", "_check").await;
    assert!(result.is_ok(), "Unexpected error: {:?}", result.err());
}

/// Committing the same presence twice leaves one present record.
#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_presence_commit_is_idempotent() {
    dotenvy::dotenv().ok();

    let client = FirestoreClient::from_env()
        .await
        .expect("Failed to create Firestore client");
    let repo = PresenceRepository::new(client);

    let date = SessionDate::parse("2000-01-01").unwrap();
    let id = IdentityId::from("ITEST001");
    let record = PresenceRecord::camera(date, id.clone(), "INTEGRATION TEST")
        .with_class_label(Some("integration".to_string()));

    repo.commit(&record).await.expect("First commit failed");
    repo.commit(&record).await.expect("Second commit failed");

    let doc = repo
        .get(&date, &id)
        .await
        .expect("Failed to read record")
        .expect("Record missing after commit");
    let fields = doc.fields.expect("Record has no fields");

    let status = fields.get("status").and_then(String::from_firestore_value);
    assert_eq!(status.as_deref(), Some("present"));
    let roll_no = fields.get("rollNo").and_then(String::from_firestore_value);
    assert_eq!(roll_no.as_deref(), Some("ITEST001"));
}
