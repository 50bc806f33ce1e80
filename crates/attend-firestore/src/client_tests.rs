//! Tests for Firestore client configuration and error mapping.

use std::time::Duration;

use serial_test::serial;

use crate::client::FirestoreConfig;
use crate::error::FirestoreError;

fn clear_env() {
    for key in [
        "GCP_PROJECT_ID",
        "FIREBASE_PROJECT_ID",
        "FIRESTORE_DATABASE_ID",
        "FIRESTORE_CONNECT_TIMEOUT_SECS",
        "FIRESTORE_TIMEOUT_SECS",
        "FIRESTORE_RETRY_BASE_MS",
        "FIRESTORE_RETRY_MAX_MS",
        "FIRESTORE_RETRY_MAX_ATTEMPTS",
    ] {
        std::env::remove_var(key);
    }
}

// =============================================================================
// Error mapping
// =============================================================================

#[test]
fn test_error_from_http_status_429() {
    let err = FirestoreError::from_http_status(429, "rate limited");
    assert!(matches!(err, FirestoreError::RateLimited(_)));
    assert!(err.is_retryable());
}

#[test]
fn test_error_from_http_status_5xx() {
    for code in [500u16, 502, 503] {
        let err = FirestoreError::from_http_status(code, "server");
        assert!(matches!(err, FirestoreError::ServerError(c, _) if c == code));
        assert!(err.is_retryable(), "{} should be retryable", code);
    }
}

#[test]
fn test_error_from_http_status_4xx_not_retryable() {
    let cases = [
        (400u16, "bad request"),
        (403, "forbidden"),
        (404, "not found"),
        (409, "conflict"),
    ];
    for (code, msg) in cases {
        let err = FirestoreError::from_http_status(code, msg);
        assert!(!err.is_retryable(), "{} should not be retryable", code);
    }
    assert!(matches!(
        FirestoreError::from_http_status(403, "x"),
        FirestoreError::PermissionDenied(_)
    ));
}

#[test]
fn test_error_http_status_getter() {
    assert_eq!(FirestoreError::RateLimited(1000).http_status(), Some(429));
    assert_eq!(
        FirestoreError::ServerError(502, "bad gateway".into()).http_status(),
        Some(502)
    );
    assert_eq!(FirestoreError::NotFound("doc".into()).http_status(), Some(404));
    assert_eq!(FirestoreError::config("x").http_status(), None);
}

#[test]
fn test_error_retry_after_ms() {
    assert_eq!(FirestoreError::RateLimited(5000).retry_after_ms(), Some(5000));
    assert_eq!(
        FirestoreError::ServerError(500, "error".into()).retry_after_ms(),
        None
    );
}

// =============================================================================
// Config
// =============================================================================

#[test]
#[serial]
fn test_config_requires_project_id() {
    clear_env();
    assert!(matches!(
        FirestoreConfig::from_env(),
        Err(FirestoreError::Config(_))
    ));
}

#[test]
#[serial]
fn test_config_empty_gcp_project_falls_back_to_firebase() {
    clear_env();
    std::env::set_var("GCP_PROJECT_ID", "");
    std::env::set_var("FIREBASE_PROJECT_ID", "smart-classroom");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.project_id, "smart-classroom");
    clear_env();
}

#[test]
#[serial]
fn test_config_prefers_gcp_project_id() {
    clear_env();
    std::env::set_var("GCP_PROJECT_ID", "gcp-project");
    std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.project_id, "gcp-project");
    clear_env();
}

#[test]
#[serial]
fn test_config_defaults() {
    clear_env();
    std::env::set_var("GCP_PROJECT_ID", "test");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.database_id, "(default)");
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(
        config.documents_root(),
        "projects/test/databases/(default)/documents"
    );
    clear_env();
}

#[test]
#[serial]
fn test_config_parses_overrides() {
    clear_env();
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_DATABASE_ID", "attendance-db");
    std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "15");
    std::env::set_var("FIRESTORE_RETRY_BASE_MS", "50");
    std::env::set_var("FIRESTORE_RETRY_MAX_MS", "2000");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.database_id, "attendance-db");
    assert_eq!(config.connect_timeout, Duration::from_secs(15));
    assert_eq!(config.retry.base_delay_ms, 50);
    assert_eq!(config.retry.max_delay_ms, 2000);
    clear_env();
}

#[test]
#[serial]
fn test_config_ignores_invalid_numbers() {
    clear_env();
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "not-a-number");
    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    clear_env();
}

#[test]
#[serial]
fn test_config_rejects_inverted_retry_delays() {
    clear_env();
    std::env::set_var("GCP_PROJECT_ID", "test");
    std::env::set_var("FIRESTORE_RETRY_BASE_MS", "9000");
    std::env::set_var("FIRESTORE_RETRY_MAX_MS", "100");
    assert!(FirestoreConfig::from_env().is_err());
    clear_env();
}
