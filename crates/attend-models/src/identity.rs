//! Identity types.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Canonical identity identifier (a student's roll number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl IdentityId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IdentityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IdentityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for IdentityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A known person in the class roster.
///
/// Roster files use the `rollNo` / `name` keys written by the provisioning
/// tooling; `id` / `displayName` are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IdentityRecord {
    #[serde(rename = "rollNo", alias = "id")]
    pub id: IdentityId,
    #[serde(rename = "name", alias = "displayName")]
    pub display_name: String,
}

impl IdentityRecord {
    /// Create a new identity record.
    pub fn new(id: impl Into<IdentityId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_record_roster_keys() {
        let json = r#"[{"rollNo": "24CS071", "name": "HARI VIGNESH"}]"#;
        let records: Vec<IdentityRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].id.as_str(), "24CS071");
        assert_eq!(records[0].display_name, "HARI VIGNESH");
    }

    #[test]
    fn test_identity_record_alias_keys() {
        let json = r#"{"id": "24CS072", "displayName": "HARINATH S"}"#;
        let record: IdentityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record, IdentityRecord::new("24CS072", "HARINATH S"));
    }

    #[test]
    fn test_identity_id_serializes_as_string() {
        let id = IdentityId::from("24CS073");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"24CS073\"");
    }
}
