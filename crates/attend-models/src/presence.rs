//! Presence records written to the attendance store.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;
use crate::session::SessionDate;

/// Attendance status written for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Present,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Present => "present",
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a presence record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceSource {
    #[default]
    Camera,
}

impl PresenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceSource::Camera => "camera",
        }
    }
}

impl fmt::Display for PresenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One identity marked present for one session date.
///
/// Stored at `attendance/{date}/records/{rollNo}`. Only these fields, plus a
/// store-assigned `updatedAt`, are written; other fields on an existing
/// record (e.g. an on-duty type) are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub date: SessionDate,
    pub roll_no: IdentityId,
    pub name: String,
    pub status: PresenceStatus,
    pub source: PresenceSource,
    /// Optional class label stamped on the day's summary document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_label: Option<String>,
}

impl PresenceRecord {
    /// Camera-sourced presence for `roll_no`.
    pub fn camera(date: SessionDate, roll_no: IdentityId, name: impl Into<String>) -> Self {
        Self {
            date,
            roll_no,
            name: name.into(),
            status: PresenceStatus::Present,
            source: PresenceSource::Camera,
            class_label: None,
        }
    }

    /// Attach a class label.
    pub fn with_class_label(mut self, label: Option<String>) -> Self {
        self.class_label = label.filter(|l| !l.trim().is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_record_defaults() {
        let date = SessionDate::parse("2026-02-20").unwrap();
        let record = PresenceRecord::camera(date, IdentityId::from("24CS071"), "HARI VIGNESH");
        assert_eq!(record.status, PresenceStatus::Present);
        assert_eq!(record.source, PresenceSource::Camera);
        assert!(record.class_label.is_none());
    }

    #[test]
    fn test_blank_class_label_is_dropped() {
        let date = SessionDate::parse("2026-02-20").unwrap();
        let record = PresenceRecord::camera(date, IdentityId::from("24CS071"), "HARI")
            .with_class_label(Some("  ".to_string()));
        assert!(record.class_label.is_none());
    }

    #[test]
    fn test_serialized_keys() {
        let date = SessionDate::parse("2026-02-20").unwrap();
        let record = PresenceRecord::camera(date, IdentityId::from("24CS071"), "HARI");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["rollNo"], "24CS071");
        assert_eq!(json["status"], "present");
        assert_eq!(json["source"], "camera");
        assert!(json.get("classLabel").is_none());
    }
}
