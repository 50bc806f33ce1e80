//! Known identities (the class roster).

use std::collections::HashMap;
use std::path::Path;

use attend_models::{IdentityId, IdentityRecord};
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};

/// Immutable set of known identities, built once at startup.
///
/// Both the id and the display name of every record are lookup keys,
/// upper-cased so lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    records: Vec<IdentityRecord>,
    keys: Vec<(String, IdentityId)>,
    by_key: HashMap<String, IdentityId>,
    names: HashMap<IdentityId, String>,
}

impl IdentityRegistry {
    pub fn from_records(records: impl IntoIterator<Item = IdentityRecord>) -> Self {
        let mut registry = Self::default();
        for record in records {
            if registry.names.contains_key(&record.id) {
                warn!(roll_no = %record.id, "Duplicate identity in roster, keeping the first");
                continue;
            }
            for key in [record.id.as_str(), record.display_name.as_str()] {
                let key = normalize_key(key);
                if key.is_empty() || registry.by_key.contains_key(&key) {
                    continue;
                }
                registry.by_key.insert(key.clone(), record.id.clone());
                registry.keys.push((key, record.id.clone()));
            }
            registry
                .names
                .insert(record.id.clone(), record.display_name.clone());
            registry.records.push(record);
        }
        registry
    }

    /// Load a roster file: a JSON array of `{rollNo, name}` objects.
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::config(format!("Roster {}: {}", path.display(), e)))?;
        let records: Vec<IdentityRecord> = serde_json::from_str(&raw)?;
        let registry = Self::from_records(records);
        info!(count = registry.len(), roster = %path.display(), "Loaded identity registry");
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[IdentityRecord] {
        &self.records
    }

    pub fn contains(&self, id: &IdentityId) -> bool {
        self.names.contains_key(id)
    }

    pub fn display_name(&self, id: &IdentityId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Exact, case-insensitive lookup by id or display name.
    pub fn lookup(&self, key: &str) -> Option<&IdentityId> {
        self.by_key.get(&normalize_key(key))
    }

    /// Upper-cased lookup keys in roster order.
    pub fn keys(&self) -> impl Iterator<Item = (&str, &IdentityId)> {
        self.keys.iter().map(|(k, id)| (k.as_str(), id))
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn roster() -> IdentityRegistry {
        IdentityRegistry::from_records(vec![
            IdentityRecord::new("24CS071", "HARI VIGNESH"),
            IdentityRecord::new("24CS072", "KEERTHI AANAND K.S"),
        ])
    }

    #[test]
    fn test_lookup_by_id_and_name_case_insensitive() {
        let registry = roster();
        assert_eq!(registry.lookup("24cs071"), Some(&IdentityId::from("24CS071")));
        assert_eq!(registry.lookup(" hari vignesh "), Some(&IdentityId::from("24CS071")));
        assert!(registry.lookup("nobody").is_none());
    }

    #[test]
    fn test_display_name() {
        let registry = roster();
        assert_eq!(
            registry.display_name(&IdentityId::from("24CS072")),
            Some("KEERTHI AANAND K.S")
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let registry = IdentityRegistry::from_records(vec![
            IdentityRecord::new("24CS071", "HARI VIGNESH"),
            IdentityRecord::new("24CS071", "SOMEONE ELSE"),
        ]);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("someone else").is_none());
    }

    #[test]
    fn test_keys_in_roster_order() {
        let registry = roster();
        let keys: Vec<&str> = registry.keys().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["24CS071", "HARI VIGNESH", "24CS072", "KEERTHI AANAND K.S"]);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"rollNo": "24CS001", "name": "ALICE"}}]"#).unwrap();

        let registry = IdentityRegistry::from_json_file(file.path()).unwrap();
        assert!(registry.contains(&IdentityId::from("24CS001")));
    }

    #[test]
    fn test_from_missing_file_is_config_error() {
        let err = IdentityRegistry::from_json_file("/nonexistent/roster.json").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
