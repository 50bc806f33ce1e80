//! Known-face gallery and its loader.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::name_mapping::{load_overrides, MappingReport, NameMapping};
use crate::registry::IdentityRegistry;

/// Distance threshold used when the blob does not carry one.
pub const DEFAULT_THRESHOLD: f32 = 0.40;

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

/// On-disk gallery format.
#[derive(Debug, Deserialize)]
struct GalleryBlob {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default = "default_threshold")]
    threshold: f32,
}

/// One known embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub embedding: Vec<f32>,
    pub label: String,
}

/// Unit-normalized known embeddings and their labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
    threshold: f32,
    dimension: usize,
}

impl Default for Gallery {
    fn default() -> Self {
        Self::empty()
    }
}

impl Gallery {
    /// No known faces: detection only.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            threshold: DEFAULT_THRESHOLD,
            dimension: 0,
        }
    }

    /// Build from parallel rows and labels, normalizing every row.
    pub fn from_parts(embeddings: Vec<Vec<f32>>, names: Vec<String>, threshold: f32) -> EngineResult<Self> {
        if embeddings.len() != names.len() {
            return Err(EngineError::gallery(format!(
                "{} embeddings but {} names",
                embeddings.len(),
                names.len()
            )));
        }
        if !threshold.is_finite() {
            return Err(EngineError::gallery("threshold is not a number"));
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        if let Some(row) = embeddings.iter().position(|e| e.len() != dimension) {
            return Err(EngineError::gallery(format!(
                "row {} has dimension {}, expected {}",
                row,
                embeddings[row].len(),
                dimension
            )));
        }
        if dimension == 0 && !embeddings.is_empty() {
            return Err(EngineError::gallery("embeddings are empty vectors"));
        }

        let entries = embeddings
            .into_iter()
            .zip(names)
            .map(|(embedding, label)| GalleryEntry {
                embedding: normalized(embedding),
                label,
            })
            .collect();

        Ok(Self {
            entries,
            threshold,
            dimension,
        })
    }

    /// Parse the JSON blob `{embeddings, names, threshold}`.
    pub fn from_json(raw: &str) -> EngineResult<Self> {
        let blob: GalleryBlob = serde_json::from_str(raw)
            .map_err(|e| EngineError::gallery(format!("invalid blob: {}", e)))?;
        Self::from_parts(blob.embeddings, blob.names, blob.threshold)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Base distance threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Embedding length, 0 for an empty gallery.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    /// Distinct labels, sorted.
    pub fn unique_labels(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }
}

/// Scale to unit length. Zero vectors are returned as-is.
pub fn normalized(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

/// Loads the gallery and rebuilds its name mapping at every session start.
#[derive(Debug, Clone)]
pub struct GalleryLoader {
    gallery_path: PathBuf,
    name_mapping_path: PathBuf,
    registry: Arc<IdentityRegistry>,
}

impl GalleryLoader {
    pub fn new(
        gallery_path: impl Into<PathBuf>,
        name_mapping_path: impl Into<PathBuf>,
        registry: Arc<IdentityRegistry>,
    ) -> Self {
        Self {
            gallery_path: gallery_path.into(),
            name_mapping_path: name_mapping_path.into(),
            registry,
        }
    }

    pub fn from_config(config: &EngineConfig, registry: Arc<IdentityRegistry>) -> Self {
        Self::new(&config.gallery_path, &config.name_mapping_path, registry)
    }

    pub fn gallery_path(&self) -> &Path {
        &self.gallery_path
    }

    /// Whether a gallery blob is present on disk.
    pub fn gallery_exists(&self) -> bool {
        self.gallery_path.exists()
    }

    /// Load the gallery and its mapping.
    pub fn load(&self) -> EngineResult<(Gallery, NameMapping)> {
        let (gallery, mapping, _) = self.load_with_report()?;
        Ok((gallery, mapping))
    }

    /// [`load`](Self::load) on the blocking pool, so file reads never stall
    /// a runtime worker thread.
    pub async fn load_async(&self) -> EngineResult<(Gallery, NameMapping)> {
        let loader = self.clone();
        tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| EngineError::gallery(format!("Gallery load task failed: {}", e)))?
    }

    /// Load the gallery and its mapping, with the auto-mapping report.
    ///
    /// Overrides are re-read on every call. A missing blob yields an empty
    /// gallery and an override-only mapping.
    pub fn load_with_report(&self) -> EngineResult<(Gallery, NameMapping, MappingReport)> {
        let overrides = load_overrides(&self.name_mapping_path);

        if !self.gallery_exists() {
            warn!(path = %self.gallery_path.display(), "Gallery not found, running detection only");
            return Ok((
                Gallery::empty(),
                NameMapping::with_overrides(self.registry.clone(), overrides),
                MappingReport::default(),
            ));
        }

        let raw = std::fs::read_to_string(&self.gallery_path).map_err(|e| {
            EngineError::gallery(format!("{}: {}", self.gallery_path.display(), e))
        })?;
        let gallery = Gallery::from_json(&raw)?;

        let labels: Vec<&str> = gallery.entries.iter().map(|e| e.label.as_str()).collect();
        let (mapping, report) = NameMapping::build(self.registry.clone(), overrides, &labels);

        let unique = gallery.unique_labels();
        info!(
            embeddings = gallery.len(),
            people = unique.len(),
            threshold = gallery.threshold(),
            labels = ?unique,
            "Loaded gallery"
        );
        if !report.is_complete() {
            warn!(unresolved = ?report.unresolved, "Some gallery labels have no identity");
        }

        Ok((gallery, mapping, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attend_models::{IdentityId, IdentityRecord};
    use std::fs;

    fn registry() -> Arc<IdentityRegistry> {
        Arc::new(IdentityRegistry::from_records(vec![
            IdentityRecord::new("24CS001", "ALICE"),
            IdentityRecord::new("24CS002", "BOB"),
        ]))
    }

    #[test]
    fn test_rows_are_normalized() {
        let gallery = Gallery::from_parts(
            vec![vec![3.0, 4.0], vec![0.0, 0.0]],
            vec!["alice".into(), "bob".into()],
            0.4,
        )
        .unwrap();
        assert_eq!(gallery.entries()[0].embedding, vec![0.6, 0.8]);
        // zero rows stay zero
        assert_eq!(gallery.entries()[1].embedding, vec![0.0, 0.0]);
        assert_eq!(gallery.dimension(), 2);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let err = Gallery::from_parts(vec![vec![1.0, 0.0]], vec![], 0.4).unwrap_err();
        assert!(matches!(err, EngineError::Gallery(_)));
    }

    #[test]
    fn test_inconsistent_dimensions_rejected() {
        let err = Gallery::from_parts(
            vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
            vec!["a".into(), "b".into()],
            0.4,
        )
        .unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_threshold_defaults() {
        let gallery = Gallery::from_json(r#"{"embeddings": [[1.0, 0.0]], "names": ["alice"]}"#).unwrap();
        assert_eq!(gallery.threshold(), DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_missing_blob_is_detect_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("name_mapping.json"), r#"{"al": "24CS001"}"#).unwrap();
        let loader = GalleryLoader::new(
            dir.path().join("gallery.json"),
            dir.path().join("name_mapping.json"),
            registry(),
        );

        let (gallery, mapping) = loader.load().unwrap();
        assert!(gallery.is_empty());
        assert!(!loader.gallery_exists());
        assert_eq!(mapping.override_count(), 1);
        assert_eq!(mapping.resolve("AL"), Some(IdentityId::from("24CS001")));
    }

    #[test]
    fn test_load_builds_mapping_and_rereads_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let gallery_path = dir.path().join("gallery.json");
        let mapping_path = dir.path().join("name_mapping.json");
        fs::write(
            &gallery_path,
            r#"{"embeddings": [[1,0],[0.9,0.1],[0,1]], "names": ["alice","alice","bobby"], "threshold": 0.35}"#,
        )
        .unwrap();
        let loader = GalleryLoader::new(&gallery_path, &mapping_path, registry());

        let (gallery, mapping, report) = loader.load_with_report().unwrap();
        assert_eq!(gallery.len(), 3);
        assert_eq!(gallery.threshold(), 0.35);
        assert_eq!(mapping.resolve("alice"), Some(IdentityId::from("24CS001")));
        assert_eq!(report.mapped.len() + report.unresolved.len(), 2);

        fs::write(&mapping_path, r#"{"bobby": "24CS002"}"#).unwrap();
        let (_, mapping, report) = loader.load_with_report().unwrap();
        assert_eq!(mapping.resolve("bobby"), Some(IdentityId::from("24CS002")));
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_load_async_reads_files_off_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let gallery_path = dir.path().join("gallery.json");
        let mapping_path = dir.path().join("name_mapping.json");
        fs::write(&gallery_path, r#"{"embeddings": [[0,1]], "names": ["bob smith"]}"#).unwrap();
        fs::write(&mapping_path, r#"{"bob smith": "24CS002"}"#).unwrap();
        let loader = GalleryLoader::new(&gallery_path, &mapping_path, registry());

        let (gallery, mapping) = loader.load_async().await.unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(mapping.resolve("Bob Smith"), Some(IdentityId::from("24CS002")));

        fs::write(&gallery_path, "{not json").unwrap();
        assert!(matches!(loader.load_async().await, Err(EngineError::Gallery(_))));
    }

    #[test]
    fn test_corrupt_blob_is_gallery_error() {
        let dir = tempfile::tempdir().unwrap();
        let gallery_path = dir.path().join("gallery.json");
        fs::write(&gallery_path, "{not json").unwrap();
        let loader = GalleryLoader::new(&gallery_path, dir.path().join("m.json"), registry());
        assert!(matches!(loader.load(), Err(EngineError::Gallery(_))));
    }
}
