//! Resolution of raw gallery labels to canonical identity ids.
//!
//! Two layers, both keyed by the lower-cased label:
//! - overrides: a hand-maintained JSON object, authoritative
//! - auto: rebuilt from the gallery's unique labels on every load
//!
//! Anything neither layer knows falls through to direct registry matching.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use attend_models::IdentityId;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::registry::IdentityRegistry;
use crate::similarity;

/// Minimum similarity ratio for a fuzzy match.
pub const MIN_SIMILARITY: f64 = 0.60;

/// Required lead of the best fuzzy match over the runner-up.
pub const MIN_SIMILARITY_LEAD: f64 = 0.10;

/// How a label was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Override,
    Exact,
    FirstWord,
    MultiWordPrefix,
    Similarity,
}

/// Outcome of matching one label against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelMatch {
    Matched(IdentityId, MatchTier),
    /// Several identities fit equally well; needs an override
    Ambiguous(Vec<IdentityId>),
    NoMatch,
}

/// What an auto-layer build did with each gallery label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingReport {
    pub mapped: BTreeMap<String, (IdentityId, MatchTier)>,
    pub ambiguous: BTreeMap<String, Vec<IdentityId>>,
    /// Labels with no identity, ambiguous ones included
    pub unresolved: Vec<String>,
}

impl MappingReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Label to identity mapping for one gallery load.
#[derive(Debug, Clone)]
pub struct NameMapping {
    registry: Arc<IdentityRegistry>,
    overrides: HashMap<String, IdentityId>,
    auto: HashMap<String, IdentityId>,
}

impl NameMapping {
    /// Mapping with no override or auto entries.
    pub fn new(registry: Arc<IdentityRegistry>) -> Self {
        Self {
            registry,
            overrides: HashMap::new(),
            auto: HashMap::new(),
        }
    }

    /// Overrides only, as used when there is no gallery.
    pub fn with_overrides(registry: Arc<IdentityRegistry>, overrides: HashMap<String, IdentityId>) -> Self {
        Self {
            registry,
            overrides,
            auto: HashMap::new(),
        }
    }

    /// Build the auto layer for `labels` on top of `overrides`.
    pub fn build<S: AsRef<str>>(
        registry: Arc<IdentityRegistry>,
        overrides: HashMap<String, IdentityId>,
        labels: &[S],
    ) -> (Self, MappingReport) {
        let unique: BTreeSet<&str> = labels
            .iter()
            .map(|l| l.as_ref().trim())
            .filter(|l| !l.is_empty())
            .collect();

        let mut auto = HashMap::new();
        let mut report = MappingReport::default();

        for label in unique {
            let lower = label.to_lowercase();
            if let Some(id) = overrides.get(&lower) {
                report
                    .mapped
                    .insert(label.to_string(), (id.clone(), MatchTier::Override));
                continue;
            }

            match match_label(&registry, label) {
                LabelMatch::Matched(id, tier) => {
                    info!(
                        label = %label,
                        roll_no = %id,
                        name = registry.display_name(&id).unwrap_or(id.as_str()),
                        tier = ?tier,
                        "Label auto-mapped"
                    );
                    auto.insert(lower, id.clone());
                    report.mapped.insert(label.to_string(), (id, tier));
                }
                LabelMatch::Ambiguous(candidates) => {
                    let err = EngineError::MappingAmbiguity {
                        label: label.to_string(),
                        candidates: candidates.clone(),
                    };
                    warn!(error = %err, "Add an override to the name mapping file");
                    report.ambiguous.insert(label.to_string(), candidates);
                    report.unresolved.push(label.to_string());
                }
                LabelMatch::NoMatch => {
                    warn!(label = %label, "No identity match for label; add an override to the name mapping file");
                    report.unresolved.push(label.to_string());
                }
            }
        }

        (
            Self {
                registry,
                overrides,
                auto,
            },
            report,
        )
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    pub fn auto_count(&self) -> usize {
        self.auto.len()
    }

    /// Resolve a raw label to an identity.
    ///
    /// Order: override, auto, exact key, unique multi-word prefix,
    /// unique first-word prefix.
    pub fn resolve(&self, label: &str) -> Option<IdentityId> {
        let raw = label.trim();
        if raw.is_empty() {
            return None;
        }
        let lower = raw.to_lowercase();
        if let Some(id) = self.overrides.get(&lower) {
            return Some(id.clone());
        }
        if let Some(id) = self.auto.get(&lower) {
            return Some(id.clone());
        }

        let key = raw.to_uppercase();
        if let Some(id) = self.registry.lookup(&key) {
            return Some(id.clone());
        }
        if let Some(id) = unique(multi_word_prefix(&self.registry, &key)) {
            return Some(id);
        }
        if let Some(id) = unique(first_word_prefix(&self.registry, &key)) {
            return Some(id);
        }

        debug!(label = %raw, "No identity mapping for label");
        None
    }
}

/// The auto-layer cascade for one label.
///
/// Exact key, then first-word prefix, then multi-word prefix, then
/// similarity. An ambiguous first-word prefix ends the cascade so that a
/// shared first name is never settled by a fuzzy score.
pub fn match_label(registry: &IdentityRegistry, label: &str) -> LabelMatch {
    let key = label.trim().to_uppercase();
    if key.is_empty() {
        return LabelMatch::NoMatch;
    }

    if let Some(id) = registry.lookup(&key) {
        return LabelMatch::Matched(id.clone(), MatchTier::Exact);
    }

    let first = first_word_prefix(registry, &key);
    match first.len() {
        0 => {}
        1 => return LabelMatch::Matched(first[0].clone(), MatchTier::FirstWord),
        _ => return LabelMatch::Ambiguous(first),
    }

    if let Some(id) = unique(multi_word_prefix(registry, &key)) {
        return LabelMatch::Matched(id, MatchTier::MultiWordPrefix);
    }

    let mut scores: Vec<(f64, &IdentityId)> = registry
        .keys()
        .map(|(k, id)| (similarity::ratio(&key, &k.replace('.', " ")), id))
        .collect();
    scores.sort_by(|a, b| b.0.total_cmp(&a.0));
    if let Some(&(top, id)) = scores.first() {
        let runner_up = scores.get(1).map(|s| s.0).unwrap_or(0.0);
        if top >= MIN_SIMILARITY && top - runner_up >= MIN_SIMILARITY_LEAD {
            return LabelMatch::Matched(id.clone(), MatchTier::Similarity);
        }
    }

    LabelMatch::NoMatch
}

/// Read the override file. Missing or unreadable files yield no overrides.
///
/// Keys starting with `_` are comments. Keys are trimmed and lower-cased,
/// values trimmed; empty values are skipped.
pub fn load_overrides(path: impl AsRef<Path>) -> HashMap<String, IdentityId> {
    let path = path.as_ref();
    if !path.exists() {
        return HashMap::new();
    }

    let raw: HashMap<String, serde_json::Value> = match std::fs::read_to_string(path)
        .map_err(EngineError::from)
        .and_then(|s| serde_json::from_str(&s).map_err(EngineError::from))
    {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Name mapping read error");
            return HashMap::new();
        }
    };

    let overrides: HashMap<String, IdentityId> = raw
        .into_iter()
        .filter(|(k, _)| !k.starts_with('_'))
        .filter_map(|(k, v)| {
            let value = v.as_str()?.trim();
            if value.is_empty() {
                return None;
            }
            Some((k.trim().to_lowercase(), IdentityId::from(value)))
        })
        .collect();

    if !overrides.is_empty() {
        info!(count = overrides.len(), "Loaded manual name overrides");
    }
    overrides
}

/// Distinct ids whose key, with `.` read as a space, has `key` as its first word.
fn first_word_prefix(registry: &IdentityRegistry, key: &str) -> Vec<IdentityId> {
    let mut ids: Vec<IdentityId> = Vec::new();
    for (k, id) in registry.keys() {
        let spaced = k.replace('.', " ");
        if spaced.split_whitespace().next() == Some(key) && !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids
}

/// Distinct ids whose key starts with a label of two or more words.
fn multi_word_prefix(registry: &IdentityRegistry, key: &str) -> Vec<IdentityId> {
    let words: Vec<&str> = key.split_whitespace().collect();
    if words.len() < 2 {
        return Vec::new();
    }
    let prefix = words.join(" ");
    let mut ids: Vec<IdentityId> = Vec::new();
    for (k, id) in registry.keys() {
        if k.replace('.', " ").starts_with(&prefix) && !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids
}

fn unique(mut ids: Vec<IdentityId>) -> Option<IdentityId> {
    if ids.len() == 1 {
        ids.pop()
    } else {
        None
    }
}
