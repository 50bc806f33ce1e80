//! Adaptive-threshold matching of query embeddings against the gallery.

use std::collections::HashMap;

use tracing::trace;

use crate::gallery::{normalized, Gallery};

/// Label reported for rejected queries.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Acceptance constants for identification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverPolicy {
    /// Threshold used instead of the gallery's when the best match is clear
    pub relaxed_threshold: f32,
    /// Margin needed to use the relaxed threshold
    pub relax_margin: f32,
    /// Margin needed for any acceptance
    pub min_margin: f32,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            relaxed_threshold: 0.52,
            relax_margin: 0.12,
            min_margin: 0.04,
        }
    }
}

impl ResolverPolicy {
    /// Create policy from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            relaxed_threshold: std::env::var("RESOLVER_RELAXED_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.relaxed_threshold),
            relax_margin: std::env::var("RESOLVER_RELAX_MARGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.relax_margin),
            min_margin: std::env::var("RESOLVER_MIN_MARGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_margin),
        }
    }

    /// Threshold in force for a best distance `d0` and margin.
    pub fn effective_threshold(&self, base: f32, d0: f32, margin: f32) -> f32 {
        if d0 < self.relaxed_threshold && margin >= self.relax_margin {
            self.relaxed_threshold
        } else {
            base
        }
    }

    /// Accept iff `d0` is under the effective threshold and leads `d1` by
    /// at least `min_margin`.
    pub fn accepts(&self, base: f32, d0: f32, d1: f32) -> bool {
        let margin = d1 - d0;
        d0 < self.effective_threshold(base, d0, margin) && margin >= self.min_margin
    }
}

/// Result of identifying one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    /// Gallery label, or `Unknown`
    pub label: String,
    /// `(1 - d0) * 100`, clamped to `[0, 100]`
    pub confidence: f32,
    /// Best per-label distance, if the gallery was consulted
    pub distance: Option<f32>,
}

impl Identification {
    pub fn unknown(confidence: f32, distance: Option<f32>) -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            confidence,
            distance,
        }
    }

    pub fn is_known(&self) -> bool {
        self.label != UNKNOWN_LABEL
    }
}

/// Matches queries against one loaded gallery.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    gallery: Gallery,
    policy: ResolverPolicy,
}

impl IdentityResolver {
    pub fn new(gallery: Gallery, policy: ResolverPolicy) -> Self {
        Self { gallery, policy }
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    /// Whether there is anything to match against.
    pub fn can_identify(&self) -> bool {
        !self.gallery.is_empty()
    }

    /// Best distance per unique label, ascending.
    pub fn ranked(&self, query: &[f32]) -> Vec<(&str, f32)> {
        if query.len() != self.gallery.dimension() {
            return Vec::new();
        }
        let query = normalized(query.to_vec());

        let mut best: HashMap<&str, f32> = HashMap::new();
        for entry in self.gallery.entries() {
            let dot: f32 = entry.embedding.iter().zip(&query).map(|(a, b)| a * b).sum();
            let dist = 1.0 - dot;
            best.entry(entry.label.as_str())
                .and_modify(|d| {
                    if dist < *d {
                        *d = dist;
                    }
                })
                .or_insert(dist);
        }

        let mut ranked: Vec<(&str, f32)> = best.into_iter().collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    pub fn identify(&self, query: &[f32]) -> Identification {
        if !self.can_identify() {
            return Identification::unknown(0.0, None);
        }
        if query.len() != self.gallery.dimension() {
            trace!(
                query = query.len(),
                gallery = self.gallery.dimension(),
                "Query dimension mismatch"
            );
            return Identification::unknown(0.0, None);
        }

        let ranked = self.ranked(query);
        let Some(&(best_label, d0)) = ranked.first() else {
            return Identification::unknown(0.0, None);
        };
        let d1 = ranked.get(1).map(|r| r.1).unwrap_or(1.0);
        let confidence = (1.0 - d0).clamp(0.0, 1.0) * 100.0;

        if self.policy.accepts(self.gallery.threshold(), d0, d1) {
            Identification {
                label: best_label.to_string(),
                confidence,
                distance: Some(d0),
            }
        } else {
            trace!(best = best_label, d0, d1, "Query rejected");
            Identification::unknown(confidence, Some(d0))
        }
    }
}
