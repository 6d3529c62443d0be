//! Fuzzy reconciliation of AP names across datasets.
//!
//! The geolocation survey and the client logs label the same APs slightly
//! differently (spacing, case, a stray digit). A target name is normalized with
//! [`ap_key`], looked up exactly, and on a miss compared against every key with
//! an Indel similarity ratio (`2 * LCS / (len_a + len_b)`). The best key is
//! accepted only if it reaches the cutoff.
//!
//! The fallback scan is linear in the number of keys per query. That is fine
//! for a campus inventory of a few hundred APs; larger keyspaces need an index
//! (n-gram or BK-tree) in front of it.

use std::collections::BTreeMap;

use log::{debug, warn};
use rapidfuzz::distance::indel;

use crate::error::{CampusError, Result};
use crate::quality::{ap_key, QualityMap};

/// Configuration for fuzzy reconciliation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct ReconcileConfig {
    /// Minimum similarity in (0, 1] for a fuzzy match to be accepted.
    /// Default: 0.8
    pub cutoff: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { cutoff: 0.8 }
    }
}

impl ReconcileConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.cutoff > 0.0 && self.cutoff <= 1.0) {
            return Err(CampusError::config("cutoff", format!("{} is outside (0, 1]", self.cutoff)));
        }
        Ok(())
    }
}

/// How a name was matched.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum MatchKind {
    Exact,
    Fuzzy { score: f64 },
}

/// A successful reconciliation against a keyed collection.
#[derive(Debug, Clone, PartialEq)]
pub struct NameMatch<'a, V> {
    pub key: &'a str,
    pub value: &'a V,
    pub kind: MatchKind,
}

/// Similarity ratio in [0, 1] between two names; 1.0 for identical strings.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    indel::normalized_similarity(a.chars(), b.chars())
}

/// Reconcile `target` against the keys of `keyed`.
///
/// Keys are expected to be normalized with [`ap_key`] already. Returns `None`
/// when no key reaches `cutoff`. Among equally similar keys the last in key
/// order wins.
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use campus_roaming::reconcile::{reconcile_name, MatchKind};
///
/// let mut keyed = BTreeMap::new();
/// keyed.insert("BUILD-A".to_string(), 42.0);
///
/// let m = reconcile_name("build-a", &keyed, 0.8).unwrap();
/// assert_eq!(m.kind, MatchKind::Exact);
///
/// let m = reconcile_name("BUILD-A1", &keyed, 0.8).unwrap();
/// assert_eq!(*m.value, 42.0);
///
/// assert!(reconcile_name("GYM", &keyed, 0.8).is_none());
/// ```
pub fn reconcile_name<'a, V>(
    target: &str,
    keyed: &'a BTreeMap<String, V>,
    cutoff: f64,
) -> Option<NameMatch<'a, V>> {
    let wanted = ap_key(target);

    if let Some((key, value)) = keyed.get_key_value(wanted.as_str()) {
        return Some(NameMatch { key, value, kind: MatchKind::Exact });
    }

    let mut best: Option<(&'a String, &'a V, f64)> = None;
    for (key, value) in keyed {
        let score = name_similarity(&wanted, key);
        if best.map_or(true, |(_, _, s)| score >= s) {
            best = Some((key, value, score));
        }
    }

    match best {
        Some((key, value, score)) if score >= cutoff => {
            debug!("Fuzzy matched {:?} -> {:?} ({:.3})", target, key, score);
            Some(NameMatch { key, value, kind: MatchKind::Fuzzy { score } })
        }
        _ => None,
    }
}

/// Connection quality for a target AP name, or `None` if nothing matches.
pub fn reconcile_quality(target: &str, quality: &QualityMap, config: &ReconcileConfig) -> Option<f64> {
    reconcile_name(target, quality, config.cutoff).map(|m| m.value.connection_quality)
}

/// One reconciled target name.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ReconciledName {
    pub target: String,
    pub matched_key: String,
    pub connection_quality: f64,
    pub kind: MatchKind,
}

/// Outcome of reconciling a batch of names.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ReconcileReport {
    pub matched: Vec<ReconciledName>,
    pub unmatched: Vec<String>,
}

impl ReconcileReport {
    pub fn exact_count(&self) -> usize {
        self.matched.iter().filter(|m| m.kind == MatchKind::Exact).count()
    }

    pub fn fuzzy_count(&self) -> usize {
        self.matched.len() - self.exact_count()
    }
}

/// Reconcile every target name against the quality map.
pub fn reconcile_all<'t>(
    targets: impl IntoIterator<Item = &'t str>,
    quality: &QualityMap,
    config: &ReconcileConfig,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for target in targets {
        match reconcile_name(target, quality, config.cutoff) {
            Some(m) => report.matched.push(ReconciledName {
                target: target.to_string(),
                matched_key: m.key.to_string(),
                connection_quality: m.value.connection_quality,
                kind: m.kind,
            }),
            None => report.unmatched.push(target.to_string()),
        }
    }

    if !report.unmatched.is_empty() {
        warn!(
            "{} of {} AP names have no quality match at cutoff {}",
            report.unmatched.len(),
            report.matched.len() + report.unmatched.len(),
            config.cutoff
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::ApQuality;

    fn quality_map(entries: &[(&str, f64)]) -> QualityMap {
        entries
            .iter()
            .map(|(name, q)| {
                (
                    name.to_string(),
                    ApQuality {
                        ap_name: name.to_string(),
                        avg_signal_db: -60.0,
                        avg_signal_strength: 3.0,
                        avg_speed: 50.0,
                        connection_quality: *q,
                        samples: 1,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_exact_match_short_circuits() {
        let quality = quality_map(&[("LIB-1", 100.0), ("LIB-11", 50.0)]);
        let m = reconcile_name(" lib-1 ", &quality, 0.99).unwrap();
        assert_eq!(m.key, "LIB-1");
        assert_eq!(m.kind, MatchKind::Exact);
    }

    #[test]
    fn test_trailing_digit_matches_above_cutoff() {
        let quality = quality_map(&[("BUILD-A", 77.0)]);
        let score = name_similarity("BUILD-A1", "BUILD-A");
        assert!(score >= 0.8);

        let config = ReconcileConfig::default();
        assert_eq!(reconcile_quality("BUILD-A1", &quality, &config), Some(77.0));
    }

    #[test]
    fn test_no_match_below_cutoff() {
        let quality = quality_map(&[("BUILD-A", 77.0)]);
        let config = ReconcileConfig { cutoff: 0.95 };
        assert_eq!(reconcile_quality("BUILD-A1", &quality, &config), None);
        assert_eq!(reconcile_quality("ZZZ", &quality, &ReconcileConfig::default()), None);
    }

    #[test]
    fn test_best_key_wins() {
        let quality = quality_map(&[("SCI-AULA-12", 1.0), ("SCI-AULA-1", 2.0), ("LIB-AULA-1", 3.0)]);
        let m = reconcile_name("SCI-AULA-1B", &quality, 0.8).unwrap();
        assert_eq!(m.key, "SCI-AULA-1");
    }

    #[test]
    fn test_tied_scores_pick_last_key() {
        let quality = quality_map(&[("ABCDX", 1.0), ("ABCDY", 2.0)]);
        assert_eq!(name_similarity("ABCDE", "ABCDX"), name_similarity("ABCDE", "ABCDY"));

        let m = reconcile_name("ABCDE", &quality, 0.8).unwrap();
        assert_eq!(m.key, "ABCDY");
        assert!(matches!(m.kind, MatchKind::Fuzzy { .. }));
    }

    #[test]
    fn test_empty_keyspace() {
        let quality = QualityMap::new();
        assert!(reconcile_name("ANY", &quality, 0.5).is_none());
    }

    #[test]
    fn test_batch_report() {
        let quality = quality_map(&[("LIB-1", 10.0), ("BUILD-A", 20.0)]);
        let report = reconcile_all(["lib-1", "BUILD-A1", "POOL"], &quality, &ReconcileConfig::default());

        assert_eq!(report.exact_count(), 1);
        assert_eq!(report.fuzzy_count(), 1);
        assert_eq!(report.unmatched, vec!["POOL".to_string()]);
        assert_eq!(report.matched[1].matched_key, "BUILD-A");
    }

    #[test]
    fn test_cutoff_validation() {
        assert!(ReconcileConfig { cutoff: 0.0 }.validate().is_err());
        assert!(ReconcileConfig { cutoff: 1.5 }.validate().is_err());
        assert!(ReconcileConfig { cutoff: f64::NAN }.validate().is_err());
        assert!(ReconcileConfig { cutoff: 1.0 }.validate().is_ok());
    }
}
