//! # Connection Quality
//!
//! Per-AP averages of signal level, signal-strength class and link speed,
//! combined into a single heuristic score:
//!
//! ```text
//! connection_quality = -avg_signal_db + avg_signal_strength + avg_speed
//! ```
//!
//! The score is a plain sum with no weighting or normalization. Signal dBm is
//! negated because a more negative reading is worse. Only events carrying all
//! three metrics contribute; an AP without any such event has no score.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Instant;

use log::info;

use crate::ClientEvent;

/// Aggregated quality metrics for one AP.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ApQuality {
    /// Normalized AP name (see [`ap_key`])
    pub ap_name: String,
    pub avg_signal_db: f64,
    pub avg_signal_strength: f64,
    pub avg_speed: f64,
    pub connection_quality: f64,
    /// Number of events that contributed
    pub samples: usize,
}

/// Quality records keyed by normalized AP name.
pub type QualityMap = BTreeMap<String, ApQuality>;

/// Normalize an AP display name into a quality key: all whitespace removed,
/// uppercased.
///
/// ```
/// use campus_roaming::quality::ap_key;
/// assert_eq!(ap_key("  lib 1-a "), "LIB1-A");
/// ```
pub fn ap_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Interpret a raw metric value. Non-numeric or non-finite input is missing.
pub fn coerce_metric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to 2 decimals, halves to even (`-0.125` becomes `-0.12`).
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[derive(Default)]
struct MetricSums {
    signal_db: f64,
    signal_strength: f64,
    speed: f64,
    count: usize,
}

/// Compute quality records for every AP with at least one complete event.
///
/// # Example
/// ```
/// use campus_roaming::ClientEvent;
/// use campus_roaming::quality::score_connection_quality;
///
/// let events = vec![
///     ClientEvent::new(1, "c1", "s1").with_ap_name("LIB-1").with_metrics(Some(-70.0), Some(3.0), Some(50.0)),
///     ClientEvent::new(2, "c2", "s1").with_ap_name("LIB-1").with_metrics(Some(-50.0), Some(4.0), Some(60.0)),
/// ];
///
/// let quality = score_connection_quality(&events);
/// let lib = &quality["LIB-1"];
/// assert_eq!(lib.avg_signal_db, -60.0);
/// assert!((lib.connection_quality - 118.5).abs() < 1e-9);
/// ```
pub fn score_connection_quality(events: &[ClientEvent]) -> QualityMap {
    let start = Instant::now();
    let mut sums: BTreeMap<String, MetricSums> = BTreeMap::new();
    let mut skipped = 0usize;

    for event in events {
        let (Some(db), Some(strength), Some(speed)) = (
            finite(event.signal_db),
            finite(event.signal_strength),
            finite(event.speed),
        ) else {
            skipped += 1;
            continue;
        };

        let key = ap_key(&event.ap_name);
        if key.is_empty() {
            skipped += 1;
            continue;
        }

        let entry = sums.entry(key).or_default();
        entry.signal_db += db;
        entry.signal_strength += strength;
        entry.speed += speed;
        entry.count += 1;
    }

    let quality: QualityMap = sums
        .into_iter()
        .map(|(key, s)| {
            let n = s.count as f64;
            let avg_signal_db = round2(s.signal_db / n);
            let avg_signal_strength = round2(s.signal_strength / n);
            let avg_speed = round2(s.speed / n);
            let record = ApQuality {
                ap_name: key.clone(),
                avg_signal_db,
                avg_signal_strength,
                avg_speed,
                connection_quality: -avg_signal_db + avg_signal_strength + avg_speed,
                samples: s.count,
            };
            (key, record)
        })
        .collect();

    info!(
        "Scored {} APs from {} events ({} skipped for missing metrics or name) in {:?}",
        quality.len(),
        events.len(),
        skipped,
        start.elapsed()
    );

    quality
}

fn by_quality(a: &ApQuality, b: &ApQuality) -> Ordering {
    a.connection_quality
        .total_cmp(&b.connection_quality)
        .then_with(|| a.ap_name.cmp(&b.ap_name))
}

/// The `n` APs with the lowest connection quality, worst first.
pub fn worst_aps(quality: &QualityMap, n: usize) -> Vec<&ApQuality> {
    let mut ranked: Vec<&ApQuality> = quality.values().collect();
    ranked.sort_by(|a, b| by_quality(a, b));
    ranked.truncate(n);
    ranked
}

/// The `n` APs with the highest connection quality, best first.
pub fn best_aps(quality: &QualityMap, n: usize) -> Vec<&ApQuality> {
    let mut ranked: Vec<&ApQuality> = quality.values().collect();
    ranked.sort_by(|a, b| {
        b.connection_quality
            .total_cmp(&a.connection_quality)
            .then_with(|| a.ap_name.cmp(&b.ap_name))
    });
    ranked.truncate(n);
    ranked
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| round2(sum / count as f64))
}

/// Mean link speed over all events reporting one, rounded to 2 decimals.
pub fn average_device_speed(events: &[ClientEvent]) -> Option<f64> {
    mean(events.iter().filter_map(|e| finite(e.speed)))
}

/// Campus-wide signal averages; each metric averages over the events that
/// report it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct SignalAverages {
    pub avg_signal_db: Option<f64>,
    pub avg_signal_strength: Option<f64>,
}

pub fn average_signal(events: &[ClientEvent]) -> SignalAverages {
    SignalAverages {
        avg_signal_db: mean(events.iter().filter_map(|e| finite(e.signal_db))),
        avg_signal_strength: mean(events.iter().filter_map(|e| finite(e.signal_strength))),
    }
}
