//! Usage statistics over client association events.
//!
//! These are the aggregations behind the campus usage charts: busiest APs,
//! distinct devices per hour and weekday, signal distribution, and the split by
//! network and radio band. Rendering is left to the caller.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};

use crate::buildings::{BuildingId, BuildingIndex};
use crate::error::{CampusError, Result};
use crate::ClientEvent;

/// Configuration for usage statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct UsageConfig {
    /// Number of APs in the busiest-AP ranking. Default: 15
    pub top_aps: usize,
    /// Number of buildings in the AP-count ranking. Default: 10
    pub top_buildings: usize,
    /// Readings below this level (dBm) count as weak. Default: -60.0
    pub weak_signal_db: f64,
    /// Offset from UTC used to derive local hour and weekday. Default: 0
    pub utc_offset_hours: i32,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            top_aps: 15,
            top_buildings: 10,
            weak_signal_db: -60.0,
            utc_offset_hours: 0,
        }
    }
}

impl UsageConfig {
    /// The configured local offset.
    pub fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| CampusError::config("utc_offset_hours", format!("{} is not a valid offset", self.utc_offset_hours)))
    }

    pub fn validate(&self) -> Result<()> {
        self.offset()?;
        if !self.weak_signal_db.is_finite() {
            return Err(CampusError::config("weak_signal_db", "must be finite"));
        }
        Ok(())
    }
}

/// A labelled count with its share of the total, in percent.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ShareCount {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

/// Distinct devices seen on one weekday.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct WeekdayCount {
    pub day: String,
    pub devices: usize,
}

/// Signal level distribution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct SignalSummary {
    /// Event count per distinct signal-strength value, ascending
    pub strength_classes: Vec<(f64, usize)>,
    pub mean_signal_db: Option<f64>,
    /// Events below the weak-signal threshold
    pub weak_count: usize,
    /// Weak events as a percentage of all events
    pub weak_percent: f64,
}

/// All usage statistics for one batch of events.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct UsageReport {
    pub top_aps: Vec<(String, usize)>,
    pub top_buildings: Vec<(BuildingId, usize)>,
    pub hourly_devices: [usize; 24],
    pub weekly_devices: Vec<WeekdayCount>,
    pub signal: SignalSummary,
    pub networks: Vec<ShareCount>,
    pub bands: Vec<ShareCount>,
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

/// Occurrences of each distinct finite value, in ascending value order.
fn value_counts(values: impl Iterator<Item = f64>) -> Vec<(f64, usize)> {
    let mut values: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.chunk_by(|a, b| a == b).map(|chunk| (chunk[0], chunk.len())).collect()
}

fn local_time(timestamp: i64, offset: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|utc| utc.with_timezone(offset))
}

/// Event count per AP display name, busiest first; ties by name.
pub fn top_aps_by_usage(events: &[ClientEvent], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for event in events {
        let name = event.ap_name.trim();
        if !name.is_empty() {
            *counts.entry(name).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// Distinct client ids per local hour of day.
pub fn hourly_unique_devices(events: &[ClientEvent], offset: &FixedOffset) -> [usize; 24] {
    let mut per_hour: Vec<HashSet<&str>> = vec![HashSet::new(); 24];
    for event in events {
        if let Some(local) = local_time(event.timestamp, offset) {
            per_hour[local.hour() as usize].insert(event.client_id.as_str());
        }
    }
    let mut counts = [0usize; 24];
    for (hour, clients) in per_hour.iter().enumerate() {
        counts[hour] = clients.len();
    }
    counts
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Distinct client ids per local weekday, Monday first.
pub fn weekly_unique_devices(events: &[ClientEvent], offset: &FixedOffset) -> Vec<WeekdayCount> {
    let mut per_day: Vec<HashSet<&str>> = vec![HashSet::new(); 7];
    for event in events {
        if let Some(local) = local_time(event.timestamp, offset) {
            per_day[local.weekday().num_days_from_monday() as usize].insert(event.client_id.as_str());
        }
    }
    WEEK.iter()
        .zip(per_day)
        .map(|(day, clients)| WeekdayCount { day: weekday_name(*day).to_string(), devices: clients.len() })
        .collect()
}

/// Busiest hour as `(hour, devices)`; earliest hour wins ties. `None` if no
/// device was seen.
pub fn peak_hour(hourly: &[usize; 24]) -> Option<(u32, usize)> {
    let mut peak: Option<(u32, usize)> = None;
    for (hour, &count) in hourly.iter().enumerate() {
        if count > 0 && peak.map_or(true, |(_, c)| count > c) {
            peak = Some((hour as u32, count));
        }
    }
    peak
}

/// Busiest weekday; the earliest day in the week wins ties.
pub fn peak_weekday(weekly: &[WeekdayCount]) -> Option<&WeekdayCount> {
    weekly
        .iter()
        .filter(|d| d.devices > 0)
        .fold(None, |best: Option<&WeekdayCount>, d| match best {
            Some(b) if b.devices >= d.devices => Some(b),
            _ => Some(d),
        })
}

/// Signal-strength class histogram and weak-signal share.
pub fn signal_summary(events: &[ClientEvent], weak_signal_db: f64) -> SignalSummary {
    let strength_classes = value_counts(events.iter().filter_map(|e| e.signal_strength));
    let mut db_sum = 0.0;
    let mut db_count = 0usize;
    let mut weak_count = 0usize;

    for event in events {
        if let Some(db) = event.signal_db.filter(|v| v.is_finite()) {
            db_sum += db;
            db_count += 1;
            if db < weak_signal_db {
                weak_count += 1;
            }
        }
    }

    SignalSummary {
        strength_classes,
        mean_signal_db: (db_count > 0).then(|| db_sum / db_count as f64),
        weak_count,
        weak_percent: percent(weak_count, events.len()),
    }
}

/// Events per network name, most common first.
pub fn network_distribution(events: &[ClientEvent]) -> Vec<ShareCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for network in events.iter().filter_map(|e| e.network.as_deref()) {
        *counts.entry(network).or_insert(0) += 1;
    }
    let total: usize = counts.values().sum();
    let mut shares: Vec<ShareCount> = counts
        .into_iter()
        .map(|(label, count)| ShareCount { label: label.to_string(), count, percent: percent(count, total) })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    shares
}

/// Display label for a radio band in GHz.
pub fn band_label(band: f64) -> String {
    const KNOWN: [(f64, &str); 3] = [(2.4, "2.4 GHz"), (5.0, "5 GHz"), (6.0, "6 GHz")];
    KNOWN
        .iter()
        .find(|(ghz, _)| (band - ghz).abs() < 1e-6)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| band.to_string())
}

/// Events per radio band, in ascending band order.
pub fn band_distribution(events: &[ClientEvent]) -> Vec<ShareCount> {
    let counts = value_counts(events.iter().filter_map(|e| e.band));
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    counts
        .into_iter()
        .map(|(band, count)| ShareCount { label: band_label(band), count, percent: percent(count, total) })
        .collect()
}

/// Compute every usage statistic in one pass over the configuration.
pub fn usage_report(events: &[ClientEvent], index: &BuildingIndex, config: &UsageConfig) -> Result<UsageReport> {
    config.validate()?;
    let offset = config.offset()?;

    Ok(UsageReport {
        top_aps: top_aps_by_usage(events, config.top_aps),
        top_buildings: index.top_by_ap_count(config.top_buildings),
        hourly_devices: hourly_unique_devices(events, &offset),
        weekly_devices: weekly_unique_devices(events, &offset),
        signal: signal_summary(events, config.weak_signal_db),
        networks: network_distribution(events),
        bands: band_distribution(events),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccessPoint;

    // 2025-04-03 (a Thursday) 07:25:01 UTC
    const THU_0725: i64 = 1_743_665_101;
    const HOUR: i64 = 3600;
    const DAY: i64 = 24 * HOUR;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_top_aps_by_usage() {
        let events = vec![
            ClientEvent::new(0, "a", "s1").with_ap_name("LIB-1"),
            ClientEvent::new(0, "b", "s1").with_ap_name("LIB-1"),
            ClientEvent::new(0, "c", "s2").with_ap_name("SCI-1"),
            ClientEvent::new(0, "d", "s3").with_ap_name("ART-1"),
        ];
        let top = top_aps_by_usage(&events, 2);
        assert_eq!(top, vec![("LIB-1".to_string(), 2), ("ART-1".to_string(), 1)]);
    }

    #[test]
    fn test_hourly_counts_distinct_devices() {
        let events = vec![
            ClientEvent::new(THU_0725, "a", "s1"),
            ClientEvent::new(THU_0725 + 60, "a", "s2"),
            ClientEvent::new(THU_0725, "b", "s1"),
            ClientEvent::new(THU_0725 + HOUR, "a", "s1"),
        ];
        let hourly = hourly_unique_devices(&events, &utc());
        assert_eq!(hourly[7], 2);
        assert_eq!(hourly[8], 1);
        assert_eq!(peak_hour(&hourly), Some((7, 2)));

        let cest = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = hourly_unique_devices(&events, &cest);
        assert_eq!(local[9], 2);
    }

    #[test]
    fn test_weekly_counts_start_on_monday() {
        let events = vec![
            ClientEvent::new(THU_0725, "a", "s1"),
            ClientEvent::new(THU_0725, "b", "s1"),
            ClientEvent::new(THU_0725 + DAY, "a", "s1"),
        ];
        let weekly = weekly_unique_devices(&events, &utc());
        assert_eq!(weekly.len(), 7);
        assert_eq!(weekly[0].day, "Monday");
        assert_eq!(weekly[3].devices, 2);
        assert_eq!(weekly[4].devices, 1);
        assert_eq!(peak_weekday(&weekly).map(|d| d.day.as_str()), Some("Thursday"));
    }

    #[test]
    fn test_empty_peaks() {
        assert_eq!(peak_hour(&[0; 24]), None);
        assert!(peak_weekday(&weekly_unique_devices(&[], &utc())).is_none());
    }

    #[test]
    fn test_signal_summary() {
        let events = vec![
            ClientEvent::new(0, "a", "s").with_metrics(Some(-70.0), Some(2.0), None),
            ClientEvent::new(0, "b", "s").with_metrics(Some(-50.0), Some(4.0), None),
            ClientEvent::new(0, "c", "s").with_metrics(None, Some(4.0), None),
            ClientEvent::new(0, "d", "s").with_metrics(Some(-60.0), None, None),
        ];
        let summary = signal_summary(&events, -60.0);

        assert_eq!(summary.strength_classes, vec![(2.0, 1), (4.0, 2)]);
        assert_eq!(summary.mean_signal_db, Some(-60.0));
        assert_eq!(summary.weak_count, 1);
        assert!((summary.weak_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_strength_classes_keep_distinct_values() {
        let events = vec![
            ClientEvent::new(0, "a", "s").with_metrics(None, Some(3.5), None),
            ClientEvent::new(0, "b", "s").with_metrics(None, Some(4.0), None),
            ClientEvent::new(0, "c", "s").with_metrics(None, Some(3.5), None),
            ClientEvent::new(0, "d", "s").with_metrics(None, Some(f64::NAN), None),
        ];
        let summary = signal_summary(&events, -60.0);
        assert_eq!(summary.strength_classes, vec![(3.5, 2), (4.0, 1)]);
    }

    #[test]
    fn test_network_and_band_distribution() {
        let events = vec![
            ClientEvent::new(0, "a", "s").with_network("eduroam").with_band(5.0),
            ClientEvent::new(0, "b", "s").with_network("eduroam").with_band(2.4),
            ClientEvent::new(0, "c", "s").with_network("guest").with_band(5.0),
            ClientEvent::new(0, "d", "s").with_band(6.0),
        ];

        let networks = network_distribution(&events);
        assert_eq!(networks[0].label, "eduroam");
        assert_eq!(networks[0].count, 2);
        assert!((networks[1].percent - 100.0 / 3.0).abs() < 1e-9);

        let bands = band_distribution(&events);
        let labels: Vec<&str> = bands.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["2.4 GHz", "5 GHz", "6 GHz"]);
        assert_eq!(bands[1].count, 2);
        assert_eq!(band_label(60.0), "60");
    }

    #[test]
    fn test_usage_report_validates_offset() {
        let index = BuildingIndex::build(&[AccessPoint::new("s1", "LIB-1")]);
        let bad = UsageConfig { utc_offset_hours: 30, ..UsageConfig::default() };
        assert!(usage_report(&[], &index, &bad).is_err());

        let report = usage_report(&[], &index, &UsageConfig::default()).unwrap();
        assert_eq!(report.top_buildings, vec![("LIB".to_string(), 1)]);
        assert!(report.top_aps.is_empty());
    }
}
