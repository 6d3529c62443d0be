//! # Mother Table
//!
//! Joins client association events with the building index into one canonical
//! event stream of `(timestamp, building, ap, client)` rows.
//!
//! The join is a left join: events whose AP serial is not in the inventory are
//! kept with `building: None` so the row count only shrinks by exact
//! duplicates. Row order follows the input event order; chronological order is
//! established later, per client, by the handover detector.

use std::collections::{BTreeMap, HashSet};

use log::{debug, warn};

use crate::buildings::{BuildingId, BuildingIndex};
use crate::ClientEvent;

/// One row of the mother table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct MotherRow {
    pub timestamp: i64,
    /// `None` when the AP serial has no inventory record.
    pub building: Option<BuildingId>,
    pub ap_serial: String,
    pub client_id: String,
}

/// Chronologically unordered event stream annotated with buildings.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct MotherTable {
    rows: Vec<MotherRow>,
}

impl MotherTable {
    /// Build a table from already-annotated rows.
    pub fn from_rows(rows: Vec<MotherRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[MotherRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose AP could not be resolved to a building.
    pub fn unresolved_count(&self) -> usize {
        self.rows.iter().filter(|r| r.building.is_none()).count()
    }

    /// New table holding only the rows observed on the given AP serials.
    pub fn restricted_to(&self, serials: &HashSet<&str>) -> MotherTable {
        MotherTable {
            rows: self
                .rows
                .iter()
                .filter(|r| serials.contains(r.ap_serial.as_str()))
                .cloned()
                .collect(),
        }
    }
}

/// Build the mother table from client events and the building index.
///
/// Exact repeats of `(client_id, timestamp, ap_serial)` are collapsed, keeping
/// the first. Every remaining event yields exactly one row.
///
/// # Example
/// ```
/// use campus_roaming::{AccessPoint, ClientEvent};
/// use campus_roaming::buildings::BuildingIndex;
/// use campus_roaming::mother_table::build_mother_table;
///
/// let index = BuildingIndex::build(&[AccessPoint::new("s1", "LIB-1")]);
/// let events = vec![
///     ClientEvent::new(1, "aa:bb", "s1"),
///     ClientEvent::new(1, "aa:bb", "s1"),
///     ClientEvent::new(2, "aa:bb", "ghost"),
/// ];
///
/// let table = build_mother_table(&events, &index);
/// assert_eq!(table.len(), 2);
/// assert_eq!(table.unresolved_count(), 1);
/// ```
pub fn build_mother_table(events: &[ClientEvent], index: &BuildingIndex) -> MotherTable {
    let lookup = index.ap_building_lookup();
    let mut seen: HashSet<(&str, i64, &str)> = HashSet::with_capacity(events.len());
    let mut rows = Vec::with_capacity(events.len());

    for event in events {
        let key = (event.client_id.as_str(), event.timestamp, event.ap_serial.as_str());
        if !seen.insert(key) {
            continue;
        }
        rows.push(MotherRow {
            timestamp: event.timestamp,
            building: lookup.get(&event.ap_serial).cloned(),
            ap_serial: event.ap_serial.clone(),
            client_id: event.client_id.clone(),
        });
    }

    let table = MotherTable { rows };
    let unresolved = table.unresolved_count();
    if unresolved > 0 {
        warn!(
            "{} of {} mother table rows reference APs missing from the inventory",
            unresolved,
            table.len()
        );
    }
    debug!(
        "Mother table: {} rows from {} events ({} duplicates collapsed)",
        table.len(),
        events.len(),
        events.len() - table.len()
    );

    table
}

/// Events grouped per snapshot timestamp, then per AP serial.
///
/// Both levels are keyed in sorted order; the events inside each AP bucket keep
/// their input order.
pub fn snapshot_connections(events: &[ClientEvent]) -> BTreeMap<i64, BTreeMap<&str, Vec<&ClientEvent>>> {
    let mut snapshots: BTreeMap<i64, BTreeMap<&str, Vec<&ClientEvent>>> = BTreeMap::new();
    for event in events {
        snapshots
            .entry(event.timestamp)
            .or_default()
            .entry(event.ap_serial.as_str())
            .or_default()
            .push(event);
    }
    snapshots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccessPoint;

    fn index() -> BuildingIndex {
        BuildingIndex::build(&[
            AccessPoint::new("s1", "LIB-1"),
            AccessPoint::new("s2", "LIB-2"),
            AccessPoint::new("s3", "SCI-1"),
        ])
    }

    #[test]
    fn test_left_join_keeps_unresolved_rows() {
        let events = vec![
            ClientEvent::new(10, "c1", "s1"),
            ClientEvent::new(11, "c1", "unknown"),
            ClientEvent::new(12, "c2", "s3"),
        ];
        let table = build_mother_table(&events, &index());

        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0].building.as_deref(), Some("LIB"));
        assert_eq!(table.rows()[1].building, None);
        assert_eq!(table.rows()[2].building.as_deref(), Some("SCI"));
        assert_eq!(table.unresolved_count(), 1);
    }

    #[test]
    fn test_duplicates_collapse_before_join() {
        let events = vec![
            ClientEvent::new(10, "c1", "s1"),
            ClientEvent::new(10, "c1", "s1"),
            ClientEvent::new(10, "c1", "s2"),
            ClientEvent::new(10, "c2", "s1"),
        ];
        let table = build_mother_table(&events, &index());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_restricted_to_building_serials() {
        let events = vec![
            ClientEvent::new(1, "c1", "s1"),
            ClientEvent::new(2, "c1", "s3"),
            ClientEvent::new(3, "c1", "s2"),
        ];
        let idx = index();
        let table = build_mother_table(&events, &idx);
        let lib = table.restricted_to(&idx.serials_of("LIB"));

        assert_eq!(lib.len(), 2);
        assert!(lib.rows().iter().all(|r| r.building.as_deref() == Some("LIB")));
    }

    #[test]
    fn test_snapshot_connections_groups_by_time_then_ap() {
        let events = vec![
            ClientEvent::new(2, "c1", "s1"),
            ClientEvent::new(1, "c2", "s1"),
            ClientEvent::new(2, "c3", "s1"),
            ClientEvent::new(2, "c4", "s2"),
        ];
        let snapshots = snapshot_connections(&events);

        assert_eq!(snapshots.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        let at_two = &snapshots[&2];
        let clients: Vec<&str> = at_two["s1"].iter().map(|e| e.client_id.as_str()).collect();
        assert_eq!(clients, vec!["c1", "c3"]);
        assert_eq!(at_two["s2"].len(), 1);
    }
}
