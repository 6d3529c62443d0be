//! # Building Index
//!
//! Derives building identifiers from free-text AP names and partitions the AP
//! inventory into buildings.
//!
//! A building here is a naming convention, not a surveyed footprint: APs named
//! `LIB-1`, `LIB-2` and `lib--3` all land in building `LIB`. Two physical
//! buildings whose APs share a prefix will collide, which is accepted.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::AccessPoint;

/// Canonical building key derived from an AP name.
pub type BuildingId = String;

fn digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("digit pattern"))
}

fn dash_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-+").expect("dash pattern"))
}

/// Derive a building identifier from a raw AP name.
///
/// Uppercases, strips every digit, collapses dash runs into a single dash and
/// trims surrounding whitespace along with any dash left dangling at either
/// end (`LIB-1` becomes `LIB`). Digits are removed before dashes are collapsed
/// and trimming happens last, so the result is a fixed point:
/// `normalize_building_name(normalize_building_name(x)) == normalize_building_name(x)`.
///
/// # Example
/// ```
/// use campus_roaming::buildings::normalize_building_name;
///
/// assert_eq!(normalize_building_name("  lib--12 "), "LIB");
/// assert_eq!(normalize_building_name("Q5-0-3"), "Q");
/// assert_eq!(normalize_building_name("Ciencies-C3-P1"), "CIENCIES-C-P");
/// assert_eq!(normalize_building_name("1234"), "");
/// ```
pub fn normalize_building_name(name: &str) -> BuildingId {
    let upper = name.to_uppercase();
    let no_digits = digits().replace_all(&upper, "");
    let collapsed = dash_runs().replace_all(&no_digits, "-");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || c == '-')
        .to_string()
}

/// Buildings keyed by [`BuildingId`], each holding its APs in inventory order.
///
/// Every AP serial appears in exactly one building.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct BuildingIndex {
    buildings: BTreeMap<BuildingId, Vec<AccessPoint>>,
}

impl BuildingIndex {
    /// Group an AP inventory into buildings.
    ///
    /// Duplicate serials keep their first occurrence; later rows with the same
    /// serial are ignored even if their name differs.
    pub fn build(aps: &[AccessPoint]) -> Self {
        let mut seen: HashSet<&str> = HashSet::with_capacity(aps.len());
        let mut buildings: BTreeMap<BuildingId, Vec<AccessPoint>> = BTreeMap::new();
        let mut duplicates = 0usize;

        for ap in aps {
            if !seen.insert(ap.serial.as_str()) {
                duplicates += 1;
                continue;
            }
            buildings
                .entry(normalize_building_name(&ap.name))
                .or_default()
                .push(ap.clone());
        }

        debug!(
            "Indexed {} APs into {} buildings ({} duplicate serials ignored)",
            seen.len(),
            buildings.len(),
            duplicates
        );

        Self { buildings }
    }

    /// APs of one building, if it exists.
    pub fn get(&self, id: &str) -> Option<&[AccessPoint]> {
        self.buildings.get(id).map(Vec::as_slice)
    }

    /// Iterate buildings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&BuildingId, &[AccessPoint])> {
        self.buildings.iter().map(|(id, aps)| (id, aps.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    /// Total number of distinct APs across all buildings.
    pub fn ap_count(&self) -> usize {
        self.buildings.values().map(Vec::len).sum()
    }

    /// Serials belonging to a building (empty if the building is unknown).
    pub fn serials_of(&self, id: &str) -> HashSet<&str> {
        self.buildings
            .get(id)
            .map(|aps| aps.iter().map(|ap| ap.serial.as_str()).collect())
            .unwrap_or_default()
    }

    /// Serial -> building lookup used to annotate client events.
    pub fn ap_building_lookup(&self) -> HashMap<String, BuildingId> {
        self.buildings
            .iter()
            .flat_map(|(id, aps)| aps.iter().map(move |ap| (ap.serial.clone(), id.clone())))
            .collect()
    }

    /// Serial -> raw AP name, used to label graph nodes.
    pub fn serial_names(&self) -> HashMap<&str, &str> {
        self.buildings
            .values()
            .flatten()
            .map(|ap| (ap.serial.as_str(), ap.name.as_str()))
            .collect()
    }

    /// Buildings with the most APs, largest first; ties broken by id.
    pub fn top_by_ap_count(&self, n: usize) -> Vec<(BuildingId, usize)> {
        let mut counts: Vec<(BuildingId, usize)> = self
            .buildings
            .iter()
            .map(|(id, aps)| (id.clone(), aps.len()))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(n);
        counts
    }
}

/// Look up the building of an AP serial. `None` marks an unresolved AP.
pub fn building_of<'a>(lookup: &'a HashMap<String, BuildingId>, serial: &str) -> Option<&'a BuildingId> {
    lookup.get(serial)
}
