//! # Map Layers
//!
//! Geometry for the interactive campus map: one marker per geolocated AP, one
//! segment per roaming edge, and quality markers colored by a normalized score.
//!
//! APs are joined to the geolocation dataset by exact display name. Anything
//! without coordinates is left off the map.

use std::collections::{BTreeMap, HashMap};

use geo::{Distance, Haversine, Point};
use log::debug;

use crate::buildings::BuildingId;
use crate::error::{CampusError, Result};
use crate::quality::QualityMap;
use crate::reconcile::{reconcile_quality, ReconcileConfig};
use crate::roaming::RoamingGraph;
use crate::{AccessPoint, LatLng};

/// Configuration for map layer styling.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct MapLayerConfig {
    /// Opacity of an edge with zero weight. Default: 0.3
    pub base_opacity: f64,
    /// Opacity added per unit of `weight / edge_count`. Default: 0.7
    pub opacity_span: f64,
    /// Marker radius of an AP with no clients. Default: 5.0
    pub base_radius: f64,
    /// Clients per additional unit of radius. Default: 10.0
    pub clients_per_radius_unit: f64,
}

impl Default for MapLayerConfig {
    fn default() -> Self {
        Self {
            base_opacity: 0.3,
            opacity_span: 0.7,
            base_radius: 5.0,
            clients_per_radius_unit: 10.0,
        }
    }
}

impl MapLayerConfig {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("base_opacity", self.base_opacity),
            ("opacity_span", self.opacity_span),
            ("base_radius", self.base_radius),
            ("clients_per_radius_unit", self.clients_per_radius_unit),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(CampusError::config(field, format!("{} is not finite", value)));
            }
        }
        if self.clients_per_radius_unit <= 0.0 {
            return Err(CampusError::config("clients_per_radius_unit", "must be positive"));
        }
        Ok(())
    }
}

/// One row of the geolocation dataset.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct GeoAp {
    /// AP display name, as in the AP snapshot
    pub name: String,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub location: LatLng,
}

/// Great-circle distance in meters.
#[inline]
pub fn haversine_meters(a: &LatLng, b: &LatLng) -> f64 {
    let pa = Point::new(a.longitude, a.latitude);
    let pb = Point::new(b.longitude, b.latitude);
    Haversine::distance(pa, pb)
}

fn locations_by_name(geo: &[GeoAp]) -> HashMap<&str, &GeoAp> {
    let mut by_name: HashMap<&str, &GeoAp> = HashMap::with_capacity(geo.len());
    for row in geo {
        by_name.entry(row.name.as_str()).or_insert(row);
    }
    by_name
}

/// A geolocated AP marker.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct NodeMarker {
    pub serial: String,
    pub name: String,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub location: LatLng,
    pub client_count: u32,
    /// Whether the snapshot reported the AP as up
    pub up: bool,
    pub radius: f64,
}

/// Markers for every AP with a geolocation row. Order follows `aps`.
pub fn node_markers(aps: &[AccessPoint], geo: &[GeoAp], config: &MapLayerConfig) -> Vec<NodeMarker> {
    let by_name = locations_by_name(geo);

    let markers: Vec<NodeMarker> = aps
        .iter()
        .filter_map(|ap| {
            let row = by_name.get(ap.name.as_str())?;
            let client_count = ap.client_count.unwrap_or(0);
            Some(NodeMarker {
                serial: ap.serial.clone(),
                name: ap.name.clone(),
                building: row.building.clone(),
                floor: row.floor.clone(),
                location: row.location,
                client_count,
                up: ap.is_up(),
                radius: config.base_radius + client_count as f64 / config.clients_per_radius_unit,
            })
        })
        .collect();

    debug!("{} of {} APs have a map location", markers.len(), aps.len());
    markers
}

/// A roaming edge drawn between two AP locations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct EdgeSegment {
    pub building: BuildingId,
    pub from_name: String,
    pub to_name: String,
    pub from: LatLng,
    pub to: LatLng,
    pub weight: u32,
    pub opacity: f64,
    pub length_m: f64,
}

/// Segments for every roaming edge whose endpoints both have coordinates.
///
/// Opacity scales with the edge weight relative to the number of edges in its
/// building graph, capped at 1.0.
pub fn edge_segments(
    graphs: &BTreeMap<BuildingId, RoamingGraph>,
    aps: &[AccessPoint],
    geo: &[GeoAp],
    config: &MapLayerConfig,
) -> Vec<EdgeSegment> {
    let mut names: HashMap<&str, &str> = HashMap::with_capacity(aps.len());
    for ap in aps {
        names.entry(ap.serial.as_str()).or_insert(ap.name.as_str());
    }
    let by_name = locations_by_name(geo);
    let locate = |serial: &str| {
        let name = *names.get(serial)?;
        Some((name, by_name.get(name)?.location))
    };

    let mut segments = Vec::new();
    let mut skipped = 0usize;
    for (building, graph) in graphs {
        let edge_count = graph.edge_count().max(1) as f64;
        for edge in graph.edges() {
            let (Some((from_name, from)), Some((to_name, to))) = (locate(edge.ap_a.as_str()), locate(edge.ap_b.as_str())) else {
                skipped += 1;
                continue;
            };
            let opacity = (config.base_opacity + config.opacity_span * edge.weight as f64 / edge_count).min(1.0);
            segments.push(EdgeSegment {
                building: building.clone(),
                from_name: from_name.to_string(),
                to_name: to_name.to_string(),
                from,
                to,
                weight: edge.weight,
                opacity,
                length_m: haversine_meters(&from, &to),
            });
        }
    }

    if skipped > 0 {
        debug!("Skipped {} roaming edges without coordinates", skipped);
    }
    segments
}

/// A marker annotated with reconciled connection quality.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct QualityMarker {
    pub name: String,
    pub location: LatLng,
    pub connection_quality: Option<f64>,
    /// Min-max normalized quality in [0, 1]
    pub normalized: Option<f64>,
}

/// Attach fuzzy-reconciled quality to each marker.
///
/// Scores are normalized over the matched markers; when they are all equal
/// every matched marker gets 0.5.
pub fn quality_markers(markers: &[NodeMarker], quality: &QualityMap, config: &ReconcileConfig) -> Vec<QualityMarker> {
    let scores: Vec<Option<f64>> = markers
        .iter()
        .map(|m| reconcile_quality(&m.name, quality, config))
        .collect();

    let (min, max) = scores
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &q| (lo.min(q), hi.max(q)));
    let span = max - min;

    markers
        .iter()
        .zip(scores)
        .map(|(marker, score)| QualityMarker {
            name: marker.name.clone(),
            location: marker.location,
            connection_quality: score,
            normalized: score.map(|q| if span > 0.0 { (q - min) / span } else { 0.5 }),
        })
        .collect()
}
