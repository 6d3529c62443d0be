//! # Campus Roaming
//!
//! WiFi roaming graphs and connection quality analysis for campus access-point
//! snapshots.
//!
//! This library provides:
//! - Building identifiers derived from AP names, with an AP-to-building index
//! - A deduplicated "mother table" joining client events with buildings
//! - Per-building roaming graphs built from client handovers between APs
//! - Per-AP connection quality scores with fuzzy name reconciliation
//! - Usage statistics and map layer geometry for reporting
//!
//! ## Features
//!
//! - **`parallel`** - Build per-building graphs in parallel with rayon
//! - **`json`** - Parse loader JSON records and serialize report types
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use campus_roaming::{AccessPoint, ClientEvent, CampusConfig, analyze_campus};
//!
//! let aps = vec![
//!     AccessPoint::new("S1", "LIB-1"),
//!     AccessPoint::new("S2", "LIB-2"),
//! ];
//! let events = vec![
//!     ClientEvent::new(1, "aa:bb", "S1"),
//!     ClientEvent::new(2, "aa:bb", "S2"),
//!     ClientEvent::new(3, "aa:bb", "S1"),
//! ];
//!
//! let report = analyze_campus(&aps, &events, &CampusConfig::default()).unwrap();
//! let lib = &report.graphs["LIB"];
//! assert_eq!(lib.weight("S1", "S2"), Some(2));
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use log::info;

pub mod error;
pub use error::{CampusError, Result};

// Building identifiers and the AP partition
pub mod buildings;
pub use buildings::{building_of, normalize_building_name, BuildingId, BuildingIndex};

// Canonical event stream
pub mod mother_table;
pub use mother_table::{build_mother_table, snapshot_connections, MotherRow, MotherTable};

// Handover detection and graph construction
pub mod roaming;
pub use roaming::{
    build_roaming_graph, building_graph, building_graphs, detect_handovers, Move, RoamingConfig,
    RoamingEdge, RoamingGraph,
};
#[cfg(feature = "parallel")]
pub use roaming::building_graphs_parallel;

// Connection quality heuristic
pub mod quality;
pub use quality::{ap_key, score_connection_quality, ApQuality, QualityMap};

// Fuzzy name reconciliation
pub mod reconcile;
pub use reconcile::{reconcile_all, reconcile_name, reconcile_quality, MatchKind, ReconcileConfig, ReconcileReport};

// Usage statistics
pub mod usage;
pub use usage::{usage_report, UsageConfig, UsageReport};

// Map layer geometry
pub mod map_layers;
pub use map_layers::{edge_segments, node_markers, quality_markers, GeoAp, MapLayerConfig};

// Loader record parsing
#[cfg(feature = "json")]
pub mod records;
#[cfg(feature = "json")]
pub use records::{parse_access_points, parse_client_events, parse_geo_features, parse_timestamp};

// ============================================================================
// Core Types
// ============================================================================

/// One access point from an inventory snapshot.
///
/// # Example
/// ```
/// use campus_roaming::AccessPoint;
/// let ap = AccessPoint::new("CN12345", "LIB-1").with_status("Up").with_client_count(8);
/// assert!(ap.is_up());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct AccessPoint {
    /// Unique hardware serial
    pub serial: String,
    /// Raw display name, e.g. `LIB-1`
    pub name: String,
    /// Operational status as reported by the controller (`Up` / `Down`)
    pub status: Option<String>,
    /// Clients associated at snapshot time
    pub client_count: Option<u32>,
}

impl AccessPoint {
    pub fn new(serial: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            name: name.into(),
            status: None,
            client_count: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_client_count(mut self, count: u32) -> Self {
        self.client_count = Some(count);
        self
    }

    /// Whether the reported status is `Up` (case-insensitive).
    pub fn is_up(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("up"))
    }
}

/// One client association observed in a snapshot.
///
/// Metrics are `None` when the snapshot did not report them or reported
/// something non-numeric.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ClientEvent {
    /// Snapshot time, Unix seconds
    pub timestamp: i64,
    /// Client MAC address (anonymized)
    pub client_id: String,
    /// Serial of the AP the client is associated with
    pub ap_serial: String,
    /// Display name of that AP; empty when not reported
    pub ap_name: String,
    /// Received signal level in dBm
    pub signal_db: Option<f64>,
    /// Signal strength class (1-5)
    pub signal_strength: Option<f64>,
    /// Link speed in Mbps
    pub speed: Option<f64>,
    pub network: Option<String>,
    /// Radio band in GHz
    pub band: Option<f64>,
}

impl ClientEvent {
    pub fn new(timestamp: i64, client_id: impl Into<String>, ap_serial: impl Into<String>) -> Self {
        Self {
            timestamp,
            client_id: client_id.into(),
            ap_serial: ap_serial.into(),
            ap_name: String::new(),
            signal_db: None,
            signal_strength: None,
            speed: None,
            network: None,
            band: None,
        }
    }

    pub fn with_ap_name(mut self, name: impl Into<String>) -> Self {
        self.ap_name = name.into();
        self
    }

    pub fn with_metrics(mut self, signal_db: Option<f64>, signal_strength: Option<f64>, speed: Option<f64>) -> Self {
        self.signal_db = signal_db;
        self.signal_strength = signal_strength;
        self.speed = speed;
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_band(mut self, band: f64) -> Self {
        self.band = Some(band);
        self
    }
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Where the snapshot loader reads from. The analysis itself never touches
/// the filesystem; this travels with the rest of the configuration for the
/// caller's loader.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct LoaderConfig {
    /// Directory of AP inventory snapshots. Default: `anonymized_data/aps`
    pub aps_dir: PathBuf,
    /// Directory of client association snapshots. Default: `anonymized_data/clients`
    pub clients_dir: PathBuf,
    /// Maximum number of snapshot files to load per directory. Default: 600
    pub max_files: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            aps_dir: PathBuf::from("anonymized_data/aps"),
            clients_dir: PathBuf::from("anonymized_data/clients"),
            max_files: 600,
        }
    }
}

/// All configuration for a campus analysis run.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default))]
pub struct CampusConfig {
    pub roaming: RoamingConfig,
    pub reconcile: ReconcileConfig,
    pub usage: UsageConfig,
    pub map: MapLayerConfig,
    pub loader: LoaderConfig,
}

impl CampusConfig {
    /// Check every section, failing on the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.roaming.validate()?;
        self.reconcile.validate()?;
        self.usage.validate()?;
        self.map.validate()?;
        if self.loader.max_files == 0 {
            return Err(CampusError::config("max_files", "must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Orchestration
// ============================================================================

/// Output of [`analyze_campus`].
#[derive(Debug, Clone)]
pub struct CampusReport {
    pub buildings: BuildingIndex,
    pub mother_table: MotherTable,
    /// Roaming graph per building; buildings without edges are absent
    pub graphs: BTreeMap<BuildingId, RoamingGraph>,
    pub quality: QualityMap,
}

impl CampusReport {
    /// Total number of roaming edges across all buildings.
    pub fn edge_count(&self) -> usize {
        self.graphs.values().map(RoamingGraph::edge_count).sum()
    }

    /// The building whose graph recorded the most moves.
    pub fn busiest_building(&self) -> Option<(&BuildingId, u64)> {
        self.graphs
            .iter()
            .map(|(id, g)| (id, g.total_moves()))
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
    }
}

/// Run the full pipeline: building index, mother table, per-building roaming
/// graphs and connection quality.
///
/// Fails only when `config` is invalid.
pub fn analyze_campus(aps: &[AccessPoint], events: &[ClientEvent], config: &CampusConfig) -> Result<CampusReport> {
    config.validate()?;
    let start = Instant::now();

    let buildings = BuildingIndex::build(aps);
    let mother_table = build_mother_table(events, &buildings);
    let graphs = building_graphs(&mother_table, &buildings, &config.roaming);
    let quality = score_connection_quality(events);

    info!(
        "Analyzed {} APs in {} buildings, {} events -> {} graphs, {} scored APs in {:?}",
        buildings.ap_count(),
        buildings.len(),
        mother_table.len(),
        graphs.len(),
        quality.len(),
        start.elapsed()
    );

    Ok(CampusReport {
        buildings,
        mother_table,
        graphs,
        quality,
    })
}

// ============================================================================
// Tests
// ============================================================================
