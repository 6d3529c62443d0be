//! # Roaming Graphs
//!
//! Detects AP-to-AP handovers per client and aggregates them into one
//! undirected weighted graph per building.
//!
//! ## Algorithm
//! 1. Restrict the mother table to a building's own AP serials
//! 2. Group rows by client and order each group by timestamp
//! 3. Emit a move for every consecutive pair observed on different APs
//! 4. Canonicalize each move into an unordered AP pair and count pairs
//! 5. Keep pairs seen at least `min_weight` times as weighted edges
//!
//! Equal timestamps for one client keep their mother-table row order (the
//! sort is stable), so results are deterministic for a given input order.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use log::{debug, info};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::buildings::{BuildingId, BuildingIndex};
use crate::error::{CampusError, Result};
use crate::mother_table::{MotherRow, MotherTable};

/// Configuration for roaming graph construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct RoamingConfig {
    /// Minimum number of moves between two APs for the pair to become an edge.
    /// Default: 1
    pub min_weight: u32,
}

impl Default for RoamingConfig {
    fn default() -> Self {
        Self { min_weight: 1 }
    }
}

impl RoamingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_weight == 0 {
            return Err(CampusError::config("min_weight", "must be at least 1"));
        }
        Ok(())
    }
}

/// A client switching from one AP to a different one between two
/// consecutive observations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Move {
    pub client_id: String,
    pub from_ap: String,
    pub to_ap: String,
}

impl Move {
    /// The AP pair in sorted order, so A->B and B->A share a key.
    pub fn unordered_pair(&self) -> (&str, &str) {
        let (a, b) = (self.from_ap.as_str(), self.to_ap.as_str());
        if a <= b { (a, b) } else { (b, a) }
    }
}

/// Detect handovers among the rows of one building.
///
/// Rows tagged with another building (or unresolved) are ignored. Moves are
/// returned grouped by client id in ascending order, and chronologically within
/// each client. A client's first observation never produces a move.
pub fn detect_handovers(table: &MotherTable, building: &str) -> Vec<Move> {
    let mut per_client: BTreeMap<&str, Vec<&MotherRow>> = BTreeMap::new();
    for row in table.rows() {
        if row.building.as_deref() == Some(building) {
            per_client.entry(row.client_id.as_str()).or_default().push(row);
        }
    }

    let mut moves = Vec::new();
    for (client_id, mut rows) in per_client {
        // Stable: equal timestamps keep table order.
        rows.sort_by_key(|r| r.timestamp);
        for pair in rows.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if prev.ap_serial != curr.ap_serial {
                moves.push(Move {
                    client_id: client_id.to_string(),
                    from_ap: prev.ap_serial.clone(),
                    to_ap: curr.ap_serial.clone(),
                });
            }
        }
    }

    moves
}

/// An edge of a roaming graph with its move count.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct RoamingEdge {
    pub ap_a: String,
    pub ap_b: String,
    pub weight: u32,
}

/// Undirected weighted graph of handovers between APs.
///
/// Nodes are AP serials; an edge weight is the number of moves observed
/// between its endpoints in either direction.
#[derive(Debug, Clone, Default)]
pub struct RoamingGraph {
    graph: UnGraph<String, u32>,
    nodes: HashMap<String, NodeIndex>,
}

impl RoamingGraph {
    fn node(&mut self, serial: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(serial) {
            return idx;
        }
        let idx = self.graph.add_node(serial.to_string());
        self.nodes.insert(serial.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, a: &str, b: &str, weight: u32) {
        let na = self.node(a);
        let nb = self.node(b);
        self.graph.update_edge(na, nb, weight);
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.edge_count() == 0
    }

    pub fn contains_node(&self, serial: &str) -> bool {
        self.nodes.contains_key(serial)
    }

    /// AP serials in sorted order.
    pub fn nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        nodes.sort_unstable();
        nodes
    }

    /// Weight of the edge between two APs, in either order.
    pub fn weight(&self, a: &str, b: &str) -> Option<u32> {
        let na = *self.nodes.get(a)?;
        let nb = *self.nodes.get(b)?;
        let edge = self.graph.find_edge(na, nb)?;
        self.graph.edge_weight(edge).copied()
    }

    /// All edges, endpoints sorted within each edge and edges sorted by endpoints.
    pub fn edges(&self) -> Vec<RoamingEdge> {
        let mut edges: Vec<RoamingEdge> = self
            .graph
            .edge_references()
            .map(|e| {
                let a = &self.graph[e.source()];
                let b = &self.graph[e.target()];
                let (ap_a, ap_b) = if a <= b { (a, b) } else { (b, a) };
                RoamingEdge { ap_a: ap_a.clone(), ap_b: ap_b.clone(), weight: *e.weight() }
            })
            .collect();
        edges.sort_by(|x, y| (&x.ap_a, &x.ap_b).cmp(&(&y.ap_a, &y.ap_b)));
        edges
    }

    /// Sum of all edge weights.
    pub fn total_moves(&self) -> u64 {
        self.graph.edge_weights().map(|&w| u64::from(w)).sum()
    }

    /// Largest edge weight, if any edge exists.
    pub fn max_weight(&self) -> Option<u32> {
        self.graph.edge_weights().copied().max()
    }

    /// The underlying petgraph graph.
    pub fn inner(&self) -> &UnGraph<String, u32> {
        &self.graph
    }
}

/// Build a roaming graph from moves, keeping AP pairs seen at least
/// `min_weight` times.
///
/// # Example
/// ```
/// use campus_roaming::roaming::{build_roaming_graph, Move};
///
/// let moves = vec![
///     Move { client_id: "c1".into(), from_ap: "a".into(), to_ap: "b".into() },
///     Move { client_id: "c2".into(), from_ap: "b".into(), to_ap: "a".into() },
///     Move { client_id: "c2".into(), from_ap: "a".into(), to_ap: "c".into() },
/// ];
///
/// let graph = build_roaming_graph(&moves, 2);
/// assert_eq!(graph.edge_count(), 1);
/// assert_eq!(graph.weight("b", "a"), Some(2));
/// assert!(!graph.contains_node("c"));
/// ```
pub fn build_roaming_graph(moves: &[Move], min_weight: u32) -> RoamingGraph {
    let mut counts: BTreeMap<(&str, &str), u32> = BTreeMap::new();
    for mv in moves {
        *counts.entry(mv.unordered_pair()).or_insert(0) += 1;
    }

    let mut graph = RoamingGraph::default();
    for ((a, b), weight) in counts {
        if weight >= min_weight {
            graph.add_edge(a, b, weight);
        }
    }
    graph
}

/// Roaming graph of a single building from the full mother table.
///
/// Returns `None` when the building has no qualifying edge at the threshold.
pub fn building_graph(
    table: &MotherTable,
    index: &BuildingIndex,
    building: &str,
    config: &RoamingConfig,
) -> Option<RoamingGraph> {
    let serials = index.serials_of(building);
    if serials.is_empty() {
        return None;
    }
    let local = table.restricted_to(&serials);
    if local.is_empty() {
        return None;
    }

    let moves = detect_handovers(&local, building);
    let graph = build_roaming_graph(&moves, config.min_weight);
    debug!(
        "Building {:?}: {} rows, {} moves, {} edges",
        building,
        local.len(),
        moves.len(),
        graph.edge_count()
    );

    if graph.is_empty() { None } else { Some(graph) }
}

/// Build a roaming graph for every building in the index.
///
/// Buildings without events, or whose moves all fall below the threshold, are
/// absent from the result.
pub fn building_graphs(
    table: &MotherTable,
    index: &BuildingIndex,
    config: &RoamingConfig,
) -> BTreeMap<BuildingId, RoamingGraph> {
    let start = Instant::now();

    let graphs: BTreeMap<BuildingId, RoamingGraph> = index
        .iter()
        .filter_map(|(id, _)| building_graph(table, index, id, config).map(|g| (id.clone(), g)))
        .collect();

    info!(
        "Built {} roaming graphs from {} buildings (min_weight={}) in {:?}",
        graphs.len(),
        index.len(),
        config.min_weight,
        start.elapsed()
    );

    graphs
}

/// Same as [`building_graphs`] but builds buildings in parallel with rayon.
///
/// Each building reads only its own slice of the table, so the result is
/// identical to the sequential version.
#[cfg(feature = "parallel")]
pub fn building_graphs_parallel(
    table: &MotherTable,
    index: &BuildingIndex,
    config: &RoamingConfig,
) -> BTreeMap<BuildingId, RoamingGraph> {
    use rayon::prelude::*;

    let start = Instant::now();
    let ids: Vec<&BuildingId> = index.iter().map(|(id, _)| id).collect();

    let graphs: BTreeMap<BuildingId, RoamingGraph> = ids
        .par_iter()
        .filter_map(|id| building_graph(table, index, id, config).map(|g| ((*id).clone(), g)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    info!(
        "Built {} roaming graphs from {} buildings in parallel in {:?}",
        graphs.len(),
        index.len(),
        start.elapsed()
    );

    graphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mother_table::build_mother_table;
    use crate::{AccessPoint, ClientEvent};

    fn mv(client: &str, from: &str, to: &str) -> Move {
        Move { client_id: client.into(), from_ap: from.into(), to_ap: to.into() }
    }

    fn library() -> BuildingIndex {
        BuildingIndex::build(&[
            AccessPoint::new("LIB-1", "LIB-1"),
            AccessPoint::new("LIB-2", "LIB-2"),
            AccessPoint::new("LIB-3", "LIB-3"),
            AccessPoint::new("SCI-1", "SCI-1"),
        ])
    }

    #[test]
    fn test_end_to_end_single_move() {
        let index = library();
        let events = vec![
            ClientEvent::new(1, "c1", "LIB-1"),
            ClientEvent::new(2, "c1", "LIB-2"),
        ];
        let table = build_mother_table(&events, &index);

        let moves = detect_handovers(&table, "LIB");
        assert_eq!(moves, vec![mv("c1", "LIB-1", "LIB-2")]);

        let graphs = building_graphs(&table, &index, &RoamingConfig { min_weight: 1 });
        let lib = graphs.get("LIB").unwrap();
        assert_eq!(lib.edge_count(), 1);
        assert_eq!(lib.weight("LIB-1", "LIB-2"), Some(1));

        let graphs = building_graphs(&table, &index, &RoamingConfig { min_weight: 2 });
        assert!(graphs.get("LIB").is_none());
    }

    #[test]
    fn test_same_ap_produces_no_moves() {
        let index = library();
        let events = vec![
            ClientEvent::new(1, "c1", "LIB-1"),
            ClientEvent::new(2, "c1", "LIB-1"),
            ClientEvent::new(3, "c1", "LIB-1"),
        ];
        let table = build_mother_table(&events, &index);
        assert!(detect_handovers(&table, "LIB").is_empty());
        assert!(building_graphs(&table, &index, &RoamingConfig::default()).is_empty());
    }

    #[test]
    fn test_first_observation_never_moves() {
        let index = library();
        let events = vec![
            ClientEvent::new(5, "c1", "LIB-2"),
            ClientEvent::new(1, "c2", "LIB-3"),
            ClientEvent::new(3, "c1", "LIB-1"),
        ];
        let table = build_mother_table(&events, &index);
        let moves = detect_handovers(&table, "LIB");

        // c1 sorted: t3 LIB-1 -> t5 LIB-2; c2 has a single row.
        assert_eq!(moves, vec![mv("c1", "LIB-1", "LIB-2")]);
    }

    #[test]
    fn test_rows_are_sorted_per_client() {
        let index = library();
        let events = vec![
            ClientEvent::new(30, "c1", "LIB-3"),
            ClientEvent::new(10, "c1", "LIB-1"),
            ClientEvent::new(20, "c1", "LIB-2"),
        ];
        let table = build_mother_table(&events, &index);
        let moves = detect_handovers(&table, "LIB");
        assert_eq!(moves, vec![mv("c1", "LIB-1", "LIB-2"), mv("c1", "LIB-2", "LIB-3")]);
    }

    #[test]
    fn test_timestamp_ties_keep_row_order() {
        let index = library();
        let events = vec![
            ClientEvent::new(1, "c1", "LIB-2"),
            ClientEvent::new(1, "c1", "LIB-1"),
        ];
        let table = build_mother_table(&events, &index);
        assert_eq!(detect_handovers(&table, "LIB"), vec![mv("c1", "LIB-2", "LIB-1")]);
    }

    #[test]
    fn test_cross_building_rows_are_filtered() {
        let index = library();
        let events = vec![
            ClientEvent::new(1, "c1", "LIB-1"),
            ClientEvent::new(2, "c1", "SCI-1"),
            ClientEvent::new(3, "c1", "LIB-2"),
        ];
        let table = build_mother_table(&events, &index);
        let graphs = building_graphs(&table, &index, &RoamingConfig::default());

        let lib = &graphs["LIB"];
        assert!(!lib.contains_node("SCI-1"));
        assert_eq!(lib.weight("LIB-1", "LIB-2"), Some(1));
        // SCI saw a single observation: no graph.
        assert!(!graphs.contains_key("SCI"));
    }

    #[test]
    fn test_edge_weight_is_symmetric_count() {
        let moves = vec![
            mv("c1", "a", "b"),
            mv("c1", "b", "a"),
            mv("c2", "a", "b"),
            mv("c2", "b", "c"),
        ];
        let graph = build_roaming_graph(&moves, 1);

        assert_eq!(graph.weight("a", "b"), Some(3));
        assert_eq!(graph.weight("b", "a"), Some(3));
        assert_eq!(graph.weight("c", "b"), Some(1));
        assert_eq!(graph.weight("a", "c"), None);
        assert_eq!(graph.total_moves(), 4);
        assert_eq!(graph.max_weight(), Some(3));
        assert_eq!(graph.nodes(), vec!["a", "b", "c"]);
        assert_eq!(
            graph.edges(),
            vec![
                RoamingEdge { ap_a: "a".into(), ap_b: "b".into(), weight: 3 },
                RoamingEdge { ap_a: "b".into(), ap_b: "c".into(), weight: 1 },
            ]
        );
    }

    #[test]
    fn test_raising_threshold_never_adds_edges() {
        let moves = vec![
            mv("c1", "a", "b"),
            mv("c2", "a", "b"),
            mv("c3", "a", "b"),
            mv("c1", "b", "c"),
            mv("c2", "c", "b"),
            mv("c1", "c", "d"),
        ];
        let mut previous = usize::MAX;
        for threshold in 1..=4 {
            let count = build_roaming_graph(&moves, threshold).edge_count();
            assert!(count <= previous);
            previous = count;
        }
        assert_eq!(build_roaming_graph(&moves, 1).edge_count(), 3);
        assert_eq!(build_roaming_graph(&moves, 2).edge_count(), 2);
        assert_eq!(build_roaming_graph(&moves, 3).edge_count(), 1);
        assert_eq!(build_roaming_graph(&moves, 4).edge_count(), 0);
    }

    #[test]
    fn test_config_rejects_zero_threshold() {
        assert!(RoamingConfig { min_weight: 0 }.validate().is_err());
        assert!(RoamingConfig::default().validate().is_ok());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let index = library();
        let events = vec![
            ClientEvent::new(1, "c1", "LIB-1"),
            ClientEvent::new(2, "c1", "LIB-2"),
            ClientEvent::new(3, "c1", "LIB-3"),
            ClientEvent::new(1, "c2", "LIB-3"),
            ClientEvent::new(2, "c2", "LIB-2"),
        ];
        let table = build_mother_table(&events, &index);
        let config = RoamingConfig::default();

        let seq = building_graphs(&table, &index, &config);
        let par = building_graphs_parallel(&table, &index, &config);

        assert_eq!(seq.keys().collect::<Vec<_>>(), par.keys().collect::<Vec<_>>());
        for (id, graph) in &seq {
            assert_eq!(graph.edges(), par[id].edges());
        }
    }
}
