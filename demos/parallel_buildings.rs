//! Example comparing sequential and parallel per-building graph construction.
//!
//! Run with: cargo run --example parallel_buildings --features parallel --release

use campus_roaming::{
    build_mother_table, building_graphs, building_graphs_parallel, AccessPoint, BuildingIndex, ClientEvent,
    RoamingConfig,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

const BUILDINGS: usize = 40;
const APS_PER_BUILDING: usize = 25;
const CLIENTS: usize = 5_000;
const SNAPSHOTS: i64 = 48;

fn main() {
    println!("Parallel Building Graphs Example\n");

    let prefixes: Vec<String> = (0..BUILDINGS).map(building_prefix).collect();
    let aps: Vec<AccessPoint> = prefixes
        .iter()
        .enumerate()
        .flat_map(|(b, prefix)| {
            (0..APS_PER_BUILDING).map(move |a| AccessPoint::new(format!("SN{:03}{:03}", b, a), format!("{}-{}", prefix, a)))
        })
        .collect();

    // Each client stays in one building and hops between its APs
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    let mut events = Vec::with_capacity(CLIENTS * SNAPSHOTS as usize);
    for client in 0..CLIENTS {
        let building = client % BUILDINGS;
        for snapshot in 0..SNAPSHOTS {
            let ap = rng.gen_range(0..APS_PER_BUILDING);
            events.push(ClientEvent::new(
                snapshot * 300,
                format!("client-{:05}", client),
                format!("SN{:03}{:03}", building, ap),
            ));
        }
    }
    println!("Generated {} APs and {} events\n", aps.len(), events.len());

    let index = BuildingIndex::build(&aps);
    let table = build_mother_table(&events, &index);
    let config = RoamingConfig { min_weight: 2 };

    let start = Instant::now();
    let sequential = building_graphs(&table, &index, &config);
    let sequential_time = start.elapsed();

    let start = Instant::now();
    let parallel = building_graphs_parallel(&table, &index, &config);
    let parallel_time = start.elapsed();

    println!("Sequential: {} graphs in {:?}", sequential.len(), sequential_time);
    println!("Parallel:   {} graphs in {:?}", parallel.len(), parallel_time);

    let agree = sequential.len() == parallel.len()
        && sequential
            .iter()
            .all(|(id, g)| parallel.get(id).is_some_and(|p| p.edges() == g.edges()));
    println!("Results identical: {}", agree);
}

/// Letter-only building names, since digits are stripped from building ids.
fn building_prefix(i: usize) -> String {
    let first = (b'A' + (i / 26) as u8) as char;
    let second = (b'A' + (i % 26) as u8) as char;
    format!("B{}{}", first, second)
}
