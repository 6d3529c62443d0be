//! Example of a full campus analysis on a small synthetic snapshot.
//!
//! Run with: cargo run --example campus_report

use campus_roaming::map_layers::{edge_segments, node_markers, quality_markers};
use campus_roaming::quality::worst_aps;
use campus_roaming::{
    analyze_campus, reconcile_all, usage_report, AccessPoint, CampusConfig, ClientEvent, GeoAp, LatLng,
};

const BASE_TS: i64 = 1_743_665_101; // 2025-04-03T09:25:01+02:00

fn main() {
    println!("Campus Roaming Report Example\n");

    let aps = vec![
        AccessPoint::new("L1", "LIB-1").with_status("Up").with_client_count(24),
        AccessPoint::new("L2", "LIB-2").with_status("Up").with_client_count(9),
        AccessPoint::new("L3", "LIB-3").with_status("Down"),
        AccessPoint::new("S1", "SCI-AULA-1").with_status("Up").with_client_count(15),
        AccessPoint::new("S2", "SCI-AULA-2").with_status("Up").with_client_count(3),
    ];

    let geo = vec![
        geo_row("LIB-1", 41.5008, 2.1100),
        geo_row("LIB-2", 41.5010, 2.1104),
        geo_row("LIB-3", 41.5012, 2.1101),
        geo_row("SCI-AULA-1", 41.5030, 2.1120),
    ];

    // Three clients wandering between APs every five minutes
    let paths: [(&str, &[(&str, &str)]); 3] = [
        ("aa:01", &[("L1", "LIB-1"), ("L2", "LIB-2"), ("L1", "LIB-1"), ("L3", "LIB-3")]),
        ("aa:02", &[("L2", "LIB-2"), ("L1", "LIB-1"), ("S1", "SCI-AULA-1"), ("S2", "SCI-AULA-2")]),
        ("aa:03", &[("S1", "SCI-AULA-1"), ("S2", "SCI-AULA-2"), ("S1", "SCI-AULA-1")]),
    ];

    let mut events = Vec::new();
    for (c, (client, path)) in paths.iter().enumerate() {
        for (i, (serial, name)) in path.iter().enumerate() {
            let db = -55.0 - (i as f64 * 4.0) - c as f64;
            events.push(
                ClientEvent::new(BASE_TS + i as i64 * 300, *client, *serial)
                    .with_ap_name(*name)
                    .with_metrics(Some(db), Some(4.0 - i as f64 * 0.5), Some(80.0 - c as f64 * 15.0))
                    .with_network(if c == 2 { "guest" } else { "eduroam" })
                    .with_band(if i % 2 == 0 { 5.0 } else { 2.4 }),
            );
        }
    }

    let config = CampusConfig {
        usage: campus_roaming::UsageConfig { utc_offset_hours: 2, ..Default::default() },
        ..CampusConfig::default()
    };

    let report = match analyze_campus(&aps, &events, &config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("analysis failed: {}", e);
            return;
        }
    };

    println!("Buildings: {}", report.buildings.len());
    println!("Mother table rows: {}\n", report.mother_table.len());

    for (building, graph) in &report.graphs {
        println!("{} ({} APs, {} moves):", building, graph.node_count(), graph.total_moves());
        for edge in graph.edges() {
            println!("  {} <-> {}  x{}", edge.ap_a, edge.ap_b, edge.weight);
        }
    }

    println!("\nWorst APs by connection quality:");
    for ap in worst_aps(&report.quality, 3) {
        println!("  {:<12} {:>7.2}  ({} samples)", ap.ap_name, ap.connection_quality, ap.samples);
    }

    if let Ok(usage) = usage_report(&events, &report.buildings, &config.usage) {
        println!("\nDevices per local hour:");
        for (hour, devices) in usage.hourly_devices.iter().enumerate().filter(|(_, d)| **d > 0) {
            println!("  {:02}:00  {}", hour, devices);
        }
        for band in &usage.bands {
            println!("  {:<8} {:>3} events ({:.1}%)", band.label, band.count, band.percent);
        }
    }

    let targets: Vec<&str> = geo.iter().map(|g| g.name.as_str()).collect();
    let reconciled = reconcile_all(targets, &report.quality, &config.reconcile);
    println!(
        "\nReconciled {} geolocated APs ({} exact, {} fuzzy, {} unmatched)",
        reconciled.matched.len(),
        reconciled.exact_count(),
        reconciled.fuzzy_count(),
        reconciled.unmatched.len()
    );

    let markers = node_markers(&aps, &geo, &config.map);
    let segments = edge_segments(&report.graphs, &aps, &geo, &config.map);
    let scored = quality_markers(&markers, &report.quality, &config.reconcile);

    println!("\nMap: {} markers, {} edge segments", markers.len(), segments.len());
    for segment in &segments {
        println!(
            "  {} -> {}: {:.0} m, opacity {:.2}",
            segment.from_name, segment.to_name, segment.length_m, segment.opacity
        );
    }
    for marker in &scored {
        match marker.normalized {
            Some(score) => println!("  {:<12} quality {:.2}", marker.name, score),
            None => println!("  {:<12} no quality data", marker.name),
        }
    }
}

fn geo_row(name: &str, latitude: f64, longitude: f64) -> GeoAp {
    GeoAp {
        name: name.to_string(),
        building: Some(name.split('-').next().unwrap_or(name).to_string()),
        floor: Some("0".to_string()),
        location: LatLng::new(latitude, longitude),
    }
}
