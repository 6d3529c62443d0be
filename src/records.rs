//! # Loader Records
//!
//! Parsing of the JSON documents produced by the snapshot loader: AP inventory
//! snapshots, client association snapshots and the GeoJSON geolocation layer.
//!
//! Required fields that are missing or of the wrong type fail with
//! [`CampusError::MalformedRecord`]. Metric fields are lenient: numbers and
//! numeric strings are kept, anything else becomes missing.

use std::sync::OnceLock;

use chrono::DateTime;
use log::debug;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{CampusError, Result};
use crate::map_layers::GeoAp;
use crate::quality::coerce_metric;
use crate::{AccessPoint, ClientEvent, LatLng};

type Object = Map<String, Value>;

fn snapshot_stamp() -> &'static Regex {
    static STAMP: OnceLock<Regex> = OnceLock::new();
    STAMP.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}_\d{2}_\d{2}(?:[+-]\d{2}_\d{2}|Z)").expect("valid snapshot stamp pattern")
    })
}

/// Parse a snapshot timestamp into Unix seconds.
///
/// Accepts RFC 3339 (`2025-04-03T09:25:01+02:00`) and the underscore form used
/// in snapshot file names (`2025-04-03T09_25_01+02_00`).
///
/// ```
/// use campus_roaming::records::parse_timestamp;
///
/// let a = parse_timestamp("2025-04-03T09_25_01+02_00").unwrap();
/// let b = parse_timestamp("2025-04-03T07:25:01Z").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn parse_timestamp(raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    let candidate = if snapshot_stamp().is_match(trimmed) {
        trimmed.replace('_', ":")
    } else {
        trimmed.to_string()
    };
    DateTime::parse_from_rfc3339(&candidate)
        .map(|dt| dt.timestamp())
        .map_err(|_| CampusError::InvalidTimestamp { value: raw.to_string() })
}

/// Timestamp embedded in a snapshot file name such as
/// `AP-info-v2-2025-04-03T09_25_01+02_00.json`.
pub fn timestamp_from_filename(file_name: &str) -> Result<i64> {
    let stamp = snapshot_stamp()
        .find(file_name)
        .ok_or_else(|| CampusError::InvalidTimestamp { value: file_name.to_string() })?;
    parse_timestamp(stamp.as_str())
}

fn records(json: &str) -> Result<Vec<Object>> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(items) = value else {
        return Err(CampusError::malformed(0, "records", "expected a JSON array"));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(obj) => Ok(obj),
            _ => Err(CampusError::malformed(index, "record", "expected an object")),
        })
        .collect()
}

fn required_str(obj: &Object, index: usize, field: &'static str) -> Result<String> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(CampusError::malformed(index, field, "is missing")),
        Some(other) => Err(CampusError::malformed(index, field, format!("expected a string, got {}", other))),
    }
}

fn optional_str(obj: &Object, field: &str) -> Option<String> {
    match obj.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn metric(obj: &Object, field: &str) -> Option<f64> {
    match obj.get(field)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => coerce_metric(s),
        _ => None,
    }
}

fn timestamp(obj: &Object, index: usize, field: &'static str) -> Result<i64> {
    match obj.get(field) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| CampusError::malformed(index, field, format!("{} is not whole seconds", n))),
        Some(Value::String(s)) => {
            parse_timestamp(s).map_err(|_| CampusError::malformed(index, field, format!("cannot parse {:?}", s)))
        }
        Some(Value::Null) | None => Err(CampusError::malformed(index, field, "is missing")),
        Some(other) => Err(CampusError::malformed(index, field, format!("expected a timestamp, got {}", other))),
    }
}

/// Parse an AP inventory snapshot: an array of `{serial, name, status?,
/// client_count?}` objects.
pub fn parse_access_points(json: &str) -> Result<Vec<AccessPoint>> {
    let aps = records(json)?
        .iter()
        .enumerate()
        .map(|(index, obj)| {
            let mut ap = AccessPoint::new(required_str(obj, index, "serial")?, required_str(obj, index, "name")?);
            ap.status = optional_str(obj, "status");
            ap.client_count = obj
                .get("client_count")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok());
            Ok(ap)
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Parsed {} AP records", aps.len());
    Ok(aps)
}

/// Parse a client association snapshot.
///
/// Each object needs `macaddr`, `associated_device` (AP serial) and
/// `file_timestamp`; `associated_device_name`, `signal_db`, `signal_strength`,
/// `speed`, `network` and `band` are optional.
pub fn parse_client_events(json: &str) -> Result<Vec<ClientEvent>> {
    let events = records(json)?
        .iter()
        .enumerate()
        .map(|(index, obj)| {
            let mut event = ClientEvent::new(
                timestamp(obj, index, "file_timestamp")?,
                required_str(obj, index, "macaddr")?,
                required_str(obj, index, "associated_device")?,
            )
            .with_metrics(metric(obj, "signal_db"), metric(obj, "signal_strength"), metric(obj, "speed"));
            if let Some(name) = optional_str(obj, "associated_device_name") {
                event = event.with_ap_name(name);
            }
            event.network = optional_str(obj, "network");
            event.band = metric(obj, "band");
            Ok(event)
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Parsed {} client events", events.len());
    Ok(events)
}

/// Parse the geolocation layer, a GeoJSON `FeatureCollection` of AP points.
///
/// Features without Point geometry are skipped.
pub fn parse_geo_features(json: &str) -> Result<Vec<GeoAp>> {
    let value: Value = serde_json::from_str(json)?;
    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| CampusError::malformed(0, "features", "expected a FeatureCollection"))?;

    let mut rows = Vec::with_capacity(features.len());
    let mut skipped = 0usize;
    for (index, feature) in features.iter().enumerate() {
        let properties = feature
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| CampusError::malformed(index, "properties", "is missing"))?;
        let name = required_str(properties, index, "USER_NOM_A")?;

        let geometry = feature.get("geometry").filter(|g| g.get("type").and_then(Value::as_str) == Some("Point"));
        let coordinates = geometry
            .and_then(|g| g.get("coordinates"))
            .and_then(Value::as_array)
            .and_then(|c| Some((c.first()?.as_f64()?, c.get(1)?.as_f64()?)));
        let Some((longitude, latitude)) = coordinates else {
            skipped += 1;
            continue;
        };

        rows.push(GeoAp {
            name,
            building: optional_str(properties, "USER_EDIFI"),
            floor: optional_str(properties, "Num_Planta"),
            location: LatLng::new(latitude, longitude),
        });
    }

    debug!("Parsed {} geolocated APs ({} without point geometry)", rows.len(), skipped);
    Ok(rows)
}
