//! Raw upstream row → canonical [`Provider`].
//!
//! Rows come from the SF Mobile Food Facility Permit dataset. Field names
//! are the Socrata API names (`locationid`, `applicant`, `fooditems`, ...).
//! Each row is mapped independently; a row that cannot be used is rejected
//! with a [`MapError`] and the rest of the batch is unaffected.
//!
//! Two upstream conventions are preserved:
//!
//! * an absent or unrecognised `status` becomes [`PermitStatus::Approved`];
//! * a row with no location at all gets [`Coordinate::NULL`].

use food_map_provider_models::{Coordinate, CoordinateError, Permit, PermitStatus, Provider};
use serde_json::Value;

use crate::parsing::{parse_date_value, value_as_f64, value_as_i64};

/// Why a single row was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    /// The row is not a JSON object.
    #[error("row is not a JSON object")]
    NotAnObject,

    /// Neither `locationid` nor `objectid` holds a usable key.
    #[error("row has no locationid or objectid")]
    MissingKey,

    /// The row's coordinates are outside the valid ranges.
    #[error("row {location_id}: {source}")]
    InvalidCoordinate {
        /// Key of the rejected row.
        location_id: String,
        /// The range violation.
        source: CoordinateError,
    },

    /// A field is present but holds a value of the wrong shape.
    #[error("row {location_id}: field {field} is invalid: {value}")]
    InvalidField {
        /// Key of the rejected row.
        location_id: String,
        /// Upstream field name.
        field: &'static str,
        /// The offending raw value.
        value: String,
    },
}

/// Maps one raw row into a [`Provider`].
///
/// # Errors
///
/// Returns [`MapError`] if the row is not an object, has no key, has
/// out-of-range coordinates or a malformed `cnn`.
pub fn map_row(row: &Value) -> Result<Provider, MapError> {
    if !row.is_object() {
        return Err(MapError::NotAnObject);
    }

    let location_id = extract_id(row, &["locationid", "objectid"]).ok_or(MapError::MissingKey)?;

    let coord = extract_coordinate(row).map_err(|source| MapError::InvalidCoordinate {
        location_id: location_id.clone(),
        source,
    })?;

    let cnn = match row.get("cnn").filter(|v| !is_blank(v)) {
        None => None,
        Some(v) => Some(value_as_i64(v).ok_or_else(|| MapError::InvalidField {
            location_id: location_id.clone(),
            field: "cnn",
            value: v.to_string(),
        })?),
    };

    let permit = Permit {
        status: get_str(row, "status")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(PermitStatus::Approved),
        permit_id: extract_id(row, &["permit", "objectid"]).unwrap_or_default(),
        approval_date: row.get("approved").and_then(parse_date_value),
        received_date: row.get("received").and_then(parse_date_value),
        expiration_date: row.get("expirationdate").and_then(parse_date_value),
    };

    Ok(Provider {
        location_id,
        name: get_string(row, "applicant").unwrap_or_default(),
        food_items: get_string(row, "fooditems").unwrap_or_default(),
        permit,
        coord,
        location_description: get_string(row, "locationdescription"),
        blocklot: get_string(row, "blocklot"),
        block: get_string(row, "block"),
        lot: get_string(row, "lot"),
        cnn,
        address: get_string(row, "address"),
    })
}

/// Maps a batch of rows, skipping (and logging) every row that fails.
#[must_use]
pub fn map_rows(rows: &[Value]) -> Vec<Provider> {
    let mut skipped = 0_usize;
    let providers: Vec<Provider> = rows
        .iter()
        .filter_map(|row| match map_row(row) {
            Ok(provider) => Some(provider),
            Err(e) => {
                log::debug!("Skipping row: {e}");
                skipped += 1;
                None
            }
        })
        .collect();

    if skipped > 0 {
        log::warn!("Skipped {skipped} of {} rows during mapping", rows.len());
    }

    providers
}

fn get_str<'a>(row: &'a Value, field: &str) -> Option<&'a str> {
    row.get(field)?.as_str()
}

/// Non-empty trimmed string field.
fn get_string(row: &Value, field: &str) -> Option<String> {
    get_str(row, field)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// First non-empty id among `fields`. Socrata returns ids as strings, but
/// integers are accepted too.
fn extract_id(row: &Value, fields: &[&str]) -> Option<String> {
    for field in fields {
        if let Some(s) = get_str(row, field).map(str::trim)
            && !s.is_empty()
        {
            return Some(s.to_string());
        }
        if let Some(n) = row.get(*field).and_then(Value::as_i64) {
            return Some(n.to_string());
        }
    }
    None
}

/// Resolves the row's location: top-level `latitude`/`longitude`, then the
/// nested `location` object, then the null sentinel.
fn extract_coordinate(row: &Value) -> Result<Coordinate, CoordinateError> {
    let direct = row
        .get("latitude")
        .and_then(value_as_f64)
        .zip(row.get("longitude").and_then(value_as_f64));

    match direct.or_else(|| row.get("location").and_then(location_lat_lng)) {
        Some((latitude, longitude)) => Coordinate::new(latitude, longitude),
        None => Ok(Coordinate::NULL),
    }
}

/// Reads `(lat, lng)` from a nested location value.
fn location_lat_lng(location: &Value) -> Option<(f64, f64)> {
    // GeoJSON Point: {"type":"Point","coordinates":[lng, lat]}
    if let Some(coords) = location.get("coordinates").and_then(Value::as_array) {
        let lng = coords.first().and_then(value_as_f64)?;
        let lat = coords.get(1).and_then(value_as_f64)?;
        return Some((lat, lng));
    }
    // Socrata location: {"latitude":"37.78","longitude":"-122.39"}
    let lat = location.get("latitude").and_then(value_as_f64)?;
    let lng = location.get("longitude").and_then(value_as_f64)?;
    Some((lat, lng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row() -> Value {
        json!({
            "objectid": "1723891",
            "locationid": "1723891",
            "applicant": "Ziaurehman Amini",
            "facilitytype": "Push Cart",
            "cnn": "30727000",
            "locationdescription": "MARKET ST: DRUMM ST intersection",
            "address": "5 THE EMBARCADERO",
            "blocklot": "0234017",
            "block": "0234",
            "lot": "017",
            "permit": "15MFF-0145",
            "status": "REQUESTED",
            "fooditems": "Hot dogs: soda",
            "latitude": "37.794331003246846",
            "longitude": "-122.39581105302317",
            "approved": "2015-03-19T00:00:00.000",
            "received": "20150319",
            "expirationdate": "2016-03-15T00:00:00.000",
            "location": {
                "latitude": "37.794331003246846",
                "longitude": "-122.39581105302317",
                "human_address": "{\"address\": \"\", \"city\": \"\", \"state\": \"\", \"zip\": \"\"}"
            }
        })
    }

    #[test]
    fn maps_full_row() {
        let p = map_row(&sample_row()).unwrap();
        assert_eq!(p.location_id, "1723891");
        assert_eq!(p.name, "Ziaurehman Amini");
        assert_eq!(p.food_items, "Hot dogs: soda");
        assert_eq!(p.permit.status, PermitStatus::Requested);
        assert_eq!(p.permit.permit_id, "15MFF-0145");
        assert_eq!(p.cnn, Some(30_727_000));
        assert_eq!(p.address.as_deref(), Some("5 THE EMBARCADERO"));
        assert_eq!(p.block.as_deref(), Some("0234"));
        assert_eq!(p.lot.as_deref(), Some("017"));
        assert_eq!(
            p.location_description.as_deref(),
            Some("MARKET ST: DRUMM ST intersection")
        );
        assert!((p.coord.latitude - 37.794_331).abs() < 1e-5);
        assert!((p.coord.longitude - -122.395_811).abs() < 1e-5);
        assert_eq!(
            p.permit.approval_date.map(|d| d.to_string()).as_deref(),
            Some("2015-03-19 00:00:00 UTC")
        );
        assert_eq!(
            p.permit.received_date.map(|d| d.to_string()).as_deref(),
            Some("2015-03-19 00:00:00 UTC")
        );
        assert!(p.permit.expiration_date.is_some());
    }

    #[test]
    fn unparseable_date_becomes_none() {
        let mut row = sample_row();
        row["received"] = json!("March 19th");
        let p = map_row(&row).unwrap();
        assert!(p.permit.received_date.is_none());
    }

    #[test]
    fn unknown_status_maps_to_approved() {
        let mut row = sample_row();
        row["status"] = json!("bogus");
        assert_eq!(map_row(&row).unwrap().permit.status, PermitStatus::Approved);

        row.as_object_mut().unwrap().remove("status");
        assert_eq!(map_row(&row).unwrap().permit.status, PermitStatus::Approved);
    }

    #[test]
    fn status_is_case_insensitive() {
        let mut row = sample_row();
        row["status"] = json!("expired");
        assert_eq!(map_row(&row).unwrap().permit.status, PermitStatus::Expired);
    }

    #[test]
    fn falls_back_to_location_object() {
        let row = json!({
            "locationid": "7",
            "location": {"latitude": "37.7", "longitude": "-122.4"}
        });
        let p = map_row(&row).unwrap();
        assert!((p.coord.latitude - 37.7).abs() < f64::EPSILON);
        assert!((p.coord.longitude - -122.4).abs() < f64::EPSILON);
    }

    #[test]
    fn falls_back_to_geojson_location() {
        let row = json!({
            "locationid": 7,
            "location": {"type": "Point", "coordinates": [-122.4, 37.7]}
        });
        let p = map_row(&row).unwrap();
        assert_eq!(p.location_id, "7");
        assert!((p.coord.latitude - 37.7).abs() < f64::EPSILON);
        assert!((p.coord.longitude - -122.4).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_location_becomes_null_sentinel() {
        let p = map_row(&json!({"locationid": "9", "applicant": "Nowhere"})).unwrap();
        assert!(p.coord.is_null());
        assert!(!p.has_location());
        assert_eq!(p.permit.permit_id, "");
        assert!(p.address.is_none());
    }

    #[test]
    fn out_of_range_coordinates_reject_row() {
        let row = json!({"locationid": "9", "latitude": "91.0", "longitude": "10.0"});
        assert!(matches!(
            map_row(&row),
            Err(MapError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn key_falls_back_to_objectid() {
        let p = map_row(&json!({"objectid": 1_569_152, "permit": ""})).unwrap();
        assert_eq!(p.location_id, "1569152");
        assert_eq!(p.permit.permit_id, "1569152");
    }

    #[test]
    fn missing_key_rejects_row() {
        assert_eq!(
            map_row(&json!({"applicant": "No Key", "locationid": ""})),
            Err(MapError::MissingKey)
        );
    }

    #[test]
    fn non_object_rejects_row() {
        assert_eq!(map_row(&json!(["a", "b"])), Err(MapError::NotAnObject));
        assert_eq!(map_row(&json!("row")), Err(MapError::NotAnObject));
    }

    #[test]
    fn malformed_cnn_rejects_row() {
        let mut row = sample_row();
        row["cnn"] = json!("not-a-number");
        assert!(matches!(
            map_row(&row),
            Err(MapError::InvalidField { field: "cnn", .. })
        ));

        row["cnn"] = json!("");
        assert_eq!(map_row(&row).unwrap().cnn, None);
    }

    #[test]
    fn batch_skips_only_bad_rows() {
        let rows = vec![
            sample_row(),
            json!("garbage"),
            json!({"applicant": "keyless"}),
            json!({"locationid": "2", "latitude": 37.7, "longitude": -122.4}),
        ];
        let providers = map_rows(&rows);
        let ids: Vec<&str> = providers.iter().map(|p| p.location_id.as_str()).collect();
        assert_eq!(ids, ["1723891", "2"]);
    }
}
