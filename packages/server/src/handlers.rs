//! HTTP handler functions for the food provider API.

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use food_map_catalog::Specification;
use food_map_provider_models::{Coordinate, PermitStatus, Provider};
use food_map_server_models::{
    ApiError, ApiHealth, ApiProvider, ClosestQueryParams, DEFAULT_CLOSEST_LIMIT,
    StatusQueryParams,
};

use crate::AppState;

/// `GET /health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider_count: state.catalog.len(),
        generation: state.catalog.generation(),
    })
}

/// `GET /api/v1/food-providers/name/{name}`
///
/// Providers whose name contains `name`, optionally filtered by status.
pub async fn by_name(
    state: web::Data<AppState>,
    name: web::Path<String>,
    params: web::Query<StatusQueryParams>,
) -> HttpResponse {
    let name = name.trim();
    if name.is_empty() {
        return bad_request("name must not be empty");
    }

    let mut spec = Specification::like_name(name);
    match params.status.as_deref().map(parse_status_filter) {
        None | Some(Ok(None)) => {}
        Some(Ok(Some(status))) => spec = spec & status,
        Some(Err(e)) => return bad_request(e),
    }

    respond(&state, &spec)
}

/// `GET /api/v1/food-providers/street/{street}`
pub async fn by_street(state: web::Data<AppState>, street: web::Path<String>) -> HttpResponse {
    let street = street.trim();
    if street.is_empty() {
        return bad_request("street must not be empty");
    }

    respond(&state, &Specification::like_street_name(street))
}

/// `GET /api/v1/food-providers/closest?lat=&lng=&limit=&status=`
///
/// The `limit` providers nearest to the reference point. Without a
/// `status` parameter only `APPROVED` permits are considered; an empty
/// `status` disables the filter.
pub async fn closest(
    state: web::Data<AppState>,
    params: web::Query<ClosestQueryParams>,
) -> HttpResponse {
    let reference = match parse_reference(params.lat.as_deref(), params.lng.as_deref()) {
        Ok(reference) => reference,
        Err(e) => return bad_request(e),
    };

    let limit = match params.limit.as_deref().map(str::trim) {
        None => DEFAULT_CLOSEST_LIMIT,
        Some(raw) => match raw.parse::<usize>() {
            Ok(limit) => limit,
            Err(_) => {
                return bad_request(format!(
                    "limit must be a non-negative integer, got '{raw}'"
                ));
            }
        },
    };

    let status = match params.status.as_deref() {
        None => Some(Specification::HasPermitStatus(PermitStatus::Approved)),
        Some(raw) => match parse_status_filter(raw) {
            Ok(status) => status,
            Err(e) => return bad_request(e),
        },
    };

    let mut spec = Specification::closest_to_point(reference, limit);
    if let Some(status) = status {
        spec = spec & status;
    }

    respond(&state, &spec)
}

/// `GET /api/v1/food-providers/status?status=`
///
/// Providers with any of the given statuses, or every provider when no
/// status is given.
pub async fn by_status(
    state: web::Data<AppState>,
    params: web::Query<StatusQueryParams>,
) -> HttpResponse {
    match params.status.as_deref().map(parse_status_filter) {
        None | Some(Ok(None)) => providers_response(&state.catalog.get_all()),
        Some(Ok(Some(spec))) => respond(&state, &spec),
        Some(Err(e)) => bad_request(e),
    }
}

fn respond(state: &AppState, spec: &Specification) -> HttpResponse {
    providers_response(&state.catalog.get_by_spec(spec))
}

fn providers_response(providers: &[Arc<Provider>]) -> HttpResponse {
    let body: Vec<ApiProvider> = providers
        .iter()
        .map(|p| ApiProvider::from(p.as_ref()))
        .collect();
    HttpResponse::Ok().json(body)
}

fn bad_request(message: impl Into<String>) -> HttpResponse {
    let error = ApiError::new(message);
    log::debug!("Rejected request: {}", error.error);
    HttpResponse::BadRequest().json(error)
}

/// Parses a comma-separated status list into an OR of
/// [`Specification::HasPermitStatus`]. Blank entries are ignored; a list
/// with no entries yields `None`.
fn parse_status_filter(raw: &str) -> Result<Option<Specification>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<PermitStatus>()
                .map(Specification::HasPermitStatus)
                .map_err(|_| format!("unknown permit status '{s}'"))
        })
        .try_fold(None, |acc: Option<Specification>, status| {
            let status = status?;
            Ok(Some(match acc {
                Some(acc) => acc | status,
                None => status,
            }))
        })
}

/// Validates the closest-query reference point. The null coordinate is
/// rejected because it means "no location".
fn parse_reference(lat: Option<&str>, lng: Option<&str>) -> Result<Coordinate, String> {
    let (Some(lat), Some(lng)) = (lat, lng) else {
        return Err("lat and lng are required".to_string());
    };
    let latitude = parse_float("lat", lat)?;
    let longitude = parse_float("lng", lng)?;
    Coordinate::new_located(latitude, longitude).map_err(|e| e.to_string())
}

fn parse_float(name: &str, raw: &str) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("{name} must be a number, got '{raw}'"))
}
