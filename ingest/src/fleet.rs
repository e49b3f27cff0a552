use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, instrument};

use fleet_common::twin::{DigitalTwinState, HealthState};

use crate::router;

#[derive(Serialize)]
pub struct FleetSummary {
    pub total_vehicles: usize,
    pub online_vehicles: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub critical: usize,
}

/// Lighter projection of a twin for fleet-wide listings.
#[derive(Serialize)]
pub struct FleetVehicle {
    pub vehicle_id: String,
    pub vendor: String,
    pub online: bool,
    pub health_score: i32,
    pub health_state: HealthState,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub battery_soc_pct: Option<f64>,
    pub battery_temp_c: Option<f64>,
}

impl From<DigitalTwinState> for FleetVehicle {
    fn from(twin: DigitalTwinState) -> Self {
        FleetVehicle {
            vehicle_id: twin.vehicle_id,
            vendor: twin.vendor,
            online: twin.online,
            health_score: twin.health_score,
            health_state: twin.health_state,
            last_seen: twin.last_seen,
            battery_soc_pct: twin.telemetry.battery_soc_pct,
            battery_temp_c: twin.telemetry.battery_temp_c,
        }
    }
}

/// Returns the current twin for one vehicle, or 404 once its entry has
/// expired from the store.
#[instrument(skip(state))]
pub async fn get_vehicle(
    state: State<router::State>,
    Path(vehicle_id): Path<String>,
) -> Result<Json<DigitalTwinState>, StatusCode> {
    match state.store.get(&vehicle_id).await {
        Ok(Some(twin)) => Ok(Json(twin)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("failed to read twin for {}: {}", vehicle_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[instrument(skip(state))]
pub async fn fleet_summary(
    state: State<router::State>,
) -> Result<Json<FleetSummary>, StatusCode> {
    let twins = state.store.scan().await.map_err(|e| {
        error!("failed to scan twins: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut summary = FleetSummary {
        total_vehicles: twins.len(),
        online_vehicles: 0,
        healthy: 0,
        degraded: 0,
        critical: 0,
    };
    for twin in &twins {
        if twin.online {
            summary.online_vehicles += 1;
        }
        match twin.health_state {
            HealthState::Healthy => summary.healthy += 1,
            HealthState::Degraded => summary.degraded += 1,
            HealthState::Critical => summary.critical += 1,
        }
    }
    Ok(Json(summary))
}

#[instrument(skip(state))]
pub async fn list_vehicles(
    state: State<router::State>,
) -> Result<Json<Vec<FleetVehicle>>, StatusCode> {
    let mut twins = state.store.scan().await.map_err(|e| {
        error!("failed to scan twins: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    twins.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
    Ok(Json(twins.into_iter().map(FleetVehicle::from).collect()))
}
