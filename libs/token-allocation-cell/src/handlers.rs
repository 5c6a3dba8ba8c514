use std::sync::Arc;
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::{
    AllocateTokenRequest, AllocationOutcome, AllocationState, DoctorProfile, EmergencyTokenRequest,
    RegisterDoctorRequest, SlotTime, TokenSource, UpdateStatusRequest,
};

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

fn parse_slot_time(raw: &str) -> Result<SlotTime, AppError> {
    raw.parse::<SlotTime>().map_err(AppError::from)
}

fn outcome_body(outcome: &AllocationOutcome) -> Result<Value, AppError> {
    serde_json::to_value(outcome).map_err(|e| {
        AppError::Internal(format!("Failed to serialize allocation outcome: {}", e))
    })
}

/// Register a doctor and materialise its slots
pub async fn register_doctor(
    State(state): State<Arc<AllocationState>>,
    Json(request): Json<RegisterDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require("id", &request.id)?;
    require("name", &request.name)?;
    if request.working_hours_start >= request.working_hours_end || request.working_hours_end > 24 {
        return Err(AppError::ValidationError(format!(
            "working hours {}-{} must satisfy start < end <= 24",
            request.working_hours_start, request.working_hours_end
        )));
    }

    info!("Register doctor request: {}", request.id);

    let profile = DoctorProfile {
        id: request.id.trim().to_string(),
        name: request.name.trim().to_string(),
        specialization: request.specialization.unwrap_or_else(|| "General".to_string()),
        working_hours_start: request.working_hours_start,
        working_hours_end: request.working_hours_end,
    };

    let slots_created = state.engine.write().await.register_doctor(profile.clone());

    Ok(Json(json!({
        "success": true,
        "doctor": profile,
        "slots_created": slots_created
    })))
}

/// List registered doctors
pub async fn list_doctors(
    State(state): State<Arc<AllocationState>>,
) -> Result<Json<Value>, AppError> {
    let doctors = state.engine.read().await.doctors();

    Ok(Json(json!({
        "success": true,
        "total": doctors.len(),
        "demo_doctors_seeded": state.config.seed_demo_doctors,
        "doctors": doctors
    })))
}

/// Get a doctor's schedule, slot by slot
pub async fn get_doctor_schedule(
    State(state): State<Arc<AllocationState>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let schedule = state.engine.read().await.doctor_schedule(&doctor_id)?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule
    })))
}

/// Allocate a token
pub async fn allocate_token(
    State(state): State<Arc<AllocationState>>,
    Json(request): Json<AllocateTokenRequest>,
) -> Result<Json<Value>, AppError> {
    require("patient_id", &request.patient_id)?;
    require("doctor_id", &request.doctor_id)?;
    require("slot_time", &request.slot_time)?;
    let slot_time = parse_slot_time(&request.slot_time)?;

    let tag = request.source.as_deref().unwrap_or(TokenSource::Walkin.as_str());
    if TokenSource::recognize(tag).is_none() {
        warn!("Unknown token source '{}', treating as walkin", tag);
    }
    let source = TokenSource::from_tag(tag);

    info!(
        "Allocation request from patient {} for doctor {} at {}",
        request.patient_id, request.doctor_id, slot_time
    );

    let outcome = state.engine.write().await.allocate(
        request.patient_id.trim(),
        request.doctor_id.trim(),
        slot_time,
        source,
    )?;

    Ok(Json(outcome_body(&outcome)?))
}

/// Insert an emergency token, bumping a lower-priority patient if needed
pub async fn insert_emergency(
    State(state): State<Arc<AllocationState>>,
    Json(request): Json<EmergencyTokenRequest>,
) -> Result<Json<Value>, AppError> {
    require("patient_id", &request.patient_id)?;
    require("doctor_id", &request.doctor_id)?;
    require("slot_time", &request.slot_time)?;
    let slot_time = parse_slot_time(&request.slot_time)?;

    info!(
        "Emergency request from patient {} for doctor {} at {}",
        request.patient_id, request.doctor_id, slot_time
    );

    let outcome = state.engine.write().await.insert_emergency(
        request.patient_id.trim(),
        request.doctor_id.trim(),
        slot_time,
    )?;

    Ok(Json(outcome_body(&outcome)?))
}

/// Get a token by id
pub async fn get_token(
    State(state): State<Arc<AllocationState>>,
    Path(token_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = state.engine.read().await.get_token(token_id)?;

    Ok(Json(json!({
        "success": true,
        "token": token
    })))
}

/// Cancel a token
pub async fn cancel_token(
    State(state): State<Arc<AllocationState>>,
    Path(token_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    info!("Cancel request for token: {}", token_id);

    let outcome = state.engine.write().await.cancel(token_id)?;

    Ok(Json(outcome_body(&outcome)?))
}

/// Move a token to confirmed, completed or no-show
pub async fn update_token_status(
    State(state): State<Arc<AllocationState>>,
    Path(token_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    info!("Status update for token {}: {}", token_id, request.status);

    let token = state.engine.write().await.update_status(token_id, request.status)?;

    Ok(Json(json!({
        "success": true,
        "token": token
    })))
}

/// Get the waiting queue in order
pub async fn get_waiting_queue(
    State(state): State<Arc<AllocationState>>,
) -> Result<Json<Value>, AppError> {
    let queue = state.engine.read().await.waiting_queue();

    Ok(Json(json!({
        "success": true,
        "length": queue.len(),
        "tokens": queue
    })))
}

/// Run one replay pass over the waiting queue
pub async fn replay_waiting_queue(
    State(state): State<Arc<AllocationState>>,
) -> Result<Json<Value>, AppError> {
    let mut engine = state.engine.write().await;
    let placed = engine.replay_queue();
    let still_waiting = engine.waiting_queue().len();

    info!("Manual replay placed {} tokens", placed.len());

    Ok(Json(json!({
        "success": true,
        "placed": placed,
        "still_waiting": still_waiting
    })))
}

/// Get system-wide statistics
pub async fn get_system_stats(
    State(state): State<Arc<AllocationState>>,
) -> Result<Json<Value>, AppError> {
    let stats = state.engine.read().await.system_stats();

    Ok(Json(json!({
        "success": true,
        "stats": stats
    })))
}
