use std::sync::Arc;
use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::handlers::{
    allocate_token,
    cancel_token,
    get_doctor_schedule,
    get_system_stats,
    get_token,
    get_waiting_queue,
    insert_emergency,
    list_doctors,
    register_doctor,
    replay_waiting_queue,
    update_token_status,
};
use crate::AllocationState;

pub fn create_token_allocation_router(state: Arc<AllocationState>) -> Router {
    Router::new()
        .route("/doctors", get(list_doctors).post(register_doctor))
        .route("/doctors/{doctor_id}/schedule", get(get_doctor_schedule))
        .route("/tokens", post(allocate_token))
        .route("/tokens/emergency", post(insert_emergency))
        .route("/tokens/{token_id}", get(get_token))
        .route("/tokens/{token_id}/cancel", post(cancel_token))
        .route("/tokens/{token_id}/status", patch(update_token_status))
        .route("/queue", get(get_waiting_queue))
        .route("/queue/replay", post(replay_waiting_queue))
        .route("/stats", get(get_system_stats))
        .with_state(state)
}
