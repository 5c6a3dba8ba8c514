use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use token_allocation_cell::{create_token_allocation_router, AllocationState};

pub fn create_router(state: Arc<AllocationState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Token Allocation API is running!" }))
        .nest("/allocation", create_token_allocation_router(state))
}
