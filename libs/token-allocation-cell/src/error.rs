use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{SlotTime, TokenStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),

    #[error("Token not found: {0}")]
    TokenNotFound(Uuid),

    #[error("Slot {slot_time} not found for doctor {doctor_id}")]
    SlotNotFound { doctor_id: String, slot_time: SlotTime },

    #[error("No capacity in slot {slot_time} for doctor {doctor_id}")]
    NoCapacity { doctor_id: String, slot_time: SlotTime },

    #[error("Invalid slot time: {0}")]
    InvalidSlotTime(String),

    #[error("Invalid token status transition from {from} to {to}")]
    InvalidStatusTransition { from: TokenStatus, to: TokenStatus },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<AllocationError> for AppError {
    fn from(error: AllocationError) -> Self {
        let message = error.to_string();
        match error {
            AllocationError::DoctorNotFound(_)
            | AllocationError::TokenNotFound(_)
            | AllocationError::SlotNotFound { .. } => AppError::NotFound(message),
            AllocationError::NoCapacity { .. }
            | AllocationError::InvalidStatusTransition { .. } => AppError::Conflict(message),
            AllocationError::InvalidSlotTime(_) => AppError::BadRequest(message),
            AllocationError::ValidationError(_) => AppError::ValidationError(message),
        }
    }
}
