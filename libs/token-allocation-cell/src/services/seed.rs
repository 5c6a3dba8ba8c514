use tracing::info;

use crate::models::DoctorProfile;
use crate::services::engine::AllocationEngine;

fn profile(id: &str, name: &str, specialization: &str, start: u32, end: u32) -> DoctorProfile {
    DoctorProfile {
        id: id.to_string(),
        name: name.to_string(),
        specialization: specialization.to_string(),
        working_hours_start: start,
        working_hours_end: end,
    }
}

/// Doctors registered when `SEED_DEMO_DOCTORS` is set.
pub fn demo_doctors() -> Vec<DoctorProfile> {
    vec![
        profile("D001", "Dr. Asha Mehta", "General Medicine", 9, 13),
        profile("D002", "Dr. Karan Rao", "Cardiology", 10, 14),
        profile("D003", "Dr. Nina Thomas", "Pediatrics", 14, 18),
    ]
}

/// Registers the demo doctors and returns how many slots were created.
pub fn seed_demo_doctors(engine: &mut AllocationEngine) -> usize {
    let slots: usize = demo_doctors()
        .into_iter()
        .map(|doctor| engine.register_doctor(doctor))
        .sum();
    info!("Seeded demo doctors with {} slots", slots);
    slots
}
