use std::collections::HashMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AllocationError;
use crate::models::{
    AllocationOutcome, Doctor, DoctorProfile, DoctorSchedule, Occupant, Placement, Slot, SlotTime,
    SlotView, SystemStats, Token, TokenSource, TokenStatus,
};
use crate::services::waiting_queue::WaitingQueue;

/// Hour offsets tried when the preferred slot cannot take a token.
///
/// Two hours earlier is tried before one hour earlier. Reordering changes
/// which slot a token lands in; needs sign-off before switching to
/// closest-first.
pub const ALTERNATIVE_OFFSETS: [i32; 4] = [-2, -1, 1, 2];

/// Result of trying to seat one token in one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seating {
    Seated,
    Evicted(Uuid),
    SlotMissing,
    Full,
}

impl Seating {
    fn is_seated(self) -> bool {
        matches!(self, Seating::Seated | Seating::Evicted(_))
    }

    fn evicted(self) -> Option<Uuid> {
        match self {
            Seating::Evicted(id) => Some(id),
            _ => None,
        }
    }
}

/// Owns every doctor, slot, token and the waiting queue. All mutation goes
/// through the methods below; callers never see the raw containers.
#[derive(Debug, Default)]
pub struct AllocationEngine {
    doctors: HashMap<String, Doctor>,
    tokens: HashMap<Uuid, Token>,
    queue: WaitingQueue,
}

impl AllocationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // DOCTORS
    // ==========================================================================

    /// Stores the doctor and materialises one slot per working hour.
    /// Registering an existing id replaces the previous doctor and its slots.
    /// Tokens seated in the replaced slots stay in the registry with their
    /// status but no longer hold a seat.
    pub fn register_doctor(&mut self, profile: DoctorProfile) -> usize {
        let doctor = Doctor::new(profile);
        let slot_count = doctor.slots.len();
        let doctor_id = doctor.profile.id.clone();

        if let Some(previous) = self.doctors.insert(doctor_id.clone(), doctor) {
            let orphaned: usize = previous.slots.values().map(Slot::occupied).sum();
            warn!(
                "Doctor {} re-registered, previous slots discarded with {} seated tokens orphaned",
                doctor_id, orphaned
            );
        }
        info!("Registered doctor {} with {} slots", doctor_id, slot_count);

        slot_count
    }

    pub fn doctors(&self) -> Vec<DoctorProfile> {
        let mut profiles: Vec<DoctorProfile> =
            self.doctors.values().map(|d| d.profile.clone()).collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        profiles
    }

    // ==========================================================================
    // ALLOCATION
    // ==========================================================================

    /// Places a new token in `preferred_time`, else in a neighbouring slot,
    /// else at the tail of the waiting queue.
    pub fn allocate(
        &mut self,
        patient_id: &str,
        doctor_id: &str,
        preferred_time: SlotTime,
        source: TokenSource,
    ) -> Result<AllocationOutcome, AllocationError> {
        if !self.doctors.contains_key(doctor_id) {
            return Err(AllocationError::DoctorNotFound(doctor_id.to_string()));
        }

        let mut token = Token::new(patient_id, doctor_id, preferred_time, source);
        debug!(
            "Allocating token {} for patient {} with doctor {} at {} (source {}, priority {})",
            token.id, patient_id, doctor_id, preferred_time, source, token.priority
        );

        let seating = self.try_place(&token, preferred_time);
        if seating.is_seated() {
            info!("Token {} placed at {} for doctor {}", token.id, preferred_time, doctor_id);
            self.tokens.insert(token.id, token.clone());
            return Ok(AllocationOutcome {
                success: true,
                placement: Placement::Direct { slot_time: preferred_time },
                token,
                message: "Token allocated in requested slot".to_string(),
                evicted_token_id: seating.evicted(),
                replayed: Vec::new(),
            });
        }

        if let Some(alternative) = self.find_alternative(doctor_id, preferred_time, token.priority) {
            let seating = self.try_place(&token, alternative);
            if seating.is_seated() {
                info!(
                    "Token {} placed at alternative {} (requested {}) for doctor {}",
                    token.id, alternative, preferred_time, doctor_id
                );
                token.slot_time = alternative;
                self.tokens.insert(token.id, token.clone());
                return Ok(AllocationOutcome {
                    success: true,
                    placement: Placement::Alternative {
                        requested: preferred_time,
                        slot_time: alternative,
                    },
                    token,
                    message: "Alternative slot used".to_string(),
                    evicted_token_id: seating.evicted(),
                    replayed: Vec::new(),
                });
            }
        }

        let position = self.queue.push_back(token.id);
        info!(
            "No slot for token {} with doctor {}, queued at position {}",
            token.id, doctor_id, position
        );
        self.tokens.insert(token.id, token.clone());

        Ok(AllocationOutcome {
            success: true,
            placement: Placement::Queued { position },
            token,
            message: "Slot full, token added to waiting queue".to_string(),
            evicted_token_id: None,
            replayed: Vec::new(),
        })
    }

    /// First neighbouring slot, in [`ALTERNATIVE_OFFSETS`] order, that could
    /// take a token of `priority`. The first match wins even when a closer
    /// slot would also fit.
    pub fn find_alternative(
        &self,
        doctor_id: &str,
        preferred_time: SlotTime,
        priority: u8,
    ) -> Option<SlotTime> {
        let doctor = self.doctors.get(doctor_id)?;
        let base = SlotTime::from_hour(preferred_time.hour())?;

        ALTERNATIVE_OFFSETS
            .iter()
            .filter_map(|offset| base.offset_hours(*offset))
            .find(|candidate| {
                let admits = doctor
                    .slots
                    .get(candidate)
                    .map(|slot| slot.admits(priority))
                    .unwrap_or(false);
                debug!("Checking {} for doctor {}: {}", candidate, doctor_id, admits);
                admits
            })
    }

    /// Emergency tokens only ever try the slot they ask for. They may bump
    /// anyone below emergency priority who has not yet been seen; a slot full
    /// of emergencies refuses.
    pub fn insert_emergency(
        &mut self,
        patient_id: &str,
        doctor_id: &str,
        urgent_time: SlotTime,
    ) -> Result<AllocationOutcome, AllocationError> {
        let doctor = self
            .doctors
            .get(doctor_id)
            .ok_or_else(|| AllocationError::DoctorNotFound(doctor_id.to_string()))?;
        if !doctor.slots.contains_key(&urgent_time) {
            warn!("Emergency for doctor {} at {} outside working hours", doctor_id, urgent_time);
            return Err(AllocationError::SlotNotFound {
                doctor_id: doctor_id.to_string(),
                slot_time: urgent_time,
            });
        }

        let token = Token::new(patient_id, doctor_id, urgent_time, TokenSource::Emergency);
        let seating = self.try_place(&token, urgent_time);
        if !seating.is_seated() {
            warn!(
                "Emergency for doctor {} at {} rejected, no seat can be freed",
                doctor_id, urgent_time
            );
            return Err(AllocationError::NoCapacity {
                doctor_id: doctor_id.to_string(),
                slot_time: urgent_time,
            });
        }

        info!("Emergency token {} placed at {} for doctor {}", token.id, urgent_time, doctor_id);
        self.tokens.insert(token.id, token.clone());
        let replayed = self.replay_queue();

        Ok(AllocationOutcome {
            success: true,
            placement: Placement::Direct { slot_time: urgent_time },
            token,
            message: "Emergency token inserted".to_string(),
            evicted_token_id: seating.evicted(),
            replayed,
        })
    }

    // ==========================================================================
    // CANCELLATION AND STATUS
    // ==========================================================================

    /// Frees the token's seat (or queue entry), marks it cancelled and replays
    /// the waiting queue. The token stays in the registry.
    pub fn cancel(&mut self, token_id: Uuid) -> Result<AllocationOutcome, AllocationError> {
        let token = self
            .tokens
            .get(&token_id)
            .ok_or(AllocationError::TokenNotFound(token_id))?;
        if !token.status.can_transition_to(&TokenStatus::Cancelled) {
            return Err(AllocationError::InvalidStatusTransition {
                from: token.status,
                to: TokenStatus::Cancelled,
            });
        }

        let released = self
            .doctors
            .get_mut(&token.doctor_id)
            .and_then(|doctor| doctor.slots.get_mut(&token.slot_time))
            .map(|slot| slot.release(token_id))
            .unwrap_or(false);
        let dequeued = self.queue.remove(token_id);
        debug!("Cancelling token {}: released seat {}, left queue {}", token_id, released, dequeued);

        if let Some(token) = self.tokens.get_mut(&token_id) {
            token.status = TokenStatus::Cancelled;
        }
        info!("Token {} cancelled", token_id);

        let replayed = self.replay_queue();
        let token = self.get_token(token_id)?;

        Ok(AllocationOutcome {
            success: true,
            placement: Placement::Released,
            token,
            message: "Token cancelled".to_string(),
            evicted_token_id: None,
            replayed,
        })
    }

    /// Moves a seated token to confirmed, completed or no-show. Cancellation
    /// goes through [`AllocationEngine::cancel`].
    pub fn update_status(
        &mut self,
        token_id: Uuid,
        status: TokenStatus,
    ) -> Result<Token, AllocationError> {
        if status == TokenStatus::Cancelled {
            return self.cancel(token_id).map(|outcome| outcome.token);
        }

        let token = self
            .tokens
            .get(&token_id)
            .ok_or(AllocationError::TokenNotFound(token_id))?;
        if !token.status.can_transition_to(&status) {
            return Err(AllocationError::InvalidStatusTransition {
                from: token.status,
                to: status,
            });
        }
        if self.queue.contains(token_id) {
            return Err(AllocationError::ValidationError(format!(
                "token {} is still waiting for a slot",
                token_id
            )));
        }

        if status.is_terminal() {
            let settled = self
                .doctors
                .get_mut(&token.doctor_id)
                .and_then(|doctor| doctor.slots.get_mut(&token.slot_time))
                .map(|slot| slot.settle(token_id))
                .unwrap_or(false);
            debug!("Token {} settled in its slot: {}", token_id, settled);
        }

        let token = self
            .tokens
            .get_mut(&token_id)
            .ok_or(AllocationError::TokenNotFound(token_id))?;
        info!("Token {} status {} -> {}", token_id, token.status, status);
        token.status = status;

        Ok(token.clone())
    }

    // ==========================================================================
    // WAITING QUEUE
    // ==========================================================================

    /// One left-to-right pass over the queue. Each token goes to the first
    /// slot of its doctor, by ascending hour, that could take it. Tokens
    /// bumped during the pass land behind the leftovers and wait for the next
    /// call.
    pub fn replay_queue(&mut self) -> Vec<Token> {
        let pending = self.queue.take_all();
        if pending.is_empty() {
            return Vec::new();
        }

        let mut remaining = Vec::with_capacity(pending.len());
        let mut placed = Vec::new();

        for token_id in pending {
            let Some(token) = self.tokens.get(&token_id).cloned() else {
                warn!("Queued token {} missing from registry, dropping", token_id);
                continue;
            };

            let target = self.first_admitting_slot(&token.doctor_id, token.priority);
            let seated = match target {
                Some(slot_time) => self.try_place(&token, slot_time).is_seated().then_some(slot_time),
                None => None,
            };

            match (seated, self.tokens.get_mut(&token_id)) {
                (Some(slot_time), Some(entry)) => {
                    entry.slot_time = slot_time;
                    info!("Replay placed token {} at {}", token_id, slot_time);
                    placed.push(entry.clone());
                }
                _ => remaining.push(token_id),
            }
        }

        self.queue.restore_front(remaining);
        debug!("Replay placed {} tokens, {} still queued", placed.len(), self.queue.len());

        placed
    }

    pub fn waiting_queue(&self) -> Vec<Token> {
        self.queue
            .iter()
            .filter_map(|id| self.tokens.get(id).cloned())
            .collect()
    }

    // ==========================================================================
    // READ VIEWS
    // ==========================================================================

    pub fn get_token(&self, token_id: Uuid) -> Result<Token, AllocationError> {
        self.tokens
            .get(&token_id)
            .cloned()
            .ok_or(AllocationError::TokenNotFound(token_id))
    }

    /// Per-slot view in start-time order. Tokens are listed by descending
    /// priority for display; seating order is unaffected.
    pub fn doctor_schedule(&self, doctor_id: &str) -> Result<DoctorSchedule, AllocationError> {
        let doctor = self
            .doctors
            .get(doctor_id)
            .ok_or_else(|| AllocationError::DoctorNotFound(doctor_id.to_string()))?;

        let slots = doctor
            .slots
            .values()
            .map(|slot| {
                let mut tokens: Vec<Token> = slot
                    .occupants()
                    .iter()
                    .filter_map(|o| self.tokens.get(&o.token_id).cloned())
                    .collect();
                tokens.sort_by(|a, b| b.priority.cmp(&a.priority));

                SlotView {
                    slot_time: slot.start_time,
                    end_time: slot.end_time,
                    capacity: slot.max_capacity,
                    occupied: slot.occupied(),
                    available: slot.available_capacity(),
                    tokens,
                }
            })
            .collect();

        Ok(DoctorSchedule {
            doctor: doctor.profile.clone(),
            slots,
        })
    }

    pub fn system_stats(&self) -> SystemStats {
        let slots = self.doctors.values().flat_map(|d| d.slots.values());

        let mut total_slots = 0;
        let mut occupied_slots = 0;
        let mut total_capacity = 0;
        let mut total_occupied = 0;
        for slot in slots {
            total_slots += 1;
            total_capacity += slot.max_capacity;
            total_occupied += slot.occupied();
            if slot.occupied() > 0 {
                occupied_slots += 1;
            }
        }

        let utilization_percent = if total_capacity == 0 {
            0.0
        } else {
            total_occupied as f64 / total_capacity as f64 * 100.0
        };

        SystemStats {
            total_doctors: self.doctors.len(),
            total_slots,
            occupied_slots,
            total_capacity,
            total_occupied,
            queue_length: self.queue.len(),
            total_tokens: self.tokens.len(),
            cancelled_tokens: self
                .tokens
                .values()
                .filter(|t| t.status == TokenStatus::Cancelled)
                .count(),
            utilization_percent,
        }
    }

    // ==========================================================================
    // PLACEMENT
    // ==========================================================================

    /// Seats `token` in its doctor's `slot_time` slot. A full slot gives up
    /// its lowest unsettled occupant strictly below the token's priority,
    /// earliest seated first; that occupant goes to the tail of the waiting
    /// queue.
    fn try_place(&mut self, token: &Token, slot_time: SlotTime) -> Seating {
        let Some(slot) = self
            .doctors
            .get_mut(&token.doctor_id)
            .and_then(|doctor| doctor.slots.get_mut(&slot_time))
        else {
            return Seating::SlotMissing;
        };

        let occupant = Occupant::new(token.id, token.priority);

        if slot.has_capacity() {
            return if slot.seat(occupant) {
                Seating::Seated
            } else {
                Seating::Full
            };
        }

        let Some(index) = slot.eviction_candidate(token.priority) else {
            debug!("Slot {} full with no occupant below priority {}", slot_time, token.priority);
            return Seating::Full;
        };

        let evicted = slot.evict_at(index);
        if !slot.seat(occupant) {
            return Seating::Full;
        }
        self.queue.push_back(evicted.token_id);
        info!(
            "Token {} (priority {}) bumped token {} (priority {}) from {}",
            token.id, token.priority, evicted.token_id, evicted.priority, slot_time
        );

        Seating::Evicted(evicted.token_id)
    }

    fn first_admitting_slot(&self, doctor_id: &str, priority: u8) -> Option<SlotTime> {
        self.doctors
            .get(doctor_id)?
            .slots
            .values()
            .find(|slot| slot.admits(priority))
            .map(|slot| slot.start_time)
    }
}
