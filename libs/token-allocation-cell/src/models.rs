use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::AllocationError;

/// Every slot seats exactly this many tokens, regardless of doctor.
pub const SLOT_CAPACITY: usize = 10;

// ==============================================================================
// TOKEN SOURCES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Emergency,
    Priority,
    Followup,
    Online,
    Walkin,
}

impl TokenSource {
    pub const ALL: [TokenSource; 5] = [
        TokenSource::Emergency,
        TokenSource::Priority,
        TokenSource::Followup,
        TokenSource::Online,
        TokenSource::Walkin,
    ];

    pub fn priority(self) -> u8 {
        match self {
            TokenSource::Emergency => 10,
            TokenSource::Priority => 8,
            TokenSource::Followup => 6,
            TokenSource::Online => 4,
            TokenSource::Walkin => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TokenSource::Emergency => "emergency",
            TokenSource::Priority => "priority",
            TokenSource::Followup => "followup",
            TokenSource::Online => "online",
            TokenSource::Walkin => "walkin",
        }
    }

    /// Resolves a free-form source tag. Matching ignores case and surrounding
    /// whitespace; anything unrecognised is treated as a walk-in, which is the
    /// documented default rather than an error.
    pub fn from_tag(tag: &str) -> Self {
        Self::recognize(tag).unwrap_or(TokenSource::Walkin)
    }

    /// Strict variant of [`TokenSource::from_tag`].
    pub fn recognize(tag: &str) -> Option<Self> {
        let normalized = tag.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == normalized)
    }
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// TOKEN STATUS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Allocated,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl TokenStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TokenStatus::Cancelled | TokenStatus::Completed | TokenStatus::NoShow)
    }

    pub fn can_transition_to(&self, target: &TokenStatus) -> bool {
        use TokenStatus::*;
        match (self, target) {
            (Allocated, Confirmed) => true,
            (Allocated | Confirmed, Completed) => true,
            (Allocated | Confirmed, NoShow) => true,
            (Allocated | Confirmed, Cancelled) => true,
            (Cancelled, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TokenStatus::Allocated => "allocated",
            TokenStatus::Confirmed => "confirmed",
            TokenStatus::Cancelled => "cancelled",
            TokenStatus::Completed => "completed",
            TokenStatus::NoShow => "no_show",
        };
        f.write_str(label)
    }
}

// ==============================================================================
// SLOT TIME
// ==============================================================================

/// Time of day a slot starts at. Displayed and serialised as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn from_hour(hour: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, 0, 0).map(SlotTime)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    /// End of the one-hour interval starting here. Wraps past midnight.
    pub fn end(&self) -> SlotTime {
        SlotTime(self.0 + chrono::Duration::hours(1))
    }

    /// The slot `offset` hours away on the same day, if any.
    pub fn offset_hours(&self, offset: i32) -> Option<SlotTime> {
        let hour = i64::from(self.hour()) + i64::from(offset);
        if !(0..24).contains(&hour) {
            return None;
        }
        u32::try_from(hour).ok().and_then(SlotTime::from_hour)
    }
}

impl FromStr for SlotTime {
    type Err = AllocationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        NaiveTime::parse_from_str(trimmed, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
            .map(|time| SlotTime(time.with_second(0).unwrap_or(time)))
            .map_err(|_| AllocationError::InvalidSlotTime(raw.to_string()))
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// TOKEN
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
    pub patient_id: String,
    pub doctor_id: String,
    pub slot_time: SlotTime,
    pub source: TokenSource,
    pub priority: u8,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
}

impl Token {
    pub fn new(patient_id: &str, doctor_id: &str, slot_time: SlotTime, source: TokenSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            slot_time,
            source,
            priority: source.priority(),
            status: TokenStatus::Allocated,
            created_at: Utc::now(),
        }
    }
}

// ==============================================================================
// SLOT
// ==============================================================================

/// A seat in a slot. The priority is copied from the token, which never
/// changes it after creation. Settled occupants (completed or no-show) hold
/// their seat and are never evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub token_id: Uuid,
    pub priority: u8,
    pub settled: bool,
}

impl Occupant {
    pub fn new(token_id: Uuid, priority: u8) -> Self {
        Self { token_id, priority, settled: false }
    }
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub doctor_id: String,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
    pub max_capacity: usize,
    occupants: Vec<Occupant>,
}

impl Slot {
    pub fn new(doctor_id: &str, start_time: SlotTime) -> Self {
        Self {
            doctor_id: doctor_id.to_string(),
            start_time,
            end_time: start_time.end(),
            max_capacity: SLOT_CAPACITY,
            occupants: Vec::with_capacity(SLOT_CAPACITY),
        }
    }

    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    pub fn occupied(&self) -> usize {
        self.occupants.len()
    }

    pub fn available_capacity(&self) -> usize {
        self.max_capacity.saturating_sub(self.occupants.len())
    }

    pub fn has_capacity(&self) -> bool {
        self.available_capacity() > 0
    }

    pub fn contains(&self, token_id: Uuid) -> bool {
        self.occupants.iter().any(|o| o.token_id == token_id)
    }

    /// Index of the lowest-priority unsettled occupant strictly below
    /// `priority`. Among equal minimums the earliest seated one wins.
    pub fn eviction_candidate(&self, priority: u8) -> Option<usize> {
        let mut candidate: Option<(usize, u8)> = None;
        for (index, occupant) in self.occupants.iter().enumerate() {
            if occupant.settled || occupant.priority >= priority {
                continue;
            }
            match candidate {
                Some((_, lowest)) if occupant.priority >= lowest => {}
                _ => candidate = Some((index, occupant.priority)),
            }
        }
        candidate.map(|(index, _)| index)
    }

    /// Whether a token of `priority` could be seated here, directly or by
    /// evicting someone.
    pub fn admits(&self, priority: u8) -> bool {
        self.has_capacity() || self.eviction_candidate(priority).is_some()
    }

    pub(crate) fn seat(&mut self, occupant: Occupant) -> bool {
        if !self.has_capacity() || self.contains(occupant.token_id) {
            return false;
        }
        self.occupants.push(occupant);
        true
    }

    pub(crate) fn evict_at(&mut self, index: usize) -> Occupant {
        self.occupants.remove(index)
    }

    /// Marks the occupant as settled so it keeps its seat from now on.
    pub(crate) fn settle(&mut self, token_id: Uuid) -> bool {
        match self.occupants.iter_mut().find(|o| o.token_id == token_id) {
            Some(occupant) => {
                occupant.settled = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn release(&mut self, token_id: Uuid) -> bool {
        let before = self.occupants.len();
        self.occupants.retain(|o| o.token_id != token_id);
        self.occupants.len() != before
    }
}

// ==============================================================================
// DOCTOR
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: String,
    pub name: String,
    pub specialization: String,
    pub working_hours_start: u32,
    pub working_hours_end: u32,
}

#[derive(Debug, Clone)]
pub struct Doctor {
    pub profile: DoctorProfile,
    pub slots: BTreeMap<SlotTime, Slot>,
}

impl Doctor {
    /// Materialises one slot per whole hour in `[start, end)`. Hours past
    /// midnight are dropped.
    pub fn new(profile: DoctorProfile) -> Self {
        let slots = (profile.working_hours_start..profile.working_hours_end)
            .filter_map(SlotTime::from_hour)
            .map(|start| (start, Slot::new(&profile.id, start)))
            .collect();
        Self { profile, slots }
    }
}

// ==============================================================================
// OUTCOMES AND VIEWS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    /// Seated in the requested slot.
    Direct { slot_time: SlotTime },
    /// Seated in a neighbouring slot.
    Alternative { requested: SlotTime, slot_time: SlotTime },
    /// Appended to the waiting queue at `position` (zero-based).
    Queued { position: usize },
    /// Taken out of circulation by a cancellation.
    Released,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub success: bool,
    pub placement: Placement,
    pub token: Token,
    pub message: String,
    pub evicted_token_id: Option<Uuid>,
    pub replayed: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotView {
    pub slot_time: SlotTime,
    pub end_time: SlotTime,
    pub capacity: usize,
    pub occupied: usize,
    pub available: usize,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub doctor: DoctorProfile,
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_doctors: usize,
    pub total_slots: usize,
    pub occupied_slots: usize,
    pub total_capacity: usize,
    pub total_occupied: usize,
    pub queue_length: usize,
    pub total_tokens: usize,
    pub cancelled_tokens: usize,
    pub utilization_percent: f64,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDoctorRequest {
    pub id: String,
    pub name: String,
    pub specialization: Option<String>,
    pub working_hours_start: u32,
    pub working_hours_end: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateTokenRequest {
    pub patient_id: String,
    pub doctor_id: String,
    pub slot_time: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyTokenRequest {
    pub patient_id: String,
    pub doctor_id: String,
    pub slot_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TokenStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_table() {
        assert_eq!(TokenSource::Emergency.priority(), 10);
        assert_eq!(TokenSource::Priority.priority(), 8);
        assert_eq!(TokenSource::Followup.priority(), 6);
        assert_eq!(TokenSource::Online.priority(), 4);
        assert_eq!(TokenSource::Walkin.priority(), 2);
    }

    #[test]
    fn test_unknown_source_defaults_to_walkin() {
        assert_eq!(TokenSource::from_tag("Online"), TokenSource::Online);
        assert_eq!(TokenSource::from_tag(" followup "), TokenSource::Followup);
        assert_eq!(TokenSource::from_tag("vip"), TokenSource::Walkin);
        assert_eq!(TokenSource::from_tag(""), TokenSource::Walkin);
        assert_eq!(TokenSource::recognize("vip"), None);
    }

    #[test]
    fn test_slot_time_parsing() {
        let time: SlotTime = "09:00".parse().unwrap();
        assert_eq!(time.hour(), 9);
        assert_eq!(time.to_string(), "09:00");
        assert_eq!("9:00:00".parse::<SlotTime>().unwrap(), time);
        assert_eq!("14:30".parse::<SlotTime>().unwrap().to_string(), "14:30");
        assert!("25:00".parse::<SlotTime>().is_err());
        assert!("nine".parse::<SlotTime>().is_err());
    }

    #[test]
    fn test_slot_time_offsets_stay_within_day() {
        let early = SlotTime::from_hour(1).unwrap();
        assert_eq!(early.offset_hours(-2), None);
        assert_eq!(early.offset_hours(-1), SlotTime::from_hour(0));
        let late = SlotTime::from_hour(23).unwrap();
        assert_eq!(late.offset_hours(1), None);
    }

    #[test]
    fn test_status_transitions() {
        assert!(TokenStatus::Allocated.can_transition_to(&TokenStatus::Confirmed));
        assert!(TokenStatus::Confirmed.can_transition_to(&TokenStatus::Completed));
        assert!(TokenStatus::Cancelled.can_transition_to(&TokenStatus::Cancelled));
        assert!(!TokenStatus::Completed.can_transition_to(&TokenStatus::Cancelled));
        assert!(!TokenStatus::Confirmed.can_transition_to(&TokenStatus::Allocated));
        assert!(TokenStatus::NoShow.is_terminal());
    }

    #[test]
    fn test_eviction_candidate_prefers_earliest_lowest() {
        let mut slot = Slot::new("D1", SlotTime::from_hour(9).unwrap());
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for (id, priority) in ids.iter().zip([6u8, 2, 4, 2]) {
            assert!(slot.seat(Occupant::new(*id, priority)));
        }
        assert_eq!(slot.eviction_candidate(8), Some(1));
        assert_eq!(slot.eviction_candidate(2), None);
        assert!(slot.admits(2));
    }

    #[test]
    fn test_settled_occupants_are_never_evicted() {
        let mut slot = Slot::new("D1", SlotTime::from_hour(9).unwrap());
        let ids: Vec<Uuid> = (0..SLOT_CAPACITY).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            assert!(slot.seat(Occupant::new(*id, 2)));
        }

        assert!(slot.settle(ids[0]));
        assert_eq!(slot.eviction_candidate(8), Some(1));

        for id in &ids[1..] {
            assert!(slot.settle(*id));
        }
        assert_eq!(slot.eviction_candidate(10), None);
        assert!(!slot.admits(10));
        assert!(!slot.settle(Uuid::new_v4()));
    }

    #[test]
    fn test_doctor_materialises_hourly_slots() {
        let doctor = Doctor::new(DoctorProfile {
            id: "D1".to_string(),
            name: "Dr. Test".to_string(),
            specialization: "General".to_string(),
            working_hours_start: 9,
            working_hours_end: 12,
        });
        let keys: Vec<String> = doctor.slots.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["09:00", "10:00", "11:00"]);
        assert!(doctor.slots.values().all(|s| s.max_capacity == SLOT_CAPACITY));
    }
}
