use std::collections::VecDeque;

use uuid::Uuid;

/// Holding area for tokens that have no seat.
///
/// Order is insertion order only. Nothing here ever sorts by priority:
/// a bumped token goes to the tail at the moment it is bumped, and a replay
/// pass keeps the still-unplaced tokens in their original relative order.
#[derive(Debug, Clone, Default)]
pub struct WaitingQueue {
    entries: VecDeque<Uuid>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends at the tail and returns the zero-based position.
    pub fn push_back(&mut self, token_id: Uuid) -> usize {
        self.entries.push_back(token_id);
        self.entries.len() - 1
    }

    pub fn contains(&self, token_id: Uuid) -> bool {
        self.entries.contains(&token_id)
    }

    pub fn position(&self, token_id: Uuid) -> Option<usize> {
        self.entries.iter().position(|id| *id == token_id)
    }

    pub fn remove(&mut self, token_id: Uuid) -> bool {
        match self.position(token_id) {
            Some(index) => self.entries.remove(index).is_some(),
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Uuid> {
        self.entries.iter()
    }

    /// Empties the queue, handing back its contents front to back.
    pub fn take_all(&mut self) -> Vec<Uuid> {
        self.entries.drain(..).collect()
    }

    /// Puts `remaining` back ahead of anything queued since [`take_all`].
    ///
    /// [`take_all`]: WaitingQueue::take_all
    pub fn restore_front(&mut self, remaining: Vec<Uuid>) {
        let appended = std::mem::take(&mut self.entries);
        self.entries = remaining.into_iter().chain(appended).collect();
    }
}
