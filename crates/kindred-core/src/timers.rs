use std::collections::BTreeMap;

use crate::profile::ProfileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind {
    /// Exit animation of the top card in the stack with this generation.
    StackExit { stack_generation: u64 },
    /// Removal of a confirmed friend-request row.
    RequestRemoval { request_id: ProfileId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTimer {
    pub kind: TimerKind,
    pub delay_ms: u64,
}

/// Timers the host has been asked to run.
///
/// Firing an id that was cancelled (or already fired) yields nothing, which
/// is what makes teardown mid-timer safe.
#[derive(Debug, Clone)]
pub struct TimerQueue {
    next_id: u64,
    pending: BTreeMap<TimerId, PendingTimer>,
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self {
            next_id: 1,
            pending: BTreeMap::new(),
        }
    }
}

impl TimerQueue {
    pub fn schedule(&mut self, kind: TimerKind, delay_ms: u64) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert(id, PendingTimer { kind, delay_ms });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn cancel_where(&mut self, mut pred: impl FnMut(&TimerKind) -> bool) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, timer| !pred(&timer.kind));
        before - self.pending.len()
    }

    pub fn take(&mut self, id: TimerId) -> Option<TimerKind> {
        self.pending.remove(&id).map(|timer| timer.kind)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
