use tokio::time::Instant;
use tracing::trace;

use super::TaskId;

/// Task-defined timer identifier. Identifiers are scoped to the owning task
/// instance.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TimerId(pub u8);

/// Timer request issued by a handler.
#[derive(Clone, Copy, Debug)]
pub(super) enum TimerOp {
    Set {
        owner: TaskId,
        id: TimerId,
        at: Instant,
    },
    Clear {
        owner: TaskId,
        id: TimerId,
    },
}

impl TimerOp {
    /// Returns the timer owner and identifier.
    #[inline]
    pub const fn key(&self) -> (TaskId, TimerId) {
        match *self {
            Self::Set { owner, id, .. } | Self::Clear { owner, id } => (owner, id),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Timer {
    at: Instant,
    owner: TaskId,
    id: TimerId,
}

/// One-shot timers of all task instances.
#[derive(Debug, Default)]
pub(super) struct Timers {
    list: Vec<Timer>,
}

impl Timers {
    /// Applies a timer request.
    pub fn apply(&mut self, op: TimerOp) {
        match op {
            TimerOp::Set { owner, id, at } => {
                self.clear(owner, id);
                trace!("Timer {id:?} set for {owner}");
                self.list.push(Timer { at, owner, id });
            }
            TimerOp::Clear { owner, id } => {
                if self.clear(owner, id) {
                    trace!("Timer {id:?} cleared for {owner}");
                }
            }
        }
    }

    /// Cancels timer `id` of `owner`. Returns whether the timer was active.
    fn clear(&mut self, owner: TaskId, id: TimerId) -> bool {
        let n = self.list.len();
        self.list.retain(|t| !(t.owner == owner && t.id == id));
        self.list.len() != n
    }

    /// Cancels all timers owned by instances matching `f`.
    pub fn clear_owners(&mut self, f: impl Fn(TaskId) -> bool) {
        self.list.retain(|t| !f(t.owner));
    }

    /// Returns the earliest deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.list.iter().map(|t| t.at).min()
    }

    /// Removes all timers expiring at or before `now`, returning them in
    /// deadline order.
    pub fn expire(&mut self, now: Instant) -> Vec<(TaskId, TimerId)> {
        let mut due = Vec::new();
        self.list.retain(|&t| {
            let exp = t.at <= now;
            if exp {
                due.push(t);
            }
            !exp
        });
        due.sort_by_key(|t| t.at);
        due.into_iter().map(|t| (t.owner, t.id)).collect()
    }

    /// Returns the number of active timers.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }
}
