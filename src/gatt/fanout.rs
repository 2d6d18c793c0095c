use tracing::trace;

use crate::att::{EventType, Handle};
use crate::kernel::{ConnIdx, TaskId, Value};

/// Fan-out progress.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    /// Send the event to the specified connection and call
    /// [`FanOut::next`] again when the transport completes it.
    Send(ConnIdx),
    /// Every connection was visited.
    Done,
}

/// Delivery of one notification or indication to all subscribed
/// connections, one connection at a time.
#[derive(Debug)]
pub struct FanOut {
    typ: EventType,
    hdl: Handle,
    val: Value,
    cursor: u8,
    max: u8,
    excluded: Option<ConnIdx>,
    requester: TaskId,
    sent: usize,
}

impl FanOut {
    /// Creates a fan-out operation over connections `0..max`.
    #[must_use]
    pub const fn new(
        typ: EventType,
        hdl: Handle,
        val: Value,
        max: u8,
        excluded: Option<ConnIdx>,
        requester: TaskId,
    ) -> Self {
        Self {
            typ,
            hdl,
            val,
            cursor: 0,
            max,
            excluded,
            requester,
            sent: 0,
        }
    }

    /// Advances the cursor to the next subscribed connection that is not
    /// excluded.
    pub fn next(&mut self, mut subscribed: impl FnMut(ConnIdx) -> bool) -> Step {
        while self.cursor < self.max {
            let c = ConnIdx::new(self.cursor);
            self.cursor += 1;
            if self.excluded == Some(c) || !subscribed(c) {
                continue;
            }
            trace!("{} {} -> {c}", self.typ, self.hdl);
            self.sent += 1;
            return Step::Send(c);
        }
        Step::Done
    }

    /// Returns the event type.
    #[inline(always)]
    #[must_use]
    pub const fn typ(&self) -> EventType {
        self.typ
    }

    /// Returns the characteristic value handle.
    #[inline(always)]
    #[must_use]
    pub const fn hdl(&self) -> Handle {
        self.hdl
    }

    /// Returns the event payload.
    #[inline(always)]
    #[must_use]
    pub const fn val(&self) -> &Value {
        &self.val
    }

    /// Returns the task that submitted the operation.
    #[inline(always)]
    #[must_use]
    pub const fn requester(&self) -> TaskId {
        self.requester
    }

    /// Returns the number of sends issued so far.
    #[inline(always)]
    #[must_use]
    pub const fn sent(&self) -> usize {
        self.sent
    }
}
