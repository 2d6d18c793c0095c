use std::fmt::{Debug, Formatter};
use std::time::Duration;

use smallvec::SmallVec;
use tokio::time::Instant;
use tracing::trace;

use super::*;

/// Outcome of handling a message.
#[derive(Debug)]
#[must_use]
pub enum Disposition {
    /// The message was processed and can be freed.
    Consumed,
    /// The handler took ownership of the message, typically to keep the
    /// request of a multi-step procedure until its completion.
    Retained,
    /// The message cannot be processed in the current state. It is
    /// re-delivered ahead of other queued messages after the instance state
    /// changes.
    Saved(Envelope),
}

/// Message handler of task `T`.
pub type Handler<T> = fn(&mut T, &mut Context<'_, <T as Task>::State>, Envelope) -> Disposition;

type Table<T> = SmallVec<[(MsgKind, Handler<T>); 8]>;

/// Handler table of task `T`. Handlers registered for a specific state take
/// precedence over default handlers, which apply in every state.
pub struct Handlers<T: Task> {
    states: SmallVec<[(T::State, Table<T>); 4]>,
    default: Table<T>,
}

impl<T: Task> Handlers<T> {
    /// Creates an empty handler table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: SmallVec::new(),
            default: SmallVec::new(),
        }
    }

    /// Registers handler `h` for messages of kind `k` in state `s`.
    #[must_use]
    pub fn on(mut self, s: T::State, k: MsgKind, h: Handler<T>) -> Self {
        if let Some((_, t)) = self.states.iter_mut().find(|(st, _)| *st == s) {
            t.push((k, h));
        } else {
            self.states.push((s, SmallVec::from_iter([(k, h)])));
        }
        self
    }

    /// Registers handler `h` for messages of kind `k` in every state.
    #[must_use]
    pub fn any(mut self, k: MsgKind, h: Handler<T>) -> Self {
        self.default.push((k, h));
        self
    }

    /// Returns the handler for messages of kind `k` in state `s`.
    #[must_use]
    pub fn lookup(&self, s: T::State, k: MsgKind) -> Option<Handler<T>> {
        let find = |t: &Table<T>| t.iter().find(|(tk, _)| *tk == k).map(|&(_, h)| h);
        (self.states.iter().find(|(st, _)| *st == s))
            .and_then(|(_, t)| find(t))
            .or_else(|| find(&self.default))
    }
}

impl<T: Task> Default for Handlers<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Task> Debug for Handlers<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut m = f.debug_map();
        for (s, t) in &self.states {
            m.entry(s, &t.iter().map(|(k, _)| k).collect::<SmallVec<[_; 8]>>());
        }
        let default: SmallVec<[_; 8]> = self.default.iter().map(|(k, _)| k).collect();
        m.entry(&"default", &default);
        m.finish()
    }
}

/// Messages and timer requests produced by a handler.
#[derive(Debug, Default)]
pub(super) struct Outbox {
    pub msgs: Vec<Envelope>,
    pub timers: Vec<TimerOp>,
}

/// Execution context of a task instance.
#[derive(Debug)]
pub struct Context<'a, S> {
    id: TaskId,
    state: &'a mut S,
    out: &'a mut Outbox,
}

impl<'a, S> Context<'a, S> {
    #[inline]
    pub(super) fn new(id: TaskId, state: &'a mut S, out: &'a mut Outbox) -> Self {
        Self { id, state, out }
    }
}

impl<S: Copy + Debug + Eq> Context<'_, S> {
    /// Returns the instance reference.
    #[inline(always)]
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the instance index interpreted as a connection index.
    #[inline(always)]
    #[must_use]
    pub const fn conn(&self) -> ConnIdx {
        self.id.conn()
    }

    /// Returns the current state.
    #[inline(always)]
    #[must_use]
    pub fn state(&self) -> S {
        *self.state
    }

    /// Changes the instance state. Messages saved by the instance are
    /// re-delivered once the current handler returns.
    pub fn set_state(&mut self, s: S) {
        if *self.state != s {
            trace!("{}: {:?} -> {s:?}", self.id, *self.state);
            *self.state = s;
        }
    }

    /// Sends a message to task `dst`.
    #[inline]
    pub fn send(&mut self, dst: TaskId, msg: Msg) {
        self.out.msgs.push(Envelope::new(self.id, dst, msg));
    }

    /// Sends a message to the sender of `req`.
    #[inline]
    pub fn reply(&mut self, req: &Envelope, msg: Msg) {
        self.send(req.src(), msg);
    }

    /// Starts or restarts a one-shot timer that posts [`Msg::Timer`] to this
    /// instance after `d`.
    pub fn set_timer(&mut self, id: TimerId, d: Duration) {
        (self.out.timers).push(TimerOp::Set {
            owner: self.id,
            id,
            at: Instant::now() + d,
        });
    }

    /// Cancels a timer started by this instance.
    pub fn clear_timer(&mut self, id: TimerId) {
        (self.out.timers).push(TimerOp::Clear { owner: self.id, id });
    }
}
