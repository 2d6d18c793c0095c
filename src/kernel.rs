//! Cooperative message router for profile tasks.
//!
//! The kernel owns every registered [`Task`] together with the state of each
//! of its instances. Envelopes are dispatched one at a time in FIFO order to
//! the handler registered for the destination instance's current state.
//! Envelopes addressed to task types without a registered task are placed in
//! the outbound queue for external collaborators.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::mem;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

pub use {handler::*, msg::*, run::*, state::*, task::*, timer::TimerId};
use timer::{TimerOp, Timers};

mod handler;
mod msg;
mod run;
mod state;
mod task;
mod timer;

/// Framework configuration.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct Config {
    /// Maximum number of simultaneous connections, which is also the number
    /// of instances of each per-connection task.
    pub max_conn: u8,
    /// Client discovery and request timeout.
    pub disc_timeout: Duration,
    /// Queue length that triggers a warning.
    pub queue_warn: usize,
}

impl Config {
    /// ATT transaction timeout ([Vol 3] Part F, Section 3.3.3).
    pub const ATT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Sets the maximum number of connections.
    #[inline]
    #[must_use]
    pub const fn max_conn(mut self, n: u8) -> Self {
        self.max_conn = n;
        self
    }

    /// Sets the client discovery and request timeout.
    #[inline]
    #[must_use]
    pub const fn disc_timeout(mut self, d: Duration) -> Self {
        self.disc_timeout = d;
        self
    }

    /// Sets the queue length that triggers a warning.
    #[inline]
    #[must_use]
    pub const fn queue_warn(mut self, n: usize) -> Self {
        self.queue_warn = n;
        self
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            max_conn: 8,
            disc_timeout: Self::ATT_TIMEOUT,
            queue_warn: 64,
        }
    }
}

/// Message router and owner of all registered tasks.
#[derive(Debug)]
pub struct Kernel {
    cfg: Config,
    tasks: Vec<Option<Box<dyn AnyTask>>>,
    queue: VecDeque<Envelope>,
    outbound: VecDeque<Envelope>,
    timers: Timers,
    out: Outbox,
}

impl Kernel {
    /// Creates a kernel without any tasks.
    #[must_use]
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            tasks: (0..TaskType::COUNT).map(|_| None).collect(),
            queue: VecDeque::new(),
            outbound: VecDeque::new(),
            timers: Timers::default(),
            out: Outbox::default(),
        }
    }

    /// Returns the kernel configuration.
    #[inline(always)]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.cfg
    }

    /// Registers a task, replacing any existing task of the same type.
    pub fn register<T: Task>(&mut self, task: T) -> &mut Self {
        let n = if T::PER_CONN {
            usize::from(self.cfg.max_conn)
        } else {
            1
        };
        let slot = &mut self.tasks[T::TYPE as usize];
        if slot.is_some() {
            warn!("Replacing {} task", T::TYPE);
        }
        *slot = Some(Box::new(TaskSlot::new(task, n)));
        debug!("Registered {} with {n} instance(s)", T::TYPE);
        self
    }

    /// Posts an envelope. Envelopes for unregistered task types go to the
    /// outbound queue.
    pub fn post(&mut self, env: Envelope) {
        if self.tasks[env.dst().typ as usize].is_none() {
            trace!("Outbound {} -> {}", env.kind(), env.dst());
            self.outbound.push_back(env);
            return;
        }
        self.queue.push_back(env);
        if self.queue.len() == self.cfg.queue_warn {
            warn!("Message queue length reached {}", self.cfg.queue_warn);
        }
    }

    /// Posts a message from `src` to `dst`.
    #[inline]
    pub fn send(&mut self, src: TaskId, dst: TaskId, msg: Msg) {
        self.post(Envelope::new(src, dst, msg));
    }

    /// Dispatches the next queued envelope. Returns `false` if the queue was
    /// empty.
    pub fn dispatch_one(&mut self) -> bool {
        let Some(env) = self.queue.pop_front() else {
            return false;
        };
        let replay = match self.tasks[env.dst().typ as usize].as_mut() {
            Some(t) => t.dispatch(env, &mut self.out),
            None => {
                self.outbound.push_back(env);
                None
            }
        };
        self.flush(replay);
        true
    }

    /// Dispatches envelopes until the queue is empty. Returns the number of
    /// dispatched envelopes.
    pub fn run_until_idle(&mut self) -> usize {
        let mut n = 0;
        while self.dispatch_one() {
            n += 1;
        }
        n
    }

    /// Notifies all tasks of a new connection.
    pub fn connect(&mut self, c: ConnIdx) {
        if c.get() >= self.cfg.max_conn {
            warn!("{c} exceeds the maximum of {} connections", self.cfg.max_conn);
            return;
        }
        debug!("{c} connected");
        for i in 0..self.tasks.len() {
            if let Some(t) = self.tasks[i].as_mut() {
                let replay = t.connect(c, &mut self.out);
                self.flush(replay);
            }
        }
    }

    /// Notifies all tasks of a terminated connection. Saved messages and
    /// timers of the connection's task instances are discarded.
    pub fn disconnect(&mut self, c: ConnIdx) {
        if c.get() >= self.cfg.max_conn {
            warn!("{c} exceeds the maximum of {} connections", self.cfg.max_conn);
            return;
        }
        debug!("{c} disconnected");
        let mut per_conn = Vec::with_capacity(self.tasks.len());
        for i in 0..self.tasks.len() {
            if let Some(t) = self.tasks[i].as_mut() {
                let replay = t.disconnect(c, &mut self.out);
                if t.per_conn() {
                    per_conn.push(t.typ());
                }
                self.flush(replay);
            }
        }
        let owned = |o: TaskId| o.idx == c.get() && per_conn.contains(&o.typ);
        self.timers.clear_owners(owned);
        self.purge_expired(|o, _| owned(o));
    }

    /// Posts [`Msg::Timer`] for every timer that expired at or before `now`.
    /// Returns the number of expired timers.
    pub fn expire(&mut self, now: Instant) -> usize {
        let due = self.timers.expire(now);
        let n = due.len();
        for (owner, id) in due {
            trace!("Timer {id:?} expired for {owner}");
            self.post(Envelope::new(owner, owner, Msg::Timer(id)));
        }
        n
    }

    /// Returns the earliest timer deadline.
    #[inline]
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Returns the number of queued envelopes.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Removes and returns envelopes addressed to external collaborators.
    #[inline]
    pub fn drain_outbound(&mut self) -> impl Iterator<Item = Envelope> + '_ {
        self.outbound.drain(..)
    }

    /// Returns the state of instance `i` of task `T`.
    #[must_use]
    pub fn state<T: Task>(&self, i: u8) -> Option<T::State> {
        self.slot::<T>()?.states.get(usize::from(i))
    }

    /// Returns a registered task.
    #[must_use]
    pub fn task<T: Task>(&self) -> Option<&T> {
        self.slot::<T>().map(|s| &s.task)
    }

    fn slot<T: Task>(&self) -> Option<&TaskSlot<T>> {
        self.tasks[T::TYPE as usize].as_ref()?.as_any().downcast_ref()
    }

    /// Removes queued [`Msg::Timer`] envelopes matching `f`.
    fn purge_expired(&mut self, f: impl Fn(TaskId, TimerId) -> bool) {
        self.queue.retain(|env| match *env.msg() {
            Msg::Timer(id) if env.src() == env.dst() && f(env.dst(), id) => {
                trace!("{}: Discarding stale timer {id:?}", env.dst());
                false
            }
            _ => true,
        });
    }

    /// Applies handler output. Saved messages to replay go ahead of all
    /// queued traffic.
    fn flush(&mut self, replay: Option<VecDeque<Envelope>>) {
        if let Some(r) = replay {
            trace!("Replaying {} saved message(s)", r.len());
            for env in r.into_iter().rev() {
                self.queue.push_front(env);
            }
        }
        for op in mem::take(&mut self.out.timers) {
            // An expiry that has not been dispatched yet belongs to the
            // previous arming of the timer
            let key = op.key();
            self.purge_expired(|o, id| (o, id) == key);
            self.timers.apply(op);
        }
        for env in mem::take(&mut self.out.msgs) {
            self.post(env);
        }
    }
}

impl Default for Kernel {
    #[inline]
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Type-erased task slot.
trait AnyTask: Debug + Send {
    fn as_any(&self) -> &dyn Any;
    fn typ(&self) -> TaskType;
    fn per_conn(&self) -> bool;
    fn dispatch(&mut self, env: Envelope, out: &mut Outbox) -> Option<VecDeque<Envelope>>;
    fn connect(&mut self, c: ConnIdx, out: &mut Outbox) -> Option<VecDeque<Envelope>>;
    fn disconnect(&mut self, c: ConnIdx, out: &mut Outbox) -> Option<VecDeque<Envelope>>;
}

/// Registered task with its handlers, instance states, and saved messages.
#[derive(Debug)]
struct TaskSlot<T: Task> {
    task: T,
    handlers: Handlers<T>,
    states: StateStore<T::State>,
    saved: Box<[VecDeque<Envelope>]>,
}

impl<T: Task> TaskSlot<T> {
    fn new(task: T, n: usize) -> Self {
        Self {
            task,
            handlers: T::handlers(),
            states: StateStore::new(n, T::INITIAL),
            saved: (0..n).map(|_| VecDeque::new()).collect(),
        }
    }

    /// Returns the instance used for lifecycle events of connection `c`.
    fn instance(&self, c: ConnIdx) -> Option<usize> {
        let i = if T::PER_CONN { c.index() } else { 0 };
        (i < self.states.len()).then_some(i)
    }

    /// Returns saved messages of instance `i` if its state is no longer
    /// `prev`.
    fn replay(&mut self, i: usize, prev: T::State) -> Option<VecDeque<Envelope>> {
        (self.states.get(i) != Some(prev) && !self.saved[i].is_empty())
            .then(|| mem::take(&mut self.saved[i]))
    }

    /// Calls a lifecycle hook on instance `i`.
    fn lifecycle(
        &mut self,
        i: usize,
        out: &mut Outbox,
        f: impl FnOnce(&mut T, &mut Context<'_, T::State>),
    ) -> Option<VecDeque<Envelope>> {
        #[allow(clippy::cast_possible_truncation)]
        let id = TaskId::new(T::TYPE, i as u8);
        let st = self.states.get_mut(i)?;
        let prev = *st;
        f(&mut self.task, &mut Context::new(id, st, out));
        self.replay(i, prev)
    }
}

impl<T: Task> AnyTask for TaskSlot<T> {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn typ(&self) -> TaskType {
        T::TYPE
    }

    #[inline]
    fn per_conn(&self) -> bool {
        T::PER_CONN
    }

    fn dispatch(&mut self, env: Envelope, out: &mut Outbox) -> Option<VecDeque<Envelope>> {
        let dst = env.dst();
        let i = usize::from(dst.idx);
        let Some(prev) = self.states.get(i) else {
            warn!("Dropping {} for nonexistent instance {dst}", env.kind());
            return None;
        };
        let kind = env.kind();
        let Some(h) = self.handlers.lookup(prev, kind) else {
            trace!("{dst}: Ignoring {kind} in {prev:?}");
            return None;
        };
        trace!("{dst}: {kind} from {} in {prev:?}", env.src());
        let st = self.states.get_mut(i)?;
        match h(&mut self.task, &mut Context::new(dst, st, out), env) {
            Disposition::Consumed | Disposition::Retained => {}
            Disposition::Saved(env) => {
                trace!("{dst}: Saved {kind}");
                self.saved[i].push_back(env);
            }
        }
        self.replay(i, prev)
    }

    fn connect(&mut self, c: ConnIdx, out: &mut Outbox) -> Option<VecDeque<Envelope>> {
        let i = self.instance(c)?;
        self.lifecycle(i, out, |t, cx| t.create(cx, c))
    }

    fn disconnect(&mut self, c: ConnIdx, out: &mut Outbox) -> Option<VecDeque<Envelope>> {
        let i = self.instance(c)?;
        if T::PER_CONN && !self.saved[i].is_empty() {
            let id = TaskId::new(T::TYPE, c.get());
            debug!("{id}: Discarding {} saved message(s)", self.saved[i].len());
            self.saved[i].clear();
        }
        self.lifecycle(i, out, |t, cx| t.cleanup(cx, c))
    }
}

#[cfg(test)]
mod tests;
