use std::fmt::{Debug, Display, Formatter};

use super::*;

/// Task type. Types without a registered [`Task`] are external
/// collaborators, such as the transport and the application, and receive
/// their messages through the kernel's outbound queue.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, enum_iterator::Sequence,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum TaskType {
    /// GATT transport. Instance index is the connection index.
    Gatt,
    /// Application.
    App,
    HrpCollector,
    HrpSensor,
    BasClient,
    BasServer,
}

impl TaskType {
    /// Number of task types.
    pub(super) const COUNT: usize = <Self as enum_iterator::Sequence>::CARDINALITY;
}

crate::util::impl_display_via_debug! { TaskType }

/// Connection index assigned by the link layer.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    serde::Deserialize,
    serde::Serialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ConnIdx(u8);

impl ConnIdx {
    /// Wraps a raw connection index.
    #[inline(always)]
    #[must_use]
    pub const fn new(i: u8) -> Self {
        Self(i)
    }

    /// Returns the raw connection index.
    #[inline(always)]
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns the connection index as a `usize` for slot lookups.
    #[inline(always)]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for ConnIdx {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Conn({})", self.0)
    }
}

/// Task instance reference.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TaskId {
    pub typ: TaskType,
    /// Instance index, which is the connection index for per-connection
    /// tasks.
    pub idx: u8,
}

impl TaskId {
    /// Creates a task reference.
    #[inline(always)]
    #[must_use]
    pub const fn new(typ: TaskType, idx: u8) -> Self {
        Self { typ, idx }
    }

    /// Returns the application task reference.
    #[inline(always)]
    #[must_use]
    pub const fn app() -> Self {
        Self::new(TaskType::App, 0)
    }

    /// Returns the GATT transport reference of connection `c`.
    #[inline(always)]
    #[must_use]
    pub const fn gatt(c: ConnIdx) -> Self {
        Self::new(TaskType::Gatt, c.0)
    }

    /// Returns the instance index interpreted as a connection index.
    #[inline(always)]
    #[must_use]
    pub const fn conn(self) -> ConnIdx {
        ConnIdx(self.idx)
    }
}

impl Display for TaskId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.typ, self.idx)
    }
}

/// Profile task. Each instance of the task is a finite-state machine whose
/// current state selects the handler for every dispatched message.
pub trait Task: Debug + Send + Sized + 'static {
    /// Instance state.
    type State: Copy + Debug + Eq + Send + 'static;

    /// Task type served by this task.
    const TYPE: TaskType;
    /// Whether the task has one instance per connection. Singleton tasks
    /// have exactly one instance with index 0.
    const PER_CONN: bool;
    /// Initial state of every instance.
    const INITIAL: Self::State;

    /// Returns the handler table.
    fn handlers() -> Handlers<Self>;

    /// Called when connection `c` is established.
    fn create(&mut self, _cx: &mut Context<'_, Self::State>, _c: ConnIdx) {}

    /// Called when connection `c` is terminated. For per-connection tasks
    /// `cx` refers to the instance of that connection.
    fn cleanup(&mut self, _cx: &mut Context<'_, Self::State>, _c: ConnIdx) {}
}

#[cfg(test)]
mod tests {
    use enum_iterator::all;

    use super::*;

    #[test]
    fn task_type_index() {
        for (i, t) in all::<TaskType>().enumerate() {
            assert_eq!(t as usize, i);
        }
        assert_eq!(TaskType::COUNT, 6);
    }

    #[test]
    fn display() {
        let id = TaskId::gatt(ConnIdx::new(3));
        assert_eq!(id.to_string(), "Gatt[3]");
        assert_eq!(id.conn().to_string(), "Conn(3)");
    }
}
