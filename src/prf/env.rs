use tracing::trace;

use crate::gatt::RequestError;
use crate::kernel::ConnIdx;

/// Per-connection environment slots of a profile task. An environment is
/// allocated lazily for a connected link and freed when the link goes down.
#[derive(Debug)]
pub struct EnvRegistry<E> {
    slots: Box<[Option<Box<E>>]>,
    connected: Box<[bool]>,
}

impl<E> EnvRegistry<E> {
    /// Creates a registry for `n` connections.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            slots: (0..n).map(|_| None).collect(),
            connected: vec![false; n].into_boxed_slice(),
        }
    }

    /// Returns the number of connection slots.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns whether the registry has no slots.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Marks connection `c` as established. Returns `false` if `c` is out of
    /// range.
    pub fn connect(&mut self, c: ConnIdx) -> bool {
        self.connected.get_mut(c.index()).map_or(false, |v| {
            *v = true;
            true
        })
    }

    /// Marks connection `c` as terminated and frees its environment.
    pub fn disconnect(&mut self, c: ConnIdx) -> Option<Box<E>> {
        if let Some(v) = self.connected.get_mut(c.index()) {
            *v = false;
        }
        self.free(c)
    }

    /// Returns whether connection `c` is established.
    #[inline]
    #[must_use]
    pub fn is_connected(&self, c: ConnIdx) -> bool {
        self.connected.get(c.index()).copied().unwrap_or(false)
    }

    /// Allocates the environment of connection `c`. The link must be
    /// connected and must not have an environment.
    pub fn alloc(&mut self, c: ConnIdx, e: E) -> Result<&mut E, RequestError> {
        if !self.is_connected(c) {
            return Err(RequestError::Disallowed);
        }
        match self.slots.get_mut(c.index()) {
            Some(slot) if slot.is_none() => {
                trace!("Allocated environment for {c}");
                let e: &mut E = slot.insert(Box::new(e));
                Ok(e)
            }
            _ => Err(RequestError::Disallowed),
        }
    }

    /// Frees the environment of connection `c`.
    pub fn free(&mut self, c: ConnIdx) -> Option<Box<E>> {
        let e = self.slots.get_mut(c.index())?.take();
        if e.is_some() {
            trace!("Freed environment of {c}");
        }
        e
    }

    /// Returns the environment of connection `c`.
    #[inline]
    #[must_use]
    pub fn get(&self, c: ConnIdx) -> Option<&E> {
        self.slots.get(c.index())?.as_deref()
    }

    /// Returns the mutable environment of connection `c`.
    #[inline]
    pub fn get_mut(&mut self, c: ConnIdx) -> Option<&mut E> {
        self.slots.get_mut(c.index())?.as_deref_mut()
    }
}
