/// Current state of every instance of one task type.
#[derive(Clone, Debug)]
pub struct StateStore<S> {
    states: Box<[S]>,
}

impl<S: Copy + Eq> StateStore<S> {
    /// Creates a store of `n` instances in state `init`.
    #[must_use]
    pub fn new(n: usize, init: S) -> Self {
        Self {
            states: vec![init; n].into_boxed_slice(),
        }
    }

    /// Returns the number of instances.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns whether the store has no instances.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Returns the state of instance `i`.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> Option<S> {
        self.states.get(i).copied()
    }

    /// Sets the state of instance `i`. Returns whether the state changed.
    #[inline]
    pub fn set(&mut self, i: usize, s: S) -> bool {
        match self.states.get_mut(i) {
            Some(cur) if *cur != s => {
                *cur = s;
                true
            }
            _ => false,
        }
    }

    /// Returns a mutable reference to the state of instance `i`.
    #[inline]
    pub(super) fn get_mut(&mut self, i: usize) -> Option<&mut S> {
        self.states.get_mut(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set() {
        let mut s = StateStore::new(2, 0_u8);
        assert_eq!(s.len(), 2);
        assert!(s.set(1, 5));
        assert!(!s.set(1, 5));
        assert!(!s.set(2, 5));
        assert_eq!(s.get(0), Some(0));
        assert_eq!(s.get(1), Some(5));
        assert_eq!(s.get(2), None);
    }
}
