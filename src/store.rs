//! Persistent per-peer storage of discovered service contents.

use std::collections::HashMap;
use std::fmt::Debug;

use parking_lot::Mutex;
use tracing::trace;

#[cfg(feature = "fs")]
pub use fs::*;

use crate::le::Addr;

#[cfg(feature = "fs")]
mod fs;

/// Bond data store keyed by peer address. A client profile saves the
/// [`crate::gatt::ServiceContent`] discovered for a bonded peer and passes
/// it back in [`crate::kernel::Msg::EnableReq`] on reconnection.
pub trait PeerStore: Send + Sync {
    /// Stored value type.
    type Value;

    /// Saves peer data. Returns `false` if the data could not be saved.
    fn save(&self, peer: Addr, v: &Self::Value) -> bool;

    /// Loads peer data.
    #[must_use]
    fn load(&self, peer: Addr) -> Option<Self::Value>;

    /// Removes peer data.
    fn remove(&self, peer: Addr);

    /// Removes all peer data.
    fn clear(&self);
}

/// In-memory peer store.
#[derive(Debug, Default)]
pub struct MemStore<V>(Mutex<HashMap<Addr, V>>);

impl<V> MemStore<V> {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Mutex::new(HashMap::new()))
    }

    /// Returns the number of stored peers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Returns whether the store is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

impl<V: Clone + Debug + Send> PeerStore for MemStore<V> {
    type Value = V;

    fn save(&self, peer: Addr, v: &V) -> bool {
        trace!("Saving {peer:?}");
        self.0.lock().insert(peer, v.clone());
        true
    }

    #[inline]
    fn load(&self, peer: Addr) -> Option<V> {
        self.0.lock().get(&peer).cloned()
    }

    #[inline]
    fn remove(&self, peer: Addr) {
        self.0.lock().remove(&peer);
    }

    #[inline]
    fn clear(&self) {
        self.0.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::le::RawAddr;

    use super::*;

    #[test]
    fn mem_store() {
        let (a, b) = (
            Addr::Public(RawAddr::from_le_bytes([1, 2, 3, 4, 5, 6])),
            Addr::Random(RawAddr::from_le_bytes([1, 2, 3, 4, 5, 6])),
        );
        let s = MemStore::new();
        assert!(s.save(a, &1));
        assert!(s.save(b, &2));
        assert_eq!((s.load(a), s.load(b)), (Some(1), Some(2)));
        s.remove(a);
        assert_eq!((s.load(a), s.len()), (None, 1));
        s.clear();
        assert!(s.is_empty());
    }
}
