use std::io::Write;
use std::path::{Path, PathBuf};
use std::{fs, io};

use tracing::{debug, error, warn};

use crate::gatt::ServiceContent;
use crate::le::Addr;

use super::PeerStore;

/// Discovered service contents stored in a file system directory, one JSON
/// file per peer.
#[derive(Clone, Debug)]
pub struct ContentStore(Dir);

impl ContentStore {
    /// Creates or opens a store named `name` in the specified root
    /// directory.
    #[inline(always)]
    #[must_use]
    pub fn open(root: impl AsRef<Path>, name: impl AsRef<Path>) -> Self {
        Self(Dir(root.as_ref().join(name)))
    }

    /// Creates or opens a store named `name` in the current user's local
    /// data directory. Returns [`None`] if the user directory cannot be
    /// determined.
    #[must_use]
    pub fn per_user(app: impl AsRef<Path>, name: impl AsRef<Path>) -> Option<Self> {
        let dir = dirs::data_local_dir()?.join(app.as_ref()).join(name);
        Some(Self(Dir(dir)))
    }
}

impl PeerStore for ContentStore {
    type Value = ServiceContent;

    #[inline(always)]
    fn save(&self, peer: Addr, v: &Self::Value) -> bool {
        self.0.save(peer, v)
    }

    #[inline(always)]
    fn load(&self, peer: Addr) -> Option<Self::Value> {
        self.0.load(peer)
    }

    #[inline(always)]
    fn remove(&self, peer: Addr) {
        self.0.remove(peer);
    }

    #[inline(always)]
    fn clear(&self) {
        self.0.clear();
    }
}

/// Database in a file system directory.
#[derive(Clone, Debug)]
#[repr(transparent)]
struct Dir(PathBuf);

impl Dir {
    /// Saves peer data to the file system.
    fn save(&self, peer: Addr, v: &impl serde::Serialize) -> bool {
        let s = match serde_json::to_string_pretty(v) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to serialize {peer:?} ({e})");
                return false;
            }
        };
        if let Err(e) = fs::create_dir_all(&self.0) {
            warn!("Failed to create store directory: {} ({e})", self.0.display());
        }
        let path = self.path(peer);
        match fs::File::create(&path)
            .and_then(|mut f| f.write_all(s.as_bytes()).and_then(|()| f.sync_data()))
        {
            Ok(()) => {
                debug!("Wrote: {}", path.display());
                true
            }
            Err(e) => {
                error!("Failed to write: {} ({e})", path.display());
                false
            }
        }
    }

    /// Loads peer data from the file system.
    fn load<T: serde::de::DeserializeOwned>(&self, peer: Addr) -> Option<T> {
        let path = self.path(peer);
        let s = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => return None,
            Err(e) => {
                error!("Failed to read: {} ({e})", path.display());
                return None;
            }
        };
        match serde_json::from_str(&s) {
            Ok(v) => Some(v),
            Err(e) => {
                error!("Invalid file contents: {} ({e})", path.display());
                None
            }
        }
    }

    /// Removes peer data from the file system.
    fn remove(&self, peer: Addr) {
        let path = self.path(peer);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => {}
            Err(e) => error!("Failed to remove: {} ({e})", path.display()),
        }
    }

    /// Removes all peer data from the file system.
    fn clear(&self) {
        match fs::remove_dir_all(&self.0) {
            Ok(()) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => {}
            Err(e) => error!("Failed to remove: {} ({e})", self.0.display()),
        }
    }

    /// Returns the file path for the specified peer address, such as
    /// `P-001122334455`.
    fn path(&self, peer: Addr) -> PathBuf {
        let typ = match peer {
            Addr::Public(_) => 'P',
            Addr::Random(_) => 'R',
        };
        let raw = peer.raw();
        let raw = raw.as_le_bytes();
        (self.0).join(format!(
            "{typ}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            raw[5], raw[4], raw[3], raw[2], raw[1], raw[0]
        ))
    }
}

#[cfg(test)]
mod tests {
    use profkit_const::{Characteristic, Descriptor, Service};
    use tempfile::Builder;

    use crate::att::{Handle, HandleRange};
    use crate::gatt::{CharProps, CharTemplate, DescTemplate, DiscChar, DiscDesc, SvcTemplate};
    use crate::le::RawAddr;

    use super::*;

    const PEER: Addr = Addr::Public(RawAddr::from_le_bytes([0x55, 0x44, 0x33, 0x22, 0x11, 0x00]));

    const TPL: SvcTemplate = SvcTemplate {
        uuid: Service::Battery.uuid(),
        chars: &[CharTemplate::mandatory(
            Characteristic::BatteryLevel.uuid(),
            CharProps::READ,
        )],
        descs: &[DescTemplate::optional(
            Descriptor::ClientCharacteristicConfiguration.uuid(),
            0,
        )],
    };

    fn content() -> ServiceContent {
        let h = |v| Handle::new(v).unwrap();
        let mut c = ServiceContent::new(&TPL);
        c.set_range(HandleRange::new(h(0x20), h(0x23)));
        c.chars_mut()[0] = DiscChar::new(
            h(0x22),
            CharProps::READ | CharProps::NOTIFY,
            Characteristic::BatteryLevel.uuid(),
        );
        let cccd = Descriptor::ClientCharacteristicConfiguration.uuid();
        c.descs_mut()[0] = DiscDesc::new(h(0x23), cccd);
        c
    }

    #[test]
    fn save_load() {
        let tmp = (Builder::new().prefix("profkit-test-")).tempdir().unwrap();
        let db = ContentStore::open(tmp.path(), "bas");
        assert_eq!(db.load(PEER), None);
        let c = content();
        assert!(db.save(PEER, &c));
        assert!(tmp.path().join("bas").join("P-001122334455").exists());
        let v = db.load(PEER).unwrap();
        assert_eq!(v, c);
        assert!(TPL.validate(&v).is_ok());
        db.remove(PEER);
        assert_eq!(db.load(PEER), None);
        assert!(db.save(PEER, &c));
        db.clear();
        assert!(!tmp.path().join("bas").exists());
    }

    #[test]
    fn invalid_contents() {
        let tmp = (Builder::new().prefix("profkit-test-")).tempdir().unwrap();
        let db = ContentStore::open(tmp.path(), "bas");
        fs::create_dir_all(tmp.path().join("bas")).unwrap();
        fs::write(tmp.path().join("bas").join("R-001122334455"), "{").unwrap();
        assert_eq!(db.load(Addr::Random(PEER.raw())), None);
    }
}
