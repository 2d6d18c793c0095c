use profkit_const::Uuid;
use smallvec::SmallVec;

use crate::att::{Handle, HandleRange};

use super::*;

/// Discovered characteristic. An empty slot has no value handle.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize,
)]
pub struct DiscChar {
    pub val: Option<Handle>,
    pub props: CharProps,
    pub uuid: Option<Uuid>,
}

impl DiscChar {
    /// Creates a filled characteristic slot.
    #[inline]
    #[must_use]
    pub const fn new(val: Handle, props: CharProps, uuid: Uuid) -> Self {
        Self {
            val: Some(val),
            props,
            uuid: Some(uuid),
        }
    }
}

/// Discovered descriptor. An empty slot has no handle.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize,
)]
pub struct DiscDesc {
    pub hdl: Option<Handle>,
    pub uuid: Option<Uuid>,
}

impl DiscDesc {
    /// Creates a filled descriptor slot.
    #[inline]
    #[must_use]
    pub const fn new(hdl: Handle, uuid: Uuid) -> Self {
        Self {
            hdl: Some(hdl),
            uuid: Some(uuid),
        }
    }
}

/// Reference to a characteristic or descriptor slot of a [`ServiceContent`].
/// Slot positions match the [`SvcTemplate`] that produced the content.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Slot {
    Char(usize),
    Desc(usize),
}

/// Result of discovering a peer service: the service handle range and one
/// slot per characteristic and descriptor template entry.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ServiceContent {
    range: HandleRange,
    chars: SmallVec<[DiscChar; 4]>,
    descs: SmallVec<[DiscDesc; 4]>,
}

impl ServiceContent {
    /// Creates an empty service content sized for the specified template.
    #[must_use]
    pub fn new(tpl: &SvcTemplate) -> Self {
        Self {
            range: HandleRange::ALL,
            chars: SmallVec::from_elem(DiscChar::default(), tpl.chars.len()),
            descs: SmallVec::from_elem(DiscDesc::default(), tpl.descs.len()),
        }
    }

    /// Returns the service handle range.
    #[inline(always)]
    pub const fn range(&self) -> HandleRange {
        self.range
    }

    /// Sets the service handle range.
    #[inline(always)]
    pub fn set_range(&mut self, r: HandleRange) {
        self.range = r;
    }

    /// Returns the characteristic slots.
    #[inline(always)]
    #[must_use]
    pub fn chars(&self) -> &[DiscChar] {
        &self.chars
    }

    /// Returns mutable characteristic slots.
    #[inline(always)]
    pub fn chars_mut(&mut self) -> &mut [DiscChar] {
        &mut self.chars
    }

    /// Returns the descriptor slots.
    #[inline(always)]
    #[must_use]
    pub fn descs(&self) -> &[DiscDesc] {
        &self.descs
    }

    /// Returns mutable descriptor slots.
    #[inline(always)]
    pub fn descs_mut(&mut self) -> &mut [DiscDesc] {
        &mut self.descs
    }

    /// Returns the handle of the specified slot, if it was found.
    #[inline]
    #[must_use]
    pub fn hdl(&self, s: Slot) -> Option<Handle> {
        match s {
            Slot::Char(i) => self.chars.get(i).and_then(|c| c.val),
            Slot::Desc(i) => self.descs.get(i).and_then(|d| d.hdl),
        }
    }

    /// Returns the slot that contains handle `h`.
    #[must_use]
    pub fn find(&self, h: Handle) -> Option<Slot> {
        if let Some(i) = self.chars.iter().position(|c| c.val == Some(h)) {
            return Some(Slot::Char(i));
        }
        (self.descs.iter().position(|d| d.hdl == Some(h))).map(Slot::Desc)
    }
}
