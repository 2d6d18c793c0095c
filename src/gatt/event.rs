use profkit_const::Uuid;
use smallvec::SmallVec;

use crate::att::{Handle, HandleRange, Status};

use super::*;

/// Transport procedure identified by a completion event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Procedure {
    /// Primary service discovery by UUID ([Vol 3] Part G, Section 4.4.2).
    DiscPrimary,
    /// Included or secondary service search over the full handle range.
    DiscIncluded,
    /// Discover all characteristics of a service
    /// ([Vol 3] Part G, Section 4.6.1).
    DiscChars,
    /// Discover all characteristic descriptors
    /// ([Vol 3] Part G, Section 4.7.1).
    DiscDescs,
    Read,
    Write,
    WriteNoRsp,
    Notify,
    Indicate,
}

crate::util::impl_display_via_debug! { Procedure }

/// Attribute declared within a service reported by [`SvcInd`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SvcAtt {
    Char {
        decl: Handle,
        val: Handle,
        props: CharProps,
        uuid: Uuid,
    },
    Desc {
        hdl: Handle,
        uuid: Uuid,
    },
}

/// Service found indication. Transports that discover the whole service in
/// one round report its attributes in handle order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SvcInd {
    pub range: HandleRange,
    pub uuid: Uuid,
    pub atts: SmallVec<[SvcAtt; 8]>,
}

impl SvcInd {
    /// Creates an indication without an attribute list.
    #[inline]
    #[must_use]
    pub fn new(range: HandleRange, uuid: Uuid) -> Self {
        Self {
            range,
            uuid,
            atts: SmallVec::new(),
        }
    }
}

/// Characteristic found indication.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CharInd {
    pub decl: Handle,
    pub val: Handle,
    pub props: CharProps,
    pub uuid: Uuid,
}

/// Descriptor found indication.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DescInd {
    pub hdl: Handle,
    pub uuid: Uuid,
}

/// Transport procedure completion event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cmp {
    pub op: Procedure,
    pub status: Status,
}

impl Cmp {
    /// Creates a successful completion event.
    #[inline]
    #[must_use]
    pub const fn ok(op: Procedure) -> Self {
        Self { op, status: Ok(()) }
    }
}

/// Discovery round requested from the transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiscReq {
    /// Find services with the specified UUID. `incl` selects the included or
    /// secondary service search used as a fallback.
    Service {
        uuid: Uuid,
        range: HandleRange,
        incl: bool,
    },
    /// Find all characteristic declarations within the range.
    Chars { range: HandleRange },
    /// Find all descriptors within the range.
    Descs { range: HandleRange },
}

impl DiscReq {
    /// Returns the procedure reported by the completion of this request.
    #[inline]
    #[must_use]
    pub const fn procedure(&self) -> Procedure {
        match *self {
            Self::Service { incl: false, .. } => Procedure::DiscPrimary,
            Self::Service { incl: true, .. } => Procedure::DiscIncluded,
            Self::Chars { .. } => Procedure::DiscChars,
            Self::Descs { .. } => Procedure::DiscDescs,
        }
    }
}
