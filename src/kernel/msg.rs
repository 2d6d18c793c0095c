use std::fmt::{Debug, Formatter};
use std::ops::Deref;

use profkit_const::Uuid;
use structbuf::{Pack, Packer, StructBuf};

use crate::att::{ErrorCode, EventType, Handle, HandleRange, Status, MAX_VAL_LEN};
use crate::gatt::{Cccd, CharInd, Cmp, DescInd, DiscReq, ServiceContent, Slot, SvcInd};
use crate::prf::hrp::HrMeas;
use crate::Result;

use super::{ConnIdx, TaskId, TimerId};

/// Variable-length attribute value carried by a message.
#[derive(Clone)]
#[must_use]
pub struct Value(StructBuf);

impl Value {
    /// Allocates an empty value that can hold up to `lim` bytes, capped at
    /// the maximum attribute value length.
    #[inline]
    pub fn alloc(lim: usize) -> Self {
        Self(StructBuf::new(lim.min(MAX_VAL_LEN)))
    }

    /// Creates a value by copying `v`.
    ///
    /// # Panics
    ///
    /// Panics if `v` exceeds the maximum attribute value length.
    #[inline]
    pub fn from_slice(v: &[u8]) -> Self {
        let mut b = Self::alloc(v.len());
        b.append().put(v);
        b
    }

    /// Returns a packer that appends to the value.
    #[inline]
    pub fn append(&mut self) -> Packer<'_> {
        self.0.append()
    }

    /// Returns the maximum value length.
    #[inline(always)]
    #[must_use]
    pub fn lim(&self) -> usize {
        self.0.lim()
    }
}

impl Default for Value {
    #[inline]
    fn default() -> Self {
        Self::alloc(0)
    }
}

impl Deref for Value {
    type Target = [u8];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Value {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl PartialEq for Value {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl Eq for Value {}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Value({:02X?})", &**self)
    }
}

/// Message exchanged between tasks, the transport, and the application.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Msg {
    // Transport indications and completions
    SvcInd(SvcInd),
    CharInd(CharInd),
    DescInd(DescInd),
    Cmp(Cmp),
    /// Read response from a peer server.
    ReadInd { hdl: Handle, val: Value },
    /// Notification or indication from a peer server.
    EventInd {
        hdl: Handle,
        typ: EventType,
        val: Value,
    },
    /// Read request from a peer client.
    ReadReqInd { hdl: Handle },
    /// Write request from a peer client.
    WriteReqInd { hdl: Handle, val: Value },

    // Transport commands
    DiscSvcCmd {
        uuid: Uuid,
        range: HandleRange,
        incl: bool,
    },
    DiscCharCmd { range: HandleRange },
    DiscDescCmd { range: HandleRange },
    ReadCmd { hdl: Handle },
    WriteCmd { hdl: Handle, val: Value, rsp: bool },
    SendEvtCmd {
        hdl: Handle,
        typ: EventType,
        val: Value,
    },
    /// Confirmation of a peer indication.
    EventCfm { hdl: Handle },
    ReadCfm {
        hdl: Handle,
        result: std::result::Result<Value, ErrorCode>,
    },
    WriteCfm { hdl: Handle, status: Status },

    // Application interface
    /// Enables a client profile on a connection. A cached service content
    /// skips discovery.
    EnableReq { cached: Option<ServiceContent> },
    EnableRsp { result: Result<ServiceContent> },
    /// Restores a bonded peer subscription without notifying the
    /// application.
    RestoreCfgReq { conn: ConnIdx, cfg: Cccd },
    ReadReq { slot: Slot },
    ReadRsp { slot: Slot, result: Result<Value> },
    WriteReq { slot: Slot, val: Value },
    WriteRsp { slot: Slot, result: Result<()> },
    /// Configures peer notifications of characteristic slot `slot`.
    CfgNtfReq { slot: Slot, cfg: Cccd },
    CfgNtfRsp { slot: Slot, result: Result<()> },
    /// Characteristic value notified or indicated by a peer server.
    ValueInd { slot: Slot, val: Value },
    HrMeasInd(HrMeas),
    HrMeasSendReq {
        meas: HrMeas,
        excluded: Option<ConnIdx>,
    },
    LevelSendReq { level: u8 },
    SendRsp { result: Result<()> },
    /// Peer subscription changed.
    CfgChangedInd { conn: ConnIdx, cfg: Cccd },
    /// Peer requested an energy expended reset.
    EnergyResetInd { conn: ConnIdx },

    // Kernel
    Timer(TimerId),
}

/// Message discriminant used for handler lookup.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum MsgKind {
    SvcInd,
    CharInd,
    DescInd,
    Cmp,
    ReadInd,
    EventInd,
    ReadReqInd,
    WriteReqInd,
    DiscSvcCmd,
    DiscCharCmd,
    DiscDescCmd,
    ReadCmd,
    WriteCmd,
    SendEvtCmd,
    EventCfm,
    ReadCfm,
    WriteCfm,
    EnableReq,
    EnableRsp,
    RestoreCfgReq,
    ReadReq,
    ReadRsp,
    WriteReq,
    WriteRsp,
    CfgNtfReq,
    CfgNtfRsp,
    ValueInd,
    HrMeasInd,
    HrMeasSendReq,
    LevelSendReq,
    SendRsp,
    CfgChangedInd,
    EnergyResetInd,
    Timer,
}

crate::util::impl_display_via_debug! { MsgKind }

impl Msg {
    /// Returns the message discriminant.
    #[must_use]
    pub const fn kind(&self) -> MsgKind {
        use MsgKind as K;
        match *self {
            Self::SvcInd(_) => K::SvcInd,
            Self::CharInd(_) => K::CharInd,
            Self::DescInd(_) => K::DescInd,
            Self::Cmp(_) => K::Cmp,
            Self::ReadInd { .. } => K::ReadInd,
            Self::EventInd { .. } => K::EventInd,
            Self::ReadReqInd { .. } => K::ReadReqInd,
            Self::WriteReqInd { .. } => K::WriteReqInd,
            Self::DiscSvcCmd { .. } => K::DiscSvcCmd,
            Self::DiscCharCmd { .. } => K::DiscCharCmd,
            Self::DiscDescCmd { .. } => K::DiscDescCmd,
            Self::ReadCmd { .. } => K::ReadCmd,
            Self::WriteCmd { .. } => K::WriteCmd,
            Self::SendEvtCmd { .. } => K::SendEvtCmd,
            Self::EventCfm { .. } => K::EventCfm,
            Self::ReadCfm { .. } => K::ReadCfm,
            Self::WriteCfm { .. } => K::WriteCfm,
            Self::EnableReq { .. } => K::EnableReq,
            Self::EnableRsp { .. } => K::EnableRsp,
            Self::RestoreCfgReq { .. } => K::RestoreCfgReq,
            Self::ReadReq { .. } => K::ReadReq,
            Self::ReadRsp { .. } => K::ReadRsp,
            Self::WriteReq { .. } => K::WriteReq,
            Self::WriteRsp { .. } => K::WriteRsp,
            Self::CfgNtfReq { .. } => K::CfgNtfReq,
            Self::CfgNtfRsp { .. } => K::CfgNtfRsp,
            Self::ValueInd { .. } => K::ValueInd,
            Self::HrMeasInd(_) => K::HrMeasInd,
            Self::HrMeasSendReq { .. } => K::HrMeasSendReq,
            Self::LevelSendReq { .. } => K::LevelSendReq,
            Self::SendRsp { .. } => K::SendRsp,
            Self::CfgChangedInd { .. } => K::CfgChangedInd,
            Self::EnergyResetInd { .. } => K::EnergyResetInd,
            Self::Timer(_) => K::Timer,
        }
    }
}

impl From<DiscReq> for Msg {
    #[inline]
    fn from(r: DiscReq) -> Self {
        match r {
            DiscReq::Service { uuid, range, incl } => Self::DiscSvcCmd { uuid, range, incl },
            DiscReq::Chars { range } => Self::DiscCharCmd { range },
            DiscReq::Descs { range } => Self::DiscDescCmd { range },
        }
    }
}

/// Routed message. Ownership moves to the kernel when the envelope is posted
/// and to the handler when it is dispatched.
#[derive(Debug)]
#[must_use]
pub struct Envelope {
    src: TaskId,
    dst: TaskId,
    msg: Msg,
}

impl Envelope {
    /// Creates a new envelope.
    #[inline]
    pub const fn new(src: TaskId, dst: TaskId, msg: Msg) -> Self {
        Self { src, dst, msg }
    }

    /// Returns the message kind.
    #[inline(always)]
    #[must_use]
    pub const fn kind(&self) -> MsgKind {
        self.msg.kind()
    }

    /// Returns the sending task.
    #[inline(always)]
    #[must_use]
    pub const fn src(&self) -> TaskId {
        self.src
    }

    /// Returns the destination task.
    #[inline(always)]
    #[must_use]
    pub const fn dst(&self) -> TaskId {
        self.dst
    }

    /// Returns the message.
    #[inline(always)]
    #[must_use]
    pub const fn msg(&self) -> &Msg {
        &self.msg
    }

    /// Consumes the envelope, returning the message.
    #[inline(always)]
    #[must_use]
    pub fn into_msg(self) -> Msg {
        self.msg
    }
}
