use std::fmt::Debug;

use tracing::{debug, trace, warn};

use crate::att::{ErrorCode, EventType, Handle};
use crate::gatt::{Cccd, FanOut, Procedure, RequestError, Step};
use crate::kernel::{
    ConnIdx, Config, Context, Disposition, Envelope, Handlers, Msg, MsgKind, Task, TaskId,
    TaskType, Value,
};

/// Server profile definition. The profile owns the local attribute values
/// and formats the events sent to subscribed peers.
pub trait ServerProfile: Debug + Send + 'static {
    /// Task type of the profile.
    const TYPE: TaskType;
    /// Application request that starts sending an event.
    const SEND: MsgKind;
    /// Event type sent to subscribed peers.
    const EVENT: EventType;

    /// Returns the handle of the characteristic value sent to peers.
    fn val_hdl(&self) -> Handle;

    /// Returns the handle of the Client Characteristic Configuration
    /// descriptor of the sent characteristic.
    fn cccd_hdl(&self) -> Handle;

    /// Validates a send request and returns the event payload together with
    /// the connection that must not receive it.
    fn prepare(&mut self, msg: &Msg) -> Result<(Value, Option<ConnIdx>), RequestError>;

    /// Reads a local attribute. Returns [`None`] for unknown handles.
    fn read(&self, _hdl: Handle) -> Option<Result<Value, ErrorCode>> {
        None
    }

    /// Writes a local attribute on behalf of connection `c`. A successful
    /// write may produce an application indication. Returns [`None`] for
    /// unknown handles.
    fn write(
        &mut self,
        _c: ConnIdx,
        _hdl: Handle,
        _val: &[u8],
    ) -> Option<Result<Option<Msg>, ErrorCode>> {
        None
    }
}

/// Server task state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerState {
    /// Ready for a send request.
    Idle,
    /// Event fan-out in progress.
    Busy,
}

/// Generic server profile task with a single instance serving all
/// connections.
#[derive(Debug)]
pub struct Server<P> {
    prf: P,
    max_conn: u8,
    app: TaskId,
    cfg: Box<[Cccd]>,
    op: Option<FanOut>,
    cur: Option<ConnIdx>,
}

impl<P: ServerProfile> Server<P> {
    /// Creates a server profile task.
    #[must_use]
    pub fn new(prf: P, cfg: &Config) -> Self {
        Self {
            prf,
            max_conn: cfg.max_conn,
            app: TaskId::app(),
            cfg: vec![Cccd::empty(); usize::from(cfg.max_conn)].into_boxed_slice(),
            op: None,
            cur: None,
        }
    }

    /// Sets the task that receives peer indications.
    #[inline]
    #[must_use]
    pub const fn with_app(mut self, app: TaskId) -> Self {
        self.app = app;
        self
    }

    /// Returns the profile.
    #[inline(always)]
    #[must_use]
    pub const fn profile(&self) -> &P {
        &self.prf
    }

    /// Returns the subscription of connection `c`.
    #[inline]
    #[must_use]
    pub fn cfg(&self, c: ConnIdx) -> Cccd {
        self.cfg.get(c.index()).copied().unwrap_or_default()
    }

    /// Returns the only legal enable bit of the sent characteristic.
    #[inline]
    const fn enable() -> Cccd {
        match P::EVENT {
            EventType::Notify => Cccd::NOTIFY,
            EventType::Indicate => Cccd::INDICATE,
        }
    }

    /// Starts sending an event to all subscribed connections.
    fn send(&mut self, cx: &mut Context<'_, ServerState>, env: Envelope) -> Disposition {
        let (val, excluded) = match self.prf.prepare(env.msg()) {
            Ok(v) => v,
            Err(e) => {
                debug!("{}: Invalid {}: {e}", cx.id(), env.kind());
                cx.reply(&env, Msg::SendRsp { result: Err(e.into()) });
                return Disposition::Consumed;
            }
        };
        let hdl = self.prf.val_hdl();
        self.op = Some(FanOut::new(
            P::EVENT,
            hdl,
            val,
            self.max_conn,
            excluded,
            env.src(),
        ));
        cx.set_state(ServerState::Busy);
        self.step(cx);
        Disposition::Consumed
    }

    /// Rejects a send request while another one is in progress.
    #[allow(clippy::unused_self)]
    fn busy(&mut self, cx: &mut Context<'_, ServerState>, env: Envelope) -> Disposition {
        debug!("{}: Send already in progress", cx.id());
        let result = Err(RequestError::Disallowed.into());
        cx.reply(&env, Msg::SendRsp { result });
        Disposition::Consumed
    }

    /// Advances the fan-out when the transport completes the current send.
    fn sent(&mut self, cx: &mut Context<'_, ServerState>, env: Envelope) -> Disposition {
        let Msg::Cmp(cmp) = *env.msg() else {
            return Disposition::Consumed;
        };
        let want = match P::EVENT {
            EventType::Notify => Procedure::Notify,
            EventType::Indicate => Procedure::Indicate,
        };
        let c = env.src().conn();
        if cmp.op != want || env.src().typ != TaskType::Gatt || self.cur != Some(c) {
            trace!("{}: Ignoring {} completion from {}", cx.id(), cmp.op, env.src());
            return Disposition::Consumed;
        }
        if let Err(e) = cmp.status {
            warn!("{}: {} to {c} failed: {e}", cx.id(), P::EVENT);
        }
        self.step(cx);
        Disposition::Consumed
    }

    /// Sends the event to the next subscribed connection or completes the
    /// request.
    fn step(&mut self, cx: &mut Context<'_, ServerState>) {
        let Some(op) = self.op.as_mut() else {
            return;
        };
        let (cfg, enable) = (&self.cfg, Self::enable());
        match op.next(|c| cfg.get(c.index()).map_or(false, |v| v.contains(enable))) {
            Step::Send(c) => {
                self.cur = Some(c);
                let (hdl, typ, val) = (op.hdl(), op.typ(), op.val().clone());
                cx.send(TaskId::gatt(c), Msg::SendEvtCmd { hdl, typ, val });
            }
            Step::Done => {
                debug!("{}: {} sent to {} connection(s)", cx.id(), op.typ(), op.sent());
                let requester = op.requester();
                self.cur = None;
                self.op = None;
                cx.set_state(ServerState::Idle);
                cx.send(requester, Msg::SendRsp { result: Ok(()) });
            }
        }
    }

    /// Handles a peer read request.
    fn read_req(&mut self, cx: &mut Context<'_, ServerState>, env: Envelope) -> Disposition {
        let Msg::ReadReqInd { hdl } = *env.msg() else {
            return Disposition::Consumed;
        };
        let result = if hdl == self.prf.cccd_hdl() {
            let cfg = self.cfg(env.src().conn());
            Ok(Value::from_slice(&cfg.to_le_bytes()))
        } else {
            (self.prf.read(hdl)).unwrap_or(Err(ErrorCode::InvalidHandle))
        };
        cx.reply(&env, Msg::ReadCfm { hdl, result });
        Disposition::Consumed
    }

    /// Handles a peer write request.
    fn write_req(&mut self, cx: &mut Context<'_, ServerState>, env: Envelope) -> Disposition {
        let Msg::WriteReqInd { hdl, ref val } = *env.msg() else {
            return Disposition::Consumed;
        };
        let c = env.src().conn();
        let (status, ind) = if hdl == self.prf.cccd_hdl() {
            match self.set_cfg(c, val) {
                Ok(cfg) => (Ok(()), Some(Msg::CfgChangedInd { conn: c, cfg })),
                Err(e) => (Err(e), None),
            }
        } else {
            match self.prf.write(c, hdl, val) {
                Some(Ok(ind)) => (Ok(()), ind),
                Some(Err(e)) => (Err(e), None),
                None => (Err(ErrorCode::InvalidHandle), None),
            }
        };
        cx.reply(&env, Msg::WriteCfm { hdl, status });
        if let Some(ind) = ind {
            cx.send(self.app, ind);
        }
        Disposition::Consumed
    }

    /// Updates the subscription of connection `c` from a peer write.
    fn set_cfg(&mut self, c: ConnIdx, val: &[u8]) -> Result<Cccd, ErrorCode> {
        let cfg = Cccd::from_le_slice(val, Self::enable())
            .map_err(|_| ErrorCode::CccdImproperlyConfigured)?;
        let v = (self.cfg.get_mut(c.index())).ok_or(ErrorCode::UnlikelyError)?;
        *v = cfg;
        debug!("{c}: {} subscription {cfg:?}", P::TYPE);
        Ok(cfg)
    }

    /// Restores the subscription of a bonded peer.
    fn restore_cfg(&mut self, cx: &mut Context<'_, ServerState>, env: Envelope) -> Disposition {
        let Msg::RestoreCfgReq { conn, cfg } = *env.msg() else {
            return Disposition::Consumed;
        };
        match (Cccd::validate(cfg.bits(), Self::enable()), self.cfg.get_mut(conn.index())) {
            (Ok(cfg), Some(v)) => {
                trace!("{}: Restored {conn} subscription {cfg:?}", cx.id());
                *v = cfg;
            }
            _ => warn!("{}: Invalid subscription {cfg:?} for {conn}", cx.id()),
        }
        Disposition::Consumed
    }
}

impl<P: ServerProfile> Task for Server<P> {
    type State = ServerState;

    const TYPE: TaskType = P::TYPE;
    const PER_CONN: bool = false;
    const INITIAL: ServerState = ServerState::Idle;

    fn handlers() -> Handlers<Self> {
        use ServerState::*;
        Handlers::new()
            .on(Idle, P::SEND, Self::send)
            .on(Busy, P::SEND, Self::busy)
            .on(Busy, MsgKind::Cmp, Self::sent)
            .any(MsgKind::ReadReqInd, Self::read_req)
            .any(MsgKind::WriteReqInd, Self::write_req)
            .any(MsgKind::RestoreCfgReq, Self::restore_cfg)
    }

    fn cleanup(&mut self, cx: &mut Context<'_, ServerState>, c: ConnIdx) {
        if let Some(v) = self.cfg.get_mut(c.index()) {
            *v = Cccd::empty();
        }
        if self.op.is_some() && self.cur == Some(c) {
            debug!("{}: {c} disconnected during send", cx.id());
            self.step(cx);
        }
    }
}

#[cfg(test)]
mod tests;
