use std::fmt::Debug;

use profkit_const::Descriptor;
use tracing::{debug, trace, warn};

use crate::att::EventType;
use crate::gatt::{
    Cccd, CharProps, Discovery, Procedure, Progress, RequestError, ServiceContent, Slot,
    SvcTemplate,
};
use crate::kernel::{
    ConnIdx, Config, Context, Disposition, Envelope, Handlers, Msg, Task, TaskId, TaskType,
    TimerId, Value,
};
use crate::{Error, Result};

use super::EnvRegistry;

/// Client profile definition.
pub trait ClientProfile: Debug + Default + Send + 'static {
    /// Task type of the profile.
    const TYPE: TaskType;
    /// Expected peer service.
    const SVC: &'static SvcTemplate;

    /// Translates a peer notification or indication of characteristic slot
    /// `i` into an application message. Returns [`None`] to drop the value.
    fn value_ind(&mut self, i: usize, val: Value) -> Option<Msg> {
        Some(Msg::ValueInd {
            slot: Slot::Char(i),
            val,
        })
    }
}

/// Client instance state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClientState {
    /// No environment.
    Free,
    /// Peer service discovery in progress.
    Discovering,
    /// Ready for application requests.
    Idle,
    /// Peer read or write in progress.
    Busy,
}

/// Per-connection client environment.
#[derive(Debug)]
pub struct ClientEnv {
    disc: Option<Discovery>,
    content: Option<ServiceContent>,
    requester: TaskId,
    pending: Option<Envelope>,
    read: Option<Value>,
}

impl ClientEnv {
    const fn new(requester: TaskId) -> Self {
        Self {
            disc: None,
            content: None,
            requester,
            pending: None,
            read: None,
        }
    }

    /// Returns the discovered service content.
    #[inline(always)]
    #[must_use]
    pub const fn content(&self) -> Option<&ServiceContent> {
        self.content.as_ref()
    }

    /// Returns whether a peer request is outstanding.
    #[inline(always)]
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.pending.is_some()
    }
}

/// Procedure timer shared by discovery and peer requests.
const OP_TIMER: TimerId = TimerId(0);

/// Generic client profile task with one instance per connection.
#[derive(Debug)]
pub struct Client<P> {
    prf: P,
    timeout: std::time::Duration,
    app: TaskId,
    env: EnvRegistry<ClientEnv>,
}

impl<P: ClientProfile> Client<P> {
    /// Creates a client profile task.
    #[must_use]
    pub fn new(cfg: &Config) -> Self {
        Self {
            prf: P::default(),
            timeout: cfg.disc_timeout,
            app: TaskId::app(),
            env: EnvRegistry::new(usize::from(cfg.max_conn)),
        }
    }

    /// Sets the task that receives peer values.
    #[inline]
    #[must_use]
    pub const fn with_app(mut self, app: TaskId) -> Self {
        self.app = app;
        self
    }

    /// Returns the environment registry.
    #[inline(always)]
    #[must_use]
    pub const fn env(&self) -> &EnvRegistry<ClientEnv> {
        &self.env
    }

    /// Starts discovery or restores a cached service content.
    fn enable(&mut self, cx: &mut Context<'_, ClientState>, env: Envelope) -> Disposition {
        let src = env.src();
        let Msg::EnableReq { cached } = env.into_msg() else {
            return Disposition::Consumed;
        };
        let result = match cached {
            Some(content) => self.restore(cx, src, content),
            None => self.discover(cx, src),
        };
        match result {
            Ok(Some(content)) => cx.send(src, Msg::EnableRsp { result: Ok(content) }),
            Ok(None) => {}
            Err(e) => {
                debug!("{}: Enable failed: {e}", cx.id());
                cx.send(src, Msg::EnableRsp { result: Err(e) });
            }
        }
        Disposition::Consumed
    }

    /// Validates a cached service content and enters the idle state.
    fn restore(
        &mut self,
        cx: &mut Context<'_, ClientState>,
        src: TaskId,
        content: ServiceContent,
    ) -> Result<Option<ServiceContent>> {
        P::SVC.validate(&content)?;
        let e = self.env.alloc(cx.conn(), ClientEnv::new(src))?;
        e.content = Some(content.clone());
        cx.set_state(ClientState::Idle);
        debug!("{}: Restored {} at {:?}", cx.id(), P::SVC.uuid, content.range());
        Ok(Some(content))
    }

    /// Starts peer service discovery.
    fn discover(
        &mut self,
        cx: &mut Context<'_, ClientState>,
        src: TaskId,
    ) -> Result<Option<ServiceContent>> {
        let e = self.env.alloc(cx.conn(), ClientEnv::new(src))?;
        let (d, req) = Discovery::start(P::SVC);
        e.disc = Some(d);
        cx.send(TaskId::gatt(cx.conn()), req.into());
        cx.set_timer(OP_TIMER, self.timeout);
        cx.set_state(ClientState::Discovering);
        Ok(None)
    }

    /// Forwards a discovery indication to the discovery engine.
    fn disc_ind(&mut self, cx: &mut Context<'_, ClientState>, env: Envelope) -> Disposition {
        let Some(d) = (self.env.get_mut(cx.conn())).and_then(|e| e.disc.as_mut()) else {
            warn!("{}: No discovery in progress", cx.id());
            return Disposition::Consumed;
        };
        match *env.msg() {
            Msg::SvcInd(ref ind) => d.on_svc(ind),
            Msg::CharInd(ref ind) => d.on_char(ind),
            Msg::DescInd(ref ind) => d.on_desc(ind),
            _ => {}
        }
        Disposition::Consumed
    }

    /// Advances discovery on a completion event.
    fn disc_cmp(&mut self, cx: &mut Context<'_, ClientState>, env: Envelope) -> Disposition {
        let Msg::Cmp(ref cmp) = *env.msg() else {
            return Disposition::Consumed;
        };
        let Some(d) = (self.env.get_mut(cx.conn())).and_then(|e| e.disc.as_mut()) else {
            return Disposition::Consumed;
        };
        match d.on_cmp(cmp) {
            None => {}
            Some(Progress::Request(req)) => {
                cx.send(TaskId::gatt(cx.conn()), req.into());
                cx.set_timer(OP_TIMER, self.timeout);
            }
            Some(Progress::Done(r)) => self.disc_done(cx, r),
        }
        Disposition::Consumed
    }

    /// Fails discovery when the procedure timer expires.
    fn disc_timeout(&mut self, cx: &mut Context<'_, ClientState>, _: Envelope) -> Disposition {
        warn!("{}: Discovery timeout", cx.id());
        self.disc_done(cx, Err(Error::Timeout));
        Disposition::Consumed
    }

    /// Completes discovery and reports the result to the requester.
    fn disc_done(&mut self, cx: &mut Context<'_, ClientState>, r: Result<ServiceContent>) {
        let c = cx.conn();
        cx.clear_timer(OP_TIMER);
        let result = match r {
            Ok(content) => {
                let Some(e) = self.env.get_mut(c) else { return };
                e.disc = None;
                e.content = Some(content.clone());
                cx.set_state(ClientState::Idle);
                cx.send(e.requester, Msg::EnableRsp { result: Ok(content) });
                return;
            }
            Err(e) => Err(e),
        };
        if let Some(e) = self.env.free(c) {
            cx.set_state(ClientState::Free);
            cx.send(e.requester, Msg::EnableRsp { result });
        }
    }

    /// Returns the discovered content of the instance connection.
    fn content(&self, c: ConnIdx) -> Option<&ServiceContent> {
        self.env.get(c)?.content.as_ref()
    }

    /// Reads a characteristic or descriptor from the peer.
    fn read(&mut self, cx: &mut Context<'_, ClientState>, env: Envelope) -> Disposition {
        let Msg::ReadReq { slot } = *env.msg() else {
            return Disposition::Consumed;
        };
        let r = self.content(cx.conn()).ok_or(RequestError::Disallowed).and_then(|c| {
            let h = c.hdl(slot).ok_or(RequestError::InexistentHandle)?;
            require(c, slot, CharProps::READ)?;
            Ok(h)
        });
        match r {
            Ok(hdl) => self.start(cx, env, Msg::ReadCmd { hdl }),
            Err(e) => reject(cx, &env, e.into()),
        }
    }

    /// Writes a characteristic or descriptor of the peer.
    fn write(&mut self, cx: &mut Context<'_, ClientState>, env: Envelope) -> Disposition {
        let Msg::WriteReq { slot, ref val } = *env.msg() else {
            return Disposition::Consumed;
        };
        let r = self.content(cx.conn()).ok_or(RequestError::Disallowed).and_then(|c| {
            let hdl = c.hdl(slot).ok_or(RequestError::InexistentHandle)?;
            let rsp = match slot {
                Slot::Char(i) => {
                    let props = c.chars()[i].props;
                    if !props.intersects(CharProps::WRITE | CharProps::WRITE_WITHOUT_RESPONSE) {
                        return Err(RequestError::FeatureNotSupported);
                    }
                    props.contains(CharProps::WRITE)
                }
                Slot::Desc(_) => true,
            };
            Ok(Msg::WriteCmd {
                hdl,
                val: val.clone(),
                rsp,
            })
        });
        match r {
            Ok(cmd) => self.start(cx, env, cmd),
            Err(e) => reject(cx, &env, e.into()),
        }
    }

    /// Configures peer notifications or indications of a characteristic.
    fn cfg_ntf(&mut self, cx: &mut Context<'_, ClientState>, env: Envelope) -> Disposition {
        let Msg::CfgNtfReq { slot, cfg } = *env.msg() else {
            return Disposition::Consumed;
        };
        let r = self.content(cx.conn()).ok_or(RequestError::Disallowed).and_then(|c| {
            let Slot::Char(i) = slot else {
                return Err(RequestError::InvalidParameter);
            };
            let chr = c.chars().get(i).filter(|d| d.val.is_some());
            let chr = chr.ok_or(RequestError::InexistentHandle)?;
            let enable = Cccd::enable_for(chr.props).ok_or(RequestError::FeatureNotSupported)?;
            let cfg = Cccd::validate(cfg.bits(), enable)?;
            let cccd = Descriptor::ClientCharacteristicConfiguration.uuid();
            let hdl = (P::SVC.desc_of(i, cccd))
                .and_then(|j| c.hdl(Slot::Desc(j)))
                .ok_or(RequestError::InexistentHandle)?;
            Ok(Msg::WriteCmd {
                hdl,
                val: Value::from_slice(&cfg.to_le_bytes()),
                rsp: true,
            })
        });
        match r {
            Ok(cmd) => self.start(cx, env, cmd),
            Err(e) => reject(cx, &env, e.into()),
        }
    }

    /// Issues a peer request and retains the application request until it
    /// completes.
    fn start(&mut self, cx: &mut Context<'_, ClientState>, env: Envelope, cmd: Msg) -> Disposition {
        let Some(e) = self.env.get_mut(cx.conn()) else {
            return reject(cx, &env, RequestError::Disallowed.into());
        };
        cx.send(TaskId::gatt(cx.conn()), cmd);
        cx.set_timer(OP_TIMER, self.timeout);
        cx.set_state(ClientState::Busy);
        e.read = None;
        e.pending = Some(env);
        Disposition::Retained
    }

    /// Keeps the value returned by a peer read.
    fn read_ind(&mut self, cx: &mut Context<'_, ClientState>, env: Envelope) -> Disposition {
        let c = cx.conn();
        let Msg::ReadInd { hdl, .. } = *env.msg() else {
            return Disposition::Consumed;
        };
        let Some(e) = self.env.get_mut(c) else {
            return Disposition::Consumed;
        };
        let expected = match (e.pending.as_ref().map(Envelope::msg), e.content.as_ref()) {
            (Some(&Msg::ReadReq { slot }), Some(content)) => content.hdl(slot) == Some(hdl),
            _ => false,
        };
        if !expected {
            warn!("{}: Unexpected read response for {hdl}", cx.id());
            return Disposition::Consumed;
        }
        if let Msg::ReadInd { val, .. } = env.into_msg() {
            e.read = Some(val);
        }
        Disposition::Consumed
    }

    /// Completes the pending peer request.
    fn op_cmp(&mut self, cx: &mut Context<'_, ClientState>, env: Envelope) -> Disposition {
        let Msg::Cmp(cmp) = *env.msg() else {
            return Disposition::Consumed;
        };
        let Some(e) = self.env.get_mut(cx.conn()) else {
            return Disposition::Consumed;
        };
        let expected = match e.pending.as_ref().map(Envelope::msg) {
            Some(Msg::ReadReq { .. }) => cmp.op == Procedure::Read,
            Some(Msg::WriteReq { .. } | Msg::CfgNtfReq { .. }) => {
                matches!(cmp.op, Procedure::Write | Procedure::WriteNoRsp)
            }
            _ => false,
        };
        if !expected {
            warn!("{}: Unexpected {} completion", cx.id(), cmp.op);
            return Disposition::Consumed;
        }
        let status = cmp.status.map_err(Error::Att);
        let read = e.read.take();
        self.finish(cx, status, read);
        Disposition::Consumed
    }

    /// Fails the pending peer request when the procedure timer expires.
    fn op_timeout(&mut self, cx: &mut Context<'_, ClientState>, _: Envelope) -> Disposition {
        warn!("{}: Request timeout", cx.id());
        self.finish(cx, Err(Error::Timeout), None);
        Disposition::Consumed
    }

    /// Responds to the retained request and frees it.
    fn finish(
        &mut self,
        cx: &mut Context<'_, ClientState>,
        status: Result<()>,
        read: Option<Value>,
    ) {
        cx.clear_timer(OP_TIMER);
        cx.set_state(ClientState::Idle);
        let Some(req) = self.env.get_mut(cx.conn()).and_then(|e| e.pending.take()) else {
            return;
        };
        let rsp = match *req.msg() {
            Msg::ReadReq { slot } => Msg::ReadRsp {
                slot,
                result: status.map(|()| read.unwrap_or_default()),
            },
            Msg::WriteReq { slot, .. } => Msg::WriteRsp {
                slot,
                result: status,
            },
            Msg::CfgNtfReq { slot, .. } => Msg::CfgNtfRsp {
                slot,
                result: status,
            },
            _ => return,
        };
        cx.reply(&req, rsp);
    }

    /// Handles a peer notification or indication.
    fn event_ind(&mut self, cx: &mut Context<'_, ClientState>, env: Envelope) -> Disposition {
        let (c, src) = (cx.conn(), env.src());
        let Msg::EventInd { hdl, typ, val } = env.into_msg() else {
            return Disposition::Consumed;
        };
        if typ == EventType::Indicate {
            cx.send(src, Msg::EventCfm { hdl });
        }
        match self.content(c).and_then(|content| content.find(hdl)) {
            Some(Slot::Char(i)) => {
                if let Some(m) = self.prf.value_ind(i, val) {
                    cx.send(self.app, m);
                }
            }
            _ => trace!("{}: Ignoring {typ} for {hdl}", cx.id()),
        }
        Disposition::Consumed
    }

    /// Saves a request until the current peer request completes.
    #[allow(clippy::unused_self)]
    fn save(&mut self, _: &mut Context<'_, ClientState>, env: Envelope) -> Disposition {
        Disposition::Saved(env)
    }

    /// Rejects a request that is not allowed in the current state.
    #[allow(clippy::unused_self)]
    fn disallow(&mut self, cx: &mut Context<'_, ClientState>, env: Envelope) -> Disposition {
        reject(cx, &env, RequestError::Disallowed.into())
    }
}

/// Verifies that a characteristic slot permits the access.
fn require(
    c: &ServiceContent,
    slot: Slot,
    props: CharProps,
) -> std::result::Result<(), RequestError> {
    match slot {
        Slot::Char(i) if !c.chars()[i].props.contains(props) => {
            Err(RequestError::FeatureNotSupported)
        }
        _ => Ok(()),
    }
}

/// Sends the error response to an application request.
fn reject(cx: &mut Context<'_, ClientState>, env: &Envelope, e: Error) -> Disposition {
    let rsp = match *env.msg() {
        Msg::EnableReq { .. } => Msg::EnableRsp { result: Err(e) },
        Msg::ReadReq { slot } => Msg::ReadRsp {
            slot,
            result: Err(e),
        },
        Msg::WriteReq { slot, .. } => Msg::WriteRsp {
            slot,
            result: Err(e),
        },
        Msg::CfgNtfReq { slot, .. } => Msg::CfgNtfRsp {
            slot,
            result: Err(e),
        },
        _ => return Disposition::Consumed,
    };
    debug!("{}: Rejecting {} with {e}", cx.id(), env.kind());
    cx.reply(env, rsp);
    Disposition::Consumed
}

impl<P: ClientProfile> Task for Client<P> {
    type State = ClientState;

    const TYPE: TaskType = P::TYPE;
    const PER_CONN: bool = true;
    const INITIAL: ClientState = ClientState::Free;

    fn handlers() -> Handlers<Self> {
        use crate::kernel::MsgKind::*;
        use ClientState::*;
        Handlers::new()
            .on(Free, EnableReq, Self::enable)
            .on(Discovering, SvcInd, Self::disc_ind)
            .on(Discovering, CharInd, Self::disc_ind)
            .on(Discovering, DescInd, Self::disc_ind)
            .on(Discovering, Cmp, Self::disc_cmp)
            .on(Discovering, Timer, Self::disc_timeout)
            .on(Idle, ReadReq, Self::read)
            .on(Idle, WriteReq, Self::write)
            .on(Idle, CfgNtfReq, Self::cfg_ntf)
            .on(Busy, ReadReq, Self::save)
            .on(Busy, WriteReq, Self::save)
            .on(Busy, CfgNtfReq, Self::save)
            .on(Busy, ReadInd, Self::read_ind)
            .on(Busy, Cmp, Self::op_cmp)
            .on(Busy, Timer, Self::op_timeout)
            .any(EventInd, Self::event_ind)
            .any(EnableReq, Self::disallow)
            .any(ReadReq, Self::disallow)
            .any(WriteReq, Self::disallow)
            .any(CfgNtfReq, Self::disallow)
    }

    fn create(&mut self, _: &mut Context<'_, ClientState>, c: ConnIdx) {
        self.env.connect(c);
    }

    fn cleanup(&mut self, cx: &mut Context<'_, ClientState>, c: ConnIdx) {
        if let Some(e) = self.env.disconnect(c) {
            if e.disc.is_some() || e.pending.is_some() {
                debug!("{}: Procedure aborted by disconnect", cx.id());
            }
        }
        cx.set_state(ClientState::Free);
    }
}
