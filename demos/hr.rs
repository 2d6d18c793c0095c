//! Heart Rate sensor and collector exchanging measurements over a simulated
//! transport.

#![allow(unused_crate_dependencies)]
#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use profkit::att::Handle;
use profkit::gatt::{CharProps, Cmp, Procedure, ServiceContent, Slot, SvcAtt, SvcInd};
use profkit::kernel::{
    ConnIdx, Config, Envelope, Kernel, Msg, Runner, RunnerHandle, TaskId, TaskType,
};
use profkit::prf::hrp::*;
use profkit::le::{Addr, RawAddr};
use profkit::prf::ServerProfile;
use profkit::{ContentStore, MemStore, PeerStore};
use profkit_const::{Characteristic, Descriptor, Service};

#[derive(Clone, Debug, clap::Parser)]
struct Args {
    /// Number of simulated connections.
    #[arg(short, long, default_value_t = 2)]
    conns: u8,

    /// Number of measurements to send.
    #[arg(short = 'n', long, default_value_t = 5)]
    count: u16,

    /// Measurement interval in milliseconds.
    #[arg(short, long, default_value_t = 250)]
    interval: u64,

    /// Directory for saving discovered services. Services are kept in memory
    /// if not specified.
    #[arg(short, long)]
    store: Option<PathBuf>,
}

type Store = Box<dyn PeerStore<Value = ServiceContent>>;

/// Service declaration handle of the sensor database.
const BASE: u16 = 0x10;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    if args.conns == 0 {
        bail!("at least one connection is required");
    }
    let cfg = Config::default().max_conn(args.conns);
    let Some(base) = Handle::new(BASE) else {
        bail!("invalid base handle");
    };
    let feat = SensorFeatures {
        location: Some(BodySensorLocation::Chest),
        energy: true,
    };
    let mut k = Kernel::new(cfg);
    k.register(HrpSensor::new(HrSensor::new(base, feat), &cfg))
        .register(HrpCollector::new(&cfg));
    let (runner, h, out) = Runner::new(k);
    let task = tokio::task::spawn(runner.run());
    for i in 0..args.conns {
        let c = ConnIdx::new(i);
        h.connect(c);
        h.post(Envelope::new(TaskId::app(), collector(c), Msg::EnableReq { cached: None }));
    }
    let store: Store = match args.store {
        Some(ref dir) => Box::new(ContentStore::open(dir, "hrp")),
        None => Box::new(MemStore::new()),
    };
    let db = HrSensor::new(base, feat);
    let r = Peer::new(args, db, store, h.clone()).serve(out).await;
    h.shutdown();
    task.await?;
    r
}

fn sensor() -> TaskId {
    TaskId::new(TaskType::HrpSensor, 0)
}

fn collector(c: ConnIdx) -> TaskId {
    TaskId::new(TaskType::HrpCollector, c.get())
}

/// Returns the simulated peer address of connection `c`.
const fn peer(c: ConnIdx) -> Addr {
    Addr::Public(RawAddr::from_le_bytes([c.get(), 0x00, 0x00, 0x00, 0x00, 0xC0]))
}

/// Simulated transport and application.
struct Peer {
    args: Args,
    db: HrSensor,
    store: Store,
    h: RunnerHandle,
    ready: u8,
    sent: u16,
    /// Number of connections restored from the store after reconnecting.
    restored: Option<u8>,
}

impl Peer {
    fn new(args: Args, db: HrSensor, store: Store, h: RunnerHandle) -> Self {
        Self {
            args,
            db,
            store,
            h,
            ready: 0,
            sent: 0,
            restored: None,
        }
    }

    async fn serve(mut self, mut out: UnboundedReceiver<Envelope>) -> Result<()> {
        while let Some(env) = out.recv().await {
            let (src, dst) = (env.src(), env.dst());
            match dst.typ {
                TaskType::Gatt => self.transport(src, dst.conn(), env.into_msg()),
                TaskType::App => {
                    if !self.app(src, env.into_msg()).await? {
                        return Ok(());
                    }
                }
                _ => debug!("Unhandled envelope for {dst}"),
            }
        }
        bail!("runner stopped")
    }

    /// Completes transport commands by forwarding them to the other side of
    /// the loopback connection.
    fn transport(&self, src: TaskId, c: ConnIdx, msg: Msg) {
        let gatt = TaskId::gatt(c);
        let post = |dst, msg| self.h.post(Envelope::new(gatt, dst, msg));
        match msg {
            Msg::DiscSvcCmd { uuid, .. } if uuid == Service::HeartRate.uuid() => {
                post(src, Msg::SvcInd(self.service()));
                post(src, Msg::Cmp(Cmp::ok(Procedure::DiscPrimary)));
            }
            Msg::WriteCmd { hdl, val, .. } => {
                post(sensor(), Msg::WriteReqInd { hdl, val });
            }
            Msg::WriteCfm { status, .. } => {
                let op = Procedure::Write;
                post(collector(c), Msg::Cmp(Cmp { op, status }));
            }
            Msg::SendEvtCmd { hdl, typ, val } => {
                post(collector(c), Msg::EventInd { hdl, typ, val });
                post(src, Msg::Cmp(Cmp::ok(Procedure::Notify)));
            }
            msg => debug!("{c}: Ignoring {:?}", msg.kind()),
        }
    }

    /// Handles an application message. Returns `false` when done.
    async fn app(&mut self, src: TaskId, msg: Msg) -> Result<bool> {
        match msg {
            Msg::EnableRsp { result } => {
                let content = result?;
                if let Some(n) = self.restored.as_mut() {
                    info!("{src}: Restored Heart Rate Service at {:?}", content.range());
                    *n += 1;
                    return Ok(*n < self.args.conns);
                }
                info!("{src}: Heart Rate Service at {:?}", content.range());
                if !self.store.save(peer(src.conn()), &content) {
                    warn!("{src}: Failed to save service content");
                }
                let slot = Slot::Char(HrCollector::MEAS);
                let req = Msg::CfgNtfReq {
                    slot,
                    cfg: profkit::gatt::Cccd::NOTIFY,
                };
                self.h.post(Envelope::new(TaskId::app(), src, req));
            }
            Msg::CfgNtfRsp { result, .. } => {
                result?;
                self.ready += 1;
                if self.ready == self.args.conns {
                    self.send();
                }
            }
            Msg::CfgChangedInd { conn, cfg } => info!("{conn}: Subscription {cfg:?}"),
            Msg::HrMeasInd(m) => println!("{src}: {} bpm, RR {:?}", m.heart_rate, &m.rr[..]),
            Msg::SendRsp { result } => {
                result?;
                if self.sent >= self.args.count {
                    self.reconnect();
                    return Ok(true);
                }
                tokio::time::sleep(Duration::from_millis(self.args.interval)).await;
                self.send();
            }
            msg => debug!("Ignoring {:?} from {src}", msg.kind()),
        }
        Ok(true)
    }

    /// Reconnects all peers and enables the collectors with the saved
    /// service contents.
    fn reconnect(&mut self) {
        self.restored = Some(0);
        for i in 0..self.args.conns {
            let c = ConnIdx::new(i);
            let cached = self.store.load(peer(c));
            if cached.is_none() {
                warn!("{c}: No saved service content");
            }
            self.h.disconnect(c);
            self.h.connect(c);
            let req = Msg::EnableReq { cached };
            self.h.post(Envelope::new(TaskId::app(), collector(c), req));
        }
    }

    /// Sends the next measurement.
    fn send(&mut self) {
        let bpm = 60 + self.sent % 40;
        let meas = HrMeas::new(bpm)
            .with_contact(true)
            .with_rr([60 * 1024 / bpm]);
        self.sent += 1;
        let req = Msg::HrMeasSendReq {
            meas,
            excluded: None,
        };
        self.h.post(Envelope::new(TaskId::app(), sensor(), req));
    }

    /// Returns the sensor database as reported by service discovery.
    fn service(&self) -> SvcInd {
        let h = |off| Handle::new(BASE + off).unwrap_or(Handle::MAX);
        let end = self.db.cp_hdl().unwrap_or_else(|| self.db.cccd_hdl());
        let mut ind = SvcInd::new(
            profkit::att::HandleRange::new(h(0), end),
            Service::HeartRate.uuid(),
        );
        ind.atts.push(SvcAtt::Char {
            decl: h(1),
            val: self.db.val_hdl(),
            props: CharProps::NOTIFY,
            uuid: Characteristic::HeartRateMeasurement.uuid(),
        });
        ind.atts.push(SvcAtt::Desc {
            hdl: self.db.cccd_hdl(),
            uuid: Descriptor::ClientCharacteristicConfiguration.uuid(),
        });
        if let Some(val) = self.db.bsl_hdl() {
            ind.atts.push(SvcAtt::Char {
                decl: h(4),
                val,
                props: CharProps::READ,
                uuid: Characteristic::BodySensorLocation.uuid(),
            });
        }
        if let Some(val) = self.db.cp_hdl() {
            ind.atts.push(SvcAtt::Char {
                decl: val.prev().unwrap_or(val),
                val,
                props: CharProps::WRITE,
                uuid: Characteristic::HeartRateControlPoint.uuid(),
            });
        }
        ind
    }
}
