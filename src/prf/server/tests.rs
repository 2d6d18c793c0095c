use crate::att::Status;
use crate::gatt::Cmp;
use crate::kernel::Kernel;
use crate::prf::bas::{BasServer, BatteryServer};
use crate::prf::hrp::{BodySensorLocation, HrMeas, HrSensor, HrpSensor, SensorFeatures};

use super::*;

fn h(v: u16) -> Handle {
    Handle::new(v).unwrap()
}

fn conn(c: u8) -> ConnIdx {
    ConnIdx::new(c)
}

const HRS: TaskId = TaskId::new(TaskType::HrpSensor, 0);
const MEAS: u16 = 0x12;
const CCCD: u16 = 0x13;

fn kernel() -> Kernel {
    let cfg = Config::default().max_conn(3);
    let mut k = Kernel::new(cfg);
    let feat = SensorFeatures {
        location: Some(BodySensorLocation::Chest),
        energy: true,
    };
    k.register(HrpSensor::new(HrSensor::new(h(0x10), feat), &cfg));
    for c in 0..3 {
        k.connect(conn(c));
    }
    k
}

fn run(k: &mut Kernel) -> Vec<(TaskId, Msg)> {
    k.run_until_idle();
    k.drain_outbound().map(|e| (e.dst(), e.into_msg())).collect()
}

fn state(k: &Kernel) -> ServerState {
    k.state::<HrpSensor>(0).unwrap()
}

/// Writes the measurement CCCD on behalf of connection `c`.
fn subscribe(k: &mut Kernel, c: u8, v: &[u8]) -> Vec<(TaskId, Msg)> {
    let val = Value::from_slice(v);
    k.send(TaskId::gatt(conn(c)), HRS, Msg::WriteReqInd { hdl: h(CCCD), val });
    run(k)
}

fn send_meas(k: &mut Kernel, excluded: Option<ConnIdx>) -> Vec<(TaskId, Msg)> {
    let meas = HrMeas::new(70);
    k.send(TaskId::app(), HRS, Msg::HrMeasSendReq { meas, excluded });
    run(k)
}

fn complete(k: &mut Kernel, c: u8, status: Status) -> Vec<(TaskId, Msg)> {
    let cmp = Cmp {
        op: Procedure::Notify,
        status,
    };
    k.send(TaskId::gatt(conn(c)), HRS, Msg::Cmp(cmp));
    run(k)
}

fn evt(c: u8) -> (TaskId, Msg) {
    let val = Value::from_slice(&[0x00, 70]);
    let (hdl, typ) = (h(MEAS), EventType::Notify);
    (TaskId::gatt(conn(c)), Msg::SendEvtCmd { hdl, typ, val })
}

fn send_rsp(result: crate::Result<()>) -> (TaskId, Msg) {
    (TaskId::app(), Msg::SendRsp { result })
}

#[test]
fn subscribed_connections() {
    let mut k = kernel();
    for c in [0, 2] {
        assert_eq!(
            subscribe(&mut k, c, &[1, 0]),
            [
                (TaskId::gatt(conn(c)), Msg::WriteCfm { hdl: h(CCCD), status: Ok(()) }),
                (TaskId::app(), Msg::CfgChangedInd { conn: conn(c), cfg: Cccd::NOTIFY }),
            ]
        );
    }
    assert_eq!(send_meas(&mut k, None), [evt(0)]);
    assert_eq!(state(&k), ServerState::Busy);
    assert_eq!(complete(&mut k, 0, Ok(())), [evt(2)]);
    assert_eq!(complete(&mut k, 2, Ok(())), [send_rsp(Ok(()))]);
    assert_eq!(state(&k), ServerState::Idle);
}

#[test]
fn second_submission_rejected() {
    let mut k = kernel();
    subscribe(&mut k, 1, &[1, 0]);
    assert_eq!(send_meas(&mut k, None), [evt(1)]);
    let disallowed = Err(RequestError::Disallowed.into());
    assert_eq!(send_meas(&mut k, None), [send_rsp(disallowed)]);
    assert_eq!(state(&k), ServerState::Busy);
    assert_eq!(complete(&mut k, 1, Ok(())), [send_rsp(Ok(()))]);
}

#[test]
fn excluded_connection() {
    let mut k = kernel();
    for c in 0..3 {
        subscribe(&mut k, c, &[1, 0]);
    }
    assert_eq!(send_meas(&mut k, Some(conn(0))), [evt(1)]);
    assert_eq!(complete(&mut k, 1, Ok(())), [evt(2)]);
    assert_eq!(complete(&mut k, 2, Ok(())), [send_rsp(Ok(()))]);
}

#[test]
fn no_subscribers() {
    let mut k = kernel();
    assert_eq!(send_meas(&mut k, None), [send_rsp(Ok(()))]);
    assert_eq!(state(&k), ServerState::Idle);
}

#[test]
fn failed_send_continues() {
    let mut k = kernel();
    subscribe(&mut k, 0, &[1, 0]);
    subscribe(&mut k, 1, &[1, 0]);
    send_meas(&mut k, None);
    let status = Err(ErrorCode::InsufficientResources);
    assert_eq!(complete(&mut k, 0, status), [evt(1)]);
    assert_eq!(complete(&mut k, 1, Ok(())), [send_rsp(Ok(()))]);
}

#[test]
fn unexpected_completion() {
    let mut k = kernel();
    subscribe(&mut k, 0, &[1, 0]);
    subscribe(&mut k, 1, &[1, 0]);
    send_meas(&mut k, None);
    assert!(complete(&mut k, 1, Ok(())).is_empty());
    let cmp = Msg::Cmp(Cmp::ok(Procedure::Indicate));
    k.send(TaskId::gatt(conn(0)), HRS, cmp);
    assert!(run(&mut k).is_empty());
    assert_eq!(complete(&mut k, 0, Ok(())), [evt(1)]);
}

#[test]
fn disconnect_during_send() {
    let mut k = kernel();
    for c in 0..3 {
        subscribe(&mut k, c, &[1, 0]);
    }
    assert_eq!(send_meas(&mut k, None), [evt(0)]);
    k.disconnect(conn(0));
    assert_eq!(run(&mut k), [evt(1)]);
    assert!(complete(&mut k, 0, Ok(())).is_empty());
    k.disconnect(conn(2));
    assert_eq!(complete(&mut k, 1, Ok(())), [send_rsp(Ok(()))]);
    let t = k.task::<HrpSensor>().unwrap();
    assert_eq!(t.cfg(conn(0)), Cccd::empty());
    assert_eq!(t.cfg(conn(1)), Cccd::NOTIFY);
}

#[test]
fn cccd_validation() {
    let mut k = kernel();
    subscribe(&mut k, 0, &[1, 0]);
    for v in [&[2, 0][..], &[3, 0], &[1], &[0, 1], &[1, 0, 0]] {
        assert_eq!(
            subscribe(&mut k, 0, v),
            [(
                TaskId::gatt(conn(0)),
                Msg::WriteCfm {
                    hdl: h(CCCD),
                    status: Err(ErrorCode::CccdImproperlyConfigured)
                }
            )]
        );
    }
    assert_eq!(k.task::<HrpSensor>().unwrap().cfg(conn(0)), Cccd::NOTIFY);

    k.send(TaskId::gatt(conn(0)), HRS, Msg::ReadReqInd { hdl: h(CCCD) });
    let result = Ok(Value::from_slice(&[1, 0]));
    let read = Msg::ReadCfm { hdl: h(CCCD), result };
    assert_eq!(run(&mut k), [(TaskId::gatt(conn(0)), read)]);

    assert_eq!(
        subscribe(&mut k, 0, &[0, 0]),
        [
            (TaskId::gatt(conn(0)), Msg::WriteCfm { hdl: h(CCCD), status: Ok(()) }),
            (TaskId::app(), Msg::CfgChangedInd { conn: conn(0), cfg: Cccd::empty() }),
        ]
    );
}

#[test]
fn restore_subscription() {
    let mut k = kernel();
    let (c1, c2) = (conn(1), conn(2));
    k.send(TaskId::app(), HRS, Msg::RestoreCfgReq { conn: c1, cfg: Cccd::NOTIFY });
    k.send(TaskId::app(), HRS, Msg::RestoreCfgReq { conn: c2, cfg: Cccd::INDICATE });
    assert!(run(&mut k).is_empty());
    let t = k.task::<HrpSensor>().unwrap();
    assert_eq!((t.cfg(c1), t.cfg(c2)), (Cccd::NOTIFY, Cccd::empty()));
    assert_eq!(send_meas(&mut k, None), [evt(1)]);
}

#[test]
fn peer_access() {
    let mut k = kernel();
    let gatt2 = TaskId::gatt(conn(2));
    k.send(gatt2, HRS, Msg::WriteReqInd { hdl: h(0x17), val: Value::from_slice(&[1]) });
    k.send(gatt2, HRS, Msg::ReadReqInd { hdl: h(0x15) });
    k.send(gatt2, HRS, Msg::ReadReqInd { hdl: h(0x40) });
    let bsl = Ok(Value::from_slice(&[BodySensorLocation::Chest.into()]));
    assert_eq!(
        run(&mut k),
        [
            (gatt2, Msg::WriteCfm { hdl: h(0x17), status: Ok(()) }),
            (TaskId::app(), Msg::EnergyResetInd { conn: conn(2) }),
            (gatt2, Msg::ReadCfm { hdl: h(0x15), result: bsl }),
            (
                gatt2,
                Msg::ReadCfm {
                    hdl: h(0x40),
                    result: Err(ErrorCode::InvalidHandle)
                }
            ),
        ]
    );
}

#[test]
fn battery_level() {
    let cfg = Config::default().max_conn(2);
    let mut k = Kernel::new(cfg);
    k.register(BasServer::new(BatteryServer::new(h(0x20), 90), &cfg));
    k.connect(conn(1));
    let bas = TaskId::new(TaskType::BasServer, 0);
    let gatt1 = TaskId::gatt(conn(1));
    k.send(gatt1, bas, Msg::WriteReqInd { hdl: h(0x23), val: Value::from_slice(&[1, 0]) });
    k.send(TaskId::app(), bas, Msg::LevelSendReq { level: 101 });
    k.send(TaskId::app(), bas, Msg::LevelSendReq { level: 80 });
    let val = Value::from_slice(&[80]);
    assert_eq!(
        run(&mut k),
        [
            (gatt1, Msg::WriteCfm { hdl: h(0x23), status: Ok(()) }),
            (TaskId::app(), Msg::CfgChangedInd { conn: conn(1), cfg: Cccd::NOTIFY }),
            send_rsp(Err(RequestError::InvalidParameter.into())),
            (gatt1, Msg::SendEvtCmd { hdl: h(0x22), typ: EventType::Notify, val: val.clone() }),
        ]
    );
    k.send(gatt1, bas, Msg::Cmp(Cmp::ok(Procedure::Notify)));
    k.send(gatt1, bas, Msg::ReadReqInd { hdl: h(0x22) });
    assert_eq!(
        run(&mut k),
        [
            send_rsp(Ok(())),
            (gatt1, Msg::ReadCfm { hdl: h(0x22), result: Ok(val) }),
        ]
    );
    assert_eq!(k.task::<BasServer>().unwrap().profile().level(), 80);
}
