use std::time::Duration;

use crate::gatt::{Cmp, Procedure, Slot};

use super::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum State {
    Idle,
    Busy,
}

/// Test task that records the messages it handles.
#[derive(Debug, Default)]
pub(super) struct Echo {
    reads: Vec<(u8, Slot)>,
    retained: Vec<Envelope>,
    created: Vec<ConnIdx>,
    cleaned: Vec<ConnIdx>,
}

const TIMER: TimerId = TimerId(1);

impl Echo {
    fn enable(&mut self, cx: &mut Context<'_, State>, _: Envelope) -> Disposition {
        cx.set_state(State::Busy);
        cx.set_timer(TIMER, Duration::from_secs(1));
        Disposition::Consumed
    }

    fn save(&mut self, _: &mut Context<'_, State>, env: Envelope) -> Disposition {
        Disposition::Saved(env)
    }

    fn read(&mut self, cx: &mut Context<'_, State>, env: Envelope) -> Disposition {
        let Msg::ReadReq { slot } = *env.msg() else {
            unreachable!()
        };
        self.reads.push((cx.id().idx, slot));
        let result = Ok(Value::default());
        cx.reply(&env, Msg::ReadRsp { slot, result });
        Disposition::Consumed
    }

    fn write(&mut self, _: &mut Context<'_, State>, env: Envelope) -> Disposition {
        self.retained.push(env);
        Disposition::Retained
    }

    fn done(&mut self, cx: &mut Context<'_, State>, _: Envelope) -> Disposition {
        cx.clear_timer(TIMER);
        cx.set_state(State::Idle);
        Disposition::Consumed
    }

    fn timeout(&mut self, cx: &mut Context<'_, State>, _: Envelope) -> Disposition {
        cx.set_state(State::Idle);
        let conn = cx.conn();
        cx.send(TaskId::app(), Msg::EnergyResetInd { conn });
        Disposition::Consumed
    }

    fn level(&mut self, cx: &mut Context<'_, State>, env: Envelope) -> Disposition {
        cx.reply(&env, Msg::SendRsp { result: Ok(()) });
        Disposition::Consumed
    }
}

impl Task for Echo {
    type State = State;

    const TYPE: TaskType = TaskType::HrpCollector;
    const PER_CONN: bool = true;
    const INITIAL: State = State::Idle;

    fn handlers() -> Handlers<Self> {
        use {MsgKind::*, State::*};
        Handlers::new()
            .on(Idle, EnableReq, Self::enable)
            .on(Idle, ReadReq, Self::read)
            .on(Idle, WriteReq, Self::write)
            .on(Busy, ReadReq, Self::save)
            .on(Busy, Cmp, Self::done)
            .on(Busy, Timer, Self::timeout)
            .any(LevelSendReq, Self::level)
    }

    fn create(&mut self, _: &mut Context<'_, State>, c: ConnIdx) {
        self.created.push(c);
    }

    fn cleanup(&mut self, cx: &mut Context<'_, State>, c: ConnIdx) {
        self.cleaned.push(c);
        cx.set_state(State::Idle);
    }
}

fn kernel() -> Kernel {
    let mut k = Kernel::new(Config::default().max_conn(3));
    k.register(Echo::default());
    k
}

fn echo(i: u8) -> TaskId {
    TaskId::new(TaskType::HrpCollector, i)
}

fn send(k: &mut Kernel, i: u8, msg: Msg) {
    k.send(TaskId::app(), echo(i), msg);
}

fn read(i: usize) -> Msg {
    Msg::ReadReq {
        slot: Slot::Char(i),
    }
}

fn cmp() -> Msg {
    Msg::Cmp(Cmp::ok(Procedure::Read))
}

#[test]
fn saved_replay_order() {
    let mut k = kernel();
    send(&mut k, 0, Msg::EnableReq { cached: None });
    send(&mut k, 0, read(0));
    send(&mut k, 0, read(1));
    send(&mut k, 0, cmp());
    send(&mut k, 0, read(2));
    assert_eq!(k.run_until_idle(), 7);
    let e = k.task::<Echo>().unwrap();
    let order: Vec<_> = e.reads.iter().map(|&(_, s)| s).collect();
    assert_eq!(order, [Slot::Char(0), Slot::Char(1), Slot::Char(2)]);
    let rsp: Vec<_> = k.drain_outbound().map(Envelope::into_msg).collect();
    assert_eq!(rsp.len(), 3);
    assert_eq!(
        rsp[0],
        Msg::ReadRsp {
            slot: Slot::Char(0),
            result: Ok(Value::default())
        }
    );
    assert_eq!(k.state::<Echo>(0), Some(State::Idle));
}

#[test]
fn saved_per_instance() {
    let mut k = kernel();
    send(&mut k, 1, Msg::EnableReq { cached: None });
    send(&mut k, 1, read(0));
    send(&mut k, 2, read(5));
    k.run_until_idle();
    // Instance 2 is not blocked by instance 1
    assert_eq!(k.task::<Echo>().unwrap().reads, [(2, Slot::Char(5))]);
    assert_eq!(k.state::<Echo>(1), Some(State::Busy));
    send(&mut k, 1, cmp());
    k.run_until_idle();
    assert_eq!(k.task::<Echo>().unwrap().reads.len(), 2);
}

#[test]
fn default_handler_and_ignored() {
    let mut k = kernel();
    send(&mut k, 0, Msg::LevelSendReq { level: 1 });
    send(&mut k, 0, Msg::EnableReq { cached: None });
    send(&mut k, 0, Msg::LevelSendReq { level: 2 });
    send(&mut k, 0, Msg::EnergyResetInd {
        conn: ConnIdx::new(0),
    });
    send(&mut k, 0, cmp());
    // Unexpected in Idle
    send(&mut k, 0, cmp());
    k.run_until_idle();
    let out: Vec<_> = k.drain_outbound().map(|e| e.kind()).collect();
    assert_eq!(out, [MsgKind::SendRsp, MsgKind::SendRsp]);
}

#[test]
fn routing() {
    let mut k = kernel();
    k.send(echo(0), TaskId::gatt(ConnIdx::new(0)), read(0));
    send(&mut k, 3, read(0));
    assert_eq!(k.pending(), 1);
    assert_eq!(k.run_until_idle(), 1);
    assert!(k.task::<Echo>().unwrap().reads.is_empty());
    let out: Vec<_> = k.drain_outbound().collect();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].dst().typ, TaskType::Gatt);
    assert_eq!(out[0].src(), echo(0));
}

#[test]
fn retained() {
    let mut k = kernel();
    let val = Value::from_slice(&[1]);
    let slot = Slot::Char(0);
    send(&mut k, 0, Msg::WriteReq { slot, val });
    k.run_until_idle();
    let e = k.task::<Echo>().unwrap();
    assert_eq!(e.retained.len(), 1);
    assert_eq!(e.retained[0].kind(), MsgKind::WriteReq);
}

#[test]
fn timer_expiry() {
    let mut k = kernel();
    send(&mut k, 2, Msg::EnableReq { cached: None });
    k.run_until_idle();
    let t = k.next_deadline().unwrap();
    assert_eq!(k.expire(t - Duration::from_millis(1)), 0);
    assert_eq!(k.expire(t), 1);
    assert_eq!(k.next_deadline(), None);
    k.run_until_idle();
    let out: Vec<_> = k.drain_outbound().map(Envelope::into_msg).collect();
    assert_eq!(
        out,
        [Msg::EnergyResetInd {
            conn: ConnIdx::new(2)
        }]
    );
    assert_eq!(k.state::<Echo>(2), Some(State::Idle));
}

#[test]
fn timer_cleared() {
    let mut k = kernel();
    send(&mut k, 0, Msg::EnableReq { cached: None });
    send(&mut k, 0, cmp());
    k.run_until_idle();
    assert_eq!(k.next_deadline(), None);
}

#[test]
fn expired_timer_cleared() {
    let mut k = kernel();
    send(&mut k, 0, Msg::EnableReq { cached: None });
    k.run_until_idle();
    let t = k.next_deadline().unwrap();
    send(&mut k, 0, cmp());
    send(&mut k, 0, Msg::EnableReq { cached: None });
    // Expiry is queued behind the completion that clears the timer
    assert_eq!(k.expire(t), 1);
    assert_eq!(k.pending(), 3);
    k.run_until_idle();
    assert_eq!(k.drain_outbound().count(), 0);
    assert_eq!(k.state::<Echo>(0), Some(State::Busy));
    assert!(k.next_deadline().is_some());
}

#[test]
fn expired_timer_disconnected() {
    let mut k = kernel();
    k.connect(ConnIdx::new(1));
    send(&mut k, 1, Msg::EnableReq { cached: None });
    k.run_until_idle();
    let t = k.next_deadline().unwrap();
    assert_eq!(k.expire(t), 1);
    k.disconnect(ConnIdx::new(1));
    assert_eq!(k.pending(), 0);
    assert_eq!(k.run_until_idle(), 0);
    assert_eq!(k.drain_outbound().count(), 0);
}

#[test]
fn lifecycle() {
    let mut k = kernel();
    k.connect(ConnIdx::new(1));
    k.connect(ConnIdx::new(3));
    send(&mut k, 1, Msg::EnableReq { cached: None });
    send(&mut k, 1, read(0));
    k.run_until_idle();
    assert!(k.next_deadline().is_some());
    k.disconnect(ConnIdx::new(1));
    assert_eq!(k.next_deadline(), None);
    assert_eq!(k.state::<Echo>(1), Some(State::Idle));
    // Saved request was discarded instead of replayed
    assert_eq!(k.run_until_idle(), 0);
    let e = k.task::<Echo>().unwrap();
    assert!(e.reads.is_empty());
    assert_eq!(e.created, [ConnIdx::new(1)]);
    assert_eq!(e.cleaned, [ConnIdx::new(1)]);
}
