use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::*;

/// Runner input.
#[derive(Debug)]
enum Input {
    Post(Envelope),
    Connect(ConnIdx),
    Disconnect(ConnIdx),
}

/// Async driver of a [`Kernel`]. It feeds inputs from [`RunnerHandle`]s into
/// the kernel, fires timers, and forwards outbound envelopes to the channel
/// returned by [`Runner::new`]. All dispatching happens on the task that
/// calls [`Runner::run`].
#[derive(Debug)]
pub struct Runner {
    k: Arc<Mutex<Kernel>>,
    rx: mpsc::UnboundedReceiver<Input>,
    out: mpsc::UnboundedSender<Envelope>,
    ct: CancellationToken,
}

impl Runner {
    /// Creates a runner for kernel `k`. Returns the runner, a handle for
    /// submitting inputs, and the outbound envelope receiver.
    #[must_use]
    pub fn new(k: Kernel) -> (Self, RunnerHandle, mpsc::UnboundedReceiver<Envelope>) {
        let k = Arc::new(Mutex::new(k));
        let (tx, rx) = mpsc::unbounded_channel();
        let (out, out_rx) = mpsc::unbounded_channel();
        let ct = CancellationToken::new();
        let h = RunnerHandle {
            k: Arc::clone(&k),
            tx,
            ct: ct.clone(),
        };
        (Self { k, rx, out, ct }, h, out_rx)
    }

    /// Runs until [`RunnerHandle::shutdown`] is called or all handles are
    /// dropped.
    pub async fn run(mut self) {
        debug!("Runner started");
        loop {
            let deadline = self.k.lock().next_deadline();
            let timer = async {
                match deadline {
                    Some(t) => sleep_until(t).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                biased;
                _ = self.ct.cancelled() => break,
                inp = self.rx.recv() => match inp {
                    Some(inp) => self.apply(inp),
                    None => break,
                },
                _ = timer => {
                    self.k.lock().expire(Instant::now());
                }
            }
            self.step();
        }
        debug!("Runner stopped");
    }

    fn apply(&self, inp: Input) {
        let mut k = self.k.lock();
        match inp {
            Input::Post(env) => k.post(env),
            Input::Connect(c) => k.connect(c),
            Input::Disconnect(c) => k.disconnect(c),
        }
    }

    /// Dispatches all queued envelopes and forwards outbound traffic.
    fn step(&self) {
        let mut k = self.k.lock();
        k.run_until_idle();
        for env in k.drain_outbound() {
            if self.out.send(env).is_err() {
                warn!("Outbound receiver closed");
            }
        }
    }
}

/// Handle for submitting inputs to a [`Runner`].
#[derive(Clone, Debug)]
pub struct RunnerHandle {
    k: Arc<Mutex<Kernel>>,
    tx: mpsc::UnboundedSender<Input>,
    ct: CancellationToken,
}

impl RunnerHandle {
    /// Posts an envelope. Returns `false` if the runner has stopped.
    #[inline]
    pub fn post(&self, env: Envelope) -> bool {
        self.tx.send(Input::Post(env)).is_ok()
    }

    /// Reports a new connection.
    #[inline]
    pub fn connect(&self, c: ConnIdx) -> bool {
        self.tx.send(Input::Connect(c)).is_ok()
    }

    /// Reports a terminated connection.
    #[inline]
    pub fn disconnect(&self, c: ConnIdx) -> bool {
        self.tx.send(Input::Disconnect(c)).is_ok()
    }

    /// Calls `f` with the locked kernel.
    pub fn with<R>(&self, f: impl FnOnce(&Kernel) -> R) -> R {
        f(&self.k.lock())
    }

    /// Stops the runner.
    #[inline]
    pub fn shutdown(&self) {
        self.ct.cancel();
    }
}
