//! Deadline enforcement for blocking bus adapters.
//!
//! [`TimeoutBus`] moves the wrapped adapter onto a dedicated worker thread.
//! Each call is sent as a sequenced request over a bounded channel and the
//! reply is awaited until a deadline. A request that misses its deadline
//! yields [`BusError::Timeout`]; its late reply is recognized by sequence
//! number and discarded by the next call.
//!
//! While the worker is stuck inside the adapter, the single request slot
//! stays occupied and further calls time out at the send stage.
//!
//! A torque write that the worker dequeues after its deadline is dropped
//! without reaching the adapter, so a command reported as `Timeout` is never
//! applied late. Late reads and polls still run; their replies are discarded.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};
use hand_common::bus::{BusAdapter, BusError, check_len};
use hand_common::{JointVec, zeroed_joints};
use tracing::{debug, trace};

use crate::error::ControlError;

enum Op {
    Read,
    Write(JointVec),
    Poll,
}

struct Request {
    seq: u64,
    deadline: Instant,
    op: Op,
}

enum Outcome {
    Positions(Result<JointVec, BusError>),
    Written(Result<(), BusError>),
    Fault(Result<bool, BusError>),
}

struct Reply {
    seq: u64,
    outcome: Outcome,
}

/// [`BusAdapter`] that bounds every operation by a deadline.
pub struct TimeoutBus {
    joint_count: usize,
    timeout: Duration,
    seq: u64,
    requests: Option<Sender<Request>>,
    replies: Receiver<Reply>,
    worker: Option<JoinHandle<()>>,
}

impl TimeoutBus {
    /// Move `bus` onto a worker thread; every call waits at most `timeout`.
    pub fn spawn<B>(bus: B, timeout: Duration) -> Result<Self, ControlError>
    where
        B: BusAdapter + 'static,
    {
        let joint_count = bus.joint_count();
        let (req_tx, req_rx) = bounded::<Request>(1);
        let (rep_tx, rep_rx) = bounded::<Reply>(2);

        let worker = thread::Builder::new()
            .name("hand-bus".into())
            .spawn(move || worker_loop(bus, timeout, req_rx, rep_tx))
            .map_err(|e| ControlError::Initialization(format!("failed to spawn bus worker: {e}")))?;

        debug!(joints = joint_count, timeout_us = timeout.as_micros() as u64, "bus worker started");

        Ok(Self {
            joint_count,
            timeout,
            seq: 0,
            requests: Some(req_tx),
            replies: rep_rx,
            worker: Some(worker),
        })
    }

    /// Per-operation deadline.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn call(&mut self, operation: &'static str, op: Op) -> Result<Outcome, BusError> {
        let deadline = Instant::now() + self.timeout;
        let timed_out = BusError::Timeout {
            operation,
            budget: self.timeout,
        };

        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;

        let requests = self.requests.as_ref().ok_or(BusError::Disconnected)?;
        match requests.send_deadline(Request { seq, deadline, op }, deadline) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => return Err(timed_out),
            Err(SendTimeoutError::Disconnected(_)) => return Err(BusError::Disconnected),
        }

        loop {
            match self.replies.recv_deadline(deadline) {
                Ok(reply) if reply.seq == seq => return Ok(reply.outcome),
                Ok(stale) => trace!(seq = stale.seq, "discarding late bus reply"),
                Err(RecvTimeoutError::Timeout) => return Err(timed_out),
                Err(RecvTimeoutError::Disconnected) => return Err(BusError::Disconnected),
            }
        }
    }
}

fn worker_loop<B: BusAdapter>(
    mut bus: B,
    timeout: Duration,
    requests: Receiver<Request>,
    replies: Sender<Reply>,
) {
    let Some(mut buf) = zeroed_joints(bus.joint_count()) else {
        return;
    };

    for Request { seq, deadline, op } in requests.iter() {
        let outcome = match op {
            Op::Read => Outcome::Positions(
                bus.read_joint_positions(&mut buf).map(|()| buf.clone()),
            ),
            Op::Write(_) if Instant::now() > deadline => {
                debug!(seq, "dropping torque write dequeued after its deadline");
                Outcome::Written(Err(BusError::Timeout {
                    operation: "write",
                    budget: timeout,
                }))
            }
            Op::Write(torques) => Outcome::Written(bus.write_joint_torques(&torques)),
            Op::Poll => Outcome::Fault(bus.poll_fault_status()),
        };
        if replies.send(Reply { seq, outcome }).is_err() {
            break;
        }
    }
    debug!("bus worker exiting");
}

impl BusAdapter for TimeoutBus {
    fn joint_count(&self) -> usize {
        self.joint_count
    }

    fn read_joint_positions(&mut self, positions: &mut [f64]) -> Result<(), BusError> {
        check_len(self.joint_count, positions.len())?;
        match self.call("read", Op::Read)? {
            Outcome::Positions(result) => {
                let read = result?;
                check_len(self.joint_count, read.len())?;
                positions.copy_from_slice(&read);
                Ok(())
            }
            _ => Err(BusError::Communication("mismatched reply to read".into())),
        }
    }

    fn write_joint_torques(&mut self, torques: &[f64]) -> Result<(), BusError> {
        check_len(self.joint_count, torques.len())?;
        let command = JointVec::from_slice(torques)
            .map_err(|_| BusError::JointCountMismatch {
                expected: self.joint_count,
                actual: torques.len(),
            })?;
        match self.call("write", Op::Write(command))? {
            Outcome::Written(result) => result,
            _ => Err(BusError::Communication("mismatched reply to write".into())),
        }
    }

    fn poll_fault_status(&mut self) -> Result<bool, BusError> {
        match self.call("poll", Op::Poll)? {
            Outcome::Fault(result) => result,
            _ => Err(BusError::Communication("mismatched reply to poll".into())),
        }
    }
}

impl Drop for TimeoutBus {
    fn drop(&mut self) {
        // Closing the request channel ends the worker's loop.
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                let _ = worker.join();
            } else {
                debug!("bus worker still busy, detaching");
            }
        }
    }
}
