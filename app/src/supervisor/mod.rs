//! Channel supervisor.
//!
//! Owns the connection state of the single live delivery channel and decides
//! when to open it, tear it down, or fall back to periodic health probes.
//! Decisions are made by [`ChannelMachine`]; this module runs the actor that
//! serialises triggers into it and carries out the resulting actions.
//!
//! Start and stop requests run one at a time, in the order they were issued,
//! on a dedicated task. A stop issued before a start always finishes first,
//! so the channel's real state follows the last request.

mod machine;
mod types;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;

pub use machine::{ChannelMachine, DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY, SupervisorTimings};
pub use types::{
    Action, ChannelControl, ChannelError, ConnectionState, SupervisorStatus, Trigger,
};

const TRIGGER_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("channel supervisor is not running")]
    Stopped,
}

/// Cloneable front door to a running supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Trigger>,
    status: watch::Receiver<SupervisorStatus>,
}

impl SupervisorHandle {
    pub async fn connect(&self) -> Result<(), SupervisorError> {
        self.send(Trigger::Connect).await
    }

    pub async fn disconnect(&self) -> Result<(), SupervisorError> {
        self.send(Trigger::Disconnect).await
    }

    pub async fn reconnect(&self) -> Result<(), SupervisorError> {
        self.send(Trigger::Reconnect).await
    }

    pub async fn start_polling(&self) -> Result<(), SupervisorError> {
        self.send(Trigger::StartPolling).await
    }

    /// Report that the live channel died on its own.
    pub async fn channel_down(&self, reason: impl Into<String>) -> Result<(), SupervisorError> {
        self.send(Trigger::ChannelDown(reason.into())).await
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn status(&self) -> SupervisorStatus {
        self.status.borrow().clone()
    }

    /// Watch state and error changes.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.clone()
    }

    async fn send(&self, trigger: Trigger) -> Result<(), SupervisorError> {
        self.tx
            .send(trigger)
            .await
            .map_err(|_| SupervisorError::Stopped)
    }
}

/// Spawn the supervisor actor. It runs until `shutdown` is cancelled, then
/// stops the channel before exiting.
pub fn spawn<C: ChannelControl>(
    channel: Arc<C>,
    timings: SupervisorTimings,
    shutdown: CancellationToken,
) -> (SupervisorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(TRIGGER_CAPACITY);
    let (status_tx, status_rx) = watch::channel(SupervisorStatus::default());
    let (ops_tx, ops_rx) = mpsc::unbounded_channel();

    let runtime = Runtime {
        machine: ChannelMachine::new(timings),
        channel,
        tx: tx.clone(),
        ops: ops_tx,
        status: status_tx,
        polling: None,
        settle: None,
    };
    let task = tokio::spawn(runtime.run(rx, ops_rx, shutdown));

    tracing::info!(
        poll_interval_ms = timings.poll_interval.as_millis() as u64,
        settle_delay_ms = timings.settle_delay.as_millis() as u64,
        "Channel supervisor started"
    );
    (
        SupervisorHandle {
            tx,
            status: status_rx,
        },
        task,
    )
}

struct Runtime<C> {
    machine: ChannelMachine,
    channel: Arc<C>,
    /// Loopback for completions and timer firings.
    tx: mpsc::Sender<Trigger>,
    /// Queue of the sequential start/stop executor.
    ops: mpsc::UnboundedSender<ChannelOp>,
    status: watch::Sender<SupervisorStatus>,
    polling: Option<(u64, JoinHandle<()>)>,
    settle: Option<(u64, JoinHandle<()>)>,
}

impl<C: ChannelControl> Runtime<C> {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Trigger>,
        ops: mpsc::UnboundedReceiver<ChannelOp>,
        shutdown: CancellationToken,
    ) {
        let executor = tokio::spawn(run_channel_ops(
            self.channel.clone(),
            ops,
            self.tx.clone(),
            shutdown.clone(),
        ));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                trigger = rx.recv() => {
                    // the runtime holds a sender, so recv only ends on shutdown
                    let Some(trigger) = trigger else { break };
                    tracing::trace!(?trigger, "Supervisor trigger");
                    let actions = self.machine.handle(trigger);
                    for action in actions {
                        self.execute(action);
                    }
                    self.publish();
                }
            }
        }

        // late completions have nowhere to go
        drop(rx);
        for action in self.machine.shutdown() {
            self.execute(action);
        }
        abort_timer(&mut self.polling);
        abort_timer(&mut self.settle);
        // a request already running finishes before the final stop
        if let Err(e) = executor.await {
            tracing::warn!(error = %e, "Channel executor failed");
        }
        if let Err(e) = self.channel.stop().await {
            tracing::warn!(error = %e, "Failed to stop channel during shutdown");
        }
        self.publish();
        tracing::info!("Channel supervisor stopped");
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::StartChannel { attempt } => self.queue_op(ChannelOp::Start { attempt }),
            Action::StopChannel { reconnect } => self.queue_op(ChannelOp::Stop { reconnect }),
            Action::ScheduleSettle { reconnect, delay } => {
                abort_timer(&mut self.settle);
                let tx = self.tx.clone();
                let handle = tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = tx.send(Trigger::SettleElapsed { reconnect }).await;
                });
                self.settle = Some((reconnect, handle));
            }
            Action::CancelSettle { reconnect } => {
                if self.settle.as_ref().is_some_and(|(id, _)| *id == reconnect) {
                    abort_timer(&mut self.settle);
                }
            }
            Action::StartPolling { session, interval } => {
                abort_timer(&mut self.polling);
                let tx = self.tx.clone();
                let handle = tokio::spawn(async move {
                    // first probe one full interval after polling begins
                    let mut ticker = interval_at(Instant::now() + interval, interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        if tx.send(Trigger::PollTick { session }).await.is_err() {
                            break;
                        }
                    }
                });
                self.polling = Some((session, handle));
            }
            Action::CancelPolling { session } => {
                if self.polling.as_ref().is_some_and(|(id, _)| *id == session) {
                    abort_timer(&mut self.polling);
                }
            }
            Action::Probe { session } => {
                let channel = self.channel.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = channel.probe().await;
                    let _ = tx.send(Trigger::ProbeCompleted { session, result }).await;
                });
            }
        }
    }

    fn queue_op(&self, op: ChannelOp) {
        if self.ops.send(op).is_err() {
            tracing::warn!(?op, "Channel executor gone, request dropped");
        }
    }

    fn publish(&self) {
        let next = self.machine.status();
        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if current.state != next.state {
                tracing::info!(from = %current.state, to = %next.state, "Connection state changed");
            }
            *current = next;
            true
        });
    }
}

#[derive(Debug, Clone, Copy)]
enum ChannelOp {
    Start { attempt: u64 },
    Stop { reconnect: Option<u64> },
}

/// Run start/stop requests strictly one after another.
async fn run_channel_ops<C: ChannelControl>(
    channel: Arc<C>,
    mut ops: mpsc::UnboundedReceiver<ChannelOp>,
    tx: mpsc::Sender<Trigger>,
    shutdown: CancellationToken,
) {
    loop {
        let op = tokio::select! {
            _ = shutdown.cancelled() => break,
            op = ops.recv() => match op {
                Some(op) => op,
                None => break,
            },
        };
        tracing::trace!(?op, "Running channel request");
        let completion = match op {
            ChannelOp::Start { attempt } => Trigger::StartCompleted {
                attempt,
                result: channel.start().await,
            },
            ChannelOp::Stop { reconnect } => Trigger::StopCompleted {
                reconnect,
                result: channel.stop().await,
            },
        };
        if tx.send(completion).await.is_err() {
            break;
        }
    }
}

fn abort_timer(slot: &mut Option<(u64, JoinHandle<()>)>) {
    if let Some((_, handle)) = slot.take() {
        handle.abort();
    }
}
