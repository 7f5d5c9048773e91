//! Command controller.
//!
//! A single worker owns the sequencer and executes one command at a time, so
//! probe-then-act sequences from concurrent requests never interleave. It also
//! keeps the inferred power state and reconciles it against the process table.

use super::scheduler::Scheduler;
use crate::engine::{PowerOnOutcome, Sequencer, ToggleOutcome};
use crate::model::{Action, ControlConfig, PowerState};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Run(Action),
    /// Deferred PS press that completes power-on.
    Activate,
}

pub(crate) struct Job {
    command: Command,
    reply: Option<oneshot::Sender<Result<()>>>,
}

impl Job {
    pub(crate) fn deferred(command: Command) -> Self {
        Self {
            command,
            reply: None,
        }
    }
}

/// Cloneable front door to the worker.
#[derive(Clone)]
pub struct ControllerHandle {
    queue: mpsc::UnboundedSender<Job>,
    state: watch::Receiver<PowerState>,
}

impl ControllerHandle {
    /// Queue `action` and wait until the worker has executed it.
    pub async fn submit(&self, action: Action) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.queue
            .send(Job {
                command: Command::Run(action),
                reply: Some(reply_tx),
            })
            .map_err(|_| anyhow!("command worker is not running"))?;
        reply_rx
            .await
            .context("command worker dropped the request")?
    }

    pub fn power_state(&self) -> PowerState {
        *self.state.borrow()
    }
}

struct Worker {
    sequencer: Sequencer,
    scheduler: Scheduler,
    cfg: Arc<ControlConfig>,
    state: watch::Sender<PowerState>,
}

/// Start the worker task. It stops once every [`ControllerHandle`] is dropped
/// and the queue has drained.
pub fn spawn_controller(
    sequencer: Sequencer,
    cfg: Arc<ControlConfig>,
) -> (ControllerHandle, JoinHandle<()>) {
    let (queue_tx, queue_rx) = mpsc::unbounded_channel::<Job>();
    let (state_tx, state_rx) = watch::channel(PowerState::Unknown);
    let worker = Worker {
        sequencer,
        scheduler: Scheduler::new(queue_tx.downgrade()),
        cfg,
        state: state_tx,
    };
    let handle = tokio::spawn(worker.run(queue_rx));
    (
        ControllerHandle {
            queue: queue_tx,
            state: state_rx,
        },
        handle,
    )
}

impl Worker {
    async fn run(self, mut queue: mpsc::UnboundedReceiver<Job>) {
        let mut reconcile = self.cfg.reconcile_interval.map(|period| {
            let mut iv = tokio::time::interval_at(Instant::now() + period, period);
            iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
            iv
        });

        loop {
            tokio::select! {
                job = queue.recv() => {
                    let Some(job) = job else { break };
                    self.process(job).await;
                }
                _ = async {
                    match reconcile.as_mut() {
                        Some(iv) => {
                            iv.tick().await;
                        }
                        None => futures::future::pending().await,
                    }
                } => {
                    self.reconcile().await;
                }
            }
        }
        log::debug!("command worker stopped");
    }

    async fn process(&self, job: Job) {
        let Job { command, reply } = job;
        let result = self.execute(command).await;
        if result.is_err() {
            self.set_state(PowerState::Unknown, "command failed");
        }
        match reply {
            Some(tx) => {
                // Receiver is gone if the HTTP client disconnected; the work is done either way.
                let _ = tx.send(result);
            }
            None => {
                if let Err(e) = result {
                    log::error!("deferred {command:?} failed: {e:#}");
                }
            }
        }
    }

    async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Run(Action::PowerOn) => {
                let outcome = self.sequencer.power_on().await?;
                self.after_power_on(outcome);
            }
            Command::Run(Action::PowerOff) => {
                self.sequencer.power_off().await?;
                self.set_state(PowerState::Off, "power-off sent");
            }
            Command::Run(Action::PowerToggle) => match self.sequencer.toggle().await? {
                ToggleOutcome::PoweredOn(outcome) => self.after_power_on(outcome),
                ToggleOutcome::PoweredOff => self.set_state(PowerState::Off, "power-off sent"),
            },
            Command::Run(Action::KeyPress(key)) => self.sequencer.tap(key).await?,
            Command::Activate => self.sequencer.activate().await?,
        }
        Ok(())
    }

    fn after_power_on(&self, outcome: PowerOnOutcome) {
        match outcome {
            PowerOnOutcome::Started => {
                self.scheduler.schedule(self.cfg.boot_delay, Command::Activate);
                self.set_state(PowerState::On, "emulator started");
            }
            PowerOnOutcome::AlreadyOn => self.set_state(PowerState::On, "emulator running"),
        }
    }

    async fn reconcile(&self) {
        let observed = PowerState::from_running(self.sequencer.prober().is_running().await);
        let current = *self.state.borrow();
        if current != PowerState::Unknown && current != observed {
            log::warn!("power state drifted: tracked {current:?}, process table says {observed:?}");
        }
        self.set_state(observed, "reconciled");
    }

    fn set_state(&self, next: PowerState, reason: &str) {
        let prev = self.state.send_replace(next);
        if prev != next {
            log::info!("power state {prev:?} -> {next:?} ({reason})");
        }
    }
}
