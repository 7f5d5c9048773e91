//! Deferred work.
//!
//! A scheduled command sleeps on its own task and then joins the regular
//! command queue without a reply channel, so nobody waits on its outcome.

use super::controller::{Command, Job};
use std::time::Duration;
use tokio::sync::mpsc::WeakUnboundedSender;

#[derive(Clone)]
pub(crate) struct Scheduler {
    queue: WeakUnboundedSender<Job>,
}

impl Scheduler {
    /// Holds only a weak sender so pending timers never keep the worker alive.
    pub(crate) fn new(queue: WeakUnboundedSender<Job>) -> Self {
        Self { queue }
    }

    pub(crate) fn schedule(&self, delay: Duration, command: Command) {
        let queue = self.queue.clone();
        log::debug!(
            "scheduled {command:?} in {}",
            humantime::format_duration(delay)
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(tx) = queue.upgrade() else {
                log::warn!("dropping deferred {command:?}: command worker has stopped");
                return;
            };
            if tx.send(Job::deferred(command)).is_err() {
                log::warn!("dropping deferred {command:?}: command queue closed");
            }
        });
    }
}
