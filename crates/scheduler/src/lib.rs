//! The process-wide timer and event-dispatch service.
//!
//! Every periodic timer, one-shot timer and event listener registered with a
//! [`Scheduler`] runs as its own task, so a slow handler only ever delays the
//! source it is attached to. All of them share the scheduler's cancellation
//! token and are torn down together by [`Scheduler::stop`].

mod handler;

use std::{future::Future, time::Duration};

use anyhow::bail;
use async_trait::async_trait;
use ds_client::Task;
use tokio::{
    select,
    time::{interval_at, sleep, Instant, MissedTickBehavior},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::*;

pub use handler::*;

#[derive(Clone)]
pub struct Scheduler {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Scheduler {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            tracker: TaskTracker::new(),
        }
    }

    /// Runs `handler` every `period`, starting one period from now, until the
    /// scheduler stops. A tick that takes longer than `period` delays the
    /// following ticks instead of bunching them up. A zero period is rejected.
    pub fn every<H: Handler<Tick>>(
        &self,
        name: &'static str,
        period: Duration,
        mut handler: H,
    ) -> anyhow::Result<()> {
        if period.is_zero() {
            bail!("periodic timer {name} needs a non-zero period");
        }

        debug!("registering periodic timer {name} ({period:?})");

        self.spawn(name, async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            for count in 0.. {
                interval.tick().await;
                trace!("{name}: tick {count}");

                if let Err(err) = handler.handle(Tick { count }).await {
                    warn!("{name}: handler failed: {err:#}");
                }
            }
        });

        Ok(())
    }

    /// Runs `job` once, `delay` from now. The timer is retired after firing.
    pub fn after<F>(&self, name: &'static str, delay: Duration, job: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        debug!("registering one-shot timer {name} ({delay:?})");

        self.spawn(name, async move {
            sleep(delay).await;
            debug!("{name}: firing");

            if let Err(err) = job.await {
                warn!("{name}: handler failed: {err:#}");
            }
        });
    }

    /// Delivers every item received on `source` to `handler`, in order, until
    /// the sending side closes or the scheduler stops.
    pub fn listen<T, H>(&self, name: &'static str, source: flume::Receiver<T>, mut handler: H)
    where
        T: Send + 'static,
        H: Handler<T>,
    {
        debug!("registering listener {name}");

        self.spawn(name, async move {
            while let Ok(item) = source.recv_async().await {
                if let Err(err) = handler.handle(item).await {
                    warn!("{name}: handler failed: {err:#}");
                }
            }

            debug!("{name}: source closed");
        });
    }

    /// Cancels every timer and listener. Handlers that are mid-flight are
    /// dropped at their next suspension point.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.tracker.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the scheduler has been stopped and all of its tasks have
    /// exited.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await;
        // the token may have been cancelled by a parent rather than `stop`
        self.tracker.close();
        self.tracker.wait().await;
    }

    fn spawn<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();

        self.tracker.spawn(async move {
            select! {
                _ = cancel.cancelled() => trace!("{name}: cancelled"),
                _ = fut => {}
            }
        });
    }
}

#[async_trait]
impl Task for Scheduler {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        select! {
            _ = cancel.cancelled() => {}
            _ = self.cancel.cancelled() => {}
        }

        self.stop();
        self.stopped().await;

        debug!("all timers and listeners stopped");

        Ok(())
    }
}
