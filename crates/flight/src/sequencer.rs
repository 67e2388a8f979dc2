use std::sync::Arc;

use async_trait::async_trait;
use ds_drone::DroneLink;
use ds_scheduler::{Handler, Scheduler, Tick};
use ds_types::{DroneEvent, FlightCommand};
use tokio::sync::watch;
use tracing::*;

use crate::{FlightError, FlightPlan, FlightState};

/// Drives a [`FlightState`] machine against a drone link. Timers for the
/// video keep-alive and the delayed maneuver are registered with the
/// scheduler it was given.
#[derive(Clone)]
pub struct FlightSequencer {
    inner: Arc<Inner>,
}

struct Inner {
    plan: FlightPlan,
    link: Arc<dyn DroneLink>,
    scheduler: Scheduler,
    state_tx: watch::Sender<FlightState>,
}

impl FlightSequencer {
    pub fn new(plan: FlightPlan, link: Arc<dyn DroneLink>, scheduler: Scheduler) -> Self {
        let (state_tx, _) = watch::channel(FlightState::Idle);

        Self {
            inner: Arc::new(Inner {
                plan,
                link,
                scheduler,
                state_tx,
            }),
        }
    }

    pub fn state(&self) -> FlightState {
        *self.inner.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlightState> {
        self.inner.state_tx.subscribe()
    }

    /// Starts the script: encoder rate, video, take-off, and a timer for the
    /// maneuver. Only valid from [`FlightState::Idle`].
    pub async fn on_connected(&self) -> Result<(), FlightError> {
        let plan = &self.inner.plan;

        self.transition(FlightState::Idle, FlightState::Connected)?;
        self.issue(FlightCommand::SetVideoEncoderRate(plan.encoder_rate))
            .await;

        self.transition(FlightState::Connected, FlightState::VideoStarting)?;
        self.issue(FlightCommand::StartVideo).await;
        if let Err(err) = self.inner.scheduler.every(
            "flight/start-video",
            plan.video_keepalive,
            VideoKeepAlive {
                link: self.inner.link.clone(),
            },
        ) {
            warn!("video keep-alive disabled: {err:#}");
        }

        self.issue(FlightCommand::TakeOff).await;
        self.transition(FlightState::VideoStarting, FlightState::Airborne)?;

        let this = self.clone();
        self.inner
            .scheduler
            .after("flight/maneuver", plan.maneuver_delay, async move {
                this.maneuver().await?;
                Ok(())
            });

        Ok(())
    }

    /// Rotates, moves forward and lands, without waiting for the drone to
    /// confirm any of it.
    async fn maneuver(&self) -> Result<(), FlightError> {
        let plan = &self.inner.plan;

        self.transition(FlightState::Airborne, FlightState::Maneuvering)?;
        self.issue(FlightCommand::Rotate {
            angle: plan.rotate_angle,
        })
        .await;
        self.issue(FlightCommand::MoveForward {
            distance: plan.forward_distance,
        })
        .await;

        self.transition(FlightState::Maneuvering, FlightState::Landing)?;
        self.issue(FlightCommand::Land).await;
        self.transition(FlightState::Landing, FlightState::Landed)?;

        Ok(())
    }

    fn transition(&self, from: FlightState, to: FlightState) -> Result<(), FlightError> {
        let mut result = Ok(());

        self.inner.state_tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                result = Err(FlightError::InvalidTransition {
                    from,
                    to,
                    actual: *state,
                });
                false
            }
        });

        if result.is_ok() {
            info!("flight: {from} -> {to}");
        }

        result
    }

    async fn issue(&self, command: FlightCommand) {
        debug!("issuing '{command}'");

        if let Err(err) = self.inner.link.send(command).await {
            warn!("failed to issue '{command}': {err:#}");
        }
    }
}

#[async_trait]
impl Handler<DroneEvent> for FlightSequencer {
    async fn handle(&mut self, event: DroneEvent) -> anyhow::Result<()> {
        match event {
            DroneEvent::Connected => {
                let state = self.state();

                if state != FlightState::Idle {
                    info!("drone reconnected while {state}, not restarting flight script");
                    return Ok(());
                }

                self.on_connected().await?;
            }
            DroneEvent::Disconnected => {
                warn!("drone disconnected while {}", self.state());
            }
            DroneEvent::Error(err) => {
                error!("drone error while {}: {err}", self.state());
            }
        }

        Ok(())
    }
}

struct VideoKeepAlive {
    link: Arc<dyn DroneLink>,
}

#[async_trait]
impl Handler<Tick> for VideoKeepAlive {
    async fn handle(&mut self, _: Tick) -> anyhow::Result<()> {
        self.link.send(FlightCommand::StartVideo).await
    }
}
