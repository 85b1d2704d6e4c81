//! Idle / Manual / Autonomous state machine.
//!
//! Manual and Autonomous are never entered from each other directly: selecting
//! one while the other is active first returns to Idle, so the robot-side
//! enable/disable calls always run.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{Direction, Mode, Speed},
    protocol::Endpoint,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time,
};
use tracing::{info, warn};

use crate::{
    error::SessionError, AddressRegistry, AutonomousStatusPoller, CommandDispatcher,
    RobotTransport, SessionEvent,
};

pub struct ModeController {
    transport: Arc<dyn RobotTransport>,
    address: Arc<AddressRegistry>,
    dispatcher: Arc<CommandDispatcher>,
    poller: Arc<AutonomousStatusPoller>,
    mode: Mutex<Mode>,
    events: broadcast::Sender<SessionEvent>,
}

impl ModeController {
    pub fn new(
        transport: Arc<dyn RobotTransport>,
        address: Arc<AddressRegistry>,
        dispatcher: Arc<CommandDispatcher>,
        poller: Arc<AutonomousStatusPoller>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            transport,
            address,
            dispatcher,
            poller,
            mode: Mutex::new(Mode::Idle),
            events,
        }
    }

    pub async fn current(&self) -> Mode {
        *self.mode.lock().await
    }

    pub async fn select(&self, target: Mode) {
        let mut mode = self.mode.lock().await;
        if *mode == target {
            return;
        }
        self.leave(&mut mode).await;

        match target {
            Mode::Idle => return,
            Mode::Manual => {}
            Mode::Autonomous => {
                self.toggle_autonomous(Endpoint::EnableAutonomous).await;
                self.poller.activate().await;
            }
        }
        *mode = target;
        info!(mode = %target, "mode: entered");
        let _ = self.events.send(SessionEvent::ModeChanged(target));
    }

    /// Starts a motion only while Manual is the current mode. The mode stays
    /// locked across the dispatch so a concurrent exit cannot strand a held
    /// direction.
    pub async fn drive(&self, direction: Direction, speed: Speed) -> Result<(), SessionError> {
        let mode = self.mode.lock().await;
        if *mode != Mode::Manual {
            return Err(SessionError::ManualModeInactive { mode: *mode });
        }
        self.dispatcher.start(direction, speed).await
    }

    pub async fn go_home(&self) {
        let mut mode = self.mode.lock().await;
        self.leave(&mut mode).await;
    }

    /// Like [`ModeController::go_home`], but waits up to `grace` for the robot
    /// to answer the exit request (`/stopauto` or the fail-safe `/stop`).
    pub async fn go_home_and_wait(&self, grace: Duration) {
        let mut mode = self.mode.lock().await;
        let Some(pending) = self.leave(&mut mode).await else {
            return;
        };
        match time::timeout(grace, pending).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "mode: exit request task failed"),
            Err(_) => warn!(?grace, "mode: robot did not answer the exit request in time"),
        }
    }

    async fn leave(&self, mode: &mut Mode) -> Option<JoinHandle<()>> {
        let pending = match *mode {
            Mode::Idle => return None,
            Mode::Manual => self.dispatcher.halt_if_active().await,
            Mode::Autonomous => {
                self.poller.deactivate().await;
                self.toggle_autonomous(Endpoint::DisableAutonomous).await
            }
        };
        info!(from = %mode, "mode: returned home");
        *mode = Mode::Idle;
        let _ = self.events.send(SessionEvent::ModeChanged(Mode::Idle));
        pending
    }

    async fn toggle_autonomous(&self, endpoint: Endpoint) -> Option<JoinHandle<()>> {
        let url = match self.address.url_for(&endpoint).await {
            Ok(url) => url,
            Err(err) => {
                warn!(command = endpoint.path(), error = %err, "mode: cannot build autonomous toggle url");
                return None;
            }
        };
        let transport = Arc::clone(&self.transport);
        Some(tokio::spawn(async move {
            match transport
                .get(url.clone())
                .await
                .and_then(|reply| reply.into_success(&url))
            {
                Ok(_) => info!(command = endpoint.path(), "mode: robot acknowledged autonomous toggle"),
                Err(err) => warn!(command = endpoint.path(), error = %err, "mode: autonomous toggle failed"),
            }
        }))
    }
}

#[cfg(test)]
#[path = "tests/mode_tests.rs"]
mod tests;
