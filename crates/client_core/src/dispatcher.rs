//! Motion commands toward the robot.
//!
//! Requests are fire-and-forget: the caller only updates the active direction
//! register and never awaits the robot's answer. Every request carries a
//! sequence number so an answer that lands after a newer command was issued is
//! reported as superseded instead of being credited to the current gesture.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use shared::{
    domain::{Direction, Speed},
    protocol::Endpoint,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    error::SessionError, AddressRegistry, ConnectivityMonitor, RobotTransport, SessionEvent,
};

pub struct CommandDispatcher {
    transport: Arc<dyn RobotTransport>,
    address: Arc<AddressRegistry>,
    connectivity: Arc<ConnectivityMonitor>,
    active: Mutex<Option<Direction>>,
    sequence: Arc<AtomicU64>,
    events: broadcast::Sender<SessionEvent>,
}

impl CommandDispatcher {
    pub fn new(
        transport: Arc<dyn RobotTransport>,
        address: Arc<AddressRegistry>,
        connectivity: Arc<ConnectivityMonitor>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            transport,
            address,
            connectivity,
            active: Mutex::new(None),
            sequence: Arc::new(AtomicU64::new(0)),
            events,
        }
    }

    pub async fn active(&self) -> Option<Direction> {
        *self.active.lock().await
    }

    /// Press-in: supersedes whatever direction is active, then asks the robot
    /// to move. Refused without a request while the robot is disconnected.
    pub async fn start(&self, direction: Direction, speed: Speed) -> Result<(), SessionError> {
        if direction == Direction::Stop {
            self.stop().await;
            return Ok(());
        }

        let mut active = self.active.lock().await;
        self.set_active(&mut active, None);

        if !self.connectivity.state().await.is_connected() {
            let err = SessionError::RejectedCommand { direction };
            warn!(%direction, "dispatch: refusing motion while disconnected");
            let _ = self.events.send(SessionEvent::Notice(err.to_string()));
            return Err(err);
        }

        self.set_active(&mut active, Some(direction));
        drop(active);

        info!(%direction, %speed, "dispatch: start");
        self.send(Endpoint::Move { direction, speed }).await;
        Ok(())
    }

    /// Press-out: clears the active direction and always asks the robot to
    /// stop, whatever the connection state.
    pub async fn stop(&self) {
        self.issue_stop().await;
    }

    /// Stops the robot only if a direction is still held. The returned handle
    /// resolves once the robot has answered the stop.
    pub async fn halt_if_active(&self) -> Option<JoinHandle<()>> {
        if self.active().await.is_some() {
            self.issue_stop().await
        } else {
            None
        }
    }

    async fn issue_stop(&self) -> Option<JoinHandle<()>> {
        {
            let mut active = self.active.lock().await;
            self.set_active(&mut active, None);
        }
        info!("dispatch: stop");
        self.send(Endpoint::Stop).await
    }

    fn set_active(&self, active: &mut Option<Direction>, next: Option<Direction>) {
        if *active != next {
            *active = next;
            let _ = self.events.send(SessionEvent::ActiveDirectionChanged(next));
        }
    }

    async fn send(&self, endpoint: Endpoint) -> Option<JoinHandle<()>> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let url = match self.address.url_for(&endpoint).await {
            Ok(url) => url,
            Err(err) => {
                warn!(command = endpoint.path(), seq, error = %err, "dispatch: cannot build command url");
                return None;
            }
        };

        let transport = Arc::clone(&self.transport);
        let latest = Arc::clone(&self.sequence);
        Some(tokio::spawn(async move {
            let outcome = transport
                .get(url.clone())
                .await
                .and_then(|reply| reply.into_success(&url))
                .and_then(|reply| reply.json::<serde_json::Value>(&url));
            let superseded = latest.load(Ordering::SeqCst) != seq;
            match outcome {
                Ok(body) => info!(
                    command = endpoint.path(),
                    seq,
                    superseded,
                    %body,
                    "dispatch: robot acknowledged command"
                ),
                Err(err) => warn!(
                    command = endpoint.path(),
                    seq,
                    superseded,
                    error = %err,
                    "dispatch: command failed"
                ),
            }
        }))
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
