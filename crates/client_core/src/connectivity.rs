//! Liveness probing of the robot's `/ping` route.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{ConnectionState, RobotAddress},
    protocol::Endpoint,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    transport::endpoint_url, AddressRegistry, RobotTransport, SessionEvent, MIN_POLL_INTERVAL,
};

struct ProbeCycle {
    epoch: u64,
    state: ConnectionState,
}

pub struct ConnectivityMonitor {
    transport: Arc<dyn RobotTransport>,
    address: Arc<AddressRegistry>,
    interval: Duration,
    cycle: Arc<Mutex<ProbeCycle>>,
    task: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl ConnectivityMonitor {
    pub fn new(
        transport: Arc<dyn RobotTransport>,
        address: Arc<AddressRegistry>,
        interval: Duration,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            transport,
            address,
            interval: interval.max(MIN_POLL_INTERVAL),
            cycle: Arc::new(Mutex::new(ProbeCycle {
                epoch: 0,
                state: ConnectionState::Disconnected,
            })),
            task: Mutex::new(None),
            events,
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.cycle.lock().await.state
    }

    /// Cancels any running cycle and starts probing the registry's current
    /// address right away. The state drops to disconnected until that address
    /// answers.
    ///
    /// The task slot stays locked from the epoch bump to the spawn, so the
    /// surviving loop always carries the newest epoch and address.
    pub async fn restart(&self) {
        let mut slot = self.task.lock().await;
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let address = self.address.get().await;
        let epoch = self.supersede().await;
        info!(%address, epoch, "connectivity: probing robot");
        *slot = Some(tokio::spawn(probe_loop(
            Arc::clone(&self.transport),
            Arc::clone(&self.cycle),
            self.events.clone(),
            address,
            self.interval,
            epoch,
        )));
    }

    pub async fn stop(&self) {
        let mut slot = self.task.lock().await;
        if let Some(task) = slot.take() {
            task.abort();
        }
        let epoch = self.supersede().await;
        debug!(epoch, "connectivity: probing stopped");
    }

    async fn supersede(&self) -> u64 {
        let mut cycle = self.cycle.lock().await;
        cycle.epoch += 1;
        if cycle.state != ConnectionState::Disconnected {
            cycle.state = ConnectionState::Disconnected;
            let _ = self
                .events
                .send(SessionEvent::ConnectionChanged(ConnectionState::Disconnected));
        }
        cycle.epoch
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn probe_loop(
    transport: Arc<dyn RobotTransport>,
    cycle: Arc<Mutex<ProbeCycle>>,
    events: broadcast::Sender<SessionEvent>,
    address: RobotAddress,
    period: Duration,
    epoch: u64,
) {
    let url = match endpoint_url(&address, &Endpoint::Ping) {
        Ok(url) => Some(url),
        Err(err) => {
            warn!(%address, error = %err, "connectivity: address cannot form a probe url");
            None
        }
    };

    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;

        let next = match &url {
            Some(url) => match transport.get(url.clone()).await {
                Ok(reply) if reply.is_success() => ConnectionState::Connected,
                Ok(reply) => {
                    debug!(%url, status = reply.status, "connectivity: probe rejected");
                    ConnectionState::Disconnected
                }
                Err(err) => {
                    debug!(%url, error = %err, "connectivity: probe failed");
                    ConnectionState::Disconnected
                }
            },
            None => ConnectionState::Disconnected,
        };

        let mut guard = cycle.lock().await;
        if guard.epoch != epoch {
            debug!(epoch, current = guard.epoch, "connectivity: dropping stale probe");
            return;
        }
        if guard.state != next {
            guard.state = next;
            info!(%address, state = %next, "connectivity: state changed");
            let _ = events.send(SessionEvent::ConnectionChanged(next));
        }
    }
}

#[cfg(test)]
#[path = "tests/connectivity_tests.rs"]
mod tests;
