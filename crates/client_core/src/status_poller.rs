//! Polling of the robot's `/etat` route (and, optionally, `/distances`) while
//! autonomous mode is active.

use std::{future, sync::Arc, time::Duration};

use shared::{
    domain::StatusSnapshot,
    protocol::{Endpoint, ObstacleDistances},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Interval, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{AddressRegistry, RobotTransport, SessionEvent, MIN_POLL_INTERVAL};

struct PollCycle {
    epoch: u64,
    snapshot: Option<StatusSnapshot>,
    distances: Option<ObstacleDistances>,
}

pub struct AutonomousStatusPoller {
    transport: Arc<dyn RobotTransport>,
    address: Arc<AddressRegistry>,
    interval: Duration,
    distances_interval: Option<Duration>,
    cycle: Arc<Mutex<PollCycle>>,
    task: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl AutonomousStatusPoller {
    pub fn new(
        transport: Arc<dyn RobotTransport>,
        address: Arc<AddressRegistry>,
        interval: Duration,
        distances_interval: Option<Duration>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            transport,
            address,
            interval: interval.max(MIN_POLL_INTERVAL),
            distances_interval: distances_interval.map(|period| period.max(MIN_POLL_INTERVAL)),
            cycle: Arc::new(Mutex::new(PollCycle {
                epoch: 0,
                snapshot: None,
                distances: None,
            })),
            task: Mutex::new(None),
            events,
        }
    }

    /// `None` whenever no autonomous activation is running.
    pub async fn snapshot(&self) -> Option<StatusSnapshot> {
        self.cycle.lock().await.snapshot.clone()
    }

    /// Latest range-finder reading of the running activation, if any arrived.
    pub async fn distances(&self) -> Option<ObstacleDistances> {
        self.cycle.lock().await.distances
    }

    pub async fn activate(&self) {
        let epoch = self.replace_snapshot(Some(StatusSnapshot::loading())).await;
        info!(epoch, "status: polling robot state");
        let task = tokio::spawn(poll_loop(
            Poll {
                transport: Arc::clone(&self.transport),
                address: Arc::clone(&self.address),
                cycle: Arc::clone(&self.cycle),
                events: self.events.clone(),
                epoch,
            },
            self.interval,
            self.distances_interval,
        ));
        if let Some(previous) = self.task.lock().await.replace(task) {
            previous.abort();
        }
    }

    pub async fn deactivate(&self) {
        let epoch = self.replace_snapshot(None).await;
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
        debug!(epoch, "status: polling stopped");
    }

    async fn replace_snapshot(&self, snapshot: Option<StatusSnapshot>) -> u64 {
        let mut cycle = self.cycle.lock().await;
        cycle.epoch += 1;
        cycle.snapshot = snapshot.clone();
        let _ = self.events.send(SessionEvent::StatusUpdated(snapshot));
        if cycle.distances.take().is_some() {
            let _ = self.events.send(SessionEvent::DistancesUpdated(None));
        }
        cycle.epoch
    }
}

impl Drop for AutonomousStatusPoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// Everything one activation needs to publish its results.
struct Poll {
    transport: Arc<dyn RobotTransport>,
    address: Arc<AddressRegistry>,
    cycle: Arc<Mutex<PollCycle>>,
    events: broadcast::Sender<SessionEvent>,
    epoch: u64,
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn tick_if_enabled(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

async fn poll_loop(poll: Poll, period: Duration, distances_period: Option<Duration>) {
    let mut status_ticker = ticker(period);
    let mut distances_ticker = distances_period.map(ticker);
    loop {
        let current = tokio::select! {
            _ = status_ticker.tick() => poll.status().await,
            _ = tick_if_enabled(&mut distances_ticker) => poll.distances().await,
        };
        if !current {
            return;
        }
    }
}

impl Poll {
    /// Returns `false` once this activation has been superseded.
    async fn status(&self) -> bool {
        let fetched = match self.address.url_for(&Endpoint::Status).await {
            Ok(url) => self
                .transport
                .get(url.clone())
                .await
                .and_then(|reply| reply.into_success(&url)),
            Err(err) => Err(err),
        };
        let snapshot = match fetched {
            Ok(reply) => StatusSnapshot::from_text(reply.body.trim()),
            Err(err) => {
                debug!(error = %err, "status: poll failed");
                StatusSnapshot::communication_error()
            }
        };

        let mut guard = self.cycle.lock().await;
        if guard.epoch != self.epoch {
            debug!(epoch = self.epoch, current = guard.epoch, "status: dropping stale poll");
            return false;
        }
        let changed = guard
            .snapshot
            .as_ref()
            .map_or(true, |current| current.raw != snapshot.raw);
        guard.snapshot = Some(snapshot.clone());
        if changed {
            info!(category = %snapshot.category, raw = %snapshot.raw, "status: robot state changed");
            let _ = self.events.send(SessionEvent::StatusUpdated(Some(snapshot)));
        }
        true
    }

    async fn distances(&self) -> bool {
        let fetched = match self.address.url_for(&Endpoint::Distances).await {
            Ok(url) => self
                .transport
                .get(url.clone())
                .await
                .and_then(|reply| reply.into_success(&url))
                .and_then(|reply| reply.json::<ObstacleDistances>(&url)),
            Err(err) => Err(err),
        };
        let distances = fetched.unwrap_or_else(|err| {
            debug!(error = %err, "status: distances read failed");
            ObstacleDistances::default()
        });

        let mut guard = self.cycle.lock().await;
        if guard.epoch != self.epoch {
            debug!(epoch = self.epoch, current = guard.epoch, "status: dropping stale distances");
            return false;
        }
        if guard.distances != Some(distances) {
            guard.distances = Some(distances);
            let _ = self
                .events
                .send(SessionEvent::DistancesUpdated(Some(distances)));
        }
        true
    }
}

#[cfg(test)]
#[path = "tests/status_poller_tests.rs"]
mod tests;
