use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use shared::{
    domain::{ConnectionState, Direction, Mode, RobotAddress, Speed, StatusSnapshot},
    protocol::{Endpoint, ObstacleDistances},
};
use tokio::sync::{broadcast, Mutex};
use tracing::info;

mod address;
mod connectivity;
mod dispatcher;
pub mod error;
mod mode;
mod status_poller;
pub mod transport;

pub use address::AddressRegistry;
pub use connectivity::ConnectivityMonitor;
pub use dispatcher::CommandDispatcher;
pub use error::SessionError;
pub use mode::ModeController;
pub use status_poller::AutonomousStatusPoller;
pub use transport::{HttpTransport, RobotReply, RobotTransport};

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_DISTANCES_INTERVAL: Duration = Duration::from_secs(3);
/// Upper bound on how long shutdown waits for the robot to acknowledge
/// `/stopauto` or the fail-safe `/stop`.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);
/// Floor applied to configured intervals; `tokio::time::interval` rejects zero.
pub(crate) const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub initial_address: RobotAddress,
    pub probe_interval: Duration,
    pub status_interval: Duration,
    /// Range-finder refresh while autonomous; `None` turns the feed off.
    pub distances_interval: Option<Duration>,
    pub default_speed: Speed,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            initial_address: RobotAddress::default(),
            probe_interval: DEFAULT_PROBE_INTERVAL,
            status_interval: DEFAULT_STATUS_INTERVAL,
            distances_interval: Some(DEFAULT_DISTANCES_INTERVAL),
            default_speed: Speed::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    AddressChanged(RobotAddress),
    ConnectionChanged(ConnectionState),
    ActiveDirectionChanged(Option<Direction>),
    ModeChanged(Mode),
    SpeedChanged(Speed),
    StatusUpdated(Option<StatusSnapshot>),
    DistancesUpdated(Option<ObstacleDistances>),
    /// Operator-facing message, e.g. a motion refused while disconnected.
    Notice(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub address: RobotAddress,
    pub connection: ConnectionState,
    pub active_direction: Option<Direction>,
    pub mode: Mode,
    pub speed: Speed,
    pub status: Option<StatusSnapshot>,
    pub distances: Option<ObstacleDistances>,
}

/// Command and read surface offered to a presentation layer.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    async fn set_address(&self, raw: &str);
    async fn start_direction(&self, direction: Direction) -> Result<(), SessionError>;
    async fn stop_direction(&self);
    async fn select_mode(&self, mode: Mode);
    async fn go_home(&self);
    async fn set_speed(&self, value: i64) -> Result<Speed, SessionError>;
    async fn read_distances(&self) -> Result<ObstacleDistances, SessionError>;
    async fn snapshot(&self) -> SessionSnapshot;
    fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent>;
}

/// The robot control session: owns every piece of state the operator sees.
///
/// Periodic tasks are aborted when the session is shut down or dropped.
pub struct RobotSession {
    transport: Arc<dyn RobotTransport>,
    address: Arc<AddressRegistry>,
    connectivity: Arc<ConnectivityMonitor>,
    dispatcher: Arc<CommandDispatcher>,
    poller: Arc<AutonomousStatusPoller>,
    modes: ModeController,
    speed: Mutex<Speed>,
    events: broadcast::Sender<SessionEvent>,
}

impl RobotSession {
    pub fn new(transport: Arc<dyn RobotTransport>, settings: SessionSettings) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let address = Arc::new(AddressRegistry::new(settings.initial_address));
        let connectivity = Arc::new(ConnectivityMonitor::new(
            Arc::clone(&transport),
            Arc::clone(&address),
            settings.probe_interval,
            events.clone(),
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&transport),
            Arc::clone(&address),
            Arc::clone(&connectivity),
            events.clone(),
        ));
        let poller = Arc::new(AutonomousStatusPoller::new(
            Arc::clone(&transport),
            Arc::clone(&address),
            settings.status_interval,
            settings.distances_interval,
            events.clone(),
        ));
        let modes = ModeController::new(
            Arc::clone(&transport),
            Arc::clone(&address),
            Arc::clone(&dispatcher),
            Arc::clone(&poller),
            events.clone(),
        );

        Arc::new(Self {
            transport,
            address,
            connectivity,
            dispatcher,
            poller,
            modes,
            speed: Mutex::new(settings.default_speed),
            events,
        })
    }

    /// Starts probing the configured address.
    pub async fn start(&self) {
        self.connectivity.restart().await;
    }

    /// Returns home (disabling autonomous mode or stopping a held direction)
    /// and cancels every periodic task. The robot-side exit request is
    /// awaited, bounded by [`SHUTDOWN_GRACE`], so it survives the runtime
    /// being torn down right after.
    pub async fn shutdown(&self) {
        self.modes.go_home_and_wait(SHUTDOWN_GRACE).await;
        self.poller.deactivate().await;
        self.connectivity.stop().await;
        info!("session: shut down");
    }

    pub async fn set_address(&self, raw: &str) {
        let Some(address) = self.address.set(raw).await else {
            return;
        };
        info!(%address, "session: robot address changed");
        let _ = self.events.send(SessionEvent::AddressChanged(address));
        self.connectivity.restart().await;
    }

    pub async fn start_direction(&self, direction: Direction) -> Result<(), SessionError> {
        let speed = *self.speed.lock().await;
        self.modes.drive(direction, speed).await
    }

    pub async fn stop_direction(&self) {
        self.dispatcher.stop().await;
    }

    pub async fn select_mode(&self, mode: Mode) {
        self.modes.select(mode).await;
    }

    pub async fn go_home(&self) {
        self.modes.go_home().await;
    }

    pub async fn set_speed(&self, value: i64) -> Result<Speed, SessionError> {
        let next = Speed::new(value)?;
        let mut speed = self.speed.lock().await;
        if *speed != next {
            *speed = next;
            let _ = self.events.send(SessionEvent::SpeedChanged(next));
        }
        Ok(next)
    }

    pub async fn read_distances(&self) -> Result<ObstacleDistances, SessionError> {
        let url = self.address.url_for(&Endpoint::Distances).await?;
        self.transport
            .get(url.clone())
            .await?
            .into_success(&url)?
            .json(&url)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            address: self.address.get().await,
            connection: self.connectivity.state().await,
            active_direction: self.dispatcher.active().await,
            mode: self.modes.current().await,
            speed: *self.speed.lock().await,
            status: self.poller.snapshot().await,
            distances: self.poller.distances().await,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl SessionHandle for RobotSession {
    async fn set_address(&self, raw: &str) {
        RobotSession::set_address(self, raw).await
    }

    async fn start_direction(&self, direction: Direction) -> Result<(), SessionError> {
        RobotSession::start_direction(self, direction).await
    }

    async fn stop_direction(&self) {
        RobotSession::stop_direction(self).await
    }

    async fn select_mode(&self, mode: Mode) {
        RobotSession::select_mode(self, mode).await
    }

    async fn go_home(&self) {
        RobotSession::go_home(self).await
    }

    async fn set_speed(&self, value: i64) -> Result<Speed, SessionError> {
        RobotSession::set_speed(self, value).await
    }

    async fn read_distances(&self) -> Result<ObstacleDistances, SessionError> {
        RobotSession::read_distances(self).await
    }

    async fn snapshot(&self) -> SessionSnapshot {
        RobotSession::snapshot(self).await
    }

    fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
