use shared::{domain::RobotAddress, protocol::Endpoint};
use tokio::sync::RwLock;
use url::Url;

use crate::{error::SessionError, transport::endpoint_url};

/// Single writer of the robot address; every network-issuing component reads
/// it from here.
pub struct AddressRegistry {
    current: RwLock<RobotAddress>,
}

impl AddressRegistry {
    pub fn new(initial: RobotAddress) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Stores the normalized form of `raw`. Returns the new address only when
    /// it differs from the current one.
    pub async fn set(&self, raw: &str) -> Option<RobotAddress> {
        let next = RobotAddress::new(raw);
        let mut current = self.current.write().await;
        if *current == next {
            return None;
        }
        *current = next.clone();
        Some(next)
    }

    pub async fn get(&self) -> RobotAddress {
        self.current.read().await.clone()
    }

    pub async fn url_for(&self, endpoint: &Endpoint) -> Result<Url, SessionError> {
        endpoint_url(&*self.current.read().await, endpoint)
    }
}
