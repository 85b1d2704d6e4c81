//! HTTP access to the robot firmware.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{domain::RobotAddress, protocol::Endpoint};
use url::Url;

use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotReply {
    pub status: u16,
    pub body: String,
}

impl RobotReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn into_success(self, url: &Url) -> Result<Self, SessionError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SessionError::HttpStatus {
                url: url.to_string(),
                status: self.status,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, SessionError> {
        serde_json::from_str(&self.body).map_err(|err| SessionError::MalformedResponse {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }
}

#[async_trait]
pub trait RobotTransport: Send + Sync {
    async fn get(&self, url: Url) -> Result<RobotReply, SessionError>;
}

pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build robot http client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl RobotTransport for HttpTransport {
    async fn get(&self, url: Url) -> Result<RobotReply, SessionError> {
        let unreachable = |err: reqwest::Error| SessionError::Unreachable {
            url: url.to_string(),
            reason: err.to_string(),
        };
        let response = self.http.get(url.clone()).send().await.map_err(unreachable)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(unreachable)?;
        Ok(RobotReply { status, body })
    }
}

/// Builds `http://{address}/{path}[?query]`; the scheme is always re-added here.
/// A path typed as part of the address (`10.0.0.5/robot`) is kept as a prefix.
pub fn endpoint_url(address: &RobotAddress, endpoint: &Endpoint) -> Result<Url, SessionError> {
    let mut url = Url::parse(&format!("http://{}/", address.as_str()))?;
    url.path_segments_mut()
        .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push(endpoint.path());
    if let Some((key, value)) = endpoint.query() {
        url.query_pairs_mut().append_pair(key, &value);
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
