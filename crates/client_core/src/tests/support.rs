//! In-memory robot used by the session tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Notify};
use url::Url;

use crate::{RobotReply, RobotTransport, SessionError, SessionEvent};

#[derive(Clone)]
pub(crate) enum Route {
    Reply { status: u16, body: String },
    Unreachable,
    /// Answers only once `release` is notified.
    Held {
        release: Arc<Notify>,
        status: u16,
        body: String,
    },
}

impl Route {
    pub(crate) fn ok(body: &str) -> Self {
        Route::Reply {
            status: 200,
            body: body.to_string(),
        }
    }

    pub(crate) fn status(status: u16) -> Self {
        Route::Reply {
            status,
            body: String::new(),
        }
    }
}

/// Records every requested url and answers from per-route scripts. Routes are
/// looked up as `host/path` first, then as bare `path`; unscripted routes
/// answer `200 {}`.
pub(crate) struct ScriptedTransport {
    requests: mpsc::UnboundedSender<String>,
    routes: StdMutex<HashMap<String, Route>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                requests,
                routes: StdMutex::new(HashMap::new()),
            }),
            rx,
        )
    }

    pub(crate) fn route(&self, key: &str, route: Route) {
        self.routes
            .lock()
            .expect("routes")
            .insert(key.to_string(), route);
    }

    fn lookup(&self, url: &Url) -> Route {
        let path = url.path().trim_start_matches('/');
        let scoped = format!("{}/{}", url.host_str().unwrap_or_default(), path);
        let routes = self.routes.lock().expect("routes");
        routes
            .get(&scoped)
            .or_else(|| routes.get(path))
            .cloned()
            .unwrap_or_else(|| Route::ok("{}"))
    }
}

#[async_trait]
impl RobotTransport for ScriptedTransport {
    async fn get(&self, url: Url) -> Result<RobotReply, SessionError> {
        let _ = self.requests.send(url.to_string());
        match self.lookup(&url) {
            Route::Reply { status, body } => Ok(RobotReply { status, body }),
            Route::Unreachable => Err(SessionError::Unreachable {
                url: url.to_string(),
                reason: "scripted outage".to_string(),
            }),
            Route::Held {
                release,
                status,
                body,
            } => {
                release.notified().await;
                Ok(RobotReply { status, body })
            }
        }
    }
}

/// Waits for the next request whose url contains `fragment`, skipping others.
pub(crate) async fn expect_request(rx: &mut mpsc::UnboundedReceiver<String>, fragment: &str) -> String {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let url = rx.recv().await.expect("transport dropped");
            if url.contains(fragment) {
                return url;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no request matching '{fragment}'"))
}

/// Drains already-issued requests after letting spawned tasks run.
pub(crate) async fn drain_requests(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut seen = Vec::new();
    while let Ok(url) = rx.try_recv() {
        seen.push(url);
    }
    seen
}

pub(crate) async fn expect_event(
    events: &mut broadcast::Receiver<SessionEvent>,
    wanted: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let event = events.recv().await.expect("event bus closed");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected session event")
}
