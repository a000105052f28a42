//! Listener dispatcher.
//!
//! # Responsibilities
//! - Bind one TCP port on behalf of every resource that shares it
//! - Accept connections until `stop`, handing each to its own task
//! - Serve HTTP/1.1 on each connection through the port's router
//! - Skip accept errors instead of ending the loop
//!
//! # State Transitions
//! ```text
//! Idle → Listening: start() bound the port
//! Listening → Stopping: stop() called, accept loop winding down
//! Stopping → Stopped: listen socket closed
//! Idle → Stopped: stop() before start()
//! ```
//! Stopped is terminal. Requests already accepted keep running; their
//! connections close once the current response is written.

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::{
    rt::{TokioIo, TokioTimer},
    service::TowerToHyperService,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::net::connection::ConnectionId;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    Listening,
    Stopping,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("dispatcher for {addr} was already started")]
    AlreadyStarted { addr: String },
}

/// Accept loop for one host and port.
pub struct Dispatcher {
    host: String,
    port: u16,
    router: Router,
    keep_alive: bool,
    state: Arc<watch::Sender<DispatcherState>>,
    local_addr: OnceLock<SocketAddr>,
    accepted: Arc<AtomicU64>,
}

impl Dispatcher {
    pub fn new(host: impl Into<String>, port: u16, router: Router, keep_alive: bool) -> Self {
        let (state, _) = watch::channel(DispatcherState::Idle);
        Self {
            host: host.into(),
            port,
            router,
            keep_alive,
            state: Arc::new(state),
            local_addr: OnceLock::new(),
            accepted: Arc::new(AtomicU64::new(0)),
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Bind the port and start accepting on a background task.
    pub async fn start(&self) -> Result<SocketAddr, ListenerError> {
        if *self.state.borrow() != DispatcherState::Idle {
            return Err(ListenerError::AlreadyStarted { addr: self.addr() });
        }

        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|source| ListenerError::Bind {
                addr: self.addr(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            addr: self.addr(),
            source,
        })?;

        // stop() may have raced the bind
        let started = self.state.send_if_modified(|state| {
            if *state == DispatcherState::Idle {
                *state = DispatcherState::Listening;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(ListenerError::AlreadyStarted { addr: self.addr() });
        }
        let _ = self.local_addr.set(local_addr);

        tracing::info!(address = %local_addr, keep_alive = self.keep_alive, "Dispatcher listening");

        tokio::spawn(accept_loop(
            listener,
            self.router.clone(),
            self.keep_alive,
            self.state.clone(),
            self.accepted.clone(),
        ));
        Ok(local_addr)
    }

    /// Stop accepting. Idempotent; in-flight requests are not cancelled.
    pub fn stop(&self) {
        self.state.send_modify(|state| {
            *state = match *state {
                DispatcherState::Idle => DispatcherState::Stopped,
                DispatcherState::Listening => DispatcherState::Stopping,
                other => other,
            };
        });
    }

    /// Resolve once the listen socket is closed.
    pub async fn stopped(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == DispatcherState::Stopped).await;
    }

    pub fn state(&self) -> DispatcherState {
        *self.state.borrow()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The bound address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Resolve once the dispatcher leaves `Listening`.
async fn leaving_listening(state: &mut watch::Receiver<DispatcherState>) {
    let _ = state.wait_for(|s| *s != DispatcherState::Listening).await;
}

async fn accept_loop(
    listener: TcpListener,
    router: Router,
    keep_alive: bool,
    state: Arc<watch::Sender<DispatcherState>>,
    accepted: Arc<AtomicU64>,
) {
    let mut stop = state.subscribe();
    let port = listener.local_addr().map(|a| a.port()).unwrap_or_default();

    loop {
        tokio::select! {
            _ = leaving_listening(&mut stop) => break,
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    accepted.fetch_add(1, Ordering::Relaxed);
                    metrics::record_accepted(port);
                    tokio::spawn(serve_connection(
                        stream,
                        peer,
                        router.clone(),
                        keep_alive,
                        state.subscribe(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(port, error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
        }
    }

    drop(listener);
    state.send_replace(DispatcherState::Stopped);
    tracing::info!(port, "Dispatcher stopped");
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    keep_alive: bool,
    mut state: watch::Receiver<DispatcherState>,
) {
    let id = ConnectionId::new();
    tracing::trace!(connection_id = %id, peer_addr = %peer, "Connection accepted");

    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new()).keep_alive(keep_alive);
    let conn = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(router));
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = leaving_listening(&mut state) => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(connection_id = %id, error = %e, "Connection ended with error");
    }
    tracing::trace!(connection_id = %id, "Connection closed");
}
