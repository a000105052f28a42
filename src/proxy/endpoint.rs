//! Proxy endpoint: the composition root.
//!
//! # Responsibilities
//! - Resolve every configured resource into a binding, log store, engine and logger
//! - Group resources by port, one dispatcher per port
//! - Start dispatchers and migration sweeps; stop them in order
//!
//! # Shutdown order
//! ```text
//! stop dispatchers (no new connections)
//!     → cancel migration sweeps
//!     → wait for in-flight requests, bounded by the drain timeout
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, ProxyConfig, ResourceBinding};
use crate::content::{ContentLogStore, MigrationState, MigrationSweep, StoreError};
use crate::forward::{upstream_client, ForwardEngine};
use crate::http::server::{build_router, AppState};
use crate::lifecycle::Shutdown;
use crate::net::{Dispatcher, InFlightTracker, ListenerError};
use crate::observability::TraceSink;
use crate::proxy::ResourceProxy;
use crate::transaction::TransactionLogger;

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("resource {resource}: {source}")]
    Store {
        resource: String,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Every resource of one configuration, served together.
pub struct ProxyEndpoint {
    config: ProxyConfig,
    resources: Vec<Arc<ResourceProxy>>,
    dispatchers: Vec<Dispatcher>,
    in_flight: InFlightTracker,
    shutdown: Shutdown,
    sweeps: Mutex<Vec<JoinHandle<MigrationState>>>,
}

impl ProxyEndpoint {
    /// Build the endpoint, creating each resource's log root.
    pub fn new(config: ProxyConfig) -> Result<Self, EndpointError> {
        Self::with_trace(config, |resource: &str| TraceSink::tracing(resource))
    }

    /// Like `new`, with a caller-chosen trace sink per resource name.
    pub fn with_trace<F>(config: ProxyConfig, make_trace: F) -> Result<Self, EndpointError>
    where
        F: Fn(&str) -> TraceSink,
    {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let client = upstream_client();
        let in_flight = InFlightTracker::new();
        let initial_state = if config.migration.enabled {
            MigrationState::Running
        } else {
            MigrationState::Complete
        };

        let mut resources = Vec::with_capacity(config.resources.len());
        for binding in ResourceBinding::all_from_config(&config) {
            let trace = make_trace(binding.resource_name.as_str());
            let store = ContentLogStore::from_binding(&binding, trace, initial_state).map_err(|source| {
                EndpointError::Store {
                    resource: binding.resource_name.clone(),
                    source,
                }
            })?;
            let logger = TransactionLogger::new(Arc::new(store), binding.max_body_chars);
            let engine = ForwardEngine::new(&binding, client.clone());

            tracing::info!(
                resource = %binding.resource_name,
                prefix = %binding.prefix(),
                upstream = %binding.upstream_base_url,
                log_root = %binding.log_root.display(),
                "Resource configured"
            );
            resources.push(Arc::new(ResourceProxy::new(binding, engine, logger)));
        }

        let mut by_port: BTreeMap<u16, Vec<Arc<ResourceProxy>>> = BTreeMap::new();
        for proxy in &resources {
            by_port.entry(proxy.binding().listen_port).or_default().push(proxy.clone());
        }
        let dispatchers = by_port
            .into_iter()
            .map(|(port, group)| {
                // every binding in a group shares the listener block
                let (host, keep_alive) = {
                    let binding = group[0].binding();
                    (binding.listen_host.clone(), binding.keep_alive)
                };
                let router = build_router(AppState::new(group, in_flight.clone()));
                Dispatcher::new(host, port, router, keep_alive)
            })
            .collect();

        Ok(Self {
            config,
            resources,
            dispatchers,
            in_flight,
            shutdown: Shutdown::new(),
            sweeps: Mutex::new(Vec::new()),
        })
    }

    /// Start every dispatcher, then the migration sweeps.
    ///
    /// If a port can't be bound, dispatchers already started are stopped.
    pub async fn start(&self) -> Result<Vec<SocketAddr>, EndpointError> {
        let mut addrs = Vec::with_capacity(self.dispatchers.len());
        for dispatcher in &self.dispatchers {
            match dispatcher.start().await {
                Ok(addr) => addrs.push(addr),
                Err(e) => {
                    for started in &self.dispatchers {
                        started.stop();
                    }
                    return Err(e.into());
                }
            }
        }

        if self.config.migration.enabled {
            let mut sweeps = self.sweeps.lock().unwrap_or_else(PoisonError::into_inner);
            for proxy in &self.resources {
                let sweep = MigrationSweep::new(proxy.logger().store().clone(), self.config.migration.clone());
                sweeps.push(sweep.spawn(self.shutdown.subscribe()));
            }
        }

        tracing::info!(ports = addrs.len(), resources = self.resources.len(), "Proxy endpoint started");
        Ok(addrs)
    }

    /// Stop accepting, cancel sweeps and wait for in-flight requests.
    ///
    /// Returns false if requests were still running at the drain deadline.
    pub async fn stop(&self) -> bool {
        for dispatcher in &self.dispatchers {
            dispatcher.stop();
        }
        for dispatcher in &self.dispatchers {
            dispatcher.stopped().await;
        }

        if !self.shutdown.trigger() {
            tracing::debug!("Proxy endpoint already stopping");
        }
        let sweeps: Vec<_> = self
            .sweeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for sweep in sweeps {
            if let Err(e) = sweep.await {
                tracing::warn!(error = %e, "Migration sweep did not finish cleanly");
            }
        }

        let drain = Duration::from_secs(self.config.shutdown.drain_timeout_secs);
        let drained = self.in_flight.wait_idle(drain).await;
        if drained {
            tracing::info!("Proxy endpoint stopped");
        } else {
            tracing::warn!(
                in_flight = self.in_flight.active(),
                drain_timeout_secs = drain.as_secs(),
                "Proxy endpoint stopped with requests still in flight"
            );
        }
        drained
    }

    /// Bound addresses of the started dispatchers.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.dispatchers.iter().filter_map(Dispatcher::local_addr).collect()
    }

    /// Bound address of the dispatcher serving `resource`.
    pub fn local_addr_of(&self, resource: &str) -> Option<SocketAddr> {
        let port = self.resource(resource)?.binding().listen_port;
        self.dispatchers
            .iter()
            .find(|d| d.port() == port)
            .and_then(Dispatcher::local_addr)
    }

    /// Look up a resource by name, case-insensitively.
    pub fn resource(&self, name: &str) -> Option<&Arc<ResourceProxy>> {
        self.resources.iter().find(|p| p.name().eq_ignore_ascii_case(name))
    }

    pub fn dispatchers(&self) -> &[Dispatcher] {
        &self.dispatchers
    }

    pub fn in_flight(&self) -> &InFlightTracker {
        &self.in_flight
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}
