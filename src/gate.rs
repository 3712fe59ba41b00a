//! Gate lifecycle - wiring the store, engine and queue into a running service.

use crate::config::GateConfig;
use crate::engine::VerificationEngine;
use crate::error::{Error, Result};
use crate::event::{create_event_channel, GateEvent, GateEventsChannel, GateEventsSender};
use crate::queue::{JobQueue, JobQueueHandle};
use crate::store::{CacheStore, RedisStore};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Builder for constructing a running gate.
pub struct GateBuilder {
    config: GateConfig,
    store: Option<Arc<dyn CacheStore>>,
}

impl GateBuilder {
    /// Create a new gate builder with the given configuration.
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    /// Inject a pre-built store instead of connecting to the configured URL.
    ///
    /// Used by tests to substitute an in-memory double, and by embedders that
    /// manage the store connection themselves.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build and start the gate.
    ///
    /// Connects the store (unless one was injected), verifies liveness with a
    /// ping, and starts the queue workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or the store is
    /// unreachable.
    pub async fn build(self) -> Result<RunningGate> {
        if self.config.token_secret.is_empty() {
            return Err(Error::Config("token_secret must be set".to_string()));
        }

        let store = match self.store {
            Some(store) => store,
            None => {
                info!("connecting to store at {}", self.config.store_url);
                Arc::new(RedisStore::connect(&self.config.store_url).await?)
            }
        };
        if !store.ping().await? {
            return Err(Error::Store("store did not answer ping".to_string()));
        }

        let (events_tx, events_rx) = create_event_channel();
        let engine = Arc::new(
            VerificationEngine::new(store, &self.config.token_secret, self.config.issuer.clone())
                .with_events(events_tx.clone()),
        );
        let queue = JobQueue::start(
            Arc::clone(&engine),
            self.config.workers,
            self.config.queue_capacity,
        );

        let queue_handle = queue.handle();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            issuer = %self.config.issuer,
            workers = self.config.workers,
            "gate ready"
        );

        Ok(RunningGate {
            engine,
            queue: Some(queue),
            queue_handle,
            events_tx,
            events_rx: Some(events_rx),
            shutdown_tx,
            shutdown_rx,
        })
    }
}

/// A running gate service.
pub struct RunningGate {
    engine: Arc<VerificationEngine>,
    queue: Option<JobQueue>,
    queue_handle: JobQueueHandle,
    events_tx: GateEventsSender,
    events_rx: Option<GateEventsChannel>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RunningGate {
    /// The verification engine, for interactive (synchronous-decision) use.
    #[must_use]
    pub fn engine(&self) -> Arc<VerificationEngine> {
        Arc::clone(&self.engine)
    }

    /// A handle for submitting background verification jobs.
    ///
    /// Enqueueing after shutdown fails with [`Error::Queue`].
    #[must_use]
    pub fn queue_handle(&self) -> JobQueueHandle {
        self.queue_handle.clone()
    }

    /// Get a receiver for gate events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<GateEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to gate events.
    #[must_use]
    pub fn subscribe_events(&self) -> GateEventsChannel {
        self.events_tx.subscribe()
    }

    /// Run the gate until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handler cannot be installed.
    pub async fn run(&mut self) -> Result<()> {
        info!("gate running, waiting for shutdown signal");
        let _ = self.events_tx.send(GateEvent::Started);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("shutdown signal received");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    self.shutdown();
                    break;
                }
            }
        }

        let _ = self.events_tx.send(GateEvent::ShuttingDown);
        if let Some(queue) = self.queue.take() {
            queue.shutdown().await;
        }
        info!("gate shutdown complete");
        Ok(())
    }

    /// Request the gate to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
