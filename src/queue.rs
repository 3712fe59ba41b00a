//! Asynchronous verification job queue.
//!
//! Replays verification requests through the engine outside the interactive
//! request path, e.g. batch re-validation after a blacklist update. Workers
//! log each decision rather than returning it to a caller; observers that
//! need the outcome subscribe to the engine's event channel.

use crate::engine::VerificationEngine;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default bound on queued jobs awaiting a worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A verification request payload, same shape as the interactive path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyJob {
    /// The signed ticket token scanned at the gate.
    pub qrcode: String,
    /// Identifier of the scanning device.
    pub device_key: String,
    /// Scan timestamp (seconds since epoch).
    pub time: i64,
}

/// Handle for submitting jobs to a running queue.
#[derive(Clone)]
pub struct JobQueueHandle {
    tx: mpsc::Sender<VerifyJob>,
}

impl JobQueueHandle {
    /// Enqueue a job for background verification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Queue`] if the queue has shut down.
    pub async fn enqueue(&self, job: VerifyJob) -> Result<()> {
        self.tx
            .send(job)
            .await
            .map_err(|_| Error::Queue("queue is shut down".to_string()))
    }
}

/// Worker pool draining verification jobs through the engine.
pub struct JobQueue {
    tx: mpsc::Sender<VerifyJob>,
    rx: Arc<Mutex<mpsc::Receiver<VerifyJob>>>,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl JobQueue {
    /// Start `workers` background workers over a bounded channel.
    #[must_use]
    pub fn start(engine: Arc<VerificationEngine>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let engine = Arc::clone(&engine);
                let rx = Arc::clone(&rx);
                let mut shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    debug!(worker_id, "queue worker started");
                    loop {
                        // Hold the receiver lock only for the dequeue itself
                        // so other workers keep draining while this one
                        // processes. A parked recv also wakes on the shutdown
                        // signal; from then on the buffer is drained without
                        // waiting for more jobs.
                        let job = {
                            let mut rx = rx.lock().await;
                            if *shutdown_rx.borrow() {
                                rx.try_recv().ok()
                            } else {
                                let received = tokio::select! {
                                    job = rx.recv() => Some(job),
                                    _ = shutdown_rx.changed() => None,
                                };
                                match received {
                                    Some(job) => job,
                                    None => rx.try_recv().ok(),
                                }
                            }
                        };
                        match job {
                            Some(job) => process(&engine, &job).await,
                            None => break,
                        }
                    }
                    debug!(worker_id, "queue worker stopped");
                })
            })
            .collect();

        Self {
            tx,
            rx,
            shutdown_tx,
            workers: handles,
        }
    }

    /// Get a cloneable submission handle.
    #[must_use]
    pub fn handle(&self) -> JobQueueHandle {
        JobQueueHandle {
            tx: self.tx.clone(),
        }
    }

    /// Stop accepting jobs, drain the channel and wait for workers to exit.
    ///
    /// Workers are stopped via the shutdown signal (not by waiting for the
    /// last sender to drop), so shutdown completes even while submission
    /// handles are still alive elsewhere. Buffered jobs are still processed.
    /// Dropping the receiver afterwards closes the channel, so later
    /// `enqueue` calls on surviving handles fail.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        drop(self.tx);
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!("queue worker panicked: {e}");
            }
        }
        drop(self.rx);
        info!("job queue shut down");
    }
}

/// Run one job through the engine and log the decision.
async fn process(engine: &VerificationEngine, job: &VerifyJob) {
    // Required-field validation lives on the caller side of the engine.
    if job.qrcode.is_empty() {
        warn!(
            device = %job.device_key,
            kind = Error::MissingParameters("qrcode").kind(),
            "dropping job with empty token"
        );
        return;
    }
    if job.device_key.is_empty() {
        warn!(
            kind = Error::MissingParameters("device_key").kind(),
            "dropping job with empty device key"
        );
        return;
    }

    // Fire-and-forget: the engine logs and broadcasts the decision; a store
    // fault here is logged and the job is dropped, re-enqueueing is the
    // submitter's call.
    let _ = engine.verify(&job.qrcode, &job.device_key, job.time).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{create_event_channel, GateEvent};
    use crate::registry::Event;
    use crate::store::{CacheStore, MemoryStore};
    use crate::token::Claims;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::Duration;

    const SECRET: &str = "test-secret";
    const ISSUER: &str = "gatekeeper";

    fn token_for(ticket_id: &str) -> String {
        let now = Utc::now().timestamp();
        encode(
            &Header::default(),
            &Claims {
                ticket_id: ticket_id.to_string(),
                event_id: "E1".to_string(),
                iss: ISSUER.to_string(),
                valid_until: now + 3600,
                exp: now + 3600,
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("token should encode")
    }

    async fn engine_with_event() -> (Arc<VerificationEngine>, crate::event::GateEventsChannel) {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let (sender, events) = create_event_channel();
        let engine = VerificationEngine::new(store, SECRET, ISSUER).with_events(sender);
        let now = Utc::now().timestamp();
        engine
            .registry()
            .set(&Event {
                event_id: "E1".to_string(),
                name: "Launch Party".to_string(),
                max_capacity: 100,
                max_entries: 2,
                starts_at: now - 3600,
                ends_at: now + 86_400,
            })
            .await
            .expect("event should persist");
        (Arc::new(engine), events)
    }

    #[tokio::test]
    async fn test_jobs_flow_through_engine() {
        let (engine, mut events) = engine_with_event().await;
        let queue = JobQueue::start(Arc::clone(&engine), 2, 16);
        let handle = queue.handle();

        handle
            .enqueue(VerifyJob {
                qrcode: token_for("T1"),
                device_key: "gate-01".to_string(),
                time: Utc::now().timestamp(),
            })
            .await
            .expect("enqueue");

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("decision within deadline")
            .expect("event");
        assert!(matches!(
            event,
            GateEvent::Admitted { ticket_id, .. } if ticket_id == "T1"
        ));

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_jobs() {
        let (engine, _events) = engine_with_event().await;
        let queue = JobQueue::start(Arc::clone(&engine), 1, 16);
        let handle = queue.handle();

        for i in 0..5 {
            handle
                .enqueue(VerifyJob {
                    qrcode: token_for(&format!("T{i}")),
                    device_key: "gate-01".to_string(),
                    time: Utc::now().timestamp(),
                })
                .await
                .expect("enqueue");
        }
        queue.shutdown().await;

        assert_eq!(
            engine.ledger().attendee_count().await.expect("count"),
            5,
            "all queued tickets admitted before shutdown completed"
        );
    }

    #[tokio::test]
    async fn test_shutdown_completes_while_handles_are_alive() {
        let (engine, _events) = engine_with_event().await;
        let queue = JobQueue::start(engine, 2, 16);
        let handle = queue.handle();

        // A live submission handle must not keep the workers running.
        tokio::time::timeout(Duration::from_secs(5), queue.shutdown())
            .await
            .expect("shutdown completes despite the outstanding handle");
        drop(handle);
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let (engine, _events) = engine_with_event().await;
        let queue = JobQueue::start(engine, 1, 16);
        let handle = queue.handle();
        queue.shutdown().await;

        let result = handle
            .enqueue(VerifyJob {
                qrcode: token_for("T1"),
                device_key: "gate-01".to_string(),
                time: Utc::now().timestamp(),
            })
            .await;
        assert!(matches!(result, Err(crate::Error::Queue(_))));
    }

    #[tokio::test]
    async fn test_jobs_with_missing_fields_are_dropped() {
        let (engine, _events) = engine_with_event().await;
        let queue = JobQueue::start(Arc::clone(&engine), 1, 16);
        let handle = queue.handle();

        handle
            .enqueue(VerifyJob {
                qrcode: String::new(),
                device_key: "gate-01".to_string(),
                time: Utc::now().timestamp(),
            })
            .await
            .expect("enqueue");
        queue.shutdown().await;

        assert_eq!(engine.ledger().attendee_count().await.expect("count"), 0);
    }
}
