//! End-to-end verification flows over the public API with an in-memory store.

use chrono::Utc;
use gatekeeper::{
    CacheStore, EntryStatus, Error, Event, GateBuilder, GateConfig, GateEvent, MemoryStore,
    VerificationEngine, VerifyJob,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "integration-secret";
const ISSUER: &str = "gatekeeper";

fn token_for(ticket_id: &str, event_id: &str) -> String {
    let now = Utc::now().timestamp();
    encode(
        &Header::default(),
        &gatekeeper::Claims {
            ticket_id: ticket_id.to_string(),
            event_id: event_id.to_string(),
            iss: ISSUER.to_string(),
            valid_until: now + 3600,
            exp: now + 3600,
        },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("token should encode")
}

fn launch_party(max_capacity: u32, max_entries: u32) -> Event {
    let now = Utc::now().timestamp();
    Event {
        event_id: "E1".to_string(),
        name: "Launch Party".to_string(),
        max_capacity,
        max_entries,
        starts_at: now - 3600,
        ends_at: now + 86_400,
    }
}

async fn engine_for(store: Arc<dyn CacheStore>, event: &Event) -> VerificationEngine {
    let engine = VerificationEngine::new(store, SECRET, ISSUER);
    engine.registry().set(event).await.expect("event persists");
    engine
}

#[tokio::test]
async fn full_admission_lifecycle() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let engine = engine_for(store, &launch_party(100, 2)).await;
    let now = Utc::now().timestamp();
    let token = token_for("T1", "E1");

    // First scan admits, creating the record lazily.
    let ticket = engine
        .verify(&token, "gate-01", now)
        .await
        .expect("first entry admits");
    assert_eq!(ticket.entry_status, EntryStatus::In);
    assert_eq!(ticket.entry_count, 1);
    assert_eq!(engine.ledger().attendee_count().await.expect("count"), 1);

    // Re-scan while inside is denied and mutates nothing.
    assert!(matches!(
        engine.verify(&token, "gate-01", now).await,
        Err(Error::AlreadyInside)
    ));
    assert_eq!(engine.ledger().attendee_count().await.expect("count"), 1);

    // An external exit-scan flips the record to out; re-entry then admits.
    let mut record = engine
        .ledger()
        .read("T1")
        .await
        .expect("read")
        .expect("record exists");
    record.entry_status = EntryStatus::Out;
    engine.ledger().write(&record).await.expect("write");

    let ticket = engine
        .verify(&token, "gate-02", now)
        .await
        .expect("re-entry admits");
    assert_eq!(ticket.entry_count, 2);

    // Both allowed entries used: once outside again, further scans fail.
    let mut record = engine
        .ledger()
        .read("T1")
        .await
        .expect("read")
        .expect("record exists");
    record.entry_status = EntryStatus::Out;
    engine.ledger().write(&record).await.expect("write");

    assert!(matches!(
        engine.verify(&token, "gate-01", now).await,
        Err(Error::MaxEntriesReached)
    ));
}

#[tokio::test]
async fn capacity_is_enforced_across_tickets() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let engine = engine_for(store, &launch_party(2, 1)).await;
    let now = Utc::now().timestamp();

    engine
        .verify(&token_for("T1", "E1"), "gate-01", now)
        .await
        .expect("admit");
    engine
        .verify(&token_for("T2", "E1"), "gate-01", now)
        .await
        .expect("admit");

    // Venue full: a third ticket is denied before any record is created.
    assert!(matches!(
        engine.verify(&token_for("T3", "E1"), "gate-01", now).await,
        Err(Error::EventFull)
    ));
    assert!(engine.ledger().read("T3").await.expect("read").is_none());
    assert_eq!(engine.ledger().attendee_count().await.expect("count"), 2);
}

#[tokio::test]
async fn exclusion_sets_override_a_valid_token() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let engine = engine_for(store, &launch_party(100, 2)).await;
    let now = Utc::now().timestamp();

    engine.ledger().blacklist("T1").await.expect("blacklist");
    engine.ledger().revoke("T2").await.expect("revoke");

    assert!(matches!(
        engine.verify(&token_for("T1", "E1"), "gate-01", now).await,
        Err(Error::Blacklisted)
    ));
    assert!(matches!(
        engine.verify(&token_for("T2", "E1"), "gate-01", now).await,
        Err(Error::Revoked)
    ));

    // Lifting the blacklist restores admission.
    engine.ledger().unblacklist("T1").await.expect("unblacklist");
    engine
        .verify(&token_for("T1", "E1"), "gate-01", now)
        .await
        .expect("admit after unblacklist");
}

#[tokio::test]
async fn deleting_the_event_closes_the_gate() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let engine = engine_for(store, &launch_party(100, 2)).await;
    let now = Utc::now().timestamp();

    engine
        .verify(&token_for("T1", "E1"), "gate-01", now)
        .await
        .expect("admit");

    engine.registry().delete().await.expect("delete");
    assert!(matches!(
        engine.verify(&token_for("T2", "E1"), "gate-01", now).await,
        Err(Error::NoActiveEvent)
    ));
}

#[tokio::test]
async fn concurrent_scans_on_one_ticket_admit_once() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let engine = Arc::new(engine_for(store, &launch_party(100, 2)).await);
    let now = Utc::now().timestamp();
    let token = token_for("T1", "E1");

    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = Arc::clone(&engine);
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            engine.verify(&token, &format!("gate-{i:02}"), now).await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(_) => admitted += 1,
            Err(e) => assert!(
                matches!(e, Error::ConcurrentProcessing | Error::AlreadyInside),
                "unexpected rejection: {e:?}"
            ),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(engine.ledger().attendee_count().await.expect("count"), 1);

    // No lock survives the attempts: a fresh scan gets a business rejection
    // (AlreadyInside), not ConcurrentProcessing.
    assert!(matches!(
        engine.verify(&token, "gate-99", now).await,
        Err(Error::AlreadyInside)
    ));
}

#[tokio::test]
async fn gate_service_processes_queued_jobs() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let config = GateConfig {
        token_secret: SECRET.to_string(),
        workers: 2,
        ..GateConfig::default()
    };
    let gate = GateBuilder::new(config)
        .with_store(store)
        .build()
        .await
        .expect("gate builds");

    gate.engine()
        .registry()
        .set(&launch_party(100, 2))
        .await
        .expect("event persists");

    let mut events = gate.subscribe_events();
    gate.queue_handle()
        .enqueue(VerifyJob {
            qrcode: token_for("T1", "E1"),
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
}
