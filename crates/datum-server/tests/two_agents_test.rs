//! Integration tests: two agents, each behind its own server, sharing a store.

use std::sync::Arc;

use datum_client::{Datum, DatumClient};
use datum_core::{
    Action, ActionHash, ActionStore, AgentPubKey, DatumError, DatumResult, EntryHash, ErrorCode,
    MemoryActionStore, VersionedRecordStore,
};
use datum_server::{create_server, AppState};

async fn spawn_server(store: Arc<VersionedRecordStore>, agent: &str) -> DatumClient {
    let app = create_server(AppState::new(store, AgentPubKey::from(agent)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    DatumClient::new(&format!("http://{}", addr)).unwrap()
}

async fn alice_and_bob() -> (DatumClient, DatumClient) {
    let store = Arc::new(VersionedRecordStore::new(Arc::new(MemoryActionStore::new())));
    let alice = spawn_server(Arc::clone(&store), "alice").await;
    let bob = spawn_server(store, "bob").await;
    (alice, bob)
}

fn sample(value: &str) -> Datum {
    Datum::new("soil_moisture", "percent", value, "sensor-3")
}

/// Test that creating a datum returns its action.
#[tokio::test]
async fn test_create_datum() {
    let (alice, _bob) = alice_and_bob().await;
    let record = alice.create(&sample("31")).await.unwrap();
    assert_eq!(record.action.author, AgentPubKey::from("alice"));
    assert_eq!(record.entry(), Some(&sample("31")));
}

/// Test that a datum created by one agent is readable by another.
#[tokio::test]
async fn test_create_and_read_datum() {
    let (alice, bob) = alice_and_bob().await;
    let record = alice.create(&sample("31")).await.unwrap();

    let seen = bob.get_latest(record.action_hash()).await.unwrap();
    assert_eq!(seen.entry(), Some(&sample("31")));
    assert_eq!(seen, record);
}

/// Test two chained updates across agents.
#[tokio::test]
async fn test_create_and_update_datum() {
    let (alice, bob) = alice_and_bob().await;
    let root = alice.create(&sample("31")).await.unwrap();
    let root_hash = root.action_hash().clone();

    let first = bob
        .update(&root_hash, &root_hash, &sample("33"))
        .await
        .unwrap();
    assert_eq!(first.action.author, AgentPubKey::from("bob"));
    assert_eq!(alice.get_latest(&root_hash).await.unwrap(), first);

    let second = alice
        .update(&root_hash, first.action_hash(), &sample("35"))
        .await
        .unwrap();
    assert_eq!(bob.get_latest(&root_hash).await.unwrap(), second);

    let revisions = bob.get_all_revisions(&root_hash).await.unwrap();
    assert_eq!(revisions.len(), 3);
    let values: Vec<_> = revisions
        .iter()
        .map(|r| r.entry().unwrap().value.clone())
        .collect();
    assert_eq!(values, vec!["31", "33", "35"]);
}

/// Test deleting a datum and reading the delete back from the other agent.
#[tokio::test]
async fn test_create_and_delete_datum() {
    let (alice, bob) = alice_and_bob().await;
    let root = alice.create(&sample("31")).await.unwrap();

    let marker = bob.delete(root.action_hash()).await.unwrap();

    let deletes = alice.get_all_deletes(root.action_hash()).await.unwrap();
    assert_eq!(deletes.len(), 1);
    let oldest = alice.get_oldest_delete(root.action_hash()).await.unwrap();
    assert_eq!(oldest.hash, marker);
    assert_eq!(oldest.author, AgentPubKey::from("bob"));

    let details = alice.get_details(root.action_hash()).await.unwrap();
    assert!(details.is_deleted());
    // The record itself stays readable.
    assert_eq!(alice.get_original(root.action_hash()).await.unwrap(), root);
}

/// Test that server errors surface as typed client errors.
#[tokio::test]
async fn test_errors_round_trip() {
    let (alice, bob) = alice_and_bob().await;

    let err = alice.get_latest(&"missing".into()).await.unwrap_err();
    assert!(matches!(err, DatumError::NotFound { .. }));

    let err = alice
        .create(&Datum::new("soil_moisture", "percent", "", "sensor-3"))
        .await
        .unwrap_err();
    assert!(matches!(err, DatumError::Validation { .. }));

    let root = alice.create(&sample("31")).await.unwrap();
    let err = bob
        .update(root.action_hash(), &"bogus".into(), &sample("32"))
        .await
        .unwrap_err();
    assert!(matches!(err, DatumError::InvalidReference { .. }));

    let health = bob.health().await.unwrap();
    assert_eq!(health.agent, "bob");
    assert_eq!(health.actions, 1);
}

/// Backend that reads normally but refuses every write.
struct ReadOnlyDisk(MemoryActionStore);

impl ActionStore for ReadOnlyDisk {
    fn append(&self, _action: &Action, _entry: Option<&Datum>) -> DatumResult<()> {
        Err(DatumError::storage("disk is read-only"))
    }

    fn get_action(&self, hash: &ActionHash) -> DatumResult<Option<Action>> {
        self.0.get_action(hash)
    }

    fn get_entry(&self, hash: &EntryHash) -> DatumResult<Option<Datum>> {
        self.0.get_entry(hash)
    }

    fn successors(&self, previous: &ActionHash) -> DatumResult<Vec<Action>> {
        self.0.successors(previous)
    }

    fn updates_for(&self, original: &ActionHash) -> DatumResult<Vec<Action>> {
        self.0.updates_for(original)
    }

    fn deletes_for(&self, target: &ActionHash) -> DatumResult<Vec<Action>> {
        self.0.deletes_for(target)
    }

    fn last_seq(&self, author: &AgentPubKey) -> DatumResult<Option<u32>> {
        self.0.last_seq(author)
    }

    fn count_actions(&self) -> DatumResult<usize> {
        self.0.count_actions()
    }
}

/// Test that revising from another chain keeps its wrong-chain code.
#[tokio::test]
async fn test_wrong_chain_round_trip() {
    let (alice, bob) = alice_and_bob().await;
    let first = alice.create(&sample("31")).await.unwrap();
    let second = alice.create(&sample("40")).await.unwrap();

    let err = bob
        .update(first.action_hash(), second.action_hash(), &sample("32"))
        .await
        .unwrap_err();
    assert!(matches!(err, DatumError::InvalidReference { .. }));
    assert_eq!(err.code(), ErrorCode::RefWrongChain);
}

/// Test that a failing backend write reaches the client as a storage error.
#[tokio::test]
async fn test_storage_error_round_trip() {
    let backend = Arc::new(ReadOnlyDisk(MemoryActionStore::new()));
    let store = Arc::new(VersionedRecordStore::new(backend));
    let alice = spawn_server(store, "alice").await;

    let err = alice.create(&sample("31")).await.unwrap_err();
    assert!(matches!(err, DatumError::Storage { .. }));
    assert_eq!(err.code(), ErrorCode::DbOperationFailed);
    assert!(err.to_string().contains("disk is read-only"));
}
