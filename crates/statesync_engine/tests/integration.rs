//! End-to-end tests across cells, composers, cursors and adapters.

use proptest::prelude::*;
use serde_json::{json, Value};
use statesync_engine::{
    compose, local_state, remote_state, shallow_merge, sync, CellPhase, CursorFactory, HttpMethod,
    HttpResponse, MemoryStore, RemoteConfig, StateHandle, SyncConfig,
};
use statesync_storage::{InMemoryStorage, KeyValueStorage};
use statesync_testkit::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn remote_value_replaces_initial_without_posting() {
    init_tracing();
    let client = Arc::new(
        ScriptedHttpClient::new()
            .delayed(Duration::from_millis(10))
            .on_get("/foo/bar", r#"{"hi":3}"#),
    );
    let state = remote_state(
        "/foo/bar",
        json!({"hi": 5}),
        Arc::clone(&client),
        RemoteConfig::default(),
        SyncConfig::isolated(),
    );

    assert_eq!(state.value(), json!({"hi": 5}));
    assert_eq!(state.phase(), CellPhase::Loading);

    state.settled().await;

    assert_eq!(state.value(), json!({"hi": 3}));
    assert_eq!(client.requests_with(HttpMethod::Get).len(), 1);
    assert!(client.requests_with(HttpMethod::Post).is_empty());
}

#[tokio::test]
async fn local_cache_composed_with_remote() {
    let storage = Arc::new(InMemoryStorage::with_items([("/foo/bar", r#"{"hi":4}"#)]));
    let client = Arc::new(
        ScriptedHttpClient::new()
            .delayed(Duration::from_millis(10))
            .on_get("/foo/bar", r#"{"hi":3}"#),
    );

    let local = local_state("/foo/bar", json!({"hi": 5}), Arc::clone(&storage), SyncConfig::isolated());
    let remote = remote_state(
        "/foo/bar",
        json!({"hi": 5}),
        Arc::clone(&client),
        RemoteConfig::default(),
        SyncConfig::isolated(),
    );
    let composed = compose(local.clone(), remote.clone());

    // The cache answers while the server is still loading.
    assert_eq!(composed.value(), json!({"hi": 4}));

    remote.settled().await;

    // The server moved, so it overwrites the cache.
    assert_eq!(composed.value(), json!({"hi": 3}));
    assert_eq!(storage.get_item("/foo/bar").unwrap().as_deref(), Some(r#"{"hi":3}"#));
    assert!(client.requests_with(HttpMethod::Post).is_empty());
}

#[tokio::test]
async fn local_and_remote_share_the_default_registry() {
    let key = "/compose/default-config";
    let storage = Arc::new(InMemoryStorage::with_items([(key, r#"{"hi":4}"#)]));
    let client = Arc::new(ScriptedHttpClient::new().on_get(key, r#"{"hi":3}"#));

    let local = local_state(key, json!({"hi": 5}), Arc::clone(&storage), SyncConfig::default());
    let remote = remote_state(
        key,
        json!({"hi": 5}),
        Arc::clone(&client),
        RemoteConfig::default(),
        SyncConfig::default(),
    );
    let composed = compose(local.clone(), remote.clone());
    remote.settled().await;

    assert_eq!(client.requests_with(HttpMethod::Get).len(), 1);
    assert_eq!(composed.value(), json!({"hi": 3}));
    assert_eq!(storage.get_item(key).unwrap().as_deref(), Some(r#"{"hi":3}"#));

    // A second local mount of the key is still deduplicated.
    let again = local_state(key, json!({"hi": 9}), Arc::clone(&storage), SyncConfig::default());
    assert_eq!(again.value(), json!({"hi": 9}));
    assert_eq!(storage.get_item(key).unwrap().as_deref(), Some(r#"{"hi":3}"#));
}

#[test]
fn cursor_composed_with_local_storage() {
    let storage = Arc::new(InMemoryStorage::new());
    let parent = sync("/doc", json!({"hi": 5}), MemoryStore::new(), SyncConfig::isolated());
    let factory = CursorFactory::from_handle(&parent);
    let hi = factory.cursor::<i64>("hi").unwrap();
    let local = local_state("/foo/bar", 5i64, Arc::clone(&storage), SyncConfig::isolated());

    let composed = compose(hi.clone(), local.clone());
    assert_eq!(composed.value(), 5);

    composed.set(4);

    assert_eq!(parent.value(), json!({"hi": 4}));
    assert_eq!(hi.value(), 4);
    assert_eq!(composed.value(), 4);
    assert_eq!(storage.get_item("/foo/bar").unwrap().as_deref(), Some("4"));
}

#[tokio::test]
async fn server_errors_reach_the_hook() {
    let client = Arc::new(
        ScriptedHttpClient::new()
            .respond(HttpMethod::Get, "https://api.test/broken", HttpResponse::new(500, ""))
            .on_get("https://api.test/empty", "null")
            .respond(HttpMethod::Post, "https://api.test/empty", HttpResponse::new(500, "")),
    );
    let remote = RemoteConfig::new("https://api.test");

    let sink = ErrorSink::new();
    let broken = remote_state("/broken", json!(1), Arc::clone(&client), remote.clone(), sink.config());
    broken.settled().await;
    assert_eq!(
        sink.messages(),
        vec!["failed to load '/broken': GET for 'https://api.test/broken' returned a 500 response".to_string()]
    );
    assert_eq!(broken.value(), json!(1));

    let sink = ErrorSink::new();
    let empty = remote_state("/empty", json!(2), Arc::clone(&client), remote, sink.config());
    empty.settled().await;
    assert_eq!(
        sink.messages(),
        vec!["failed to write '/empty': POST for 'https://api.test/empty' returned a 500 response".to_string()]
    );
    assert_eq!(empty.value(), json!(2));
    assert_eq!(empty.stats().write_failures, 1);
}

#[tokio::test]
async fn headers_go_out_with_every_request() {
    let client = Arc::new(ScriptedHttpClient::new().on_get("/k", "null").accept_posts("/k"));
    let remote = RemoteConfig::default().with_header("Authorization", "Bearer abc");

    let state = remote_state("/k", json!("init"), Arc::clone(&client), remote, SyncConfig::isolated());
    state.settled().await;
    state.set(json!("next"));
    state.settled().await;

    let requests = client.requests();
    assert_eq!(requests.len(), 3);
    for request in &requests {
        assert_eq!(request.headers, vec![("Authorization".to_string(), "Bearer abc".to_string())]);
    }
    assert_eq!(requests[1].body.as_deref(), Some("init"));
    assert_eq!(requests[2].body.as_deref(), Some("next"));
}

#[test]
fn file_storage_survives_reopen() {
    let temp = TempStorage::new();

    {
        let storage = Arc::new(temp.open());
        let prefs = local_state("/prefs", json!({"theme": "dark"}), storage, SyncConfig::isolated());
        prefs.set(json!({"theme": "light"}));
    }

    let storage = Arc::new(temp.open());
    let prefs = local_state("/prefs", json!({"theme": "dark"}), storage, SyncConfig::isolated());
    assert_eq!(prefs.value(), json!({"theme": "light"}));
}

#[test]
fn recording_store_sees_one_read_per_registry() {
    let store = RecordingStore::new().with_item("/k", json!("stored"));
    let config = SyncConfig::isolated();

    let first = sync("/k", json!("init"), store.clone(), config.clone());
    let second = sync("/k", json!("init"), store.clone(), config);

    assert_eq!(store.reads().len(), 1);
    assert_eq!(first.value(), json!("stored"));
    assert_eq!(second.value(), json!("init"));
    assert!(store.writes().is_empty());
}

proptest! {
    #[test]
    fn composed_set_merges_into_both_sources(
        key in key_strategy(),
        base in record_strategy(),
        patch in record_strategy(),
    ) {
        let a = sync(key.clone(), base.clone(), MemoryStore::<Value>::new(), SyncConfig::isolated());
        let b = sync(key, base.clone(), MemoryStore::<Value>::new(), SyncConfig::isolated());
        let composed = compose(a.clone(), b.clone());

        composed.set(patch.clone());

        let expected = shallow_merge(&base, patch);
        prop_assert_eq!(a.value(), expected.clone());
        prop_assert_eq!(b.value(), expected.clone());
        prop_assert_eq!(composed.value(), expected);
    }

    #[test]
    fn cells_hold_any_json(value in json_strategy()) {
        let store = RecordingStore::new();
        let state = sync("/v", Value::Null, store.clone(), SyncConfig::isolated());

        state.set(value.clone());
        prop_assert_eq!(state.value(), value.clone());
        prop_assert_eq!(store.get("/v"), Some(value));
    }
}
