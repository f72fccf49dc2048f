//! CouchDB adapter tests against a fake CouchDB server.

#![cfg(feature = "couchdb")]

#[path = "../support/mod.rs"]
mod support;

mod fake;

use fake::FakeCouch;
use polystore::couchdb::CouchAdapter;
use polystore::{
    BackendKind, BackendMetadata, ConnectionConfig, DatabaseAdapter, DatabaseConfig,
    DatabaseStore, Model, Regex, SessionExt, StoreError,
};
use serde_json::json;
use support::{guild_warning, init_tracing, Warning};

const DATABASE: &str = "polystore";

fn config(port: u16) -> DatabaseConfig {
    DatabaseConfig {
        couchdb: Some(ConnectionConfig {
            host: Some("127.0.0.1".into()),
            port: Some(port),
            database: Some(DATABASE.into()),
            username: Some("admin".into()),
            password: Some("secret".into()),
            certificate: None,
        }),
        ..Default::default()
    }
}

async fn couch_store() -> (DatabaseStore, FakeCouch) {
    init_tracing();
    let fake = FakeCouch::default();
    let port = fake.start().await;
    let store = DatabaseStore::from_config(&config(port)).await.unwrap();
    (store, fake)
}

#[tokio::test]
async fn setup_creates_the_database_once() {
    init_tracing();
    let fake = FakeCouch::default();
    let port = fake.start().await;

    let mut first = CouchAdapter::try_create(&config(port)).unwrap();
    first.setup().await.unwrap();
    assert!(fake.database_exists(DATABASE));

    // The second setup sees 412 and carries on.
    let mut second = CouchAdapter::try_create(&config(port)).unwrap();
    second.setup().await.unwrap();
    assert_eq!(second.kind(), BackendKind::CouchDb);
}

#[tokio::test]
async fn unreachable_server_fails_setup() {
    init_tracing();
    // Nothing listens on port 9 in the test environment.
    let mut adapter = CouchAdapter::try_create(&config(9)).unwrap();
    let err = adapter.setup().await.unwrap_err();
    assert!(matches!(err, StoreError::Connection { .. }));
    assert!(adapter.open_session().is_err());
}

#[tokio::test]
async fn config_without_credentials_is_skipped() {
    init_tracing();
    let mut config = config(5984);
    if let Some(group) = config.couchdb.as_mut() {
        group.password = None;
    }
    assert!(CouchAdapter::try_create(&config).is_none());
}

#[tokio::test]
async fn store_and_load_round_trip() {
    let (store, fake) = couch_store().await;
    let warning = guild_warning();
    let id = warning.id().unwrap();

    let stored = warning.clone();
    store
        .with_session(|session| Box::pin(async move { session.store(&stored).await }))
        .await
        .unwrap();

    let raw = fake.document(&id).unwrap();
    assert_eq!(raw["_id"], json!(id));
    assert_eq!(raw["guildId"], json!("guild1"));
    assert_eq!(raw["_rev"], json!("1-fake"));

    let load_id = id.clone();
    let loaded = store
        .with_session(|session| {
            Box::pin(async move { session.load::<Warning>(&load_id).await })
        })
        .await
        .unwrap();
    assert_eq!(loaded, Some(warning));
    assert_eq!(
        store.adapter().metadata().get(&id).unwrap(),
        Some(BackendMetadata::Revision("1-fake".into()))
    );
}

#[tokio::test]
async fn second_store_carries_the_current_revision() {
    let (store, fake) = couch_store().await;
    let mut warning = guild_warning();
    store.save(warning.clone()).await.unwrap();

    warning.reason = "edited".into();
    store.save(warning.clone()).await.unwrap();

    let raw = fake.document(&warning.id().unwrap()).unwrap();
    assert_eq!(raw["_rev"], json!("2-fake"));
    assert_eq!(raw["reason"], json!("edited"));
}

#[tokio::test]
async fn conflicts_are_swallowed() {
    let (store, fake) = couch_store().await;
    let warning = guild_warning();
    store.save(warning.clone()).await.unwrap();

    fake.force_conflicts();
    let mut edited = warning.clone();
    edited.reason = "lost update".into();
    store.save(edited).await.unwrap();

    assert_eq!(fake.puts(), 2);
    let id = warning.id().unwrap();
    let raw = fake.document(&id).unwrap();
    assert_eq!(raw["reason"], json!(warning.reason));

    // The losing write stays cached until it is unloaded.
    let cached = store.cached::<Warning>(&id).unwrap().unwrap();
    assert_eq!(cached.reason, "lost update");

    store.unload_document(cached.as_ref()).unwrap();
    let load_id = id.clone();
    let reloaded = store
        .with_session(|session| {
            Box::pin(async move { session.load::<Warning>(&load_id).await })
        })
        .await
        .unwrap();
    assert_eq!(reloaded, Some(warning));
}

#[tokio::test]
async fn missing_documents_load_as_none() {
    let (store, _) = couch_store().await;
    let loaded = store
        .with_session(|session| {
            Box::pin(async move { session.load::<Warning>("Warnings/a|b|c|1").await })
        })
        .await
        .unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn load_many_is_tabulated() {
    let (store, _) = couch_store().await;
    let first = guild_warning();
    let second = Warning::new("guild1", "author2", "target1", 2000, "flooding");
    store.save(first.clone()).await.unwrap();
    store.save(second.clone()).await.unwrap();

    let ids = vec![
        second.id().unwrap(),
        "Warnings/guild1|ghost|target1|1".to_string(),
        first.id().unwrap(),
    ];
    let loaded = store
        .with_session(|session| {
            Box::pin(async move { session.load_many::<Warning>(&ids).await })
        })
        .await
        .unwrap();

    assert_eq!(loaded, vec![Some(second), None, Some(first)]);
}

#[tokio::test]
async fn queries_run_as_mango_selectors() {
    let (store, _) = couch_store().await;
    store.save(guild_warning()).await.unwrap();
    store
        .save(Warning::new("guild1", "author2", "target2", 2000, "abc flooding"))
        .await
        .unwrap();
    store
        .save(Warning::new("guild2", "author1", "target1", 3000, "abc again"))
        .await
        .unwrap();

    let (matching, by_id) = store
        .with_session(|session| {
            Box::pin(async move {
                let matching = session
                    .query::<Warning>()
                    .where_regex("reason", Regex::new("^abc").unwrap())
                    .where_equals("guildId", "guild1")
                    .execute()
                    .await?;
                let by_id = session
                    .query::<Warning>()
                    .where_equals("id", "Warnings/guild2|author1|target1|3000")
                    .first()
                    .await?;
                Ok((matching, by_id))
            })
        })
        .await
        .unwrap();

    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].target_id, "target2");
    assert_eq!(by_id.unwrap().reason, "abc again");
}

#[tokio::test]
async fn shutdown_releases_the_client() {
    let (store, _) = couch_store().await;
    store.save(guild_warning()).await.unwrap();
    assert_eq!(store.cache_len(), 1);
    store.shutdown().await.unwrap();
}
