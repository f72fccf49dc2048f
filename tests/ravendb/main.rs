//! RavenDB adapter tests against a fake RavenDB server.

#![cfg(feature = "ravendb")]

#[path = "../support/mod.rs"]
mod support;

mod fake;

use fake::FakeRaven;
use polystore::ravendb::RavenAdapter;
use polystore::{
    BackendKind, BackendMetadata, ConnectionConfig, DatabaseAdapter, DatabaseConfig,
    DatabaseStore, Model, Regex, SessionExt,
};
use serde_json::json;
use support::{guild_warning, init_tracing, Warning};

const DATABASE: &str = "polystore";

fn config(port: u16) -> DatabaseConfig {
    DatabaseConfig {
        ravendb: Some(ConnectionConfig {
            host: Some("127.0.0.1".into()),
            port: Some(port),
            database: Some(DATABASE.into()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

async fn raven_store() -> (DatabaseStore, FakeRaven) {
    init_tracing();
    let fake = FakeRaven::default();
    let port = fake.start().await;
    let store = DatabaseStore::from_config(&config(port)).await.unwrap();
    assert_eq!(store.backend(), BackendKind::RavenDb);
    (store, fake)
}

#[tokio::test]
async fn setup_creates_a_missing_database() {
    init_tracing();
    let fake = FakeRaven::default();
    let port = fake.start().await;
    assert!(!fake.database_exists(DATABASE));

    let mut adapter = RavenAdapter::try_create(&config(port)).unwrap();
    adapter.setup().await.unwrap();
    assert!(fake.database_exists(DATABASE));

    // An existing database is left alone.
    let mut again = RavenAdapter::try_create(&config(port)).unwrap();
    again.setup().await.unwrap();
}

#[tokio::test]
async fn store_flushes_one_batch_and_keeps_metadata_out_of_data() {
    let (store, fake) = raven_store().await;
    let warning = guild_warning();
    let id = warning.id().unwrap();

    store.save(warning.clone()).await.unwrap();
    assert_eq!(fake.batches(), 1);

    let raw = fake.document(&id).unwrap();
    assert_eq!(raw["@metadata"]["@collection"], json!("Warnings"));
    assert_eq!(raw["createdAt"], json!(1000));

    store.unload_document(&warning).unwrap();
    let load_id = id.clone();
    let loaded = store
        .with_session(|session| {
            Box::pin(async move { session.load::<Warning>(&load_id).await })
        })
        .await
        .unwrap();

    assert_eq!(loaded, Some(warning));
    assert!(matches!(
        store.adapter().metadata().get(&id).unwrap(),
        Some(BackendMetadata::ChangeVector(_))
    ));
}

#[tokio::test]
async fn missing_documents_load_as_none() {
    let (store, _) = raven_store().await;
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
    let (store, _) = raven_store().await;
    let first = guild_warning();
    let second = Warning::new("guild1", "author2", "target1", 2000, "flooding");
    store.save(first.clone()).await.unwrap();
    store.save(second.clone()).await.unwrap();

    let ids = vec![
        first.id().unwrap(),
        "Warnings/guild1|ghost|target1|1".to_string(),
        second.id().unwrap(),
        first.id().unwrap(),
    ];
    let loaded = store
        .with_session(|session| {
            Box::pin(async move { session.load_many::<Warning>(&ids).await })
        })
        .await
        .unwrap();

    assert_eq!(
        loaded,
        vec![Some(first.clone()), None, Some(second), Some(first)]
    );
}

#[tokio::test]
async fn queries_run_as_rql() {
    let (store, _) = raven_store().await;
    store.save(guild_warning()).await.unwrap();
    store
        .save(Warning::new("guild1", "author2", "target2", 2000, "abc flooding"))
        .await
        .unwrap();
    store
        .save(Warning::new("guild2", "author1", "target1", 3000, "abc again"))
        .await
        .unwrap();

    let (matching, by_id, everything) = store
        .with_session(|session| {
            Box::pin(async move {
                let matching = session
                    .query::<Warning>()
                    .where_equals("guildId", "guild1")
                    .where_regex("reason", Regex::new("^abc").unwrap())
                    .execute()
                    .await?;
                let by_id = session
                    .query::<Warning>()
                    .where_equals("id", "Warnings/guild1|author1|target1|1000")
                    .first()
                    .await?;
                let everything = session.query::<Warning>().execute().await?;
                Ok((matching, by_id, everything))
            })
        })
        .await
        .unwrap();

    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].target_id, "target2");
    assert_eq!(by_id, Some(guild_warning()));
    assert_eq!(everything.len(), 3);
}
