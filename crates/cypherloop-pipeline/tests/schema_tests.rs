mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use common::{nobel_schema, StubDb};
use cypherloop_core::error::PipelineError;
use cypherloop_core::traits::GraphDatabase;
use cypherloop_core::types::{PropertyType, QueryResult};
use cypherloop_pipeline::{extract_schema, SchemaCache};

/// Counts how often the label catalogue is read.
struct CountingDb {
    inner: StubDb,
    extractions: AtomicUsize,
}

impl CountingDb {
    fn new() -> Self {
        Self {
            inner: StubDb::accepting(),
            extractions: AtomicUsize::new(0),
        }
    }

    fn extractions(&self) -> usize {
        self.extractions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphDatabase for CountingDb {
    async fn query(&self, query: &str) -> Result<QueryResult> {
        if query.starts_with("CALL db.labels()") {
            self.extractions.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.query(query).await
    }

    async fn explain(&self, query: &str) -> Result<()> {
        self.inner.explain(query).await
    }
}

#[tokio::test]
async fn extracts_labels_endpoints_and_properties() {
    let db = StubDb::accepting();

    let schema = extract_schema(&db).await.unwrap();

    assert_eq!(schema, nobel_schema());
    let prize = schema.node("Prize").unwrap();
    assert_eq!(prize.properties[1].kind, PropertyType::Integer);
    assert!(schema.edge("WON", "Scholar", "Prize").is_some());
    assert!(schema.dangling_endpoints().is_empty());
}

#[tokio::test]
async fn unreachable_catalogue_is_schema_unavailable() {
    let db = StubDb::accepting().without_catalogue();

    let err = extract_schema(&db).await.unwrap_err();

    match err {
        PipelineError::SchemaUnavailable(message) => assert!(message.contains("Connection refused")),
        other => panic!("expected SchemaUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn enabled_cache_extracts_once_until_invalidated() {
    let db = CountingDb::new();
    let cache = SchemaCache::new(true);

    let first = cache.get_or_extract(&db).await.unwrap();
    let second = cache.get_or_extract(&db).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(db.extractions(), 1);

    cache.invalidate().await;
    cache.get_or_extract(&db).await.unwrap();
    assert_eq!(db.extractions(), 2);
}

#[tokio::test]
async fn disabled_cache_always_extracts() {
    let db = CountingDb::new();
    let cache = SchemaCache::new(false);

    cache.get_or_extract(&db).await.unwrap();
    cache.get_or_extract(&db).await.unwrap();

    assert_eq!(db.extractions(), 2);
}
