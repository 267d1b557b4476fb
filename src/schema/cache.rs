//! Metadata Cache (C2): three independent, size-bounded, approximate-LRU
//! caches fronting the schema probe so repeated lookups of the same
//! table are O(1) after the first miss.
//!
//! Built on [`moka`], the Rust analog of Caffeine — bounded capacity,
//! lock-free reads, safe for concurrent exports sharing one connection
//! pool's metadata. A lookup miss runs the corresponding probe and
//! populates the cache before returning; failed probes are never
//! cached, so a transient catalog error doesn't poison later lookups.

use crate::dialect::Dialect;
use crate::error::Result;
use crate::model::{ColumnMetadata, ForeignKeyEdge};
use crate::schema::probe;
use moka::future::Cache;
use sqlx::any::AnyPool;
use std::sync::Arc;

const DEFAULT_CAPACITY: u64 = 10_000;

/// The three metadata caches an export (or a shared pool of exports)
/// can reuse across lookups. Cheap to clone — each field is an `Arc`
/// handle into the same underlying cache.
#[derive(Clone)]
pub struct MetadataCache {
    fk_cache: Cache<String, Arc<Vec<ForeignKeyEdge>>>,
    pk_cache: Cache<String, Arc<Vec<String>>>,
    column_cache: Cache<String, Arc<Vec<ColumnMetadata>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            fk_cache: Cache::new(capacity),
            pk_cache: Cache::new(capacity),
            column_cache: Cache::new(capacity),
        }
    }

    pub async fn foreign_keys_of(
        &self,
        pool: &AnyPool,
        dialect: Dialect,
        table: &str,
    ) -> Result<Arc<Vec<ForeignKeyEdge>>> {
        if let Some(hit) = self.fk_cache.get(table).await {
            return Ok(hit);
        }
        let fresh = Arc::new(probe::foreign_keys_of(pool, dialect, table).await?);
        self.fk_cache.insert(table.to_string(), fresh.clone()).await;
        Ok(fresh)
    }

    pub async fn primary_keys(
        &self,
        pool: &AnyPool,
        dialect: Dialect,
        table: &str,
    ) -> Result<Arc<Vec<String>>> {
        if let Some(hit) = self.pk_cache.get(table).await {
            return Ok(hit);
        }
        let fresh = Arc::new(probe::primary_keys(pool, dialect, table).await?);
        self.pk_cache.insert(table.to_string(), fresh.clone()).await;
        Ok(fresh)
    }

    pub async fn column_metadata(
        &self,
        pool: &AnyPool,
        dialect: Dialect,
        table: &str,
    ) -> Result<Arc<Vec<ColumnMetadata>>> {
        if let Some(hit) = self.column_cache.get(table).await {
            return Ok(hit);
        }
        let fresh = Arc::new(probe::column_metadata(pool, dialect, table).await?);
        self.column_cache
            .insert(table.to_string(), fresh.clone())
            .await;
        Ok(fresh)
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}
