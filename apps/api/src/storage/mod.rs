//! Object storage and key-value seams.
//!
//! `ObjectStore` is backed by S3/MinIO in production and `KeyValueStore` by
//! Redis. Both are carried as `Arc<dyn _>` so services can be exercised with
//! in-memory stores in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::AppError;

pub mod redis_kv;
pub mod s3;
pub mod ticket;

pub use ticket::{Ticketing, UploadTicket};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Time-limited presigned PUT URL for `key`.
    async fn presign_upload(&self, key: &str, ttl: Duration) -> Result<String, AppError>;

    /// Time-limited presigned GET URL for `key`.
    async fn presign_download(&self, key: &str, ttl: Duration) -> Result<String, AppError>;

    /// `Ok(false)` only when the provider answers "not found".
    async fn head_object(&self, key: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;

    /// Stores the value only if the key is absent. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, AppError>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, AppError>;
}
