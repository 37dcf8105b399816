use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::is_unique_violation;
use crate::errors::AppError;
use crate::models::watch::Watch;

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn find_by_user(&self, user_id: i64) -> Result<Option<Watch>, AppError>;

    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Watch>, AppError>;

    /// Conflict when the user or the device is already registered.
    async fn register(&self, user_id: i64, uuid: &str, model_name: &str)
        -> Result<Watch, AppError>;

    async fn delete_for_user(&self, user_id: i64) -> Result<bool, AppError>;
}

const WATCH_COLUMNS: &str = "id, user_id, uuid, model_name, created_at";

#[derive(Clone)]
pub struct PgDeviceRepository {
    pool: PgPool,
}

impl PgDeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRepository for PgDeviceRepository {
    async fn find_by_user(&self, user_id: i64) -> Result<Option<Watch>, AppError> {
        let watch = sqlx::query_as(&format!(
            "SELECT {WATCH_COLUMNS} FROM watches WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(watch)
    }

    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Watch>, AppError> {
        let watch = sqlx::query_as(&format!(
            "SELECT {WATCH_COLUMNS} FROM watches WHERE uuid = $1"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(watch)
    }

    async fn register(
        &self,
        user_id: i64,
        uuid: &str,
        model_name: &str,
    ) -> Result<Watch, AppError> {
        let result = sqlx::query_as(&format!(
            "INSERT INTO watches (user_id, uuid, model_name) VALUES ($1, $2, $3) \
             RETURNING {WATCH_COLUMNS}"
        ))
        .bind(user_id)
        .bind(uuid)
        .bind(model_name)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(watch) => Ok(watch),
            Err(err) if is_unique_violation(&err) => Err(AppError::Conflict(
                "a device is already registered".into(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_for_user(&self, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM watches WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
