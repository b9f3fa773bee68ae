use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::core::time::{primitive_after, primitive_now_utc};
use crate::db::models::{FileRecord, JobRow};
use crate::db::types::{EntityRef, JobKind};
use crate::repositories;
use crate::tasks::job::{Job, JobId, JobPayload};

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("job {id} has a malformed payload: {reason}")]
    MalformedJob { id: JobId, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JobFilter {
    pub(crate) kind: Option<JobKind>,
    pub(crate) running: Option<bool>,
    pub(crate) limit: i64,
    pub(crate) offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self { kind: None, running: None, limit: 100, offset: 0 }
    }
}

/// Durable job queue. `running` is the only concurrency gate: a claimed job is invisible to
/// every other claimer until it is completed or reset.
#[async_trait]
pub(crate) trait JobStore: Send + Sync {
    async fn enqueue(&self, payload: &JobPayload) -> Result<JobId, StoreError>;

    /// Marks the oldest queued job of `kind` as running and hands it to this caller only.
    async fn claim_one(&self, kind: JobKind) -> Result<Option<Job>, StoreError>;

    /// Deletes the job. Returns `false` if it was already gone.
    async fn complete(&self, id: JobId) -> Result<bool, StoreError>;

    async fn reset_to_queued(&self, id: JobId) -> Result<bool, StoreError>;

    /// Releases a running job back to the queue, not claimable until `delay` has passed.
    async fn defer(&self, id: JobId, delay: Duration) -> Result<bool, StoreError>;

    async fn reset_all_running_to_queued(&self) -> Result<u64, StoreError>;

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError>;
}

/// Latest derived text per entity reference.
#[async_trait]
pub(crate) trait ResultCache: Send + Sync {
    async fn get(&self, key: EntityRef) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: EntityRef, text: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub(crate) trait EntityDirectory: Send + Sync {
    async fn get_entity(&self, key: EntityRef) -> Result<Option<FileRecord>, StoreError>;
}

#[derive(Debug, Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn find(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        repositories::jobs::find_by_id(&self.pool, id).await?.map(decode_row).transpose()
    }

    pub(crate) async fn count(&self, filter: JobFilter) -> Result<i64, StoreError> {
        Ok(repositories::jobs::count(&self.pool, filter.kind, filter.running).await?)
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn enqueue(&self, payload: &JobPayload) -> Result<JobId, StoreError> {
        let files = payload.entity_refs().iter().map(EntityRef::as_uuid).collect::<Vec<Uuid>>();
        let id = repositories::jobs::insert(
            &self.pool,
            repositories::jobs::NewJob {
                kind: payload.kind(),
                task_type: payload.task_type().code(),
                files: &files,
                prompt_info: payload.prompt_info(),
                result_key: payload.result_key().map(|key| key.as_uuid()),
                created_at: primitive_now_utc(),
            },
        )
        .await?;

        Ok(id)
    }

    async fn claim_one(&self, kind: JobKind) -> Result<Option<Job>, StoreError> {
        repositories::jobs::claim_next(&self.pool, kind, primitive_now_utc())
            .await?
            .map(decode_row)
            .transpose()
    }

    async fn complete(&self, id: JobId) -> Result<bool, StoreError> {
        Ok(repositories::jobs::delete(&self.pool, id).await?)
    }

    async fn reset_to_queued(&self, id: JobId) -> Result<bool, StoreError> {
        Ok(repositories::jobs::reset_to_queued(&self.pool, id, primitive_now_utc()).await?)
    }

    async fn defer(&self, id: JobId, delay: Duration) -> Result<bool, StoreError> {
        let available_at = primitive_after(primitive_now_utc(), delay);
        Ok(repositories::jobs::release_running_until(&self.pool, id, available_at).await?)
    }

    async fn reset_all_running_to_queued(&self) -> Result<u64, StoreError> {
        Ok(repositories::jobs::reset_all_running(&self.pool, primitive_now_utc()).await?)
    }

    async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        repositories::jobs::list(
            &self.pool,
            filter.kind,
            filter.running,
            filter.limit,
            filter.offset,
        )
        .await?
        .into_iter()
        .map(decode_row)
        .collect()
    }
}

#[async_trait]
impl ResultCache for PgStore {
    async fn get(&self, key: EntityRef) -> Result<Option<String>, StoreError> {
        Ok(repositories::file_cache::find_results(&self.pool, key.as_uuid()).await?)
    }

    async fn put(&self, key: EntityRef, text: &str) -> Result<(), StoreError> {
        repositories::file_cache::upsert(&self.pool, key.as_uuid(), text, primitive_now_utc())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EntityDirectory for PgStore {
    async fn get_entity(&self, key: EntityRef) -> Result<Option<FileRecord>, StoreError> {
        Ok(repositories::files::find_by_id(&self.pool, key.as_uuid()).await?)
    }
}

fn decode_row(row: JobRow) -> Result<Job, StoreError> {
    let id = row.id;
    Job::try_from(row).map_err(|reason| StoreError::MalformedJob { id, reason })
}
