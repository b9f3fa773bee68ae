use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::JobRow;
use crate::db::types::JobKind;

pub(crate) const COLUMNS: &str = "\
    id, kind, is_running, task_type, files, prompt_info, result_key, \
    created_at, available_at, claimed_at";

const RETURNING_COLUMNS: &str = "\
    jobs.id, jobs.kind, jobs.is_running, jobs.task_type, jobs.files, jobs.prompt_info, \
    jobs.result_key, jobs.created_at, jobs.available_at, jobs.claimed_at";

#[derive(Debug, Clone)]
pub(crate) struct NewJob<'a> {
    pub(crate) kind: JobKind,
    pub(crate) task_type: i32,
    pub(crate) files: &'a [Uuid],
    pub(crate) prompt_info: Option<&'a Value>,
    pub(crate) result_key: Option<Uuid>,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn insert(pool: &PgPool, job: NewJob<'_>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO jobs (kind, is_running, task_type, files, prompt_info, result_key,
                           created_at, available_at)
         VALUES ($1, FALSE, $2, $3, $4, $5, $6, $6)
         RETURNING id",
    )
    .bind(job.kind)
    .bind(job.task_type)
    .bind(job.files)
    .bind(job.prompt_info.map(Json))
    .bind(job.result_key)
    .bind(job.created_at)
    .fetch_one(pool)
    .await
}

/// Claims the oldest eligible job of `kind`. Rows locked by a concurrent claimer are
/// skipped rather than waited on.
pub(crate) async fn claim_next(
    pool: &PgPool,
    kind: JobKind,
    now: PrimitiveDateTime,
) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(&format!(
        "WITH candidate AS (
            SELECT id
            FROM jobs
            WHERE kind = $1
              AND is_running = FALSE
              AND available_at <= $2
            ORDER BY id
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        UPDATE jobs
        SET is_running = TRUE,
            claimed_at = $2
        FROM candidate
        WHERE jobs.id = candidate.id
        RETURNING {RETURNING_COLUMNS}"
    ))
    .bind(kind)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let deleted = sqlx::query("DELETE FROM jobs WHERE id = $1").bind(id).execute(pool).await?;
    Ok(deleted.rows_affected() > 0)
}

pub(crate) async fn reset_to_queued(
    pool: &PgPool,
    id: i64,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE jobs
         SET is_running = FALSE,
             claimed_at = NULL,
             available_at = $2
         WHERE id = $1",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn release_running_until(
    pool: &PgPool,
    id: i64,
    available_at: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE jobs
         SET is_running = FALSE,
             claimed_at = NULL,
             available_at = $2
         WHERE id = $1 AND is_running = TRUE",
    )
    .bind(id)
    .bind(available_at)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() > 0)
}

pub(crate) async fn reset_all_running(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE jobs
         SET is_running = FALSE,
             claimed_at = NULL,
             available_at = $1
         WHERE is_running = TRUE",
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected())
}

pub(crate) async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(&format!("SELECT {COLUMNS} FROM jobs WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list(
    pool: &PgPool,
    kind: Option<JobKind>,
    running: Option<bool>,
    limit: i64,
    offset: i64,
) -> Result<Vec<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {COLUMNS}
         FROM jobs
         WHERE ($1::jobkind IS NULL OR kind = $1)
           AND ($2::boolean IS NULL OR is_running = $2)
         ORDER BY id
         LIMIT $3 OFFSET $4"
    ))
    .bind(kind)
    .bind(running)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count(
    pool: &PgPool,
    kind: Option<JobKind>,
    running: Option<bool>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)
         FROM jobs
         WHERE ($1::jobkind IS NULL OR kind = $1)
           AND ($2::boolean IS NULL OR is_running = $2)",
    )
    .bind(kind)
    .bind(running)
    .fetch_one(pool)
    .await
}
