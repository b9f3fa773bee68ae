use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

pub(crate) async fn find_results(pool: &PgPool, id: Uuid) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT results FROM file_cache WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Last writer wins; there is no versioning of cached results.
pub(crate) async fn upsert(
    pool: &PgPool,
    id: Uuid,
    results: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO file_cache (id, results, updated_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (id) DO UPDATE
         SET results = EXCLUDED.results,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(id)
    .bind(results)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}
