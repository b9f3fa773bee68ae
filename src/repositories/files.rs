use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::FileRecord;

pub(crate) async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<FileRecord>, sqlx::Error> {
    sqlx::query_as::<_, FileRecord>(
        "SELECT posted_user, file_role, assignment_id
         FROM files
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
