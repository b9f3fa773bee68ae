use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::types::JobKind;

#[derive(Debug, Clone, FromRow)]
pub(crate) struct JobRow {
    pub(crate) id: i64,
    pub(crate) kind: JobKind,
    pub(crate) is_running: bool,
    pub(crate) task_type: i32,
    pub(crate) files: Vec<Uuid>,
    pub(crate) prompt_info: Option<Json<Value>>,
    pub(crate) result_key: Option<Uuid>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) available_at: PrimitiveDateTime,
    pub(crate) claimed_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct FileRecord {
    pub(crate) posted_user: Option<String>,
    pub(crate) file_role: Option<i32>,
    pub(crate) assignment_id: Option<Uuid>,
}
