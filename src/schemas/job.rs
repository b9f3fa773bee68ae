use serde::Serialize;
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, PrimitiveDateTime};

use crate::db::types::{EntityRef, JobKind, TaskType};
use crate::tasks::job::{Job, JobId};

#[derive(Debug, Serialize)]
pub(crate) struct JobResponse {
    pub(crate) id: JobId,
    pub(crate) kind: JobKind,
    pub(crate) running: bool,
    pub(crate) task_type: TaskType,
    pub(crate) files: Vec<EntityRef>,
    pub(crate) prompt_info: Option<Value>,
    pub(crate) result_key: Option<EntityRef>,
    pub(crate) created_at: String,
    pub(crate) available_at: String,
    pub(crate) claimed_at: Option<String>,
}

impl JobResponse {
    pub(crate) fn from_job(job: Job) -> Self {
        Self {
            id: job.id,
            kind: job.kind(),
            running: job.running,
            task_type: job.payload.task_type(),
            files: job.payload.entity_refs(),
            prompt_info: job.payload.prompt_info().cloned(),
            result_key: job.payload.result_key(),
            created_at: format_primitive(job.created_at),
            available_at: format_primitive(job.available_at),
            claimed_at: job.claimed_at.map(format_primitive),
        }
    }
}

fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}
