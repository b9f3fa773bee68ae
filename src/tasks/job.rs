use serde_json::Value;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::JobRow;
use crate::db::types::{EntityRef, JobKind, TaskType};

pub(crate) type JobId = i64;

/// Ingest one uploaded file: extract its text and cache it under the file's reference.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FileTask {
    pub(crate) task_type: TaskType,
    pub(crate) file: EntityRef,
}

/// Grade a student response against an answer key.
///
/// References are ordered: response first, key second, then any extra grading context.
/// The report is cached under `result_key`, which the producer picks at enqueue time so it
/// can look the report up later.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextTask {
    pub(crate) task_type: TaskType,
    pub(crate) response: EntityRef,
    pub(crate) key: EntityRef,
    pub(crate) context: Vec<EntityRef>,
    pub(crate) result_key: EntityRef,
    pub(crate) prompt_info: Value,
}

impl TextTask {
    pub(crate) fn notes(&self) -> Option<&str> {
        self.prompt_info
            .get("notes")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JobPayload {
    File(FileTask),
    Text(TextTask),
}

impl JobPayload {
    pub(crate) fn kind(&self) -> JobKind {
        match self {
            Self::File(_) => JobKind::File,
            Self::Text(_) => JobKind::Text,
        }
    }

    pub(crate) fn task_type(&self) -> TaskType {
        match self {
            Self::File(task) => task.task_type,
            Self::Text(task) => task.task_type,
        }
    }

    /// Ordered references as persisted in `jobs.files`.
    pub(crate) fn entity_refs(&self) -> Vec<EntityRef> {
        match self {
            Self::File(task) => vec![task.file],
            Self::Text(task) => {
                let mut refs = Vec::with_capacity(task.context.len() + 2);
                refs.push(task.response);
                refs.push(task.key);
                refs.extend(task.context.iter().copied());
                refs
            }
        }
    }

    pub(crate) fn prompt_info(&self) -> Option<&Value> {
        match self {
            Self::File(_) => None,
            Self::Text(task) => Some(&task.prompt_info),
        }
    }

    pub(crate) fn result_key(&self) -> Option<EntityRef> {
        match self {
            Self::File(_) => None,
            Self::Text(task) => Some(task.result_key),
        }
    }

    pub(crate) fn from_parts(
        kind: JobKind,
        task_type: i32,
        files: &[Uuid],
        prompt_info: Option<Value>,
        result_key: Option<Uuid>,
    ) -> Result<Self, String> {
        let task_type =
            TaskType::from_code(task_type).ok_or_else(|| format!("unknown task type {task_type}"))?;

        match kind {
            JobKind::File => match files {
                [file] => Ok(Self::File(FileTask { task_type, file: EntityRef::from(*file) })),
                _ => Err(format!("file task expects exactly one reference, got {}", files.len())),
            },
            JobKind::Text => {
                let [response, key, context @ ..] = files else {
                    return Err(format!(
                        "text task expects at least two references, got {}",
                        files.len()
                    ));
                };
                let result_key = result_key.ok_or_else(|| "text task has no result key".to_string())?;

                Ok(Self::Text(TextTask {
                    task_type,
                    response: EntityRef::from(*response),
                    key: EntityRef::from(*key),
                    context: context.iter().copied().map(EntityRef::from).collect(),
                    result_key: EntityRef::from(result_key),
                    prompt_info: prompt_info.unwrap_or(Value::Null),
                }))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) running: bool,
    pub(crate) payload: JobPayload,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) available_at: PrimitiveDateTime,
    pub(crate) claimed_at: Option<PrimitiveDateTime>,
}

impl Job {
    pub(crate) fn kind(&self) -> JobKind {
        self.payload.kind()
    }
}

impl TryFrom<JobRow> for Job {
    type Error = String;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let payload = JobPayload::from_parts(
            row.kind,
            row.task_type,
            &row.files,
            row.prompt_info.map(|value| value.0),
            row.result_key,
        )?;

        Ok(Self {
            id: row.id,
            running: row.is_running,
            payload,
            created_at: row.created_at,
            available_at: row.available_at,
            claimed_at: row.claimed_at,
        })
    }
}
