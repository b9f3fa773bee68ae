use serde_json::Value;
use thiserror::Error;

use crate::db::types::{EntityRef, JobKind, TaskType};
use crate::tasks::job::{FileTask, JobId, JobPayload, TextTask};
use crate::tasks::store::{JobStore, StoreError};

#[derive(Debug, Error)]
pub(crate) enum EnqueueError {
    #[error("{kind} task needs {expected} references, got {got}")]
    References { kind: JobKind, expected: &'static str, got: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Handle returned to producers of grading work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EnqueuedText {
    pub(crate) job_id: JobId,
    /// Where the report will appear in the result cache.
    pub(crate) result_key: EntityRef,
}

pub(crate) async fn enqueue_file_task(
    store: &dyn JobStore,
    task_type: TaskType,
    files: &[EntityRef],
) -> Result<JobId, EnqueueError> {
    let [file] = files else {
        return Err(EnqueueError::References {
            kind: JobKind::File,
            expected: "exactly 1",
            got: files.len(),
        });
    };

    let job_id = store.enqueue(&JobPayload::File(FileTask { task_type, file: *file })).await?;
    tracing::info!(job_id, entity = %file, "Enqueued file task");
    Ok(job_id)
}

/// Enqueues grading of `files[0]` (response) against `files[1]` (key), with any further
/// references passed along as grading context.
pub(crate) async fn enqueue_text_task(
    store: &dyn JobStore,
    task_type: TaskType,
    files: &[EntityRef],
    prompt_info: Value,
) -> Result<EnqueuedText, EnqueueError> {
    let [response, key, context @ ..] = files else {
        return Err(EnqueueError::References {
            kind: JobKind::Text,
            expected: "at least 2",
            got: files.len(),
        });
    };

    let result_key = EntityRef::new_random();
    let job_id = store
        .enqueue(&JobPayload::Text(TextTask {
            task_type,
            response: *response,
            key: *key,
            context: context.to_vec(),
            result_key,
            prompt_info,
        }))
        .await?;

    tracing::info!(job_id, result_key = %result_key, references = files.len(), "Enqueued text task");
    Ok(EnqueuedText { job_id, result_key })
}
