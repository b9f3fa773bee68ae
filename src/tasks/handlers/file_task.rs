use crate::db::types::FileRole;
use crate::services::ai_grading::ExtractionPrompt;
use crate::tasks::job::{FileTask, JobId};

use super::{GradingHandlers, HandlerError, JobOutcome};

fn extraction_prompt(role: FileRole) -> Option<ExtractionPrompt> {
    match role {
        FileRole::TeacherKey => Some(ExtractionPrompt::AnswerKey),
        FileRole::StudentResponse => Some(ExtractionPrompt::StudentResponse),
        FileRole::TeacherContext => Some(ExtractionPrompt::GradingContext),
        FileRole::StudentCopy => None,
    }
}

pub(super) async fn run(
    handlers: &GradingHandlers,
    job_id: JobId,
    task: &FileTask,
) -> Result<JobOutcome, HandlerError> {
    let entity = task.file;
    let record = handlers
        .entities
        .get_entity(entity)
        .await?
        .ok_or(HandlerError::MissingEntity(entity))?;

    let prompt = record
        .file_role
        .and_then(FileRole::from_code)
        .and_then(extraction_prompt)
        .ok_or(HandlerError::UnknownRole { entity, code: record.file_role })?;

    tracing::info!(
        job_id,
        entity = %entity,
        ?prompt,
        owner = record.posted_user.as_deref().unwrap_or("-"),
        assignment = ?record.assignment_id,
        "Extracting file"
    );

    // Removed on drop, so every return path below cleans it up.
    let scratch = tempfile::Builder::new().prefix("grader-").suffix(".pdf").tempfile()?;
    handlers
        .objects
        .download_to(&entity.object_key(), scratch.path())
        .await
        .map_err(HandlerError::Storage)?;

    let bytes = tokio::fs::read(scratch.path()).await?;
    let text = handlers
        .content
        .extract(&format!("{entity}.pdf"), bytes, prompt)
        .await
        .map_err(HandlerError::Content)?;

    handlers.cache.put(entity, &text).await?;
    Ok(JobOutcome::Completed)
}
