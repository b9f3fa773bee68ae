mod file_task;
mod text_task;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::types::EntityRef;
use crate::services::ai_grading::ContentService;
use crate::services::storage::ObjectStore;
use crate::tasks::job::{Job, JobPayload};
use crate::tasks::store::{EntityDirectory, ResultCache, StoreError};

/// What the dispatcher should do with a job whose handler returned normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Completed,
    /// Inputs are not ready yet; the job goes back to the queue untouched.
    Deferred { missing: Vec<EntityRef> },
}

#[derive(Debug, Error)]
pub(crate) enum HandlerError {
    #[error("entity {0} not found")]
    MissingEntity(EntityRef),
    #[error("entity {entity} has no extraction rule for role {code:?}")]
    UnknownRole { entity: EntityRef, code: Option<i32> },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("object storage failed: {0:#}")]
    Storage(anyhow::Error),
    #[error("content service failed: {0:#}")]
    Content(anyhow::Error),
    #[error("scratch file error: {0}")]
    Scratch(#[from] std::io::Error),
}

impl HandlerError {
    /// Short label for metrics.
    pub(crate) fn reason(&self) -> &'static str {
        match self {
            Self::MissingEntity(_) => "missing_entity",
            Self::UnknownRole { .. } => "unknown_role",
            Self::Store(_) => "store",
            Self::Storage(_) => "storage",
            Self::Content(_) => "content",
            Self::Scratch(_) => "scratch",
        }
    }
}

#[async_trait]
pub(crate) trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<JobOutcome, HandlerError>;
}

/// Production handler set: file ingestion and grading over the shared result cache.
#[derive(Clone)]
pub(crate) struct GradingHandlers {
    cache: Arc<dyn ResultCache>,
    entities: Arc<dyn EntityDirectory>,
    objects: Arc<dyn ObjectStore>,
    content: Arc<dyn ContentService>,
}

impl GradingHandlers {
    pub(crate) fn new(
        cache: Arc<dyn ResultCache>,
        entities: Arc<dyn EntityDirectory>,
        objects: Arc<dyn ObjectStore>,
        content: Arc<dyn ContentService>,
    ) -> Self {
        Self { cache, entities, objects, content }
    }
}

#[async_trait]
impl JobHandler for GradingHandlers {
    async fn handle(&self, job: &Job) -> Result<JobOutcome, HandlerError> {
        match &job.payload {
            JobPayload::File(task) => file_task::run(self, job.id, task).await,
            JobPayload::Text(task) => text_task::run(self, job.id, task).await,
        }
    }
}
