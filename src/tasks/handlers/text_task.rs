use crate::services::ai_grading::GradeRequest;
use crate::tasks::job::{JobId, TextTask};

use super::{GradingHandlers, HandlerError, JobOutcome};

pub(super) async fn run(
    handlers: &GradingHandlers,
    job_id: JobId,
    task: &TextTask,
) -> Result<JobOutcome, HandlerError> {
    let response_text = handlers.cache.get(task.response).await?;
    let key_text = handlers.cache.get(task.key).await?;

    let (response_text, key_text) = match (response_text, key_text) {
        (Some(response_text), Some(key_text)) => (response_text, key_text),
        (response_text, key_text) => {
            let missing = [(task.response, response_text.is_none()), (task.key, key_text.is_none())]
                .into_iter()
                .filter_map(|(entity, missing)| missing.then_some(entity))
                .collect();
            return Ok(JobOutcome::Deferred { missing });
        }
    };

    let mut context_texts = Vec::with_capacity(task.context.len());
    for entity in &task.context {
        match handlers.cache.get(*entity).await? {
            Some(text) => context_texts.push(text),
            None => tracing::warn!(job_id, entity = %entity, "Grading context not extracted; skipping"),
        }
    }

    let report = handlers
        .content
        .grade(GradeRequest {
            response_text,
            key_text,
            context_texts,
            notes: task.notes().map(str::to_string),
            job_id: Some(job_id),
        })
        .await
        .map_err(HandlerError::Content)?;

    handlers.cache.put(task.result_key, &report).await?;
    tracing::info!(job_id, result_key = %task.result_key, "Grading report cached");
    Ok(JobOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::db::types::EntityRef;
    use crate::tasks::handlers::{HandlerError, JobHandler, JobOutcome};
    use crate::tasks::job::JobPayload;
    use crate::test_support::{self, HandlerHarness};

    #[tokio::test]
    async fn missing_key_text_defers_without_writing() {
        let harness = HandlerHarness::new();
        let response = EntityRef::new_random();
        let key = EntityRef::new_random();
        harness.store.seed_cache(response, "STU-TEXT");
        let payload = test_support::text_payload(response, key);
        let result_key = payload.result_key().expect("result key");
        let job = test_support::claimed(11, payload);

        let outcome = harness.handlers.handle(&job).await.expect("handle");

        assert_eq!(outcome, JobOutcome::Deferred { missing: vec![key] });
        assert_eq!(harness.store.cached(result_key), None);
        assert_eq!(harness.store.cache_writes(), 0);
        assert_eq!(harness.content.grade_requests().len(), 0);
    }

    #[tokio::test]
    async fn both_missing_are_reported_in_order() {
        let harness = HandlerHarness::new();
        let response = EntityRef::new_random();
        let key = EntityRef::new_random();
        let job = test_support::claimed(12, test_support::text_payload(response, key));

        let outcome = harness.handlers.handle(&job).await.expect("handle");

        assert_eq!(outcome, JobOutcome::Deferred { missing: vec![response, key] });
    }

    #[tokio::test]
    async fn grades_with_context_and_notes() {
        let harness = HandlerHarness::new();
        let response = EntityRef::new_random();
        let key = EntityRef::new_random();
        let context = EntityRef::new_random();
        let pending_context = EntityRef::new_random();
        harness.store.seed_cache(response, "STU-TEXT");
        harness.store.seed_cache(key, "KEY-TEXT");
        harness.store.seed_cache(context, "CTX-TEXT");

        let mut payload = test_support::text_payload(response, key);
        if let JobPayload::Text(task) = &mut payload {
            task.context = vec![context, pending_context];
            task.prompt_info = json!({"notes": "  Partial credit allowed.  "});
        }
        let result_key = payload.result_key().expect("result key");
        let job = test_support::claimed(13, payload);

        let outcome = harness.handlers.handle(&job).await.expect("handle");

        assert_eq!(outcome, JobOutcome::Completed);
        assert_eq!(harness.store.cached(result_key).as_deref(), Some("REPORT"));
        let requests = harness.content.grade_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].response_text, "STU-TEXT");
        assert_eq!(requests[0].key_text, "KEY-TEXT");
        assert_eq!(requests[0].context_texts, vec!["CTX-TEXT".to_string()]);
        assert_eq!(requests[0].notes.as_deref(), Some("Partial credit allowed."));
        assert_eq!(requests[0].job_id, Some(13));
    }

    #[tokio::test]
    async fn grading_failure_is_an_error_and_writes_nothing() {
        let harness = HandlerHarness::new();
        let response = EntityRef::new_random();
        let key = EntityRef::new_random();
        harness.store.seed_cache(response, "STU-TEXT");
        harness.store.seed_cache(key, "KEY-TEXT");
        harness.content.fail_grade(true);
        let job = test_support::claimed(14, test_support::text_payload(response, key));

        let result = harness.handlers.handle(&job).await;

        assert!(matches!(result, Err(HandlerError::Content(_))));
        assert_eq!(harness.store.cache_writes(), 0);
    }
}
