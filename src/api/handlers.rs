use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::pagination::{PageQuery, PaginatedResponse};
use crate::core::metrics;
use crate::core::state::AppState;
use crate::db::types::JobKind;
use crate::repositories;
use crate::schemas::{HealthResponse, JobResponse};
use crate::tasks::job::JobId;
use crate::tasks::store::{JobFilter, JobStore};

#[derive(Debug, Deserialize)]
pub(crate) struct JobFilterQuery {
    #[serde(default)]
    kind: Option<JobKind>,
    #[serde(default)]
    running: Option<bool>,
}

pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut status = "healthy".to_string();
    let mut components = HashMap::new();

    match repositories::health::ping(state.db()).await {
        Ok(()) => {
            components.insert("database".to_string(), "healthy".to_string());
        }
        Err(err) => {
            components.insert("database".to_string(), format!("unhealthy: {err}"));
            status = "unhealthy".to_string();
        }
    }

    if status == "healthy" {
        match repositories::health::count_running_jobs(state.db()).await {
            Ok(count) => {
                components.insert("running_jobs".to_string(), count.to_string());
            }
            Err(err) => {
                components.insert("running_jobs".to_string(), format!("unknown: {err}"));
                status = "degraded".to_string();
            }
        }
    }

    Json(HealthResponse { service: "grader-queue-worker".to_string(), status, components })
}

pub(crate) async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobFilterQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<JobResponse>>, ApiError> {
    let page = page.validate()?;
    let filter =
        JobFilter { kind: query.kind, running: query.running, limit: page.limit, offset: page.skip };
    let jobs =
        state.store().list(filter).await.map_err(|err| ApiError::internal(err, "Failed to list jobs"))?;
    let total_count =
        state.store().count(filter).await.map_err(|err| ApiError::internal(err, "Failed to count jobs"))?;

    Ok(Json(PaginatedResponse {
        items: jobs.into_iter().map(JobResponse::from_job).collect(),
        total_count,
        skip: page.skip,
        limit: page.limit,
    }))
}

pub(crate) async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state
        .store()
        .find(job_id)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to load job"))?
        .ok_or_else(|| ApiError::NotFound(format!("Job {job_id} not found")))?;

    Ok(Json(JobResponse::from_job(job)))
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
