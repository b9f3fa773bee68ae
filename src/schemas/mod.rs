use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod job;

pub(crate) use job::JobResponse;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}
