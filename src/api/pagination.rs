use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;

const MAX_LIMIT: i64 = 500;

const fn default_limit() -> i64 {
    100
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "default_limit")]
    pub(crate) limit: i64,
}

impl PageQuery {
    pub(crate) fn validate(self) -> Result<Self, ApiError> {
        if self.skip < 0 {
            return Err(ApiError::BadRequest("skip must be non-negative".to_string()));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(ApiError::BadRequest(format!("limit must be between 1 and {MAX_LIMIT}")));
        }
        Ok(self)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PaginatedResponse<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total_count: i64,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}
