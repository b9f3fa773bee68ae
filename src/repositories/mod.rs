pub(crate) mod file_cache;
pub(crate) mod files;
pub(crate) mod health;
pub(crate) mod jobs;
