pub(crate) mod ai_grading;
pub(crate) mod storage;
