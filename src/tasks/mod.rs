pub(crate) mod enqueue;
pub(crate) mod handlers;
pub(crate) mod job;
pub(crate) mod recovery;
pub(crate) mod scheduler;
pub(crate) mod store;
