pub mod cache;
pub mod fetch;
pub mod inflight;
pub mod listing;
pub mod queue;
pub mod scheduler;
pub mod sequence;
