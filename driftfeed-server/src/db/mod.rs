//! Database access layer for driftfeed-server

pub mod candidates;
pub mod history;

pub use candidates::CandidateSource;
pub use history::ViewHistoryStore;
