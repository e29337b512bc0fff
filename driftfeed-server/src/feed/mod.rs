//! Feed assembly: scoring, profile building, pagination

pub mod assembler;
pub mod profile;
pub mod scorer;

pub use assembler::{FeedAssembler, FeedItem, FeedPage, FeedRequest};
pub use profile::ProfileBuilder;
pub use scorer::{display_score, relevance, score_candidate};
