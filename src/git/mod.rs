//! Repository access and commit extraction.

pub mod extract;

pub use extract::{
    CommitSource, DateRange, Extraction, GitCommitSource, RawCommit, extract_commits,
};
