//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use git2::{Oid, Repository, Signature, Time};
use retrospect::config::RepositoryConfig;
use retrospect::git::DateRange;

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        Self { dir, repo }
    }

    /// Create a commit with the given message at the current time.
    pub fn commit(&self, message: &str) -> Oid {
        let sig = Signature::now("Test User", "test@example.com")
            .expect("Failed to create signature");
        self.commit_with(&sig, message)
    }

    /// Create a commit with an explicit author name and email.
    pub fn commit_by(&self, name: &str, email: &str, message: &str) -> Oid {
        let sig = Signature::now(name, email).expect("Failed to create signature");
        self.commit_with(&sig, message)
    }

    /// Create a commit with a fixed timestamp (seconds since the epoch).
    pub fn commit_at(&self, message: &str, epoch_secs: i64) -> Oid {
        let sig = Signature::new(
            "Test User",
            "test@example.com",
            &Time::new(epoch_secs, 0),
        )
        .expect("Failed to create signature");
        self.commit_with(&sig, message)
    }

    /// Create a commit with explicit author and timestamp.
    pub fn commit_full(&self, name: &str, email: &str, message: &str, epoch_secs: i64) -> Oid {
        let sig = Signature::new(name, email, &Time::new(epoch_secs, 0))
            .expect("Failed to create signature");
        self.commit_with(&sig, message)
    }

    fn commit_with(&self, sig: &Signature<'_>, message: &str) -> Oid {
        // Create or update a file to have something to commit
        let file_path = self.dir.path().join("test.txt");
        let content = format!(
            "{}\n{}",
            message,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        std::fs::write(&file_path, content).expect("Failed to write test file");

        let mut index = self.repo.index().expect("Failed to get index");
        index
            .add_path(std::path::Path::new("test.txt"))
            .expect("Failed to add file");
        index.write().expect("Failed to write index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), sig, sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }
}

/// Repository config pointing at a test repo, passing all authors.
pub fn repo_config(name: &str, repo: &TestRepo) -> RepositoryConfig {
    RepositoryConfig {
        name: name.to_string(),
        path: repo.dir.path().to_path_buf(),
        enabled: true,
        authors: Vec::new(),
    }
}

/// Closed window between two epoch timestamps.
pub fn range(since_secs: i64, until_secs: i64) -> DateRange {
    DateRange::new(at(since_secs), at(until_secs))
}

pub fn at(epoch_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(epoch_secs, 0).unwrap()
}
