//! Per-repository commit extraction.
//!
//! Extraction is deliberately forgiving: every failure is scoped to the one
//! repository it came from and returned alongside whatever commits were
//! already produced, so one broken checkout never takes down a whole report.

use chrono::{DateTime, TimeZone, Utc};
use git2::{ErrorCode, Repository, Revwalk, Sort};
use tracing::debug;

use crate::config::RepositoryConfig;
use crate::error::ExtractError;

/// Closed time interval `[since, until]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl DateRange {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }

    /// The window ending now and reaching back `days` days.
    pub fn last_days(days: u32) -> Self {
        let until = Utc::now();
        let since = until - chrono::Duration::days(i64::from(days));
        Self { since, until }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.since && instant <= self.until
    }
}

/// An extracted commit, not yet classified.
#[derive(Debug, Clone)]
pub struct RawCommit {
    pub hash: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Extraction outcome for one repository: the commits that were produced,
/// plus the error that cut the walk short, if any.
#[derive(Debug, Default)]
pub struct Extraction {
    pub commits: Vec<RawCommit>,
    pub error: Option<ExtractError>,
}

impl Extraction {
    pub fn failure(error: ExtractError) -> Self {
        Self {
            commits: Vec::new(),
            error: Some(error),
        }
    }
}

/// Source of commit history for one repository.
///
/// The pipeline talks to extraction only through this trait so tests can
/// substitute a fake without touching the filesystem.
pub trait CommitSource: Send + Sync {
    fn extract(&self, repo: &RepositoryConfig, range: &DateRange) -> Extraction;
}

/// The real source, backed by libgit2.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCommitSource;

impl CommitSource for GitCommitSource {
    fn extract(&self, repo: &RepositoryConfig, range: &DateRange) -> Extraction {
        extract_commits(repo, range)
    }
}

/// Extract commits from one repository within the window, most recent first,
/// applying the repository's author filter.
pub fn extract_commits(config: &RepositoryConfig, range: &DateRange) -> Extraction {
    let repo = match open_repository(config) {
        Ok(repo) => repo,
        Err(error) => return Extraction::failure(error),
    };

    let walk = match CommitWalk::new(&repo, config, range) {
        Ok(Some(walk)) => walk,
        // Empty repository: no commits is a valid answer, not an error.
        Ok(None) => return Extraction::default(),
        Err(error) => return Extraction::failure(error),
    };

    let mut commits = Vec::new();
    for item in walk {
        match item {
            Ok(commit) => commits.push(commit),
            Err(error) => {
                return Extraction {
                    commits,
                    error: Some(error),
                };
            }
        }
    }

    debug!(repo = %config.name, commits = commits.len(), "extraction complete");
    Extraction {
        commits,
        error: None,
    }
}

fn open_repository(config: &RepositoryConfig) -> Result<Repository, ExtractError> {
    let display = config.path.display().to_string();

    match std::fs::metadata(&config.path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExtractError::RepositoryNotFound { path: display });
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::AccessDenied { path: display });
        }
        _ => {}
    }

    Repository::open(&config.path).map_err(|e| match e.code() {
        ErrorCode::NotFound => ExtractError::RepositoryNotFound { path: display },
        _ if e.class() == git2::ErrorClass::Os => ExtractError::AccessDenied { path: display },
        _ => backend_error(config, e),
    })
}

fn backend_error(config: &RepositoryConfig, e: git2::Error) -> ExtractError {
    ExtractError::BackendUnavailable {
        repo: config.name.clone(),
        detail: e.message().to_string(),
    }
}

/// Lazy walk over a repository's history, newest first, restricted to the
/// window and the author filter. Restartable by constructing a new walk.
struct CommitWalk<'a> {
    repo: &'a Repository,
    revwalk: Revwalk<'a>,
    config: &'a RepositoryConfig,
    range: DateRange,
    done: bool,
}

impl<'a> CommitWalk<'a> {
    /// Returns `Ok(None)` for repositories with no history (unborn HEAD).
    fn new(
        repo: &'a Repository,
        config: &'a RepositoryConfig,
        range: &DateRange,
    ) -> Result<Option<Self>, ExtractError> {
        match repo.head() {
            Ok(_) => {}
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(None);
            }
            Err(e) => return Err(backend_error(config, e)),
        }

        let mut revwalk = repo.revwalk().map_err(|e| backend_error(config, e))?;
        revwalk.push_head().map_err(|e| backend_error(config, e))?;
        revwalk
            .set_sorting(Sort::TIME)
            .map_err(|e| backend_error(config, e))?;

        Ok(Some(Self {
            repo,
            revwalk,
            config,
            range: *range,
            done: false,
        }))
    }
}

impl Iterator for CommitWalk<'_> {
    type Item = Result<RawCommit, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let oid = match self.revwalk.next()? {
                Ok(oid) => oid,
                Err(e) => {
                    self.done = true;
                    return Some(Err(backend_error(self.config, e)));
                }
            };

            let commit = match self.repo.find_commit(oid) {
                Ok(commit) => commit,
                Err(e) => {
                    self.done = true;
                    return Some(Err(backend_error(self.config, e)));
                }
            };

            let timestamp = Utc
                .timestamp_opt(commit.time().seconds(), 0)
                .single()
                .unwrap_or(DateTime::<Utc>::MIN_UTC);

            if timestamp > self.range.until {
                continue;
            }
            // The walk is time-sorted, so the first commit before the window
            // start ends the traversal.
            if timestamp < self.range.since {
                self.done = true;
                return None;
            }

            let author = commit.author();
            let name = author.name().unwrap_or("").to_string();
            let email = author.email().unwrap_or("").to_string();
            if !self.config.matches_author(&name, &email) {
                continue;
            }

            let message = commit.message().unwrap_or("").trim().to_string();
            return Some(Ok(RawCommit {
                hash: oid.to_string(),
                author: name,
                email,
                timestamp,
                message,
            }));
        }
    }
}
