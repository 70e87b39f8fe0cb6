//! The report-generation pipeline.
//!
//! Orchestrates extraction, classification, merging, composition and the
//! provider call. All collaborators arrive through [`ReportContext`]; there
//! is no global state, so tests inject a fake commit source and a recording
//! provider without touching anything process-wide.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::classify::Classifier;
use crate::config::RepositoryConfig;
use crate::error::{ExtractError, ReportError};
use crate::git::{CommitSource, DateRange, Extraction};
use crate::provider::{Provider, TokenUsage};
use crate::report;
use crate::timeline::{self, CommitRecord};

/// Tuning knobs for one report run.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Keep noise commits (merges, syncs) in the timeline.
    pub include_noise: bool,
    /// Maximum repositories extracted concurrently.
    pub max_concurrency: usize,
    /// Per-repository extraction timeout, independent of the provider
    /// timeout. An overrun counts as the repository's backend being
    /// unavailable and never stalls the rest of the run.
    pub repo_timeout: Duration,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_noise: false,
            max_concurrency: 4,
            repo_timeout: Duration::from_secs(30),
        }
    }
}

/// Everything one `generate_report` call needs, owned by the caller.
pub struct ReportContext<'a> {
    pub repositories: &'a [RepositoryConfig],
    pub range: DateRange,
    pub source: Arc<dyn CommitSource>,
    pub provider: &'a dyn Provider,
    pub classifier: &'a Classifier,
    pub template: &'a str,
    pub options: ReportOptions,
}

/// A repository-scoped extraction failure, reported but non-fatal.
#[derive(Debug)]
pub struct RepoDiagnostic {
    pub repo: String,
    pub error: ExtractError,
}

/// Outcome of a successful generation run.
#[derive(Debug)]
pub struct ReportResult {
    pub content: String,
    pub usage: TokenUsage,
    /// Commits that made it into the timeline after noise filtering.
    pub commit_count: usize,
    pub diagnostics: Vec<RepoDiagnostic>,
}

/// The composed prompt and extraction stats, before any provider call.
#[derive(Debug)]
pub struct PromptPreview {
    pub prompt: String,
    pub commit_count: usize,
    pub diagnostics: Vec<RepoDiagnostic>,
}

/// Fires the paired [`CancelToken`] when cancelled.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(self) {
        let _ = self.tx.send(true);
    }
}

/// Cancellation signal for an in-flight generation.
///
/// Dropping the handle without cancelling leaves the token quiet forever, so
/// callers that never cancel can use [`CancelToken::never`].
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx })
    }

    /// A token that never fires.
    pub fn never() -> CancelToken {
        let (_, rx) = watch::channel(false);
        CancelToken { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // Sender gone without a cancel: stay pending.
        std::future::pending::<()>().await;
    }
}

/// Run the full pipeline and return the generated report.
///
/// Extraction failures are soft: they land in the diagnostics list while the
/// report is built from the repositories that worked. Template and provider
/// failures are hard and abort the call. Cancellation aborts the in-flight
/// provider call and returns [`ReportError::Cancelled`] with no partial
/// report state.
pub async fn generate_report(
    ctx: &ReportContext<'_>,
    cancel: &CancelToken,
) -> Result<ReportResult, ReportError> {
    let preview = preview_prompt(ctx).await?;

    info!(
        commits = preview.commit_count,
        failed_repos = preview.diagnostics.len(),
        provider = ctx.provider.name(),
        "dispatching generation request"
    );

    let completion = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("generation cancelled, aborting provider call");
            return Err(ReportError::Cancelled);
        }
        result = ctx.provider.send_completion(&preview.prompt) => result?,
    };

    Ok(ReportResult {
        content: completion.content,
        usage: completion.usage,
        commit_count: preview.commit_count,
        diagnostics: preview.diagnostics,
    })
}

/// Everything up to (but excluding) the provider call: validate the
/// template, extract, classify, merge and compose the prompt.
pub async fn preview_prompt(ctx: &ReportContext<'_>) -> Result<PromptPreview, ReportError> {
    // Fail on a bad template before any repository or network work.
    report::validate_template(ctx.template)?;

    let extractions = extract_all(ctx).await;

    let mut diagnostics = Vec::new();
    let mut sequences = Vec::with_capacity(extractions.len());
    for (name, extraction) in extractions {
        if let Some(error) = extraction.error {
            warn!(repo = %name, %error, "repository extraction failed");
            diagnostics.push(RepoDiagnostic {
                repo: name.clone(),
                error,
            });
        }

        let mut commits: Vec<CommitRecord> = extraction
            .commits
            .into_iter()
            .map(|raw| {
                let (kind, noise) = ctx.classifier.classify(&raw.message);
                CommitRecord {
                    repo: name.clone(),
                    hash: raw.hash,
                    author: raw.author,
                    email: raw.email,
                    timestamp: raw.timestamp,
                    message: raw.message,
                    kind,
                    noise,
                }
            })
            .filter(|c| ctx.options.include_noise || !c.noise)
            .collect();
        // The merge requires each input newest-first. History stores mostly
        // report that already, but skewed commit clocks can break it; a
        // stable sort restores the invariant while keeping the store's order
        // within equal timestamps.
        commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sequences.push(commits);
    }

    let merged = timeline::merge_timelines(sequences);
    let commit_log = report::render_commit_log(&merged);
    let prompt = report::render_template(ctx.template, &commit_log)?;

    Ok(PromptPreview {
        prompt,
        commit_count: merged.len(),
        diagnostics,
    })
}

/// Extract all enabled repositories concurrently, bounded by the
/// concurrency limit, collecting results over a channel. Returned in
/// registration order so the merge tie-break is stable regardless of which
/// worker finished first.
async fn extract_all(ctx: &ReportContext<'_>) -> Vec<(String, Extraction)> {
    let enabled: Vec<(usize, RepositoryConfig)> = ctx
        .repositories
        .iter()
        .enumerate()
        .filter(|(_, repo)| repo.enabled)
        .map(|(order, repo)| (order, repo.clone()))
        .collect();

    if enabled.is_empty() {
        return Vec::new();
    }

    let semaphore = Arc::new(Semaphore::new(ctx.options.max_concurrency.max(1)));
    let (tx, mut rx) = mpsc::channel(enabled.len());
    let repo_timeout = ctx.options.repo_timeout;

    for (order, repo) in enabled {
        let source = Arc::clone(&ctx.source);
        let range = ctx.range;
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };

            let name = repo.name.clone();
            let worker = task::spawn_blocking(move || source.extract(&repo, &range));

            let extraction = match timeout(repo_timeout, worker).await {
                Ok(Ok(extraction)) => extraction,
                Ok(Err(join_error)) => {
                    Extraction::failure(ExtractError::BackendUnavailable {
                        repo: name.clone(),
                        detail: format!("extraction worker failed: {join_error}"),
                    })
                }
                Err(_) => Extraction::failure(ExtractError::BackendUnavailable {
                    repo: name.clone(),
                    detail: format!(
                        "extraction timed out after {}s",
                        repo_timeout.as_secs()
                    ),
                }),
            };

            let _ = tx.send((order, name, extraction)).await;
        });
    }
    drop(tx);

    let mut results = Vec::new();
    while let Some(item) = rx.recv().await {
        results.push(item);
    }
    results.sort_by_key(|(order, ..)| *order);
    results
        .into_iter()
        .map(|(_, name, extraction)| (name, extraction))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_token_fires_after_cancel() {
        let (handle, token) = CancelToken::new();
        assert!(!token.is_cancelled());
        handle.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn never_token_stays_quiet() {
        let token = CancelToken::never();
        let fired = timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(fired.is_err());
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn clones_observe_the_same_cancel() {
        let (handle, token) = CancelToken::new();
        let clone = token.clone();
        handle.cancel();
        clone.cancelled().await;
        assert!(token.is_cancelled());
    }
}
