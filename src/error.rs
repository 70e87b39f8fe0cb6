//! Error types for retrospect modules using thiserror.

use thiserror::Error;

/// Errors from commit extraction, always scoped to a single repository.
///
/// None of these abort a report run; the pipeline collects them into a
/// per-repository diagnostics list and keeps going with the other
/// repositories.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("'{path}' is not a git repository")]
    RepositoryNotFound { path: String },

    #[error("Permission denied opening repository at '{path}'")]
    AccessDenied { path: String },

    #[error("Git backend failure in '{repo}': {detail}")]
    BackendUnavailable { repo: String, detail: String },
}

/// Errors from prompt template validation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template is missing the '{{commit_log}}' placeholder")]
    MissingPlaceholder,

    #[error("Template contains {0} '{{commit_log}}' placeholders; exactly one is required")]
    DuplicatePlaceholder(usize),
}

/// Errors from text-generation provider calls.
///
/// Every variant carries the provider's display name so diagnostics stay
/// readable when several providers are configured. Calls are never retried:
/// a retried completion could double-charge a paid API call, so failures
/// surface directly.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider}: API key is not configured")]
    MissingCredential { provider: String },

    #[error("{provider}: authentication failed (HTTP {status}): {detail}")]
    Authentication {
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("{provider}: rate limited (HTTP {status}): {detail}")]
    RateLimited {
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("{provider}: backend error (HTTP {status}): {detail}")]
    BackendServer {
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("{provider}: network failure: {detail}")]
    Network { provider: String, detail: String },

    #[error("{provider}: unexpected response shape: {detail}")]
    ResponseShape { provider: String, detail: String },
}

/// Errors from the report-generation pipeline.
///
/// Template and provider failures are run-scoped and abort the call;
/// extraction failures never appear here (they are soft, collected into
/// [`crate::pipeline::RepoDiagnostic`] entries instead).
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Report generation was cancelled")]
    Cancelled,
}

/// Errors from configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Repository entry {index} is invalid: {reason}")]
    InvalidRepository { index: usize, reason: String },

    #[error("No provider config found for active provider '{0}'")]
    MissingProvider(String),

    #[error(transparent)]
    Template(#[from] TemplateError),
}
