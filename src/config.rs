//! Configuration loading and validation.
//!
//! The config file is YAML. Only the fields the pipeline reads are modelled
//! here; presentation-layer concerns (report persistence, repository
//! discovery) belong to the caller. Everything has a default so a minimal
//! file only needs `repositories` and one provider entry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::{Classifier, CommitKind, NoiseFilter};
use crate::error::ConfigError;
use crate::report;

/// One author-match rule. A commit passes if its author name or email
/// equals any populated field, compared case-insensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthorRule {
    pub fn matches(&self, author_name: &str, author_email: &str) -> bool {
        let name_hit = self
            .name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(author_name));
        let email_hit = self
            .email
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case(author_email));
        name_hit || email_hit
    }
}

/// A registered repository. Registration order (position in the configured
/// list) is the merge tie-break when timestamps collide across repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Empty list passes every author.
    #[serde(default)]
    pub authors: Vec<AuthorRule>,
}

impl RepositoryConfig {
    /// Whether a commit by the given author passes this repository's filter.
    pub fn matches_author(&self, name: &str, email: &str) -> bool {
        self.authors.is_empty() || self.authors.iter().any(|r| r.matches(name, email))
    }
}

/// Supported text-generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    DeepSeek,
    Zhipu,
    Anthropic,
}

impl ProviderKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI GPT",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::Zhipu => "Zhipu GLM",
            ProviderKind::Anthropic => "Claude",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::DeepSeek => "https://api.deepseek.com",
            ProviderKind::Zhipu => "https://open.bigmodel.cn/api/paas/v4",
            ProviderKind::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::Zhipu => "glm-4-flash",
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Zhipu => "zhipu",
            ProviderKind::Anthropic => "anthropic",
        };
        f.write_str(s)
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "zhipu" => Ok(ProviderKind::Zhipu),
            "anthropic" => Ok(ProviderKind::Anthropic),
            _ => Err(format!(
                "Unknown provider '{s}' (expected openai, deepseek, zhipu or anthropic)"
            )),
        }
    }
}

/// Connection settings for one backend. The credential is held as an opaque
/// string and only ever logged masked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default)]
    pub api_key: String,
    /// Model identifier; falls back to the kind's default.
    #[serde(default)]
    pub model: Option<String>,
    /// Endpoint override; falls back to the kind's default.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-call timeout for completion requests, in seconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            model: None,
            base_url: None,
            temperature: default_temperature(),
            timeout_secs: default_provider_timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Report composition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Prompt template; must contain exactly one `{commit_log}` placeholder.
    pub template: String,
    /// Optional system message defining the model's role.
    pub system_prompt: Option<String>,
    /// Keep noise commits (merges, syncs) in the timeline.
    pub include_noise: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            template: report::DEFAULT_TEMPLATE.to_string(),
            system_prompt: Some(report::DEFAULT_SYSTEM_PROMPT.to_string()),
            include_noise: false,
        }
    }
}

/// One keyword-prefix rule for the classifier table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    pub prefix: String,
    pub kind: CommitKind,
}

/// Classifier overrides. Empty collections mean "use the documented default".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub keywords: Vec<KeywordRule>,
    pub noise: NoiseSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub merge_prefixes: Option<Vec<String>>,
    pub trivial_markers: Option<Vec<String>>,
    pub min_length: Option<usize>,
}

impl ClassifierSettings {
    /// Build the classifier, applying overrides over the defaults.
    pub fn build(&self) -> Classifier {
        let noise = NoiseFilter::new(
            self.noise.merge_prefixes.clone(),
            self.noise.trivial_markers.clone(),
            self.noise.min_length,
        );
        if self.keywords.is_empty() {
            Classifier::with_noise(noise)
        } else {
            let rules = self
                .keywords
                .iter()
                .map(|r| (r.prefix.clone(), r.kind))
                .collect();
            Classifier::new(rules, noise)
        }
    }
}

/// Extraction concurrency and timeout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Maximum repositories extracted at once.
    pub max_concurrency: usize,
    /// Per-repository timeout in seconds, independent of the provider timeout.
    pub repo_timeout_secs: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            repo_timeout_secs: 30,
        }
    }
}

impl ExtractionSettings {
    pub fn repo_timeout(&self) -> Duration {
        Duration::from_secs(self.repo_timeout_secs)
    }
}

/// Top-level settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub repositories: Vec<RepositoryConfig>,
    pub active_provider: ProviderKind,
    pub providers: Vec<ProviderConfig>,
    pub report: ReportSettings,
    pub classifier: ClassifierSettings,
    pub extraction: ExtractionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            active_provider: ProviderKind::OpenAi,
            providers: Vec::new(),
            report: ReportSettings::default(),
            classifier: ClassifierSettings::default(),
            extraction: ExtractionSettings::default(),
        }
    }
}

impl Settings {
    /// Load and validate settings from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;

        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseFailed {
                path: path.display().to_string(),
                source,
            })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate everything that can fail before a generation run, so a bad
    /// template is caught at load time rather than at report time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, repo) in self.repositories.iter().enumerate() {
            if repo.name.trim().is_empty() {
                return Err(ConfigError::InvalidRepository {
                    index,
                    reason: "name must not be empty".to_string(),
                });
            }
            if repo.path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidRepository {
                    index,
                    reason: "path must not be empty".to_string(),
                });
            }
        }

        report::validate_template(&self.report.template)?;
        Ok(())
    }

    /// The provider config selected by `active_provider`.
    pub fn active_provider(&self) -> Result<&ProviderConfig, ConfigError> {
        self.providers
            .iter()
            .find(|p| p.kind == self.active_provider)
            .ok_or_else(|| ConfigError::MissingProvider(self.active_provider.to_string()))
    }
}

fn default_true() -> bool {
    true
}

fn default_temperature() -> f32 {
    0.7
}

fn default_provider_timeout() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_rule_matches_name_case_insensitive() {
        let rule = AuthorRule {
            name: Some("Alice".to_string()),
            email: None,
        };
        assert!(rule.matches("alice", "whoever@example.com"));
        assert!(!rule.matches("bob", "alice@example.com"));
    }

    #[test]
    fn author_rule_matches_email() {
        let rule = AuthorRule {
            name: None,
            email: Some("alice@example.com".to_string()),
        };
        assert!(rule.matches("Someone Else", "ALICE@example.com"));
    }

    #[test]
    fn empty_author_list_passes_everyone() {
        let repo = RepositoryConfig {
            name: "backend".to_string(),
            path: PathBuf::from("/tmp/backend"),
            enabled: true,
            authors: Vec::new(),
        };
        assert!(repo.matches_author("anyone", "anyone@example.com"));
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = r#"
repositories:
  - name: backend
    path: /work/backend
  - name: frontend
    path: /work/frontend
    enabled: false
    authors:
      - name: Alice
active_provider: deepseek
providers:
  - kind: deepseek
    api_key: sk-test
"#;

        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.repositories.len(), 2);
        assert!(settings.repositories[0].enabled);
        assert!(!settings.repositories[1].enabled);
        assert_eq!(settings.active_provider, ProviderKind::DeepSeek);

        let provider = settings.active_provider().unwrap();
        assert_eq!(provider.api_key, "sk-test");
        assert_eq!(provider.temperature, 0.7);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn missing_active_provider_is_an_error() {
        let settings = Settings {
            active_provider: ProviderKind::Zhipu,
            providers: vec![ProviderConfig::new(ProviderKind::OpenAi, "key")],
            ..Settings::default()
        };
        assert!(matches!(
            settings.active_provider(),
            Err(ConfigError::MissingProvider(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_template() {
        let settings = Settings {
            report: ReportSettings {
                template: "no placeholder here".to_string(),
                ..ReportSettings::default()
            },
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Template(_))
        ));
    }

    #[test]
    fn provider_kind_round_trips_from_str() {
        for kind in [
            ProviderKind::OpenAi,
            ProviderKind::DeepSeek,
            ProviderKind::Zhipu,
            ProviderKind::Anthropic,
        ] {
            assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
        }
        assert!("gemini".parse::<ProviderKind>().is_err());
    }
}
