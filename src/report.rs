//! Commit-log serialization and prompt template handling.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::error::TemplateError;
use crate::timeline::CommitRecord;

/// The placeholder a prompt template must contain exactly once.
pub const COMMIT_LOG_PLACEHOLDER: &str = "{commit_log}";

/// Default prompt template used when the config does not override it.
pub const DEFAULT_TEMPLATE: &str = "\
Task: write a work report from the commit log below.

Guidelines:
1. Group related work by project or theme rather than listing commits.
2. Describe outcomes and impact, not the literal commit messages.
3. Keep the report under 500 words, as short Markdown sections.

{commit_log}
";

/// Default system message defining the model's role.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an experienced engineering lead who turns technical work into clear, \
professional reports. Be concise and highlight what matters to stakeholders.";

/// Check that a template contains exactly one placeholder occurrence.
///
/// Run at config-load time as well as before every generation, so a broken
/// template never reaches a provider call.
pub fn validate_template(template: &str) -> Result<(), TemplateError> {
    match template.matches(COMMIT_LOG_PLACEHOLDER).count() {
        0 => Err(TemplateError::MissingPlaceholder),
        1 => Ok(()),
        n => Err(TemplateError::DuplicatePlaceholder(n)),
    }
}

/// Substitute the serialized commit log into the template.
pub fn render_template(template: &str, commit_log: &str) -> Result<String, TemplateError> {
    validate_template(template)?;
    Ok(template.replacen(COMMIT_LOG_PLACEHOLDER, commit_log, 1))
}

/// Serialize a timeline into the text block handed to the provider: a small
/// statistics header followed by one line per commit, in timeline order.
pub fn render_commit_log(timeline: &[CommitRecord]) -> String {
    if timeline.is_empty() {
        return "No commits were found in the selected period.".to_string();
    }

    let repos: BTreeSet<&str> = timeline.iter().map(|c| c.repo.as_str()).collect();
    let mut lines = vec![format!(
        "Commit summary: {} commits across {} repositories ({})",
        timeline.len(),
        repos.len(),
        repos.into_iter().collect::<Vec<_>>().join(", ")
    )];

    let counts = kind_counts(timeline);
    if !counts.is_empty() {
        lines.push(counts.join(", "));
    }
    lines.push(String::new());

    for commit in timeline {
        lines.push(format!(
            "[{}] [{}] {}: {}",
            commit.timestamp.format("%Y-%m-%d"),
            commit.repo,
            commit.author,
            subject_of(&commit.message),
        ));
    }

    lines.join("\n")
}

fn kind_counts(timeline: &[CommitRecord]) -> Vec<String> {
    crate::classify::CommitKind::ALL
        .iter()
        .filter_map(|kind| {
            let count = timeline.iter().filter(|c| c.kind == *kind).count();
            (count > 0).then(|| format!("{}: {}", kind.as_str(), count))
        })
        .collect()
}

/// First line of the message with any conventional `type(scope):` prefix
/// stripped, so the model reads the actual change description.
fn subject_of(message: &str) -> String {
    static PREFIX: OnceLock<regex_lite::Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| {
        regex_lite::Regex::new(r"^\w+(\([^)]*\))?!?:\s*")
            .unwrap_or_else(|e| panic!("invalid subject prefix pattern: {e}"))
    });

    let first_line = message.lines().next().unwrap_or("").trim();
    prefix.replace(first_line, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::CommitKind;
    use chrono::TimeZone;

    fn record(repo: &str, message: &str, kind: CommitKind, ts: i64) -> CommitRecord {
        CommitRecord {
            repo: repo.to_string(),
            hash: format!("{ts:040x}"),
            author: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            timestamp: chrono::Utc.timestamp_opt(ts, 0).unwrap(),
            message: message.to_string(),
            kind,
            noise: false,
        }
    }

    #[test]
    fn default_template_is_valid() {
        assert!(validate_template(DEFAULT_TEMPLATE).is_ok());
    }

    #[test]
    fn template_without_placeholder_fails() {
        assert_eq!(
            validate_template("write a report"),
            Err(TemplateError::MissingPlaceholder)
        );
    }

    #[test]
    fn template_with_two_placeholders_fails() {
        assert_eq!(
            validate_template("{commit_log} and again {commit_log}"),
            Err(TemplateError::DuplicatePlaceholder(2))
        );
    }

    #[test]
    fn render_substitutes_once() {
        let out = render_template("before {commit_log} after", "LOG").unwrap();
        assert_eq!(out, "before LOG after");
    }

    #[test]
    fn commit_log_contains_label_author_date_and_subject() {
        let timeline = vec![record(
            "backend",
            "feat(api): add export endpoint",
            CommitKind::Feat,
            86_400,
        )];

        let log = render_commit_log(&timeline);

        assert!(log.contains("Commit summary: 1 commits across 1 repositories (backend)"));
        assert!(log.contains("feat: 1"));
        assert!(log.contains("[1970-01-02] [backend] Alice: add export endpoint"));
        // The conventional prefix is stripped from the rendered line.
        assert!(!log.contains("feat(api):"));
    }

    #[test]
    fn commit_log_preserves_timeline_order() {
        let timeline = vec![
            record("a", "feat: newest", CommitKind::Feat, 300),
            record("b", "fix: older", CommitKind::Fix, 200),
            record("a", "chore: oldest", CommitKind::Chore, 100),
        ];

        let log = render_commit_log(&timeline);
        let newest = log.find("newest").unwrap();
        let older = log.find("older").unwrap();
        let oldest = log.find("oldest").unwrap();
        assert!(newest < older && older < oldest);
    }

    #[test]
    fn empty_timeline_renders_a_notice() {
        let log = render_commit_log(&[]);
        assert!(log.contains("No commits"));
    }
}
