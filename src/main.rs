//! retrospect - CLI entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use retrospect::config::{ProviderKind, Settings};
use retrospect::error::ReportError;
use retrospect::git::{DateRange, GitCommitSource};
use retrospect::pipeline::{self, CancelToken, RepoDiagnostic, ReportContext, ReportOptions};
use retrospect::provider;

/// Generate AI work reports from git commit history across repositories.
#[derive(Parser, Debug)]
#[command(name = "retrospect")]
#[command(about = "Generate AI work reports from git commit history across repositories")]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = "retrospect.yml")]
    config: PathBuf,

    /// Start of the report window (YYYY-MM-DD, inclusive)
    #[arg(long)]
    since: Option<NaiveDate>,

    /// End of the report window (YYYY-MM-DD, inclusive; defaults to now)
    #[arg(long)]
    until: Option<NaiveDate>,

    /// Window length in days when --since is not given
    #[arg(long, default_value_t = 7)]
    days: u32,

    /// Override the active provider from the config
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Keep merge/sync noise commits in the report
    #[arg(long)]
    include_noise: bool,

    /// Print the composed prompt without calling the provider
    #[arg(long)]
    dry_run: bool,

    /// Check provider credentials and reachability, then exit
    #[arg(long)]
    test_connection: bool,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("retrospect=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Step 1: Load and validate configuration
    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if let Some(kind) = cli.provider {
        settings.active_provider = kind;
    }
    let provider_config = settings.active_provider()?.clone();

    // Step 2: Connection test short-circuits the pipeline entirely
    if cli.test_connection {
        match provider::test_connection(&provider_config).await {
            Ok(()) => {
                println!("✓ Connection to {} succeeded", provider_config.kind.display_name());
                return Ok(());
            }
            Err(e) => {
                eprintln!("Connection failed: {e}");
                std::process::exit(1);
            }
        }
    }

    anyhow::ensure!(
        !settings.repositories.is_empty(),
        "No repositories configured. Add entries under 'repositories' in {}",
        cli.config.display()
    );

    // Step 3: Assemble the pipeline context
    let range = resolve_range(&cli);
    let classifier = settings.classifier.build();
    let provider = provider::build(&provider_config, settings.report.system_prompt.clone())?;
    let options = ReportOptions {
        include_noise: cli.include_noise || settings.report.include_noise,
        max_concurrency: settings.extraction.max_concurrency,
        repo_timeout: settings.extraction.repo_timeout(),
    };

    let ctx = ReportContext {
        repositories: &settings.repositories,
        range,
        source: Arc::new(GitCommitSource),
        provider: provider.as_ref(),
        classifier: &classifier,
        template: &settings.report.template,
        options,
    };

    // Step 4: Dry run prints the composed prompt without a provider call
    if cli.dry_run {
        let preview = pipeline::preview_prompt(&ctx).await?;
        print_diagnostics(&preview.diagnostics);
        println!("{}", preview.prompt);
        return Ok(());
    }

    // Step 5: Generate, with Ctrl-C aborting the in-flight provider call
    let (handle, cancel) = CancelToken::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    println!("Generating report with {}...", ctx.provider.name());
    let result = match pipeline::generate_report(&ctx, &cancel).await {
        Ok(result) => result,
        Err(ReportError::Cancelled) => {
            eprintln!("Cancelled, no report generated.");
            std::process::exit(130);
        }
        Err(e) => return Err(e.into()),
    };

    print_diagnostics(&result.diagnostics);

    // Step 6: Emit the report
    match &cli.output {
        Some(path) => {
            std::fs::write(path, &result.content)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "✓ Report written to {} ({} commits, {} tokens)",
                path.display(),
                result.commit_count,
                result.usage.total
            );
        }
        None => {
            println!("{}", result.content);
            eprintln!(
                "({} commits, {} prompt + {} completion tokens)",
                result.commit_count, result.usage.prompt, result.usage.completion
            );
        }
    }

    Ok(())
}

/// Resolve the report window from the CLI flags. Dates are interpreted as
/// whole days in UTC; `--days` counts back from the window end.
fn resolve_range(cli: &Cli) -> DateRange {
    let until = match cli.until {
        Some(date) => day_start(date) + chrono::Duration::days(1) - chrono::Duration::seconds(1),
        None => Utc::now(),
    };
    let since = match cli.since {
        Some(date) => day_start(date),
        None => until - chrono::Duration::days(i64::from(cli.days)),
    };
    DateRange::new(since, until)
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn print_diagnostics(diagnostics: &[RepoDiagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("Warning: {}: {}", diagnostic.repo, diagnostic.error);
    }
}
