//! change-primary-domain
//!
//! Moves a Google Workspace account from one primary domain to another:
//! - Swaps the customer's primary domain after confirmation
//! - Renames every user and group primary email onto the new domain
//! - Mirrors existing aliases onto the new domain
//!
//! Authorization uses the OAuth2 installed-application flow. The token is
//! cached under `~/.credentials` per target domain and refreshed as needed.

mod prompts;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use cpd_common::logging::init_logging;
use cpd_config::{AppConfig, ConfigLoader};
use cpd_directory::{
    Client, ClientConfig, ClientSecret, GoogleDirectory, InstalledAppFlow, TokenCache, TokenManager,
};
use cpd_migrate::{
    DomainOutcome, MigrationConfig, MigrationError, MigrationOrchestrator, MigrationReport,
};

#[derive(Parser, Debug)]
#[command(name = "change-primary-domain")]
#[command(about = "Change the primary domain of a Google Workspace account")]
#[command(version)]
struct Args {
    /// Current primary domain
    #[arg(long = "old-domain", env = "CPD_OLD_DOMAIN")]
    old_domain: String,

    /// Domain to make primary
    #[arg(long = "new-domain", env = "CPD_NEW_DOMAIN")]
    new_domain: String,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// OAuth2 client secret file
    #[arg(long)]
    client_secret: Option<String>,

    /// Log the calls that would be made without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Keep each renamed principal reachable at its old primary address
    #[arg(long)]
    preserve_old_primary: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging("change-primary-domain");

    match run(Args::parse()).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => match e.downcast_ref::<MigrationError>() {
            Some(MigrationError::UserAbort { gate }) => {
                info!(gate, "Abort!");
                ExitCode::SUCCESS
            }
            _ => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(args: Args) -> Result<MigrationReport> {
    let config = load_config(&args)?;

    let migration = MigrationConfig::new(&args.old_domain, &args.new_domain)?
        .with_customer_key(&config.migration.customer_key)
        .with_page_size(config.directory.page_size)
        .with_dry_run(config.migration.dry_run)
        .with_preserve_old_primary(config.migration.preserve_old_primary);

    let tokens = Arc::new(authorize(&config, &migration.new_domain).await?);

    let client_config = ClientConfig::new(&config.directory.base_url)
        .with_timeout(Duration::from_secs(config.directory.timeout_secs))
        .with_retry(
            config.directory.retry_attempts,
            Duration::from_millis(config.directory.retry_delay_ms),
        )
        .with_user_agent(&config.directory.user_agent);
    let client = Client::new(client_config, tokens).context("Unable to create directory client")?;

    let orchestrator = MigrationOrchestrator::new(
        Arc::new(GoogleDirectory::new(client)),
        Arc::from(prompts::confirmation_port()),
        migration,
    );

    Ok(orchestrator.run().await?)
}

/// File and environment configuration with command-line flags on top.
fn load_config(args: &Args) -> Result<AppConfig> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("Unable to load configuration")?;

    if let Some(path) = &args.client_secret {
        config.auth.client_secret_path = path.clone();
    }
    if args.dry_run {
        config.migration.dry_run = true;
    }
    if args.preserve_old_primary {
        config.migration.preserve_old_primary = true;
    }

    config.validate()?;
    Ok(config)
}

/// Build the token manager, running the interactive consent flow when no
/// token is cached for this domain.
async fn authorize(config: &AppConfig, new_domain: &str) -> Result<TokenManager> {
    let secret = ClientSecret::from_file(&config.auth.client_secret_path).with_context(|| {
        format!(
            "Unable to read client secret file {}",
            config.auth.client_secret_path
        )
    })?;

    let cache_dir = config.auth.resolved_token_cache_dir()?;
    let cache = TokenCache::for_domain(&cache_dir, &config.auth.token_file_prefix, new_domain);

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.directory.timeout_secs))
        .build()
        .context("Unable to create HTTP client")?;
    let tokens = TokenManager::new(InstalledAppFlow::new(secret, http_client), cache);

    if tokens.needs_authorization().await {
        let url = tokens.authorization_url()?;
        let code = prompts::read_authorization_code(&url)?;
        tokens
            .authorize_with_code(&code)
            .await
            .context("Unable to retrieve token from web")?;
    }

    Ok(tokens)
}

fn print_summary(report: &MigrationReport) {
    let mode = if report.dry_run { " (dry run)" } else { "" };
    let domain = match report.domain {
        DomainOutcome::Updated => "primary domain updated",
        DomainOutcome::AlreadyCurrent => "primary domain already current",
        DomainOutcome::Planned => "primary domain update planned",
    };
    println!(
        "Customer {}{}: {}, {} users renamed, {} groups renamed, {} aliases added",
        report.customer_id,
        mode,
        domain,
        report.users.renamed,
        report.groups.renamed,
        report.users.aliases_added + report.groups.aliases_added,
    );

    if report.has_failures() {
        let failures = report.users.failures.len() + report.groups.failures.len();
        warn!(failures, "Some records were not migrated, re-run after fixing them");
    }
}
