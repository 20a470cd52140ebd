//! API Discovery - black-box behavior discovery for an HTTP test API
//!
//! Drives live traffic against six test endpoints, the auth endpoints and
//! the health check, and records how the service really behaves: rate
//! limits, cold starts, fixed delays and broken endpoints.
//!
//! ## Features
//!
//! - 47 numbered probes across eight categories
//! - OpenAPI schema download, caching and response validation
//! - Shared per-endpoint result aggregation with an end-of-session summary
//! - Console, session, rotating main and error-only logs
//! - Table, JSON and summary output
//!
//! ## Usage
//!
//! ```bash
//! # Run the fast probes
//! api-discovery run
//!
//! # Run one category including the slow probes
//! api-discovery run --category discovery --include-slow
//!
//! # Run specific probes
//! api-discovery run --probe 11 --probe 13
//!
//! # List available probes
//! api-discovery list --detailed
//!
//! # Inspect the schema
//! api-discovery schema endpoints
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

mod auth;
mod benchmark;
mod cli;
mod config;
mod executor;
mod http;
mod models;
mod output;
mod probes;
mod results;
mod schema;
mod utils;

use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use executor::ProbeRunner;
use models::{ProbeCase, HEALTH_ENDPOINT};
use output::{OutputFormat, ResultFormatter};
use probes::ProbeContext;
use utils::logger::{self, LogLevel, LogSettings};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();
    let config = resolve_config(&args, &env)?;

    let level = args
        .log_level
        .as_deref()
        .or(env.log_level.as_deref())
        .map(|l| LogLevel::parse(l).ok_or_else(|| anyhow::anyhow!("Unknown log level: {l}")))
        .transpose()?
        .unwrap_or(LogLevel::Info);

    let settings = match &args.command {
        cli::Command::Run(_) => LogSettings::with_files(level, &config.log_dir),
        _ => LogSettings::console(level),
    };
    let _guards = utils::init_logging(&settings)?;

    match args.command {
        cli::Command::Run(run_args) => {
            let green = run_probes(config, run_args).await?;
            if !green {
                std::process::exit(1);
            }
        }
        cli::Command::List(list_args) => {
            list_probes(list_args);
        }
        cli::Command::Schema(schema_args) => {
            manage_schema(config, schema_args).await?;
        }
        cli::Command::Auth(auth_args) => {
            manage_auth(config, auth_args).await?;
        }
        cli::Command::Health => {
            check_health(config).await?;
        }
        cli::Command::Logs(logs_args) => {
            manage_logs(&config, logs_args)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(&config, config_args)?;
        }
    }

    Ok(())
}

/// Defaults, then config file, then environment, then flags
fn resolve_config(args: &Args, env: &EnvConfig) -> Result<AppConfig> {
    let explicit = args.config.as_deref().or(env.config_file.as_deref());
    let mut config = ConfigFile::resolve(explicit)?.app.with_env(env);

    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if args.insecure {
        config.ssl_verify = false;
    }

    config.validate()?;
    Ok(config)
}

fn select_probes(args: &cli::RunArgs) -> Result<Vec<ProbeCase>> {
    if !args.probes.is_empty() {
        return args
            .probes
            .iter()
            .map(|&n| {
                ProbeCase::from_number(n).ok_or_else(|| anyhow::anyhow!("Invalid probe number: {n}"))
            })
            .collect();
    }

    if let Some(category) = &args.category {
        let probes = ProbeCase::by_category(category);
        if probes.is_empty() {
            anyhow::bail!("Unknown category: {category}");
        }
        return Ok(probes);
    }

    Ok(ProbeCase::all())
}

async fn run_probes(config: AppConfig, args: cli::RunArgs) -> Result<bool> {
    let probes = select_probes(&args)?;
    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;

    logger::log_session_start(&config.base_url);
    if config.refresh_token.is_none() {
        warn!("INITIAL_REFRESH_TOKEN is not set; authenticated probes will be skipped");
    }

    let ctx = ProbeContext::new(config)?;
    if let Err(e) = ctx.schema.download_schema(false).await {
        warn!("Schema download failed: {}", e);
    }

    let runner = ProbeRunner::new(ctx).include_slow(args.include_slow);
    let summary = runner.run(&probes).await;

    let endpoints = runner.context().results.summary();
    endpoints.log();

    let formatter = ResultFormatter::new(format);
    println!("{}", formatter.format_session(&summary, &endpoints));

    if let Some(path) = &args.output {
        output::write_results_to_file(path, &summary, &endpoints, format)?;
        info!("Results saved to {}", path);
    }

    Ok(summary.is_green())
}

fn list_probes(args: cli::ListArgs) {
    println!("Available Probes:");
    println!("═════════════════════════════════════════════════════════════");

    let formatter = ResultFormatter::default();
    print!("{}", formatter.format_catalogue(&ProbeCase::all(), args.detailed));

    println!();
    println!("Slow probes run only with --include-slow.");
    println!();
    config::print_env_help();
}

async fn manage_schema(config: AppConfig, args: cli::SchemaArgs) -> Result<()> {
    let ctx = ProbeContext::new(config)?;

    match args.action {
        cli::SchemaAction::Download { force } => {
            let path = ctx.schema.download_schema(force).await?;
            println!("✓ Schema cached at {}", path.display());
        }
        cli::SchemaAction::Endpoints => {
            let endpoints = ctx.schema.get_all_test_endpoints().await?;
            println!("Test endpoints ({}):", endpoints.len());
            for endpoint in endpoints {
                println!("  {endpoint}");
            }
        }
        cli::SchemaAction::Show { path, method } => {
            let operation = ctx.schema.get_endpoint_schema(&path, &method).await?;
            println!("{}", serde_json::to_string_pretty(&operation)?);
        }
    }

    Ok(())
}

async fn manage_auth(config: AppConfig, args: cli::AuthArgs) -> Result<()> {
    let ctx = ProbeContext::new(config)?;

    let pair = match args.action {
        cli::AuthAction::Generate => ctx.tokens.fresh_pair().await?,
        cli::AuthAction::Refresh { token } => ctx.tokens.auth().refresh(&token).await?,
    };

    println!("{}", serde_json::to_string_pretty(&pair)?);
    Ok(())
}

async fn check_health(config: AppConfig) -> Result<()> {
    let ctx = ProbeContext::new(config)?;
    let response = ctx
        .get(HEALTH_ENDPOINT, None)
        .await
        .context("Health check request failed")?;

    let symbol = if response.status_code == 200 { "✓" } else { "✗" };
    println!(
        "{} {} {} ({:.3}s)",
        symbol,
        HEALTH_ENDPOINT,
        response.status_code,
        response.elapsed_secs()
    );
    println!("{}", response.body_preview(500));

    if response.status_code != 200 {
        anyhow::bail!("Service unhealthy: {}", response.status_code);
    }
    Ok(())
}

fn manage_logs(config: &AppConfig, args: cli::LogsArgs) -> Result<()> {
    let dir = config.log_dir.as_path();

    match args.action {
        cli::LogsAction::Stats => {
            let stats = logger::get_log_stats(dir)?;
            println!("Log directory: {}", dir.display());
            println!("{:-<60}", "");
            println!("  Total files:    {}", stats.total_files);
            println!("  Total size:     {:.2} MB", stats.total_size_mb);
            println!("  Session logs:   {}", stats.session_logs);
            println!("  Rotating logs:  {}", stats.rotating_logs);
            println!(
                "  Oldest session: {}",
                stats.oldest_session.as_deref().unwrap_or("-")
            );
            println!(
                "  Newest session: {}",
                stats.newest_session.as_deref().unwrap_or("-")
            );
        }
        cli::LogsAction::Purge => {
            let removed = logger::purge_all_logs(dir)?;
            println!("✓ Removed {removed} log files");
        }
        cli::LogsAction::Clear => {
            let removed = logger::clear_main_logs(dir)?;
            println!("✓ Removed {removed} main and error logs");
        }
        cli::LogsAction::PurgeOld { days } => {
            let removed = logger::purge_old_sessions(dir, days as i64)?;
            println!("✓ Removed {removed} session logs older than {days} days");
        }
    }

    Ok(())
}

fn manage_config(config: &AppConfig, args: cli::ConfigArgs) -> Result<()> {
    use std::path::Path;

    match args.action {
        cli::ConfigAction::Show => {
            println!("Resolved configuration:");
            println!("{:-<60}", "");
            println!("  Base URL:        {}", config.base_url);
            println!("  Refresh token:   {}", config.masked_token());
            println!("  SSL verify:      {}", config.ssl_verify);
            println!(
                "  Timeouts:        request={}s auth={}s schema={}s",
                config.request_timeout_secs, config.auth_timeout_secs, config.schema_timeout_secs
            );
            println!("  Schema dir:      {}", config.schema_dir.display());
            println!("  Log dir:         {}", config.log_dir.display());
            println!("  Report dir:      {}", config.report_dir.display());
            println!("  Max workers:     {}", config.max_workers);
            if let Some(path) = ConfigFile::find() {
                println!("  Config file:     {}", path.display());
            }
        }
        cli::ConfigAction::Init { path } => {
            let target = Path::new(&path);
            if target.exists() {
                anyhow::bail!("Configuration file already exists: {path}");
            }
            ConfigFile::example().save(target)?;
            println!("✓ Configuration file created: {path}");
            println!("\nEdit the file to customize your settings.");
        }
    }

    Ok(())
}
