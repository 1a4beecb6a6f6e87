//! Newsline main entry point
//!
//! This is the command-line interface for the Newsline news ingester.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use newsline::config::{
    apply_env_overrides, load_config_with_hash, validate_source, PolicyKind, SourceConfig,
    SourceKind,
};
use newsline::crawler::{build_iteration, run_forever, run_once, Schedule};
use newsline::supervisor::{process_specs, Supervisor};
use newsline::{shutdown, ConfigError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Newsline: an incremental news ingester
///
/// Polls news sections and public channel previews, keeps only what is new
/// since the previous pass, appends it to per-source logs and optionally
/// pushes it downstream.
#[derive(Parser, Debug)]
#[command(name = "newsline")]
#[command(version = "1.0.0")]
#[command(about = "An incremental news ingester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl one source, once or on a schedule
    Crawl(CrawlArgs),

    /// Run and supervise one crawler process per configured source
    Supervise(SuperviseArgs),

    /// Validate a configuration file and show what would be crawled
    Check {
        /// Path to TOML configuration file
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Source to crawl; may be omitted when the config has exactly one
    #[arg(long, value_name = "NAME")]
    source: Option<String>,

    /// Prefix of the environment overrides (defaults to the source name in upper case)
    #[arg(long, value_name = "PREFIX")]
    env_prefix: Option<String>,

    /// Keep crawling on the configured interval until interrupted
    #[arg(long)]
    forever: bool,

    /// Override the poll interval
    #[arg(long, value_name = "N")]
    interval_minutes: Option<u64>,

    /// Override the data directory
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Args, Debug)]
struct SuperviseArgs {
    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: PathBuf,

    /// Override the policy from the config file
    #[arg(long, value_enum)]
    policy: Option<PolicyKind>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Crawl(args) => handle_crawl(args).await,
        Command::Supervise(args) => handle_supervise(args).await,
        Command::Check { config } => handle_check(&config),
    };

    match result {
        Ok(code) => exit_code(code),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            if is_config_error(&e) {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

/// Sets up the logging/tracing subscriber
///
/// `RUST_LOG` wins over `level` when set.
fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("newsline={},warn", level.to_lowercase())))
        .unwrap_or_else(|_| EnvFilter::new("newsline=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn is_config_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| cause.is::<ConfigError>())
}

/// Environment prefix derived from a source name: `lenta-world` -> `LENTA_WORLD`
fn default_env_prefix(source_name: &str) -> String {
    source_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Resolves the crawled source: config file, then environment, then flags
fn resolve_source(args: &CrawlArgs) -> anyhow::Result<SourceConfig> {
    let mut source = match &args.config {
        Some(path) => {
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            let source = config.source(args.source.as_deref())?.clone();
            setup_logging(&log_level(args, &source));
            tracing::info!("Configuration loaded from {} (hash: {})", path.display(), hash);
            source
        }
        None => {
            let name = args.source.clone().unwrap_or_else(|| "news".to_string());
            let source = SourceConfig::new(name, SourceKind::Html);
            setup_logging(&log_level(args, &source));
            source
        }
    };

    let prefix = env_prefix(args, &source);
    apply_env_overrides(&mut source, &prefix);

    if let Some(minutes) = args.interval_minutes {
        source.crawl.interval_minutes = minutes;
    }
    if let Some(dir) = &args.data_dir {
        source.crawl.data_dir = dir.clone();
    }

    validate_source(&source)?;
    Ok(source)
}

fn env_prefix(args: &CrawlArgs, source: &SourceConfig) -> String {
    args.env_prefix
        .clone()
        .unwrap_or_else(|| default_env_prefix(&source.name))
}

/// Log level: flag, then `<PREFIX>_LOG_LEVEL`, then the config file
fn log_level(args: &CrawlArgs, source: &SourceConfig) -> String {
    args.log_level
        .clone()
        .or_else(|| {
            std::env::var(format!("{}_LOG_LEVEL", env_prefix(args, source)))
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
        .unwrap_or_else(|| source.crawl.log_level.clone())
}

/// Handles `crawl`: one iteration, or the scheduler loop with `--forever`
async fn handle_crawl(args: CrawlArgs) -> anyhow::Result<i32> {
    let source = resolve_source(&args)?;
    tracing::info!(
        source = %source.name,
        kind = ?source.kind,
        data_dir = %source.crawl.data_dir.display(),
        "crawler starting"
    );

    let mut iteration = build_iteration(&source)?;

    if !args.forever {
        let outcome = run_once(iteration.as_mut()).await?;
        println!(
            "{}: stored {} ({} errors), stopped: {}",
            source.name, outcome.stored, outcome.errors, outcome.stop_reason
        );
        return Ok(0);
    }

    let shutdown_rx = shutdown::spawn_listener();
    run_forever(iteration.as_mut(), Schedule::from(&source.crawl), shutdown_rx.clone()).await;

    let interrupted = *shutdown_rx.borrow();
    Ok(if interrupted { newsline::supervisor::INTERRUPTED_EXIT_CODE } else { 0 })
}

/// Handles `supervise`: one crawler process per source
async fn handle_supervise(args: SuperviseArgs) -> anyhow::Result<i32> {
    setup_logging(args.log_level.as_deref().unwrap_or("info"));

    let (mut config, hash) = load_config_with_hash(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    tracing::info!("Configuration loaded from {} (hash: {})", args.config.display(), hash);

    if let Some(policy) = args.policy {
        config.supervisor.policy = policy;
    }

    let exe = std::env::current_exe().context("Failed to locate the newsline executable")?;
    let specs = process_specs(&config, &args.config, &exe);

    let mut supervisor = Supervisor::start(specs, &config.supervisor)?;
    let code = supervisor.run(shutdown::spawn_listener()).await;
    tracing::info!(code, "supervisor exiting");
    Ok(code)
}

/// Handles `check`: validates the config and shows what would be crawled
fn handle_check(path: &Path) -> anyhow::Result<i32> {
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    println!("=== Newsline Config Check ===\n");
    println!("File: {}", path.display());
    println!("Hash: {}", hash);

    println!("\nSupervisor:");
    println!("  Policy: {:?}", config.supervisor.policy);
    println!("  Restart delay: {}ms", config.supervisor.restart_delay_ms);
    println!("  Poll tick: {}ms", config.supervisor.poll_tick_ms);

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        let crawl = &source.crawl;
        println!("  - {} ({:?})", source.name, source.kind);
        match source.kind {
            SourceKind::Html => {
                println!("    Section: {}", source.section_url.as_deref().unwrap_or("-"));
                if let Some(template) = &source.page_url_template {
                    println!("    Pages: {} (up to {})", template, crawl.max_pages);
                }
            }
            SourceKind::Telegram => {
                println!("    Channels: {}", source.channels.join(", "));
            }
        }
        println!(
            "    Every {} min ({} min when paused), {} days back",
            crawl.interval_minutes, crawl.pause_interval_minutes, crawl.days_back
        );
        println!("    Data: {}", crawl.data_dir.display());
        if let Some(sink) = &crawl.sink_url {
            println!("    Sink: {}", sink);
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(0)
}
