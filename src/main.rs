//! Toolgate: ask a model which tools to call, then call them.
//!
//! Usage:
//!   toolgate check                              Validate the tool catalog
//!   toolgate schema <name>                      Print a tool's schema
//!   toolgate exec <name> --args '{"num": 16}'   Run a tool directly
//!   toolgate ask "<query>" --function add_num   Model call + dispatch
//!   toolgate suite --tests <file> --function ...  Batch test suite

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use toolgate::cache::CacheStore;
use toolgate::config::{self, GatewayConfig};
use toolgate::dispatch::Dispatcher;
use toolgate::gateway::{ModelGateway, OpenAiBackend};
use toolgate::runner;
use toolgate::tools::{build_registry, builtin_sources, FunctionRegistry};
use toolgate::types::{ExecutionChain, GatewayResponse, ToolArgs};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "toolgate")]
#[command(version = "0.1.0")]
#[command(about = "Model-driven tool selection and dispatch")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to toolgate.toml (defaults to ~/.toolgate/toolgate.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,

    /// Response cache directory. Overrides the config file.
    #[arg(long)]
    cache_dir: Option<String>,

    /// Disable the response cache for this run.
    #[arg(long)]
    no_cache: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load every tool and report discovery problems.
    Check,

    /// Print the schema of a registered tool.
    Schema { name: String },

    /// Execute a tool directly with JSON arguments.
    Exec {
        name: String,

        /// Arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Send a query to the model and dispatch the tools it selects.
    Ask {
        query: String,

        /// Tools to offer; all registered tools when omitted.
        #[arg(long = "function")]
        functions: Vec<String>,
    },

    /// Run a JSON test suite against the selected tools.
    Suite {
        /// Suite file; also looked up under tests/suites/.
        #[arg(long)]
        tests: PathBuf,

        /// Tools to offer; all registered tools when omitted.
        #[arg(long = "function")]
        functions: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut cfg = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    cfg.apply_env();
    if let Some(dir) = &cli.cache_dir {
        cfg.cache_dir = Some(dir.clone());
    }
    if cli.no_cache {
        cfg.cache_dir = None;
    }

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&cfg.log_level);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let (registry, report) = build_registry(&builtin_sources());
    for failure in &report.failed {
        warn!(
            "Skipped {}{}: {}",
            failure.module,
            failure.tool.as_deref().map(|t| format!("::{}", t)).unwrap_or_default(),
            failure.reason
        );
    }
    let registry = Arc::new(registry);

    match cli.command {
        Commands::Check => cmd_check(&registry, &report),
        Commands::Schema { name } => cmd_schema(&registry, &name),
        Commands::Exec { name, args } => cmd_exec(&cfg, registry, &name, &args).await,
        Commands::Ask { query, functions } => cmd_ask(&cfg, registry, &query, &functions).await,
        Commands::Suite { tests, functions } => cmd_suite(&cfg, registry, &tests, &functions).await,
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_check(registry: &FunctionRegistry, report: &toolgate::tools::DiscoveryReport) -> Result<()> {
    println!();
    println!("{}", "=== Tool Catalog ===".bold());
    println!();
    for name in registry.list_names() {
        let entry = registry.get_entry(&name)?;
        println!("  {} {} ({})", "✓".green(), name.bold(), entry.module.dimmed());
        println!("      {}", entry.description);
    }
    for failure in &report.failed {
        println!(
            "  {} {}{}: {}",
            "✗".red(),
            failure.module.bold(),
            failure.tool.as_deref().map(|t| format!("::{}", t)).unwrap_or_default(),
            failure.reason
        );
    }
    println!();
    println!("  Loaded: {}  Failed: {}", report.loaded.len(), report.failed.len());
    println!();

    if !report.is_clean() {
        bail!("{} tool(s) failed to load", report.failed.len());
    }
    Ok(())
}

fn cmd_schema(registry: &FunctionRegistry, name: &str) -> Result<()> {
    let schema = registry.get_schema(name)?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

async fn cmd_exec(
    cfg: &GatewayConfig,
    registry: Arc<FunctionRegistry>,
    name: &str,
    args: &str,
) -> Result<()> {
    let args: ToolArgs = serde_json::from_str(args).context("--args must be a JSON object")?;
    let dispatcher = Dispatcher::new(registry).with_chain_timeout(cfg.chain_timeout());
    let result = dispatcher.execute(name, args).await?;
    println!("{}", result);
    Ok(())
}

async fn cmd_ask(
    cfg: &GatewayConfig,
    registry: Arc<FunctionRegistry>,
    query: &str,
    functions: &[String],
) -> Result<()> {
    let schemas = runner::select_schemas(&registry, functions)?;
    let gateway = build_gateway(cfg)?;
    let dispatcher = Dispatcher::new(registry).with_chain_timeout(cfg.chain_timeout());

    let response = gateway.call(query, &schemas).await;
    let completed = match &response {
        GatewayResponse::Failed(failure) => {
            bail!("Model call failed ({}): {}", failure.kind, failure.error);
        }
        GatewayResponse::Completed(completed) => completed,
    };

    if let Some(content) = completed.content() {
        println!("{} {}", "model:".cyan().bold(), content);
    }

    // Ctrl-C stops the chain between calls.
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{} Cancelling remaining calls...", "<<<".red().bold());
            watcher.cancel();
        }
    });

    let chain = dispatcher.run_with_cancel(completed, &cancel).await;
    ctrl_c.abort();

    print_chain(&chain);
    Ok(())
}

async fn cmd_suite(
    cfg: &GatewayConfig,
    registry: Arc<FunctionRegistry>,
    tests: &Path,
    functions: &[String],
) -> Result<()> {
    let cases = runner::load_suite(tests)?;
    let schemas = runner::select_schemas(&registry, functions)?;
    let names: Vec<String> = schemas.iter().map(|s| s.name.clone()).collect();
    let gateway = build_gateway(cfg)?;
    let dispatcher = Dispatcher::new(registry).with_chain_timeout(cfg.chain_timeout());

    println!(
        "{} Running {} test(s) against {} with [{}]",
        ">>>".green().bold(),
        cases.len(),
        gateway.model_id(),
        names.join(", ")
    );

    let report = runner::run_suite(&gateway, &dispatcher, &schemas, &cases).await;
    let path = runner::save_report(&cfg.resolved_results_dir(), &names, &report)?;

    println!();
    println!("{}", "=== Suite Summary ===".bold());
    println!("  Total:   {}", report.total());
    println!("  Passed:  {}", report.passed.to_string().green());
    println!("  Failed:  {}", report.failed.to_string().yellow());
    println!("  Errors:  {}", report.errors.to_string().red());
    println!("  Success: {:.1}%", report.success_rate());
    println!("  Report:  {}", path.display());
    println!();

    info!("Suite report written to {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_gateway(cfg: &GatewayConfig) -> Result<ModelGateway> {
    let api_key = config::require_api_key(cfg)?;
    let backend = OpenAiBackend::from_config(cfg, api_key)?;
    let cache = CacheStore::from_option(cfg.resolved_cache_dir());
    if !cache.is_enabled() {
        info!("Response cache disabled");
    }
    Ok(ModelGateway::new(Arc::new(backend), cache))
}

fn print_chain(chain: &ExecutionChain) {
    if chain.is_empty() {
        println!("{}", "No tools were called.".dimmed());
        return;
    }
    for (i, record) in chain.iter().enumerate() {
        match (record.result(), record.error()) {
            (Some(result), _) => println!(
                "  {}. {} {} → {}",
                i + 1,
                "✓".green(),
                record.function_name.bold(),
                result
            ),
            (_, Some(error)) => println!(
                "  {}. {} {} → {}",
                i + 1,
                "✗".red(),
                record.function_name.bold(),
                error.red()
            ),
            _ => {}
        }
    }
}
