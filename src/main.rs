//! fnhost CLI entry point.
//!
//! `fnhost` (or `fnhost serve`) runs the server; `list`, `run`, and
//! `metrics` talk to a running server over HTTP.

mod client;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fnhost_common::{ConfigFile, FunctionInfo, RuntimeKind};
use fnhost_core::{DEFAULT_EXPORT, FunctionContext, Registry};
use fnhost_functions::builtin_functions;
use fnhost_host::{EventBus, MetricsCollector};
use fnhost_server::{AppState, FnHostServer, ServerConfig};

use crate::client::Client;

#[derive(Debug, Parser)]
#[command(name = "fnhost", version, about = "Self-hosted function execution platform")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "FNHOST_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Address to bind, overriding `[server] bind_addr`.
    #[arg(long, env = "FNHOST_BIND_ADDR")]
    bind: Option<SocketAddr>,

    /// Functions directory, overriding `[runtime.functions] directory`.
    #[arg(long, env = "FNHOST_FUNCTIONS_DIR")]
    functions_dir: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "FNHOST_LOG_JSON", global = true)]
    log_json: bool,

    /// Server URL used by client commands.
    #[arg(
        long,
        env = "FNHOST_SERVER",
        default_value = "http://127.0.0.1:8080",
        global = true
    )]
    server: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP and RPC server (default).
    Serve,
    /// List functions registered on the server.
    List,
    /// Execute a function on the server.
    Run {
        /// Function name.
        name: String,
        /// Input as a JSON object.
        #[arg(short, long, default_value = "{}")]
        input: String,
    },
    /// Show execution metrics.
    Metrics {
        /// Only this function.
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        None | Some(Command::Serve) => serve(&cli).await,
        Some(Command::List) => {
            let functions = Client::new(&cli.server)?.list().await?;
            for f in functions {
                println!("{:<24} {:<10} {}", f.name, f.runtime.as_str(), f.description);
            }
            Ok(())
        }
        Some(Command::Run { ref name, ref input }) => {
            let input: Value = serde_json::from_str(input).context("--input must be valid JSON")?;
            let output = Client::new(&cli.server)?.run(name, &input).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Some(Command::Metrics { ref name }) => {
            let output = Client::new(&cli.server)?.metrics(name.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,fnhost=debug".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<ConfigFile> {
    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration file");
            ConfigFile::from_file(path)?
        }
        None => ConfigFile::default(),
    };

    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind.to_string();
    }
    if let Some(dir) = &cli.functions_dir {
        config.runtime.functions.directory.clone_from(dir);
    }

    Ok(config)
}

async fn serve(cli: &Cli) -> anyhow::Result<()> {
    info!("Starting fnhost");

    let config = load_config(cli)?;
    let server_config = ServerConfig::from_file(&config.server, &config.rpc)?;

    let context = FunctionContext::new(
        Arc::new(EventBus::new()),
        Arc::new(MetricsCollector::with_cold_start_gap(
            config.runtime.metrics.cold_start_gap(),
        )),
    );

    let registry = Registry::from_config(&config.runtime, context)
        .context("failed to prepare the functions directory")?;

    // Artifacts on disk win over built-ins of the same name
    for function in builtin_functions() {
        if registry.contains(function.name) {
            warn!(function = function.name, "Built-in function shadowed by an artifact");
            continue;
        }
        match registry.register_native(&function) {
            Ok(()) => debug!(function = function.name, "Built-in function registered"),
            Err(e) => warn!(function = function.name, error = %e, "Built-in function skipped"),
        }
    }

    for entry in &config.functions {
        let description = entry
            .description
            .clone()
            .unwrap_or_else(|| format!("WebAssembly function: {}", entry.name));
        let info = FunctionInfo::new(&entry.name, description, RuntimeKind::Bytecode);

        match registry.register_bytecode(&entry.name, &entry.path, DEFAULT_EXPORT, info) {
            Ok(()) => info!(function = %entry.name, path = %entry.path.display(), "Configured function registered"),
            Err(e) => warn!(function = %entry.name, error = %e, "Configured function skipped"),
        }
    }

    info!(
        functions = registry.len(),
        bind_addr = %server_config.bind_addr,
        "Registry ready"
    );

    let state = AppState::new(Arc::new(registry), config.runtime.metrics.record_invocations);
    FnHostServer::new(state, server_config).run().await?;

    Ok(())
}
