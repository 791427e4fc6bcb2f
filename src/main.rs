//! BeingDB Command-Line Interface
//!
//! Two subcommands cover the snapshot lifecycle:
//!
//! ```bash
//! # Compile predicate sources into a fresh pack
//! beingdb compile --source ./predicates --pack ./pack
//!
//! # Serve a compiled pack until SIGINT/SIGTERM
//! beingdb serve --pack ./pack --port 8080 --max-results 1000 --max-concurrent 20
//! ```
//!
//! `compile` exits non-zero when any predicate file mixes arities; a pack
//! produced by a failed compile must not be served.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use beingdb::config::LoggingConfig;
use beingdb::server::{start_http_server, ServerState};
use beingdb::{compile, Config, Pack};

/// BeingDB - a read-mostly fact store served from immutable pack snapshots
#[derive(Parser, Debug)]
#[command(name = "beingdb", version, about)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a directory of predicate source files into a fresh pack
    Compile {
        /// Directory of predicate source files (*.pl)
        #[arg(long)]
        source: PathBuf,

        /// Pack directory to (re)create
        #[arg(long)]
        pack: PathBuf,
    },

    /// Serve a compiled pack over HTTP
    Serve {
        /// Pack directory to serve
        #[arg(long)]
        pack: Option<PathBuf>,

        /// Host address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Ceiling on results returned per request
        #[arg(long)]
        max_results: Option<usize>,

        /// Concurrent query handlers allowed before 503
        #[arg(long)]
        max_concurrent: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(code) => return code,
    };

    init_tracing(&config.logging);
    install_panic_hook();

    match cli.command {
        Command::Compile { source, pack } => run_compile(&source, &pack),
        Command::Serve {
            pack,
            host,
            port,
            max_results,
            max_concurrent,
        } => {
            let mut config = config;
            if let Some(pack) = pack {
                config.pack.dir = pack;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(max_results) = max_results {
                config.server.max_results = max_results;
            }
            if let Some(max_concurrent) = max_concurrent {
                config.server.max_concurrent = max_concurrent;
            }
            run_serve(config).await
        }
    }
}

fn load_config(explicit: Option<&std::path::Path>) -> Result<Config, ExitCode> {
    if let Some(path) = explicit {
        // Explicit config path: fail hard if missing or invalid.
        if !path.exists() {
            eprintln!("ERROR: config file not found: {}", path.display());
            return Err(ExitCode::FAILURE);
        }
        Config::from_file(&path.to_string_lossy()).map_err(|e| {
            eprintln!("ERROR: failed to parse config {}: {e}", path.display());
            ExitCode::FAILURE
        })
    } else {
        Ok(Config::load().unwrap_or_else(|e| {
            eprintln!("WARNING: failed to load configuration ({e}), using defaults");
            Config::default()
        }))
    }
}

fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Log panics through tracing before they reach stderr, so worker-thread
/// panics keep their diagnostics even under a buffering writer.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map_or_else(
            || "unknown".to_string(),
            |l| format!("{}:{}:{}", l.file(), l.line(), l.column()),
        );
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        tracing::error!(location, payload, "thread panicked");
        eprintln!("PANIC at {location}: {payload}");
    }));
}

fn run_compile(source: &std::path::Path, pack: &std::path::Path) -> ExitCode {
    let report = match compile::compile(source, pack) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("ERROR: compile failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Compiled {} predicates, {} facts",
        report.predicates.len(),
        report.total_facts()
    );
    for predicate in &report.predicates {
        if predicate.invalid_lines > 0 {
            println!(
                "  {}: {} facts ({} malformed lines skipped)",
                predicate.name, predicate.facts, predicate.invalid_lines
            );
        } else {
            println!("  {}: {} facts", predicate.name, predicate.facts);
        }
    }

    if report.success() {
        ExitCode::SUCCESS
    } else {
        for failure in &report.failed {
            eprintln!(
                "ERROR: predicate {} mixes arities {:?}; sample lines:",
                failure.predicate, failure.arities
            );
            for line in &failure.samples {
                eprintln!("    {line}");
            }
        }
        eprintln!(
            "ERROR: {} predicate(s) failed; this pack must not be served",
            report.failed.len()
        );
        ExitCode::FAILURE
    }
}

async fn run_serve(config: Config) -> ExitCode {
    let pack = match Pack::open(&config.pack.dir) {
        Ok(pack) => Arc::new(pack),
        Err(e) => {
            eprintln!(
                "ERROR: cannot open pack at {}: {e}",
                config.pack.dir.display()
            );
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        pack_id = %pack.id(),
        predicates = pack.list_predicates().len(),
        "pack opened"
    );

    let state = Arc::new(ServerState::new(pack, &config));
    match start_http_server(state, &config.server).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: server failed: {e}");
            ExitCode::FAILURE
        }
    }
}
