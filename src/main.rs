//! MeatMonsters - trigger-driven persona responder
//!
//! This is the main entry point for the meatmonsters binary.
//! It loads the persona directory, connects to the chat server and replies
//! to messages that match a persona's triggers.

mod cli;
mod config;
mod dispatch;
mod error;
mod logging;
mod persona;
mod protocol;
mod responder;
mod transport;
mod version;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn, Level};

use crate::cli::{Cli, Commands, ConfigSubcommand, PersonasSubcommand};
use crate::config::MonstersConfig;
use crate::dispatch::{Dispatcher, DispatcherConfig};
use crate::error::{Error, Result};
use crate::persona::PersonaRegistry;
use crate::responder::Responder;
use crate::transport::{TransportClient, TransportClientConfig};

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    if let Err(e) = run_cli(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Config { subcommand } => {
            // Config commands use minimal logging
            logging::init_simple(simple_level(cli.verbose, cli.quiet))?;
            handle_config_command(subcommand)
        }
        Commands::Personas { subcommand } => {
            logging::init_simple(simple_level(cli.verbose, cli.quiet))?;
            handle_personas_command(subcommand)
        }
        Commands::Run {
            config,
            personas,
            address,
        } => {
            let cfg = MonstersConfig::load_for_run(
                config.as_deref(),
                personas.as_deref(),
                address.as_deref(),
            )?;

            // The guards must be kept alive for the lifetime of the program
            let _log_guards = logging::init_logging(&cfg.logging, cli.verbose, cli.quiet)?;
            run_responder(cfg)
        }
    }
}

/// Log level for short-lived subcommands
fn simple_level(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

// ─────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────

/// Load personas and serve the chat stream until shutdown
fn run_responder(config: MonstersConfig) -> Result<()> {
    let build = version::BuildInfo::current();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting MeatMonsters"
    );

    // Personas are loaded before connecting so a bad directory fails fast
    let registry = PersonaRegistry::load(&config.personas_dir())?;
    if registry.bindings().is_empty() {
        warn!(
            dir = %config.personas.dir,
            "No trigger patterns loaded, nothing will ever be answered"
        );
    }

    info!(
        address = %config.transport.address,
        personas = registry.personas().len(),
        bindings = registry.bindings().len(),
        cooldown_secs = config.dispatch.cooldown_secs,
        warmup_events = config.dispatch.warmup_events,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("meatmonsters")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    runtime.block_on(async_main(config, registry))
}

/// Async main: transport, responder loop, graceful shutdown
async fn async_main(config: MonstersConfig, registry: PersonaRegistry) -> Result<()> {
    let started_at = tokio::time::Instant::now().into_std();
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(registry),
        DispatcherConfig::from_settings(&config),
        started_at,
    ));

    let mut client = TransportClient::new(TransportClientConfig::from_settings(&config.transport));
    let mut events = client.start().await?;

    let responder = Responder::new(Arc::clone(&dispatcher), client.reply_sender());

    // Set up graceful shutdown on Ctrl+C
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
        }
    };

    info!("Responder event loop started");
    let result = responder.run(&mut events, shutdown).await;

    if let Err(e) = client.shutdown().await {
        warn!(error = %e, "Error stopping transport");
    }

    let transport = client.stats();
    match result {
        Ok(stats) => {
            info!(
                events = stats.events,
                replies = stats.replies,
                throttled = stats.throttled,
                malformed = stats.malformed,
                failed = stats.failed,
                frames = transport.frames_received,
                sent = transport.replies_sent,
                dropped = transport.replies_dropped,
                reconnects = transport.reconnect_attempts,
                seen = dispatcher.event_count(),
                phase = %dispatcher.phase(),
                "Responder shutting down"
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

// ─────────────────────────────────────────────────────────────────
// Personas
// ─────────────────────────────────────────────────────────────────

/// Handle persona subcommands
fn handle_personas_command(subcommand: PersonasSubcommand) -> Result<()> {
    let (dir, config_path) = subcommand.location();
    let dir = match dir {
        Some(dir) => PathBuf::from(config::expand_path(dir)),
        None => MonstersConfig::load(config_path)?.personas_dir(),
    };

    let registry = PersonaRegistry::load(&dir)?;

    match subcommand {
        PersonasSubcommand::List { .. } => {
            let summaries = registry.summaries();
            println!("Personas in {} ({}):", dir.display(), summaries.len());
            for summary in summaries {
                println!();
                println!("  {}", summary.name);
                println!("    Actions:  {}", summary.actions.join(", "));
                println!("    Triggers: {}", summary.triggers);
                println!("    Images:   {}", summary.images);
                if let Some(source) = summary.source {
                    println!("    Source:   {}", source.display());
                }
            }
        }
        PersonasSubcommand::Check { .. } => {
            println!(
                "OK: {} personas, {} trigger bindings in {}",
                registry.personas().len(),
                registry.bindings().len(),
                dir.display()
            );
        }
        PersonasSubcommand::Match { text, .. } => match registry.find_match(&text) {
            Some(binding) => {
                println!(
                    "{} / {} (pattern: {})",
                    binding.persona.name(),
                    binding.action,
                    binding.pattern.as_str()
                );
            }
            None => {
                println!("No trigger matches.");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = MonstersConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            config::init_config(path.as_deref(), force)?;
        }
        ConfigSubcommand::Validate { config } => {
            MonstersConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
