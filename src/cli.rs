//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the meatmonsters responder.

use clap::{Parser, Subcommand};

/// MeatMonsters - trigger-driven persona responder
///
/// Loads a directory of personas, listens to a chat server over WebSocket and
/// answers matching messages with the persona's replies.
#[derive(Parser, Debug)]
#[command(name = "meatmonsters")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the responder (connects to the chat server and answers triggers)
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "MEATMONSTERS_CONFIG")]
        config: Option<String>,

        /// Override the personas directory
        #[arg(short, long)]
        personas: Option<String>,

        /// Override the chat server address (ws:// or wss://)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Inspect persona directories
    Personas {
        #[command(subcommand)]
        subcommand: PersonasSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

/// Persona subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PersonasSubcommand {
    /// List loaded personas with their actions and trigger counts
    List {
        /// Personas directory (defaults to the configured one)
        #[arg(short, long)]
        dir: Option<String>,

        /// Path to configuration file
        #[arg(short, long, env = "MEATMONSTERS_CONFIG")]
        config: Option<String>,
    },

    /// Load every persona and report the first problem found
    Check {
        /// Personas directory (defaults to the configured one)
        #[arg(short, long)]
        dir: Option<String>,

        /// Path to configuration file
        #[arg(short, long, env = "MEATMONSTERS_CONFIG")]
        config: Option<String>,
    },

    /// Show which persona and action a message would trigger
    Match {
        /// Message text to test
        text: String,

        /// Personas directory (defaults to the configured one)
        #[arg(short, long)]
        dir: Option<String>,

        /// Path to configuration file
        #[arg(short, long, env = "MEATMONSTERS_CONFIG")]
        config: Option<String>,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

impl PersonasSubcommand {
    /// The `--dir` and `--config` options shared by every variant
    pub fn location(&self) -> (Option<&str>, Option<&str>) {
        match self {
            PersonasSubcommand::List { dir, config }
            | PersonasSubcommand::Check { dir, config }
            | PersonasSubcommand::Match { dir, config, .. } => (dir.as_deref(), config.as_deref()),
        }
    }
}
