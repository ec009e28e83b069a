//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing. Subcommands follow a
//! verb-noun pattern (e.g., `parley session list`).

pub mod chat;
pub mod session;
pub mod usage;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::client::ClientOptions;

/// Chat with the studio desk, with a daily turn quota.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the quota server.
    Serve {
        /// Port to listen on (default: server.port from config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (default: server.host from config.toml).
        #[arg(long)]
        host: Option<String>,
    },

    /// Start an interactive chat.
    Chat(ChatArgs),

    /// Manage chat sessions.
    #[command(alias = "sessions")]
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// Show how many turns are left today.
    Usage {
        /// Quota server URL (default: chat.server_url from config.toml).
        #[arg(long, env = "PARLEY_SERVER_URL")]
        server: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// Quota server URL (default: chat.server_url from config.toml).
    #[arg(long, env = "PARLEY_SERVER_URL")]
    pub server: Option<String>,

    /// Use an in-process quota instead of a server (ignores --server).
    /// Resets when chat exits.
    #[arg(long)]
    pub local: bool,

    /// Keep history and attachments in memory only.
    #[arg(long)]
    pub ephemeral: bool,
}

impl From<ChatArgs> for ClientOptions {
    fn from(args: ChatArgs) -> Self {
        ClientOptions {
            server: args.server,
            local: args.local,
            ephemeral: args.ephemeral,
        }
    }
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// List sessions, most recently updated first.
    #[command(alias = "ls")]
    List,

    /// Create a session and make it active.
    New,

    /// Make a session active.
    Switch {
        /// List position (1 = most recent) or session ID / ID prefix.
        target: String,
    },

    /// Delete a session.
    #[command(alias = "rm")]
    Delete {
        /// List position (1 = most recent) or session ID / ID prefix.
        target: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Print a session's messages.
    Show {
        /// List position or session ID; defaults to the active session.
        target: Option<String>,
    },
}
