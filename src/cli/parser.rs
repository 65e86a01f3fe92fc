use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface definition for worktrack
/// Project and time-tracking backend with a realtime desktop channel
#[derive(Parser, Debug)]
#[command(
    name = "worktrack",
    version = env!("CARGO_PKG_VERSION"),
    about = "Project/time-tracking REST backend with desktop change notifications over WebSocket",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Read configuration from this file instead of the default location
    #[arg(global = true, long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API and the desktop realtime channel
    Serve {
        /// Listen address, e.g. 0.0.0.0:8080 (overrides config)
        #[arg(long = "bind", value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Initialize the database and configuration
    Init,

    /// Database maintenance
    Db {
        /// Apply pending schema migrations
        #[arg(long = "migrate", help = "Apply pending schema migrations")]
        migrate: bool,

        /// Run SQLite integrity check
        #[arg(long = "check", help = "Run PRAGMA integrity_check")]
        check: bool,

        /// Compact the database file
        #[arg(long = "vacuum", help = "Run VACUUM on the database")]
        vacuum: bool,

        /// Print database file and table statistics
        #[arg(long = "info", help = "Show database information")]
        info: bool,
    },

    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserAction {
    /// Create a user (bootstrap the first admin with this)
    Add {
        #[arg(long)]
        login: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        password: String,

        /// admin, manager or worker
        #[arg(long, default_value = "worker")]
        role: String,
    },

    /// List users
    List,
}
