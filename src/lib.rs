//! worktrack library root.
//! Exposes the CLI parser, the high-level run() function, the HTTP router
//! and the internal modules it is built from.

pub mod auth;
pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod errors;
pub mod http;
pub mod models;
pub mod notify;
pub mod realtime;
pub mod ui;
pub mod utils;

use clap::Parser;
use cli::parser::{Cli, Commands};
use config::Config;
use errors::AppResult;

/// Central command dispatcher
pub async fn dispatch(cli: &Cli, cfg: &Config) -> AppResult<()> {
    match &cli.command {
        Commands::Serve { bind } => cli::commands::serve::handle(cfg, bind.clone()).await,
        Commands::Init => cli::commands::init::handle(cli),
        Commands::Db { .. } => cli::commands::db::handle(&cli.command, cfg),
        Commands::User { action } => cli::commands::user::handle(action, cfg).await,
    }
}

/// Entry point used by main.rs
pub async fn run() -> AppResult<()> {
    let cli = Cli::parse();

    // Config is loaded once; `--db` wins over file and environment.
    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(custom_db) = &cli.db {
        cfg.database = custom_db.clone();
    }

    dispatch(&cli, &cfg).await
}
