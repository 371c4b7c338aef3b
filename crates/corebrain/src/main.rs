// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CoreBrain - natural-language questions over a document store.
//!
//! This is the binary entry point: the HTTP API plus one-shot commands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use corebrain_config::{ConfigError, CoreBrainConfig};
use corebrain_core::PermissionLevel;
use miette::{IntoDiagnostic, WrapErr};

/// CoreBrain - natural-language questions over a document store.
#[derive(Parser, Debug)]
#[command(name = "corebrain", version, about, long_about = None)]
struct Cli {
    /// Configuration file, layered over the default search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API.
    Serve,
    /// Answer one question and print the response JSON.
    Query {
        /// The question, in natural language.
        text: String,
        /// Collection to query.
        #[arg(long)]
        collection: Option<String>,
        /// Maximum documents to return.
        #[arg(long)]
        limit: Option<i64>,
        /// Permission level to run with.
        #[arg(long, default_value = "read")]
        level: PermissionLevel,
    },
    /// Print the collections and inferred fields visible at a level.
    Schema {
        #[arg(long, default_value = "read")]
        level: PermissionLevel,
    },
    /// Load a JSON array of documents into the SQLite document store.
    Import {
        collection: String,
        file: PathBuf,
    },
    /// Inspect the configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Check the configuration and report every problem found.
    Validate,
    /// Print the effective configuration with secrets masked.
    Show,
}

fn load_config(path: Option<&PathBuf>) -> Result<CoreBrainConfig, Vec<ConfigError>> {
    match path {
        Some(path) => corebrain_config::load_and_validate_path(path),
        None => corebrain_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            corebrain_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    if !matches!(cli.command, Commands::Config { .. }) {
        serve::init_tracing(&config.server.log_level);
    }

    match cli.command {
        Commands::Serve => serve::run_serve(config)
            .await
            .into_diagnostic()
            .wrap_err("server failed"),
        Commands::Query {
            text,
            collection,
            limit,
            level,
        } => commands::run_query(&config, text, collection, limit, level)
            .await
            .into_diagnostic()
            .wrap_err("query failed"),
        Commands::Schema { level } => commands::run_schema(&config, level)
            .await
            .into_diagnostic()
            .wrap_err("schema introspection failed"),
        Commands::Import { collection, file } => commands::run_import(&config, &collection, &file)
            .await
            .into_diagnostic()
            .wrap_err_with(|| format!("import of {} failed", file.display())),
        Commands::Config { action } => match action {
            ConfigAction::Validate => {
                println!("configuration is valid");
                Ok(())
            }
            ConfigAction::Show => {
                let rendered = corebrain_config::redacted_toml(&config)
                    .into_diagnostic()
                    .wrap_err("failed to render configuration")?;
                print!("{rendered}");
                Ok(())
            }
        },
    }
}
