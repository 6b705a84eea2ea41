//! attrstore CLI
//!
//! Command-line tools for attribute store maintenance.
//!
//! # Commands
//!
//! - `dump` - Print stored entries, optionally for one document
//! - `get` / `set` / `remove` - Read or change a single entry
//! - `remove-document` - Drop every entry of a document
//! - `migrate` - Import a legacy JSON datastore
//! - `verify` - Check that every entry decodes
//! - `compact` - Rewrite the log without dead records

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Attribute store command-line tools.
#[derive(Parser)]
#[command(name = "attrstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One line per entry
    Text,
    /// Nested JSON object, as in the legacy datastore
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print stored entries
    Dump {
        /// Only dump this document
        #[arg(short, long)]
        document: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Print one value
    Get {
        /// Document URI
        document: String,
        /// Element id
        id: String,
        /// Attribute name
        attribute: String,
    },

    /// Store one value
    Set {
        /// Document URI
        document: String,
        /// Element id
        id: String,
        /// Attribute name
        attribute: String,
        /// Value to store
        value: String,
    },

    /// Remove one value
    Remove {
        /// Document URI
        document: String,
        /// Element id
        id: String,
        /// Attribute name
        attribute: String,
    },

    /// Remove every value of a document
    RemoveDocument {
        /// Document URI
        document: String,
    },

    /// Import a legacy JSON datastore
    Migrate {
        /// Path to the JSON file
        json: PathBuf,

        /// Delete the JSON file after a successful import
        #[arg(long)]
        delete: bool,
    },

    /// Check that every stored entry decodes
    Verify {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Rewrite the log without dead records
    Compact,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = cli.path.ok_or("Store path required (--path <dir>)")?;

    match cli.command {
        Commands::Dump { document, format } => {
            commands::dump::run(&path, document.as_deref(), format)?;
        }
        Commands::Get {
            document,
            id,
            attribute,
        } => {
            commands::entry::get(&path, &document, &id, &attribute)?;
        }
        Commands::Set {
            document,
            id,
            attribute,
            value,
        } => {
            commands::entry::set(&path, &document, &id, &attribute, &value)?;
        }
        Commands::Remove {
            document,
            id,
            attribute,
        } => {
            commands::entry::remove(&path, &document, &id, &attribute)?;
        }
        Commands::RemoveDocument { document } => {
            commands::entry::remove_document(&path, &document)?;
        }
        Commands::Migrate { json, delete } => {
            commands::migrate::run(&path, &json, delete)?;
        }
        Commands::Verify { format } => {
            commands::verify::run(&path, format)?;
        }
        Commands::Compact => {
            commands::compact::run(&path)?;
        }
    }

    Ok(())
}
