//! imessage-history - search iMessage history by contact
//!
//! Resolves a name, phone number or email against Contacts and the local
//! Messages database, then prints or exports the conversation.
//!
//! CHANGELOG:
//! - 10/19/2026 - search/contacts commands, settings, verbosity flags
//! - 01/10/2026 - Initial scaffold with CLI skeleton

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use imessage_history::commands::{self, search::SearchOptions};
use imessage_history::config::{self, Settings};
use imessage_history::db::SortOrder;
use imessage_history::output::{self, OutputControls};

/// Search iMessage history by contact name, phone number or email.
#[derive(Parser, Debug)]
#[command(name = "imessage-history")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to Messages chat.db
    #[arg(long, global = true, env = config::DB_PATH_ENV)]
    db: Option<String>,

    /// Path to the contact cache file
    #[arg(long, global = true, env = config::CACHE_PATH_ENV)]
    cache: Option<String>,

    /// Read contacts from a JSON export instead of Contacts.app
    #[arg(long, global = true, env = config::CONTACTS_PATH_ENV)]
    contacts_file: Option<String>,

    /// Seconds to wait for the Contacts permission prompt
    #[arg(long, global = true, env = config::DIRECTORY_TIMEOUT_ENV)]
    directory_timeout: Option<u64>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Compact JSON output (no whitespace)
    #[arg(long, global = true)]
    compact: bool,

    /// Comma-separated field allowlist
    #[arg(long, global = true)]
    fields: Option<String>,

    /// Truncate text fields to this length
    #[arg(long, global = true)]
    max_text_chars: Option<u32>,

    /// Log more (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find messages with a contact (name, phone number or email)
    Search {
        /// Name, phone number or email
        query: String,

        /// Oldest messages first
        #[arg(long)]
        asc: bool,

        /// Max messages to return
        #[arg(short, long, default_value_t = commands::search::DEFAULT_LIMIT)]
        limit: u32,

        /// Return the full history
        #[arg(long, conflicts_with = "limit")]
        no_limit: bool,

        /// Export to CSV (defaults to messages-YYYY-MM-DD.csv)
        #[arg(long, num_args = 0..=1, require_equals = true, value_name = "PATH")]
        csv: Option<Option<PathBuf>>,

        /// CSV field delimiter
        #[arg(long, default_value_t = ',')]
        delimiter: char,

        /// Rebuild the contact cache before searching
        #[arg(long)]
        refresh_cache: bool,
    },

    /// List everyone with message history
    Contacts,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    init_tracing(cli.verbose);

    let settings = Settings::resolve(
        cli.db.as_deref(),
        cli.cache.as_deref(),
        cli.contacts_file.as_deref(),
        cli.directory_timeout,
    );

    // Build output controls from global flags
    let output_controls = OutputControls {
        json: cli.json,
        compact: cli.compact,
        fields: cli.fields.clone(),
        max_text_chars: cli.max_text_chars,
    };

    let result = match cli.command {
        Command::Search {
            query,
            asc,
            limit,
            no_limit,
            csv,
            delimiter,
            refresh_cache,
        } => {
            let options = SearchOptions {
                order: if asc { SortOrder::Asc } else { SortOrder::Desc },
                limit: if no_limit { None } else { Some(limit) },
                csv,
                delimiter,
                refresh_cache,
            };
            commands::search::run(&settings, &query, &options, &output_controls)
        }
        Command::Contacts => commands::contacts::list(&settings, &output_controls),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                println!("{}", output::format_error(&format!("{:#}", e)));
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(1)
        }
    }
}
