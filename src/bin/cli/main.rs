mod client;
mod commands;
mod output;

use std::net::SocketAddr;
use std::process;

use clap::{Parser, Subcommand};
use client::{ClientError, EngramClient};
use engram::config;
use output::{OutputConfig, OutputFormat};
use reqwest::StatusCode;

/// Used when neither a flag nor the config file names a server
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Study flashcards against a running engram server
///
/// Cards are shown one at a time with `study next` and graded with
/// `study answer`. The server schedules each card again from the grade.
#[derive(Parser, Debug)]
#[clap(name = "engram-cli", version, about = "Study and manage decks on an engram server")]
struct Cli {
    /// Base URL of the engram server
    #[clap(long, env = "ENGRAM_URL", global = true)]
    server_url: Option<String>,

    /// Output format
    #[clap(long, value_enum, default_value_t = OutputFormat::Human, global = true)]
    format: OutputFormat,

    /// Print only ids and counts
    #[clap(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the next card, answer it, check what is left today
    #[command(subcommand, visible_alias = "s")]
    Study(commands::study::StudyCommands),
    /// List, create, select, rename and remove decks
    #[command(subcommand, visible_alias = "d")]
    Deck(commands::deck::DeckCommands),
    /// Gather cards by search into a temporary deck
    #[command(subcommand)]
    Filtered(commands::filtered::FilteredCommands),
    /// Add notes; each note yields one card per template
    #[command(subcommand)]
    Note(commands::note::NoteCommands),
    /// Show a card, or suspend, bury or forget cards
    #[command(subcommand)]
    Card(commands::card::CardCommands),
}

/// Turns the server's `listen_addr` into a URL a client can reach
///
/// A server bound to every interface is reached through loopback.
fn url_for_listen_addr(addr: &str) -> String {
    match addr.parse::<SocketAddr>() {
        Ok(sock) if sock.ip().is_unspecified() => format!("http://127.0.0.1:{}", sock.port()),
        _ => format!("http://{}", addr),
    }
}

/// Picks the server URL: `--server-url` or `ENGRAM_URL`, then the server's
/// own `listen_addr` from the config file, then [`DEFAULT_SERVER_URL`]
fn resolve_server_url(cli_url: Option<String>) -> String {
    if let Some(url) = cli_url {
        return url;
    }

    let config_path = config::get_config_dir_path().map(|dir| dir.join("config.toml"));
    match config::config_from_file(config_path) {
        Ok(update) => update
            .listen_addr
            .map(|addr| url_for_listen_addr(&addr))
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
        Err(_) => DEFAULT_SERVER_URL.to_string(),
    }
}

/// Adds a hint for the failures a study session commonly runs into
fn format_error(err: &(dyn std::error::Error + 'static)) -> String {
    let hint = match err.downcast_ref::<ClientError>() {
        Some(ClientError::Request(req)) if req.is_connect() || req.is_timeout() => {
            Some("Could not reach the server. Is `engram` running?")
        }
        Some(ClientError::Server { status, .. }) if *status == StatusCode::CONFLICT => {
            Some("Answer the card shown by `study next`, or fetch it again.")
        }
        Some(ClientError::Server { status, .. }) if *status == StatusCode::NOT_FOUND => {
            Some("Check the id with `deck list` or `card show`.")
        }
        _ => None,
    };

    match hint {
        Some(hint) => format!("{}\n  {}", err, hint),
        None => err.to_string(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = EngramClient::new(resolve_server_url(cli.server_url));
    let output_config = OutputConfig {
        format: cli.format,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Commands::Study(cmd) => commands::study::execute(&client, cmd, &output_config).await,
        Commands::Deck(cmd) => commands::deck::execute(&client, cmd, &output_config).await,
        Commands::Filtered(cmd) => commands::filtered::execute(&client, cmd, &output_config).await,
        Commands::Note(cmd) => commands::note::execute(&client, cmd, &output_config).await,
        Commands::Card(cmd) => commands::card::execute(&client, cmd, &output_config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", format_error(e.as_ref()));
        process::exit(1);
    }
}
