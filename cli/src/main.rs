//! yagent command line host.
//!
//! Loads the agent configuration and state, runs one agent command and
//! saves the state again. Emitted events are printed to stdout as JSON
//! lines; logs go to stderr.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};
use yagent_agents::Payload;

mod commands;
mod config;

/// Classify, search and summarize events with Yandex Foundation Models.
#[derive(Debug, Parser)]
#[command(name = "yagent", version, about, long_about = None)]
struct Cli {
    /// Agent configuration file.
    #[arg(long, short, env = "YAGENT_CONFIG", default_value = "agent.toml")]
    config: PathBuf,

    /// Directory holding embeddings, pending operations and events.
    #[arg(long, env = "YAGENT_STATE_DIR", default_value = ".yagent")]
    state_dir: PathBuf,

    /// Verbosity level (-v, -vv); `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Label a text with the configured classifier labels.
    Classify {
        /// Text to classify.
        #[arg(long)]
        text: String,

        #[command(flatten)]
        event: EventArgs,
    },

    /// Find the candidate documents closest to a query.
    Search {
        /// Search query.
        #[arg(long)]
        query: String,

        #[command(flatten)]
        event: EventArgs,
    },

    /// Start an asynchronous completion for an event.
    Submit {
        /// User prompt, e.g. the article to summarize.
        #[arg(long)]
        prompt: String,

        #[command(flatten)]
        event: EventArgs,
    },

    /// Poll pending completions and print the finished ones.
    Check {
        /// Keep polling every this many seconds until interrupted.
        #[arg(long, value_name = "SECONDS")]
        watch: Option<u64>,
    },
}

/// The incoming event an agent works on.
#[derive(Debug, Args)]
struct EventArgs {
    /// Event id; completions are matched back to their event by it.
    #[arg(long = "id", default_value = "cli")]
    id: String,

    /// Event payload as a JSON object.
    #[arg(long, value_parser = parse_payload)]
    payload: Option<Payload>,
}

fn parse_payload(value: &str) -> Result<Payload, String> {
    serde_json::from_str(value).map_err(|e| format!("payload must be a JSON object: {e}"))
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load(&cli.config).await?;
    let ctx = commands::Context::new(config, &cli.state_dir);

    match cli.command {
        Command::Classify { text, event } => ctx.classify(event.into_event(), &text).await,
        Command::Search { query, event } => ctx.search(event.into_event(), &query).await,
        Command::Submit { prompt, event } => ctx.submit(event.into_event(), &prompt).await,
        Command::Check { watch } => ctx.check(watch).await,
    }
}

impl EventArgs {
    fn into_event(self) -> yagent_agents::Event {
        yagent_agents::Event::new(self.id).with_payload(self.payload.unwrap_or_default())
    }
}
