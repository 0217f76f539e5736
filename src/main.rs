mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use recollect::{config, server};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recollect", version, about = "Conversational memory agent for chat assistants")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the webhook server
    Serve,
    /// Create the database and the semantic memory collection
    Init,
    /// Run database diagnostics
    Doctor,
    /// Print the current history window for an identity
    History {
        identity: String,
        /// Window size (defaults to the configured history limit)
        #[arg(long)]
        limit: Option<usize>,
        /// Print every logged turn instead of the window
        #[arg(long)]
        all: bool,
    },
    /// Manage persona instructions
    Persona {
        #[command(subcommand)]
        action: PersonaAction,
    },
    /// Search long-term memories for an identity
    Recall { identity: String, query: String },
}

#[derive(Subcommand)]
enum PersonaAction {
    /// Set persona instructions for one identity, or the default profile
    Set {
        #[arg(long, conflicts_with = "default", required_unless_present = "default")]
        identity: Option<String>,
        #[arg(long)]
        default: bool,
        instruction: String,
    },
    /// Show which instructions an identity would receive
    Show { identity: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = config::RecollectConfig::load()?;

    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve(config).await?,
        Command::Init => cli::init(&config).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::History {
            identity,
            limit,
            all,
        } => cli::history::history(&config, &identity, limit, all).await?,
        Command::Persona { action } => match action {
            PersonaAction::Set {
                identity,
                default: _,
                instruction,
            } => cli::persona::set(&config, identity.as_deref(), &instruction).await?,
            PersonaAction::Show { identity } => cli::persona::show(&config, &identity).await?,
        },
        Command::Recall { identity, query } => cli::recall::recall(&config, &identity, &query).await?,
    }

    Ok(())
}
