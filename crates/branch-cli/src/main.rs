use std::sync::Arc;

use branch_core::{Message, Workspace};
use branch_llm::HttpBackend;
use branch_session::Session;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod command;
mod render;
mod repl;

use repl::{with_live_output, Repl};

#[derive(Parser)]
#[command(name = "branch-cli")]
#[command(about = "Chat with side branches you can merge back as notes")]
#[command(version)]
struct Cli {
    #[arg(long, env = "BRANCH_SERVER_URL", default_value = "http://127.0.0.1:5000")]
    server_url: String,

    /// Seed the main conversation with a system message
    #[arg(long)]
    system: Option<String>,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session (default)
    Chat,
    /// Send a single message on the main conversation and print the reply
    Ask {
        /// Message content
        message: String,
    },
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    tracing::debug!(server_url = %cli.server_url, "Starting client");

    let workspace = match cli.system.as_deref().map(str::trim) {
        Some(prompt) if !prompt.is_empty() => Workspace::with_messages(vec![Message::system(prompt)]),
        _ => Workspace::new(),
    };
    let backend = Arc::new(HttpBackend::new(cli.server_url.clone()));
    let session = Session::with_workspace(backend, workspace);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => Repl::new(session).run().await,
        Commands::Ask { message } => ask(&session, &message).await,
    }
}

async fn ask(session: &Session, message: &str) -> anyhow::Result<()> {
    if let Err(err) = with_live_output(session, session.send_main(message)).await {
        eprintln!("{}", format!("❌ {err}").red());
        return Err(err.into());
    }
    Ok(())
}
