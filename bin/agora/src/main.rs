mod runtime;

use agora_core::Config;
use agora_dispatch::DispatchOutcome;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use runtime::Runtime;

#[derive(Parser)]
#[command(name = "agora")]
#[command(about = "Agent coordination and action-dispatch core", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch utterances against the reference wiring
    Chat {
        /// Persona answering the chat
        #[arg(short, long, default_value = "finn")]
        persona: String,

        /// Utterance to dispatch (interactive mode if not provided)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print the assembled conversation context for one utterance
    Context {
        /// Persona the context is built for
        #[arg(short, long, default_value = "finn")]
        persona: String,

        utterance: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_or_default(path)?,
        None => Config::default(),
    };
    let rt = Runtime::new(&config);

    match cli.command {
        Commands::Chat { persona, message } => match message {
            Some(message) => {
                print_outcome(&rt.dispatch(&persona, &message).await);
            }
            None => {
                let stdin = std::io::stdin();
                let mut out = std::io::stdout();
                loop {
                    write!(out, "{persona}> ")?;
                    out.flush()?;
                    let mut line = String::new();
                    if stdin.lock().read_line(&mut line)? == 0 {
                        break;
                    }
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == "/quit" {
                        break;
                    }
                    print_outcome(&rt.dispatch(&persona, line).await);
                }
            }
        },
        Commands::Context { persona, utterance } => {
            let context = rt.conversation_context(&persona, &utterance).await;
            if context.is_empty() {
                println!("(empty context)");
            } else {
                println!("{}", context.render());
            }
        }
    }

    rt.coordinator().shutdown();
    Ok(())
}

fn print_outcome(outcome: &DispatchOutcome) {
    match outcome.text() {
        Some(text) => println!("{text}"),
        None => println!("(no action matched)"),
    }
}
