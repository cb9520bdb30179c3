//! Syllabot CLI: the main entry point.
//!
//! Commands:
//! - `init`     — Write the default config
//! - `serve`    — Start the HTTP gateway
//! - `ask`      — Ask one question, streaming the answer
//! - `threads`  — List, show, rename or delete threads

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "syllabot",
    about = "Syllabot — curriculum-scoped RAG tutor",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write ~/.syllabot/config.toml with defaults
    Init,

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question within a curriculum scope
    Ask {
        /// Thread to continue (a new one is started when omitted)
        #[arg(short, long)]
        thread: Option<String>,

        #[arg(long)]
        semester: u8,

        #[arg(long)]
        subject: String,

        #[arg(long)]
        unit: u8,

        /// The question
        message: String,
    },

    /// Manage conversation threads
    Threads {
        #[command(subcommand)]
        command: ThreadsCommand,
    },
}

#[derive(Subcommand)]
pub enum ThreadsCommand {
    /// List threads, most recent first
    List,

    /// Print a thread's history
    Show { id: String },

    /// Set a thread's title
    Rename { id: String, title: String },

    /// Delete a thread and all its checkpoints
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask {
            thread,
            semester,
            subject,
            unit,
            message,
        } => commands::ask::run(thread, semester, subject, unit, message).await?,
        Commands::Threads { command } => commands::threads::run(command).await?,
    }

    Ok(())
}
