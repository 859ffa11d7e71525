//! Grove CLI entry point

use clap::{Parser, Subcommand};
use grove_core::GroveConfig;
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "grove")]
#[command(about = "Code symbol graph engine: index, query and lay out a workspace", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Repository root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the workspace and serve commands and signals over HTTP/WebSocket
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,
    },
    /// Index the workspace and print counts
    Index,
    /// Run a symbol query and print the result as JSON
    Query {
        /// Comma-separated name patterns, or free text with --natural
        text: String,

        /// Treat the text as a natural-language query
        #[arg(short, long)]
        natural: bool,

        /// Maximum number of symbols to return
        #[arg(short, long)]
        limit: Option<i64>,
    },
    /// Lay out the symbols matching a pattern and print positions plus a quality report
    Layout {
        /// Comma-separated name patterns
        pattern: String,

        /// Layout algorithm (defaults to the configured one)
        #[arg(short, long)]
        algorithm: Option<String>,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GroveConfig::load(&cli.root)?;
    logging::init(&config.logging, cli.verbose);

    tracing::debug!("Grove v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Repository root: {}", cli.root.display());

    match cli.command {
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            commands::serve(&cli.root, &config, host, port).await
        }
        Commands::Index => commands::index(&cli.root, &config).await,
        Commands::Query { text, natural, limit } => commands::query(&cli.root, &config, &text, natural, limit).await,
        Commands::Layout { pattern, algorithm } => {
            commands::layout(&cli.root, &config, &pattern, algorithm.as_deref()).await
        }
        Commands::Version => {
            println!("Grove v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
