//! HBnB console - Admin shell over the configured storage backend
//!
//! Runs one command given on the command line, or reads commands from stdin
//! until `quit` or end of input. Logs go to stderr; command output to stdout.

use std::io::{IsTerminal, Write};

use clap::Parser;
use hbnb::config::StorageConfig;
use hbnb::console::{Console, Reply, PROMPT};
use hbnb::{storage, APP_NAME, APP_VERSION};
use tokio::io::{AsyncBufReadExt, BufReader};

// =============================================================================
// CLI
// =============================================================================

/// HBnB console
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "Admin console for HBnB storage (file or Postgres)")]
#[command(version)]
struct Cli {
    /// Storage file for the file backend (overrides HBNB_FILE_PATH)
    #[arg(short, long)]
    file: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run this command and exit
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    tracing::info!("HBnB console v{}", APP_VERSION);

    dotenvy::dotenv().ok();
    let mut config = StorageConfig::from_env()?;
    if let Some(file) = &cli.file {
        config.file_path = shellexpand::tilde(file).to_string().into();
    }

    let mut backend = storage::open(&config).await?;
    let result = {
        let mut console = Console::new(backend.as_mut());
        if cli.command.is_empty() {
            run_loop(&mut console).await
        } else {
            run_line(&mut console, &cli.command.join(" ")).await;
            Ok(())
        }
    };
    backend.close().await;

    result
}

/// Execute one line and print its output. Returns `false` on quit.
async fn run_line(console: &mut Console<'_>, line: &str) -> bool {
    match console.execute(line).await {
        Ok(Reply::Output(output)) => {
            if !output.is_empty() {
                println!("{output}");
            }
            true
        }
        Ok(Reply::Quit) => false,
        Err(e) => {
            tracing::debug!(line = %line, error = %e, "Command failed");
            println!("{e}");
            true
        }
    }
}

async fn run_loop(console: &mut Console<'_>) -> anyhow::Result<()> {
    let interactive = std::io::stdin().is_terminal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if interactive {
            print!("{PROMPT}");
            std::io::stdout().flush()?;
        }

        let Some(line) = lines.next_line().await? else {
            if interactive {
                println!();
            }
            break;
        };

        if !run_line(console, &line).await {
            break;
        }
    }
    Ok(())
}
