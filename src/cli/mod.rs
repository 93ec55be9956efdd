use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod context;
pub mod serve;

use crate::core::AppConfig;

#[derive(Subcommand)]
enum Command {
    /// Run the API server and chat web page
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Start a chat bot session in the terminal
    Chat {},
    /// Scrape the context pages and print the extracted text
    Context {},
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, AppConfig::from_env()?).await?;
        }
        Some(Command::Chat {}) => {
            chat::run(AppConfig::from_env()?).await?;
        }
        Some(Command::Context {}) => {
            context::run().await?;
        }
        None => {}
    }

    Ok(())
}
