use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "cwop",
    about = "Encode weather observations as APRS WX reports and transmit them to CWOP."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode an observation and transmit it to a CWOP server
    Send(commands::send::SendArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Send(args) => commands::send::handle_send(args).await,
    }
}
