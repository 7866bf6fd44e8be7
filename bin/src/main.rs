//! candlestream CLI - Binance aggTrade to OHLCV candlestick aggregator.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

mod commands;
mod display;
mod telemetry;

use commands::{replay::ReplayArgs, serve::ServeArgs, tail::TailArgs};

#[derive(Parser)]
#[command(name = "candlestream")]
#[command(about = "Aggregate live trades into OHLCV candlesticks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (only warnings and errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate the live trade stream and serve bars over TCP
    Serve(ServeArgs),

    /// Aggregate a recorded trade file
    Replay(ReplayArgs),

    /// Connect to a running server and print bars as they arrive
    Tail(TailArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::load_dotenv();
    let cli = Cli::parse();

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    telemetry::init(cli.verbose, cli.quiet);

    match command {
        Commands::Serve(args) => commands::serve::serve(args).await,
        Commands::Replay(args) => commands::replay::replay(args, cli.quiet).await,
        Commands::Tail(args) => commands::tail::tail(args).await,
    }
}
