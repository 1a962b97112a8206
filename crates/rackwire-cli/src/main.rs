//! rackwire CLI - compile, inspect and render module patches.

mod commands;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rackwire")]
#[command(author, version, about = "rackwire patch compiler and renderer", long_about = None)]
struct Cli {
    /// Log graph and compiler events (-v debug, -vv trace); overrides RUST_LOG
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a patch and print its action list
    Schedule(commands::schedule::ScheduleArgs),

    /// Run a patch for a number of blocks and write one output to WAV
    Render(commands::render::RenderArgs),

    /// List module kinds, their ports and parameters
    Modules(commands::modules::ModulesArgs),
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Schedule(args) => commands::schedule::run(args),
        Commands::Render(args) => commands::render::run(args),
        Commands::Modules(args) => commands::modules::run(args),
    }
}
