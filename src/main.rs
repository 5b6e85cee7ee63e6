mod cli;
mod signal;

use clap::Parser;
use cli::{Commands, ConfigAction};
use compass::config::{self, Config, DiscoveryResult};
use compass::logging;
use signal::Interrupt;

#[derive(Parser, Debug)]
#[command(name = "compass", version)]
#[command(about = "Search cloud resources across many projects at once", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging on stderr (COMPASS_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(code) = dispatch(args.command) {
        std::process::exit(code);
    }
}

fn dispatch(command: Commands) -> Result<(), i32> {
    let discovery = config::discover();

    match command {
        Commands::Config { action } => match action {
            ConfigAction::Validate => cli::config::validate(&discovery),
            ConfigAction::Show => cli::config::show(&discovery),
        },
        Commands::Search(args) => {
            let (cfg, interrupt) = prepare(&discovery)?;
            cli::search::search(args, &cfg, &interrupt)
        }
        Commands::LookupIp(args) => {
            let (cfg, interrupt) = prepare(&discovery)?;
            cli::search::lookup_ip(args, &cfg, &interrupt)
        }
    }
}

fn prepare(discovery: &DiscoveryResult) -> Result<(Config, Interrupt), i32> {
    let cfg = config::load(discovery).map_err(|e| {
        eprintln!("{}", e);
        1
    })?;
    let interrupt = Interrupt::install().map_err(|e| {
        eprintln!("error: cannot install signal handlers: {}", e);
        1
    })?;
    Ok((cfg, interrupt))
}
