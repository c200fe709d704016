mod categorizer;
mod cli;
mod error;
mod export;
mod fmt;
mod fx;
mod importer;
mod models;
mod reconciler;
mod reports;
mod rules;
mod settings;
mod sheet;
#[cfg(test)]
mod testutil;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, RulesCommands};

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "tally=warn",
        1 => "tally=info",
        _ => "tally=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Init => cli::init::run(cli.data_dir.as_deref(), cli.year),
        Commands::Run => cli::run::run(&cli.year_dir()),
        Commands::Categorize => cli::categorize::run(&cli.year_dir()),
        Commands::Reconcile => cli::reconcile::run(&cli.year_dir()),
        Commands::Rules { command } => match command {
            RulesCommands::List => cli::rules::list(&cli.year_dir()),
            RulesCommands::Check => cli::rules::check(&cli.year_dir()),
        },
        Commands::Report => cli::report::run(&cli.year_dir()),
        Commands::Convert { amount, from, to } => cli::convert::run(&cli.year_dir(), *amount, from, to),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
