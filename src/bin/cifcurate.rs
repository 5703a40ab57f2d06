use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{chains, entities, residues};

#[derive(Parser, Debug)]
#[command(
    name = "cifcurate",
    about = "Curates batches of mmCIF depositions of the same assembly: entity naming, chain identifiers, and residue numbering.",
    version,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assign destination chain ids per entity and resolve concatenations.
    Entities(entities::EntitiesArgs),
    /// Reconcile chain identifiers against canonical sequences.
    Chains(chains::ChainsArgs),
    /// Standardize residue numbering across all depositions.
    Residues(residues::ResiduesArgs),
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Entities(args) => entities::run(&args),
        Command::Chains(args) => chains::run(&args),
        Command::Residues(args) => residues::run(&args),
    }
}
