use std::fs;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use molgraph::Molecule;
use retort::{KnownStrategy, PolymerizationReactor, PropagateOptions, ReactionSchema};

/// Applies a mapped reaction template to monomers and prints the products
/// and recovered fragments of each chain-propagation step
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Mapped reaction SMARTS, or a path to a .rxn reaction file
    #[arg(short, long)]
    reaction: String,
    /// Monomer SMILES strings
    #[arg(required = true)]
    monomers: Vec<String>,
    /// Stop after this many steps even if the chain could keep growing
    #[arg(long)]
    max_steps: Option<usize>,
    /// Fragmentation strategy for recovering monomer-scale pieces
    #[arg(long, default_value = "reseparate_at_former_attachment_points")]
    strategy: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let schema = if args.reaction.ends_with(".rxn") {
        let text = fs::read_to_string(&args.reaction).into_diagnostic()?;
        ReactionSchema::from_rxnfile(&text)?
    } else {
        ReactionSchema::from_smarts(&args.reaction)?
    };
    if !schema.name().is_empty() {
        println!("reaction: {}", schema.name());
    }

    let strategy = KnownStrategy::lookup(&args.strategy)?;
    let monomers = args
        .monomers
        .iter()
        .map(|smiles| Molecule::from_smiles(smiles))
        .collect::<Result<Vec<_>, _>>()?;

    let reactor = PolymerizationReactor::new(schema);
    let steps = reactor.propagate(monomers, strategy, PropagateOptions::default());
    let mut grew = false;
    for (number, step) in steps.take(args.max_steps.unwrap_or(usize::MAX)).enumerate() {
        let step = step?;
        grew = true;
        println!("step {}:", number + 1);
        for product in &step.products {
            println!("  product:  {}", product.to_smiles());
        }
        for fragment in &step.fragments {
            println!("  fragment: {}", fragment.to_smiles());
        }
    }
    if !grew {
        println!("no reaction applicable to the given monomers");
    }
    Ok(())
}
