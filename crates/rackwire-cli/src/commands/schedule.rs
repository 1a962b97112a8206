//! Patch compilation and schedule listing.

use crate::commands::common::{load_patch, parse_key_val};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ScheduleArgs {
    /// Patch file (TOML)
    #[arg(value_name = "PATCH")]
    patch: PathBuf,

    /// Override a parameter (module.param=value), can be repeated
    #[arg(long = "param", value_parser = parse_key_val)]
    params: Vec<(String, String)>,

    /// Check ordering and coverage rules on the compiled sequence
    #[arg(long)]
    verify: bool,
}

pub fn run(args: ScheduleArgs) -> anyhow::Result<()> {
    let (patch, built) = load_patch(&args.patch, &args.params)?;
    let sequence = built.graph.compile()?;

    println!("Patch: {}", patch.name);
    if let Some(description) = &patch.description {
        println!("  {}", description);
    }
    println!();

    println!("Modules:");
    for module in &patch.modules {
        if let Some(id) = built.module(&module.id) {
            println!("  {:14}  {:12}  {}", id.to_string(), module.kind, module.id);
        }
    }
    println!();

    println!("Actions:");
    print!("{sequence}");
    println!();

    let counts = sequence.counts();
    println!(
        "{} actions: {} clear, {} alias, {} copy, {} add, {} render",
        counts.total(),
        counts.clear,
        counts.alias,
        counts.copy,
        counts.add,
        counts.render
    );

    if args.verify {
        sequence.verify()?;
        println!("Schedule verified.");
    }

    Ok(())
}
