//! Module kind listing and information command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use rackwire_core::PortSpec;
use rackwire_modules::UnitKind;

#[derive(Args)]
pub struct ModulesArgs {
    /// Show details for a specific module kind
    #[arg(value_name = "KIND")]
    kind: Option<String>,
}

pub fn run(args: ModulesArgs) -> anyhow::Result<()> {
    if let Some(name) = &args.kind {
        let kind = UnitKind::from_name(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown module kind: {}", name))?;

        println!("{}", kind.name());
        println!("{}", "=".repeat(kind.name().len()));
        println!();

        print_ports("Inputs", kind.inputs());
        print_ports("Outputs", kind.outputs());

        println!("Parameters:");
        println!();
        if kind.params().is_empty() {
            println!("  (none)");
        } else {
            println!("  {:12}  {:12}  {}", "Name", "Default", "Range");
            println!("  {:12}  {:12}  {}", "----", "-------", "-----");
            for param in kind.params() {
                if param.is_choice() {
                    let default = param.choices[param.default as usize];
                    println!(
                        "  {:12}  {:12}  {}",
                        param.name,
                        default,
                        param.choices.join(" | ")
                    );
                } else {
                    println!(
                        "  {:12}  {:12}  {} to {}",
                        param.name, param.default, param.min, param.max
                    );
                }
            }
        }
        println!();
    } else {
        println!("Module Kinds");
        println!("============");
        println!();

        for kind in UnitKind::ALL {
            println!(
                "  {:12} in: {:20} out: {}",
                kind.name(),
                port_names(kind.inputs()),
                port_names(kind.outputs())
            );
        }

        println!();
        println!("Use 'rackwire modules <kind>' for port types and parameters.");
    }

    Ok(())
}

fn print_ports(title: &str, ports: &[PortSpec]) {
    println!("{}:", title);
    if ports.is_empty() {
        println!("  (none)");
    }
    for port in ports {
        let summing = if port.summing { "  (summing)" } else { "" };
        println!("  {:12}  {}{}", port.name, port.element, summing);
    }
    println!();
}

fn port_names(ports: &[PortSpec]) -> String {
    if ports.is_empty() {
        return "-".to_string();
    }
    ports
        .iter()
        .map(|p| format!("{}:{}", p.name, p.element))
        .collect::<Vec<_>>()
        .join(", ")
}
