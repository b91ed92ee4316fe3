mod error;

use clap::{Parser, Subcommand};
use error::{CliError, CliResult};
use fm_graph::Model;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "fm-cli")]
#[command(
    about = "FlightMath CLI - evaluate gridded flight-vehicle math models",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a model file and check that it wires up
    Validate {
        /// Path to the model YAML or JSON file
        model_path: PathBuf,
    },
    /// Print the computed execution order
    Order {
        /// Path to the model YAML or JSON file
        model_path: PathBuf,
    },
    /// Evaluate one cycle and print the outputs
    Eval {
        /// Path to the model YAML or JSON file
        model_path: PathBuf,
        /// Input assignment NAME=VALUE (variable ID or name); repeatable
        #[arg(short, long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
        /// Print the output vector as JSON
        #[arg(long)]
        json: bool,
    },
    /// Summarize signals, blocks and tables
    Describe {
        /// Path to the model YAML or JSON file
        model_path: PathBuf,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate { model_path } => cmd_validate(&model_path),
        Commands::Order { model_path } => cmd_order(&model_path),
        Commands::Eval {
            model_path,
            set,
            json,
        } => cmd_eval(&model_path, &set, json),
        Commands::Describe { model_path } => cmd_describe(&model_path),
    }
}

fn load_model(path: &Path) -> CliResult<Model> {
    let doc = fm_project::load(path)?;
    info!(model = %doc.name, variables = doc.variables.len(), "loaded model document");
    Ok(fm_project::build_model(&doc)?)
}

fn cmd_validate(model_path: &Path) -> CliResult<()> {
    println!("Validating model: {}", model_path.display());
    let mut model = load_model(model_path)?;
    model.initialize()?;
    if model.verify_integrity() {
        println!("✓ Model is valid");
    } else {
        println!("✗ Model has wiring issues:");
        for issue in model.integrity_issues() {
            println!("  {issue}");
        }
    }
    Ok(())
}

fn cmd_order(model_path: &Path) -> CliResult<()> {
    let mut model = load_model(model_path)?;
    model.initialize()?;
    let order = model.execution_order().unwrap_or_default();
    println!("Execution order ({} blocks):", order.len());
    for (pos, &id) in order.iter().enumerate() {
        if let Some(block) = model.block(id) {
            println!("  {:>4}  {:<32} {}", pos, block.name(), block.kind().tag());
        }
    }
    Ok(())
}

fn cmd_eval(model_path: &Path, assignments: &[String], json: bool) -> CliResult<()> {
    let mut model = load_model(model_path)?;
    for assignment in assignments {
        let (name, value) = parse_assignment(assignment)?;
        debug!(input = name, value, "setting input");
        model.set_input_value(name, value)?;
    }
    model.cycle()?;

    if json {
        println!("{}", serde_json::to_string_pretty(model.outputs())?);
        return Ok(());
    }
    println!("Outputs after cycle {}:", model.epoch());
    for entry in model.outputs() {
        println!(
            "  {:<24} {:>16} {}",
            entry.var_id,
            format!("{:.6}", entry.value),
            entry.units
        );
    }
    Ok(())
}

fn cmd_describe(model_path: &Path) -> CliResult<()> {
    let model = load_model(model_path)?;
    println!("Model: {}", model.name());
    println!("Signals ({}):", model.signals().len());
    for signal in model.signals() {
        let flags = signal.flags();
        let mut roles = Vec::new();
        if flags.input {
            roles.push("input");
        }
        if flags.output {
            roles.push("output");
        }
        if flags.derived {
            roles.push("derived");
        }
        println!(
            "  {:<24} {:<12} [{}]",
            signal.var_id(),
            signal.units(),
            roles.join(", ")
        );
    }
    println!("Blocks ({}):", model.blocks().len());
    for (tag, count) in model.block_census() {
        println!("  {tag:<12} {count}");
    }
    println!("Tables ({}):", model.tables().len());
    for table in model.tables() {
        println!("  {:<24} axes: {}", table.id(), table.axis_ids().join(" x "));
    }
    Ok(())
}

fn parse_assignment(assignment: &str) -> CliResult<(&str, f64)> {
    let (name, value) = assignment
        .split_once('=')
        .ok_or_else(|| CliError::Assignment(assignment.to_string()))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|_| CliError::Assignment(assignment.to_string()))?;
    Ok((name.trim(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_parse() {
        assert_eq!(parse_assignment("ALPHA=2.5").unwrap(), ("ALPHA", 2.5));
        assert_eq!(parse_assignment(" MACH = -1 ").unwrap(), ("MACH", -1.0));
        assert!(matches!(
            parse_assignment("ALPHA"),
            Err(CliError::Assignment(_))
        ));
        assert!(parse_assignment("ALPHA=fast").is_err());
    }
}
