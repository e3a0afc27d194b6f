//! CLI entrypoint for the prog1lib harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use prog1lib_core::{BudgetBacking, Config, Runtime, install, run};
use prog1lib_harness::{Scenario, check_log_file};

/// End-to-end tooling for prog1lib.
#[derive(Debug, Parser)]
#[command(name = "prog1lib-harness")]
#[command(about = "Scenario runner and lifecycle log checker for prog1lib")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one scenario in this process and terminate through the runtime.
    Scenario {
        /// Scenario to run.
        #[arg(value_enum)]
        name: Scenario,
        /// Cap the bytes the backing allocator hands out.
        #[arg(long)]
        budget: Option<usize>,
    },
    /// List scenario names.
    List,
    /// Validate a lifecycle JSONL log and print a JSON summary.
    CheckLog {
        /// Log file written through `PROG1LIB_LOG`.
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Scenario { name, budget } => {
            let mut runtime = Runtime::new(Config::from_env());
            if let Some(budget) = budget {
                runtime = runtime.with_backing(BudgetBacking::new(budget));
            }
            if install(runtime).is_err() {
                return Err("runtime already initialised".into());
            }
            run(|| name.execute())
        }
        Command::List => {
            for scenario in Scenario::value_variants() {
                let outcome = if scenario.expects_failure() {
                    "fails"
                } else {
                    "exits normally"
                };
                println!("{:<16} {outcome}", scenario.name());
            }
        }
        Command::CheckLog { path } => {
            let summary = check_log_file(&path)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
