use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{migrate, plan, symbols};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "repackage")]
#[command(version = VERSION)]
#[command(about = "Move source files between namespaces and rewrite every reference")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite declarations, imports and qualified references
    Migrate(migrate::MigrateArgs),
    /// Show the ordered rename rules without touching files
    Plan(plan::PlanArgs),
    /// List top-level symbols declared by each mismatched file
    Symbols(symbols::SymbolsArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("{}", err.message);
        return std::process::ExitCode::from(exit_code_to_u8(1));
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
