use clap::Args;
use serde::Serialize;

use repackage::migrate::{self, MigrateOptions, MigrationReport};

use crate::commands::{CmdResult, GlobalArgs, ProjectArgs};
use crate::output::EXIT_PARTIAL_FAILURE;

#[derive(Args)]
pub struct MigrateArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Apply changes to disk (default is dry-run)
    #[arg(long)]
    write: bool,

    /// Include a unified diff for every changed file
    #[arg(long)]
    diff: bool,

    /// Transform files on a worker pool
    #[arg(long)]
    parallel: bool,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum MigrateOutput {
    #[serde(rename = "migrate")]
    Migrate {
        root: String,
        dry_run: bool,
        report: MigrationReport,
    },
}

pub fn run(args: MigrateArgs, _global: &GlobalArgs) -> CmdResult<MigrateOutput> {
    let (root, config) = args.project.resolve(args.parallel)?;

    let report = migrate::run(
        &root,
        &config,
        MigrateOptions {
            write: args.write,
            include_diff: args.diff,
        },
    )?;

    let exit_code = if report.has_file_failures() {
        EXIT_PARTIAL_FAILURE
    } else {
        0
    };

    Ok((
        MigrateOutput::Migrate {
            root: root.display().to_string(),
            dry_run: !args.write,
            report,
        },
        exit_code,
    ))
}
