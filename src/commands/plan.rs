use clap::Args;
use serde::Serialize;

use repackage::migrate;
use repackage::plan::{PlanWarning, RenameRule};

use crate::commands::{CmdResult, GlobalArgs, ProjectArgs};

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum PlanOutput {
    #[serde(rename = "plan")]
    Plan {
        package_mismatches: usize,
        explicit_symbols: usize,
        derived_symbols: usize,
        rules: Vec<RenameRule>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<PlanWarning>,
    },
}

/// Print the ordered rule set without touching the tree.
pub fn run(args: PlanArgs, _global: &GlobalArgs) -> CmdResult<PlanOutput> {
    let (root, config) = args.project.resolve(false)?;
    let prepared = migrate::prepare(&root, &config)?;

    Ok((
        PlanOutput::Plan {
            package_mismatches: prepared.store.mismatches.len(),
            explicit_symbols: prepared.store.symbol_renames.len(),
            derived_symbols: prepared.derivation.symbol_count(),
            rules: prepared.plan.rule_set.rules().to_vec(),
            warnings: prepared.plan.warnings,
        },
        0,
    ))
}
