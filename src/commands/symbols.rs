use clap::Args;
use serde::Serialize;

use repackage::declarations::{derive_symbol_rules, FileDeclarations, PatternScanner};
use repackage::error::FileWarning;
use repackage::mapping::MappingStore;

use crate::commands::{CmdResult, GlobalArgs, ProjectArgs};
use crate::output::EXIT_PARTIAL_FAILURE;

#[derive(Args)]
pub struct SymbolsArgs {
    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum SymbolsOutput {
    #[serde(rename = "symbols")]
    Symbols {
        total_symbols: usize,
        files: Vec<FileDeclarations>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<FileWarning>,
    },
}

/// List what each renamed file declares. Works even when the plan is ambiguous.
pub fn run(args: SymbolsArgs, _global: &GlobalArgs) -> CmdResult<SymbolsOutput> {
    let (root, config) = args.project.resolve(false)?;
    config.validate()?;

    let store = MappingStore::load(&root, config.package_mapping_path(&root).as_deref(), None)?;
    let scanner = PatternScanner::new(&config.exclude_symbols);
    let derivation = derive_symbol_rules(&store.mismatches, &root, &scanner);

    let exit_code = if derivation.warnings.is_empty() {
        0
    } else {
        EXIT_PARTIAL_FAILURE
    };

    Ok((
        SymbolsOutput::Symbols {
            total_symbols: derivation.symbol_count(),
            files: derivation.files,
            warnings: derivation.warnings,
        },
        exit_code,
    ))
}
