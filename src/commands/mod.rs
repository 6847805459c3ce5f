use clap::Args;
use std::path::PathBuf;

use repackage::config::{ConfigOverrides, MigrationConfig};

pub type CmdResult<T> = repackage::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Arguments shared by every command that reads a project.
///
/// Values given here override `repackage.json`.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Project root
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Config file (defaults to <root>/repackage.json when present)
    #[arg(long)]
    pub config: Option<String>,

    /// Source directory to walk, relative to the root
    #[arg(long)]
    pub source_dir: Option<String>,

    /// File extension to rewrite (repeatable)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Package mismatch mapping (filePath|oldNamespace|newNamespace)
    #[arg(long, value_name = "FILE")]
    pub package_map: Option<String>,

    /// Symbol rename mapping (oldQualifiedName|newQualifiedName)
    #[arg(long, value_name = "FILE")]
    pub symbol_map: Option<String>,

    /// Run without a symbol rename mapping
    #[arg(long, conflicts_with = "symbol_map")]
    pub no_symbol_map: bool,

    /// Resolve conflicting targets instead of failing
    #[arg(long)]
    pub allow_ambiguous: bool,
}

impl ProjectArgs {
    /// Resolve the project root and the effective configuration.
    pub fn resolve(&self, parallel: bool) -> repackage::Result<(PathBuf, MigrationConfig)> {
        let root = PathBuf::from(shellexpand::tilde(&self.root).to_string());
        if !root.is_dir() {
            return Err(repackage::Error::validation_invalid_argument(
                "root",
                format!("Project root '{}' is not a directory", root.display()),
            ));
        }

        let explicit = self.config.as_deref().map(PathBuf::from);
        let mut config = MigrationConfig::load(&root, explicit.as_deref())?;

        config.apply(ConfigOverrides {
            source_dir: self.source_dir.clone(),
            extensions: self.extensions.clone(),
            package_mapping: self.package_map.clone(),
            symbol_mapping: self.symbol_map.clone(),
            no_symbol_mapping: self.no_symbol_map,
            allow_ambiguous: self.allow_ambiguous,
            parallel,
        });

        Ok((root, config))
    }
}

pub mod migrate;
pub mod plan;
pub mod symbols;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (repackage::Result<serde_json::Value>, i32) {
    crate::tty::status("repackage is working...");

    match command {
        crate::Commands::Migrate(args) => dispatch!(args, global, migrate),
        crate::Commands::Plan(args) => dispatch!(args, global, plan),
        crate::Commands::Symbols(args) => dispatch!(args, global, symbols),
    }
}
