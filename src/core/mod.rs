// Public modules
pub mod config;
pub mod declarations;
pub mod error;
pub mod mapping;
pub mod migrate;
pub mod plan;
pub mod rewrite;
pub mod walker;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use migrate::{run, MigrateOptions, MigrationReport};
