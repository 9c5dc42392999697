//! Configuration and dependency wiring for the catalog indexer.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::AppConfig;
