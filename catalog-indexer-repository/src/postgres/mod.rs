//! PostgreSQL implementation of the catalog traits.

mod catalog;
mod queries;

pub use catalog::PgCatalog;
pub use queries::validate_table_name;
