//! SQL text for the catalog reads.
//!
//! Table names cannot be bound as parameters, so every interpolated name is
//! checked with [`validate_table_name`] first. All values are bound.

use crate::errors::RepositoryError;
use catalog_indexer_shared::RelationKind;

/// Check that `table` is a plain or schema-qualified SQL identifier.
///
/// Accepts `name` and `schema.name` where each part matches
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_table_name(table: &str) -> Result<(), RepositoryError> {
    let parts: Vec<&str> = table.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return Err(RepositoryError::data(format!("Invalid table name: {:?}", table)));
    }

    let valid_part = |part: &str| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    };

    if parts.iter().all(|p| valid_part(p)) {
        Ok(())
    } else {
        Err(RepositoryError::data(format!("Invalid table name: {:?}", table)))
    }
}

/// Keyset page after a `(updated_at, id)` pair.
pub(crate) fn changed_since_query(table: &str) -> String {
    format!(
        "SELECT id, updated_at \
         FROM {table} \
         WHERE (updated_at, id) > ($1, $2) \
         ORDER BY updated_at, id \
         LIMIT $3"
    )
}

/// Id-ordered page inside a single `updated_at` value.
pub(crate) fn changed_at_query(table: &str) -> String {
    format!(
        "SELECT id, updated_at \
         FROM {table} \
         WHERE updated_at = $1 AND id > $2 \
         ORDER BY id \
         LIMIT $3"
    )
}

/// Film work ids linked to any of the bound related ids.
pub(crate) fn aggregates_query(kind: RelationKind) -> String {
    let (association, column) = kind.association();
    format!(
        "SELECT DISTINCT film_work_id \
         FROM {association} \
         WHERE {column} = ANY($1)"
    )
}

/// The full left join for the bound film work ids.
pub(crate) const FLAT_ROWS_QUERY: &str = "\
    SELECT \
        fw.id AS fw_id, \
        fw.title, \
        fw.description, \
        fw.rating::float8 AS rating, \
        fw.created_at, \
        fw.updated_at, \
        pfw.role::text AS role, \
        p.id AS person_id, \
        p.full_name, \
        g.id AS genre_id, \
        g.name AS genre_name \
    FROM content.film_work fw \
    LEFT JOIN content.person_film_work pfw ON pfw.film_work_id = fw.id \
    LEFT JOIN content.person p ON p.id = pfw.person_id \
    LEFT JOIN content.genre_film_work gfw ON gfw.film_work_id = fw.id \
    LEFT JOIN content.genre g ON g.id = gfw.genre_id \
    WHERE fw.id = ANY($1) \
    ORDER BY fw.id, pfw.role, p.id, g.id";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("content.film_work").is_ok());
        assert!(validate_table_name("person").is_ok());
        assert!(validate_table_name("_private.t1").is_ok());

        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("1table").is_err());
        assert!(validate_table_name("content.person; DROP TABLE x").is_err());
        assert!(validate_table_name("content.").is_err());
    }

    #[test]
    fn test_keyset_query_uses_row_comparison() {
        let sql = changed_since_query("content.person");
        assert!(sql.contains("FROM content.person"));
        assert!(sql.contains("(updated_at, id) > ($1, $2)"));
        assert!(sql.contains("ORDER BY updated_at, id"));
        assert!(!sql.to_uppercase().contains("OFFSET"));
    }

    #[test]
    fn test_aggregates_query_per_relation() {
        let sql = aggregates_query(RelationKind::Genre);
        assert!(sql.contains("FROM content.genre_film_work"));
        assert!(sql.contains("genre_id = ANY($1)"));

        let sql = aggregates_query(RelationKind::Person);
        assert!(sql.contains("person_id = ANY($1)"));
    }

    #[test]
    fn test_flat_rows_query_binds_single_array() {
        assert!(FLAT_ROWS_QUERY.contains("fw.id = ANY($1)"));
        assert!(!FLAT_ROWS_QUERY.contains("$2"));
    }
}
