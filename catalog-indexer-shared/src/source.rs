//! Source descriptions: which tables are watched and how their changes map
//! to film works.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::KindError;

/// The kind of table a source watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The aggregate table itself.
    FilmWork,
    Person,
    Genre,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::FilmWork => "film_work",
            SourceKind::Person => "person",
            SourceKind::Genre => "genre",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "film_work" => Ok(SourceKind::FilmWork),
            "person" => Ok(SourceKind::Person),
            "genre" => Ok(SourceKind::Genre),
            other => Err(KindError::UnknownSource(other.to_string())),
        }
    }
}

/// A related entity reachable from film works through an association table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Person,
    Genre,
}

impl RelationKind {
    /// Association table and the column holding the related entity id.
    pub fn association(&self) -> (&'static str, &'static str) {
        match self {
            RelationKind::Person => ("content.person_film_work", "person_id"),
            RelationKind::Genre => ("content.genre_film_work", "genre_id"),
        }
    }
}

impl TryFrom<SourceKind> for RelationKind {
    type Error = KindError;

    fn try_from(kind: SourceKind) -> Result<Self, Self::Error> {
        match kind {
            SourceKind::Person => Ok(RelationKind::Person),
            SourceKind::Genre => Ok(RelationKind::Genre),
            SourceKind::FilmWork => Err(KindError::UnsupportedRelation(kind)),
        }
    }
}

/// One watched table and where its progress is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Schema-qualified table name, e.g. `content.person`.
    pub table: String,
    /// Key under which the source's watermark is persisted.
    pub watermark_key: String,
    /// Whether changed ids must be mapped to film work ids before merging.
    pub requires_enrichment: bool,
}

impl SourceConfig {
    pub fn new(
        kind: SourceKind,
        table: impl Into<String>,
        watermark_key: impl Into<String>,
        requires_enrichment: bool,
    ) -> Self {
        Self {
            kind,
            table: table.into(),
            watermark_key: watermark_key.into(),
            requires_enrichment,
        }
    }

    /// The film work, person and genre sources of the movies database.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(SourceKind::FilmWork, "content.film_work", "film_work_producer", false),
            Self::new(SourceKind::Person, "content.person", "person_producer", true),
            Self::new(SourceKind::Genre, "content.genre", "genre_producer", true),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_round_trip_text() {
        for kind in [SourceKind::FilmWork, SourceKind::Person, SourceKind::Genre] {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
        assert_eq!(
            "studio".parse::<SourceKind>(),
            Err(KindError::UnknownSource("studio".to_string()))
        );
    }

    #[test]
    fn test_film_work_has_no_relation() {
        assert_eq!(
            RelationKind::try_from(SourceKind::FilmWork),
            Err(KindError::UnsupportedRelation(SourceKind::FilmWork))
        );
        assert_eq!(RelationKind::try_from(SourceKind::Genre), Ok(RelationKind::Genre));
    }

    #[test]
    fn test_config_deserializes_from_json() {
        let json = r#"[{"kind":"person","table":"content.person","watermark_key":"p","requires_enrichment":true}]"#;
        let configs: Vec<SourceConfig> = serde_json::from_str(json).unwrap();

        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].kind, SourceKind::Person);
        assert!(configs[0].requires_enrichment);
    }

    #[test]
    fn test_defaults_cover_all_kinds() {
        let defaults = SourceConfig::defaults();
        assert_eq!(defaults.len(), 3);
        assert!(!defaults[0].requires_enrichment);
        assert!(defaults[1..].iter().all(|c| c.requires_enrichment));
    }
}
