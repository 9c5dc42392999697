//! Rows produced by the extraction and merge stages.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::KindError;
use crate::watermark::Watermark;

/// A changed row reported by extraction, ordered by `(updated_at, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRecord {
    pub updated_at: DateTime<Utc>,
    pub id: Uuid,
}

impl SourceRecord {
    pub fn new(id: Uuid, updated_at: DateTime<Utc>) -> Self {
        Self { updated_at, id }
    }

    /// The watermark that marks this record as propagated.
    pub fn watermark(&self) -> Watermark {
        Watermark::new(self.updated_at, self.id)
    }
}

/// Role of a person on a film work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonRole {
    Actor,
    Writer,
    Director,
}

impl PersonRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonRole::Actor => "actor",
            PersonRole::Writer => "writer",
            PersonRole::Director => "director",
        }
    }
}

impl fmt::Display for PersonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonRole {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "actor" => Ok(PersonRole::Actor),
            "writer" => Ok(PersonRole::Writer),
            "director" => Ok(PersonRole::Director),
            other => Err(KindError::UnknownRole(other.to_string())),
        }
    }
}

/// One row of the film work × person role × genre left join.
///
/// Relation columns are `None` when the film work has no edge of that kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatJoinRow {
    pub aggregate_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub role: Option<PersonRole>,
    pub person_id: Option<Uuid>,
    pub person_name: Option<String>,
    pub genre_id: Option<Uuid>,
    pub genre_name: Option<String>,
}

impl FlatJoinRow {
    /// A row with only the film work columns populated.
    pub fn bare(aggregate_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            aggregate_id,
            title: title.into(),
            description: None,
            rating: None,
            created_at: None,
            updated_at: None,
            role: None,
            person_id: None,
            person_name: None,
            genre_id: None,
            genre_name: None,
        }
    }

    pub fn with_person(mut self, role: PersonRole, id: Uuid, name: impl Into<String>) -> Self {
        self.role = Some(role);
        self.person_id = Some(id);
        self.person_name = Some(name.into());
        self
    }

    pub fn with_genre(mut self, id: Uuid, name: impl Into<String>) -> Self {
        self.genre_id = Some(id);
        self.genre_name = Some(name.into());
        self
    }
}
