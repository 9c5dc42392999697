//! Search document for a film work.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person embedded in a film work document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: Uuid,
    pub name: String,
}

/// A genre embedded in a film work document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreRef {
    pub id: Uuid,
    pub name: String,
}

/// Denormalized film work as stored in the search index.
///
/// The document id is the film work id, so re-indexing the same film work
/// overwrites the previous version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "imdb_rating")]
    pub rating: Option<f64>,
    pub genres: Vec<GenreRef>,
    pub actors: Vec<PersonRef>,
    pub writers: Vec<PersonRef>,
    pub directors: Vec<PersonRef>,
    pub actors_names: Vec<String>,
    pub writers_names: Vec<String>,
    pub directors_names: Vec<String>,
}

impl Document {
    /// Create a document with no genres or people.
    pub fn new(
        id: Uuid,
        title: impl Into<String>,
        description: Option<String>,
        rating: Option<f64>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description,
            rating,
            genres: Vec::new(),
            actors: Vec::new(),
            writers: Vec::new(),
            directors: Vec::new(),
            actors_names: Vec::new(),
            writers_names: Vec::new(),
            directors_names: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_uses_index_field_name() {
        let doc = Document::new(Uuid::nil(), "Title", None, Some(8.1));
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["imdb_rating"], 8.1);
        assert!(value.get("rating").is_none());
        assert!(value["actors"].as_array().unwrap().is_empty());
    }
}
