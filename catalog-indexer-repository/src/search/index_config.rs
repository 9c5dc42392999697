//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the movies index.

use serde_json::{json, Value};

/// The default name of the search index.
pub const DEFAULT_INDEX_NAME: &str = "movies";

/// Configuration for the movies index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Index the documents are written to.
    pub name: String,
    /// Maximum number of documents allowed in a single bulk request.
    /// Set to None to disable the limit.
    pub max_batch_size: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_INDEX_NAME.to_string(),
            max_batch_size: Some(1000),
        }
    }
}

impl IndexConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

fn person_mapping() -> Value {
    json!({
        "type": "nested",
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "name": { "type": "text", "analyzer": "ru_en" }
        }
    })
}

/// Get the index settings and mappings for the movies index.
///
/// The configuration includes:
/// - **ru_en analyzer**: English and Russian stemming with stop words
/// - **nested people and genres**: so that id and name stay paired in queries
/// - **name arrays**: flat text fields for full-text search over people
pub fn get_index_settings() -> Value {
    json!({
        "settings": {
            "refresh_interval": "1s",
            "analysis": {
                "filter": {
                    "english_stop": { "type": "stop", "stopwords": "_english_" },
                    "english_stemmer": { "type": "stemmer", "language": "english" },
                    "english_possessive_stemmer": { "type": "stemmer", "language": "possessive_english" },
                    "russian_stop": { "type": "stop", "stopwords": "_russian_" },
                    "russian_stemmer": { "type": "stemmer", "language": "russian" }
                },
                "analyzer": {
                    "ru_en": {
                        "tokenizer": "standard",
                        "filter": [
                            "lowercase",
                            "english_stop",
                            "english_stemmer",
                            "english_possessive_stemmer",
                            "russian_stop",
                            "russian_stemmer"
                        ]
                    }
                }
            }
        },
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "id": { "type": "keyword" },
                "imdb_rating": { "type": "float" },
                "title": {
                    "type": "text",
                    "analyzer": "ru_en",
                    "fields": { "raw": { "type": "keyword" } }
                },
                "description": { "type": "text", "analyzer": "ru_en" },
                "genres": {
                    "type": "nested",
                    "dynamic": "strict",
                    "properties": {
                        "id": { "type": "keyword" },
                        "name": { "type": "keyword" }
                    }
                },
                "actors": person_mapping(),
                "writers": person_mapping(),
                "directors": person_mapping(),
                "actors_names": { "type": "text", "analyzer": "ru_en" },
                "writers_names": { "type": "text", "analyzer": "ru_en" },
                "directors_names": { "type": "text", "analyzer": "ru_en" }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_settings_structure() {
        let settings = get_index_settings();
        let properties = &settings["mappings"]["properties"];

        assert!(settings["settings"]["analysis"]["analyzer"]["ru_en"].is_object());

        // Every serialized document field has a mapping under strict dynamics
        for field in [
            "id",
            "title",
            "description",
            "imdb_rating",
            "genres",
            "actors",
            "writers",
            "directors",
            "actors_names",
            "writers_names",
            "directors_names",
        ] {
            assert!(properties[field].is_object(), "missing mapping for {}", field);
        }

        assert_eq!(properties["actors"]["type"], "nested");
        assert_eq!(properties["genres"]["properties"]["id"]["type"], "keyword");
    }

    #[test]
    fn test_default_config() {
        let config = IndexConfig::default();
        assert_eq!(config.name, "movies");
        assert_eq!(config.max_batch_size, Some(1000));
    }
}
