//! Folds flat join rows into one search document per film work.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use catalog_indexer_shared::{Document, FlatJoinRow, GenreRef, PersonRef, PersonRole};

/// Insertion-ordered collection deduplicated by id.
#[derive(Debug)]
struct OrderedSet<T> {
    seen: HashSet<Uuid>,
    items: Vec<T>,
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }
}

impl<T> OrderedSet<T> {
    /// Keeps the first item seen for each id.
    fn insert_with(&mut self, id: Uuid, make: impl FnOnce() -> T) {
        if self.seen.insert(id) {
            self.items.push(make());
        }
    }

    fn into_vec(self) -> Vec<T> {
        self.items
    }
}

/// A document under construction.
#[derive(Debug)]
struct DocumentBuilder {
    document: Document,
    genres: OrderedSet<GenreRef>,
    actors: OrderedSet<PersonRef>,
    writers: OrderedSet<PersonRef>,
    directors: OrderedSet<PersonRef>,
}

impl DocumentBuilder {
    fn seed(row: &FlatJoinRow) -> Self {
        Self {
            document: Document::new(
                row.aggregate_id,
                row.title.clone(),
                row.description.clone(),
                row.rating,
            ),
            genres: OrderedSet::default(),
            actors: OrderedSet::default(),
            writers: OrderedSet::default(),
            directors: OrderedSet::default(),
        }
    }

    fn absorb(&mut self, row: FlatJoinRow) {
        if let (Some(id), Some(name)) = (row.genre_id, row.genre_name) {
            self.genres.insert_with(id, || GenreRef { id, name });
        }

        if let (Some(role), Some(id), Some(name)) = (row.role, row.person_id, row.person_name) {
            let people = match role {
                PersonRole::Actor => &mut self.actors,
                PersonRole::Writer => &mut self.writers,
                PersonRole::Director => &mut self.directors,
            };
            people.insert_with(id, || PersonRef { id, name });
        }
    }

    fn build(self) -> Document {
        let mut document = self.document;
        document.genres = self.genres.into_vec();
        document.actors = self.actors.into_vec();
        document.writers = self.writers.into_vec();
        document.directors = self.directors.into_vec();
        document.actors_names = names(&document.actors);
        document.writers_names = names(&document.writers);
        document.directors_names = names(&document.directors);
        document
    }
}

fn names(people: &[PersonRef]) -> Vec<String> {
    people.iter().map(|p| p.name.clone()).collect()
}

/// Groups rows by film work and builds the search documents.
///
/// Documents come out in the order their film works first appear, and every
/// embedded list keeps the order its entries first appear. Scalars are taken
/// from the first row of each film work. Rows with a missing genre or person
/// side add nothing to that side.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentTransformer;

impl DocumentTransformer {
    pub fn new() -> Self {
        Self
    }

    pub fn transform<I>(&self, rows: I) -> Vec<Document>
    where
        I: IntoIterator<Item = FlatJoinRow>,
    {
        let mut builders: Vec<DocumentBuilder> = Vec::new();
        let mut positions: HashMap<Uuid, usize> = HashMap::new();

        for row in rows {
            let position = *positions.entry(row.aggregate_id).or_insert_with(|| {
                builders.push(DocumentBuilder::seed(&row));
                builders.len() - 1
            });
            builders[position].absorb(row);
        }

        let documents: Vec<Document> = builders.into_iter().map(DocumentBuilder::build).collect();
        debug!(count = documents.len(), "Transformed documents");
        documents
    }
}
