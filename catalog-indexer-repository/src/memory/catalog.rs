use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::RepositoryError;
use crate::interfaces::{ChangeSource, FlatRowSource, RelationSource};
use crate::memory::FailureInjector;
use crate::postgres::validate_table_name;
use catalog_indexer_shared::{FlatJoinRow, PersonRole, RelationKind, SourceRecord, Watermark};

#[derive(Debug, Clone)]
struct FilmWorkRow {
    title: String,
    description: Option<String>,
    rating: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct NamedRow {
    name: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CatalogData {
    film_works: BTreeMap<Uuid, FilmWorkRow>,
    persons: BTreeMap<Uuid, NamedRow>,
    genres: BTreeMap<Uuid, NamedRow>,
    person_links: Vec<(Uuid, Uuid, PersonRole)>,
    genre_links: Vec<(Uuid, Uuid)>,
}

impl CatalogData {
    fn records(&self, table: &str) -> Result<Vec<SourceRecord>, RepositoryError> {
        let name = table.strip_prefix("content.").unwrap_or(table);
        let records = match name {
            "film_work" => self
                .film_works
                .iter()
                .map(|(id, row)| SourceRecord::new(*id, row.updated_at))
                .collect(),
            "person" => self
                .persons
                .iter()
                .map(|(id, row)| SourceRecord::new(*id, row.updated_at))
                .collect(),
            "genre" => self
                .genres
                .iter()
                .map(|(id, row)| SourceRecord::new(*id, row.updated_at))
                .collect(),
            _ => {
                return Err(RepositoryError::query(format!(
                    "relation \"{}\" does not exist",
                    table
                )))
            }
        };
        Ok(records)
    }
}

/// The `content` schema held in ordered maps.
///
/// Reads follow the SQL of `PgCatalog`: keyset order for change reads,
/// `DISTINCT` for the reverse join and a left join ordered by film work id
/// for flat rows.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    data: Mutex<CatalogData>,
    failures: FailureInjector,
    queries: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, CatalogData> {
        // A poisoned lock only means a test panicked mid-update
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_film_work(&self, id: Uuid, title: impl Into<String>, updated_at: DateTime<Utc>) {
        self.data().film_works.insert(
            id,
            FilmWorkRow {
                title: title.into(),
                description: None,
                rating: None,
                created_at: updated_at,
                updated_at,
            },
        );
    }

    pub fn set_details(&self, id: Uuid, description: Option<String>, rating: Option<f64>) {
        if let Some(row) = self.data().film_works.get_mut(&id) {
            row.description = description;
            row.rating = rating;
        }
    }

    pub fn add_person(&self, id: Uuid, name: impl Into<String>, updated_at: DateTime<Utc>) {
        self.data().persons.insert(
            id,
            NamedRow {
                name: name.into(),
                updated_at,
            },
        );
    }

    pub fn add_genre(&self, id: Uuid, name: impl Into<String>, updated_at: DateTime<Utc>) {
        self.data().genres.insert(
            id,
            NamedRow {
                name: name.into(),
                updated_at,
            },
        );
    }

    pub fn link_person(&self, film_work_id: Uuid, person_id: Uuid, role: PersonRole) {
        self.data().person_links.push((film_work_id, person_id, role));
    }

    pub fn link_genre(&self, film_work_id: Uuid, genre_id: Uuid) {
        self.data().genre_links.push((film_work_id, genre_id));
    }

    /// Set `updated_at` of a row, as an `UPDATE ... SET updated_at = now()`
    /// would.
    pub fn touch(&self, table: &str, id: Uuid, updated_at: DateTime<Utc>) {
        let mut data = self.data();
        let name = table.strip_prefix("content.").unwrap_or(table);
        match name {
            "film_work" => {
                if let Some(row) = data.film_works.get_mut(&id) {
                    row.updated_at = updated_at;
                }
            }
            "person" => {
                if let Some(row) = data.persons.get_mut(&id) {
                    row.updated_at = updated_at;
                }
            }
            "genre" => {
                if let Some(row) = data.genres.get_mut(&id) {
                    row.updated_at = updated_at;
                }
            }
            _ => {}
        }
    }

    /// Make the next `count` reads fail with a connection error.
    pub fn fail_next(&self, count: usize) {
        self.failures.arm(count);
    }

    /// Number of reads attempted, including failed ones.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RepositoryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failures.should_fail() {
            return Err(RepositoryError::connection("catalog unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeSource for MemoryCatalog {
    async fn changed_since(
        &self,
        table: &str,
        after: &Watermark,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, RepositoryError> {
        validate_table_name(table)?;
        self.check()?;

        let mut records: Vec<SourceRecord> = self
            .data()
            .records(table)?
            .into_iter()
            .filter(|r| r.watermark() > *after)
            .collect();
        records.sort();
        records.truncate(limit);
        Ok(records)
    }

    async fn changed_at(
        &self,
        table: &str,
        updated_at: DateTime<Utc>,
        after_id: Uuid,
        limit: usize,
    ) -> Result<Vec<SourceRecord>, RepositoryError> {
        validate_table_name(table)?;
        self.check()?;

        let mut records: Vec<SourceRecord> = self
            .data()
            .records(table)?
            .into_iter()
            .filter(|r| r.updated_at == updated_at && r.id > after_id)
            .collect();
        records.sort_by_key(|r| r.id);
        records.truncate(limit);
        Ok(records)
    }
}

#[async_trait]
impl RelationSource for MemoryCatalog {
    async fn aggregates_for(
        &self,
        kind: RelationKind,
        related_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, RepositoryError> {
        self.check()?;

        let wanted: BTreeSet<Uuid> = related_ids.iter().copied().collect();
        let data = self.data();
        let found: BTreeSet<Uuid> = match kind {
            RelationKind::Person => data
                .person_links
                .iter()
                .filter(|(_, person_id, _)| wanted.contains(person_id))
                .map(|(film_work_id, _, _)| *film_work_id)
                .collect(),
            RelationKind::Genre => data
                .genre_links
                .iter()
                .filter(|(_, genre_id)| wanted.contains(genre_id))
                .map(|(film_work_id, _)| *film_work_id)
                .collect(),
        };

        Ok(found.into_iter().collect())
    }
}

#[async_trait]
impl FlatRowSource for MemoryCatalog {
    async fn flat_rows(
        &self,
        aggregate_ids: &[Uuid],
        _chunk_size: usize,
    ) -> Result<Vec<FlatJoinRow>, RepositoryError> {
        self.check()?;

        let ids: BTreeSet<Uuid> = aggregate_ids.iter().copied().collect();
        let data = self.data();
        let mut rows = Vec::new();

        for id in ids {
            let film = match data.film_works.get(&id) {
                Some(film) => film,
                None => continue,
            };

            let mut people: Vec<(PersonRole, Uuid)> = data
                .person_links
                .iter()
                .filter(|(fw, _, _)| *fw == id)
                .map(|(_, person_id, role)| (*role, *person_id))
                .collect();
            people.sort_by_key(|(role, person_id)| (role.as_str(), *person_id));

            let mut genres: Vec<Uuid> = data
                .genre_links
                .iter()
                .filter(|(fw, _)| *fw == id)
                .map(|(_, genre_id)| *genre_id)
                .collect();
            genres.sort();

            // LEFT JOIN semantics: a missing side yields one all-null edge
            let person_edges: Vec<Option<(PersonRole, Uuid)>> = if people.is_empty() {
                vec![None]
            } else {
                people.into_iter().map(Some).collect()
            };
            let genre_edges: Vec<Option<Uuid>> = if genres.is_empty() {
                vec![None]
            } else {
                genres.into_iter().map(Some).collect()
            };

            for person in person_edges.iter().copied() {
                for genre in genre_edges.iter().copied() {
                    let person_row =
                        person.and_then(|(_, pid)| data.persons.get(&pid).map(|p| (pid, p)));
                    let genre_row = genre.and_then(|gid| data.genres.get(&gid).map(|g| (gid, g)));

                    rows.push(FlatJoinRow {
                        aggregate_id: id,
                        title: film.title.clone(),
                        description: film.description.clone(),
                        rating: film.rating,
                        created_at: Some(film.created_at),
                        updated_at: Some(film.updated_at),
                        role: person.map(|(role, _)| role),
                        person_id: person_row.map(|(pid, _)| pid),
                        person_name: person_row.map(|(_, p)| p.name.clone()),
                        genre_id: genre_row.map(|(gid, _)| gid),
                        genre_name: genre_row.map(|(_, g)| g.name.clone()),
                    });
                }
            }
        }

        Ok(rows)
    }
}
