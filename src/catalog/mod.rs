//! Static course catalog
//!
//! Tracks are embedded at compile time from `data/catalog.json`. Fully written
//! tracks are stored as-is; outline tracks only list their module titles and are
//! expanded into placeholder lessons when the catalog is first built.

pub mod model;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::core::Result;

pub use model::{Lesson, Module, QuizResult, Track, TrackOutline};

const CATALOG_JSON: &str = include_str!("../../data/catalog.json");

/// Maximum number of entries returned by [`Catalog::search`]
pub const SEARCH_LIMIT: usize = 8;

/// Maximum number of tracks suggested under a track page
pub const RECOMMENDATION_LIMIT: usize = 3;

/// Track with its own landing page instead of `/track/<id>`
pub const FLAGSHIP_TRACK: &str = "sql-mastery";

lazy_static! {
    static ref CATALOG: Catalog = Catalog::load().expect("embedded catalog must be valid");
}

/// Process-wide catalog
pub fn catalog() -> &'static Catalog {
    &CATALOG
}

/// Public URL of a track landing page
pub fn track_url(track_id: &str) -> String {
    if track_id == FLAGSHIP_TRACK {
        "/sql-mastery".to_string()
    } else {
        format!("/track/{}", track_id)
    }
}

/// Public URL of a lesson page
pub fn lesson_url(track_id: &str, lesson_id: &str) -> String {
    format!("/lesson/{}/{}", track_id, lesson_id)
}

#[derive(Deserialize)]
struct CatalogSource {
    tracks: Vec<Track>,
    #[serde(default)]
    outlines: Vec<TrackOutline>,
}

/// Kind of a search hit, serialized with the labels shown in the navbar
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum SearchKind {
    #[serde(rename = "Parcours")]
    Track,
    #[serde(rename = "Module")]
    Module,
    #[serde(rename = "Leçon")]
    Lesson,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResult {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SearchKind,
    pub url: String,
}

/// A lesson located inside its track
#[derive(Debug, Clone)]
pub struct LessonView<'a> {
    pub track: &'a Track,
    pub module: &'a Module,
    pub module_number: usize,
    pub lesson: &'a Lesson,
    /// Zero-based position in the flattened lesson list
    pub position: usize,
    pub total: usize,
    pub previous: Option<&'a Lesson>,
    pub next: Option<&'a Lesson>,
}

#[derive(Debug)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    /// Build the catalog from the embedded JSON
    pub fn load() -> Result<Self> {
        Self::from_json(CATALOG_JSON)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let source: CatalogSource = serde_json::from_str(json)?;
        let mut tracks = source.tracks;
        tracks.extend(source.outlines.iter().map(Track::from_outline));
        Ok(Self { tracks })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn total_lessons(&self) -> usize {
        self.tracks.iter().map(Track::lesson_count).sum()
    }

    /// Locate a lesson and its neighbours in module order
    pub fn lesson(&self, track_id: &str, lesson_id: &str) -> Option<LessonView<'_>> {
        let track = self.track(track_id)?;

        let flat: Vec<(usize, &Module, &Lesson)> = track
            .modules
            .iter()
            .enumerate()
            .flat_map(|(idx, module)| module.lessons.iter().map(move |l| (idx + 1, module, l)))
            .collect();

        let position = flat.iter().position(|(_, _, l)| l.id == lesson_id)?;
        let (module_number, module, lesson) = flat[position];

        Some(LessonView {
            track,
            module,
            module_number,
            lesson,
            position,
            total: flat.len(),
            previous: position.checked_sub(1).map(|i| flat[i].2),
            next: flat.get(position + 1).map(|(_, _, l)| *l),
        })
    }

    /// Case-insensitive title search across tracks, modules and lessons
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        let query = query.trim();
        if query.chars().count() < 2 {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        let mut results = Vec::new();

        for track in &self.tracks {
            if track.title.to_lowercase().contains(&needle) {
                results.push(SearchResult {
                    title: track.title.clone(),
                    kind: SearchKind::Track,
                    url: track_url(&track.id),
                });
            }
            for module in &track.modules {
                if module.title.to_lowercase().contains(&needle) {
                    results.push(SearchResult {
                        title: module.title.clone(),
                        kind: SearchKind::Module,
                        url: track_url(&track.id),
                    });
                }
                for lesson in &module.lessons {
                    if lesson.title.to_lowercase().contains(&needle) {
                        results.push(SearchResult {
                            title: lesson.title.clone(),
                            kind: SearchKind::Lesson,
                            url: lesson_url(&track.id, &lesson.id),
                        });
                    }
                }
            }
        }

        results.truncate(SEARCH_LIMIT);
        results
    }

    /// Other tracks to suggest below a track page
    pub fn recommendations(&self, track_id: &str) -> Vec<&Track> {
        self.tracks
            .iter()
            .filter(|t| t.id != track_id)
            .take(RECOMMENDATION_LIMIT)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_catalog_loads() {
        let catalog = Catalog::load().unwrap();
        assert_eq!(catalog.tracks().len(), 11);
        assert_eq!(catalog.tracks()[0].id, "sql-mastery");
        assert_eq!(catalog.track("sql-mastery").unwrap().lesson_count(), 16);
        assert_eq!(catalog.track("db-design").unwrap().lesson_count(), 8);
        // nine outline tracks with five placeholder lessons each
        assert_eq!(catalog.total_lessons(), 16 + 8 + 9 * 5);
    }

    #[test]
    fn test_lesson_neighbours() {
        let catalog = catalog();

        let first = catalog.lesson("sql-mastery", "sql-1-1").unwrap();
        assert!(first.previous.is_none());
        assert_eq!(first.next.unwrap().id, "sql-1-2");
        assert_eq!(first.module_number, 1);

        // crossing a module boundary
        let fourth = catalog.lesson("sql-mastery", "sql-2-1").unwrap();
        assert_eq!(fourth.previous.unwrap().id, "sql-1-3");
        assert_eq!(fourth.module_number, 2);
        assert_eq!(fourth.position, 3);

        assert!(catalog.lesson("sql-mastery", "nope").is_none());
        assert!(catalog.lesson("nope", "sql-1-1").is_none());
    }

    #[test]
    fn test_search_rules() {
        let catalog = catalog();
        assert!(catalog.search("s").is_empty());

        let hits = catalog.search("SQL");
        assert!(!hits.is_empty());
        assert!(hits.len() <= SEARCH_LIMIT);
        assert_eq!(hits[0].kind, SearchKind::Track);
        assert_eq!(hits[0].url, "/sql-mastery");

        let lessons = catalog.search("jointures et");
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].url, "/lesson/sql-mastery/sql-2-3");
    }

    #[test]
    fn test_search_result_serialization() {
        let hit = SearchResult {
            title: "Intro".to_string(),
            kind: SearchKind::Lesson,
            url: "/lesson/a/b".to_string(),
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["type"], "Leçon");
    }

    #[test]
    fn test_track_urls_and_recommendations() {
        assert_eq!(track_url("sql-mastery"), "/sql-mastery");
        assert_eq!(track_url("db-design"), "/track/db-design");

        let recs = catalog().recommendations("sql-mastery");
        assert_eq!(recs.len(), RECOMMENDATION_LIMIT);
        assert!(recs.iter().all(|t| t.id != "sql-mastery"));
    }
}
