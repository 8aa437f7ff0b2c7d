use std::sync::Arc;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Track};
use crate::db::UserStore;
use crate::services::storage::{parse_json, ClientStore, PROGRESS_KEY, USER_ID_KEY};

/// Set of completed lesson ids, stored as one JSON blob per session
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub completed_lessons: Vec<String>,
}

impl UserProgress {
    pub fn contains(&self, lesson_id: &str) -> bool {
        self.completed_lessons.iter().any(|id| id == lesson_id)
    }

    /// Flip membership of `lesson_id`; returns whether it is now completed
    pub fn toggle(&mut self, lesson_id: &str) -> bool {
        match self.completed_lessons.iter().position(|id| id == lesson_id) {
            Some(idx) => {
                self.completed_lessons.remove(idx);
                false
            }
            None => {
                self.completed_lessons.push(lesson_id.to_string());
                true
            }
        }
    }
}

/// Result of a toggle
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressChange {
    pub lesson_id: String,
    pub completed: bool,
    pub progress: UserProgress,
}

/// Stored progress, or an empty one when missing or unreadable
pub fn get_progress(store: &ClientStore) -> UserProgress {
    progress_from(store.get_item(PROGRESS_KEY).as_deref())
}

fn progress_from(raw: Option<&str>) -> UserProgress {
    match raw.map(|raw| parse_json::<UserProgress>(PROGRESS_KEY, raw)) {
        Some(Ok(progress)) => progress,
        None => UserProgress::default(),
        Some(Err(e)) => {
            warn!("Discarding unreadable progress: {}", e);
            UserProgress::default()
        }
    }
}

pub fn save_progress(store: &ClientStore, progress: &UserProgress) {
    if let Err(e) = store.set_json(PROGRESS_KEY, progress) {
        error!("Failed to save progress: {}", e);
    }
}

pub fn is_lesson_completed(store: &ClientStore, lesson_id: &str) -> bool {
    get_progress(store).contains(lesson_id)
}

/// Rounded share of the track's lessons that are completed
pub fn track_progress_percentage(track: &Track, progress: &UserProgress) -> u8 {
    let total = track.lesson_count();
    if total == 0 {
        return 0;
    }
    let done = track.lessons().filter(|l| progress.contains(&l.id)).count();
    percentage(done, total)
}

/// Rounded share of every catalog lesson that is completed
pub fn global_progress_percentage(catalog: &Catalog, progress: &UserProgress) -> u8 {
    let total = catalog.total_lessons();
    if total == 0 {
        return 0;
    }
    let done = catalog
        .tracks()
        .iter()
        .flat_map(|t| t.lessons())
        .filter(|l| progress.contains(&l.id))
        .count();
    percentage(done, total)
}

fn percentage(done: usize, total: usize) -> u8 {
    ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// Row id of the signed-in user in the user store, if the session has one
pub fn remote_user_id(store: &ClientStore) -> Option<i64> {
    store.get_item(USER_ID_KEY)?.parse().ok()
}

/// Progress toggling with an optional best-effort mirror to the user store
#[derive(Clone)]
pub struct ProgressService {
    users: Option<Arc<dyn UserStore>>,
}

impl ProgressService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users: Some(users) }
    }

    /// Service that never talks to the user store
    pub fn local_only() -> Self {
        Self { users: None }
    }

    /// Toggle a lesson, save locally, then mirror to the store without waiting
    pub fn toggle_lesson_completion(&self, store: &ClientStore, lesson_id: &str) -> ProgressChange {
        let update = store.update_item(PROGRESS_KEY, |raw| {
            let mut progress = progress_from(raw);
            let completed = progress.toggle(lesson_id);
            Ok((serde_json::to_string(&progress)?, (completed, progress)))
        });
        let (completed, progress) = update.unwrap_or_else(|e| {
            error!("Failed to save progress: {}", e);
            let progress = get_progress(store);
            (progress.contains(lesson_id), progress)
        });

        self.mirror(store, lesson_id, completed);

        ProgressChange {
            lesson_id: lesson_id.to_string(),
            completed,
            progress,
        }
    }

    fn mirror(&self, store: &ClientStore, lesson_id: &str, completed: bool) {
        let Some(users) = self.users.clone() else {
            return;
        };
        let Some(user_id) = remote_user_id(store) else {
            debug!("No user id in session, skipping progress sync");
            return;
        };

        let lesson_id = lesson_id.to_string();
        let job = move || {
            if let Err(e) = users.save_progress(user_id, &lesson_id, completed) {
                error!("Failed to save progress to database: {}", e);
            }
        };

        // fire and forget on the blocking pool; inline when no runtime is running
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => job(),
        }
    }
}
