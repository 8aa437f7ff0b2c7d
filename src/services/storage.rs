use std::collections::HashMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error};
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::core::{DataSphereError, Result};

/// Completed lessons of the visitor
pub const PROGRESS_KEY: &str = "datasphere_progress";
/// Profile of the signed-in visitor
pub const USER_KEY: &str = "datasphere_user";
/// Row id of the signed-in visitor in the user store
pub const USER_ID_KEY: &str = "datasphere_user_id";

/// Sessions kept in memory unless configured otherwise
pub const DEFAULT_SESSION_CAPACITY: usize = 10_000;

/// Local copy of a profile, kept so that a later login without the store finds it again
pub fn user_record_key(email: &str) -> String {
    format!("datasphere_user_db_{}", email)
}

/// Reviews written by the visitor for one track
pub fn reviews_key(track_id: &str) -> String {
    format!("course_reviews_{}", track_id)
}

type Items = HashMap<String, String>;
type Sessions = LruCache<String, Items>;

/// Per-session string storage, the server-side counterpart of browser local storage.
///
/// Every session owns a flat map of string items. A session only takes memory
/// once something is written to it, and the least recently used session is
/// dropped when the registry is full. When a directory is configured, each
/// session is mirrored to `<dir>/<session>.json` after every write and read
/// back the first time it is touched after a restart or an eviction.
#[derive(Debug)]
pub struct StorageRegistry {
    sessions: Mutex<Sessions>,
    writes: Mutex<()>,
    dir: Option<PathBuf>,
}

impl StorageRegistry {
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Storage mirrored to `dir`, created if missing
    pub fn persistent(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self::new(Some(dir)))
    }

    fn new(dir: Option<PathBuf>) -> Self {
        let capacity = NonZeroUsize::new(DEFAULT_SESSION_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            writes: Mutex::new(()),
            dir,
        }
    }

    /// Keep at most `capacity` sessions in memory
    pub fn with_capacity(self, capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            DataSphereError::ConfigError("session capacity must be at least 1".to_string())
        })?;
        Ok(Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            ..self
        })
    }

    /// Handle bound to one session
    pub fn client(self: &Arc<Self>, session_id: &str) -> ClientStore {
        ClientStore {
            registry: Arc::clone(self),
            session: session_id.to_string(),
        }
    }

    /// Sessions currently held in memory
    pub fn session_count(&self) -> usize {
        self.sessions().map(|s| s.len()).unwrap_or(0)
    }

    fn sessions(&self) -> Result<MutexGuard<'_, Sessions>> {
        self.sessions
            .lock()
            .map_err(|_| DataSphereError::StorageError("session storage lock poisoned".to_string()))
    }

    fn session_path(&self, session: &str) -> Option<PathBuf> {
        // only UUIDs ever become file names
        let dir = self.dir.as_ref()?;
        Uuid::parse_str(session).ok()?;
        Some(dir.join(format!("{}.json", session)))
    }

    /// Items mirrored on disk for `session`, if any
    fn restore(&self, session: &str) -> Option<Items> {
        let path = self.session_path(session)?;
        if !path.exists() {
            return None;
        }
        match read_items(&path) {
            Ok(items) => {
                debug!("Restored session storage from {}", path.display());
                Some(items)
            }
            Err(e) => {
                error!("Failed to restore session storage {}: {}", path.display(), e);
                None
            }
        }
    }

    fn admit(&self, sessions: &mut Sessions, session: &str, items: Items) {
        if sessions.contains(session) {
            return;
        }
        if let Some((evicted, _)) = sessions.push(session.to_string(), items) {
            debug!("Dropped storage of idle session {} from memory", evicted);
        }
    }

    /// Read from the session's items; unknown sessions are not kept in memory
    fn lookup<T>(&self, session: &str, f: impl FnOnce(&Items) -> T) -> Result<Option<T>> {
        if let Some(items) = self.sessions()?.get(session) {
            return Ok(Some(f(items)));
        }

        let Some(items) = self.restore(session) else {
            return Ok(None);
        };
        let out = f(&items);
        self.admit(&mut *self.sessions()?, session, items);
        Ok(Some(out))
    }

    /// Change the session's items under the registry lock, then mirror them to disk
    fn modify<T>(&self, session: &str, f: impl FnOnce(&mut Items) -> T) -> Result<T> {
        let restored = if self.sessions()?.contains(session) {
            None
        } else {
            self.restore(session)
        };

        let (out, snapshot) = {
            let mut sessions = self.sessions()?;
            self.admit(&mut sessions, session, restored.unwrap_or_default());
            let items = sessions.get_mut(session).ok_or_else(|| {
                DataSphereError::StorageError(format!("session {} vanished during a write", session))
            })?;
            let out = f(items);
            (out, self.dir.as_ref().map(|_| items.clone()))
        };

        if let Some(snapshot) = snapshot {
            self.persist(session, snapshot)?;
        }
        Ok(out)
    }

    fn persist(&self, session: &str, snapshot: Items) -> Result<()> {
        let Some(path) = self.session_path(session) else {
            return Ok(());
        };

        let _writing = self
            .writes
            .lock()
            .map_err(|_| DataSphereError::StorageError("session file lock poisoned".to_string()))?;
        // a later write may have landed in memory since the snapshot was taken
        let latest = self
            .sessions()?
            .peek(session)
            .cloned()
            .unwrap_or(snapshot);

        let body = serde_json::to_vec(&latest)?;
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, body)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

fn read_items(path: &Path) -> Result<Items> {
    let raw = fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Storage handle for one visitor session
#[derive(Debug, Clone)]
pub struct ClientStore {
    registry: Arc<StorageRegistry>,
    session: String,
}

impl ClientStore {
    pub fn get_item(&self, key: &str) -> Option<String> {
        match self.registry.lookup(&self.session, |items| items.get(key).cloned()) {
            Ok(value) => value.flatten(),
            Err(e) => {
                error!("Failed to read session storage: {}", e);
                None
            }
        }
    }

    pub fn set_item(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.registry.modify(&self.session, |items| {
            items.insert(key.to_string(), value);
        })
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.registry.modify(&self.session, |items| {
            items.remove(key);
        })
    }

    /// Replace an item with what `f` derives from its current value, with no
    /// other write to this session in between
    pub fn update_item<R>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&str>) -> Result<(String, R)>,
    ) -> Result<R> {
        self.registry.modify(&self.session, |items| {
            let (value, out) = f(items.get(key).map(String::as_str))?;
            items.insert(key.to_string(), value);
            Ok(out)
        })?
    }

    /// Parse an item as JSON; `Ok(None)` when the key is absent
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_item(key) {
            Some(raw) => parse_json(key, &raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_item(key, raw)
    }
}

/// Parse a stored item, naming the key when it is not valid JSON
pub fn parse_json<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| DataSphereError::StorageError(format!("item '{}' is not valid JSON: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> String {
        Uuid::new_v4().to_string()
    }

    #[test]
    fn test_set_get_remove() {
        let registry = Arc::new(StorageRegistry::in_memory());
        let store = registry.client(&session());

        assert!(store.get_item(USER_KEY).is_none());
        store.set_item(USER_KEY, "{}").unwrap();
        assert_eq!(store.get_item(USER_KEY).as_deref(), Some("{}"));
        store.remove_item(USER_KEY).unwrap();
        assert!(store.get_item(USER_KEY).is_none());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let registry = Arc::new(StorageRegistry::in_memory());
        let a = registry.client(&session());
        let b = registry.client(&session());

        a.set_item(PROGRESS_KEY, "a").unwrap();
        assert!(b.get_item(PROGRESS_KEY).is_none());
        b.set_item(USER_KEY, "b").unwrap();
        assert!(a.get_item(USER_KEY).is_none());
        assert_eq!(registry.session_count(), 2);
    }

    #[test]
    fn test_json_helpers() {
        let registry = Arc::new(StorageRegistry::in_memory());
        let store = registry.client(&session());

        store.set_json("list", &vec![1, 2, 3]).unwrap();
        let list: Vec<i32> = store.get_json("list").unwrap().unwrap();
        assert_eq!(list, vec![1, 2, 3]);

        store.set_item("broken", "{oops").unwrap();
        assert!(store.get_json::<Vec<i32>>("broken").is_err());
        assert!(store.get_json::<Vec<i32>>("missing").unwrap().is_none());
    }

    #[test]
    fn test_persistent_storage_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let id = session();

        {
            let registry = Arc::new(StorageRegistry::persistent(dir.path()).unwrap());
            registry.client(&id).set_item(&reviews_key("sql-mastery"), "[]").unwrap();
        }

        let registry = Arc::new(StorageRegistry::persistent(dir.path()).unwrap());
        assert_eq!(
            registry.client(&id).get_item(&reviews_key("sql-mastery")).as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn test_non_uuid_sessions_are_never_written() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(StorageRegistry::persistent(dir.path()).unwrap());
        registry.client("../escape").set_item(USER_KEY, "x").unwrap();

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_reads_do_not_grow_the_registry() {
        let registry = Arc::new(StorageRegistry::in_memory());
        for _ in 0..500 {
            let store = registry.client(&session());
            assert!(store.get_item(PROGRESS_KEY).is_none());
            assert!(store.get_json::<Vec<i32>>(USER_KEY).unwrap().is_none());
        }
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_capacity_drops_least_recently_used() {
        let registry = Arc::new(StorageRegistry::in_memory().with_capacity(2).unwrap());
        let a = registry.client(&session());
        let b = registry.client(&session());
        let c = registry.client(&session());

        a.set_item(USER_KEY, "a").unwrap();
        b.set_item(USER_KEY, "b").unwrap();
        assert_eq!(a.get_item(USER_KEY).as_deref(), Some("a"));
        c.set_item(USER_KEY, "c").unwrap();

        assert_eq!(registry.session_count(), 2);
        assert_eq!(a.get_item(USER_KEY).as_deref(), Some("a"));
        assert!(b.get_item(USER_KEY).is_none());

        assert!(StorageRegistry::in_memory().with_capacity(0).is_err());
    }

    #[test]
    fn test_evicted_sessions_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(StorageRegistry::persistent(dir.path()).unwrap().with_capacity(1).unwrap());
        let a = registry.client(&session());
        let b = registry.client(&session());

        a.set_item(USER_KEY, "a").unwrap();
        b.set_item(USER_KEY, "b").unwrap();
        assert_eq!(registry.session_count(), 1);
        assert_eq!(a.get_item(USER_KEY).as_deref(), Some("a"));
        assert_eq!(b.get_item(USER_KEY).as_deref(), Some("b"));
    }

    #[test]
    fn test_update_item_sees_every_write() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(StorageRegistry::persistent(dir.path()).unwrap());
        let id = session();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = registry.client(&id);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store
                            .update_item("counter", |raw| {
                                let n: u32 = raw.and_then(|r| r.parse().ok()).unwrap_or(0);
                                Ok(((n + 1).to_string(), ()))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.client(&id).get_item("counter").as_deref(), Some("200"));
        // no temporary files left behind
        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);

        let reloaded = Arc::new(StorageRegistry::persistent(dir.path()).unwrap());
        assert_eq!(reloaded.client(&id).get_item("counter").as_deref(), Some("200"));
    }

    #[test]
    fn test_keys() {
        assert_eq!(user_record_key("a@b.ma"), "datasphere_user_db_a@b.ma");
        assert_eq!(reviews_key("db-design"), "course_reviews_db-design");
    }
}
