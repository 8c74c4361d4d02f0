//! Durable mapping between source identities and created target events.
//!
//! The store is the tool's only source of truth besides the target
//! calendar itself: it records, per source identity, which target event
//! was created for it and at what times, so changes can be detected
//! without re-reading the target calendar.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CalMaskError, CalMaskResult};
use crate::event::Identity;

/// One persisted row: source identity → created target event.
///
/// Mutated only after a confirmed remote operation. Unknown fields in
/// the serialized form are ignored on load so the schema can grow
/// across versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedMapping {
    pub identity: Identity,
    pub target_event_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

/// The on-disk mapping file, loaded at the start of a run and flushed
/// once at the end.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    mappings: BTreeMap<Identity, TrackedMapping>,
}

impl StateStore {
    /// Load the store from disk.
    ///
    /// A missing file is an empty store (first run). An unreadable or
    /// garbled file is fatal: running against an accidentally empty
    /// mapping would duplicate every busy block in the target calendar.
    pub fn load(path: impl Into<PathBuf>) -> CalMaskResult<StateStore> {
        let path = path.into();

        if !path.exists() {
            return Ok(StateStore {
                path,
                mappings: BTreeMap::new(),
            });
        }

        let content = std::fs::read_to_string(&path)?;
        let mappings: BTreeMap<Identity, TrackedMapping> = serde_json::from_str(&content)
            .map_err(|e| CalMaskError::StateCorrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Ok(StateStore { path, mappings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, identity: &Identity) -> Option<&TrackedMapping> {
        self.mappings.get(identity)
    }

    pub fn put(&mut self, mapping: TrackedMapping) {
        self.mappings.insert(mapping.identity.clone(), mapping);
    }

    pub fn remove(&mut self, identity: &Identity) -> Option<TrackedMapping> {
        self.mappings.remove(identity)
    }

    /// All tracked mappings, ordered by identity.
    pub fn all(&self) -> impl Iterator<Item = &TrackedMapping> {
        self.mappings.values()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Persist the store atomically: write to a temp file next to the
    /// target, then rename into place. A crash mid-write leaves the
    /// previous file intact.
    pub fn save(&self) -> CalMaskResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.mappings)
            .map_err(|e| CalMaskError::Serialization(e.to_string()))?;

        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn mapping(uid: &str, hour: u32) -> TrackedMapping {
        let start = Utc.with_ymd_and_hms(2025, 8, 18, hour, 0, 0).unwrap();
        TrackedMapping {
            identity: Identity::derive(
                Some(uid),
                start,
                start + chrono::Duration::hours(1),
                chrono::Duration::minutes(5),
            ),
            target_event_id: format!("target-{uid}"),
            start,
            end: start + chrono::Duration::hours(1),
            last_synced_at: Utc.with_ymd_and_hms(2025, 8, 18, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(dir.path().join("state.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = StateStore::load(&path).unwrap();
        store.put(mapping("a", 9));
        store.put(mapping("b", 14));
        store.save().unwrap();

        let reloaded = StateStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(&mapping("a", 9).identity), Some(&mapping("a", 9)));
    }

    #[test]
    fn test_corrupt_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ \"truncated\": ").unwrap();

        match StateStore::load(&path) {
            Err(CalMaskError::StateCorrupt { .. }) => {}
            other => panic!("expected StateCorrupt, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{
                "uid:a": {
                    "identity": "uid:a",
                    "target_event_id": "t1",
                    "start": "2025-08-18T09:00:00Z",
                    "end": "2025-08-18T10:00:00Z",
                    "last_synced_at": "2025-08-18T12:00:00Z",
                    "some_future_field": true
                }
            }"#,
        )
        .unwrap();

        let store = StateStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = StateStore::load(&path).unwrap();
        store.put(mapping("a", 9));
        store.save().unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["state.json".to_string()]);
    }

    #[test]
    fn test_remove_then_save_drops_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = StateStore::load(&path).unwrap();
        store.put(mapping("a", 9));
        store.put(mapping("b", 14));
        store.remove(&mapping("a", 9).identity);
        store.save().unwrap();

        let reloaded = StateStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.get(&mapping("a", 9).identity).is_none());
    }
}
