use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use serde::{Deserialize, Serialize};

use crate::AssetId;

pub const TAG_FILE_NAME: &str = ".phtriage-tags.json";

/// Quiet period for write coalescing. Mutations arriving within this window
/// supersede the pending snapshot, so a burst of tagging produces one write.
pub const QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Triage disposition for a single photo. Absence from the map means
/// "untagged"; setting a tag replaces any previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Keep,
    Delete,
    Unsure,
}

impl Tag {
    pub fn label(self) -> &'static str {
        match self {
            Tag::Keep => "keep",
            Tag::Delete => "delete",
            Tag::Unsure => "unsure",
        }
    }
}

pub type TagMap = HashMap<AssetId, Tag>;

/// Persistent AssetId -> Tag mapping with debounced write-behind persistence.
///
/// The in-memory map is the source of truth for the whole session; the file
/// is a write-behind mirror. All mutations are synchronous on the map and
/// schedule a coalesced write on the writer thread. Only the latest snapshot
/// is ever written; intermediate states never reach the disk.
pub struct TagStore {
    tags: TagMap,
    write_tx: Option<Sender<TagMap>>,
    writer: Option<thread::JoinHandle<()>>,
    load_rx: Option<Receiver<TagMap>>,
}

impl TagStore {
    /// Open a store backed by `path`. The file is read on a background
    /// thread; until `poll_loaded` absorbs the result the map is empty.
    pub fn open(path: PathBuf) -> Self {
        let (write_tx, write_rx) = unbounded::<TagMap>();
        let writer_path = path.clone();
        let writer = thread::spawn(move || writer_loop(write_rx, writer_path));

        let (load_tx, load_rx) = bounded(1);
        thread::spawn(move || {
            let _ = load_tx.send(load_tag_file(&path));
        });

        Self {
            tags: TagMap::new(),
            write_tx: Some(write_tx),
            writer: Some(writer),
            load_rx: Some(load_rx),
        }
    }

    /// Absorb the async load result if it has arrived. The loaded map
    /// replaces the in-memory one wholesale, not merged; no mutation can
    /// have happened yet on first launch, so nothing is lost.
    /// Returns true the one time the replacement happens.
    pub fn poll_loaded(&mut self) -> bool {
        if let Some(rx) = &self.load_rx
            && let Ok(map) = rx.try_recv()
        {
            self.tags = map;
            self.load_rx = None;
            return true;
        }
        false
    }

    pub fn is_loaded(&self) -> bool {
        self.load_rx.is_none()
    }

    pub fn get(&self, id: &str) -> Option<Tag> {
        self.tags.get(id).copied()
    }

    /// Set or clear (None) the tag for one asset and schedule a persist.
    pub fn set(&mut self, id: &str, tag: Option<Tag>) {
        match tag {
            Some(t) => {
                self.tags.insert(id.to_string(), t);
            }
            None => {
                self.tags.remove(id);
            }
        }
        self.schedule_persist();
    }

    /// Set the same tag on many assets at once; one scheduled persist.
    pub fn set_bulk(&mut self, ids: &[AssetId], tag: Option<Tag>) {
        for id in ids {
            match tag {
                Some(t) => {
                    self.tags.insert(id.clone(), t);
                }
                None => {
                    self.tags.remove(id);
                }
            }
        }
        self.schedule_persist();
    }

    /// Drop every entry whose key is not in `existing`. Used to garbage
    /// collect tags for assets that vanished from the library externally.
    /// Schedules a write only if something was actually removed.
    pub fn purge(&mut self, existing: &HashSet<AssetId>) {
        let before = self.tags.len();
        self.tags.retain(|id, _| existing.contains(id));
        if self.tags.len() != before {
            self.schedule_persist();
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// (keep, delete, unsure) totals for the toolbar.
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for tag in self.tags.values() {
            match tag {
                Tag::Keep => counts.0 += 1,
                Tag::Delete => counts.1 += 1,
                Tag::Unsure => counts.2 += 1,
            }
        }
        counts
    }

    /// Ids currently carrying `tag`, in no particular order.
    pub fn ids_with(&self, tag: Tag) -> Vec<AssetId> {
        self.tags
            .iter()
            .filter(|(_, t)| **t == tag)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn schedule_persist(&self) {
        // Snapshot is captured here, at schedule time, so two overlapping
        // writes can never interleave partial state.
        if let Some(tx) = &self.write_tx {
            let _ = tx.send(self.tags.clone());
        }
    }

    /// Drain any pending snapshot to disk and stop the writer thread.
    /// Idempotent; also runs on drop.
    pub fn flush(&mut self) {
        self.write_tx = None; // disconnects the channel; writer drains and exits
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

impl Drop for TagStore {
    fn drop(&mut self) {
        self.flush();
    }
}

fn writer_loop(rx: Receiver<TagMap>, path: PathBuf) {
    while let Ok(first) = rx.recv() {
        let (snapshot, disconnected) = coalesce_pending(&rx, first);
        if let Err(e) = write_tag_file(&path, &snapshot) {
            eprintln!("[WARN] Failed to persist tags to {:?}: {}", path, e);
        }
        if disconnected {
            return;
        }
    }
}

/// Debounce: keep replacing the pending snapshot while newer ones arrive
/// within the quiet period. Returns the snapshot to write and whether the
/// store side hung up (flush/exit).
fn coalesce_pending(rx: &Receiver<TagMap>, mut pending: TagMap) -> (TagMap, bool) {
    loop {
        match rx.recv_timeout(QUIET_PERIOD) {
            Ok(newer) => pending = newer,
            Err(RecvTimeoutError::Timeout) => return (pending, false),
            Err(RecvTimeoutError::Disconnected) => return (pending, true),
        }
    }
}

/// Atomic replace: write to a temp file in the same directory, fsync, then
/// rename over the target. A concurrent reader sees fully-old or fully-new,
/// never a partial file.
pub fn write_tag_file(path: &Path, tags: &TagMap) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(tags)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"))?;
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)
}

/// Missing file or malformed content both yield an empty map; persistence
/// failures are never surfaced to the user.
pub fn load_tag_file(path: &Path) -> TagMap {
    match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(map) => map,
            Err(e) => {
                eprintln!("[WARN] Ignoring malformed tag file {:?}: {}", path, e);
                TagMap::new()
            }
        },
        Err(_) => TagMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_loaded(store: &mut TagStore) {
        for _ in 0..100 {
            if store.poll_loaded() || store.is_loaded() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("store never finished loading");
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TAG_FILE_NAME);

        let mut map = TagMap::new();
        map.insert("a".to_string(), Tag::Keep);
        map.insert("some/long path/IMG_0001.jpg".to_string(), Tag::Delete);
        map.insert("üñïçödé.png".to_string(), Tag::Unsure);

        write_tag_file(&path, &map).unwrap();
        assert_eq!(load_tag_file(&path), map);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let map = load_tag_file(&dir.path().join("does-not-exist.json"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TAG_FILE_NAME);
        fs::write(&path, b"{ not json at all").unwrap();
        assert!(load_tag_file(&path).is_empty());

        // Wrong shape is also malformed, not fatal
        fs::write(&path, b"[1, 2, 3]").unwrap();
        assert!(load_tag_file(&path).is_empty());
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TAG_FILE_NAME);

        let mut map = TagMap::new();
        map.insert("a".to_string(), Tag::Keep);
        write_tag_file(&path, &map).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1, "only the tag file should remain: {:?}", entries);
    }

    #[test]
    fn test_purge_keeps_exactly_intersection() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TagStore::open(dir.path().join(TAG_FILE_NAME));
        wait_loaded(&mut store);

        store.set("a", Some(Tag::Keep));
        store.set("b", Some(Tag::Delete));
        store.set("c", Some(Tag::Unsure));

        let existing: HashSet<AssetId> =
            ["a", "c", "zzz"].iter().map(|s| s.to_string()).collect();
        store.purge(&existing);

        assert_eq!(store.get("a"), Some(Tag::Keep));
        assert_eq!(store.get("b"), None);
        assert_eq!(store.get("c"), Some(Tag::Unsure));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_set_replaces_never_merges() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TagStore::open(dir.path().join(TAG_FILE_NAME));
        wait_loaded(&mut store);

        store.set("a", Some(Tag::Keep));
        store.set("a", Some(Tag::Delete));
        assert_eq!(store.get("a"), Some(Tag::Delete));
        assert_eq!(store.len(), 1);

        store.set("a", None);
        assert_eq!(store.get("a"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_coalesce_returns_only_latest_snapshot() {
        let (tx, rx) = unbounded::<TagMap>();
        let mut first = TagMap::new();
        first.insert("a".to_string(), Tag::Keep);

        // Two newer snapshots already queued: both supersede `first`,
        // so exactly one write happens and it holds the final state.
        let mut mid = TagMap::new();
        mid.insert("a".to_string(), Tag::Unsure);
        tx.send(mid).unwrap();

        let mut last = TagMap::new();
        last.insert("a".to_string(), Tag::Delete);
        tx.send(last.clone()).unwrap();

        let (snapshot, disconnected) = coalesce_pending(&rx, first);
        assert_eq!(snapshot, last);
        assert!(!disconnected);
    }

    #[test]
    fn test_rapid_sets_persist_only_final_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TAG_FILE_NAME);
        let mut store = TagStore::open(path.clone());
        wait_loaded(&mut store);

        // Both mutations land well inside one quiet period
        store.set("a", Some(Tag::Keep));
        store.set("a", Some(Tag::Delete));
        store.flush();

        let on_disk = load_tag_file(&path);
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk.get("a"), Some(&Tag::Delete));
    }

    #[test]
    fn test_flush_drains_pending_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TAG_FILE_NAME);

        {
            let mut store = TagStore::open(path.clone());
            wait_loaded(&mut store);
            store.set("x", Some(Tag::Keep));
            // dropped immediately, long before the quiet period elapses
        }

        let on_disk = load_tag_file(&path);
        assert_eq!(on_disk.get("x"), Some(&Tag::Keep));
    }

    #[test]
    fn test_load_replaces_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TAG_FILE_NAME);

        let mut seeded = TagMap::new();
        seeded.insert("old".to_string(), Tag::Keep);
        write_tag_file(&path, &seeded).unwrap();

        let mut store = TagStore::open(path);
        wait_loaded(&mut store);
        assert_eq!(store.get("old"), Some(Tag::Keep));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_bulk_set_tags_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TagStore::open(dir.path().join(TAG_FILE_NAME));
        wait_loaded(&mut store);

        let ids: Vec<AssetId> = (0..20).map(|i| format!("img-{i}")).collect();
        store.set_bulk(&ids, Some(Tag::Unsure));
        assert_eq!(store.len(), 20);
        assert!(ids.iter().all(|id| store.get(id) == Some(Tag::Unsure)));

        store.set_bulk(&ids, None);
        assert!(store.is_empty());
    }
}
