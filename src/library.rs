use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, unbounded};
use fast_image_resize::images::Image as FastImage;
use fast_image_resize::{PixelType, ResizeOptions, Resizer};
use walkdir::WalkDir;

use crate::{AssetId, PhotoMeta};

pub const IMAGE_EXTS: &[&str] =
    &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

const SCAN_BATCH: usize = 64;

pub fn is_image_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Stable opaque id for one photo. The path string is unique within a
/// single-rooted library and survives restarts.
pub fn asset_id_for(path: &Path) -> AssetId {
    path.to_string_lossy().into_owned()
}

#[derive(Debug, Clone)]
pub enum ScanUpdate {
    Batch(Vec<PhotoMeta>),
    Done { total: usize },
}

/// Walk the library root on a background thread, streaming batches so the
/// grid fills while the scan is still running.
pub fn spawn_scan(root: PathBuf) -> Receiver<ScanUpdate> {
    let (tx, rx) = unbounded();
    thread::spawn(move || scan_worker(&root, &tx));
    rx
}

fn scan_worker(root: &Path, tx: &Sender<ScanUpdate>) {
    let mut batch = Vec::new();
    let mut total = 0usize;

    for entry in WalkDir::new(root).follow_links(false).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_image_ext(path) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let modified = DateTime::<Utc>::from(metadata.modified().unwrap_or(UNIX_EPOCH));

        batch.push(PhotoMeta {
            id: asset_id_for(path),
            path: path.to_path_buf(),
            size: metadata.len(),
            modified,
            resolution: image::image_dimensions(path).ok(),
        });
        total += 1;

        if batch.len() >= SCAN_BATCH
            && tx.send(ScanUpdate::Batch(std::mem::take(&mut batch))).is_err()
        {
            return; // receiver gone, app is shutting down
        }
    }

    if !batch.is_empty() {
        let _ = tx.send(ScanUpdate::Batch(batch));
    }
    let _ = tx.send(ScanUpdate::Done { total });
}

/// Sort orders accepted by --sort.
pub const SORT_ORDERS: &[&str] = &["name", "date", "date-desc", "size", "size-desc"];

pub fn sort_assets(assets: &mut [PhotoMeta], order: &str) {
    let by_name = |a: &PhotoMeta, b: &PhotoMeta| {
        let name_a = a.path.file_name().unwrap_or_default().to_string_lossy().to_string();
        let name_b = b.path.file_name().unwrap_or_default().to_string_lossy().to_string();
        natord::compare(&name_a, &name_b)
    };
    match order {
        "date" => assets.sort_by(|a, b| a.modified.cmp(&b.modified)),
        "date-desc" => assets.sort_by(|a, b| b.modified.cmp(&a.modified)),
        "size" => assets.sort_by(|a, b| a.size.cmp(&b.size)),
        "size-desc" => assets.sort_by(|a, b| b.size.cmp(&a.size)),
        _ => assets.sort_by(by_name),
    }
}

/// In-memory model of the scanned library: the ordered asset list plus an
/// id -> position index for O(1) lookup.
#[derive(Default)]
pub struct Library {
    assets: Vec<PhotoMeta>,
    index: HashMap<AssetId, usize>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PhotoMeta> {
        self.index.get(id).and_then(|&i| self.assets.get(i))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhotoMeta> {
        self.assets.iter()
    }

    pub fn id_set(&self) -> HashSet<AssetId> {
        self.index.keys().cloned().collect()
    }

    /// Append a streamed scan batch, skipping ids already present.
    pub fn absorb_batch(&mut self, batch: Vec<PhotoMeta>) {
        for meta in batch {
            if self.index.contains_key(&meta.id) {
                continue;
            }
            self.index.insert(meta.id.clone(), self.assets.len());
            self.assets.push(meta);
        }
    }

    pub fn resort(&mut self, order: &str) {
        sort_assets(&mut self.assets, order);
        self.rebuild_index();
    }

    pub fn remove_ids(&mut self, ids: &HashSet<AssetId>) {
        if ids.is_empty() {
            return;
        }
        self.assets.retain(|m| !ids.contains(&m.id));
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .assets
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
    }

    /// Delete the given assets from disk (trash or permanent). Per-file
    /// failures are collected, never thrown; ids unknown to the library are
    /// stale references and skipped silently. Successfully deleted assets
    /// are removed from the library; the caller reconciles its own state
    /// against the returned confirmed subset.
    pub fn delete_assets(
        &mut self,
        ids: &[AssetId],
        use_trash: bool,
    ) -> (Vec<AssetId>, Vec<String>) {
        let mut deleted = Vec::new();
        let mut errors = Vec::new();

        for id in ids {
            let Some(meta) = self.get(id) else { continue };
            let path = meta.path.clone();
            let res = if use_trash {
                trash::delete(&path).map_err(|e| e.to_string())
            } else {
                fs::remove_file(&path).map_err(|e| e.to_string())
            };
            match res {
                Ok(_) => deleted.push(id.clone()),
                Err(e) => errors.push(format!(
                    "{}: {}",
                    path.file_name().unwrap_or_default().to_string_lossy(),
                    e
                )),
            }
        }

        let deleted_set: HashSet<AssetId> = deleted.iter().cloned().collect();
        self.remove_ids(&deleted_set);
        (deleted, errors)
    }
}

// --- Thumbnail worker pool ---

/// (asset id, requested side, decoded RGBA8 pixels + dimensions, or None
/// when skipped/failed)
pub type ThumbResult = (AssetId, u32, Option<(Vec<u8>, u32, u32)>);

/// Decode + downscale pool. Jobs for assets that have scrolled out of the
/// active window are skipped by the workers instead of wasting a decode.
pub struct ThumbPool {
    job_tx: Sender<(AssetId, PathBuf, u32)>,
    result_rx: Receiver<ThumbResult>,
    active: Arc<RwLock<HashSet<AssetId>>>,
}

impl ThumbPool {
    pub fn spawn() -> Self {
        let (job_tx, job_rx) = unbounded::<(AssetId, PathBuf, u32)>();
        let (result_tx, result_rx) = unbounded();
        let active: Arc<RwLock<HashSet<AssetId>>> = Arc::new(RwLock::new(HashSet::new()));

        let num_threads =
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4).min(8);

        for _ in 0..num_threads {
            let rx = job_rx.clone();
            let tx = result_tx.clone();
            let window = active.clone();

            thread::spawn(move || {
                while let Ok((id, path, side)) = rx.recv() {
                    // Skip if no longer in the active window
                    if let Ok(window) = window.read()
                        && !window.contains(&id)
                    {
                        let _ = tx.send((id, side, None));
                        continue;
                    }
                    let result = decode_thumbnail(&path, side);
                    if tx.send((id, side, result)).is_err() {
                        return;
                    }
                }
            });
        }

        Self { job_tx, result_rx, active }
    }

    pub fn request(&self, id: AssetId, path: PathBuf, side: u32) {
        let _ = self.job_tx.send((id, path, side));
    }

    pub fn poll(&self) -> Option<ThumbResult> {
        self.result_rx.try_recv().ok()
    }

    /// Replace the set of assets the workers should still bother decoding.
    pub fn set_active(&self, ids: HashSet<AssetId>) {
        if let Ok(mut window) = self.active.write() {
            *window = ids;
        }
    }
}

/// Decode an image and downscale its longest side to `side` pixels using
/// SIMD resize. Returns raw RGBA8.
pub fn decode_thumbnail(path: &Path, side: u32) -> Option<(Vec<u8>, u32, u32)> {
    let dyn_img = image::open(path).ok()?;
    let (w, h) = (dyn_img.width(), dyn_img.height());
    let rgba = dyn_img.to_rgba8();

    if w.max(h) <= side || side == 0 {
        return Some((rgba.into_raw(), w, h));
    }

    let scale = side as f32 / w.max(h) as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);

    let src = FastImage::from_vec_u8(w, h, rgba.into_raw(), PixelType::U8x4).ok()?;
    let mut dst = FastImage::new(new_w, new_h, PixelType::U8x4);
    let mut resizer = Resizer::new();
    resizer.resize(&src, &mut dst, &ResizeOptions::default()).ok()?;

    Some((dst.buffer().to_vec(), new_w, new_h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str, size: u64, mtime_secs: i64) -> PhotoMeta {
        PhotoMeta {
            id: name.to_string(),
            path: PathBuf::from(name),
            size,
            modified: DateTime::<Utc>::from_timestamp(mtime_secs, 0).unwrap(),
            resolution: None,
        }
    }

    #[test]
    fn test_is_image_ext() {
        assert!(is_image_ext(Path::new("/x/photo.JPG")));
        assert!(is_image_ext(Path::new("shot.webp")));
        assert!(!is_image_ext(Path::new("notes.txt")));
        assert!(!is_image_ext(Path::new("no_extension")));
    }

    #[test]
    fn test_sort_assets_natural_name_order() {
        let mut assets =
            vec![meta("img10.jpg", 0, 0), meta("img2.jpg", 0, 0), meta("img1.jpg", 0, 0)];
        sort_assets(&mut assets, "name");
        let names: Vec<_> = assets.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(names, ["img1.jpg", "img2.jpg", "img10.jpg"]);
    }

    #[test]
    fn test_sort_assets_by_date_and_size() {
        let mut assets =
            vec![meta("a.jpg", 30, 300), meta("b.jpg", 10, 100), meta("c.jpg", 20, 200)];
        sort_assets(&mut assets, "date");
        assert_eq!(assets[0].id, "b.jpg");
        sort_assets(&mut assets, "date-desc");
        assert_eq!(assets[0].id, "a.jpg");
        sort_assets(&mut assets, "size-desc");
        assert_eq!(assets[0].id, "a.jpg");
        assert_eq!(assets[2].id, "b.jpg");
    }

    #[test]
    fn test_library_absorb_dedup_and_lookup() {
        let mut lib = Library::new();
        lib.absorb_batch(vec![meta("a.jpg", 1, 0), meta("b.jpg", 2, 0)]);
        lib.absorb_batch(vec![meta("b.jpg", 2, 0), meta("c.jpg", 3, 0)]);

        assert_eq!(lib.len(), 3);
        assert_eq!(lib.get("b.jpg").unwrap().size, 2);
        assert!(lib.contains("c.jpg"));
        assert!(!lib.contains("zzz"));
        assert_eq!(lib.id_set().len(), 3);
    }

    #[test]
    fn test_library_remove_ids_rebuilds_index() {
        let mut lib = Library::new();
        lib.absorb_batch(vec![meta("a.jpg", 1, 0), meta("b.jpg", 2, 0), meta("c.jpg", 3, 0)]);

        let gone: HashSet<AssetId> = ["b.jpg"].iter().map(|s| s.to_string()).collect();
        lib.remove_ids(&gone);

        assert_eq!(lib.len(), 2);
        assert!(!lib.contains("b.jpg"));
        // Index still resolves correctly after the shift
        assert_eq!(lib.get("c.jpg").unwrap().size, 3);
    }

    #[test]
    fn test_scan_streams_batches_and_total() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"not really a jpeg").unwrap();
        fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.PNG"), b"nope").unwrap();

        let rx = spawn_scan(dir.path().to_path_buf());
        let mut lib = Library::new();
        let mut total = None;
        while let Ok(update) = rx.recv_timeout(std::time::Duration::from_secs(5)) {
            match update {
                ScanUpdate::Batch(batch) => lib.absorb_batch(batch),
                ScanUpdate::Done { total: t } => {
                    total = Some(t);
                    break;
                }
            }
        }

        assert_eq!(total, Some(2));
        assert_eq!(lib.len(), 2);
        // Unreadable image headers are fine; the asset is listed anyway
        assert!(lib.iter().all(|m| m.resolution.is_none()));
    }

    #[test]
    fn test_decode_thumbnail_downscales_longest_side() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.png");
        image::RgbaImage::from_pixel(64, 32, image::Rgba([200, 10, 10, 255]))
            .save(&path)
            .unwrap();

        let (pixels, w, h) = decode_thumbnail(&path, 16).unwrap();
        assert_eq!((w, h), (16, 8));
        assert_eq!(pixels.len(), (16 * 8 * 4) as usize);

        // Already small enough: returned as-is
        let (_, w, h) = decode_thumbnail(&path, 256).unwrap();
        assert_eq!((w, h), (64, 32));
    }

    #[test]
    fn test_delete_assets_partial_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ok_path = dir.path().join("ok.jpg");
        fs::write(&ok_path, b"fake").unwrap();
        let gone_path = dir.path().join("already-gone.jpg");

        let mut lib = Library::new();
        lib.absorb_batch(vec![
            PhotoMeta {
                id: asset_id_for(&ok_path),
                path: ok_path.clone(),
                size: 4,
                modified: Utc::now(),
                resolution: None,
            },
            PhotoMeta {
                id: asset_id_for(&gone_path),
                path: gone_path.clone(),
                size: 0,
                modified: Utc::now(),
                resolution: None,
            },
        ]);

        let ids = vec![
            asset_id_for(&ok_path),
            asset_id_for(&gone_path),
            "stale-id-not-in-library".to_string(),
        ];
        let (deleted, errors) = lib.delete_assets(&ids, false);

        assert_eq!(deleted, vec![asset_id_for(&ok_path)]);
        assert_eq!(errors.len(), 1, "the vanished file reports one error");
        assert!(!ok_path.exists());
        // Deleted asset left the library; the failed one stays
        assert!(!lib.contains(&asset_id_for(&ok_path)));
        assert!(lib.contains(&asset_id_for(&gone_path)));
    }
}
