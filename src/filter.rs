use std::path::PathBuf;

use crate::AssetId;
use crate::library::Library;
use crate::store::{Tag, TagStore};

/// Which assets the grid and filmstrip operate over. The filtered sequence
/// is re-derived on every read; consumers must never assume index stability
/// across filter or tag changes.
#[derive(Debug, Clone, PartialEq)]
pub struct TagFilter {
    pub show_keep: bool,
    pub show_delete: bool,
    pub show_unsure: bool,
    pub show_untagged: bool,
    /// Optional restriction to one directory subtree of the library.
    pub collection: Option<PathBuf>,
}

impl Default for TagFilter {
    fn default() -> Self {
        Self {
            show_keep: true,
            show_delete: true,
            show_unsure: true,
            show_untagged: true,
            collection: None,
        }
    }
}

impl TagFilter {
    pub fn allows(&self, tag: Option<Tag>) -> bool {
        match tag {
            Some(Tag::Keep) => self.show_keep,
            Some(Tag::Delete) => self.show_delete,
            Some(Tag::Unsure) => self.show_unsure,
            None => self.show_untagged,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn toggle(&mut self, tag: Option<Tag>) {
        match tag {
            Some(Tag::Keep) => self.show_keep = !self.show_keep,
            Some(Tag::Delete) => self.show_delete = !self.show_delete,
            Some(Tag::Unsure) => self.show_unsure = !self.show_unsure,
            None => self.show_untagged = !self.show_untagged,
        }
    }

    /// Derive the ordered filtered asset sequence fresh from the library.
    pub fn apply(&self, library: &Library, store: &TagStore) -> Vec<AssetId> {
        library
            .iter()
            .filter(|m| {
                self.collection
                    .as_ref()
                    .map(|dir| m.path.starts_with(dir))
                    .unwrap_or(true)
            })
            .filter(|m| self.allows(store.get(&m.id)))
            .map(|m| m.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::Path;

    use crate::PhotoMeta;
    use crate::store::TAG_FILE_NAME;

    fn library() -> Library {
        let mut lib = Library::new();
        lib.absorb_batch(
            ["/lib/a.jpg", "/lib/b.jpg", "/lib/sub/c.jpg", "/lib/sub/d.jpg"]
                .iter()
                .map(|p| PhotoMeta {
                    id: p.to_string(),
                    path: PathBuf::from(p),
                    size: 0,
                    modified: Utc::now(),
                    resolution: None,
                })
                .collect(),
        );
        lib
    }

    fn store(dir: &Path) -> TagStore {
        let mut store = TagStore::open(dir.join(TAG_FILE_NAME));
        for _ in 0..100 {
            if store.poll_loaded() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        store
    }

    #[test]
    fn test_default_allows_everything_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library();
        let store = store(dir.path());

        let filter = TagFilter::default();
        assert!(filter.is_default());
        assert_eq!(
            filter.apply(&lib, &store),
            vec!["/lib/a.jpg", "/lib/b.jpg", "/lib/sub/c.jpg", "/lib/sub/d.jpg"]
        );
    }

    #[test]
    fn test_tag_and_untagged_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library();
        let mut store = store(dir.path());
        store.set("/lib/a.jpg", Some(Tag::Delete));
        store.set("/lib/b.jpg", Some(Tag::Keep));

        let mut filter = TagFilter::default();
        filter.toggle(Some(Tag::Delete));
        assert_eq!(
            filter.apply(&lib, &store),
            vec!["/lib/b.jpg", "/lib/sub/c.jpg", "/lib/sub/d.jpg"]
        );

        filter.toggle(None);
        assert_eq!(filter.apply(&lib, &store), vec!["/lib/b.jpg"]);
        assert!(!filter.is_default());
    }

    #[test]
    fn test_collection_restriction() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library();
        let store = store(dir.path());

        let filter = TagFilter {
            collection: Some(PathBuf::from("/lib/sub")),
            ..TagFilter::default()
        };
        assert_eq!(filter.apply(&lib, &store), vec!["/lib/sub/c.jpg", "/lib/sub/d.jpg"]);
    }
}
