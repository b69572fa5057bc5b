use std::collections::HashSet;

use crate::AssetId;
use crate::filter::TagFilter;
use crate::library::Library;
use crate::selection::{SelectionEvent, SelectionSession};
use crate::store::{Tag, TagStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Grid,
    Detail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriageIntent {
    TagCurrent(Option<Tag>),
    TagSelection(Option<Tag>),
    OpenDetail(AssetId),
    CloseDetail,
    NextItem,
    PrevItem,
    ToggleSelectionMode,
    ClearSelection,
    RequestDelete,
    ConfirmDelete,
    ToggleFilter(Option<Tag>),
    Cancel,
    Quit,
}

pub struct AppState {
    pub library: Library,
    pub store: TagStore,
    pub filter: TagFilter,
    pub selection: SelectionSession,
    pub screen: Screen,
    /// Index into the filtered sequence while the detail view is open.
    pub current_index: usize,
    pub status_message: Option<(String, bool)>,
    pub error_popup: Option<String>,
    pub show_delete_confirmation: bool,
    pending_delete: Vec<AssetId>,
    pub use_trash: bool,
    pub sort_order: String,
    pub is_loading: bool,
    pub exit_requested: bool,
}

impl AppState {
    pub fn new(store: TagStore, use_trash: bool, sort_order: String) -> Self {
        Self {
            library: Library::new(),
            store,
            filter: TagFilter::default(),
            selection: SelectionSession::new(),
            screen: Screen::Grid,
            current_index: 0,
            status_message: None,
            error_popup: None,
            show_delete_confirmation: false,
            pending_delete: Vec::new(),
            use_trash,
            sort_order,
            is_loading: true,
            exit_requested: false,
        }
    }

    /// The ordered filtered asset sequence, derived fresh on every call so
    /// no consumer ever operates on a stale index mapping.
    pub fn filtered(&self) -> Vec<AssetId> {
        self.filter.apply(&self.library, &self.store)
    }

    pub fn current_asset(&self) -> Option<AssetId> {
        self.filtered().get(self.current_index).cloned()
    }

    pub fn set_status(&mut self, msg: String, is_error: bool) {
        self.status_message = Some((msg, is_error));
    }

    pub fn handle_intent(&mut self, intent: TriageIntent) {
        // Any input dismisses the error popup first
        if self.error_popup.is_some() {
            self.error_popup = None;
            return;
        }

        // Delete confirmation modal swallows everything except its answers
        if self.show_delete_confirmation {
            match intent {
                TriageIntent::ConfirmDelete => {
                    self.show_delete_confirmation = false;
                    self.perform_deletion();
                }
                TriageIntent::Cancel | TriageIntent::Quit => {
                    self.show_delete_confirmation = false;
                    self.pending_delete.clear();
                }
                _ => {}
            }
            return;
        }

        match intent {
            TriageIntent::Quit => self.exit_requested = true,
            TriageIntent::TagCurrent(tag) => self.tag_current(tag),
            TriageIntent::TagSelection(tag) => self.tag_selection(tag),
            TriageIntent::OpenDetail(id) => self.open_detail(&id),
            TriageIntent::CloseDetail => {
                self.screen = Screen::Grid;
            }
            TriageIntent::NextItem => {
                let len = self.filtered().len();
                if len > 0 && self.current_index + 1 < len {
                    self.current_index += 1;
                }
            }
            TriageIntent::PrevItem => {
                if self.current_index > 0 {
                    self.current_index -= 1;
                }
            }
            TriageIntent::ToggleSelectionMode => {
                let on = !self.selection.in_selection_mode();
                self.selection.set_explicit_mode(on);
            }
            TriageIntent::ClearSelection => {
                self.selection.cancel();
            }
            TriageIntent::RequestDelete => self.request_delete(),
            TriageIntent::ConfirmDelete => {}
            TriageIntent::ToggleFilter(tag) => {
                self.filter.toggle(tag);
                self.clamp_current_index();
            }
            TriageIntent::Cancel => {
                if self.selection.in_selection_mode() {
                    self.selection.cancel();
                } else {
                    self.status_message = None;
                }
            }
        }
    }

    /// Route events reported by the selection session.
    pub fn apply_selection_events(&mut self, events: &[SelectionEvent]) {
        for event in events {
            if let SelectionEvent::OpenDetail(id) = event {
                let id = id.clone();
                self.open_detail(&id);
            }
        }
    }

    fn open_detail(&mut self, id: &str) {
        let filtered = self.filtered();
        if let Some(pos) = filtered.iter().position(|a| a == id) {
            self.current_index = pos;
            self.screen = Screen::Detail;
        }
    }

    fn tag_current(&mut self, tag: Option<Tag>) {
        let Some(id) = self.current_asset() else { return };
        self.store.set(&id, tag);
        match tag {
            Some(t) => self.set_status(format!("Tagged {}", t.label()), false),
            None => self.set_status("Tag cleared".to_string(), false),
        }
        // Tagging can remove the asset from the current filter
        self.clamp_current_index();
    }

    fn tag_selection(&mut self, tag: Option<Tag>) {
        let ids = self.selection.selected_ids();
        if ids.is_empty() {
            return;
        }
        self.store.set_bulk(&ids, tag);
        match tag {
            Some(t) => {
                self.set_status(format!("Tagged {} items {}", ids.len(), t.label()), false)
            }
            None => self.set_status(format!("Cleared tags on {} items", ids.len()), false),
        }
        self.clamp_current_index();
    }

    /// Deletion targets the multi-selection when one exists, otherwise
    /// every asset currently tagged Delete.
    fn request_delete(&mut self) {
        let targets: Vec<AssetId> = if self.selection.count() > 0 {
            self.selection.selected_ids()
        } else {
            self.store
                .ids_with(Tag::Delete)
                .into_iter()
                .filter(|id| self.library.contains(id))
                .collect()
        };

        if targets.is_empty() {
            self.set_status("Nothing to delete.".to_string(), false);
            return;
        }
        self.pending_delete = targets;
        self.show_delete_confirmation = true;
    }

    pub fn pending_delete_count(&self) -> usize {
        self.pending_delete.len()
    }

    fn perform_deletion(&mut self) {
        let targets = std::mem::take(&mut self.pending_delete);
        if targets.is_empty() {
            return;
        }

        let (deleted, errors) = self.library.delete_assets(&targets, self.use_trash);

        if !deleted.is_empty() {
            // Reconcile tags and selection for the confirmed subset only
            self.store.set_bulk(&deleted, None);
            let existing = self.library.id_set();
            self.selection.retain_existing(&existing);
            self.clamp_current_index();
        }

        if errors.is_empty() {
            let action = if self.use_trash { "trashed" } else { "permanently deleted" };
            self.set_status(
                format!("Successfully {} {} files.", action, deleted.len()),
                false,
            );
        } else {
            let mut full_msg = format!("Failed to delete {} files:\n\n", errors.len());
            full_msg.push_str(&errors.iter().take(5).cloned().collect::<Vec<_>>().join("\n"));
            if errors.len() > 5 {
                full_msg.push_str("\n...and others.");
            }
            self.error_popup = Some(full_msg);
        }
    }

    /// After a completed scan: sort the library and drop tags for assets
    /// that vanished externally since the last run.
    pub fn on_scan_complete(&mut self, total: usize) {
        self.is_loading = false;
        let order = self.sort_order.clone();
        self.library.resort(&order);
        let existing: HashSet<AssetId> = self.library.id_set();
        self.store.purge(&existing);
        self.set_status(format!("Found {} photos.", total), false);
    }

    pub fn clamp_current_index(&mut self) {
        let len = self.filtered().len();
        if len == 0 {
            self.current_index = 0;
        } else if self.current_index >= len {
            self.current_index = len - 1;
        }
    }
}
