use eframe::egui;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::AssetId;
use crate::config::Config;
use crate::filmstrip::IndexSynchronizer;
use crate::library::{self, ScanUpdate, ThumbPool};
use crate::state::{AppState, Screen, TriageIntent};
use crate::store::{Tag, TagStore};

use super::{APP_TITLE, DETAIL_SIDE, detail, dialogs, grid};

const MAX_DETAIL_CACHE: usize = 12;

/// One in-flight snap animation of the filmstrip scroll offset.
pub(super) struct StripAnim {
    pub from: f32,
    pub to: f32,
    pub started: Instant,
}

pub struct GuiApp {
    pub(super) state: AppState,
    pub(super) cfg: Config,
    pub(super) library_root: PathBuf,

    pub(super) scan_rx: Option<Receiver<ScanUpdate>>,
    pub(super) thumbs: ThumbPool,
    pub(super) thumb_cache: HashMap<AssetId, egui::TextureHandle>,
    pub(super) thumb_pending: HashSet<AssetId>,
    pub(super) detail_cache: HashMap<AssetId, egui::TextureHandle>,
    pub(super) detail_pending: HashSet<AssetId>,

    // Filmstrip scroll <-> index reconciliation
    pub(super) sync: IndexSynchronizer,
    pub(super) strip_anim: Option<StripAnim>,
    /// One-shot hard positioning of the strip (entering the detail view).
    pub(super) strip_jump: Option<f32>,
    /// Offset actually in effect last frame; animation start point.
    pub(super) strip_offset: f32,
    pub(super) swipe_accum: f32,
    pub(super) last_screen: Screen,

    pub(super) initial_scale_applied: bool,
    pub(super) status_set_time: Option<Instant>,
    last_status: Option<String>,
    pub(super) last_window_size: Option<(u32, u32)>,
    session_saved: bool,
}

impl GuiApp {
    pub fn new(
        cfg: Config,
        library_root: PathBuf,
        tag_file: PathBuf,
        use_trash: bool,
        sort_order: String,
    ) -> Self {
        let store = TagStore::open(tag_file);
        let state = AppState::new(store, use_trash, sort_order);

        Self {
            state,
            cfg,
            library_root,
            scan_rx: None,
            thumbs: ThumbPool::spawn(),
            thumb_cache: HashMap::new(),
            thumb_pending: HashSet::new(),
            detail_cache: HashMap::new(),
            detail_pending: HashSet::new(),
            sync: IndexSynchronizer::new(0),
            strip_anim: None,
            strip_jump: None,
            strip_offset: 0.0,
            swipe_accum: 0.0,
            last_screen: Screen::Grid,
            initial_scale_applied: false,
            status_set_time: None,
            last_status: None,
            last_window_size: None,
            session_saved: false,
        }
    }

    pub fn set_collection(&mut self, dir: PathBuf) {
        self.state.filter.collection = Some(dir);
    }

    pub fn run(self) -> Result<(), eframe::Error> {
        let width = self.cfg.gui.width.unwrap_or(1280) as f32;
        let height = self.cfg.gui.height.unwrap_or(720) as f32;

        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default().with_inner_size([width, height]),
            ..Default::default()
        };

        eframe::run_native(
            APP_TITLE,
            options,
            Box::new(move |cc| {
                egui_extras::install_image_loaders(&cc.egui_ctx);
                Ok(Box::new(self))
            }),
        )
    }

    // --- Channel polling ---

    fn check_scan(&mut self, ctx: &egui::Context) {
        if self.state.is_loading && self.scan_rx.is_none() {
            self.scan_rx = Some(library::spawn_scan(self.library_root.clone()));
        }

        let mut done = None;
        if let Some(rx) = &self.scan_rx {
            while let Ok(update) = rx.try_recv() {
                match update {
                    ScanUpdate::Batch(batch) => {
                        self.state.library.absorb_batch(batch);
                        ctx.request_repaint();
                    }
                    ScanUpdate::Done { total } => done = Some(total),
                }
            }
        }
        if let Some(total) = done {
            self.scan_rx = None;
            self.state.on_scan_complete(total);
        }
    }

    fn receive_thumbnails(&mut self, ctx: &egui::Context) {
        while let Some((id, side, result)) = self.thumbs.poll() {
            let is_detail = side == DETAIL_SIDE;
            if is_detail {
                self.detail_pending.remove(&id);
            } else {
                self.thumb_pending.remove(&id);
            }
            let Some((pixels, w, h)) = result else { continue };

            let image =
                egui::ColorImage::from_rgba_unmultiplied([w as usize, h as usize], &pixels);
            let name = format!("{}_{}", if is_detail { "detail" } else { "thumb" }, id);
            let texture = ctx.load_texture(name, image, Default::default());
            if is_detail {
                self.detail_cache.insert(id, texture);
            } else {
                self.thumb_cache.insert(id, texture);
            }
            ctx.request_repaint();
        }

        // Detail textures are big; shed everything but the current one
        if self.detail_cache.len() > MAX_DETAIL_CACHE {
            let current = self.state.current_asset();
            self.detail_cache.retain(|id, _| current.as_deref() == Some(id.as_str()));
        }
    }

    pub(super) fn request_thumb(&mut self, id: &AssetId, side: u32) {
        let (cache, pending) = if side == DETAIL_SIDE {
            (&self.detail_cache, &mut self.detail_pending)
        } else {
            (&self.thumb_cache, &mut self.thumb_pending)
        };
        if cache.contains_key(id) || pending.contains(id) {
            return;
        }
        let Some(meta) = self.state.library.get(id) else { return };
        let path = meta.path.clone();
        pending.insert(id.clone());
        self.thumbs.request(id.clone(), path, side);
    }

    // --- Input ---

    fn gather_intents(&self, ctx: &egui::Context) -> Vec<TriageIntent> {
        let in_detail = self.state.screen == Screen::Detail;
        let confirming =
            self.state.show_delete_confirmation || self.state.error_popup.is_some();

        ctx.input(|i| {
            let mut intents = Vec::new();
            let tag_intent = |tag: Option<Tag>| {
                if in_detail {
                    TriageIntent::TagCurrent(tag)
                } else {
                    TriageIntent::TagSelection(tag)
                }
            };

            if i.key_pressed(egui::Key::K) {
                intents.push(tag_intent(Some(Tag::Keep)));
            }
            if i.key_pressed(egui::Key::D) {
                intents.push(tag_intent(Some(Tag::Delete)));
            }
            if i.key_pressed(egui::Key::U) {
                intents.push(tag_intent(Some(Tag::Unsure)));
            }
            if i.key_pressed(egui::Key::X) {
                intents.push(tag_intent(None));
            }
            if i.key_pressed(egui::Key::Delete) {
                intents.push(TriageIntent::RequestDelete);
            }
            if i.key_pressed(egui::Key::Enter) && confirming {
                intents.push(TriageIntent::ConfirmDelete);
            }
            if i.key_pressed(egui::Key::S) && !in_detail {
                intents.push(TriageIntent::ToggleSelectionMode);
            }
            if in_detail {
                if i.key_pressed(egui::Key::ArrowRight) {
                    intents.push(TriageIntent::NextItem);
                }
                if i.key_pressed(egui::Key::ArrowLeft) {
                    intents.push(TriageIntent::PrevItem);
                }
            }
            if i.key_pressed(egui::Key::Escape) {
                if confirming || !in_detail {
                    intents.push(TriageIntent::Cancel);
                } else {
                    intents.push(TriageIntent::CloseDetail);
                }
            }
            intents
        })
    }

    // --- Panels ---

    fn show_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.state.screen == Screen::Detail
                    && ui.button("\u{2b05} Grid").clicked()
                {
                    self.state.handle_intent(TriageIntent::CloseDetail);
                }
                ui.label(egui::RichText::new(APP_TITLE).strong());
                ui.separator();

                // Filter toggles with live counts
                let (keep, delete, unsure) = self.state.store.counts();
                let untagged =
                    self.state.library.len().saturating_sub(keep + delete + unsure);
                let mut toggle: Option<Option<Tag>> = None;
                if ui
                    .selectable_label(self.state.filter.show_keep, format!("Keep {}", keep))
                    .clicked()
                {
                    toggle = Some(Some(Tag::Keep));
                }
                if ui
                    .selectable_label(
                        self.state.filter.show_delete,
                        format!("Delete {}", delete),
                    )
                    .clicked()
                {
                    toggle = Some(Some(Tag::Delete));
                }
                if ui
                    .selectable_label(
                        self.state.filter.show_unsure,
                        format!("Unsure {}", unsure),
                    )
                    .clicked()
                {
                    toggle = Some(Some(Tag::Unsure));
                }
                if ui
                    .selectable_label(
                        self.state.filter.show_untagged,
                        format!("Untagged {}", untagged),
                    )
                    .clicked()
                {
                    toggle = Some(None);
                }
                if let Some(tag) = toggle {
                    self.state.handle_intent(TriageIntent::ToggleFilter(tag));
                }
                ui.separator();

                if self.state.screen == Screen::Grid {
                    if ui
                        .selectable_label(self.state.selection.in_selection_mode(), "Select")
                        .clicked()
                    {
                        self.state.handle_intent(TriageIntent::ToggleSelectionMode);
                    }
                    let selected = self.state.selection.count();
                    if selected > 0 {
                        ui.label(format!("{} selected", selected));
                        if ui.button("K").clicked() {
                            self.state
                                .handle_intent(TriageIntent::TagSelection(Some(Tag::Keep)));
                        }
                        if ui.button("D").clicked() {
                            self.state
                                .handle_intent(TriageIntent::TagSelection(Some(Tag::Delete)));
                        }
                        if ui.button("U").clicked() {
                            self.state
                                .handle_intent(TriageIntent::TagSelection(Some(Tag::Unsure)));
                        }
                        if ui.button("Clear").clicked() {
                            self.state.handle_intent(TriageIntent::ClearSelection);
                        }
                    }
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let label = if self.state.selection.count() > 0 {
                        "\u{1f5d1} Delete selected"
                    } else {
                        "\u{1f5d1} Delete tagged"
                    };
                    if ui.button(label).clicked() {
                        self.state.handle_intent(TriageIntent::RequestDelete);
                    }
                });
            });
        });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.state.is_loading {
                    ui.spinner();
                    ui.label(format!("Scanning... {} photos", self.state.library.len()));
                }
                if let Some((msg, is_error)) = &self.state.status_message {
                    let color = if *is_error {
                        egui::Color32::LIGHT_RED
                    } else {
                        ui.visuals().text_color()
                    };
                    ui.label(egui::RichText::new(msg).color(color));
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let shown = self.state.filtered().len();
                    if self.state.screen == Screen::Detail && shown > 0 {
                        ui.label(format!(
                            "{} / {}",
                            self.state.current_index + 1,
                            shown
                        ));
                        if let Some(id) = self.state.current_asset()
                            && let Some(meta) = self.state.library.get(&id)
                        {
                            let ts = jiff::Timestamp::from_second(meta.modified.timestamp())
                                .unwrap_or(jiff::Timestamp::UNIX_EPOCH);
                            let res = meta
                                .resolution
                                .map(|(w, h)| format!("{}x{}", w, h))
                                .unwrap_or_else(|| "?".to_string());
                            ui.label(format!(
                                "{} \u{b7} {} \u{b7} {} \u{b7} {} ago",
                                meta.path.file_name().unwrap_or_default().to_string_lossy(),
                                res,
                                crate::format_size(meta.size),
                                crate::format_relative_time(ts)
                            ));
                        }
                    } else {
                        let filtered_marker =
                            if self.state.filter.is_default() { "" } else { " (filtered)" };
                        ui.label(format!(
                            "{} shown / {} photos{}",
                            shown,
                            self.state.library.len(),
                            filtered_marker
                        ));
                    }
                });
            });
        });
    }

    fn persist_session(&mut self) {
        if self.session_saved {
            return;
        }
        self.session_saved = true;

        if let Some((w, h)) = self.last_window_size {
            self.cfg.gui.width = Some(w);
            self.cfg.gui.height = Some(h);
        }
        if let Err(e) = crate::config::save(&self.cfg) {
            eprintln!("[WARN] Error saving config: {}", e);
        }
        self.state.store.flush();
    }
}

impl eframe::App for GuiApp {
    // All rendering happens in `update`, which the runtime still calls each
    // frame; `ui` is a required trait item in this eframe version, satisfied
    // with an empty body exactly as eframe's own `run_simple_native` does.
    fn ui(&mut self, _ui: &mut egui::Ui, _frame: &mut eframe::Frame) {}

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.state.store.poll_loaded() {
            ctx.request_repaint();
        }
        self.check_scan(ctx);
        self.receive_thumbnails(ctx);

        if !self.initial_scale_applied {
            let user_scale = self.cfg.gui.font_scale.unwrap_or(1.0);
            ctx.set_pixels_per_point(ctx.pixels_per_point() * user_scale);
            self.initial_scale_applied = true;
        }

        // Status messages expire after a few seconds
        let current_status = self.state.status_message.as_ref().map(|(m, _)| m.clone());
        if current_status != self.last_status {
            self.last_status = current_status.clone();
            self.status_set_time = current_status.as_ref().map(|_| Instant::now());
        }
        if let Some(set_time) = self.status_set_time
            && set_time.elapsed() > Duration::from_secs(3)
        {
            self.state.status_message = None;
            self.last_status = None;
            self.status_set_time = None;
        }

        for intent in self.gather_intents(ctx) {
            self.state.handle_intent(intent);
        }

        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.last_window_size = Some((rect.width() as u32, rect.height() as u32));
        }

        let title = if self.state.is_loading {
            format!("{} | Scanning... {}", APP_TITLE, self.state.library.len())
        } else {
            format!("{} | {}", APP_TITLE, self.library_root.display())
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));

        self.show_top_panel(ctx);
        self.show_status_bar(ctx);

        egui::CentralPanel::default().show(ctx, |ui| match self.state.screen {
            Screen::Grid => grid::show_grid(self, ui),
            Screen::Detail => detail::show_detail(self, ui),
        });

        dialogs::show_dialogs(self, ctx);

        if self.state.exit_requested {
            self.persist_session();
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        // Keep frames coming while timers are armed or a snap is animating
        if self.state.is_loading
            || self.strip_anim.is_some()
            || self.sync.settle_pending()
        {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }
}

impl Drop for GuiApp {
    fn drop(&mut self) {
        self.persist_session();
    }
}
