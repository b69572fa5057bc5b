use eframe::egui;
use std::collections::HashSet;
use std::time::Instant;

use crate::AssetId;
use crate::filmstrip::{IndexSynchronizer, SNAP_ANIM, StripCommand, StripEvent, StripGeometry};
use crate::state::{Screen, TriageIntent};

use super::app::{GuiApp, StripAnim};
use super::{DETAIL_SIDE, THUMB_SIDE, tag_color, tag_letter};

const SWIPE_THRESHOLD: f32 = 60.0;
const STRIP_SPACING: f32 = 8.0;

pub(super) fn show_detail(app: &mut GuiApp, ui: &mut egui::Ui) {
    let assets = app.state.filtered();
    if assets.is_empty() {
        // The filtered sequence went empty under us: suppress the view
        app.state.screen = Screen::Grid;
        return;
    }
    app.state.clamp_current_index();

    // Entering the detail view re-seeds the synchronizer and hard-positions
    // the strip; no animation on the way in.
    if app.last_screen != Screen::Detail {
        app.sync = IndexSynchronizer::new(app.state.current_index);
        app.strip_anim = None;
        let stride = app.cfg.gui.filmstrip_side.unwrap_or(96.0) + STRIP_SPACING;
        app.strip_jump = Some(app.state.current_index as f32 * stride);
        app.swipe_accum = 0.0;
    }
    app.last_screen = Screen::Detail;
    app.sync.sync_len(assets.len());

    let now = Instant::now();
    let item = app.cfg.gui.filmstrip_side.unwrap_or(96.0);
    let strip_h = item + 2.0 * STRIP_SPACING;

    let total = ui.available_size();
    let image_h = (total.y - strip_h).max(0.0);
    let (image_rect, response) =
        ui.allocate_exact_size(egui::vec2(total.x, image_h), egui::Sense::click_and_drag());
    draw_main_image(app, ui, image_rect);

    // Horizontal swipe on the big image steps the index
    if response.dragged() {
        app.swipe_accum += response.drag_delta().x;
    }
    if response.drag_stopped() {
        if app.swipe_accum <= -SWIPE_THRESHOLD {
            app.state.handle_intent(TriageIntent::NextItem);
        } else if app.swipe_accum >= SWIPE_THRESHOLD {
            app.state.handle_intent(TriageIntent::PrevItem);
        }
        app.swipe_accum = 0.0;
    }

    show_filmstrip(app, ui, &assets, item, now);
}

fn draw_main_image(app: &mut GuiApp, ui: &mut egui::Ui, rect: egui::Rect) {
    let Some(id) = app.state.current_asset() else { return };
    app.request_thumb(&id, DETAIL_SIDE);

    // Fall back to the grid thumbnail while the big decode is in flight
    let texture = app.detail_cache.get(&id).or_else(|| app.thumb_cache.get(&id));
    match texture {
        Some(texture) => {
            let size = texture.size_vec2();
            let scale = (rect.width() / size.x).min(rect.height() / size.y).min(1.0);
            let draw_rect = egui::Rect::from_center_size(rect.center(), size * scale);
            egui::Image::from_texture((texture.id(), size)).paint_at(ui, draw_rect);
        }
        None => {
            ui.painter().rect_filled(rect, 0.0, egui::Color32::from_gray(24));
            ui.put(rect, egui::Spinner::new());
        }
    }

    // Current tag, top center
    if let Some(tag) = app.state.store.get(&id) {
        let badge = egui::Rect::from_center_size(
            egui::pos2(rect.center().x, rect.min.y + 18.0),
            egui::vec2(70.0, 22.0),
        );
        ui.painter().rect_filled(badge, 6.0, tag_color(tag));
        ui.painter().text(
            badge.center(),
            egui::Align2::CENTER_CENTER,
            tag.label(),
            egui::FontId::proportional(13.0),
            egui::Color32::WHITE,
        );
    }
}

fn show_filmstrip(
    app: &mut GuiApp,
    ui: &mut egui::Ui,
    assets: &[AssetId],
    item: f32,
    now: Instant,
) {
    let len = assets.len();
    let viewport = ui.available_width();
    let geom = StripGeometry { item, spacing: STRIP_SPACING, viewport };

    // Host-driven index change (keyboard, swipe): reconcile into the strip
    // through the synchronizer's usual programmatic path.
    if app.state.current_index != app.sync.current() {
        if let Some(StripCommand::AnimateTo { offset, .. }) =
            app.sync.request_index(app.state.current_index, len, &geom, now)
        {
            start_anim(app, offset, now);
        }
        app.state.current_index = app.sync.current();
    }

    // Settle timer: snap back to center once the user stops scrolling
    if let Some(StripCommand::AnimateTo { offset, .. }) = app.sync.tick(&geom, now) {
        start_anim(app, offset, now);
    }

    // Offset forced this frame, either a hard jump or the running animation
    let forced: Option<f32> = if let Some(jump) = app.strip_jump.take() {
        Some(jump)
    } else if let Some(anim) = &app.strip_anim {
        let t = now.duration_since(anim.started).as_secs_f32() / SNAP_ANIM.as_secs_f32();
        let offset = if t >= 1.0 {
            anim.to
        } else {
            anim.from + (anim.to - anim.from) * ease_out(t)
        };
        if t >= 1.0 {
            app.strip_anim = None;
        }
        Some(offset)
    } else {
        None
    };

    let mut scroll = egui::ScrollArea::horizontal()
        .id_salt("filmstrip")
        .auto_shrink([false, false])
        .max_height(item + 2.0 * STRIP_SPACING);
    if let Some(x) = forced {
        scroll = scroll.scroll_offset(egui::vec2(x, 0.0));
    }

    let mut clicked_idx: Option<usize> = None;
    let mut active: HashSet<AssetId> = HashSet::new();
    if let Some(current) = app.state.current_asset() {
        active.insert(current);
    }

    let output = scroll.show(ui, |ui| {
        let stride = geom.stride();
        let content_w = 2.0 * geom.edge_padding() + len as f32 * stride - geom.spacing;
        let (content_rect, _) = ui.allocate_exact_size(
            egui::vec2(content_w.max(viewport), item + 2.0 * STRIP_SPACING),
            egui::Sense::hover(),
        );
        let origin = content_rect.min;
        let clip = ui.clip_rect();

        let first =
            (((clip.min.x - origin.x - geom.edge_padding()) / stride).floor().max(0.0)) as usize;
        let last = ((((clip.max.x - origin.x) / stride).ceil()).max(0.0) as usize).min(len - 1);

        for idx in first..=last {
            let x = origin.x + geom.edge_padding() + idx as f32 * stride;
            let rect = egui::Rect::from_min_size(
                egui::pos2(x, origin.y + STRIP_SPACING),
                egui::vec2(item, item),
            );
            if !ui.is_rect_visible(rect) {
                continue;
            }
            let id = &assets[idx];
            active.insert(id.clone());
            app.request_thumb(id, THUMB_SIDE);

            match app.thumb_cache.get(id) {
                Some(texture) => {
                    let size = texture.size_vec2();
                    let scale = (rect.width() / size.x).min(rect.height() / size.y);
                    let draw_rect = egui::Rect::from_center_size(rect.center(), size * scale);
                    egui::Image::from_texture((texture.id(), size)).paint_at(ui, draw_rect);
                }
                None => {
                    ui.painter().rect_filled(rect, 3.0, egui::Color32::from_gray(38));
                }
            }

            if let Some(tag) = app.state.store.get(id) {
                let badge = egui::Rect::from_min_size(
                    egui::pos2(rect.max.x - 16.0, rect.min.y + 2.0),
                    egui::vec2(14.0, 14.0),
                );
                ui.painter().rect_filled(badge, 3.0, tag_color(tag));
                ui.painter().text(
                    badge.center(),
                    egui::Align2::CENTER_CENTER,
                    tag_letter(tag),
                    egui::FontId::proportional(9.0),
                    egui::Color32::WHITE,
                );
            }

            if idx == app.sync.current() {
                ui.painter().rect_stroke(
                    rect,
                    3.0,
                    egui::Stroke::new(2.0, ui.visuals().selection.stroke.color),
                    egui::StrokeKind::Outside,
                );
            }

            let resp = ui.interact(rect, ui.id().with("strip").with(idx), egui::Sense::click());
            if resp.clicked() {
                clicked_idx = Some(idx);
            }
        }
    });

    app.thumbs.set_active(active);

    // A touch landing on the strip cancels the pending settle and any
    // running snap; control goes back to the user.
    let touched = ui.input(|i| {
        i.pointer.primary_pressed()
            && i.pointer.press_origin().is_some_and(|p| output.inner_rect.contains(p))
    });
    if touched {
        app.sync.on_touch_down();
        app.strip_anim = None;
    }

    // Tap on a strip item jumps there
    if let Some(idx) = clicked_idx {
        if let Some(StripCommand::AnimateTo { offset, .. }) =
            app.sync.request_index(idx, len, &geom, now)
        {
            start_anim(app, offset, now);
        }
        app.state.current_index = app.sync.current();
    }

    // Raw scroll observation: only when this frame's offset came from the
    // user, never from our own forced positioning.
    if forced.is_none() && app.strip_anim.is_none() {
        let x = output.state.offset.x;
        for event in app.sync.on_scroll(x, len, &geom, now) {
            match event {
                StripEvent::IndexChanged(i) => app.state.current_index = i,
                StripEvent::FeedbackTick => ui.ctx().request_repaint(),
            }
        }
    }

    app.strip_offset = forced.unwrap_or(output.state.offset.x);
}

fn start_anim(app: &mut GuiApp, to: f32, now: Instant) {
    app.strip_anim = Some(StripAnim { from: app.strip_offset, to, started: now });
}

fn ease_out(t: f32) -> f32 {
    let inv = 1.0 - t.clamp(0.0, 1.0);
    1.0 - inv * inv * inv
}
