use eframe::egui;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::AssetId;
use crate::selection::{GridGeometry, SelectionEvent};

use super::app::GuiApp;
use super::{THUMB_SIDE, tag_color, tag_letter};

pub(super) fn show_grid(app: &mut GuiApp, ui: &mut egui::Ui) {
    // Read the filtered sequence fresh each frame; indices from previous
    // frames are meaningless after a tag or filter change.
    let assets = app.state.filtered();
    app.last_screen = crate::state::Screen::Grid;

    let cell = app.cfg.gui.cell_side.unwrap_or(160.0);
    let spacing = app.cfg.gui.grid_spacing.unwrap_or(8.0);
    let padding = spacing;
    let avail_w = ui.available_width();
    let columns =
        (((avail_w - 2.0 * padding + spacing) / (cell + spacing)).floor() as usize).max(1);
    let geom = GridGeometry { cell, spacing, padding, columns };

    if assets.is_empty() && !app.state.is_loading {
        ui.centered_and_justified(|ui| {
            ui.label("No photos to show.");
        });
        return;
    }

    let rows = assets.len().div_ceil(columns);
    let content_h = if rows == 0 {
        0.0
    } else {
        2.0 * padding + rows as f32 * geom.stride() - spacing
    };

    egui::ScrollArea::vertical()
        .id_salt("grid_scroll")
        .auto_shrink([false; 2])
        // A running toggle-drag owns the touch; the scroll gesture gets it
        // back the moment the drag session ends.
        .enable_scrolling(!app.state.selection.is_dragging())
        .show(ui, |ui| {
            let (content_rect, _) = ui.allocate_exact_size(
                egui::vec2(ui.available_width(), content_h),
                egui::Sense::hover(),
            );
            let origin = content_rect.min;
            let clip = ui.clip_rect();

            wire_pointer(app, ui, origin, clip, &geom, &assets);

            // Visibility culling: only touch the rows inside the viewport
            let stride = geom.stride();
            let first_row = (((clip.min.y - origin.y - padding) / stride).floor().max(0.0)) as usize;
            let last_row = (((clip.max.y - origin.y) / stride).ceil().max(0.0)) as usize;

            let mut visible: Vec<usize> = Vec::new();
            for row in first_row..=last_row {
                for col in 0..columns {
                    let idx = row * columns + col;
                    if idx >= assets.len() {
                        break;
                    }
                    visible.push(idx);
                }
            }

            // Workers skip decodes for anything outside this window
            if !assets.is_empty() {
                let preload = app.cfg.gui.preload_count.unwrap_or(64);
                let start = visible.first().copied().unwrap_or(0).saturating_sub(preload);
                let end = (visible.last().copied().unwrap_or(0) + preload)
                    .min(assets.len() - 1);
                let active: HashSet<AssetId> = assets[start..=end].iter().cloned().collect();
                app.thumbs.set_active(active);
            }

            for &idx in &visible {
                let id = &assets[idx];
                let (min_x, min_y) = geom.cell_min(idx);
                let rect = egui::Rect::from_min_size(
                    egui::pos2(origin.x + min_x, origin.y + min_y),
                    egui::vec2(cell, cell),
                );
                if ui.is_rect_visible(rect) {
                    draw_cell(app, ui, rect, id);
                }
            }
        });
}

/// Feed raw pointer state into the selection session and route what it
/// reports. The session does its own hit-testing against the fresh
/// sequence, so nothing here caches indices.
fn wire_pointer(
    app: &mut GuiApp,
    ui: &mut egui::Ui,
    origin: egui::Pos2,
    clip: egui::Rect,
    geom: &GridGeometry,
    assets: &[AssetId],
) {
    let now = Instant::now();
    let (pressed, down, released, latest_pos, press_origin) = ui.input(|i| {
        (
            i.pointer.primary_pressed(),
            i.pointer.primary_down(),
            i.pointer.primary_released(),
            i.pointer.latest_pos(),
            i.pointer.press_origin(),
        )
    });
    let to_content = |p: egui::Pos2| (p.x - origin.x, p.y - origin.y);

    let mut events = Vec::new();
    if pressed {
        if let Some(p) = press_origin.or(latest_pos)
            && clip.contains(p)
        {
            events.extend(app.state.selection.on_press(to_content(p), now, geom, assets));
        }
    } else if down {
        if let Some(p) = latest_pos {
            events.extend(app.state.selection.on_move(to_content(p), now, geom, assets));
        }
        // Keep frames coming so the long-press threshold fires even while
        // the pointer holds perfectly still.
        ui.ctx().request_repaint_after(Duration::from_millis(50));
    }
    if released {
        events.extend(app.state.selection.on_release(geom, assets));
    }

    if events.iter().any(|e| matches!(e, SelectionEvent::FeedbackTick)) {
        ui.ctx().request_repaint();
    }
    app.state.apply_selection_events(&events);
}

fn draw_cell(app: &mut GuiApp, ui: &mut egui::Ui, rect: egui::Rect, id: &AssetId) {
    app.request_thumb(id, THUMB_SIDE);

    match app.thumb_cache.get(id) {
        Some(texture) => {
            let size = texture.size_vec2();
            let scale = (rect.width() / size.x).min(rect.height() / size.y);
            let draw_rect = egui::Rect::from_center_size(rect.center(), size * scale);
            egui::Image::from_texture((texture.id(), size)).paint_at(ui, draw_rect);
        }
        None => {
            ui.painter().rect_filled(rect, 4.0, egui::Color32::from_gray(38));
        }
    }

    if let Some(tag) = app.state.store.get(id) {
        let badge = egui::Rect::from_min_size(
            egui::pos2(rect.max.x - 22.0, rect.min.y + 4.0),
            egui::vec2(18.0, 18.0),
        );
        ui.painter().rect_filled(badge, 4.0, tag_color(tag));
        ui.painter().text(
            badge.center(),
            egui::Align2::CENTER_CENTER,
            tag_letter(tag),
            egui::FontId::proportional(12.0),
            egui::Color32::WHITE,
        );
    }

    if app.state.selection.is_selected(id) {
        ui.painter().rect_stroke(
            rect,
            4.0,
            egui::Stroke::new(3.0, ui.visuals().selection.stroke.color),
            egui::StrokeKind::Outside,
        );
        let center = egui::pos2(rect.min.x + 13.0, rect.min.y + 13.0);
        ui.painter().circle_filled(center, 9.0, ui.visuals().selection.bg_fill);
        ui.painter().text(
            center,
            egui::Align2::CENTER_CENTER,
            "\u{2714}",
            egui::FontId::proportional(11.0),
            egui::Color32::WHITE,
        );
    }
}
