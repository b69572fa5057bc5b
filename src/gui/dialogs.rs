use eframe::egui;

use crate::state::TriageIntent;

use super::app::GuiApp;

pub(super) fn show_dialogs(app: &mut GuiApp, ctx: &egui::Context) {
    show_delete_confirmation(app, ctx);
    show_error_popup(app, ctx);
}

fn show_delete_confirmation(app: &mut GuiApp, ctx: &egui::Context) {
    if !app.state.show_delete_confirmation {
        return;
    }
    let count = app.state.pending_delete_count();
    let action = if app.state.use_trash { "Move to trash" } else { "Permanently delete" };

    let mut intent = None;
    egui::Window::new("Confirm Deletion")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
        .show(ctx, |ui| {
            ui.label(format!("{} {} files?", action, count));
            if !app.state.use_trash {
                ui.label(
                    egui::RichText::new("This cannot be undone.")
                        .color(egui::Color32::LIGHT_RED),
                );
            }
            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Delete (Enter)").clicked() {
                    intent = Some(TriageIntent::ConfirmDelete);
                }
                if ui.button("Cancel (Esc)").clicked() {
                    intent = Some(TriageIntent::Cancel);
                }
            });
        });
    if let Some(intent) = intent {
        app.state.handle_intent(intent);
    }
}

fn show_error_popup(app: &mut GuiApp, ctx: &egui::Context) {
    let Some(msg) = app.state.error_popup.clone() else { return };

    let mut dismiss = false;
    egui::Window::new("Error")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().max_height(400.0).show(ui, |ui| {
                ui.label(&msg);
            });
            ui.separator();
            if ui.button("Dismiss").clicked() {
                dismiss = true;
            }
        });
    if dismiss {
        app.state.error_popup = None;
    }
}
