use eframe::egui;

mod app;
mod detail;
mod dialogs;
mod grid;

pub use app::GuiApp;

pub const APP_TITLE: &str = "phtriage";

/// Side of the decode requested for grid thumbnails, in pixels. Strip items
/// reuse these textures at a smaller draw size.
pub(crate) const THUMB_SIDE: u32 = 320;

/// Side of the decode requested for the detail view.
pub(crate) const DETAIL_SIDE: u32 = 2048;

pub(crate) fn tag_color(tag: crate::store::Tag) -> egui::Color32 {
    match tag {
        crate::store::Tag::Keep => egui::Color32::from_rgb(0x4c, 0xaf, 0x50),
        crate::store::Tag::Delete => egui::Color32::from_rgb(0xe5, 0x39, 0x35),
        crate::store::Tag::Unsure => egui::Color32::from_rgb(0xfb, 0xc0, 0x2d),
    }
}

pub(crate) fn tag_letter(tag: crate::store::Tag) -> &'static str {
    match tag {
        crate::store::Tag::Keep => "K",
        crate::store::Tag::Delete => "D",
        crate::store::Tag::Unsure => "U",
    }
}
