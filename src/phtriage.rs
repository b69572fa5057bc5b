use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;
use jiff::Timestamp;

mod config;
mod filmstrip;
mod filter;
mod gui;
mod library;
mod selection;
mod state;
mod store;

/// Opaque stable identifier for one photo, supplied by the library facade.
pub type AssetId = String;

#[derive(Debug, Clone)]
pub struct PhotoMeta {
    pub id: AssetId,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub resolution: Option<(u32, u32)>,
}

// --- Helper: Relative Time ---
pub fn format_relative_time(ts: Timestamp) -> String {
    let now = Timestamp::now();
    let zoned_ts = ts.to_zoned(jiff::tz::TimeZone::UTC);
    let raw_span = now.since(ts).unwrap_or_default();
    let total_secs = raw_span.total(jiff::Unit::Second).unwrap_or(0.0).abs();

    if total_secs < 60.0 {
        if total_secs < 0.001 {
            return "0s".to_string();
        }
        return format!("{:.0}s", total_secs);
    }

    let span = raw_span
        .round(
            jiff::SpanRound::new()
                .largest(jiff::Unit::Year)
                .smallest(jiff::Unit::Second)
                .relative(&zoned_ts),
        )
        .unwrap_or_default();

    let mut parts = Vec::new();
    let y = span.get_years().abs();
    let mo = span.get_months().abs();
    let w = span.get_weeks().abs();
    let d = span.get_days().abs();
    let h = span.get_hours().abs();
    let m = span.get_minutes().abs();
    let s = span.get_seconds().abs();

    if y > 0 {
        parts.push(format!("{}y", y));
    }
    if mo > 0 {
        parts.push(format!("{}mo", mo));
    }
    if w > 0 {
        parts.push(format!("{}w", w));
    }
    if d > 0 {
        parts.push(format!("{}d", d));
    }
    if h > 0 {
        parts.push(format!("{}h", h));
    }
    if m > 0 {
        parts.push(format!("{}m", m));
    }
    if s > 0 {
        parts.push(format!("{}s", s));
    }

    if parts.is_empty() {
        return "0s".to_string();
    }
    parts.into_iter().take(2).collect::<Vec<_>>().join(" ")
}

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let kb = bytes as f64 / 1024.0;
    if kb < 1024.0 {
        return format!("{:.1} KB", kb);
    }
    let mb = kb / 1024.0;
    format!("{:.1} MB", mb)
}

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about = "Triage a photo collection with keep/delete/unsure tags.", long_about = None)]
struct Cli {
    /// Library root directory to scan
    #[arg(required = true)]
    path: PathBuf,

    /// Sort order: name, date, date-desc, size, size-desc
    #[arg(long)]
    sort: Option<String>,

    /// Permanently delete instead of moving to trash
    #[arg(long)]
    no_trash: bool,

    /// Restrict the view to one subdirectory of the library
    #[arg(long, value_name = "DIR")]
    collection: Option<PathBuf>,

    /// Tag file location (default: <library>/.phtriage-tags.json)
    #[arg(long, value_name = "FILE")]
    tag_file: Option<PathBuf>,
}

impl Cli {
    fn validate(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Err(format!("Path does not exist: {:?}", self.path));
        }
        if !self.path.is_dir() {
            return Err(format!("Path is not a directory: {:?}", self.path));
        }
        if let Some(ref sort) = self.sort {
            let sort_lower = sort.to_lowercase();
            if !library::SORT_ORDERS.contains(&sort_lower.as_str()) {
                return Err(format!(
                    "Invalid sort '{}'. Use one of: {}",
                    sort,
                    library::SORT_ORDERS.join(", ")
                ));
            }
        }
        if let Some(ref dir) = self.collection
            && !dir.is_dir()
        {
            return Err(format!("Collection is not a directory: {:?}", dir));
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let root = args.path.canonicalize()?;
    let cfg = config::load();

    let use_trash = cfg.triage.use_trash && !args.no_trash;
    let sort_order = args.sort.clone().unwrap_or_else(|| cfg.triage.sort.clone());
    let tag_file = args
        .tag_file
        .clone()
        .unwrap_or_else(|| root.join(store::TAG_FILE_NAME));

    println!("Launching GUI...");
    let mut app = gui::GuiApp::new(cfg, root, tag_file, use_trash, sort_order);
    if let Some(dir) = args.collection {
        app.set_collection(dir.canonicalize().unwrap_or(dir));
    }
    if let Err(e) = app.run() {
        eprintln!("GUI Error: {}", e);
    }
    Ok(())
}
