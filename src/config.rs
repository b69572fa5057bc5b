use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "phtriage.conf";

#[derive(Serialize, Deserialize, Clone)]
pub struct GuiConfig {
    pub font_scale: Option<f32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Square thumbnail side in the grid, logical points.
    pub cell_side: Option<f32>,
    pub grid_spacing: Option<f32>,
    /// Square item side in the detail-view filmstrip.
    pub filmstrip_side: Option<f32>,
    /// How many thumbnails around the viewport to keep decoded.
    pub preload_count: Option<usize>,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            font_scale: Some(1.0),
            width: Some(1280),
            height: Some(720),
            cell_side: Some(160.0),
            grid_spacing: Some(8.0),
            filmstrip_side: Some(96.0),
            preload_count: Some(64),
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct TriageConfig {
    #[serde(default = "default_true")]
    pub use_trash: bool,
    #[serde(default = "default_sort")]
    pub sort: String,
}

fn default_true() -> bool {
    true
}

fn default_sort() -> String {
    "name".to_string()
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self { use_trash: true, sort: default_sort() }
    }
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub triage: TriageConfig,
    #[serde(default)]
    pub gui: GuiConfig,
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

pub fn load() -> Config {
    match config_path() {
        Some(path) => load_from(&path),
        None => {
            eprintln!("[WARN] No config dir found, using defaults");
            Config::default()
        }
    }
}

/// Load the config, creating it with defaults when missing. A section the
/// file predates is written back so the file always shows every knob.
/// Parse failures degrade to defaults instead of aborting.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        let cfg = Config::default();
        if let Err(e) = save_to(path, &cfg) {
            eprintln!("[WARN] Could not create config at {:?}: {}", path, e);
        }
        return cfg;
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[WARN] Could not read config {:?}: {}", path, e);
            return Config::default();
        }
    };

    let cfg: Config = match toml::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[WARN] Could not parse config {:?}: {}", path, e);
            return Config::default();
        }
    };

    // Write back defaults if sections are missing from an older file
    let raw_value: toml::Value = toml::from_str(&content).unwrap_or(toml::Value::Integer(0));
    let missing_triage = raw_value.get("triage").is_none();
    let missing_gui = raw_value.get("gui").is_none();
    if (missing_triage || missing_gui)
        && let Err(e) = save_to(path, &cfg)
    {
        eprintln!("[WARN] Could not write back config defaults: {}", e);
    }

    cfg
}

pub fn save(cfg: &Config) -> std::io::Result<()> {
    match config_path() {
        Some(path) => save_to(&path, cfg),
        None => Ok(()),
    }
}

pub fn save_to(path: &Path, cfg: &Config) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(path, toml_str)
}
