//! Sync configuration.
//!
//! Handles loading, validating, and merging `vault-mirror.toml`. Stock
//! defaults are the base layer; the user file is merged on top key by key,
//! and command-line flags override the merged result.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! vault_path = "vault"          # Source vault root
//! site_path = "website"         # Target Docusaurus site root
//! vault_asset_folder = "assets" # Attachment folder inside the vault
//! site_asset_folder = "assets"  # Folder under static/ for generated assets
//! main_language = "en"          # Content in this language lives at the site root
//! image_format = "webp"         # webp, png, jpg, avif
//! image_max_width = 2500        # Width cap for unsized image embeds
//! image_quality = 90            # Lossy encoder quality (1-100)
//! debug = false                 # Debug-level logging
//! state_dir = ".vault-mirror"   # Manifest + asset registry, relative to site_path
//! orphan_sweep = true           # Delete untracked files from mirrored folders
//! callout_types = ["note", "tip", "info", "warning", "caution", "danger"]
//!
//! [named_sizes]
//! small = 400
//! medium = 800
//! large = 1600
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! The camelCase names used by the Obsidian plugin settings (`vaultPath`,
//! `sitePath`, `obsidianAssetSubfolderName`, `siteAssetSubfolderName`,
//! `mainLanguage`, `convertedImageType`, `convertedImageMaxWidth`) are
//! accepted as aliases so an exported plugin config works as-is.
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "vault-mirror.toml";

/// Plugin-style key names and the keys they stand for.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("vaultPath", "vault_path"),
    ("sitePath", "site_path"),
    ("obsidianAssetSubfolderName", "vault_asset_folder"),
    ("siteAssetSubfolderName", "site_asset_folder"),
    ("mainLanguage", "main_language"),
    ("convertedImageType", "image_format"),
    ("convertedImageMaxWidth", "image_max_width"),
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration threaded through every stage of a run.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub vault_path: PathBuf,
    pub site_path: PathBuf,
    pub vault_asset_folder: String,
    pub site_asset_folder: String,
    pub main_language: String,
    /// Output format for resized raster images.
    pub image_format: String,
    pub image_max_width: u32,
    pub image_quality: u32,
    pub debug: bool,
    /// Directory holding `manifest.json` and `assets.json`, relative to the site.
    pub state_dir: String,
    pub orphan_sweep: bool,
    /// Callout types rewritten to admonitions. Others pass through unchanged.
    pub callout_types: Vec<String>,
    /// Widths for named size annotations (`![[pic.png|small]]`).
    pub named_sizes: BTreeMap<String, u32>,
    pub processing: ProcessingConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            vault_path: PathBuf::from("vault"),
            site_path: PathBuf::from("website"),
            vault_asset_folder: "assets".to_string(),
            site_asset_folder: "assets".to_string(),
            main_language: "en".to_string(),
            image_format: "webp".to_string(),
            image_max_width: 2500,
            image_quality: 90,
            debug: false,
            state_dir: ".vault-mirror".to_string(),
            orphan_sweep: true,
            callout_types: ["note", "tip", "info", "warning", "caution", "danger"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            named_sizes: [("small", 400), ("medium", 800), ("large", 1600)]
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vault_asset_folder.trim().is_empty() {
            return Err(ConfigError::Validation(
                "vault_asset_folder must not be empty".into(),
            ));
        }
        if self.site_asset_folder.trim().is_empty() || self.site_asset_folder.contains('/') {
            return Err(ConfigError::Validation(
                "site_asset_folder must be a single folder name".into(),
            ));
        }
        if self.main_language.len() != 2
            || !self.main_language.chars().all(|c| c.is_ascii_lowercase())
        {
            return Err(ConfigError::Validation(
                "main_language must be a two-letter lowercase code".into(),
            ));
        }
        if self.image_max_width == 0 {
            return Err(ConfigError::Validation(
                "image_max_width must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.image_quality) {
            return Err(ConfigError::Validation(
                "image_quality must be 1-100".into(),
            ));
        }
        if OutputFormat::from_name(&self.image_format).is_none() {
            return Err(ConfigError::Validation(format!(
                "image_format '{}' is not one of webp, png, jpg, avif",
                self.image_format
            )));
        }
        if self.state_dir.trim().is_empty() {
            return Err(ConfigError::Validation("state_dir must not be empty".into()));
        }
        if let Some((name, _)) = self.named_sizes.iter().find(|(_, w)| **w == 0) {
            return Err(ConfigError::Validation(format!(
                "named_sizes.{name} must be non-zero"
            )));
        }
        Ok(())
    }

    /// Raster output format. Falls back to WebP for configs that skipped validation.
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_name(&self.image_format).unwrap_or(OutputFormat::WebP)
    }

    /// Absolute-or-cwd-relative directory of the persisted run state.
    pub fn state_path(&self) -> PathBuf {
        self.site_path.join(&self.state_dir)
    }

    /// Directory generated assets are written to.
    pub fn asset_output_dir(&self) -> PathBuf {
        self.site_path.join("static").join(&self.site_asset_folder)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SyncConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Rename plugin-style top-level keys to their canonical names.
///
/// When both spellings are present the canonical key wins.
pub fn normalize_aliases(value: toml::Value) -> toml::Value {
    match value {
        toml::Value::Table(mut table) => {
            for (alias, canonical) in KEY_ALIASES {
                if let Some(v) = table.remove(*alias) {
                    table.entry(canonical.to_string()).or_insert(v);
                }
            }
            toml::Value::Table(table)
        }
        other => other,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(normalize_aliases(value)))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SyncConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SyncConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<SyncConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `vault-mirror.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# vault-mirror Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Obsidian plugin setting names (vaultPath, sitePath, mainLanguage, ...)
# are accepted as aliases for the keys below.
# Unknown keys will cause an error.

# Root of the Obsidian vault to mirror.
vault_path = "vault"

# Root of the Docusaurus site to write into.
site_path = "website"

# Attachment folder at the top level of the vault.
vault_asset_folder = "assets"

# Folder under <site>/static/ that receives generated images and downloads.
site_asset_folder = "assets"

# Documents in this language are placed at the site root; every other
# language goes under i18n/<lang>/.
main_language = "en"

# Output format for resized raster images: webp, png, jpg, avif.
image_format = "webp"

# Width cap in pixels for image embeds without a size annotation.
image_max_width = 2500

# Lossy encoding quality (1 = worst, 100 = best).
image_quality = 90

# Debug-level logging (RUST_LOG overrides this).
debug = false

# Directory for manifest.json and assets.json, relative to site_path.
state_dir = ".vault-mirror"

# After each run, delete files in mirrored site folders that no vault file
# accounts for.
orphan_sweep = true

# Callout types turned into Docusaurus admonitions. Other callouts are left as
# plain block quotes.
callout_types = ["note", "tip", "info", "warning", "caution", "danger"]

# ---------------------------------------------------------------------------
# Named image sizes: ![[photo.png|small]]
# ---------------------------------------------------------------------------
[named_sizes]
small = 400
medium = 800
large = 1600

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
