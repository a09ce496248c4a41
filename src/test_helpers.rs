//! Shared test utilities for the vault-mirror test suite.
//!
//! Builds throwaway vault/site pairs and in-memory [`SourceFile`] records so
//! unit tests can exercise placement and sync logic without fixtures on disk.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let fx = Fixture::new();
//! fx.write("docs/intro.md", "# Intro\n");
//! let report = sync_with_backend(&MockBackend::new(), &fx.config, &SyncOptions::default(), None).unwrap();
//! assert!(fx.site_file("docs/intro.md").exists());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::SyncConfig;
use crate::naming;
use crate::resolve;
use crate::types::{ContentKind, SourceFile, TargetPath};

// =========================================================================
// Fixture setup
// =========================================================================

/// A temp directory holding `vault/` and `site/` side by side.
pub struct Fixture {
    pub tmp: TempDir,
    pub config: SyncConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        let site = tmp.path().join("site");
        fs::create_dir_all(&vault).unwrap();
        fs::create_dir_all(&site).unwrap();
        let config = SyncConfig {
            vault_path: vault,
            site_path: site,
            ..SyncConfig::default()
        };
        Self { tmp, config }
    }

    pub fn vault(&self) -> &Path {
        &self.config.vault_path
    }

    pub fn site(&self) -> &Path {
        &self.config.site_path
    }

    /// Write a vault file, creating parent folders.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        write_file(self.vault(), relative, content.as_bytes())
    }

    pub fn site_file(&self, relative: &str) -> PathBuf {
        resolve::site_join(self.site(), relative)
    }

    pub fn read_site(&self, relative: &str) -> String {
        fs::read_to_string(self.site_file(relative)).unwrap()
    }
}

pub fn write_file(root: &Path, relative: &str, content: &[u8]) -> PathBuf {
    let path = resolve::site_join(root, relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Encode a small PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

// =========================================================================
// In-memory records
// =========================================================================

/// Build a [`SourceFile`] from a vault-relative path without touching disk.
///
/// Language defaults to `main_language` when the name has no suffix. The
/// target is left empty; resolver tests compute it themselves.
pub fn source_file(relative: &str, kind: ContentKind, main_language: &str) -> SourceFile {
    let segments: Vec<&str> = relative.split('/').collect();
    let file_name = segments.last().copied().unwrap_or_default().to_string();
    let language =
        naming::detect_language(&file_name).unwrap_or_else(|| main_language.to_string());
    let stripped = naming::strip_language_token(&file_name, &language);
    let (stem, extension) = naming::split_extension(&stripped);
    SourceFile {
        source_path: PathBuf::from("/vault").join(relative),
        relative_path: relative.to_string(),
        clean_name: stem.to_string(),
        extension: extension.to_string(),
        main_folder: segments[0].to_string(),
        parent_folder: segments[segments.len().saturating_sub(2)].to_string(),
        kind,
        language,
        modified: chrono::Utc::now(),
        size: 0,
        target: TargetPath::default(),
        file_name,
    }
}
