//! Record of which vault files produced which site files.
//!
//! The manifest is the sync engine's memory between runs. A file that is in
//! the site tree *because of this tool* has exactly one entry here, keyed by
//! its vault-relative source path.
//!
//! ## Storage
//!
//! JSON at `<site>/<state_dir>/manifest.json`, read whole at run start and
//! replaced whole at run end (see [`crate::state`]). Unlike a cache, a
//! corrupt manifest is not silently discarded: starting from empty would
//! orphan every tracked file, so it is a run-level error instead.
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "docs/note__de.md": {
//!       "source": "docs/note__de.md",
//!       "target": "i18n/de/docusaurus-plugin-content-docs/current/note.md",
//!       "source_modified": "2024-03-01T10:00:00Z",
//!       "source_size": 120,
//!       "target_modified": "2024-03-01T10:00:02Z",
//!       "target_size": 118,
//!       "kind": "docs",
//!       "language": "de"
//!     }
//!   }
//! }
//! ```

use crate::state::{self, StateError};
use crate::types::ContentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the manifest file within the state directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Version of the manifest format.
pub const MANIFEST_VERSION: u32 = 1;

/// One previously converted file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Vault-relative source path.
    pub source: String,
    /// Site-relative target path.
    pub target: String,
    pub source_modified: DateTime<Utc>,
    pub source_size: u64,
    pub target_modified: DateTime<Utc>,
    pub target_size: u64,
    pub kind: ContentKind,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    pub fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(MANIFEST_FILENAME)
    }

    /// Load from the state directory. Missing means empty; malformed is an error.
    pub fn load(state_dir: &Path) -> Result<Self, StateError> {
        let path = Self::path(state_dir);
        match state::read_json::<Self>(&path)? {
            Some(manifest) => {
                state::check_version(&path, manifest.version, MANIFEST_VERSION)?;
                Ok(manifest)
            }
            None => Ok(Self::empty()),
        }
    }

    pub fn save(&self, state_dir: &Path) -> Result<(), StateError> {
        state::write_json(&Self::path(state_dir), self)
    }

    pub fn get(&self, source: &str) -> Option<&ManifestEntry> {
        self.entries.get(source)
    }

    pub fn insert(&mut self, entry: ManifestEntry) {
        self.entries.insert(entry.source.clone(), entry);
    }

    pub fn remove(&mut self, source: &str) -> Option<ManifestEntry> {
        self.entries.remove(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every tracked site-relative target.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.target.as_str())
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::empty()
    }
}
