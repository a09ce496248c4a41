//! Vault scanning.
//!
//! Walks the vault root, classifies each top-level folder by name, and turns
//! every file below a mirrored folder into a [`SourceFile`] with its target
//! path already resolved.
//!
//! ## Vault Structure
//!
//! ```text
//! vault/
//! ├── .obsidian/                  # hidden: never scanned
//! ├── assets/                     # attachment folder (vault_asset_folder)
//! │   ├── diagram.svg
//! │   └── photo one.png
//! ├── docs/                       # "docs" in the name → docs
//! │   ├── 10-guide+/              # group folder: collapses into guide.md
//! │   │   ├── 01-intro.md
//! │   │   └── 01-intro__de.md     # German translation
//! │   └── note.md
//! ├── blog/                       # "blog" in the name → blog
//! │   └── 2024-03-01-launch.md
//! ├── news__blog/                 # "__blog" suffix → separate blog plugin
//! │   └── hello.md
//! └── templates/                  # anything else is ignored
//! ```
//!
//! ## Failure Isolation
//!
//! Only a missing or unreadable vault root fails the scan. An unreadable
//! subdirectory is recorded in [`ScanResult::unreadable`] and skipped; the
//! sync engine treats everything below it as "unknown" rather than deleted.
//! Files whose names cannot be classified or whose target cannot be resolved
//! are reported as [`ScanIssue`]s and left out of the file list.

use crate::config::SyncConfig;
use crate::naming;
use crate::resolve::{self, ResolveError};
use crate::types::{ContentKind, MainFolder, SourceFile, TargetPath};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// OS metadata files that never belong in the site.
const HOUSEKEEPING_FILES: &[&str] = &["Thumbs.db", "desktop.ini"];

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Vault root not found: {0}")]
    VaultNotFound(PathBuf),
    #[error("Cannot read vault root {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A name that cannot be mapped to a vault entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("name is not valid UTF-8: {0}")]
    NonUtf8Name(PathBuf),
    #[error("path is outside the vault: {0}")]
    OutsideVault(PathBuf),
}

/// A per-entry problem found while scanning. None of these abort the scan.
#[derive(Debug, Clone)]
pub enum ScanIssue {
    Classification(ClassificationError),
    Unreadable { path: PathBuf, message: String },
    Unresolved(ResolveError),
}

impl std::fmt::Display for ScanIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classification(e) => write!(f, "{e}"),
            Self::Unreadable { path, message } => {
                write!(f, "unreadable {}: {message}", path.display())
            }
            Self::Unresolved(e) => write!(f, "{e}"),
        }
    }
}

/// Everything one scan pass found.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub folders: Vec<MainFolder>,
    pub issues: Vec<ScanIssue>,
    /// Vault-relative directories whose contents could not be listed.
    pub unreadable: Vec<String>,
    /// Vault-relative paths of files that exist but could not be placed.
    pub unplaced: BTreeSet<String>,
}

impl ScanResult {
    /// All scanned files, attachment folder included.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.folders.iter().flat_map(|f| f.files.iter())
    }

    /// Files in docs/blog folders.
    pub fn content_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files().filter(|f| f.kind != ContentKind::Assets)
    }

    pub fn file_count(&self) -> usize {
        self.folders.iter().map(|f| f.files.len()).sum()
    }

    /// Index of scanned files by vault-relative path.
    pub fn by_relative_path(&self) -> HashMap<&str, &SourceFile> {
        self.files().map(|f| (f.relative_path.as_str(), f)).collect()
    }

    /// Whether a vault path may exist even though the scan did not list it.
    ///
    /// True for unplaced files and for anything below an unreadable directory.
    pub fn is_uncertain(&self, relative: &str) -> bool {
        self.unplaced.contains(relative)
            || self.unreadable.iter().any(|dir| {
                relative
                    .strip_prefix(dir.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            })
    }
}

/// Scan the configured vault.
pub fn scan(config: &SyncConfig) -> Result<ScanResult, ScanError> {
    let vault = &config.vault_path;
    if !vault.is_dir() {
        return Err(ScanError::VaultNotFound(vault.clone()));
    }
    let mut result = ScanResult::default();

    let mut entries: Vec<fs::DirEntry> = fs::read_dir(vault)
        .map_err(|source| ScanError::Io {
            path: vault.clone(),
            source,
        })?
        .filter_map(Result::ok)
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            let err = ClassificationError::NonUtf8Name(path);
            warn!("{err}");
            result.issues.push(ScanIssue::Classification(err));
            continue;
        };
        let Some(kind) = ContentKind::classify(&name, &config.vault_asset_folder) else {
            debug!(folder = %name, "ignoring unclassified folder");
            continue;
        };
        debug!(folder = %name, kind = kind.label(), "scanning folder");
        let files = scan_folder(&path, &name, kind, config, &mut result);
        result.folders.push(MainFolder {
            name,
            kind,
            path,
            files,
        });
    }

    info!(
        folders = result.folders.len(),
        files = result.file_count(),
        issues = result.issues.len(),
        "scan complete"
    );
    Ok(result)
}

/// Recursively collect the files of one classified top-level folder.
fn scan_folder(
    folder: &Path,
    folder_name: &str,
    kind: ContentKind,
    config: &SyncConfig,
    result: &mut ScanResult,
) -> Vec<SourceFile> {
    let mut files = Vec::new();
    let walker = WalkDir::new(folder)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e.file_name().to_str()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| folder.to_path_buf());
                warn!(path = %path.display(), "skipping unreadable entry: {err}");
                if let Ok(relative) = vault_relative(&path, &config.vault_path) {
                    result.unreadable.push(relative);
                }
                result.issues.push(ScanIssue::Unreadable {
                    path,
                    message: err.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            let err = ClassificationError::NonUtf8Name(entry.path().to_path_buf());
            warn!("{err}");
            result.issues.push(ScanIssue::Classification(err));
            continue;
        };
        if HOUSEKEEPING_FILES.contains(&file_name) {
            continue;
        }

        match build_source_file(entry.path(), folder_name, kind, config) {
            Ok(file) => files.push(file),
            Err((relative, issue)) => {
                warn!("{issue}");
                if let Some(relative) = relative {
                    result.unplaced.insert(relative);
                }
                result.issues.push(issue);
            }
        }
    }
    files
}

fn is_hidden(name: Option<&str>) -> bool {
    name.is_some_and(|n| n.starts_with('.'))
}

/// Forward-slash path relative to the vault root.
fn vault_relative(path: &Path, vault: &Path) -> Result<String, ClassificationError> {
    let relative = path
        .strip_prefix(vault)
        .map_err(|_| ClassificationError::OutsideVault(path.to_path_buf()))?;
    let segments = relative
        .components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .ok_or_else(|| ClassificationError::NonUtf8Name(path.to_path_buf()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(segments.join("/"))
}

/// Derive the full record for one file. On failure, returns the relative
/// path when it is known so the caller can protect the file's old output.
fn build_source_file(
    path: &Path,
    folder_name: &str,
    kind: ContentKind,
    config: &SyncConfig,
) -> Result<SourceFile, (Option<String>, ScanIssue)> {
    let relative = vault_relative(path, &config.vault_path)
        .map_err(|e| (None, ScanIssue::Classification(e)))?;
    let metadata = fs::metadata(path).map_err(|e| {
        (
            Some(relative.clone()),
            ScanIssue::Unreadable {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        )
    })?;
    let modified: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());

    let segments: Vec<&str> = relative.split('/').collect();
    let file_name = segments.last().copied().unwrap_or_default().to_string();
    let parent_folder = segments[segments.len().saturating_sub(2)].to_string();
    let language =
        naming::detect_language(&file_name).unwrap_or_else(|| config.main_language.clone());
    let stripped = naming::strip_language_token(&file_name, &language);
    let (clean_name, extension) = naming::split_extension(&stripped);

    let mut file = SourceFile {
        source_path: path.to_path_buf(),
        relative_path: relative.clone(),
        clean_name: clean_name.to_string(),
        extension: extension.to_string(),
        main_folder: folder_name.to_string(),
        parent_folder,
        kind,
        language,
        modified,
        size: metadata.len(),
        target: TargetPath::default(),
        file_name,
    };
    file.target = resolve::resolve_target(&file, config)
        .map_err(|e| (Some(relative), ScanIssue::Unresolved(e)))?;
    Ok(file)
}
