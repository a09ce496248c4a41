//! Shared types used across the scan, resolve and sync stages.

use crate::naming::BLOG_MULTI_SUFFIX;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logical type of a top-level vault folder.
///
/// Every target path decision switches on this enum, so adding a variant is a
/// compile error everywhere placement is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    /// Documentation pages (`docs`, `10-docs`, `user-docs`, ...)
    Docs,
    /// The default blog (`blog`, `dev-blog`, ...)
    Blog,
    /// A separate blog plugin instance (`news__blog`)
    BlogMulti,
    /// Attachments referenced from documents
    Assets,
}

impl ContentKind {
    /// Classify a top-level folder by name.
    ///
    /// Order matters: the multi-blog suffix wins over a plain `blog` match,
    /// and `blog` wins over `docs`. Returns `None` for folders that are not
    /// mirrored at all.
    pub fn classify(folder_name: &str, asset_folder: &str) -> Option<Self> {
        if folder_name.starts_with('.') {
            return None;
        }
        if folder_name.ends_with(BLOG_MULTI_SUFFIX) {
            Some(Self::BlogMulti)
        } else if folder_name.contains("blog") {
            Some(Self::Blog)
        } else if folder_name.contains("docs") {
            Some(Self::Docs)
        } else if folder_name == asset_folder {
            Some(Self::Assets)
        } else {
            None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Docs => "docs",
            Self::Blog => "blog",
            Self::BlogMulti => "blogMulti",
            Self::Assets => "assets",
        }
    }
}

/// Location of a file inside the site tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetPath {
    /// Forward-slash path relative to the site root.
    pub relative: String,
    pub absolute: PathBuf,
}

/// One discovered vault file with everything needed to place it.
///
/// Built once per scan; the target is a pure function of the other fields
/// plus the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub source_path: PathBuf,
    /// Forward-slash path relative to the vault root, e.g. `docs/guide+/intro__de.md`.
    pub relative_path: String,
    /// File name as found on disk.
    pub file_name: String,
    /// File stem with the language suffix removed.
    pub clean_name: String,
    /// Text after the last dot, without the dot. Empty when absent.
    pub extension: String,
    pub main_folder: String,
    pub parent_folder: String,
    pub kind: ContentKind,
    pub language: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
    pub target: TargetPath,
}

/// How a document-folder file is brought into the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    /// Markdown rewritten line by line.
    Document,
    /// `*.yml.md` front-matter companion, copied verbatim as `.yml`.
    Companion,
    /// Any other file, copied byte for byte.
    Binary,
    /// Diagram sources and attachment-folder files: never copied directly.
    Skipped,
}

impl SourceFile {
    /// Key used for manifest entries and asset references.
    pub fn document_id(&self) -> &str {
        &self.relative_path
    }

    pub fn role(&self) -> FileRole {
        if self.kind == ContentKind::Assets {
            return FileRole::Skipped;
        }
        let lower = self.file_name.to_ascii_lowercase();
        if lower.ends_with(".excalidraw.md") {
            FileRole::Skipped
        } else if lower.ends_with(".yml.md") {
            FileRole::Companion
        } else if self.extension.eq_ignore_ascii_case("md") {
            FileRole::Document
        } else {
            FileRole::Binary
        }
    }
}

/// Transient classification of one top-level vault folder.
#[derive(Debug, Clone)]
pub struct MainFolder {
    pub name: String,
    pub kind: ContentKind,
    pub path: PathBuf,
    pub files: Vec<SourceFile>,
}
