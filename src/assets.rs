//! Asset registry: which documents reference which rendering of which file.
//!
//! Every image, diagram or download a document embeds is recorded here as an
//! [`AssetRecord`] with one [`SizeVariant`] per requested size. Each variant
//! holds the set of documents referencing it and the file names it generates
//! under `static/<site_asset_folder>/`.
//!
//! ## Reference counting
//!
//! A variant exists only while at least one document references it.
//! [`AssetRegistry::release_references`] drops a document from every variant
//! and returns the outputs of variants that became empty, so the sync engine
//! can delete them. Registering the same document twice is a no-op.
//!
//! ## Output names
//!
//! | Kind | Extensions | Outputs |
//! |---|---|---|
//! | Raster | png, jpg, jpeg, webp, bmp, tif, tiff | `name{suffix}.{image_format}` |
//! | Animated | gif | `name{suffix}.gif` |
//! | Vector | svg | `name.dark.svg`, `name.light.svg` |
//! | Diagram | excalidraw, excalidraw.md | `name.excalidraw.dark.svg`, `name.excalidraw.light.svg` |
//! | Download | anything else | `name.ext` |
//!
//! The size suffix is empty for `standard`, `_w300` for a width, `_w300xh200`
//! for exact dimensions and `_small` for a named size. Vector, diagram and
//! download assets ignore size annotations.

use crate::imaging::OutputFormat;
use crate::imaging::rust_backend::supported_input_extensions;
use crate::naming;
use crate::state::{self, StateError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the registry file within the state directory.
pub const REGISTRY_FILENAME: &str = "assets.json";

pub const REGISTRY_VERSION: u32 = 1;

/// How an asset is turned into site files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Raster,
    Animated,
    Vector,
    Diagram,
    Download,
}

impl AssetKind {
    /// Classify by lowercased extension as returned by [`split_asset_name`].
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.to_ascii_lowercase();
        if ext == "gif" {
            Self::Animated
        } else if supported_input_extensions().contains(&ext.as_str()) {
            Self::Raster
        } else if ext == "svg" {
            Self::Vector
        } else if ext == "excalidraw" || ext == "excalidraw.md" {
            Self::Diagram
        } else {
            Self::Download
        }
    }

    /// Whether size annotations produce distinct outputs.
    pub fn is_sized(self) -> bool {
        matches!(self, Self::Raster | Self::Animated)
    }
}

/// Split an embedded file name into stem and extension.
///
/// Diagram sources keep their compound extension:
/// `flow.excalidraw.md` → (`flow`, `excalidraw.md`).
pub fn split_asset_name(file_name: &str) -> (&str, &str) {
    let lower = file_name.to_ascii_lowercase();
    for compound in [".excalidraw.md", ".excalidraw"] {
        if lower.ends_with(compound) && lower.len() > compound.len() {
            let cut = file_name.len() - compound.len();
            return (&file_name[..cut], &file_name[cut + 1..]);
        }
    }
    naming::split_extension(file_name)
}

// ============================================================================
// Size tokens
// ============================================================================

/// A requested rendering size, written after `|` in an embed.
///
/// Persisted as its textual form: `standard`, `300`, `300x200`, `small`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SizeToken {
    Standard,
    Width(u32),
    Exact { width: u32, height: u32 },
    Named(String),
}

impl SizeToken {
    /// Parse a size annotation. Anything unrecognizable is `Standard`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("standard") {
            return Self::Standard;
        }
        if let Ok(width) = text.parse::<u32>() {
            return if width == 0 {
                Self::Standard
            } else {
                Self::Width(width)
            };
        }
        if let Some((w, h)) = text.split_once(['x', 'X'])
            && let (Ok(width), Ok(height)) = (w.trim().parse::<u32>(), h.trim().parse::<u32>())
        {
            return if width == 0 || height == 0 {
                Self::Standard
            } else {
                Self::Exact { width, height }
            };
        }
        if text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Self::Named(text.to_ascii_lowercase());
        }
        Self::Standard
    }

    /// File name suffix distinguishing this variant's outputs.
    pub fn suffix(&self) -> String {
        match self {
            Self::Standard => String::new(),
            Self::Width(w) => format!("_w{w}"),
            Self::Exact { width, height } => format!("_w{width}xh{height}"),
            Self::Named(name) => format!("_{name}"),
        }
    }
}

impl fmt::Display for SizeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Width(w) => write!(f, "{w}"),
            Self::Exact { width, height } => write!(f, "{width}x{height}"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

impl Serialize for SizeToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SizeToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

// ============================================================================
// References
// ============================================================================

/// One embed found by the rewriter, with its outputs already named.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetReference {
    /// Registry key: `clean_name.extension`, extension lowercased.
    pub key: String,
    /// File name as written in the embed, spaces slugged.
    pub file_name: String,
    pub clean_name: String,
    pub extension: String,
    pub kind: AssetKind,
    pub size: SizeToken,
    pub outputs: Vec<String>,
    /// Vault-relative path of the referencing document.
    pub document: String,
}

impl AssetReference {
    pub fn new(file_name: &str, size: SizeToken, document: &str, format: OutputFormat) -> Self {
        let file_name = naming::slug_spaces(file_name);
        let (stem, extension) = split_asset_name(&file_name);
        let (clean_name, extension) = (stem.to_string(), extension.to_string());
        let kind = AssetKind::from_extension(&extension);
        let size = if kind.is_sized() {
            size
        } else {
            SizeToken::Standard
        };
        let outputs = output_names(&clean_name, &extension, kind, &size, format);
        Self {
            key: format!("{clean_name}.{}", extension.to_ascii_lowercase()),
            file_name,
            clean_name,
            extension,
            kind,
            size,
            outputs,
            document: document.to_string(),
        }
    }
}

/// Generated file names for one variant, dark theme first for themed kinds.
pub fn output_names(
    clean_name: &str,
    extension: &str,
    kind: AssetKind,
    size: &SizeToken,
    format: OutputFormat,
) -> Vec<String> {
    let suffix = size.suffix();
    match kind {
        AssetKind::Raster => vec![format!("{clean_name}{suffix}.{}", format.extension())],
        AssetKind::Animated => vec![format!("{clean_name}{suffix}.gif")],
        AssetKind::Vector => vec![
            format!("{clean_name}.dark.svg"),
            format!("{clean_name}.light.svg"),
        ],
        AssetKind::Diagram => vec![
            format!("{clean_name}.excalidraw.dark.svg"),
            format!("{clean_name}.excalidraw.light.svg"),
        ],
        AssetKind::Download => vec![format!("{clean_name}.{extension}")],
    }
}

/// Destination for references found while rewriting a document.
///
/// The sync engine rewrites documents in parallel into a local `Vec` and
/// applies the result to the shared registry under a lock.
pub trait AssetSink {
    fn register(&mut self, reference: AssetReference);
}

impl AssetSink for Vec<AssetReference> {
    fn register(&mut self, reference: AssetReference) {
        self.push(reference);
    }
}

impl AssetSink for AssetRegistry {
    fn register(&mut self, reference: AssetReference) {
        self.register_reference(&reference);
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeVariant {
    pub size: SizeToken,
    pub references: BTreeSet<String>,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub file_name: String,
    pub clean_name: String,
    pub extension: String,
    pub kind: AssetKind,
    pub variants: Vec<SizeVariant>,
}

impl AssetRecord {
    pub fn variant(&self, size: &SizeToken) -> Option<&SizeVariant> {
        self.variants.iter().find(|v| &v.size == size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRegistry {
    pub version: u32,
    pub assets: BTreeMap<String, AssetRecord>,
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl AssetRegistry {
    pub fn empty() -> Self {
        Self {
            version: REGISTRY_VERSION,
            assets: BTreeMap::new(),
        }
    }

    pub fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(REGISTRY_FILENAME)
    }

    /// Load from the state directory. Missing means empty; malformed is an error.
    pub fn load(state_dir: &Path) -> Result<Self, StateError> {
        let path = Self::path(state_dir);
        match state::read_json::<Self>(&path)? {
            Some(registry) => {
                state::check_version(&path, registry.version, REGISTRY_VERSION)?;
                Ok(registry)
            }
            None => Ok(Self::empty()),
        }
    }

    pub fn save(&self, state_dir: &Path) -> Result<(), StateError> {
        state::write_json(&Self::path(state_dir), self)
    }

    /// Add `reference.document` to the matching variant, creating the record
    /// and variant as needed. Returns `false` when the reference was already
    /// present.
    ///
    /// A variant is identified by its size and its output names, so the same
    /// size encoded in two formats is counted as two variants.
    pub fn register_reference(&mut self, reference: &AssetReference) -> bool {
        let record = self
            .assets
            .entry(reference.key.clone())
            .or_insert_with(|| AssetRecord {
                file_name: reference.file_name.clone(),
                clean_name: reference.clean_name.clone(),
                extension: reference.extension.clone(),
                kind: reference.kind,
                variants: Vec::new(),
            });
        match record
            .variants
            .iter_mut()
            .find(|v| v.size == reference.size && v.outputs == reference.outputs)
        {
            Some(variant) => variant.references.insert(reference.document.clone()),
            None => {
                record.variants.push(SizeVariant {
                    size: reference.size.clone(),
                    references: BTreeSet::from([reference.document.clone()]),
                    outputs: reference.outputs.clone(),
                });
                true
            }
        }
    }

    /// Remove `document` from every variant. Variants left without references
    /// are dropped, records left without variants too. Returns the outputs of
    /// the dropped variants.
    pub fn release_references(&mut self, document: &str) -> Vec<String> {
        let mut orphaned = Vec::new();
        for record in self.assets.values_mut() {
            record.variants.retain_mut(|variant| {
                variant.references.remove(document);
                if variant.references.is_empty() {
                    orphaned.extend(variant.outputs.iter().cloned());
                    false
                } else {
                    true
                }
            });
        }
        self.assets.retain(|_, record| !record.variants.is_empty());
        orphaned
    }

    /// Every output file name some live variant generates.
    pub fn outputs(&self) -> BTreeSet<String> {
        self.assets
            .values()
            .flat_map(|r| r.variants.iter())
            .flat_map(|v| v.outputs.iter().cloned())
            .collect()
    }

    pub fn variant_count(&self) -> usize {
        self.assets.values().map(|r| r.variants.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
