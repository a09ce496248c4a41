//! # Vault Mirror
//!
//! Incrementally mirrors an Obsidian vault into a Docusaurus site. Top-level
//! vault folders map to Docusaurus content plugins, markdown is rewritten from
//! Obsidian syntax to Docusaurus syntax, and embedded images are resized into
//! the site's static folder.
//!
//! # Architecture: Plan, Convert, Materialize
//!
//! A run compares the vault against what the previous run recorded and does
//! only the work the difference calls for:
//!
//! ```text
//! 1. Scan         vault/          →  ScanResult       (classified source files)
//! 2. Plan         manifest + scan →  SyncPlan         (deletions, conversions)
//! 3. Convert      SyncPlan        →  site/ + assets.json (rewritten docs, asset refs)
//! 4. Materialize  assets.json     →  site/static/<assets>/ (resized variants)
//! ```
//!
//! Two JSON files under `<site>/.vault-mirror/` carry state between runs:
//! `manifest.json` maps every vault source to the target it produced, and
//! `assets.json` records which documents reference which asset variants. Both
//! are written atomically and carry a `version` field; a file with the wrong
//! version stops the run instead of being silently discarded.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the vault, classifies main folders and files |
//! | [`resolve`] | Vault path → site path mapping (languages, groups, blog dates) |
//! | [`rewrite`] | Line-based markdown rewriting: embeds, links, callouts |
//! | [`assets`] | Asset references, size tokens, the reference-counted registry |
//! | [`materialize`] | Generates resized/themed asset files from the registry |
//! | [`sync`] | Planning, the run itself, orphan sweep, reset |
//! | [`session`] | Activate/run/deactivate lifecycle for embedding hosts |
//! | [`manifest`] | Source → target records from the last run |
//! | [`state`] | Versioned JSON state files with atomic writes |
//! | [`config`] | `vault-mirror.toml` loading, merging onto defaults, validation |
//! | [`types`] | Shared types: content kinds, source files, targets |
//! | [`naming`] | `NN-name`, `__lang` and `+group` filename conventions |
//! | [`imaging`] | Pure-Rust decode, resize and encode |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Modification Time Is the Change Signal
//!
//! A source is converted again when it was modified after the target it last
//! produced, when its target path changed, or when its target is gone. Nothing
//! is hashed; an unchanged vault costs one directory walk and one `stat` per
//! file.
//!
//! ## Reference Counting Instead of Rescanning
//!
//! Asset variants are kept alive by the documents that reference them. When a
//! document is deleted or reconverted its references are released first, so a
//! variant whose last reference goes away is deleted in the same run without
//! re-reading any unchanged document.
//!
//! ## Unreadable Folders Protect Their Entries
//!
//! A vault folder that cannot be read is not the same as an empty one. Manifest
//! entries under it are kept and their targets left alone until the folder is
//! readable again.
//!
//! ## Rewriting Never Fails
//!
//! The rewriter is a forward pass over lines. Syntax it does not recognize,
//! including unsupported callout types and malformed embeds, passes through
//! unchanged. Only I/O can fail a document.

pub mod assets;
pub mod config;
pub mod imaging;
pub mod manifest;
pub mod materialize;
pub mod naming;
pub mod output;
pub mod resolve;
pub mod rewrite;
pub mod scan;
pub mod session;
pub mod state;
pub mod sync;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
