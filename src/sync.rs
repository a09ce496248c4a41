//! Incremental sync: vault → site, touching only what changed.
//!
//! ## Run sequence
//!
//! ```text
//! load manifest + registry ──► scan vault ──► plan
//!                                              │
//!        ┌─────────────────────────────────────┘
//!        ▼
//!   prune UNSEEN ──► DELETE phase ──► CONVERT phase ──► remove orphaned
//!   (target gone)    (parallel)       (parallel)        asset outputs
//!                                                            │
//!        ┌───────────────────────────────────────────────────┘
//!        ▼
//!   orphan sweep ──► save manifest + registry ──► materialize assets
//! ```
//!
//! ## Per-file states
//!
//! | State | Condition | Action |
//! |---|---|---|
//! | UNSEEN | manifest entry, target file missing | drop entry, release its assets |
//! | DELETE | source missing, source newer than recorded target, or target moved | delete target, prune empty dirs, release assets, drop entry |
//! | CONVERT | source without manifest entry | rewrite or copy, record entry |
//! | RELEASED | target shared with another source or removed by a deletion | drop entry, release its assets |
//! | skip | anything else | nothing |
//!
//! Two sources can resolve to one target (two pages in one group folder,
//! `note.md` beside `note__en.md`). The first by vault path owns the target;
//! the others are reported as issues and never written.
//!
//! All deletions finish before any conversion starts, so a rename never
//! leaves old and new outputs side by side. Within each phase files are
//! independent and run on rayon's pool; the shared [`AssetRegistry`] sits
//! behind a mutex and is only touched after a document has been rewritten
//! into a local reference list.
//!
//! ## Failure isolation
//!
//! A file that cannot be read, written or deleted is reported as
//! [`SyncEvent::Failed`] and keeps its previous manifest state, so the next
//! run retries it. Only unreadable persisted state aborts a run: continuing
//! from an empty manifest would orphan every file this tool ever wrote.
//!
//! Entries whose source sits under an unreadable vault directory are never
//! deleted; the scan could not prove the source is gone.

use crate::assets::AssetRegistry;
use crate::config::{ConfigError, SyncConfig};
use crate::imaging::{ImageBackend, RustBackend};
use crate::manifest::{Manifest, ManifestEntry};
use crate::materialize::{self, AssetIndex};
use crate::naming;
use crate::resolve::site_join;
use crate::rewrite;
use crate::scan::{self, ScanError, ScanResult};
use crate::state::{self, StateError};
use crate::types::{ContentKind, FileRole, SourceFile};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// macOS folder metadata, removed when it is all that keeps a folder alive.
const DS_STORE: &str = ".DS_Store";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Persisted state is unreadable, refusing to sync: {0}")]
    CorruptState(StateError),
    #[error("Failed to save state: {0}")]
    State(StateError),
}

/// Per-run overrides of the configuration.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Force the orphan sweep on or off.
    pub orphan_sweep: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteReason {
    SourceMissing,
    SourceModified,
    TargetMoved,
}

impl fmt::Display for DeleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SourceMissing => "source removed",
            Self::SourceModified => "source modified",
            Self::TargetMoved => "target moved",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Delete,
    Convert,
    Sweep,
    Materialize,
    Reset,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delete => "Deleting",
            Self::Convert => "Converting",
            Self::Sweep => "Sweeping",
            Self::Materialize => "Generating assets",
            Self::Reset => "Resetting",
        })
    }
}

/// Progress events for CLI output, sent over an mpsc channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    PhaseStarted { phase: Phase, count: usize },
    Issue { message: String },
    Pruned { source: String },
    Deleted { target: String, reason: DeleteReason },
    Converted { source: String, target: String, role: FileRole },
    Failed { path: String, message: String },
    Swept { target: String },
    AssetGenerated { name: String },
    AssetRemoved { name: String },
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDeletion {
    pub source: String,
    pub target: String,
    pub reason: DeleteReason,
}

/// A source left out because another source resolves to the same target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetCollision {
    pub source: String,
    pub target: String,
    /// The source that produces the target: the first by vault path.
    pub kept: String,
}

impl fmt::Display for TargetCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} skipped: {} already produces {}",
            self.source, self.kept, self.target
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedConversion {
    pub source: String,
    pub target: String,
    pub role: FileRole,
}

/// What a run would do, computed without touching the site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    /// Manifest entries whose target vanished.
    pub unseen: Vec<String>,
    /// Entries dropped without touching their target: it belongs to another
    /// source, or a deletion below removes it and it is rebuilt.
    pub released: Vec<String>,
    pub deletions: Vec<PlannedDeletion>,
    pub conversions: Vec<PlannedConversion>,
    pub collisions: Vec<TargetCollision>,
    /// Sources already in sync.
    pub unchanged: usize,
    /// Entries kept because their source might still exist.
    pub protected: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.unseen.is_empty()
            && self.released.is_empty()
            && self.deletions.is_empty()
            && self.conversions.is_empty()
    }
}

/// Producing source per target. When several sources resolve to one target
/// the first by vault path owns it.
fn target_owners(scan: &ScanResult) -> HashMap<&str, &str> {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for file in scan.content_files().filter(|f| f.role() != FileRole::Skipped) {
        let source = file.relative_path.as_str();
        owners
            .entry(file.target.relative.as_str())
            .and_modify(|owner| *owner = (*owner).min(source))
            .or_insert(source);
    }
    owners
}

/// Diff the scan against the manifest.
pub fn compute_plan(manifest: &Manifest, scan: &ScanResult, site_root: &Path) -> SyncPlan {
    let sources = scan.by_relative_path();
    let owners = target_owners(scan);
    let owns = |file: &SourceFile| {
        owners.get(file.target.relative.as_str()) == Some(&file.relative_path.as_str())
    };
    let mut plan = SyncPlan::default();
    let mut dropped: HashSet<&str> = HashSet::new();

    for (source_rel, entry) in &manifest.entries {
        if !site_join(site_root, &entry.target).exists() {
            plan.unseen.push(source_rel.clone());
            dropped.insert(source_rel.as_str());
            continue;
        }
        let reason = match sources.get(source_rel.as_str()) {
            None if scan.is_uncertain(source_rel) => {
                plan.protected.push(source_rel.clone());
                continue;
            }
            None => Some(DeleteReason::SourceMissing),
            Some(source) if !owns(*source) && source.target.relative == entry.target => {
                plan.released.push(source_rel.clone());
                dropped.insert(source_rel.as_str());
                continue;
            }
            Some(source) if source.modified > entry.target_modified => {
                Some(DeleteReason::SourceModified)
            }
            Some(source) if source.target.relative != entry.target => {
                Some(DeleteReason::TargetMoved)
            }
            Some(_) => None,
        };
        if let Some(reason) = reason {
            plan.deletions.push(PlannedDeletion {
                source: source_rel.clone(),
                target: entry.target.clone(),
                reason,
            });
            dropped.insert(source_rel.as_str());
        }
    }

    // Entries sharing a target some deletion removes.
    let deleted_targets: HashSet<&str> =
        plan.deletions.iter().map(|d| d.target.as_str()).collect();
    for (source_rel, entry) in &manifest.entries {
        if deleted_targets.contains(entry.target.as_str())
            && sources.contains_key(source_rel.as_str())
            && dropped.insert(source_rel.as_str())
        {
            plan.released.push(source_rel.clone());
        }
    }

    for file in scan.content_files() {
        let role = file.role();
        if role == FileRole::Skipped {
            continue;
        }
        let source = file.relative_path.as_str();
        if !owns(file) {
            plan.collisions.push(TargetCollision {
                source: source.to_string(),
                target: file.target.relative.clone(),
                kept: owners[file.target.relative.as_str()].to_string(),
            });
            continue;
        }
        if manifest.get(source).is_none() || dropped.contains(source) {
            plan.conversions.push(PlannedConversion {
                source: source.to_string(),
                target: file.target.relative.clone(),
                role,
            });
        } else {
            plan.unchanged += 1;
        }
    }
    plan
}

/// Compute the plan for the configured vault without changing anything.
pub fn plan(config: &SyncConfig) -> Result<SyncPlan, SyncError> {
    let (manifest, _) = load_state(&config.state_path())?;
    let scanned = scan::scan(config)?;
    Ok(compute_plan(&manifest, &scanned, &config.site_path))
}

// ============================================================================
// Report
// ============================================================================

/// Counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub issues: usize,
    pub pruned: usize,
    pub deleted: usize,
    /// Documents rewritten.
    pub converted: usize,
    /// Companion and binary files copied.
    pub copied: usize,
    pub unchanged: usize,
    pub protected: usize,
    pub failed: usize,
    pub swept: usize,
    pub assets_generated: usize,
    pub assets_removed: usize,
    pub asset_failures: usize,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} converted, {} copied, {} deleted, {} unchanged",
            self.converted, self.copied, self.deleted, self.unchanged
        )?;
        if self.pruned > 0 {
            write!(f, ", {} pruned", self.pruned)?;
        }
        if self.swept > 0 {
            write!(f, ", {} swept", self.swept)?;
        }
        if self.assets_generated > 0 || self.assets_removed > 0 {
            write!(
                f,
                ", assets {} generated / {} removed",
                self.assets_generated, self.assets_removed
            )?;
        }
        let failures = self.failed + self.asset_failures;
        if failures > 0 {
            write!(f, ", {failures} failed")?;
        }
        Ok(())
    }
}

// ============================================================================
// Run
// ============================================================================

/// Manifest and registry from the previous run. Unreadable state ends the run.
fn load_state(state_dir: &Path) -> Result<(Manifest, AssetRegistry), SyncError> {
    Manifest::load(state_dir)
        .and_then(|manifest| Ok((manifest, AssetRegistry::load(state_dir)?)))
        .map_err(|e| {
            error!(error = %e, "sync state unreadable");
            SyncError::CorruptState(e)
        })
}

fn emit(events: Option<&Sender<SyncEvent>>, event: SyncEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

/// Sync using the built-in image backend.
pub fn sync(
    config: &SyncConfig,
    options: &SyncOptions,
    events: Option<Sender<SyncEvent>>,
) -> Result<SyncReport, SyncError> {
    sync_with_backend(&RustBackend::new(), config, options, events)
}

/// Sync using a specific image backend (allows testing with mock).
pub fn sync_with_backend(
    backend: &impl ImageBackend,
    config: &SyncConfig,
    options: &SyncOptions,
    events: Option<Sender<SyncEvent>>,
) -> Result<SyncReport, SyncError> {
    let events = events.as_ref();
    let state_dir = config.state_path();
    let site = config.site_path.as_path();

    let (mut manifest, mut registry) = load_state(&state_dir)?;
    let outputs_before = registry.outputs();

    let scanned = scan::scan(config)?;
    let mut report = SyncReport {
        issues: scanned.issues.len(),
        ..SyncReport::default()
    };
    for issue in &scanned.issues {
        emit(
            events,
            SyncEvent::Issue {
                message: issue.to_string(),
            },
        );
    }

    let plan = compute_plan(&manifest, &scanned, site);
    report.unchanged = plan.unchanged;
    report.protected = plan.protected.len();
    report.issues += plan.collisions.len();
    for collision in &plan.collisions {
        warn!(
            source = %collision.source,
            kept = %collision.kept,
            target = %collision.target,
            "target collision"
        );
        emit(
            events,
            SyncEvent::Issue {
                message: collision.to_string(),
            },
        );
    }
    info!(
        unseen = plan.unseen.len(),
        delete = plan.deletions.len(),
        convert = plan.conversions.len(),
        unchanged = plan.unchanged,
        "sync plan"
    );

    for source in plan.unseen.iter().chain(&plan.released) {
        manifest.remove(source);
        registry.release_references(source);
        debug!(%source, "pruned entry");
        report.pruned += 1;
        emit(
            events,
            SyncEvent::Pruned {
                source: source.clone(),
            },
        );
    }

    // Phase 1: deletions, all finished before any conversion starts.
    emit(
        events,
        SyncEvent::PhaseStarted {
            phase: Phase::Delete,
            count: plan.deletions.len(),
        },
    );
    let deleted: Vec<(&PlannedDeletion, io::Result<()>)> = plan
        .deletions
        .par_iter()
        .map(|d| (d, delete_target(site, &d.target)))
        .collect();
    for (deletion, result) in deleted {
        match result {
            Ok(()) => {
                manifest.remove(&deletion.source);
                registry.release_references(&deletion.source);
                report.deleted += 1;
                emit(
                    events,
                    SyncEvent::Deleted {
                        target: deletion.target.clone(),
                        reason: deletion.reason,
                    },
                );
            }
            Err(e) => {
                warn!(target = %deletion.target, error = %e, "delete failed");
                report.failed += 1;
                emit(
                    events,
                    SyncEvent::Failed {
                        path: deletion.target.clone(),
                        message: e.to_string(),
                    },
                );
            }
        }
    }

    // Phase 2: conversions. Sources whose deletion failed keep their entry and wait.
    let sources = scanned.by_relative_path();
    let pending: Vec<&SourceFile> = plan
        .conversions
        .iter()
        .filter(|c| manifest.get(&c.source).is_none())
        .filter_map(|c| sources.get(c.source.as_str()).copied())
        .collect();
    emit(
        events,
        SyncEvent::PhaseStarted {
            phase: Phase::Convert,
            count: pending.len(),
        },
    );
    let shared = Mutex::new(registry);
    let converted: Vec<(&SourceFile, io::Result<ManifestEntry>)> = pending
        .par_iter()
        .map(|file| (*file, convert_file(file, config, &shared)))
        .collect();
    let mut registry = shared.into_inner().unwrap_or_else(|e| e.into_inner());
    for (file, result) in converted {
        match result {
            Ok(entry) => {
                let role = file.role();
                if role == FileRole::Document {
                    report.converted += 1;
                } else {
                    report.copied += 1;
                }
                emit(
                    events,
                    SyncEvent::Converted {
                        source: entry.source.clone(),
                        target: entry.target.clone(),
                        role,
                    },
                );
                manifest.insert(entry);
            }
            Err(e) => {
                warn!(source = %file.relative_path, error = %e, "convert failed");
                report.failed += 1;
                emit(
                    events,
                    SyncEvent::Failed {
                        path: file.relative_path.clone(),
                        message: e.to_string(),
                    },
                );
            }
        }
    }

    // Generated files no live variant claims any more.
    let asset_dir = config.asset_output_dir();
    let outputs_after = registry.outputs();
    let orphaned: Vec<String> = outputs_before.difference(&outputs_after).cloned().collect();
    for name in materialize::remove_outputs(&asset_dir, &orphaned) {
        report.assets_removed += 1;
        emit(events, SyncEvent::AssetRemoved { name });
    }

    let sweep_enabled = options.orphan_sweep.unwrap_or(config.orphan_sweep);
    if sweep_enabled {
        let roots = sweep_roots(config, &scanned);
        emit(
            events,
            SyncEvent::PhaseStarted {
                phase: Phase::Sweep,
                count: roots.len(),
            },
        );
        for target in sweep_orphans(config, &roots, &manifest, &outputs_after) {
            report.swept += 1;
            emit(events, SyncEvent::Swept { target });
        }
    }

    manifest
        .save(&state_dir)
        .and_then(|()| registry.save(&state_dir))
        .map_err(|e| {
            error!(error = %e, "sync state not saved");
            SyncError::State(e)
        })?;

    let index = AssetIndex::build(&scanned);
    let pending_assets = materialize::pending_variants(&registry, &asset_dir).len();
    emit(
        events,
        SyncEvent::PhaseStarted {
            phase: Phase::Materialize,
            count: pending_assets,
        },
    );
    let materialized = materialize::materialize(&registry, &index, config, backend);
    for name in materialized.generated {
        report.assets_generated += 1;
        emit(events, SyncEvent::AssetGenerated { name });
    }
    for (name, error) in materialized.failed {
        report.asset_failures += 1;
        emit(
            events,
            SyncEvent::Failed {
                path: name,
                message: error.to_string(),
            },
        );
    }

    info!(%report, "sync finished");
    Ok(report)
}

/// Delete a site file and any folders it leaves empty. Missing is success.
fn delete_target(site: &Path, target: &str) -> io::Result<()> {
    let path = site_join(site, target);
    match fs::remove_file(&path) {
        Ok(()) => debug!(%target, "deleted"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    prune_empty_parents(&path, site);
    Ok(())
}

/// Walk up from `path`, removing folders that are empty (or hold only
/// `.DS_Store`), stopping at `stop`.
fn prune_empty_parents(path: &Path, stop: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) || !remove_if_empty(dir) {
            break;
        }
        current = dir.parent();
    }
}

fn remove_if_empty(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    let entries: Vec<_> = entries.filter_map(Result::ok).collect();
    if entries.iter().any(|e| e.file_name() != DS_STORE) {
        return false;
    }
    for entry in &entries {
        let _ = fs::remove_file(entry.path());
    }
    fs::remove_dir(dir).is_ok()
}

fn file_times(path: &Path) -> io::Result<(DateTime<Utc>, u64)> {
    let meta = fs::metadata(path)?;
    Ok((DateTime::<Utc>::from(meta.modified()?), meta.len()))
}

/// Produce one target file and its manifest entry.
fn convert_file(
    file: &SourceFile,
    config: &SyncConfig,
    registry: &Mutex<AssetRegistry>,
) -> io::Result<ManifestEntry> {
    let target = &file.target.absolute;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    match file.role() {
        FileRole::Document => {
            let bytes = fs::read(&file.source_path)?;
            let text = String::from_utf8_lossy(&bytes);
            let mut references = Vec::new();
            let rewritten =
                rewrite::rewrite_document(&text, file.document_id(), config, &mut references);
            fs::write(target, rewritten)?;

            let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.release_references(file.document_id());
            for reference in &references {
                registry.register_reference(reference);
            }
        }
        FileRole::Companion | FileRole::Binary => {
            fs::copy(&file.source_path, target)?;
        }
        FileRole::Skipped => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "file is not copied into the site",
            ));
        }
    }

    let (target_modified, target_size) = file_times(target)?;
    debug!(source = %file.relative_path, target = %file.target.relative, "converted");
    Ok(ManifestEntry {
        source: file.relative_path.clone(),
        target: file.target.relative.clone(),
        source_modified: file.modified,
        source_size: file.size,
        target_modified,
        target_size,
        kind: file.kind,
        language: file.language.clone(),
    })
}

// ============================================================================
// Orphan sweep
// ============================================================================

/// A site folder this tool owns, and whether its top-level `.json` files are
/// plugin metadata to leave alone.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRoot {
    pub path: PathBuf,
    pub keep_top_level_json: bool,
}

/// Site folders that only ever contain files this tool wrote.
pub fn sweep_roots(config: &SyncConfig, scanned: &ScanResult) -> Vec<SweepRoot> {
    let site = &config.site_path;
    let mut roots: Vec<SweepRoot> = Vec::new();
    let mut push = |path: PathBuf, keep_top_level_json: bool| {
        if path.is_dir() && !roots.iter().any(|r| r.path == path) {
            roots.push(SweepRoot {
                path,
                keep_top_level_json,
            });
        }
    };

    for folder in &scanned.folders {
        match folder.kind {
            ContentKind::Docs | ContentKind::Blog => push(site.join(&folder.name), false),
            ContentKind::BlogMulti => push(site.join(naming::blog_plugin_id(&folder.name)), false),
            ContentKind::Assets => {}
        }
    }

    if let Ok(locales) = fs::read_dir(site.join("i18n")) {
        let mut locales: Vec<PathBuf> = locales.filter_map(Result::ok).map(|e| e.path()).collect();
        locales.sort();
        for locale in locales {
            push(
                locale.join("docusaurus-plugin-content-docs").join("current"),
                false,
            );
            let Ok(plugins) = fs::read_dir(&locale) else {
                continue;
            };
            let mut blogs: Vec<PathBuf> = plugins
                .filter_map(Result::ok)
                .filter(|e| {
                    e.file_name()
                        .to_string_lossy()
                        .starts_with("docusaurus-plugin-content-blog")
                })
                .map(|e| e.path())
                .collect();
            blogs.sort();
            for blog in blogs {
                push(blog, true);
            }
        }
    }

    push(config.asset_output_dir(), false);
    roots
}

/// Delete files under the roots that neither the manifest nor the registry
/// accounts for, then prune folders left empty. Returns site-relative paths
/// of deleted files.
pub fn sweep_orphans(
    config: &SyncConfig,
    roots: &[SweepRoot],
    manifest: &Manifest,
    asset_outputs: &BTreeSet<String>,
) -> Vec<String> {
    let site = &config.site_path;
    let asset_prefix = format!("static/{}/", config.site_asset_folder);
    let mut known: HashSet<String> = manifest.targets().map(str::to_string).collect();
    known.extend(asset_outputs.iter().map(|o| format!("{asset_prefix}{o}")));

    let mut swept = Vec::new();
    for root in roots {
        for entry in WalkDir::new(&root.path)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            if root.keep_top_level_json
                && entry.depth() == 1
                && entry.path().extension().is_some_and(|e| e == "json")
            {
                continue;
            }
            let Some(relative) = site_relative(site, entry.path()) else {
                continue;
            };
            if known.contains(&relative) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!(target = %relative, "swept orphan");
                    swept.push(relative);
                }
                Err(e) => warn!(path = %entry.path().display(), error = %e, "sweep failed"),
            }
        }
        prune_empty_dirs(&root.path);
    }
    swept
}

/// Remove every empty folder below `root` (deepest first), keeping `root`.
fn prune_empty_dirs(root: &Path) {
    for entry in WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
    {
        remove_if_empty(entry.path());
    }
}

fn site_relative(site: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(site).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

// ============================================================================
// Reset
// ============================================================================

/// Delete everything this tool tracks and forget all state.
pub fn reset(
    config: &SyncConfig,
    events: Option<Sender<SyncEvent>>,
) -> Result<SyncReport, SyncError> {
    let events = events.as_ref();
    let state_dir = config.state_path();
    let site = config.site_path.as_path();
    let (manifest, registry) = load_state(&state_dir)?;
    let mut report = SyncReport::default();

    emit(
        events,
        SyncEvent::PhaseStarted {
            phase: Phase::Reset,
            count: manifest.len(),
        },
    );
    for entry in manifest.entries.values() {
        match delete_target(site, &entry.target) {
            Ok(()) => {
                report.deleted += 1;
                emit(
                    events,
                    SyncEvent::Deleted {
                        target: entry.target.clone(),
                        reason: DeleteReason::SourceMissing,
                    },
                );
            }
            Err(e) => {
                warn!(target = %entry.target, error = %e, "reset delete failed");
                report.failed += 1;
                emit(
                    events,
                    SyncEvent::Failed {
                        path: entry.target.clone(),
                        message: e.to_string(),
                    },
                );
            }
        }
    }

    let asset_dir = config.asset_output_dir();
    let outputs: Vec<String> = registry.outputs().into_iter().collect();
    for name in materialize::remove_outputs(&asset_dir, &outputs) {
        report.assets_removed += 1;
        emit(events, SyncEvent::AssetRemoved { name });
    }
    if asset_dir.is_dir() {
        prune_empty_dirs(&asset_dir);
        remove_if_empty(&asset_dir);
    }

    state::remove(&Manifest::path(&state_dir)).map_err(SyncError::State)?;
    state::remove(&AssetRegistry::path(&state_dir)).map_err(SyncError::State)?;
    info!(%report, "reset finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::Fixture;
    use std::time::{Duration, SystemTime};

    fn run(fx: &Fixture) -> SyncReport {
        sync_with_backend(
            &MockBackend::with_dimensions(800, 600),
            &fx.config,
            &SyncOptions::default(),
            None,
        )
        .unwrap()
    }

    fn touch_future(path: &Path) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(120))
            .unwrap();
    }

    // =========================================================================
    // First run
    // =========================================================================

    #[test]
    fn first_run_converts_everything() {
        let fx = Fixture::new();
        fx.write("docs/intro.md", "# Intro\n");
        fx.write("docs/note__de.md", "# Notiz\n");
        fx.write("docs/meta.yml.md", "label: Meta\n");
        fx.write("docs/data.csv", "a,b\n");

        let report = run(&fx);

        assert_eq!(report.converted, 2);
        assert_eq!(report.copied, 2);
        assert_eq!(fx.read_site("docs/intro.md"), "# Intro\n");
        assert_eq!(
            fx.read_site("i18n/de/docusaurus-plugin-content-docs/current/note.md"),
            "# Notiz\n"
        );
        assert_eq!(fx.read_site("docs/meta.yml"), "label: Meta\n");
        assert!(fx.site_file("docs/data.csv").exists());

        let manifest = Manifest::load(&fx.config.state_path()).unwrap();
        assert_eq!(manifest.len(), 4);
    }

    #[test]
    fn diagram_sources_and_attachments_not_copied() {
        let fx = Fixture::new();
        fx.write("docs/flow.excalidraw.md", "drawing");
        fx.write("assets/unused.png", "x");

        let report = run(&fx);

        assert_eq!(report.converted + report.copied, 0);
        assert!(!fx.site_file("docs/flow.excalidraw.md").exists());
        assert!(!fx.site_file("static/assets/unused.png").exists());
    }

    #[test]
    fn callouts_rewritten_in_output() {
        let fx = Fixture::new();
        fx.write("docs/page.md", "> [!warning] Title\nbody line\n\n");
        run(&fx);
        assert_eq!(
            fx.read_site("docs/page.md"),
            ":::warning Title\nbody line\n:::\n\n"
        );
    }

    // =========================================================================
    // Incremental behavior
    // =========================================================================

    #[test]
    fn second_run_is_a_no_op() {
        let fx = Fixture::new();
        fx.write("docs/intro.md", "# Intro\n");
        fx.write("blog/2024-03-01-launch.md", "Hello\n");
        run(&fx);

        let second = run(&fx);

        assert_eq!(second.converted, 0);
        assert_eq!(second.copied, 0);
        assert_eq!(second.deleted, 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.swept, 0);
    }

    #[test]
    fn rename_leaves_only_new_target() {
        let fx = Fixture::new();
        fx.write("docs/old.md", "text\n");
        run(&fx);
        fs::rename(fx.vault().join("docs/old.md"), fx.vault().join("docs/new.md")).unwrap();

        let report = run(&fx);

        assert_eq!(report.deleted, 1);
        assert_eq!(report.converted, 1);
        assert!(!fx.site_file("docs/old.md").exists());
        assert!(fx.site_file("docs/new.md").exists());
    }

    #[test]
    fn modified_source_is_reconverted() {
        let fx = Fixture::new();
        let source = fx.write("docs/page.md", "v1\n");
        run(&fx);
        fs::write(&source, "v2\n").unwrap();
        touch_future(&source);

        let report = run(&fx);

        assert_eq!(report.deleted, 1);
        assert_eq!(report.converted, 1);
        assert_eq!(fx.read_site("docs/page.md"), "v2\n");
    }

    #[test]
    fn deleted_source_removes_target_and_empty_dirs() {
        let fx = Fixture::new();
        let source = fx.write("docs/deep/nested/page.md", "x\n");
        fx.write("docs/keep.md", "y\n");
        run(&fx);
        fs::remove_file(source).unwrap();

        let report = run(&fx);

        assert_eq!(report.deleted, 1);
        assert!(!fx.site_file("docs/deep").exists());
        assert!(fx.site_file("docs/keep.md").exists());
    }

    #[test]
    fn missing_target_is_pruned_and_rebuilt() {
        let fx = Fixture::new();
        fx.write("docs/page.md", "x\n");
        run(&fx);
        fs::remove_file(fx.site_file("docs/page.md")).unwrap();

        let report = run(&fx);

        assert_eq!(report.pruned, 1);
        assert_eq!(report.deleted, 0);
        assert_eq!(report.converted, 1);
        assert!(fx.site_file("docs/page.md").exists());
    }

    #[test]
    fn language_change_moves_target() {
        let mut fx = Fixture::new();
        fx.write("docs/page__de.md", "x\n");
        run(&fx);
        assert!(
            fx.site_file("i18n/de/docusaurus-plugin-content-docs/current/page.md")
                .exists()
        );

        fx.config.main_language = "de".into();
        let report = run(&fx);

        assert_eq!(report.deleted, 1);
        assert!(fx.site_file("docs/page.md").exists());
        assert!(
            !fx.site_file("i18n/de/docusaurus-plugin-content-docs/current/page.md")
                .exists()
        );
    }

    // =========================================================================
    // Plan
    // =========================================================================

    #[test]
    fn plan_does_not_touch_site() {
        let fx = Fixture::new();
        fx.write("docs/page.md", "x\n");

        let plan = plan(&fx.config).unwrap();

        assert_eq!(plan.conversions.len(), 1);
        assert_eq!(plan.conversions[0].target, "docs/page.md");
        assert!(!fx.site_file("docs/page.md").exists());
        assert!(!fx.config.state_path().exists());
    }

    #[test]
    fn uncertain_sources_are_protected() {
        let fx = Fixture::new();
        fx.write("docs/page.md", "x\n");
        run(&fx);
        let manifest = Manifest::load(&fx.config.state_path()).unwrap();
        let scanned = ScanResult {
            unreadable: vec!["docs".to_string()],
            ..ScanResult::default()
        };

        let plan = compute_plan(&manifest, &scanned, fx.site());

        assert!(plan.deletions.is_empty());
        assert_eq!(plan.protected, vec!["docs/page.md"]);
    }

    #[test]
    fn plan_reports_delete_reasons() {
        let fx = Fixture::new();
        fx.write("docs/gone.md", "x\n");
        run(&fx);
        fs::remove_file(fx.vault().join("docs/gone.md")).unwrap();

        let plan = plan(&fx.config).unwrap();

        assert_eq!(
            plan.deletions,
            vec![PlannedDeletion {
                source: "docs/gone.md".into(),
                target: "docs/gone.md".into(),
                reason: DeleteReason::SourceMissing,
            }]
        );
    }

    // =========================================================================
    // Assets
    // =========================================================================

    #[test]
    fn referenced_assets_materialized() {
        let fx = Fixture::new();
        fx.write("assets/photo.png", "pixels");
        fx.write("docs/page.md", "![[photo.png|300]]\n");

        let report = run(&fx);

        assert_eq!(fx.read_site("docs/page.md"), "![](/assets/photo_w300.webp)\n");
        assert_eq!(report.assets_generated, 1);
        assert!(fx.site_file("static/assets/photo_w300.webp").exists());
    }

    #[test]
    fn shared_asset_survives_until_last_reference() {
        let fx = Fixture::new();
        fx.write("assets/photo.png", "pixels");
        let a = fx.write("docs/a.md", "![](photo.png)\n");
        let b = fx.write("docs/b.md", "![](photo.png)\n");
        run(&fx);
        let output = fx.site_file("static/assets/photo.webp");
        assert!(output.exists());

        fs::remove_file(a).unwrap();
        run(&fx);
        assert!(output.exists());

        fs::remove_file(b).unwrap();
        let report = run(&fx);
        assert!(!output.exists());
        assert_eq!(report.assets_removed, 1);
        let registry = AssetRegistry::load(&fx.config.state_path()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn dropped_size_variant_removed_on_edit() {
        let fx = Fixture::new();
        fx.write("assets/photo.png", "pixels");
        let page = fx.write("docs/page.md", "![[photo.png|300]]\n");
        run(&fx);
        assert!(fx.site_file("static/assets/photo_w300.webp").exists());

        fs::write(&page, "![[photo.png|500]]\n").unwrap();
        touch_future(&page);
        run(&fx);

        assert!(!fx.site_file("static/assets/photo_w300.webp").exists());
        assert!(fx.site_file("static/assets/photo_w500.webp").exists());
    }

    // =========================================================================
    // Sweep
    // =========================================================================

    #[test]
    fn sweep_removes_untracked_files() {
        let fx = Fixture::new();
        fx.write("docs/page.md", "x\n");
        run(&fx);
        crate::test_helpers::write_file(fx.site(), "docs/stray/old.md", b"stale");
        crate::test_helpers::write_file(fx.site(), "static/assets/junk.webp", b"stale");

        let report = run(&fx);

        assert_eq!(report.swept, 2);
        assert!(!fx.site_file("docs/stray").exists());
        assert!(fx.site_file("docs/page.md").exists());
    }

    #[test]
    fn sweep_keeps_blog_plugin_metadata() {
        let fx = Fixture::new();
        fx.write("blog/post__de.md", "x\n");
        run(&fx);
        crate::test_helpers::write_file(
            fx.site(),
            "i18n/de/docusaurus-plugin-content-blog/options.json",
            b"{}",
        );

        let report = run(&fx);

        assert_eq!(report.swept, 0);
        assert!(
            fx.site_file("i18n/de/docusaurus-plugin-content-blog/options.json")
                .exists()
        );
    }

    #[test]
    fn sweep_can_be_disabled() {
        let fx = Fixture::new();
        fx.write("docs/page.md", "x\n");
        run(&fx);
        crate::test_helpers::write_file(fx.site(), "docs/stray.md", b"stale");

        let report = sync_with_backend(
            &MockBackend::new(),
            &fx.config,
            &SyncOptions {
                orphan_sweep: Some(false),
            },
            None,
        )
        .unwrap();

        assert_eq!(report.swept, 0);
        assert!(fx.site_file("docs/stray.md").exists());
    }

    // =========================================================================
    // Target collisions
    // =========================================================================

    #[test]
    fn colliding_sources_produce_one_target() {
        let fx = Fixture::new();
        fx.write("docs/guide+/intro.md", "intro\n");
        let more = fx.write("docs/guide+/more.md", "more\n");

        let report = run(&fx);

        assert_eq!(report.converted, 1);
        assert_eq!(report.issues, 1);
        assert_eq!(fx.read_site("docs/guide.md"), "intro\n");

        fs::remove_file(more).unwrap();
        let report = run(&fx);

        assert_eq!(report.deleted, 0);
        assert_eq!(report.unchanged, 1);
        assert_eq!(fx.read_site("docs/guide.md"), "intro\n");
    }

    #[test]
    fn removed_owner_hands_target_to_next_source() {
        let fx = Fixture::new();
        let intro = fx.write("docs/guide+/intro.md", "intro\n");
        fx.write("docs/guide+/more.md", "more\n");
        run(&fx);
        fs::remove_file(intro).unwrap();

        let report = run(&fx);

        assert_eq!(report.deleted, 1);
        assert_eq!(report.converted, 1);
        assert_eq!(fx.read_site("docs/guide.md"), "more\n");
    }

    #[test]
    fn deletion_releases_entries_sharing_its_target() {
        let fx = Fixture::new();
        let intro = fx.write("docs/guide+/intro.md", "intro\n");
        run(&fx);
        fx.write("docs/guide+/more.md", "more\n");
        let state = fx.config.state_path();
        let mut manifest = Manifest::load(&state).unwrap();
        let mut shared = manifest.get("docs/guide+/intro.md").unwrap().clone();
        shared.source = "docs/guide+/more.md".into();
        shared.target_modified = Utc::now() + chrono::TimeDelta::hours(1);
        manifest.insert(shared);
        manifest.save(&state).unwrap();
        fs::remove_file(intro).unwrap();

        let planned = plan(&fx.config).unwrap();
        assert_eq!(planned.released, vec!["docs/guide+/more.md"]);
        assert_eq!(planned.conversions[0].source, "docs/guide+/more.md");

        run(&fx);
        assert_eq!(fx.read_site("docs/guide.md"), "more\n");
    }

    // =========================================================================
    // Failure isolation
    // =========================================================================

    #[test]
    fn failed_convert_leaves_no_entry() {
        let fx = Fixture::new();
        fx.write("docs/good.md", "good\n");
        fx.write("docs/bad.md", "bad\n");
        fs::create_dir_all(fx.site_file("docs/bad.md")).unwrap();

        let report = run(&fx);

        assert_eq!(report.failed, 1);
        assert_eq!(report.converted, 1);
        assert_eq!(fx.read_site("docs/good.md"), "good\n");
        let manifest = Manifest::load(&fx.config.state_path()).unwrap();
        assert!(manifest.get("docs/bad.md").is_none());
        assert!(manifest.get("docs/good.md").is_some());
    }

    #[test]
    fn failed_delete_keeps_entry() {
        let fx = Fixture::new();
        let source = fx.write("docs/page.md", "x\n");
        fx.write("docs/other.md", "y\n");
        run(&fx);
        fs::remove_file(fx.site_file("docs/page.md")).unwrap();
        crate::test_helpers::write_file(fx.site(), "docs/page.md/blocker", b"x");
        fs::remove_file(source).unwrap();

        let report = sync_with_backend(
            &MockBackend::new(),
            &fx.config,
            &SyncOptions {
                orphan_sweep: Some(false),
            },
            None,
        )
        .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.deleted, 0);
        assert_eq!(report.unchanged, 1);
        let manifest = Manifest::load(&fx.config.state_path()).unwrap();
        assert_eq!(manifest.get("docs/page.md").unwrap().target, "docs/page.md");
    }

    #[test]
    fn format_change_keeps_outputs_other_documents_link() {
        let mut fx = Fixture::new();
        fx.write("assets/photo.png", "pixels");
        let a = fx.write("docs/a.md", "![[photo.png]]\n");
        fx.write("docs/b.md", "![[photo.png]]\n");
        run(&fx);

        fx.config.image_format = "png".into();
        touch_future(&a);
        let report = run(&fx);

        assert_eq!(report.assets_removed, 0);
        assert_eq!(fx.read_site("docs/a.md"), "![](/assets/photo.png)\n");
        assert_eq!(fx.read_site("docs/b.md"), "![](/assets/photo.webp)\n");
        assert!(fx.site_file("static/assets/photo.webp").exists());
        assert!(fx.site_file("static/assets/photo.png").exists());
    }

    // =========================================================================
    // State and reset
    // =========================================================================

    #[test]
    fn corrupt_manifest_aborts_run() {
        let fx = Fixture::new();
        fx.write("docs/page.md", "x\n");
        crate::test_helpers::write_file(
            &fx.config.state_path(),
            crate::manifest::MANIFEST_FILENAME,
            b"not json",
        );

        let result = sync_with_backend(&MockBackend::new(), &fx.config, &SyncOptions::default(), None);

        assert!(matches!(result, Err(SyncError::CorruptState(_))));
        assert!(!fx.site_file("docs/page.md").exists());
    }

    #[test]
    fn reset_removes_everything_tracked() {
        let fx = Fixture::new();
        fx.write("assets/photo.png", "pixels");
        fx.write("docs/guide/page.md", "![](photo.png)\n");
        run(&fx);

        let report = reset(&fx.config, None).unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.assets_removed, 1);
        assert!(!fx.site_file("docs/guide").exists());
        assert!(!fx.site_file("static/assets/photo.webp").exists());
        assert!(Manifest::load(&fx.config.state_path()).unwrap().is_empty());
    }

    #[test]
    fn events_are_sent() {
        let fx = Fixture::new();
        fx.write("docs/page.md", "x\n");
        let (tx, rx) = std::sync::mpsc::channel();

        sync_with_backend(&MockBackend::new(), &fx.config, &SyncOptions::default(), Some(tx))
            .unwrap();

        let events: Vec<SyncEvent> = rx.iter().collect();
        assert!(events.contains(&SyncEvent::Converted {
            source: "docs/page.md".into(),
            target: "docs/page.md".into(),
            role: FileRole::Document,
        }));
    }

    #[test]
    fn report_display() {
        let report = SyncReport {
            converted: 2,
            copied: 1,
            deleted: 1,
            unchanged: 5,
            swept: 3,
            failed: 1,
            ..SyncReport::default()
        };
        assert_eq!(
            report.to_string(),
            "2 converted, 1 copied, 1 deleted, 5 unchanged, 3 swept, 1 failed"
        );
    }
}
