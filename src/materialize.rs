//! Asset materialization: produce the files the registry promises.
//!
//! Runs after the manifest and registry are saved. For every variant with at
//! least one missing output file, the source is located in the vault and the
//! outputs are generated into `static/<site_asset_folder>/`:
//!
//! | Kind | Work |
//! |---|---|
//! | Raster | identify, compute size, resize + encode via the [`ImageBackend`] |
//! | Animated | `standard` is copied verbatim; other sizes are resized to GIF |
//! | Vector | light copy verbatim, dark copy with black/white swapped |
//! | Diagram | copy the pre-rendered `.excalidraw.light.svg` / `.dark.svg` companions |
//! | Download | copied verbatim |
//!
//! Variants are independent, so they are processed in parallel with rayon.
//! A failing variant is reported and skipped; the next run retries it since
//! its outputs are still missing.

use crate::assets::{AssetKind, AssetRecord, AssetRegistry, SizeToken, SizeVariant};
use crate::config::SyncConfig;
use crate::imaging::{
    BackendError, ImageBackend, OutputFormat, Quality, ResizeParams, calculate_variant_dimensions,
};
use crate::naming;
use crate::scan::ScanResult;
use crate::state::{self, StateError};
use crate::types::ContentKind;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Dark-theme color substitutions for vector images.
const DARK_SWAPS: &[(&str, &str)] = &[
    ("rgb(0, 0, 0)", "#c9d1d9"),
    ("rgb(255, 255, 255)", "#0d1117"),
];

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("source file not found in vault: {0}")]
    SourceNotFound(String),
    #[error("pre-rendered diagram not found: {0}")]
    MissingCompanion(String),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("image processing failed for {name}: {source}")]
    Backend { name: String, source: BackendError },
    #[error("failed to write output: {0}")]
    Write(#[source] StateError),
}

impl MaterializeError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Vault files by slugged, lowercased file name.
///
/// Embeds name files without a folder, so lookup is by name only. Files in
/// the vault attachment folder win over same-named files elsewhere.
#[derive(Debug, Default)]
pub struct AssetIndex {
    files: HashMap<String, PathBuf>,
}

impl AssetIndex {
    pub fn build(scan: &ScanResult) -> Self {
        let mut files = HashMap::new();
        for file in scan.files() {
            let key = naming::slug_spaces(&file.file_name).to_lowercase();
            if file.kind == ContentKind::Assets || !files.contains_key(&key) {
                files.insert(key, file.source_path.clone());
            }
        }
        Self { files }
    }

    pub fn find(&self, file_name: &str) -> Option<&Path> {
        self.files
            .get(&naming::slug_spaces(file_name).to_lowercase())
            .map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct MaterializeReport {
    /// Output file names written this run.
    pub generated: Vec<String>,
    /// Asset file name and error for each variant that could not be produced.
    pub failed: Vec<(String, MaterializeError)>,
}

/// Variants with at least one output missing from `asset_dir`.
pub fn pending_variants<'a>(
    registry: &'a AssetRegistry,
    asset_dir: &Path,
) -> Vec<(&'a AssetRecord, &'a SizeVariant)> {
    registry
        .assets
        .values()
        .flat_map(|record| record.variants.iter().map(move |v| (record, v)))
        .filter(|(_, variant)| variant.outputs.iter().any(|o| !asset_dir.join(o).exists()))
        .collect()
}

/// Generate every missing output in the registry.
pub fn materialize(
    registry: &AssetRegistry,
    index: &AssetIndex,
    config: &SyncConfig,
    backend: &impl ImageBackend,
) -> MaterializeReport {
    let asset_dir = config.asset_output_dir();
    let pending = pending_variants(registry, &asset_dir);
    debug!(count = pending.len(), "materializing asset variants");

    let results: Vec<_> = pending
        .into_par_iter()
        .map(|(record, variant)| {
            let result = materialize_variant(record, variant, index, config, backend, &asset_dir);
            (record.file_name.clone(), result)
        })
        .collect();

    let mut report = MaterializeReport::default();
    for (name, result) in results {
        match result {
            Ok(written) => report.generated.extend(written),
            Err(e) => {
                warn!(asset = %name, error = %e, "asset not materialized");
                report.failed.push((name, e));
            }
        }
    }
    report
}

fn materialize_variant(
    record: &AssetRecord,
    variant: &SizeVariant,
    index: &AssetIndex,
    config: &SyncConfig,
    backend: &impl ImageBackend,
    asset_dir: &Path,
) -> Result<Vec<String>, MaterializeError> {
    fs::create_dir_all(asset_dir).map_err(|e| MaterializeError::io(asset_dir, e))?;
    let source = || {
        index
            .find(&record.file_name)
            .ok_or_else(|| MaterializeError::SourceNotFound(record.file_name.clone()))
    };
    let output = |i: usize| asset_dir.join(&variant.outputs[i]);

    match record.kind {
        AssetKind::Raster => {
            let format = encoded_format(&variant.outputs[0]).unwrap_or(config.output_format());
            let bytes = resize(source()?, &variant.size, format, config, backend)?;
            write(&output(0), &bytes)?;
        }
        AssetKind::Animated if variant.size == SizeToken::Standard => {
            copy(source()?, &output(0))?;
        }
        AssetKind::Animated => {
            let bytes = resize(source()?, &variant.size, OutputFormat::Gif, config, backend)?;
            write(&output(0), &bytes)?;
        }
        AssetKind::Vector => {
            let path = source()?;
            let light = fs::read_to_string(path).map_err(|e| MaterializeError::io(path, e))?;
            write(&output(0), dark_svg(&light).as_bytes())?;
            write(&output(1), light.as_bytes())?;
        }
        AssetKind::Diagram => {
            for name in &variant.outputs {
                let companion = index
                    .find(name)
                    .ok_or_else(|| MaterializeError::MissingCompanion(name.clone()))?;
                copy(companion, &asset_dir.join(name))?;
            }
        }
        AssetKind::Download => copy(source()?, &output(0))?,
    }
    debug!(asset = %record.file_name, size = %variant.size, "materialized");
    Ok(variant.outputs.clone())
}

fn resize(
    source: &Path,
    size: &SizeToken,
    format: OutputFormat,
    config: &SyncConfig,
    backend: &impl ImageBackend,
) -> Result<Vec<u8>, MaterializeError> {
    let name = source.display().to_string();
    let backend_err = |e| MaterializeError::Backend {
        name: name.clone(),
        source: e,
    };
    let bytes = fs::read(source).map_err(|e| MaterializeError::io(source, e))?;
    let dims = backend.identify(&bytes).map_err(backend_err)?;
    let (width, height) = calculate_variant_dimensions(
        (dims.width, dims.height),
        size,
        config.image_max_width,
        &config.named_sizes,
    );
    let params = ResizeParams {
        width,
        height,
        format,
        quality: Quality::new(config.image_quality),
    };
    backend.resize(&bytes, &params).map_err(backend_err)
}

/// Format named by an output file's extension. Variants registered under an
/// earlier `image_format` keep encoding to the format their name promises.
fn encoded_format(output: &str) -> Option<OutputFormat> {
    Path::new(output)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(OutputFormat::from_name)
}

/// Dark-theme variant of an SVG document.
pub fn dark_svg(svg: &str) -> String {
    DARK_SWAPS
        .iter()
        .fold(svg.to_string(), |acc, (from, to)| acc.replace(from, to))
}

fn copy(from: &Path, to: &Path) -> Result<(), MaterializeError> {
    let bytes = fs::read(from).map_err(|e| MaterializeError::io(from, e))?;
    write(to, &bytes)
}

/// Outputs count as done once they exist, so they only appear complete.
fn write(path: &Path, bytes: &[u8]) -> Result<(), MaterializeError> {
    state::write_atomic(path, bytes).map_err(MaterializeError::Write)
}

/// Delete generated files by name. Returns the names actually removed;
/// files already gone are not an error.
pub fn remove_outputs(asset_dir: &Path, names: &[String]) -> Vec<String> {
    let mut removed = Vec::new();
    for name in names {
        let path = asset_dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => removed.push(name.clone()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove asset output"),
        }
    }
    removed
}
