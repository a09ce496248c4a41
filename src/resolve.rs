//! Source → target path resolution.
//!
//! A pure function of a [`SourceFile`]'s folder and name metadata plus the
//! configuration. No filesystem access happens here, so the sync engine can
//! compare resolved paths across runs and get the same answer every time.
//!
//! ## Placement rules
//!
//! | Kind | Main language | Other language |
//! |---|---|---|
//! | docs | `<folder>/…` | `i18n/<lang>/docusaurus-plugin-content-docs/current/…` |
//! | blog | `<folder>/…` | `i18n/<lang>/docusaurus-plugin-content-blog/…` |
//! | blogMulti | `<id>/…` | `i18n/<lang>/docusaurus-plugin-content-blog-<id>/…` |
//! | assets | `static/<site_asset_folder>/…` | same |
//!
//! For secondary languages the top-level vault folder is implicit in the
//! locale subtree and is dropped. Afterwards:
//!
//! 1. A file whose parent folder ends in `+` collapses into that folder:
//!    `docs/10-guide+/01-intro.md` → `docs/guide.md`.
//! 2. The `__<lang>` token is removed from the file name.
//! 3. `name.yml.md` becomes `name.yml`.

use crate::config::SyncConfig;
use crate::naming::{self, blog_plugin_id};
use crate::types::{ContentKind, SourceFile, TargetPath};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("cannot resolve {path}: missing {property}")]
    MissingProperty {
        path: String,
        property: &'static str,
    },
}

/// Base directory for a file's kind and language, relative to the site root.
pub fn base_path(kind: ContentKind, main_folder: &str, language: &str, config: &SyncConfig) -> String {
    let is_main = language == config.main_language;
    match kind {
        ContentKind::Assets => format!("static/{}", config.site_asset_folder),
        _ if is_main => String::new(),
        ContentKind::Docs => format!("i18n/{language}/docusaurus-plugin-content-docs/current"),
        ContentKind::Blog => format!("i18n/{language}/docusaurus-plugin-content-blog"),
        ContentKind::BlogMulti => format!(
            "i18n/{language}/docusaurus-plugin-content-blog-{}",
            blog_plugin_id(main_folder)
        ),
    }
}

/// Resolve the site-relative target path of a source file.
pub fn resolve_target_path(source: &SourceFile, config: &SyncConfig) -> Result<String, ResolveError> {
    let missing = |property| ResolveError::MissingProperty {
        path: source.relative_path.clone(),
        property,
    };
    if source.main_folder.is_empty() {
        return Err(missing("main folder"));
    }
    if source.language.is_empty() {
        return Err(missing("language"));
    }
    let mut segments: Vec<String> = source
        .relative_path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if segments.len() < 2 {
        return Err(missing("file name below the main folder"));
    }

    let is_main = source.language == config.main_language;
    match source.kind {
        ContentKind::Assets => {
            segments.remove(0);
        }
        _ if !is_main => {
            segments.remove(0);
        }
        ContentKind::BlogMulti => {
            segments[0] = blog_plugin_id(&source.main_folder).to_string();
        }
        ContentKind::Docs | ContentKind::Blog => {}
    }

    let Some(file_segment) = segments.pop() else {
        return Err(missing("file name"));
    };
    let file_segment = naming::strip_language_token(&file_segment, &source.language);

    if source.kind != ContentKind::Assets
        && source.parent_folder != source.main_folder
        && naming::is_group_folder(&source.parent_folder)
        && let Some(group) = segments.last_mut()
    {
        let extension = if file_segment.ends_with(".yml.md") {
            ".yml.md".to_string()
        } else if source.extension.is_empty() {
            String::new()
        } else {
            format!(".{}", source.extension)
        };
        *group = format!("{}{}", naming::group_display_name(group), extension);
    } else {
        segments.push(file_segment);
    }

    if let Some(last) = segments.last_mut()
        && let Some(stem) = last.strip_suffix(".yml.md")
    {
        *last = format!("{stem}.yml");
    }

    let base = base_path(source.kind, &source.main_folder, &source.language, config);
    let tail = segments.join("/");
    Ok(if base.is_empty() {
        tail
    } else {
        format!("{base}/{tail}")
    })
}

/// Resolve and anchor under the site root.
pub fn resolve_target(source: &SourceFile, config: &SyncConfig) -> Result<TargetPath, ResolveError> {
    let relative = resolve_target_path(source, config)?;
    Ok(TargetPath {
        absolute: site_join(&config.site_path, &relative),
        relative,
    })
}

/// Join a forward-slash relative path onto a native root.
pub fn site_join(root: &Path, relative: &str) -> std::path::PathBuf {
    relative
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, seg| acc.join(seg))
}
