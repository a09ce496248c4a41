//! Internal link rewriting.
//!
//! Relative links between vault documents (`[Setup](../10-guide+/01-setup__de.md#First%20Steps)`)
//! become site-root URLs (`/docs/guide#first-steps`). Only targets naming a
//! `.md` file are touched; everything else passes through.

use crate::naming;
use regex::Regex;
use std::sync::LazyLock;

static INLINE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)\s]+)\)").expect("static regex"));

static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("static regex"));

/// Rewrite every non-image inline link on the line.
pub fn rewrite_links(line: &str) -> String {
    if !line.contains("](") {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for caps in INLINE_LINK.captures_iter(line) {
        let (Some(whole), Some(target)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if line[..whole.start()].ends_with('!') {
            continue;
        }
        if let Some(url) = rewrite_link_target(target.as_str()) {
            out.push_str(&line[last..target.start()]);
            out.push_str(&url);
            last = target.end();
        }
    }
    out.push_str(&line[last..]);
    out
}

/// Map one relative document link to its site URL.
///
/// Returns `None` for external, absolute, fragment-only and non-document targets.
pub fn rewrite_link_target(target: &str) -> Option<String> {
    if target.starts_with('/') || target.starts_with('#') || URL_SCHEME.is_match(target) {
        return None;
    }
    let (path, fragment) = match target.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (target, None),
    };
    let path = naming::slug_spaces(path);
    if !path.to_ascii_lowercase().ends_with(".md") {
        return None;
    }

    let mut segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(str::to_string)
        .collect();
    let last = segments.pop()?;
    let stem = &last[..last.len() - 3];
    let stem = match naming::detect_language(stem) {
        Some(lang) => naming::strip_language_token(stem, &lang),
        None => stem.to_string(),
    };
    segments.push(stem);

    let is_blog = segments.first().is_some_and(|s| s.contains("blog"));
    if is_blog {
        segments[0] = naming::blog_plugin_id(&segments[0]).to_string();
    }

    if segments.len() >= 2 && naming::is_group_folder(&segments[segments.len() - 2]) {
        segments.pop();
        if let Some(parent) = segments.last_mut() {
            *parent = parent.trim_end_matches(naming::GROUP_MARKER).to_string();
        }
    }

    if is_blog {
        if segments.len() > 1
            && let Some(slug) = segments.last_mut()
        {
            *slug = naming::blog_date_path(slug);
        }
    } else {
        for segment in segments.iter_mut() {
            *segment = naming::strip_number_prefix(segment);
        }
    }

    let mut url = format!("/{}", segments.join("/"));
    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
        url.push('#');
        url.push_str(&naming::slug_spaces(&fragment.to_lowercase()));
    }
    Some(url)
}
