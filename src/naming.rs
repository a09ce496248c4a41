//! Centralized filename conventions shared by the scanner, resolver and rewriter.
//!
//! Vault authors encode placement hints directly in file and folder names:
//!
//! | Convention | Example | Meaning |
//! |---|---|---|
//! | Language suffix | `note__de.md` | document is the `de` translation of `note.md` |
//! | Ordering prefix | `10-guide`, `01. intro` | sort order inside the vault, dropped from URLs |
//! | Group marker | `guide+/` | folder collapses into a single page in the site |
//! | Multi-blog suffix | `news__blog/` | folder is its own blog plugin instance |
//! | Blog date slug | `2024-03-01-launch` | post URL becomes `2024/03/01/launch` |
//!
//! Everything here is a pure string function so the rules can be tested
//! without touching the filesystem.

use regex::Regex;
use std::sync::LazyLock;

/// Separator between a file stem and its language code (`note__de.md`).
pub const LANGUAGE_SEPARATOR: &str = "__";

/// Trailing folder marker that elides the folder from target paths.
pub const GROUP_MARKER: char = '+';

/// Top-level folder suffix that marks a separate blog plugin instance.
pub const BLOG_MULTI_SUFFIX: &str = "__blog";

static ORDERING_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[.\-)\s]*\s*").expect("static regex"));

static BLOG_DATE_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})-(.+)$").expect("static regex"));

/// Result of parsing an entry name like `10-guide` or `01. Intro`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// Ordering prefix if present (e.g., `10` from `10-guide`)
    pub number: Option<u32>,
    /// Name with the ordering prefix removed. Equal to the input when the
    /// prefix would consume the whole name.
    pub name: String,
}

/// Parse an entry name following the `NN-name` ordering convention.
///
/// - `"10-guide"` → number=Some(10), name="guide"
/// - `"01. Intro"` → number=Some(1), name="Intro"
/// - `"3) setup"` → number=Some(3), name="setup"
/// - `"2024"` → number=None, name="2024" (nothing left to name)
/// - `"guide"` → number=None, name="guide"
pub fn parse_entry_name(name: &str) -> ParsedName {
    if let Some(caps) = ORDERING_PREFIX.captures(name) {
        let rest = &name[caps[0].len()..];
        if !rest.is_empty() {
            return ParsedName {
                number: caps[1].parse().ok(),
                name: rest.to_string(),
            };
        }
    }
    ParsedName {
        number: None,
        name: name.to_string(),
    }
}

/// Strip an ordering prefix, keeping the rest of the name.
pub fn strip_number_prefix(name: &str) -> String {
    parse_entry_name(name).name
}

/// Find a `__<lang>` token in a file name and return the lowercased code.
///
/// The code must be exactly two ASCII letters, followed by a dot or the end
/// of the name, with something in front of the separator. The rightmost
/// match wins.
///
/// - `"note__de.md"` → `Some("de")`
/// - `"meta__fr.yml.md"` → `Some("fr")`
/// - `"note.md"` → `None`
/// - `"news__blog"` → `None`
pub fn detect_language(file_name: &str) -> Option<String> {
    language_token_at(file_name).map(|(pos, _)| {
        let start = pos + LANGUAGE_SEPARATOR.len();
        file_name[start..start + 2].to_ascii_lowercase()
    })
}

/// Byte range of the rightmost valid language token, separator included.
fn language_token_at(name: &str) -> Option<(usize, usize)> {
    name.rmatch_indices(LANGUAGE_SEPARATOR).find_map(|(pos, _)| {
        let start = pos + LANGUAGE_SEPARATOR.len();
        let code = name.get(start..start + 2)?;
        let after = &name[start + 2..];
        let valid = pos > 0
            && code.chars().all(|c| c.is_ascii_alphabetic())
            && (after.is_empty() || after.starts_with('.'));
        valid.then_some((pos, start + 2))
    })
}

/// Remove the `__<lang>` token for the given language from a path segment.
///
/// `"intro__de.md"` with `"de"` → `"intro.md"`. Tokens for other languages
/// are left alone.
pub fn strip_language_token(segment: &str, language: &str) -> String {
    match language_token_at(segment) {
        Some((start, end))
            if segment[start + LANGUAGE_SEPARATOR.len()..end].eq_ignore_ascii_case(language) =>
        {
            format!("{}{}", &segment[..start], &segment[end..])
        }
        _ => segment.to_string(),
    }
}

/// Whether a folder name carries the group marker.
pub fn is_group_folder(name: &str) -> bool {
    name.ends_with(GROUP_MARKER)
}

/// Strip the group marker and ordering prefix from a group folder name.
///
/// `"10-guide+"` → `"guide"`.
pub fn group_display_name(name: &str) -> String {
    strip_number_prefix(name.trim_end_matches(GROUP_MARKER))
}

/// Plugin id of a multi-blog folder: the folder name without `__blog`.
pub fn blog_plugin_id(folder: &str) -> &str {
    folder.strip_suffix(BLOG_MULTI_SUFFIX).unwrap_or(folder)
}

/// Replace encoded and literal spaces with hyphens.
pub fn slug_spaces(name: &str) -> String {
    name.replace("%20", "-").replace(' ', "-")
}

/// Turn a dated blog slug into the date-path URL shape.
///
/// `"2024-03-01-launch"` → `"2024/03/01/launch"`. Other names are unchanged.
pub fn blog_date_path(segment: &str) -> String {
    match BLOG_DATE_SLUG.captures(segment) {
        Some(caps) => format!("{}/{}/{}/{}", &caps[1], &caps[2], &caps[3], &caps[4]),
        None => segment.to_string(),
    }
}

/// Split a file name into `(stem, extension)` at the last dot.
///
/// A leading dot does not start an extension. Names without a dot have an
/// empty extension.
pub fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], &file_name[pos + 1..]),
        _ => (file_name, ""),
    }
}
