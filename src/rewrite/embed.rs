//! Embed normalization and asset registration.
//!
//! Two steps, applied to one line at a time:
//!
//! 1. [`normalize_embeds`] turns vault embeds (`![[photo one.png|300]]`)
//!    into standard image syntax (`![|300](photo-one.png)`). Note
//!    transclusions (`![[Other note]]`, `![[page.md]]`) are left alone.
//! 2. [`register_assets`] finds local image targets, records them in the
//!    [`AssetSink`], and points the line at the generated files.

use crate::assets::{AssetKind, AssetReference, AssetSink, SizeToken};
use crate::imaging::OutputFormat;
use crate::naming;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static WIKI_EMBED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[\[([^\]|]+)(?:\|([^\]]*))?\]\]").expect("static regex"));

static MARKDOWN_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("static regex"));

static LINE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[>\s]*").expect("static regex"));

/// Where generated assets are linked from and what raster format they use.
#[derive(Debug, Clone, Copy)]
pub struct EmbedContext<'a> {
    pub document: &'a str,
    pub site_asset_folder: &'a str,
    pub format: OutputFormat,
}

/// Whether an embed target names a note rather than a file.
fn is_note_target(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    if lower.ends_with(".excalidraw.md") || lower.ends_with(".excalidraw") {
        return false;
    }
    let file = lower.rsplit('/').next().unwrap_or_default();
    lower.ends_with(".md") || naming::split_extension(file).1.is_empty()
}

/// Rewrite `![[file|size]]` embeds of files into `![|size](file)`.
pub fn normalize_embeds(line: &str) -> String {
    if !line.contains("![[") {
        return line.to_string();
    }
    WIKI_EMBED
        .replace_all(line, |caps: &Captures| {
            let target = caps[1].trim();
            let target = target.split('#').next().unwrap_or(target);
            if is_note_target(target) {
                return caps[0].to_string();
            }
            let target = naming::slug_spaces(target);
            match caps.get(2).map(|m| m.as_str().trim()) {
                Some(size) if !size.is_empty() => format!("![|{size}]({target})"),
                _ => format!("![]({target})"),
            }
        })
        .into_owned()
}

/// Whether an image target points at a vault file.
pub fn is_local_target(target: &str) -> bool {
    !(target.contains("://")
        || target.starts_with('/')
        || target.starts_with('#')
        || target.starts_with("data:")
        || target.starts_with("mailto:"))
}

/// The file name part of an image target: last segment, no title, query or fragment.
fn target_file_name(raw: &str) -> &str {
    let path = raw.split(" \"").next().unwrap_or(raw).trim();
    let path = path.split(['#', '?']).next().unwrap_or(path);
    path.rsplit('/').next().unwrap_or(path)
}

/// Split `alt|size` alt text. The size part is whatever follows the last `|`.
fn split_alt(alt: &str) -> (&str, SizeToken) {
    match alt.rsplit_once('|') {
        Some((text, size)) => (text.trim(), SizeToken::parse(size)),
        None => (alt, SizeToken::Standard),
    }
}

/// Register every local asset on the line and return the rewritten line(s).
///
/// Vector images and diagrams become a dark line followed by a light line;
/// the light line repeats the original quote/indent prefix so it stays in
/// the same block.
pub fn register_assets(line: &str, ctx: &EmbedContext, sink: &mut dyn AssetSink) -> Vec<String> {
    if !line.contains("![") {
        return vec![line.to_string()];
    }

    let mut light_images: Vec<String> = Vec::new();
    let rewritten = MARKDOWN_IMAGE.replace_all(line, |caps: &Captures| {
        let raw_target = caps[2].trim();
        if !is_local_target(raw_target) {
            return caps[0].to_string();
        }
        let file_name = naming::slug_spaces(target_file_name(raw_target));
        let (_, extension) = crate::assets::split_asset_name(&file_name);
        if extension.is_empty() || extension.eq_ignore_ascii_case("md") {
            return caps[0].to_string();
        }

        let (alt, size) = split_alt(&caps[1]);
        let reference = AssetReference::new(&file_name, size, ctx.document, ctx.format);
        let url = |name: &str| format!("/{}/{}", ctx.site_asset_folder, name);
        let replacement = match reference.kind {
            AssetKind::Raster | AssetKind::Animated => {
                format!("![{alt}]({})", url(&reference.outputs[0]))
            }
            AssetKind::Vector | AssetKind::Diagram => {
                light_images.push(format!("![{alt}]({}#light)", url(&reference.outputs[1])));
                format!("![{alt}]({}#dark)", url(&reference.outputs[0]))
            }
            AssetKind::Download => {
                let name = &reference.outputs[0];
                format!("[Download {name}]({})", url(name))
            }
        };
        sink.register(reference);
        replacement
    });

    let mut lines = vec![rewritten.into_owned()];
    if !light_images.is_empty() {
        let prefix = LINE_PREFIX.find(line).map(|m| m.as_str()).unwrap_or_default();
        lines.push(format!("{prefix}{}", light_images.join(" ")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EmbedContext<'static> {
        EmbedContext {
            document: "docs/page.md",
            site_asset_folder: "assets",
            format: OutputFormat::WebP,
        }
    }

    fn register(line: &str) -> (Vec<String>, Vec<AssetReference>) {
        let mut sink: Vec<AssetReference> = Vec::new();
        let lines = register_assets(line, &ctx(), &mut sink);
        (lines, sink)
    }

    // =========================================================================
    // normalize_embeds
    // =========================================================================

    #[test]
    fn wiki_embed_becomes_image() {
        assert_eq!(normalize_embeds("![[photo.png]]"), "![](photo.png)");
    }

    #[test]
    fn wiki_embed_keeps_size() {
        assert_eq!(normalize_embeds("![[photo.png|300]]"), "![|300](photo.png)");
    }

    #[test]
    fn wiki_embed_slugs_spaces() {
        assert_eq!(
            normalize_embeds("see ![[photo one%20two.png]] here"),
            "see ![](photo-one-two.png) here"
        );
    }

    #[test]
    fn note_transclusions_untouched() {
        assert_eq!(normalize_embeds("![[Other note]]"), "![[Other note]]");
        assert_eq!(normalize_embeds("![[page.md#Part]]"), "![[page.md#Part]]");
    }

    #[test]
    fn diagram_embed_is_an_asset() {
        assert_eq!(
            normalize_embeds("![[flow.excalidraw]]"),
            "![](flow.excalidraw)"
        );
    }

    // =========================================================================
    // register_assets
    // =========================================================================

    #[test]
    fn raster_points_at_generated_file() {
        let (lines, refs) = register("![Photo|300](../assets/photo.png)");
        assert_eq!(lines, vec!["![Photo](/assets/photo_w300.webp)"]);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].size, SizeToken::Width(300));
        assert_eq!(refs[0].document, "docs/page.md");
    }

    #[test]
    fn percent_encoded_spaces_become_hyphens() {
        let (lines, refs) = register("![](my%20photo.jpg)");
        assert_eq!(lines, vec!["![](/assets/my-photo.webp)"]);
        assert_eq!(refs[0].key, "my-photo.jpg");
    }

    #[test]
    fn gif_keeps_extension_with_size_suffix() {
        let (lines, _) = register("![|200](spin.gif)");
        assert_eq!(lines, vec!["![](/assets/spin_w200.gif)"]);
    }

    #[test]
    fn svg_expands_to_dark_then_light() {
        let (lines, refs) = register("> ![chart](chart.svg)");
        assert_eq!(
            lines,
            vec![
                "> ![chart](/assets/chart.dark.svg#dark)",
                "> ![chart](/assets/chart.light.svg#light)",
            ]
        );
        assert_eq!(refs[0].kind, AssetKind::Vector);
    }

    #[test]
    fn diagram_expands_to_theme_pair() {
        let (lines, _) = register("![](flow.excalidraw)");
        assert_eq!(
            lines,
            vec![
                "![](/assets/flow.excalidraw.dark.svg#dark)",
                "![](/assets/flow.excalidraw.light.svg#light)",
            ]
        );
    }

    #[test]
    fn other_files_become_download_links() {
        let (lines, refs) = register("![](report.pdf)");
        assert_eq!(lines, vec!["[Download report.pdf](/assets/report.pdf)"]);
        assert_eq!(refs[0].kind, AssetKind::Download);
    }

    #[test]
    fn remote_and_absolute_images_untouched() {
        for line in [
            "![x](https://example.com/a.png)",
            "![x](/img/a.png)",
            "![x](data:image/png;base64,AAAA)",
        ] {
            let (lines, refs) = register(line);
            assert_eq!(lines, vec![line.to_string()]);
            assert!(refs.is_empty());
        }
    }

    #[test]
    fn image_title_is_ignored_for_lookup() {
        let (_, refs) = register(r#"![a](photo.png "A title")"#);
        assert_eq!(refs[0].file_name, "photo.png");
    }

    #[test]
    fn two_images_on_one_line() {
        let (lines, refs) = register("![](a.png) and ![](b.png)");
        assert_eq!(lines, vec!["![](/assets/a.webp) and ![](/assets/b.webp)"]);
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn plain_lines_pass_through() {
        let (lines, refs) = register("Just text with [a link](x.md).");
        assert_eq!(lines, vec!["Just text with [a link](x.md)."]);
        assert!(refs.is_empty());
    }
}
