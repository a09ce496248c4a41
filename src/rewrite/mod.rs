//! Markdown rewriting: vault syntax in, site syntax out.
//!
//! A document is rewritten in a single forward pass over its lines. Each
//! line goes through four stages in order:
//!
//! | Stage | Module | Effect |
//! |---|---|---|
//! | 1. Embeds | [`embed::normalize_embeds`] | `![[file\|300]]` → `![\|300](file)` |
//! | 2. Assets | [`embed::register_assets`] | record the reference, point at generated files |
//! | 3. Links | [`link::rewrite_links`] | `[x](../docs/a.md)` → `[x](/docs/a)` |
//! | 4. Callouts | [`callout::CalloutState`] | `> [!note]` blocks → `:::note` fences |
//!
//! Stage 2 may split a line in two (theme pairs); stages 3 and 4 see each
//! resulting line. Anything not recognized passes through unchanged; the
//! rewriter never fails.

pub mod callout;
pub mod embed;
pub mod link;

use crate::assets::AssetSink;
use crate::config::SyncConfig;
use callout::CalloutState;
use embed::EmbedContext;

/// Rewrite one document.
///
/// `document` is the vault-relative path used to key asset references. The
/// trailing newline of `text`, if any, is preserved.
pub fn rewrite_document(
    text: &str,
    document: &str,
    config: &SyncConfig,
    sink: &mut dyn AssetSink,
) -> String {
    let ctx = EmbedContext {
        document,
        site_asset_folder: &config.site_asset_folder,
        format: config.output_format(),
    };
    let mut state = CalloutState::new(&config.callout_types);
    let mut out: Vec<String> = Vec::new();

    for line in text.lines() {
        let normalized = embed::normalize_embeds(line);
        for expanded in embed::register_assets(&normalized, &ctx, sink) {
            let linked = link::rewrite_links(&expanded);
            state.feed(&linked, &mut out);
        }
    }
    state.finish(&mut out);

    let mut result = out.join("\n");
    if text.ends_with('\n') {
        result.push('\n');
    }
    result
}
