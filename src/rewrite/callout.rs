//! Callout and quote blocks.
//!
//! A vault callout is a block quote whose first line carries a bracketed
//! type tag; the site wants a fenced admonition instead:
//!
//! ```text
//! > [!warning] Mind the gap        :::warning Mind the gap
//! > Trains are fast.          →    Trains are fast.
//!                                  :::
//! ```
//!
//! The `[!quote]` type is special: its marker line disappears, the body
//! passes through as a plain block quote, and the title becomes an
//! attribution line when the block ends.
//!
//! State spans lines, so the machine is fed one line at a time and must see
//! the whole document in order. Blocks do not nest: a marker inside an open
//! block is treated as ordinary body text.

use regex::Regex;
use std::sync::LazyLock;

static CALLOUT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*>[>\s]*)\[!([^\]]+)\]([+-]?)(?:\s+(.*))?$").expect("static regex")
});

/// Reserved callout type that renders as a plain quote with attribution.
const QUOTE_TYPE: &str = "quote";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    InCallout,
    InQuote,
}

/// The marker that opened the current block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMarker {
    pub kind: String,
    pub title: Option<String>,
    /// Characters before the `[` of the marker; stripped from body lines.
    pub offset: usize,
}

#[derive(Debug)]
pub struct CalloutState<'a> {
    callout_types: &'a [String],
    mode: Mode,
    pending: Option<PendingMarker>,
}

fn parse_marker(line: &str) -> Option<PendingMarker> {
    let caps = CALLOUT_MARKER.captures(line)?;
    let title = caps
        .get(4)
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty());
    Some(PendingMarker {
        kind: caps[2].trim().to_ascii_lowercase(),
        title,
        offset: caps[1].chars().count(),
    })
}

/// Strip up to `offset` leading `>` and whitespace characters.
fn dedent(line: &str, offset: usize) -> &str {
    let mut cut = 0;
    for (taken, (idx, c)) in line.char_indices().enumerate() {
        if taken >= offset || !(c == '>' || c.is_whitespace()) {
            break;
        }
        cut = idx + c.len_utf8();
    }
    &line[cut..]
}

impl<'a> CalloutState<'a> {
    /// `callout_types` lists the types rewritten to admonitions; others pass through.
    pub fn new(callout_types: &'a [String]) -> Self {
        Self {
            callout_types,
            mode: Mode::Normal,
            pending: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pending(&self) -> Option<&PendingMarker> {
        self.pending.as_ref()
    }

    fn is_supported(&self, kind: &str) -> bool {
        self.callout_types.iter().any(|t| t.eq_ignore_ascii_case(kind))
    }

    /// Process one line, appending zero or more output lines.
    pub fn feed(&mut self, line: &str, out: &mut Vec<String>) {
        match self.mode {
            Mode::Normal => self.feed_normal(line, out),
            Mode::InCallout => {
                if line.trim().is_empty() {
                    out.push(":::".to_string());
                    out.push(line.to_string());
                    self.reset();
                } else {
                    let offset = self.pending.as_ref().map_or(0, |p| p.offset);
                    out.push(dedent(line, offset).to_string());
                }
            }
            Mode::InQuote => {
                if line.trim().is_empty() {
                    self.push_attribution(out);
                    out.push(line.to_string());
                    self.reset();
                } else {
                    out.push(line.to_string());
                }
            }
        }
    }

    fn feed_normal(&mut self, line: &str, out: &mut Vec<String>) {
        let Some(marker) = parse_marker(line) else {
            out.push(line.to_string());
            return;
        };
        if marker.kind == QUOTE_TYPE {
            self.mode = Mode::InQuote;
            self.pending = Some(marker);
        } else if self.is_supported(&marker.kind) {
            match &marker.title {
                Some(title) => out.push(format!(":::{} {title}", marker.kind)),
                None => out.push(format!(":::{}", marker.kind)),
            }
            self.mode = Mode::InCallout;
            self.pending = Some(marker);
        } else {
            out.push(line.to_string());
        }
    }

    fn push_attribution(&self, out: &mut Vec<String>) {
        if let Some(title) = self.pending.as_ref().and_then(|p| p.title.as_deref()) {
            out.push(">".to_string());
            out.push(format!("> — {title}"));
        }
    }

    fn reset(&mut self) {
        self.mode = Mode::Normal;
        self.pending = None;
    }

    /// Close whatever block is still open at end of document.
    pub fn finish(mut self, out: &mut Vec<String>) {
        match self.mode {
            Mode::Normal => {}
            Mode::InCallout => out.push(":::".to_string()),
            Mode::InQuote => self.push_attribution(out),
        }
        self.reset();
    }
}
