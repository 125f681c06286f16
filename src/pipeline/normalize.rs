//! Cleanup of raw glyph-run text.
//!
//! PDF text objects carry artefacts that never belong in reconstructed
//! reading text: CR/LF pairs inside a single run, zero-width spaces and
//! BOMs left by producers, soft hyphens, and runs of layout whitespace.
//!
//! Rules (applied in order):
//! 1. Normalise line endings and turn them into spaces (a run is one line)
//! 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
//! 3. Collapse whitespace runs into a single space
//! 4. Trim both ends

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to one glyph run's text.
pub fn clean_run_text(input: &str) -> String {
    let s = flatten_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = collapse_whitespace(&s);
    s.trim().to_string()
}

// ── Rule 1: Line endings ─────────────────────────────────────────────────

fn flatten_line_endings(input: &str) -> String {
    input.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

// ── Rule 2: Invisible Unicode ────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Whitespace runs ──────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").to_string()
}
