//! Import pipeline stages: PDF bytes → extracted pages.
//!
//! Each submodule implements one step and is testable on its own. The
//! engine sits behind [`backend::PdfBackend`] so everything above it runs
//! against in-memory documents in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdfium ──▶ normalize ──▶ lines ──▶ (scanned?) ──▶ encode
//! (magic)   (engine)   (run text)    (reading   (density)     (PNG data URL)
//!                                     order)
//! ```
//!
//! 1. [`input`]     — read a file and check the `%PDF` signature
//! 2. [`pdfium`]    — open the document, report geometry, glyph runs and
//!    rasterised pages; called from `spawn_blocking`
//! 3. [`normalize`] — strip invisible characters and flatten whitespace in
//!    each glyph run
//! 4. [`lines`]     — reading-order sort and line grouping into page text
//! 5. [`encode`]    — PNG-encode rasterised pages as `data:` URLs
//!
//! [`metadata`] maps the information dictionary, including PDF dates.

pub mod backend;
pub mod encode;
pub mod input;
pub mod lines;
pub mod metadata;
pub mod normalize;
pub mod pdfium;
