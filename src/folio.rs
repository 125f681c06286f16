//! FolioCreator: extracted pages → folios.
//!
//! One folio per page, orientation copied verbatim. Text pages become one
//! paragraph block per reconstructed line. Scanned pages follow
//! [`ScannedPageMode`]: embed the raster, insert a notice, or drop the page.

use crate::config::{FolioOptions, ScannedPageMode};
use crate::model::{Block, ExtractedPage, Folio, FolioSummary, Orientation, Slot};
use std::fmt::Write as _;
use tracing::debug;
use uuid::Uuid;

/// Build folios from extracted pages.
///
/// Folio `index` is the position in the returned list, so it stays
/// contiguous when scanned pages are skipped.
pub fn create_folios(pages: &[ExtractedPage], options: &FolioOptions) -> Vec<Folio> {
    let mut folios = Vec::with_capacity(pages.len());

    for page in pages {
        let content = if page.is_scanned {
            match options.scanned_page_mode {
                ScannedPageMode::Skip => {
                    debug!("Skipping scanned page {}", page.page_number);
                    continue;
                }
                ScannedPageMode::Image => match page.image_data_url {
                    Some(ref url) => vec![image_block(page, url)],
                    None => vec![Block::Notice {
                        text: format!(
                            "Page {} is a scanned image; no rendering was captured.",
                            page.page_number
                        ),
                    }],
                },
                ScannedPageMode::Placeholder => vec![Block::Notice {
                    text: format!(
                        "Page {} is a scanned image and was not imported as text.",
                        page.page_number
                    ),
                }],
            }
        } else {
            let mut blocks = paragraphs(&page.text_content);
            if blocks.is_empty() {
                if let Some(ref url) = page.image_data_url {
                    blocks.push(image_block(page, url));
                }
            }
            blocks
        };

        folios.push(Folio {
            id: Uuid::new_v4().to_string(),
            index: folios.len(),
            orientation: page.orientation,
            content,
            slots: Vec::new(),
        });
    }

    debug!("Created {} folios from {} pages", folios.len(), pages.len());
    folios
}

fn paragraphs(text: &str) -> Vec<Block> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| Block::Paragraph { text: l.to_string() })
        .collect()
}

fn image_block(page: &ExtractedPage, url: &str) -> Block {
    Block::Image {
        src: url.to_string(),
        width: page.width,
        height: page.height,
    }
}

/// Count folios by orientation and by content kind.
pub fn folio_summary(folios: &[Folio]) -> FolioSummary {
    folios.iter().fold(FolioSummary::default(), |mut s, f| {
        match f.orientation {
            Orientation::Portrait => s.portrait += 1,
            Orientation::Landscape => s.landscape += 1,
        }
        if f.is_image_based() {
            s.image_based += 1;
        } else {
            s.text_based += 1;
        }
        s
    })
}

/// Preview markup for the first `limit` folios, one `<section>` each.
///
/// Slots show their fallback text; nothing is resolved here.
pub fn folios_to_html(folios: &[Folio], limit: usize) -> String {
    let mut html = String::new();
    for folio in folios.iter().take(limit) {
        let _ = write!(
            html,
            "<section class=\"folio folio-{}\" data-folio-id=\"{}\">",
            folio.orientation.as_str(),
            html_escape::encode_double_quoted_attribute(&folio.id)
        );
        html.push_str(&render_blocks(folio, |slot| slot.fallback_text()));
        html.push_str("</section>\n");
    }
    html
}

/// Render a folio's blocks as HTML, asking `slot_text` for each slot's text.
pub(crate) fn render_blocks(folio: &Folio, slot_text: impl Fn(&Slot) -> String) -> String {
    let mut html = String::new();
    for block in &folio.content {
        match block {
            Block::Paragraph { text } => {
                let _ = write!(html, "<p>{}</p>", html_escape::encode_text(text));
            }
            Block::Image { src, width, height } => {
                let _ = write!(
                    html,
                    "<img src=\"{}\" width=\"{}\" height=\"{}\" alt=\"Page {}\"/>",
                    html_escape::encode_double_quoted_attribute(src),
                    width,
                    height,
                    folio.index + 1
                );
            }
            Block::Notice { text } => {
                let _ = write!(
                    html,
                    "<p class=\"notice\"><em>{}</em></p>",
                    html_escape::encode_text(text)
                );
            }
            Block::Slot { slot_id } => {
                let text = match folio.slots.iter().find(|s| &s.id == slot_id) {
                    Some(slot) => slot_text(slot),
                    None => format!("[{}]", slot_id),
                };
                if !text.is_empty() {
                    let _ = write!(
                        html,
                        "<span class=\"slot\" data-slot-id=\"{}\">{}</span>",
                        html_escape::encode_double_quoted_attribute(slot_id),
                        html_escape::encode_text(&text)
                    );
                }
            }
        }
    }
    html
}
