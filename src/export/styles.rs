//! Fixed styling sent with every exported folio.

use crate::model::Orientation;

/// Base stylesheet for folio markup.
pub const EXPORT_CSS: &str = r#"
* { box-sizing: border-box; }
body { margin: 0; font-family: "Helvetica Neue", Arial, sans-serif; font-size: 11pt; line-height: 1.4; color: #000; }
.folio { padding: 20mm; page-break-after: always; }
.folio:last-child { page-break-after: auto; }
p { margin: 0 0 0.6em; }
img { display: block; max-width: 100%; height: auto; }
.notice { color: #555; font-style: italic; }
.slot { white-space: pre-wrap; }
"#;

/// `@page` rule for one orientation.
pub fn page_rule(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Portrait => "@page { size: A4 portrait; margin: 0; }",
        Orientation::Landscape => "@page { size: A4 landscape; margin: 0; }",
    }
}

/// Complete stylesheet for a folio of the given orientation.
pub fn folio_css(orientation: Orientation) -> String {
    format!("{}\n{}", page_rule(orientation), EXPORT_CSS.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_sets_page_size() {
        assert!(folio_css(Orientation::Landscape).starts_with("@page { size: A4 landscape"));
        assert!(folio_css(Orientation::Portrait).contains(".folio"));
    }
}
