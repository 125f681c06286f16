//! Built-in values for `dynamic_content` slots.
//!
//! A slot label is normalised (trimmed, lowercased, whitespace runs →
//! `_`) and matched against a fixed alias table. Unknown labels parse to
//! `None` and resolution moves on to context metadata.

use crate::slots::context::ResolutionContext;

/// A value computed from the resolution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinField {
    PageNumber,
    TotalPages,
    PageOfTotal,
    Date,
    DateShort,
    DateLong,
    DateIso,
    Time,
    DocumentTitle,
    DocumentAuthor,
    DocumentVersion,
}

/// Lowercase and replace whitespace runs with a single `_`.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

impl BuiltinField {
    /// Map a free-text label to a built-in field.
    pub fn parse(label: &str) -> Option<Self> {
        let field = match normalize_label(label).as_str() {
            "page_number" | "page" | "page_num" | "numero_page" => BuiltinField::PageNumber,
            "total_pages" | "page_count" | "pages" | "nombre_pages" => BuiltinField::TotalPages,
            "page_of_total" | "page_x_of_y" | "page_n_of_m" => BuiltinField::PageOfTotal,
            "date" | "current_date" | "today" => BuiltinField::Date,
            "date_short" | "short_date" => BuiltinField::DateShort,
            "date_long" | "long_date" => BuiltinField::DateLong,
            "date_iso" | "iso_date" => BuiltinField::DateIso,
            "time" | "current_time" | "heure" => BuiltinField::Time,
            "document_title" | "title" | "titre" => BuiltinField::DocumentTitle,
            "document_author" | "author" | "auteur" => BuiltinField::DocumentAuthor,
            "document_version" | "version" => BuiltinField::DocumentVersion,
            _ => return None,
        };
        Some(field)
    }

    /// Compute the value. Document fields are `None` when the context
    /// metadata lacks them.
    pub fn resolve(&self, ctx: &ResolutionContext) -> Option<String> {
        let now = ctx.now;
        match self {
            BuiltinField::PageNumber => Some(ctx.page_number.to_string()),
            BuiltinField::TotalPages => Some(ctx.total_pages.to_string()),
            BuiltinField::PageOfTotal => Some(format!("Page {} of {}", ctx.page_number, ctx.total_pages)),
            BuiltinField::Date => Some(now.format("%d/%m/%Y").to_string()),
            BuiltinField::DateShort => Some(now.format("%d/%m/%y").to_string()),
            BuiltinField::DateLong => Some(now.format("%-d %B %Y").to_string()),
            BuiltinField::DateIso => Some(now.format("%Y-%m-%d").to_string()),
            BuiltinField::Time => Some(now.format("%H:%M").to_string()),
            BuiltinField::DocumentTitle => ctx.metadata_text("title"),
            BuiltinField::DocumentAuthor => ctx.metadata_text("author"),
            BuiltinField::DocumentVersion => ctx.metadata_text("version"),
        }
    }
}
