//! Document information dictionary → [`DocumentMetadata`].
//!
//! PDF dates look like `D:YYYYMMDDHHmmSSOHH'mm'`; everything after the
//! year is optional. Absent month/day fall back to the first of the
//! period, absent time components to zero. Strings that don't match the
//! pattern, or that name an impossible date, parse to `None` instead of
//! failing the import.

use crate::model::DocumentMetadata;
use crate::pipeline::backend::InfoDictionary;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_PDF_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:D:)?(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?(?:([Zz+\-])(?:(\d{2})'?(?:(\d{2})'?)?)?)?$",
    )
    .unwrap()
});

/// Parse a PDF date string.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<Utc>> {
    let caps = RE_PDF_DATE.captures(raw.trim())?;
    let num = |i: usize, default: u32| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month = num(2, 1)?;
    let day = num(3, 1)?;
    let hour = num(4, 0)?;
    let minute = num(5, 0)?;
    let second = num(6, 0)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;

    let offset_secs = match caps.get(7).map(|m| m.as_str()) {
        Some("+") | Some("-") => {
            let sign = if caps.get(7)?.as_str() == "-" { -1 } else { 1 };
            let oh = num(8, 0)? as i32;
            let om = num(9, 0)? as i32;
            if oh > 23 || om > 59 {
                return None;
            }
            sign * (oh * 3600 + om * 60)
        }
        _ => 0,
    };

    let offset = FixedOffset::east_opt(offset_secs)?;
    let local = offset.from_local_datetime(&naive).single()?;
    Some(local.with_timezone(&Utc))
}

/// Build [`DocumentMetadata`] from the raw info dictionary.
pub fn from_info(info: InfoDictionary, page_count: usize) -> DocumentMetadata {
    let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    DocumentMetadata {
        keywords: info
            .keywords
            .as_deref()
            .map(|k| {
                k.split([',', ';'])
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        creation_date: info.creation_date.as_deref().and_then(parse_pdf_date),
        modification_date: info.modification_date.as_deref().and_then(parse_pdf_date),
        title: non_empty(info.title),
        author: non_empty(info.author),
        subject: non_empty(info.subject),
        creator: non_empty(info.creator),
        producer: non_empty(info.producer),
        page_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn full_date_with_utc_marker() {
        let d = parse_pdf_date("D:20231215143052Z").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2023, 12, 15));
        assert_eq!((d.hour(), d.minute(), d.second()), (14, 30, 52));
    }

    #[test]
    fn missing_components_default() {
        let d = parse_pdf_date("D:2021").unwrap();
        assert_eq!((d.month(), d.day(), d.hour(), d.minute(), d.second()), (1, 1, 0, 0, 0));
        let d = parse_pdf_date("D:20210607").unwrap();
        assert_eq!((d.month(), d.day(), d.hour()), (6, 7, 0));
    }

    #[test]
    fn offset_is_applied() {
        let d = parse_pdf_date("D:20230101120000+02'00'").unwrap();
        assert_eq!(d.hour(), 10);
        let d = parse_pdf_date("D:20230101120000-05'30").unwrap();
        assert_eq!((d.hour(), d.minute()), (17, 30));
    }

    #[test]
    fn malformed_dates_are_none() {
        assert!(parse_pdf_date("yesterday").is_none());
        assert!(parse_pdf_date("D:20231345").is_none());
        assert!(parse_pdf_date("D:20230230").is_none());
        assert!(parse_pdf_date("").is_none());
    }

    #[test]
    fn info_dictionary_mapping() {
        let info = InfoDictionary {
            title: Some("  Rapport annuel ".into()),
            author: Some(String::new()),
            keywords: Some("finance, 2024;audit".into()),
            creation_date: Some("D:20240301".into()),
            modification_date: Some("garbage".into()),
            ..Default::default()
        };
        let meta = from_info(info, 12);
        assert_eq!(meta.title.as_deref(), Some("Rapport annuel"));
        assert_eq!(meta.author, None);
        assert_eq!(meta.keywords, vec!["finance", "2024", "audit"]);
        assert!(meta.creation_date.is_some());
        assert!(meta.modification_date.is_none());
        assert_eq!(meta.page_count, 12);
    }
}
