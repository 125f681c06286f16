//! Import pipeline tests against an in-memory PDF engine.
//!
//! The fake backend scripts page sizes, glyph runs and failures so page
//! isolation, scanned-page handling and progress events can be checked
//! without the native pdfium library.

use folio_pipeline::pipeline::backend::{
    GlyphRun, InfoDictionary, PageGeometry, PdfBackend, PdfDocumentSource,
};
use folio_pipeline::{
    create_folios, Block, FolioError, FolioOptions, ImportOptions, ImportProgressCallback,
    Orientation, PageError, PageExtractor, PageRange, ScannedPageMode,
};
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fake engine ──────────────────────────────────────────────────────────────

const PDF_BYTES: &[u8] = b"%PDF-1.7\n%fake\n";

/// A scripted page. Runs are `(text, x, y)` with `y` measured top-down.
#[derive(Clone)]
struct FakePage {
    width: f32,
    height: f32,
    runs: Vec<(String, f32, f32)>,
    text_fails: bool,
}

impl FakePage {
    fn text(lines: &[&str]) -> Self {
        Self {
            width: 300.0,
            height: 400.0,
            runs: lines
                .iter()
                .enumerate()
                .map(|(i, line)| (line.to_string(), 36.0, 50.0 + 20.0 * i as f32))
                .collect(),
            text_fails: false,
        }
    }

    /// `count` one-character runs, ten per line.
    fn scattered(count: usize) -> Self {
        Self {
            runs: (0..count)
                .map(|i| ("x".to_string(), 20.0 + 15.0 * (i % 10) as f32, 30.0 + 20.0 * (i / 10) as f32))
                .collect(),
            ..Self::blank()
        }
    }

    fn blank() -> Self {
        Self::text(&[])
    }

    fn broken() -> Self {
        Self {
            text_fails: true,
            ..Self::blank()
        }
    }

    fn sized(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[derive(Default)]
struct FakeBackend {
    pages: Vec<FakePage>,
    info: InfoDictionary,
    open_error: Option<fn() -> FolioError>,
    rasterized: Arc<Mutex<Vec<usize>>>,
}

struct FakeDocument<'a> {
    backend: &'a FakeBackend,
}

impl PdfBackend for FakeBackend {
    fn visit_document(
        &self,
        _bytes: Vec<u8>,
        _password: Option<&str>,
        visit: &mut dyn FnMut(&dyn PdfDocumentSource),
    ) -> Result<(), FolioError> {
        if let Some(make_err) = self.open_error {
            return Err(make_err());
        }
        visit(&FakeDocument { backend: self });
        Ok(())
    }
}

impl PdfDocumentSource for FakeDocument<'_> {
    fn page_count(&self) -> usize {
        self.backend.pages.len()
    }

    fn info(&self) -> InfoDictionary {
        self.backend.info.clone()
    }

    fn page_geometry(&self, index: usize) -> Result<PageGeometry, PageError> {
        let p = &self.backend.pages[index];
        Ok(PageGeometry {
            width: p.width,
            height: p.height,
        })
    }

    fn glyph_runs(&self, index: usize) -> Result<Vec<GlyphRun>, PageError> {
        let p = &self.backend.pages[index];
        if p.text_fails {
            return Err(PageError::TextFailed {
                page: index + 1,
                detail: "damaged content stream".into(),
            });
        }
        Ok(p.runs
            .iter()
            .map(|(text, x, y)| GlyphRun {
                text: text.clone(),
                matrix: [12.0, 0.0, 0.0, 12.0, *x, p.height - *y],
                width: 6.0 * text.len() as f32,
                height: 12.0,
                font_name: "Helvetica".into(),
            })
            .collect())
    }

    fn rasterize(&self, index: usize, _scale: f32) -> Result<DynamicImage, PageError> {
        self.backend.rasterized.lock().unwrap().push(index + 1);
        Ok(DynamicImage::new_rgb8(4, 4))
    }
}

fn extractor(backend: FakeBackend) -> PageExtractor {
    PageExtractor::new(Arc::new(backend))
}

const LONG_LINE: &str = "The parties agree to the terms and conditions set out in this agreement.";

// ── Page isolation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn failing_page_is_dropped_with_warning() {
    let backend = FakeBackend {
        pages: vec![
            FakePage::text(&[LONG_LINE]),
            FakePage::broken(),
            FakePage::text(&[LONG_LINE, "Signed in Lyon."]),
        ],
        ..Default::default()
    };

    let result = extractor(backend)
        .import_pdf(PDF_BYTES.to_vec(), &ImportOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.total_pages, 3);
    let numbers: Vec<usize> = result.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 3]);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("Page 2"), "{:?}", result.warnings);
    assert_eq!(
        result.pages[1].text_content,
        format!("{}\nSigned in Lyon.", LONG_LINE)
    );
}

#[tokio::test]
async fn unopenable_document_fails_with_zero_pages() {
    let backend = FakeBackend {
        pages: vec![FakePage::text(&[LONG_LINE])],
        open_error: Some(|| FolioError::PasswordRequired),
        ..Default::default()
    };

    let result = extractor(backend)
        .import_pdf(PDF_BYTES.to_vec(), &ImportOptions::default())
        .await;

    assert!(!result.success);
    assert!(result.pages.is_empty());
    assert!(result.error.unwrap().contains("password"));
}

#[tokio::test]
async fn non_pdf_bytes_are_rejected_before_opening() {
    let result = extractor(FakeBackend::default())
        .import_pdf(b"PK\x03\x04zip".to_vec(), &ImportOptions::default())
        .await;
    assert!(!result.success);
    assert_eq!(result.total_pages, 0);
}

// ── Scanned pages ────────────────────────────────────────────────────────────

#[tokio::test]
async fn scanned_pages_are_rasterized() {
    let rasterized = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeBackend {
        pages: vec![
            FakePage::text(&[&"x".repeat(49)]).sized(200.0, 200.0),
            FakePage::text(&[&"x".repeat(50)]).sized(200.0, 200.0),
            FakePage::blank(),
        ],
        rasterized: Arc::clone(&rasterized),
        ..Default::default()
    };

    let result = extractor(backend)
        .import_pdf(PDF_BYTES.to_vec(), &ImportOptions::default())
        .await;

    let scanned: Vec<bool> = result.pages.iter().map(|p| p.is_scanned).collect();
    assert_eq!(scanned, vec![true, false, true]);
    assert_eq!(*rasterized.lock().unwrap(), vec![1, 3]);
    assert!(result.pages[0]
        .image_data_url
        .as_deref()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert!(result.pages[1].image_data_url.is_none());
}

#[tokio::test]
async fn scanned_boundary_counts_glyphs_not_separators() {
    let backend = FakeBackend {
        pages: vec![
            FakePage::scattered(49).sized(200.0, 200.0),
            FakePage::scattered(50).sized(200.0, 200.0),
            FakePage::scattered(30).sized(200.0, 200.0),
        ],
        ..Default::default()
    };

    let result = extractor(backend)
        .import_pdf(PDF_BYTES.to_vec(), &ImportOptions::default())
        .await;

    assert_eq!(result.pages[0].text_items.len(), 49);
    assert!(result.pages[0].text_content.contains('\n'));
    assert!(result.pages[0].text_content.chars().count() > 50);
    let scanned: Vec<bool> = result.pages.iter().map(|p| p.is_scanned).collect();
    assert_eq!(scanned, vec![true, false, true]);
}

#[tokio::test]
async fn ocr_mode_leaves_scanned_pages_unrendered() {
    let rasterized = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeBackend {
        pages: vec![FakePage::blank()],
        rasterized: Arc::clone(&rasterized),
        ..Default::default()
    };
    let options = ImportOptions::builder().use_ocr(true).build().unwrap();

    let result = extractor(backend).import_pdf(PDF_BYTES.to_vec(), &options).await;

    assert!(result.pages[0].is_scanned);
    assert!(result.pages[0].image_data_url.is_none());
    assert!(rasterized.lock().unwrap().is_empty());
}

#[tokio::test]
async fn render_as_images_rasterizes_every_page() {
    let rasterized = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeBackend {
        pages: vec![FakePage::text(&[LONG_LINE]), FakePage::text(&[LONG_LINE])],
        rasterized: Arc::clone(&rasterized),
        ..Default::default()
    };
    let options = ImportOptions::builder().render_as_images(true).build().unwrap();

    let result = extractor(backend).import_pdf(PDF_BYTES.to_vec(), &options).await;

    assert!(result.pages.iter().all(|p| p.image_data_url.is_some()));
    assert_eq!(*rasterized.lock().unwrap(), vec![1, 2]);
}

// ── Selection, metadata, orientation ─────────────────────────────────────────

#[tokio::test]
async fn page_range_limits_extraction_but_not_total() {
    let backend = FakeBackend {
        pages: (0..5).map(|_| FakePage::text(&[LONG_LINE])).collect(),
        ..Default::default()
    };
    let options = ImportOptions::builder()
        .page_range(PageRange::new(2, 3))
        .build()
        .unwrap();

    let result = extractor(backend).import_pdf(PDF_BYTES.to_vec(), &options).await;

    assert_eq!(result.total_pages, 5);
    let numbers: Vec<usize> = result.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![2, 3]);
}

#[tokio::test]
async fn metadata_and_orientation() {
    let backend = FakeBackend {
        pages: vec![
            FakePage::text(&[LONG_LINE]).sized(842.0, 595.0),
            FakePage::text(&[LONG_LINE]).sized(595.0, 842.0),
        ],
        info: InfoDictionary {
            title: Some("Master Agreement".into()),
            keywords: Some("legal, contract".into()),
            creation_date: Some("D:20240315120000Z".into()),
            ..Default::default()
        },
        ..Default::default()
    };

    let result = extractor(backend)
        .import_pdf(PDF_BYTES.to_vec(), &ImportOptions::default())
        .await;

    let meta = result.metadata.unwrap();
    assert_eq!(meta.title.as_deref(), Some("Master Agreement"));
    assert_eq!(meta.keywords, vec!["legal", "contract"]);
    assert_eq!(meta.page_count, 2);
    assert!(meta.creation_date.is_some());
    assert_eq!(result.pages[0].orientation, Orientation::Landscape);
    assert_eq!(result.pages[1].orientation, Orientation::Portrait);
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    extracted: AtomicUsize,
    errors: AtomicUsize,
    completed_ok: AtomicUsize,
}

impl ImportProgressCallback for Counting {
    fn on_import_start(&self, total_pages: usize) {
        self.started.store(total_pages, Ordering::SeqCst);
    }

    fn on_page_extracted(&self, _page_num: usize, _total: usize, _chars: usize) {
        self.extracted.fetch_add(1, Ordering::SeqCst);
    }

    fn on_page_error(&self, _page_num: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_import_complete(&self, _total: usize, success_count: usize) {
        self.completed_ok.store(success_count, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_callback_sees_every_page() {
    let counting = Arc::new(Counting::default());
    let backend = FakeBackend {
        pages: vec![
            FakePage::text(&[LONG_LINE]),
            FakePage::broken(),
            FakePage::text(&[LONG_LINE]),
            FakePage::broken(),
        ],
        ..Default::default()
    };

    extractor(backend)
        .with_progress(counting.clone())
        .import_pdf(PDF_BYTES.to_vec(), &ImportOptions::default())
        .await;

    assert_eq!(counting.started.load(Ordering::SeqCst), 4);
    assert_eq!(counting.extracted.load(Ordering::SeqCst), 2);
    assert_eq!(counting.errors.load(Ordering::SeqCst), 2);
    assert_eq!(counting.completed_ok.load(Ordering::SeqCst), 2);
}

// ── Import → folios ──────────────────────────────────────────────────────────

#[tokio::test]
async fn imported_pages_become_folios() {
    let backend = FakeBackend {
        pages: vec![
            FakePage::text(&[LONG_LINE, "Second paragraph of the page."]),
            FakePage::blank(),
            FakePage::text(&[LONG_LINE]),
        ],
        ..Default::default()
    };
    let result = extractor(backend)
        .import_pdf(PDF_BYTES.to_vec(), &ImportOptions::default())
        .await;

    let folios = create_folios(
        &result.pages,
        &FolioOptions {
            scanned_page_mode: ScannedPageMode::Skip,
        },
    );
    assert_eq!(folios.len(), 2);
    assert_eq!(folios[1].index, 1);
    assert_eq!(folios[0].content.len(), 2);
    assert!(matches!(folios[0].content[0], Block::Paragraph { ref text } if text == LONG_LINE));

    let folios = create_folios(&result.pages, &FolioOptions::default());
    assert_eq!(folios.len(), 3);
    assert!(folios[1].has_image());
}
