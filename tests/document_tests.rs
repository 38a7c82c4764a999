//! Structured extraction over real PDF documents.
//!
//! The documents are built in memory: uncompressed, one Helvetica text
//! line per page, a correct xref table and an Info dictionary whose
//! `/Producer` varies so the raw bytes differ between copies.

use pdfdupe::duplicates::{DetectOptions, DetectionEngine, StrategyKind};
use pdfdupe::fingerprint::{DocumentExtractor, ExtractOptions, Fingerprinter};
use pdfdupe::registry::RawFile;

// =============================================================================
// Helper Functions
// =============================================================================

/// Build a PDF with one page per entry of `pages`.
///
/// Object layout: 1 catalog, 2 page tree, 3 font, then a page and its
/// content stream per page, then the Info dictionary.
fn pdf(pages: &[&str], producer: &str) -> Vec<u8> {
    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), pages.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (i, text) in pages.iter().enumerate() {
        let stream = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()));
    }
    objects.push(format!("<< /Title (Quarterly Report) /Producer ({producer}) >>"));
    let info_id = objects.len();

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }

    let xref = out.len();
    let mut table = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        table.push_str(&format!("{offset:010} 00000 n \n"));
    }
    out.extend_from_slice(table.as_bytes());
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R /Info {info_id} 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

fn report(producer: &str) -> Vec<u8> {
    pdf(&["Quarterly results", "Outlook and risks"], producer)
}

fn engine_with(files: Vec<(&str, Vec<u8>)>) -> DetectionEngine {
    let mut engine = DetectionEngine::new();
    engine.register(files.into_iter().map(|(name, content)| RawFile::new(name, content)));
    engine
}

// =============================================================================
// Extraction
// =============================================================================

#[test]
fn test_extract_pages_and_metadata() {
    let content = report("Writer A");
    assert!(DocumentExtractor::looks_like_pdf(&content));

    let options = ExtractOptions {
        extract_text: true,
        extract_metadata: true,
    };
    let document = DocumentExtractor::extract(&content, options).unwrap();

    assert_eq!(document.page_count(), 2);
    assert!(document.pages[0].contains("Quarterly"));
    assert!(document.pages[1].contains("Outlook"));
    assert_eq!(document.metadata["Title"], "Quarterly Report");
    assert_eq!(document.metadata["Producer"], "Writer A");
}

#[test]
fn test_metadata_is_skipped_unless_requested() {
    let document = DocumentExtractor::extract(&report("Writer A"), ExtractOptions::default()).unwrap();
    assert!(document.metadata.is_empty());
}

// =============================================================================
// Structured Digest
// =============================================================================

#[test]
fn test_structured_digest_ignores_producer() {
    let fingerprinter = Fingerprinter::new();
    let (a, b) = (report("Writer A"), report("Writer B"));
    assert_ne!(a, b);

    let first = fingerprinter.digest_structured(&a, ExtractOptions::default());
    let second = fingerprinter.digest_structured(&b, ExtractOptions::default());

    assert!(!first.fallback);
    assert!(!second.fallback);
    assert_eq!(first.page_count, Some(2));
    assert_eq!(first.digest, second.digest);
    assert_ne!(first.digest, fingerprinter.digest_bytes(&a));
}

#[test]
fn test_structured_digest_sees_text_changes() {
    let fingerprinter = Fingerprinter::new();
    let original = fingerprinter.digest_structured(&report("Writer A"), ExtractOptions::default());
    let edited = fingerprinter.digest_structured(
        &pdf(&["Quarterly results", "Revised outlook"], "Writer A"),
        ExtractOptions::default(),
    );

    assert!(!edited.fallback);
    assert_ne!(original.digest, edited.digest);
}

#[test]
fn test_metadata_changes_structured_digest() {
    let fingerprinter = Fingerprinter::new();
    let options = ExtractOptions {
        extract_text: true,
        extract_metadata: true,
    };
    let first = fingerprinter.digest_structured(&report("Writer A"), options);
    let second = fingerprinter.digest_structured(&report("Writer B"), options);

    assert!(!first.fallback);
    assert_ne!(first.digest, second.digest);

    let text_only = fingerprinter.digest_structured(&report("Writer A"), ExtractOptions::default());
    assert_ne!(first.digest, text_only.digest);
}

// =============================================================================
// Detection
// =============================================================================

#[test]
fn test_same_text_clusters_under_content_strategies() {
    for kind in [StrategyKind::Structured, StrategyKind::Fuzzy, StrategyKind::Token] {
        let mut engine = engine_with(vec![("a.pdf", report("Writer A")), ("b.pdf", report("Writer B"))]);
        let outcome = engine.detect(&DetectOptions::default().with_strategy(kind)).unwrap();

        assert_eq!(outcome.duplicate_groups.len(), 1, "strategy {kind}");
        assert_eq!(outcome.duplicates_found, 1, "strategy {kind}");
        assert!(outcome.errors.is_empty(), "strategy {kind}");
    }
}

#[test]
fn test_same_text_stays_apart_under_byte_strategies() {
    for kind in [StrategyKind::ByteExact, StrategyKind::Combined] {
        let mut engine = engine_with(vec![("a.pdf", report("Writer A")), ("b.pdf", report("Writer B"))]);
        let outcome = engine.detect(&DetectOptions::default().with_strategy(kind)).unwrap();

        assert!(outcome.duplicate_groups.is_empty(), "strategy {kind}");
        assert_eq!(outcome.unique_files, 2, "strategy {kind}");
    }
}

#[test]
fn test_page_count_recorded_on_tracked_file() {
    let mut engine = engine_with(vec![
        ("a.pdf", report("Writer A")),
        ("short.pdf", pdf(&["Cover only"], "Writer A")),
        ("broken.pdf", b"%PDF-1.4\nnot really a document".to_vec()),
    ]);
    engine
        .detect(&DetectOptions::default().with_strategy(StrategyKind::Structured))
        .unwrap();

    let pages: Vec<Option<usize>> = engine.files().iter().map(|f| f.page_count).collect();
    assert_eq!(pages, vec![Some(2), Some(1), None]);

    let broken = &engine.files()[2];
    let digest = broken.digests().structured.as_ref().unwrap();
    assert!(digest.fallback);
}
