//! File-based extraction for documents that already carry a text layer.
//!
//! Handles plain text, markdown and HTML without any model. Other formats
//! (PDF, images) need an OCR-capable extractor behind the same trait.

use std::path::Path;

use super::sanitize::{html_to_text, sanitize_extracted_text};
use super::table_detect::{
    collect_markdown_tables, collect_text_tables, html_table_rows, html_tables, rows_to_html,
    rows_to_markdown, TableRows,
};
use super::types::{ContentExtractor, ExtractedContent, TableFormat};
use super::ExtractionError;

/// Strategies the extractor understands; all read the same text layer.
pub const KNOWN_STRATEGIES: &[&str] = &["fast", "auto", "hi_res"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Text,
    Markdown,
    Html,
}

fn source_kind(path: &Path) -> Result<SourceKind, ExtractionError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "text" => Ok(SourceKind::Text),
        "md" | "markdown" => Ok(SourceKind::Markdown),
        "html" | "htm" => Ok(SourceKind::Html),
        _ => Err(ExtractionError::UnsupportedFormat(ext)),
    }
}

/// Reads text, markdown and HTML files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileContentExtractor;

impl ContentExtractor for FileContentExtractor {
    fn extract(
        &self,
        path: &Path,
        format_hint: Option<TableFormat>,
        strategy: &str,
    ) -> Result<ExtractedContent, ExtractionError> {
        if !path.is_file() {
            return Err(ExtractionError::FileNotFound(path.to_path_buf()));
        }
        let kind = source_kind(path)?;
        if !KNOWN_STRATEGIES.contains(&strategy) {
            tracing::warn!(strategy, "Unknown extraction strategy, reading text layer");
        }

        let bytes = std::fs::read(path)?;
        let raw = String::from_utf8(bytes).map_err(|e| ExtractionError::Encoding(e.to_string()))?;

        let text = match kind {
            SourceKind::Text | SourceKind::Markdown => sanitize_extracted_text(&raw),
            SourceKind::Html => sanitize_extracted_text(&html_to_text(&raw)),
        };
        let tables = format_hint.and_then(|format| extract_tables(&raw, kind, format));

        tracing::info!(
            path = %path.display(),
            kind = ?kind,
            strategy,
            text_length = text.len(),
            has_tables = tables.is_some(),
            "FileContentExtractor: extraction complete"
        );

        Ok(ExtractedContent { text, tables })
    }
}

/// Table blob in the requested markup, or `None` if the document has no tables.
fn extract_tables(raw: &str, kind: SourceKind, format: TableFormat) -> Option<String> {
    if kind == SourceKind::Html && format == TableFormat::Html {
        let tables = html_tables(raw);
        return (!tables.is_empty()).then(|| tables.join("\n\n"));
    }

    let rows: Vec<TableRows> = match kind {
        SourceKind::Text => collect_text_tables(&sanitize_extracted_text(raw)),
        SourceKind::Markdown => collect_markdown_tables(raw),
        SourceKind::Html => html_tables(raw).iter().map(|t| html_table_rows(t)).collect(),
    };
    let rendered: Vec<String> = rows
        .iter()
        .filter_map(|table| match format {
            TableFormat::Markdown => rows_to_markdown(table),
            TableFormat::Html => rows_to_html(table),
        })
        .collect();

    if rendered.is_empty() {
        None
    } else {
        Some(rendered.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const INVOICE_MD: &str = "Customer: Acme\n\n| Item | Amount |\n|---|---|\n| Bolt | 10.5 |\n| Nut | 20.0 |\n";
    const INVOICE_HTML: &str = "<html><body><p>Customer: Acme &amp; Sons</p>\
        <table><tr><th>Item</th><th>Amount</th></tr><tr><td>Bolt</td><td>10.5</td></tr></table>\
        </body></html>";

    #[test]
    fn reads_plain_text_without_tables_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "invoice.md", INVOICE_MD);

        let content = FileContentExtractor.extract(&path, None, "fast").unwrap();
        assert!(content.text.starts_with("Customer: Acme"));
        assert!(content.tables.is_none());
    }

    #[test]
    fn markdown_hint_collects_pipe_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "invoice.txt", INVOICE_MD);

        let content = FileContentExtractor
            .extract(&path, Some(TableFormat::Markdown), "fast")
            .unwrap();
        assert_eq!(
            content.tables.as_deref(),
            Some("| Item | Amount |\n|---|---|\n| Bolt | 10.5 |\n| Nut | 20.0 |")
        );
    }

    #[test]
    fn markdown_source_tables_keep_escaped_pipes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "parts.md",
            "Parts list\n\n| Item | Spec |\n|---|---|\n| Bolt | M6 \\| zinc |\n| `Nut` | M6 |\n",
        );

        let markdown = FileContentExtractor
            .extract(&path, Some(TableFormat::Markdown), "fast")
            .unwrap()
            .tables
            .unwrap();
        assert_eq!(markdown, "| Item | Spec |\n|---|---|\n| Bolt | M6 \\| zinc |\n| Nut | M6 |");

        let html = FileContentExtractor
            .extract(&path, Some(TableFormat::Html), "fast")
            .unwrap()
            .tables
            .unwrap();
        assert!(html.contains("<td>Bolt</td><td>M6 | zinc</td>"));
        assert!(html.contains("<td>Nut</td><td>M6</td>"));
    }

    #[test]
    fn html_hint_on_text_renders_html_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "invoice.txt", INVOICE_MD);

        let tables = FileContentExtractor
            .extract(&path, Some(TableFormat::Html), "fast")
            .unwrap()
            .tables
            .unwrap();
        assert!(tables.starts_with("<table>"));
        assert!(tables.contains("<td>Bolt</td><td>10.5</td>"));
    }

    #[test]
    fn html_document_keeps_raw_tables_for_html_hint() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "invoice.html", INVOICE_HTML);

        let content = FileContentExtractor
            .extract(&path, Some(TableFormat::Html), "fast")
            .unwrap();
        assert!(content.text.contains("Customer: Acme & Sons"));
        assert!(!content.text.contains("<p>"));
        assert_eq!(
            content.tables.as_deref(),
            Some("<table><tr><th>Item</th><th>Amount</th></tr><tr><td>Bolt</td><td>10.5</td></tr></table>")
        );
    }

    #[test]
    fn html_document_converts_tables_for_markdown_hint() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "invoice.HTM", INVOICE_HTML);

        let content = FileContentExtractor
            .extract(&path, Some(TableFormat::Markdown), "hi_res")
            .unwrap();
        assert_eq!(
            content.tables.as_deref(),
            Some("| Item | Amount |\n|---|---|\n| Bolt | 10.5 |")
        );
    }

    #[test]
    fn document_without_tables_yields_no_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "note.txt", "Just a note.\nNothing tabular here.");

        let content = FileContentExtractor
            .extract(&path, Some(TableFormat::Markdown), "fast")
            .unwrap();
        assert!(content.tables.is_none());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = FileContentExtractor
            .extract(Path::new("/definitely/not/here.txt"), None, "fast")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::FileNotFound(_)));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "scan.pdf", "%PDF-1.7");

        let err = FileContentExtractor.extract(&path, None, "fast").unwrap_err();
        match err {
            ExtractionError::UnsupportedFormat(ext) => assert_eq!(ext, "pdf"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let err = FileContentExtractor.extract(&path, None, "fast").unwrap_err();
        assert!(matches!(err, ExtractionError::Encoding(_)));
    }
}
