use std::sync::LazyLock;

use html_escape::decode_html_entities;
use regex::Regex;

static SCRIPT_OR_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap());
static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/tr|/li|/h[1-6]|/table|/caption)\b[^>]*>").unwrap()
});
static CELL_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</\s*t[dh]\s*>").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Sanitize extracted text before passing downstream.
///
/// Strips control characters (tabs survive, they separate columns), trims
/// every line and collapses runs of blank lines into one.
pub fn sanitize_extracted_text(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();

    let mut out: Vec<&str> = Vec::new();
    for line in cleaned.lines().map(str::trim) {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Reduce an HTML document to readable text.
///
/// Block-level closings become line breaks, table cells become tabs.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(html, "");
    let text = BLOCK_BREAK.replace_all(&text, "\n");
    let text = CELL_BREAK.replace_all(&text, "\t");
    let text = TAG.replace_all(&text, "");
    decode_html_entities(&text).into_owned()
}

/// Strip every tag from an HTML fragment and collapse its whitespace.
pub fn inline_text(fragment: &str) -> String {
    let text = TAG.replace_all(fragment, " ");
    decode_html_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_null_bytes() {
        let clean = sanitize_extracted_text("Customer: Acme\x00 Corp");
        assert_eq!(clean, "Customer: Acme Corp");
    }

    #[test]
    fn strips_control_characters_but_keeps_tabs() {
        let clean = sanitize_extracted_text("Qty\tPrice\x01\x02\nTotal: 30.5");
        assert_eq!(clean, "Qty\tPrice\nTotal: 30.5");
    }

    #[test]
    fn preserves_table_punctuation() {
        let raw = "| Item | Amount |\n|------|--------|\n| Bolt | $10.50 |";
        assert_eq!(sanitize_extracted_text(raw), raw);
    }

    #[test]
    fn collapses_blank_lines() {
        let raw = "Line one\n\n\n\nLine two\n \n\nLine three\n\n";
        assert_eq!(sanitize_extracted_text(raw), "Line one\n\nLine two\n\nLine three");
    }

    #[test]
    fn trims_whitespace_per_line() {
        let raw = "  leading spaces  \n  trailing too  ";
        assert_eq!(sanitize_extracted_text(raw), "leading spaces\ntrailing too");
    }

    #[test]
    fn empty_input_returns_empty() {
        assert_eq!(sanitize_extracted_text(""), "");
        assert_eq!(sanitize_extracted_text("\x00\x01\n\n"), "");
    }

    #[test]
    fn html_to_text_decodes_named_and_numeric_entities() {
        let text = html_to_text("<p>&copy; 2024 Acme &ndash; Total &pound;30 &rsquo;s &hellip; &#x20AC;5 &#39;x&#39;</p>");
        assert_eq!(text, "\u{a9} 2024 Acme \u{2013} Total \u{a3}30 \u{2019}s \u{2026} \u{20ac}5 'x'\n");
    }

    #[test]
    fn inline_text_decodes_entities() {
        assert_eq!(inline_text("<td>Bolt &amp; nut&nbsp;&mdash; M6</td>"), "Bolt & nut \u{2014} M6");
    }

    #[test]
    fn html_to_text_breaks_blocks_and_cells() {
        let html = "<html><head><style>p{}</style></head><body>\
                    <p>Invoice &amp; receipt</p>\
                    <table><tr><td>Bolt</td><td>10.5</td></tr></table>\
                    </body></html>";
        let text = sanitize_extracted_text(&html_to_text(html));
        assert!(text.contains("Invoice & receipt"));
        assert!(text.contains("Bolt\t10.5"));
        assert!(!text.contains("p{}"));
    }

    #[test]
    fn inline_text_collapses_whitespace() {
        assert_eq!(inline_text("<b>Unit</b>\n   <i>price</i>"), "Unit price");
    }
}
