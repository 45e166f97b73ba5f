use std::sync::LazyLock;

use html_escape::encode_text;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use super::sanitize::inline_text;

static HTML_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b.*?</table\s*>").unwrap());
static HTML_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").unwrap());
static HTML_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<t([hd])\b[^>]*>(.*?)</t[hd]\s*>").unwrap());

/// Minimum number of consecutive tabular lines that form a table.
const MIN_TABLE_ROWS: usize = 2;

/// Heuristic: a line looks tabular if it has multiple columns separated by
/// tabs, pipes, or consistent multi-space gaps.
///
/// Patterns detected:
/// - Tab-separated: "Item\tQty\tPrice"
/// - Pipe-separated: "Item | Qty | Price"
/// - Multi-space aligned: "Bolt    4    10.50"
pub fn is_tabular_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.len() < 5 {
        return false;
    }

    if trimmed.matches('\t').count() >= 2 {
        return true;
    }

    if trimmed.matches('|').count() >= 2 {
        return true;
    }

    count_multi_space_gaps(trimmed) >= 2
}

/// Count runs of 3+ consecutive spaces that separate non-empty text segments.
fn count_multi_space_gaps(text: &str) -> usize {
    let mut count = 0;
    let mut in_gap = false;
    let mut gap_len = 0;

    for ch in text.chars() {
        if ch == ' ' {
            gap_len += 1;
            if gap_len >= 3 && !in_gap {
                in_gap = true;
                count += 1;
            }
        } else {
            in_gap = false;
            gap_len = 0;
        }
    }

    count
}

/// Rows of one table, header first.
pub type TableRows = Vec<Vec<String>>;

/// Split a tabular line into trimmed cells.
fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let cells: Vec<&str> = if trimmed.contains('|') {
        trimmed.trim_matches('|').split('|').collect()
    } else if trimmed.contains('\t') {
        trimmed.split('\t').collect()
    } else {
        trimmed.split("   ").collect()
    };
    cells
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// `|---|---|` style header separator.
fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// Collect runs of tabular lines in plain text.
pub fn collect_text_tables(text: &str) -> Vec<TableRows> {
    let mut tables = Vec::new();
    let mut run: TableRows = Vec::new();

    let mut flush = |run: &mut TableRows| {
        if run.len() >= MIN_TABLE_ROWS {
            tables.push(std::mem::take(run));
        }
        run.clear();
    };

    for line in text.lines() {
        if is_separator_row(line) && !run.is_empty() {
            continue;
        }
        if is_tabular_line(line) {
            run.push(split_cells(line));
        } else {
            flush(&mut run);
        }
    }
    flush(&mut run);

    tables
}

/// Collect the GFM tables of a markdown document.
///
/// Cell text is unescaped, so `a \| b` yields the cell `a | b`.
pub fn collect_markdown_tables(markdown: &str) -> Vec<TableRows> {
    let mut tables = Vec::new();
    let mut rows: TableRows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_cell = false;

    for event in Parser::new_ext(markdown, Options::ENABLE_TABLES) {
        match event {
            Event::Start(Tag::Table(_)) => rows.clear(),
            Event::Start(Tag::TableHead | Tag::TableRow) => row.clear(),
            Event::Start(Tag::TableCell) => {
                cell.clear();
                in_cell = true;
            }
            Event::Text(text) | Event::Code(text) if in_cell => cell.push_str(&text),
            Event::End(TagEnd::TableCell) => {
                row.push(cell.trim().to_string());
                in_cell = false;
            }
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => {
                rows.push(std::mem::take(&mut row));
            }
            Event::End(TagEnd::Table) => {
                if rows.len() >= MIN_TABLE_ROWS {
                    tables.push(std::mem::take(&mut rows));
                }
                rows.clear();
            }
            _ => {}
        }
    }

    tables
}

/// Raw `<table>...</table>` blocks of an HTML document.
pub fn html_tables(html: &str) -> Vec<String> {
    HTML_TABLE
        .find_iter(html)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Cell text of one HTML table, rows without cells dropped.
pub fn html_table_rows(table_html: &str) -> TableRows {
    HTML_ROW
        .captures_iter(table_html)
        .map(|row| {
            HTML_CELL
                .captures_iter(&row[1])
                .map(|cell| inline_text(&cell[2]))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

/// Render rows as a markdown pipe table; the first row is the header.
pub fn rows_to_markdown(rows: &[Vec<String>]) -> Option<String> {
    let width = rows.iter().map(Vec::len).max().filter(|w| *w > 0)?;
    let render = |row: &Vec<String>| {
        let mut cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
        cells.resize(width, String::new());
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render(&rows[0]));
    lines.push(format!("|{}", "---|".repeat(width)));
    lines.extend(rows[1..].iter().map(render));
    Some(lines.join("\n"))
}

/// Render rows as a minimal HTML table; the first row is the header.
pub fn rows_to_html(rows: &[Vec<String>]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let mut html = String::from("<table>\n");
    for (i, row) in rows.iter().enumerate() {
        let tag = if i == 0 { "th" } else { "td" };
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<{tag}>{}</{tag}>", encode_text(cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>");
    Some(html)
}
