//! Help center article bodies arrive as HTML; this turns them into the
//! compact markdown-ish text handed to the model.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

static BLOCKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6, p, li, tr, blockquote")
        .expect("block selector is valid")
});

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank run pattern is valid"));

/// Elements whose text never belongs to the enclosing block
fn is_excluded(name: &str) -> bool {
    matches!(
        name,
        "script"
            | "style"
            | "noscript"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "p"
            | "li"
            | "tr"
            | "blockquote"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Heading(u8),
    Paragraph,
    ListItem,
    Row,
    Quote,
}

impl BlockKind {
    fn from_tag(name: &str) -> Option<Self> {
        Some(match name {
            "h1" => Self::Heading(1),
            "h2" => Self::Heading(2),
            "h3" => Self::Heading(3),
            "h4" => Self::Heading(4),
            "h5" => Self::Heading(5),
            "h6" => Self::Heading(6),
            "p" => Self::Paragraph,
            "li" => Self::ListItem,
            "tr" => Self::Row,
            "blockquote" => Self::Quote,
            _ => return None,
        })
    }

    fn render(self, text: &str) -> String {
        match self {
            Self::Heading(level @ 1..=3) => {
                format!("{} {}", "#".repeat(usize::from(level)), text)
            }
            Self::Heading(_) => format!("**{text}**"),
            Self::ListItem => format!("- {text}"),
            Self::Quote => format!("> {text}"),
            Self::Paragraph | Self::Row => text.to_string(),
        }
    }

    /// Runs of list items, or of table rows, sit on consecutive lines
    const fn is_compact(self) -> bool {
        matches!(self, Self::ListItem | Self::Row)
    }
}

/// Convert an HTML document into markdown-flavoured plain text.
///
/// Headings, paragraphs, list items, table rows and blockquotes are visited
/// in document order and each contributes only its own text, so nested
/// blocks are not emitted twice. Consecutive identical lines are collapsed.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut out = String::new();
    let mut previous: Option<(BlockKind, String)> = None;

    for element in document.select(&BLOCKS) {
        let Some(kind) = BlockKind::from_tag(element.value().name()) else {
            continue;
        };

        let text = if kind == BlockKind::Row {
            row_text(element)
        } else {
            let mut raw = String::new();
            collect_own_text(element, &mut raw);
            squash_whitespace(&raw)
        };
        if text.is_empty() {
            continue;
        }

        let line = kind.render(&text);
        if let Some((prev_kind, prev_line)) = &previous {
            if *prev_line == line {
                continue;
            }
            if *prev_kind == kind && kind.is_compact() {
                out.push('\n');
            } else {
                out.push_str("\n\n");
            }
        }
        out.push_str(&line);
        previous = Some((kind, line));
    }

    BLANK_RUNS.replace_all(&out, "\n\n").trim().to_string()
}

/// Flatten an HTML fragment to its text, ignoring structure
pub fn strip_tags(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    squash_whitespace(&fragment.root_element().text().collect::<String>())
}

fn collect_own_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if !is_excluded(el.name()) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_own_text(child, out);
                }
            }
            _ => {}
        }
    }
}

/// Table rows render as their cells joined with ` | `
fn row_text(row: ElementRef<'_>) -> String {
    let cells: Vec<String> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .map(|cell| {
            let mut raw = String::new();
            collect_own_text(cell, &mut raw);
            squash_whitespace(&raw)
        })
        .filter(|text| !text.is_empty())
        .collect();
    cells.join(" | ")
}

fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
