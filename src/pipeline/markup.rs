//! Page-description markup: the XML vocabulary templates produce.
//!
//! ```xml
//! <document page="A4" margin="40" size="10" font="/srv/fonts/calibri.ttf" title="Asha Rao">
//!   <row gap="12">
//!     <col width="1"><image src="/srv/logo.png" width="60"/></col>
//!     <col width="4"><heading level="1">Asha Rao</heading></col>
//!   </row>
//!   <heading level="2" rule="true">Experience</heading>
//!   <p><b>Engineer</b>, Acme<br/>August 2021 – January 2023</p>
//!   <ul><li>Built APIs</li></ul>
//!   <table widths="3,4,2,2"><tr header="true"><td>Course</td>…</tr></table>
//! </document>
//! ```
//!
//! Field values are substituted verbatim, so the source is repaired before
//! the XML parser sees it. A `<` that does not open a tag becomes text, tags
//! are balanced the way an HTML parser would balance them, stray `&`
//! characters are escaped, and a handful of HTML named entities are
//! accepted. Inside text, elements outside the vocabulary render as their
//! text content. Block structure stays strict: an unknown block element or
//! a bad attribute value is an error.

use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::Node;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_MARGIN: f32 = 40.0;
const DEFAULT_FONT_SIZE: f32 = 10.0;
const DEFAULT_GAP: f32 = 12.0;
const DEFAULT_SPACER: f32 = 6.0;
const DEFAULT_RULE: f32 = 0.75;

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("root element must be <document>, found <{0}>")]
    Root(String),

    #[error("unknown element <{name}> inside <{parent}>")]
    UnknownElement { name: String, parent: String },

    #[error("<{name}> is not allowed inside <{parent}>")]
    Misplaced { name: String, parent: String },

    #[error("<{element}> requires attribute '{attr}'")]
    MissingAttribute { element: String, attr: &'static str },

    #[error("invalid value '{value}' for attribute '{attr}' on <{element}>")]
    BadAttribute {
        element: String,
        attr: &'static str,
        value: String,
    },
}

// ── AST ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
        }
    }
}

impl FromStr for PageSize {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl FromStr for Align {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "left" => Ok(Align::Left),
            "center" => Ok(Align::Center),
            "right" => Ok(Align::Right),
            _ => Err(()),
        }
    }
}

/// `#rrggbb` or `#rgb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0]);

    /// Components in the 0.0–1.0 range PDF operators take.
    pub fn unit(self) -> [f32; 3] {
        self.0.map(|c| c as f32 / 255.0)
    }
}

impl FromStr for Color {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        let hex = s.strip_prefix('#').ok_or(())?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(());
        }
        let channel = |h: &str| u8::from_str_radix(h, 16).map_err(|_| ());
        match hex.len() {
            6 => Ok(Color([
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            ])),
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    out[i] = channel(&format!("{c}{c}"))?;
                }
                Ok(Color(out))
            }
            _ => Err(()),
        }
    }
}

/// A parsed page-description document.
#[derive(Debug, Clone, PartialEq)]
pub struct Markup {
    pub page: PageSize,
    pub margin: f32,
    pub font_size: f32,
    /// Registered font resource requested by the template.
    pub font: Option<String>,
    /// Registered bold face. Without it bold is synthesised from `font`.
    pub bold_font: Option<String>,
    pub title: Option<String>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading(Heading),
    Paragraph(Paragraph),
    List(Vec<Paragraph>),
    Rule { color: Color, thickness: f32 },
    Spacer(f32),
    PageBreak,
    Image(ImageBlock),
    Row(Row),
    Table(Table),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub paragraph: Paragraph,
    /// Underline the heading across the full content width.
    pub rule: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub align: Align,
    pub size: Option<f32>,
    pub color: Option<Color>,
    pub bold: bool,
}

impl Paragraph {
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Run {
    Text { text: String, bold: bool },
    Break,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub src: String,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub gap: f32,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Relative width weight.
    pub weight: f32,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Relative column weights; one per column.
    pub widths: Vec<f32>,
    pub border: bool,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub header: bool,
    pub cells: Vec<Paragraph>,
}

// ── Parsing ──────────────────────────────────────────────────────────────

/// Parse template output into a [`Markup`] tree.
pub fn parse(source: &str) -> Result<Markup, MarkupError> {
    let repaired = repair_entities(&repair_tags(source));
    let doc = roxmltree::Document::parse(&repaired)?;
    let root = doc.root_element();
    if root.tag_name().name() != "document" {
        return Err(MarkupError::Root(root.tag_name().name().to_string()));
    }

    Ok(Markup {
        page: attr(root, "page")?.unwrap_or_default(),
        margin: length(root, "margin")?.unwrap_or(DEFAULT_MARGIN),
        font_size: positive(root, "size")?.unwrap_or(DEFAULT_FONT_SIZE),
        font: non_empty(root.attribute("font")),
        bold_font: non_empty(root.attribute("bold-font")),
        title: non_empty(root.attribute("title")),
        blocks: parse_blocks(root, false)?,
    })
}

fn parse_blocks(parent: Node<'_, '_>, in_column: bool) -> Result<Vec<Block>, MarkupError> {
    let mut blocks = Vec::new();
    for child in parent.children() {
        if child.is_text() {
            let text = child.text().unwrap_or("");
            if !is_blank(text) {
                let runs = collapse_runs(vec![Run::Text {
                    text: text.to_string(),
                    bold: false,
                }]);
                blocks.push(Block::Paragraph(Paragraph {
                    runs,
                    ..Paragraph::default()
                }));
            }
            continue;
        }
        if !child.is_element() {
            continue;
        }
        let name = child.tag_name().name();
        let block = match name {
            "heading" => Block::Heading(parse_heading(child)?),
            "p" => Block::Paragraph(parse_paragraph(child)?),
            "ul" => Block::List(parse_list(child)?),
            "hr" => Block::Rule {
                color: attr(child, "color")?.unwrap_or(Color::BLACK),
                thickness: positive(child, "thickness")?.unwrap_or(DEFAULT_RULE),
            },
            "spacer" => Block::Spacer(length(child, "height")?.unwrap_or(DEFAULT_SPACER)),
            "image" => Block::Image(parse_image(child)?),
            "pagebreak" | "row" | "table" if in_column => {
                return Err(misplaced(child, parent));
            }
            "pagebreak" => Block::PageBreak,
            "row" => Block::Row(parse_row(child)?),
            "table" => Block::Table(parse_table(child)?),
            _ => return Err(unknown(child, parent)),
        };
        blocks.push(block);
    }
    Ok(blocks)
}

fn parse_heading(node: Node<'_, '_>) -> Result<Heading, MarkupError> {
    let level: u8 = attr(node, "level")?.unwrap_or(2);
    if !(1..=3).contains(&level) {
        return Err(bad_attribute(node, "level"));
    }
    Ok(Heading {
        level,
        paragraph: parse_paragraph(node)?,
        rule: attr(node, "rule")?.unwrap_or(false),
    })
}

fn parse_paragraph(node: Node<'_, '_>) -> Result<Paragraph, MarkupError> {
    let bold = attr(node, "bold")?.unwrap_or(false);
    let mut raw = Vec::new();
    parse_inline(node, bold, &mut raw)?;
    Ok(Paragraph {
        runs: collapse_runs(raw),
        align: attr(node, "align")?.unwrap_or_default(),
        size: positive(node, "size")?,
        color: attr(node, "color")?,
        bold,
    })
}

fn parse_inline(node: Node<'_, '_>, bold: bool, out: &mut Vec<Run>) -> Result<(), MarkupError> {
    for child in node.children() {
        if child.is_text() {
            out.push(Run::Text {
                text: child.text().unwrap_or("").to_string(),
                bold,
            });
        } else if child.is_element() {
            match child.tag_name().name() {
                "b" | "strong" => parse_inline(child, true, out)?,
                "br" => out.push(Run::Break),
                _ => parse_inline(child, bold, out)?,
            }
        }
    }
    Ok(())
}

fn parse_list(node: Node<'_, '_>) -> Result<Vec<Paragraph>, MarkupError> {
    let mut items = Vec::new();
    for child in element_children(node)? {
        match child.tag_name().name() {
            "li" => items.push(parse_paragraph(child)?),
            _ => return Err(unknown(child, node)),
        }
    }
    Ok(items)
}

fn parse_image(node: Node<'_, '_>) -> Result<ImageBlock, MarkupError> {
    let src = node
        .attribute("src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MarkupError::MissingAttribute {
            element: "image".into(),
            attr: "src",
        })?;
    Ok(ImageBlock {
        src: src.to_string(),
        width: positive(node, "width")?,
        height: positive(node, "height")?,
        align: attr(node, "align")?.unwrap_or_default(),
    })
}

fn parse_row(node: Node<'_, '_>) -> Result<Row, MarkupError> {
    let mut columns = Vec::new();
    for child in element_children(node)? {
        match child.tag_name().name() {
            "col" => columns.push(Column {
                weight: positive(child, "width")?.unwrap_or(1.0),
                blocks: parse_blocks(child, true)?,
            }),
            _ => return Err(unknown(child, node)),
        }
    }
    Ok(Row {
        gap: length(node, "gap")?.unwrap_or(DEFAULT_GAP),
        columns,
    })
}

fn parse_table(node: Node<'_, '_>) -> Result<Table, MarkupError> {
    let mut rows = Vec::new();
    for child in element_children(node)? {
        match child.tag_name().name() {
            "tr" => {
                let mut cells = Vec::new();
                for cell in element_children(child)? {
                    match cell.tag_name().name() {
                        "td" | "th" => cells.push(parse_paragraph(cell)?),
                        _ => return Err(unknown(cell, child)),
                    }
                }
                rows.push(TableRow {
                    header: attr(child, "header")?.unwrap_or(false),
                    cells,
                });
            }
            _ => return Err(unknown(child, node)),
        }
    }

    let widths = match node.attribute("widths") {
        Some(raw) => raw
            .split(',')
            .map(|w| w.trim().parse::<f32>().ok().filter(|w| w.is_finite() && *w > 0.0))
            .collect::<Option<Vec<_>>>()
            .filter(|w| !w.is_empty())
            .ok_or_else(|| bad_attribute(node, "widths"))?,
        None => {
            let columns = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
            vec![1.0; columns]
        }
    };

    Ok(Table {
        widths,
        border: attr(node, "border")?.unwrap_or(true),
        rows,
    })
}

/// Element children of a container that only holds elements.
fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> Result<Vec<Node<'a, 'input>>, MarkupError> {
    let mut out = Vec::new();
    for child in node.children() {
        if child.is_element() {
            out.push(child);
        } else if child.is_text() && !is_blank(child.text().unwrap_or("")) {
            return Err(MarkupError::Misplaced {
                name: "text".into(),
                parent: node.tag_name().name().to_string(),
            });
        }
    }
    Ok(out)
}

// ── Attributes ───────────────────────────────────────────────────────────

fn attr<T: FromStr>(node: Node<'_, '_>, name: &'static str) -> Result<Option<T>, MarkupError> {
    match node.attribute(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| bad_attribute(node, name)),
    }
}

/// Non-negative finite length in points.
fn length(node: Node<'_, '_>, name: &'static str) -> Result<Option<f32>, MarkupError> {
    match attr::<f32>(node, name)? {
        Some(v) if !v.is_finite() || v < 0.0 => Err(bad_attribute(node, name)),
        other => Ok(other),
    }
}

fn positive(node: Node<'_, '_>, name: &'static str) -> Result<Option<f32>, MarkupError> {
    match length(node, name)? {
        Some(v) if v == 0.0 => Err(bad_attribute(node, name)),
        other => Ok(other),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

fn bad_attribute(node: Node<'_, '_>, name: &'static str) -> MarkupError {
    MarkupError::BadAttribute {
        element: node.tag_name().name().to_string(),
        attr: name,
        value: node.attribute(name).unwrap_or_default().to_string(),
    }
}

fn unknown(node: Node<'_, '_>, parent: Node<'_, '_>) -> MarkupError {
    MarkupError::UnknownElement {
        name: node.tag_name().name().to_string(),
        parent: parent.tag_name().name().to_string(),
    }
}

fn misplaced(node: Node<'_, '_>, parent: Node<'_, '_>) -> MarkupError {
    MarkupError::Misplaced {
        name: node.tag_name().name().to_string(),
        parent: parent.tag_name().name().to_string(),
    }
}

// ── Text ─────────────────────────────────────────────────────────────────

/// XML whitespace. Non-breaking spaces are content, not layout.
fn is_collapsible(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

fn is_blank(text: &str) -> bool {
    text.chars().all(is_collapsible)
}

/// Collapse whitespace runs to one space, trim at line edges and merge
/// neighbouring runs of the same weight.
fn collapse_runs(raw: Vec<Run>) -> Vec<Run> {
    let mut out: Vec<Run> = Vec::new();
    let mut line_start = true;
    for run in raw {
        match run {
            Run::Break => {
                trim_trailing(&mut out);
                out.push(Run::Break);
                line_start = true;
            }
            Run::Text { text, bold } => {
                let mut prev_space = line_start
                    || matches!(out.last(), Some(Run::Text { text, .. }) if text.ends_with(' '));
                let mut collapsed = String::with_capacity(text.len());
                for ch in text.chars() {
                    if is_collapsible(ch) {
                        if !prev_space {
                            collapsed.push(' ');
                            prev_space = true;
                        }
                    } else {
                        collapsed.push(ch);
                        prev_space = false;
                    }
                }
                if !collapsed.is_empty() {
                    line_start = false;
                    match out.last_mut() {
                        Some(Run::Text { text: last, bold: b }) if *b == bold => {
                            last.push_str(&collapsed)
                        }
                        _ => out.push(Run::Text {
                            text: collapsed,
                            bold,
                        }),
                    }
                }
            }
        }
    }
    trim_trailing(&mut out);
    out
}

fn trim_trailing(runs: &mut Vec<Run>) {
    while let Some(Run::Text { text, .. }) = runs.last_mut() {
        let trimmed_len = text.trim_end_matches(' ').len();
        text.truncate(trimmed_len);
        if !text.is_empty() {
            break;
        }
        runs.pop();
    }
}

// ── Source repair ────────────────────────────────────────────────────────

/// A comment, a processing instruction, or a start, end or empty-element
/// tag with well-formed attributes, anchored at a `<`.
static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?s:<!--.*?-->|<\?.*?\?>|<(/?)([A-Za-z_][A-Za-z0-9_.:-]*)((?:\s+[^\s=/>"']+\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(/?)>)"#,
    )
    .unwrap()
});

/// HTML elements that never have content.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img"];

/// Escape every `<` that does not start a tag, and balance the tags that
/// remain. An end tag closes any elements still open inside it; an end tag
/// with nothing to close is kept as text. `<br>` needs no end tag.
pub fn repair_tags(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut open: Vec<&str> = Vec::new();
    let mut rest = source;
    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let at = &rest[pos..];
        let Some(caps) = TAG.captures(at) else {
            out.push_str("&lt;");
            rest = &at[1..];
            continue;
        };
        let token = caps.get(0).map_or("", |m| m.as_str());
        rest = &at[token.len()..];

        let Some(name) = caps.get(2).map(|m| m.as_str()) else {
            out.push_str(token);
            continue;
        };
        let flag = |i: usize| caps.get(i).is_some_and(|m| !m.as_str().trim().is_empty());
        let (closing, attributes, empty) = (flag(1), flag(3), flag(4));
        let void = VOID_ELEMENTS.contains(&name);

        if !closing {
            if void && !empty {
                out.push_str(&token[..token.len() - 1]);
                out.push_str("/>");
            } else {
                if !empty {
                    open.push(name);
                }
                out.push_str(token);
            }
        } else if void {
            // `</br>` is dropped.
        } else if !attributes && !empty && open.contains(&name) {
            while let Some(inner) = open.pop() {
                if inner == name {
                    break;
                }
                out.push_str("</");
                out.push_str(inner);
                out.push('>');
            }
            out.push_str(token);
        } else {
            out.push_str("&lt;");
            out.push_str(&token[1..]);
        }
    }
    out.push_str(rest);
    out
}

/// HTML named entities accepted in field content.
const HTML_ENTITIES: &[(&str, &str)] = &[
    ("nbsp", "&#160;"),
    ("bull", "&#8226;"),
    ("middot", "&#183;"),
    ("ndash", "&#8211;"),
    ("mdash", "&#8212;"),
    ("copy", "&#169;"),
];

const XML_ENTITIES: &[&str] = &["amp", "lt", "gt", "quot", "apos"];

/// Escape every `&` that does not start a well-formed reference, and map
/// common HTML named entities to numeric references.
pub fn repair_entities(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match entity_name(after) {
            Some(name) if XML_ENTITIES.contains(&name) || name.starts_with('#') => {
                out.push('&');
            }
            Some(name) => match HTML_ENTITIES.iter().find(|(n, _)| *n == name) {
                Some((_, numeric)) => {
                    out.push_str(numeric);
                    rest = &after[name.len() + 1..];
                    continue;
                }
                None => out.push_str("&amp;"),
            },
            None => out.push_str("&amp;"),
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

/// `name` in `name;` at the start of `s`, if it is a plausible reference.
fn entity_name(s: &str) -> Option<&str> {
    let end = s.find(';')?;
    let name = &s[..end];
    let body = name.strip_prefix('#').unwrap_or(name);
    let valid = match body.strip_prefix('x').filter(|_| name.starts_with('#')) {
        Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => !body.is_empty() && body.chars().all(|c| c.is_ascii_alphanumeric()),
    };
    valid.then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Run {
        Run::Text {
            text: s.into(),
            bold: false,
        }
    }

    #[test]
    fn parses_document_attributes() {
        let m = parse(r#"<document page="Letter" margin="36" size="11" title="CV"/>"#).unwrap();
        assert_eq!(m.page, PageSize::Letter);
        assert_eq!(m.margin, 36.0);
        assert_eq!(m.font_size, 11.0);
        assert_eq!(m.title.as_deref(), Some("CV"));
        assert!(m.font.is_none());
        assert!(m.blocks.is_empty());

        let m = parse(r#"<document font="/f/r.ttf" bold-font="/f/b.ttf"/>"#).unwrap();
        assert_eq!(m.font.as_deref(), Some("/f/r.ttf"));
        assert_eq!(m.bold_font.as_deref(), Some("/f/b.ttf"));
    }

    #[test]
    fn collapses_whitespace_like_html() {
        let m = parse("<document><p>\n   Hello\n   <b> big </b>  world  <br/>  next </p></document>").unwrap();
        let Block::Paragraph(p) = &m.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            p.runs,
            vec![
                text("Hello "),
                Run::Text {
                    text: "big ".into(),
                    bold: true
                },
                text("world"),
                Run::Break,
                text("next"),
            ]
        );
    }

    #[test]
    fn empty_paragraph_has_no_runs() {
        let m = parse("<document><p>   </p></document>").unwrap();
        let Block::Paragraph(p) = &m.blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(p.is_empty());
    }

    #[test]
    fn repairs_bare_ampersands() {
        assert_eq!(repair_entities("R&D &amp; QA"), "R&amp;D &amp; QA");
        assert_eq!(repair_entities("a &#8226; b &#x2022;"), "a &#8226; b &#x2022;");
        assert_eq!(repair_entities("x&nbsp;y"), "x&#160;y");
        assert_eq!(repair_entities("AT&T; done"), "AT&amp;T; done");
        assert_eq!(repair_entities("tail&"), "tail&amp;");

        let m = parse("<document><p>R&D &bull; Ops</p></document>").unwrap();
        let Block::Paragraph(p) = &m.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.runs, vec![text("R&D • Ops")]);
    }

    #[test]
    fn table_and_row_structure() {
        let m = parse(
            r#"<document>
                <row gap="8"><col width="2"><p>L</p></col><col><image src="logo.png" width="40"/></col></row>
                <table widths="3,1"><tr header="true"><td>Course</td><td>Year</td></tr><tr><td>BSc</td><td>2017</td></tr></table>
            </document>"#,
        )
        .unwrap();
        let Block::Row(row) = &m.blocks[0] else {
            panic!("expected row");
        };
        assert_eq!(row.gap, 8.0);
        assert_eq!(row.columns[0].weight, 2.0);
        assert_eq!(row.columns[1].weight, 1.0);
        assert!(matches!(&row.columns[1].blocks[0], Block::Image(img) if img.src == "logo.png"));

        let Block::Table(table) = &m.blocks[1] else {
            panic!("expected table");
        };
        assert_eq!(table.widths, vec![3.0, 1.0]);
        assert!(table.rows[0].header);
        assert_eq!(table.rows[1].cells.len(), 2);
    }

    fn paragraph(source: &str) -> Paragraph {
        match parse(source).unwrap().blocks.into_iter().next() {
            Some(Block::Paragraph(p)) => p,
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn unknown_block_element_is_an_error() {
        let err = parse("<document><blink>hi</blink></document>").unwrap_err();
        assert!(matches!(err, MarkupError::UnknownElement { ref name, .. } if name == "blink"));
    }

    #[test]
    fn unknown_inline_elements_render_their_text() {
        let p = paragraph("<document><p>Reading <i>sci-fi</i>, <u>chess</u></p></document>");
        assert_eq!(p.runs, vec![text("Reading sci-fi, chess")]);

        let p = paragraph("<document><p><b>Lead <em>R&amp;D</em></b> teams</p></document>");
        assert_eq!(
            p.runs,
            vec![
                Run::Text {
                    text: "Lead R&D".into(),
                    bold: true
                },
                text(" teams"),
            ]
        );
    }

    #[test]
    fn bare_less_than_is_text() {
        assert_eq!(repair_tags("<p>a < 5 ms</p>"), "<p>a &lt; 5 ms</p>");
        assert_eq!(repair_tags("<p>x<y, <3, a<-b</p>"), "<p>x&lt;y, &lt;3, a&lt;-b</p>");
        assert_eq!(repair_tags("<p>1 <2> 3</p>"), "<p>1 &lt;2> 3</p>");

        let p = paragraph("<document><p>Cut latency to < 5 ms</p></document>");
        assert_eq!(p.runs, vec![text("Cut latency to < 5 ms")]);
    }

    #[test]
    fn tags_are_balanced_like_html() {
        assert_eq!(repair_tags("<p>a <b>bold</p>"), "<p>a <b>bold</b></p>");
        assert_eq!(repair_tags("<p>a</i> b</p>"), "<p>a&lt;/i> b</p>");
        assert_eq!(repair_tags("<p>one<br>two</br></p>"), "<p>one<br/>two</p>");
        assert_eq!(
            repair_tags(r##"<?xml version="1.0"?><!-- <x> --><hr color="#000"/>"##),
            r##"<?xml version="1.0"?><!-- <x> --><hr color="#000"/>"##
        );

        let p = paragraph("<document><p>Owned <b>billing</p></document>");
        assert_eq!(
            p.runs,
            vec![
                text("Owned "),
                Run::Text {
                    text: "billing".into(),
                    bold: true
                },
            ]
        );
        let p = paragraph("<document><p>a</strong> b</p></document>");
        assert_eq!(p.runs, vec![text("a</strong> b")]);
    }

    #[test]
    fn bad_attributes_are_errors() {
        assert!(matches!(
            parse(r#"<document page="A5"/>"#),
            Err(MarkupError::BadAttribute { attr: "page", .. })
        ));
        assert!(matches!(
            parse(r#"<document><heading level="7">x</heading></document>"#),
            Err(MarkupError::BadAttribute { attr: "level", .. })
        ));
        assert!(matches!(
            parse(r#"<document><p color="red">x</p></document>"#),
            Err(MarkupError::BadAttribute { attr: "color", .. })
        ));
        assert!(matches!(
            parse(r#"<document><image/></document>"#),
            Err(MarkupError::MissingAttribute { attr: "src", .. })
        ));
    }

    #[test]
    fn structural_errors() {
        assert!(matches!(parse("<page/>"), Err(MarkupError::Root(_))));
        assert!(matches!(parse("<document><p>"), Err(MarkupError::Xml(_))));
        assert!(matches!(parse("<document"), Err(MarkupError::Xml(_))));
        assert!(matches!(
            parse("<document><row><col><pagebreak/></col></row></document>"),
            Err(MarkupError::Misplaced { .. })
        ));
        assert!(matches!(
            parse("<document><ul>loose</ul></document>"),
            Err(MarkupError::Misplaced { .. })
        ));
    }

    #[test]
    fn colors() {
        assert_eq!("#1f4e79".parse::<Color>(), Ok(Color([0x1f, 0x4e, 0x79])));
        assert_eq!("#fff".parse::<Color>(), Ok(Color([255, 255, 255])));
        assert!("1f4e79".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
    }
}
