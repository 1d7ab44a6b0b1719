//! Layout: flow a [`Markup`] tree onto fixed-size pages.
//!
//! Blocks are first turned into *bands*: horizontal strips that are never
//! split across pages (one line of a paragraph, one table row, one `row` of
//! columns, an image). Pagination then stacks bands top to bottom and starts
//! a new page whenever the next band would cross the bottom margin.
//! Vertical spacing is carried by separate space bands, which are dropped at
//! the top of a page.
//!
//! Coordinates are in points with the origin at the top-left corner of the
//! page and y growing downwards; the PDF writer flips them.

use crate::assets::{AssetError, RasterImage};
use crate::pipeline::fonts::FontSet;
use crate::pipeline::markup::{
    Align, Block, Color, Heading, ImageBlock, Markup, Paragraph, Row, Run, Table,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const LINE_HEIGHT: f32 = 1.3;
const EPS: f32 = 0.01;
const CELL_PADDING: f32 = 4.0;
const LIST_INDENT: f32 = 14.0;
const HEADER_FILL: Color = Color([0xE6, 0xE6, 0xE6]);
const BORDER: Color = Color([0x99, 0x99, 0x99]);

/// Resolves `image` sources to decoded pixels.
pub trait ImageResolver {
    fn resolve(&self, src: &str) -> Result<Arc<RasterImage>, AssetError>;
}

/// A positioned drawing primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// `y` is the text baseline.
    Text {
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        color: Color,
        text: String,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: Color,
    },
    /// `(x, y)` is the top-left corner.
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        fill: Option<Color>,
        stroke: Option<Color>,
    },
    /// `index` points into [`PageLayout::images`].
    Image {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        index: usize,
    },
}

impl Item {
    fn shifted(mut self, dy: f32) -> Self {
        match &mut self {
            Item::Text { y, .. } | Item::Rect { y, .. } | Item::Image { y, .. } => *y += dy,
            Item::Line { y1, y2, .. } => {
                *y1 += dy;
                *y2 += dy;
            }
        }
        self
    }
}

/// Finished layout, ready for the PDF writer.
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    /// Never empty.
    pub pages: Vec<Vec<Item>>,
    /// Distinct images, in first-use order.
    pub images: Vec<Arc<RasterImage>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BandKind {
    Content,
    Space,
    PageBreak,
}

#[derive(Debug, Clone)]
struct Band {
    height: f32,
    kind: BandKind,
    /// y relative to the band's top edge.
    items: Vec<Item>,
}

impl Band {
    fn content(height: f32, items: Vec<Item>) -> Self {
        Self {
            height,
            kind: BandKind::Content,
            items,
        }
    }

    fn space(height: f32) -> Self {
        Self {
            height,
            kind: BandKind::Space,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    size: f32,
    bold: bool,
    color: Color,
    align: Align,
}

/// Lay out `markup` with the given fonts and image source.
pub fn layout(
    markup: &Markup,
    fonts: &FontSet,
    resolver: &dyn ImageResolver,
) -> Result<PageLayout, AssetError> {
    let (width, height) = markup.page.dimensions();
    // Keep at least a sliver of content area on absurd margins.
    let margin = markup.margin.min(width / 2.0 - 36.0).max(0.0);

    let mut engine = LayoutEngine {
        fonts,
        resolver,
        base_size: markup.font_size,
        images: Vec::new(),
        image_ids: HashMap::new(),
    };
    let mut bands = Vec::new();
    engine.blocks(&markup.blocks, margin, width - 2.0 * margin, &mut bands)?;

    let pages = paginate(bands, margin, height - margin);
    debug!(
        "Laid out {} page(s), {} image(s)",
        pages.len(),
        engine.images.len()
    );
    Ok(PageLayout {
        width,
        height,
        pages,
        images: engine.images,
    })
}

fn paginate(bands: Vec<Band>, top: f32, bottom: f32) -> Vec<Vec<Item>> {
    let mut pages: Vec<Vec<Item>> = vec![Vec::new()];
    let mut cursor = top;
    let mut empty = true;

    for band in bands {
        match band.kind {
            BandKind::PageBreak => {
                if !empty {
                    pages.push(Vec::new());
                    cursor = top;
                    empty = true;
                }
            }
            BandKind::Space => {
                if !empty {
                    cursor += band.height;
                }
            }
            BandKind::Content => {
                if !empty && cursor + band.height > bottom + EPS {
                    pages.push(Vec::new());
                    cursor = top;
                }
                let offset = cursor;
                if let Some(page) = pages.last_mut() {
                    page.extend(band.items.into_iter().map(|item| item.shifted(offset)));
                }
                cursor += band.height;
                empty = false;
            }
        }
    }
    pages
}

struct LayoutEngine<'a> {
    fonts: &'a FontSet,
    resolver: &'a dyn ImageResolver,
    base_size: f32,
    images: Vec<Arc<RasterImage>>,
    image_ids: HashMap<String, Option<usize>>,
}

impl LayoutEngine<'_> {
    fn blocks(
        &mut self,
        blocks: &[Block],
        x: f32,
        width: f32,
        out: &mut Vec<Band>,
    ) -> Result<(), AssetError> {
        for block in blocks {
            match block {
                Block::Heading(h) => self.heading(h, x, width, out),
                Block::Paragraph(p) => {
                    if !p.is_empty() {
                        let style = self.style(p, false);
                        out.extend(self.text_bands(&p.runs, style, x, width));
                        out.push(Band::space(style.size * 0.5));
                    }
                }
                Block::List(items) => self.list(items, x, width, out),
                Block::Rule { color, thickness } => {
                    let y = 3.0 + thickness / 2.0;
                    out.push(Band::content(
                        thickness + 6.0,
                        vec![Item::Line {
                            x1: x,
                            y1: y,
                            x2: x + width,
                            y2: y,
                            width: *thickness,
                            color: *color,
                        }],
                    ));
                }
                Block::Spacer(h) => out.push(Band::space(*h)),
                Block::PageBreak => out.push(Band {
                    height: 0.0,
                    kind: BandKind::PageBreak,
                    items: Vec::new(),
                }),
                Block::Image(img) => {
                    if let Some(band) = self.image(img, x, width)? {
                        out.push(band);
                    }
                }
                Block::Row(row) => {
                    out.push(self.row(row, x, width)?);
                    out.push(Band::space(4.0));
                }
                Block::Table(table) => {
                    self.table(table, x, width, out);
                    out.push(Band::space(6.0));
                }
            }
        }
        Ok(())
    }

    fn style(&self, p: &Paragraph, bold: bool) -> TextStyle {
        TextStyle {
            size: p.size.unwrap_or(self.base_size),
            bold: bold || p.bold,
            color: p.color.unwrap_or(Color::BLACK),
            align: p.align,
        }
    }

    fn heading(&self, h: &Heading, x: f32, width: f32, out: &mut Vec<Band>) {
        let scale = match h.level {
            1 => 2.0,
            2 => 1.3,
            _ => 1.1,
        };
        let mut style = self.style(&h.paragraph, true);
        if h.paragraph.size.is_none() {
            style.size = self.base_size * scale;
        }

        out.push(Band::space(style.size * 0.5));
        let mut bands = self.text_bands(&h.paragraph.runs, style, x, width);
        if h.rule {
            match bands.last_mut() {
                Some(last) => {
                    let y = last.height + 1.0;
                    last.items.push(Item::Line {
                        x1: x,
                        y1: y,
                        x2: x + width,
                        y2: y,
                        width: 0.75,
                        color: style.color,
                    });
                    last.height += 3.0;
                }
                None => bands.push(Band::content(
                    3.0,
                    vec![Item::Line {
                        x1: x,
                        y1: 1.0,
                        x2: x + width,
                        y2: 1.0,
                        width: 0.75,
                        color: style.color,
                    }],
                )),
            }
        }
        out.extend(bands);
        out.push(Band::space(style.size * 0.25));
    }

    fn list(&self, items: &[Paragraph], x: f32, width: f32, out: &mut Vec<Band>) {
        let mut any = false;
        for item in items.iter().filter(|p| !p.is_empty()) {
            let style = self.style(item, false);
            let mut bands = self.text_bands(&item.runs, style, x + LIST_INDENT, width - LIST_INDENT);
            if let Some(first) = bands.first_mut() {
                first.items.push(Item::Text {
                    x: x + LIST_INDENT * 0.35,
                    y: self.baseline(style.size),
                    size: style.size,
                    bold: false,
                    color: style.color,
                    text: "•".into(),
                });
            }
            out.extend(bands);
            out.push(Band::space(1.5));
            any = true;
        }
        if any {
            out.push(Band::space(self.base_size * 0.4));
        }
    }

    fn image(
        &mut self,
        img: &ImageBlock,
        x: f32,
        width: f32,
    ) -> Result<Option<Band>, AssetError> {
        let Some(index) = self.image_index(&img.src)? else {
            return Ok(None);
        };
        let raster = &self.images[index];
        let aspect = raster.height as f32 / raster.width.max(1) as f32;

        let (mut w, mut h) = match (img.width, img.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * aspect),
            (None, Some(h)) => (h / aspect.max(f32::EPSILON), h),
            // 96 dpi → points
            (None, None) => (raster.width as f32 * 0.75, raster.height as f32 * 0.75),
        };
        if w > width {
            h *= width / w;
            w = width;
        }
        let ix = match img.align {
            Align::Left => x,
            Align::Center => x + (width - w) / 2.0,
            Align::Right => x + width - w,
        };
        Ok(Some(Band::content(
            h + 4.0,
            vec![Item::Image {
                x: ix,
                y: 2.0,
                w,
                h,
                index,
            }],
        )))
    }

    /// Decode each distinct source once. Undecodable inline images are
    /// skipped; anything else is fatal.
    fn image_index(&mut self, src: &str) -> Result<Option<usize>, AssetError> {
        if let Some(id) = self.image_ids.get(src) {
            return Ok(*id);
        }
        let id = match self.resolver.resolve(src) {
            Ok(raster) => {
                self.images.push(raster);
                Some(self.images.len() - 1)
            }
            Err(e) if e.is_skippable() => {
                warn!("Skipping image: {}", e);
                None
            }
            Err(e) => return Err(e),
        };
        self.image_ids.insert(src.to_string(), id);
        Ok(id)
    }

    fn row(&mut self, row: &Row, x: f32, width: f32) -> Result<Band, AssetError> {
        let n = row.columns.len();
        if n == 0 {
            return Ok(Band::content(0.0, Vec::new()));
        }
        let total_weight: f32 = row.columns.iter().map(|c| c.weight).sum();
        let available = (width - row.gap * (n as f32 - 1.0)).max(0.0);

        let mut items = Vec::new();
        let mut height: f32 = 0.0;
        let mut cx = x;
        for col in &row.columns {
            let cw = available * col.weight / total_weight;
            let mut bands = Vec::new();
            self.blocks(&col.blocks, cx, cw, &mut bands)?;
            let col_height = stack(bands, &mut items);
            height = height.max(col_height);
            cx += cw + row.gap;
        }
        Ok(Band::content(height, items))
    }

    fn table(&self, table: &Table, x: f32, width: f32, out: &mut Vec<Band>) {
        let total: f32 = table.widths.iter().sum();
        let widths: Vec<f32> = table.widths.iter().map(|w| width * w / total).collect();

        for row in table.rows.iter().filter(|r| !r.cells.is_empty()) {
            if row.cells.len() > widths.len() {
                debug!(
                    "Table row has {} cells for {} columns; extra cells dropped",
                    row.cells.len(),
                    widths.len()
                );
            }
            let mut cells = Vec::with_capacity(widths.len());
            let mut inner_height: f32 = 0.0;
            let mut cx = x;
            for (i, cw) in widths.iter().enumerate() {
                let mut items = Vec::new();
                if let Some(cell) = row.cells.get(i) {
                    let style = self.style(cell, row.header);
                    let bands = self.text_bands(
                        &cell.runs,
                        style,
                        cx + CELL_PADDING,
                        (cw - 2.0 * CELL_PADDING).max(1.0),
                    );
                    inner_height = inner_height.max(stack(bands, &mut items));
                }
                cells.push((cx, *cw, items));
                cx += cw;
            }

            let row_height = inner_height + 2.0 * CELL_PADDING;
            let mut items = Vec::new();
            for (cx, cw, cell_items) in cells {
                if row.header || table.border {
                    items.push(Item::Rect {
                        x: cx,
                        y: 0.0,
                        w: cw,
                        h: row_height,
                        fill: row.header.then_some(HEADER_FILL),
                        stroke: table.border.then_some(BORDER),
                    });
                }
                items.extend(cell_items.into_iter().map(|i| i.shifted(CELL_PADDING)));
            }
            out.push(Band::content(row_height, items));
        }
    }

    fn baseline(&self, size: f32) -> f32 {
        let ascent = self.fonts.regular.ascent_ratio() * size;
        (LINE_HEIGHT * size - size) / 2.0 + ascent
    }

    /// One band per wrapped line.
    fn text_bands(&self, runs: &[Run], style: TextStyle, x: f32, width: f32) -> Vec<Band> {
        let lines = self.wrap(tokenize(runs, style.bold), width, style.size);
        let line_height = style.size * LINE_HEIGHT;
        let baseline = self.baseline(style.size);

        lines
            .into_iter()
            .map(|line| {
                let offset = match style.align {
                    Align::Left => 0.0,
                    Align::Center => ((width - line.width) / 2.0).max(0.0),
                    Align::Right => (width - line.width).max(0.0),
                };
                let items = line
                    .pieces
                    .into_iter()
                    .map(|piece| Item::Text {
                        x: x + offset + piece.x,
                        y: baseline,
                        size: style.size,
                        bold: piece.bold,
                        color: style.color,
                        text: piece.text,
                    })
                    .collect();
                Band::content(line_height, items)
            })
            .collect()
    }

    fn wrap(&self, tokens: Vec<Token>, width: f32, size: f32) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut line = Line::default();
        for token in tokens {
            let word = match token {
                Token::Break => {
                    lines.push(std::mem::take(&mut line));
                    continue;
                }
                Token::Word(word) => word,
            };
            for word in self.fit_word(word, width, size) {
                let word_width = self.word_width(&word, size);
                let space = if word.space_before && !line.pieces.is_empty() {
                    self.fonts.text_width(" ", word.fragments[0].bold, size)
                } else {
                    0.0
                };
                if !line.pieces.is_empty() && line.width + space + word_width > width + EPS {
                    lines.push(std::mem::take(&mut line));
                    line.append(word, 0.0, self.fonts, size);
                } else {
                    line.append(word, space, self.fonts, size);
                }
            }
        }
        if !line.pieces.is_empty() {
            lines.push(line);
        }
        lines
    }

    fn word_width(&self, word: &Word, size: f32) -> f32 {
        word.fragments
            .iter()
            .map(|f| self.fonts.text_width(&f.text, f.bold, size))
            .sum()
    }

    /// Split a word wider than the line into line-sized pieces.
    fn fit_word(&self, word: Word, width: f32, size: f32) -> Vec<Word> {
        if self.word_width(&word, size) <= width + EPS {
            return vec![word];
        }
        let mut out = Vec::new();
        let mut current = Word {
            fragments: Vec::new(),
            space_before: word.space_before,
        };
        let mut current_width = 0.0;
        for frag in word.fragments {
            for ch in frag.text.chars() {
                let mut buf = [0u8; 4];
                let w = self.fonts.text_width(ch.encode_utf8(&mut buf), frag.bold, size);
                if current_width + w > width + EPS && !current.fragments.is_empty() {
                    out.push(std::mem::replace(
                        &mut current,
                        Word {
                            fragments: Vec::new(),
                            space_before: false,
                        },
                    ));
                    current_width = 0.0;
                }
                current.push_char(ch, frag.bold);
                current_width += w;
            }
        }
        if !current.fragments.is_empty() {
            out.push(current);
        }
        out
    }
}

/// Stack bands vertically from y = 0, dropping leading space.
/// Returns the total height.
fn stack(bands: Vec<Band>, out: &mut Vec<Item>) -> f32 {
    let mut cursor = 0.0;
    let mut content_end: f32 = 0.0;
    for band in bands {
        match band.kind {
            BandKind::Space if cursor == 0.0 => {}
            BandKind::Space | BandKind::PageBreak => cursor += band.height,
            BandKind::Content => {
                let offset = cursor;
                out.extend(band.items.into_iter().map(|i| i.shifted(offset)));
                cursor += band.height;
                content_end = cursor;
            }
        }
    }
    content_end
}

// ── Words and lines ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Fragment {
    text: String,
    bold: bool,
}

/// Text between two spaces; may mix weights (`foo<b>bar</b>`).
#[derive(Debug, Clone)]
struct Word {
    fragments: Vec<Fragment>,
    space_before: bool,
}

impl Word {
    fn push_str(&mut self, text: &str, bold: bool) {
        match self.fragments.last_mut() {
            Some(last) if last.bold == bold => last.text.push_str(text),
            _ => self.fragments.push(Fragment {
                text: text.to_string(),
                bold,
            }),
        }
    }

    fn push_char(&mut self, ch: char, bold: bool) {
        let mut buf = [0u8; 4];
        self.push_str(ch.encode_utf8(&mut buf), bold);
    }
}

enum Token {
    Word(Word),
    Break,
}

fn tokenize(runs: &[Run], force_bold: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<Word> = None;
    let mut pending_space = false;

    for run in runs {
        match run {
            Run::Break => {
                if let Some(word) = current.take() {
                    tokens.push(Token::Word(word));
                }
                tokens.push(Token::Break);
                pending_space = false;
            }
            Run::Text { text, bold } => {
                let bold = *bold || force_bold;
                for (i, part) in text.split(' ').enumerate() {
                    if i > 0 {
                        if let Some(word) = current.take() {
                            tokens.push(Token::Word(word));
                        }
                        pending_space = true;
                    }
                    if part.is_empty() {
                        continue;
                    }
                    match current.as_mut() {
                        Some(word) => word.push_str(part, bold),
                        None => {
                            current = Some(Word {
                                fragments: vec![Fragment {
                                    text: part.to_string(),
                                    bold,
                                }],
                                space_before: pending_space,
                            });
                            pending_space = false;
                        }
                    }
                }
            }
        }
    }
    if let Some(word) = current {
        tokens.push(Token::Word(word));
    }
    tokens
}

#[derive(Debug, Clone)]
struct Piece {
    /// Offset from the line start.
    x: f32,
    text: String,
    bold: bool,
}

#[derive(Debug, Clone, Default)]
struct Line {
    pieces: Vec<Piece>,
    width: f32,
}

impl Line {
    /// Adjacent text of the same weight is merged into one piece so spaces
    /// survive text extraction.
    fn append(&mut self, word: Word, space: f32, fonts: &FontSet, size: f32) {
        let mut lead = space;
        for frag in word.fragments {
            let w = fonts.text_width(&frag.text, frag.bold, size);
            match self.pieces.last_mut() {
                Some(last) if last.bold == frag.bold => {
                    if lead > 0.0 {
                        last.text.push(' ');
                    }
                    last.text.push_str(&frag.text);
                }
                _ => self.pieces.push(Piece {
                    x: self.width + lead,
                    text: frag.text,
                    bold: frag.bold,
                }),
            }
            self.width += lead + w;
            lead = 0.0;
        }
    }
}
