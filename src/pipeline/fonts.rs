//! Font metrics for layout and PDF embedding.
//!
//! The standard Helvetica faces are written as simple fonts with
//! `WinAnsiEncoding` and measured from their published metrics. A TrueType
//! resource is embedded whole and addressed by glyph id (`Identity-H`), so
//! any character its `cmap` covers can be drawn. Glyph lookup and advances
//! come from `ttf-parser`.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Substitute for characters outside WinAnsi.
const REPLACEMENT: u8 = b'?';

#[derive(Debug, Error)]
pub enum FontError {
    #[error("not a usable TrueType font: {0}")]
    Parse(String),
}

/// Where a face's glyphs come from.
#[derive(Debug, Clone)]
pub enum FaceSource {
    /// One of the 14 standard PDF fonts, referenced by `BaseFont` name.
    Standard,
    /// Embedded TrueType program.
    TrueType(Arc<[u8]>),
}

/// A glyph id and its advance in 1/1000 em.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub id: u16,
    pub advance: u16,
}

#[derive(Clone)]
enum Metrics {
    /// Advances indexed by WinAnsi code.
    WinAnsi([u16; 256]),
    /// Unicode coverage of an embedded face.
    Glyphs {
        map: Arc<HashMap<char, Glyph>>,
        notdef: Glyph,
    },
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metrics::WinAnsi(_) => f.write_str("WinAnsi"),
            Metrics::Glyphs { map, .. } => write!(f, "Glyphs({} chars)", map.len()),
        }
    }
}

/// A measured font face. All metrics are in 1/1000 em.
#[derive(Debug, Clone)]
pub struct Typeface {
    pub name: String,
    pub source: FaceSource,
    metrics: Metrics,
    pub ascent: f32,
    pub descent: f32,
    pub cap_height: f32,
    pub bbox: [f32; 4],
    pub italic_angle: f32,
}

impl Typeface {
    /// Helvetica or Helvetica-Bold.
    pub fn standard(bold: bool) -> Self {
        let ascii = if bold { HELVETICA_BOLD_ASCII } else { HELVETICA_ASCII };
        let mut widths = [if bold { 611 } else { 556 }; 256];
        for (i, w) in ascii.iter().enumerate() {
            widths[32 + i] = *w;
        }
        for (code, w) in [
            (0x80, 556),
            (0x85, 1000),
            (0x91, 222),
            (0x92, 222),
            (0x93, 333),
            (0x94, 333),
            (0x95, 350),
            (0x96, 556),
            (0x97, 1000),
            (0xA0, 278),
        ] {
            widths[code] = w;
        }
        Self {
            name: if bold { "Helvetica-Bold" } else { "Helvetica" }.to_string(),
            source: FaceSource::Standard,
            metrics: Metrics::WinAnsi(widths),
            ascent: 718.0,
            descent: -207.0,
            cap_height: 718.0,
            bbox: [-166.0, -225.0, 1000.0, 931.0],
            italic_angle: 0.0,
        }
    }

    /// Measure a TrueType font program.
    pub fn from_truetype(data: Vec<u8>) -> Result<Self, FontError> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|e| FontError::Parse(e.to_string()))?;
        let upem = face.units_per_em() as f32;
        if upem <= 0.0 {
            return Err(FontError::Parse("units-per-em is zero".into()));
        }
        let scale = |v: f32| v * 1000.0 / upem;
        let advance = |gid: ttf_parser::GlyphId| {
            face.glyph_hor_advance(gid)
                .map(|a| scale(a as f32).round() as u16)
        };

        let notdef = Glyph {
            id: 0,
            advance: advance(ttf_parser::GlyphId(0)).unwrap_or(500),
        };
        let mut map = HashMap::new();
        let subtables = face.tables().cmap.into_iter().flat_map(|cmap| cmap.subtables);
        for subtable in subtables.filter(|t| t.is_unicode()) {
            subtable.codepoints(|cp| {
                let Some(ch) = char::from_u32(cp) else { return };
                if map.contains_key(&ch) {
                    return;
                }
                if let Some(gid) = subtable.glyph_index(cp).filter(|g| g.0 != 0) {
                    let glyph = Glyph {
                        id: gid.0,
                        advance: advance(gid).unwrap_or(notdef.advance),
                    };
                    map.insert(ch, glyph);
                }
            });
        }
        if map.is_empty() {
            return Err(FontError::Parse("no Unicode cmap".into()));
        }

        let bb = face.global_bounding_box();
        let name = postscript_name(&face).unwrap_or_else(|| "EmbeddedFont".to_string());
        debug!("Loaded TrueType face {name} ({} units/em, {} chars)", upem, map.len());

        let ascent = scale(face.ascender() as f32);
        Ok(Self {
            name,
            ascent,
            descent: scale(face.descender() as f32),
            cap_height: face
                .capital_height()
                .map(|h| scale(h as f32))
                .unwrap_or(ascent),
            bbox: [
                scale(bb.x_min as f32),
                scale(bb.y_min as f32),
                scale(bb.x_max as f32),
                scale(bb.y_max as f32),
            ],
            italic_angle: face.italic_angle(),
            metrics: Metrics::Glyphs {
                map: Arc::new(map),
                notdef,
            },
            source: FaceSource::TrueType(Arc::from(data)),
        })
    }

    /// Glyph an embedded face draws for `ch`, and whether the font covers
    /// it. Uncovered characters draw `.notdef`. `None` for standard faces.
    pub fn glyph(&self, ch: char) -> Option<(Glyph, bool)> {
        let Metrics::Glyphs { map, notdef } = &self.metrics else {
            return None;
        };
        let ch = if ch == '\t' { ' ' } else { ch };
        Some(match map.get(&ch) {
            Some(glyph) => (*glyph, true),
            None => (*notdef, false),
        })
    }

    /// Advance of `.notdef`, the default width of an embedded face.
    pub fn notdef_advance(&self) -> u16 {
        match &self.metrics {
            Metrics::Glyphs { notdef, .. } => notdef.advance,
            Metrics::WinAnsi(widths) => widths[REPLACEMENT as usize],
        }
    }

    /// Whether the face can draw `ch` without substitution.
    pub fn covers(&self, ch: char) -> bool {
        match self.glyph(ch) {
            Some((_, covered)) => covered,
            None => ch == '\t' || win_ansi_code(ch).is_some(),
        }
    }

    /// Rendered width of `text` at `size` points.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = match &self.metrics {
            Metrics::WinAnsi(widths) => encode_win_ansi(text)
                .iter()
                .map(|&b| widths[b as usize] as u32)
                .sum(),
            Metrics::Glyphs { .. } => text
                .chars()
                .filter_map(|ch| self.glyph(ch))
                .map(|(g, _)| g.advance as u32)
                .sum(),
        };
        units as f32 * size / 1000.0
    }

    /// Ascent as a fraction of the em, clamped to a sane range.
    pub fn ascent_ratio(&self) -> f32 {
        (self.ascent / 1000.0).clamp(0.6, 1.0)
    }
}

/// Regular and bold faces used by one document.
#[derive(Debug, Clone)]
pub struct FontSet {
    pub regular: Arc<Typeface>,
    pub bold: Arc<Typeface>,
    /// Bold is the regular face drawn with a stroked outline.
    pub synthetic_bold: bool,
}

impl FontSet {
    pub fn standard() -> Self {
        Self {
            regular: Arc::new(Typeface::standard(false)),
            bold: Arc::new(Typeface::standard(true)),
            synthetic_bold: false,
        }
    }

    pub fn truetype(regular: Typeface, bold: Option<Typeface>) -> Self {
        let regular = Arc::new(regular);
        match bold {
            Some(bold) => Self {
                regular,
                bold: Arc::new(bold),
                synthetic_bold: false,
            },
            None => Self {
                bold: Arc::clone(&regular),
                regular,
                synthetic_bold: true,
            },
        }
    }

    /// The same regular face with synthetic bold. Standard sets keep
    /// Helvetica-Bold.
    pub fn without_bold(&self) -> Self {
        if matches!(self.regular.source, FaceSource::Standard) {
            return self.clone();
        }
        Self {
            regular: Arc::clone(&self.regular),
            bold: Arc::clone(&self.regular),
            synthetic_bold: true,
        }
    }

    pub fn face(&self, bold: bool) -> &Typeface {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }

    pub fn text_width(&self, text: &str, bold: bool, size: f32) -> f32 {
        self.face(bold).text_width(text, size)
    }
}

fn postscript_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    let name = face
        .names()
        .into_iter()
        .find(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .and_then(|n| n.to_string())
        .or_else(|| {
            face.names()
                .into_iter()
                .find(|n| n.name_id == ttf_parser::name_id::FULL_NAME)
                .and_then(|n| n.to_string())
        })?;
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

// ── WinAnsi ──────────────────────────────────────────────────────────────

/// The 0x80–0x9F block, where WinAnsi departs from Latin-1.
const WIN_ANSI_HIGH: [(u8, char); 27] = [
    (0x80, '€'),
    (0x82, '‚'),
    (0x83, 'ƒ'),
    (0x84, '„'),
    (0x85, '…'),
    (0x86, '†'),
    (0x87, '‡'),
    (0x88, 'ˆ'),
    (0x89, '‰'),
    (0x8A, 'Š'),
    (0x8B, '‹'),
    (0x8C, 'Œ'),
    (0x8E, 'Ž'),
    (0x91, '‘'),
    (0x92, '’'),
    (0x93, '“'),
    (0x94, '”'),
    (0x95, '•'),
    (0x96, '–'),
    (0x97, '—'),
    (0x98, '˜'),
    (0x99, '™'),
    (0x9A, 'š'),
    (0x9B, '›'),
    (0x9C, 'œ'),
    (0x9E, 'ž'),
    (0x9F, 'Ÿ'),
];


/// WinAnsi code for a character, if it has one.
pub fn win_ansi_code(ch: char) -> Option<u8> {
    match ch as u32 {
        0x20..=0x7E | 0xA0..=0xFF => Some(ch as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .find(|(_, c)| *c == ch)
            .map(|(code, _)| *code),
    }
}

/// Encode text as WinAnsi bytes; unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\t' => b' ',
            _ => win_ansi_code(ch).unwrap_or(REPLACEMENT),
        })
        .collect()
}

/// Helvetica advances for ASCII 32..=126.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a-m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n-z
    334, 260, 334, 584, // {..~
];

/// Helvetica-Bold advances for ASCII 32..=126.
const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    333, 333, 584, 584, 584, 611, 975, // :..@
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    333, 278, 333, 584, 556, 333, // [..`
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // a-m
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // n-z
    389, 280, 389, 584, // {..~
];

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A TrueType font from the host, or `RESUME2PDF_TEST_FONT`.
    pub(crate) fn system_font() -> Option<Vec<u8>> {
        let candidates = std::env::var("RESUME2PDF_TEST_FONT").into_iter().chain(
            [
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/TTF/DejaVuSans.ttf",
                "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
                "/System/Library/Fonts/Supplemental/Arial.ttf",
            ]
            .map(String::from),
        );
        for path in candidates {
            if let Ok(data) = std::fs::read(&path) {
                return Some(data);
            }
        }
        println!("SKIP: no TrueType font found; set RESUME2PDF_TEST_FONT");
        None
    }

    fn advance(face: &Typeface, code: u8) -> u16 {
        match &face.metrics {
            Metrics::WinAnsi(widths) => widths[code as usize],
            Metrics::Glyphs { .. } => panic!("not a standard face"),
        }
    }

    #[test]
    fn win_ansi_round_trips_special_block() {
        for (code, ch) in WIN_ANSI_HIGH {
            assert_eq!(win_ansi_code(ch), Some(code));
            assert_eq!(encode_win_ansi(&ch.to_string()), vec![code]);
        }
    }

    #[test]
    fn unmappable_characters_become_question_marks() {
        assert_eq!(encode_win_ansi("a→b"), b"a?b".to_vec());
        assert_eq!(encode_win_ansi("é"), vec![0xE9]);
        let face = Typeface::standard(false);
        assert!(face.covers('é'));
        assert!(face.covers('•'));
        assert!(!face.covers('₹'));
        assert!(!face.covers('अ'));
        assert!(face.glyph('a').is_none());
    }

    #[test]
    fn standard_metrics() {
        let face = Typeface::standard(false);
        assert_eq!(advance(&face, b' '), 278);
        assert_eq!(advance(&face, b'W'), 944);
        assert_eq!(advance(&face, 0x95), 350);
        // "Hi" = 722 + 222
        assert!((face.text_width("Hi", 10.0) - 9.44).abs() < 1e-4);
    }

    #[test]
    fn bold_is_wider() {
        let set = FontSet::standard();
        assert!(set.text_width("resume", true, 12.0) > set.text_width("resume", false, 12.0));
        assert!(!set.synthetic_bold);
    }

    #[test]
    fn garbage_is_not_a_font() {
        assert!(Typeface::from_truetype(b"definitely not a font".to_vec()).is_err());
    }

    #[test]
    fn truetype_faces_address_unicode_by_glyph_id() {
        let Some(data) = system_font() else { return };
        let face = Typeface::from_truetype(data).unwrap();
        assert!(matches!(face.source, FaceSource::TrueType(_)));

        let (a, covered) = face.glyph('a').unwrap();
        assert!(covered);
        assert_ne!(a.id, 0);
        assert!(a.advance > 0);
        assert!(face.covers('Ω'));
        assert!(face.covers('é'));

        let (missing, covered) = face.glyph('\u{10FFFD}').unwrap();
        assert!(!covered);
        assert_eq!(missing.id, 0);
        assert_eq!(missing.advance, face.notdef_advance());

        let expected = (a.advance as f32 + face.glyph('Ω').unwrap().0.advance as f32) * 12.0 / 1000.0;
        assert!((face.text_width("aΩ", 12.0) - expected).abs() < 1e-3);
    }
}
