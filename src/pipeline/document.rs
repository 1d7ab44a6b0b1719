//! PDF writer: [`PageLayout`] → PDF 1.7 bytes via `lopdf`.
//!
//! Output is deterministic: no creation dates, no trailer `ID`, objects in
//! a fixed order. Identical layouts produce identical bytes.
//!
//! Embedded TrueType faces are written as `Type0` fonts with `Identity-H`
//! encoding: the content stream carries 2-byte glyph ids, the descendant
//! `CIDFontType2` carries widths for the glyphs used, and a `ToUnicode`
//! CMap keeps the text extractable.

use crate::assets::RasterImage;
use crate::pipeline::fonts::{encode_win_ansi, FaceSource, FontSet, Typeface};
use crate::pipeline::layout::{Item, PageLayout};
use crate::pipeline::markup::Color;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

const PRODUCER: &str = "resume2pdf";

/// Stroke width of synthetic bold, as a fraction of the font size.
const SYNTHETIC_BOLD_STROKE: f32 = 0.03;

/// Entries per `beginbfchar` block; the CMap format caps it at 100.
const BFCHAR_BLOCK: usize = 100;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("PDF serialisation failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("stream compression failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialise a finished layout. Returns the bytes and the page count.
pub fn write_pdf(
    layout: &PageLayout,
    fonts: &FontSet,
    title: Option<&str>,
) -> Result<(Vec<u8>, usize), DocumentError> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut usage = [GlyphUse::default(), GlyphUse::default()];
    let contents: Vec<Content> = layout
        .pages
        .iter()
        .map(|items| page_content(items, layout.height, fonts, &mut usage))
        .collect();

    let shared = Arc::ptr_eq(&fonts.regular, &fonts.bold);
    for (face, used) in [(&fonts.regular, &usage[0]), (&fonts.bold, &usage[1])] {
        if !used.missing.is_empty() {
            let chars: String = used.missing.iter().collect();
            warn!(
                "Font {} cannot draw {} character(s) {:?}; they are substituted",
                face.name,
                used.missing.len(),
                chars
            );
        }
    }

    let regular_id = add_font(&mut doc, &fonts.regular, &usage[0])?;
    let bold_id = if shared {
        regular_id
    } else {
        add_font(&mut doc, &fonts.bold, &usage[1])?
    };

    let mut xobjects = Dictionary::new();
    for (i, image) in layout.images.iter().enumerate() {
        let id = add_image(&mut doc, image)?;
        xobjects.set(image_name(i), id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
        "XObject" => xobjects,
    });

    let mut page_ids = Vec::with_capacity(contents.len());
    for content in contents {
        let stream = Stream::new(dictionary! { "Filter" => "FlateDecode" }, deflate(&content.encode()?)?);
        let content_id = doc.add_object(stream);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), layout.width.into(), layout.height.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! { "Producer" => text_string(PRODUCER) };
    if let Some(title) = title {
        info.set("Title", text_string(title));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    debug!("Wrote PDF: {} page(s), {} bytes", page_ids.len(), bytes.len());
    Ok((bytes, page_ids.len()))
}

/// Glyphs a face drew in one document, and the characters it could not.
#[derive(Debug, Default)]
struct GlyphUse {
    /// Glyph id → (first character drawn with it, advance).
    glyphs: BTreeMap<u16, (char, u16)>,
    missing: BTreeSet<char>,
}

/// `Tj` operand for `text` in `face`, recording what was drawn.
fn encode_text(face: &Typeface, text: &str, used: &mut GlyphUse) -> Vec<u8> {
    if !matches!(face.source, FaceSource::TrueType(_)) {
        used.missing.extend(text.chars().filter(|&ch| !face.covers(ch)));
        return encode_win_ansi(text);
    }
    let mut bytes = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let Some((glyph, covered)) = face.glyph(ch) else {
            continue;
        };
        if covered {
            used.glyphs.entry(glyph.id).or_insert((ch, glyph.advance));
        } else {
            used.missing.insert(ch);
        }
        bytes.extend_from_slice(&glyph.id.to_be_bytes());
    }
    bytes
}

fn page_content(
    items: &[Item],
    page_height: f32,
    fonts: &FontSet,
    usage: &mut [GlyphUse; 2],
) -> Content {
    let shared = Arc::ptr_eq(&fonts.regular, &fonts.bold);
    let mut ops = Vec::new();
    for item in items {
        ops.push(Operation::new("q", vec![]));
        match item {
            Item::Text {
                x,
                y,
                size,
                bold,
                color,
                text,
            } => {
                ops.push(fill_color(*color));
                ops.push(Operation::new("BT", vec![]));
                let font = if *bold { "F2" } else { "F1" };
                ops.push(Operation::new("Tf", vec![Object::Name(font.into()), (*size).into()]));
                if *bold && fonts.synthetic_bold {
                    ops.push(stroke_color(*color));
                    ops.push(Operation::new("w", vec![(size * SYNTHETIC_BOLD_STROKE).into()]));
                    ops.push(Operation::new("Tr", vec![2.into()]));
                }
                ops.push(Operation::new("Td", vec![(*x).into(), (page_height - y).into()]));
                let slot = usize::from(*bold && !shared);
                let encoded = encode_text(fonts.face(*bold), text, &mut usage[slot]);
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::String(encoded, StringFormat::Hexadecimal)],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            Item::Line {
                x1,
                y1,
                x2,
                y2,
                width,
                color,
            } => {
                ops.push(stroke_color(*color));
                ops.push(Operation::new("w", vec![(*width).into()]));
                ops.push(Operation::new("m", vec![(*x1).into(), (page_height - y1).into()]));
                ops.push(Operation::new("l", vec![(*x2).into(), (page_height - y2).into()]));
                ops.push(Operation::new("S", vec![]));
            }
            Item::Rect {
                x,
                y,
                w,
                h,
                fill,
                stroke,
            } => {
                let rect = || {
                    Operation::new(
                        "re",
                        vec![(*x).into(), (page_height - y - h).into(), (*w).into(), (*h).into()],
                    )
                };
                if let Some(fill) = fill {
                    ops.push(fill_color(*fill));
                    ops.push(rect());
                    ops.push(Operation::new("f", vec![]));
                }
                if let Some(stroke) = stroke {
                    ops.push(stroke_color(*stroke));
                    ops.push(Operation::new("w", vec![0.5f32.into()]));
                    ops.push(rect());
                    ops.push(Operation::new("S", vec![]));
                }
            }
            Item::Image { x, y, w, h, index } => {
                ops.push(Operation::new(
                    "cm",
                    vec![
                        (*w).into(),
                        0.into(),
                        0.into(),
                        (*h).into(),
                        (*x).into(),
                        (page_height - y - h).into(),
                    ],
                ));
                ops.push(Operation::new("Do", vec![Object::Name(image_name(*index).into_bytes())]));
            }
        }
        ops.push(Operation::new("Q", vec![]));
    }
    Content { operations: ops }
}

fn fill_color(color: Color) -> Operation {
    let [r, g, b] = color.unit();
    Operation::new("rg", vec![r.into(), g.into(), b.into()])
}

fn stroke_color(color: Color) -> Operation {
    let [r, g, b] = color.unit();
    Operation::new("RG", vec![r.into(), g.into(), b.into()])
}

fn image_name(index: usize) -> String {
    format!("Im{index}")
}

fn add_font(doc: &mut Document, face: &Typeface, used: &GlyphUse) -> Result<ObjectId, DocumentError> {
    let data = match &face.source {
        FaceSource::Standard => {
            return Ok(doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => Object::Name(face.name.clone().into_bytes()),
                "Encoding" => "WinAnsiEncoding",
            }));
        }
        FaceSource::TrueType(data) => data,
    };

    let file_id = doc.add_object(Stream::new(
        dictionary! {
            "Length1" => data.len() as i64,
            "Filter" => "FlateDecode",
        },
        deflate(data)?,
    ));
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(face.name.clone().into_bytes()),
        // Nonsymbolic
        "Flags" => 32,
        "FontBBox" => face.bbox.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
        "ItalicAngle" => face.italic_angle,
        "Ascent" => face.ascent,
        "Descent" => face.descent,
        "CapHeight" => face.cap_height,
        "StemV" => 80,
        "FontFile2" => file_id,
    });
    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => Object::Name(face.name.clone().into_bytes()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => face.notdef_advance() as i64,
        "W" => cid_widths(&used.glyphs),
        "CIDToGIDMap" => "Identity",
    });
    let to_unicode_id = doc.add_object(Stream::new(
        dictionary! { "Filter" => "FlateDecode" },
        deflate(to_unicode_cmap(&used.glyphs).as_bytes())?,
    ));
    Ok(doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(face.name.clone().into_bytes()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => to_unicode_id,
    }))
}

/// `W` array: each run of consecutive glyph ids as `first [w1 w2 ...]`.
fn cid_widths(glyphs: &BTreeMap<u16, (char, u16)>) -> Vec<Object> {
    let mut out = Vec::new();
    let mut run: Vec<Object> = Vec::new();
    let mut first = 0u16;
    let mut prev: Option<u16> = None;
    for (&id, &(_, advance)) in glyphs {
        let contiguous = prev.and_then(|p| p.checked_add(1)) == Some(id);
        if !contiguous && !run.is_empty() {
            out.push(Object::Integer(first as i64));
            out.push(Object::Array(std::mem::take(&mut run)));
        }
        if run.is_empty() {
            first = id;
        }
        run.push(Object::Integer(advance as i64));
        prev = Some(id);
    }
    if !run.is_empty() {
        out.push(Object::Integer(first as i64));
        out.push(Object::Array(run));
    }
    out
}

/// `ToUnicode` CMap mapping each drawn glyph id back to its character.
fn to_unicode_cmap(glyphs: &BTreeMap<u16, (char, u16)>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<_> = glyphs.iter().collect();
    for block in entries.chunks(BFCHAR_BLOCK) {
        let _ = writeln!(cmap, "{} beginbfchar", block.len());
        for (id, (ch, _)) in block {
            let mut units = [0u16; 2];
            let utf16: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{u:04X}"))
                .collect();
            let _ = writeln!(cmap, "<{id:04X}> <{utf16}>");
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap
}

fn add_image(doc: &mut Document, image: &RasterImage) -> Result<ObjectId, DocumentError> {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    if let Some(alpha) = &image.alpha {
        let mask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(alpha)?,
        ));
        dict.set("SMask", mask_id);
    }
    Ok(doc.add_object(Stream::new(dict, deflate(&image.rgb)?)))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// PDF text string: PDFDocEncoding for ASCII, UTF-16BE otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetError, RasterImage};
    use crate::pipeline::layout::{layout, ImageResolver};
    use crate::pipeline::markup::parse;

    struct Photo;

    impl ImageResolver for Photo {
        fn resolve(&self, _src: &str) -> Result<Arc<RasterImage>, AssetError> {
            Ok(Arc::new(RasterImage {
                width: 2,
                height: 2,
                rgb: vec![255; 12],
                alpha: Some(vec![0, 255, 255, 0]),
            }))
        }
    }

    fn build(src: &str) -> (Vec<u8>, usize) {
        let fonts = FontSet::standard();
        let laid_out = layout(&parse(src).unwrap(), &fonts, &Photo).unwrap();
        write_pdf(&laid_out, &fonts, Some("Asha Rao — CV")).unwrap()
    }

    #[test]
    fn writes_loadable_pdf() {
        let (bytes, pages) = build("<document><heading level=\"1\">Asha</heading><p>Hello <b>world</b></p></document>");
        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert_eq!(pages, 1);

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert!(doc.trailer.get(b"ID").is_err());

        let base_fonts: Vec<Vec<u8>> = doc
            .objects
            .values()
            .filter_map(|o| o.as_dict().ok())
            .filter_map(|d| match d.get(b"BaseFont") {
                Ok(Object::Name(n)) => Some(n.clone()),
                _ => None,
            })
            .collect();
        assert!(base_fonts.contains(&b"Helvetica".to_vec()));
        assert!(base_fonts.contains(&b"Helvetica-Bold".to_vec()));
    }

    #[test]
    fn empty_layout_still_has_a_page() {
        let (bytes, pages) = build("<document/>");
        assert_eq!(pages, 1);
        assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 1);
    }

    #[test]
    fn multi_page_output() {
        let (bytes, pages) = build("<document><p>one</p><pagebreak/><p>two</p><pagebreak/><p>three</p></document>");
        assert_eq!(pages, 3);
        assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 3);
    }

    #[test]
    fn output_is_deterministic() {
        let src = "<document><image src=\"x\"/><p>Same input</p></document>";
        assert_eq!(build(src).0, build(src).0);
    }

    #[test]
    fn translucent_images_get_a_soft_mask() {
        let (bytes, _) = build("<document><image src=\"x\" width=\"40\"/></document>");
        let doc = Document::load_mem(&bytes).unwrap();
        let has_smask = doc.objects.values().any(|o| match o {
            Object::Stream(s) => s.dict.get(b"SMask").is_ok(),
            _ => false,
        });
        assert!(has_smask);
    }

    #[test]
    fn non_ascii_title_is_utf16() {
        match text_string("Zoë") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(bytes, vec![0xFE, 0xFF, 0, b'Z', 0, b'o', 0, 0xEB]);
            }
            _ => panic!("expected hex string"),
        }
    }

    #[test]
    fn standard_faces_record_characters_outside_win_ansi() {
        let mut used = GlyphUse::default();
        let bytes = encode_text(&Typeface::standard(false), "₹5 → café", &mut used);
        assert_eq!(bytes, b"?5 ? caf\xE9".to_vec());
        assert_eq!(used.missing.into_iter().collect::<String>(), "₹→");
        assert!(used.glyphs.is_empty());
    }

    #[test]
    fn cid_widths_group_consecutive_ids() {
        let glyphs = BTreeMap::from([(3, ('a', 500)), (4, ('b', 600)), (9, ('z', 400))]);
        assert_eq!(
            cid_widths(&glyphs),
            vec![
                Object::Integer(3),
                Object::Array(vec![Object::Integer(500), Object::Integer(600)]),
                Object::Integer(9),
                Object::Array(vec![Object::Integer(400)]),
            ]
        );
        assert!(cid_widths(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn to_unicode_maps_glyphs_back_to_text() {
        let glyphs = BTreeMap::from([(3, ('a', 0)), (70, ('₹', 0)), (80, ('😀', 0))]);
        let cmap = to_unicode_cmap(&glyphs);
        assert!(cmap.contains("3 beginbfchar"));
        assert!(cmap.contains("<0003> <0061>"));
        assert!(cmap.contains("<0046> <20B9>"));
        assert!(cmap.contains("<0050> <D83DDE00>"));

        let many: BTreeMap<u16, (char, u16)> = (1..=150).map(|i| (i, ('x', 0))).collect();
        let cmap = to_unicode_cmap(&many);
        assert!(cmap.contains("100 beginbfchar"));
        assert!(cmap.contains("50 beginbfchar"));
    }

    #[test]
    fn truetype_text_is_written_as_type0() {
        let Some(data) = crate::pipeline::fonts::tests::system_font() else {
            return;
        };
        let fonts = FontSet::truetype(Typeface::from_truetype(data).unwrap(), None);
        let laid_out = layout(
            &parse("<document><p>Zoë Ωmega <b>bold</b> \u{10FFFD}</p></document>").unwrap(),
            &fonts,
            &Photo,
        )
        .unwrap();
        let (bytes, _) = write_pdf(&laid_out, &fonts, None).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();

        let type0: Vec<&Dictionary> = doc
            .objects
            .values()
            .filter_map(|o| o.as_dict().ok())
            .filter(|d| d.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Type0".as_slice()))
            .collect();
        // Synthetic bold shares the regular font object.
        assert_eq!(type0.len(), 1);
        let font = type0[0];
        assert_eq!(font.get(b"Encoding").and_then(Object::as_name).unwrap(), b"Identity-H");
        assert!(font.get(b"ToUnicode").and_then(Object::as_reference).is_ok());

        let descendant = font.get(b"DescendantFonts").and_then(Object::as_array).unwrap()[0]
            .as_reference()
            .and_then(|id| doc.get_dictionary(id))
            .unwrap();
        assert_eq!(descendant.get(b"Subtype").and_then(Object::as_name).unwrap(), b"CIDFontType2");
        assert_eq!(descendant.get(b"CIDToGIDMap").and_then(Object::as_name).unwrap(), b"Identity");
        assert!(!descendant.get(b"W").and_then(Object::as_array).unwrap().is_empty());

        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let shown: Vec<&Vec<u8>> = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes),
                _ => None,
            })
            .collect();
        assert!(!shown.is_empty());
        for bytes in shown {
            assert_eq!(bytes.len() % 2, 0);
        }
    }
}
