// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! DOCX serialization of a structured document.
//!
//! A `.docx` file is a zip container holding a handful of XML parts. The
//! transcript needs a small, fixed subset of WordprocessingML, including
//! per-section footers and a mid-document page numbering restart, so the
//! parts are written directly here: `word/document.xml` with one
//! `sectPr` per [`DocSection`], `word/styles.xml` defining the `Title`
//! and `Heading1` styles, a shared `word/footer1.xml` holding the `PAGE`
//! field, and one `word/media/` part per embedded portrait.
//!
//! Element order inside `pPr`, `rPr`, and `sectPr` follows the schema
//! sequence; Word rejects parts that reorder them.

use std::fmt::Write as _;
use std::io::{Cursor, Write as _};
use std::path::Path;

use snafu::{ResultExt, Snafu};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::document::{Block, CastEntry, DocSection, OmittedLog, OutputDocument, PageNumbers};

/// Errors produced while serializing a document.
#[derive(Debug, Snafu)]
pub enum RenderError {
    /// The zip container could not be written.
    #[snafu(display("failed to write docx container: {source}"))]
    Container {
        /// Underlying zip error.
        source: zip::result::ZipError,
    },

    /// A part's bytes could not be written into the container.
    #[snafu(display("failed to write docx part: {source}"))]
    Io {
        /// Underlying IO error.
        source: std::io::Error,
    },
}

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";

const NS_MAIN: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_RELS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_DRAWING: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_DRAWING_MAIN: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PICTURE: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

// Letter pages with 2.5 cm margins, all in twips.
const PAGE_WIDTH: u32 = 12_240;
const PAGE_HEIGHT: u32 = 15_840;
const PAGE_MARGIN: u32 = 1_417;
const HEADER_FOOTER_MARGIN: u32 = 708;

// Portraits render 0.75 in wide; EMU per the drawing schema.
const PORTRAIT_WIDTH_EMU: i64 = 685_800;
// Cast tables give the portrait column 1.5 in and the name column the
// rest of the text width.
const PORTRAIT_COLUMN_TWIPS: u32 = 2_160;
const NAME_COLUMN_TWIPS: u32 = PAGE_WIDTH - 2 * PAGE_MARGIN - PORTRAIT_COLUMN_TWIPS;

/// Serializes the transcript into `.docx` bytes.
pub fn render_transcript(document: &OutputDocument) -> Result<Vec<u8>, RenderError> {
    let mut writer = PartWriter::new();
    let last = document.sections.len().saturating_sub(1);
    for (index, section) in document.sections.iter().enumerate() {
        writer.push_section(section, index == 0, index == last);
    }
    if document.sections.is_empty() {
        let props = writer.section_properties(PageNumbers::Hidden, true);
        writer.body.push_str(&props);
    }
    writer.package()
}

/// Serializes the omitted-duplicates log into `.docx` bytes.
pub fn render_omitted(log: &OmittedLog) -> Result<Vec<u8>, RenderError> {
    let mut writer = PartWriter::new();

    writer.push_paragraph(
        None,
        Some(&spacing(120, 120, 240)),
        Some("center"),
        &run(&log.title, &RunProps::sized(36).bold()),
    );
    writer.body.push_str("<w:p/>");

    for (position, group) in log.groups.iter().enumerate() {
        if position > 0 {
            writer.body.push_str("<w:p/>");
        }
        let heading = format!("Session {}: {}", group.index, group.title);
        writer.push_paragraph(
            None,
            Some(&spacing(120, 120, 240)),
            Some("center"),
            &run(&heading, &RunProps::sized(28).bold()),
        );
        writer.push_paragraph(
            None,
            Some(&spacing(40, 120, 240)),
            Some("center"),
            &run(&group.date_label, &RunProps::sized(24)),
        );
        for (speaker, text) in &group.entries {
            let line = format!("{speaker}: {text}");
            writer.push_paragraph(None, None, None, &run(&line, &RunProps::default()));
        }
    }

    let props = writer.section_properties(PageNumbers::Hidden, true);
    writer.body.push_str(&props);
    writer.package()
}

/// An image part embedded in the package.
struct Media {
    name: String,
    rel_id: String,
    bytes: Vec<u8>,
}

/// Accumulates the document body and its supporting parts.
struct PartWriter {
    body: String,
    media: Vec<Media>,
    has_footer: bool,
}

impl PartWriter {
    fn new() -> Self {
        Self {
            body: String::new(),
            media: Vec::new(),
            has_footer: false,
        }
    }

    fn push_section(&mut self, section: &DocSection, first: bool, last: bool) {
        for block in &section.blocks {
            self.push_block(block);
        }
        let props = self.section_properties(section.numbering, first);
        if last {
            self.body.push_str(&props);
        } else {
            // Mid-document section breaks ride in an empty paragraph.
            write!(self.body, "<w:p><w:pPr>{props}</w:pPr></w:p>").unwrap();
        }
    }

    fn push_block(&mut self, block: &Block) {
        match block {
            Block::DocumentTitle(title) => self.push_paragraph(
                Some("Title"),
                Some(&spacing(0, 120, 240)),
                Some("center"),
                &run(title, &RunProps::sized(48).bold().color("000000")),
            ),
            Block::Subtitle(text) => self.push_paragraph(
                None,
                Some(&spacing(0, 120, 240)),
                Some("center"),
                &run(text, &RunProps::sized(28)),
            ),
            Block::CastHeading => self.push_paragraph(
                None,
                Some(&spacing(120, 120, 360)),
                None,
                &run("Cast:", &RunProps::sized(36).bold()),
            ),
            Block::CastMember(entry) => self.push_cast_row(entry),
            Block::SessionHeading(title) => self.push_paragraph(
                Some("Heading1"),
                Some(&spacing(120, 120, 360)),
                Some("center"),
                &run(title, &RunProps::sized(28).bold().color("000000")),
            ),
            Block::SessionDate(label) => self.push_paragraph(
                None,
                Some(&spacing(120, 120, 360)),
                Some("center"),
                &run(label, &RunProps::sized(24)),
            ),
            Block::Utterance(runs) => {
                let mut xml = String::new();
                for text_run in runs {
                    let props = RunProps {
                        bold: text_run.bold,
                        italic: text_run.italic,
                        ..RunProps::default()
                    };
                    xml.push_str(&run(&text_run.text, &props));
                }
                self.push_paragraph(None, Some(&spacing(120, 120, 360)), Some("both"), &xml);
            }
            Block::Spacer => self.body.push_str("<w:p/>"),
        }
    }

    fn push_paragraph(
        &mut self,
        style: Option<&str>,
        spacing: Option<&str>,
        justify: Option<&str>,
        runs: &str,
    ) {
        let mut ppr = String::new();
        if let Some(style) = style {
            write!(ppr, "<w:pStyle w:val=\"{style}\"/>").unwrap();
        }
        if let Some(spacing) = spacing {
            ppr.push_str(spacing);
        }
        if let Some(justify) = justify {
            write!(ppr, "<w:jc w:val=\"{justify}\"/>").unwrap();
        }

        self.body.push_str("<w:p>");
        if !ppr.is_empty() {
            write!(self.body, "<w:pPr>{ppr}</w:pPr>").unwrap();
        }
        self.body.push_str(runs);
        self.body.push_str("</w:p>");
    }

    /// Emits one cast entry as a fixed-layout two-cell table: portrait on
    /// the left, name and player on the right, both vertically centered.
    fn push_cast_row(&mut self, entry: &CastEntry) {
        let portrait = entry
            .portrait
            .as_deref()
            .and_then(|path| self.portrait_run(path));

        write!(
            self.body,
            "<w:tbl><w:tblPr>\
             <w:tblW w:w=\"0\" w:type=\"auto\"/>\
             <w:jc w:val=\"left\"/>\
             <w:tblLayout w:type=\"fixed\"/>\
             </w:tblPr>\
             <w:tblGrid><w:gridCol w:w=\"{PORTRAIT_COLUMN_TWIPS}\"/><w:gridCol w:w=\"{NAME_COLUMN_TWIPS}\"/></w:tblGrid>\
             <w:tr>"
        ).unwrap();

        write!(
            self.body,
            "<w:tc><w:tcPr>\
             <w:tcW w:w=\"{PORTRAIT_COLUMN_TWIPS}\" w:type=\"dxa\"/>\
             <w:vAlign w:val=\"center\"/>\
             </w:tcPr><w:p>{}</w:p></w:tc>",
            portrait.unwrap_or_default()
        ).unwrap();

        let mut name_runs = if entry.player.is_some() {
            run(&format!("{} — ", entry.name), &RunProps::default().bold())
        } else {
            run(&entry.name, &RunProps::default().bold())
        };
        if let Some(player) = &entry.player {
            name_runs.push_str(&run(player, &RunProps::default()));
        }
        write!(
            self.body,
            "<w:tc><w:tcPr>\
             <w:tcW w:w=\"{NAME_COLUMN_TWIPS}\" w:type=\"dxa\"/>\
             <w:vAlign w:val=\"center\"/>\
             </w:tcPr><w:p>{name_runs}</w:p></w:tc></w:tr></w:tbl>"
        ).unwrap();
    }

    /// Reads a portrait, registers its media part, and returns the
    /// drawing run. Any failure drops the portrait and keeps the text.
    fn portrait_run(&mut self, path: &Path) -> Option<String> {
        let (width, height) = image::image_dimensions(path).ok()?;
        if width == 0 {
            return None;
        }
        let extension = match path.extension()?.to_str()? {
            ext if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") => "jpg",
            ext if ext.eq_ignore_ascii_case("png") => "png",
            _ => return None,
        };
        let bytes = std::fs::read(path).ok()?;

        let ordinal = self.media.len() + 1;
        let rel_id = format!("rId{}", ordinal + 2);
        let name = format!("word/media/portrait{ordinal}.{extension}");
        let height_emu = PORTRAIT_WIDTH_EMU * i64::from(height) / i64::from(width);

        let xml = format!(
            "<w:r><w:drawing>\
             <wp:inline distT=\"0\" distB=\"0\" distL=\"0\" distR=\"0\">\
             <wp:extent cx=\"{PORTRAIT_WIDTH_EMU}\" cy=\"{height_emu}\"/>\
             <wp:effectExtent l=\"0\" t=\"0\" r=\"0\" b=\"0\"/>\
             <wp:docPr id=\"{ordinal}\" name=\"portrait{ordinal}\"/>\
             <wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect=\"1\"/></wp:cNvGraphicFramePr>\
             <a:graphic><a:graphicData uri=\"{NS_PICTURE}\">\
             <pic:pic>\
             <pic:nvPicPr><pic:cNvPr id=\"{ordinal}\" name=\"portrait{ordinal}\"/><pic:cNvPicPr/></pic:nvPicPr>\
             <pic:blipFill><a:blip r:embed=\"{rel_id}\"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>\
             <pic:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{PORTRAIT_WIDTH_EMU}\" cy=\"{height_emu}\"/></a:xfrm>\
             <a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></pic:spPr>\
             </pic:pic>\
             </a:graphicData></a:graphic>\
             </wp:inline></w:drawing></w:r>"
        );

        self.media.push(Media {
            name,
            rel_id,
            bytes,
        });
        Some(xml)
    }

    fn section_properties(&mut self, numbering: PageNumbers, first: bool) -> String {
        let mut xml = String::from("<w:sectPr>");
        match numbering {
            PageNumbers::Hidden => {}
            PageNumbers::RestartAtOne => {
                self.has_footer = true;
                xml.push_str("<w:footerReference w:type=\"default\" r:id=\"rId2\"/>");
            }
            PageNumbers::Continued => {
                if self.has_footer {
                    xml.push_str("<w:footerReference w:type=\"default\" r:id=\"rId2\"/>");
                }
            }
        }
        if !first {
            xml.push_str("<w:type w:val=\"nextPage\"/>");
        }
        write!(
            xml,
            "<w:pgSz w:w=\"{PAGE_WIDTH}\" w:h=\"{PAGE_HEIGHT}\"/>\
             <w:pgMar w:top=\"{PAGE_MARGIN}\" w:right=\"{PAGE_MARGIN}\" w:bottom=\"{PAGE_MARGIN}\" \
             w:left=\"{PAGE_MARGIN}\" w:header=\"{HEADER_FOOTER_MARGIN}\" w:footer=\"{HEADER_FOOTER_MARGIN}\" w:gutter=\"0\"/>"
        ).unwrap();
        if numbering == PageNumbers::RestartAtOne {
            xml.push_str("<w:pgNumType w:start=\"1\"/>");
        }
        xml.push_str("<w:cols w:space=\"708\"/><w:docGrid w:linePitch=\"360\"/></w:sectPr>");
        xml
    }

    /// Zips every part into the final package.
    fn package(self) -> Result<Vec<u8>, RenderError> {
        let document = format!(
            "{XML_HEADER}<w:document xmlns:w=\"{NS_MAIN}\" xmlns:r=\"{NS_RELS}\" \
             xmlns:wp=\"{NS_DRAWING}\" xmlns:a=\"{NS_DRAWING_MAIN}\" xmlns:pic=\"{NS_PICTURE}\">\
             <w:body>{}</w:body></w:document>",
            self.body
        );

        let mut parts: Vec<(String, Vec<u8>)> = vec![
            ("[Content_Types].xml".to_owned(), self.content_types()),
            ("_rels/.rels".to_owned(), package_relationships()),
            ("word/document.xml".to_owned(), document.into_bytes()),
            (
                "word/_rels/document.xml.rels".to_owned(),
                self.document_relationships(),
            ),
            ("word/styles.xml".to_owned(), styles_part()),
        ];
        if self.has_footer {
            parts.push(("word/footer1.xml".to_owned(), footer_part()));
        }
        for media in self.media {
            parts.push((media.name, media.bytes));
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in &parts {
            zip.start_file(name.as_str(), options).context(ContainerSnafu)?;
            zip.write_all(bytes).context(IoSnafu)?;
        }
        let cursor = zip.finish().context(ContainerSnafu)?;
        Ok(cursor.into_inner())
    }

    fn content_types(&self) -> Vec<u8> {
        let mut xml = format!(
            "{XML_HEADER}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
             <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
             <Default Extension=\"xml\" ContentType=\"application/xml\"/>"
        );
        if self.media.iter().any(|media| media.name.ends_with(".jpg")) {
            xml.push_str("<Default Extension=\"jpg\" ContentType=\"image/jpeg\"/>");
        }
        if self.media.iter().any(|media| media.name.ends_with(".png")) {
            xml.push_str("<Default Extension=\"png\" ContentType=\"image/png\"/>");
        }
        xml.push_str(
            "<Override PartName=\"/word/document.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
             <Override PartName=\"/word/styles.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml\"/>",
        );
        if self.has_footer {
            xml.push_str(
                "<Override PartName=\"/word/footer1.xml\" \
                 ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml\"/>",
            );
        }
        xml.push_str("</Types>");
        xml.into_bytes()
    }

    fn document_relationships(&self) -> Vec<u8> {
        let mut xml = format!(
            "{XML_HEADER}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
             <Relationship Id=\"rId1\" \
             Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" \
             Target=\"styles.xml\"/>"
        );
        if self.has_footer {
            xml.push_str(
                "<Relationship Id=\"rId2\" \
                 Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer\" \
                 Target=\"footer1.xml\"/>",
            );
        }
        for media in &self.media {
            let target = media.name.trim_start_matches("word/");
            write!(
                xml,
                "<Relationship Id=\"{}\" \
                 Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/image\" \
                 Target=\"{target}\"/>",
                media.rel_id
            ).unwrap();
        }
        xml.push_str("</Relationships>");
        xml.into_bytes()
    }
}

fn package_relationships() -> Vec<u8> {
    format!(
        "{XML_HEADER}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
         <Relationship Id=\"rId1\" \
         Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" \
         Target=\"word/document.xml\"/></Relationships>"
    )
    .into_bytes()
}

/// The style part: Times New Roman 12 pt defaults, a plain `Title`
/// style, and a `Heading1` style carrying outline level 0 so PDF
/// converters emit one bookmark per session.
fn styles_part() -> Vec<u8> {
    format!(
        "{XML_HEADER}<w:styles xmlns:w=\"{NS_MAIN}\">\
         <w:docDefaults><w:rPrDefault><w:rPr>\
         <w:rFonts w:ascii=\"Times New Roman\" w:hAnsi=\"Times New Roman\" w:cs=\"Times New Roman\"/>\
         <w:sz w:val=\"24\"/><w:szCs w:val=\"24\"/>\
         </w:rPr></w:rPrDefault><w:pPrDefault/></w:docDefaults>\
         <w:style w:type=\"paragraph\" w:default=\"1\" w:styleId=\"Normal\">\
         <w:name w:val=\"Normal\"/><w:qFormat/></w:style>\
         <w:style w:type=\"paragraph\" w:styleId=\"Title\">\
         <w:name w:val=\"Title\"/><w:basedOn w:val=\"Normal\"/><w:qFormat/></w:style>\
         <w:style w:type=\"paragraph\" w:styleId=\"Heading1\">\
         <w:name w:val=\"heading 1\"/><w:basedOn w:val=\"Normal\"/><w:next w:val=\"Normal\"/><w:qFormat/>\
         <w:pPr><w:keepNext/><w:outlineLvl w:val=\"0\"/></w:pPr>\
         <w:rPr><w:b/><w:color w:val=\"000000\"/><w:sz w:val=\"28\"/><w:szCs w:val=\"28\"/></w:rPr>\
         </w:style></w:styles>"
    )
    .into_bytes()
}

/// The footer part: a centered 10 pt `PAGE` field.
fn footer_part() -> Vec<u8> {
    format!(
        "{XML_HEADER}<w:ftr xmlns:w=\"{NS_MAIN}\" xmlns:r=\"{NS_RELS}\">\
         <w:p><w:pPr><w:jc w:val=\"center\"/></w:pPr>\
         <w:r><w:rPr>\
         <w:rFonts w:ascii=\"Times New Roman\" w:hAnsi=\"Times New Roman\"/>\
         <w:sz w:val=\"20\"/><w:szCs w:val=\"20\"/>\
         </w:rPr>\
         <w:fldChar w:fldCharType=\"begin\"/>\
         <w:instrText xml:space=\"preserve\">PAGE</w:instrText>\
         <w:fldChar w:fldCharType=\"end\"/>\
         </w:r></w:p></w:ftr>"
    )
    .into_bytes()
}

/// Run formatting, written in schema order: bold, italic, color, size.
#[derive(Debug, Default, Clone)]
struct RunProps {
    bold: bool,
    italic: bool,
    color: Option<&'static str>,
    size: Option<u32>,
}

impl RunProps {
    fn sized(half_points: u32) -> Self {
        Self {
            size: Some(half_points),
            ..Self::default()
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn color(mut self, value: &'static str) -> Self {
        self.color = Some(value);
        self
    }
}

fn run(text: &str, props: &RunProps) -> String {
    let mut rpr = String::new();
    if props.bold {
        rpr.push_str("<w:b/>");
    }
    if props.italic {
        rpr.push_str("<w:i/>");
    }
    if let Some(color) = props.color {
        write!(rpr, "<w:color w:val=\"{color}\"/>").unwrap();
    }
    if let Some(size) = props.size {
        write!(rpr, "<w:sz w:val=\"{size}\"/><w:szCs w:val=\"{size}\"/>").unwrap();
    }

    let mut xml = String::from("<w:r>");
    if !rpr.is_empty() {
        write!(xml, "<w:rPr>{rpr}</w:rPr>").unwrap();
    }
    write!(
        xml,
        "<w:t xml:space=\"preserve\">{}</w:t></w:r>",
        xml_escape(text)
    ).unwrap();
    xml
}

fn spacing(before: u32, after: u32, line: u32) -> String {
    format!(
        "<w:spacing w:before=\"{before}\" w:after=\"{after}\" \
         w:line=\"{line}\" w:lineRule=\"auto\"/>"
    )
}

/// Escapes XML-reserved characters and drops control characters the XML
/// 1.0 grammar forbids.
fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\t' | '\n' => escaped.push(c),
            c if c < ' ' => {}
            c => escaped.push(c),
        }
    }
    escaped
}
