//! `.docx` documents and templates.

use crate::package::Package;
use crate::walk::{walk, ParagraphSlot, SectionSlot};
use crate::write::{write_page_size, write_run_font, write_run_text};
use crate::xml::{get_attr, xml_error, XmlPart};
use docforge_core::{
    FillableDocument, ForgeError, HeaderFooter, Paragraph, Result, Section, Table, TableCell,
    TableRow, TemplateDocument, TemplateSource,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

const MAIN_PART: &str = "word/document.xml";
const MAIN_RELS: &str = "word/_rels/document.xml.rels";

/// Parse `word/_rels/document.xml.rels` into relationship id -> part name.
fn parse_relationships(package: &Package) -> Result<HashMap<String, String>> {
    let Some(bytes) = package.get(MAIN_RELS) else {
        return Ok(HashMap::new());
    };

    let mut relationships = HashMap::new();
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e) | Event::Start(e)) if e.name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (get_attr(&e, b"Id"), get_attr(&e, b"Target")) {
                    relationships.insert(id, resolve_target(&target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(MAIN_RELS, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(relationships)
}

/// Relationship targets are relative to `word/` unless absolute.
fn resolve_target(target: &str) -> String {
    target
        .strip_prefix('/')
        .map_or_else(|| format!("word/{target}"), ToString::to_string)
}

/// A `.docx` file opened for filling.
///
/// The package is kept whole. Saving writes the edited runs, run fonts and
/// page sizes back into the original XML and copies every other entry as is.
#[derive(Debug, Clone)]
pub struct DocxDocument {
    package: Package,
    parts: Vec<XmlPart>,
    /// Part index and slot of every block, in model order.
    blocks: Vec<(usize, ParagraphSlot)>,
    sections: Vec<SectionSlot>,
    original: TemplateDocument,
    content: TemplateDocument,
}

impl DocxDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let package = Package::from_bytes(bytes)?;
        let relationships = parse_relationships(&package)?;

        let main = XmlPart::parse(MAIN_PART, package.require(MAIN_PART)?)?;
        let layout = walk(MAIN_PART, &main.events, false)?;
        let mut parts = vec![main];
        let mut blocks: Vec<(usize, ParagraphSlot)> = Vec::new();

        let body: Vec<Paragraph> = layout.paragraphs.iter().map(ParagraphSlot::to_paragraph).collect();
        blocks.extend(layout.paragraphs.into_iter().map(|slot| (0, slot)));

        let mut tables = Vec::with_capacity(layout.tables.len());
        for table in layout.tables {
            let mut rows = Vec::with_capacity(table.rows.len());
            for row in table.rows {
                let mut cells = Vec::with_capacity(row.len());
                for cell in row {
                    cells.push(TableCell {
                        paragraphs: cell.iter().map(ParagraphSlot::to_paragraph).collect(),
                    });
                    blocks.extend(cell.into_iter().map(|slot| (0, slot)));
                }
                rows.push(TableRow { cells });
            }
            tables.push(Table { rows });
        }

        let mut claimed: HashSet<String> = HashSet::new();
        let mut sections = Vec::with_capacity(layout.sections.len());
        for slot in &layout.sections {
            let mut load = |ids: &[String]| -> Result<Option<HeaderFooter>> {
                let mut found = false;
                let mut paragraphs = Vec::new();
                for id in ids {
                    let Some(name) = relationships.get(id) else {
                        log::warn!("Section references unknown relationship {id}");
                        continue;
                    };
                    if !claimed.insert(name.clone()) {
                        continue;
                    }
                    let Some(bytes) = package.get(name) else {
                        log::warn!("Missing {name} in package");
                        continue;
                    };
                    let part = XmlPart::parse(name, bytes)?;
                    let part_layout = walk(name, &part.events, true)?;
                    let index = parts.len();
                    parts.push(part);
                    paragraphs.extend(part_layout.paragraphs.iter().map(ParagraphSlot::to_paragraph));
                    blocks.extend(part_layout.paragraphs.into_iter().map(|s| (index, s)));
                    found = true;
                }
                Ok(found.then_some(HeaderFooter { paragraphs }))
            };
            let header = load(&slot.headers)?;
            let footer = load(&slot.footers)?;
            sections.push(Section {
                page: slot.page,
                header,
                footer,
            });
        }

        let content = TemplateDocument {
            body,
            tables,
            sections,
        };
        log::debug!(
            "Opened docx: {} block(s) in {} part(s), {} section(s)",
            blocks.len(),
            parts.len(),
            layout.sections.len()
        );
        Ok(Self {
            package,
            parts,
            blocks,
            sections: layout.sections,
            original: content.clone(),
            content,
        })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            ForgeError::TemplateError(format!("cannot read template {}: {e}", path.display()))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Names of the XML parts that carry blocks, main document first.
    pub fn part_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.parts.iter().map(XmlPart::name)
    }

    fn check_structure(&self) -> Result<()> {
        let mismatch = |what: &str| {
            Err(ForgeError::TemplateError(format!(
                "document structure changed since it was opened ({what})"
            )))
        };
        if self.content.sections.len() != self.sections.len() {
            return mismatch("sections");
        }
        if self.content.block_count() != self.blocks.len() {
            return mismatch("blocks");
        }
        let runs_match = self
            .content
            .paragraphs()
            .zip(&self.blocks)
            .all(|(paragraph, (_, slot))| paragraph.runs.len() == slot.runs.len());
        if !runs_match {
            return mismatch("runs");
        }
        Ok(())
    }

    /// Serialize the filled package.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.check_structure()?;

        let mut edits: Vec<HashMap<usize, _>> = vec![HashMap::new(); self.parts.len()];
        let blocks = self
            .content
            .paragraphs()
            .zip(self.original.paragraphs())
            .zip(&self.blocks);
        for ((paragraph, original), (part, slot)) in blocks {
            let events = &self.parts[*part].events;
            let part_edits = &mut edits[*part];
            for ((run, before), run_slot) in paragraph.runs.iter().zip(&original.runs).zip(&slot.runs) {
                if run.text != before.text {
                    write_run_text(events, run_slot, &run.text, part_edits);
                }
                if run.style.font_name != before.style.font_name
                    || run.style.font_size != before.style.font_size
                {
                    write_run_font(events, run_slot, &run.style, part_edits);
                }
            }
        }

        let sections = self
            .content
            .sections
            .iter()
            .zip(&self.original.sections)
            .zip(&self.sections);
        for ((section, before), slot) in sections {
            if let Some(page) = section.page {
                if section.page != before.page {
                    write_page_size(&self.parts[0].events, slot, page, &mut edits[0]);
                }
            }
        }

        let mut package = self.package.clone();
        for (part, part_edits) in self.parts.iter().zip(&edits) {
            if !part_edits.is_empty() {
                package.set(part.name(), part.write(part_edits)?);
            }
        }
        package.to_bytes()
    }
}

impl FillableDocument for DocxDocument {
    fn content(&self) -> &TemplateDocument {
        &self.content
    }

    fn content_mut(&mut self) -> &mut TemplateDocument {
        &mut self.content
    }

    fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

/// A `.docx` template, parsed once and copied for every output document.
#[derive(Debug, Clone)]
pub struct DocxTemplate {
    document: DocxDocument,
}

impl DocxTemplate {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let document = DocxDocument::from_path(path)?;
        log::info!(
            "Loaded template {} ({} block(s))",
            path.display(),
            document.blocks.len()
        );
        Ok(Self { document })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            document: DocxDocument::from_bytes(bytes)?,
        })
    }

    #[must_use]
    pub fn content(&self) -> &TemplateDocument {
        &self.document.content
    }
}

impl TemplateSource for DocxTemplate {
    type Document = DocxDocument;

    fn open(&self) -> Result<DocxDocument> {
        Ok(self.document.clone())
    }

    fn extension(&self) -> &str {
        "docx"
    }
}
