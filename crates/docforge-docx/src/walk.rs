//! Locating text-bearing blocks in a WordprocessingML event stream.
//!
//! The walk records, for every paragraph and run, the event indices the
//! writer needs later: where each `w:t` opens and closes, where the run's
//! `w:rPr` sits, and where each `w:sectPr` keeps its page size. Only runs
//! holding at least one `w:t` become model runs.
//!
//! `mc:Fallback` content is skipped; it duplicates the `mc:Choice` branch.
//! Paragraphs in nested tables and text boxes belong to the enclosing
//! top-level cell, or to the body outside tables.

use crate::xml::{check_val_off, element_name, end_name, get_attr, xml_error};
use docforge_core::{PageSize, Paragraph, Result, Run, RunStyle};
use quick_xml::events::{BytesStart, Event};

pub(crate) const TWIPS_PER_INCH: f32 = 1440.0;

/// Event index of an element's start tag and, unless it was empty, its end tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub open: usize,
    pub close: Option<usize>,
}

impl Span {
    const fn new(open: usize) -> Self {
        Self { open, close: None }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RunSlot {
    pub open: usize,
    pub props: Option<Span>,
    pub texts: Vec<Span>,
    pub text: String,
    pub style: RunStyle,
}

impl RunSlot {
    fn new(open: usize) -> Self {
        Self {
            open,
            props: None,
            texts: Vec::new(),
            text: String::new(),
            style: RunStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ParagraphSlot {
    pub runs: Vec<RunSlot>,
}

impl ParagraphSlot {
    pub fn to_paragraph(&self) -> Paragraph {
        Paragraph::from_runs(
            self.runs
                .iter()
                .map(|r| Run::styled(r.text.clone(), r.style.clone()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TableSlot {
    pub rows: Vec<Vec<Vec<ParagraphSlot>>>,
}

#[derive(Debug, Clone)]
pub(crate) struct SectionSlot {
    pub span: Span,
    pub page_size: Option<Span>,
    /// Where a missing `w:pgSz` goes: the first child that must follow it.
    pub insert_at: Option<usize>,
    pub page: Option<PageSize>,
    pub headers: Vec<String>,
    pub footers: Vec<String>,
}

/// Children of `w:sectPr` that precede `w:pgSz`.
const BEFORE_PAGE_SIZE: &[&str] = &[
    "w:headerReference",
    "w:footerReference",
    "w:footnotePr",
    "w:endnotePr",
    "w:type",
    "w:pgSz",
];

#[derive(Debug, Clone, Default)]
pub(crate) struct PartLayout {
    pub paragraphs: Vec<ParagraphSlot>,
    pub tables: Vec<TableSlot>,
    pub sections: Vec<SectionSlot>,
}

#[derive(Debug, Default)]
struct OpenParagraph {
    slot: ParagraphSlot,
    run: Option<RunSlot>,
}

struct Walker<'a> {
    part: &'a str,
    flatten_tables: bool,
    stack: Vec<String>,
    skip_depth: Option<usize>,
    open: Vec<OpenParagraph>,
    table_depth: usize,
    section: Option<SectionSlot>,
    layout: PartLayout,
}

/// Walk a part's events. Header and footer parts pass `flatten_tables` so
/// their table paragraphs land in the flat paragraph list.
pub(crate) fn walk(part: &str, events: &[Event<'static>], flatten_tables: bool) -> Result<PartLayout> {
    let mut walker = Walker {
        part,
        flatten_tables,
        stack: Vec::new(),
        skip_depth: None,
        open: Vec::new(),
        table_depth: 0,
        section: None,
        layout: PartLayout::default(),
    };

    for (i, event) in events.iter().enumerate() {
        match event {
            Event::Start(e) => {
                let name = element_name(e);
                if walker.skip_depth.is_none() {
                    walker.handle_start(i, e, &name, false);
                }
                let is_fallback = name == "mc:Fallback";
                walker.stack.push(name);
                if is_fallback && walker.skip_depth.is_none() {
                    walker.skip_depth = Some(walker.stack.len());
                }
            }
            Event::Empty(e) => {
                if walker.skip_depth.is_none() {
                    let name = element_name(e);
                    walker.handle_start(i, e, &name, true);
                }
            }
            Event::End(e) => {
                match walker.skip_depth {
                    Some(depth) if depth == walker.stack.len() => walker.skip_depth = None,
                    Some(_) => {}
                    None => walker.handle_end(i, &end_name(e)),
                }
                walker.stack.pop();
            }
            Event::Text(t) if walker.skip_depth.is_none() && walker.in_run_text() => {
                let text = t.unescape().map_err(|e| xml_error(walker.part, e))?;
                if let Some(run) = walker.current_run() {
                    run.text.push_str(&text);
                }
            }
            _ => {}
        }
    }

    if !walker.open.is_empty() {
        return Err(xml_error(part, "unterminated paragraph"));
    }
    Ok(walker.layout)
}

impl Walker<'_> {
    fn parent(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    fn grandparent(&self) -> Option<&str> {
        self.stack
            .len()
            .checked_sub(2)
            .map(|i| self.stack[i].as_str())
    }

    fn in_run_text(&self) -> bool {
        self.parent() == Some("w:t") && self.grandparent() == Some("w:r")
    }

    fn current_run(&mut self) -> Option<&mut RunSlot> {
        self.open.last_mut().and_then(|p| p.run.as_mut())
    }

    fn handle_start(&mut self, i: usize, e: &BytesStart<'_>, name: &str, empty: bool) {
        let parent = self.parent().map(ToString::to_string);
        match (name, parent.as_deref()) {
            ("w:p", _) => {
                self.open.push(OpenParagraph::default());
                if empty {
                    self.finish_paragraph();
                }
            }
            ("w:r", _) => {
                if let Some(paragraph) = self.open.last_mut() {
                    paragraph.run = Some(RunSlot::new(i));
                }
                if empty {
                    self.finish_run();
                }
            }
            ("w:t", Some("w:r")) => {
                if let Some(run) = self.current_run() {
                    run.texts.push(Span::new(i));
                }
            }
            ("w:rPr", Some("w:r")) => {
                if let Some(run) = self.current_run() {
                    run.props = Some(Span::new(i));
                }
            }
            (_, Some("w:rPr")) if self.grandparent() == Some("w:r") => self.read_run_property(e, name),
            ("w:tbl", _) => {
                self.table_depth += 1;
                if self.table_depth == 1 && !self.flatten_tables {
                    self.layout.tables.push(TableSlot::default());
                }
                if empty {
                    self.table_depth -= 1;
                }
            }
            ("w:tr", _) if self.table_depth == 1 && !self.flatten_tables => {
                if let Some(table) = self.layout.tables.last_mut() {
                    table.rows.push(Vec::new());
                }
            }
            ("w:tc", _) if self.table_depth == 1 && !self.flatten_tables => {
                if let Some(row) = self.layout.tables.last_mut().and_then(|t| t.rows.last_mut()) {
                    row.push(Vec::new());
                }
            }
            ("w:sectPr", _) => {
                self.section = Some(SectionSlot {
                    span: Span::new(i),
                    page_size: None,
                    insert_at: None,
                    page: None,
                    headers: Vec::new(),
                    footers: Vec::new(),
                });
                if empty {
                    self.finish_section(None);
                }
            }
            (_, Some("w:sectPr")) => self.read_section_child(i, e, name),
            _ => {}
        }
    }

    fn handle_end(&mut self, i: usize, name: &str) {
        match name {
            "w:p" => self.finish_paragraph(),
            "w:r" => self.finish_run(),
            "w:t" if self.grandparent() == Some("w:r") => {
                if let Some(span) = self.current_run().and_then(|r| r.texts.last_mut()) {
                    span.close = Some(i);
                }
            }
            "w:rPr" if self.grandparent() == Some("w:r") => {
                if let Some(span) = self.current_run().and_then(|r| r.props.as_mut()) {
                    span.close = Some(i);
                }
            }
            "w:pgSz" if self.grandparent() == Some("w:sectPr") => {
                if let Some(span) = self.section.as_mut().and_then(|s| s.page_size.as_mut()) {
                    span.close = Some(i);
                }
            }
            "w:tbl" => self.table_depth = self.table_depth.saturating_sub(1),
            "w:sectPr" => self.finish_section(Some(i)),
            _ => {}
        }
    }

    fn read_run_property(&mut self, e: &BytesStart<'_>, name: &str) {
        let Some(run) = self.current_run() else {
            return;
        };
        let style = &mut run.style;
        match name {
            "w:rFonts" => {
                style.font_name = get_attr(e, b"w:ascii")
                    .or_else(|| get_attr(e, b"w:hAnsi"))
                    .or_else(|| get_attr(e, b"w:cs"));
            }
            "w:sz" => {
                style.font_size = get_attr(e, b"w:val")
                    .and_then(|v| v.parse::<f32>().ok())
                    .map(|half_points| half_points / 2.0);
            }
            "w:b" => style.bold = !check_val_off(e),
            "w:i" => style.italic = !check_val_off(e),
            "w:u" => style.underline = get_attr(e, b"w:val").as_deref() != Some("none"),
            _ => {}
        }
    }

    fn read_section_child(&mut self, i: usize, e: &BytesStart<'_>, name: &str) {
        let Some(section) = self.section.as_mut() else {
            return;
        };
        match name {
            "w:headerReference" => section.headers.extend(get_attr(e, b"r:id")),
            "w:footerReference" => section.footers.extend(get_attr(e, b"r:id")),
            "w:pgSz" => {
                section.page_size = Some(Span::new(i));
                let twips = |key: &[u8]| get_attr(e, key).and_then(|v| v.parse::<f32>().ok());
                if let (Some(w), Some(h)) = (twips(b"w:w"), twips(b"w:h")) {
                    section.page = Some(PageSize::new(w / TWIPS_PER_INCH, h / TWIPS_PER_INCH));
                }
            }
            _ => {}
        }
        if section.insert_at.is_none() && !BEFORE_PAGE_SIZE.contains(&name) {
            section.insert_at = Some(i);
        }
    }

    fn finish_run(&mut self) {
        if let Some(paragraph) = self.open.last_mut() {
            if let Some(run) = paragraph.run.take() {
                if !run.texts.is_empty() {
                    paragraph.slot.runs.push(run);
                }
            }
        }
    }

    fn finish_paragraph(&mut self) {
        let Some(paragraph) = self.open.pop() else {
            return;
        };
        let slot = paragraph.slot;
        if self.table_depth > 0 && !self.flatten_tables {
            let cell = self
                .layout
                .tables
                .last_mut()
                .and_then(|t| t.rows.last_mut())
                .and_then(|r| r.last_mut());
            if let Some(cell) = cell {
                cell.push(slot);
                return;
            }
        }
        self.layout.paragraphs.push(slot);
    }

    fn finish_section(&mut self, close: Option<usize>) {
        if let Some(mut section) = self.section.take() {
            section.span.close = close;
            if let Some(close) = close {
                section.insert_at.get_or_insert(close);
            }
            self.layout.sections.push(section);
        }
    }
}
