//! Turning model changes into event edits.

use crate::walk::{RunSlot, SectionSlot, Span, TWIPS_PER_INCH};
use crate::xml::{element_name, empty_element, text_element, without_attrs, Edit};
use docforge_core::{PageSize, RunStyle};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use std::collections::HashMap;

/// Schema order of run properties; unknown children sort last.
const RUN_PROPERTY_ORDER: &[&str] = &[
    "w:rStyle",
    "w:rFonts",
    "w:b",
    "w:bCs",
    "w:i",
    "w:iCs",
    "w:caps",
    "w:smallCaps",
    "w:strike",
    "w:dstrike",
    "w:outline",
    "w:shadow",
    "w:emboss",
    "w:imprint",
    "w:noProof",
    "w:snapToGrid",
    "w:vanish",
    "w:webHidden",
    "w:color",
    "w:spacing",
    "w:w",
    "w:kern",
    "w:position",
    "w:sz",
    "w:szCs",
    "w:highlight",
    "w:u",
    "w:effect",
    "w:bdr",
    "w:shd",
    "w:fitText",
    "w:vertAlign",
    "w:rtl",
    "w:cs",
    "w:em",
    "w:lang",
    "w:eastAsianLayout",
    "w:specVanish",
    "w:oMath",
];

fn property_rank(name: &str) -> usize {
    RUN_PROPERTY_ORDER
        .iter()
        .position(|p| *p == name)
        .unwrap_or(RUN_PROPERTY_ORDER.len())
}

fn start_of<'a>(event: &'a Event<'static>) -> Option<&'a BytesStart<'static>> {
    match event {
        Event::Start(e) | Event::Empty(e) => Some(e),
        _ => None,
    }
}

/// Put `text` in the run's first `w:t` and empty the others.
pub(crate) fn write_run_text(
    events: &[Event<'static>],
    run: &RunSlot,
    text: &str,
    edits: &mut HashMap<usize, Edit>,
) {
    for (k, span) in run.texts.iter().enumerate() {
        let Some(original) = start_of(&events[span.open]) else {
            continue;
        };
        let mut start = without_attrs(original, &[b"xml:space"]);
        start.push_attribute(("xml:space", "preserve"));
        let value = if k == 0 { text } else { "" };
        edits.insert(
            span.open,
            Edit::Replace {
                close: span.close,
                events: text_element(start, value),
            },
        );
    }
}

/// Top-level children of a property element, each with its events.
fn child_groups(events: &[Event<'static>]) -> Vec<(String, Vec<Event<'static>>)> {
    let mut groups: Vec<(String, Vec<Event<'static>>)> = Vec::new();
    let mut depth = 0usize;
    for event in events {
        if depth == 0 {
            match start_of(event) {
                Some(e) => groups.push((element_name(e), Vec::new())),
                None => continue,
            }
        }
        if let Some((_, group)) = groups.last_mut() {
            group.push(event.clone());
        }
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    groups
}

fn half_points(size: f32) -> String {
    format!("{}", (size * 2.0).round().max(1.0) as u32)
}

/// Rewrite the run's `w:rPr` so it carries the style's font family and size.
pub(crate) fn write_run_font(
    events: &[Event<'static>],
    run: &RunSlot,
    style: &RunStyle,
    edits: &mut HashMap<usize, Edit>,
) {
    let (start, children) = match run.props {
        Some(Span { open, close }) => {
            let start = start_of(&events[open])
                .map_or_else(|| BytesStart::new("w:rPr"), |e| e.clone().into_owned());
            let children = close.map_or_else(Vec::new, |close| child_groups(&events[open + 1..close]));
            (start.into_owned(), children)
        }
        None => (BytesStart::new("w:rPr"), Vec::new()),
    };

    let mut children: Vec<(String, Vec<Event<'static>>)> = children
        .into_iter()
        .filter(|(name, _)| match name.as_str() {
            "w:rFonts" => style.font_name.is_none(),
            "w:sz" | "w:szCs" => style.font_size.is_none(),
            _ => true,
        })
        .collect();
    if let Some(font) = &style.font_name {
        let attrs = [
            ("w:ascii", font.as_str()),
            ("w:hAnsi", font.as_str()),
            ("w:eastAsia", font.as_str()),
            ("w:cs", font.as_str()),
        ];
        children.push(("w:rFonts".to_string(), vec![empty_element("w:rFonts", &attrs)]));
    }
    if let Some(size) = style.font_size {
        let value = half_points(size);
        children.push(("w:sz".to_string(), vec![empty_element("w:sz", &[("w:val", &value)])]));
        children.push(("w:szCs".to_string(), vec![empty_element("w:szCs", &[("w:val", &value)])]));
    }
    children.sort_by_key(|(name, _)| property_rank(name));

    let mut new_events = vec![Event::Start(start)];
    new_events.extend(children.into_iter().flat_map(|(_, events)| events));
    new_events.push(Event::End(BytesEnd::new("w:rPr")));

    match run.props {
        Some(span) => {
            edits.insert(
                span.open,
                Edit::Replace {
                    close: span.close,
                    events: new_events,
                },
            );
        }
        None => {
            edits.insert(run.open, Edit::InsertAfter(new_events));
        }
    }
}

fn page_size_element(original: Option<&BytesStart<'static>>, page: PageSize) -> Event<'static> {
    let mut start = original.map_or_else(
        || BytesStart::new("w:pgSz"),
        |e| without_attrs(e, &[b"w:w", b"w:h", b"w:code"]),
    );
    let width = format!("{}", (page.width * TWIPS_PER_INCH).round() as u32);
    let height = format!("{}", (page.height * TWIPS_PER_INCH).round() as u32);
    start.push_attribute(("w:w", width.as_str()));
    start.push_attribute(("w:h", height.as_str()));
    Event::Empty(start)
}

/// Set the section's `w:pgSz`, adding one where the section has none.
pub(crate) fn write_page_size(
    events: &[Event<'static>],
    section: &SectionSlot,
    page: PageSize,
    edits: &mut HashMap<usize, Edit>,
) {
    if let Some(span) = section.page_size {
        let element = page_size_element(start_of(&events[span.open]), page);
        edits.insert(
            span.open,
            Edit::Replace {
                close: span.close,
                events: vec![element],
            },
        );
    } else if let Some(at) = section.insert_at {
        edits.insert(at, Edit::InsertBefore(vec![page_size_element(None, page)]));
    } else if let Some(original) = start_of(&events[section.span.open]) {
        let start = original.clone().into_owned();
        edits.insert(
            section.span.open,
            Edit::Replace {
                close: section.span.close,
                events: vec![
                    Event::Start(start),
                    page_size_element(None, page),
                    Event::End(BytesEnd::new("w:sectPr")),
                ],
            },
        );
    }
}
