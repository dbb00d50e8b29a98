//! XML parts held as owned event streams.
//!
//! A part is parsed once into `quick_xml` events. Unchanged events are
//! written back verbatim, so everything the codec does not understand
//! survives a round trip.

use docforge_core::{ForgeError, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;

pub(crate) fn xml_error(part: &str, err: impl std::fmt::Display) -> ForgeError {
    ForgeError::XmlError(format!("{part}: {err}"))
}

/// One XML entry of the package.
#[derive(Debug, Clone)]
pub struct XmlPart {
    pub(crate) name: String,
    pub(crate) events: Vec<Event<'static>>,
}

impl XmlPart {
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        reader.trim_text(false);

        let mut events = Vec::new();
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Eof) => break,
                Ok(event) => events.push(event.into_owned()),
                Err(e) => {
                    return Err(xml_error(
                        name,
                        format!("error at position {}: {e}", reader.buffer_position()),
                    ))
                }
            }
            buf.clear();
        }
        Ok(Self {
            name: name.to_string(),
            events,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialize the part, applying `edits` keyed by event index.
    pub(crate) fn write(&self, edits: &HashMap<usize, Edit>) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        let mut i = 0;
        while i < self.events.len() {
            match edits.get(&i) {
                Some(Edit::Replace { close, events }) => {
                    for event in events {
                        writer.write_event(event).map_err(|e| xml_error(&self.name, e))?;
                    }
                    i = close.unwrap_or(i);
                }
                Some(Edit::InsertAfter(events)) => {
                    writer
                        .write_event(&self.events[i])
                        .map_err(|e| xml_error(&self.name, e))?;
                    for event in events {
                        writer.write_event(event).map_err(|e| xml_error(&self.name, e))?;
                    }
                }
                Some(Edit::InsertBefore(events)) => {
                    for event in events {
                        writer.write_event(event).map_err(|e| xml_error(&self.name, e))?;
                    }
                    writer
                        .write_event(&self.events[i])
                        .map_err(|e| xml_error(&self.name, e))?;
                }
                None => writer
                    .write_event(&self.events[i])
                    .map_err(|e| xml_error(&self.name, e))?,
            }
            i += 1;
        }
        Ok(writer.into_inner())
    }
}

/// A change to a part's event stream.
#[derive(Debug, Clone)]
pub(crate) enum Edit {
    /// Replace the element opening at this index, through `close` when it is
    /// a start tag, with `events`.
    Replace {
        close: Option<usize>,
        events: Vec<Event<'static>>,
    },
    InsertAfter(Vec<Event<'static>>),
    InsertBefore(Vec<Event<'static>>),
}

/// Qualified element name as text.
pub(crate) fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

pub(crate) fn end_name(e: &BytesEnd<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Extract an attribute value by qualified key.
pub(crate) fn get_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Whether a toggle property (`w:b`, `w:i`) is switched off by its `w:val`.
pub(crate) fn check_val_off(e: &BytesStart<'_>) -> bool {
    matches!(get_attr(e, b"w:val").as_deref(), Some("0" | "false" | "off"))
}

/// Copy of `e` with the named attributes dropped.
pub(crate) fn without_attrs(e: &BytesStart<'_>, drop: &[&[u8]]) -> BytesStart<'static> {
    let mut start = BytesStart::new(element_name(e));
    for attr in e.attributes().flatten() {
        if !drop.contains(&attr.key.as_ref()) {
            start.push_attribute(attr);
        }
    }
    start.into_owned()
}

/// `<name>text</name>` as owned events, starting from `start`.
pub(crate) fn text_element(start: BytesStart<'static>, text: &str) -> Vec<Event<'static>> {
    let end = BytesEnd::new(element_name(&start));
    vec![
        Event::Start(start),
        Event::Text(BytesText::new(text).into_owned()),
        Event::End(end),
    ]
}

/// `<name attr="value" .../>` as an owned event.
pub(crate) fn empty_element(name: &str, attrs: &[(&str, &str)]) -> Event<'static> {
    let mut start = BytesStart::new(name.to_string());
    for attr in attrs {
        start.push_attribute(*attr);
    }
    Event::Empty(start)
}
