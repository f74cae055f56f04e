//! ---
//! km_section: "02-document-model"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "XML reader and indented writer for the element tree."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
use std::fmt::Display;
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::{Element, XmlError, XmlResult};

const INDENT_WIDTH: usize = 2;

impl FromStr for Element {
    type Err = XmlError;

    fn from_str(xml: &str) -> XmlResult<Self> {
        parse(xml)
    }
}

impl Element {
    /// Render the element as a UTF-8 XML document with a declaration,
    /// two-space indentation, and a trailing newline.
    pub fn to_xml_document(&self) -> XmlResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_WIDTH);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(serialize_error)?;
        write_element(&mut writer, self)?;
        let mut rendered =
            String::from_utf8(writer.into_inner()).map_err(|err| XmlError::Encoding(err.to_string()))?;
        rendered.push('\n');
        Ok(rendered)
    }
}

/// Parse XML text into an [`Element`] tree.
///
/// Whitespace-only text between elements is discarded; comments, processing
/// instructions, and the declaration are ignored.
pub fn parse(xml: &str) -> XmlResult<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|err| XmlError::Parse {
            position,
            reason: err.to_string(),
        })?;
        match event {
            Event::Start(start) => stack.push(open_element(&start, position)?),
            Event::Empty(start) => {
                let element = open_element(&start, position)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element)?;
                }
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(|err| XmlError::Parse {
                    position,
                    reason: err.to_string(),
                })?;
                append_text(&mut stack, &value);
            }
            Event::CData(data) => {
                let value = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|err| XmlError::Encoding(err.to_string()))?;
                append_text(&mut stack, &value);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::UnclosedElement(open.tag().to_owned()));
    }
    root.ok_or(XmlError::EmptyDocument)
}

fn open_element(start: &BytesStart<'_>, position: u64) -> XmlResult<Element> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(|err| XmlError::Encoding(err.to_string()))?
        .to_owned();
    let mut element = Element::new(tag);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| XmlError::Parse {
            position,
            reason: err.to_string(),
        })?;
        let name = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|err| XmlError::Encoding(err.to_string()))?
            .to_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| XmlError::Parse {
                position,
                reason: err.to_string(),
            })?
            .into_owned();
        element.set_attribute(name, value);
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> XmlResult<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push(element);
            Ok(())
        }
        None if root.is_some() => Err(XmlError::MultipleRoots(element.tag().to_owned())),
        None => {
            *root = Some(element);
            Ok(())
        }
    }
}

fn append_text(stack: &mut [Element], value: &str) {
    if let Some(current) = stack.last_mut() {
        let text = match current.text() {
            Some(existing) => format!("{existing}{value}"),
            None => value.to_owned(),
        };
        current.set_text(Some(text));
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> XmlResult<()> {
    let mut start = BytesStart::new(element.tag());
    for (name, value) in element.attributes() {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    let text = element.text().filter(|text| !text.is_empty());
    if text.is_none() && element.children().is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(serialize_error);
    }

    writer
        .write_event(Event::Start(start))
        .map_err(serialize_error)?;
    if let Some(text) = text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(serialize_error)?;
    }
    for child in element.children() {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.tag())))
        .map_err(serialize_error)
}

fn serialize_error(err: impl Display) -> XmlError {
    XmlError::Serialize(err.to_string())
}
