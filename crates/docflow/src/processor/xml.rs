use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{json, Map, Value};

use crate::error::ProcessError;
use crate::processor::{DocumentParser, DocumentRecord};

/// Parses an XML payload into a flat JSON record:
///
/// ```text
/// {"name": "<file>", "root": "<root tag>", "attributes": {..}, "fields": {..}}
/// ```
///
/// `fields` maps every leaf element's local name to its text. Repeated leaves
/// become arrays.
pub struct XmlDocumentParser;

impl XmlDocumentParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XmlDocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

struct OpenElement {
    name: String,
    text: String,
    has_children: bool,
}

impl DocumentParser for XmlDocumentParser {
    fn parse(&self, name: &str, payload: &[u8]) -> Result<DocumentRecord, ProcessError> {
        let content = std::str::from_utf8(payload)?;
        let mut reader = Reader::from_str(content);

        let mut stack: Vec<OpenElement> = Vec::new();
        let mut root: Option<String> = None;
        let mut root_attributes = Map::new();
        let mut fields = Map::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let tag = local_name(e);
                    if let Some(parent) = stack.last_mut() {
                        parent.has_children = true;
                    } else if root.is_none() {
                        root = Some(tag.clone());
                        root_attributes = read_attributes(e);
                    } else {
                        return Err(ProcessError::Parse(format!(
                            "multiple root elements (found <{}>)",
                            tag
                        )));
                    }
                    stack.push(OpenElement {
                        name: tag,
                        text: String::new(),
                        has_children: false,
                    });
                }
                Ok(Event::Empty(ref e)) => {
                    let tag = local_name(e);
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.has_children = true;
                            insert_field(&mut fields, tag, String::new());
                        }
                        None if root.is_none() => {
                            root_attributes = read_attributes(e);
                            root = Some(tag);
                        }
                        None => {
                            return Err(ProcessError::Parse(format!(
                                "multiple root elements (found <{}/>)",
                                tag
                            )));
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    let Some(element) = stack.pop() else {
                        return Err(ProcessError::Parse("unbalanced closing tag".to_string()));
                    };
                    if !element.has_children && !stack.is_empty() {
                        insert_field(&mut fields, element.name, element.text.trim().to_string());
                    }
                }
                Ok(Event::Text(ref e)) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Ok(Event::GeneralRef(ref e)) => {
                    let entity = String::from_utf8_lossy(e).to_string();
                    let resolved = resolve_entity(&entity).ok_or_else(|| {
                        ProcessError::Parse(format!("unknown entity reference '&{};'", entity))
                    })?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push(resolved);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(ProcessError::Parse(format!(
                        "XML error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(ProcessError::Parse(format!(
                "unexpected end of document inside <{}>",
                open.name
            )));
        }

        let root = root.ok_or_else(|| ProcessError::Parse("document has no root element".into()))?;

        Ok(json!({
            "name": name,
            "root": root,
            "attributes": Value::Object(root_attributes),
            "fields": Value::Object(fields),
        }))
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn read_attributes(e: &BytesStart<'_>) -> Map<String, Value> {
    let mut attributes = Map::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = unescape_text(&String::from_utf8_lossy(&attr.value));
        attributes.insert(key, Value::String(value));
    }
    attributes
}

fn insert_field(fields: &mut Map<String, Value>, name: String, text: String) {
    match fields.get_mut(&name) {
        Some(Value::Array(values)) => values.push(Value::String(text)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(text)]);
        }
        None => {
            fields.insert(name, Value::String(text));
        }
    }
}

fn resolve_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

/// Resolves entity references inside attribute values.
fn unescape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match after.find(';').and_then(|end| Some((end, resolve_entity(&after[..end])?))) {
            Some((end, ch)) => {
                out.push(ch);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
