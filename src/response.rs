//! Response decoding into a uniform body tree.

use bytes::Bytes;
use http::HeaderMap;
use http::StatusCode;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::time::DateTime;
use crate::{Error, Result};

/// One element of a decoded XML document.
#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    /// The element name, namespace prefix stripped.
    pub name: String,
    /// Concatenated text content of this element.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse an XML document into its root node.
    pub fn parse(body: &[u8]) -> Result<XmlNode> {
        let mut reader = Reader::from_reader(body);
        reader.config_mut().trim_text(true);

        // Stack of elements under construction; the root is pushed on the
        // first Start event.
        let mut stack: Vec<XmlNode> = Vec::new();

        loop {
            match reader
                .read_event()
                .map_err(|e| Error::malformed_response("invalid xml").with_source(e))?
            {
                Event::Start(e) => {
                    stack.push(XmlNode {
                        name: local_name(e.name().as_ref())?,
                        ..Default::default()
                    });
                }
                Event::Empty(e) => {
                    let node = XmlNode {
                        name: local_name(e.name().as_ref())?,
                        ..Default::default()
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => return Ok(node),
                    }
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::malformed_response("invalid xml text").with_source(e))?;
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&text);
                    }
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| Error::malformed_response("unbalanced xml end tag"))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => return Ok(node),
                    }
                }
                Event::Eof => {
                    return Err(Error::malformed_response("xml document has no root element"));
                }
                // Declarations, comments, processing instructions, CDATA.
                _ => {}
            }
        }
    }

    /// The first direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Depth-first search for the first descendant with the given name.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(hit) = child.find(name) {
                return Some(hit);
            }
        }
        None
    }

    /// Text of the first descendant with the given name, if non-empty.
    pub fn find_text(&self, name: &str) -> Option<&str> {
        self.find(name).map(|n| n.text.as_str()).filter(|t| !t.is_empty())
    }
}

fn local_name(raw: &[u8]) -> Result<String> {
    let name = std::str::from_utf8(raw)
        .map_err(|e| Error::malformed_response("invalid xml element name").with_source(e))?;
    // Strip a namespace prefix; responses mix plain and prefixed names.
    Ok(name.rsplit(':').next().unwrap_or(name).to_string())
}

/// The decoded response body.
#[derive(Debug, Clone)]
pub enum BodyTree {
    /// An XML document (the majority of services).
    Xml(XmlNode),
    /// A JSON object (the archival storage service).
    Json(serde_json::Value),
    /// No body.
    Empty,
}

/// A decoded service response: status, headers and the body tree.
///
/// Never mutated after creation.
#[derive(Debug)]
pub struct ParsedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: BodyTree,
}

impl ParsedResponse {
    /// Decode a response body according to its declared content type.
    ///
    /// XML and JSON are recognized from the `content-type` header; with no
    /// usable declaration the body shape is sniffed from its first byte.
    pub fn parse(status: StatusCode, headers: HeaderMap, body: &Bytes) -> Result<Self> {
        let body = Self::decode_body(&headers, body)?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Build an empty response, for 204-style outcomes.
    pub fn empty(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            status,
            headers,
            body: BodyTree::Empty,
        }
    }

    fn decode_body(headers: &HeaderMap, body: &Bytes) -> Result<BodyTree> {
        if body.is_empty() {
            return Ok(BodyTree::Empty);
        }

        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if content_type.contains("json") {
            let value: serde_json::Value = serde_json::from_slice(body)
                .map_err(|e| Error::malformed_response("invalid json body").with_source(e))?;
            return Ok(BodyTree::Json(value));
        }

        if content_type.contains("xml") || body.first() == Some(&b'<') {
            return Ok(BodyTree::Xml(XmlNode::parse(body)?));
        }

        Err(Error::malformed_response(format!(
            "unsupported content type `{content_type}`"
        )))
    }

    /// The HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The decoded body tree.
    pub fn body(&self) -> &BodyTree {
        &self.body
    }

    /// The XML root, if the body was XML.
    pub fn xml(&self) -> Option<&XmlNode> {
        match &self.body {
            BodyTree::Xml(root) => Some(root),
            _ => None,
        }
    }

    /// The JSON value, if the body was JSON.
    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.body {
            BodyTree::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Text of the first descendant element with the given name.
    pub fn text_of(&self, name: &str) -> Option<&str> {
        match &self.body {
            BodyTree::Xml(root) => root.find_text(name),
            BodyTree::Json(v) => v.get(name).and_then(|v| v.as_str()),
            BodyTree::Empty => None,
        }
    }

    /// Boolean value of the named element (`true`/`false`).
    pub fn bool_of(&self, name: &str) -> Option<bool> {
        match &self.body {
            BodyTree::Json(v) => v.get(name).and_then(|v| v.as_bool()),
            _ => self.text_of(name).and_then(|t| t.parse().ok()),
        }
    }

    /// Integer value of the named element.
    pub fn i64_of(&self, name: &str) -> Option<i64> {
        match &self.body {
            BodyTree::Json(v) => v.get(name).and_then(|v| v.as_i64()),
            _ => self.text_of(name).and_then(|t| t.parse().ok()),
        }
    }

    /// Float value of the named element.
    pub fn f64_of(&self, name: &str) -> Option<f64> {
        match &self.body {
            BodyTree::Json(v) => v.get(name).and_then(|v| v.as_f64()),
            _ => self.text_of(name).and_then(|t| t.parse().ok()),
        }
    }

    /// Timestamp value of the named element, accepting RFC3339 or epoch
    /// seconds.
    pub fn timestamp_of(&self, name: &str) -> Option<DateTime> {
        let text = self.text_of(name)?;
        if let Ok(t) = chrono::DateTime::parse_from_rfc3339(text) {
            return Some(t.with_timezone(&chrono::Utc));
        }
        let epoch: f64 = text.parse().ok()?;
        chrono::DateTime::from_timestamp(epoch as i64, 0)
    }
}
