/// Detection of the coverage dialect a report is written in.
///
/// Both supported dialects are XML; they are told apart by the root element.
/// We read events only until the first element start, so detection costs a
/// few hundred bytes of the document at most.
use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{CovgateError, Result};

/// Supported coverage dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Class-granularity reports with a `<coverage>` root.
    Cobertura,
    /// Package/sourcefile-granularity reports with a `<report>` root.
    Jacoco,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Cobertura => "cobertura",
            Dialect::Jacoco => "jacoco",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name and attributes of a document's root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootElement {
    pub name: String,
    pub attributes: HashMap<String, String>,
}

impl RootElement {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

/// Read the root element of an XML document.
///
/// Returns `Ok(None)` when the document contains no element at all.
pub fn sniff_root(content: &[u8]) -> Result<Option<RootElement>> {
    let mut reader = Reader::from_reader(content);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf);
        match event {
            Err(e) => {
                return Err(CovgateError::Xml {
                    source: e,
                    position: reader.buffer_position(),
                })
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let mut attributes = HashMap::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| CovgateError::Xml {
                        source: err.into(),
                        position: reader.buffer_position(),
                    })?;
                    let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                    let value = attr
                        .unescape_value()
                        .map_err(|err| CovgateError::Xml {
                            source: err,
                            position: reader.buffer_position(),
                        })?
                        .into_owned();
                    attributes.insert(key, value);
                }
                return Ok(Some(RootElement { name, attributes }));
            }
            // Declarations, doctypes, comments and processing instructions
            // may precede the root.
            _ => {}
        }
        buf.clear();
    }
}
