//! Incremental conversion of a release document into per-record trees.
//!
//! A release is a single root element (`ClinVarVariationRelease` or
//! `ClinVarRCVRelease`) enclosing a long sequence of second-level records. The
//! [RecordParser] pulls events from `quick-xml` and only ever holds the record
//! currently being built in memory.

use std::io::BufRead;

use cvingest_core::{IngestError, Result, XmlNode};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

pub const VARIATION_RELEASE_TAG: &str = "ClinVarVariationRelease";
pub const RCV_RELEASE_TAG: &str = "ClinVarRCVRelease";

/// Attributes of the root element.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseHeader {
    pub root_tag: String,
    pub release_date: Option<String>,
}

/// One second-level element converted to a generic tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordNode {
    pub tag: String,
    pub node: XmlNode,
}

pub struct RecordParser<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    header: Option<ReleaseHeader>,
    finished: bool,
}

fn malformed(err: impl std::fmt::Display) -> IngestError {
    IngestError::MalformedXml(err.to_string())
}

/// Tag name and attributes of a start (or empty) element.
fn open_element(start: &BytesStart) -> Result<(String, XmlNode)> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(malformed)?
        .to_string();

    let mut node = XmlNode::new();
    for attr in start.attributes() {
        let attr = attr.map_err(malformed)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(malformed)?;
        let value = attr.unescape_value().map_err(malformed)?;
        node.set_attr(key, value.as_ref());
    }
    Ok((tag, node))
}

impl<R: BufRead> RecordParser<R> {
    pub fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            header: None,
            finished: false,
        }
    }

    ///
    /// Advance to the root element and return its attributes.
    ///
    /// Calling it again returns the already parsed header.
    ///
    pub fn read_header(&mut self) -> Result<ReleaseHeader> {
        if let Some(header) = &self.header {
            return Ok(header.clone());
        }

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(malformed)?;
            let (start, empty) = match event {
                Event::Start(start) => (start.into_owned(), false),
                Event::Empty(start) => (start.into_owned(), true),
                Event::Eof => {
                    return Err(IngestError::MalformedXml(
                        "no root element found".to_string(),
                    ));
                }
                _ => continue,
            };

            let (tag, mut attrs) = open_element(&start)?;
            if tag != VARIATION_RELEASE_TAG && tag != RCV_RELEASE_TAG {
                return Err(IngestError::UnknownShape(format!("root element <{}>", tag)));
            }
            let header = ReleaseHeader {
                root_tag: tag,
                release_date: attrs.take_attr("ReleaseDate"),
            };
            self.finished = empty;
            self.header = Some(header.clone());
            return Ok(header);
        }
    }

    ///
    /// Parse the next second-level record.
    ///
    /// Returns `Ok(None)` once the root element is closed.
    ///
    pub fn next_record(&mut self) -> Result<Option<RecordNode>> {
        if self.header.is_none() {
            self.read_header()?;
        }
        if self.finished {
            return Ok(None);
        }

        let mut stack: Vec<(String, XmlNode)> = Vec::new();
        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| {
                    IngestError::MalformedXml(format!(
                        "{} at byte {}",
                        e,
                        self.reader.buffer_position()
                    ))
                })?;

            match event {
                Event::Start(start) => {
                    stack.push(open_element(&start)?);
                }
                Event::Empty(start) => {
                    let (tag, node) = open_element(&start)?;
                    match stack.last_mut() {
                        Some((_, parent)) => parent.push_child(&tag, node),
                        None => return Ok(Some(RecordNode { tag, node })),
                    }
                }
                Event::End(_) => match stack.pop() {
                    Some((tag, node)) => match stack.last_mut() {
                        Some((_, parent)) => parent.push_child(&tag, node),
                        None => return Ok(Some(RecordNode { tag, node })),
                    },
                    // closing the root element
                    None => {
                        self.finished = true;
                        return Ok(None);
                    }
                },
                Event::Text(text) => {
                    if let Some((_, node)) = stack.last_mut() {
                        let text = text.unescape().map_err(malformed)?;
                        if !text.is_empty() {
                            node.append_text(&text);
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some((_, node)) = stack.last_mut() {
                        let text = std::str::from_utf8(&data).map_err(malformed)?;
                        node.append_text(text);
                    }
                }
                Event::Eof => {
                    return Err(IngestError::MalformedXml(
                        "unexpected end of input inside the release element".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordParser<R> {
    type Item = Result<RecordNode>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    const RELEASE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ClinVarVariationRelease ReleaseDate="2024-02-01">
  <VariationArchive VariationID="1" Accession="VCV000000001">
    <RecordStatus>current</RecordStatus>
    <ClassifiedRecord>
      <SimpleAllele AlleleID="10" VariationID="1">
        <Name>NM_000001.1:c.1A&gt;G</Name>
        <ProteinChange>K1R</ProteinChange>
        <ProteinChange>K2R</ProteinChange>
      </SimpleAllele>
    </ClassifiedRecord>
  </VariationArchive>
  <VariationArchive VariationID="2" Accession="VCV000000002"/>
</ClinVarVariationRelease>
"#;

    #[rstest]
    fn test_header() {
        let mut parser = RecordParser::new(RELEASE.as_bytes());
        let header = parser.read_header().unwrap();
        assert_eq!(header.root_tag, VARIATION_RELEASE_TAG);
        assert_eq!(header.release_date.as_deref(), Some("2024-02-01"));
    }

    #[rstest]
    fn test_records_become_trees() {
        let records: Vec<RecordNode> = RecordParser::new(RELEASE.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tag, "VariationArchive");
        assert_eq!(
            records[0].node.to_json(),
            json!({
                "@VariationID": "1",
                "@Accession": "VCV000000001",
                "RecordStatus": {"$": "current"},
                "ClassifiedRecord": {
                    "SimpleAllele": {
                        "@AlleleID": "10",
                        "@VariationID": "1",
                        "Name": {"$": "NM_000001.1:c.1A>G"},
                        "ProteinChange": [{"$": "K1R"}, {"$": "K2R"}]
                    }
                }
            })
        );
        assert_eq!(records[1].node.attr("Accession"), Some("VCV000000002"));
    }

    #[rstest]
    fn test_truncated_input_is_malformed() {
        let truncated = &RELEASE[..RELEASE.find("</SimpleAllele>").unwrap()];
        let result: Result<Vec<RecordNode>> = RecordParser::new(truncated.as_bytes()).collect();
        assert!(matches!(result, Err(IngestError::MalformedXml(_))));
    }

    #[rstest]
    fn test_mismatched_tags_are_malformed() {
        let broken = "<ClinVarVariationRelease><VariationArchive></ClinVarSet></ClinVarVariationRelease>";
        let result: Result<Vec<RecordNode>> = RecordParser::new(broken.as_bytes()).collect();
        assert!(matches!(result, Err(IngestError::MalformedXml(_))));
    }

    #[rstest]
    fn test_unknown_root() {
        let mut parser = RecordParser::new("<Something/>".as_bytes());
        assert!(matches!(parser.read_header(), Err(IngestError::UnknownShape(_))));
    }

    #[rstest]
    fn test_empty_release() {
        let mut parser = RecordParser::new(r#"<ClinVarRCVRelease ReleaseDate="2024-01-01"/>"#.as_bytes());
        assert_eq!(parser.next_record().unwrap(), None);
    }
}
