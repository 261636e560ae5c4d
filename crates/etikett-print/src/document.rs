// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job document parsing.
//
// Upstream ERP systems send XML documents, sometimes several concatenated in
// one write.  A payload is split on the XML declaration, every fragment is
// made self-contained again, and a handful of free-text elements are wrapped
// in CDATA because their content routinely carries raw `&` and `<`.
//
// Document shape:
//
// ```text
// <?xml version="1.0"?>
// <Document>
//   <Head><Printer>ZEBRA1</Printer><Label>SHIP</Label><Count>2</Count></Head>
//   <Data><BSTKD>PO 4711 & sons</BSTKD><MATNR>100200</MATNR></Data>
// </Document>
// ```
//
// `Head` carries the routing header; every other leaf element anywhere in the
// document becomes a template field named after its tag.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use etikett_core::error::{EtikettError, Result};
use etikett_core::types::ParsedLabelRequest;

/// Anchor that starts every document in a payload.
pub const DOCUMENT_ANCHOR: &str = "<?xml ver";

/// Root marker an HTTP body must contain to be treated as a job.
pub const JOB_MARKER: &str = "<Printer>";

/// Free-text elements wrapped in CDATA before parsing.
pub const FREE_TEXT_FIELDS: [&str; 4] = ["BSTKD", "VENDOR_TEXT", "SHIP_FROM_TEXT", "MTTEXT"];

const HEAD: &[u8] = b"Head";
const HEAD_PRINTER: &[u8] = b"Printer";
const HEAD_LABEL: &[u8] = b"Label";
const HEAD_COUNT: &[u8] = b"Count";
const HEAD_WEIGHT: &[u8] = b"Weight";

/// Split a payload into self-contained document fragments.
pub fn split_documents(payload: &str) -> Vec<String> {
    payload
        .trim()
        .split(DOCUMENT_ANCHOR)
        .map(|fragment| fragment.trim_matches(' '))
        .filter(|fragment| !fragment.is_empty())
        .map(|fragment| format!("{DOCUMENT_ANCHOR}{fragment}"))
        .collect()
}

/// Wrap the content of each named element in a CDATA section.
pub fn wrap_cdata(xml: &str, elements: &[&str]) -> String {
    let mut xml = xml.to_string();
    for element in elements {
        xml = xml.replace(&format!("</{element}>"), &format!("]]></{element}>"));
        xml = xml.replace(&format!("<{element}>"), &format!("<{element}><![CDATA["));
    }
    xml
}

/// Parse one document fragment into a label request.
///
/// The free-text elements are CDATA-wrapped first.  Header values are trimmed;
/// field values are kept verbatim.  Returns an error for
/// malformed XML; header validation is left to the caller.
pub fn parse_document(fragment: &str) -> Result<ParsedLabelRequest> {
    let xml = wrap_cdata(fragment, &FREE_TEXT_FIELDS);
    let mut reader = Reader::from_str(&xml);

    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut leaf = false;
    let mut count = String::new();
    let mut request = ParsedLabelRequest::default();
    let mut fields: HashMap<String, String> = HashMap::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                text.clear();
                leaf = true;
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if !in_head(&path) && name != "Head" {
                    fields.insert(name, String::new());
                }
            }
            Ok(Event::Text(t)) => {
                let value = t
                    .unescape()
                    .map_err(|e| EtikettError::Document(e.to_string()))?;
                text.push_str(&value);
            }
            Ok(Event::CData(c)) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                if leaf {
                    let value = std::mem::take(&mut text);
                    let parent_is_head = path.len() >= 2 && path[path.len() - 2].as_bytes() == HEAD;
                    match name.as_ref() {
                        HEAD_PRINTER if parent_is_head => request.target_printer = value.trim().to_string(),
                        HEAD_LABEL if parent_is_head => request.label_kind = value.trim().to_string(),
                        HEAD_COUNT if parent_is_head => count = value,
                        HEAD_WEIGHT if parent_is_head => {
                            request.weight = Some(value.trim().to_string()).filter(|w| !w.is_empty())
                        }
                        _ if parent_is_head => {
                            debug!(element = %String::from_utf8_lossy(name.as_ref()), "ignoring head element");
                        }
                        _ => {
                            fields.insert(String::from_utf8_lossy(name.as_ref()).into_owned(), value);
                        }
                    }
                }
                path.pop();
                text.clear();
                leaf = false;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(EtikettError::Document(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    request.copy_count = parse_copy_count(&count);
    request.fields = fields;
    Ok(request)
}

/// Parse every fragment of a payload, dropping the ones that are not
/// actionable.
pub fn parse_payload(payload: &str) -> Vec<ParsedLabelRequest> {
    split_documents(payload)
        .iter()
        .filter_map(|fragment| match parse_document(fragment) {
            Ok(request) if request.is_actionable() => Some(request),
            Ok(request) => {
                debug!(
                    printer = %request.target_printer,
                    label = %request.label_kind,
                    "dropping fragment without printer or label"
                );
                None
            }
            Err(e) => {
                debug!(error = %e, "dropping malformed fragment");
                None
            }
        })
        .collect()
}

/// Whether an HTTP body looks like a job document.
pub fn is_job_document(body: &str) -> bool {
    let body = body.trim();
    !body.is_empty() && body.contains(JOB_MARKER)
}

/// Copies to print; empty, zero and unparseable counts mean one copy.
pub fn parse_copy_count(raw: &str) -> u32 {
    let raw = raw.trim();
    match raw.parse::<u32>() {
        Ok(0) => 1,
        Ok(n) => n,
        Err(_) if raw.is_empty() => 1,
        Err(e) => {
            warn!(count = raw, error = %e, "unparseable copy count, printing one copy");
            1
        }
    }
}

fn in_head(path: &[String]) -> bool {
    path.iter().any(|segment| segment.as_bytes() == HEAD)
}
