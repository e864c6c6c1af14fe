// src/parser.rs
// Builds a CatalogTree out of a code database document.

use crate::catalog_tree::CatalogTree;
use crate::error::{CatalogError, Result};
use crate::types::{CatalogNode, Category, Code, PlaceholderSpec};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

pub const UNKNOWN_GAME_ID: &str = "UNKW00";
pub const UNKNOWN_GAME_NAME: &str = "Unknown Game";

// Wrapper characters around a top-level code payload; one more per nesting level.
const TOP_LEVEL_DEPTH: usize = 3;

/// Normalization applied to code bodies after unwrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyCase {
    #[default]
    Preserve,
    Upper,
}

impl BodyCase {
    pub fn as_str(self) -> &'static str {
        match self {
            BodyCase::Preserve => "preserve",
            BodyCase::Upper => "upper",
        }
    }
}

impl FromStr for BodyCase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(BodyCase::Preserve),
            "upper" => Ok(BodyCase::Upper),
            other => Err(format!("unknown body case '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub body_case: BodyCase,
}

#[derive(Debug)]
pub struct ParsedCatalog {
    pub tree: CatalogTree,
    pub game_id: String,
    pub game_name: String,
}

pub fn parse_file(path: &Path, options: &ParseOptions) -> Result<ParsedCatalog> {
    info!("[PARSER] Reading database {}", path.display());
    let bytes = fs::read(path)?;
    let xml = String::from_utf8(bytes).map_err(|e| CatalogError::Xml {
        position: e.utf8_error().valid_up_to(),
        message: format!("{} is not UTF-8 encoded; save the database as UTF-8", path.display()),
    })?;
    parse_str(&xml, options)
}

pub fn parse_str(xml: &str, options: &ParseOptions) -> Result<ParsedCatalog> {
    let root = read_document(xml)?;
    let (game_id, game_name) = game_metadata(&root);
    let nodes = build_entries(&root.children, "", TOP_LEVEL_DEPTH, options)?;
    let tree = CatalogTree::from_nodes(nodes);
    info!(
        codes = tree.code_count(),
        top_level = tree.nodes().len(),
        "[PARSER] Imported {} [{}]",
        game_name,
        game_id
    );
    Ok(ParsedCatalog { tree, game_id, game_name })
}

// --- Element tree ---

// `text` is the character data before the first child node (element,
// comment or processing instruction), untrimmed.
#[derive(Debug, Default)]
struct XmlElement {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    text_closed: bool,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(start: &BytesStart, position: usize) -> Result<Self> {
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| xml_error(position, e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| xml_error(position, e))?;
            attributes.push((key, value.into_owned()));
        }
        Ok(XmlElement { tag, attributes, ..Default::default() })
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn child(&self, tag: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.tag == tag)
    }

    fn push_text(&mut self, text: &str) {
        if !self.text_closed {
            self.text.push_str(text);
        }
    }
}

/// XML 1.0 end-of-line handling: `\r\n` and lone `\r` become `\n`.
fn normalize_newlines(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\r') {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
}

fn xml_error(position: usize, e: impl std::fmt::Display) -> CatalogError {
    CatalogError::Xml { position, message: e.to_string() }
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => {
            parent.text_closed = true;
            parent.children.push(element);
        }
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn read_document(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        let position = reader.buffer_position();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => stack.push(XmlElement::from_start(e, position)?),
            Ok(Event::Empty(ref e)) => {
                let element = XmlElement::from_start(e, position)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Ok(Event::Text(ref t)) => {
                // Line endings are normalized before references are expanded,
                // so an escaped `&#13;` survives.
                let raw = String::from_utf8_lossy(t);
                let text = unescape(&normalize_newlines(&raw))
                    .map_err(|e| xml_error(position, e))?
                    .into_owned();
                if let Some(top) = stack.last_mut() {
                    top.push_text(&text);
                }
            }
            Ok(Event::CData(c)) => {
                let raw = String::from_utf8_lossy(&c.into_inner()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.push_text(&normalize_newlines(&raw));
                }
            }
            Ok(Event::Comment(_)) | Ok(Event::PI(_)) => {
                if let Some(top) = stack.last_mut() {
                    top.text_closed = true;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(xml_error(
            reader.buffer_position(),
            format!("unexpected end of document inside <{}>", open.tag),
        ));
    }
    root.ok_or(CatalogError::EmptyDocument)
}

// --- Catalog construction ---

fn game_metadata(root: &XmlElement) -> (String, String) {
    let text_of = |tag: &str| {
        root.child(tag)
            .map(|e| e.text.trim())
            .filter(|t| !t.is_empty())
    };
    match (text_of("gameid"), text_of("gamename")) {
        (Some(id), Some(name)) => (id.to_string(), name.to_string()),
        _ => {
            warn!("[PARSER] Missing gameid/gamename, using {} / {}", UNKNOWN_GAME_ID, UNKNOWN_GAME_NAME);
            (UNKNOWN_GAME_ID.to_string(), UNKNOWN_GAME_NAME.to_string())
        }
    }
}

fn build_entries(
    elements: &[XmlElement],
    parent_path: &str,
    depth: usize,
    options: &ParseOptions,
) -> Result<Vec<CatalogNode>> {
    let mut nodes = Vec::new();
    let entries = elements
        .iter()
        .filter(|e| e.tag == "category" || e.tag == "code");
    for (index, entry) in entries.enumerate() {
        let path = if parent_path.is_empty() {
            format!("{}[{}]", entry.tag, index)
        } else {
            format!("{}/{}[{}]", parent_path, entry.tag, index)
        };
        let node = if entry.tag == "category" {
            let name = required(entry, "name", &path)?;
            let children = build_entries(&entry.children, &path, depth + 1, options)?;
            CatalogNode::Category(Category::new(name, children))
        } else {
            CatalogNode::Code(build_code(entry, &path, depth, options)?)
        };
        nodes.push(node);
    }
    debug!("[PARSER] {} entries under '{}' at depth {}", nodes.len(), parent_path, depth);
    Ok(nodes)
}

fn build_code(entry: &XmlElement, path: &str, depth: usize, options: &ParseOptions) -> Result<Code> {
    let name = required(entry, "name", path)?;
    let comment = required(entry, "comment", path)?;
    let payload = entry
        .children
        .first()
        .ok_or_else(|| CatalogError::MissingBody { path: path.to_string() })?;

    let mut body = strip_wrapper(&payload.text, depth);
    if options.body_case == BodyCase::Upper {
        body = body.to_uppercase();
    }

    let placeholders = entry
        .children
        .iter()
        .filter(|c| c.tag == "placeholder")
        .enumerate()
        .map(|(i, p)| parse_placeholder(p, &format!("{}/placeholder[{}]", path, i)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Code::new(name, body, comment, placeholders))
}

fn parse_placeholder(element: &XmlElement, path: &str) -> Result<PlaceholderSpec> {
    let malformed = |attribute: &'static str, value: &str| CatalogError::MalformedPlaceholder {
        path: path.to_string(),
        attribute,
        value: value.to_string(),
    };

    let letter_text = required(element, "letter", path)?;
    let mut chars = letter_text.chars();
    let letter = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(malformed("letter", letter_text)),
    };

    let type_text = required(element, "type", path)?;
    let kind = type_text
        .trim()
        .parse::<i32>()
        .map_err(|_| malformed("type", type_text))?;

    let comment = required(element, "comment", path)?;
    let args = required(element, "args", path)?
        .split(',')
        .map(String::from)
        .collect();

    let recursive = match element.attribute("recursive") {
        Some(text) => text.trim().parse::<i64>().map_err(|_| malformed("recursive", text))? != 0,
        None => false,
    };

    Ok(PlaceholderSpec {
        letter,
        kind,
        comment: comment.to_string(),
        args,
        recursive,
    })
}

fn required<'a>(element: &'a XmlElement, attribute: &'static str, path: &str) -> Result<&'a str> {
    element
        .attribute(attribute)
        .ok_or_else(|| CatalogError::MissingAttribute { path: path.to_string(), attribute })
}

/// Drops exactly one leading and `depth` trailing characters.
fn strip_wrapper(raw: &str, depth: usize) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= depth + 1 {
        return String::new();
    }
    chars[1..chars.len() - depth].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TriState;

    const SAMPLE: &str = "<codes>\n\t<gameid>RMCE01</gameid>\n\t<gamename>Mario Kart Wii</gamename>\n\t<category name=\"Stats\">\n\t\t<code name=\"Infinite HP\" comment=\"Never die\">\n\t\t\t<data>\n0A1B2C3D 00000063\n\t\t\t</data>\n\t\t\t<placeholder letter=\"X\" type=\"1\" comment=\"Amount\" args=\"1,2,3\" recursive=\"1\"/>\n\t\t</code>\n\t</category>\n\t<code name=\"Moon Jump\" comment=\"\">\n\t\t<data>\ndeadbeef\n\t\t</data>\n\t</code>\n</codes>\n";

    #[test]
    fn strips_one_leading_and_depth_trailing_chars() {
        assert_eq!(strip_wrapper("*0123ABCD*\t\t", 3), "0123ABCD");
        assert_eq!(strip_wrapper("ab", 3), "");
        assert_eq!(strip_wrapper("", 3), "");
    }

    #[test]
    fn parses_nested_sample() {
        let parsed = parse_str(SAMPLE, &ParseOptions::default()).unwrap();
        assert_eq!(parsed.game_id, "RMCE01");
        assert_eq!(parsed.game_name, "Mario Kart Wii");

        let nodes = parsed.tree.nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name(), "Stats");

        let hp = nodes[0].children()[0].as_code().unwrap();
        assert_eq!(hp.body, "0A1B2C3D 00000063");
        assert_eq!(hp.comment, "Never die");
        assert_eq!(hp.checked, TriState::Unchecked);
        assert!(!hp.editable);
        assert_eq!(
            hp.placeholders,
            vec![PlaceholderSpec {
                letter: 'X',
                kind: 1,
                comment: "Amount".into(),
                args: vec!["1".into(), "2".into(), "3".into()],
                recursive: true,
            }]
        );

        let jump = nodes[1].as_code().unwrap();
        assert_eq!(jump.body, "deadbeef");
    }

    #[test]
    fn upper_case_normalization() {
        let options = ParseOptions { body_case: BodyCase::Upper };
        let parsed = parse_str(SAMPLE, &options).unwrap();
        assert_eq!(parsed.tree.nodes()[1].as_code().unwrap().body, "DEADBEEF");
    }

    #[test]
    fn missing_metadata_falls_back() {
        let parsed = parse_str("<codes><gameid>RMCE01</gameid></codes>", &ParseOptions::default()).unwrap();
        assert_eq!(parsed.game_id, UNKNOWN_GAME_ID);
        assert_eq!(parsed.game_name, UNKNOWN_GAME_NAME);
        assert!(parsed.tree.is_empty());
    }

    #[test]
    fn missing_comment_reports_path() {
        let xml = "<codes><category name=\"A\"><code name=\"x\"><d>*00*\t\t\t</d></code></category></codes>";
        let err = parse_str(xml, &ParseOptions::default()).unwrap_err();
        match err {
            CatalogError::MissingAttribute { path, attribute } => {
                assert_eq!(path, "category[0]/code[0]");
                assert_eq!(attribute, "comment");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_placeholder_type_is_fatal() {
        let xml = "<codes><code name=\"x\" comment=\"\"><d>*00*\t\t</d><placeholder letter=\"X\" type=\"abc\" comment=\"\" args=\"\"/></code></codes>";
        let err = parse_str(xml, &ParseOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::MalformedPlaceholder { attribute: "type", ref value, .. } if value == "abc"
        ));
    }

    #[test]
    fn code_without_payload_is_fatal() {
        let err = parse_str("<codes><code name=\"x\" comment=\"\"/></codes>", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, CatalogError::MissingBody { ref path } if path == "code[0]"));
    }

    fn placeholder_code(placeholder: &str) -> String {
        format!("<codes><code name=\"x\" comment=\"\"><d>*00*\t\t</d>{}</code></codes>", placeholder)
    }

    #[test]
    fn crlf_documents_give_the_same_bodies() {
        let crlf = SAMPLE.replace('\n', "\r\n");
        let parsed = parse_str(&crlf, &ParseOptions::default()).unwrap();
        let bodies: Vec<&str> = parsed.tree.codes().iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["0A1B2C3D 00000063", "deadbeef"]);

        let lone_cr = "<codes><code name=\"x\" comment=\"\"><d>\rAB\r\t\t</d></code></codes>";
        let parsed = parse_str(lone_cr, &ParseOptions::default()).unwrap();
        assert_eq!(parsed.tree.codes()[0].body, "AB");
    }

    #[test]
    fn escaped_carriage_return_is_kept() {
        let xml = "<codes><code name=\"x\" comment=\"\"><d>*A&#13;B*\t\t</d></code></codes>";
        let parsed = parse_str(xml, &ParseOptions::default()).unwrap();
        assert_eq!(parsed.tree.codes()[0].body, "A\rB");
    }

    #[test]
    fn payload_text_stops_at_a_comment() {
        let xml = "<codes><code name=\"x\" comment=\"\"><d>*AB*\t\t<!-- note -->tail</d></code></codes>";
        let parsed = parse_str(xml, &ParseOptions::default()).unwrap();
        assert_eq!(parsed.tree.codes()[0].body, "AB");
    }

    #[test]
    fn recursive_defaults_to_false() {
        let xml = placeholder_code("<placeholder letter=\"Y\" type=\"2\" comment=\"c\" args=\"a\"/>");
        let parsed = parse_str(&xml, &ParseOptions::default()).unwrap();
        let placeholder = &parsed.tree.codes()[0].placeholders[0];
        assert_eq!(placeholder.letter, 'Y');
        assert!(!placeholder.recursive);

        let xml = placeholder_code("<placeholder letter=\"Y\" type=\"2\" comment=\"c\" args=\"a\" recursive=\"0\"/>");
        let parsed = parse_str(&xml, &ParseOptions::default()).unwrap();
        assert!(!parsed.tree.codes()[0].placeholders[0].recursive);
    }

    #[test]
    fn malformed_recursive_is_fatal() {
        let xml = placeholder_code("<placeholder letter=\"Y\" type=\"2\" comment=\"c\" args=\"a\" recursive=\"yes\"/>");
        let err = parse_str(&xml, &ParseOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::MalformedPlaceholder { attribute: "recursive", ref value, ref path }
                if value == "yes" && path == "code[0]/placeholder[0]"
        ));
    }

    #[test]
    fn letter_must_be_one_character() {
        for letter in ["", "XY"] {
            let xml = placeholder_code(&format!(
                "<placeholder letter=\"{}\" type=\"2\" comment=\"c\" args=\"a\"/>",
                letter
            ));
            let err = parse_str(&xml, &ParseOptions::default()).unwrap_err();
            assert!(matches!(
                err,
                CatalogError::MalformedPlaceholder { attribute: "letter", ref value, .. } if value == letter
            ));
        }
    }

    #[test]
    fn unnamed_category_reports_path() {
        let xml = "<codes><category name=\"A\"><category><code name=\"x\" comment=\"\"><d>*0*\t\t\t\t\t</d></code></category></category></codes>";
        let err = parse_str(xml, &ParseOptions::default()).unwrap_err();
        match err {
            CatalogError::MissingAttribute { path, attribute } => {
                assert_eq!(path, "category[0]/category[0]");
                assert_eq!(attribute, "name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn document_order_is_kept() {
        let xml = "<codes><code name=\"First\" comment=\"\"><d>*11*\t\t</d></code>\
            <category name=\"Middle\"><code name=\"Inner\" comment=\"\"><d>*22*\t\t\t</d></code></category>\
            <code name=\"Last\" comment=\"\"><d>*33*\t\t</d></code></codes>";
        let parsed = parse_str(xml, &ParseOptions::default()).unwrap();
        let names: Vec<&str> = parsed.tree.nodes().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["First", "Middle", "Last"]);
        assert_eq!(parsed.tree.nodes()[1].children()[0].as_code().unwrap().body, "22");
    }

    #[test]
    fn non_utf8_file_is_an_xml_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"<codes><gamename>Pok\xe9mon</gamename></codes>").unwrap();
        let err = parse_file(file.path(), &ParseOptions::default()).unwrap_err();
        match err {
            CatalogError::Xml { position, message } => {
                assert_eq!(position, 20);
                assert!(message.contains("not UTF-8"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn syntax_errors_and_empty_documents() {
        assert!(matches!(
            parse_str("<codes><category name=\"A\"></codes>", &ParseOptions::default()),
            Err(CatalogError::Xml { .. })
        ));
        assert!(matches!(parse_str("", &ParseOptions::default()), Err(CatalogError::EmptyDocument)));
    }
}
