//! draw.io diagram reader.
//!
//! Flattens an `mxCell`-based diagram XML document into a cell dictionary,
//! reconstructing parent/child relationships and preserving document order
//! (which later determines column and table ordering downstream).

use ahash::AHashMap;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::path::Path;

/// A single `mxCell` node from the diagram, before any schema interpretation.
#[derive(Debug, Clone, Default)]
pub struct CellData {
    pub id: String,
    /// Raw (HTML-bearing) value, as it appeared in the XML attribute.
    pub value: String,
    pub style: String,
    pub parent: Option<String>,
    pub vertex: bool,
    pub edge: bool,
    pub source: Option<String>,
    pub target: Option<String>,
    pub children: Vec<String>,
}

/// The flattened diagram: a cell lookup plus the document order of every cell id.
#[derive(Debug, Default)]
pub struct Diagram {
    pub cells: AHashMap<String, CellData>,
    /// Every cell id in the order it was encountered in the document.
    pub order: Vec<String>,
}

impl Diagram {
    pub fn get(&self, id: &str) -> Option<&CellData> {
        self.cells.get(id)
    }

    /// Cell ids (in document order) that are edges (`edge == "1"`).
    pub fn edge_ids(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .map(|s| s.as_str())
            .filter(move |id| self.cells.get(*id).is_some_and(|c| c.edge))
    }
}

/// Read and flatten a draw.io diagram file.
pub fn read_diagram(path: &Path) -> Result<Diagram> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input file: {}", path.display()))?;
    parse_diagram(&content)
}

/// Parse draw.io diagram XML content into a [`Diagram`].
pub fn parse_diagram(xml: &str) -> Result<Diagram> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut cells: AHashMap<String, CellData> = AHashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"mxCell" {
                    let mut cell = CellData::default();
                    for attr in e.attributes().flatten() {
                        let value = attr
                            .decode_and_unescape_value(reader.decoder())
                            .map(|v| v.into_owned())
                            .unwrap_or_default();
                        match attr.key.as_ref() {
                            b"id" => cell.id = value,
                            b"value" => cell.value = value,
                            b"style" => cell.style = value,
                            b"parent" => cell.parent = Some(value).filter(|v| !v.is_empty()),
                            b"vertex" => cell.vertex = value == "1",
                            b"edge" => cell.edge = value == "1",
                            b"source" => cell.source = Some(value).filter(|v| !v.is_empty()),
                            b"target" => cell.target = Some(value).filter(|v| !v.is_empty()),
                            _ => {}
                        }
                    }
                    if !cell.id.is_empty() {
                        order.push(cell.id.clone());
                        cells.insert(cell.id.clone(), cell);
                    }
                }
            }
            Ok(Event::End(_)) => {}
            Err(e) => return Err(anyhow::anyhow!("malformed diagram XML: {e}")),
            _ => {}
        }
        buf.clear();
    }

    // Second pass: link each cell onto its parent's children list, in document order.
    for id in &order {
        let parent_id = cells.get(id).and_then(|c| c.parent.clone());
        if let Some(parent_id) = parent_id {
            if let Some(parent) = cells.get_mut(&parent_id) {
                parent.children.push(id.clone());
            }
        }
    }

    Ok(Diagram { cells, order })
}

static BR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static DIV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?div>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?(b|strong)>").unwrap());

/// Normalize a raw cell value: strip `<br/>`/`<div>` markup, unescape HTML
/// entities, collapse whitespace, and trim.
pub fn normalize_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let text = BR_RE.replace_all(raw, " ");
    let text = DIV_RE.replace_all(&text, " ");
    let text = html_unescape(&text);
    let text = WHITESPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Whether the raw (pre-normalization) value carries bold markup.
pub fn is_bold_value(raw: &str) -> bool {
    BOLD_RE.is_match(raw)
}

/// Whether a style string's `fontStyle` has bit 0 (bold) set.
pub fn is_bold_style(style: &str) -> bool {
    parse_style(style)
        .get("fontStyle")
        .and_then(|v| v.parse::<i64>().ok())
        .is_some_and(|n| n & 1 != 0)
}

/// Parse a semicolon-separated `key=value` style string into a lookup map.
/// Bare flags (no `=`) are ignored, matching draw.io's own loose style grammar.
pub fn parse_style(style: &str) -> AHashMap<&str, &str> {
    style
        .split(';')
        .filter_map(|part| {
            let part = part.trim();
            let (k, v) = part.split_once('=')?;
            Some((k.trim(), v.trim()))
        })
        .collect()
}

/// Minimal HTML entity unescaping covering the entities draw.io emits in cell values.
fn html_unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '&' {
            out.push(c);
            continue;
        }
        if let Some(end) = s[i..].find(';').map(|p| i + p) {
            let entity = &s[i + 1..end];
            let replaced = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity
                    .strip_prefix('#')
                    .and_then(|n| n.strip_prefix('x').or(Some(n)))
                    .and_then(|n| {
                        if let Some(hex) = entity.strip_prefix("#x") {
                            u32::from_str_radix(hex, 16).ok()
                        } else if let Some(dec) = entity.strip_prefix('#') {
                            dec.parse::<u32>().ok()
                        } else {
                            None
                        }
                    })
                    .and_then(char::from_u32),
            };
            if let Some(ch) = replaced {
                out.push(ch);
                // Skip the consumed characters of the entity (up to and including ';').
                while let Some(&(j, _)) = chars.peek() {
                    if j <= end {
                        chars.next();
                    } else {
                        break;
                    }
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_br_and_div_and_whitespace() {
        let raw = "  id<br/>:<div>INT</div>  PK  ";
        assert_eq!(normalize_text(raw), "id : INT PK");
    }

    #[test]
    fn unescapes_entities() {
        assert_eq!(normalize_text("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(normalize_text("a &lt; b"), "a < b");
    }

    #[test]
    fn detects_bold_markup() {
        assert!(is_bold_value("<b>email</b>"));
        assert!(is_bold_value("<strong>email</strong>"));
        assert!(!is_bold_value("email"));
    }

    #[test]
    fn detects_bold_font_style_bit() {
        assert!(is_bold_style("fontStyle=1;html=1"));
        assert!(is_bold_style("fontStyle=5")); // bold + underline
        assert!(!is_bold_style("fontStyle=4")); // underline only
        assert!(!is_bold_style("html=1"));
    }

    #[test]
    fn parses_style_pairs() {
        let style = parse_style("shape=table;rounded=0;whiteSpace=wrap");
        assert_eq!(style.get("shape"), Some(&"table"));
        assert_eq!(style.get("rounded"), Some(&"0"));
    }

    #[test]
    fn parses_minimal_diagram() {
        let xml = r#"<mxGraphModel><root>
            <mxCell id="0" />
            <mxCell id="1" parent="0" />
            <mxCell id="2" value="author" style="shape=table" vertex="1" parent="1" />
            <mxCell id="3" edge="1" source="2" target="2" parent="1" />
        </root></mxGraphModel>"#;
        let diagram = parse_diagram(xml).unwrap();
        assert_eq!(diagram.cells.len(), 4);
        assert!(diagram.cells["1"].children.contains(&"2".to_string()));
        assert!(diagram.cells["1"].children.contains(&"3".to_string()));
        assert_eq!(diagram.edge_ids().collect::<Vec<_>>(), vec!["3"]);
    }

    #[test]
    fn tolerates_orphan_parent() {
        let xml = r#"<root><mxCell id="1" parent="does-not-exist" vertex="1" /></root>"#;
        let diagram = parse_diagram(xml).unwrap();
        assert!(diagram.cells.contains_key("1"));
    }
}
