//! Owned XML trees for structural comparison.
//!
//! Parsed documents from `sxd_document` borrow their storage, so patterns are
//! converted into an owned tree once at compile time and compared against the
//! tree of each candidate body.

use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;
use std::collections::BTreeMap;

/// Qualified name: (namespace URI, local part).
type Name = (Option<String>, String);

/// An XML element with its attributes as an unordered set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: Name,
    attributes: BTreeMap<Name, String>,
    children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Parse a document into its root element tree.
///
/// Comments and processing instructions are dropped, text is trimmed and
/// whitespace-only text between elements is ignored.
pub fn parse_tree(input: &str) -> Result<XmlElement, String> {
    let package = parser::parse(input).map_err(|e| format!("{e:?}"))?;
    let document = package.as_document();

    document
        .root()
        .children()
        .into_iter()
        .find_map(|child| match child {
            ChildOfRoot::Element(element) => Some(convert(element)),
            _ => None,
        })
        .ok_or_else(|| "document has no root element".to_string())
}

fn qualified(namespace: Option<&str>, local: &str) -> Name {
    (namespace.map(str::to_string), local.to_string())
}

fn convert(element: Element<'_>) -> XmlElement {
    let name = element.name();
    let attributes = element
        .attributes()
        .into_iter()
        .map(|attr| {
            let attr_name = attr.name();
            (
                qualified(attr_name.namespace_uri(), attr_name.local_part()),
                attr.value().to_string(),
            )
        })
        .collect();

    let mut children = Vec::new();
    for child in element.children() {
        match child {
            ChildOfElement::Element(inner) => children.push(XmlNode::Element(convert(inner))),
            ChildOfElement::Text(text) => {
                let trimmed = text.text().trim();
                if trimmed.is_empty() {
                    continue;
                }
                // Adjacent text nodes (e.g. split by a comment) merge into one
                if let Some(XmlNode::Text(previous)) = children.last_mut() {
                    previous.push_str(trimmed);
                } else {
                    children.push(XmlNode::Text(trimmed.to_string()));
                }
            }
            _ => {}
        }
    }

    XmlElement {
        name: qualified(name.namespace_uri(), name.local_part()),
        attributes,
        children,
    }
}
