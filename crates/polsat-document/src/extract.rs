//! Policy document extraction.
//!
//! The document is first read into a small element tree, then each
//! `<policy>` element is validated and converted. Any structural problem
//! fails the whole document; no partial entry list is ever returned.

use std::path::Path;

use polsat_types::{Bounds, Rule, RuleKind};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DocumentError, Result};

const ROOT: &str = "policyFile";
const POLICY: &str = "policy";

// ============================================================================
// Policy Entry
// ============================================================================

/// One `<policy>` element, with identities still given by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub rule: Rule,
    pub description: String,
    pub attribute_type: String,
    pub vendor: String,
    /// Raw `<time>` text, if present and non-blank.
    pub time: Option<String>,
    /// User names in document order, duplicates removed.
    pub users: Vec<String>,
    /// Group names in document order, duplicates removed.
    pub groups: Vec<String>,
}

// ============================================================================
// Public API
// ============================================================================

/// Extracts every policy from a document held in memory.
pub fn extract_str(xml: &str) -> Result<Vec<PolicyEntry>> {
    let root = parse_tree(xml)?;
    if root.name != ROOT {
        return Err(DocumentError::UnexpectedRoot { found: root.name });
    }

    let mut entries = Vec::with_capacity(root.children.len());
    for (index, child) in root.children.iter().enumerate() {
        let position = index + 1;
        if child.name != POLICY {
            return Err(DocumentError::UnexpectedElement {
                policy: position,
                element: child.name.clone(),
            });
        }
        entries.push(policy_entry(child, position)?);
    }

    debug!(policies = entries.len(), "Extracted policy document");
    Ok(entries)
}

/// Reads and extracts a policy document from disk.
pub fn extract_file(path: &Path) -> Result<Vec<PolicyEntry>> {
    let xml = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    extract_str(&xml)
}

// ============================================================================
// Policy Conversion
// ============================================================================

fn policy_entry(policy: &Element, position: usize) -> Result<PolicyEntry> {
    let rule_el = policy.child("rule").ok_or(DocumentError::MissingElement {
        policy: position,
        element: "rule",
    })?;
    let rule = rule_from_element(rule_el, position)?;

    let description = policy
        .child("desc")
        .map(|d| d.text.trim().to_string())
        .unwrap_or_default();

    let attributes = policy
        .child("attributes")
        .ok_or(DocumentError::MissingElement {
            policy: position,
            element: "attributes",
        })?;

    let attribute_type = required_text(attributes, "type", position)?;
    let vendor = required_text(attributes, "vendor", position)?;
    let time = attributes
        .child("time")
        .map(|t| t.text.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let users = attributes
        .child("user")
        .map(|u| split_identities(&u.text))
        .unwrap_or_default();
    let groups = attributes
        .child("group")
        .map(|g| split_identities(&g.text))
        .unwrap_or_default();

    Ok(PolicyEntry {
        rule,
        description,
        attribute_type,
        vendor,
        time,
        users,
        groups,
    })
}

fn rule_from_element(rule: &Element, position: usize) -> Result<Rule> {
    let min = parse_bound(rule.attribute("min"), "min", position)?;
    let max = parse_bound(rule.attribute("max"), "max", position)?;

    match RuleKind::from_text(&rule.text) {
        RuleKind::Comparator => {
            if min.is_none() && max.is_none() {
                return Err(DocumentError::MissingBounds { policy: position });
            }
            Ok(Rule::Comparator(Bounds { min, max }))
        }
        kind => {
            if min.is_some() || max.is_some() {
                return Err(DocumentError::UnexpectedBounds {
                    policy: position,
                    rule: kind.to_string(),
                });
            }
            Ok(match kind {
                RuleKind::Other(name) => Rule::Other(name),
                _ => Rule::Access,
            })
        }
    }
}

fn parse_bound(raw: Option<&str>, attribute: &'static str, position: usize) -> Result<Option<i64>> {
    raw.map(|value| {
        value
            .trim()
            .parse::<i64>()
            .map_err(|_| DocumentError::InvalidBound {
                policy: position,
                attribute,
                value: value.to_string(),
            })
    })
    .transpose()
}

fn required_text(parent: &Element, name: &'static str, position: usize) -> Result<String> {
    parent
        .child(name)
        .map(|el| el.text.trim())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(DocumentError::MissingElement {
            policy: position,
            element: name,
        })
}

/// Splits a comma-separated identity list, dropping blanks and repeats.
fn split_identities(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in text.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|seen| seen == name) {
            names.push(name.to_string());
        }
    }
    names
}

// ============================================================================
// Element Tree
// ============================================================================

#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| DocumentError::Xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| DocumentError::Xml(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_tree(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(Element::open(&start)?),
            Ok(Event::Empty(start)) => {
                let element = Element::open(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|e| DocumentError::Xml(e.to_string()))?;
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&text);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DocumentError::Xml("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, processing instructions, doctypes
            Ok(_) => {}
            Err(e) => return Err(DocumentError::Xml(e.to_string())),
        }
    }

    if let Some(open) = stack.last() {
        return Err(DocumentError::Xml(format!("unclosed element '{}'", open.name)));
    }
    root.ok_or_else(|| DocumentError::Xml("document has no root element".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(DocumentError::Xml("multiple root elements".to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
