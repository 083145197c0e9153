#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0 (C14N 1.0).
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//! With comments: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments`
//!
//! Per the spec, the canonical form:
//! - Outputs namespace declarations sorted by prefix (default first)
//! - Outputs attributes sorted by (namespace-URI, local-name)
//! - Escapes text and attribute values per C14N rules
//! - Optionally preserves or strips comments
//! - Supports document-subset canonicalization via NodeSet

use crate::escape;
use crate::render::{Attr, NsDecl};
use selo_core::Error;
use selo_xml::NodeSet;
use std::collections::BTreeMap;

/// Canonicalize a document using Inclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    let mut output = Vec::new();
    let ctx = C14nContext {
        with_comments,
        node_set,
    };
    ctx.process_node(doc.root(), &mut output, &BTreeMap::new())?;
    Ok(output)
}

struct C14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
}

impl C14nContext<'_> {
    fn is_visible(&self, node: &roxmltree::Node<'_, '_>) -> bool {
        match self.node_set {
            None => true,
            Some(ns) => ns.contains(node),
        }
    }

    fn process_node(
        &self,
        node: roxmltree::Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match node.node_type() {
            roxmltree::NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, output, inherited_ns)?;
                }
            }
            roxmltree::NodeType::Element => {
                self.process_element(node, output, inherited_ns)?;
            }
            roxmltree::NodeType::Text => {
                if self.is_visible(&node) {
                    let text = node.text().unwrap_or("");
                    output.extend_from_slice(escape::escape_text(text).as_bytes());
                }
            }
            roxmltree::NodeType::Comment => {
                if self.with_comments && self.is_visible(&node) {
                    // Document-level comments get newline separators from
                    // the document element.
                    let parent_is_root = node
                        .parent()
                        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);

                    if parent_is_root && node.prev_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }

                    output.extend_from_slice(b"<!--");
                    output.extend_from_slice(node.text().unwrap_or("").as_bytes());
                    output.extend_from_slice(b"-->");

                    if parent_is_root && node.next_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }
                }
            }
            roxmltree::NodeType::PI => {
                if self.is_visible(&node) {
                    let Some(pi) = node.pi() else {
                        return Ok(());
                    };
                    let parent_is_root = node
                        .parent()
                        .is_some_and(|p| p.node_type() == roxmltree::NodeType::Root);

                    if parent_is_root && node.prev_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }

                    output.extend_from_slice(b"<?");
                    output.extend_from_slice(pi.target.as_bytes());
                    if let Some(value) = pi.value {
                        if !value.is_empty() {
                            output.push(b' ');
                            output.extend_from_slice(escape::escape_pi(value).as_bytes());
                        }
                    }
                    output.extend_from_slice(b"?>");

                    if parent_is_root && node.next_siblings().any(|s| s.is_element()) {
                        output.push(b'\n');
                    }
                }
            }
        }
        Ok(())
    }

    fn process_element(
        &self,
        node: roxmltree::Node<'_, '_>,
        output: &mut Vec<u8>,
        inherited_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        if !self.is_visible(&node) {
            // Per C14N 1.0 section 2.3, an element outside the node-set
            // still has its in-set children processed. Invisible elements
            // contribute nothing to the inherited namespace context of
            // visible descendants.
            for child in node.children() {
                self.process_node(child, output, inherited_ns)?;
            }
            return Ok(());
        }

        // All namespace declarations in scope at this element: declared
        // here or on an ancestor and not overridden.
        let current_ns = collect_inscope_namespaces(&node);

        // Output a declaration when it is new or different from what the
        // nearest visible ancestor rendered. The xml prefix is never
        // declared.
        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for (prefix, uri) in &current_ns {
            if prefix == "xml" {
                continue;
            }
            if inherited_ns.get(prefix) != Some(uri) {
                ns_decls.push(NsDecl {
                    prefix: prefix.clone(),
                    uri: uri.clone(),
                });
            }
        }
        ns_decls.sort();

        // Collect attributes (namespace declarations are not attributes
        // in the roxmltree model).
        let mut attrs: Vec<Attr> = Vec::new();
        for attr in node.attributes() {
            let ns_uri = attr.namespace().unwrap_or("");
            attrs.push(Attr {
                ns_uri: ns_uri.to_owned(),
                local_name: attr.name().to_owned(),
                qualified_name: attr_qualified_name(&node, &attr),
                value: attr.value().to_owned(),
            });
        }

        // Document-subset serialization: when the immediate parent is not
        // in the node-set, xml:* attributes inherit from ancestors. A
        // visible parent renders its own xml:* attributes, so nothing is
        // inherited in that case.
        if self.node_set.is_some() {
            let parent_not_visible = node
                .parent()
                .map_or(true, |p| !p.is_element() || !self.is_visible(&p));
            if parent_not_visible {
                let extra = collect_inherited_xml_attrs(&node, &attrs);
                attrs.extend(extra);
            }
        }
        attrs.sort();

        let elem_name = qualified_element_name(&node, &current_ns);

        output.push(b'<');
        output.extend_from_slice(elem_name.as_bytes());
        for ns_decl in &ns_decls {
            ns_decl.render_into(output);
        }
        for attr in &attrs {
            attr.render_into(output);
        }
        output.push(b'>');

        // Children see this element's namespace context on top of the
        // inherited one.
        let mut child_ns = inherited_ns.clone();
        for (prefix, uri) in &current_ns {
            if prefix != "xml" {
                child_ns.insert(prefix.clone(), uri.clone());
            }
        }

        for child in node.children() {
            self.process_node(child, output, &child_ns)?;
        }

        output.extend_from_slice(b"</");
        output.extend_from_slice(elem_name.as_bytes());
        output.push(b'>');

        Ok(())
    }
}

/// For document-subset C14N 1.0: collect xml:* attributes inherited from
/// ancestors. Walks all ancestors (regardless of visibility) collecting
/// xml:* attributes, nearest value first, then removes any already
/// present on the element's own attribute axis.
fn collect_inherited_xml_attrs(
    node: &roxmltree::Node<'_, '_>,
    existing_attrs: &[Attr],
) -> Vec<Attr> {
    let xml_ns = selo_core::ns::XML;
    let mut inherited_xml: BTreeMap<String, String> = BTreeMap::new();

    let mut current = node.parent();
    while let Some(ancestor) = current {
        if ancestor.is_element() {
            for attr in ancestor.attributes() {
                if attr.namespace() == Some(xml_ns) {
                    let name = attr.name();
                    if !inherited_xml.contains_key(name) {
                        inherited_xml.insert(name.to_owned(), attr.value().to_owned());
                    }
                }
            }
        }
        current = ancestor.parent();
    }

    let mut result = Vec::new();
    for (name, value) in &inherited_xml {
        let already_present = existing_attrs
            .iter()
            .any(|a| a.ns_uri == xml_ns && a.local_name == *name);
        if !already_present {
            result.push(Attr {
                ns_uri: xml_ns.to_owned(),
                local_name: name.clone(),
                qualified_name: format!("xml:{name}"),
                value: value.clone(),
            });
        }
    }
    result
}

/// Collect all in-scope namespaces for an element.
///
/// Walks up the ancestor chain collecting namespace declarations, with
/// closer declarations overriding more distant ones.
fn collect_inscope_namespaces(node: &roxmltree::Node<'_, '_>) -> BTreeMap<String, String> {
    let mut ns_stack: Vec<BTreeMap<String, String>> = Vec::new();

    let mut current = Some(*node);
    while let Some(n) = current {
        if n.is_element() {
            let mut level = BTreeMap::new();
            for ns in n.namespaces() {
                let prefix = ns.name().unwrap_or("").to_owned();
                let uri = ns.uri().to_owned();
                level.insert(prefix, uri);
            }
            ns_stack.push(level);
        }
        current = n.parent();
    }

    // Merge from root down (root is last in the stack).
    let mut result = BTreeMap::new();
    for level in ns_stack.into_iter().rev() {
        for (prefix, uri) in level {
            if uri.is_empty() {
                // Un-declaration of the default namespace.
                result.remove(&prefix);
            } else {
                result.insert(prefix, uri);
            }
        }
    }
    result
}

/// Get the qualified element name (prefix:local or just local).
///
/// An element whose namespace is the in-scope default namespace renders
/// unprefixed; otherwise the prefix bound to its namespace URI is
/// looked up from the element's scope.
fn qualified_element_name(
    node: &roxmltree::Node<'_, '_>,
    inscope_ns: &BTreeMap<String, String>,
) -> String {
    let local = node.tag_name().name();
    match node.tag_name().namespace() {
        None => local.to_owned(),
        Some(uri) => {
            if inscope_ns.get("").map(String::as_str) == Some(uri) {
                return local.to_owned();
            }
            match node.lookup_prefix(uri) {
                Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
                _ => local.to_owned(),
            }
        }
    }
}

/// The qualified name of an attribute. Attributes never use the default
/// namespace, so a namespaced attribute always carries a prefix.
fn attr_qualified_name(
    node: &roxmltree::Node<'_, '_>,
    attr: &roxmltree::Attribute<'_, '_>,
) -> String {
    match attr.namespace() {
        None => attr.name().to_owned(),
        Some(uri) if uri == selo_core::ns::XML => format!("xml:{}", attr.name()),
        Some(uri) => match node.lookup_prefix(uri) {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, attr.name()),
            _ => attr.name().to_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str, with_comments: bool, node_set: Option<&NodeSet>) -> String {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let out = canonicalize(&doc, with_comments, node_set).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_attribute_sorting() {
        let xml = r#"<root><a b="1" a="2"/></root>"#;
        assert_eq!(c14n(xml, false, None), r#"<root><a a="2" b="1"></a></root>"#);
    }

    #[test]
    fn test_namespace_rendering() {
        let xml = r#"<root xmlns:b="http://b" xmlns:a="http://a"><a:child/></root>"#;
        let output = c14n(xml, false, None);
        assert_eq!(
            output,
            r#"<root xmlns:a="http://a" xmlns:b="http://b"><a:child></a:child></root>"#
        );
    }

    #[test]
    fn test_namespace_not_redeclared_on_children() {
        let xml = r#"<root xmlns="http://d"><child/></root>"#;
        assert_eq!(
            c14n(xml, false, None),
            r#"<root xmlns="http://d"><child></child></root>"#
        );
    }

    #[test]
    fn test_text_escaping() {
        let xml = r#"<root>a &amp; b &lt; c</root>"#;
        assert_eq!(c14n(xml, false, None), "<root>a &amp; b &lt; c</root>");
    }

    #[test]
    fn test_comments_stripped_and_kept() {
        let xml = "<root><!-- note --><a/></root>";
        assert_eq!(c14n(xml, false, None), "<root><a></a></root>");
        assert_eq!(c14n(xml, true, None), "<root><!-- note --><a></a></root>");
    }

    #[test]
    fn test_subset_renders_inscope_namespaces() {
        // Canonicalizing only the subtree must surface the namespace
        // declared on the (invisible) ancestor.
        let xml = r#"<root xmlns:x="http://x"><x:item a="1"/></root>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let item = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "item")
            .unwrap();
        let ns = NodeSet::tree_without_comments(item);
        let out = canonicalize(&doc, false, Some(&ns)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<x:item xmlns:x="http://x" a="1"></x:item>"#
        );
    }

    #[test]
    fn test_whitespace_subset_drops_insignificant_whitespace() {
        let xml = "<root>\n  <a>text</a>\n  <b/>\n</root>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        let ns = NodeSet::all_without_whitespace_text(&doc);
        let out = canonicalize(&doc, true, Some(&ns)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<root><a>text</a><b></b></root>"
        );
    }

    #[test]
    fn test_enveloped_subtree_removal() {
        let xml = "<root><keep/><Signature><SignedInfo/></Signature></root>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        let sig = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "Signature")
            .unwrap();
        let mut ns = NodeSet::all_without_comments(&doc);
        ns.remove_subtree(sig);
        let out = canonicalize(&doc, false, Some(&ns)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<root><keep></keep></root>");
    }
}
