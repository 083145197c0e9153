#![forbid(unsafe_code)]

//! NodeSet type for document-subset canonicalization.
//!
//! A `NodeSet` records which nodes of a parsed document are visible to
//! the canonicalizer. The constructors cover the subsets this engine
//! needs: the whole document minus comments (empty-URI references), a
//! subtree minus comments (same-document `#id` references), and the
//! whole document minus whitespace-only text nodes (the
//! whitespace-discarding serialization pass). Removing a subtree
//! realizes the enveloped-signature transform.

use std::collections::HashSet;

/// A set of XML document nodes identified by `roxmltree::NodeId`.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<roxmltree::NodeId>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self {
            nodes: HashSet::new(),
        }
    }

    /// All nodes in the document except comments.
    ///
    /// Per the W3C DSig spec, `URI=""` selects the document without
    /// comments.
    pub fn all_without_comments(doc: &roxmltree::Document<'_>) -> Self {
        let mut nodes = HashSet::new();
        for node in doc.descendants() {
            if !node.is_comment() {
                nodes.insert(node.id());
            }
        }
        Self { nodes }
    }

    /// All nodes in the document except whitespace-only text nodes.
    ///
    /// Canonicalizing with this set discards insignificant whitespace
    /// while keeping comments and processing instructions.
    pub fn all_without_whitespace_text(doc: &roxmltree::Document<'_>) -> Self {
        let mut nodes = HashSet::new();
        for node in doc.descendants() {
            if node.is_text() && node.text().is_some_and(|t| t.trim().is_empty()) {
                continue;
            }
            nodes.insert(node.id());
        }
        Self { nodes }
    }

    /// The subtree rooted at `root`, excluding comment nodes.
    pub fn tree_without_comments(root: roxmltree::Node<'_, '_>) -> Self {
        let mut nodes = HashSet::new();
        for node in root.descendants() {
            if !node.is_comment() {
                nodes.insert(node.id());
            }
        }
        Self { nodes }
    }

    /// Remove `root` and all its descendants from the set.
    ///
    /// This is the enveloped-signature transform: the `<Signature>`
    /// subtree disappears from the digested content.
    pub fn remove_subtree(&mut self, root: roxmltree::Node<'_, '_>) {
        for node in root.descendants() {
            self.nodes.remove(&node.id());
        }
    }

    /// Check whether a node is in this set.
    pub fn contains(&self, node: &roxmltree::Node<'_, '_>) -> bool {
        self.nodes.contains(&node.id())
    }

    /// Number of nodes in the set.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_without_comments() {
        let doc = roxmltree::Document::parse("<a><!-- c --><b/></a>").unwrap();
        let ns = NodeSet::all_without_comments(&doc);
        let comment = doc.descendants().find(|n| n.is_comment()).unwrap();
        let b = doc.descendants().find(|n| n.has_tag_name("b")).unwrap();
        assert!(!ns.contains(&comment));
        assert!(ns.contains(&b));
    }

    #[test]
    fn test_all_without_whitespace_text() {
        let doc = roxmltree::Document::parse("<a>\n  <b>keep</b>\n</a>").unwrap();
        let ns = NodeSet::all_without_whitespace_text(&doc);
        for node in doc.descendants().filter(|n| n.is_text()) {
            let ws_only = node.text().unwrap().trim().is_empty();
            assert_eq!(ns.contains(&node), !ws_only);
        }
    }

    #[test]
    fn test_subtree_and_removal() {
        let doc = roxmltree::Document::parse("<a><b><c/></b><d/></a>").unwrap();
        let b = doc.descendants().find(|n| n.has_tag_name("b")).unwrap();
        let c = doc.descendants().find(|n| n.has_tag_name("c")).unwrap();
        let d = doc.descendants().find(|n| n.has_tag_name("d")).unwrap();

        let subtree = NodeSet::tree_without_comments(b);
        assert!(subtree.contains(&b));
        assert!(subtree.contains(&c));
        assert!(!subtree.contains(&d));

        let mut all = NodeSet::all_without_comments(&doc);
        all.remove_subtree(b);
        assert!(!all.contains(&b));
        assert!(!all.contains(&c));
        assert!(all.contains(&d));
    }
}
