#![forbid(unsafe_code)]

//! Tolerant check for a pre-existing signature on a target element.

use selo_core::ns;
use std::path::Path;

/// True iff the signature tag exists and its last meaningful child is a
/// `Signature` element.
///
/// Every failure — missing file, malformed XML, absent tag — yields
/// `false`. This helper is a mutation gate used to decide whether to
/// sign again, never a validity check, and the orchestration layer
/// depends on it staying tolerant. It is the one place errors collapse
/// into a negative answer instead of propagating.
pub fn is_signed(path: &Path, signature_tag: &str) -> bool {
    match std::fs::read_to_string(path) {
        Ok(text) => is_signed_text(&text, signature_tag),
        Err(_) => false,
    }
}

/// Text-level variant of [`is_signed`].
pub fn is_signed_text(xml: &str, signature_tag: &str) -> bool {
    let Ok(doc) = roxmltree::Document::parse(xml) else {
        return false;
    };
    let Some(node) = selo_xml::document::find_by_tag_name(&doc, signature_tag) else {
        return false;
    };

    // Whitespace-only text does not count as a child; the document may
    // have been pretty-printed since it was signed.
    let last_meaningful = node
        .children()
        .filter(|n| !(n.is_text() && n.text().is_some_and(|t| t.trim().is_empty())))
        .last();

    match last_meaningful {
        Some(child) => child.is_element() && child.tag_name().name() == ns::node::SIGNATURE,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_document() {
        let xml = "<Doc><Items Id=\"X1\"/><Signature>sig</Signature></Doc>";
        assert!(is_signed_text(xml, "Doc"));
    }

    #[test]
    fn test_signature_not_last_child() {
        let xml = "<Doc><Signature>sig</Signature><Items Id=\"X1\"/></Doc>";
        assert!(!is_signed_text(xml, "Doc"));
    }

    #[test]
    fn test_unsigned_document() {
        assert!(!is_signed_text("<Doc><Items Id=\"X1\"/></Doc>", "Doc"));
    }

    #[test]
    fn test_trailing_whitespace_ignored() {
        let xml = "<Doc><Items/><Signature>sig</Signature>\n  </Doc>";
        assert!(is_signed_text(xml, "Doc"));
    }

    #[test]
    fn test_absent_tag_is_false() {
        assert!(!is_signed_text("<Doc/>", "Other"));
    }

    #[test]
    fn test_empty_element_is_false() {
        assert!(!is_signed_text("<Doc/>", "Doc"));
    }

    #[test]
    fn test_malformed_document_is_false() {
        assert!(!is_signed_text("<Doc><unclosed>", "Doc"));
    }

    #[test]
    fn test_missing_file_is_false() {
        assert!(!is_signed(Path::new("/nonexistent/file.xml"), "Doc"));
    }
}
