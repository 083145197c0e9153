#![forbid(unsafe_code)]

//! XML document wrapper over roxmltree.

use selo_core::Error;

/// An owned XML document. Stores the text; the parsed tree is rebuilt on
/// demand because `roxmltree::Document` borrows from it.
///
/// Call [`XmlDocument::parse_doc`] once at the top of a processing
/// pipeline and pass the resulting document reference down through the
/// call chain.
pub struct XmlDocument {
    text: String,
}

impl XmlDocument {
    /// Parse and validate XML from a string, taking ownership.
    pub fn parse(text: String) -> Result<Self, Error> {
        let _doc =
            roxmltree::Document::parse(&text).map_err(|e| Error::XmlParse(e.to_string()))?;
        Ok(Self { text })
    }

    /// Parse and validate XML from bytes.
    pub fn parse_bytes(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?
            .to_owned();
        Self::parse(text)
    }

    /// Get the raw XML text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parse the document and return a temporary `roxmltree::Document`.
    pub fn parse_doc(&self) -> Result<roxmltree::Document<'_>, Error> {
        roxmltree::Document::parse(&self.text).map_err(|e| Error::XmlParse(e.to_string()))
    }
}

/// Find the first descendant element with the given local tag name.
///
/// The schema descriptor names tags without namespace qualification, so
/// lookup matches on the local name only.
pub fn find_by_tag_name<'a>(
    doc: &'a roxmltree::Document<'a>,
    tag: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    doc.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
}

/// Child elements of `parent` with the given local tag name, in document
/// order.
pub fn child_elements_named<'a>(
    parent: roxmltree::Node<'a, 'a>,
    tag: &str,
) -> Vec<roxmltree::Node<'a, 'a>> {
    parent
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == tag)
        .collect()
}

/// Extract the leading XML declaration from raw document text, if any.
///
/// roxmltree does not keep the declaration in the tree, so it is carried
/// around the canonicalization round trip as text.
pub fn leading_declaration(text: &str) -> Option<&str> {
    let trimmed = text.trim_start();
    if trimmed.starts_with("<?xml") {
        let end = trimmed.find("?>")?;
        return Some(&trimmed[..end + 2]);
    }
    None
}
