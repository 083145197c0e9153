#![forbid(unsafe_code)]

//! The signature engine: validates targets, canonicalizes, signs and
//! embeds the signature into the document.

use crate::schema::SignatureTarget;
use crate::template;
use base64::Engine as _;
use selo_c14n::C14nMode;
use selo_core::{algorithm, Error, Result};
use selo_keys::{Certificate, SigningKeyHandle};
use selo_xml::document::{child_elements_named, find_by_tag_name, leading_declaration};
use selo_xml::{NodeSet, XmlDocument};
use std::path::Path;

/// Operator instruction attached to hardware signing failures.
const TOKEN_RECOVERY: &str = "the token must be reset: remove the token, wait for the LED to \
                              stop blinking, reinsert it and enter the PIN again";

/// What one signing pass produced.
#[derive(Debug, Clone)]
pub struct SignedOutcome {
    /// Reference URIs embedded, in document order ("#id" or "").
    pub reference_uris: Vec<String>,
    /// True when any reference fell back to the empty URI and therefore
    /// signed the whole document instead of a sub-element.
    pub whole_document: bool,
}

/// Builds the reference/transform/KeyInfo structure, computes the
/// signature and embeds it into the target element.
pub struct SignatureEngine;

impl SignatureEngine {
    /// Sign `target` in the document at `path`, overwriting the file.
    ///
    /// Validation runs before any cryptography; on failure the on-disk
    /// document is left byte-identical to its pre-call state.
    pub fn sign(
        &self,
        path: &Path,
        target: &SignatureTarget,
        key: &SigningKeyHandle,
        certificate: &Certificate,
    ) -> Result<SignedOutcome> {
        let text = std::fs::read_to_string(path)?;
        let (signed, outcome) = self.sign_text(&text, target, key, certificate)?;
        std::fs::write(path, signed)?;
        log::info!(
            "signed '{}' in {} ({} reference(s))",
            target.signature_tag,
            path.display(),
            outcome.reference_uris.len()
        );
        Ok(outcome)
    }

    /// Text-level signing pass. Returns the serialized signed document
    /// and the outcome.
    pub fn sign_text(
        &self,
        text: &str,
        target: &SignatureTarget,
        key: &SigningKeyHandle,
        certificate: &Certificate,
    ) -> Result<(String, SignedOutcome)> {
        let document = XmlDocument::parse(text.to_owned())?;
        let doc = document.parse_doc()?;

        // Structural validation first, before any cryptography runs.
        if find_by_tag_name(&doc, &target.signature_tag).is_none() {
            return Err(Error::MissingSignatureTag(
                target.signature_tag.trim().to_owned(),
            ));
        }
        if find_by_tag_name(&doc, &target.id_attribute_tag).is_none() {
            return Err(Error::MissingIdTag(target.id_attribute_tag.trim().to_owned()));
        }

        let declaration = leading_declaration(text).map(str::to_owned);

        // Normalize: canonical serialization with insignificant
        // whitespace discarded. Digests are computed over this form and
        // it is what gets persisted.
        let ws_set = NodeSet::all_without_whitespace_text(&doc);
        let normalized =
            selo_c14n::canonicalize_doc(&doc, C14nMode::InclusiveWithComments, Some(&ws_set))?;
        let mut current = String::from_utf8(normalized)
            .map_err(|e| Error::Canonicalization(format!("canonical form is not UTF-8: {e}")))?;

        let site_count = {
            let ndoc = roxmltree::Document::parse(&current)
                .map_err(|e| Error::XmlParse(e.to_string()))?;
            let sig_node = find_by_tag_name(&ndoc, &target.signature_tag)
                .ok_or_else(|| Error::MissingSignatureTag(target.signature_tag.clone()))?;
            child_elements_named(sig_node, &target.id_attribute_tag).len()
        };

        let mut reference_uris = Vec::new();
        let mut whole_document = false;

        // The document text changes after each embedded signature, so
        // every iteration re-parses. Appended signatures land after the
        // id-tag children and do not disturb their positions.
        for idx in 0..site_count {
            let ndoc = roxmltree::Document::parse(&current)
                .map_err(|e| Error::XmlParse(e.to_string()))?;
            let sig_node = find_by_tag_name(&ndoc, &target.signature_tag)
                .ok_or_else(|| Error::MissingSignatureTag(target.signature_tag.clone()))?;
            let children = child_elements_named(sig_node, &target.id_attribute_tag);
            let Some(&child) = children.get(idx) else {
                break;
            };

            let uri = match reference_uri(&child) {
                Some(uri) => uri,
                None => {
                    log::warn!(
                        "element '{}' has neither an Id nor an id attribute; the reference \
                         URI is empty and the signature covers the whole document",
                        target.id_attribute_tag
                    );
                    whole_document = true;
                    String::new()
                }
            };

            // Reference content: "" selects the whole document, "#id"
            // the subtree, both without comments. The enveloped
            // transform removes the signature being produced, which is
            // not yet in the document, so nothing is stripped here.
            let node_set = if uri.is_empty() {
                NodeSet::all_without_comments(&ndoc)
            } else {
                NodeSet::tree_without_comments(child)
            };
            let content = selo_c14n::canonicalize_doc(&ndoc, C14nMode::Inclusive, Some(&node_set))?;
            let digest_b64 = b64(&selo_crypto::digest::digest(algorithm::SHA1, &content)?);

            // Sign the canonical detached SignedInfo.
            let detached = template::signed_info_detached(&uri, &digest_b64);
            let signature_value = key
                .sign_sha1_rsa(detached.as_bytes())
                .map_err(operator_recovery)?;

            let signature_xml = template::signature_element(
                &template::signed_info(&uri, &digest_b64),
                &b64(&signature_value),
                &b64(certificate.der()),
            );

            // Append as the last child: splice just before the closing
            // tag of the signature-tag element.
            let insert_at = end_tag_position(&sig_node, &current)?;
            current.insert_str(insert_at, &signature_xml);

            reference_uris.push(uri);
        }

        let out = match declaration {
            Some(decl) => format!("{decl}{current}"),
            None => current,
        };
        Ok((
            out,
            SignedOutcome {
                reference_uris,
                whole_document,
            },
        ))
    }
}

/// Rewrite a hardware signing failure into the operator recovery
/// instruction; everything else propagates with original detail.
pub fn operator_recovery(e: Error) -> Error {
    match e {
        Error::HardwareTokenFault(msg) => {
            Error::HardwareTokenFault(format!("{TOKEN_RECOVERY} ({msg})"))
        }
        other => other,
    }
}

/// The reference URI for an id-tag child: "#" + Id attribute, falling
/// back to the lowercase id attribute. `None` when neither is present.
fn reference_uri(child: &roxmltree::Node<'_, '_>) -> Option<String> {
    use selo_core::ns::attr;
    child
        .attribute(attr::ID)
        .or_else(|| child.attribute(attr::ID_LOWER))
        .map(|id| format!("#{id}"))
}

/// Byte offset of the closing tag of `node` within `text`.
///
/// The text is in canonical form, so the element always ends with an
/// explicit `</qname>`.
fn end_tag_position(node: &roxmltree::Node<'_, '_>, text: &str) -> Result<usize> {
    let range = node.range();
    let slice = &text[range.clone()];
    let qname_len = slice[1..]
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(slice.len().saturating_sub(1));
    let close = format!("</{}>", &slice[1..1 + qname_len]);
    if !slice.ends_with(close.as_str()) {
        return Err(Error::XmlParse(format!(
            "cannot locate closing tag of element '{}'",
            &slice[1..1 + qname_len]
        )));
    }
    Ok(range.end - close.len())
}

fn b64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}
