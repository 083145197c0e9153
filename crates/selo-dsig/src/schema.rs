#![forbid(unsafe_code)]

//! Schema descriptor and signature targets.
//!
//! The schema descriptor is plain configuration naming which elements
//! receive signatures. An empty tag name disables that signing pass.

use serde::Deserialize;

/// Tag names supplied by the schema descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaTags {
    /// Element that receives the document-level signature.
    pub signature_tag: String,
    /// Child element carrying the Id attribute that scopes the
    /// document-level signature.
    pub id_attribute_tag: String,
    /// Element that receives the batch-level signature.
    pub batch_signature_tag: String,
    /// Child element carrying the Id attribute for the batch signature.
    pub batch_id_attribute_tag: String,
}

/// One element to sign: the signature site and the Id-bearing child.
#[derive(Debug, Clone)]
pub struct SignatureTarget {
    pub signature_tag: String,
    pub id_attribute_tag: String,
}

impl SignatureTarget {
    pub fn new(signature_tag: impl Into<String>, id_attribute_tag: impl Into<String>) -> Self {
        Self {
            signature_tag: signature_tag.into(),
            id_attribute_tag: id_attribute_tag.into(),
        }
    }

    /// A target with an empty signature tag disables its pass.
    pub fn is_set(&self) -> bool {
        !self.signature_tag.trim().is_empty()
    }
}

/// The ordered signing passes for one document: document-level target
/// first, batch-level second. Unset targets stay in the list and are
/// skipped during processing.
#[derive(Debug, Clone)]
pub struct SignatureRequest {
    pub targets: Vec<SignatureTarget>,
}

impl SignatureRequest {
    pub fn from_schema(tags: &SchemaTags) -> Self {
        Self {
            targets: vec![
                SignatureTarget::new(&tags.signature_tag, &tags.id_attribute_tag),
                SignatureTarget::new(&tags.batch_signature_tag, &tags.batch_id_attribute_tag),
            ],
        }
    }

    /// A request with a single target.
    pub fn single(target: SignatureTarget) -> Self {
        Self {
            targets: vec![target],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_schema_orders_document_before_batch() {
        let tags = SchemaTags {
            signature_tag: "Doc".into(),
            id_attribute_tag: "Items".into(),
            batch_signature_tag: "Batch".into(),
            batch_id_attribute_tag: "Lot".into(),
        };
        let request = SignatureRequest::from_schema(&tags);
        assert_eq!(request.targets.len(), 2);
        assert_eq!(request.targets[0].signature_tag, "Doc");
        assert_eq!(request.targets[1].signature_tag, "Batch");
    }

    #[test]
    fn test_unset_target_detection() {
        assert!(!SignatureTarget::new("", "x").is_set());
        assert!(!SignatureTarget::new("  ", "x").is_set());
        assert!(SignatureTarget::new("Doc", "Items").is_set());
    }

    #[test]
    fn test_schema_deserializes_with_missing_fields() {
        let tags: SchemaTags =
            serde_json::from_str(r#"{"signature_tag":"Doc","id_attribute_tag":"Items"}"#).unwrap();
        assert_eq!(tags.signature_tag, "Doc");
        assert!(tags.batch_signature_tag.is_empty());
    }
}
