#![forbid(unsafe_code)]

//! XML document wrapper and node-set support for the Selo XML signer.

pub mod document;
pub mod nodeset;

pub use document::XmlDocument;
pub use nodeset::NodeSet;
