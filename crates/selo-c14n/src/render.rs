#![forbid(unsafe_code)]

//! Rendering of namespace declarations and attributes in canonical
//! order, writing straight into the output buffer.

use crate::escape;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for the default namespace).
    pub prefix: String,
    /// The namespace URI.
    pub uri: String,
}

impl NsDecl {
    /// Write ` xmlns="uri"` or ` xmlns:prefix="uri"`.
    pub fn render_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b" xmlns");
        if !self.prefix.is_empty() {
            out.push(b':');
            out.extend_from_slice(self.prefix.as_bytes());
        }
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(escape::escape_attr(&self.uri).as_bytes());
        out.push(b'"');
    }
}

impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // The default namespace (empty prefix) sorts first, then by
        // prefix.
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// The namespace URI of the attribute ("" for no namespace).
    pub ns_uri: String,
    /// The local name.
    pub local_name: String,
    /// The qualified name (prefix:local or just local).
    pub qualified_name: String,
    /// The attribute value.
    pub value: String,
}

impl Attr {
    /// Write ` qname="value"`.
    pub fn render_into(&self, out: &mut Vec<u8>) {
        out.push(b' ');
        out.extend_from_slice(self.qualified_name.as_bytes());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(escape::escape_attr(&self.value).as_bytes());
        out.push(b'"');
    }
}

impl Ord for Attr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Attributes with no namespace sort before namespaced ones;
        // within each group, (ns_uri, local_name) order.
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then(self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered_ns(prefix: &str, uri: &str) -> String {
        let decl = NsDecl {
            prefix: prefix.into(),
            uri: uri.into(),
        };
        let mut out = Vec::new();
        decl.render_into(&mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_ns_decl_rendering() {
        assert_eq!(rendered_ns("", "http://d"), " xmlns=\"http://d\"");
        assert_eq!(rendered_ns("x", "http://x"), " xmlns:x=\"http://x\"");
    }

    #[test]
    fn test_default_namespace_sorts_first() {
        let mut decls = vec![
            NsDecl {
                prefix: "a".into(),
                uri: "http://a".into(),
            },
            NsDecl {
                prefix: String::new(),
                uri: "http://d".into(),
            },
        ];
        decls.sort();
        assert!(decls[0].prefix.is_empty());
    }

    #[test]
    fn test_attr_value_is_escaped() {
        let attr = Attr {
            ns_uri: String::new(),
            local_name: "v".into(),
            qualified_name: "v".into(),
            value: "a\"b".into(),
        };
        let mut out = Vec::new();
        attr.render_into(&mut out);
        assert_eq!(String::from_utf8(out).unwrap(), " v=\"a&quot;b\"");
    }

    #[test]
    fn test_unnamespaced_attrs_sort_before_namespaced() {
        let plain = Attr {
            ns_uri: String::new(),
            local_name: "z".into(),
            qualified_name: "z".into(),
            value: String::new(),
        };
        let spaced = Attr {
            ns_uri: "http://x".into(),
            local_name: "a".into(),
            qualified_name: "x:a".into(),
            value: String::new(),
        };
        assert!(plain < spaced);
    }
}
