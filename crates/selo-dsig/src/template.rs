#![forbid(unsafe_code)]

//! Signature-element construction.
//!
//! Fragments are emitted directly in canonical form (explicit end tags,
//! single sorted attribute per element, C14N escaping), so the bytes
//! signed over the detached SignedInfo are exactly what a verifier
//! recomputes when canonicalizing SignedInfo inside the document.

use selo_c14n::escape;
use selo_core::{algorithm, ns};

/// The `<SignedInfo>` element without a namespace declaration, for
/// embedding inside `<Signature>` where the dsig default namespace is
/// inherited.
pub fn signed_info(reference_uri: &str, digest_b64: &str) -> String {
    format!(
        concat!(
            "<{si}>",
            "<{cm} Algorithm=\"{c14n}\"></{cm}>",
            "<{sm} Algorithm=\"{rsa_sha1}\"></{sm}>",
            "<{r} URI=\"{uri}\">",
            "<{ts}>",
            "<{t} Algorithm=\"{enveloped}\"></{t}>",
            "<{t} Algorithm=\"{c14n}\"></{t}>",
            "</{ts}>",
            "<{dm} Algorithm=\"{sha1}\"></{dm}>",
            "<{dv}>{digest}</{dv}>",
            "</{r}>",
            "</{si}>"
        ),
        si = ns::node::SIGNED_INFO,
        cm = ns::node::CANONICALIZATION_METHOD,
        sm = ns::node::SIGNATURE_METHOD,
        r = ns::node::REFERENCE,
        ts = ns::node::TRANSFORMS,
        t = ns::node::TRANSFORM,
        dm = ns::node::DIGEST_METHOD,
        dv = ns::node::DIGEST_VALUE,
        c14n = algorithm::C14N,
        rsa_sha1 = algorithm::RSA_SHA1,
        sha1 = algorithm::SHA1,
        enveloped = algorithm::ENVELOPED_SIGNATURE,
        uri = escape::escape_attr(reference_uri),
        digest = digest_b64,
    )
}

/// The detached SignedInfo carrying the dsig namespace declaration —
/// the exact content that gets canonicalized and signed.
pub fn signed_info_detached(reference_uri: &str, digest_b64: &str) -> String {
    let inner = signed_info(reference_uri, digest_b64);
    let open = format!("<{}>", ns::node::SIGNED_INFO);
    let open_with_ns = format!("<{} xmlns=\"{}\">", ns::node::SIGNED_INFO, ns::DSIG);
    inner.replacen(&open, &open_with_ns, 1)
}

/// The complete `<Signature>` element in canonical form.
pub fn signature_element(signed_info: &str, signature_b64: &str, certificate_b64: &str) -> String {
    format!(
        concat!(
            "<{sig} xmlns=\"{dsig}\">",
            "{si}",
            "<{sv}>{sig_val}</{sv}>",
            "<{ki}><{xd}><{xc}>{cert}</{xc}></{xd}></{ki}>",
            "</{sig}>"
        ),
        sig = ns::node::SIGNATURE,
        dsig = ns::DSIG,
        si = signed_info,
        sv = ns::node::SIGNATURE_VALUE,
        sig_val = signature_b64,
        ki = ns::node::KEY_INFO,
        xd = ns::node::X509_DATA,
        xc = ns::node::X509_CERTIFICATE,
        cert = certificate_b64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_info_structure() {
        let si = signed_info("#X1", "ZGlnZXN0");
        assert!(si.starts_with("<SignedInfo><CanonicalizationMethod"));
        assert!(si.contains("URI=\"#X1\""));
        assert!(si.contains("<DigestValue>ZGlnZXN0</DigestValue>"));
        // Transform order is fixed: enveloped before C14N.
        let enveloped_pos = si.find("enveloped-signature").unwrap();
        let c14n_pos = si.rfind("REC-xml-c14n").unwrap();
        assert!(enveloped_pos < c14n_pos);
    }

    #[test]
    fn test_detached_signed_info_carries_namespace() {
        let detached = signed_info_detached("", "ZA==");
        assert!(detached.starts_with(
            "<SignedInfo xmlns=\"http://www.w3.org/2000/09/xmldsig#\">"
        ));
        assert!(detached.contains("URI=\"\""));
    }

    #[test]
    fn test_detached_form_is_already_canonical() {
        // The emitted fragment must survive C14N unchanged, otherwise
        // the signed bytes would differ from what verifiers recompute.
        let detached = signed_info_detached("#X1", "ZGlnZXN0");
        let canonical =
            selo_c14n::canonicalize(&detached, selo_c14n::C14nMode::Inclusive, None).unwrap();
        assert_eq!(String::from_utf8(canonical).unwrap(), detached);
    }

    #[test]
    fn test_signature_element_shape() {
        let si = signed_info("#X1", "ZA==");
        let sig = signature_element(&si, "c2ln", "Y2VydA==");
        assert!(sig.starts_with("<Signature xmlns=\"http://www.w3.org/2000/09/xmldsig#\">"));
        assert!(sig.contains("<SignatureValue>c2ln</SignatureValue>"));
        assert!(sig.contains("<X509Certificate>Y2VydA==</X509Certificate>"));
        assert!(sig.ends_with("</Signature>"));
    }
}
