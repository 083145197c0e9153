#![forbid(unsafe_code)]

pub use selo_core as core;
pub use selo_xml as xml;
pub use selo_c14n as c14n;
pub use selo_crypto as crypto;
pub use selo_pkcs12 as pkcs12;
pub use selo_keys as keys;
pub use selo_dsig as dsig;
