#![forbid(unsafe_code)]

//! Selo CLI — enveloped XML digital signatures.

use clap::{Parser, Subcommand};
use selo_core::Error;
use selo_dsig::{DocumentSigner, SchemaTags, SignatureRequest, TargetStatus};
use selo_keys::{resolver, CertStore, Certificate, TokenPin, TokenProvider};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "selo",
    about = "Selo — enveloped XML digital signatures (XML-DSig, RSA-SHA1, C14N)",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign the schema-designated elements of an XML document in place
    Sign {
        /// XML document to sign (overwritten on success)
        file: PathBuf,

        /// Certificate serial number to look up in the personal store
        #[arg(long, conflicts_with = "p12")]
        serial: Option<String>,

        /// Personal certificate store directory
        #[arg(long, default_value = ".")]
        store_dir: PathBuf,

        /// PKCS#12 certificate bundle
        #[arg(long, requires = "password")]
        p12: Option<PathBuf>,

        /// Password for the PKCS#12 bundle
        #[arg(long)]
        password: Option<String>,

        /// Cache directory for PKCS#12 blobs (defaults to the system
        /// temp directory)
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Schema descriptor file (JSON with the tag names)
        #[arg(long, conflicts_with = "sig_tag")]
        schema: Option<PathBuf>,

        /// Element receiving the document-level signature
        #[arg(long)]
        sig_tag: Option<String>,

        /// Child element carrying the Id attribute
        #[arg(long)]
        id_tag: Option<String>,

        /// Element receiving the batch-level signature
        #[arg(long)]
        batch_sig_tag: Option<String>,

        /// Child element carrying the Id attribute for the batch pass
        #[arg(long)]
        batch_id_tag: Option<String>,

        /// PKCS#11 module for hardware-token signing
        #[arg(long)]
        module: Option<PathBuf>,

        /// Token label to select among present tokens
        #[arg(long)]
        token_label: Option<String>,

        /// Label of the signature key object on the token
        #[arg(long)]
        key_label: Option<String>,

        /// Token PIN (required for hardware-resident keys)
        #[arg(long)]
        pin: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the supported signature format
    Info,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sign {
            file,
            serial,
            store_dir,
            p12,
            password,
            cache_dir,
            schema,
            sig_tag,
            id_tag,
            batch_sig_tag,
            batch_id_tag,
            module,
            token_label,
            key_label,
            pin,
            verbose,
        } => cmd_sign(SignArgs {
            file,
            serial,
            store_dir,
            p12,
            password,
            cache_dir,
            schema,
            sig_tag,
            id_tag,
            batch_sig_tag,
            batch_id_tag,
            module,
            token_label,
            key_label,
            pin,
            verbose,
        }),
        Commands::Info => cmd_info(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

struct SignArgs {
    file: PathBuf,
    serial: Option<String>,
    store_dir: PathBuf,
    p12: Option<PathBuf>,
    password: Option<String>,
    cache_dir: Option<PathBuf>,
    schema: Option<PathBuf>,
    sig_tag: Option<String>,
    id_tag: Option<String>,
    batch_sig_tag: Option<String>,
    batch_id_tag: Option<String>,
    module: Option<PathBuf>,
    token_label: Option<String>,
    key_label: Option<String>,
    pin: Option<String>,
    verbose: bool,
}

fn cmd_sign(args: SignArgs) -> Result<(), Error> {
    let tags = load_schema(&args)?;
    let request = SignatureRequest::from_schema(&tags);

    let mut certificate = resolve_certificate(&args)?;

    // With a provider configured, classify the key residency once, at
    // resolution time.
    if let Some(module) = &args.module {
        let provider = TokenProvider {
            module_path: module.clone(),
            token_label: args.token_label.clone(),
            key_label: args.key_label.clone(),
        };
        let residency = selo_keys::token::classify(&provider);
        certificate = certificate.with_provider(provider, residency);
    }

    if args.verbose {
        eprintln!(
            "Signing {} with certificate {} ({:?})",
            args.file.display(),
            certificate.serial(),
            certificate.residency()
        );
    }

    let mut signer = DocumentSigner::new(&certificate);
    if let Some(pin) = &args.pin {
        signer = signer.with_pin(TokenPin::from_str(pin)?);
    }

    let report = signer.sign_document(&args.file, &request)?;

    for target in &report.targets {
        match &target.status {
            TargetStatus::Signed {
                reference_uris,
                whole_document,
            } => {
                println!(
                    "signed '{}' ({})",
                    target.signature_tag,
                    reference_uris
                        .iter()
                        .map(|u| if u.is_empty() { "<whole document>" } else { u.as_str() })
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                if *whole_document {
                    eprintln!(
                        "warning: '{}' had no Id attribute, the signature covers the whole document",
                        target.signature_tag
                    );
                }
            }
            TargetStatus::SkippedUnset => {
                if args.verbose {
                    eprintln!("skipped unset target");
                }
            }
            TargetStatus::SkippedAlreadySigned => {
                println!("'{}' is already signed, skipped", target.signature_tag);
            }
        }
    }

    Ok(())
}

fn load_schema(args: &SignArgs) -> Result<SchemaTags, Error> {
    if let Some(path) = &args.schema {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Other(format!("{}: {e}", path.display())))?;
        return serde_json::from_str(&text)
            .map_err(|e| Error::Other(format!("invalid schema descriptor: {e}")));
    }

    let sig_tag = args
        .sig_tag
        .clone()
        .ok_or_else(|| Error::Other("either --schema or --sig-tag is required".into()))?;
    Ok(SchemaTags {
        signature_tag: sig_tag,
        id_attribute_tag: args.id_tag.clone().unwrap_or_default(),
        batch_signature_tag: args.batch_sig_tag.clone().unwrap_or_default(),
        batch_id_attribute_tag: args.batch_id_tag.clone().unwrap_or_default(),
    })
}

fn resolve_certificate(args: &SignArgs) -> Result<Certificate, Error> {
    if let Some(p12_path) = &args.p12 {
        let blob = std::fs::read(p12_path)
            .map_err(|e| Error::Other(format!("{}: {e}", p12_path.display())))?;
        let password = args.password.as_deref().unwrap_or("");
        let cache_dir = args
            .cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("selo-certificates"));
        return resolver::resolve_from_bytes(&blob, password, &cache_dir);
    }

    let serial = args
        .serial
        .as_deref()
        .ok_or_else(|| Error::Other("either --serial or --p12 is required".into()))?;
    CertStore::open(&args.store_dir).resolve_by_serial(serial)
}

fn cmd_info() -> Result<(), Error> {
    println!("Selo — enveloped XML digital signatures");
    println!();
    println!("Signature format:");
    println!("  Digest:            SHA-1");
    println!("  Signature method:  RSA PKCS#1 v1.5 with SHA-1");
    println!("  Canonicalization:  Canonical XML 1.0");
    println!("  Transforms:        enveloped-signature, C14N 1.0");
    println!("  KeyInfo:           X509Data with the signing certificate");
    println!();
    println!("Certificate sources:");
    println!("  Personal store directory (PEM bundles, DER), lookup by serial");
    println!("  PKCS#12 blob with password (content-addressed cache)");
    println!();
    println!("Private keys:");
    println!("  Software-resident (PKCS#8 RSA)");
    println!("  Hardware-resident via PKCS#11 (PIN-gated session)");
    Ok(())
}
