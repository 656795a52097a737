#![forbid(unsafe_code)]

//! sri-xades CLI: sign and check SRI electronic invoices (XAdES-BES).

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sri_xades::{
    BagSelection, C14nMode, Error, HashAlgorithm, ProductionPlace, SignOptions, SignerRole,
    SigningContext, SigningIdentity,
};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(
    name = "sri-xades",
    about = "XAdES-BES signing and structural validation for SRI Ecuador invoices",
    version
)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct IdentityArgs {
    /// PKCS#12 (.p12/.pfx) file holding the signing certificate and key
    #[arg(long, env = "CERT_PATH", default_value = "resources/mr.p12")]
    cert: PathBuf,

    /// Password of the PKCS#12 file
    #[arg(long, env = "CERT_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Require exactly one key and one certificate in the container
    #[arg(long)]
    strict: bool,
}

impl IdentityArgs {
    fn selection(&self) -> BagSelection {
        if self.strict {
            BagSelection::Strict
        } else {
            BagSelection::MatchingKey
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sign an XML document
    Sign {
        /// Input XML file
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        identity: IdentityArgs,

        /// Hash algorithm (sha1 or sha256)
        #[arg(long, default_value = "sha1")]
        algorithm: HashAlgorithm,

        /// Canonicalization mode (inclusive or direct)
        #[arg(long, default_value = "inclusive")]
        c14n: C14nMode,

        /// Include SignatureProductionPlace
        #[arg(long = "production-place")]
        production_place: bool,

        #[arg(long, env = "PRODUCTION_CITY", default_value = "Quito")]
        city: String,

        #[arg(long, env = "PRODUCTION_STATE", default_value = "Pichincha")]
        state: String,

        #[arg(long = "postal-code", env = "PRODUCTION_CODE", default_value = "170150")]
        postal_code: String,

        #[arg(long, env = "PRODUCTION_COUNTRY", default_value = "EC")]
        country: String,

        /// Claimed signer role (repeatable), e.g. Emisor
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Fixed signing time (RFC 3339), default: now at -05:00
        #[arg(long = "signing-time")]
        signing_time: Option<String>,
    },

    /// Check the structure of a signed XML document
    Validate {
        /// Signed XML file
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the signing certificate of a PKCS#12 file
    Cert {
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Show supported algorithms and features
    Info,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match cli.command {
        Commands::Sign {
            file,
            output,
            identity,
            algorithm,
            c14n,
            production_place,
            city,
            state,
            postal_code,
            country,
            roles,
            signing_time,
        } => {
            let place = production_place
                .then(|| ProductionPlace::new(city, state, postal_code, country));
            cmd_sign(
                file,
                output,
                identity,
                algorithm,
                c14n,
                place,
                roles,
                signing_time,
                cli.verbose,
            )
        }

        Commands::Validate { file, json } => cmd_validate(file, json),

        Commands::Cert { identity } => cmd_cert(identity),

        Commands::Info => cmd_info(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_sign(
    file: PathBuf,
    output: Option<PathBuf>,
    identity: IdentityArgs,
    algorithm: HashAlgorithm,
    c14n: C14nMode,
    production_place: Option<ProductionPlace>,
    roles: Vec<String>,
    signing_time: Option<String>,
    verbose: bool,
) -> Result<(), Error> {
    let mut options = SignOptions::new()
        .with_algorithm(algorithm)
        .with_canonicalization(c14n);
    if let Some(place) = production_place {
        options = options.with_production_place(place);
    }
    if !roles.is_empty() {
        options = options.with_signer_role(SignerRole::new(roles));
    }
    if let Some(text) = signing_time {
        let time = DateTime::parse_from_rfc3339(&text)
            .map_err(|e| Error::Signing(format!("invalid signing time {text:?}: {e}")))?;
        options = options.with_signing_time(time);
    }

    let mut ctx = SigningContext::new();
    ctx.load_identity_file(&identity.cert, &identity.password, identity.selection())?;

    if verbose {
        eprintln!("Signing: {} ({algorithm}, {c14n})", file.display());
    }

    match output {
        Some(path) => ctx.sign_file(&file, &path, &options),
        None => {
            let xml = read_file(&file)?;
            let signed = ctx.sign(&xml, &options)?;
            write_stdout(signed.as_bytes())
        }
    }
}

fn cmd_validate(file: PathBuf, json: bool) -> Result<(), Error> {
    let report = sri_xades::validate_file(&file)?;
    if json {
        let text = report
            .to_json()
            .map_err(|e| Error::XmlStructure(format!("cannot render report: {e}")))?;
        println!("{text}");
    } else {
        println!("{report}");
    }
    if !report.is_valid() {
        process::exit(1);
    }
    Ok(())
}

fn cmd_cert(identity: IdentityArgs) -> Result<(), Error> {
    let loaded =
        SigningIdentity::from_pkcs12_file(&identity.cert, &identity.password, identity.selection())?;
    let cert = loaded.certificate();
    let now = Utc::now();

    println!("Subject:       {}", cert.subject());
    println!("Issuer:        {}", cert.issuer());
    println!("Serial number: {}", cert.serial_number());
    println!("Not before:    {}", cert.not_before());
    println!("Not after:     {}", cert.not_after());
    println!(
        "Status:        {}",
        if cert.is_valid_at(now) { "within validity window" } else { "outside validity window" }
    );
    println!("Key size:      {} bits", cert.modulus().len() * 8);
    for hash in [HashAlgorithm::Sha1, HashAlgorithm::Sha256] {
        let digest = cert.digest(hash)?;
        println!("{:<15}{}", format!("{hash}:"), sri_xades::crypto::encode_base64(&digest));
    }
    println!("Chain:         {} additional certificate(s)", loaded.chain().len());
    Ok(())
}

fn cmd_info() -> Result<(), Error> {
    println!("sri-xades: XAdES-BES for SRI Ecuador electronic invoices");
    println!();
    println!("Supported digest algorithms:");
    println!("  SHA-1 (default), SHA-256");
    println!();
    println!("Supported signature algorithms:");
    println!("  RSA PKCS#1 v1.5 (SHA-1, SHA-256)");
    println!();
    println!("Supported canonicalization:");
    println!("  C14N 1.0 (inclusive, default), direct serialization");
    println!();
    println!("Supported identity formats:");
    println!("  PKCS#12 with PBE-SHA1-3DES or PBES2 (PBKDF2 + AES-256-CBC)");
    println!();
    println!("Validation is structural only: digests and signature values are not verified.");
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display())))
    })
}

fn write_stdout(data: &[u8]) -> Result<(), Error> {
    use std::io::Write;
    std::io::stdout().write_all(data)?;
    Ok(())
}
