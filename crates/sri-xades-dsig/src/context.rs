#![forbid(unsafe_code)]

//! Signing context: the loaded identity shared by sign operations.

use crate::options::SignOptions;
use crate::sign::sign_document;
use sri_xades_core::Error;
use sri_xades_keys::{BagSelection, SigningIdentity};
use std::path::Path;
use std::sync::Arc;

/// Holds the signer's identity between sign operations.
///
/// Cloning is cheap and clones share the same identity, so one context can
/// serve concurrent sign operations.
#[derive(Debug, Clone, Default)]
pub struct SigningContext {
    identity: Option<Arc<SigningIdentity>>,
}

impl SigningContext {
    /// Create a context with no identity loaded.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: SigningIdentity) -> Self {
        Self {
            identity: Some(Arc::new(identity)),
        }
    }

    pub fn identity(&self) -> Option<&SigningIdentity> {
        self.identity.as_deref()
    }

    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    /// Load an identity from PKCS#12 bytes.
    ///
    /// The current identity is replaced only when loading succeeds.
    pub fn load_identity(
        &mut self,
        data: &[u8],
        password: &str,
        selection: BagSelection,
    ) -> Result<(), Error> {
        let identity = SigningIdentity::from_pkcs12_with(data, password, selection)?;
        self.identity = Some(Arc::new(identity));
        Ok(())
    }

    /// Load an identity from a PKCS#12 file.
    pub fn load_identity_file(
        &mut self,
        path: &Path,
        password: &str,
        selection: BagSelection,
    ) -> Result<(), Error> {
        let identity = SigningIdentity::from_pkcs12_file(path, password, selection)?;
        self.identity = Some(Arc::new(identity));
        Ok(())
    }

    /// Sign an XML document with the loaded identity.
    pub fn sign(&self, xml: &str, options: &SignOptions) -> Result<String, Error> {
        let identity = self
            .identity
            .as_deref()
            .ok_or_else(|| Error::Signing("no signing identity loaded".into()))?;
        sign_document(xml, identity, options)
    }

    /// Sign `input` and write the result to `output`.
    ///
    /// `output` is only created once signing has succeeded.
    pub fn sign_file(
        &self,
        input: &Path,
        output: &Path,
        options: &SignOptions,
    ) -> Result<(), Error> {
        let xml = std::fs::read_to_string(input)?;
        let signed = self.sign(&xml, options)?;
        std::fs::write(output, signed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Option<Vec<u8>> {
        let path = format!("{}/../../test-data/keys/{name}", env!("CARGO_MANIFEST_DIR"));
        match std::fs::read(&path) {
            Ok(data) => Some(data),
            Err(_) => {
                eprintln!("Skipping: {path} not found");
                None
            }
        }
    }

    #[test]
    fn test_sign_without_identity() {
        let ctx = SigningContext::new();
        assert!(!ctx.has_identity());
        let err = ctx
            .sign(r#"<factura id="comprobante"></factura>"#, &SignOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
        assert!(err.to_string().contains("no signing identity"));
    }

    #[test]
    fn test_failed_load_keeps_previous_identity() {
        let Some(data) = fixture("identity.p12") else { return };
        let mut ctx = SigningContext::new();
        ctx.load_identity(&data, "secret123", BagSelection::default())
            .unwrap();
        let err = ctx
            .load_identity(&data, "wrong", BagSelection::default())
            .unwrap_err();
        assert!(matches!(err, Error::IdentityLoad(_)));
        assert_eq!(ctx.identity().unwrap().certificate().serial_number(), "4660");
    }

    #[test]
    fn test_clones_share_identity_across_threads() {
        let Some(data) = fixture("identity.p12") else { return };
        let identity = SigningIdentity::from_pkcs12(&data, "secret123").unwrap();
        let ctx = SigningContext::with_identity(identity);
        let options = SignOptions::default().with_signing_time(
            chrono::DateTime::parse_from_rfc3339("2024-01-02T03:04:05-05:00").unwrap(),
        );

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ctx = ctx.clone();
                let options = options.clone();
                std::thread::spawn(move || {
                    ctx.sign(r#"<factura id="comprobante"><a>1</a></factura>"#, &options)
                })
            })
            .collect();
        let outputs: Vec<String> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn test_sign_file_writes_nothing_on_failure() {
        let Some(data) = fixture("identity.p12") else { return };
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.xml");
        let output = dir.path().join("bad-signed.xml");
        std::fs::write(&input, "<factura>").unwrap();

        let mut ctx = SigningContext::new();
        ctx.load_identity(&data, "secret123", BagSelection::default())
            .unwrap();
        let err = ctx
            .sign_file(&input, &output, &SignOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedDocument(_)));
        assert!(!output.exists());
    }
}
