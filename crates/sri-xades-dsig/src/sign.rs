#![forbid(unsafe_code)]

//! XAdES-BES enveloped signature creation.
//!
//! Signing runs in a fixed order over one [`XmlTree`]:
//! 1. build the detached skeleton ([`Skeleton::build`]),
//! 2. digest the document root while the signature is still detached,
//!    which is exactly the enveloped-signature transform,
//! 3. append the signature as the last child of the root,
//! 4. digest `SignedProperties` in its final namespace context,
//! 5. canonicalize `SignedInfo` and sign it.

use crate::options::SignOptions;
use crate::skeleton::Skeleton;
use log::{debug, warn};
use sri_xades_c14n::canonicalize;
use sri_xades_core::{ns, Error};
use sri_xades_crypto::{digest, sign};
use sri_xades_keys::SigningIdentity;
use sri_xades_xml::{writer, NodeId, XmlTree};

/// Build and attach a complete signature to `tree`.
///
/// Returns the handle of the appended `ds:Signature` element. On error the
/// tree may hold a detached, partially filled subtree, but its serialized
/// form is unchanged.
pub fn build_signature(
    tree: &mut XmlTree,
    identity: &SigningIdentity,
    options: &SignOptions,
) -> Result<NodeId, Error> {
    let root = tree.root();
    let root_id = ns::id::DOCUMENT_REFERENCE.trim_start_matches('#');
    if tree.element(root).and_then(|e| e.attribute("id")) != Some(root_id) {
        warn!("root element has no id=\"{root_id}\"; the document reference will not resolve");
    }

    let skeleton = Skeleton::build(tree, identity, options).map_err(Error::into_signing)?;
    let mode = options.canonicalization;
    let digest_uri = options.algorithm.digest_uri();

    let document = canonicalize(tree, root, mode).map_err(Error::into_signing)?;
    let document_digest =
        digest::digest_base64(digest_uri, &document).map_err(Error::into_signing)?;
    debug!(
        "document digest ({}, {} bytes): {document_digest}",
        options.algorithm,
        document.len()
    );
    tree.set_text(skeleton.document_digest, &document_digest);

    tree.append_child(root, skeleton.signature)
        .map_err(Error::into_signing)?;

    let properties =
        canonicalize(tree, skeleton.signed_properties, mode).map_err(Error::into_signing)?;
    let properties_digest =
        digest::digest_base64(digest_uri, &properties).map_err(Error::into_signing)?;
    debug!(
        "SignedProperties digest ({} bytes): {properties_digest}",
        properties.len()
    );
    tree.set_text(skeleton.properties_digest, &properties_digest);

    let signed_info =
        canonicalize(tree, skeleton.signed_info, mode).map_err(Error::into_signing)?;
    let signature_value = sign::sign_base64(
        options.algorithm.signature_uri(),
        identity.private_key(),
        &signed_info,
    )
    .map_err(Error::into_signing)?;
    debug!("SignedInfo signed ({} bytes)", signed_info.len());
    tree.set_text(skeleton.signature_value, &signature_value);

    Ok(skeleton.signature)
}

/// Sign an XML document and return the signed text.
///
/// The output starts with `<?xml version="1.0" encoding="UTF-8"?>` and a
/// newline and contains no self-closing tags. Input that is not well-formed
/// fails with [`Error::MalformedDocument`]; everything else that goes wrong
/// fails with [`Error::Signing`]. Nothing is returned on failure.
pub fn sign_document(
    xml: &str,
    identity: &SigningIdentity,
    options: &SignOptions,
) -> Result<String, Error> {
    let mut tree = XmlTree::parse(xml)?;
    build_signature(&mut tree, identity, options)?;
    let signed = writer::serialize_document(&tree);
    Ok(writer::expand_self_closing(&signed).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ProductionPlace, SignerRole};
    use chrono::DateTime;
    use sri_xades_c14n::C14nMode;
    use sri_xades_core::algorithm;
    use sri_xades_crypto::HashAlgorithm;

    const INVOICE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<factura id="comprobante" version="1.0.0"><infoTributaria><ambiente>1</ambiente><razonSocial>Empresa Prueba S.A.</razonSocial></infoTributaria><detalles><detalle><descripcion>Servicio</descripcion></detalle></detalles><infoAdicional/></factura>"#;

    fn load_identity() -> Option<SigningIdentity> {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/identity.p12");
        let Ok(data) = std::fs::read(path) else {
            eprintln!("Skipping: {path} not found");
            return None;
        };
        Some(SigningIdentity::from_pkcs12(&data, "secret123").expect("fixture identity loads"))
    }

    fn fixed_options() -> SignOptions {
        SignOptions::new().with_signing_time(
            DateTime::parse_from_rfc3339("2024-05-10T08:30:00-05:00").unwrap(),
        )
    }

    fn find<'a>(
        doc: &'a roxmltree::Document<'a>,
        ns_uri: &str,
        local: &str,
    ) -> roxmltree::Node<'a, 'a> {
        doc.descendants()
            .find(|n| n.has_tag_name((ns_uri, local)))
            .unwrap_or_else(|| panic!("{local} not found"))
    }

    #[test]
    fn test_signed_document_layout() {
        let Some(identity) = load_identity() else { return };
        let signed = sign_document(INVOICE, &identity, &fixed_options()).unwrap();

        assert!(signed.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<factura"));
        assert!(!writer::has_self_closing(&signed));
        assert!(signed.contains("<infoAdicional></infoAdicional>"));

        let doc = roxmltree::Document::parse(&signed).unwrap();
        let root = doc.root_element();
        let signature = root.last_element_child().unwrap();
        assert!(signature.has_tag_name((ns::DSIG, "Signature")));
        assert_eq!(signature.attribute("Id"), Some("Signature"));

        let children: Vec<_> = signature
            .children()
            .filter(|n| n.is_element())
            .map(|n| n.tag_name().name())
            .collect();
        assert_eq!(children, ["SignedInfo", "SignatureValue", "KeyInfo", "Object"]);

        let references: Vec<_> = find(&doc, ns::DSIG, "SignedInfo")
            .children()
            .filter(|n| n.has_tag_name((ns::DSIG, "Reference")))
            .collect();
        assert_eq!(references.len(), 2);
        assert_eq!(references[0].attribute("URI"), Some("#comprobante"));
        assert_eq!(references[1].attribute("URI"), Some("#SignedProperties"));
        assert_eq!(
            references[1].attribute("Type"),
            Some(algorithm::SIGNED_PROPERTIES_TYPE)
        );

        assert_eq!(
            find(&doc, ns::XADES, "SigningTime").text(),
            Some("2024-05-10T08:30:00-05:00")
        );
        assert_eq!(find(&doc, ns::DSIG, "X509SerialNumber").text(), Some("4660"));
        assert_eq!(
            find(&doc, ns::XADES, "QualifyingProperties").attribute("Target"),
            Some("#Signature")
        );
        assert!(doc
            .descendants()
            .all(|n| !n.has_tag_name((ns::XADES, "SignatureProductionPlace"))));
    }

    #[test]
    fn test_signing_is_deterministic_with_fixed_time() {
        let Some(identity) = load_identity() else { return };
        let first = sign_document(INVOICE, &identity, &fixed_options()).unwrap();
        let second = sign_document(INVOICE, &identity, &fixed_options()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_document_digest_excludes_signature() {
        let Some(identity) = load_identity() else { return };
        let signed = sign_document(INVOICE, &identity, &fixed_options()).unwrap();

        let unsigned = XmlTree::parse(INVOICE).unwrap();
        let bytes = canonicalize(&unsigned, unsigned.root(), C14nMode::Inclusive).unwrap();
        let expected = digest::digest_base64(algorithm::SHA1, &bytes).unwrap();

        let doc = roxmltree::Document::parse(&signed).unwrap();
        let reference = find(&doc, ns::DSIG, "Reference");
        let value = reference
            .children()
            .find(|n| n.has_tag_name((ns::DSIG, "DigestValue")))
            .and_then(|n| n.text());
        assert_eq!(value, Some(expected.as_str()));
    }

    #[test]
    fn test_properties_digest_and_signature_verify() {
        let Some(identity) = load_identity() else { return };
        let options = fixed_options();
        let mut tree = XmlTree::parse(INVOICE).unwrap();
        let signature = build_signature(&mut tree, &identity, &options).unwrap();

        let signed_properties = tree.find_element(signature, "SignedProperties").unwrap();
        let bytes = canonicalize(&tree, signed_properties, C14nMode::Inclusive).unwrap();
        let expected = digest::digest_base64(algorithm::SHA1, &bytes).unwrap();
        let signed_info = tree.find_element(signature, "SignedInfo").unwrap();
        let digests: Vec<String> = tree
            .descendants(signed_info)
            .into_iter()
            .filter(|&id| tree.element(id).is_some_and(|e| e.local_name() == "DigestValue"))
            .map(|id| tree.text(id))
            .collect();
        assert_eq!(digests[1], expected);

        let info_bytes = canonicalize(&tree, signed_info, C14nMode::Inclusive).unwrap();
        let value = tree.find_element(signature, "SignatureValue").unwrap();
        let raw = sri_xades_crypto::decode_base64(&tree.text(value)).unwrap();
        let verifier = sign::from_uri(algorithm::RSA_SHA1).unwrap();
        assert!(verifier
            .verify(identity.certificate().public_key(), &info_bytes, &raw)
            .unwrap());
    }

    #[test]
    fn test_certificate_fidelity() {
        let Some(identity) = load_identity() else { return };
        let signed = sign_document(INVOICE, &identity, &fixed_options()).unwrap();
        let doc = roxmltree::Document::parse(&signed).unwrap();

        let cert_text = find(&doc, ns::DSIG, "X509Certificate").text().unwrap();
        let cert_der = sri_xades_crypto::decode_base64(cert_text).unwrap();
        assert_eq!(cert_der, identity.certificate().der());

        let cert_digest = find(&doc, ns::XADES, "CertDigest");
        let value = cert_digest
            .children()
            .find(|n| n.has_tag_name((ns::DSIG, "DigestValue")))
            .and_then(|n| n.text());
        assert_eq!(value, Some("ZAz8QhEjy4GC1u2WasJEYHlEGLI="));

        let exponent = find(&doc, ns::DSIG, "Exponent").text();
        assert_eq!(exponent, Some("AQAB"));
        let issuer = find(&doc, ns::DSIG, "X509IssuerName").text().unwrap();
        assert_eq!(issuer, identity.certificate().issuer());
    }

    #[test]
    fn test_optional_properties_in_order() {
        let Some(identity) = load_identity() else { return };
        let options = fixed_options()
            .with_production_place(ProductionPlace::default())
            .with_signer_role(SignerRole::new(["Emisor"]));
        let signed = sign_document(INVOICE, &identity, &options).unwrap();
        let doc = roxmltree::Document::parse(&signed).unwrap();

        let props: Vec<_> = find(&doc, ns::XADES, "SignedSignatureProperties")
            .children()
            .filter(|n| n.is_element())
            .map(|n| n.tag_name().name())
            .collect();
        assert_eq!(
            props,
            ["SigningTime", "SigningCertificate", "SignatureProductionPlace", "SignerRole"]
        );
        assert_eq!(find(&doc, ns::XADES, "City").text(), Some("Quito"));
        assert_eq!(find(&doc, ns::XADES, "PostalCode").text(), Some("170150"));
        assert_eq!(find(&doc, ns::XADES, "ClaimedRole").text(), Some("Emisor"));
    }

    #[test]
    fn test_empty_role_list_is_omitted() {
        let Some(identity) = load_identity() else { return };
        let options = fixed_options().with_signer_role(SignerRole::default());
        let signed = sign_document(INVOICE, &identity, &options).unwrap();
        assert!(!signed.contains("SignerRole"));
    }

    #[test]
    fn test_sha256_everywhere() {
        let Some(identity) = load_identity() else { return };
        let options = fixed_options().with_algorithm(HashAlgorithm::Sha256);
        let signed = sign_document(INVOICE, &identity, &options).unwrap();
        let doc = roxmltree::Document::parse(&signed).unwrap();

        assert_eq!(
            find(&doc, ns::DSIG, "SignatureMethod").attribute("Algorithm"),
            Some(algorithm::RSA_SHA256)
        );
        let methods: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name((ns::DSIG, "DigestMethod")))
            .map(|n| n.attribute("Algorithm"))
            .collect();
        assert_eq!(methods.len(), 3);
        assert!(methods.iter().all(|m| *m == Some(algorithm::SHA256)));
        assert!(!signed.contains(algorithm::SHA1));
    }

    #[test]
    fn test_direct_mode_signs() {
        let Some(identity) = load_identity() else { return };
        let options = fixed_options().with_canonicalization(C14nMode::Direct);
        let direct = sign_document(INVOICE, &identity, &options).unwrap();
        let inclusive = sign_document(INVOICE, &identity, &fixed_options()).unwrap();
        // The document digest matches; the fragment digests differ because
        // direct serialization leaves inherited namespaces out.
        assert_ne!(direct, inclusive);
        assert!(direct.contains(&format!("Algorithm=\"{}\"", algorithm::C14N)));
    }

    #[test]
    fn test_malformed_input() {
        let Some(identity) = load_identity() else { return };
        for bad in ["", "<factura>", "plain text", "<a></b>"] {
            let err = sign_document(bad, &identity, &fixed_options()).unwrap_err();
            assert!(matches!(err, Error::MalformedDocument(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_existing_content_preserved() {
        let Some(identity) = load_identity() else { return };
        let xml = r#"<factura id="comprobante" xmlns:x="urn:x"><x:campo a="1 &amp; 2">&lt;v&gt;</x:campo></factura>"#;
        let signed = sign_document(xml, &identity, &fixed_options()).unwrap();
        assert!(signed.contains(r#"<x:campo a="1 &amp; 2">&lt;v&gt;</x:campo>"#));
        assert!(signed.ends_with("</ds:Signature></factura>"));
    }

    #[test]
    fn test_comments_are_emitted_verbatim() {
        let Some(identity) = load_identity() else { return };
        let xml = r#"<factura id="comprobante"><!-- ver <br/> aqui --><a>1</a></factura>"#;
        for mode in [C14nMode::Inclusive, C14nMode::Direct] {
            let options = fixed_options().with_canonicalization(mode);
            let signed = sign_document(xml, &identity, &options).unwrap();
            assert!(signed.contains("<!-- ver <br/> aqui -->"), "{mode}");
            assert!(!writer::has_self_closing(&signed));
        }
    }
}
