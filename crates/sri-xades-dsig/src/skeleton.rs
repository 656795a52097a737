#![forbid(unsafe_code)]

//! Phase one: the signature subtree with every fixed value in place.
//!
//! The three values that depend on serialized content (the document digest,
//! the `SignedProperties` digest and the signature value) are left as empty
//! elements whose handles are recorded in [`Skeleton`] for the fill phase.

use crate::options::{format_signing_time, SignOptions};
use sri_xades_core::{algorithm, ns, Error};
use sri_xades_crypto::encode_base64;
use sri_xades_keys::SigningIdentity;
use sri_xades_xml::{NodeId, XmlTree};

/// Handles to the nodes the fill phase writes to or canonicalizes.
#[derive(Debug, Clone, Copy)]
pub struct Skeleton {
    /// `ds:Signature`, detached until the document digest is taken.
    pub signature: NodeId,
    pub signed_info: NodeId,
    /// `DigestValue` of the reference to the document root.
    pub document_digest: NodeId,
    /// `DigestValue` of the reference to `SignedProperties`.
    pub properties_digest: NodeId,
    pub signature_value: NodeId,
    pub signed_properties: NodeId,
}

fn ds(local: &str) -> String {
    format!("{}:{local}", ns::DSIG_PREFIX)
}

fn etsi(local: &str) -> String {
    format!("{}:{local}", ns::XADES_PREFIX)
}

fn append_ds(tree: &mut XmlTree, parent: NodeId, local: &str) -> NodeId {
    tree.append_element(parent, &ds(local))
}

fn append_etsi(tree: &mut XmlTree, parent: NodeId, local: &str) -> NodeId {
    tree.append_element(parent, &etsi(local))
}

fn append_text_element(tree: &mut XmlTree, parent: NodeId, name: &str, text: &str) -> NodeId {
    let id = tree.append_element(parent, name);
    tree.append_text(id, text);
    id
}

fn append_method(tree: &mut XmlTree, parent: NodeId, local: &str, uri: &str) -> NodeId {
    let id = append_ds(tree, parent, local);
    tree.set_attribute(id, ns::attr::ALGORITHM, uri);
    id
}

impl Skeleton {
    /// Allocate the detached signature subtree in `tree`.
    pub fn build(
        tree: &mut XmlTree,
        identity: &SigningIdentity,
        options: &SignOptions,
    ) -> Result<Self, Error> {
        let hash = options.algorithm;
        let certificate = identity.certificate();

        let signature = tree.create_element(&ds(ns::node::SIGNATURE));
        tree.declare_namespace(signature, ns::DSIG_PREFIX, ns::DSIG);
        tree.declare_namespace(signature, ns::XADES_PREFIX, ns::XADES);
        tree.set_attribute(signature, ns::attr::ID, ns::id::SIGNATURE);

        // SignedInfo
        let signed_info = append_ds(tree, signature, ns::node::SIGNED_INFO);
        append_method(
            tree,
            signed_info,
            ns::node::CANONICALIZATION_METHOD,
            options.canonicalization.uri(),
        );
        append_method(tree, signed_info, ns::node::SIGNATURE_METHOD, hash.signature_uri());

        let document_ref = append_ds(tree, signed_info, ns::node::REFERENCE);
        tree.set_attribute(document_ref, ns::attr::URI, ns::id::DOCUMENT_REFERENCE);
        let transforms = append_ds(tree, document_ref, ns::node::TRANSFORMS);
        append_method(tree, transforms, ns::node::TRANSFORM, algorithm::ENVELOPED_SIGNATURE);
        append_method(tree, document_ref, ns::node::DIGEST_METHOD, hash.digest_uri());
        let document_digest = append_ds(tree, document_ref, ns::node::DIGEST_VALUE);

        let properties_ref = append_ds(tree, signed_info, ns::node::REFERENCE);
        tree.set_attribute(properties_ref, ns::attr::TYPE, algorithm::SIGNED_PROPERTIES_TYPE);
        tree.set_attribute(
            properties_ref,
            ns::attr::URI,
            &format!("#{}", ns::id::SIGNED_PROPERTIES),
        );
        append_method(tree, properties_ref, ns::node::DIGEST_METHOD, hash.digest_uri());
        let properties_digest = append_ds(tree, properties_ref, ns::node::DIGEST_VALUE);

        // SignatureValue
        let signature_value = append_ds(tree, signature, ns::node::SIGNATURE_VALUE);
        tree.set_attribute(signature_value, ns::attr::ID, ns::id::SIGNATURE_VALUE);

        // KeyInfo
        let key_info = append_ds(tree, signature, ns::node::KEY_INFO);
        tree.set_attribute(key_info, ns::attr::ID, ns::id::KEY_INFO);
        let x509_data = append_ds(tree, key_info, ns::node::X509_DATA);
        append_text_element(
            tree,
            x509_data,
            &ds(ns::node::X509_CERTIFICATE),
            &encode_base64(certificate.der()),
        );
        let key_value = append_ds(tree, key_info, ns::node::KEY_VALUE);
        let rsa_key_value = append_ds(tree, key_value, ns::node::RSA_KEY_VALUE);
        append_text_element(
            tree,
            rsa_key_value,
            &ds(ns::node::RSA_MODULUS),
            &encode_base64(&certificate.modulus()),
        );
        append_text_element(
            tree,
            rsa_key_value,
            &ds(ns::node::RSA_EXPONENT),
            &encode_base64(&certificate.exponent()),
        );

        // Object / QualifyingProperties
        let object = append_ds(tree, signature, ns::node::OBJECT);
        tree.set_attribute(object, ns::attr::ID, ns::id::OBJECT);
        let qualifying = append_etsi(tree, object, ns::node::QUALIFYING_PROPERTIES);
        tree.set_attribute(
            qualifying,
            ns::attr::TARGET,
            &format!("#{}", ns::id::SIGNATURE),
        );
        let signed_properties = append_etsi(tree, qualifying, ns::node::SIGNED_PROPERTIES);
        tree.set_attribute(signed_properties, ns::attr::ID, ns::id::SIGNED_PROPERTIES);
        let signature_props =
            append_etsi(tree, signed_properties, ns::node::SIGNED_SIGNATURE_PROPERTIES);

        let signing_time = options.resolve_signing_time()?;
        append_text_element(
            tree,
            signature_props,
            &etsi(ns::node::SIGNING_TIME),
            &format_signing_time(&signing_time),
        );

        let signing_certificate = append_etsi(tree, signature_props, ns::node::SIGNING_CERTIFICATE);
        let cert = append_etsi(tree, signing_certificate, ns::node::CERT);
        let cert_digest = append_etsi(tree, cert, ns::node::CERT_DIGEST);
        append_method(tree, cert_digest, ns::node::DIGEST_METHOD, hash.digest_uri());
        append_text_element(
            tree,
            cert_digest,
            &ds(ns::node::DIGEST_VALUE),
            &encode_base64(&certificate.digest(hash)?),
        );
        let issuer_serial = append_etsi(tree, cert, ns::node::ISSUER_SERIAL);
        append_text_element(
            tree,
            issuer_serial,
            &ds(ns::node::X509_ISSUER_NAME),
            certificate.issuer(),
        );
        append_text_element(
            tree,
            issuer_serial,
            &ds(ns::node::X509_SERIAL_NUMBER),
            certificate.serial_number(),
        );

        if let Some(place) = &options.production_place {
            let production = append_etsi(tree, signature_props, ns::node::SIGNATURE_PRODUCTION_PLACE);
            append_text_element(tree, production, &etsi(ns::node::CITY), &place.city);
            append_text_element(
                tree,
                production,
                &etsi(ns::node::STATE_OR_PROVINCE),
                &place.state_or_province,
            );
            append_text_element(tree, production, &etsi(ns::node::POSTAL_CODE), &place.postal_code);
            append_text_element(
                tree,
                production,
                &etsi(ns::node::COUNTRY_NAME),
                &place.country_name,
            );
        }

        if let Some(role) = options
            .signer_role
            .as_ref()
            .filter(|r| !r.claimed_roles.is_empty())
        {
            let signer_role = append_etsi(tree, signature_props, ns::node::SIGNER_ROLE);
            let claimed = append_etsi(tree, signer_role, ns::node::CLAIMED_ROLES);
            for name in &role.claimed_roles {
                append_text_element(tree, claimed, &etsi(ns::node::CLAIMED_ROLE), name);
            }
        }

        Ok(Self {
            signature,
            signed_info,
            document_digest,
            properties_digest,
            signature_value,
            signed_properties,
        })
    }
}
