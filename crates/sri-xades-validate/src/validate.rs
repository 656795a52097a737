#![forbid(unsafe_code)]

//! Structural checks over a signed document.
//!
//! Elements are matched by namespace and local name. Nothing is recomputed:
//! a report can be valid for a document whose digests or signature value
//! are wrong.

use crate::report::ValidationReport;
use lazy_static::lazy_static;
use regex::Regex;
use sri_xades_core::{ns, Error};
use sri_xades_xml::writer;

lazy_static! {
    static ref UTF8_DECLARATION: Regex =
        Regex::new(r#"(?i)<\?xml[^>]*\bencoding\s*=\s*["']utf-8["']"#)
            .expect("encoding pattern is valid");
}

fn find_descendant<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.descendants()
        .skip(1)
        .find(|n| n.is_element() && n.has_tag_name((ns_uri, local_name)))
}

/// Check the structure of a signed document.
///
/// Text that is not well-formed XML yields an invalid report with a single
/// error and no other checks.
pub fn validate(signed_xml: &str) -> ValidationReport {
    let mut report = ValidationReport::new();

    let doc = match roxmltree::Document::parse(signed_xml) {
        Ok(doc) => doc,
        Err(e) => {
            report.add_error(Error::ValidationParse(e.to_string()).to_string());
            return report;
        }
    };
    let root = doc.root_element();
    report.set_info("rootElement", root.tag_name().name());

    let signatures: Vec<_> = doc
        .descendants()
        .filter(|n| n.is_element() && n.has_tag_name((ns::DSIG, ns::node::SIGNATURE)))
        .collect();

    match signatures.first() {
        None => report.add_error("No ds:Signature element found"),
        Some(&signature) => {
            report.set_info("signatureCount", signatures.len());
            if signatures.len() > 1 {
                report.add_warning(format!(
                    "Found {} ds:Signature elements; only the first was checked",
                    signatures.len()
                ));
            }
            check_signature(signature, &mut report);
        }
    }

    if writer::has_self_closing(signed_xml) {
        report.add_warning("Self-closing tags found; the SRI may reject them");
    }
    if !UTF8_DECLARATION.is_match(signed_xml) {
        report.add_warning("The document does not declare UTF-8 encoding");
    }

    report
}

fn check_signature(signature: roxmltree::Node<'_, '_>, report: &mut ValidationReport) {
    if find_descendant(signature, ns::DSIG, ns::node::SIGNED_INFO).is_some() {
        report.set_info("hasSignedInfo", true);
    } else {
        report.add_error("No ds:SignedInfo element found");
    }

    if find_descendant(signature, ns::DSIG, ns::node::SIGNATURE_VALUE).is_some() {
        report.set_info("hasSignatureValue", true);
    } else {
        report.add_error("No ds:SignatureValue element found");
    }

    match find_descendant(signature, ns::DSIG, ns::node::KEY_INFO) {
        None => report.add_warning("No ds:KeyInfo element found"),
        Some(key_info) => {
            report.set_info("hasKeyInfo", true);
            let has_certificate = find_descendant(key_info, ns::DSIG, ns::node::X509_DATA)
                .and_then(|data| find_descendant(data, ns::DSIG, ns::node::X509_CERTIFICATE))
                .is_some();
            report.set_info("hasCertificate", has_certificate);
        }
    }

    let Some(object) = find_descendant(signature, ns::DSIG, ns::node::OBJECT) else {
        report.add_warning("No ds:Object element found");
        return;
    };
    report.set_info("hasObject", true);

    let Some(qualifying) = find_descendant(object, ns::XADES, ns::node::QUALIFYING_PROPERTIES)
    else {
        report.add_warning("No QualifyingProperties (XAdES) found");
        return;
    };
    report.set_info("hasQualifyingProperties", true);

    let Some(signed_properties) =
        find_descendant(qualifying, ns::XADES, ns::node::SIGNED_PROPERTIES)
    else {
        report.add_warning("No SignedProperties found");
        return;
    };
    report.set_info("hasSignedProperties", true);

    match find_descendant(signed_properties, ns::XADES, ns::node::SIGNING_TIME) {
        Some(time) => report.set_info("signingTime", time.text().unwrap_or("")),
        None => report.add_warning("No SigningTime found"),
    }

    let has_signing_certificate =
        find_descendant(signed_properties, ns::XADES, ns::node::SIGNING_CERTIFICATE).is_some();
    report.set_info("hasSigningCertificate", has_signing_certificate);
    if !has_signing_certificate {
        report.add_warning("No SigningCertificate found");
    }
}
