use std::path::PathBuf;
use std::process::Command;

use chrono::DateTime;
use sri_xades::core::{algorithm, ns};
use sri_xades::{
    BagSelection, Error, HashAlgorithm, SignOptions, SigningContext, SigningIdentity,
};

fn test_data(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("test-data")
        .join(relative)
}

fn read_fixture(relative: &str) -> Option<Vec<u8>> {
    let path = test_data(relative);
    match std::fs::read(&path) {
        Ok(data) => Some(data),
        Err(_) => {
            eprintln!("Skipping: {} not found", path.display());
            None
        }
    }
}

fn context() -> Option<SigningContext> {
    let data = read_fixture("keys/identity.p12")?;
    let mut ctx = SigningContext::new();
    ctx.load_identity(&data, "secret123", BagSelection::default())
        .expect("load identity");
    Some(ctx)
}

fn invoice() -> Option<String> {
    read_fixture("invoices/factura.xml").map(|b| String::from_utf8(b).expect("utf-8 fixture"))
}

fn fixed_time() -> SignOptions {
    SignOptions::new()
        .with_signing_time(DateTime::parse_from_rfc3339("2024-05-10T08:30:00-05:00").unwrap())
}

fn cli_exe() -> &'static str {
    env!("CARGO_BIN_EXE_sri-xades")
}

#[test]
fn signed_invoice_passes_validation() {
    let (Some(ctx), Some(xml)) = (context(), invoice()) else { return };
    let signed = ctx.sign(&xml, &fixed_time()).expect("sign");

    let report = sri_xades::validate(&signed);
    assert!(report.is_valid(), "{report}");
    assert!(report.errors().is_empty());
    assert!(report.warnings().is_empty(), "{:?}", report.warnings());
    assert_eq!(report.info()["signatureCount"], "1");
    assert_eq!(report.info()["signingTime"], "2024-05-10T08:30:00-05:00");
    assert_eq!(report.info()["rootElement"], "factura");
}

#[test]
fn signed_minimal_comprobante_reports_mandatory_flags() {
    let Some(ctx) = context() else { return };
    let signed = ctx
        .sign(r#"<comprobante id="1"><detalle>x</detalle></comprobante>"#, &fixed_time())
        .expect("sign");

    let report = sri_xades::validate(&signed);
    assert!(report.is_valid(), "{report}");
    assert!(report.errors().is_empty(), "{:?}", report.errors());
    for key in [
        "hasSignedInfo",
        "hasSignatureValue",
        "hasCertificate",
        "hasSigningCertificate",
    ] {
        assert_eq!(report.info()[key], "true", "{key}");
    }
    assert_eq!(report.info()["rootElement"], "comprobante");
}

#[test]
fn signature_is_last_child_and_document_is_preserved() {
    let (Some(ctx), Some(xml)) = (context(), invoice()) else { return };
    let signed = ctx.sign(&xml, &fixed_time()).expect("sign");

    let doc = roxmltree::Document::parse(&signed).expect("signed output parses");
    let root = doc.root_element();
    let last = root.last_element_child().expect("root has children");
    assert!(last.has_tag_name((ns::DSIG, "Signature")));

    // Invoice content survives, with the empty element expanded.
    assert!(signed.contains("<razonSocialComprador>Cliente &amp; Asociados</razonSocialComprador>"));
    assert!(signed.contains(r#"<campoAdicional nombre="Observacion"></campoAdicional>"#));
    assert!(!sri_xades::xml::writer::has_self_closing(&signed));
}

#[test]
fn signature_value_verifies_against_certificate() {
    let (Some(ctx), Some(xml)) = (context(), invoice()) else { return };
    let options = fixed_time().with_algorithm(HashAlgorithm::Sha256);
    let signed = ctx.sign(&xml, &options).expect("sign");

    let tree = sri_xades::xml::XmlTree::parse(&signed).expect("reparse");
    let signed_info = tree.find_element(tree.root(), "SignedInfo").unwrap();
    let bytes =
        sri_xades::c14n::canonicalize(&tree, signed_info, sri_xades::C14nMode::Inclusive).unwrap();
    let value_node = tree.find_element(tree.root(), "SignatureValue").unwrap();

    use base64::Engine;
    let raw = base64::engine::general_purpose::STANDARD
        .decode(tree.text(value_node))
        .expect("base64 signature");

    let verifier = sri_xades::crypto::sign::from_uri(algorithm::RSA_SHA256).unwrap();
    let identity = ctx.identity().unwrap();
    assert!(verifier
        .verify(identity.certificate().public_key(), &bytes, &raw)
        .unwrap());
}

#[test]
fn sign_file_and_validate_file_round_trip() {
    let Some(ctx) = context() else { return };
    let input = test_data("invoices/factura.xml");
    if !input.exists() {
        eprintln!("Skipping: {} not found", input.display());
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("factura-firmada.xml");

    ctx.sign_file(&input, &output, &fixed_time()).expect("sign file");
    let report = sri_xades::validate_file(&output).expect("validate file");
    assert!(report.is_valid());

    let json: serde_json::Value =
        serde_json::from_str(&report.to_json().unwrap()).expect("report json");
    assert_eq!(json["valid"], true);
    assert!(json["errors"].is_array());
    assert!(json["warnings"].is_array());
    assert!(json["info"].is_object());
}

#[test]
fn failed_sign_writes_no_output() {
    let Some(ctx) = context() else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("roto.xml");
    let output = dir.path().join("roto-firmado.xml");
    std::fs::write(&input, "<factura><sin-cerrar></factura>").unwrap();

    let err = ctx.sign_file(&input, &output, &fixed_time()).unwrap_err();
    assert!(matches!(err, Error::MalformedDocument(_)));
    assert!(!output.exists());
}

#[test]
fn sign_without_identity_fails() {
    let ctx = SigningContext::new();
    let err = ctx
        .sign("<factura id=\"comprobante\"></factura>", &SignOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Signing(_)));
}

#[test]
fn legacy_container_signs_like_modern_one() {
    let (Some(modern), Some(legacy), Some(xml)) = (
        read_fixture("keys/identity.p12"),
        read_fixture("keys/identity-legacy.p12"),
        invoice(),
    ) else {
        return;
    };
    let a = SigningIdentity::from_pkcs12(&modern, "secret123").unwrap();
    let b = SigningIdentity::from_pkcs12(&legacy, "secret123").unwrap();
    let options = fixed_time();
    assert_eq!(
        sri_xades::sign_document(&xml, &a, &options).unwrap(),
        sri_xades::sign_document(&xml, &b, &options).unwrap()
    );
}

#[test]
fn cli_sign_then_validate() {
    let (Some(_), Some(_)) = (read_fixture("keys/identity.p12"), invoice()) else { return };
    let dir = tempfile::tempdir().expect("tempdir");
    let signed_path = dir.path().join("firmada.xml");

    let output = Command::new(cli_exe())
        .args([
            "sign",
            test_data("invoices/factura.xml").to_str().unwrap(),
            "-o",
            signed_path.to_str().unwrap(),
            "--cert",
            test_data("keys/identity.p12").to_str().unwrap(),
            "--algorithm",
            "sha256",
            "--production-place",
            "--role",
            "Emisor",
            "--signing-time",
            "2024-05-10T08:30:00-05:00",
        ])
        .env("CERT_PASSWORD", "secret123")
        .output()
        .expect("run sign command");
    assert!(
        output.status.success(),
        "sign command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let signed = std::fs::read_to_string(&signed_path).expect("read signed output");
    assert!(signed.contains("<etsi:City>Quito</etsi:City>"));
    assert!(signed.contains("<etsi:ClaimedRole>Emisor</etsi:ClaimedRole>"));

    let output = Command::new(cli_exe())
        .args(["validate", signed_path.to_str().unwrap(), "--json"])
        .output()
        .expect("run validate command");
    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("validate prints json");
    assert_eq!(json["valid"], true);
}

#[test]
fn cli_validate_fails_for_unsigned_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sin-firma.xml");
    std::fs::write(&path, r#"<comprobante id="1"><detalle>x</detalle></comprobante>"#).unwrap();

    let output = Command::new(cli_exe())
        .args(["validate", path.to_str().unwrap()])
        .output()
        .expect("run validate command");
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No ds:Signature element found"));
}

#[test]
fn cli_rejects_wrong_password() {
    let Some(_) = read_fixture("keys/identity.p12") else { return };
    let output = Command::new(cli_exe())
        .args([
            "cert",
            "--cert",
            test_data("keys/identity.p12").to_str().unwrap(),
            "--password",
            "incorrecta",
        ])
        .output()
        .expect("run cert command");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("identity load error"));
}
