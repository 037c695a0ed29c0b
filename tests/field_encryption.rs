//! PII field encryption driven by a loaded configuration.

use std::io::Write;

use serde_json::json;

use security_perimeter::config::load_config;
use security_perimeter::crypto::{FieldCipher, FieldKey, PiiCodec};

mod common;
use common::FIELD_KEY;

const USER_PII: &[&str] = &["name", "phone", "address"];

fn config_file(key: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[app]
url = "https://budget.example"
production = true

[encryption]
key = "{key}"

[session]
secret = "session-secret"

[webhook]
secret = "webhook-secret"

[audit]
ip_hash_secret = "ip-secret"
"#
    )
    .unwrap();
    file
}

fn codec() -> PiiCodec {
    let config = load_config(config_file(FIELD_KEY).path()).unwrap();
    let cipher = FieldCipher::from_config_key(&config.encryption.key).unwrap();
    PiiCodec::new(cipher, USER_PII.iter().copied())
}

#[test]
fn test_row_round_trip_with_hebrew_values() {
    let codec = codec();
    let row = json!({
        "id": "u-17",
        "name": "ישראל ישראלי",
        "phone": "054-1234567",
        "address": "רחוב הרצל 1, תל אביב",
        "monthlyIncome": 18500,
    });

    let sealed = codec.seal(row.clone()).unwrap();
    assert_eq!(sealed["id"], "u-17");
    assert_eq!(sealed["monthlyIncome"], 18500);
    for field in USER_PII {
        let stored = sealed[*field].as_str().unwrap();
        assert_ne!(stored, row[*field].as_str().unwrap());
        assert_eq!(stored.split(':').count(), 3);
    }

    assert_eq!(codec.unseal(sealed), row);
}

#[test]
fn test_same_value_seals_differently() {
    let codec = codec();
    let row = json!({ "name": "דנה" });
    let a = codec.seal(row.clone()).unwrap();
    let b = codec.seal(row).unwrap();
    assert_ne!(a["name"], b["name"]);
}

#[test]
fn test_legacy_rows_read_back_unchanged() {
    let codec = codec();
    let legacy = json!({ "name": "Plain Text Name", "phone": null, "address": "" });
    assert_eq!(codec.unseal(legacy.clone()), legacy);
}

#[test]
fn test_foreign_key_ciphertext_passes_through() {
    let codec = codec();
    let other = FieldCipher::new(&FieldKey::generate());
    let stored = other.encrypt("רחוב הרצל 1").unwrap();

    let row = json!({ "address": stored });
    assert_eq!(codec.unseal(row.clone()), row);
}

#[test]
fn test_base64_key_decrypts_hex_key_output() {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    let raw = hex::decode(FIELD_KEY).unwrap();
    let b64 = STANDARD.encode(raw);
    let from_b64 = FieldCipher::from_config_key(&b64).unwrap();
    let from_hex = FieldCipher::from_config_key(FIELD_KEY).unwrap();

    let sealed = from_hex.encrypt("שלום").unwrap();
    assert_eq!(from_b64.decrypt(&sealed), "שלום");
}

#[test]
fn test_malformed_key_rejected_at_load() {
    let err = load_config(config_file("too-short").path()).unwrap_err();
    assert!(err.to_string().contains("encryption.key"));
}
