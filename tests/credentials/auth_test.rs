//! Coverage for webhook authentication.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use confann::auth::{hash_secret, verify, BasicCredentials};
use confann::credentials::parse_passwd;

use crate::common::{bcrypt_credential, test_credential, IDENTIFIER, SECRET};

#[test]
fn correct_pair_verifies() {
    let credential = test_credential();
    assert!(verify(IDENTIFIER, SECRET, &credential));
}

#[test]
fn wrong_secret_fails() {
    let credential = test_credential();
    assert!(!verify(IDENTIFIER, "wrong", &credential));
}

#[test]
fn wrong_identifier_fails_even_with_correct_secret() {
    let credential = test_credential();
    assert!(!verify("someone-else", SECRET, &credential));
    assert!(!verify("", SECRET, &credential));
}

#[test]
fn identifier_comparison_is_exact() {
    let credential = test_credential();
    assert!(!verify("Asterisk", SECRET, &credential));
    assert!(!verify("asterisk ", SECRET, &credential));
}

#[test]
fn hashed_secret_round_trips_through_passwd_record() {
    let hashed = hash_secret("hunter2");
    assert!(hashed.is_ok());
    let hash = match hashed {
        Ok(hash) => hash,
        Err(err) => panic!("hashing should succeed: {err}"),
    };
    assert!(hash.starts_with("$argon2id$"));

    let credential = match parse_passwd(&format!("bridge:{hash}\n")) {
        Ok(credential) => credential,
        Err(err) => panic!("generated record should parse: {err}"),
    };
    assert!(credential.verify("bridge", "hunter2"));
    assert!(!credential.verify("bridge", "hunter3"));
}

#[test]
fn bcrypt_credential_verifies_like_argon2() {
    let credential = bcrypt_credential();
    assert!(verify(IDENTIFIER, SECRET, &credential));
    assert!(!verify(IDENTIFIER, "wrong horse", &credential));
    assert!(!verify("Asterisk", SECRET, &credential));
}

#[test]
fn header_round_trip() {
    let header = format!("Basic {}", STANDARD.encode(format!("{IDENTIFIER}:{SECRET}")));
    let parsed = BasicCredentials::from_header(&header);
    assert!(parsed.is_some());
    let creds = match parsed {
        Some(creds) => creds,
        None => panic!("header should parse"),
    };
    assert!(verify(&creds.identifier, &creds.secret, &test_credential()));
}
