use base64::{engine::general_purpose, Engine as _};
use mongodb_operator::authentication::scram::{legacy_password_digest, salted_password};
use mongodb_operator::{
    compute_credentials, derive_keys, deterministic_salt, AuthError, ScramVariant,
};
use proptest::prelude::*;

#[test]
fn iterated_hmac_matches_pbkdf2_sha1_vectors() {
    let one = salted_password(ScramVariant::Sha1, b"password", b"salt", 1).unwrap();
    assert_eq!(hex::encode(one), "0c60c80f961f0e71f3a9b524af6012062fe037a6");
    let two = salted_password(ScramVariant::Sha1, b"password", b"salt", 2).unwrap();
    assert_eq!(hex::encode(two), "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957");
    let many = salted_password(ScramVariant::Sha1, b"password", b"salt", 4096).unwrap();
    assert_eq!(hex::encode(many), "4b007901b765489abead49d926f721d065a429c1");
}

#[test]
fn iterated_hmac_matches_pbkdf2_sha256_vector() {
    let one = salted_password(ScramVariant::Sha256, b"password", b"salt", 1).unwrap();
    assert_eq!(
        hex::encode(one),
        "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
    );
}

/// (password, iterations, salt, stored key, server key), all base64 except the password.
type KnownKeys = (&'static str, u32, &'static str, &'static str, &'static str);

const SHA1_KNOWN_KEYS: &[KnownKeys] = &[
    (
        "caeec61ba3b15b15b188d29e876514e8",
        10,
        "S3cuk2Rnu/MlbewzxrmmVA==",
        "sYBa3XlSPKNrgjzhOuEuRlJY4dQ=",
        "zuAxRSQb3gZkbaB1IGlusK4jy1M=",
    ),
    (
        "4d9625b297999b3ca786d4a9622d04f1",
        10,
        "kW9KbCQiCOll5Ljd44cjkQ==",
        "VJ8fFVHkPltibvT//mG/OWw44Hc=",
        "ceDRsgj9HezpZ4/vkZX8GZNNN50=",
    ),
    (
        "fd0a78e418dcef39f8c768222810b894",
        10,
        "hhX6xsoID6FeWjXncuNgAg==",
        "TxgaZJ4cIn+S9EfTcc9IOEG7RGc=",
        "d6/qjwBs0qkPKfUAjSh5eemsySE=",
    ),
];

const SHA256_KNOWN_KEYS: &[KnownKeys] = &[
    (
        "Gy4ZNMr-SYEsEpAEZv",
        15000,
        "ajdf1E1QTsNAQdBEodB4vzQOFuvcw9K6PmouVg==",
        "/pBk9XBwSm9UyeQmyJ3LfogfHu9Z/XTjGmRhQDHx/4I=",
        "Avm8mjtMyg659LAyeD4VmuzQb5lxL5iy3dCuzfscfMc=",
    ),
    (
        "Y9SPYSJYUJB_",
        15000,
        "Oplsu3uju+lYyX4apKb0K6xfHpmFtH99Oyk4Ow==",
        "oTJhml8KKZUSt9k4tg+tS6D/ygR+a2Xfo8JKjTpQoAI=",
        "SUfA2+SKL35u665WY5NnJJmA9L5dHu/TnWXX/0nm42Y=",
    ),
    (
        "157VDZr0h-Pz-wj72",
        15000,
        "P/4xs3anygxu3/l2p35CSBe4Z47IV/FtE/e44A==",
        "jOb27nFF72SQoY7WUqKXOTR4e8jETXxMS67SONrcbjA=",
        "3FnslkgUweautAfPRCOEjhS+YbUYUNmdDQUGxB+oaFE=",
    ),
    (
        "P8z1sDfELCePTNbVqX",
        15000,
        "RPNhenwTHlqW5OE597XpuwvPLaiecPpYFa58Pg==",
        "sJ8UhQRszLNo15cOe62+HLjt2NxmSkJGjdJpclTIMBs=",
        "CSg02ODAvh9+swUHoimXcDsT9lLp/A5IhQXavXl7+qA=",
    ),
];

fn assert_known_keys(variant: ScramVariant, vectors: &[KnownKeys]) {
    for (password, iterations, salt, stored_key, server_key) in vectors {
        let salt_bytes = general_purpose::STANDARD.decode(salt).unwrap();
        let keys = derive_keys(variant, password, &salt_bytes, *iterations).unwrap();
        assert_eq!(keys.salt, *salt);
        assert_eq!(keys.iteration_count, *iterations);
        assert_eq!(keys.stored_key, *stored_key, "stored key for {password}");
        assert_eq!(keys.server_key, *server_key, "server key for {password}");
    }
}

#[test]
fn sha1_keys_match_known_answers() {
    assert_known_keys(ScramVariant::Sha1, SHA1_KNOWN_KEYS);
}

#[test]
fn sha256_keys_match_known_answers() {
    assert_known_keys(ScramVariant::Sha256, SHA256_KNOWN_KEYS);
}

#[test]
fn computed_credentials_agree_with_derived_keys() {
    let salt = deterministic_salt("my-rs", ScramVariant::Sha1);
    let computed = compute_credentials("app", "pencil", &salt, ScramVariant::Sha1).unwrap();
    let digest = legacy_password_digest("app", "pencil");
    let derived = derive_keys(ScramVariant::Sha1, &digest, &salt, 10_000).unwrap();
    assert_eq!(computed, derived);
}

#[test]
fn rejects_salt_of_wrong_length() {
    let err = compute_credentials("user", "pencil", &[0u8; 28], ScramVariant::Sha1).unwrap_err();
    assert_eq!(
        err,
        AuthError::InvalidSaltLength {
            mechanism: "SCRAM-SHA-1",
            expected: 16,
            actual: 28,
        }
    );
    let err = compute_credentials("user", "pencil", &[0u8; 16], ScramVariant::Sha256).unwrap_err();
    assert!(matches!(
        err,
        AuthError::InvalidSaltLength {
            expected: 28,
            actual: 16,
            ..
        }
    ));
}

#[test]
fn rejects_passwords_saslprep_forbids() {
    let salt = deterministic_salt("my-rs", ScramVariant::Sha256);
    let err = compute_credentials("user", "bad\u{0007}password", &salt, ScramVariant::Sha256)
        .unwrap_err();
    assert!(matches!(err, AuthError::SaslPrep { .. }));
}

#[test]
fn derived_credentials_have_expected_shape() {
    let salt = deterministic_salt("my-rs", ScramVariant::Sha256);
    let creds = compute_credentials("user", "pencil", &salt, ScramVariant::Sha256).unwrap();
    assert_eq!(creds.iteration_count, 15_000);
    assert_eq!(general_purpose::STANDARD.decode(&creds.salt).unwrap(), salt);
    assert_eq!(general_purpose::STANDARD.decode(&creds.stored_key).unwrap().len(), 32);
    assert_eq!(general_purpose::STANDARD.decode(&creds.server_key).unwrap().len(), 32);

    let salt = deterministic_salt("my-rs", ScramVariant::Sha1);
    let legacy = compute_credentials("user", "pencil", &salt, ScramVariant::Sha1).unwrap();
    assert_eq!(legacy.iteration_count, 10_000);
    assert_eq!(general_purpose::STANDARD.decode(&legacy.stored_key).unwrap().len(), 20);
}

#[test]
fn derivation_is_deterministic_for_fixed_inputs() {
    let salt = deterministic_salt("my-rs", ScramVariant::Sha1);
    let first = compute_credentials("user", "pencil", &salt, ScramVariant::Sha1).unwrap();
    let second = compute_credentials("user", "pencil", &salt, ScramVariant::Sha1).unwrap();
    assert_eq!(first, second);
    let other_password = compute_credentials("user", "pen", &salt, ScramVariant::Sha1).unwrap();
    assert_ne!(first.stored_key, other_password.stored_key);
}

#[test]
fn legacy_variant_mixes_username_into_password() {
    let salt = deterministic_salt("my-rs", ScramVariant::Sha1);
    let alice = compute_credentials("alice", "pencil", &salt, ScramVariant::Sha1).unwrap();
    let bob = compute_credentials("bob", "pencil", &salt, ScramVariant::Sha1).unwrap();
    assert_ne!(alice.stored_key, bob.stored_key);

    let digest = legacy_password_digest("alice", "pencil");
    assert_eq!(digest.len(), 32);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn salt_sizes_leave_room_for_block_index() {
    assert_eq!(deterministic_salt("my-rs", ScramVariant::Sha1).len(), 16);
    assert_eq!(deterministic_salt("my-rs", ScramVariant::Sha256).len(), 28);
    assert_ne!(
        deterministic_salt("my-rs", ScramVariant::Sha1),
        deterministic_salt("my-rs", ScramVariant::Sha256)
    );
}

proptest! {
    #[test]
    fn salt_is_stable_per_resource(name in "[a-z][a-z0-9-]{0,30}") {
        prop_assert_eq!(
            deterministic_salt(&name, ScramVariant::Sha256),
            deterministic_salt(&name, ScramVariant::Sha256)
        );
    }

    #[test]
    fn distinct_resources_get_distinct_salts(
        a in "[a-z][a-z0-9-]{0,30}",
        b in "[a-z][a-z0-9-]{0,30}",
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(
            deterministic_salt(&a, ScramVariant::Sha1),
            deterministic_salt(&b, ScramVariant::Sha1)
        );
    }
}
