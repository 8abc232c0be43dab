//! Integration tests for the pairing key codec.
//!
//! These verify the round-trip and expiry guarantees of the shareable
//! token across both its compact and structured forms.

use chrono::{Duration, TimeZone, Utc};
use clonr::pairing::PairingKey;
use clonr::StandaloneError;
use proptest::prelude::*;

#[test]
fn compact_and_structured_forms_decode_identically() {
    let (key, _) = PairingKey::generate("192.168.1.10", 50052, Duration::hours(24));

    let from_token = PairingKey::decode(&key.encode()).unwrap();
    let from_file = PairingKey::from_json(&key.to_json()).unwrap();

    assert_eq!(from_token, key);
    assert_eq!(from_file, key);
}

#[test]
fn token_is_single_line_and_copy_pasteable() {
    let (key, _) = PairingKey::generate("host.example", 50052, Duration::hours(24));
    let token = key.encode();

    assert!(!token.contains('\n'));
    assert!(!token.contains('\r'));
    assert!(token.chars().all(|c| !c.is_whitespace()));
}

#[test]
fn expired_key_rejected_regardless_of_other_fields() {
    let (mut key, _) = PairingKey::generate("host", 50052, Duration::hours(24));
    key.expires_at = Utc::now() - Duration::seconds(1);

    // Everything else is well-formed; expiry alone must fail it
    assert!(matches!(
        key.validate(Utc::now()),
        Err(StandaloneError::Expired { .. })
    ));

    // The token still decodes - expiry is validate's job, not decode's
    let decoded = PairingKey::decode(&key.encode()).unwrap();
    assert_eq!(decoded, key);
    assert!(matches!(
        decoded.validate(Utc::now()),
        Err(StandaloneError::Expired { .. })
    ));
}

#[test]
fn validation_boundary_is_exact() {
    let (mut key, _) = PairingKey::generate("host", 50052, Duration::hours(24));
    let moment = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
    key.expires_at = moment;

    assert!(key.validate(moment - Duration::seconds(1)).is_ok());
    assert!(key.validate(moment).is_err());
    assert!(key.validate(moment + Duration::seconds(1)).is_err());
}

proptest! {
    // decode(encode(k)) == k for arbitrary well-formed keys
    #[test]
    fn prop_roundtrip(
        host in "[a-z0-9.-]{1,24}",
        port in 1u16..,
        extra_caps in proptest::collection::btree_set("[a-z-]{1,12}", 0..4),
        expiry_secs in 0i64..4_000_000_000i64,
    ) {
        let (mut key, _) = PairingKey::generate(&host, port, Duration::hours(1));
        key.capabilities.extend(extra_caps);
        key.expires_at = Utc.timestamp_opt(expiry_secs, 0).unwrap();

        let decoded = PairingKey::decode(&key.encode()).unwrap();
        prop_assert_eq!(decoded, key);
    }

    #[test]
    fn prop_garbage_never_panics(token in ".{0,200}") {
        // Arbitrary input either decodes or errors; it must never panic
        let _ = PairingKey::decode(&token);
    }
}
