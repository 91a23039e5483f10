//! ML-KEM against the soft engine.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use jostle::{
    ErrorKind, Kem, KeyPair, KeyType, Native, PrivateKey, kem::SHARED_SECRET_LEN,
    soft::SoftEngine,
};

fn native() -> Arc<dyn Native> {
    Arc::new(SoftEngine::new())
}

#[test_log::test]
fn test_round_trip() {
    let native = native();
    for (kt, ct_len) in [
        (KeyType::MlKem512, 768),
        (KeyType::MlKem768, 1088),
        (KeyType::MlKem1024, 1568),
    ] {
        let kp = KeyPair::generate(&native, kt).unwrap();
        let enc = Kem::encapsulate(&kp.public).unwrap();
        assert_eq!(enc.secret.len(), SHARED_SECRET_LEN, "{kt}");
        assert_eq!(enc.ciphertext.len(), ct_len, "{kt}");

        let secret = Kem::decapsulate(&kp.private, &enc.ciphertext).unwrap();
        assert_eq!(secret, enc.secret, "{kt}");

        // Every encapsulation is fresh.
        let again = Kem::encapsulate(&kp.public).unwrap();
        assert_ne!(again.ciphertext, enc.ciphertext, "{kt}");
    }
}

/// A corrupted ciphertext decapsulates to an unrelated secret
/// rather than failing.
#[test_log::test]
fn test_implicit_rejection() {
    let native = native();
    let kp = KeyPair::generate(&native, KeyType::MlKem768).unwrap();
    let enc = Kem::encapsulate(&kp.public).unwrap();

    let mut bad = enc.ciphertext.clone();
    bad[0] ^= 1;
    let secret = Kem::decapsulate(&kp.private, &bad).unwrap();
    assert_eq!(secret.len(), SHARED_SECRET_LEN);
    assert_ne!(secret, enc.secret);

    // Rejection is deterministic.
    assert_eq!(Kem::decapsulate(&kp.private, &bad).unwrap(), secret);
}

#[test_log::test]
fn test_seed_key_decapsulates() {
    let native = native();
    let kp = KeyPair::generate(&native, KeyType::MlKem512).unwrap();
    let enc = Kem::encapsulate(&kp.public).unwrap();

    let seed = kp.private.seed().unwrap().unwrap();
    let restored = PrivateKey::from_seed(&native, KeyType::MlKem512, &seed).unwrap();
    assert_eq!(
        Kem::decapsulate(&restored, &enc.ciphertext).unwrap(),
        enc.secret
    );
}

#[test_log::test]
fn test_wrong_ciphertext_length() {
    let native = native();
    let kp = KeyPair::generate(&native, KeyType::MlKem512).unwrap();
    let err = Kem::decapsulate(&kp.private, &[0; 767]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineFault, "{err}");
}

#[test_log::test]
fn test_wrong_family() {
    let native = native();
    let kp = KeyPair::generate(&native, KeyType::MlDsa44).unwrap();
    let err = Kem::encapsulate(&kp.public).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");
    let err = Kem::decapsulate(&kp.private, &[0; 768]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");
}
