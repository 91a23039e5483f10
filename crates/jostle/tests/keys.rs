//! Key generation and encoding against the soft engine.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use jostle::{
    ErrorKind, KeyFamily, KeyPair, KeyRepr, KeyType, Native, PrivateKey, PublicKey,
    soft::SoftEngine,
};

fn native() -> Arc<dyn Native> {
    Arc::new(SoftEngine::new())
}

#[test_log::test]
fn test_public_sizes() {
    let native = native();
    for (kt, len) in [
        (KeyType::MlDsa44, 1312),
        (KeyType::MlDsa65, 1952),
        (KeyType::MlDsa87, 2592),
        (KeyType::SlhDsaSha2_128s, 32),
        (KeyType::SlhDsaShake192f, 48),
        (KeyType::SlhDsaSha2_256f, 64),
        (KeyType::MlKem512, 800),
        (KeyType::MlKem768, 1184),
        (KeyType::MlKem1024, 1568),
    ] {
        let kp = KeyPair::generate(&native, kt).unwrap();
        assert_eq!(kp.public.raw().unwrap().len(), len, "{kt}");
        assert_eq!(kp.public.key_type(), kt);
    }
}

/// Decoding then re-encoding reproduces the same bytes.
#[test_log::test]
fn test_encoding_round_trip() {
    let native = native();
    for &kt in KeyType::ALL {
        let kp = KeyPair::generate(&native, kt).unwrap();

        let spki = kp.public.encoded().unwrap();
        let public = PublicKey::decode(&native, &spki).unwrap();
        assert_eq!(public.key_type(), kt);
        assert_eq!(public.encoded().unwrap(), spki, "{kt}");
        assert_eq!(public.raw().unwrap(), kp.public.raw().unwrap(), "{kt}");

        let pkcs8 = kp.private.encoded().unwrap();
        let private = PrivateKey::decode(&native, &pkcs8).unwrap();
        assert_eq!(private.key_type(), kt);
        assert_eq!(private.encoded().unwrap(), pkcs8, "{kt}");
        assert_eq!(private.repr(), kp.private.repr(), "{kt}");
        assert_eq!(
            private.public_key().raw().unwrap(),
            kp.public.raw().unwrap(),
            "{kt}"
        );
    }
}

#[test_log::test]
fn test_seed_kept() {
    let native = native();
    for &kt in KeyType::ALL {
        let kp = KeyPair::generate(&native, kt).unwrap();
        let seed = kp.private.seed().unwrap();
        if kt.family().keeps_seed() {
            assert_eq!(kp.private.repr(), KeyRepr::Seed);
            let seed = seed.unwrap();
            assert_eq!(seed.len(), kt.seed_len(), "{kt}");

            let again = PrivateKey::from_seed(&native, kt, &seed).unwrap();
            assert_eq!(again.raw().unwrap(), kp.private.raw().unwrap(), "{kt}");
            assert_eq!(again.encoded().unwrap(), kp.private.encoded().unwrap());
        } else {
            assert_eq!(kp.private.repr(), KeyRepr::Raw);
            assert!(seed.is_none(), "{kt}");
        }
    }
}

#[test_log::test]
fn test_seed_only() {
    let native = native();
    let kp = KeyPair::generate(&native, KeyType::MlKem768).unwrap();
    let short = kp.private.to_seed_only().unwrap();
    assert_eq!(short.repr(), KeyRepr::Seed);
    assert_eq!(short.seed().unwrap(), kp.private.seed().unwrap());
    assert_eq!(short.raw().unwrap(), kp.private.raw().unwrap());

    // Expanded material has no seed to fall back to.
    let raw = PrivateKey::from_raw(&native, KeyType::MlKem768, &kp.private.raw().unwrap()).unwrap();
    assert_eq!(raw.repr(), KeyRepr::Raw);
    assert!(raw.seed().unwrap().is_none());
    let err = raw.to_seed_only().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState, "{err}");
}

#[test_log::test]
fn test_raw_keys() {
    let native = native();
    for kt in [KeyType::MlDsa65, KeyType::SlhDsaShake128f, KeyType::MlKem1024] {
        let kp = KeyPair::generate(&native, kt).unwrap();
        let pk = kp.public.raw().unwrap();
        let sk = kp.private.raw().unwrap();

        let public = PublicKey::from_raw(&native, kt, &pk).unwrap();
        assert_eq!(public.encoded().unwrap(), kp.public.encoded().unwrap());

        let private = PrivateKey::from_raw(&native, kt, &sk).unwrap();
        assert_eq!(private.raw().unwrap(), sk);
        assert_eq!(private.public_key().raw().unwrap(), pk);
        let back = PrivateKey::decode(&native, &private.encoded().unwrap()).unwrap();
        assert_eq!(back.repr(), KeyRepr::Raw);
        assert_eq!(back.raw().unwrap(), sk);

        let err = PublicKey::from_raw(&native, kt, &pk[1..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");
    }
}

#[test_log::test]
fn test_bad_seeds() {
    let native = native();
    let err = PrivateKey::from_seed(&native, KeyType::MlDsa44, &[0; 31]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");
    let err = PrivateKey::from_seed(&native, KeyType::SlhDsaSha2_128s, &[0; 48]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedConfiguration, "{err}");
}

#[test_log::test]
fn test_decode_rejects_garbage() {
    let native = native();
    assert!(PublicKey::decode(&native, &[]).is_err());
    assert!(PublicKey::decode(&native, &[0x30, 0x03, 0x02, 0x01, 0x00]).is_err());

    let kp = KeyPair::generate(&native, KeyType::MlDsa44).unwrap();
    let spki = kp.public.encoded().unwrap();
    assert!(PublicKey::decode(&native, &spki[..spki.len() - 1]).is_err());
    // A private key is not a public key.
    assert!(PublicKey::decode(&native, &kp.private.encoded().unwrap()).is_err());
}

#[test_log::test]
fn test_shared_object() {
    let soft = Arc::new(SoftEngine::new());
    let native: Arc<dyn Native> = Arc::clone(&soft) as Arc<dyn Native>;
    let kp = KeyPair::generate(&native, KeyType::MlDsa44).unwrap();
    assert_eq!(kp.public.key_type().family(), KeyFamily::MlDsa);
    assert_eq!(soft.live_handles(), 1);

    // Disposing through one half releases the object for both.
    kp.public.spec().dispose();
    assert!(kp.private.spec().is_disposed());
    assert!(kp.private.raw().is_err());
    assert_eq!(soft.live_handles(), 0);
    assert_eq!(soft.double_frees(), 0);
}
