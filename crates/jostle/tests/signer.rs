//! Signing and verification against the soft engine.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use jostle::{
    Deterministic, ErrorKind, KeyPair, KeyType, MessageEncoding, MuMode, Native, PublicKey,
    Signer, SignerKind, signer::MU_LEN, soft::SoftEngine,
};

fn native() -> Arc<dyn Native> {
    Arc::new(SoftEngine::new())
}

fn sign(native: &Arc<dyn Native>, kind: SignerKind, kp: &KeyPair, ctx: &[u8], msg: &[u8]) -> Vec<u8> {
    let signer = Signer::new(native, kind);
    signer.init_sign(&kp.private, ctx).unwrap();
    signer.update(msg).unwrap();
    signer.sign().unwrap()
}

fn verify(
    native: &Arc<dyn Native>,
    kind: SignerKind,
    kp: &KeyPair,
    ctx: &[u8],
    msg: &[u8],
    sig: &[u8],
) -> bool {
    let signer = Signer::new(native, kind);
    signer.init_verify(&kp.public, ctx).unwrap();
    signer.update(msg).unwrap();
    signer.verify(sig).unwrap()
}

#[test_log::test]
fn test_ml_dsa_sign_verify() {
    let native = native();
    let kind = SignerKind::ml_dsa();
    for (kt, len) in [
        (KeyType::MlDsa44, 2420),
        (KeyType::MlDsa65, 3309),
        (KeyType::MlDsa87, 4627),
    ] {
        let kp = KeyPair::generate(&native, kt).unwrap();
        let sig = sign(&native, kind, &kp, b"", b"hello, world");
        assert_eq!(sig.len(), len, "{kt}");
        assert!(verify(&native, kind, &kp, b"", b"hello, world", &sig), "{kt}");
        assert!(!verify(&native, kind, &kp, b"", b"hello, world!", &sig), "{kt}");

        let mut bad = sig.clone();
        bad[len / 2] ^= 0x10;
        assert!(!verify(&native, kind, &kp, b"", b"hello, world", &bad), "{kt}");
        assert!(!verify(&native, kind, &kp, b"", b"hello, world", &sig[1..]), "{kt}");
    }
}

#[test_log::test]
fn test_slh_dsa_sign_verify() {
    let native = native();
    for (kt, len) in [
        (KeyType::SlhDsaSha2_128f, 17088),
        (KeyType::SlhDsaShake128s, 7856),
        (KeyType::SlhDsaSha2_192s, 16224),
    ] {
        let kp = KeyPair::generate(&native, kt).unwrap();
        for encoding in [MessageEncoding::None, MessageEncoding::Pure] {
            let kind = SignerKind::SlhDsa {
                encoding,
                deterministic: Deterministic::Non,
            };
            let sig = sign(&native, kind, &kp, b"ctx", b"message");
            assert_eq!(sig.len(), len, "{kt}");
            assert!(verify(&native, kind, &kp, b"ctx", b"message", &sig), "{kt}");
            assert!(!verify(&native, kind, &kp, b"ctx", b"massage", &sig), "{kt}");
        }
    }
}

#[test_log::test]
fn test_slh_dsa_determinism() {
    let native = native();
    let kp = KeyPair::generate(&native, KeyType::SlhDsaShake128f).unwrap();
    let fixed = SignerKind::SlhDsa {
        encoding: MessageEncoding::Pure,
        deterministic: Deterministic::Deterministic,
    };
    let a = sign(&native, fixed, &kp, b"", b"m");
    let b = sign(&native, fixed, &kp, b"", b"m");
    assert_eq!(a, b);

    let random = SignerKind::slh_dsa();
    let c = sign(&native, random, &kp, b"", b"m");
    let d = sign(&native, random, &kp, b"", b"m");
    assert_ne!(c, d);
    assert!(verify(&native, random, &kp, b"", b"m", &a));
}

#[test_log::test]
fn test_context_binds() {
    let native = native();
    let kind = SignerKind::ml_dsa();
    let kp = KeyPair::generate(&native, KeyType::MlDsa44).unwrap();
    let sig = sign(&native, kind, &kp, b"context one", b"msg");
    assert!(verify(&native, kind, &kp, b"context one", b"msg", &sig));
    assert!(!verify(&native, kind, &kp, b"context two", b"msg", &sig));

    let signer = Signer::new(&native, kind);
    signer.init_sign(&kp.private, &[7; 255]).unwrap();
    let err = signer.init_sign(&kp.private, &[7; 256]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");
    // The failed init left the signer unbound.
    let err = signer.sign().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState, "{err}");
}

/// A mu computed separately signs the same as the message.
#[test_log::test]
fn test_external_mu() {
    let native = native();
    let kp = KeyPair::generate(&native, KeyType::MlDsa65).unwrap();

    let mu = sign(
        &native,
        SignerKind::MlDsa {
            mu: MuMode::CalculateOnly,
        },
        &kp,
        b"ctx",
        b"a long message",
    );
    assert_eq!(mu.len(), MU_LEN);

    let external = SignerKind::MlDsa {
        mu: MuMode::External,
    };
    let sig = sign(&native, external, &kp, b"ctx", &mu);
    let internal = SignerKind::ml_dsa();
    assert!(verify(&native, internal, &kp, b"ctx", b"a long message", &sig));
    assert!(verify(&native, external, &kp, b"", &mu, &sig));

    let signer = Signer::new(&native, external);
    signer.init_sign(&kp.private, b"").unwrap();
    signer.update(&mu[1..]).unwrap();
    let err = signer.sign().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");

    let calc = Signer::new(
        &native,
        SignerKind::MlDsa {
            mu: MuMode::CalculateOnly,
        },
    );
    let err = calc.init_verify(&kp.public, b"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");
}

/// Signing and verifying leave the signer ready for the next
/// message with the same key and context.
#[test_log::test]
fn test_reuse_after_sign() {
    let native = native();
    let kind = SignerKind::ml_dsa();
    let kp = KeyPair::generate(&native, KeyType::MlDsa44).unwrap();
    let signer = Signer::new(&native, kind);
    signer.init_sign(&kp.private, b"ctx").unwrap();
    signer.update(b"first").unwrap();
    let first = signer.sign().unwrap();
    signer.update(b"second").unwrap();
    let second = signer.sign().unwrap();

    assert!(verify(&native, kind, &kp, b"ctx", b"first", &first));
    assert!(verify(&native, kind, &kp, b"ctx", b"second", &second));
}

#[test_log::test]
fn test_wrong_key() {
    let other = native();
    let native = native();
    let kp = KeyPair::generate(&native, KeyType::MlDsa44).unwrap();

    let signer = Signer::new(&other, SignerKind::ml_dsa());
    let err = signer.init_sign(&kp.private, b"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");

    let slh = KeyPair::generate(&native, KeyType::SlhDsaSha2_128s).unwrap();
    let signer = Signer::new(&native, SignerKind::ml_dsa());
    let err = signer.init_verify(&slh.public, b"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");

    // A key loaded from its public half can verify.
    let public = PublicKey::from_raw(&native, KeyType::MlDsa44, &kp.public.raw().unwrap()).unwrap();
    signer.init_verify(&public, b"").unwrap();
}

#[test_log::test]
fn test_state_errors() {
    let native = native();
    let kp = KeyPair::generate(&native, KeyType::MlDsa44).unwrap();
    let signer = Signer::new(&native, SignerKind::ml_dsa());

    let err = signer.update(b"x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState, "{err}");
    let err = signer.sign().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState, "{err}");

    signer.init_verify(&kp.public, b"").unwrap();
    let err = signer.sign().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState, "{err}");

    signer.dispose();
    assert!(signer.is_disposed());
    assert!(signer.verify(&[0; 2420]).is_err());
}
