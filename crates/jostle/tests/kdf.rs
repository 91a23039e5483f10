//! Password-based key derivation against the soft engine.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use jostle::{
    ErrorKind, Native,
    kdf::{self, Digest, ScryptParams},
    soft::SoftEngine,
};

fn native() -> Arc<dyn Native> {
    Arc::new(SoftEngine::new())
}

#[test_log::test]
fn test_pbkdf2_sha256_vectors() {
    let native = native();
    for (iterations, want) in [
        (
            1,
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b",
        ),
        (
            4096,
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a",
        ),
    ] {
        let mut out = [0u8; 32];
        kdf::pbkdf2(
            &native,
            b"password",
            b"salt",
            iterations,
            Digest::Sha256,
            &mut out,
        )
        .unwrap();
        assert_eq!(hex::encode(out), want, "c = {iterations}");
    }
}

/// RFC 6070.
#[test_log::test]
fn test_pbkdf2_sha1_vectors() {
    let native = native();
    for (iterations, want) in [
        (1, "0c60c80f961f0e71f3a9b524af6012062fe037a6"),
        (2, "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957"),
        (4096, "4b007901b765489abead49d926f721d065a429c1"),
    ] {
        let mut out = [0u8; 20];
        kdf::pbkdf2(
            &native,
            b"password",
            b"salt",
            iterations,
            Digest::Sha1,
            &mut out,
        )
        .unwrap();
        assert_eq!(hex::encode(out), want, "c = {iterations}");
    }
}

/// Every fixed-length digest in the SHA families derives, and each
/// derives something different.
#[test_log::test]
fn test_pbkdf2_digests() {
    let native = native();
    let mut seen = Vec::new();
    for digest in [
        Digest::Sha224,
        Digest::Sha384,
        Digest::Sha512_224,
        Digest::Sha512_256,
        Digest::Sha3_224,
        Digest::Sha3_256,
        Digest::Sha3_384,
        Digest::Sha3_512,
    ] {
        let mut out = [0u8; 24];
        kdf::pbkdf2(&native, b"pw", b"salt", 2, digest, &mut out).unwrap();
        assert!(!seen.contains(&out), "{digest}");
        seen.push(out);
    }
}

/// An XOF has no HMAC.
#[test_log::test]
fn test_pbkdf2_shake() {
    let native = native();
    let mut out = [0u8; 16];
    let err = kdf::pbkdf2(&native, b"pw", b"salt", 1, Digest::Shake128, &mut out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineFault, "{err}");
}

/// A shorter output is a prefix of a longer one.
#[test_log::test]
fn test_pbkdf2_output_prefix() {
    let native = native();
    let mut short = [0u8; 20];
    let mut long = [0u8; 100];
    for out in [&mut short[..], &mut long[..]] {
        kdf::pbkdf2(&native, b"pw", b"NaCl", 10, Digest::Sha512, out).unwrap();
    }
    assert_eq!(short, long[..20]);

    let mut other = [0u8; 20];
    kdf::pbkdf2(&native, b"pw", b"NaCl", 10, Digest::Sha256, &mut other).unwrap();
    assert_ne!(short, other);
}

#[test_log::test]
fn test_pbkdf2_rejects() {
    let native = native();
    let mut out = [0u8; 16];

    let err = kdf::pbkdf2(&native, b"pw", b"", 1, Digest::Sha256, &mut out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");

    let err = kdf::pbkdf2(&native, b"pw", b"salt", 0, Digest::Sha256, &mut out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineFault, "{err}");

    let err = kdf::pbkdf2(&native, b"pw", b"salt", u32::MAX, Digest::Sha256, &mut out)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegerOverflow, "{err}");
}

/// RFC 7914, section 12.
#[test_log::test]
fn test_scrypt_vector() {
    let native = native();
    let mut out = [0u8; 64];
    let params = ScryptParams {
        n: 1024,
        r: 8,
        p: 16,
    };
    kdf::scrypt(&native, b"password", b"NaCl", params, &mut out).unwrap();
    assert_eq!(
        hex::encode(out),
        "fdbabe1c9d3472007856e7190d01e9fe7c6ad7cbc8237830e77376634b373162\
         2eaf30d92e22a3886ff109279d9830dac727afb94a83ee6d8360cbdfa2cc0640"
    );
}

#[test_log::test]
fn test_scrypt_rejects() {
    let native = native();
    let mut out = [0u8; 32];
    for (n, r, p) in [(1, 1, 1), (0, 1, 1), (1000, 1, 1)] {
        let err = kdf::scrypt(&native, b"pw", b"salt", ScryptParams { n, r, p }, &mut out)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "n = {n}: {err}");
    }

    let params = ScryptParams { n: 16, r: 1, p: 1 };
    let err = kdf::scrypt(&native, b"pw", b"", params, &mut out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");

    let params = ScryptParams {
        n: 16,
        r: u32::MAX,
        p: 1,
    };
    let err = kdf::scrypt(&native, b"pw", b"salt", params, &mut out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegerOverflow, "{err}");
}
