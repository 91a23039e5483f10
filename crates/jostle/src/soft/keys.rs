//! Stand-in key material for ML-DSA, SLH-DSA and ML-KEM.
//!
//! Keys, signatures and ciphertexts have the real sizes, and the
//! private key embeds the public key the way the real formats do,
//! but the "algorithms" are SHA-256 expansions. They bind outputs to
//! keys and inputs, which is all the bindings need, and provide no
//! security at all.

use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::keys::{KeyFamily, KeyType};

/// Encoded sizes for one key type.
#[derive(Copy, Clone, Debug)]
pub(super) struct Sizes {
    pub public: usize,
    pub private: usize,
    /// The signature length, or the ciphertext length for ML-KEM.
    pub output: usize,
}

pub(super) const fn sizes(key_type: KeyType) -> Sizes {
    use KeyType::{
        MlDsa44, MlDsa65, MlDsa87, MlKem512, MlKem768, MlKem1024, SlhDsaSha2_128f,
        SlhDsaSha2_128s, SlhDsaSha2_192f, SlhDsaSha2_192s, SlhDsaSha2_256f, SlhDsaSha2_256s,
        SlhDsaShake128f, SlhDsaShake128s, SlhDsaShake192f, SlhDsaShake192s, SlhDsaShake256f,
        SlhDsaShake256s,
    };
    let (public, private, output) = match key_type {
        MlDsa44 => (1312, 2560, 2420),
        MlDsa65 => (1952, 4032, 3309),
        MlDsa87 => (2592, 4896, 4627),
        SlhDsaSha2_128s | SlhDsaShake128s => (32, 64, 7856),
        SlhDsaSha2_128f | SlhDsaShake128f => (32, 64, 17088),
        SlhDsaSha2_192s | SlhDsaShake192s => (48, 96, 16224),
        SlhDsaSha2_192f | SlhDsaShake192f => (48, 96, 35664),
        SlhDsaSha2_256s | SlhDsaShake256s => (64, 128, 29792),
        SlhDsaSha2_256f | SlhDsaShake256f => (64, 128, 49856),
        MlKem512 => (800, 1632, 768),
        MlKem768 => (1184, 2400, 1088),
        MlKem1024 => (1568, 3168, 1568),
    };
    Sizes {
        public,
        private,
        output,
    }
}

/// Expands `parts` into `len` bytes with SHA-256 in counter mode.
pub(super) fn expand(label: &str, parts: &[&[u8]], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len + 32);
    let mut counter = 0u32;
    while out.len() < len {
        let mut h = Sha256::new();
        h.update(counter.to_be_bytes());
        h.update(label.as_bytes());
        for part in parts {
            h.update((part.len() as u64).to_be_bytes());
            h.update(part);
        }
        out.extend_from_slice(&h.finalize());
        counter = counter.wrapping_add(1);
    }
    out.truncate(len);
    out
}

pub(super) fn random(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// The contents of a key spec.
pub(super) struct KeyMaterial {
    pub key_type: KeyType,
    pub public: Vec<u8>,
    pub private: Option<Zeroizing<Vec<u8>>>,
    pub seed: Option<Zeroizing<Vec<u8>>>,
}

impl KeyMaterial {
    pub fn generate(key_type: KeyType) -> Self {
        let seed = Zeroizing::new(random(key_type.seed_len()));
        Self::from_seed(key_type, &seed)
    }

    pub fn from_seed(key_type: KeyType, seed: &[u8]) -> Self {
        let Sizes {
            public, private, ..
        } = sizes(key_type);
        let sk = match key_type.family() {
            KeyFamily::SlhDsa => {
                // SK.seed || SK.prf || PK.seed || PK.root
                let n = seed.len() / 3;
                let mut sk = seed.to_vec();
                sk.extend(expand("SLH-DSA root", &[seed], n));
                sk
            }
            KeyFamily::MlDsa | KeyFamily::MlKem => {
                let id = key_type.id().to_be_bytes();
                let pk = expand("public", &[&id, seed], public);
                let mut sk = expand("private", &[&id, seed], private - public);
                sk.extend_from_slice(&pk);
                sk
            }
        };
        let keeps_seed = key_type.family().keeps_seed();
        let mut key = Self::from_private(key_type, sk);
        if keeps_seed {
            key.seed = Some(Zeroizing::new(seed.to_vec()));
        }
        key
    }

    /// `sk` must have the key type's private key length.
    pub fn from_private(key_type: KeyType, sk: Vec<u8>) -> Self {
        let public = sizes(key_type).public;
        let pk = sk[sk.len() - public..].to_vec();
        Self {
            key_type,
            public: pk,
            private: Some(Zeroizing::new(sk)),
            seed: None,
        }
    }

    pub fn from_public(key_type: KeyType, pk: &[u8]) -> Self {
        Self {
            key_type,
            public: pk.to_vec(),
            private: None,
            seed: None,
        }
    }
}

/// The length of an ML-KEM shared secret.
pub(super) const SECRET_LEN: usize = 32;

/// Returns `(ciphertext, secret)`.
pub(super) fn encapsulate(key: &KeyMaterial) -> (Vec<u8>, Zeroizing<Vec<u8>>) {
    let r = random(SECRET_LEN);
    let len = sizes(key.key_type).output;
    let mut ct = r.clone();
    ct.extend(expand("ML-KEM ct", &[&key.public, &r], len - SECRET_LEN));
    let secret = expand("ML-KEM ss", &[&key.public, &r], SECRET_LEN);
    (ct, Zeroizing::new(secret))
}

/// Recovers the secret. A ciphertext that does not check out
/// yields a pseudorandom secret instead, as ML-KEM does.
pub(super) fn decapsulate(key: &KeyMaterial, sk: &[u8], ct: &[u8]) -> Zeroizing<Vec<u8>> {
    let (r, rest) = ct.split_at(SECRET_LEN);
    let expected = expand("ML-KEM ct", &[&key.public, r], rest.len());
    let secret = if expected == rest {
        expand("ML-KEM ss", &[&key.public, r], SECRET_LEN)
    } else {
        expand("ML-KEM reject", &[sk, ct], SECRET_LEN)
    };
    Zeroizing::new(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_embed_public_key() {
        for &kt in KeyType::ALL {
            let key = KeyMaterial::generate(kt);
            let s = sizes(kt);
            assert_eq!(key.public.len(), s.public, "{kt}");
            let sk = key.private.as_deref().map(Vec::len);
            assert_eq!(sk, Some(s.private), "{kt}");
            assert_eq!(key.seed.is_some(), kt.family().keeps_seed(), "{kt}");
        }
    }

    #[test]
    fn test_seed_is_deterministic() {
        let seed = [7u8; 64];
        let a = KeyMaterial::from_seed(KeyType::MlKem768, &seed);
        let b = KeyMaterial::from_seed(KeyType::MlKem768, &seed);
        assert_eq!(a.public, b.public);
        let c = KeyMaterial::from_seed(KeyType::MlKem1024, &seed);
        assert_ne!(a.public[..32], c.public[..32]);
    }

    #[test]
    fn test_kem_implicit_rejection() {
        let key = KeyMaterial::generate(KeyType::MlKem512);
        let sk = key.private.clone().unwrap_or_default();
        let (mut ct, secret) = encapsulate(&key);
        assert_eq!(decapsulate(&key, &sk, &ct), secret);
        ct[100] ^= 1;
        assert_ne!(decapsulate(&key, &sk, &ct), secret);
    }
}
