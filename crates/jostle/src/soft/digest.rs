//! Digest contexts.
//!
//! The SHA-1, SHA-2 and SHA-3 families are available. Every other
//! name the crate knows is reported as not found, as a provider
//! without it would.

use sha1::Sha1;
use sha2::{
    Digest as _, Sha224, Sha256, Sha384, Sha512, Sha512_224, Sha512_256,
    digest::{DynDigest, ExtendableOutputReset, Update, XofReader},
};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512, Shake128, Shake256};

use crate::{digest::Digest, fault::FaultCode};

enum Hasher {
    Fixed(Box<dyn DynDigest + Send>),
    Shake128(Shake128),
    Shake256(Shake256),
}

pub(super) struct MdCtx {
    hasher: Hasher,
    len: usize,
}

fn fixed(digest: Digest) -> Option<Box<dyn DynDigest + Send>> {
    let h: Box<dyn DynDigest + Send> = match digest {
        Digest::Sha1 => Box::new(Sha1::new()),
        Digest::Sha224 => Box::new(Sha224::new()),
        Digest::Sha256 => Box::new(Sha256::new()),
        Digest::Sha384 => Box::new(Sha384::new()),
        Digest::Sha512 => Box::new(Sha512::new()),
        Digest::Sha512_224 => Box::new(Sha512_224::new()),
        Digest::Sha512_256 => Box::new(Sha512_256::new()),
        Digest::Sha3_224 => Box::new(Sha3_224::new()),
        Digest::Sha3_256 => Box::new(Sha3_256::new()),
        Digest::Sha3_384 => Box::new(Sha3_384::new()),
        Digest::Sha3_512 => Box::new(Sha3_512::new()),
        _ => return None,
    };
    Some(h)
}

fn xof_len_or(len: usize, default: usize) -> usize {
    if len == 0 { default } else { len }
}

impl MdCtx {
    /// Builds a context for `name`. A positive `xof_len` is only
    /// valid for SHAKE.
    pub(super) fn new(name: &str, xof_len: i32) -> Result<Self, FaultCode> {
        let digest = Digest::from_alias(name).ok_or(FaultCode::NameNotFound)?;
        let xof_len = usize::try_from(xof_len).unwrap_or(0);
        // Without a length SHAKE falls back to its security
        // strength, as OpenSSL does.
        let (hasher, len) = match digest {
            Digest::Shake128 => (Hasher::Shake128(Shake128::default()), xof_len_or(xof_len, 16)),
            Digest::Shake256 => (Hasher::Shake256(Shake256::default()), xof_len_or(xof_len, 32)),
            _ if xof_len > 0 => return Err(FaultCode::OpensslError),
            _ => {
                let h = fixed(digest).ok_or(FaultCode::NameNotFound)?;
                let len = DynDigest::output_size(&*h);
                (Hasher::Fixed(h), len)
            }
        };
        Ok(Self { hasher, len })
    }

    pub(super) fn len(&self) -> usize {
        self.len
    }

    pub(super) fn update(&mut self, data: &[u8]) {
        match &mut self.hasher {
            Hasher::Fixed(h) => DynDigest::update(&mut **h, data),
            Hasher::Shake128(h) => Update::update(h, data),
            Hasher::Shake256(h) => Update::update(h, data),
        }
    }

    /// Writes the digest into the front of `out` and restarts.
    pub(super) fn finish(&mut self, out: &mut [u8]) -> Result<usize, FaultCode> {
        let out = out.get_mut(..self.len).ok_or(FaultCode::OutputTooSmall)?;
        match &mut self.hasher {
            Hasher::Fixed(h) => DynDigest::finalize_into_reset(&mut **h, out)
                .map_err(|_| FaultCode::OpensslError)?,
            Hasher::Shake128(h) => h.finalize_xof_reset().read(out),
            Hasher::Shake256(h) => h.finalize_xof_reset().read(out),
        }
        Ok(self.len)
    }

    pub(super) fn reset(&mut self) {
        match &mut self.hasher {
            Hasher::Fixed(h) => DynDigest::reset(&mut **h),
            Hasher::Shake128(h) => *h = Shake128::default(),
            Hasher::Shake256(h) => *h = Shake256::default(),
        }
    }
}
