//! ML-KEM key encapsulation.

use zeroize::Zeroizing;

use crate::{
    error::Error,
    fault::{Family, check, len_i32},
    keys::{KeyFamily, PrivateKey, PublicKey},
};

/// The length of an ML-KEM shared secret.
pub const SHARED_SECRET_LEN: usize = 32;

/// The output of [`Kem::encapsulate`].
#[derive(Clone)]
pub struct Encapsulated {
    /// The shared secret.
    pub secret: Zeroizing<Vec<u8>>,
    /// The ciphertext to send to the holder of the private key.
    pub ciphertext: Vec<u8>,
}

impl core::fmt::Debug for Encapsulated {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Encapsulated")
            .field("ciphertext", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// ML-KEM encapsulation and decapsulation.
///
/// Both directions use the engine bound to the key.
#[derive(Copy, Clone, Debug, Default)]
pub struct Kem;

impl Kem {
    /// Generates a shared secret and encapsulates it to `key`.
    pub fn encapsulate(key: &PublicKey) -> Result<Encapsulated, Error> {
        let spec = key.spec();
        check_family(spec.key_type().family())?;
        let native = spec.native();
        let ossl = native.as_openssl();
        let ks = spec.lease()?;

        let mut secret = Zeroizing::new(vec![0u8; SHARED_SECRET_LEN]);
        let secret_len = len_i32(secret.len())?;
        let code = native.spec_encap(
            &ks,
            None,
            Some(secret.as_mut_slice()),
            0,
            secret_len,
            None,
            0,
            0,
        );
        let len = check(code, Family::Signature, ossl)?;

        let mut ciphertext = vec![0u8; len];
        let out_len = len_i32(ciphertext.len())?;
        let code = native.spec_encap(
            &ks,
            None,
            Some(secret.as_mut_slice()),
            0,
            secret_len,
            Some(ciphertext.as_mut_slice()),
            0,
            out_len,
        );
        let n = check(code, Family::Signature, ossl)?;
        ciphertext.truncate(n);
        Ok(Encapsulated { secret, ciphertext })
    }

    /// Recovers the shared secret from `ciphertext`.
    ///
    /// ML-KEM decapsulation rejects implicitly: a corrupted
    /// ciphertext yields an unrelated secret, not an error.
    pub fn decapsulate(key: &PrivateKey, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        let spec = key.spec();
        check_family(spec.key_type().family())?;
        let native = spec.native();
        let ossl = native.as_openssl();
        let ks = spec.lease()?;

        let in_len = len_i32(ciphertext.len())?;
        let code = native.spec_decap(&ks, None, Some(ciphertext), 0, in_len, None, 0, 0);
        let len = check(code, Family::Signature, ossl)?;

        let mut secret = Zeroizing::new(vec![0u8; len]);
        let out_len = len_i32(secret.len())?;
        let code = native.spec_decap(
            &ks,
            None,
            Some(ciphertext),
            0,
            in_len,
            Some(secret.as_mut_slice()),
            0,
            out_len,
        );
        let n = check(code, Family::Signature, ossl)?;
        secret.truncate(n);
        Ok(secret)
    }
}

fn check_family(family: KeyFamily) -> Result<(), Error> {
    if family == KeyFamily::MlKem {
        Ok(())
    } else {
        Err(Error::InvalidKey("not an ML-KEM key"))
    }
}
