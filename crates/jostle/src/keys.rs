//! Asymmetric keys.
//!
//! A [`KeySpec`] owns a native key object. [`PublicKey`] and
//! [`PrivateKey`] wrap one and compute their encodings on demand
//! through the native ASN.1 codec.
//!
//! A [`PrivateKey`] remembers whether it was built from a seed or
//! from expanded private key material ([`KeyRepr`]). The native
//! codec encodes whatever the key object holds, so decoding and
//! re-encoding preserves the representation.

use core::fmt;
use std::sync::Arc;

use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    error::Error,
    fault::{Family, check, len_i32, translate},
    handle::{NativeRef, Resource},
    ni::{Handle, Lease, Native},
};

/// A family of asymmetric algorithms sharing native entry
/// points.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum KeyFamily {
    /// ML-DSA (FIPS 204).
    MlDsa,
    /// SLH-DSA (FIPS 205).
    SlhDsa,
    /// ML-KEM (FIPS 203).
    MlKem,
}

impl KeyFamily {
    /// Reports whether keys of this family can be regenerated from
    /// a seed that the engine can hand back.
    pub const fn keeps_seed(self) -> bool {
        matches!(self, Self::MlDsa | Self::MlKem)
    }
}

macro_rules! key_types {
    ($(
        $(#[$meta:meta])*
        $name:ident = $id:literal, $family:ident, $seed:literal, $alg:literal, $oid:literal, [$($alias:literal),*];
    )*) => {
        /// A concrete asymmetric algorithm.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[non_exhaustive]
        pub enum KeyType {
            $(
                $(#[$meta])*
                $name,
            )*
        }

        impl KeyType {
            /// Every key type.
            pub const ALL: &[Self] = &[$(Self::$name,)*];

            /// The native key type id.
            pub const fn id(self) -> i32 {
                match self {
                    $(Self::$name => $id,)*
                }
            }

            /// Looks up a native key type id.
            pub const fn from_id(id: i32) -> Option<Self> {
                match id {
                    $($id => Some(Self::$name),)*
                    _ => None,
                }
            }

            /// The algorithm's name.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => $alg,)*
                }
            }

            /// The algorithm's object identifier.
            pub const fn oid(self) -> &'static str {
                match self {
                    $(Self::$name => $oid,)*
                }
            }

            /// The algorithm family.
            pub const fn family(self) -> KeyFamily {
                match self {
                    $(Self::$name => KeyFamily::$family,)*
                }
            }

            /// The length in bytes of a seed.
            pub const fn seed_len(self) -> usize {
                match self {
                    $(Self::$name => $seed,)*
                }
            }

            /// Looks up a name, object identifier, or alias.
            ///
            /// Names are matched without regard to case.
            pub fn from_alias(alias: &str) -> Option<Self> {
                $(
                    if alias.eq_ignore_ascii_case($alg)
                        || alias == $oid
                        $(|| alias.eq_ignore_ascii_case($alias))*
                    {
                        return Some(Self::$name);
                    }
                )*
                None
            }
        }
    };
}

key_types! {
    /// ML-DSA-44.
    MlDsa44 = 1, MlDsa, 32, "ML-DSA-44", "2.16.840.1.101.3.4.3.17", ["MLDSA44", "id-ml-dsa-44"];
    /// ML-DSA-65.
    MlDsa65 = 2, MlDsa, 32, "ML-DSA-65", "2.16.840.1.101.3.4.3.18", ["MLDSA65", "id-ml-dsa-65"];
    /// ML-DSA-87.
    MlDsa87 = 3, MlDsa, 32, "ML-DSA-87", "2.16.840.1.101.3.4.3.19", ["MLDSA87", "id-ml-dsa-87"];
    /// SLH-DSA-SHA2-128f.
    SlhDsaSha2_128f = 5, SlhDsa, 48, "SLH-DSA-SHA2-128f", "2.16.840.1.101.3.4.3.21", ["id-slh-dsa-sha2-128f"];
    /// SLH-DSA-SHA2-128s.
    SlhDsaSha2_128s = 6, SlhDsa, 48, "SLH-DSA-SHA2-128s", "2.16.840.1.101.3.4.3.20", ["id-slh-dsa-sha2-128s"];
    /// SLH-DSA-SHA2-192f.
    SlhDsaSha2_192f = 7, SlhDsa, 72, "SLH-DSA-SHA2-192f", "2.16.840.1.101.3.4.3.23", ["id-slh-dsa-sha2-192f"];
    /// SLH-DSA-SHA2-192s.
    SlhDsaSha2_192s = 8, SlhDsa, 72, "SLH-DSA-SHA2-192s", "2.16.840.1.101.3.4.3.22", ["id-slh-dsa-sha2-192s"];
    /// SLH-DSA-SHA2-256f.
    SlhDsaSha2_256f = 9, SlhDsa, 96, "SLH-DSA-SHA2-256f", "2.16.840.1.101.3.4.3.25", ["id-slh-dsa-sha2-256f"];
    /// SLH-DSA-SHA2-256s.
    SlhDsaSha2_256s = 10, SlhDsa, 96, "SLH-DSA-SHA2-256s", "2.16.840.1.101.3.4.3.24", ["id-slh-dsa-sha2-256s"];
    /// SLH-DSA-SHAKE-128f.
    SlhDsaShake128f = 11, SlhDsa, 48, "SLH-DSA-SHAKE-128f", "2.16.840.1.101.3.4.3.27", ["id-slh-dsa-shake-128f"];
    /// SLH-DSA-SHAKE-128s.
    SlhDsaShake128s = 12, SlhDsa, 48, "SLH-DSA-SHAKE-128s", "2.16.840.1.101.3.4.3.26", ["id-slh-dsa-shake-128s"];
    /// SLH-DSA-SHAKE-192f.
    SlhDsaShake192f = 13, SlhDsa, 72, "SLH-DSA-SHAKE-192f", "2.16.840.1.101.3.4.3.29", ["id-slh-dsa-shake-192f"];
    /// SLH-DSA-SHAKE-192s.
    SlhDsaShake192s = 14, SlhDsa, 72, "SLH-DSA-SHAKE-192s", "2.16.840.1.101.3.4.3.28", ["id-slh-dsa-shake-192s"];
    /// SLH-DSA-SHAKE-256f.
    SlhDsaShake256f = 15, SlhDsa, 96, "SLH-DSA-SHAKE-256f", "2.16.840.1.101.3.4.3.31", ["id-slh-dsa-shake-256f"];
    /// SLH-DSA-SHAKE-256s.
    SlhDsaShake256s = 16, SlhDsa, 96, "SLH-DSA-SHAKE-256s", "2.16.840.1.101.3.4.3.30", ["id-slh-dsa-shake-256s"];
    /// ML-KEM-512.
    MlKem512 = 17, MlKem, 64, "ML-KEM-512", "2.16.840.1.101.3.4.4.1", ["MLKEM512", "id-alg-ml-kem-512"];
    /// ML-KEM-768.
    MlKem768 = 18, MlKem, 64, "ML-KEM-768", "2.16.840.1.101.3.4.4.2", ["MLKEM768", "id-alg-ml-kem-768"];
    /// ML-KEM-1024.
    MlKem1024 = 19, MlKem, 64, "ML-KEM-1024", "2.16.840.1.101.3.4.4.3", ["MLKEM1024", "id-alg-ml-kem-1024"];
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A native key object.
///
/// Clones share the same native object. It is released when the
/// last clone is dropped, or earlier by [`KeySpec::dispose`].
#[derive(Clone)]
pub struct KeySpec {
    inner: Arc<NativeRef>,
    key_type: KeyType,
}

impl KeySpec {
    fn own(native: &Arc<dyn Native>, raw: Handle, key_type: KeyType) -> Result<Self, Error> {
        let inner = NativeRef::new(raw, Resource::KeySpec, "KeySpec", Arc::clone(native))?;
        Ok(Self {
            inner: Arc::new(inner),
            key_type,
        })
    }

    /// Takes ownership of a handle returned together with a fault
    /// code.
    fn own_result(
        native: &Arc<dyn Native>,
        (raw, code): (Handle, i32),
        family: Family,
        key_type: Option<KeyType>,
    ) -> Result<Self, Error> {
        if raw == 0 {
            return Err(if code < 0 {
                translate(code, family, native.as_openssl())
            } else {
                Error::IllegalState("unexpected null pointer from native layer")
            });
        }
        match key_type {
            Some(key_type) => Self::own(native, raw, key_type),
            None => {
                // Own the handle before asking for its name so that
                // it is released on every path.
                let spec = Self::own(native, raw, KeyType::MlDsa44)?;
                let name = {
                    let ks = spec.lease()?;
                    native.spec_name(&ks)
                };
                let key_type = name
                    .as_deref()
                    .and_then(KeyType::from_alias)
                    .ok_or(Error::Unsupported("unknown key type"))?;
                debug!(%key_type, "decoded key");
                Ok(Self {
                    inner: spec.inner,
                    key_type,
                })
            }
        }
    }

    /// Allocates an empty key spec and loads raw key material into
    /// it.
    fn load(
        native: &Arc<dyn Native>,
        key_type: KeyType,
        raw: &[u8],
        private: bool,
    ) -> Result<Self, Error> {
        let spec = Self::own(native, native.spec_allocate(), key_type)?;
        let code = {
            let ks = spec.lease()?;
            let len = len_i32(raw.len())?;
            if private {
                native.key_decode_private(key_type.family(), &ks, key_type.id(), Some(raw), 0, len)
            } else {
                native.key_decode_public(key_type.family(), &ks, key_type.id(), Some(raw), 0, len)
            }
        };
        check(code, Family::Key, native.as_openssl())?;
        Ok(spec)
    }

    /// Generates a new key pair.
    pub fn generate(native: &Arc<dyn Native>, key_type: KeyType) -> Result<Self, Error> {
        let res = native.key_generate(key_type.family(), key_type.id());
        Self::own_result(native, res, Family::Key, Some(key_type))
    }

    /// Regenerates a key pair from `seed`.
    pub fn regenerate_from_seed(
        native: &Arc<dyn Native>,
        key_type: KeyType,
        seed: &[u8],
    ) -> Result<Self, Error> {
        let len = len_i32(seed.len())?;
        let res = native.key_generate_seed(key_type.family(), key_type.id(), Some(seed), len);
        Self::own_result(native, res, Family::Key, Some(key_type))
    }

    /// Parses a DER SubjectPublicKeyInfo.
    pub fn decode_public(native: &Arc<dyn Native>, der: &[u8]) -> Result<Self, Error> {
        let res = native.asn1_from_public_key_info(Some(der), 0, len_i32(der.len())?);
        Self::own_result(native, res, Family::Asn1, None)
    }

    /// Parses a DER PKCS#8 PrivateKeyInfo.
    pub fn decode_private(native: &Arc<dyn Native>, der: &[u8]) -> Result<Self, Error> {
        let res = native.asn1_from_private_key_info(Some(der), 0, len_i32(der.len())?);
        Self::own_result(native, res, Family::Asn1, None)
    }

    /// Encodes the public half as a DER SubjectPublicKeyInfo.
    pub fn encode_public(&self) -> Result<Vec<u8>, Error> {
        self.encode(false)
    }

    /// Encodes the key as a DER PKCS#8 PrivateKeyInfo.
    pub fn encode_private(&self) -> Result<Zeroizing<Vec<u8>>, Error> {
        self.encode(true).map(Zeroizing::new)
    }

    fn encode(&self, private: bool) -> Result<Vec<u8>, Error> {
        let native = self.native();
        // A codec context accumulates output, so each encoding gets
        // a fresh one.
        let ctx = NativeRef::new(
            native.asn1_allocate(),
            Resource::Asn1,
            "ASN1",
            Arc::clone(native),
        )?;
        let ctx = ctx.lease()?;
        let ks = self.lease()?;
        let code = if private {
            native.asn1_encode_private_key(&ctx, &ks)
        } else {
            native.asn1_encode_public_key(&ctx, &ks)
        };
        let len = check(code, Family::Asn1, native.as_openssl())?;
        let mut out = vec![0u8; len];
        let code = native.asn1_get_data(&ctx, Some(out.as_mut_slice()));
        let n = check(code, Family::Asn1, native.as_openssl())?;
        out.truncate(n);
        Ok(out)
    }

    /// Returns the raw public key.
    pub fn public_raw(&self) -> Result<Vec<u8>, Error> {
        self.extract(|native, family, ks, out| native.key_public(family, ks, out))
    }

    /// Returns the raw, expanded private key.
    pub fn private_raw(&self) -> Result<Zeroizing<Vec<u8>>, Error> {
        self.extract(|native, family, ks, out| native.key_private(family, ks, out))
            .map(Zeroizing::new)
    }

    /// Returns the seed the key was generated from, or `None` if
    /// the key does not hold one.
    pub fn seed(&self) -> Result<Option<Zeroizing<Vec<u8>>>, Error> {
        if !self.key_type.family().keeps_seed() {
            return Ok(None);
        }
        match self.extract(|native, family, ks, out| native.key_seed(family, ks, out)) {
            Ok(seed) if !seed.is_empty() => Ok(Some(Zeroizing::new(seed))),
            Ok(_) | Err(Error::Engine(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Runs a length query then a copy.
    fn extract<F>(&self, f: F) -> Result<Vec<u8>, Error>
    where
        F: Fn(&dyn Native, KeyFamily, &Lease<'_>, Option<&mut [u8]>) -> i32,
    {
        let native = self.native();
        let family = self.key_type.family();
        let ks = self.lease()?;
        let len = check(f(&**native, family, &ks, None), Family::Key, native.as_openssl())?;
        let mut out = vec![0u8; len];
        let code = f(&**native, family, &ks, Some(out.as_mut_slice()));
        let n = check(code, Family::Key, native.as_openssl())?;
        out.truncate(n);
        Ok(out)
    }

    /// The key's algorithm.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Releases the native key object now.
    ///
    /// Every clone becomes unusable. Calling it again is a no-op.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Reports whether the native key object has been released.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    pub(crate) fn lease(&self) -> Result<Lease<'_>, Error> {
        self.inner.lease()
    }

    pub(crate) fn native(&self) -> &Arc<dyn Native> {
        self.inner.native()
    }
}

impl fmt::Debug for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySpec")
            .field("key_type", &self.key_type)
            .field("handle", &self.inner.label())
            .finish()
    }
}

/// How a [`PrivateKey`] was constructed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyRepr {
    /// From a seed, which the key retains.
    Seed,
    /// From expanded private key material.
    Raw,
}

/// A public key.
#[derive(Clone, Debug)]
pub struct PublicKey {
    spec: KeySpec,
}

impl PublicKey {
    /// Parses a DER SubjectPublicKeyInfo.
    pub fn decode(native: &Arc<dyn Native>, der: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            spec: KeySpec::decode_public(native, der)?,
        })
    }

    /// Loads a raw public key.
    pub fn from_raw(native: &Arc<dyn Native>, key_type: KeyType, raw: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            spec: KeySpec::load(native, key_type, raw, false)?,
        })
    }

    /// Encodes the key as a DER SubjectPublicKeyInfo.
    pub fn encoded(&self) -> Result<Vec<u8>, Error> {
        self.spec.encode_public()
    }

    /// Returns the raw public key.
    pub fn raw(&self) -> Result<Vec<u8>, Error> {
        self.spec.public_raw()
    }

    /// The key's algorithm.
    pub fn key_type(&self) -> KeyType {
        self.spec.key_type()
    }

    /// The underlying key object.
    pub fn spec(&self) -> &KeySpec {
        &self.spec
    }
}

/// A private key.
#[derive(Clone, Debug)]
pub struct PrivateKey {
    spec: KeySpec,
    repr: KeyRepr,
}

impl PrivateKey {
    /// Regenerates a private key from `seed`.
    pub fn from_seed(native: &Arc<dyn Native>, key_type: KeyType, seed: &[u8]) -> Result<Self, Error> {
        if !key_type.family().keeps_seed() {
            return Err(Error::Unsupported("key type does not keep its seed"));
        }
        if seed.len() != key_type.seed_len() {
            return Err(Error::InvalidArgument("incorrect length for seed"));
        }
        Ok(Self {
            spec: KeySpec::regenerate_from_seed(native, key_type, seed)?,
            repr: KeyRepr::Seed,
        })
    }

    /// Loads expanded private key material.
    pub fn from_raw(native: &Arc<dyn Native>, key_type: KeyType, raw: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            spec: KeySpec::load(native, key_type, raw, true)?,
            repr: KeyRepr::Raw,
        })
    }

    /// Parses a DER PKCS#8 PrivateKeyInfo.
    pub fn decode(native: &Arc<dyn Native>, der: &[u8]) -> Result<Self, Error> {
        let spec = KeySpec::decode_private(native, der)?;
        let repr = if spec.seed()?.is_some() {
            KeyRepr::Seed
        } else {
            KeyRepr::Raw
        };
        Ok(Self { spec, repr })
    }

    /// Encodes the key as a DER PKCS#8 PrivateKeyInfo in its
    /// original representation.
    pub fn encoded(&self) -> Result<Zeroizing<Vec<u8>>, Error> {
        self.spec.encode_private()
    }

    /// Returns a copy of this key that holds only its seed,
    /// dropping any separately loaded expanded material.
    pub fn to_seed_only(&self) -> Result<Self, Error> {
        match self.repr {
            KeyRepr::Seed => {
                let seed = self
                    .seed()?
                    .ok_or(Error::IllegalState("KeySpec represents long form"))?;
                Self::from_seed(self.spec.native(), self.key_type(), &seed)
            }
            KeyRepr::Raw => Err(Error::IllegalState("KeySpec represents long form")),
        }
    }

    /// How the key was constructed.
    pub fn repr(&self) -> KeyRepr {
        self.repr
    }

    /// Returns the seed, if the key holds one.
    pub fn seed(&self) -> Result<Option<Zeroizing<Vec<u8>>>, Error> {
        self.spec.seed()
    }

    /// Returns the expanded private key.
    pub fn raw(&self) -> Result<Zeroizing<Vec<u8>>, Error> {
        self.spec.private_raw()
    }

    /// Returns the matching public key, sharing the key object.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            spec: self.spec.clone(),
        }
    }

    /// The key's algorithm.
    pub fn key_type(&self) -> KeyType {
        self.spec.key_type()
    }

    /// The underlying key object.
    pub fn spec(&self) -> &KeySpec {
        &self.spec
    }
}

/// A freshly generated key pair.
#[derive(Clone, Debug)]
pub struct KeyPair {
    /// The public half.
    pub public: PublicKey,
    /// The private half.
    pub private: PrivateKey,
}

impl KeyPair {
    /// Generates a key pair.
    pub fn generate(native: &Arc<dyn Native>, key_type: KeyType) -> Result<Self, Error> {
        let spec = KeySpec::generate(native, key_type)?;
        let repr = if key_type.family().keeps_seed() {
            KeyRepr::Seed
        } else {
            KeyRepr::Raw
        };
        Ok(Self {
            public: PublicKey { spec: spec.clone() },
            private: PrivateKey { spec, repr },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_ids() {
        for &kt in KeyType::ALL {
            assert_eq!(KeyType::from_id(kt.id()), Some(kt));
            assert_eq!(KeyType::from_alias(kt.name()), Some(kt));
            assert_eq!(KeyType::from_alias(kt.oid()), Some(kt));
        }
        assert_eq!(KeyType::from_id(0), None);
        assert_eq!(KeyType::from_id(4), None);
    }

    #[test]
    fn test_aliases() {
        assert_eq!(KeyType::from_alias("mldsa65"), Some(KeyType::MlDsa65));
        assert_eq!(KeyType::from_alias("ml-kem-768"), Some(KeyType::MlKem768));
        assert_eq!(
            KeyType::from_alias("id-slh-dsa-shake-256s"),
            Some(KeyType::SlhDsaShake256s)
        );
        assert_eq!(KeyType::from_alias("RSA"), None);
    }

    #[test]
    fn test_seed_lengths() {
        assert_eq!(KeyType::MlDsa87.seed_len(), 32);
        assert_eq!(KeyType::MlKem512.seed_len(), 64);
        assert_eq!(KeyType::SlhDsaSha2_192s.seed_len(), 72);
        assert!(!KeyFamily::SlhDsa.keeps_seed());
    }
}
