//! Message digests.
//!
//! A [`MessageDigest`] owns one native digest context. Finishing a
//! digest restarts it, so the same instance can hash any number of
//! messages in turn.
//!
//! [`Digest`] names the digests OpenSSL's default provider ships.
//! [`MessageDigest::from_name`] accepts any name the engine can
//! resolve.

use core::fmt;
use std::{ffi::CString, sync::Arc};

use bytes::Buf;
use tracing::debug;

use crate::{
    error::Error,
    fault::{Family, check, len_i32, translate},
    handle::{NativeRef, Resource},
    ni::{Handle, Native},
};

macro_rules! digests {
    ($(
        $(#[$meta:meta])*
        $name:ident = $alg:literal, $len:literal, $xof:literal, [$($alias:literal),*];
    )*) => {
        /// A digest algorithm.
        #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
        #[non_exhaustive]
        pub enum Digest {
            $(
                $(#[$meta])*
                $name,
            )*
        }

        impl Digest {
            /// Every digest.
            pub const ALL: &[Self] = &[$(Self::$name,)*];

            /// The digest's name as the engine knows it.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => $alg,)*
                }
            }

            /// The output length in bytes. For an extendable output
            /// function it is the length [`MessageDigest::new`]
            /// asks for.
            pub const fn output_len(self) -> usize {
                match self {
                    $(Self::$name => $len,)*
                }
            }

            /// Reports whether the digest is an extendable output
            /// function.
            pub const fn is_xof(self) -> bool {
                match self {
                    $(Self::$name => $xof,)*
                }
            }

            /// Looks up a name, object identifier, or alias.
            ///
            /// Names are matched without regard to case.
            pub fn from_alias(alias: &str) -> Option<Self> {
                $(
                    if alias.eq_ignore_ascii_case($alg)
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

digests! {
    /// SHA-1.
    Sha1 = "SHA1", 20, false, ["SHA-1", "SSL3-SHA1", "1.3.14.3.2.26"];
    /// SHA-224.
    Sha224 = "SHA2-224", 28, false, ["SHA-224", "SHA224", "2.16.840.1.101.3.4.2.4"];
    /// SHA-256.
    #[default]
    Sha256 = "SHA2-256", 32, false, ["SHA-256", "SHA256", "2.16.840.1.101.3.4.2.1"];
    /// SHA-384.
    Sha384 = "SHA2-384", 48, false, ["SHA-384", "SHA384", "2.16.840.1.101.3.4.2.2"];
    /// SHA-512.
    Sha512 = "SHA2-512", 64, false, ["SHA-512", "SHA512", "2.16.840.1.101.3.4.2.3"];
    /// SHA-512/224.
    Sha512_224 = "SHA2-512/224", 28, false, ["SHA-512/224", "SHA512-224", "2.16.840.1.101.3.4.2.5"];
    /// SHA-512/256.
    Sha512_256 = "SHA2-512/256", 32, false, ["SHA-512/256", "SHA512-256", "2.16.840.1.101.3.4.2.6"];
    /// SHA3-224.
    Sha3_224 = "SHA3-224", 28, false, ["2.16.840.1.101.3.4.2.7"];
    /// SHA3-256.
    Sha3_256 = "SHA3-256", 32, false, ["2.16.840.1.101.3.4.2.8"];
    /// SHA3-384.
    Sha3_384 = "SHA3-384", 48, false, ["2.16.840.1.101.3.4.2.9"];
    /// SHA3-512.
    Sha3_512 = "SHA3-512", 64, false, ["2.16.840.1.101.3.4.2.10"];
    /// SHAKE128.
    Shake128 = "SHAKE-128", 32, true, ["SHAKE128", "2.16.840.1.101.3.4.2.11"];
    /// SHAKE256.
    Shake256 = "SHAKE-256", 64, true, ["SHAKE256", "2.16.840.1.101.3.4.2.12"];
    /// BLAKE2s-256.
    Blake2s256 = "BLAKE2S-256", 32, false, ["BLAKE2s256", "1.3.6.1.4.1.1722.12.2.2.8"];
    /// BLAKE2b-512.
    Blake2b512 = "BLAKE2B-512", 64, false, ["BLAKE2b512", "1.3.6.1.4.1.1722.12.2.1.16"];
    /// SM3.
    Sm3 = "SM3", 32, false, ["1.2.156.10197.1.401"];
    /// MD5.
    Md5 = "MD5", 16, false, ["SSL3-MD5", "1.2.840.113549.2.5"];
    /// MD5 and SHA-1 concatenated, as used by SSLv3 and TLS 1.0.
    Md5Sha1 = "MD5-SHA1", 36, false, [];
    /// RIPEMD-160.
    Ripemd160 = "RIPEMD-160", 20, false, ["RIPEMD160", "RIPEMD", "RMD160", "1.3.36.3.2.1"];
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A streaming digest over one native context.
pub struct MessageDigest {
    native: Arc<dyn Native>,
    digest: Option<Digest>,
    output_len: usize,
    handle: NativeRef,
}

impl MessageDigest {
    /// Starts a `digest`.
    ///
    /// An extendable output function produces
    /// [`Digest::output_len`] bytes.
    pub fn new(native: &Arc<dyn Native>, digest: Digest) -> Result<Self, Error> {
        let xof_len = if digest.is_xof() {
            digest.output_len()
        } else {
            0
        };
        Self::allocate(native, digest.name(), xof_len, Some(digest))
    }

    /// Starts an extendable output function that produces `len`
    /// bytes.
    pub fn with_output_len(
        native: &Arc<dyn Native>,
        digest: Digest,
        len: usize,
    ) -> Result<Self, Error> {
        if !digest.is_xof() {
            return Err(Error::InvalidParameter(
                "output length only applies to extendable output functions",
            ));
        }
        if len == 0 {
            return Err(Error::InvalidParameter("output length is zero"));
        }
        Self::allocate(native, digest.name(), len, Some(digest))
    }

    /// Starts the digest the engine knows as `name`.
    ///
    /// A non-zero `xof_len` fixes the output length of an
    /// extendable output function; the engine rejects it for
    /// other digests.
    pub fn from_name(native: &Arc<dyn Native>, name: &str, xof_len: usize) -> Result<Self, Error> {
        Self::allocate(native, name, xof_len, Digest::from_alias(name))
    }

    fn allocate(
        native: &Arc<dyn Native>,
        name: &str,
        xof_len: usize,
        digest: Option<Digest>,
    ) -> Result<Self, Error> {
        let cname =
            CString::new(name).map_err(|_| Error::InvalidArgument("digest name contains NUL"))?;
        let (raw, code): (Handle, i32) = native.md_allocate(Some(&cname), len_i32(xof_len)?);
        if raw == 0 {
            return Err(if code < 0 {
                translate(code, Family::Digest, native.as_openssl())
            } else {
                Error::IllegalState("unexpected null pointer from native layer")
            });
        }
        let handle = NativeRef::new(raw, Resource::Digest, name, Arc::clone(native))?;
        let output_len = {
            let ctx = handle.lease()?;
            check(native.md_digest_len(&ctx), Family::Digest, native.as_openssl())?
        };
        debug!(digest = name, output_len, "started digest");
        Ok(Self {
            native: Arc::clone(native),
            digest,
            output_len,
            handle,
        })
    }

    /// The digest, if it is one of [`Digest::ALL`].
    pub fn digest(&self) -> Option<Digest> {
        self.digest
    }

    /// The number of bytes [`finalize`][Self::finalize] produces.
    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// Feeds `data`.
    pub fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        let ctx = self.handle.lease()?;
        let code = self.native.md_update(&ctx, Some(data), 0, len_i32(data.len())?);
        check(code, Family::Digest, self.native.as_openssl())?;
        Ok(())
    }

    /// Feeds one byte.
    pub fn update_byte(&mut self, b: u8) -> Result<(), Error> {
        let ctx = self.handle.lease()?;
        let code = self.native.md_update_byte(&ctx, b);
        check(code, Family::Digest, self.native.as_openssl())?;
        Ok(())
    }

    /// Feeds every chunk of `src`.
    pub fn update_buf<B: Buf>(&mut self, mut src: B) -> Result<(), Error> {
        while src.has_remaining() {
            let n = {
                let chunk = src.chunk();
                self.update(chunk)?;
                chunk.len()
            };
            src.advance(n);
        }
        Ok(())
    }

    /// Finishes the digest and restarts it.
    pub fn finalize(&mut self) -> Result<Vec<u8>, Error> {
        let mut out = vec![0u8; self.output_len];
        let n = self.finalize_into(&mut out)?;
        out.truncate(n);
        Ok(out)
    }

    /// Finishes the digest into the front of `out` and restarts
    /// it, returning the number of bytes written.
    ///
    /// Fails with [`Error::BufferTooSmall`] if `out` is shorter
    /// than [`output_len`][Self::output_len]; the digest is not
    /// finished in that case.
    pub fn finalize_into(&mut self, out: &mut [u8]) -> Result<usize, Error> {
        let ctx = self.handle.lease()?;
        let out_len = len_i32(out.len())?;
        let code = self.native.md_digest(&ctx, Some(out), 0, out_len);
        let n = check(code, Family::Digest, self.native.as_openssl())?;
        self.native.md_reset(&ctx);
        Ok(n)
    }

    /// Discards everything fed so far.
    pub fn reset(&mut self) -> Result<(), Error> {
        let ctx = self.handle.lease()?;
        self.native.md_reset(&ctx);
        Ok(())
    }

    /// Releases the native context now.
    ///
    /// Calling it again is a no-op. The digest cannot be used
    /// afterwards.
    pub fn dispose(&self) {
        self.handle.dispose();
    }

    /// Reports whether the native context has been released.
    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }
}

impl fmt::Debug for MessageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDigest")
            .field("handle", &self.handle)
            .field("output_len", &self.output_len)
            .finish_non_exhaustive()
    }
}

/// Hashes `data` with `digest` in one call.
pub fn hash(native: &Arc<dyn Native>, digest: Digest, data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut md = MessageDigest::new(native, digest)?;
    md.update(data)?;
    md.finalize()
}
