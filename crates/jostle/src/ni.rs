//! The native call surface.
//!
//! One trait per service family. Every method takes only handles,
//! primitive integers, and flat byte buffers with explicit offsets
//! and lengths, mirroring the native entry points one to one. An
//! absent buffer is `None` and crosses the boundary as a null
//! pointer with a zero size.
//!
//! Return values are raw: `>= 0` is success and `< 0` is a
//! [`FaultCode`](crate::fault::FaultCode). Translation happens in the
//! caller, at the first frame above the call.
//!
//! Handles are `u64`; zero means absent. Live handles are only
//! passed as a [`Lease`], which keeps the owning
//! [`NativeRef`](crate::handle) from releasing them during the call.
//! Releasing a handle is `unsafe`.

use core::ffi::CStr;

pub use crate::handle::Lease;
use crate::keys::KeyFamily;

/// An opaque native handle. Zero means absent.
pub type Handle = u64;

/// Block cipher operations (`BlockCipherNI_*`).
pub trait BlockCipherNi: Send + Sync {
    /// Allocates a context. Returns 0 on failure.
    fn make_instance(&self, cipher: i32, mode: i32, padding: i32) -> Handle;
    /// (Re)initializes `ctx`.
    fn cipher_init(
        &self,
        ctx: &Lease<'_>,
        op_mode: i32,
        key: Option<&[u8]>,
        iv: Option<&[u8]>,
        tag_len: i32,
    ) -> i32;
    /// Returns the block size.
    fn cipher_block_size(&self, ctx: &Lease<'_>) -> i32;
    /// Feeds `input[in_off..in_off + in_len]` as AAD.
    fn cipher_update_aad(&self, ctx: &Lease<'_>, input: Option<&[u8]>, in_off: i32, in_len: i32)
    -> i32;
    /// Processes `input[in_off..in_off + in_len]` into
    /// `output[out_off..]`.
    fn cipher_update(
        &self,
        ctx: &Lease<'_>,
        output: Option<&mut [u8]>,
        out_off: i32,
        input: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32;
    /// Like [`cipher_update`][Self::cipher_update], with input and
    /// output in the same buffer.
    fn cipher_update_in_place(
        &self,
        ctx: &Lease<'_>,
        buf: &mut [u8],
        out_off: i32,
        in_off: i32,
        in_len: i32,
    ) -> i32;
    /// Finishes into `output[out_off..]` and resets `ctx`.
    fn cipher_do_final(&self, ctx: &Lease<'_>, output: Option<&mut [u8]>, out_off: i32) -> i32;
    /// Returns the output size of an update of `len` bytes.
    fn cipher_update_size(&self, ctx: &Lease<'_>, len: i32) -> i32;
    /// Returns the output size of a final call with `len` bytes.
    fn cipher_final_size(&self, ctx: &Lease<'_>, len: i32) -> i32;
    /// Frees `ctx`.
    ///
    /// # Safety
    ///
    /// `ctx` must have come from [`make_instance`][Self::make_instance]
    /// on this engine, must not be in use, and must not be freed
    /// again.
    unsafe fn cipher_dispose(&self, ctx: Handle);
}

/// Key spec operations (`SpecNI_*`).
pub trait SpecNi: Send + Sync {
    /// Allocates an empty key spec.
    fn spec_allocate(&self) -> Handle;
    /// Frees `ks`.
    ///
    /// # Safety
    ///
    /// `ks` must be a key spec handle from this engine, must not be
    /// in use, and must not be freed again.
    unsafe fn spec_dispose(&self, ks: Handle);
    /// Returns the key's algorithm name.
    fn spec_name(&self, ks: &Lease<'_>) -> Option<String>;
    /// Encapsulates to `ks`, writing the secret into `secret` and
    /// the ciphertext into `output`. A `None` output returns the
    /// ciphertext length.
    #[allow(clippy::too_many_arguments)]
    fn spec_encap(
        &self,
        ks: &Lease<'_>,
        opp: Option<&CStr>,
        secret: Option<&mut [u8]>,
        secret_off: i32,
        secret_len: i32,
        output: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32;
    /// Decapsulates `input` with `ks` into `output`. A `None`
    /// output returns the secret length.
    #[allow(clippy::too_many_arguments)]
    fn spec_decap(
        &self,
        ks: &Lease<'_>,
        opp: Option<&CStr>,
        input: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
        output: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32;
}

/// The ASN.1 codec (`ASN1_*`).
pub trait Asn1Ni: Send + Sync {
    /// Allocates a codec context.
    fn asn1_allocate(&self) -> Handle;
    /// Frees `ctx`.
    ///
    /// # Safety
    ///
    /// `ctx` must have come from [`asn1_allocate`][Self::asn1_allocate]
    /// on this engine, must not be in use, and must not be freed
    /// again.
    unsafe fn asn1_dispose(&self, ctx: Handle);
    /// Encodes `ks` as a SubjectPublicKeyInfo, returning its
    /// length.
    fn asn1_encode_public_key(&self, ctx: &Lease<'_>, ks: &Lease<'_>) -> i32;
    /// Encodes `ks` as a PrivateKeyInfo, returning its length.
    fn asn1_encode_private_key(&self, ctx: &Lease<'_>, ks: &Lease<'_>) -> i32;
    /// Copies the encoding out. `output` must be exactly the
    /// encoding's length. `None` returns the length.
    fn asn1_get_data(&self, ctx: &Lease<'_>, output: Option<&mut [u8]>) -> i32;
    /// Parses a PrivateKeyInfo. The second value is the fault
    /// code when the handle is 0.
    fn asn1_from_private_key_info(
        &self,
        input: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> (Handle, i32);
    /// Parses a SubjectPublicKeyInfo. The second value is the
    /// fault code when the handle is 0.
    fn asn1_from_public_key_info(
        &self,
        input: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> (Handle, i32);
}

/// Key pair operations (`MLDSA_*`, `MLKEM_*`, `SLH_DSA_*`).
pub trait KeyNi: Send + Sync {
    /// Generates a key pair. The second value is the fault code
    /// when the handle is 0.
    fn key_generate(&self, family: KeyFamily, key_type: i32) -> (Handle, i32);
    /// Derives a key pair from `seed[..seed_len]`.
    fn key_generate_seed(
        &self,
        family: KeyFamily,
        key_type: i32,
        seed: Option<&[u8]>,
        seed_len: i32,
    ) -> (Handle, i32);
    /// Copies the raw public key out. `None` returns the length.
    fn key_public(&self, family: KeyFamily, ks: &Lease<'_>, output: Option<&mut [u8]>) -> i32;
    /// Copies the raw private key out. `None` returns the length.
    fn key_private(&self, family: KeyFamily, ks: &Lease<'_>, output: Option<&mut [u8]>) -> i32;
    /// Copies the seed out. `None` returns the length.
    fn key_seed(&self, family: KeyFamily, ks: &Lease<'_>, output: Option<&mut [u8]>) -> i32;
    /// Loads a raw public key into `ks`.
    fn key_decode_public(
        &self,
        family: KeyFamily,
        ks: &Lease<'_>,
        key_type: i32,
        input: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32;
    /// Loads a raw private key into `ks`.
    fn key_decode_private(
        &self,
        family: KeyFamily,
        ks: &Lease<'_>,
        key_type: i32,
        input: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32;
}

/// Per-family signer parameters, as native integers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignerParams {
    /// ML-DSA.
    MlDsa {
        /// The mu mode.
        mu_mode: i32,
    },
    /// SLH-DSA.
    SlhDsa {
        /// The message encoding.
        message_encoding: i32,
        /// Whether signing is deterministic.
        deterministic: i32,
    },
}

impl SignerParams {
    /// The key family the parameters belong to.
    pub const fn family(self) -> KeyFamily {
        match self {
            Self::MlDsa { .. } => KeyFamily::MlDsa,
            Self::SlhDsa { .. } => KeyFamily::SlhDsa,
        }
    }
}

/// Signature operations (`MLDSA_*` and `SLH_DSA_*` signers).
pub trait SignerNi: Send + Sync {
    /// Allocates a signer. Returns 0 on failure.
    fn signer_allocate(&self, family: KeyFamily) -> Handle;
    /// Frees `ctx`.
    ///
    /// # Safety
    ///
    /// `ctx` must have come from
    /// [`signer_allocate`][Self::signer_allocate] with the same
    /// `family` on this engine, must not be in use, and must not be
    /// freed again.
    unsafe fn signer_dispose(&self, family: KeyFamily, ctx: Handle);
    /// Prepares `ctx` to sign with `ks`.
    fn signer_init_sign(
        &self,
        ctx: &Lease<'_>,
        ks: &Lease<'_>,
        context: Option<&[u8]>,
        context_len: i32,
        params: SignerParams,
    ) -> i32;
    /// Prepares `ctx` to verify with `ks`.
    fn signer_init_verify(
        &self,
        ctx: &Lease<'_>,
        ks: &Lease<'_>,
        context: Option<&[u8]>,
        context_len: i32,
        params: SignerParams,
    ) -> i32;
    /// Feeds message bytes.
    fn signer_update(
        &self,
        family: KeyFamily,
        ctx: &Lease<'_>,
        input: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32;
    /// Signs into `output[out_off..]`. `None` returns the
    /// signature length.
    fn signer_sign(
        &self,
        family: KeyFamily,
        ctx: &Lease<'_>,
        output: Option<&mut [u8]>,
        out_off: i32,
    ) -> i32;
    /// Verifies `sig[..sig_len]`: 0 if valid, -1 if not.
    fn signer_verify(&self, family: KeyFamily, ctx: &Lease<'_>, sig: Option<&[u8]>, sig_len: i32)
    -> i32;
}

/// Key derivation (`KDF_*`).
pub trait KdfNi: Send + Sync {
    /// PBKDF2 with the HMAC digest named by `digest`.
    #[allow(clippy::too_many_arguments)]
    fn pbkdf2(
        &self,
        password: Option<&[u8]>,
        salt: Option<&[u8]>,
        iter: i32,
        digest: Option<&[u8]>,
        output: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32;
    /// scrypt.
    #[allow(clippy::too_many_arguments)]
    fn scrypt(
        &self,
        password: Option<&[u8]>,
        salt: Option<&[u8]>,
        n: i32,
        r: i32,
        p: i32,
        output: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32;
}

/// Message digests (`MD_*`).
pub trait DigestNi: Send + Sync {
    /// Allocates a digest context for the digest OpenSSL knows as
    /// `name`. A positive `xof_len` fixes the output length of an
    /// extendable output function. The second value is the fault
    /// code when the handle is 0.
    fn md_allocate(&self, name: Option<&CStr>, xof_len: i32) -> (Handle, i32);
    /// Frees `ctx`.
    ///
    /// # Safety
    ///
    /// `ctx` must have come from [`md_allocate`][Self::md_allocate]
    /// on this engine, must not be in use, and must not be freed
    /// again.
    unsafe fn md_dispose(&self, ctx: Handle);
    /// Feeds one byte.
    fn md_update_byte(&self, ctx: &Lease<'_>, b: u8) -> i32;
    /// Feeds `input[in_off..in_off + in_len]`.
    fn md_update(&self, ctx: &Lease<'_>, input: Option<&[u8]>, in_off: i32, in_len: i32) -> i32;
    /// Returns the digest length.
    fn md_digest_len(&self, ctx: &Lease<'_>) -> i32;
    /// Writes the digest into `output[out_off..out_off + out_len]`,
    /// returning its length. `None` returns the length without
    /// finishing.
    fn md_digest(&self, ctx: &Lease<'_>, output: Option<&mut [u8]>, out_off: i32, out_len: i32)
    -> i32;
    /// Discards any input and starts a new digest.
    fn md_reset(&self, ctx: &Lease<'_>);
}

/// OpenSSL library access.
pub trait OpenSslNi: Send + Sync {
    /// Drains the OpenSSL error queue.
    fn openssl_errors(&self) -> Option<String>;
    /// Returns the OpenSSL version string.
    fn openssl_version(&self) -> Option<String>;
    /// Loads the named provider.
    fn set_openssl_module(&self, name: Option<&CStr>) -> i32;
    /// Reports whether the engine is usable.
    fn is_native_available(&self) -> bool;
}

/// Every service family.
pub trait Native:
    BlockCipherNi + SpecNi + Asn1Ni + KeyNi + SignerNi + KdfNi + DigestNi + OpenSslNi
{
    /// Upcasts to the error queue used by fault translation.
    fn as_openssl(&self) -> &dyn OpenSslNi;
}

impl<T> Native for T
where
    T: BlockCipherNi + SpecNi + Asn1Ni + KeyNi + SignerNi + KdfNi + DigestNi + OpenSslNi,
{
    fn as_openssl(&self) -> &dyn OpenSslNi {
        self
    }
}
