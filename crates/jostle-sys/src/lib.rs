//! Raw declarations of the Jostle native interface.
//!
//! Every entry point of `libinterface_ffi` is declared exactly once,
//! in [`native_api!`] below. The list expands to:
//!
//! - an `extern "C"` block (feature `linked`), bound by the linker;
//! - [`Api`], a table of function pointers that can be filled from
//!   the `extern` block ([`Api::linked`]) or by resolving each symbol
//!   at runtime ([`Api::resolve`]).
//!
//! Both paths share one list, so symbol names and parameter order
//! cannot drift apart.
//!
//! Integer return values follow one convention: `>= 0` is success
//! (often a length), `< 0` is a fault code.

#![cfg_attr(not(test), no_std)]
#![allow(non_snake_case)]
#![warn(missing_docs)]

use core::{
    ffi::{CStr, c_char, c_void},
    ptr::NonNull,
};

/// An opaque `block_cipher_ctx`.
pub type BlockCipherCtx = c_void;
/// An opaque `key_spec`.
pub type KeySpec = c_void;
/// An opaque `asn1_ctx`.
pub type Asn1Ctx = c_void;
/// An opaque ML-DSA signer context.
pub type MlDsaCtx = c_void;
/// An opaque SLH-DSA signer context.
pub type SlhDsaCtx = c_void;
/// An opaque `md_ctx`.
pub type MdCtx = c_void;

const fn cstr(s: &'static str) -> &'static CStr {
    match CStr::from_bytes_with_nul(s.as_bytes()) {
        Ok(s) => s,
        #[allow(clippy::panic)]
        Err(_) => panic!("symbol name is not NUL terminated"),
    }
}

macro_rules! native_api {
    (
        $(
            $(#[$meta:meta])*
            fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?;
        )*
    ) => {
        #[cfg(feature = "linked")]
        #[link(name = "interface_ffi")]
        unsafe extern "C" {
            $(
                $(#[$meta])*
                pub fn $name($($arg: $ty),*) $(-> $ret)?;
            )*
        }

        /// Every entry point of the native interface.
        #[derive(Copy, Clone)]
        pub struct Api {
            $(
                $(#[$meta])*
                pub $name: unsafe extern "C" fn($($ty),*) $(-> $ret)?,
            )*
        }

        impl core::fmt::Debug for Api {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_struct("Api").finish_non_exhaustive()
            }
        }

        impl Api {
            /// The name of every symbol in [`Api`], in declaration
            /// order.
            pub const SYMBOLS: &[&CStr] = &[
                $(cstr(concat!(stringify!($name), "\0")),)*
            ];

            /// Binds every entry point through `lookup`, stopping at
            /// the first symbol it cannot find.
            ///
            /// # Safety
            ///
            /// - For each name, `lookup` must return the address of a
            ///   function whose signature matches its declaration.
            /// - The addresses must remain valid for as long as the
            ///   returned [`Api`] is used.
            pub unsafe fn resolve<E>(
                mut lookup: impl FnMut(&'static CStr) -> Result<NonNull<c_void>, E>,
            ) -> Result<Self, E> {
                Ok(Self {
                    $(
                        $name: {
                            let sym = lookup(cstr(concat!(stringify!($name), "\0")))?;
                            // SAFETY: the caller guarantees the
                            // signature matches.
                            unsafe {
                                core::mem::transmute::<
                                    *mut c_void,
                                    unsafe extern "C" fn($($ty),*) $(-> $ret)?,
                                >(sym.as_ptr())
                            }
                        },
                    )*
                })
            }

            /// Binds every entry point to the `extern` block.
            #[cfg(feature = "linked")]
            pub fn linked() -> Self {
                Self {
                    $($name,)*
                }
            }
        }
    };
}

native_api! {
    /// Allocates a block cipher context. Returns 0 on failure.
    fn BlockCipherNI_make_instance(cipher: i32, mode: i32, padding: i32) -> u64;
    /// (Re)initializes a block cipher context.
    fn BlockCipherNI_init(
        r: u64,
        opp_mode: i32,
        key: *mut u8,
        key_size: usize,
        iv: *mut u8,
        iv_size: usize,
        tag_len: i32,
    ) -> i32;
    /// Returns the cipher's block size.
    fn BlockCipherNI_getBlockSize(r: u64) -> i32;
    /// Feeds additional authenticated data.
    fn BlockCipherNI_updateAAD(r: u64, input: *mut u8, input_size: usize, in_off: i32, in_len: i32) -> i32;
    /// Processes `in_len` bytes. `input` and `output` may be the same
    /// buffer.
    fn BlockCipherNI_update(
        r: u64,
        output: *mut u8,
        output_size: usize,
        out_off: i32,
        input: *mut u8,
        input_size: usize,
        in_off: i32,
        in_len: i32,
    ) -> i32;
    /// Finishes the operation and resets the context.
    fn BlockCipherNI_doFinal(ctx: *mut BlockCipherCtx, output: *mut u8, output_size: usize, out_off: i32) -> i32;
    /// Returns the output size of an update of `len` bytes.
    fn BlockCipherNI_getUpdateSize(ctx: *mut BlockCipherCtx, len: i32) -> i32;
    /// Returns the output size of a final call with `len` bytes.
    fn BlockCipherNI_getFinalSize(ctx: *mut BlockCipherCtx, len: i32) -> i32;
    /// Frees a block cipher context.
    fn BlockCipherNI_dispose(ctx: *mut BlockCipherCtx);

    /// Allocates an empty key spec.
    fn SpecNI_allocateKeySpec() -> *mut KeySpec;
    /// Frees a key spec.
    fn SpecNI_disposeKeySpec(ks: *mut KeySpec);
    /// Returns the key's algorithm name, borrowed from the key.
    fn SpecNI_GetName(ks: *mut KeySpec, len: *mut usize) -> *const c_char;
    /// KEM encapsulation. With a null `output`, returns the
    /// ciphertext length.
    fn SpecNI_Encap(
        ks: *mut KeySpec,
        opp: *const c_char,
        input: *mut u8,
        input_size: usize,
        in_off: i32,
        in_len: i32,
        output: *mut u8,
        output_size: usize,
        out_off: i32,
        out_len: i32,
    ) -> i32;
    /// KEM decapsulation. With a null `output`, returns the secret
    /// length.
    fn SpecNI_Decap(
        ks: *mut KeySpec,
        opp: *const c_char,
        input: *mut u8,
        input_size: usize,
        in_off: i32,
        in_len: i32,
        output: *mut u8,
        output_size: usize,
        out_off: i32,
        out_len: i32,
    ) -> i32;

    /// Allocates a codec context.
    fn ASN1_allocate() -> *mut Asn1Ctx;
    /// Frees a codec context.
    fn ASN1_dispose(ctx: *mut Asn1Ctx);
    /// Encodes `ks` as a SubjectPublicKeyInfo; returns its length.
    fn ASN1_encodePublicKey(ctx: *mut Asn1Ctx, ks: *mut KeySpec) -> i32;
    /// Encodes `ks` as a PKCS#8 PrivateKeyInfo; returns its length.
    fn ASN1_encodePrivateKey(ctx: *mut Asn1Ctx, ks: *mut KeySpec) -> i32;
    /// Copies the last encoding out. With a null `output`, returns
    /// its length.
    fn ASN1_getData(ctx: *mut Asn1Ctx, output: *mut u8, output_len: usize) -> i32;
    /// Parses a PKCS#8 PrivateKeyInfo.
    fn ASN1_fromPrivateKeyInfo(input: *mut u8, input_size: usize, in_off: i32, in_len: i32, ret: *mut i32) -> *mut KeySpec;
    /// Parses a SubjectPublicKeyInfo.
    fn ASN1_fromPublicKeyInfo(input: *mut u8, input_size: usize, in_off: i32, in_len: i32, ret: *mut i32) -> *mut KeySpec;

    /// Generates an ML-DSA key pair.
    fn MLDSA_generateKeyPair(key_type: i32, ret: *mut i32) -> *mut KeySpec;
    /// Derives an ML-DSA key pair from a seed.
    fn MLDSA_generateKeyPairSeed(key_type: i32, ret: *mut i32, seed: *mut u8, seed_size: usize, seed_len: i32) -> *mut KeySpec;
    /// Copies the raw public key out.
    fn MLDSA_getPublicKey(ks: *mut KeySpec, output: *mut u8, output_len: usize) -> i32;
    /// Copies the raw private key out.
    fn MLDSA_getPrivateKey(ks: *mut KeySpec, output: *mut u8, output_len: usize) -> i32;
    /// Copies the seed out.
    fn MLDSA_getSeed(ks: *mut KeySpec, output: *mut u8, output_len: usize) -> i32;
    /// Loads a raw public key into `ks`.
    fn MLDSA_decodePublicKey(ks: *mut KeySpec, key_type: i32, input: *mut u8, input_size: usize, in_off: i32, in_len: i32) -> i32;
    /// Loads a raw private key into `ks`.
    fn MLDSA_decodePrivateKey(ks: *mut KeySpec, key_type: i32, input: *mut u8, input_size: usize, in_off: i32, in_len: i32) -> i32;
    /// Allocates an ML-DSA signer.
    fn MLDSA_allocateSigner() -> *mut MlDsaCtx;
    /// Frees an ML-DSA signer.
    fn MLDSA_disposeSigner(ctx: *mut MlDsaCtx);
    /// Prepares to verify with `ks`.
    fn MLDSA_initVerifier(
        ctx: *mut MlDsaCtx,
        ks: *mut KeySpec,
        context: *mut u8,
        context_size: usize,
        context_len: i32,
        mu_mode: i32,
    ) -> i32;
    /// Prepares to sign with `ks`.
    fn MLDSA_initSign(
        ctx: *mut MlDsaCtx,
        ks: *mut KeySpec,
        context: *mut u8,
        context_size: usize,
        context_len: i32,
        mu_mode: i32,
    ) -> i32;
    /// Feeds message bytes.
    fn MLDSA_update(ctx: *mut MlDsaCtx, input: *mut u8, input_size: usize, in_off: i32, in_len: i32) -> i32;
    /// Signs. With a null `output`, returns the signature length.
    fn MLDSA_sign(ctx: *mut MlDsaCtx, output: *mut u8, output_size: usize, out_off: i32) -> i32;
    /// Returns 0 if `sig` verifies, -1 if it does not.
    fn MLDSA_verify(ctx: *mut MlDsaCtx, sig: *mut u8, sig_size: usize, sig_len: i32) -> i32;

    /// Generates an ML-KEM key pair.
    fn MLKEM_generateKeyPair(key_type: i32, ret: *mut i32) -> *mut KeySpec;
    /// Derives an ML-KEM key pair from a seed.
    fn MLKEM_generateKeyPairSeed(key_type: i32, ret: *mut i32, seed: *mut u8, seed_size: usize, seed_len: i32) -> *mut KeySpec;
    /// Copies the raw public key out.
    fn MLKEM_getPublicKey(ks: *mut KeySpec, output: *mut u8, output_len: usize) -> i32;
    /// Copies the raw private key out.
    fn MLKEM_getPrivateKey(ks: *mut KeySpec, output: *mut u8, output_len: usize) -> i32;
    /// Copies the seed out.
    fn MLKEM_getSeed(ks: *mut KeySpec, output: *mut u8, output_len: usize) -> i32;
    /// Loads a raw public key into `ks`.
    fn MLKEM_decodePublicKey(ks: *mut KeySpec, key_type: i32, input: *mut u8, input_size: usize, in_off: i32, in_len: i32) -> i32;
    /// Loads a raw private key into `ks`.
    fn MLKEM_decodePrivateKey(ks: *mut KeySpec, key_type: i32, input: *mut u8, input_size: usize, in_off: i32, in_len: i32) -> i32;

    /// Generates an SLH-DSA key pair.
    fn SLH_DSA_generateKeyPair(key_type: i32, ret: *mut i32) -> *mut KeySpec;
    /// Derives an SLH-DSA key pair from a seed.
    fn SLH_DSA_generateKeyPairSeed(key_type: i32, ret: *mut i32, seed: *mut u8, seed_size: usize, seed_len: i32) -> *mut KeySpec;
    /// Copies the raw public key out.
    fn SLH_DSA_getPublicKey(ks: *mut KeySpec, output: *mut u8, output_len: usize) -> i32;
    /// Copies the raw private key out.
    fn SLH_DSA_getPrivateKey(ks: *mut KeySpec, output: *mut u8, output_len: usize) -> i32;
    /// Loads a raw public key into `ks`.
    fn SLH_DSA_decodePublicKey(ks: *mut KeySpec, key_type: i32, input: *mut u8, input_size: usize, in_off: i32, in_len: i32) -> i32;
    /// Loads a raw private key into `ks`.
    fn SLH_DSA_decodePrivateKey(ks: *mut KeySpec, key_type: i32, input: *mut u8, input_size: usize, in_off: i32, in_len: i32) -> i32;
    /// Allocates an SLH-DSA signer.
    fn SLH_DSA_allocateSigner() -> *mut SlhDsaCtx;
    /// Frees an SLH-DSA signer.
    fn SLH_DSA_disposeSigner(ctx: *mut SlhDsaCtx);
    /// Prepares to verify with `ks`.
    fn SLH_DSA_initVerifier(
        ctx: *mut SlhDsaCtx,
        ks: *mut KeySpec,
        context: *mut u8,
        context_size: usize,
        context_len: i32,
        message_encoding: i32,
        deterministic: i32,
    ) -> i32;
    /// Prepares to sign with `ks`.
    fn SLH_DSA_initSign(
        ctx: *mut SlhDsaCtx,
        ks: *mut KeySpec,
        context: *mut u8,
        context_size: usize,
        context_len: i32,
        message_encoding: i32,
        deterministic: i32,
    ) -> i32;
    /// Feeds message bytes.
    fn SLH_DSA_update(ctx: *mut SlhDsaCtx, input: *mut u8, input_size: usize, in_off: i32, in_len: i32) -> i32;
    /// Signs. With a null `output`, returns the signature length.
    fn SLH_DSA_sign(ctx: *mut SlhDsaCtx, output: *mut u8, output_size: usize, out_off: i32) -> i32;
    /// Returns 0 if `sig` verifies, -1 if it does not.
    fn SLH_DSA_verify(ctx: *mut SlhDsaCtx, sig: *mut u8, sig_size: usize, sig_len: i32) -> i32;

    /// PBKDF2 with the HMAC digest named by `digest`.
    fn KDF_PBKDF2(
        password: *mut u8,
        password_len: usize,
        salt: *mut u8,
        salt_len: usize,
        iter: i32,
        digest: *mut u8,
        digest_len: usize,
        output: *mut u8,
        output_size: usize,
        out_off: i32,
        out_len: i32,
    ) -> i32;
    /// scrypt.
    fn KDF_SCRYPT(
        password: *mut u8,
        password_len: usize,
        salt: *mut u8,
        salt_len: usize,
        n: i32,
        r: i32,
        p: i32,
        output: *mut u8,
        output_size: usize,
        out_off: i32,
        out_len: i32,
    ) -> i32;

    /// Allocates a digest context for `name`. A positive `xof_len`
    /// sets the output length of an XOF. On failure returns null
    /// and sets `err`.
    fn MD_Allocate(name: *const c_char, xof_len: i32, err: *mut i32) -> *mut MdCtx;
    /// Frees a digest context.
    fn MD_Dispose(ctx: *mut MdCtx);
    /// Feeds one byte.
    fn MB_UpdateByte(ctx: *mut MdCtx, b: u8) -> i32;
    /// Feeds `in_len` bytes from `in_off`.
    fn MB_UpdateBytes(ctx: *mut MdCtx, input: *mut u8, input_size: usize, in_off: i32, in_len: i32) -> i32;
    /// Returns the digest length.
    fn MD_GetDigestLen(ctx: *mut MdCtx) -> i32;
    /// Finishes the digest into `output`. A null `output` returns
    /// the digest length.
    fn MB_Digest(ctx: *mut MdCtx, output: *mut u8, output_size: usize, out_off: i32, out_len: i32) -> i32;
    /// Restarts the digest.
    fn MD_Reset(ctx: *mut MdCtx);

    /// Loads the named OpenSSL provider.
    fn set_openssl_module(prov_name: *const c_char) -> i32;
    /// Drains the OpenSSL error queue into a newly allocated string.
    /// Free it with `ffi_free_unsecure_null_safe`.
    fn get_ossl_errors(len: *mut u64) -> *mut c_char;
    /// Returns the OpenSSL version string.
    fn openssl_library_version(len: *mut usize) -> *const c_char;
    /// Returns non-zero once the engine is usable.
    fn is_native_available() -> i32;
    /// Frees memory returned by the engine. Accepts null.
    fn ffi_free_unsecure_null_safe(ptr: *mut c_void);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_names() {
        assert_eq!(Api::SYMBOLS.len(), 69);
        assert_eq!(Api::SYMBOLS[0], c"BlockCipherNI_make_instance");
        assert!(Api::SYMBOLS.contains(&c"SpecNI_GetName"));
        assert!(Api::SYMBOLS.contains(&c"ffi_free_unsecure_null_safe"));
        assert!(Api::SYMBOLS.contains(&c"MB_UpdateBytes"));
    }

    #[test]
    fn test_resolve_stops_at_first_missing() {
        let mut seen = 0usize;
        // SAFETY: no symbol is ever returned.
        let res = unsafe {
            Api::resolve(|name| {
                seen += 1;
                Err::<NonNull<c_void>, _>(name)
            })
        };
        assert_eq!(res.err(), Some(c"BlockCipherNI_make_instance"));
        assert_eq!(seen, 1);
    }
}
