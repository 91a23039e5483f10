//! The native engine, reached through `jostle-sys`.
//!
//! [`Ffi`] implements every service trait on top of a
//! [`jostle_sys::Api`] table. The table is bound in one of two
//! ways:
//!
//! - [`Ffi::linked`] (feature `linked`): straight to the `extern`
//!   block, resolved by the linker.
//! - [`Ffi::load`]: each symbol looked up once with `dlsym` in a
//!   library opened at runtime.
//!
//! Buffers are passed as (pointer, size) pairs without copying.
//! `None` becomes a null pointer and a zero size.

mod dynamic;
#[cfg(feature = "linked")]
mod linked;

use core::{
    ffi::{CStr, c_char, c_void},
    fmt, ptr, slice,
};

use jostle_dl::Library;
use jostle_sys::Api;

use crate::{
    config::Interface,
    fault::FaultCode,
    keys::KeyFamily,
    ni::{
        Asn1Ni, BlockCipherNi, DigestNi, Handle, KdfNi, KeyNi, Lease, OpenSslNi, SignerNi,
        SignerParams, SpecNi,
    },
};

/// The native engine.
pub struct Ffi {
    api: Api,
    interface: Interface,
    // Keeps the symbols in `api` mapped.
    _libs: Vec<Library>,
}

impl Ffi {
    /// How the symbols were bound.
    pub fn interface(&self) -> Interface {
        self.interface
    }
}

impl fmt::Debug for Ffi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ffi")
            .field("interface", &self.interface)
            .field("libs", &self._libs)
            .finish_non_exhaustive()
    }
}

/// A read-only buffer as a native (pointer, size) pair.
///
/// The engine never writes through input pointers.
fn input(buf: Option<&[u8]>) -> (*mut u8, usize) {
    match buf {
        Some(buf) => (buf.as_ptr().cast_mut(), buf.len()),
        None => (ptr::null_mut(), 0),
    }
}

/// A writable buffer as a native (pointer, size) pair.
fn output(buf: Option<&mut [u8]>) -> (*mut u8, usize) {
    match buf {
        Some(buf) => (buf.as_mut_ptr(), buf.len()),
        None => (ptr::null_mut(), 0),
    }
}

fn to_ptr(raw: Handle) -> *mut c_void {
    ptr::with_exposed_provenance_mut(raw as usize)
}

fn lease_ptr(lease: &Lease<'_>) -> *mut c_void {
    to_ptr(lease.raw())
}

fn to_handle(p: *mut c_void) -> Handle {
    p.expose_provenance() as u64
}

/// Copies a NUL terminated string out of the engine.
///
/// # Safety
///
/// `p` must be null or point to a NUL terminated string.
unsafe fn copy_str(p: *const c_char) -> Option<String> {
    if p.is_null() {
        return None;
    }
    // SAFETY: See the function's safety contract.
    let s = unsafe { CStr::from_ptr(p) };
    Some(s.to_string_lossy().into_owned())
}

const WRONG_FAMILY: i32 = FaultCode::InvalidKeyType.code();

impl BlockCipherNi for Ffi {
    fn make_instance(&self, cipher: i32, mode: i32, padding: i32) -> Handle {
        // SAFETY: FFI call, no invariants.
        unsafe { (self.api.BlockCipherNI_make_instance)(cipher, mode, padding) }
    }

    fn cipher_init(
        &self,
        ctx: &Lease<'_>,
        op_mode: i32,
        key: Option<&[u8]>,
        iv: Option<&[u8]>,
        tag_len: i32,
    ) -> i32 {
        let (key, key_size) = input(key);
        let (iv, iv_size) = input(iv);
        // SAFETY: FFI call, `ctx` is leased and each buffer is
        // valid for its size.
        unsafe {
            (self.api.BlockCipherNI_init)(ctx.raw(), op_mode, key, key_size, iv, iv_size, tag_len)
        }
    }

    fn cipher_block_size(&self, ctx: &Lease<'_>) -> i32 {
        // SAFETY: FFI call, `ctx` is leased.
        unsafe { (self.api.BlockCipherNI_getBlockSize)(ctx.raw()) }
    }

    fn cipher_update_aad(
        &self,
        ctx: &Lease<'_>,
        aad: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let (aad, aad_size) = input(aad);
        // SAFETY: FFI call, `ctx` is leased and `aad` is valid for
        // its size.
        unsafe { (self.api.BlockCipherNI_updateAAD)(ctx.raw(), aad, aad_size, in_off, in_len) }
    }

    fn cipher_update(
        &self,
        ctx: &Lease<'_>,
        out: Option<&mut [u8]>,
        out_off: i32,
        inp: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let (out, out_size) = output(out);
        let (inp, in_size) = input(inp);
        // SAFETY: FFI call, `ctx` is leased and each buffer is
        // valid for its size. `out` and `inp` come from distinct
        // borrows, so they do not overlap.
        unsafe {
            (self.api.BlockCipherNI_update)(
                ctx.raw(),
                out,
                out_size,
                out_off,
                inp,
                in_size,
                in_off,
                in_len,
            )
        }
    }

    fn cipher_update_in_place(
        &self,
        ctx: &Lease<'_>,
        buf: &mut [u8],
        out_off: i32,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let size = buf.len();
        let p = buf.as_mut_ptr();
        // SAFETY: FFI call, `ctx` is leased and `buf` is valid for
        // `size` bytes. The engine supports input and output in the
        // same buffer when the regions coincide or are disjoint,
        // which the caller ensures.
        unsafe {
            (self.api.BlockCipherNI_update)(ctx.raw(), p, size, out_off, p, size, in_off, in_len)
        }
    }

    fn cipher_do_final(&self, ctx: &Lease<'_>, out: Option<&mut [u8]>, out_off: i32) -> i32 {
        let (out, out_size) = output(out);
        // SAFETY: FFI call, `ctx` is leased and `out` is valid for
        // its size.
        unsafe { (self.api.BlockCipherNI_doFinal)(lease_ptr(ctx), out, out_size, out_off) }
    }

    fn cipher_update_size(&self, ctx: &Lease<'_>, len: i32) -> i32 {
        // SAFETY: FFI call, `ctx` is leased.
        unsafe { (self.api.BlockCipherNI_getUpdateSize)(lease_ptr(ctx), len) }
    }

    fn cipher_final_size(&self, ctx: &Lease<'_>, len: i32) -> i32 {
        // SAFETY: FFI call, `ctx` is leased.
        unsafe { (self.api.BlockCipherNI_getFinalSize)(lease_ptr(ctx), len) }
    }

    unsafe fn cipher_dispose(&self, ctx: Handle) {
        // SAFETY: FFI call, the caller guarantees `ctx` is a live
        // context released exactly once.
        unsafe { (self.api.BlockCipherNI_dispose)(to_ptr(ctx)) }
    }
}

impl SpecNi for Ffi {
    fn spec_allocate(&self) -> Handle {
        // SAFETY: FFI call, no invariants.
        to_handle(unsafe { (self.api.SpecNI_allocateKeySpec)() })
    }

    unsafe fn spec_dispose(&self, ks: Handle) {
        // SAFETY: FFI call, the caller guarantees `ks` is a live
        // key spec released exactly once.
        unsafe { (self.api.SpecNI_disposeKeySpec)(to_ptr(ks)) }
    }

    fn spec_name(&self, ks: &Lease<'_>) -> Option<String> {
        let mut len = 0usize;
        // SAFETY: FFI call, `ks` is leased and `len` is valid.
        let name = unsafe { (self.api.SpecNI_GetName)(lease_ptr(ks), &mut len) };
        if name.is_null() {
            return None;
        }
        // SAFETY: the engine returned `len` readable bytes owned by
        // `ks`, which is still leased.
        let name = unsafe { slice::from_raw_parts(name.cast::<u8>(), len) };
        let name = name.split(|&b| b == 0).next().unwrap_or_default();
        Some(String::from_utf8_lossy(name).into_owned())
    }

    fn spec_encap(
        &self,
        ks: &Lease<'_>,
        opp: Option<&CStr>,
        secret: Option<&mut [u8]>,
        secret_off: i32,
        secret_len: i32,
        out: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32 {
        let opp = opp.map_or(ptr::null(), CStr::as_ptr);
        let (secret, secret_size) = output(secret);
        let (out, out_size) = output(out);
        // SAFETY: FFI call, `ks` is leased, `opp` is null or NUL
        // terminated, and each buffer is valid for its size.
        unsafe {
            (self.api.SpecNI_Encap)(
                lease_ptr(ks),
                opp,
                secret,
                secret_size,
                secret_off,
                secret_len,
                out,
                out_size,
                out_off,
                out_len,
            )
        }
    }

    fn spec_decap(
        &self,
        ks: &Lease<'_>,
        opp: Option<&CStr>,
        inp: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
        out: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32 {
        let opp = opp.map_or(ptr::null(), CStr::as_ptr);
        let (inp, in_size) = input(inp);
        let (out, out_size) = output(out);
        // SAFETY: FFI call, `ks` is leased, `opp` is null or NUL
        // terminated, and each buffer is valid for its size.
        unsafe {
            (self.api.SpecNI_Decap)(
                lease_ptr(ks),
                opp,
                inp,
                in_size,
                in_off,
                in_len,
                out,
                out_size,
                out_off,
                out_len,
            )
        }
    }
}

impl Asn1Ni for Ffi {
    fn asn1_allocate(&self) -> Handle {
        // SAFETY: FFI call, no invariants.
        to_handle(unsafe { (self.api.ASN1_allocate)() })
    }

    unsafe fn asn1_dispose(&self, ctx: Handle) {
        // SAFETY: FFI call, the caller guarantees `ctx` is a live
        // codec context released exactly once.
        unsafe { (self.api.ASN1_dispose)(to_ptr(ctx)) }
    }

    fn asn1_encode_public_key(&self, ctx: &Lease<'_>, ks: &Lease<'_>) -> i32 {
        // SAFETY: FFI call, both handles are leased.
        unsafe { (self.api.ASN1_encodePublicKey)(lease_ptr(ctx), lease_ptr(ks)) }
    }

    fn asn1_encode_private_key(&self, ctx: &Lease<'_>, ks: &Lease<'_>) -> i32 {
        // SAFETY: FFI call, both handles are leased.
        unsafe { (self.api.ASN1_encodePrivateKey)(lease_ptr(ctx), lease_ptr(ks)) }
    }

    fn asn1_get_data(&self, ctx: &Lease<'_>, out: Option<&mut [u8]>) -> i32 {
        let (out, out_size) = output(out);
        // SAFETY: FFI call, `ctx` is leased and `out` is valid for
        // its size.
        unsafe { (self.api.ASN1_getData)(lease_ptr(ctx), out, out_size) }
    }

    fn asn1_from_private_key_info(
        &self,
        inp: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> (Handle, i32) {
        let (inp, in_size) = input(inp);
        let mut ret = 0;
        // SAFETY: FFI call, `inp` is valid for its size and `ret`
        // is valid.
        let ks = unsafe {
            (self.api.ASN1_fromPrivateKeyInfo)(inp, in_size, in_off, in_len, &mut ret)
        };
        (to_handle(ks), ret)
    }

    fn asn1_from_public_key_info(
        &self,
        inp: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> (Handle, i32) {
        let (inp, in_size) = input(inp);
        let mut ret = 0;
        // SAFETY: FFI call, `inp` is valid for its size and `ret`
        // is valid.
        let ks =
            unsafe { (self.api.ASN1_fromPublicKeyInfo)(inp, in_size, in_off, in_len, &mut ret) };
        (to_handle(ks), ret)
    }
}

impl KeyNi for Ffi {
    fn key_generate(&self, family: KeyFamily, key_type: i32) -> (Handle, i32) {
        let f = match family {
            KeyFamily::MlDsa => self.api.MLDSA_generateKeyPair,
            KeyFamily::MlKem => self.api.MLKEM_generateKeyPair,
            KeyFamily::SlhDsa => self.api.SLH_DSA_generateKeyPair,
        };
        let mut ret = 0;
        // SAFETY: FFI call, `ret` is valid.
        let ks = unsafe { f(key_type, &mut ret) };
        (to_handle(ks), ret)
    }

    fn key_generate_seed(
        &self,
        family: KeyFamily,
        key_type: i32,
        seed: Option<&[u8]>,
        seed_len: i32,
    ) -> (Handle, i32) {
        let f = match family {
            KeyFamily::MlDsa => self.api.MLDSA_generateKeyPairSeed,
            KeyFamily::MlKem => self.api.MLKEM_generateKeyPairSeed,
            KeyFamily::SlhDsa => self.api.SLH_DSA_generateKeyPairSeed,
        };
        let (seed, seed_size) = input(seed);
        let mut ret = 0;
        // SAFETY: FFI call, `seed` is valid for its size and `ret`
        // is valid.
        let ks = unsafe { f(key_type, &mut ret, seed, seed_size, seed_len) };
        (to_handle(ks), ret)
    }

    fn key_public(&self, family: KeyFamily, ks: &Lease<'_>, out: Option<&mut [u8]>) -> i32 {
        let f = match family {
            KeyFamily::MlDsa => self.api.MLDSA_getPublicKey,
            KeyFamily::MlKem => self.api.MLKEM_getPublicKey,
            KeyFamily::SlhDsa => self.api.SLH_DSA_getPublicKey,
        };
        let (out, out_size) = output(out);
        // SAFETY: FFI call, `ks` is leased and `out` is valid for
        // its size.
        unsafe { f(lease_ptr(ks), out, out_size) }
    }

    fn key_private(&self, family: KeyFamily, ks: &Lease<'_>, out: Option<&mut [u8]>) -> i32 {
        let f = match family {
            KeyFamily::MlDsa => self.api.MLDSA_getPrivateKey,
            KeyFamily::MlKem => self.api.MLKEM_getPrivateKey,
            KeyFamily::SlhDsa => self.api.SLH_DSA_getPrivateKey,
        };
        let (out, out_size) = output(out);
        // SAFETY: FFI call, `ks` is leased and `out` is valid for
        // its size.
        unsafe { f(lease_ptr(ks), out, out_size) }
    }

    fn key_seed(&self, family: KeyFamily, ks: &Lease<'_>, out: Option<&mut [u8]>) -> i32 {
        let f = match family {
            KeyFamily::MlDsa => self.api.MLDSA_getSeed,
            KeyFamily::MlKem => self.api.MLKEM_getSeed,
            KeyFamily::SlhDsa => return WRONG_FAMILY,
        };
        let (out, out_size) = output(out);
        // SAFETY: FFI call, `ks` is leased and `out` is valid for
        // its size.
        unsafe { f(lease_ptr(ks), out, out_size) }
    }

    fn key_decode_public(
        &self,
        family: KeyFamily,
        ks: &Lease<'_>,
        key_type: i32,
        inp: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let f = match family {
            KeyFamily::MlDsa => self.api.MLDSA_decodePublicKey,
            KeyFamily::MlKem => self.api.MLKEM_decodePublicKey,
            KeyFamily::SlhDsa => self.api.SLH_DSA_decodePublicKey,
        };
        let (inp, in_size) = input(inp);
        // SAFETY: FFI call, `ks` is leased and `inp` is valid for
        // its size.
        unsafe { f(lease_ptr(ks), key_type, inp, in_size, in_off, in_len) }
    }

    fn key_decode_private(
        &self,
        family: KeyFamily,
        ks: &Lease<'_>,
        key_type: i32,
        inp: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let f = match family {
            KeyFamily::MlDsa => self.api.MLDSA_decodePrivateKey,
            KeyFamily::MlKem => self.api.MLKEM_decodePrivateKey,
            KeyFamily::SlhDsa => self.api.SLH_DSA_decodePrivateKey,
        };
        let (inp, in_size) = input(inp);
        // SAFETY: FFI call, `ks` is leased and `inp` is valid for
        // its size.
        unsafe { f(lease_ptr(ks), key_type, inp, in_size, in_off, in_len) }
    }
}

impl SignerNi for Ffi {
    fn signer_allocate(&self, family: KeyFamily) -> Handle {
        let ctx = match family {
            // SAFETY: FFI call, no invariants.
            KeyFamily::MlDsa => unsafe { (self.api.MLDSA_allocateSigner)() },
            // SAFETY: FFI call, no invariants.
            KeyFamily::SlhDsa => unsafe { (self.api.SLH_DSA_allocateSigner)() },
            KeyFamily::MlKem => ptr::null_mut(),
        };
        to_handle(ctx)
    }

    unsafe fn signer_dispose(&self, family: KeyFamily, ctx: Handle) {
        match family {
            // SAFETY: FFI call, the caller guarantees `ctx` is a live
            // ML-DSA signer released exactly once.
            KeyFamily::MlDsa => unsafe { (self.api.MLDSA_disposeSigner)(to_ptr(ctx)) },
            // SAFETY: FFI call, the caller guarantees `ctx` is a live
            // SLH-DSA signer released exactly once.
            KeyFamily::SlhDsa => unsafe { (self.api.SLH_DSA_disposeSigner)(to_ptr(ctx)) },
            KeyFamily::MlKem => {}
        }
    }

    fn signer_init_sign(
        &self,
        ctx: &Lease<'_>,
        ks: &Lease<'_>,
        context: Option<&[u8]>,
        context_len: i32,
        params: SignerParams,
    ) -> i32 {
        let (context, context_size) = input(context);
        let (ctx, ks) = (lease_ptr(ctx), lease_ptr(ks));
        match params {
            // SAFETY: FFI call, both handles are leased and
            // `context` is valid for its size.
            SignerParams::MlDsa { mu_mode } => unsafe {
                (self.api.MLDSA_initSign)(ctx, ks, context, context_size, context_len, mu_mode)
            },
            SignerParams::SlhDsa {
                message_encoding,
                deterministic,
            } => {
                // SAFETY: FFI call, both handles are leased and
                // `context` is valid for its size.
                unsafe {
                    (self.api.SLH_DSA_initSign)(
                        ctx,
                        ks,
                        context,
                        context_size,
                        context_len,
                        message_encoding,
                        deterministic,
                    )
                }
            }
        }
    }

    fn signer_init_verify(
        &self,
        ctx: &Lease<'_>,
        ks: &Lease<'_>,
        context: Option<&[u8]>,
        context_len: i32,
        params: SignerParams,
    ) -> i32 {
        let (context, context_size) = input(context);
        let (ctx, ks) = (lease_ptr(ctx), lease_ptr(ks));
        match params {
            // SAFETY: FFI call, both handles are leased and
            // `context` is valid for its size.
            SignerParams::MlDsa { mu_mode } => unsafe {
                (self.api.MLDSA_initVerifier)(ctx, ks, context, context_size, context_len, mu_mode)
            },
            SignerParams::SlhDsa {
                message_encoding,
                deterministic,
            } => {
                // SAFETY: FFI call, both handles are leased and
                // `context` is valid for its size.
                unsafe {
                    (self.api.SLH_DSA_initVerifier)(
                        ctx,
                        ks,
                        context,
                        context_size,
                        context_len,
                        message_encoding,
                        deterministic,
                    )
                }
            }
        }
    }

    fn signer_update(
        &self,
        family: KeyFamily,
        ctx: &Lease<'_>,
        inp: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let f = match family {
            KeyFamily::MlDsa => self.api.MLDSA_update,
            KeyFamily::SlhDsa => self.api.SLH_DSA_update,
            KeyFamily::MlKem => return WRONG_FAMILY,
        };
        let (inp, in_size) = input(inp);
        // SAFETY: FFI call, `ctx` is leased and `inp` is valid for
        // its size.
        unsafe { f(lease_ptr(ctx), inp, in_size, in_off, in_len) }
    }

    fn signer_sign(
        &self,
        family: KeyFamily,
        ctx: &Lease<'_>,
        out: Option<&mut [u8]>,
        out_off: i32,
    ) -> i32 {
        let f = match family {
            KeyFamily::MlDsa => self.api.MLDSA_sign,
            KeyFamily::SlhDsa => self.api.SLH_DSA_sign,
            KeyFamily::MlKem => return WRONG_FAMILY,
        };
        let (out, out_size) = output(out);
        // SAFETY: FFI call, `ctx` is leased and `out` is valid for
        // its size.
        unsafe { f(lease_ptr(ctx), out, out_size, out_off) }
    }

    fn signer_verify(
        &self,
        family: KeyFamily,
        ctx: &Lease<'_>,
        sig: Option<&[u8]>,
        sig_len: i32,
    ) -> i32 {
        let f = match family {
            KeyFamily::MlDsa => self.api.MLDSA_verify,
            KeyFamily::SlhDsa => self.api.SLH_DSA_verify,
            KeyFamily::MlKem => return WRONG_FAMILY,
        };
        let (sig, sig_size) = input(sig);
        // SAFETY: FFI call, `ctx` is leased and `sig` is valid for
        // its size.
        unsafe { f(lease_ptr(ctx), sig, sig_size, sig_len) }
    }
}

impl KdfNi for Ffi {
    fn pbkdf2(
        &self,
        password: Option<&[u8]>,
        salt: Option<&[u8]>,
        iter: i32,
        digest: Option<&[u8]>,
        out: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32 {
        let (password, password_len) = input(password);
        let (salt, salt_len) = input(salt);
        let (digest, digest_len) = input(digest);
        let (out, out_size) = output(out);
        // SAFETY: FFI call, each buffer is valid for its size.
        unsafe {
            (self.api.KDF_PBKDF2)(
                password,
                password_len,
                salt,
                salt_len,
                iter,
                digest,
                digest_len,
                out,
                out_size,
                out_off,
                out_len,
            )
        }
    }

    fn scrypt(
        &self,
        password: Option<&[u8]>,
        salt: Option<&[u8]>,
        n: i32,
        r: i32,
        p: i32,
        out: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32 {
        let (password, password_len) = input(password);
        let (salt, salt_len) = input(salt);
        let (out, out_size) = output(out);
        // SAFETY: FFI call, each buffer is valid for its size.
        unsafe {
            (self.api.KDF_SCRYPT)(
                password,
                password_len,
                salt,
                salt_len,
                n,
                r,
                p,
                out,
                out_size,
                out_off,
                out_len,
            )
        }
    }
}

impl DigestNi for Ffi {
    fn md_allocate(&self, name: Option<&CStr>, xof_len: i32) -> (Handle, i32) {
        let name = name.map_or(ptr::null(), CStr::as_ptr);
        let mut ret = 0;
        // SAFETY: FFI call, `name` is null or NUL terminated and
        // `ret` is valid.
        let ctx = unsafe { (self.api.MD_Allocate)(name, xof_len, &mut ret) };
        (to_handle(ctx), ret)
    }

    unsafe fn md_dispose(&self, ctx: Handle) {
        // SAFETY: FFI call, the caller guarantees `ctx` is a live
        // digest context released exactly once.
        unsafe { (self.api.MD_Dispose)(to_ptr(ctx)) }
    }

    fn md_update_byte(&self, ctx: &Lease<'_>, b: u8) -> i32 {
        // SAFETY: FFI call, `ctx` is leased.
        unsafe { (self.api.MB_UpdateByte)(lease_ptr(ctx), b) }
    }

    fn md_update(&self, ctx: &Lease<'_>, inp: Option<&[u8]>, in_off: i32, in_len: i32) -> i32 {
        let (inp, in_size) = input(inp);
        // SAFETY: FFI call, `ctx` is leased and `inp` is valid for
        // its size.
        unsafe { (self.api.MB_UpdateBytes)(lease_ptr(ctx), inp, in_size, in_off, in_len) }
    }

    fn md_digest_len(&self, ctx: &Lease<'_>) -> i32 {
        // SAFETY: FFI call, `ctx` is leased.
        unsafe { (self.api.MD_GetDigestLen)(lease_ptr(ctx)) }
    }

    fn md_digest(
        &self,
        ctx: &Lease<'_>,
        out: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32 {
        let (out, out_size) = output(out);
        // SAFETY: FFI call, `ctx` is leased and `out` is valid for
        // its size.
        unsafe { (self.api.MB_Digest)(lease_ptr(ctx), out, out_size, out_off, out_len) }
    }

    fn md_reset(&self, ctx: &Lease<'_>) {
        // SAFETY: FFI call, `ctx` is leased.
        unsafe { (self.api.MD_Reset)(lease_ptr(ctx)) }
    }
}

impl OpenSslNi for Ffi {
    fn openssl_errors(&self) -> Option<String> {
        let mut len = 0u64;
        // SAFETY: FFI call, `len` is valid.
        let errs = unsafe { (self.api.get_ossl_errors)(&mut len) };
        // SAFETY: the engine returns null or a NUL terminated
        // string.
        let text = unsafe { copy_str(errs) };
        // SAFETY: FFI call, `errs` was allocated by the engine and
        // is not used again. Null is accepted.
        unsafe { (self.api.ffi_free_unsecure_null_safe)(errs.cast::<c_void>()) };
        text
    }

    fn openssl_version(&self) -> Option<String> {
        let mut len = 0usize;
        // SAFETY: FFI call, `len` is valid.
        let version = unsafe { (self.api.openssl_library_version)(&mut len) };
        // SAFETY: the engine returns a static NUL terminated string.
        unsafe { copy_str(version) }
    }

    fn set_openssl_module(&self, name: Option<&CStr>) -> i32 {
        let name = name.map_or(ptr::null(), CStr::as_ptr);
        // SAFETY: FFI call, `name` is null or NUL terminated.
        unsafe { (self.api.set_openssl_module)(name) }
    }

    fn is_native_available(&self) -> bool {
        // SAFETY: FFI call, no invariants.
        unsafe { (self.api.is_native_available)() != 0 }
    }
}
