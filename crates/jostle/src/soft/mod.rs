//! A pure Rust engine for tests.
//!
//! [`SoftEngine`] implements every [`ni`](crate::ni) trait without
//! a native library. AES (ECB, CBC, CTR, GCM), the SHA-1, SHA-2
//! and SHA-3 digests, PBKDF2 and scrypt are the real algorithms.
//! ML-DSA, SLH-DSA and ML-KEM are stand-ins with the real key,
//! signature and ciphertext sizes and **no security whatsoever**.
//!
//! Argument checking, fault codes and buffering follow the native
//! engine, so the safe wrappers can be exercised end to end. The
//! engine also counts live handles and double frees, which the
//! native engine cannot.

#![allow(
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

mod cipher;
mod der;
mod digest;
mod keys;
mod signer;

use core::{ffi::CStr, fmt, ops::Range};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512, Sha512_224, Sha512_256};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};
use tracing::{trace, warn};
use zeroize::Zeroizing;

use self::{
    cipher::CipherCtx,
    digest::MdCtx,
    keys::{KeyMaterial, SECRET_LEN, sizes},
    signer::{Op, SignerCtx},
};
use crate::{
    digest::Digest,
    fault::FaultCode,
    keys::{KeyFamily, KeyType},
    ni::{
        Asn1Ni, BlockCipherNi, DigestNi, Handle, KdfNi, KeyNi, Lease, OpenSslNi, SignerNi,
        SignerParams, SpecNi,
    },
};

const VERSION: &str = "OpenSSL 3.5.0 8 Apr 2025 (soft engine)";

/// Providers that [`OpenSslNi::set_openssl_module`] accepts.
const PROVIDERS: &[&str] = &["default", "base"];

enum Object {
    Cipher(Box<CipherCtx>),
    Spec(Option<Arc<KeyMaterial>>),
    Asn1(Zeroizing<Vec<u8>>),
    Signer(SignerCtx),
    Digest(MdCtx),
}

impl Object {
    fn kind(&self) -> &'static str {
        match self {
            Self::Cipher(_) => "cipher",
            Self::Spec(_) => "key spec",
            Self::Asn1(_) => "asn1",
            Self::Signer(_) => "signer",
            Self::Digest(_) => "digest",
        }
    }
}

struct Table {
    objects: HashMap<Handle, Object>,
    next: Handle,
    double_frees: usize,
    errors: Vec<String>,
}

impl Table {
    fn insert(&mut self, obj: Object) -> Handle {
        let raw = self.next;
        self.next += 0x40;
        trace!(raw = format_args!("{raw:#x}"), kind = obj.kind(), "allocated");
        self.objects.insert(raw, obj);
        raw
    }

    fn release(&mut self, raw: Handle) {
        if self.objects.remove(&raw).is_none() {
            warn!(raw = format_args!("{raw:#x}"), "double free");
            self.double_frees += 1;
        }
    }

    fn push_error(&mut self, what: &str, detail: impl fmt::Display) {
        self.errors.push(format!("soft engine: {what}: {detail}"));
    }

    /// Converts a result into a native return value, queueing text
    /// for [`FaultCode::OpensslError`].
    fn reply(&mut self, what: &str, res: Result<usize, FaultCode>) -> i32 {
        match res.and_then(|n| i32::try_from(n).map_err(|_| FaultCode::OutputSizeIntOverflow)) {
            Ok(n) => n,
            Err(fault) => {
                if fault == FaultCode::OpensslError {
                    self.push_error(what, "operation failed");
                }
                fault.code()
            }
        }
    }

    fn cipher(&mut self, ctx: &Lease<'_>) -> Result<&mut CipherCtx, FaultCode> {
        match self.objects.get_mut(&ctx.raw()) {
            Some(Object::Cipher(c)) => Ok(&mut **c),
            _ => Err(FaultCode::UnexpectedState),
        }
    }

    fn digest(&mut self, ctx: &Lease<'_>) -> Result<&mut MdCtx, FaultCode> {
        match self.objects.get_mut(&ctx.raw()) {
            Some(Object::Digest(md)) => Ok(md),
            _ => Err(FaultCode::UnexpectedState),
        }
    }

    fn signer(&mut self, family: KeyFamily, ctx: &Lease<'_>) -> Result<&mut SignerCtx, FaultCode> {
        match self.objects.get_mut(&ctx.raw()) {
            Some(Object::Signer(s)) if s.family() == family => Ok(s),
            _ => Err(FaultCode::UnexpectedState),
        }
    }

    /// The key held by a key spec.
    fn key(&self, ks: &Lease<'_>, missing: FaultCode) -> Result<Arc<KeyMaterial>, FaultCode> {
        match self.objects.get(&ks.raw()) {
            Some(Object::Spec(Some(key))) => Ok(Arc::clone(key)),
            Some(Object::Spec(None)) => Err(FaultCode::KeySpecHasNullKey),
            _ => Err(missing),
        }
    }

    fn store_key(&mut self, ks: &Lease<'_>, key: KeyMaterial) -> Result<usize, FaultCode> {
        match self.objects.get_mut(&ks.raw()) {
            Some(Object::Spec(slot)) => {
                *slot = Some(Arc::new(key));
                Ok(0)
            }
            _ => Err(FaultCode::KeySpecIsNull),
        }
    }
}

/// Checks `off` and `len` against a buffer of `size` bytes.
fn span(
    size: usize,
    off: i32,
    len: i32,
    [neg_off, neg_len, out_of_range]: [FaultCode; 3],
) -> Result<Range<usize>, FaultCode> {
    let off = usize::try_from(off).map_err(|_| neg_off)?;
    let len = usize::try_from(len).map_err(|_| neg_len)?;
    match off.checked_add(len) {
        Some(end) if end <= size => Ok(off..end),
        _ => Err(out_of_range),
    }
}

const INPUT: [FaultCode; 3] = [
    FaultCode::InputOffsetIsNegative,
    FaultCode::InputLenIsNegative,
    FaultCode::InputOutOfRange,
];

const OUTPUT: [FaultCode; 3] = [
    FaultCode::OutputOffsetIsNegative,
    FaultCode::OutputLenIsNegative,
    FaultCode::OutputOutOfRange,
];

fn input(buf: Option<&[u8]>, off: i32, len: i32) -> Result<&[u8], FaultCode> {
    let buf = buf.ok_or(FaultCode::InputIsNull)?;
    Ok(&buf[span(buf.len(), off, len, INPUT)?])
}

/// `output[out_off..]`.
fn output_tail(output: Option<&mut [u8]>, out_off: i32) -> Result<&mut [u8], FaultCode> {
    let out = output.ok_or(FaultCode::OutputIsNull)?;
    let off = usize::try_from(out_off).map_err(|_| FaultCode::OutputOffsetIsNegative)?;
    out.get_mut(off..).ok_or(FaultCode::OutputOutOfRange)
}

/// Copies `src` out, or returns its length when `out` is `None`.
fn copy_out(src: &[u8], out: Option<&mut [u8]>) -> Result<usize, FaultCode> {
    if let Some(out) = out {
        out.get_mut(..src.len())
            .ok_or(FaultCode::OutputTooSmall)?
            .copy_from_slice(src);
    }
    Ok(src.len())
}

fn non_negative(len: i32) -> Result<usize, FaultCode> {
    usize::try_from(len).map_err(|_| FaultCode::FinalSizeLenIsNegative)
}

/// An in-process engine. See the [module docs](self).
pub struct SoftEngine {
    table: Mutex<Table>,
}

impl SoftEngine {
    /// Creates an engine with no live handles.
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                objects: HashMap::new(),
                next: 0x7f00_0000_1000,
                double_frees: 0,
                errors: Vec::new(),
            }),
        }
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The number of handles allocated and not yet freed.
    pub fn live_handles(&self) -> usize {
        self.table().objects.len()
    }

    /// The number of times an unknown or already freed handle was
    /// freed.
    pub fn double_frees(&self) -> usize {
        self.table().double_frees
    }
}

impl Default for SoftEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SoftEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.table();
        f.debug_struct("SoftEngine")
            .field("live_handles", &t.objects.len())
            .field("double_frees", &t.double_frees)
            .finish_non_exhaustive()
    }
}

impl BlockCipherNi for SoftEngine {
    fn make_instance(&self, cipher: i32, mode: i32, padding: i32) -> Handle {
        let ctx = CipherCtx::new(cipher, mode, padding);
        self.table().insert(Object::Cipher(Box::new(ctx)))
    }

    fn cipher_init(
        &self,
        ctx: &Lease<'_>,
        op_mode: i32,
        key: Option<&[u8]>,
        iv: Option<&[u8]>,
        tag_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = t
            .cipher(ctx)
            .and_then(|c| c.init(op_mode, key, iv, tag_len))
            .map(|()| 0);
        t.reply("cipher init", res)
    }

    fn cipher_block_size(&self, ctx: &Lease<'_>) -> i32 {
        let mut t = self.table();
        match t.cipher(ctx) {
            Ok(c) => c.block_size(),
            Err(fault) => fault.code(),
        }
    }

    fn cipher_update_aad(
        &self,
        ctx: &Lease<'_>,
        aad: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = input(aad, in_off, in_len).and_then(|aad| t.cipher(ctx)?.update_aad(aad));
        t.reply("cipher aad", res)
    }

    fn cipher_update(
        &self,
        ctx: &Lease<'_>,
        output: Option<&mut [u8]>,
        out_off: i32,
        input_buf: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let input_buf = input_buf.ok_or(FaultCode::InputIsNull)?;
            let output = output.ok_or(FaultCode::OutputIsNull)?;
            if out_off < 0 {
                return Err(FaultCode::OutputOffsetIsNegative);
            }
            let data = input(Some(input_buf), in_off, in_len)?;
            let out = output_tail(Some(output), out_off)?;
            t.cipher(ctx)?.update(data, out)
        })();
        t.reply("cipher update", res)
    }

    fn cipher_update_in_place(
        &self,
        ctx: &Lease<'_>,
        buf: &mut [u8],
        out_off: i32,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let out_off = usize::try_from(out_off).map_err(|_| FaultCode::OutputOffsetIsNegative)?;
            let data = span(buf.len(), in_off, in_len, INPUT)?;
            if out_off > buf.len() {
                return Err(FaultCode::OutputOutOfRange);
            }
            t.cipher(ctx)?.update_shared(buf, data, out_off)
        })();
        t.reply("cipher update", res)
    }

    fn cipher_do_final(&self, ctx: &Lease<'_>, output: Option<&mut [u8]>, out_off: i32) -> i32 {
        let mut t = self.table();
        let res = output_tail(output, out_off).and_then(|out| t.cipher(ctx)?.finish(out));
        t.reply("cipher final", res)
    }

    fn cipher_update_size(&self, ctx: &Lease<'_>, len: i32) -> i32 {
        let mut t = self.table();
        let res = non_negative(len).and_then(|len| t.cipher(ctx)?.update_size(len));
        t.reply("cipher update size", res)
    }

    fn cipher_final_size(&self, ctx: &Lease<'_>, len: i32) -> i32 {
        let mut t = self.table();
        let res = non_negative(len).and_then(|len| t.cipher(ctx)?.final_size(len));
        t.reply("cipher final size", res)
    }

    unsafe fn cipher_dispose(&self, ctx: Handle) {
        self.table().release(ctx);
    }
}

impl SpecNi for SoftEngine {
    fn spec_allocate(&self) -> Handle {
        self.table().insert(Object::Spec(None))
    }

    unsafe fn spec_dispose(&self, ks: Handle) {
        self.table().release(ks);
    }

    fn spec_name(&self, ks: &Lease<'_>) -> Option<String> {
        let t = self.table();
        let key = t.key(ks, FaultCode::KeySpecIsNull).ok()?;
        Some(key.key_type.name().to_owned())
    }

    fn spec_encap(
        &self,
        ks: &Lease<'_>,
        _opp: Option<&CStr>,
        secret: Option<&mut [u8]>,
        secret_off: i32,
        secret_len: i32,
        output: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let key = t.key(ks, FaultCode::KeySpecIsNull)?;
            if key.key_type.family() != KeyFamily::MlKem {
                return Err(FaultCode::IncorrectKeyType);
            }
            let secret = secret.ok_or(FaultCode::InputIsNull)?;
            let r = span(secret.len(), secret_off, secret_len, INPUT)?;
            let secret = &mut secret[r];
            let ct_len = sizes(key.key_type).output;
            let Some(output) = output else {
                return Ok(ct_len);
            };
            let r = span(output.len(), out_off, out_len, OUTPUT)?;
            let out = &mut output[r];
            if out.len() < ct_len {
                return Err(FaultCode::OutputTooSmall);
            }
            if secret.len() < SECRET_LEN {
                return Err(FaultCode::OpensslError);
            }
            let (ct, ss) = keys::encapsulate(&key);
            secret[..SECRET_LEN].copy_from_slice(&ss);
            copy_out(&ct, Some(out))
        })();
        t.reply("encapsulate", res)
    }

    fn spec_decap(
        &self,
        ks: &Lease<'_>,
        _opp: Option<&CStr>,
        input_buf: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
        output: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let key = t.key(ks, FaultCode::KeySpecIsNull)?;
            if key.key_type.family() != KeyFamily::MlKem {
                return Err(FaultCode::IncorrectKeyType);
            }
            let ct = input(input_buf, in_off, in_len)?;
            if ct.len() != sizes(key.key_type).output {
                return Err(FaultCode::OpensslError);
            }
            let Some(output) = output else {
                return Ok(SECRET_LEN);
            };
            let r = span(output.len(), out_off, out_len, OUTPUT)?;
            let out = &mut output[r];
            if out.len() < SECRET_LEN {
                return Err(FaultCode::OutputTooSmall);
            }
            let sk = key.private.as_deref().ok_or(FaultCode::OpensslError)?;
            let ss = keys::decapsulate(&key, sk, ct);
            copy_out(&ss, Some(out))
        })();
        t.reply("decapsulate", res)
    }
}

impl Asn1Ni for SoftEngine {
    fn asn1_allocate(&self) -> Handle {
        self.table().insert(Object::Asn1(Zeroizing::new(Vec::new())))
    }

    unsafe fn asn1_dispose(&self, ctx: Handle) {
        self.table().release(ctx);
    }

    fn asn1_encode_public_key(&self, ctx: &Lease<'_>, ks: &Lease<'_>) -> i32 {
        let mut t = self.table();
        let res = t.key(ks, FaultCode::KeyIsNull).and_then(|key| {
            let der = der::encode_public(&key).ok_or(FaultCode::OpensslError)?;
            append(&mut t, ctx, &der)
        });
        t.reply("encode public key", res)
    }

    fn asn1_encode_private_key(&self, ctx: &Lease<'_>, ks: &Lease<'_>) -> i32 {
        let mut t = self.table();
        let res = t.key(ks, FaultCode::KeyIsNull).and_then(|key| {
            let der = der::encode_private(&key).ok_or(FaultCode::OpensslError)?;
            append(&mut t, ctx, &der)
        });
        t.reply("encode private key", res)
    }

    fn asn1_get_data(&self, ctx: &Lease<'_>, output: Option<&mut [u8]>) -> i32 {
        let mut t = self.table();
        let res = match t.objects.get(&ctx.raw()) {
            Some(Object::Asn1(buf)) => match output {
                Some(out) if out.len() != buf.len() => Err(FaultCode::OutputOutOfRange),
                out => copy_out(buf, out),
            },
            _ => Err(FaultCode::UnexpectedState),
        };
        t.reply("asn1 data", res)
    }

    fn asn1_from_private_key_info(
        &self,
        input_buf: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> (Handle, i32) {
        let mut t = self.table();
        let res = input(input_buf, in_off, in_len)
            .and_then(|der| der::decode_private(der).ok_or(FaultCode::OpensslError));
        decoded(&mut t, "decode private key", res)
    }

    fn asn1_from_public_key_info(
        &self,
        input_buf: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> (Handle, i32) {
        let mut t = self.table();
        let der = input_buf.unwrap_or_default();
        let res = span(der.len(), in_off, in_len, INPUT)
            .and_then(|r| der::decode_public(&der[r]).ok_or(FaultCode::OpensslError));
        decoded(&mut t, "decode public key", res)
    }
}

/// Appends to a codec context, returning the total length.
fn append(t: &mut Table, ctx: &Lease<'_>, der: &[u8]) -> Result<usize, FaultCode> {
    match t.objects.get_mut(&ctx.raw()) {
        Some(Object::Asn1(buf)) => {
            buf.extend_from_slice(der);
            Ok(buf.len())
        }
        _ => Err(FaultCode::UnexpectedState),
    }
}

fn decoded(t: &mut Table, what: &str, res: Result<KeyMaterial, FaultCode>) -> (Handle, i32) {
    match res {
        Ok(key) => (t.insert(Object::Spec(Some(Arc::new(key)))), 0),
        Err(fault) => (0, t.reply(what, Err(fault))),
    }
}

fn key_type(family: KeyFamily, id: i32) -> Result<KeyType, FaultCode> {
    KeyType::from_id(id)
        .filter(|kt| kt.family() == family)
        .ok_or(FaultCode::IncorrectKeyType)
}

impl SoftEngine {
    /// Looks up the key in `ks` and checks it belongs to `family`.
    fn family_key(
        t: &Table,
        family: KeyFamily,
        ks: &Lease<'_>,
    ) -> Result<Arc<KeyMaterial>, FaultCode> {
        let key = t.key(ks, FaultCode::KeySpecIsNull)?;
        if key.key_type.family() != family {
            return Err(FaultCode::IncorrectKeyType);
        }
        Ok(key)
    }
}

impl KeyNi for SoftEngine {
    fn key_generate(&self, family: KeyFamily, id: i32) -> (Handle, i32) {
        let mut t = self.table();
        let res = key_type(family, id).map(KeyMaterial::generate);
        decoded(&mut t, "generate", res)
    }

    fn key_generate_seed(
        &self,
        family: KeyFamily,
        id: i32,
        seed: Option<&[u8]>,
        seed_len: i32,
    ) -> (Handle, i32) {
        let mut t = self.table();
        let res = (|| {
            let kt = key_type(family, id)?;
            let seed = seed.ok_or(FaultCode::SeedIsNull)?;
            let len = usize::try_from(seed_len).map_err(|_| FaultCode::SeedLenIsNegative)?;
            let seed = seed
                .get(..len)
                .ok_or(FaultCode::InvalidSeedLenOutOfRange)?;
            if len != kt.seed_len() {
                return Err(FaultCode::InvalidSeedLen);
            }
            Ok(KeyMaterial::from_seed(kt, seed))
        })();
        decoded(&mut t, "generate from seed", res)
    }

    fn key_public(&self, family: KeyFamily, ks: &Lease<'_>, output: Option<&mut [u8]>) -> i32 {
        let mut t = self.table();
        let res = Self::family_key(&t, family, ks).and_then(|key| copy_out(&key.public, output));
        t.reply("public key", res)
    }

    fn key_private(&self, family: KeyFamily, ks: &Lease<'_>, output: Option<&mut [u8]>) -> i32 {
        let mut t = self.table();
        let res = Self::family_key(&t, family, ks).and_then(|key| {
            let sk = key.private.as_deref().ok_or(FaultCode::OpensslError)?;
            copy_out(sk, output)
        });
        t.reply("private key", res)
    }

    fn key_seed(&self, family: KeyFamily, ks: &Lease<'_>, output: Option<&mut [u8]>) -> i32 {
        let mut t = self.table();
        let res = if family.keeps_seed() {
            Self::family_key(&t, family, ks).and_then(|key| {
                let seed = key.seed.as_deref().ok_or(FaultCode::OpensslError)?;
                copy_out(seed, output)
            })
        } else {
            Err(FaultCode::InvalidKeyType)
        };
        t.reply("seed", res)
    }

    fn key_decode_public(
        &self,
        family: KeyFamily,
        ks: &Lease<'_>,
        id: i32,
        input_buf: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let pk = input(input_buf, in_off, in_len)?;
            let kt = key_type(family, id)?;
            if pk.len() != sizes(kt).public {
                return Err(FaultCode::EncodedPublicKeyLen);
            }
            t.store_key(ks, KeyMaterial::from_public(kt, pk))
        })();
        t.reply("decode public key", res)
    }

    fn key_decode_private(
        &self,
        family: KeyFamily,
        ks: &Lease<'_>,
        id: i32,
        input_buf: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let sk = input(input_buf, in_off, in_len)?;
            let kt = key_type(family, id)?;
            let key = if family.keeps_seed() && sk.len() == kt.seed_len() {
                KeyMaterial::from_seed(kt, sk)
            } else if sk.len() == sizes(kt).private {
                KeyMaterial::from_private(kt, sk.to_vec())
            } else {
                return Err(FaultCode::EncodedPrivateKeyLen);
            };
            t.store_key(ks, key)
        })();
        t.reply("decode private key", res)
    }
}

impl SoftEngine {
    fn signer_init(
        &self,
        op: Op,
        ctx: &Lease<'_>,
        ks: &Lease<'_>,
        context: Option<&[u8]>,
        context_len: i32,
        params: SignerParams,
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let key = t.key(ks, FaultCode::KeySpecIsNull)?;
            let len = usize::try_from(context_len).map_err(|_| FaultCode::ContextLenPastEnd)?;
            let context = match context {
                None if len > 0 => return Err(FaultCode::ContextBytesNull),
                None => &[][..],
                Some(c) => c.get(..len).ok_or(FaultCode::ContextLenPastEnd)?,
            };
            t.signer(params.family(), ctx)?
                .init(op, key, context, params)
                .map(|()| 0)
        })();
        t.reply("signer init", res)
    }
}

impl SignerNi for SoftEngine {
    fn signer_allocate(&self, family: KeyFamily) -> Handle {
        if family == KeyFamily::MlKem {
            return 0;
        }
        self.table().insert(Object::Signer(SignerCtx::new(family)))
    }

    unsafe fn signer_dispose(&self, _family: KeyFamily, ctx: Handle) {
        self.table().release(ctx);
    }

    fn signer_init_sign(
        &self,
        ctx: &Lease<'_>,
        ks: &Lease<'_>,
        context: Option<&[u8]>,
        context_len: i32,
        params: SignerParams,
    ) -> i32 {
        self.signer_init(Op::Sign, ctx, ks, context, context_len, params)
    }

    fn signer_init_verify(
        &self,
        ctx: &Lease<'_>,
        ks: &Lease<'_>,
        context: Option<&[u8]>,
        context_len: i32,
        params: SignerParams,
    ) -> i32 {
        self.signer_init(Op::Verify, ctx, ks, context, context_len, params)
    }

    fn signer_update(
        &self,
        family: KeyFamily,
        ctx: &Lease<'_>,
        input_buf: Option<&[u8]>,
        in_off: i32,
        in_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = input(input_buf, in_off, in_len)
            .and_then(|data| t.signer(family, ctx)?.update(data).map(|()| 0));
        t.reply("signer update", res)
    }

    fn signer_sign(
        &self,
        family: KeyFamily,
        ctx: &Lease<'_>,
        output: Option<&mut [u8]>,
        out_off: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let s = t.signer(family, ctx)?;
            let len = s.sign_len()?;
            let Some(output) = output else {
                return Ok(len);
            };
            let out = output_tail(Some(output), out_off)?;
            if out.len() < len {
                return Err(FaultCode::OutputTooSmall);
            }
            let sig = Zeroizing::new(s.sign()?);
            copy_out(&sig, Some(out))
        })();
        t.reply("sign", res)
    }

    fn signer_verify(
        &self,
        family: KeyFamily,
        ctx: &Lease<'_>,
        sig: Option<&[u8]>,
        sig_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let sig = sig.ok_or(FaultCode::SigIsNull)?;
            let len = usize::try_from(sig_len).map_err(|_| FaultCode::SigLengthIsNegative)?;
            let sig = sig.get(..len).ok_or(FaultCode::SigOutOfRange)?;
            t.signer(family, ctx)?.verify(sig)
        })();
        match res {
            Ok(true) => 0,
            Ok(false) => FaultCode::Fail.code(),
            Err(fault) => t.reply("verify", Err(fault)),
        }
    }
}

/// The checks both derivation functions share.
fn kdf_inputs<'a>(
    password: Option<&'a [u8]>,
    salt: Option<&'a [u8]>,
) -> Result<(&'a [u8], &'a [u8]), FaultCode> {
    let password = password.ok_or(FaultCode::KdfPasswordNull)?;
    let salt = salt.ok_or(FaultCode::KdfSaltNull)?;
    if salt.is_empty() {
        return Err(FaultCode::KdfSaltEmpty);
    }
    Ok((password, salt))
}

fn kdf_output(output: Option<&mut [u8]>, out_off: i32, out_len: i32) -> Result<&mut [u8], FaultCode> {
    let output = output.ok_or(FaultCode::OutputIsNull)?;
    let r = span(output.len(), out_off, out_len, OUTPUT)?;
    Ok(&mut output[r])
}

impl KdfNi for SoftEngine {
    fn pbkdf2(
        &self,
        password: Option<&[u8]>,
        salt: Option<&[u8]>,
        iter: i32,
        digest: Option<&[u8]>,
        output: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let (password, salt) = kdf_inputs(password, salt)?;
            let iter = u32::try_from(iter).map_err(|_| FaultCode::KdfPbeIterNegative)?;
            let out = kdf_output(output, out_off, out_len)?;
            let digest = digest
                .filter(|d| !d.is_empty())
                .ok_or(FaultCode::KdfPbeUnknownDigest)?;
            if iter == 0 {
                return Err(FaultCode::OpensslError);
            }
            let digest = core::str::from_utf8(digest)
                .ok()
                .and_then(Digest::from_alias)
                .ok_or(FaultCode::OpensslError)?;
            match digest {
                Digest::Sha1 => pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, iter, out),
                Digest::Sha224 => pbkdf2::pbkdf2_hmac::<Sha224>(password, salt, iter, out),
                Digest::Sha256 => pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iter, out),
                Digest::Sha384 => pbkdf2::pbkdf2_hmac::<Sha384>(password, salt, iter, out),
                Digest::Sha512 => pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, iter, out),
                Digest::Sha512_224 => {
                    pbkdf2::pbkdf2_hmac::<Sha512_224>(password, salt, iter, out);
                }
                Digest::Sha512_256 => {
                    pbkdf2::pbkdf2_hmac::<Sha512_256>(password, salt, iter, out);
                }
                Digest::Sha3_224 => pbkdf2::pbkdf2_hmac::<Sha3_224>(password, salt, iter, out),
                Digest::Sha3_256 => pbkdf2::pbkdf2_hmac::<Sha3_256>(password, salt, iter, out),
                Digest::Sha3_384 => pbkdf2::pbkdf2_hmac::<Sha3_384>(password, salt, iter, out),
                Digest::Sha3_512 => pbkdf2::pbkdf2_hmac::<Sha3_512>(password, salt, iter, out),
                // No HMAC for an XOF, and the rest are not built in.
                _ => return Err(FaultCode::OpensslError),
            }
            Ok(0)
        })();
        t.reply("pbkdf2", res)
    }

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
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let (password, salt) = kdf_inputs(password, salt)?;
            if n < 2 {
                return Err(FaultCode::KdfScryptNTooSmall);
            }
            if n.count_ones() != 1 {
                return Err(FaultCode::KdfScryptNNotPow2);
            }
            let r = u32::try_from(r).map_err(|_| FaultCode::KdfScryptRNegative)?;
            let p = u32::try_from(p).map_err(|_| FaultCode::KdfScryptPNegative)?;
            let out = kdf_output(output, out_off, out_len)?;
            let log_n = n.trailing_zeros() as u8;
            // The length parameter only applies to PHC strings.
            let params = scrypt::Params::new(log_n, r, p, scrypt::Params::RECOMMENDED_LEN)
                .map_err(|_| FaultCode::OpensslError)?;
            scrypt::scrypt(password, salt, &params, out).map_err(|_| FaultCode::OpensslError)?;
            Ok(0)
        })();
        t.reply("scrypt", res)
    }
}

impl DigestNi for SoftEngine {
    fn md_allocate(&self, name: Option<&CStr>, xof_len: i32) -> (Handle, i32) {
        let Some(name) = name else {
            return (0, FaultCode::NameIsNull.code());
        };
        let mut t = self.table();
        match MdCtx::new(&name.to_string_lossy(), xof_len) {
            Ok(md) => (t.insert(Object::Digest(md)), 0),
            Err(fault) => (0, t.reply("allocate digest", Err(fault))),
        }
    }

    unsafe fn md_dispose(&self, ctx: Handle) {
        self.table().release(ctx);
    }

    fn md_update_byte(&self, ctx: &Lease<'_>, b: u8) -> i32 {
        let mut t = self.table();
        let res = t.digest(ctx).map(|md| {
            md.update(&[b]);
            0
        });
        t.reply("digest update", res)
    }

    fn md_update(&self, ctx: &Lease<'_>, input_buf: Option<&[u8]>, in_off: i32, in_len: i32) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let data = input(input_buf, in_off, in_len)?;
            t.digest(ctx)?.update(data);
            Ok(0)
        })();
        t.reply("digest update", res)
    }

    fn md_digest_len(&self, ctx: &Lease<'_>) -> i32 {
        let mut t = self.table();
        let res = t.digest(ctx).and_then(|md| match md.len() {
            0 => Err(FaultCode::NotInitialized),
            n => Ok(n),
        });
        t.reply("digest length", res)
    }

    fn md_digest(
        &self,
        ctx: &Lease<'_>,
        output: Option<&mut [u8]>,
        out_off: i32,
        out_len: i32,
    ) -> i32 {
        let mut t = self.table();
        let res = (|| {
            let md = t.digest(ctx)?;
            let Some(output) = output else {
                return Ok(md.len());
            };
            let r = span(output.len(), out_off, out_len, OUTPUT)?;
            let out = &mut output[r];
            if out.len() < md.len() {
                return Err(FaultCode::OutputTooSmall);
            }
            md.finish(out)
        })();
        t.reply("digest", res)
    }

    fn md_reset(&self, ctx: &Lease<'_>) {
        if let Ok(md) = self.table().digest(ctx) {
            md.reset();
        }
    }
}

impl OpenSslNi for SoftEngine {
    fn openssl_errors(&self) -> Option<String> {
        let errors = core::mem::take(&mut self.table().errors);
        Some(errors.join("\n"))
    }

    fn openssl_version(&self) -> Option<String> {
        Some(VERSION.to_owned())
    }

    fn set_openssl_module(&self, name: Option<&CStr>) -> i32 {
        let Some(name) = name else {
            return FaultCode::ProvNameNull.code();
        };
        if name.is_empty() {
            return FaultCode::ProvNameEmpty.code();
        }
        let name = name.to_string_lossy();
        if PROVIDERS.contains(&&*name) {
            return 0;
        }
        let mut t = self.table();
        t.push_error("load provider", format_args!("unable to load provider {name}"));
        FaultCode::OpensslError.code()
    }

    fn is_native_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_span() {
        assert_eq!(span(10, 2, 8, INPUT), Ok(2..10));
        assert_eq!(span(10, -1, 1, INPUT), Err(FaultCode::InputOffsetIsNegative));
        assert_eq!(span(10, 0, -1, OUTPUT), Err(FaultCode::OutputLenIsNegative));
        assert_eq!(span(10, 2, 9, OUTPUT), Err(FaultCode::OutputOutOfRange));
        assert_eq!(
            span(10, i32::MAX, i32::MAX, INPUT),
            Err(FaultCode::InputOutOfRange)
        );
    }

    #[test]
    fn test_error_queue_drains() {
        let engine = SoftEngine::new();
        assert_eq!(
            engine.set_openssl_module(Some(c"legacy")),
            FaultCode::OpensslError.code()
        );
        let text = engine.openssl_errors().unwrap();
        assert!(text.contains("legacy"), "{text}");
        assert_eq!(engine.openssl_errors().as_deref(), Some(""));
    }

    #[test]
    fn test_double_free_counted() {
        let engine = SoftEngine::new();
        let raw = engine.spec_allocate();
        assert_eq!(engine.live_handles(), 1);
        // SAFETY: `raw` came from this engine and is not in use.
        unsafe { engine.spec_dispose(raw) };
        // SAFETY: deliberately wrong, to exercise the counter.
        unsafe { engine.spec_dispose(raw) };
        assert_eq!(engine.live_handles(), 0);
        assert_eq!(engine.double_frees(), 1);
    }
}
