//! Streaming block ciphers.
//!
//! A [`Cipher`] drives one native cipher context through
//!
//! ```text
//! Uninit -> Initialized -> (AAD*) -> (update*) -> do_final -> Initialized
//! ```
//!
//! [`Cipher::init`] may be called again at any point. It reuses the
//! native context, so every later `init` must pick the same key
//! size. After a GCM encryption is finished the cipher has to be
//! re-initialized, so that a nonce is never used twice.
//!
//! Every operation runs under the instance's lock. Releasing the
//! native context ([`Cipher::dispose`] or drop) does not.

mod transformation;

use core::{cmp, fmt, ops::Range};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use buggy::BugExt;
use bytes::Buf;
use zeroize::{Zeroize, Zeroizing};

pub use self::transformation::{
    CipherFamily, CipherKind, Mode, OpMode, Padding, Params, Transformation,
};
use crate::{
    error::Error,
    fault::{Family, check, len_i32},
    handle::{NativeRef, Resource},
    ni::{Lease, Native},
};

/// The scratch buffer size for non-contiguous AAD.
const AAD_CHUNK: usize = 1024;

/// The tag length AEAD modes get unless told otherwise.
const DEFAULT_TAG_LEN: usize = 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Stage {
    Uninit,
    Initialized,
    Aad,
    Updating,
    /// Finished, and must be re-initialized before reuse.
    Consumed,
}

#[derive(Debug)]
struct State {
    kind: Option<CipherKind>,
    block_size: usize,
    op: Option<OpMode>,
    tag_len: usize,
    stage: Stage,
}

impl State {
    fn ready(&self) -> Result<(), Error> {
        match self.stage {
            Stage::Uninit => Err(Error::IllegalState("cipher not initialized")),
            Stage::Consumed => Err(Error::IllegalState(
                "cipher must be re-initialized before reuse",
            )),
            Stage::Initialized | Stage::Aad | Stage::Updating => Ok(()),
        }
    }
}

/// A block cipher in one mode with one padding.
pub struct Cipher {
    native: Arc<dyn Native>,
    transformation: Transformation,
    handle: OnceLock<NativeRef>,
    state: Mutex<State>,
}

impl Cipher {
    /// Creates a cipher. No native resources are allocated until
    /// [`Cipher::init`].
    pub fn new(native: &Arc<dyn Native>, transformation: Transformation) -> Self {
        Self {
            native: Arc::clone(native),
            transformation,
            handle: OnceLock::new(),
            state: Mutex::new(State {
                kind: None,
                block_size: 0,
                op: None,
                tag_len: 0,
                stage: Stage::Uninit,
            }),
        }
    }

    /// Creates a cipher from a name like `AES/GCM/NoPadding`.
    pub fn from_name(native: &Arc<dyn Native>, name: &str) -> Result<Self, Error> {
        Ok(Self::new(native, name.parse()?))
    }

    /// The cipher's transformation.
    pub fn transformation(&self) -> Transformation {
        self.transformation
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self) -> Result<&NativeRef, Error> {
        self.handle
            .get()
            .ok_or(Error::IllegalState("cipher not initialized"))
    }

    /// Returns the native context, allocating it on first use.
    ///
    /// Must be called with the instance lock held.
    fn ensure_handle(&self, state: &mut State, kind: CipherKind) -> Result<&NativeRef, Error> {
        if let Some(handle) = self.handle.get() {
            if state.kind != Some(kind) {
                return Err(Error::InvalidKey(
                    "key size does not match the allocated cipher instance",
                ));
            }
            return Ok(handle);
        }
        let Transformation { mode, padding, .. } = self.transformation;
        let raw = self
            .native
            .make_instance(kind.ordinal(), mode.ordinal(), padding.ordinal());
        if raw == 0 {
            return Err(Error::Unavailable(format!("unable to create: {kind} {mode}")));
        }
        let handle = NativeRef::new(raw, Resource::BlockCipher, kind.name(), Arc::clone(&self.native))?;
        state.kind = Some(kind);
        Ok(self.handle.get_or_init(|| handle))
    }

    /// Initializes, or re-initializes, the cipher.
    ///
    /// The variant is chosen from the key size. AEAD modes given a
    /// bare [`Params::Iv`] use a 16 byte tag; [`Params::Aead`] sets
    /// it. Without `params` the tag length passed to the engine is
    /// 0, and an AEAD mode fails for want of an IV.
    pub fn init(&self, op: OpMode, key: &[u8], params: Option<Params<'_>>) -> Result<(), Error> {
        let kind = self.transformation.determine_variant(key.len())?;
        let mut state = self.lock();
        let handle = self.ensure_handle(&mut state, kind)?;

        state.stage = Stage::Uninit;
        state.block_size = 0;
        let tag_len = match params {
            Some(Params::Aead { tag_len, .. }) => tag_len,
            Some(Params::Iv(_)) if self.transformation.mode.is_aead() => DEFAULT_TAG_LEN,
            _ => 0,
        };
        let iv = params.map(|p| p.iv());

        let ctx = handle.lease()?;
        let code = self
            .native
            .cipher_init(&ctx, op.code(), Some(key), iv, len_i32(tag_len)?);
        check(code, Family::CipherInit, self.native.as_openssl()).map_err(|err| {
            match (params, err) {
                // Without parameters the only thing the caller
                // supplied was the key.
                (None, Error::InvalidParameter(msg)) => Error::InvalidKey(msg),
                (_, err) => err,
            }
        })?;
        let block_size = check(
            self.native.cipher_block_size(&ctx),
            Family::CipherUpdate,
            self.native.as_openssl(),
        )?;

        state.op = Some(op);
        state.tag_len = tag_len;
        state.block_size = block_size;
        state.stage = Stage::Initialized;
        Ok(())
    }

    /// Feeds additional authenticated data.
    ///
    /// All AAD must be supplied before the first update.
    pub fn update_aad(&self, aad: &[u8]) -> Result<(), Error> {
        let mut state = self.lock();
        self.aad(&mut state, aad)
    }

    /// Feeds additional authenticated data from `src`, consuming
    /// it.
    ///
    /// A contiguous `src` is passed straight through; anything else
    /// is copied in chunks through a scratch buffer that is wiped
    /// after each chunk.
    pub fn update_aad_buf<B: Buf>(&self, mut src: B) -> Result<(), Error> {
        let mut state = self.lock();
        let remaining = src.remaining();
        if remaining == 0 {
            return Ok(());
        }
        if src.chunk().len() == remaining {
            self.aad(&mut state, src.chunk())?;
            src.advance(remaining);
            return Ok(());
        }
        let mut scratch = Zeroizing::new([0u8; AAD_CHUNK]);
        while src.has_remaining() {
            let n = cmp::min(scratch.len(), src.remaining());
            let chunk = &mut scratch[..n];
            src.copy_to_slice(chunk);
            let res = self.aad(&mut state, chunk);
            chunk.zeroize();
            res?;
        }
        Ok(())
    }

    fn aad(&self, state: &mut State, aad: &[u8]) -> Result<(), Error> {
        state.ready()?;
        if state.stage == Stage::Updating {
            return Err(Error::IllegalState(
                "AAD must be supplied before the first update",
            ));
        }
        let ctx = self.handle()?.lease()?;
        let code = self
            .native
            .cipher_update_aad(&ctx, Some(aad), 0, len_i32(aad.len())?);
        check(code, Family::CipherUpdate, self.native.as_openssl())?;
        state.stage = Stage::Aad;
        Ok(())
    }

    /// Processes `input`, returning what the cipher produced.
    pub fn update(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        let mut state = self.lock();
        state.ready()?;
        let ctx = self.handle()?.lease()?;
        let size = self.update_size(&ctx, input.len())?;
        // The engine wants room for the whole input even when it
        // holds some back.
        let mut out = vec![0u8; cmp::max(size, input.len())];
        let n = self.native_update(&ctx, &mut out, 0, input)?;
        out.truncate(n);
        state.stage = Stage::Updating;
        Ok(out)
    }

    /// Processes `input` into `output`, returning the number of
    /// bytes written.
    ///
    /// Fails with [`Error::BufferTooSmall`] before anything is
    /// written if `output` is shorter than the cipher may produce.
    pub fn update_into(&self, input: &[u8], output: &mut [u8]) -> Result<usize, Error> {
        let mut state = self.lock();
        state.ready()?;
        let ctx = self.handle()?.lease()?;
        let size = self.update_size(&ctx, input.len())?;
        if output.len() < size {
            return Err(Error::BufferTooSmall("output buffer too small"));
        }
        let n = self.native_update(&ctx, output, 0, input)?;
        state.stage = Stage::Updating;
        Ok(n)
    }

    /// Processes `buf[input]` into `buf[out_off..]`, returning the
    /// number of bytes written.
    ///
    /// The input and output regions may overlap.
    pub fn update_in_place(
        &self,
        buf: &mut [u8],
        input: Range<usize>,
        out_off: usize,
    ) -> Result<usize, Error> {
        check_regions(buf.len(), &input, out_off)?;
        let mut state = self.lock();
        state.ready()?;
        let ctx = self.handle()?.lease()?;
        let size = self.update_size(&ctx, input.len())?;
        if buf.len().saturating_sub(out_off) < size {
            return Err(Error::BufferTooSmall("output buffer too small"));
        }
        let n = self.update_aliased(&ctx, buf, input, out_off, size)?;
        state.stage = Stage::Updating;
        Ok(n)
    }

    /// Processes `input` and finishes the operation.
    pub fn do_final(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        let mut state = self.lock();
        state.ready()?;
        let ctx = self.handle()?.lease()?;
        let size = self.final_size(&state, &ctx, input.len())?;
        let mut out = vec![0u8; cmp::max(size, input.len())];
        let n = self.finish(&mut state, |this| {
            let written = this.native_update(&ctx, &mut out, 0, input)?;
            let n = this.native_final(&ctx, &mut out, written)?;
            Ok(written.checked_add(n).assume("output length fits in `usize`")?)
        })?;
        out.truncate(n);
        Ok(out)
    }

    /// Processes `input` and finishes the operation into `output`,
    /// returning the number of bytes written.
    ///
    /// Fails with [`Error::BufferTooSmall`] before anything is
    /// written if `output` is shorter than
    /// [`Cipher::output_size`].
    pub fn do_final_into(&self, input: &[u8], output: &mut [u8]) -> Result<usize, Error> {
        let mut state = self.lock();
        state.ready()?;
        let ctx = self.handle()?.lease()?;
        let size = self.final_size(&state, &ctx, input.len())?;
        if output.len() < size {
            return Err(Error::BufferTooSmall("output buffer too small"));
        }
        self.finish(&mut state, |this| {
            let written = this.native_update(&ctx, output, 0, input)?;
            let n = this.native_final(&ctx, output, written)?;
            Ok(written.checked_add(n).assume("output length fits in `usize`")?)
        })
    }

    /// Processes `buf[input]` and finishes the operation into
    /// `buf[out_off..]`, returning the number of bytes written.
    ///
    /// The input and output regions may overlap.
    pub fn do_final_in_place(
        &self,
        buf: &mut [u8],
        input: Range<usize>,
        out_off: usize,
    ) -> Result<usize, Error> {
        check_regions(buf.len(), &input, out_off)?;
        let mut state = self.lock();
        state.ready()?;
        let ctx = self.handle()?.lease()?;
        let size = self.final_size(&state, &ctx, input.len())?;
        if buf.len().saturating_sub(out_off) < size {
            return Err(Error::BufferTooSmall("output buffer too small"));
        }
        self.finish(&mut state, |this| {
            let written = this.update_aliased(&ctx, buf, input, out_off, size)?;
            let at = out_off
                .checked_add(written)
                .assume("output offset is within the buffer")?;
            let n = this.native_final(&ctx, buf, at)?;
            Ok(written.checked_add(n).assume("output length fits in `usize`")?)
        })
    }

    /// Runs the final update and finalize, then moves to the next
    /// stage.
    fn finish<F>(&self, state: &mut State, f: F) -> Result<usize, Error>
    where
        F: FnOnce(&Self) -> Result<usize, Error>,
    {
        match f(self) {
            Ok(n) => {
                let gcm_encrypt =
                    self.transformation.mode == Mode::Gcm && state.op == Some(OpMode::Encrypt);
                state.stage = if gcm_encrypt {
                    Stage::Consumed
                } else {
                    Stage::Initialized
                };
                Ok(n)
            }
            Err(err) => {
                state.stage = Stage::Consumed;
                Err(err)
            }
        }
    }

    /// Returns the cipher's block size.
    pub fn block_size(&self) -> Result<usize, Error> {
        let state = self.lock();
        match state.block_size {
            0 => Err(Error::IllegalState("cipher not initialized")),
            n => Ok(n),
        }
    }

    /// Returns the output size of a [`Cipher::do_final`] with
    /// `input_len` more bytes.
    pub fn output_size(&self, input_len: usize) -> Result<usize, Error> {
        let state = self.lock();
        state.ready()?;
        let ctx = self.handle()?.lease()?;
        self.final_size(&state, &ctx, input_len)
    }

    /// The tag length in bytes, or 0 for modes without one.
    pub fn tag_len(&self) -> usize {
        self.lock().tag_len
    }

    /// Releases the native context now.
    ///
    /// Calling it again is a no-op. The cipher cannot be used
    /// afterwards.
    pub fn dispose(&self) {
        if let Some(handle) = self.handle.get() {
            handle.dispose();
        }
    }

    /// Reports whether the native context has been released.
    pub fn is_disposed(&self) -> bool {
        self.handle.get().is_some_and(NativeRef::is_disposed)
    }

    fn update_size(&self, ctx: &Lease<'_>, len: usize) -> Result<usize, Error> {
        let code = self.native.cipher_update_size(ctx, len_i32(len)?);
        check(code, Family::CipherUpdate, self.native.as_openssl())
    }

    fn final_size(&self, state: &State, ctx: &Lease<'_>, len: usize) -> Result<usize, Error> {
        // An AEAD decryption holds back at most a tag's worth of
        // input, so its final output never exceeds the input. The
        // engine's own query cannot see the held bytes and rejects
        // inputs shorter than the tag.
        if state.op == Some(OpMode::Decrypt) && state.tag_len > 0 {
            return Ok(len);
        }
        let code = self.native.cipher_final_size(ctx, len_i32(len)?);
        let size = check(code, Family::CipherUpdate, self.native.as_openssl())?;
        // A padded decryption may still hold its last full block,
        // which the engine's query does not count.
        if state.op == Some(OpMode::Decrypt) && self.transformation.padding == Padding::Pkcs7 {
            return Ok(size.saturating_add(state.block_size));
        }
        Ok(size)
    }

    fn native_update(
        &self,
        ctx: &Lease<'_>,
        out: &mut [u8],
        out_off: usize,
        input: &[u8],
    ) -> Result<usize, Error> {
        let code = self.native.cipher_update(
            ctx,
            Some(out),
            len_i32(out_off)?,
            Some(input),
            0,
            len_i32(input.len())?,
        );
        check(code, Family::CipherUpdate, self.native.as_openssl())
    }

    /// Finishes into `out[at..]`, returning the number of bytes
    /// written.
    fn native_final(&self, ctx: &Lease<'_>, out: &mut [u8], at: usize) -> Result<usize, Error> {
        let code = self.native.cipher_do_final(ctx, Some(out), len_i32(at)?);
        check(code, Family::CipherFinal, self.native.as_openssl())
    }

    /// Updates from `buf[input]` into `buf[out_off..]`.
    ///
    /// Overlapping regions go through a copy of the input.
    fn update_aliased(
        &self,
        ctx: &Lease<'_>,
        buf: &mut [u8],
        input: Range<usize>,
        out_off: usize,
        out_len: usize,
    ) -> Result<usize, Error> {
        if overlaps(&input, out_off, out_len) {
            let scratch = Zeroizing::new(buf[input].to_vec());
            return self.native_update(ctx, buf, out_off, &scratch);
        }
        let code = self.native.cipher_update_in_place(
            ctx,
            buf,
            len_i32(out_off)?,
            len_i32(input.start)?,
            len_i32(input.len())?,
        );
        check(code, Family::CipherUpdate, self.native.as_openssl())
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        let Transformation { family, mode, .. } = self.transformation;
        match state.kind {
            Some(kind) => write!(f, "{mode}({kind})"),
            None => write!(f, "{mode}({family:?})"),
        }
    }
}

fn check_regions(len: usize, input: &Range<usize>, out_off: usize) -> Result<(), Error> {
    if input.start > input.end || input.end > len {
        return Err(Error::InvalidArgument("input offset + length out of range"));
    }
    if out_off > len {
        return Err(Error::InvalidArgument("output offset out of range"));
    }
    Ok(())
}

/// Reports whether writing `out_len` bytes at `out_off` could
/// clobber input that has not been read yet.
///
/// Identical offsets are safe: the engine never writes ahead of
/// what it has read.
fn overlaps(input: &Range<usize>, out_off: usize, out_len: usize) -> bool {
    if input.start == out_off || input.is_empty() || out_len == 0 {
        return false;
    }
    let out_end = out_off.saturating_add(out_len);
    cmp::max(input.start, out_off) < cmp::min(input.end, out_end)
}
