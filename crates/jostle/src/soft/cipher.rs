//! AES in ECB, CBC, CTR and GCM, with the engine's sizing and
//! buffering rules.

use core::{cmp, ops::Range};

use aes::{
    Aes128, Aes192, Aes256,
    cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray},
};
use ghash::{GHash, universal_hash::UniversalHash};
use zeroize::Zeroizing;

use crate::{
    cipher::{CipherKind, Mode, OpMode},
    fault::FaultCode,
};

pub(super) const BLOCK: usize = 16;
const MAX_TAG_LEN: i32 = 16;
const GCM_IV_LEN: usize = 12;

const ENCRYPT: i32 = OpMode::Encrypt.code();
const DECRYPT: i32 = OpMode::Decrypt.code();

enum Aes {
    A128(Aes128),
    A192(Aes192),
    A256(Aes256),
}

impl Aes {
    fn new(key: &[u8]) -> Option<Self> {
        match key.len() {
            16 => Aes128::new_from_slice(key).ok().map(Self::A128),
            24 => Aes192::new_from_slice(key).ok().map(Self::A192),
            32 => Aes256::new_from_slice(key).ok().map(Self::A256),
            _ => None,
        }
    }

    fn encrypt(&self, block: &mut [u8; BLOCK]) {
        let b = GenericArray::from_mut_slice(block);
        match self {
            Self::A128(c) => c.encrypt_block(b),
            Self::A192(c) => c.encrypt_block(b),
            Self::A256(c) => c.encrypt_block(b),
        }
    }

    fn decrypt(&self, block: &mut [u8; BLOCK]) {
        let b = GenericArray::from_mut_slice(block);
        match self {
            Self::A128(c) => c.decrypt_block(b),
            Self::A192(c) => c.decrypt_block(b),
            Self::A256(c) => c.decrypt_block(b),
        }
    }
}

fn inc128(ctr: &mut [u8; BLOCK]) {
    for b in ctr.iter_mut().rev() {
        *b = b.wrapping_add(1);
        if *b != 0 {
            break;
        }
    }
}

fn inc32(ctr: &mut [u8; BLOCK]) {
    let mut low = [0u8; 4];
    low.copy_from_slice(&ctr[12..]);
    let next = u32::from_be_bytes(low).wrapping_add(1);
    ctr[12..].copy_from_slice(&next.to_be_bytes());
}

fn xor(dst: &mut [u8; BLOCK], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// A cipher context as created by `make_instance`.
pub(super) struct CipherCtx {
    cipher: i32,
    mode: i32,
    padded: bool,
    active: Option<Active>,
}

struct Active {
    op: i32,
    key: Zeroizing<Vec<u8>>,
    iv: Option<Vec<u8>>,
    tag_len: usize,
    mode: Mode,
    aes: Aes,
    processed: usize,
    /// Unprocessed input, less than a block (ECB, CBC).
    buf: Vec<u8>,
    /// The last decrypted block, held for the padding check.
    held: Option<[u8; BLOCK]>,
    chain: [u8; BLOCK],
    ctr: [u8; BLOCK],
    keystream: [u8; BLOCK],
    ks_used: usize,
    blocks: u128,
    limit: Option<u128>,
    gcm: Option<Gcm>,
}

struct Gcm {
    h: [u8; BLOCK],
    j0: [u8; BLOCK],
    aad: Vec<u8>,
    text: Vec<u8>,
    tag: Vec<u8>,
}

impl CipherCtx {
    pub(super) fn new(cipher: i32, mode: i32, padding: i32) -> Self {
        Self {
            cipher,
            mode,
            padded: padding == 1,
            active: None,
        }
    }

    pub(super) fn init(
        &mut self,
        op: i32,
        key: Option<&[u8]>,
        iv: Option<&[u8]>,
        tag_len: i32,
    ) -> Result<(), FaultCode> {
        let key = key.ok_or(FaultCode::KeyIsNull)?;
        if !(0..=MAX_TAG_LEN).contains(&tag_len) {
            return Err(FaultCode::InvalidTagLen);
        }
        let mode = Mode::from_ordinal(self.mode).ok_or(FaultCode::InvalidMode)?;
        match (mode, iv) {
            (Mode::Ecb, Some(_)) => return Err(FaultCode::ModeTakesNoIv),
            (Mode::Ecb, None) => {}
            (_, None) => return Err(FaultCode::IvIsNull),
            (_, Some(_)) => {}
        }
        let expected = match CipherKind::from_ordinal(self.cipher) {
            Some(CipherKind::Aes128) => 16,
            Some(CipherKind::Aes192) => 24,
            Some(CipherKind::Aes256) => 32,
            _ => return Err(FaultCode::InvalidCipher),
        };
        if key.len() != expected {
            return Err(FaultCode::InvalidKeyLen);
        }
        let iv_ok = |len: usize| match mode {
            Mode::Ecb => true,
            Mode::Cbc => len == BLOCK,
            Mode::Ctr => (BLOCK / 2..=BLOCK).contains(&len),
            Mode::Gcm => len == GCM_IV_LEN,
            _ => false,
        };
        if !matches!(mode, Mode::Ecb | Mode::Cbc | Mode::Ctr | Mode::Gcm) {
            return Err(FaultCode::InvalidMode);
        }
        if let Some(iv) = iv {
            if !iv_ok(iv.len()) {
                return Err(FaultCode::InvalidIvLen);
            }
        }
        if op != ENCRYPT && op != DECRYPT {
            return Err(FaultCode::InvalidOpMode);
        }
        let aes = Aes::new(key).ok_or(FaultCode::InvalidKeyLen)?;

        let mut ctr = [0u8; BLOCK];
        let mut chain = [0u8; BLOCK];
        let mut limit = None;
        let mut gcm = None;
        match (mode, iv) {
            (Mode::Cbc, Some(iv)) => chain.copy_from_slice(iv),
            (Mode::Ctr, Some(iv)) => {
                ctr[..iv.len()].copy_from_slice(iv);
                limit = match iv.len() {
                    BLOCK => None,
                    8 => Some(1u128 << 64),
                    n => Some(1u128 << ((BLOCK - n) * 8)),
                };
            }
            (Mode::Gcm, Some(iv)) => {
                let mut h = [0u8; BLOCK];
                aes.encrypt(&mut h);
                let mut j0 = [0u8; BLOCK];
                j0[..GCM_IV_LEN].copy_from_slice(iv);
                j0[BLOCK - 1] = 1;
                ctr = j0;
                inc32(&mut ctr);
                gcm = Some(Gcm {
                    h,
                    j0,
                    aad: Vec::new(),
                    text: Vec::new(),
                    tag: Vec::new(),
                });
            }
            _ => {}
        }

        self.active = Some(Active {
            op,
            key: Zeroizing::new(key.to_vec()),
            iv: iv.map(<[u8]>::to_vec),
            tag_len: usize::try_from(tag_len).map_err(|_| FaultCode::InvalidTagLen)?,
            mode,
            aes,
            processed: 0,
            buf: Vec::new(),
            held: None,
            chain,
            ctr,
            keystream: [0u8; BLOCK],
            ks_used: BLOCK,
            blocks: 0,
            limit,
            gcm,
        });
        Ok(())
    }

    fn active(&mut self) -> Result<&mut Active, FaultCode> {
        self.active.as_mut().ok_or(FaultCode::NotInitialized)
    }

    pub(super) fn block_size(&self) -> i32 {
        BLOCK as i32
    }

    pub(super) fn update_aad(&mut self, aad: &[u8]) -> Result<usize, FaultCode> {
        if aad.is_empty() {
            return Ok(0);
        }
        let a = self.active()?;
        match a.gcm.as_mut() {
            Some(gcm) if gcm.text.is_empty() && gcm.tag.is_empty() => {
                gcm.aad.extend_from_slice(aad);
                Ok(0)
            }
            _ => Err(FaultCode::OpensslError),
        }
    }

    pub(super) fn update_size(&self, len: usize) -> Result<usize, FaultCode> {
        let a = self.active.as_ref().ok_or(FaultCode::NotInitialized)?;
        if a.streaming() {
            return Ok(len);
        }
        let remaining = if self.padded { a.processed % BLOCK } else { 0 };
        Ok(BLOCK * ((remaining + len) / BLOCK))
    }

    pub(super) fn final_size(&self, len: usize) -> Result<usize, FaultCode> {
        let a = self.active.as_ref().ok_or(FaultCode::NotInitialized)?;
        let mut len = len;
        if a.streaming() {
            if a.mode != Mode::Gcm {
                return Ok(len);
            }
            if a.tag_len > 0 {
                len = match a.op {
                    ENCRYPT => len + a.tag_len,
                    DECRYPT => len
                        .checked_sub(a.tag_len)
                        .ok_or(FaultCode::OutputSizeIntOverflow)?,
                    _ => return Err(FaultCode::InvalidOpMode),
                };
            }
        }
        if self.padded {
            let total = len + a.processed % BLOCK;
            let left_over = total % BLOCK;
            len = if left_over == 0 {
                if a.op == ENCRYPT { total + BLOCK } else { total }
            } else {
                total - left_over + BLOCK
            };
        }
        if len > i32::MAX as usize {
            return Err(FaultCode::OutputSizeIntOverflow);
        }
        Ok(len)
    }

    /// Processes `input` into `output`, returning the number of
    /// bytes written.
    pub(super) fn update(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, FaultCode> {
        if input.is_empty() {
            return Ok(0);
        }
        let padded = self.padded;
        let a = self.active()?;
        a.check_update(padded, input.len(), output.len())?;
        if a.mode == Mode::Ctr {
            a.reserve_ctr(input.len())?;
        }
        a.process(padded, input, output)
    }

    /// Processes `buf[input]` into `buf[out_off..]`.
    ///
    /// Like the native engine, it reads and writes `buf` one block
    /// at a time, so output placed ahead of the input clobbers
    /// input that has not been read yet.
    pub(super) fn update_shared(
        &mut self,
        buf: &mut [u8],
        input: Range<usize>,
        out_off: usize,
    ) -> Result<usize, FaultCode> {
        if input.is_empty() {
            return Ok(0);
        }
        let padded = self.padded;
        let a = self.active()?;
        a.check_update(padded, input.len(), buf.len().saturating_sub(out_off))?;
        if a.mode == Mode::Ctr {
            a.reserve_ctr(input.len())?;
        }
        let mut written = 0;
        let mut at = input.start;
        while at < input.end {
            let end = cmp::min(at + BLOCK, input.end);
            let mut block = Zeroizing::new([0u8; BLOCK]);
            block[..end - at].copy_from_slice(&buf[at..end]);
            let mut out = Zeroizing::new([0u8; 2 * BLOCK]);
            let n = a.process(padded, &block[..end - at], &mut out[..])?;
            let dst = out_off + written;
            buf.get_mut(dst..dst + n)
                .ok_or(FaultCode::OutputTooSmall)?
                .copy_from_slice(&out[..n]);
            written += n;
            at = end;
        }
        Ok(written)
    }

    /// Finishes into `output` and re-initializes with the same key
    /// and IV.
    pub(super) fn finish(&mut self, output: &mut [u8]) -> Result<usize, FaultCode> {
        let padded = self.padded;
        let a = self.active()?;
        let min = a.internal_final_size(padded);
        if a.op == ENCRYPT && output.len() < min {
            return Err(FaultCode::OutputTooSmall);
        }
        let result = match a.op {
            ENCRYPT => a.final_encrypt(padded, output),
            DECRYPT => a.final_decrypt(padded, output),
            _ => Err(FaultCode::InvalidOpMode),
        };
        let (op, key, iv, tag_len) = (a.op, a.key.clone(), a.iv.clone(), a.tag_len);
        let tag_len = i32::try_from(tag_len).map_err(|_| FaultCode::InvalidTagLen)?;
        self.init(op, Some(&key), iv.as_deref(), tag_len)?;
        result
    }
}

impl Active {
    fn streaming(&self) -> bool {
        matches!(self.mode, Mode::Ctr | Mode::Gcm)
    }

    fn internal_final_size(&self, padded: bool) -> usize {
        if self.streaming() {
            return if self.mode == Mode::Gcm { self.tag_len } else { 0 };
        }
        if padded && self.op == ENCRYPT { BLOCK } else { 0 }
    }

    /// Fails if an update of `in_len` bytes cannot complete, before
    /// anything is written.
    fn check_update(&self, padded: bool, in_len: usize, out_len: usize) -> Result<(), FaultCode> {
        let need = if self.op == ENCRYPT || self.tag_len == 0 {
            in_len
        } else {
            let held = self.gcm.as_ref().map_or(0, |g| g.tag.len());
            (held + in_len).saturating_sub(self.tag_len)
        };
        if out_len < need {
            return Err(FaultCode::OutputTooSmall);
        }
        if self.streaming() {
            return Ok(());
        }
        if !padded && in_len % BLOCK != 0 {
            return Err(FaultCode::NotBlockAligned);
        }
        if out_len < self.emitted_blocks(padded, in_len) * BLOCK {
            return Err(FaultCode::OutputTooSmall);
        }
        Ok(())
    }

    fn process(&mut self, padded: bool, input: &[u8], output: &mut [u8]) -> Result<usize, FaultCode> {
        let n = match self.mode {
            Mode::Ecb | Mode::Cbc => self.update_blocks(padded, input, output)?,
            Mode::Ctr => {
                output[..input.len()].copy_from_slice(input);
                self.keystream(&mut output[..input.len()], inc128);
                input.len()
            }
            Mode::Gcm => self.update_gcm(input, output),
            _ => return Err(FaultCode::InvalidMode),
        };
        self.processed += input.len();
        Ok(n)
    }

    /// Whole blocks an update of `len` bytes writes (ECB, CBC).
    fn emitted_blocks(&self, padded: bool, len: usize) -> usize {
        let blocks = (self.buf.len() + len) / BLOCK;
        // Padded decryption always holds the last full block back
        // for the padding check.
        if padded && self.op == DECRYPT && self.held.is_none() {
            blocks.saturating_sub(1)
        } else {
            blocks
        }
    }

    fn reserve_ctr(&mut self, len: usize) -> Result<(), FaultCode> {
        let partial = self.processed % BLOCK;
        let excess = if partial != 0 {
            len.saturating_sub(BLOCK - partial)
        } else {
            len
        };
        if excess == 0 {
            return Ok(());
        }
        let blocks = excess.div_ceil(BLOCK) as u128;
        self.blocks = self.blocks.saturating_add(blocks);
        match self.limit {
            Some(limit) if self.blocks >= limit => Err(FaultCode::CtrModeOverflow),
            _ => Ok(()),
        }
    }

    fn keystream(&mut self, data: &mut [u8], inc: fn(&mut [u8; BLOCK])) {
        for b in data {
            if self.ks_used == BLOCK {
                self.keystream = self.ctr;
                self.aes.encrypt(&mut self.keystream);
                inc(&mut self.ctr);
                self.ks_used = 0;
            }
            *b ^= self.keystream[self.ks_used];
            self.ks_used += 1;
        }
    }

    fn cipher_block(&mut self, block: &mut [u8; BLOCK]) {
        match (self.mode, self.op) {
            (Mode::Cbc, ENCRYPT) => {
                xor(block, &self.chain);
                self.aes.encrypt(block);
                self.chain = *block;
            }
            (Mode::Cbc, _) => {
                let next = *block;
                self.aes.decrypt(block);
                xor(block, &self.chain);
                self.chain = next;
            }
            (_, ENCRYPT) => self.aes.encrypt(block),
            _ => self.aes.decrypt(block),
        }
    }

    fn update_blocks(
        &mut self,
        padded: bool,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, FaultCode> {
        let hold = padded && self.op == DECRYPT;
        let blocks = (self.buf.len() + input.len()) / BLOCK;
        if output.len() < self.emitted_blocks(padded, input.len()) * BLOCK {
            return Err(FaultCode::OutputTooSmall);
        }
        let mut data = core::mem::take(&mut self.buf);
        data.extend_from_slice(input);
        let split = blocks * BLOCK;
        let mut written = 0;
        for chunk in data[..split].chunks_exact(BLOCK) {
            let mut block = [0u8; BLOCK];
            block.copy_from_slice(chunk);
            self.cipher_block(&mut block);
            let out = if hold {
                match self.held.replace(block) {
                    Some(prev) => prev,
                    None => continue,
                }
            } else {
                block
            };
            output[written..written + BLOCK].copy_from_slice(&out);
            written += BLOCK;
        }
        self.buf = data[split..].to_vec();
        Ok(written)
    }

    fn update_gcm(&mut self, input: &[u8], output: &mut [u8]) -> usize {
        if self.op == ENCRYPT {
            let out = &mut output[..input.len()];
            out.copy_from_slice(input);
            self.keystream(out, inc32);
            if let Some(gcm) = self.gcm.as_mut() {
                gcm.text.extend_from_slice(out);
            }
            return input.len();
        }
        let tag_len = self.tag_len;
        let Some(gcm) = self.gcm.as_mut() else {
            return 0;
        };
        let mut pending = core::mem::take(&mut gcm.tag);
        pending.extend_from_slice(input);
        let split = pending.len().saturating_sub(tag_len);
        let (body, tag) = pending.split_at(split);
        gcm.text.extend_from_slice(body);
        gcm.tag = tag.to_vec();
        let out = &mut output[..split];
        out.copy_from_slice(body);
        self.keystream(out, inc32);
        split
    }

    fn gcm_tag(&self) -> Option<[u8; BLOCK]> {
        let gcm = self.gcm.as_ref()?;
        let mut ghash = <GHash as KeyInit>::new(GenericArray::from_slice(&gcm.h));
        ghash.update_padded(&gcm.aad);
        ghash.update_padded(&gcm.text);
        let mut lens = [0u8; BLOCK];
        lens[..8].copy_from_slice(&((gcm.aad.len() as u64) * 8).to_be_bytes());
        lens[8..].copy_from_slice(&((gcm.text.len() as u64) * 8).to_be_bytes());
        ghash.update_padded(&lens);
        let mut tag = [0u8; BLOCK];
        tag.copy_from_slice(&ghash.finalize());
        let mut mask = gcm.j0;
        self.aes.encrypt(&mut mask);
        xor(&mut tag, &mask);
        Some(tag)
    }

    fn final_encrypt(&mut self, padded: bool, output: &mut [u8]) -> Result<usize, FaultCode> {
        match self.mode {
            Mode::Ecb | Mode::Cbc if padded => {
                let mut block = [0u8; BLOCK];
                let n = self.buf.len();
                block[..n].copy_from_slice(&self.buf);
                let pad = (BLOCK - n) as u8;
                block[n..].fill(pad);
                self.cipher_block(&mut block);
                output[..BLOCK].copy_from_slice(&block);
                Ok(BLOCK)
            }
            Mode::Gcm => {
                let tag = self.gcm_tag().ok_or(FaultCode::OpensslError)?;
                output[..self.tag_len].copy_from_slice(&tag[..self.tag_len]);
                Ok(self.tag_len)
            }
            _ => Ok(0),
        }
    }

    fn final_decrypt(&mut self, padded: bool, output: &mut [u8]) -> Result<usize, FaultCode> {
        match self.mode {
            Mode::Ecb | Mode::Cbc if padded => {
                if !self.buf.is_empty() {
                    return Err(FaultCode::InvalidCipherText);
                }
                let block = self.held.take().ok_or(FaultCode::InvalidCipherText)?;
                let pad = usize::from(block[BLOCK - 1]);
                let bad = pad == 0
                    || pad > BLOCK
                    || block[BLOCK - pad..].iter().any(|&b| usize::from(b) != pad);
                if bad {
                    return Err(FaultCode::InvalidCipherText);
                }
                let n = BLOCK - pad;
                if output.len() < n {
                    return Err(FaultCode::OutputTooSmall);
                }
                output[..n].copy_from_slice(&block[..n]);
                Ok(n)
            }
            Mode::Gcm => {
                let gcm = self.gcm.as_ref().ok_or(FaultCode::OpensslError)?;
                if gcm.tag.len() != self.tag_len {
                    return Err(FaultCode::TagInvalid);
                }
                let expected = self.gcm_tag().ok_or(FaultCode::OpensslError)?;
                let diff = expected[..self.tag_len]
                    .iter()
                    .zip(&gcm.tag)
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b));
                if diff != 0 {
                    return Err(FaultCode::TagInvalid);
                }
                Ok(0)
            }
            _ => Ok(0),
        }
    }
}
