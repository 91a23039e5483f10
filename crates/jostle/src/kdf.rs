//! Password-based key derivation.

use std::sync::Arc;

pub use crate::digest::Digest;
use crate::{
    error::Error,
    fault::{Family, FaultCode, check, len_i32},
    ni::Native,
};

/// scrypt cost parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScryptParams {
    /// CPU/memory cost. A power of two, at least 2.
    pub n: u32,
    /// Block size.
    pub r: u32,
    /// Parallelism.
    pub p: u32,
}

/// Fills `out` with PBKDF2-HMAC of `password` and `salt`.
///
/// `salt` must not be empty. `digest` must be one the engine can
/// use with HMAC, which rules out the extendable output functions.
pub fn pbkdf2(
    native: &Arc<dyn Native>,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    digest: Digest,
    out: &mut [u8],
) -> Result<(), Error> {
    let iter = i32::try_from(iterations)
        .map_err(|_| Error::IntegerOverflow("iteration count exceeds i32::MAX"))?;
    let out_len = len_i32(out.len())?;
    let code = native.pbkdf2(
        Some(password),
        Some(salt),
        iter,
        Some(digest.name().as_bytes()),
        Some(out),
        0,
        out_len,
    );
    finish(native, code)
}

/// Fills `out` with scrypt of `password` and `salt`.
pub fn scrypt(
    native: &Arc<dyn Native>,
    password: &[u8],
    salt: &[u8],
    params: ScryptParams,
    out: &mut [u8],
) -> Result<(), Error> {
    let cost = |v: u32| {
        i32::try_from(v).map_err(|_| Error::IntegerOverflow("scrypt parameter exceeds i32::MAX"))
    };
    let out_len = len_i32(out.len())?;
    let code = native.scrypt(
        Some(password),
        Some(salt),
        cost(params.n)?,
        cost(params.r)?,
        cost(params.p)?,
        Some(out),
        0,
        out_len,
    );
    finish(native, code)
}

/// The engine's derivation routines report success as either 0
/// or [`FaultCode::Fail`]; only the specific faults are errors.
fn finish(native: &Arc<dyn Native>, code: i32) -> Result<(), Error> {
    if code == FaultCode::Fail.code() {
        return Ok(());
    }
    check(code, Family::Kdf, native.as_openssl())?;
    Ok(())
}
