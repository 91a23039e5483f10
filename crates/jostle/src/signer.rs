//! ML-DSA and SLH-DSA signatures.
//!
//! A [`Signer`] is bound to a key with [`Signer::init_sign`] or
//! [`Signer::init_verify`], fed the message with
//! [`Signer::update`], and finished with [`Signer::sign`] or
//! [`Signer::verify`]. Finishing rebinds the signer to the same key
//! and context, so it can be used again straight away.

use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::debug;

use crate::{
    error::Error,
    fault::{Family, check, len_i32, translate},
    handle::{NativeRef, Resource},
    keys::{KeyFamily, KeySpec, PrivateKey, PublicKey},
    ni::{Native, SignerParams},
};

/// The longest context string a signature can carry.
pub const MAX_CONTEXT_LEN: usize = 255;

/// The length of an ML-DSA message representative (mu).
pub const MU_LEN: usize = 64;

/// How an ML-DSA signer treats its input.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MuMode {
    /// The input is the message.
    #[default]
    Internal,
    /// The input is a precomputed 64-byte mu.
    External,
    /// The input is the message, and "signing" returns its mu
    /// instead of a signature.
    CalculateOnly,
}

impl MuMode {
    const fn code(self) -> i32 {
        match self {
            Self::Internal => 0,
            Self::External => 1,
            Self::CalculateOnly => 2,
        }
    }
}

/// How an SLH-DSA signer encodes the message.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MessageEncoding {
    /// The message is signed as is.
    None,
    /// The message is wrapped with its context string.
    #[default]
    Pure,
}

/// Whether SLH-DSA signing uses fresh randomness.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Deterministic {
    /// Randomized signing.
    #[default]
    Non,
    /// Deterministic signing.
    Deterministic,
}

/// A signature algorithm and its options.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignerKind {
    /// ML-DSA.
    MlDsa {
        /// The mu mode.
        mu: MuMode,
    },
    /// SLH-DSA.
    SlhDsa {
        /// The message encoding.
        encoding: MessageEncoding,
        /// Deterministic or randomized signing.
        deterministic: Deterministic,
    },
}

impl SignerKind {
    /// ML-DSA over the message.
    pub const fn ml_dsa() -> Self {
        Self::MlDsa {
            mu: MuMode::Internal,
        }
    }

    /// Randomized, pure SLH-DSA.
    pub const fn slh_dsa() -> Self {
        Self::SlhDsa {
            encoding: MessageEncoding::Pure,
            deterministic: Deterministic::Non,
        }
    }

    /// The key family the algorithm signs with.
    pub const fn family(self) -> KeyFamily {
        match self {
            Self::MlDsa { .. } => KeyFamily::MlDsa,
            Self::SlhDsa { .. } => KeyFamily::SlhDsa,
        }
    }

    fn params(self) -> SignerParams {
        match self {
            Self::MlDsa { mu } => SignerParams::MlDsa { mu_mode: mu.code() },
            Self::SlhDsa {
                encoding,
                deterministic,
            } => SignerParams::SlhDsa {
                message_encoding: match encoding {
                    MessageEncoding::None => 0,
                    MessageEncoding::Pure => 1,
                },
                deterministic: match deterministic {
                    Deterministic::Non => 0,
                    Deterministic::Deterministic => 1,
                },
            },
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::MlDsa { .. } => "MLDSA",
            Self::SlhDsa { .. } => "SLHDSA",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Purpose {
    Sign,
    Verify,
}

/// The key and context a signer is bound to.
struct Binding {
    purpose: Purpose,
    key: KeySpec,
    context: Vec<u8>,
}

/// A signature generator or verifier.
pub struct Signer {
    native: Arc<dyn Native>,
    kind: SignerKind,
    handle: OnceLock<NativeRef>,
    binding: Mutex<Option<Binding>>,
}

impl Signer {
    /// Creates a signer. The native context is allocated by the
    /// first `init_*` call.
    pub fn new(native: &Arc<dyn Native>, kind: SignerKind) -> Self {
        Self {
            native: Arc::clone(native),
            kind,
            handle: OnceLock::new(),
            binding: Mutex::new(None),
        }
    }

    /// The signer's algorithm and options.
    pub fn kind(&self) -> SignerKind {
        self.kind
    }

    fn lock(&self) -> MutexGuard<'_, Option<Binding>> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called with the instance lock held.
    fn ensure_handle(&self) -> Result<&NativeRef, Error> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle);
        }
        let family = self.kind.family();
        let raw = self.native.signer_allocate(family);
        if raw == 0 {
            return Err(Error::Unavailable(format!(
                "unable to create: {}",
                self.kind.label()
            )));
        }
        let handle = NativeRef::new(
            raw,
            Resource::Signer(family),
            self.kind.label(),
            Arc::clone(&self.native),
        )?;
        Ok(self.handle.get_or_init(|| handle))
    }

    /// Prepares to sign with `key`.
    ///
    /// `context` may be empty and is at most
    /// [`MAX_CONTEXT_LEN`] bytes.
    pub fn init_sign(&self, key: &PrivateKey, context: &[u8]) -> Result<(), Error> {
        self.bind(Binding {
            purpose: Purpose::Sign,
            key: key.spec().clone(),
            context: context.to_vec(),
        })
    }

    /// Prepares to verify with `key`.
    pub fn init_verify(&self, key: &PublicKey, context: &[u8]) -> Result<(), Error> {
        self.bind(Binding {
            purpose: Purpose::Verify,
            key: key.spec().clone(),
            context: context.to_vec(),
        })
    }

    fn bind(&self, binding: Binding) -> Result<(), Error> {
        if !Arc::ptr_eq(binding.key.native(), &self.native) {
            return Err(Error::InvalidKey("key belongs to a different native engine"));
        }
        let mut state = self.lock();
        // A failed init leaves the signer unbound.
        *state = None;
        self.apply(&binding)?;
        debug!(
            kind = self.kind.label(),
            purpose = ?binding.purpose,
            key_type = %binding.key.key_type(),
            "signer initialized"
        );
        *state = Some(binding);
        Ok(())
    }

    /// Runs the native init for `binding`.
    fn apply(&self, binding: &Binding) -> Result<(), Error> {
        let handle = self.ensure_handle()?;
        let ctx = handle.lease()?;
        let ks = binding.key.lease()?;
        let context = Some(binding.context.as_slice());
        let context_len = len_i32(binding.context.len())?;
        let params = self.kind.params();
        let code = match binding.purpose {
            Purpose::Sign => self
                .native
                .signer_init_sign(&ctx, &ks, context, context_len, params),
            Purpose::Verify => self
                .native
                .signer_init_verify(&ctx, &ks, context, context_len, params),
        };
        check(code, Family::Signature, self.native.as_openssl())?;
        Ok(())
    }

    /// Feeds message bytes, or the mu in
    /// [`MuMode::External`].
    pub fn update(&self, data: &[u8]) -> Result<(), Error> {
        let state = self.lock();
        if state.is_none() {
            return Err(Error::IllegalState("signer not initialized"));
        }
        let ctx = self.handle()?.lease()?;
        let code = self.native.signer_update(
            self.kind.family(),
            &ctx,
            Some(data),
            0,
            len_i32(data.len())?,
        );
        check(code, Family::Signature, self.native.as_openssl())?;
        Ok(())
    }

    /// Signs everything fed since the last init.
    ///
    /// With [`MuMode::CalculateOnly`] this returns the mu.
    pub fn sign(&self) -> Result<Vec<u8>, Error> {
        let state = self.lock();
        let binding = bound(&state, Purpose::Sign)?;
        let result = self.native_sign();
        let rebound = self.apply(binding);
        let sig = result?;
        rebound?;
        Ok(sig)
    }

    fn native_sign(&self) -> Result<Vec<u8>, Error> {
        let family = self.kind.family();
        let ctx = self.handle()?.lease()?;
        let ossl = self.native.as_openssl();
        let len = check(self.native.signer_sign(family, &ctx, None, 0), Family::Signature, ossl)?;
        let mut sig = vec![0u8; len];
        let code = self.native.signer_sign(family, &ctx, Some(sig.as_mut_slice()), 0);
        let n = check(code, Family::Signature, ossl)?;
        sig.truncate(n);
        Ok(sig)
    }

    /// Verifies `sig` over everything fed since the last init.
    ///
    /// An invalid signature is `Ok(false)`, not an error.
    pub fn verify(&self, sig: &[u8]) -> Result<bool, Error> {
        let state = self.lock();
        let binding = bound(&state, Purpose::Verify)?;
        let result = self.native_verify(sig);
        let rebound = self.apply(binding);
        let valid = result?;
        rebound?;
        Ok(valid)
    }

    fn native_verify(&self, sig: &[u8]) -> Result<bool, Error> {
        let ctx = self.handle()?.lease()?;
        let code = self.native.signer_verify(
            self.kind.family(),
            &ctx,
            Some(sig),
            len_i32(sig.len())?,
        );
        match code {
            0 => Ok(true),
            -1 => Ok(false),
            c if c < 0 => Err(translate(c, Family::Signature, self.native.as_openssl())),
            _ => Err(Error::IllegalState("unexpected verification result")),
        }
    }

    fn handle(&self) -> Result<&NativeRef, Error> {
        self.handle
            .get()
            .ok_or(Error::IllegalState("signer not initialized"))
    }

    /// Releases the native context now. Later calls fail.
    pub fn dispose(&self) {
        if let Some(handle) = self.handle.get() {
            handle.dispose();
        }
    }

    /// Reports whether [`Signer::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.handle.get().is_some_and(NativeRef::is_disposed)
    }
}

fn bound<'a>(state: &'a Option<Binding>, purpose: Purpose) -> Result<&'a Binding, Error> {
    match state {
        Some(binding) if binding.purpose == purpose => Ok(binding),
        Some(_) => Err(Error::IllegalState(match purpose {
            Purpose::Sign => "signer initialized for verification",
            Purpose::Verify => "signer initialized for signing",
        })),
        None => Err(Error::IllegalState("signer not initialized")),
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("kind", &self.kind)
            .field("handle", &self.handle.get().map(NativeRef::label))
            .finish_non_exhaustive()
    }
}
