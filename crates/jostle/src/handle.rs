//! Ownership of native handles.
//!
//! A [`NativeRef`] owns exactly one handle and releases it exactly
//! once, either through [`NativeRef::dispose`] or on drop. Every
//! native call that uses the handle goes through a [`Lease`], which
//! borrows the [`NativeRef`] for the duration of the call. While a
//! lease exists the handle cannot be released: a concurrent
//! [`NativeRef::dispose`] waits for it.

use core::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use tracing::debug;

use crate::{
    error::Error,
    keys::KeyFamily,
    ni::{Handle, Native},
};

/// The kind of native object a [`NativeRef`] owns, which decides
/// how it is released.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Resource {
    BlockCipher,
    KeySpec,
    Asn1,
    Signer(KeyFamily),
    Digest,
}

/// An owned native handle.
pub(crate) struct NativeRef {
    raw: Handle,
    resource: Resource,
    label: String,
    native: Arc<dyn Native>,
    disposed: AtomicBool,
    in_use: RwLock<()>,
}

impl NativeRef {
    /// Takes ownership of `raw`.
    ///
    /// `raw` must have just been returned by an allocating call of
    /// `native`, and must not be owned by anything else.
    pub(crate) fn new(
        raw: Handle,
        resource: Resource,
        name: &str,
        native: Arc<dyn Native>,
    ) -> Result<Self, Error> {
        if raw == 0 {
            return Err(Error::IllegalState("unexpected null pointer from native layer"));
        }
        let label = format!("Reference({name}) {raw:#x}");
        debug!(%label, "allocated");
        Ok(Self {
            raw,
            resource,
            label,
            native,
            disposed: AtomicBool::new(false),
            in_use: RwLock::new(()),
        })
    }

    /// Borrows the handle for one or more native calls.
    pub(crate) fn lease(&self) -> Result<Lease<'_>, Error> {
        let guard = self.in_use.read().unwrap_or_else(PoisonError::into_inner);
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::IllegalState("native reference has been disposed"));
        }
        Ok(Lease {
            raw: self.raw,
            _guard: guard,
        })
    }

    /// Releases the handle.
    ///
    /// Only the first call has any effect; it waits for leases
    /// that are still in flight.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _guard = self.in_use.write().unwrap_or_else(PoisonError::into_inner);
        // SAFETY: `raw` came from `native` with this resource kind,
        // the latch makes this the only release, and the write lock
        // means no lease is outstanding.
        unsafe {
            match self.resource {
                Resource::BlockCipher => self.native.cipher_dispose(self.raw),
                Resource::KeySpec => self.native.spec_dispose(self.raw),
                Resource::Asn1 => self.native.asn1_dispose(self.raw),
                Resource::Signer(family) => self.native.signer_dispose(family, self.raw),
                Resource::Digest => self.native.md_dispose(self.raw),
            }
        }
        debug!(label = %self.label, "disposed");
    }

    /// Reports whether the handle has been released.
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn native(&self) -> &Arc<dyn Native> {
        &self.native
    }
}

impl Drop for NativeRef {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for NativeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRef")
            .field("label", &self.label)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

/// A live borrow of a native handle.
///
/// The handle cannot be released while a `Lease` for it exists.
/// Leases are only created by this crate.
#[clippy::has_significant_drop]
pub struct Lease<'a> {
    raw: Handle,
    _guard: RwLockReadGuard<'a, ()>,
}

impl fmt::Debug for Lease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lease({:#x})", self.raw)
    }
}

impl Lease<'_> {
    /// The raw handle, valid while the lease lives.
    pub fn raw(&self) -> Handle {
        self.raw
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::{
        sync::{Barrier, mpsc},
        thread,
        time::Duration,
    };

    use super::*;
    use crate::{ni::SpecNi, soft::SoftEngine};

    fn spec(engine: &Arc<SoftEngine>) -> NativeRef {
        let raw = engine.spec_allocate();
        NativeRef::new(raw, Resource::KeySpec, "KeySpec", engine.clone()).unwrap()
    }

    #[test_log::test]
    fn test_zero_handle_rejected() {
        let engine = Arc::new(SoftEngine::new());
        let err = NativeRef::new(0, Resource::KeySpec, "KeySpec", engine).unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[test_log::test]
    fn test_dispose_idempotent() {
        let engine = Arc::new(SoftEngine::new());
        let r = spec(&engine);
        assert!(r.label().starts_with("Reference(KeySpec) 0x"));
        assert_eq!(engine.live_handles(), 1);

        r.dispose();
        r.dispose();
        assert!(r.is_disposed());
        drop(r);

        assert_eq!(engine.live_handles(), 0);
        assert_eq!(engine.double_frees(), 0);
    }

    #[test_log::test]
    fn test_drop_disposes() {
        let engine = Arc::new(SoftEngine::new());
        drop(spec(&engine));
        assert_eq!(engine.live_handles(), 0);
        assert_eq!(engine.double_frees(), 0);
    }

    #[test_log::test]
    fn test_lease_after_dispose() {
        let engine = Arc::new(SoftEngine::new());
        let r = spec(&engine);
        r.dispose();
        let err = r.lease().unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[test_log::test]
    fn test_dispose_waits_for_lease() {
        let engine = Arc::new(SoftEngine::new());
        let r = Arc::new(spec(&engine));
        let (tx, rx) = mpsc::channel();

        let lease = r.lease().unwrap();
        let t = thread::spawn({
            let r = Arc::clone(&r);
            let engine = Arc::clone(&engine);
            move || {
                r.dispose();
                tx.send(engine.live_handles()).unwrap();
            }
        });

        // The disposer must block on the lease.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(engine.live_handles(), 1);
        drop(lease);

        assert_eq!(rx.recv().unwrap(), 0);
        t.join().unwrap();
    }

    #[test_log::test]
    fn test_concurrent_dispose() {
        const N: usize = 8;
        let engine = Arc::new(SoftEngine::new());
        let r = Arc::new(spec(&engine));
        let barrier = Arc::new(Barrier::new(N));

        let threads = (0..N)
            .map(|_| {
                let r = Arc::clone(&r);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    r.dispose();
                })
            })
            .collect::<Vec<_>>();
        for t in threads {
            t.join().unwrap();
        }
        drop(r);

        assert_eq!(engine.live_handles(), 0);
        assert_eq!(engine.double_frees(), 0);
    }
}
