use core::ffi::CStr;

/// A dynamic loader failure.
///
/// The message is the text reported by `dlerror(3)` at the time of
/// the failure.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{msg}")]
pub struct Error {
    msg: String,
}

impl Error {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }

    /// Returns the loader's description of the failure.
    pub fn message(&self) -> &str {
        &self.msg
    }
}

/// Returns the pending `dlerror(3)` text, clearing it.
pub(crate) fn dlerror() -> Error {
    // SAFETY: FFI call, no invariants.
    let ptr = unsafe { libc::dlerror() };
    if ptr.is_null() {
        return Error::new("unknown dynamic loader error");
    }
    // SAFETY: `dlerror` returned a non-null, NUL-terminated
    // string that stays valid until the next loader call on this
    // thread, and we copy it out immediately.
    let msg = unsafe { CStr::from_ptr(ptr) };
    Error::new(msg.to_string_lossy())
}

/// Discards any pending `dlerror(3)` text.
pub(crate) fn clear_dlerror() {
    // SAFETY: FFI call, no invariants.
    let _ = unsafe { libc::dlerror() };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::new("libnope.so: cannot open shared object file");
        assert_eq!(err.to_string(), err.message());
        eprintln!("{err}");
    }
}
