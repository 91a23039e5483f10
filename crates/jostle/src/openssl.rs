//! Access to the OpenSSL library under the engine.

use std::ffi::CString;

use tracing::debug;

use crate::{
    error::Error,
    fault::{Family, check},
    ni::Native,
};

/// Drains the OpenSSL error queue of the calling thread.
///
/// Returns `None` if the queue was empty.
pub fn errors(native: &dyn Native) -> Option<String> {
    native.openssl_errors().filter(|s| !s.is_empty())
}

/// Returns the OpenSSL version the engine was built against.
pub fn library_version(native: &dyn Native) -> Result<String, Error> {
    native
        .openssl_version()
        .ok_or(Error::IllegalState("engine did not report a version"))
}

/// Loads the OpenSSL provider `name`.
pub fn set_provider(native: &dyn Native, name: &str) -> Result<(), Error> {
    let name = CString::new(name)
        .map_err(|_| Error::InvalidArgument("provider name contains a NUL byte"))?;
    let code = native.set_openssl_module(Some(&name));
    check(code, Family::Library, native.as_openssl())?;
    debug!(provider = ?name, "loaded provider");
    Ok(())
}

/// Reports whether the engine is usable.
pub fn is_available(native: &dyn Native) -> bool {
    native.is_native_available()
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{error::ErrorKind, soft::SoftEngine};

    #[test_log::test]
    fn test_provider() {
        let engine = SoftEngine::new();
        set_provider(&engine, "default").unwrap();

        let err = set_provider(&engine, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = set_provider(&engine, "fips").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineFault);
        assert!(err.to_string().contains("fips"), "{err}");

        // The failed load left nothing behind.
        assert_eq!(errors(&engine), None);
    }

    #[test_log::test]
    fn test_version() {
        let engine = SoftEngine::new();
        assert!(library_version(&engine).unwrap().starts_with("OpenSSL 3"));
        assert!(is_available(&engine));
    }
}
