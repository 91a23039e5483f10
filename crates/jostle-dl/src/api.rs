use core::{
    ffi::{CStr, c_void},
    fmt, mem,
    ptr::NonNull,
};
use std::{ffi::CString, os::unix::ffi::OsStrExt, path::Path};

use cfg_if::cfg_if;
use tracing::{debug, warn};

use super::error::Error;

cfg_if! {
    if #[cfg(target_os = "linux")] {
        use super::sys::linux as imp;
    } else if #[cfg(target_os = "macos")] {
        use super::sys::macos as imp;
    } else {
        compile_error!("unsupported OS");
    }
}

pub use imp::{RTLD_GLOBAL, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};

/// Returns the platform file name for the short library name
/// `name`.
///
/// ```
/// let file = jostle_dl::library_file_name("interface_ffi");
/// assert!(file.starts_with("libinterface_ffi."));
/// ```
pub fn library_file_name(name: &str) -> String {
    format!("{}{name}{}", imp::LIB_PREFIX, imp::LIB_SUFFIX)
}

/// An open dynamic library.
///
/// It's closed on drop.
#[clippy::has_significant_drop]
pub struct Library {
    lib: imp::RawLib,
    name: String,
}

// SAFETY: the loader's handles may be used and closed from any
// thread.
unsafe impl Send for Library {}
// SAFETY: `dlsym` is thread safe and `Library` has no interior
// mutability.
unsafe impl Sync for Library {}

impl Library {
    /// Opens the library at `path` with `RTLD_NOW | RTLD_LOCAL`.
    ///
    /// A `path` without a slash is searched for using the loader's
    /// usual rules.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with(path, RTLD_NOW | RTLD_LOCAL)
    }

    /// Opens the library at `path` with `RTLD_NOW | RTLD_GLOBAL`,
    /// making its symbols available to libraries opened later.
    pub fn open_global(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with(path, RTLD_NOW | RTLD_GLOBAL)
    }

    /// Opens the short library name `name`, e.g., `interface_ffi`
    /// for `libinterface_ffi.so`.
    pub fn open_name(name: &str) -> Result<Self, Error> {
        Self::open(library_file_name(name))
    }

    /// Opens the library at `path` with `dlopen(3)` flags.
    pub fn open_with(path: impl AsRef<Path>, flags: libc::c_int) -> Result<Self, Error> {
        let path = path.as_ref();
        let cpath = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| Error::new("library path contains a NUL byte"))?;
        let lib = imp::dlopen(&cpath, flags)?;
        let name = path.display().to_string();
        debug!(library = %name, "opened library");
        Ok(Self { lib, name })
    }

    /// Returns the name the library was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the address of the symbol `name`.
    pub fn symbol(&self, name: &CStr) -> Result<NonNull<c_void>, Error> {
        imp::dlsym(self.lib, name).map_err(|err| {
            debug!(library = %self.name, symbol = ?name, %err, "missing symbol");
            err
        })
    }

    /// Returns the symbol `name` as a `F`.
    ///
    /// # Safety
    ///
    /// - `F` must be a function pointer type whose signature matches
    ///   the symbol's definition.
    /// - The returned value must not be used after this `Library` is
    ///   dropped.
    pub unsafe fn get<F: Copy>(&self, name: &CStr) -> Result<F, Error> {
        if size_of::<F>() != size_of::<*mut c_void>() {
            return Err(Error::new("symbol type is not pointer sized"));
        }
        let sym = self.symbol(name)?.as_ptr();
        // SAFETY: `F` is pointer sized, and the caller guarantees
        // that it is a function pointer matching the symbol.
        Ok(unsafe { mem::transmute_copy::<*mut c_void, F>(&sym) })
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        match imp::dlclose(self.lib) {
            Ok(()) => debug!(library = %self.name, "closed library"),
            Err(err) => warn!(library = %self.name, %err, "unable to close library"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use core::ffi::c_char;

    use super::*;

    #[test_log::test]
    fn test_open_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(library_file_name("jostle_missing"));
        let err = Library::open(&path).unwrap_err();
        assert!(!err.message().is_empty());
    }

    #[test_log::test]
    fn test_open_not_a_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(library_file_name("garbage"));
        std::fs::write(&path, b"definitely not an object file").unwrap();
        Library::open(&path).unwrap_err();
    }

    #[test]
    fn test_path_with_nul() {
        let err = Library::open("lib\0nope.so").unwrap_err();
        assert_eq!(err.message(), "library path contains a NUL byte");
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test_log::test]
    fn test_resolve_symbol() {
        let lib = Library::open("libc.so.6").unwrap();
        assert_eq!(lib.name(), "libc.so.6");

        // SAFETY: `strlen` has this signature.
        let strlen = unsafe { lib.get::<unsafe extern "C" fn(*const c_char) -> usize>(c"strlen") }
            .unwrap();
        // SAFETY: the argument is NUL terminated.
        assert_eq!(unsafe { strlen(c"jostle".as_ptr()) }, 6);

        lib.symbol(c"jostle_no_such_symbol").unwrap_err();
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn test_get_wrong_size() {
        let lib = Library::open("libc.so.6").unwrap();
        // SAFETY: rejected before any transmute.
        let res = unsafe { lib.get::<[usize; 2]>(c"strlen") };
        assert!(res.is_err());
    }
}
