#![cfg(target_family = "unix")]

use core::{
    ffi::{CStr, c_int, c_void},
    ptr::NonNull,
};

pub use libc::{RTLD_GLOBAL, RTLD_LAZY, RTLD_LOCAL, RTLD_NOW};

use crate::error::{Error, clear_dlerror, dlerror};

/// A raw library handle.
pub type RawLib = NonNull<c_void>;

/// See `dlopen(3)`.
pub fn dlopen(path: &CStr, flags: c_int) -> Result<RawLib, Error> {
    // SAFETY: FFI call, no invariants.
    let lib = unsafe { libc::dlopen(path.as_ptr(), flags) };
    NonNull::new(lib).ok_or_else(dlerror)
}

/// See `dlsym(3)`.
pub fn dlsym(lib: RawLib, name: &CStr) -> Result<NonNull<c_void>, Error> {
    // A null symbol is only an error if `dlerror` says so.
    clear_dlerror();
    // SAFETY: FFI call, `lib` came from `dlopen` and has not been
    // closed.
    let sym = unsafe { libc::dlsym(lib.as_ptr(), name.as_ptr()) };
    match NonNull::new(sym) {
        Some(sym) => Ok(sym),
        None => Err(dlerror()),
    }
}

/// See `dlclose(3)`.
pub fn dlclose(lib: RawLib) -> Result<(), Error> {
    // SAFETY: FFI call, `lib` came from `dlopen` and is closed at
    // most once by its owner.
    let ret = unsafe { libc::dlclose(lib.as_ptr()) };
    if ret != 0 { Err(dlerror()) } else { Ok(()) }
}
