use jostle_dl::Library;
use jostle_sys::Api;
use tracing::{debug, warn};

use super::Ffi;
use crate::{
    config::{Config, Interface},
    error::Error,
};

impl Ffi {
    /// Opens the engine library named by `config` and resolves
    /// every entry point.
    ///
    /// Libraries in [`Config::preload`] are opened first, with
    /// their symbols made global, and stay open for as long as the
    /// returned [`Ffi`].
    pub fn load(config: &Config) -> Result<Self, Error> {
        let mut libs = Vec::with_capacity(config.preload.len().saturating_add(1));
        for path in &config.preload {
            let lib = Library::open_global(path).map_err(|err| {
                warn!(path = %path.display(), %err, "unable to preload library");
                Error::Unavailable(format!("unable to load {}: {err}", path.display()))
            })?;
            libs.push(lib);
        }

        let lib = open_interface(config)?;
        // SAFETY: every entry in `Api` is declared with the
        // signature the library defines, and `lib` is kept alive in
        // the returned value.
        let api = unsafe { Api::resolve(|name| lib.symbol(name)) }
            .map_err(|err| Error::Unavailable(format!("{}: {err}", lib.name())))?;
        debug!(library = lib.name(), symbols = Api::SYMBOLS.len(), "resolved native interface");
        libs.push(lib);

        Ok(Self {
            api,
            interface: Interface::Dynamic,
            _libs: libs,
        })
    }
}

fn open_interface(config: &Config) -> Result<Library, Error> {
    if let Some(path) = &config.library {
        return Library::open(path).map_err(|err| Error::Unavailable(err.to_string()));
    }
    let mut errs = Vec::new();
    for name in config.library_names() {
        match Library::open_name(name) {
            Ok(lib) => return Ok(lib),
            Err(err) => {
                debug!(name, %err, "unable to open library");
                errs.push(err.to_string());
            }
        }
    }
    Err(Error::Unavailable(errs.join("; ")))
}
