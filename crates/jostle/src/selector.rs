//! Process-wide choice of native interface.
//!
//! The first call to [`native`] reads [`Config::from_env`], binds an
//! interface, and caches the outcome for the life of the process.
//! A failure is logged once and every later call returns the same
//! [`Error::Unavailable`] without trying again.
//!
//! A host that wants its own implementation calls [`install`]
//! before anything asks for [`native`].

use std::sync::{Arc, OnceLock};

use tracing::{debug, error};

use crate::{
    backend::Ffi,
    config::{Config, Interface},
    error::Error,
    ni::Native,
    openssl::{is_available, set_provider},
};

struct Selected {
    native: Arc<dyn Native>,
    interface: Option<Interface>,
}

static SELECTED: OnceLock<Result<Selected, String>> = OnceLock::new();

fn selected() -> &'static Result<Selected, String> {
    SELECTED.get_or_init(|| {
        let res = Config::from_env().and_then(|cfg| {
            let native = select(&cfg)?;
            let interface = Some(cfg.interface);
            Ok(Selected { native, interface })
        });
        res.map_err(|err| {
            error!(%err, "unable to bind a native interface");
            err.to_string()
        })
    })
}

/// Returns the process-wide native engine.
pub fn native() -> Result<Arc<dyn Native>, Error> {
    match selected() {
        Ok(sel) => Ok(Arc::clone(&sel.native)),
        Err(reason) => Err(Error::Unavailable(reason.clone())),
    }
}

/// The interface [`native`] bound, or `None` if it failed or an
/// implementation was [`install`]ed.
pub fn selected_interface() -> Option<Interface> {
    selected().as_ref().ok().and_then(|sel| sel.interface)
}

/// Makes `native` the process-wide engine.
///
/// It fails with [`Error::IllegalState`] once an engine has been
/// chosen.
pub fn install(native: Arc<dyn Native>) -> Result<(), Error> {
    let mut installed = false;
    SELECTED.get_or_init(|| {
        installed = true;
        debug!("installed native engine");
        Ok(Selected {
            native: Arc::clone(&native),
            interface: None,
        })
    });
    if installed {
        Ok(())
    } else {
        Err(Error::IllegalState("native engine already selected"))
    }
}

/// Binds an interface as `config` describes, without caching it.
///
/// With [`Interface::Auto`], runtime loading is tried first and
/// the linked interface (when built) is the fallback. The engine
/// must report itself available, and [`Config::provider`] is loaded
/// before it is returned.
pub fn select(config: &Config) -> Result<Arc<dyn Native>, Error> {
    let ffi = match config.interface {
        Interface::None => {
            return Err(Error::Unavailable(String::from(
                "native interface disabled by configuration",
            )));
        }
        Interface::Dynamic => Ffi::load(config)?,
        Interface::Linked => linked()?,
        Interface::Auto => match Ffi::load(config) {
            Ok(ffi) => ffi,
            Err(err) => {
                debug!(%err, "runtime loading failed, trying the linked interface");
                linked().map_err(|_| err)?
            }
        },
    };
    debug!(interface = %ffi.interface(), "bound native interface");
    bind(Arc::new(ffi), config)
}

/// Checks that `native` is usable and loads [`Config::provider`].
fn bind(native: Arc<dyn Native>, config: &Config) -> Result<Arc<dyn Native>, Error> {
    if !is_available(&*native) {
        return Err(Error::Unavailable(String::from(
            "native engine reports it is not available",
        )));
    }
    if let Some(name) = &config.provider {
        set_provider(&*native, name)?;
    }
    Ok(native)
}

#[cfg(feature = "linked")]
fn linked() -> Result<Ffi, Error> {
    Ok(Ffi::linked())
}

#[cfg(not(feature = "linked"))]
fn linked() -> Result<Ffi, Error> {
    Err(Error::Unavailable(String::from(
        "built without the `linked` feature",
    )))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::error::ErrorKind;

    #[test_log::test]
    fn test_disabled() {
        let cfg = Config {
            interface: Interface::None,
            ..Config::default()
        };
        let err = select(&cfg).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test_log::test]
    fn test_dynamic_without_library() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            interface: Interface::Dynamic,
            library: Some(dir.path().join("libinterface_ffi.so")),
            ..Config::default()
        };
        let err = select(&cfg).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[cfg(feature = "testing")]
    #[test_log::test]
    fn test_bind_loads_provider() {
        use crate::soft::SoftEngine;

        let soft: Arc<dyn Native> = Arc::new(SoftEngine::new());
        let cfg = Config {
            provider: Some(String::from("default")),
            ..Config::default()
        };
        let bound = bind(Arc::clone(&soft), &cfg).ok().unwrap();
        assert!(Arc::ptr_eq(&bound, &soft));

        let cfg = Config {
            provider: Some(String::from("fips")),
            ..Config::default()
        };
        let err = bind(soft, &cfg).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::EngineFault, "{err}");
    }

    #[cfg(not(feature = "linked"))]
    #[test_log::test]
    fn test_linked_not_built() {
        let cfg = Config {
            interface: Interface::Linked,
            ..Config::default()
        };
        let err = select(&cfg).err().unwrap();
        assert!(err.to_string().contains("linked"), "{err}");
    }
}
