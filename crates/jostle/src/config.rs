//! Loader configuration.
//!
//! [`Config`] decides which native interface is bound and where the
//! engine library is found. It is read from the environment by
//! [`Config::from_env`], or deserialized with `serde`.
//!
//! | Variable              | Field                  |
//! |-----------------------|------------------------|
//! | `JOSTLE_INTERFACE`    | [`Config::interface`]  |
//! | `JOSTLE_LOAD_LIB_<n>` | [`Config::preload`]    |
//! | `JOSTLE_LIBRARY`      | [`Config::library`]    |
//! | `JOSTLE_LOAD_NAME_<n>`| [`Config::names`]      |
//! | `JOSTLE_PROVIDER`     | [`Config::provider`]   |
//!
//! Numbered variables are applied in ascending `n` order.

use core::{fmt, str::FromStr};
use std::{ffi::OsString, path::PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::Error;

/// The short name of the engine library.
pub const DEFAULT_LIBRARY_NAME: &str = "interface_ffi";

const INTERFACE_VAR: &str = "JOSTLE_INTERFACE";
const LIBRARY_VAR: &str = "JOSTLE_LIBRARY";
const PROVIDER_VAR: &str = "JOSTLE_PROVIDER";
const PRELOAD_PREFIX: &str = "JOSTLE_LOAD_LIB_";
const NAME_PREFIX: &str = "JOSTLE_LOAD_NAME_";

/// How native calls are bound.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    /// Try [`Interface::Dynamic`], then [`Interface::Linked`].
    #[default]
    Auto,
    /// Symbols bound by the linker (feature `linked`).
    #[serde(alias = "jni")]
    Linked,
    /// Symbols resolved at runtime with `dlsym`.
    #[serde(alias = "ffi")]
    Dynamic,
    /// Native calls are disabled.
    None,
}

impl Interface {
    /// The name used in configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Linked => "linked",
            Self::Dynamic => "dynamic",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interface {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "linked" | "jni" => Ok(Self::Linked),
            "dynamic" | "ffi" => Ok(Self::Dynamic),
            "none" => Ok(Self::None),
            _ => Err(Error::InvalidArgument(
                "interface must be one of auto, linked, dynamic or none",
            )),
        }
    }
}

/// Loader configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which interface to bind.
    pub interface: Interface,
    /// Libraries opened before the engine library, with their
    /// symbols made global. They stay open for the life of the
    /// process.
    pub preload: Vec<PathBuf>,
    /// The engine library's path. Takes precedence over
    /// [`Config::names`].
    pub library: Option<PathBuf>,
    /// Short library names tried in order when
    /// [`Config::library`] is unset.
    pub names: Vec<String>,
    /// An OpenSSL provider loaded once the interface is bound.
    pub provider: Option<String>,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(std::env::vars_os().filter_map(|(k, v)| {
            let k = k.into_string().ok()?;
            Some((k, v))
        }))
    }

    /// Reads the configuration from `(name, value)` pairs.
    ///
    /// Unrelated names are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OsString>,
    {
        let mut cfg = Self::default();
        let mut preload = Vec::new();
        let mut names = Vec::new();
        for (key, value) in vars {
            let key = key.as_ref();
            let value = value.into();
            if key == INTERFACE_VAR {
                cfg.interface = value
                    .to_str()
                    .ok_or(Error::InvalidArgument("interface is not valid UTF-8"))?
                    .parse()?;
            } else if key == LIBRARY_VAR {
                cfg.library = non_empty(value).map(PathBuf::from);
            } else if key == PROVIDER_VAR {
                cfg.provider = non_empty(value)
                    .map(|v| {
                        v.into_string()
                            .map_err(|_| Error::InvalidArgument("provider is not valid UTF-8"))
                    })
                    .transpose()?;
            } else if let Some(n) = numbered(key, PRELOAD_PREFIX) {
                if let Some(v) = non_empty(value) {
                    preload.push((n, PathBuf::from(v)));
                }
            } else if let Some(n) = numbered(key, NAME_PREFIX) {
                if let Some(v) = non_empty(value) {
                    let v = v
                        .into_string()
                        .map_err(|_| Error::InvalidArgument("library name is not valid UTF-8"))?;
                    names.push((n, v));
                }
            }
        }
        preload.sort_by_key(|(n, _)| *n);
        names.sort_by_key(|(n, _)| *n);
        cfg.preload = preload.into_iter().map(|(_, v)| v).collect();
        cfg.names = names.into_iter().map(|(_, v)| v).collect();
        debug!(?cfg, "read configuration");
        Ok(cfg)
    }

    /// The short library names to try, in order.
    pub fn library_names(&self) -> impl Iterator<Item = &str> {
        let default = self.names.is_empty().then_some(DEFAULT_LIBRARY_NAME);
        self.names.iter().map(String::as_str).chain(default)
    }
}

fn non_empty(v: OsString) -> Option<OsString> {
    (!v.is_empty()).then_some(v)
}

/// Parses `<prefix><n>`.
fn numbered(key: &str, prefix: &str) -> Option<u32> {
    key.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.interface, Interface::Auto);
        assert_eq!(cfg.library_names().collect::<Vec<_>>(), [DEFAULT_LIBRARY_NAME]);
    }

    #[test]
    fn test_numbered_vars_are_ordered() {
        let cfg = Config::from_vars([
            ("JOSTLE_LOAD_LIB_10", "/opt/c.so"),
            ("JOSTLE_LOAD_LIB_2", "/opt/b.so"),
            ("JOSTLE_LOAD_LIB_1", "/opt/a.so"),
            ("JOSTLE_LOAD_LIB_x", "/opt/ignored.so"),
            ("JOSTLE_LOAD_NAME_1", "jostle_b"),
            ("JOSTLE_LOAD_NAME_0", "jostle_a"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap();
        assert_eq!(
            cfg.preload,
            [
                PathBuf::from("/opt/a.so"),
                PathBuf::from("/opt/b.so"),
                PathBuf::from("/opt/c.so"),
            ]
        );
        assert_eq!(cfg.library_names().collect::<Vec<_>>(), ["jostle_a", "jostle_b"]);
    }

    #[test]
    fn test_interface_values() {
        for (s, want) in [
            ("auto", Interface::Auto),
            ("", Interface::Auto),
            ("LINKED", Interface::Linked),
            ("jni", Interface::Linked),
            ("dynamic", Interface::Dynamic),
            ("ffi", Interface::Dynamic),
            (" none ", Interface::None),
        ] {
            assert_eq!(s.parse::<Interface>().unwrap(), want, "{s:?}");
        }
        let err = Config::from_vars([("JOSTLE_INTERFACE", "panama")]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let cfg = Config::from_vars([
            ("JOSTLE_LIBRARY", ""),
            ("JOSTLE_PROVIDER", ""),
            ("JOSTLE_LOAD_LIB_1", ""),
        ])
        .unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_deserialize() {
        let cfg: Config = serde_json::from_str(
            r#"{
                "interface": "ffi",
                "library": "/opt/jostle/libinterface_ffi.so",
                "provider": "default"
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.interface, Interface::Dynamic);
        assert_eq!(
            cfg.library.as_deref(),
            Some(std::path::Path::new("/opt/jostle/libinterface_ffi.so"))
        );
        assert_eq!(cfg.provider.as_deref(), Some("default"));
        assert!(cfg.preload.is_empty());
    }
}
