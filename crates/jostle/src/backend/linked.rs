use jostle_sys::Api;

use super::Ffi;
use crate::config::Interface;

impl Ffi {
    /// Binds the engine linked into this binary.
    pub fn linked() -> Self {
        Self {
            api: Api::linked(),
            interface: Interface::Linked,
            _libs: Vec::new(),
        }
    }
}
