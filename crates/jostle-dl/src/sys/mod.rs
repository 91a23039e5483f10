pub(crate) mod linux;
pub(crate) mod macos;
pub(crate) mod unix;
