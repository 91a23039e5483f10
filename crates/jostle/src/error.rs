use buggy::Bug;

/// Encompasses the errors returned by this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An argument was invalid.
    ///
    /// It describes why the argument is invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// A key was missing, of the wrong type, or of the wrong
    /// length.
    #[error("invalid key: {0}")]
    InvalidKey(&'static str),
    /// An IV, tag length, or other algorithm parameter was
    /// invalid.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// An output buffer is shorter than the operation requires.
    #[error("buffer too small: {0}")]
    BufferTooSmall(&'static str),
    /// Input to a cipher without padding was not a whole number
    /// of blocks.
    #[error("illegal block size: {0}")]
    IllegalBlockSize(&'static str),
    /// The native engine could not access a buffer.
    #[error("unreadable buffer: {0}")]
    UnreadableBuffer(&'static str),
    /// A size does not fit the native 32-bit length contract.
    #[error("integer overflow: {0}")]
    IntegerOverflow(&'static str),
    /// The algorithm, mode, padding, or key length combination
    /// is not supported.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    /// The operation is not valid in the current state.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
    /// Decrypted padding was malformed.
    #[error("bad padding: {0}")]
    BadPadding(&'static str),
    /// An authentication tag did not verify.
    #[error("bad tag: {0}")]
    BadTag(&'static str),
    /// The native cryptography engine failed.
    ///
    /// It carries the text drained from the engine's error
    /// queue.
    #[error("engine error: {0}")]
    Engine(String),
    /// The native engine returned a fault code this crate does
    /// not know.
    #[error("unknown fault code {code}: {detail}")]
    Unknown {
        /// The raw code.
        code: i32,
        /// Whatever the engine's error queue held.
        detail: String,
    },
    /// No native interface could be bound.
    #[error("native interface unavailable: {0}")]
    Unavailable(String),
    /// An internal bug was discovered.
    #[error(transparent)]
    Bug(#[from] Bug),
}

impl Error {
    /// Returns the abstract kind of the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_)
            | Self::InvalidKey(_)
            | Self::InvalidParameter(_)
            | Self::IllegalBlockSize(_) => ErrorKind::InvalidArgument,
            Self::BufferTooSmall(_) => ErrorKind::BufferTooSmall,
            Self::UnreadableBuffer(_) => ErrorKind::UnreadableBuffer,
            Self::IntegerOverflow(_) => ErrorKind::IntegerOverflow,
            Self::Unsupported(_) => ErrorKind::UnsupportedConfiguration,
            Self::BadPadding(_) | Self::BadTag(_) => ErrorKind::IntegrityFailure,
            Self::Engine(_) => ErrorKind::EngineFault,
            Self::Unknown { .. } => ErrorKind::UnknownFault,
            Self::IllegalState(_) => ErrorKind::IllegalState,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Bug(_) => ErrorKind::Bug,
        }
    }
}

/// The abstract category of an [`Error`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Null, negative, out of range, or otherwise invalid
    /// input.
    InvalidArgument,
    /// An output buffer was too small.
    BufferTooSmall,
    /// The native engine could not access a buffer.
    UnreadableBuffer,
    /// A size would exceed the native 32-bit length contract.
    IntegerOverflow,
    /// Unsupported algorithm, mode, padding, or key length.
    UnsupportedConfiguration,
    /// Bad padding or an invalid authentication tag.
    IntegrityFailure,
    /// The native engine reported an internal error.
    EngineFault,
    /// An unrecognized fault code.
    UnknownFault,
    /// The operation was issued in the wrong state.
    IllegalState,
    /// No native interface is bound.
    Unavailable,
    /// An internal bug.
    Bug,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_faults_are_invalid_arguments() {
        for err in [
            Error::InvalidKey("invalid key size"),
            Error::InvalidParameter("iv is null"),
        ] {
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{err}");
        }
    }

    #[test]
    fn test_integrity_failures() {
        assert_eq!(
            Error::BadTag("tag invalid").kind(),
            ErrorKind::IntegrityFailure
        );
        assert_eq!(
            Error::BadPadding("invalid cipher text").kind(),
            ErrorKind::IntegrityFailure
        );
    }

    #[test]
    fn test_unknown_display() {
        let err = Error::Unknown {
            code: -1000,
            detail: String::new(),
        };
        assert_eq!(err.to_string(), "unknown fault code -1000: ");
    }
}
