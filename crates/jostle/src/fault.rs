//! Translation of native fault codes.
//!
//! Every native entry point returns an `i32`. Non-negative values
//! are success, frequently a byte count. Negative values name a
//! [`FaultCode`]. The numbering is fixed by the native engine and
//! must never be reused.
//!
//! The same code can mean different things depending on which
//! entry point produced it, so [`check`] takes the [`Family`] of the
//! call.

use buggy::BugExt;

use crate::{error::Error, ni::OpenSslNi};

macro_rules! fault_codes {
    ($($name:ident = $code:literal => $err:ident($msg:literal),)*) => {
        /// A fault reported by the native engine.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(i32)]
        #[non_exhaustive]
        pub enum FaultCode {
            $(
                #[allow(missing_docs)]
                $name = $code,
            )*
        }

        impl FaultCode {
            /// Every known fault code.
            pub const ALL: &[Self] = &[$(Self::$name,)*];

            /// Looks up a raw code.
            pub const fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$name),)*
                    _ => None,
                }
            }

            /// Returns the code's fixed message.
            pub const fn message(self) -> &'static str {
                match self {
                    $(Self::$name => $msg,)*
                }
            }

            /// The error a code maps to when the family does not
            /// override it.
            fn default_error(self) -> Error {
                match self {
                    $(Self::$name => Error::$err($msg),)*
                }
            }
        }
    };
}

fault_codes! {
    Fail = -1 => IllegalState("operation failed"),
    OpensslError = -2 => IllegalState("openssl error"),
    ProvNameNull = -3 => InvalidArgument("provider name is null"),
    ProvNameEmpty = -4 => InvalidArgument("provider name is empty"),
    InvalidOpMode = -5 => IllegalState("invalid operation mode"),
    InvalidCipher = -6 => Unsupported("cipher not supported"),
    InvalidMode = -7 => Unsupported("mode not supported for cipher"),
    InvalidKeyLen = -8 => InvalidKey("key length is invalid"),
    InvalidIvLen = -9 => InvalidParameter("iv length is invalid"),
    FailedAccessKey = -10 => UnreadableBuffer("unable to access key"),
    FailedAccessIv = -11 => UnreadableBuffer("unable to access iv"),
    KeyIsNull = -12 => InvalidKey("key is null"),
    IvIsNull = -13 => InvalidParameter("iv is null"),
    ModeTakesNoIv = -14 => InvalidParameter("mode takes no iv"),
    ModInLenNotZero = -15 => IllegalBlockSize("input length is not a multiple of the block size"),
    InputIsNull = -16 => InvalidArgument("input is null"),
    OutputIsNull = -17 => InvalidArgument("output is null"),
    OutputTooSmall = -18 => BufferTooSmall("output buffer too small"),
    InputTooLongInt32 = -19 => IntegerOverflow("input size int32 overflow"),
    OutputTooLongInt32 = -20 => IntegerOverflow("output size int32 overflow"),
    InvalidCipherText = -21 => BadPadding("invalid cipher text"),
    FailedAccessInput = -22 => UnreadableBuffer("unable to access input"),
    FailedAccessOutput = -23 => UnreadableBuffer("unable to access output"),
    InputLenIsNegative = -24 => InvalidArgument("input length is negative"),
    OutputLenIsNegative = -25 => InvalidArgument("output length is negative"),
    InputOffsetIsNegative = -26 => InvalidArgument("input offset is negative"),
    OutputOffsetIsNegative = -27 => InvalidArgument("output offset is negative"),
    InputOutOfRange = -28 => InvalidArgument("input offset + length out of range"),
    OutputOutOfRange = -29 => InvalidArgument("output offset + length out of range"),
    NotInitialized = -30 => IllegalState("not initialized"),
    FinalSizeLenIsNegative = -31 => InvalidArgument("final size length is negative"),
    NotBlockAligned = -32 => IllegalBlockSize("data not block size aligned"),
    CtrModeOverflow = -33 => IllegalState("ctr mode overflow"),
    OutputSizeIntOverflow = -34 => IntegerOverflow("output size int32 overflow"),
    KeySpecIsNull = -38 => InvalidKey("key spec is null"),
    KeySpecHasNullKey = -39 => InvalidKey("key spec has null key"),
    UnexpectedState = -40 => IllegalState("unexpected state"),
    IncorrectKeyType = -41 => InvalidKey("incorrect key type"),
    InvalidKeyType = -42 => InvalidKey("invalid key type"),
    SigIsNull = -43 => InvalidArgument("signature is null"),
    SigLengthIsNegative = -44 => InvalidArgument("signature length is negative"),
    SigLengthIsZero = -45 => InvalidArgument("signature length is zero"),
    SigOutOfRange = -46 => InvalidArgument("signature out of range"),
    FailedAccessSig = -47 => UnreadableBuffer("unable to access signature"),
    ContextBytesTooLong = -48 => InvalidArgument("context length is too long"),
    ContextBytesNull = -49 => InvalidArgument("context is null but length is non-zero"),
    ExtractedKeyUnexpectedLen = -50 => IllegalState("extracted key has an unexpected length"),
    ContextLenPastEnd = -51 => InvalidArgument("context length is past end of context"),
    FailedAccessContext = -52 => UnreadableBuffer("unable to access context"),
    EncodedPrivateKeyLen = -53 => InvalidKey("incorrect private key length"),
    EncodedPublicKeyLen = -54 => InvalidKey("incorrect public key length"),
    UnknownKeyLen = -55 => InvalidKey("unknown key length"),
    UnexpectedPointerChange = -56 => IllegalState("unexpected pointer change"),
    UnknownOsslKeyType = -57 => Unsupported("unknown key type"),
    UnknownMuMode = -58 => InvalidParameter("unknown mu mode"),
    InvalidMuModeForVerify = -59 => InvalidParameter("invalid mu mode for verify"),
    InvalidMuModeForSign = -60 => InvalidParameter("invalid mu mode for sign"),
    ExternalMuInvalidLen = -61 => InvalidParameter("external mu has an invalid length"),
    UnexpectedSigLenChange = -62 => IllegalState("unexpected signature length change"),
    InvalidSeedLen = -63 => InvalidArgument("invalid seed length"),
    SeedIsNull = -64 => InvalidArgument("seed is null"),
    FailedAccessSeed = -65 => UnreadableBuffer("unable to access seed"),
    InvalidSeedLenOutOfRange = -66 => InvalidArgument("seed length is out of range"),
    SeedLenIsNegative = -67 => InvalidArgument("seed length is negative"),
    InvalidSlhDsaMsgEncodingParam = -68 => InvalidParameter("invalid message encoding"),
    InvalidSlhDsaDeterministicParam = -69 => InvalidParameter("invalid deterministic parameter"),
    FailedAccessEncapOpp = -70 => UnreadableBuffer("unable to access operation string"),
    InvalidTagLen = -71 => InvalidParameter("tag length is invalid"),
    TagIsNull = -72 => InvalidParameter("tag is null"),
    TagInvalid = -73 => BadTag("tag invalid"),
    KdfPasswordNull = -74 => InvalidArgument("password is null"),
    KdfPasswordFailedAccess = -75 => UnreadableBuffer("unable to access password"),
    KdfSaltNull = -76 => InvalidArgument("salt is null"),
    KdfSaltEmpty = -77 => InvalidArgument("salt is empty"),
    KdfSaltFailedAccess = -78 => UnreadableBuffer("unable to access salt"),
    KdfScryptNTooSmall = -79 => InvalidArgument("n is less than 2"),
    KdfScryptNNotPow2 = -80 => InvalidArgument("n not power of 2"),
    KdfScryptRNegative = -81 => InvalidArgument("r is negative"),
    KdfScryptPNegative = -82 => InvalidArgument("p is negative"),
    KdfPbeIterNegative = -83 => InvalidArgument("iter is negative"),
    KdfPbeUnknownDigest = -84 => Unsupported("unknown digest"),
    InvalidKeyEncodingOption = -85 => InvalidParameter("invalid key encoding option"),
    FailedAccessEncodingOption = -86 => UnreadableBuffer("unable to access encoding option"),
    NameIsNull = -87 => InvalidArgument("name is null"),
    NameNotFound = -88 => Unsupported("name not found"),
    UnableToAccessName = -89 => UnreadableBuffer("unable to access name"),
    MdCreateFailed = -90 => IllegalState("md create failed"),
    MdInitFailed = -91 => IllegalState("md init failed"),
    MdDigestLenIntOverflow = -92 => IntegerOverflow("digest len overflow"),
    MdSetParamFail = -93 => IllegalState("md unable to set param"),
}

impl FaultCode {
    /// Returns the raw code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Converts the fault into an [`Error`] as seen by an entry
    /// point in `family`.
    ///
    /// [`FaultCode::OpensslError`] and [`FaultCode::Fail`] need the
    /// engine's error queue; use [`translate`] for those.
    pub fn to_error(self, family: Family) -> Error {
        use FaultCode::{
            InvalidCipher, InvalidKeyLen, InvalidMode, KeyIsNull, NotInitialized,
            OutputOutOfRange, OutputTooSmall,
        };
        match (family, self) {
            (Family::CipherInit, InvalidMode) => {
                Error::InvalidParameter("mode not supported for cipher")
            }
            (Family::CipherInit, InvalidCipher) => Error::IllegalState("cipher not supported"),
            (Family::CipherUpdate | Family::CipherFinal, OutputOutOfRange | OutputTooSmall) => {
                Error::BufferTooSmall("output buffer too small")
            }
            (Family::Key | Family::Asn1, KeyIsNull) => Error::InvalidArgument("key is null"),
            (Family::Key | Family::Asn1, InvalidKeyLen) => {
                Error::InvalidArgument("key length is invalid")
            }
            // The codec treats a short output region as an access
            // fault.
            (Family::Asn1, OutputOutOfRange) => {
                Error::UnreadableBuffer("output is out of range")
            }
            (Family::Digest, NotInitialized) => Error::IllegalState("digest length not known"),
            _ => self.default_error(),
        }
    }
}

/// The group of native entry points that produced a code.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Family {
    /// Block cipher setup.
    CipherInit,
    /// Block cipher AAD, update and size queries.
    CipherUpdate,
    /// Block cipher finalization.
    CipherFinal,
    /// Key generation, extraction and decoding.
    Key,
    /// The ASN.1 codec.
    Asn1,
    /// Signing, verification and KEM.
    Signature,
    /// Key derivation.
    Kdf,
    /// Message digests.
    Digest,
    /// Provider loading.
    Library,
}

/// Translates a negative `code` into an [`Error`].
///
/// The engine's error queue is drained immediately for
/// [`FaultCode::OpensslError`], [`FaultCode::Fail`] and unknown
/// codes, before any other native call can add to it.
pub fn translate(code: i32, family: Family, ossl: &dyn OpenSslNi) -> Error {
    match FaultCode::from_code(code) {
        Some(FaultCode::OpensslError | FaultCode::Fail) => Error::Engine(engine_text(ossl)),
        Some(fault) => fault.to_error(family),
        None => Error::Unknown {
            code,
            detail: ossl.openssl_errors().unwrap_or_default(),
        },
    }
}

/// Returns `code` as a length, or the translated fault.
pub fn check(code: i32, family: Family, ossl: &dyn OpenSslNi) -> Result<usize, Error> {
    if code < 0 {
        return Err(translate(code, family, ossl));
    }
    Ok(usize::try_from(code).assume("non-negative `i32` fits in `usize`")?)
}

/// Converts a buffer length into the native `i32` length type.
pub(crate) fn len_i32(len: usize) -> Result<i32, Error> {
    i32::try_from(len).map_err(|_| Error::IntegerOverflow("length exceeds i32::MAX"))
}

fn engine_text(ossl: &dyn OpenSslNi) -> String {
    match ossl.openssl_errors() {
        Some(text) if !text.is_empty() => text,
        _ => String::from("no detail in the OpenSSL error queue"),
    }
}
