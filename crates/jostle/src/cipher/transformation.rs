use core::{fmt, str::FromStr};

use crate::error::Error;

macro_rules! ordinal_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $ty:ident {
            $($(#[$vmeta:meta])* $name:ident = $ord:literal, $text:literal;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        $vis enum $ty {
            $($(#[$vmeta])* $name,)*
        }

        impl $ty {
            /// Every value, in native order.
            pub const ALL: &[Self] = &[$(Self::$name,)*];

            /// The value the native engine uses.
            pub const fn ordinal(self) -> i32 {
                match self {
                    $(Self::$name => $ord,)*
                }
            }

            /// Looks up a native value.
            pub const fn from_ordinal(ord: i32) -> Option<Self> {
                match ord {
                    $($ord => Some(Self::$name),)*
                    _ => None,
                }
            }

            /// The canonical name.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => $text,)*
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

ordinal_enum! {
    /// A cipher with a fixed key size, as the engine numbers them.
    ///
    /// The ordinals are part of the native interface.
    pub enum CipherKind {
        #[allow(missing_docs)] Rc4 = 0, "RC4";
        #[allow(missing_docs)] Rc4_40 = 1, "RC4_40";
        #[allow(missing_docs)] Idea = 2, "IDEA";
        #[allow(missing_docs)] Rc2 = 3, "RC2";
        #[allow(missing_docs)] Rc2_40 = 4, "RC2_40";
        #[allow(missing_docs)] Rc2_64 = 5, "RC2_64";
        #[allow(missing_docs)] Blowfish = 6, "BlowFish";
        #[allow(missing_docs)] Cast5 = 7, "CAST5";
        #[allow(missing_docs)] Aes128 = 8, "AES128";
        #[allow(missing_docs)] Aes192 = 9, "AES192";
        #[allow(missing_docs)] Aes256 = 10, "AES256";
        #[allow(missing_docs)] Aria128 = 11, "ARIA128";
        #[allow(missing_docs)] Aria192 = 12, "ARIA192";
        #[allow(missing_docs)] Aria256 = 13, "ARIA256";
        #[allow(missing_docs)] Camellia128 = 14, "CAMELLIA128";
        #[allow(missing_docs)] Camellia192 = 15, "CAMELLIA192";
        #[allow(missing_docs)] Camellia256 = 16, "CAMELLIA256";
        #[allow(missing_docs)] ChaCha20 = 17, "CHACHA20";
        #[allow(missing_docs)] ChaCha20Poly1305 = 18, "CHACHA20_POLY1305";
        #[allow(missing_docs)] Seed = 19, "SEED";
        #[allow(missing_docs)] Sm4 = 20, "SM4";
    }
}

ordinal_enum! {
    /// A block cipher mode, as the engine numbers them.
    pub enum Mode {
        #[allow(missing_docs)] Ecb = 0, "ECB";
        #[allow(missing_docs)] Cbc = 1, "CBC";
        #[allow(missing_docs)] Cfb1 = 2, "CFB1";
        #[allow(missing_docs)] Cfb8 = 3, "CFB8";
        #[allow(missing_docs)] Cfb64 = 4, "CFB64";
        #[allow(missing_docs)] Cfb128 = 5, "CFB128";
        #[allow(missing_docs)] Ctr = 6, "CTR";
        #[allow(missing_docs)] Ccm = 7, "CCM";
        #[allow(missing_docs)] Gcm = 8, "GCM";
        #[allow(missing_docs)] Ofb = 9, "OFB";
        #[allow(missing_docs)] Ocb = 10, "OCB";
        #[allow(missing_docs)] Xts = 11, "XTS";
        #[allow(missing_docs)] Wrap = 12, "WRAP";
        #[allow(missing_docs)] WrapPad = 13, "WRAP_PAD";
    }
}

impl Mode {
    /// Reports whether the mode authenticates, and so carries a
    /// tag.
    pub const fn is_aead(self) -> bool {
        matches!(self, Self::Gcm | Self::Ccm | Self::Ocb)
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_uppercase();
        let mode = match s.as_str() {
            "CFB" => Self::Cfb128,
            "KW" => Self::Wrap,
            "KWP" | "WRAPPAD" => Self::WrapPad,
            s => Self::ALL
                .iter()
                .copied()
                .find(|m| m.name() == s)
                .ok_or(Error::Unsupported("unknown cipher mode"))?,
        };
        Ok(mode)
    }
}

ordinal_enum! {
    /// Block padding.
    pub enum Padding {
        /// Input must be block aligned.
        None = 0, "NoPadding";
        /// PKCS#7 (also called PKCS#5) padding.
        Pkcs7 = 1, "PKCS7Padding";
    }
}

impl FromStr for Padding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOPADDING" => Ok(Self::None),
            "PKCS5PADDING" | "PKCS7PADDING" => Ok(Self::Pkcs7),
            _ => Err(Error::Unsupported("unknown padding")),
        }
    }
}

/// The direction of a cipher operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OpMode {
    /// Encrypt.
    Encrypt,
    /// Decrypt.
    Decrypt,
    /// Wrap a key.
    Wrap,
    /// Unwrap a key.
    Unwrap,
}

impl OpMode {
    /// The value the native engine uses.
    pub const fn code(self) -> i32 {
        match self {
            Self::Encrypt => 1,
            Self::Decrypt => 2,
            Self::Wrap => 3,
            Self::Unwrap => 4,
        }
    }
}

/// A family of ciphers whose variant is chosen by key size.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CipherFamily {
    /// AES-128, AES-192 and AES-256.
    Aes,
    /// ARIA-128, ARIA-192 and ARIA-256.
    Aria,
    /// Camellia-128, Camellia-192 and Camellia-256.
    Camellia,
    /// SM4, which only has 128-bit keys.
    Sm4,
}

impl CipherFamily {
    /// Picks the variant for a `key_len` byte key.
    pub fn variant(self, key_len: usize) -> Result<CipherKind, Error> {
        use CipherKind::{
            Aes128, Aes192, Aes256, Aria128, Aria192, Aria256, Camellia128, Camellia192,
            Camellia256, Sm4,
        };
        let kind = match (self, key_len) {
            (Self::Aes, 16) => Aes128,
            (Self::Aes, 24) => Aes192,
            (Self::Aes, 32) => Aes256,
            (Self::Aria, 16) => Aria128,
            (Self::Aria, 24) => Aria192,
            (Self::Aria, 32) => Aria256,
            (Self::Camellia, 16) => Camellia128,
            (Self::Camellia, 24) => Camellia192,
            (Self::Camellia, 32) => Camellia256,
            (Self::Sm4, 16) => Sm4,
            (Self::Sm4, _) => {
                return Err(Error::InvalidKey("unsupported key size, must be 16 bytes"));
            }
            _ => {
                return Err(Error::InvalidKey(
                    "unsupported key size, must be 16, 24 or 32 bytes",
                ));
            }
        };
        Ok(kind)
    }

    /// The family `kind` belongs to, if it is chosen by key size.
    pub const fn of(kind: CipherKind) -> Option<Self> {
        use CipherKind::{
            Aes128, Aes192, Aes256, Aria128, Aria192, Aria256, Camellia128, Camellia192,
            Camellia256, Sm4,
        };
        match kind {
            Aes128 | Aes192 | Aes256 => Some(Self::Aes),
            Aria128 | Aria192 | Aria256 => Some(Self::Aria),
            Camellia128 | Camellia192 | Camellia256 => Some(Self::Camellia),
            Sm4 => Some(Self::Sm4),
            _ => None,
        }
    }
}

/// A parsed `family[/mode[/padding]]` cipher name, such as
/// `AES/GCM/NoPadding` or `AES256/CBC/PKCS5Padding`.
///
/// The mode defaults to ECB and the padding to none.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Transformation {
    /// The cipher family.
    pub family: CipherFamily,
    /// The variant fixed by the name, e.g., `AES256`.
    pub mandated: Option<CipherKind>,
    /// The mode.
    pub mode: Mode,
    /// The padding.
    pub padding: Padding,
}

impl Transformation {
    /// A transformation whose variant follows the key size.
    pub const fn new(family: CipherFamily, mode: Mode, padding: Padding) -> Self {
        Self {
            family,
            mandated: None,
            mode,
            padding,
        }
    }

    /// Picks the variant for a `key_len` byte key.
    ///
    /// A mandated variant must agree with the key size.
    pub fn determine_variant(&self, key_len: usize) -> Result<CipherKind, Error> {
        let kind = self.family.variant(key_len)?;
        match self.mandated {
            Some(mandated) if mandated != kind => Err(Error::InvalidKey("invalid key size")),
            _ => Ok(kind),
        }
    }
}

impl FromStr for Transformation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let name = parts
            .next()
            .map(|p| p.trim().to_ascii_uppercase().replace(['_', '-'], ""))
            .unwrap_or_default();
        let (family, mandated) = match name.as_str() {
            "AES" => (CipherFamily::Aes, None),
            "ARIA" => (CipherFamily::Aria, None),
            "CAMELLIA" => (CipherFamily::Camellia, None),
            "SM4" => (CipherFamily::Sm4, None),
            name => {
                let kind = CipherKind::ALL
                    .iter()
                    .copied()
                    .find(|k| k.name() == name)
                    .ok_or(Error::Unsupported("unknown cipher"))?;
                let family = CipherFamily::of(kind)
                    .ok_or(Error::Unsupported("cipher is not a block cipher"))?;
                (family, Some(kind))
            }
        };
        let mode = parts.next().map(str::parse).transpose()?.unwrap_or(Mode::Ecb);
        let padding = parts
            .next()
            .map(str::parse)
            .transpose()?
            .unwrap_or(Padding::None);
        if parts.next().is_some() {
            return Err(Error::InvalidArgument("too many components in cipher name"));
        }
        Ok(Self {
            family,
            mandated,
            mode,
            padding,
        })
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mandated {
            Some(kind) => write!(f, "{kind}")?,
            None => write!(f, "{:?}", self.family)?,
        }
        write!(f, "/{}/{}", self.mode, self.padding)
    }
}

/// Algorithm parameters for [`Cipher::init`](super::Cipher::init).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Params<'a> {
    /// An IV or nonce. AEAD modes get a 16 byte tag.
    Iv(&'a [u8]),
    /// A nonce and a tag length in bytes.
    Aead {
        /// The nonce.
        iv: &'a [u8],
        /// The tag length in bytes.
        tag_len: usize,
    },
}

impl<'a> Params<'a> {
    /// The IV or nonce.
    pub const fn iv(&self) -> &'a [u8] {
        match *self {
            Self::Iv(iv) | Self::Aead { iv, .. } => iv,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_ordinals() {
        assert_eq!(CipherKind::Aes128.ordinal(), 8);
        assert_eq!(CipherKind::Sm4.ordinal(), 20);
        assert_eq!(Mode::Gcm.ordinal(), 8);
        assert_eq!(Mode::WrapPad.ordinal(), 13);
        assert_eq!(Padding::Pkcs7.ordinal(), 1);
        for (i, k) in CipherKind::ALL.iter().enumerate() {
            assert_eq!(usize::try_from(k.ordinal()).unwrap(), i);
        }
        for (i, m) in Mode::ALL.iter().enumerate() {
            assert_eq!(usize::try_from(m.ordinal()).unwrap(), i);
        }
    }

    #[test]
    fn test_parse() {
        let t: Transformation = "AES/GCM/NoPadding".parse().unwrap();
        assert_eq!(t, Transformation::new(CipherFamily::Aes, Mode::Gcm, Padding::None));

        let t: Transformation = "aes_256/cbc/PKCS5Padding".parse().unwrap();
        assert_eq!(t.mandated, Some(CipherKind::Aes256));
        assert_eq!(t.padding, Padding::Pkcs7);
        assert_eq!(t.to_string(), "AES256/CBC/PKCS7Padding");

        let t: Transformation = "SM4".parse().unwrap();
        assert_eq!(t.mode, Mode::Ecb);
        assert_eq!(t.padding, Padding::None);

        for bad in [
            "DES/CBC/NoPadding",
            "AES/XYZ",
            "AES/CBC/ZeroPadding",
            "RC4",
            "AES/CBC/NoPadding/x",
        ] {
            assert!(bad.parse::<Transformation>().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_determine_variant() {
        let aes = Transformation::new(CipherFamily::Aes, Mode::Cbc, Padding::None);
        assert_eq!(aes.determine_variant(16).unwrap(), CipherKind::Aes128);
        assert_eq!(aes.determine_variant(24).unwrap(), CipherKind::Aes192);
        assert_eq!(aes.determine_variant(32).unwrap(), CipherKind::Aes256);
        let err = aes.determine_variant(17).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let sm4 = Transformation::new(CipherFamily::Sm4, Mode::Cbc, Padding::None);
        assert_eq!(sm4.determine_variant(16).unwrap(), CipherKind::Sm4);
        assert!(sm4.determine_variant(32).is_err());

        let fixed: Transformation = "AES256/CBC/NoPadding".parse().unwrap();
        assert!(matches!(
            fixed.determine_variant(16),
            Err(Error::InvalidKey("invalid key size"))
        ));
    }
}
