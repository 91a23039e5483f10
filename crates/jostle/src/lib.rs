//! Jostle: a binding to the `interface_ffi` engine over OpenSSL 3.5.
//!
//! # Overview
//!
//! The engine exposes block ciphers, ML-DSA, SLH-DSA and ML-KEM
//! keys and signatures, message digests, and PBKDF2 and scrypt
//! as a flat C interface of opaque handles, raw buffers and
//! negative error codes. This crate turns that interface into safe types:
//!
//! - [`Cipher`] streams ECB, CBC, CTR and GCM, including in-place
//!   and overlapping buffers.
//! - [`PublicKey`], [`PrivateKey`] and [`KeyPair`] hold native key
//!   objects and encode them as DER on demand.
//! - [`Signer`] signs and verifies, and [`Kem`] encapsulates.
//! - [`MessageDigest`] hashes with any digest OpenSSL knows.
//! - [`kdf`] derives keys from passwords.
//!
//! # Design
//!
//! Every native entry point belongs to one of the service traits
//! in [`ni`]. The rest of the crate only talks to `dyn`
//! [`Native`], so the engine can be reached in two ways (see
//! [`backend`]) or replaced outright. [`selector::native`] binds
//! the process-wide engine once, as [`Config`] describes.
//!
//! Native return codes are translated at the first frame above the
//! call ([`fault::check`]). Native objects are owned by a handle
//! that frees them exactly once, either when disposed or when
//! dropped, and never while a call is using them.
//!
//! The `testing` feature adds [`soft::SoftEngine`], an in-process
//! engine for tests.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

pub mod backend;
pub mod cipher;
pub mod config;
pub mod digest;
mod error;
pub mod fault;
mod handle;
pub mod kdf;
pub mod kem;
pub mod keys;
pub mod ni;
pub mod openssl;
pub mod selector;
pub mod signer;
#[cfg(feature = "testing")]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod soft;

pub use buggy;
pub use cipher::{Cipher, CipherKind, Mode, OpMode, Padding, Params, Transformation};
pub use config::{Config, Interface};
pub use digest::{Digest, MessageDigest};
pub use error::{Error, ErrorKind};
pub use kem::{Encapsulated, Kem};
pub use keys::{KeyFamily, KeyPair, KeyRepr, KeyType, PrivateKey, PublicKey};
pub use ni::Native;
pub use signer::{Deterministic, MessageEncoding, MuMode, Signer, SignerKind};
