//! Every native fault code and the error it becomes.

#![allow(clippy::unwrap_used)]

use jostle::{
    Error,
    fault::{Family, FaultCode, check},
    soft::SoftEngine,
};

/// The error for each code from an entry point that overrides
/// nothing. `-1`, `-2` and `-35..=-37` are absent.
const DEFAULT: &[(i32, &str)] = &[
    (-3, "invalid argument: provider name is null"),
    (-4, "invalid argument: provider name is empty"),
    (-5, "illegal state: invalid operation mode"),
    (-6, "unsupported: cipher not supported"),
    (-7, "unsupported: mode not supported for cipher"),
    (-8, "invalid key: key length is invalid"),
    (-9, "invalid parameter: iv length is invalid"),
    (-10, "unreadable buffer: unable to access key"),
    (-11, "unreadable buffer: unable to access iv"),
    (-12, "invalid key: key is null"),
    (-13, "invalid parameter: iv is null"),
    (-14, "invalid parameter: mode takes no iv"),
    (-15, "illegal block size: input length is not a multiple of the block size"),
    (-16, "invalid argument: input is null"),
    (-17, "invalid argument: output is null"),
    (-18, "buffer too small: output buffer too small"),
    (-19, "integer overflow: input size int32 overflow"),
    (-20, "integer overflow: output size int32 overflow"),
    (-21, "bad padding: invalid cipher text"),
    (-22, "unreadable buffer: unable to access input"),
    (-23, "unreadable buffer: unable to access output"),
    (-24, "invalid argument: input length is negative"),
    (-25, "invalid argument: output length is negative"),
    (-26, "invalid argument: input offset is negative"),
    (-27, "invalid argument: output offset is negative"),
    (-28, "invalid argument: input offset + length out of range"),
    (-29, "invalid argument: output offset + length out of range"),
    (-30, "illegal state: not initialized"),
    (-31, "invalid argument: final size length is negative"),
    (-32, "illegal block size: data not block size aligned"),
    (-33, "illegal state: ctr mode overflow"),
    (-34, "integer overflow: output size int32 overflow"),
    (-38, "invalid key: key spec is null"),
    (-39, "invalid key: key spec has null key"),
    (-40, "illegal state: unexpected state"),
    (-41, "invalid key: incorrect key type"),
    (-42, "invalid key: invalid key type"),
    (-43, "invalid argument: signature is null"),
    (-44, "invalid argument: signature length is negative"),
    (-45, "invalid argument: signature length is zero"),
    (-46, "invalid argument: signature out of range"),
    (-47, "unreadable buffer: unable to access signature"),
    (-48, "invalid argument: context length is too long"),
    (-49, "invalid argument: context is null but length is non-zero"),
    (-50, "illegal state: extracted key has an unexpected length"),
    (-51, "invalid argument: context length is past end of context"),
    (-52, "unreadable buffer: unable to access context"),
    (-53, "invalid key: incorrect private key length"),
    (-54, "invalid key: incorrect public key length"),
    (-55, "invalid key: unknown key length"),
    (-56, "illegal state: unexpected pointer change"),
    (-57, "unsupported: unknown key type"),
    (-58, "invalid parameter: unknown mu mode"),
    (-59, "invalid parameter: invalid mu mode for verify"),
    (-60, "invalid parameter: invalid mu mode for sign"),
    (-61, "invalid parameter: external mu has an invalid length"),
    (-62, "illegal state: unexpected signature length change"),
    (-63, "invalid argument: invalid seed length"),
    (-64, "invalid argument: seed is null"),
    (-65, "unreadable buffer: unable to access seed"),
    (-66, "invalid argument: seed length is out of range"),
    (-67, "invalid argument: seed length is negative"),
    (-68, "invalid parameter: invalid message encoding"),
    (-69, "invalid parameter: invalid deterministic parameter"),
    (-70, "unreadable buffer: unable to access operation string"),
    (-71, "invalid parameter: tag length is invalid"),
    (-72, "invalid parameter: tag is null"),
    (-73, "bad tag: tag invalid"),
    (-74, "invalid argument: password is null"),
    (-75, "unreadable buffer: unable to access password"),
    (-76, "invalid argument: salt is null"),
    (-77, "invalid argument: salt is empty"),
    (-78, "unreadable buffer: unable to access salt"),
    (-79, "invalid argument: n is less than 2"),
    (-80, "invalid argument: n not power of 2"),
    (-81, "invalid argument: r is negative"),
    (-82, "invalid argument: p is negative"),
    (-83, "invalid argument: iter is negative"),
    (-84, "unsupported: unknown digest"),
    (-85, "invalid parameter: invalid key encoding option"),
    (-86, "unreadable buffer: unable to access encoding option"),
    (-87, "invalid argument: name is null"),
    (-88, "unsupported: name not found"),
    (-89, "unreadable buffer: unable to access name"),
    (-90, "illegal state: md create failed"),
    (-91, "illegal state: md init failed"),
    (-92, "integer overflow: digest len overflow"),
    (-93, "illegal state: md unable to set param"),
];

/// Codes whose error depends on the entry point.
const OVERRIDES: &[(Family, i32, &str)] = &[
    (Family::CipherInit, -6, "illegal state: cipher not supported"),
    (Family::CipherInit, -7, "invalid parameter: mode not supported for cipher"),
    (Family::CipherUpdate, -18, "buffer too small: output buffer too small"),
    (Family::CipherUpdate, -29, "buffer too small: output buffer too small"),
    (Family::CipherFinal, -18, "buffer too small: output buffer too small"),
    (Family::CipherFinal, -29, "buffer too small: output buffer too small"),
    (Family::Key, -8, "invalid argument: key length is invalid"),
    (Family::Key, -12, "invalid argument: key is null"),
    (Family::Asn1, -8, "invalid argument: key length is invalid"),
    (Family::Asn1, -12, "invalid argument: key is null"),
    (Family::Asn1, -29, "unreadable buffer: output is out of range"),
    (Family::Digest, -30, "illegal state: digest length not known"),
];

const FAMILIES: [Family; 9] = [
    Family::CipherInit,
    Family::CipherUpdate,
    Family::CipherFinal,
    Family::Key,
    Family::Asn1,
    Family::Signature,
    Family::Kdf,
    Family::Digest,
    Family::Library,
];

#[test_log::test]
fn test_every_code() {
    let engine = SoftEngine::new();
    assert_eq!(check(0, Family::Signature, &engine).unwrap(), 0);
    assert_eq!(DEFAULT.len(), 88);

    for code in -93..0 {
        let err = check(code, Family::Signature, &engine).unwrap_err();
        match code {
            -2 | -1 => assert!(matches!(err, Error::Engine(_)), "{code}: {err}"),
            -37..=-35 => assert!(
                matches!(err, Error::Unknown { code: c, .. } if c == code),
                "{code}: {err}"
            ),
            _ => {
                let (_, want) = DEFAULT.iter().find(|(c, _)| *c == code).unwrap();
                assert_eq!(err.to_string(), *want, "code {code}");

                let fault = FaultCode::from_code(code).unwrap();
                let (_, msg) = want.split_once(": ").unwrap();
                assert_eq!(fault.message(), msg, "code {code}");
            }
        }
    }
}

#[test_log::test]
fn test_family_overrides() {
    let engine = SoftEngine::new();
    for family in FAMILIES {
        for &(code, default) in DEFAULT {
            let want = OVERRIDES
                .iter()
                .find(|(f, c, _)| *f == family && *c == code)
                .map_or(default, |&(_, _, text)| text);
            let err = check(code, family, &engine).unwrap_err();
            assert_eq!(err.to_string(), want, "{family:?} {code}");
        }
    }
}

/// The engine's generic failures carry the error queue in every
/// family.
#[test_log::test]
fn test_engine_failures() {
    let engine = SoftEngine::new();
    for family in FAMILIES {
        for code in [-1, -2] {
            let err = check(code, family, &engine).unwrap_err();
            assert!(matches!(err, Error::Engine(_)), "{family:?} {code}: {err}");
        }
    }
}
