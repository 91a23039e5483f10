//! Property tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use jostle::{
    Cipher, CipherKind, ErrorKind, Native, OpMode, Params, Transformation,
    fault::{Family, FaultCode, check},
    soft::SoftEngine,
};
use proptest::prelude::*;

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

fn family() -> impl Strategy<Value = Family> {
    prop::sample::select(FAMILIES.to_vec())
}

fn native() -> Arc<dyn Native> {
    Arc::new(SoftEngine::new())
}

proptest! {
    #[test]
    fn test_success_is_a_length(code in 0..=i32::MAX, family in family()) {
        let engine = SoftEngine::new();
        let n = check(code, family, &engine).unwrap();
        prop_assert_eq!(i32::try_from(n).unwrap(), code);
    }

    /// Codes the engine never defines surface as unknown faults
    /// that keep the raw code.
    #[test]
    fn test_unknown_codes(
        code in prop_oneof![i32::MIN..-93, -37..=-35],
        family in family(),
    ) {
        let engine = SoftEngine::new();
        prop_assert_eq!(FaultCode::from_code(code), None);
        let err = check(code, family, &engine).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::UnknownFault);
        let text = err.to_string();
        prop_assert!(text.contains(&code.to_string()), "{}", text);
    }

    #[test]
    fn test_aes_variant_follows_key_size(key_len in 0usize..80) {
        let t: Transformation = "AES/CBC/PKCS5Padding".parse().unwrap();
        let want = match key_len {
            16 => Some(CipherKind::Aes128),
            24 => Some(CipherKind::Aes192),
            32 => Some(CipherKind::Aes256),
            _ => None,
        };
        match t.determine_variant(key_len) {
            Ok(kind) => prop_assert_eq!(Some(kind), want),
            Err(err) => {
                prop_assert_eq!(want, None);
                prop_assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            }
        }
    }

    /// Splitting the input across updates does not change the
    /// output.
    #[test]
    fn test_chunking_is_invisible(
        msg in prop::collection::vec(any::<u8>(), 0..200),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
        name in prop::sample::select(vec![
            "AES/CBC/PKCS5Padding",
            "AES/CTR/NoPadding",
            "AES/GCM/NoPadding",
        ]),
    ) {
        let native = native();
        let key = [7u8; 16];
        let iv = if name.contains("GCM") { &[9u8; 12][..] } else { &[9u8; 16][..] };

        let cipher = Cipher::from_name(&native, name).unwrap();
        cipher.init(OpMode::Encrypt, &key, Some(Params::Iv(iv))).unwrap();
        let whole = cipher.do_final(&msg).unwrap();

        let mut at = cuts.iter().map(|i| i.index(msg.len() + 1)).collect::<Vec<_>>();
        at.sort_unstable();
        cipher.init(OpMode::Encrypt, &key, Some(Params::Iv(iv))).unwrap();
        let mut pieces = Vec::new();
        let mut start = 0;
        for end in at {
            pieces.extend(cipher.update(&msg[start..end]).unwrap());
            start = end;
        }
        pieces.extend(cipher.do_final(&msg[start..]).unwrap());
        prop_assert_eq!(&pieces, &whole);

        cipher.init(OpMode::Decrypt, &key, Some(Params::Iv(iv))).unwrap();
        prop_assert_eq!(cipher.do_final(&whole).unwrap(), msg);
    }

    /// Input and output may sit anywhere in one buffer.
    #[test]
    fn test_any_overlap(in_off in 0usize..=32, out_off in 0usize..=32, blocks in 1usize..=4) {
        let native = native();
        let cipher = Cipher::from_name(&native, "AES/ECB/NoPadding").unwrap();
        cipher.init(OpMode::Encrypt, &[3u8; 16], None).unwrap();

        let buf = (0..96u8).collect::<Vec<_>>();
        let len = blocks * 16;
        let want = cipher.update(&buf[in_off..in_off + len]).unwrap();

        let mut aliased = buf.clone();
        let n = cipher
            .update_in_place(&mut aliased, in_off..in_off + len, out_off)
            .unwrap();
        prop_assert_eq!(n, len);
        prop_assert_eq!(&aliased[out_off..out_off + len], &want[..]);
    }
}
