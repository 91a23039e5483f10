//! Native objects are released exactly once.

#![allow(clippy::unwrap_used)]

use std::{sync::Arc, thread};

use jostle::{
    Cipher, Kem, KeyPair, KeyType, Native, OpMode, Params, PrivateKey, PublicKey, Signer,
    SignerKind, soft::SoftEngine,
};

fn engine() -> (Arc<SoftEngine>, Arc<dyn Native>) {
    let soft = Arc::new(SoftEngine::new());
    let native: Arc<dyn Native> = Arc::clone(&soft) as Arc<dyn Native>;
    (soft, native)
}

#[test_log::test]
fn test_drop_releases_everything() {
    let (soft, native) = engine();
    {
        let cipher = Cipher::from_name(&native, "AES/GCM/NoPadding").unwrap();
        cipher
            .init(OpMode::Encrypt, &[1; 32], Some(Params::Iv(&[2; 12])))
            .unwrap();
        cipher.do_final(b"payload").unwrap();

        let kp = KeyPair::generate(&native, KeyType::MlDsa44).unwrap();
        let der = kp.private.encoded().unwrap();
        let decoded = PrivateKey::decode(&native, &der).unwrap();
        let signer = Signer::new(&native, SignerKind::ml_dsa());
        signer.init_sign(&decoded, b"").unwrap();
        signer.update(b"msg").unwrap();
        signer.sign().unwrap();

        let kem = KeyPair::generate(&native, KeyType::MlKem512).unwrap();
        let public = PublicKey::decode(&native, &kem.public.encoded().unwrap()).unwrap();
        Kem::encapsulate(&public).unwrap();

        // Cipher, two ML-DSA keys, signer, two ML-KEM keys. The
        // codec contexts are already gone.
        assert_eq!(soft.live_handles(), 6);
    }
    assert_eq!(soft.live_handles(), 0);
    assert_eq!(soft.double_frees(), 0);
}

#[test_log::test]
fn test_dispose_then_drop() {
    let (soft, native) = engine();
    let kp = KeyPair::generate(&native, KeyType::SlhDsaSha2_128f).unwrap();
    let signer = Signer::new(&native, SignerKind::slh_dsa());
    signer.init_verify(&kp.public, b"").unwrap();

    kp.private.spec().dispose();
    signer.dispose();
    kp.public.spec().dispose();
    signer.dispose();
    assert_eq!(soft.live_handles(), 0);

    drop(signer);
    drop(kp);
    assert_eq!(soft.double_frees(), 0);
}

#[test_log::test]
fn test_clones_share_one_object() {
    let (soft, native) = engine();
    let kp = KeyPair::generate(&native, KeyType::MlKem768).unwrap();
    let copies = (0..4).map(|_| kp.clone()).collect::<Vec<_>>();
    assert_eq!(soft.live_handles(), 1);
    drop(kp);
    assert_eq!(soft.live_handles(), 1);
    drop(copies);
    assert_eq!(soft.live_handles(), 0);
    assert_eq!(soft.double_frees(), 0);
}

/// Disposing while other threads are using the key never frees it
/// under them.
#[test_log::test]
fn test_dispose_races_use() {
    let (soft, native) = engine();
    let kp = KeyPair::generate(&native, KeyType::MlKem512).unwrap();
    let workers = (0..4)
        .map(|_| {
            let kp = kp.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    // Either the whole operation succeeds or the key
                    // is already gone.
                    if let Ok(enc) = Kem::encapsulate(&kp.public) {
                        assert_eq!(enc.secret.len(), 32);
                    }
                }
            })
        })
        .collect::<Vec<_>>();
    kp.private.spec().dispose();
    for w in workers {
        w.join().unwrap();
    }
    assert!(Kem::encapsulate(&kp.public).is_err());
    assert_eq!(soft.live_handles(), 0);
    assert_eq!(soft.double_frees(), 0);
}
