//! The process-wide engine, in its own process.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use jostle::{
    Cipher, ErrorKind, Native, OpMode, openssl,
    selector::{self, install},
    soft::SoftEngine,
};

#[test_log::test]
fn test_install_once() {
    let soft: Arc<dyn Native> = Arc::new(SoftEngine::new());
    install(Arc::clone(&soft)).unwrap();

    let native = selector::native().unwrap();
    assert!(Arc::ptr_eq(&native, &soft));
    assert_eq!(selector::selected_interface(), None);
    assert!(openssl::is_available(&*native));
    assert!(
        openssl::library_version(&*native)
            .unwrap()
            .starts_with("OpenSSL")
    );

    let err = install(Arc::new(SoftEngine::new())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState, "{err}");

    let cipher = Cipher::from_name(&native, "AES/ECB/NoPadding").unwrap();
    cipher.init(OpMode::Encrypt, &[0; 16], None).unwrap();
    assert_eq!(
        hex::encode(cipher.do_final(&[0; 16]).unwrap()),
        "66e94bd4ef8a2c3b884cfa59ca342b2e"
    );
}
