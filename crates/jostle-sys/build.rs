use std::env;

fn main() {
    println!("cargo::rerun-if-env-changed=JOSTLE_NATIVE_DIR");
    if env::var_os("CARGO_FEATURE_LINKED").is_none() {
        return;
    }
    if let Some(dir) = env::var_os("JOSTLE_NATIVE_DIR") {
        println!("cargo::rustc-link-search=native={}", dir.to_string_lossy());
    }
}
