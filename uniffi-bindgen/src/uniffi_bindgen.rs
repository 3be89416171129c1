//! Entry point for generating Kotlin/Swift bindings for `softpos-core`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
