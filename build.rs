fn main() {
    println!("cargo:rerun-if-changed=data/config.json");

    // Host builds (no `espidf` feature) have no ESP-IDF toolchain to
    // describe; only emit the sysenv when the firmware image is being built.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
