//! Build script for the CDC bridge firmware
//!
//! Adds the cortex-m-rt and defmt linker scripts to the `cdc-echo` binary.
//! `memory.x` comes from embassy-stm32's `memory-x` feature.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Host builds link normally
    if std::env::var_os("CARGO_FEATURE_EMBEDDED").is_none() {
        return;
    }

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
