//! Purpose: Link the system netCDF-C library when the `libnetcdf` feature is enabled.
//! Role: Cargo build-script; the default build uses the in-crate reference engine and links nothing.
//! Invariants: Uses only Cargo-provided env vars (`CARGO_FEATURE_*`, `NETCDF_DIR`).
//! Invariants: `NETCDF_DIR`, when set, points at an install prefix containing `lib/`.
use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=NETCDF_DIR");

    if env::var_os("CARGO_FEATURE_LIBNETCDF").is_none() {
        return;
    }

    if let Some(prefix) = env::var_os("NETCDF_DIR") {
        let lib_dir = PathBuf::from(prefix).join("lib");
        println!("cargo:rustc-link-search=native={}", lib_dir.display());
    }
    println!("cargo:rustc-link-lib=netcdf");
}
