// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

// The driver and libandroid are opened at runtime through libloading, so
// nothing is linked here.

fn main() {
    println!("cargo:rerun-if-changed=src/ffi.rs");
    println!("cargo:rerun-if-env-changed=AANDUSB_LIBRARY");
    println!("cargo:rerun-if-env-changed=ANDROID_LIBRARY");
}
