// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Build script checking the minimum supported Rust version.

use std::process;

/// Minimum supported Rust version, kept in sync with `rust-version`.
const MIN_RUSTC_VERSION: &str = "1.70.0";

fn main() {
    match version_check::is_min_version(MIN_RUSTC_VERSION) {
        Some(true) => {}
        Some(false) => {
            eprintln!(
                "ModFlow requires Rust {} or newer. Please update your toolchain.",
                MIN_RUSTC_VERSION
            );
            process::exit(1);
        }
        None => {
            println!("cargo:warning=Unable to determine the rustc version.");
        }
    }
    println!("cargo:rerun-if-changed=build.rs");
}
