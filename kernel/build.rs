// =============================================================================
// A53 Boot - Image Build Script
// =============================================================================
// Links the bare-metal image with linker.ld at the platform's load address.
// Host builds (unit tests) are left alone.
// =============================================================================

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=linker.ld");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("set by cargo"));

    // QEMU virt RAM starts at 1GB; FVP Base DRAM at 2GB. Neither is reached
    // by the identity map once the MMU is on (see linker.ld)
    let load_address = if env::var_os("CARGO_FEATURE_PLATFORM_FVP").is_some() {
        "0x80080000"
    } else {
        "0x40080000"
    };

    println!("cargo:rustc-link-arg-bins=--defsym=LOAD_ADDRESS={}", load_address);
    println!("cargo:rustc-link-arg-bins=-T{}", manifest_dir.join("linker.ld").display());
}
