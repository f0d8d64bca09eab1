// =============================================================================
// A53 Boot - ARM64 Architecture Crate
// =============================================================================
// Everything that touches hardware during bring-up:
// - PL011 UART driver (polled console)
// - GICv2 routing of the UART receive interrupt
// - Identity-mapped stage-1 translation and MMU enable
// - CPU and EL1 system register access
// - Console logger and hex diagnostics
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![cfg_attr(not(test), no_std)]

pub mod cpu;
pub mod diag;
pub mod error;
pub mod gic;
pub mod irq;
pub mod logger;
pub mod mmio;
pub mod mmu;
pub mod platform;
pub mod sysreg;
pub mod uart;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod boot;

#[cfg(test)]
mod sim;

pub use error::{Error, Result};

/// Bring up the console and its logger.
///
/// Must be the first thing the image does; everything after it reports
/// progress through `log`.
pub fn init_console(level: log::LevelFilter) {
    uart::init();
    logger::init(level);
}
