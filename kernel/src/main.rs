// =============================================================================
// A53 Boot - Image Entry Point
// =============================================================================
// Rust entry of the boot image, called from `_start` after core 0 has been
// selected, EL1 reached, the stack set up and BSS zeroed.
//
// Boot order:
//   1. console (UART + logger)
//   2. execution state report
//   3. address space bring-up (MMU on) and a probe write
//   4. optional interrupt-driven console receive
//   5. debug monitor
//
// On a development host this crate builds as an inert binary so that the
// monitor's parsing can be unit tested.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::sync::atomic::AtomicU64;

use a53boot_arch::mmu::AddressSpace;
use a53boot_arch::{cpu, println};
use log::LevelFilter;
use spin::Mutex;

mod monitor;

/// Image version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The one address space of this image. Its level-1 table is what TTBR0_EL1
/// points at once the MMU is on, so it lives in a static.
static ADDRESS_SPACE: Mutex<AddressSpace> = Mutex::new(AddressSpace::new());

/// Scratch word written through the identity map after the MMU is enabled.
static PROBE_WORD: AtomicU64 = AtomicU64::new(0);

fn log_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

// =============================================================================
// Image Entry Point
// =============================================================================

/// Image main entry point, called once by `_start`.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
#[no_mangle]
pub extern "C" fn kernel_main() -> ! {
    a53boot_arch::init_console(log_level());

    print_banner();
    report_execution_state();

    bring_up_address_space();

    route_console_input();

    monitor::run()
}

/// IRQ hook for the exception vector.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
#[no_mangle]
pub extern "C" fn handle_irq_exception() {
    a53boot_arch::irq::handle_irq();
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("a53boot {} is an aarch64-unknown-none image", VERSION);
}

// =============================================================================
// Boot Steps
// =============================================================================

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
fn bring_up_address_space() {
    use a53boot_arch::mmu;
    use a53boot_arch::sysreg::El1Registers;

    let mut space = ADDRESS_SPACE.lock();
    // SAFETY: we run at EL1 with the MMU off, and the tables live in a static
    // that is never moved or freed
    let mut regs = unsafe { El1Registers::new() };
    mmu::bring_up(&mut regs, &mut *space);

    // SAFETY: PROBE_WORD is a valid, aligned u64 inside the identity map
    if unsafe { mmu::probe(PROBE_WORD.as_ptr()) } {
        log::info!("mmu: probe write through the identity map succeeded");
    } else {
        log::warn!("mmu: probe write read back a different value");
    }
}

#[cfg(all(target_arch = "aarch64", target_os = "none", feature = "irq-console"))]
fn route_console_input() {
    // SAFETY: the `irq-console` build links an IRQ vector that calls
    // handle_irq_exception
    match unsafe { a53boot_arch::irq::route_console_rx() } {
        Ok(()) => {}
        Err(err) => log::warn!("irq: console stays polled: {}", err),
    }
}

#[cfg(all(target_arch = "aarch64", target_os = "none", not(feature = "irq-console")))]
fn route_console_input() {
    log::info!("irq: console receive is polled");
}

fn report_execution_state() {
    let el = cpu::current_el();
    log::info!("boot: running at EL{} ({})", el.as_u8(), el.execution_state());
}

/// Print the boot banner.
fn print_banner() {
    println!();
    println!("A53 Boot v{}", VERSION);
    println!("identity-mapped MMU bring-up and PL011 debug console");
    println!("============================================================");
}

// =============================================================================
// Panic Handler
// =============================================================================

/// Print the panic and halt the core.
#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!();
    println!("!!! PANIC !!!");

    if let Some(location) = info.location() {
        println!("Location: {}:{}:{}", location.file(), location.line(), location.column());
    }
    println!("Message: {}", info.message());

    println!("System halted.");
    cpu::halt();
}
