// =============================================================================
// A53 Boot - CPU Utilities
// =============================================================================
// ARM64 core control and identification. On non-AArch64 hosts (unit tests)
// the hardware operations are inert.
// =============================================================================

/// ARM privilege tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionLevel {
    El0,
    El1,
    El2,
    El3,
}

impl ExceptionLevel {
    /// Decode a raw `CurrentEL` value (level in bits [3:2]).
    pub const fn from_current_el(raw: u64) -> Self {
        match (raw >> 2) & 0x3 {
            0 => Self::El0,
            1 => Self::El1,
            2 => Self::El2,
            _ => Self::El3,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Execution state description for the boot report.
    ///
    /// Code able to read CurrentEL at EL1 or above is running AArch64.
    pub const fn execution_state(self) -> &'static str {
        match self {
            Self::El0 => "AArch32",
            _ => "AArch64",
        }
    }
}

/// Halt the CPU in a low-power state. Never returns.
#[inline(always)]
pub fn halt() -> ! {
    loop {
        #[cfg(target_arch = "aarch64")]
        unsafe {
            core::arch::asm!("wfe");
        }
        #[cfg(not(target_arch = "aarch64"))]
        core::hint::spin_loop();
    }
}

/// Enable IRQs at the core.
///
/// # Safety
/// Caller must ensure interrupt handlers are properly set up.
#[inline(always)]
pub unsafe fn enable_interrupts() {
    #[cfg(target_arch = "aarch64")]
    core::arch::asm!("msr daifclr, #2"); // Clear IRQ mask
}

/// Get the current exception level.
#[inline(always)]
pub fn current_el() -> ExceptionLevel {
    #[cfg(target_arch = "aarch64")]
    {
        let el: u64;
        unsafe {
            core::arch::asm!("mrs {}, CurrentEL", out(reg) el);
        }
        ExceptionLevel::from_current_el(el)
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        ExceptionLevel::El1
    }
}
