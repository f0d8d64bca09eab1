// =============================================================================
// A53 Boot - EL1 System Registers
// =============================================================================
// The translation bring-up only ever talks to the processor through
// `SystemRegisters`, so its ordering can be checked against a recorder.
// =============================================================================

/// The EL1 system registers and barriers used to turn on translation.
pub trait SystemRegisters {
    /// Memory Attribute Indirection Register
    fn write_mair_el1(&mut self, value: u64);

    /// Translation Control Register
    fn write_tcr_el1(&mut self, value: u64);

    /// Translation Table Base Register 0
    fn write_ttbr0_el1(&mut self, value: u64);

    /// System Control Register
    fn read_sctlr_el1(&mut self) -> u64;

    fn write_sctlr_el1(&mut self, value: u64);

    /// Instruction synchronization barrier.
    fn isb(&mut self);

    /// Data synchronization barrier, inner shareable.
    fn dsb(&mut self);
}

/// The executing core's own EL1 registers.
#[cfg(target_arch = "aarch64")]
pub struct El1Registers {
    _private: (),
}

#[cfg(target_arch = "aarch64")]
impl El1Registers {
    /// # Safety
    /// Must run at EL1. Writes through this handle change the translation
    /// regime of all code executing on the core.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "aarch64")]
impl SystemRegisters for El1Registers {
    #[inline(always)]
    fn write_mair_el1(&mut self, value: u64) {
        unsafe { core::arch::asm!("msr mair_el1, {}", in(reg) value) };
    }

    #[inline(always)]
    fn write_tcr_el1(&mut self, value: u64) {
        unsafe { core::arch::asm!("msr tcr_el1, {}", in(reg) value) };
    }

    #[inline(always)]
    fn write_ttbr0_el1(&mut self, value: u64) {
        unsafe { core::arch::asm!("msr ttbr0_el1, {}", in(reg) value) };
    }

    #[inline(always)]
    fn read_sctlr_el1(&mut self) -> u64 {
        let value: u64;
        unsafe { core::arch::asm!("mrs {}, sctlr_el1", out(reg) value) };
        value
    }

    #[inline(always)]
    fn write_sctlr_el1(&mut self, value: u64) {
        unsafe { core::arch::asm!("msr sctlr_el1, {}", in(reg) value) };
    }

    #[inline(always)]
    fn isb(&mut self) {
        unsafe { core::arch::asm!("isb") };
    }

    #[inline(always)]
    fn dsb(&mut self) {
        unsafe { core::arch::asm!("dsb ish") };
    }
}

/// Read TTBR0_EL1 for diagnostics.
#[cfg(target_arch = "aarch64")]
pub fn read_ttbr0_el1() -> u64 {
    let value: u64;
    unsafe { core::arch::asm!("mrs {}, ttbr0_el1", out(reg) value) };
    value
}

/// Read SCTLR_EL1 for diagnostics.
#[cfg(target_arch = "aarch64")]
pub fn read_sctlr_el1() -> u64 {
    let value: u64;
    unsafe { core::arch::asm!("mrs {}, sctlr_el1", out(reg) value) };
    value
}

#[cfg(not(target_arch = "aarch64"))]
pub fn read_ttbr0_el1() -> u64 {
    0
}

#[cfg(not(target_arch = "aarch64"))]
pub fn read_sctlr_el1() -> u64 {
    0
}
