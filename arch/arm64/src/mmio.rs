// =============================================================================
// A53 Boot - Memory-Mapped I/O
// =============================================================================
// Drivers never dereference device addresses themselves. They go through the
// `Mmio` trait so the same register protocol can run against real hardware or
// against a simulated register file in host tests.
// =============================================================================

use core::ptr;

/// A block of 32-bit device registers addressed by byte offset.
///
/// Every access is a side-effecting load or store. Implementations must not
/// cache, merge or reorder accesses.
pub trait Mmio {
    /// Read the register at `offset`.
    fn read32(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`.
    fn write32(&self, offset: usize, value: u32);

    /// Read-modify-write OR of `bits` into the register at `offset`.
    ///
    /// Bits that are already set, including those belonging to other users
    /// of the same register, are preserved.
    fn set_bits32(&self, offset: usize, bits: u32) {
        let current = self.read32(offset);
        self.write32(offset, current | bits);
    }
}

/// A physical register window accessed with volatile loads and stores.
#[derive(Debug, Clone, Copy)]
pub struct MmioRegion {
    base: usize,
}

impl MmioRegion {
    /// Create a register window at `base`.
    ///
    /// # Safety
    /// `base` must be the address of a device register block that stays
    /// mapped (or identity mapped) for as long as the region is used.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }
}

impl Mmio for MmioRegion {
    #[inline(always)]
    fn read32(&self, offset: usize) -> u32 {
        // SAFETY: the constructor's contract guarantees base points at device registers
        unsafe { ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline(always)]
    fn write32(&self, offset: usize, value: u32) {
        // SAFETY: see read32
        unsafe { ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}
