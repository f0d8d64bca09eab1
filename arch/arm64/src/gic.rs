// =============================================================================
// A53 Boot - ARM Generic Interrupt Controller (GICv2)
// =============================================================================
// Just enough of the GICv2 to deliver one peripheral line to this core.
//
// The GIC consists of:
// - Distributor: enables and routes interrupt lines.
// - CPU Interface: priority masking and acknowledgement for this core.
// =============================================================================

use crate::error::{Error, Result};
use crate::mmio::{Mmio, MmioRegion};
use crate::platform;

// Distributor Registers
const GICD_CTLR: usize = 0x000; // Control Register
pub(crate) const GICD_ISENABLER: usize = 0x100; // Interrupt Set-Enable Registers

// CPU Interface Registers
const GICC_CTLR: usize = 0x0000; // Control Register
const GICC_PMR: usize = 0x0004; // Priority Mask Register
const GICC_IAR: usize = 0x000C; // Interrupt Acknowledge Register
const GICC_EOIR: usize = 0x0010; // End of Interrupt Register

/// Interrupt ID reported by IAR when nothing is pending.
pub const SPURIOUS_IRQ: u32 = 1023;

/// An interrupt ID the distributor can enable (0..1020).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqNumber(u32);

impl IrqNumber {
    pub fn new(irq: u32) -> Result<Self> {
        if irq < 1020 {
            Ok(Self(irq))
        } else {
            Err(Error::InvalidIrq { irq })
        }
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Byte offset of this line's ISENABLER word from the distributor base.
    pub const fn enable_register(self) -> usize {
        GICD_ISENABLER + 4 * (self.0 as usize / 32)
    }

    /// Bit of this line inside its ISENABLER word.
    pub const fn enable_bit(self) -> u32 {
        1 << (self.0 % 32)
    }
}

/// GICv2 distributor.
pub struct Distributor<M: Mmio> {
    pub(crate) regs: M,
}

impl<M: Mmio> Distributor<M> {
    pub const fn new(regs: M) -> Self {
        Self { regs }
    }

    /// Turn on interrupt forwarding from the distributor.
    pub fn enable(&self) {
        self.regs.write32(GICD_CTLR, 1);
    }

    /// Unmask one interrupt line.
    ///
    /// ISENABLER is a read-modify-write OR so that other lines sharing the
    /// same 32-bit word stay enabled.
    pub fn enable_line(&self, irq: IrqNumber) {
        self.regs.set_bits32(irq.enable_register(), irq.enable_bit());
    }
}

/// GICv2 CPU interface of this core.
pub struct CpuInterface<M: Mmio> {
    pub(crate) regs: M,
}

impl<M: Mmio> CpuInterface<M> {
    pub const fn new(regs: M) -> Self {
        Self { regs }
    }

    /// Accept every priority and enable signalling to the core.
    pub fn enable(&self) {
        self.regs.write32(GICC_PMR, 0xFF);
        self.regs.write32(GICC_CTLR, 1);
    }

    /// Acknowledge the highest priority pending interrupt.
    /// Returns the raw IAR value; the ID is in bits [9:0].
    pub fn acknowledge(&self) -> u32 {
        self.regs.read32(GICC_IAR)
    }

    /// Signal End Of Interrupt for a value returned by `acknowledge`.
    pub fn end_interrupt(&self, iar: u32) {
        self.regs.write32(GICC_EOIR, iar);
    }
}

/// The platform's distributor.
pub fn distributor() -> Distributor<MmioRegion> {
    // SAFETY: the platform map names the distributor's register block
    Distributor::new(unsafe { MmioRegion::new(platform::GICD_BASE) })
}

/// The platform's CPU interface.
pub fn cpu_interface() -> CpuInterface<MmioRegion> {
    // SAFETY: the platform map names the CPU interface's register block
    CpuInterface::new(unsafe { MmioRegion::new(platform::GICC_BASE) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRegs;

    #[test]
    fn irq_33_sets_bit_1_of_second_word() {
        let gicd = Distributor::new(SimRegs::new());
        gicd.regs.write32(GICD_ISENABLER + 4, 0x8000_0001);

        gicd.enable_line(IrqNumber::new(33).unwrap());

        assert_eq!(gicd.regs.read32(GICD_ISENABLER + 4), 0x8000_0003);
        assert_eq!(gicd.regs.read32(GICD_ISENABLER), 0);
    }

    #[test]
    fn enable_line_touches_only_its_word() {
        let gicd = Distributor::new(SimRegs::new());
        gicd.enable_line(IrqNumber::new(27).unwrap());
        gicd.enable_line(IrqNumber::new(95).unwrap());

        let writes = gicd.regs.writes();
        assert_eq!(writes, [(0x100, 1 << 27), (0x108, 1 << 31)]);
    }

    #[test]
    fn irq_numbers_beyond_the_distributor_are_rejected() {
        assert!(IrqNumber::new(1019).is_ok());
        assert_eq!(IrqNumber::new(1020), Err(Error::InvalidIrq { irq: 1020 }));
        assert_eq!(IrqNumber::new(SPURIOUS_IRQ), Err(Error::InvalidIrq { irq: 1023 }));
    }

    #[test]
    fn cpu_interface_enable_and_eoi() {
        let gicc = CpuInterface::new(SimRegs::new());
        gicc.enable();
        gicc.regs.write32(GICC_IAR, 33);
        let iar = gicc.acknowledge();
        gicc.end_interrupt(iar);

        assert_eq!(
            gicc.regs.writes(),
            [(GICC_PMR, 0xFF), (GICC_CTLR, 1), (GICC_IAR, 33), (GICC_EOIR, 33)]
        );
    }
}
