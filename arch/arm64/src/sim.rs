// =============================================================================
// A53 Boot - Simulated Register Files (host tests only)
// =============================================================================

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::vec::Vec;

use crate::mmio::Mmio;
use crate::sysreg::SystemRegisters;
use crate::uart::{flags, regs, Interrupts};

/// A flat bank of 32-bit registers that simply stores what is written.
pub struct SimRegs {
    values: RefCell<BTreeMap<usize, u32>>,
    writes: RefCell<Vec<(usize, u32)>>,
}

impl SimRegs {
    pub fn new() -> Self {
        Self {
            values: RefCell::new(BTreeMap::new()),
            writes: RefCell::new(Vec::new()),
        }
    }

    /// Every write in order, as `(offset, value)`.
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.writes.borrow().clone()
    }
}

impl Mmio for SimRegs {
    fn read32(&self, offset: usize) -> u32 {
        self.values.borrow().get(&offset).copied().unwrap_or(0)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.values.borrow_mut().insert(offset, value);
        self.writes.borrow_mut().push((offset, value));
    }
}

#[derive(Default)]
struct Pl011State {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    tx_full_polls: usize,
    tx_free: Option<usize>,
    ris: u32,
    imsc: u32,
    cr: u32,
    ibrd: u32,
    fbrd: u32,
    lcr_h: u32,
    writes: Vec<(usize, u32)>,
}

/// Behavioural model of a PL011.
///
/// The receive interrupt is latched when a byte arrives and stays raised
/// until software writes RXIC to the interrupt clear register.
pub struct SimPl011 {
    state: RefCell<Pl011State>,
}

impl SimPl011 {
    pub fn new() -> Self {
        Self { state: RefCell::new(Pl011State::default()) }
    }

    /// Deliver a byte on the receive line.
    pub fn inject(&self, byte: u8) {
        let mut s = self.state.borrow_mut();
        s.rx.push_back(byte);
        s.ris |= Interrupts::RX.bits();
    }

    pub fn inject_all(&self, bytes: &[u8]) {
        for &b in bytes {
            self.inject(b);
        }
    }

    /// Report the transmit FIFO as full for the next `polls` flag reads.
    pub fn stall_tx(&self, polls: usize) {
        self.state.borrow_mut().tx_full_polls = polls;
    }

    /// Model a transmit FIFO with `slots` free entries that never drains.
    pub fn limit_tx_fifo(&self, slots: usize) {
        self.state.borrow_mut().tx_free = Some(slots);
    }

    /// Bytes written to the data register so far.
    pub fn transmitted(&self) -> Vec<u8> {
        self.state.borrow().tx.clone()
    }

    pub fn pending_rx(&self) -> usize {
        self.state.borrow().rx.len()
    }

    pub fn raw_status(&self) -> u32 {
        self.state.borrow().ris
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state.borrow().writes.clone()
    }

    pub fn register(&self, offset: usize) -> u32 {
        let s = self.state.borrow();
        match offset {
            regs::CR => s.cr,
            regs::IBRD => s.ibrd,
            regs::FBRD => s.fbrd,
            regs::LCR_H => s.lcr_h,
            regs::IMSC => s.imsc,
            _ => 0,
        }
    }
}

impl Mmio for SimPl011 {
    fn read32(&self, offset: usize) -> u32 {
        let mut s = self.state.borrow_mut();
        match offset {
            regs::DR => s.rx.pop_front().map(u32::from).unwrap_or(0),
            regs::FR => {
                let mut fr = 0;
                if s.rx.is_empty() {
                    fr |= flags::RXFE;
                }
                if s.tx_full_polls > 0 {
                    s.tx_full_polls -= 1;
                    fr |= flags::TXFF;
                }
                if s.tx_free == Some(0) {
                    fr |= flags::TXFF;
                }
                fr
            }
            regs::CR => s.cr,
            regs::IBRD => s.ibrd,
            regs::FBRD => s.fbrd,
            regs::LCR_H => s.lcr_h,
            regs::IMSC => s.imsc,
            regs::RIS => s.ris,
            regs::MIS => s.ris & s.imsc,
            _ => 0,
        }
    }

    fn write32(&self, offset: usize, value: u32) {
        let mut s = self.state.borrow_mut();
        s.writes.push((offset, value));
        match offset {
            regs::DR => {
                assert_eq!(s.tx_full_polls, 0, "data register written while TX FIFO full");
                assert_ne!(s.tx_free, Some(0), "data register written while TX FIFO full");
                if let Some(free) = s.tx_free.as_mut() {
                    *free -= 1;
                }
                s.tx.push(value as u8);
            }
            regs::CR => s.cr = value,
            regs::IBRD => s.ibrd = value,
            regs::FBRD => s.fbrd = value,
            regs::LCR_H => s.lcr_h = value,
            regs::IMSC => s.imsc = value,
            regs::ICR => s.ris &= !value,
            _ => {}
        }
    }
}

/// One observable system register effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysOp {
    Mair(u64),
    Tcr(u64),
    Ttbr0(u64),
    SctlrRead,
    Sctlr(u64),
    Isb,
    Dsb,
}

/// Records system register traffic instead of executing it.
pub struct RecordingSysRegs {
    pub ops: Vec<SysOp>,
    pub sctlr: u64,
}

impl RecordingSysRegs {
    pub fn new(sctlr: u64) -> Self {
        Self { ops: Vec::new(), sctlr }
    }
}

impl SystemRegisters for RecordingSysRegs {
    fn write_mair_el1(&mut self, value: u64) {
        self.ops.push(SysOp::Mair(value));
    }

    fn write_tcr_el1(&mut self, value: u64) {
        self.ops.push(SysOp::Tcr(value));
    }

    fn write_ttbr0_el1(&mut self, value: u64) {
        self.ops.push(SysOp::Ttbr0(value));
    }

    fn read_sctlr_el1(&mut self) -> u64 {
        self.ops.push(SysOp::SctlrRead);
        self.sctlr
    }

    fn write_sctlr_el1(&mut self, value: u64) {
        self.sctlr = value;
        self.ops.push(SysOp::Sctlr(value));
    }

    fn isb(&mut self) {
        self.ops.push(SysOp::Isb);
    }

    fn dsb(&mut self) {
        self.ops.push(SysOp::Dsb);
    }
}
