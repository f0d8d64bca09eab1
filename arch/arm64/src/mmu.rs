// =============================================================================
// A53 Boot - Memory Management Unit (MMU)
// =============================================================================
// Stage-1 EL1 translation with an identity map (VA == PA) built from 2MB
// blocks. Two levels are live:
//   Level 1: every entry is a table descriptor pointing at the level-2 table.
//   Level 2: entry i is a block descriptor for [i * 2MB, (i + 1) * 2MB).
//
// Bring-up is five ordered steps. Steps 1-4 must complete before step 5, and
// nothing may rely on translation before step 5 has completed:
//   1. MAIR_EL1   - memory attributes
//   2. tables     - build level 1 / level 2
//   3. TCR_EL1    - walk configuration
//   4. TTBR0_EL1  - level-1 table base
//   5. SCTLR_EL1  - set M and write it back
// There is no rollback: a broken precondition here is a fault or a hang.
// =============================================================================

use core::ops::Index;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::sysreg::SystemRegisters;

/// Number of entries in a translation table
pub const ENTRIES_PER_TABLE: usize = 512;

/// Bytes mapped by one level-2 block descriptor
pub const BLOCK_SIZE: u64 = 0x20_0000;

/// Required alignment of a table base
pub const TABLE_ALIGN: u64 = 4096;

// Memory Attributes (Index into MAIR_EL1)
pub const MT_NORMAL: u64 = 0;

/// Normal memory, inner/outer write-back non-transient, read/write allocate
pub const MAIR_ATTR_NORMAL: u64 = 0xFF;

/// MAIR_EL1 value: only index 0 is used.
pub const MAIR_VALUE: u64 = MAIR_ATTR_NORMAL << (8 * MT_NORMAL);

/// TCR_EL1 fields
pub mod tcr {
    /// 64 - 25 = 39-bit input addresses, so the walk starts at level 1
    pub const T0SZ: u64 = 25;
    /// Inner write-back read/write-allocate cacheable walks
    pub const IRGN0_WBWA: u64 = 1 << 8;
    /// Outer write-back read/write-allocate cacheable walks
    pub const ORGN0_WBWA: u64 = 1 << 10;
    /// Inner shareable walks
    pub const SH0_INNER: u64 = 3 << 12;
    /// 4KB granule (TG0 = 0)
    pub const TG0_4K: u64 = 0 << 14;
    /// 40-bit physical addresses
    pub const IPS_40BIT: u64 = 2 << 32;
}

/// TCR_EL1 value matching the table layout above.
pub const TCR_VALUE: u64 =
    tcr::T0SZ | tcr::IRGN0_WBWA | tcr::ORGN0_WBWA | tcr::SH0_INNER | tcr::TG0_4K | tcr::IPS_40BIT;

/// SCTLR_EL1.M
pub const SCTLR_M: u64 = 1 << 0;

/// Output address bits [47:12] of a descriptor
const ADDR_MASK: u64 = 0x0000_FFFF_FFFF_F000;

bitflags! {
    /// Descriptor bits (ARMv8-A stage-1, 4KB granule)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorFlags: u64 {
        const VALID    = 1 << 0;
        /// Next-level table (levels 0-2)
        const TABLE    = 1 << 1;
        /// Block (levels 1-2), i.e. TABLE clear
        const BLOCK    = 0 << 1;
        /// Non-secure output
        const NS       = 1 << 5;
        /// AP[2:1] = 00: read/write at EL1
        const RW       = 0 << 6;
        /// AP[2:1] = 10: read-only at EL1
        const RO       = 2 << 6;
        const SH_INNER = 3 << 8;
        /// Access flag (must be 1 to avoid an access fault)
        const AF       = 1 << 10;
        /// Execute never
        const XN       = 1 << 54;
    }
}

/// Attribute index field of a block descriptor.
const fn attr_index(index: u64) -> u64 {
    index << 2
}

/// Address of a translation table, aligned for the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableBase(u64);

impl TableBase {
    /// Refuses addresses the walker could not use.
    pub fn new(addr: u64) -> Result<Self> {
        if addr % TABLE_ALIGN == 0 {
            Ok(Self(addr))
        } else {
            Err(Error::MisalignedTableBase { addr, align: TABLE_ALIGN })
        }
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// A 64-bit translation table entry.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(u64);

impl Descriptor {
    pub const INVALID: Self = Self(0);

    /// Pointer to the next-level table at `next`.
    pub const fn table(next: TableBase) -> Self {
        Self(next.0 | DescriptorFlags::TABLE.bits() | DescriptorFlags::VALID.bits())
    }

    /// Identity block descriptor for level-2 block `index`.
    pub const fn block(index: usize) -> Self {
        Self(
            (index as u64 * BLOCK_SIZE)
                | attr_index(MT_NORMAL)
                | DescriptorFlags::BLOCK.bits()
                | DescriptorFlags::AF.bits()
                | DescriptorFlags::RW.bits()
                | DescriptorFlags::VALID.bits(),
        )
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 & DescriptorFlags::VALID.bits() != 0
    }

    /// True for table descriptors, false for blocks.
    pub const fn is_table(self) -> bool {
        self.0 & DescriptorFlags::TABLE.bits() != 0
    }

    pub const fn output_address(self) -> u64 {
        self.0 & ADDR_MASK
    }

    pub const fn flags(self) -> DescriptorFlags {
        DescriptorFlags::from_bits_truncate(self.0)
    }
}

/// A translation table of `N` descriptors.
#[repr(C, align(4096))]
pub struct Table<const N: usize> {
    entries: [Descriptor; N],
}

impl<const N: usize> Table<N> {
    pub const fn new() -> Self {
        Self { entries: [Descriptor::INVALID; N] }
    }

    /// Address of this table, which is its physical address while the
    /// identity map is in force.
    pub fn base(&self) -> TableBase {
        // repr(align) guarantees TABLE_ALIGN
        TableBase(self as *const Self as u64)
    }

    pub fn entries(&self) -> &[Descriptor] {
        &self.entries
    }
}

impl<const N: usize> Index<usize> for Table<N> {
    type Output = Descriptor;

    fn index(&self, index: usize) -> &Descriptor {
        &self.entries[index]
    }
}

/// The boot address space: the level-1 and level-2 tables the walker uses.
///
/// Once its level-1 base is in TTBR0_EL1 the value must stay where it is for
/// as long as translation is on.
pub struct AddressSpace<const N: usize = ENTRIES_PER_TABLE> {
    level1: Table<N>,
    level2: Table<N>,
}

impl<const N: usize> AddressSpace<N> {
    pub const fn new() -> Self {
        Self { level1: Table::new(), level2: Table::new() }
    }

    /// Populate both levels with the identity map.
    ///
    /// Every entry is overwritten, so calling this again is harmless.
    pub fn build_identity_tables(&mut self) {
        let next = self.level2.base();
        let pairs = self.level1.entries.iter_mut().zip(self.level2.entries.iter_mut());
        for (index, (l1, l2)) in pairs.enumerate() {
            *l1 = Descriptor::table(next);
            *l2 = Descriptor::block(index);
        }
    }

    pub fn level1(&self) -> &Table<N> {
        &self.level1
    }

    pub fn level2(&self) -> &Table<N> {
        &self.level2
    }

    /// Bytes covered by the identity map.
    pub const fn mapped_size() -> u64 {
        N as u64 * BLOCK_SIZE
    }
}

// =============================================================================
// Bring-up steps
// =============================================================================

/// Step 1: program MAIR_EL1.
///
/// The translation hardware reads MAIR, so the write needs an ISB rather
/// than data ordering.
pub fn configure_memory_attributes<R: SystemRegisters>(regs: &mut R) {
    regs.write_mair_el1(MAIR_VALUE);
    regs.isb();
}

/// Make descriptor stores visible to the table walker.
pub fn publish_tables<R: SystemRegisters>(regs: &mut R) {
    regs.dsb();
}

/// Step 3: program TCR_EL1.
pub fn configure_translation_control<R: SystemRegisters>(regs: &mut R) {
    regs.write_tcr_el1(TCR_VALUE);
    regs.isb();
}

/// Step 4: point TTBR0_EL1 at the level-1 table.
pub fn set_table_base<R: SystemRegisters>(regs: &mut R, level1: TableBase) {
    regs.write_ttbr0_el1(level1.as_u64());
    regs.isb();
}

/// Step 5: set SCTLR_EL1.M.
///
/// The modified value is written back and followed by an ISB; without the
/// write-back the MMU never turns on.
pub fn enable<R: SystemRegisters>(regs: &mut R) {
    let sctlr = regs.read_sctlr_el1();
    regs.write_sctlr_el1(sctlr | SCTLR_M);
    regs.isb();
}

pub const fn mmu_enabled(sctlr: u64) -> bool {
    sctlr & SCTLR_M != 0
}

/// Run all five steps in order on `space`.
pub fn bring_up<R: SystemRegisters, const N: usize>(regs: &mut R, space: &mut AddressSpace<N>) {
    log::debug!("mmu: MAIR_EL1 <- {:#x}", MAIR_VALUE);
    configure_memory_attributes(regs);

    space.build_identity_tables();
    publish_tables(regs);
    log::debug!(
        "mmu: {} level-2 blocks, identity map of {:#x} bytes",
        N,
        AddressSpace::<N>::mapped_size()
    );

    log::debug!("mmu: TCR_EL1 <- {:#x}", TCR_VALUE);
    configure_translation_control(regs);

    let base = space.level1().base();
    log::debug!("mmu: TTBR0_EL1 <- {:#x}", base.as_u64());
    set_table_base(regs, base);

    log::info!("mmu: writing SCTLR_EL1 back with M set");
    enable(regs);
    log::info!("mmu: enabled");
}

/// Write a sentinel through `word` and read it back.
///
/// # Safety
/// `word` must be valid for volatile reads and writes of a u64.
pub unsafe fn probe(word: *mut u64) -> bool {
    const SENTINEL: u64 = 0xDEAD_BEEF;
    core::ptr::write_volatile(word, SENTINEL);
    core::ptr::read_volatile(word) == SENTINEL
}
