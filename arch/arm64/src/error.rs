// =============================================================================
// A53 Boot - Error Types
// =============================================================================
// Construction-time validation errors. Hardware misbehaviour at runtime is not
// reported here: a wedged device hangs and a bad translation setup faults.
// =============================================================================

use thiserror::Error;

/// Errors returned when a value would describe an illegal hardware state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A translation table base that the walker cannot use.
    #[error("table base {addr:#x} is not aligned to {align:#x}")]
    MisalignedTableBase { addr: u64, align: u64 },

    /// An interrupt ID outside the GICv2 range of real interrupt lines.
    #[error("interrupt id {irq} is outside the distributor range")]
    InvalidIrq { irq: u32 },
}

pub type Result<T> = core::result::Result<T, Error>;
